use std::sync::Arc;

use rusqlite::types::Value;

use crate::error::{BrokerError, Result};
use crate::{html, value};

/// One row: an ordered field schema plus the values in schema order.
///
/// A record built without values is "unset" until [`Record::set_record`]
/// succeeds. Field lookups on an unset record fail with [`BrokerError::Unset`].
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    fields: Arc<[String]>,
    values: Option<Vec<Value>>,
}

impl Record {
    pub fn new<I, S>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self::from_schema(schema(fields)?))
    }

    pub fn with_values<I, S>(fields: I, values: Vec<Value>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut rec = Self::new(fields)?;
        rec.set_record(values)?;
        Ok(rec)
    }

    pub(crate) fn from_schema(fields: Arc<[String]>) -> Self {
        Self {
            fields,
            values: None,
        }
    }

    /// Replaces every value. Leaves the record untouched on a length mismatch.
    pub fn set_record(&mut self, values: Vec<Value>) -> Result<()> {
        if values.len() != self.fields.len() {
            return Err(BrokerError::SchemaMismatch {
                expected: self.fields.len(),
                actual: values.len(),
            });
        }
        self.values = Some(values);
        Ok(())
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub(crate) fn schema(&self) -> &Arc<[String]> {
        &self.fields
    }

    pub fn values(&self) -> Option<&[Value]> {
        self.values.as_deref()
    }

    pub fn is_set(&self) -> bool {
        self.values.is_some()
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.fields
            .iter()
            .position(|f| f == name)
            .ok_or_else(|| BrokerError::UnknownField(name.to_string()))
    }

    pub fn get_field(&self, name: &str) -> Result<&Value> {
        let idx = self.position(name)?;
        let values = self.values.as_ref().ok_or(BrokerError::Unset)?;
        Ok(&values[idx])
    }

    pub fn set_field(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let idx = self.position(name)?;
        let values = self.values.as_mut().ok_or(BrokerError::Unset)?;
        values[idx] = value.into();
        Ok(())
    }

    /// Field/value pairs in schema order; empty when unset.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().flatten())
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        for (field, v) in self.iter() {
            obj.insert(field.to_string(), value::to_json(v));
        }
        serde_json::Value::Object(obj)
    }

    /// A single `<tr>` with one cell per field.
    pub fn html_rows(&self) -> String {
        let mut out = String::from("\t\t<tr>\n");
        for (idx, _) in self.fields.iter().enumerate() {
            let cell = self
                .values
                .as_ref()
                .map(|v| value::display(&v[idx]))
                .unwrap_or_default();
            out.push_str("\t\t\t<td>");
            out.push_str(&html::escape(&cell));
            out.push_str("</td>\n");
        }
        out.push_str("\t\t</tr>\n");
        out
    }

    pub fn html_table(&self) -> String {
        format!("\t<tbody>\n{}\t</tbody>\n", self.html_rows())
    }
}

pub(crate) fn schema<I, S>(fields: I) -> Result<Arc<[String]>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
    if fields.is_empty() {
        return Err(BrokerError::EmptySchema);
    }
    for (i, f) in fields.iter().enumerate() {
        if fields[..i].contains(f) {
            return Err(BrokerError::DuplicateField(f.clone()));
        }
    }
    Ok(fields.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    #[test]
    fn get_field_returns_values_in_schema_order() {
        let rec = Record::with_values(
            ["sid", "first", "last"],
            vec![Value::Integer(3), text("Jack"), text("Marin")],
        )
        .expect("record");
        assert_eq!(rec.get_field("sid").unwrap(), &Value::Integer(3));
        assert_eq!(rec.get_field("first").unwrap(), &text("Jack"));
        assert_eq!(rec.get_field("last").unwrap(), &text("Marin"));
        let pairs: Vec<_> = rec.iter().map(|(f, _)| f).collect();
        assert_eq!(pairs, vec!["sid", "first", "last"]);
    }

    #[test]
    fn length_mismatch_leaves_record_unset() {
        let mut rec = Record::new(["first", "last"]).unwrap();
        let e = rec.set_record(vec![text("Jack")]).unwrap_err();
        assert!(matches!(
            e,
            BrokerError::SchemaMismatch {
                expected: 2,
                actual: 1
            }
        ));
        assert!(!rec.is_set());
        assert!(matches!(rec.get_field("first"), Err(BrokerError::Unset)));

        assert!(Record::with_values(["a"], vec![text("x"), text("y")]).is_err());
    }

    #[test]
    fn mismatch_after_set_keeps_previous_values() {
        let mut rec = Record::with_values(["first"], vec![text("Jack")]).unwrap();
        assert!(rec.set_record(vec![]).is_err());
        assert_eq!(rec.get_field("first").unwrap(), &text("Jack"));
    }

    #[test]
    fn unknown_field_is_a_lookup_error() {
        let mut rec = Record::with_values(["first"], vec![text("Jack")]).unwrap();
        assert!(matches!(
            rec.get_field("middle"),
            Err(BrokerError::UnknownField(f)) if f == "middle"
        ));
        assert!(rec.set_field("middle", 1i64).is_err());
        rec.set_field("first", "Jor".to_string()).unwrap();
        assert_eq!(rec.get_field("first").unwrap(), &text("Jor"));
    }

    #[test]
    fn empty_schema_is_rejected() {
        let none: [&str; 0] = [];
        assert!(matches!(Record::new(none), Err(BrokerError::EmptySchema)));
    }

    #[test]
    fn duplicate_fields_are_rejected() {
        assert!(matches!(
            Record::new(["first", "last", "first"]),
            Err(BrokerError::DuplicateField(f)) if f == "first"
        ));
    }

    #[test]
    fn json_keys_follow_schema_order() {
        let rec = Record::with_values(
            ["last", "first", "sid"],
            vec![text("b"), text("a"), Value::Integer(1)],
        )
        .unwrap();
        let json = rec.to_json();
        let keys: Vec<&str> = json
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["last", "first", "sid"]);
        assert_eq!(json.to_string(), r#"{"last":"b","first":"a","sid":1}"#);
    }

    #[test]
    fn row_html_escapes_cells() {
        let rec = Record::with_values(
            ["first", "last"],
            vec![text("<script>"), Value::Null],
        )
        .unwrap();
        assert_eq!(
            rec.html_rows(),
            "\t\t<tr>\n\t\t\t<td>&lt;script&gt;</td>\n\t\t\t<td></td>\n\t\t</tr>\n"
        );
        assert!(rec.html_table().starts_with("\t<tbody>\n"));
    }

    #[test]
    fn json_object_carries_every_field() {
        let rec = Record::with_values(["sid", "score"], vec![Value::Integer(1), Value::Real(8.5)])
            .unwrap();
        assert_eq!(
            rec.to_json(),
            serde_json::json!({ "sid": 1, "score": 8.5 })
        );
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        /// Distinct field names with one integer value per field.
        fn schema_and_values() -> impl Strategy<Value = (Vec<String>, Vec<i64>)> {
            prop::collection::hash_set("[a-z]{1,8}", 1..12).prop_flat_map(|names| {
                let n = names.len();
                (
                    Just(names.into_iter().collect::<Vec<_>>()),
                    prop::collection::vec(any::<i64>(), n),
                )
            })
        }

        proptest! {
            #[test]
            fn prop_matching_lengths_read_back_by_name((fields, values) in schema_and_values()) {
                let rec = Record::with_values(
                    fields.clone(),
                    values.iter().copied().map(Value::Integer).collect(),
                ).unwrap();
                for (f, v) in fields.iter().zip(&values) {
                    prop_assert_eq!(rec.get_field(f).unwrap(), &Value::Integer(*v));
                }
            }

            #[test]
            fn prop_mismatched_lengths_fail_and_stay_unset(
                (fields, _) in schema_and_values(),
                len in 0usize..16
            ) {
                prop_assume!(len != fields.len());
                let mut rec = Record::new(fields.clone()).unwrap();
                let res = rec.set_record(vec![Value::Null; len]);
                let is_mismatch = matches!(res, Err(BrokerError::SchemaMismatch { .. }));
                prop_assert!(is_mismatch);
                prop_assert!(!rec.is_set());
                let is_unset = matches!(rec.get_field(&fields[0]), Err(BrokerError::Unset));
                prop_assert!(is_unset);
            }
        }
    }
}
