use std::sync::Arc;

use rusqlite::types::Value;

use crate::error::{BrokerError, Result};
use crate::html;
use crate::record::{self, Record};

/// Ordered rows sharing one schema.
///
/// Rows are reference counted so [`RecordSet::copy`] can share them with
/// another set; [`RecordSet::row_mut`] detaches a shared row before handing
/// out a mutable reference.
#[derive(Debug, Clone)]
pub struct RecordSet {
    fields: Arc<[String]>,
    rows: Vec<Arc<Record>>,
}

impl RecordSet {
    pub fn new<I, S>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self {
            fields: record::schema(fields)?,
            rows: Vec::new(),
        })
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.rows.iter().map(|r| &**r)
    }

    fn build(&self, values: Vec<Value>) -> Result<Record> {
        let mut rec = Record::from_schema(Arc::clone(&self.fields));
        rec.set_record(values)?;
        Ok(rec)
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.rows.len() {
            return Err(BrokerError::IndexOutOfRange {
                index,
                count: self.rows.len(),
            });
        }
        Ok(())
    }

    pub fn add_row(&mut self, values: Vec<Value>) -> Result<()> {
        let rec = self.build(values)?;
        self.rows.push(Arc::new(rec));
        Ok(())
    }

    pub fn get_row(&self, index: usize) -> Result<&Record> {
        self.check_index(index)?;
        Ok(&*self.rows[index])
    }

    pub fn row_mut(&mut self, index: usize) -> Result<&mut Record> {
        self.check_index(index)?;
        Ok(Arc::make_mut(&mut self.rows[index]))
    }

    pub fn update_row(&mut self, index: usize, values: Vec<Value>) -> Result<()> {
        self.check_index(index)?;
        let rec = self.build(values)?;
        self.rows[index] = Arc::new(rec);
        Ok(())
    }

    pub fn del_row(&mut self, index: usize) -> Result<Record> {
        self.check_index(index)?;
        Ok(Arc::unwrap_or_clone(self.rows.remove(index)))
    }

    /// Appends one record per value tuple. Nothing is appended if any tuple
    /// has the wrong length.
    pub fn copy_db<I>(&mut self, rows: I) -> Result<usize>
    where
        I: IntoIterator<Item = Vec<Value>>,
    {
        let built = rows
            .into_iter()
            .map(|values| self.build(values).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;
        let n = built.len();
        self.rows.extend(built);
        Ok(n)
    }

    /// Adopts `other`'s schema and appends its rows. Rows are shared, not
    /// duplicated.
    pub fn copy(&mut self, other: &RecordSet) -> Result<()> {
        if !self.rows.is_empty() && self.fields != other.fields {
            return Err(BrokerError::SchemaConflict {
                current: self.fields.join(", "),
                incoming: other.fields.join(", "),
            });
        }
        self.fields = Arc::clone(&other.fields);
        self.rows.extend(other.rows.iter().cloned());
        Ok(())
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.iter().map(Record::to_json).collect())
    }

    /// Renders the set as an HTML table with a header row of field names.
    ///
    /// Attribute pairs whose name is not a plain identifier are skipped.
    pub fn html_table(&self, caption: Option<&str>, attrs: &[(&str, &str)]) -> String {
        let mut out = String::from("<table");
        for (name, val) in attrs {
            if !html::is_attr_name(name) {
                tracing::warn!(attr = %name, "dropping invalid table attribute");
                continue;
            }
            out.push_str(&format!(" {}=\"{}\"", name, html::escape(val)));
        }
        out.push_str(">\n");
        if let Some(caption) = caption {
            out.push_str(&format!("\t<caption>{}</caption>\n", html::escape(caption)));
        }
        out.push_str("\t<thead>\n\t\t<tr>\n");
        for col in self.fields.iter() {
            out.push_str(&format!("\t\t\t<th>{}</th>\n", html::escape(col)));
        }
        out.push_str("\t\t</tr>\n\t</thead>\n");
        for row in &self.rows {
            out.push_str(&row.html_table());
        }
        out.push_str("</table>");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn roster() -> RecordSet {
        let mut rs = RecordSet::new(["first", "last"]).unwrap();
        rs.add_row(vec![text("Jack"), text("Marin")]).unwrap();
        rs.add_row(vec![text("Marian"), text("Calhoun")]).unwrap();
        rs.add_row(vec![text("Marty"), text("Markinson")]).unwrap();
        rs
    }

    #[test]
    fn added_row_reads_back() {
        let rs = roster();
        assert_eq!(rs.count(), 3);
        let row = rs.get_row(1).unwrap();
        assert_eq!(row.fields(), &["first".to_string(), "last".to_string()]);
        assert_eq!(row.values().unwrap(), &[text("Marian"), text("Calhoun")]);
    }

    #[test]
    fn del_row_in_range_removes_exactly_one() {
        let mut rs = roster();
        let removed = rs.del_row(0).unwrap();
        assert_eq!(removed.get_field("first").unwrap(), &text("Jack"));
        assert_eq!(rs.count(), 2);
        assert_eq!(rs.get_row(0).unwrap().get_field("first").unwrap(), &text("Marian"));
    }

    #[test]
    fn del_row_out_of_range_leaves_set_unchanged() {
        let mut rs = roster();
        assert!(matches!(
            rs.del_row(3),
            Err(BrokerError::IndexOutOfRange { index: 3, count: 3 })
        ));
        assert_eq!(rs.count(), 3);
        assert!(rs.get_row(7).is_err());
    }

    #[test]
    fn update_row_replaces_or_fails() {
        let mut rs = roster();
        rs.update_row(2, vec![text("Jor"), text("El")]).unwrap();
        assert_eq!(rs.get_row(2).unwrap().get_field("last").unwrap(), &text("El"));
        assert!(rs.update_row(5, vec![text("a"), text("b")]).is_err());
        assert!(rs.update_row(0, vec![text("only")]).is_err());
        assert_eq!(rs.get_row(0).unwrap().get_field("first").unwrap(), &text("Jack"));
    }

    #[test]
    fn copy_db_is_all_or_nothing() {
        let mut rs = RecordSet::new(["sid", "score"]).unwrap();
        let n = rs
            .copy_db(vec![
                vec![Value::Integer(1), Value::Real(7.0)],
                vec![Value::Integer(2), Value::Real(9.5)],
            ])
            .unwrap();
        assert_eq!(n, 2);
        let bad = rs.copy_db(vec![
            vec![Value::Integer(3), Value::Real(1.0)],
            vec![Value::Integer(4)],
        ]);
        assert!(bad.is_err());
        assert_eq!(rs.count(), 2);
    }

    #[test]
    fn copy_shares_rows_until_mutated() {
        let source = roster();
        let mut target = RecordSet::new(["unused"]).unwrap();
        target.copy(&source).unwrap();
        assert_eq!(target.fields(), source.fields());
        assert_eq!(target.count(), 3);

        target.row_mut(0).unwrap().set_field("first", "Jo".to_string()).unwrap();
        assert_eq!(target.get_row(0).unwrap().get_field("first").unwrap(), &text("Jo"));
        assert_eq!(source.get_row(0).unwrap().get_field("first").unwrap(), &text("Jack"));
    }

    #[test]
    fn copy_refuses_mixed_schemas() {
        let mut target = RecordSet::new(["sid"]).unwrap();
        target.add_row(vec![Value::Integer(1)]).unwrap();
        assert!(matches!(
            target.copy(&roster()),
            Err(BrokerError::SchemaConflict { .. })
        ));
        assert_eq!(target.count(), 1);
    }

    #[test]
    fn table_has_header_and_one_row_per_record() {
        let mut rs = RecordSet::new(["first", "last"]).unwrap();
        rs.add_row(vec![text("Jack"), text("Marin")]).unwrap();
        let out = rs.html_table(None, &[]);
        assert_eq!(out.matches("<th>").count(), 2);
        assert_eq!(out.matches("<tbody>").count(), 1);
        let jack = out.find("<td>Jack</td>").expect("Jack cell");
        let marin = out.find("<td>Marin</td>").expect("Marin cell");
        assert!(jack < marin);
        assert!(!out.contains("<caption>"));
    }

    #[test]
    fn caption_and_attrs_are_escaped() {
        let rs = roster();
        let out = rs.html_table(
            Some("Q1 <results>"),
            &[("class", "grid\" onload=\"x"), ("on load", "y")],
        );
        assert!(out.starts_with("<table class=\"grid&quot; onload=&quot;x\">\n"));
        assert!(out.contains("\t<caption>Q1 &lt;results&gt;</caption>\n"));
        assert!(!out.contains("on load"));
        assert!(out.ends_with("</table>"));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn scores() -> impl Strategy<Value = Vec<(i64, String)>> {
            prop::collection::vec((any::<i64>(), "[A-Za-z]{0,10}"), 0..40)
        }

        fn filled(rows: &[(i64, String)]) -> RecordSet {
            let mut rs = RecordSet::new(["sid", "last"]).unwrap();
            for (sid, last) in rows {
                rs.add_row(vec![Value::Integer(*sid), text(last)]).unwrap();
            }
            rs
        }

        proptest! {
            #[test]
            fn prop_added_rows_read_back_in_order(rows in scores()) {
                let rs = filled(&rows);
                prop_assert_eq!(rs.count(), rows.len());
                for (i, (sid, last)) in rows.iter().enumerate() {
                    let row = rs.get_row(i).unwrap();
                    prop_assert_eq!(row.get_field("sid").unwrap(), &Value::Integer(*sid));
                    prop_assert_eq!(row.get_field("last").unwrap(), &text(last));
                }
            }

            #[test]
            fn prop_del_row_removes_exactly_the_indexed_row(rows in scores(), index in 0usize..60) {
                let mut rs = filled(&rows);
                let res = rs.del_row(index);
                if index < rows.len() {
                    let removed = res.unwrap();
                    prop_assert_eq!(removed.get_field("sid").unwrap(), &Value::Integer(rows[index].0));
                    let mut expected = rows.clone();
                    expected.remove(index);
                    prop_assert_eq!(rs.count(), expected.len());
                    for (i, (sid, _)) in expected.iter().enumerate() {
                        prop_assert_eq!(rs.get_row(i).unwrap().get_field("sid").unwrap(), &Value::Integer(*sid));
                    }
                } else {
                    let out_of_range = matches!(res, Err(BrokerError::IndexOutOfRange { .. }));
                    prop_assert!(out_of_range);
                    prop_assert_eq!(rs.count(), rows.len());
                }
            }
        }
    }
}
