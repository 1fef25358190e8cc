//! Grade tracking over a single SQLite file.
//!
//! The access layer is [`Record`], [`RecordSet`] and [`DataBroker`]; the
//! [`ipc`] module exposes the roster / quiz / score workflow as line-delimited
//! JSON requests, served by the `gradebookd` binary.

pub mod broker;
pub mod condition;
pub mod config;
pub mod db;
pub mod error;
pub mod html;
pub mod ipc;
pub mod record;
pub mod record_set;
pub mod value;

pub use broker::{CommitResult, DataBroker, Table};
pub use condition::{Condition, Op, OrderBy, Select};
pub use error::{BrokerError, Result};
pub use record::Record;
pub use record_set::RecordSet;
