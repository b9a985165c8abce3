//! The seam between the executor and the graph database.
//!
//! The library never talks to a database itself: an embedding application hands it a
//! [`Driver`], which opens [`Transaction`]s that run Cypher text with a parameter map and
//! return records as JSON objects.
use std::fmt::Debug;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::config::RequestContext;
use crate::config::SessionConfig;
use crate::error::DriverError;
use crate::graphql::Object;

/// Whether a transaction writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    Read,
    Write,
}

/// Update counters reported by the database for one statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Counters {
    pub nodes_created: u64,
    pub nodes_deleted: u64,
    pub relationships_created: u64,
    pub relationships_deleted: u64,
}

/// The result of one statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryResult {
    /// One object per record, keyed by column.
    pub records: Vec<Map<String, Value>>,
    pub counters: Counters,
}

/// Opens transactions.
#[async_trait]
pub trait Driver: Send + Sync + Debug {
    async fn begin(
        &self,
        mode: AccessMode,
        session: &SessionConfig,
    ) -> Result<Box<dyn Transaction>, DriverError>;
}

/// An open transaction. It is either committed or rolled back, never both.
#[async_trait]
pub trait Transaction: Send {
    async fn run(&mut self, cypher: &str, params: &Map<String, Value>) -> Result<QueryResult, DriverError>;

    async fn commit(self: Box<Self>) -> Result<(), DriverError>;

    async fn rollback(self: Box<Self>) -> Result<(), DriverError>;
}

/// Resolves a user declared root field that is not backed by `@cypher`.
#[async_trait]
pub trait FieldResolver: Send + Sync + Debug {
    /// Returns the value of the field. Errors become field errors with the returned message.
    async fn resolve(
        &self,
        arguments: &Object,
        context: &RequestContext,
    ) -> Result<Value, String>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn counters_deserialize_from_camel_case() {
        let counters: Counters =
            serde_json::from_value(json!({ "nodesCreated": 2, "relationshipsDeleted": 1 })).unwrap();
        assert_eq!(
            counters,
            Counters {
                nodes_created: 2,
                relationships_deleted: 1,
                ..Default::default()
            }
        );
    }
}
