//! A driver that answers statements with queued results and records what it was asked.
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use graphql_cypher::Driver;
use graphql_cypher::DriverError;
use graphql_cypher::GraphCypher;
use graphql_cypher::Transaction;
use graphql_cypher::config::SessionConfig;
use graphql_cypher::execute::driver::AccessMode;
use graphql_cypher::execute::driver::QueryResult;
use serde_json::Map;
use serde_json::Value;

pub(crate) const TYPE_DEFS: &str = r#"
    type Movie @key(fields: "id") {
        id: ID! @id
        title: String
        released: Int
        actors: [Actor!]! @relationship(type: "ACTED_IN", direction: IN)
    }

    type Actor {
        name: String
        movies: [Movie!]! @relationship(type: "ACTED_IN", direction: OUT)
    }

    type Query {
        greeting(name: String!): String
    }
"#;

#[derive(Debug, Clone)]
pub(crate) struct Statement {
    pub(crate) cypher: String,
    pub(crate) params: Map<String, Value>,
    pub(crate) mode: AccessMode,
}

#[derive(Debug, Default)]
struct State {
    results: VecDeque<Result<QueryResult, DriverError>>,
    statements: Vec<Statement>,
    commits: usize,
    rollbacks: usize,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingDriver {
    state: Arc<Mutex<State>>,
}

impl RecordingDriver {
    /// Queues the records returned by the next statement.
    pub(crate) fn respond(&self, records: Vec<Value>) {
        let records = records
            .into_iter()
            .filter_map(|record| record.as_object().cloned())
            .collect();
        self.state.lock().unwrap().results.push_back(Ok(QueryResult {
            records,
            ..Default::default()
        }));
    }

    pub(crate) fn respond_with(&self, result: QueryResult) {
        self.state.lock().unwrap().results.push_back(Ok(result));
    }

    pub(crate) fn fail(&self, error: DriverError) {
        self.state.lock().unwrap().results.push_back(Err(error));
    }

    pub(crate) fn statements(&self) -> Vec<Statement> {
        self.state.lock().unwrap().statements.clone()
    }

    pub(crate) fn commits(&self) -> usize {
        self.state.lock().unwrap().commits
    }

    pub(crate) fn rollbacks(&self) -> usize {
        self.state.lock().unwrap().rollbacks
    }
}

#[async_trait]
impl Driver for RecordingDriver {
    async fn begin(
        &self,
        mode: AccessMode,
        _session: &SessionConfig,
    ) -> Result<Box<dyn Transaction>, DriverError> {
        Ok(Box::new(RecordingTransaction {
            state: self.state.clone(),
            mode,
        }))
    }
}

struct RecordingTransaction {
    state: Arc<Mutex<State>>,
    mode: AccessMode,
}

#[async_trait]
impl Transaction for RecordingTransaction {
    async fn run(&mut self, cypher: &str, params: &Map<String, Value>) -> Result<QueryResult, DriverError> {
        let mut state = self.state.lock().unwrap();
        state.statements.push(Statement {
            cypher: cypher.to_owned(),
            params: params.clone(),
            mode: self.mode,
        });
        state.results.pop_front().unwrap_or_else(|| Ok(QueryResult::default()))
    }

    async fn commit(self: Box<Self>) -> Result<(), DriverError> {
        self.state.lock().unwrap().commits += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DriverError> {
        self.state.lock().unwrap().rollbacks += 1;
        Ok(())
    }
}

pub(crate) fn library(driver: &RecordingDriver) -> GraphCypher {
    GraphCypher::builder()
        .type_defs(TYPE_DEFS)
        .driver(Arc::new(driver.clone()) as Arc<dyn Driver>)
        .build()
        .unwrap()
}

/// Whether any parameter of a statement, at any depth, is `value`.
pub(crate) fn has_param(params: &Map<String, Value>, value: &Value) -> bool {
    fn contains(candidate: &Value, value: &Value) -> bool {
        candidate == value
            || match candidate {
                Value::Array(items) => items.iter().any(|item| contains(item, value)),
                Value::Object(object) => object.values().any(|item| contains(item, value)),
                _ => false,
            }
    }
    params.values().any(|param| contains(param, value))
}
