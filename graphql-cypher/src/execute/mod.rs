//! Execution of GraphQL requests against the generated schema.
//!
//! [`GraphCypher`] is built from the type definitions, a [`Driver`] and the optional features.
//! It hands out [`ExecutableSchema`]s: the plain schema, or the variant served as a federation
//! subgraph. Each root field of an operation is either answered directly (`__typename`,
//! `_service`), handed to an injected [`FieldResolver`], or compiled into one Cypher statement
//! and run through the driver.
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::OnceLock;

use apollo_compiler::ExecutableDocument;
use apollo_compiler::Name;
use apollo_compiler::Schema;
use apollo_compiler::executable::Operation;
use apollo_compiler::executable::OperationType;
use apollo_compiler::validation::Valid;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde_json::Map;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;
use tracing::instrument;
use tracing::trace;

pub mod driver;

use driver::Counters;
use driver::Driver;
use driver::FieldResolver;
use driver::QueryResult;
use driver::Transaction;

use crate::auth;
use crate::auth::rules::AuthorizationOperation;
use crate::config::Features;
use crate::config::RequestContext;
use crate::config::TransactionScope;
use crate::error::CompileError;
use crate::error::GraphCypherError;
use crate::error::ValidationErrors;
use crate::graphql::Error;
use crate::graphql::PathElement;
use crate::graphql::Request;
use crate::graphql::Response;
use crate::model::TypeModel;
use crate::schema;
use crate::schema::AugmentedSchema;
use crate::subscriptions::BroadcastEngine;
use crate::subscriptions::MutationEvent;
use crate::subscriptions::SubscriptionsEngine;
use crate::subscriptions::event;
use crate::subscriptions::fanout;
use crate::subscriptions::fanout::Subscriber;
use crate::subscriptions::fanout::SubscriptionFanout;
use crate::translate::CompiledOperation;
use crate::translate::RootField;
use crate::translate::Translator;
use crate::translate::projection::TYPENAME;
use crate::translate::selection::SelectedField;
use crate::translate::selection::SelectionSet;
use crate::translate::selection::value_to_json;
use crate::translate::shape;
use crate::translate::shape::MutationField;
use crate::translate::shape::RootShape;

/// The library entry point: the type model of a set of type definitions, bound to a database.
pub struct GraphCypher {
    model: Arc<TypeModel>,
    features: Arc<Features>,
    driver: Arc<dyn Driver>,
    resolvers: Arc<HashMap<String, Arc<dyn FieldResolver>>>,
    engine: Option<Arc<dyn SubscriptionsEngine>>,
}

impl fmt::Debug for GraphCypher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphCypher")
            .field("features", &self.features)
            .field("resolvers", &self.resolvers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[buildstructor::buildstructor]
impl GraphCypher {
    /// Builds the type model of `type_defs`.
    ///
    /// `resolvers` are keyed by the name of the `Query` or `Mutation` field they resolve. When
    /// subscriptions are enabled and no engine is given, events stay in process.
    #[builder(visibility = "pub")]
    fn new(
        type_defs: String,
        driver: Arc<dyn Driver>,
        features: Option<Features>,
        resolvers: HashMap<String, Arc<dyn FieldResolver>>,
        subscriptions_engine: Option<Arc<dyn SubscriptionsEngine>>,
    ) -> Result<Self, ValidationErrors> {
        let model = TypeModel::build(&type_defs)?;
        let features = features.unwrap_or_default();
        let engine = features.subscriptions.as_ref().map(|_| {
            subscriptions_engine
                .unwrap_or_else(|| Arc::new(BroadcastEngine::default()) as Arc<dyn SubscriptionsEngine>)
        });
        Ok(Self {
            model: Arc::new(model),
            features: Arc::new(features),
            driver,
            resolvers: Arc::new(resolvers),
            engine,
        })
    }
}

impl GraphCypher {
    pub fn model(&self) -> &TypeModel {
        &self.model
    }

    /// The generated schema.
    pub fn schema(&self) -> Result<ExecutableSchema, ValidationErrors> {
        self.executable(false)
    }

    /// The generated schema with the federation entry points, to be served as a subgraph.
    pub fn subgraph_schema(&self) -> Result<ExecutableSchema, ValidationErrors> {
        self.executable(true)
    }

    fn executable(&self, subgraph: bool) -> Result<ExecutableSchema, ValidationErrors> {
        let augmented = schema::augment(&self.model, &self.features, subgraph)?;
        Ok(ExecutableSchema {
            inner: Arc::new(Inner {
                augmented,
                fanout: Arc::new(SubscriptionFanout::new(self.model.clone())),
                model: self.model.clone(),
                features: self.features.clone(),
                driver: self.driver.clone(),
                resolvers: self.resolvers.clone(),
                engine: self.engine.clone(),
                pump: OnceLock::new(),
            }),
        })
    }
}

struct Inner {
    augmented: AugmentedSchema,
    model: Arc<TypeModel>,
    features: Arc<Features>,
    driver: Arc<dyn Driver>,
    resolvers: Arc<HashMap<String, Arc<dyn FieldResolver>>>,
    engine: Option<Arc<dyn SubscriptionsEngine>>,
    fanout: Arc<SubscriptionFanout>,
    /// Forwards engine events to the subscribers of this schema, started by the first
    /// subscription.
    pump: OnceLock<JoinHandle<()>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.get() {
            pump.abort();
        }
    }
}

/// A generated schema, ready to execute requests. Cheap to clone.
#[derive(Clone)]
pub struct ExecutableSchema {
    inner: Arc<Inner>,
}

impl fmt::Debug for ExecutableSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutableSchema").finish_non_exhaustive()
    }
}

/// The root field of a validated operation, with what it maps to.
struct PlannedField {
    field: SelectedField,
    root: RootField,
    non_null: bool,
}

/// Records and the mutation events they carry.
struct FieldResult {
    value: Value,
    events: Vec<event::EventRecord>,
}

fn field_path(field: &SelectedField) -> Vec<PathElement> {
    vec![PathElement::Key(field.response_key.clone())]
}

fn error_response(error: &GraphCypherError) -> Response {
    Response::builder()
        .error(Error::from_error(error, Vec::new()))
        .build()
}

impl ExecutableSchema {
    pub fn schema(&self) -> &Valid<Schema> {
        &self.inner.augmented.schema
    }

    /// The printed schema.
    pub fn sdl(&self) -> String {
        self.inner.augmented.schema.to_string()
    }

    /// Parses and validates an operation, and resolves the root fields it selects.
    fn plan(
        &self,
        request: &Request,
    ) -> Result<(OperationType, Vec<PlannedField>), GraphCypherError> {
        let schema = &self.inner.augmented.schema;
        let document = ExecutableDocument::parse_and_validate(schema, &request.query, "request.graphql")
            .map_err(|errors| CompileError::InvalidOperation {
                message: errors.errors.to_string(),
            })?;
        let operation = document
            .operations
            .get(request.operation_name.as_deref())
            .map_err(|_| CompileError::InvalidOperation {
                message: "no operation matches the requested operation name".to_owned(),
            })?;
        let variables = coerce_variables(operation, &request.variables)?;
        let selection = SelectionSet::from_executable(&document, &operation.selection_set, &variables)?;
        let root_type = &operation.selection_set.ty;
        let mut planned = Vec::new();
        for field in selection.fields() {
            let root = self.root_field(operation.operation_type, &field)?;
            let non_null = schema
                .type_field(root_type, &field.name)
                .is_ok_and(|definition| definition.ty.is_non_null());
            planned.push(PlannedField {
                field,
                root,
                non_null,
            });
        }
        Ok((operation.operation_type, planned))
    }

    fn root_field(&self, operation_type: OperationType, field: &SelectedField) -> Result<RootField, CompileError> {
        if field.name == TYPENAME {
            return Ok(RootField::Typename);
        }
        let augmented = &self.inner.augmented;
        let fields = match operation_type {
            OperationType::Query => &augmented.queries,
            OperationType::Mutation => &augmented.mutations,
            OperationType::Subscription => {
                return Err(CompileError::InvalidOperation {
                    message: "subscriptions are served by `subscribe`".to_owned(),
                });
            }
        };
        fields
            .get(&field.name)
            .cloned()
            .ok_or_else(|| CompileError::UnknownRootField {
                type_name: operation_type.default_type_name().clone(),
                field: field.name.to_string(),
            })
    }

    fn translator<'a>(&'a self, context: &'a RequestContext) -> Translator<'a> {
        Translator::new(&self.inner.model, &self.inner.features, context)
    }

    /// Compiles the root fields of a request without running them. Fields that are not backed
    /// by Cypher are skipped.
    pub fn translate(
        &self,
        request: &Request,
        context: &RequestContext,
    ) -> Result<Vec<CompiledOperation>, GraphCypherError> {
        let (_, planned) = self.plan(request)?;
        let mut compiled = Vec::new();
        for PlannedField { field, root, .. } in planned {
            match root {
                RootField::Typename | RootField::Resolver(_) | RootField::Service => {}
                RootField::Entities => {
                    for representation in representations(&field)? {
                        compiled.push(self.translator(context).compile_entity(representation, &field.selection)?);
                    }
                }
                root => compiled.push(self.translator(context).compile(&root, &field)?),
            }
        }
        Ok(compiled)
    }

    /// Executes a query or mutation.
    #[instrument(skip_all, fields(operation = request.operation_name.as_deref().unwrap_or_default()))]
    pub async fn execute(&self, request: Request, context: &RequestContext) -> Response {
        let (operation_type, planned) = match self.plan(&request) {
            Ok(plan) => plan,
            Err(error) => {
                debug!(%error, "invalid request");
                return error_response(&error);
            }
        };
        let mut data = Map::new();
        let mut errors = Vec::new();
        let mut nulled = false;
        let results = match operation_type {
            OperationType::Mutation => self.execute_mutation(&planned, context).await,
            _ => self.execute_query(&planned, context).await,
        };
        for (planned, result) in planned.iter().zip(results) {
            let value = match result {
                Ok(value) => value,
                Err(error) => {
                    debug!(field = %planned.field.name, %error, "root field failed");
                    errors.push(Error::from_error(&error, field_path(&planned.field)));
                    nulled |= planned.non_null;
                    Value::Null
                }
            };
            data.insert(planned.field.response_key.clone(), value);
        }
        let data = if nulled { Value::Null } else { Value::Object(data) };
        Response::builder().data(data).errors(errors).build()
    }

    /// Runs the root fields of a query, sharing one read transaction. A failed statement rolls
    /// the transaction back; the next field opens a new one.
    async fn execute_query(
        &self,
        planned: &[PlannedField],
        context: &RequestContext,
    ) -> Vec<Result<Value, GraphCypherError>> {
        let mut transaction: Option<Box<dyn Transaction>> = None;
        let mut results = Vec::new();
        for PlannedField { field, root, .. } in planned {
            let result = match root {
                RootField::Typename => Ok(Value::String("Query".to_owned())),
                RootField::Service => Ok(self.service(field)),
                RootField::Resolver(name) => self.resolve(name, field, context).await,
                RootField::Entities => self.entities(field, context, &mut transaction).await,
                root => match self.translator(context).compile(root, field) {
                    Ok(compiled) => self
                        .run(&compiled, context, &mut transaction)
                        .await
                        .map(|result| self.shape(&compiled, result).value),
                    Err(error) => Err(error),
                },
            };
            if result.is_err() {
                if let Some(transaction) = transaction.take() {
                    rollback(transaction).await;
                }
            }
            results.push(result);
        }
        if let Some(transaction) = transaction {
            if let Err(error) = transaction.commit().await {
                debug!(%error, "failed to close read transaction");
            }
        }
        results
    }

    /// Runs the root fields of a mutation one after another.
    ///
    /// With one transaction per request, a failing field rolls back every field before it,
    /// and the fields after it do not run. With one transaction per field, every field
    /// commits on its own.
    async fn execute_mutation(
        &self,
        planned: &[PlannedField],
        context: &RequestContext,
    ) -> Vec<Result<Value, GraphCypherError>> {
        let scope = self.inner.features.execution.transaction_scope;
        let mut transaction: Option<Box<dyn Transaction>> = None;
        let mut results: Vec<Result<Value, GraphCypherError>> = Vec::new();
        let mut pending_events = Vec::new();
        let mut failed = false;
        for PlannedField { field, root, .. } in planned {
            if failed {
                results.push(Ok(Value::Null));
                continue;
            }
            let result = match root {
                RootField::Typename => Ok(Value::String("Mutation".to_owned())),
                RootField::Resolver(name) => self.resolve(name, field, context).await,
                root => match self.translator(context).compile(root, field) {
                    Ok(compiled) => match self.run(&compiled, context, &mut transaction).await {
                        Ok(result) => {
                            let FieldResult { value, events } = self.shape(&compiled, result);
                            pending_events.extend(events);
                            Ok(value)
                        }
                        Err(error) => Err(error),
                    },
                    Err(error) => Err(error),
                },
            };
            match (&result, scope) {
                (Err(_), TransactionScope::Request) => {
                    if let Some(transaction) = transaction.take() {
                        rollback(transaction).await;
                    }
                    pending_events.clear();
                    // Everything written before the failure is gone.
                    for earlier in results.iter_mut() {
                        *earlier = Ok(Value::Null);
                    }
                    failed = true;
                }
                (Err(_), TransactionScope::Field) => {
                    if let Some(transaction) = transaction.take() {
                        rollback(transaction).await;
                    }
                    pending_events.clear();
                }
                (Ok(_), TransactionScope::Field) => {
                    if let Err(error) = self.commit(&mut transaction, &mut pending_events).await {
                        results.push(Err(error));
                        continue;
                    }
                }
                (Ok(_), TransactionScope::Request) => {}
            }
            results.push(result);
        }
        if !failed {
            if let Err(error) = self.commit(&mut transaction, &mut pending_events).await {
                // The commit failed: nothing was written.
                for result in results.iter_mut() {
                    *result = Ok(Value::Null);
                }
                if let Some(last) = results.last_mut() {
                    *last = Err(error);
                }
            }
        }
        results
    }

    /// Commits the open transaction, if any, then publishes its events.
    async fn commit(
        &self,
        transaction: &mut Option<Box<dyn Transaction>>,
        events: &mut Vec<event::EventRecord>,
    ) -> Result<(), GraphCypherError> {
        let records = std::mem::take(events);
        let Some(transaction) = transaction.take() else {
            return Ok(());
        };
        transaction.commit().await?;
        if let Some(engine) = &self.inner.engine {
            for record in records {
                if let Some(event) = MutationEvent::from_record(&self.inner.model, record) {
                    crate::utils::logging::snapshot!(event, "publishing mutation event");
                    engine.publish(event).await;
                }
            }
        }
        Ok(())
    }

    /// Runs a compiled statement in the open transaction, opening one if needed.
    async fn run(
        &self,
        compiled: &CompiledOperation,
        context: &RequestContext,
        transaction: &mut Option<Box<dyn Transaction>>,
    ) -> Result<QueryResult, GraphCypherError> {
        if transaction.is_none() {
            *transaction = Some(self.inner.driver.begin(compiled.mode, &context.session).await?);
        }
        let Some(open) = transaction.as_mut() else {
            return Err(CompileError::InvalidOperation {
                message: "no open transaction".to_owned(),
            }
            .into());
        };
        debug!(cypher = %compiled.cypher, "running statement");
        let params = Value::Object(compiled.params.clone());
        trace!(params = %params, "statement parameters");
        Ok(open.run(&compiled.cypher, &compiled.params).await?)
    }

    /// Turns the records of a statement into the value of its root field.
    fn shape(&self, compiled: &CompiledOperation, result: QueryResult) -> FieldResult {
        let events = event::parse_records(result.records.iter().filter_map(|record| record.get("meta")));
        let counts = if self.inner.features.subscriptions.is_some() {
            event::count(&events)
        } else {
            result.counters
        };
        let value = match &compiled.shape {
            RootShape::Rows { shape, list } => {
                let mut rows = result
                    .records
                    .into_iter()
                    .map(|mut record| shape::reshape(record.remove("this").unwrap_or_default(), shape));
                if *list {
                    Value::Array(rows.collect())
                } else {
                    rows.next().unwrap_or_default()
                }
            }
            RootShape::Mutation(fields) => mutation_response(fields, &result.records, counts),
            RootShape::Delete(fields) => shape::info(fields, counts),
        };
        FieldResult { value, events }
    }

    async fn resolve(
        &self,
        name: &Name,
        field: &SelectedField,
        context: &RequestContext,
    ) -> Result<Value, GraphCypherError> {
        auth::check_global_authentication(&self.inner.features, context)?;
        let resolver = self
            .inner
            .resolvers
            .get(name.as_str())
            .ok_or_else(|| GraphCypherError::Resolver {
                message: format!("no resolver for field \"{name}\""),
            })?;
        resolver
            .resolve(&field.arguments, context)
            .await
            .map_err(|message| GraphCypherError::Resolver { message })
    }

    fn service(&self, field: &SelectedField) -> Value {
        let mut result = Map::new();
        for selected in field.selection.fields() {
            let value = match selected.name.as_str() {
                TYPENAME => Value::String("_Service".to_owned()),
                "sdl" => Value::String(self.inner.augmented.service_sdl.clone()),
                _ => Value::Null,
            };
            result.insert(selected.response_key, value);
        }
        Value::Object(result)
    }

    /// `_entities`: one read per representation, in order.
    async fn entities(
        &self,
        field: &SelectedField,
        context: &RequestContext,
        transaction: &mut Option<Box<dyn Transaction>>,
    ) -> Result<Value, GraphCypherError> {
        let mut entities = Vec::new();
        for representation in representations(field)? {
            let compiled = self
                .translator(context)
                .compile_entity(representation, &field.selection)?;
            let result = self.run(&compiled, context, transaction).await?;
            entities.push(self.shape(&compiled, result).value);
        }
        Ok(Value::Array(entities))
    }

    /// Registers a subscription. The returned stream yields one response per matching event
    /// and ends when the schema is dropped.
    #[instrument(skip_all)]
    pub async fn subscribe(
        &self,
        request: Request,
        context: &RequestContext,
    ) -> Result<BoxStream<'static, Response>, Response> {
        self.register(&request, context)
            .await
            .map_err(|error| error_response(&error))
    }

    async fn register(
        &self,
        request: &Request,
        context: &RequestContext,
    ) -> Result<BoxStream<'static, Response>, GraphCypherError> {
        let (Some(engine), Some(settings)) = (&self.inner.engine, &self.inner.features.subscriptions) else {
            return Err(CompileError::InvalidOperation {
                message: "subscriptions are not enabled".to_owned(),
            }
            .into());
        };
        let schema = &self.inner.augmented.schema;
        let document = ExecutableDocument::parse_and_validate(schema, &request.query, "request.graphql")
            .map_err(|errors| CompileError::InvalidOperation {
                message: errors.errors.to_string(),
            })?;
        let operation = document
            .operations
            .get(request.operation_name.as_deref())
            .map_err(|_| CompileError::InvalidOperation {
                message: "no operation matches the requested operation name".to_owned(),
            })?;
        if operation.operation_type != OperationType::Subscription {
            return Err(CompileError::InvalidOperation {
                message: "expected a subscription".to_owned(),
            }
            .into());
        }
        let variables = coerce_variables(operation, &request.variables)?;
        let selection = SelectionSet::from_executable(&document, &operation.selection_set, &variables)?;
        let Some(field) = selection.fields().into_iter().next() else {
            return Err(CompileError::InvalidOperation {
                message: "a subscription selects one root field".to_owned(),
            }
            .into());
        };
        let (type_name, kind) = self
            .inner
            .augmented
            .subscriptions
            .get(&field.name)
            .cloned()
            .ok_or_else(|| CompileError::UnknownRootField {
                type_name: OperationType::Subscription.default_type_name().clone(),
                field: field.name.to_string(),
            })?;
        let model = &self.inner.model;
        let concept = model.concept(&type_name).ok_or_else(|| CompileError::UnknownRootField {
            type_name: OperationType::Subscription.default_type_name().clone(),
            field: field.name.to_string(),
        })?;
        auth::check_global_authentication(&self.inner.features, context)?;
        auth::authenticate(
            concept.authentication.as_ref(),
            AuthorizationOperation::Subscribe,
            context,
        )?;
        let filter = fanout::parse_where(model, concept, kind, field.argument("where"))?;

        let (sender, receiver) = mpsc::channel(settings.subscriber_buffer.max(1));
        self.inner
            .fanout
            .register(Subscriber {
                type_name,
                kind,
                response_key: field.response_key,
                filter,
                selection: field.selection,
                jwt: context.jwt.clone(),
                sender,
            })
            .await;
        self.inner.pump.get_or_init(|| {
            let mut events = engine.subscribe();
            let fanout = self.inner.fanout.clone();
            tokio::spawn(async move {
                while let Some(event) = events.next().await {
                    fanout.dispatch(&event).await;
                }
            })
        });
        debug!(subscription = %field.name, "subscriber registered");
        Ok(ReceiverStream::new(receiver).boxed())
    }
}

async fn rollback(transaction: Box<dyn Transaction>) {
    if let Err(error) = transaction.rollback().await {
        debug!(%error, "rollback failed");
    }
}

fn representations(field: &SelectedField) -> Result<Vec<&Map<String, Value>>, CompileError> {
    let invalid = || CompileError::InvalidArgument {
        key: "representations".to_owned(),
        message: "expected a list of objects".to_owned(),
    };
    match field.argument("representations") {
        Some(Value::Array(items)) => items.iter().map(|item| item.as_object().ok_or_else(invalid)).collect(),
        _ => Err(invalid()),
    }
}

/// A create or update response: one node per record, in record order.
fn mutation_response(
    fields: &[(String, MutationField)],
    records: &[Map<String, Value>],
    counts: Counters,
) -> Value {
    let mut response = Map::new();
    for (key, field) in fields {
        let value = match field {
            MutationField::Typename(name) => Value::String(name.to_string()),
            MutationField::Info(fields) => shape::info(fields, counts),
            MutationField::Nodes(node_shape) => Value::Array(
                records
                    .iter()
                    .filter_map(|record| record.get("this")?.get(key).cloned())
                    .map(|node| shape::reshape(node, node_shape))
                    .collect(),
            ),
        };
        response.insert(key.clone(), value);
    }
    Value::Object(response)
}

/// Applies variable defaults. A required variable with neither a value nor a default is an
/// error.
fn coerce_variables(operation: &Operation, provided: &Map<String, Value>) -> Result<Map<String, Value>, CompileError> {
    let mut variables = Map::new();
    for definition in &operation.variables {
        let value = match (provided.get(definition.name.as_str()), &definition.default_value) {
            (Some(value), _) => value.clone(),
            (None, Some(default)) => value_to_json(default, &Map::new())?,
            (None, None) if definition.ty.is_non_null() => {
                return Err(CompileError::MissingVariable {
                    name: definition.name.clone(),
                });
            }
            (None, None) => continue,
        };
        variables.insert(definition.name.to_string(), value);
    }
    Ok(variables)
}

#[cfg(test)]
mod tests {
    use apollo_compiler::name;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::translate::shape::InfoField;
    use crate::translate::shape::Shape;

    #[test]
    fn mutation_responses_collect_one_node_per_record() {
        let fields = vec![
            (
                "__typename".to_owned(),
                MutationField::Typename(name!("CreateMoviesMutationResponse")),
            ),
            (
                "info".to_owned(),
                MutationField::Info(vec![("nodesCreated".to_owned(), InfoField::NodesCreated)]),
            ),
            ("movies".to_owned(), MutationField::Nodes(Shape::Value)),
        ];
        let records = vec![
            json!({ "this": { "movies": { "title": "Heat" } }, "meta": [] }),
            json!({ "this": { "movies": { "title": "Ronin" } }, "meta": [] }),
        ]
        .into_iter()
        .filter_map(|record| record.as_object().cloned())
        .collect::<Vec<_>>();
        let counts = Counters {
            nodes_created: 2,
            ..Default::default()
        };
        assert_eq!(
            mutation_response(&fields, &records, counts),
            json!({
                "__typename": "CreateMoviesMutationResponse",
                "info": { "nodesCreated": 2 },
                "movies": [{ "title": "Heat" }, { "title": "Ronin" }],
            })
        );
    }
}
