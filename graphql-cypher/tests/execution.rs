use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use graphql_cypher::Driver;
use graphql_cypher::CompileError;
use graphql_cypher::DriverError;
use graphql_cypher::FieldResolver;
use graphql_cypher::Features;
use graphql_cypher::GraphCypher;
use graphql_cypher::GraphCypherError;
use graphql_cypher::Request;
use graphql_cypher::RequestContext;
use graphql_cypher::execute::driver::AccessMode;
use graphql_cypher::execute::driver::Counters;
use graphql_cypher::execute::driver::QueryResult;
use graphql_cypher::graphql::Object;
use pretty_assertions::assert_eq;
use serde_json::Value;
use serde_json::json;

use crate::common::RecordingDriver;
use crate::common::TYPE_DEFS;
use crate::common::has_param;
use crate::common::library;

fn request(query: &str) -> Request {
    Request::builder().query(query).build()
}

#[tokio::test]
async fn reads_run_in_one_read_transaction() {
    let driver = RecordingDriver::default();
    driver.respond(vec![json!({ "this": { "title": "Heat" } })]);
    driver.respond(vec![json!({ "this": { "name": "Al Pacino" } })]);
    let schema = library(&driver).schema().unwrap();

    let response = schema
        .execute(
            request(r#"{ movies(where: { title: "Heat" }) { title } actors { name } }"#),
            &RequestContext::default(),
        )
        .await;

    assert!(response.errors.is_empty(), "{:?}", response.errors);
    assert_eq!(
        response.data,
        Some(json!({
            "movies": [{ "title": "Heat" }],
            "actors": [{ "name": "Al Pacino" }],
        }))
    );
    let statements = driver.statements();
    assert_eq!(statements.len(), 2);
    assert!(statements.iter().all(|statement| statement.mode == AccessMode::Read));
    assert!(statements[0].cypher.contains(":Movie"));
    assert!(has_param(&statements[0].params, &json!("Heat")));
    assert_eq!(driver.commits(), 1);
}

#[tokio::test]
async fn user_values_never_reach_the_statement_text() {
    let driver = RecordingDriver::default();
    let schema = library(&driver).schema().unwrap();
    let compiled = schema
        .translate(
            &request(r#"{ movies(where: { title: "x' OR 1=1 //" }) { title } }"#),
            &RequestContext::default(),
        )
        .unwrap();

    assert_eq!(compiled.len(), 1);
    assert!(compiled[0].cypher.starts_with("MATCH"));
    assert!(!compiled[0].cypher.contains("OR 1=1"));
    assert!(has_param(&compiled[0].params, &json!("x' OR 1=1 //")));
    assert!(driver.statements().is_empty());
}

#[tokio::test]
async fn root_typename_needs_no_database() {
    let driver = RecordingDriver::default();
    let schema = library(&driver).schema().unwrap();

    let response = schema
        .execute(request("{ __typename }"), &RequestContext::default())
        .await;

    assert_eq!(response.data, Some(json!({ "__typename": "Query" })));
    assert!(driver.statements().is_empty());
}

#[tokio::test]
async fn invalid_operations_are_rejected_before_compilation() {
    let driver = RecordingDriver::default();
    let schema = library(&driver).schema().unwrap();

    let response = schema
        .execute(request("{ movies { budget } }"), &RequestContext::default())
        .await;

    assert_eq!(response.data, None);
    assert_eq!(response.errors.len(), 1);
    assert_eq!(
        response.errors[0].extensions.get("code"),
        Some(&json!("INVALID_OPERATION"))
    );
    assert!(driver.statements().is_empty());
}

#[tokio::test]
async fn creates_report_counters_and_nodes() {
    let driver = RecordingDriver::default();
    driver.respond_with(QueryResult {
        records: vec![
            json!({ "this": { "movies": { "title": "Heat" } }, "meta": [] })
                .as_object()
                .cloned()
                .unwrap(),
        ],
        counters: Counters {
            nodes_created: 1,
            ..Default::default()
        },
    });
    let schema = library(&driver).schema().unwrap();

    let response = schema
        .execute(
            request(
                r#"mutation {
                    createMovies(input: [{ title: "Heat" }]) {
                        info { nodesCreated }
                        movies { title }
                    }
                }"#,
            ),
            &RequestContext::default(),
        )
        .await;

    assert!(response.errors.is_empty(), "{:?}", response.errors);
    assert_eq!(
        response.data,
        Some(json!({
            "createMovies": {
                "info": { "nodesCreated": 1 },
                "movies": [{ "title": "Heat" }],
            }
        }))
    );
    let statements = driver.statements();
    assert_eq!(statements.len(), 1);
    assert_eq!(statements[0].mode, AccessMode::Write);
    assert!(statements[0].cypher.contains("CREATE"));
    assert_eq!(driver.commits(), 1);
}

#[tokio::test]
async fn deletes_report_counters() {
    let driver = RecordingDriver::default();
    driver.respond_with(QueryResult {
        records: Vec::new(),
        counters: Counters {
            nodes_deleted: 2,
            relationships_deleted: 3,
            ..Default::default()
        },
    });
    let schema = library(&driver).schema().unwrap();

    let response = schema
        .execute(
            request(
                r#"mutation {
                    deleteMovies(where: { released: 1995 }) { nodesDeleted relationshipsDeleted }
                }"#,
            ),
            &RequestContext::default(),
        )
        .await;

    assert!(response.errors.is_empty(), "{:?}", response.errors);
    assert_eq!(
        response.data,
        Some(json!({
            "deleteMovies": { "nodesDeleted": 2, "relationshipsDeleted": 3 }
        }))
    );
    assert!(driver.statements()[0].cypher.contains("DETACH DELETE"));
}

#[tokio::test]
async fn a_failing_mutation_rolls_back_the_whole_request() {
    let driver = RecordingDriver::default();
    driver.respond(vec![]);
    driver.fail(DriverError::with_code("Neo.ClientError.Schema.ConstraintValidationFailed", "already exists"));
    let schema = library(&driver).schema().unwrap();

    let response = schema
        .execute(
            request(
                r#"mutation {
                    first: deleteMovies(where: { title: "Heat" }) { nodesDeleted }
                    second: createMovies(input: [{ title: "Heat" }]) { movies { title } }
                }"#,
            ),
            &RequestContext::default(),
        )
        .await;

    // Both fields are non-null, so the failure nulls the whole response.
    assert_eq!(response.data, Some(Value::Null));
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].message, "already exists");
    assert_eq!(
        response.errors[0].extensions.get("code"),
        Some(&json!("Neo.ClientError.Schema.ConstraintValidationFailed"))
    );
    assert_eq!(driver.commits(), 0);
    assert_eq!(driver.rollbacks(), 1);
}

#[derive(Debug)]
struct Greeter;

#[async_trait]
impl FieldResolver for Greeter {
    async fn resolve(&self, arguments: &Object, _context: &RequestContext) -> Result<Value, String> {
        let name = arguments
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| "missing name".to_owned())?;
        Ok(json!(format!("Hello, {name}!")))
    }
}

#[tokio::test]
async fn custom_fields_without_cypher_use_resolvers() {
    let driver = RecordingDriver::default();
    let library = GraphCypher::builder()
        .type_defs(TYPE_DEFS)
        .driver(Arc::new(driver.clone()) as Arc<dyn Driver>)
        .resolvers(HashMap::from([(
            "greeting".to_owned(),
            Arc::new(Greeter) as Arc<dyn FieldResolver>,
        )]))
        .build()
        .unwrap();
    let schema = library.schema().unwrap();

    let response = schema
        .execute(
            request(r#"{ greeting(name: "Ada") }"#),
            &RequestContext::default(),
        )
        .await;

    assert!(response.errors.is_empty(), "{:?}", response.errors);
    assert_eq!(response.data, Some(json!({ "greeting": "Hello, Ada!" })));
    assert!(driver.statements().is_empty());
}

#[tokio::test]
async fn global_authentication_rejects_anonymous_requests() {
    let driver = RecordingDriver::default();
    let features: Features = "authorization:\n  global_authentication: true".parse().unwrap();
    let library = GraphCypher::builder()
        .type_defs(TYPE_DEFS)
        .driver(Arc::new(driver.clone()) as Arc<dyn Driver>)
        .features(features)
        .build()
        .unwrap();
    let schema = library.schema().unwrap();

    let response = schema
        .execute(request("{ movies { title } }"), &RequestContext::default())
        .await;

    assert_eq!(response.data, Some(Value::Null));
    assert_eq!(
        response.errors[0].extensions.get("code"),
        Some(&json!("UNAUTHENTICATED"))
    );
    assert!(driver.statements().is_empty());
}

#[tokio::test]
async fn failed_validate_rules_surface_as_forbidden() {
    let driver = RecordingDriver::default();
    driver.fail(DriverError::new(
        "Failed to invoke function `apoc.util.validatePredicate`: @graphql-cypher/FORBIDDEN",
    ));
    let library = GraphCypher::builder()
        .type_defs(
            r#"
            type User @authorization(validate: [{ where: { node: { id: "$jwt.sub" } } }]) {
                id: ID!
                name: String
            }
            "#,
        )
        .driver(Arc::new(driver.clone()) as Arc<dyn Driver>)
        .build()
        .unwrap();
    let schema = library.schema().unwrap();
    let context = RequestContext::with_jwt(json!({ "sub": "1" }).as_object().cloned().unwrap());

    let response = schema
        .execute(request("{ users { name } }"), &context)
        .await;

    assert_eq!(response.data, Some(Value::Null));
    assert_eq!(response.errors[0].message, "Forbidden");
    assert_eq!(response.errors[0].extensions.get("code"), Some(&json!("FORBIDDEN")));
    let statements = driver.statements();
    assert!(statements[0].cypher.contains("apoc.util.validatePredicate"));
    assert!(has_param(&statements[0].params, &json!({ "sub": "1" })));
}

#[tokio::test]
async fn cypher_fields_embed_their_statement_with_arguments() {
    let driver = RecordingDriver::default();
    driver.respond(vec![json!({ "this": { "title": "Heat", "score": 50.0 } })]);
    let library = GraphCypher::builder()
        .type_defs(
            r#"
            type Movie {
                title: String
                rating: Float
                score(scale: Int = 10): Float
                    @cypher(statement: "RETURN this.rating * $scale AS score", columnName: "score")
            }
            "#,
        )
        .driver(Arc::new(driver.clone()) as Arc<dyn Driver>)
        .build()
        .unwrap();
    let schema = library.schema().unwrap();

    let response = schema
        .execute(request("{ movies { title score } }"), &RequestContext::default())
        .await;

    assert!(response.errors.is_empty(), "{:?}", response.errors);
    assert_eq!(
        response.data,
        Some(json!({ "movies": [{ "title": "Heat", "score": 50.0 }] }))
    );
    let statements = driver.statements();
    assert!(statements[0].cypher.contains("RETURN this.rating * $scale AS score"));
    assert_eq!(statements[0].params.get("scale"), Some(&json!(10)));
}

#[tokio::test]
async fn root_aggregates_are_computed_in_one_row() {
    let driver = RecordingDriver::default();
    driver.respond(vec![json!({ "this": { "count": 2, "released": { "max": 1995 } } })]);
    let schema = library(&driver).schema().unwrap();

    let response = schema
        .execute(
            request("{ moviesAggregate { count released { max } } }"),
            &RequestContext::default(),
        )
        .await;

    assert!(response.errors.is_empty(), "{:?}", response.errors);
    assert_eq!(
        response.data,
        Some(json!({ "moviesAggregate": { "count": 2, "released": { "max": 1995 } } }))
    );
    let statements = driver.statements();
    assert_eq!(statements.len(), 1);
    assert!(statements[0].cypher.contains("size("), "{}", statements[0].cypher);
    assert!(statements[0].cypher.contains("max(value)"));
}

#[tokio::test]
async fn field_filter_rules_null_the_field_without_errors() {
    let driver = RecordingDriver::default();
    driver.respond(vec![json!({ "this": { "name": "Ada", "password": null } })]);
    let library = GraphCypher::builder()
        .type_defs(
            r#"
            type User {
                name: String
                password: String
                    @authorization(filter: [{ where: { jwt: { roles_INCLUDES: "admin" } } }])
            }
            "#,
        )
        .driver(Arc::new(driver.clone()) as Arc<dyn Driver>)
        .build()
        .unwrap();
    let schema = library.schema().unwrap();
    let context = RequestContext::with_jwt(json!({ "sub": "1", "roles": [] }).as_object().cloned().unwrap());

    let response = schema
        .execute(request("{ users { name password } }"), &context)
        .await;

    assert!(response.errors.is_empty(), "{:?}", response.errors);
    assert_eq!(
        response.data,
        Some(json!({ "users": [{ "name": "Ada", "password": null }] }))
    );
    let cypher = &driver.statements()[0].cypher;
    assert!(cypher.contains("CASE WHEN"), "{cypher}");
    assert!(cypher.contains("ELSE null END"));
}

#[test]
fn all_quantifiers_need_at_least_one_related_node() {
    let driver = RecordingDriver::default();
    let schema = library(&driver).schema().unwrap();
    let compiled = schema
        .translate(
            &request(r#"{ movies(where: { actors_ALL: { name: "Al" } }) { title } }"#),
            &RequestContext::default(),
        )
        .unwrap();

    let cypher = &compiled[0].cypher;
    assert!(cypher.contains("(EXISTS { MATCH (this)<-[:ACTED_IN]-("), "{cypher}");
    assert!(cypher.contains("AND NOT EXISTS { MATCH (this)<-[:ACTED_IN]-("));
    assert!(cypher.contains("WHERE NOT ("));
}

#[test]
fn cursors_past_the_integer_range_are_invalid() {
    let driver = RecordingDriver::default();
    let schema = library(&driver).schema().unwrap();
    let result = schema.translate(
        &request(
            r#"{
                moviesConnection(first: 1, after: "YXJyYXljb25uZWN0aW9uOjE4NDQ2NzQ0MDczNzA5NTUxNjE1") {
                    edges { node { title } }
                }
            }"#,
        ),
        &RequestContext::default(),
    );

    assert!(
        matches!(
            result,
            Err(GraphCypherError::Compile(CompileError::InvalidCursor { .. }))
        ),
        "{result:?}"
    );
}
