use graphql_cypher::Request;
use graphql_cypher::RequestContext;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common::RecordingDriver;
use crate::common::has_param;
use crate::common::library;

#[tokio::test]
async fn service_sdl_is_the_subgraph_schema_without_entry_points() {
    let driver = RecordingDriver::default();
    let schema = library(&driver).subgraph_schema().unwrap();

    let response = schema
        .execute(
            Request::builder().query("{ _service { sdl } }").build(),
            &RequestContext::default(),
        )
        .await;

    let sdl = response
        .data
        .as_ref()
        .and_then(|data| data["_service"]["sdl"].as_str())
        .unwrap()
        .to_owned();
    assert!(sdl.contains(r#"type Movie @key(fields: "id")"#));
    assert!(!sdl.contains("_entities"));
    assert!(schema.sdl().contains("_entities"));
    assert!(driver.statements().is_empty());
}

#[tokio::test]
async fn plain_schemas_drop_federation_directives() {
    let driver = RecordingDriver::default();
    let sdl = library(&driver).schema().unwrap().sdl();

    assert!(!sdl.contains("@key"));
    assert!(!sdl.contains("_service"));
}

#[tokio::test]
async fn entities_are_read_by_key() {
    let driver = RecordingDriver::default();
    driver.respond(vec![json!({ "this": { "title": "Heat" } })]);
    driver.respond(vec![]);
    let schema = library(&driver).subgraph_schema().unwrap();

    let variables = json!({
        "representations": [
            { "__typename": "Movie", "id": "1" },
            { "__typename": "Movie", "id": "2" },
        ]
    });
    let response = schema
        .execute(
            Request::builder()
                .query(
                    r#"query ($representations: [_Any!]!) {
                        _entities(representations: $representations) { ... on Movie { title } }
                    }"#,
                )
                .variables(variables.as_object().cloned().unwrap())
                .build(),
            &RequestContext::default(),
        )
        .await;

    assert!(response.errors.is_empty(), "{:?}", response.errors);
    assert_eq!(
        response.data,
        Some(json!({ "_entities": [{ "title": "Heat" }, null] }))
    );
    let statements = driver.statements();
    assert_eq!(statements.len(), 2);
    assert!(has_param(&statements[0].params, &json!("1")));
    assert!(has_param(&statements[1].params, &json!("2")));
}
