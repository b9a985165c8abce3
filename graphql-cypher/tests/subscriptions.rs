use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::BoxStream;
use graphql_cypher::Driver;
use graphql_cypher::DriverError;
use graphql_cypher::ExecutableSchema;
use graphql_cypher::Features;
use graphql_cypher::GraphCypher;
use graphql_cypher::Request;
use graphql_cypher::RequestContext;
use graphql_cypher::Response;
use graphql_cypher::config::SubscriptionsFeature;
use graphql_cypher::execute::driver::Counters;
use graphql_cypher::execute::driver::QueryResult;
use pretty_assertions::assert_eq;
use serde_json::Value;
use serde_json::json;

use crate::common::RecordingDriver;
use crate::common::TYPE_DEFS;

fn schema(driver: &RecordingDriver) -> ExecutableSchema {
    GraphCypher::builder()
        .type_defs(TYPE_DEFS)
        .driver(Arc::new(driver.clone()) as Arc<dyn Driver>)
        .features(Features {
            subscriptions: Some(SubscriptionsFeature::default()),
            ..Default::default()
        })
        .build()
        .unwrap()
        .schema()
        .unwrap()
}

fn created(id: &str, title: &str) -> Value {
    json!({
        "event": "CREATE",
        "id": id,
        "labels": ["Movie"],
        "properties": { "old": null, "new": { "title": title } },
        "timestamp": 1_700_000_000_000_i64,
    })
}

fn deleted(id: &str, label: &str) -> Value {
    json!({
        "event": "DELETE",
        "id": id,
        "labels": [label],
        "properties": { "old": {}, "new": null },
        "timestamp": 1_700_000_000_000_i64,
    })
}

fn unlinked(id: &str, movie: &str) -> Value {
    json!({
        "event": "DELETE_RELATIONSHIP",
        "id": id,
        "relationshipName": "ACTED_IN",
        "fromId": "a1",
        "fromLabels": ["Actor"],
        "toId": movie,
        "toLabels": ["Movie"],
        "properties": { "from": {}, "to": {}, "relationship": {} },
        "timestamp": 1_700_000_000_000_i64,
    })
}

async fn subscribe(schema: &ExecutableSchema, query: &str) -> BoxStream<'static, Response> {
    schema
        .subscribe(Request::builder().query(query).build(), &RequestContext::default())
        .await
        .unwrap()
}

async fn next(stream: &mut BoxStream<'static, Response>) -> Option<Response> {
    tokio::time::timeout(Duration::from_millis(500), stream.next())
        .await
        .ok()
        .flatten()
}

#[tokio::test]
async fn committed_creations_reach_matching_subscribers() {
    let driver = RecordingDriver::default();
    driver.respond(vec![
        json!({ "this": { "movies": { "title": "Heat" } }, "meta": [created("1", "Heat")] }),
        json!({ "this": { "movies": { "title": "Ronin" } }, "meta": [created("2", "Ronin")] }),
    ]);
    let schema = schema(&driver);
    let mut stream = subscribe(
        &schema,
        r#"subscription { movieCreated(where: { title: "Heat" }) { event createdMovie { title } } }"#,
    )
    .await;

    let response = schema
        .execute(
            Request::builder()
                .query(
                    r#"mutation {
                        createMovies(input: [{ title: "Heat" }, { title: "Ronin" }]) {
                            info { nodesCreated }
                        }
                    }"#,
                )
                .build(),
            &RequestContext::default(),
        )
        .await;
    // Counts come from the events rather than the database counters.
    assert_eq!(
        response.data,
        Some(json!({ "createMovies": { "info": { "nodesCreated": 2 } } }))
    );

    let delivered = next(&mut stream).await.unwrap();
    assert_eq!(
        delivered.data,
        Some(json!({
            "movieCreated": { "event": "CREATE", "createdMovie": { "title": "Heat" } }
        }))
    );
    assert!(next(&mut stream).await.is_none());
}

#[tokio::test]
async fn rolled_back_writes_publish_nothing() {
    let driver = RecordingDriver::default();
    driver.respond(vec![
        json!({ "this": { "movies": { "title": "Heat" } }, "meta": [created("1", "Heat")] }),
    ]);
    driver.fail(DriverError::new("connection reset"));
    let schema = schema(&driver);
    let mut stream = subscribe(&schema, "subscription { movieCreated { createdMovie { title } } }").await;

    let response = schema
        .execute(
            Request::builder()
                .query(
                    r#"mutation {
                        first: createMovies(input: [{ title: "Heat" }]) { movies { title } }
                        second: createMovies(input: [{ title: "Ronin" }]) { movies { title } }
                    }"#,
                )
                .build(),
            &RequestContext::default(),
        )
        .await;

    assert_eq!(response.errors.len(), 1);
    assert_eq!(driver.rollbacks(), 1);
    assert!(next(&mut stream).await.is_none());
}

#[tokio::test]
async fn subscriptions_need_the_feature() {
    let driver = RecordingDriver::default();
    let schema = crate::common::library(&driver).schema().unwrap();

    let error = schema
        .subscribe(
            Request::builder()
                .query("subscription { movieCreated { createdMovie { title } } }")
                .build(),
            &RequestContext::default(),
        )
        .await
        .err()
        .unwrap();

    assert_eq!(error.data, None);
    assert_eq!(error.errors.len(), 1);
}

#[tokio::test]
async fn cascading_deletes_count_each_removal_once() {
    let driver = RecordingDriver::default();
    let records = [
        json!({ "meta": [deleted("a1", "Actor"), unlinked("r1", "m1"), deleted("m1", "Movie")] }),
        json!({ "meta": [deleted("a1", "Actor"), unlinked("r2", "m2"), deleted("m2", "Movie")] }),
    ];
    driver.respond_with(QueryResult {
        records: records
            .iter()
            .filter_map(|record| record.as_object().cloned())
            .collect(),
        counters: Counters {
            nodes_deleted: 7,
            relationships_deleted: 9,
            ..Default::default()
        },
    });
    let schema = schema(&driver);

    let response = schema
        .execute(
            Request::builder()
                .query(
                    r#"mutation {
                        deleteMovies(
                            where: { title: "Heat" }
                            delete: { actors: [{ where: { node: { name: "Al" } } }] }
                        ) { nodesDeleted relationshipsDeleted }
                    }"#,
                )
                .build(),
            &RequestContext::default(),
        )
        .await;

    assert!(response.errors.is_empty(), "{:?}", response.errors);
    assert_eq!(
        response.data,
        Some(json!({ "deleteMovies": { "nodesDeleted": 3, "relationshipsDeleted": 2 } }))
    );
}
