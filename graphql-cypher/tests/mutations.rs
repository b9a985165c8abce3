use std::sync::Arc;

use graphql_cypher::CompiledOperation;
use graphql_cypher::Driver;
use graphql_cypher::GraphCypher;
use graphql_cypher::Request;
use graphql_cypher::RequestContext;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common::RecordingDriver;
use crate::common::has_param;

const TYPE_DEFS: &str = r#"
    type Movie {
        id: ID! @id
        title: String
        views: Int
        tags: [String!]
        actors: [Actor!]! @relationship(type: "ACTED_IN", direction: IN)
    }

    type Actor {
        id: ID! @id
        name: String
        movies: [Movie!]! @relationship(type: "ACTED_IN", direction: OUT)
    }
"#;

fn compile_with(type_defs: &str, query: &str, context: &RequestContext) -> CompiledOperation {
    let driver = RecordingDriver::default();
    let schema = GraphCypher::builder()
        .type_defs(type_defs)
        .driver(Arc::new(driver) as Arc<dyn Driver>)
        .build()
        .unwrap()
        .schema()
        .unwrap();
    let mut compiled = schema
        .translate(&Request::builder().query(query).build(), context)
        .unwrap();
    assert_eq!(compiled.len(), 1);
    compiled.remove(0)
}

fn compile(query: &str) -> CompiledOperation {
    compile_with(TYPE_DEFS, query, &RequestContext::default())
}

fn position(cypher: &str, needle: &str) -> usize {
    cypher
        .find(needle)
        .unwrap_or_else(|| panic!("{needle:?} not found in\n{cypher}"))
}

#[test]
fn update_operators_write_in_place() {
    let compiled = compile(
        r#"mutation {
            updateMovies(where: { title: "Heat" }, update: { views_INCREMENT: 2, tags_PUSH: ["noir"] }) {
                movies { title }
            }
        }"#,
    );

    assert!(compiled.cypher.contains("this.views = this.views + $param"), "{}", compiled.cypher);
    assert!(
        compiled.cypher.contains("this.tags = coalesce(this.tags, []) + $param"),
        "{}",
        compiled.cypher
    );
    assert!(has_param(&compiled.params, &json!(2)));
    assert!(has_param(&compiled.params, &json!(["noir"])));
}

#[test]
fn popping_nothing_keeps_the_list() {
    let compiled = compile(
        r#"mutation {
            updateMovies(where: { title: "Heat" }, update: { tags_POP: 0 }) { movies { title } }
        }"#,
    );

    assert!(compiled.cypher.contains("THEN this.tags[0..-$param"), "{}", compiled.cypher);
    assert!(compiled.cypher.contains("ELSE this.tags END"), "{}", compiled.cypher);
    assert!(has_param(&compiled.params, &json!(0)));
}

#[test]
fn connect_skips_existing_relationships_unless_duplicates_are_asked_for() {
    let connect = |as_duplicate: bool| {
        compile(&format!(
            r#"mutation {{
                createMovies(input: [{{
                    title: "Heat"
                    actors: {{ connect: [{{ where: {{ node: {{ name: "Al" }} }}, asDuplicate: {as_duplicate} }}] }}
                }}]) {{ movies {{ title }} }}
            }}"#
        ))
    };

    let single = connect(false);
    assert!(single.cypher.contains("WHERE NOT EXISTS { MATCH ("), "{}", single.cypher);
    assert!(single.cypher.contains(":ACTED_IN]-("));
    assert!(has_param(&single.params, &json!("Al")));

    let duplicate = connect(true);
    assert!(!duplicate.cypher.contains("WHERE NOT EXISTS"), "{}", duplicate.cypher);
    assert!(duplicate.cypher.contains(":ACTED_IN]-("));
}

#[test]
fn connect_or_create_merges_on_unique_fields() {
    let compiled = compile(
        r#"mutation {
            createActors(input: [{
                name: "Al"
                movies: {
                    connectOrCreate: [{ where: { node: { id: "m1" } }, onCreate: { node: { title: "Heat" } } }]
                }
            }]) { actors { name } }
        }"#,
    );

    assert!(compiled.cypher.contains(":Movie { id: $param"), "{}", compiled.cypher);
    assert!(compiled.cypher.contains("ON CREATE SET"));
    let merges = compiled
        .cypher
        .lines()
        .filter(|line| line.trim_start().starts_with("MERGE "))
        .count();
    assert_eq!(merges, 2);
    // The merged key is never overwritten by a generated id.
    assert!(
        compiled
            .cypher
            .lines()
            .filter(|line| line.trim_start().starts_with("ON CREATE SET"))
            .all(|line| !line.contains(".id =")),
        "{}",
        compiled.cypher
    );
    assert!(has_param(&compiled.params, &json!("m1")));
    assert!(has_param(&compiled.params, &json!("Heat")));
}

#[test]
fn nested_updates_run_in_a_fixed_order() {
    let compiled = compile(
        r#"mutation {
            updateMovies(
                where: { title: "Heat" }
                update: {
                    actors: [{
                        delete: [{ where: { node: { name: "Tom" } } }]
                        create: [{ node: { name: "Val" } }]
                        where: { node: { name: "Al" } }
                        update: { node: { name: "Al Pacino" } }
                    }]
                }
            ) { movies { title } }
        }"#,
    );

    let update = position(&compiled.cypher, "SET this");
    let create = position(&compiled.cypher, "CREATE (");
    let delete = position(&compiled.cypher, "DETACH DELETE");
    assert!(update < create && create < delete, "{}", compiled.cypher);
    for value in ["Heat", "Tom", "Val", "Al", "Al Pacino"] {
        assert!(has_param(&compiled.params, &json!(value)), "{value}");
    }
}

#[test]
fn nested_deletes_run_before_their_parent() {
    let compiled = compile(
        r#"mutation {
            deleteMovies(
                where: { title: "Heat" }
                delete: { actors: [{ where: { node: { name: "Al" } } }] }
            ) { nodesDeleted }
        }"#,
    );

    assert_eq!(compiled.cypher.matches("DETACH DELETE").count(), 2);
    assert!(position(&compiled.cypher, "CALL {") < position(&compiled.cypher, "DETACH DELETE this\n"));
    assert!(has_param(&compiled.params, &json!("Al")));
}

#[test]
fn nested_creates_build_the_whole_tree_in_one_statement() {
    let compiled = compile(
        r#"mutation {
            createMovies(input: [{
                title: "Heat"
                actors: { create: [{ node: { name: "Al", movies: { create: [{ node: { title: "Ronin" } }] } } }] }
            }]) { movies { title } }
        }"#,
    );

    assert_eq!(compiled.cypher.matches("CREATE (this").count(), 5, "{}", compiled.cypher);
    assert_eq!(compiled.cypher.matches(":ACTED_IN]").count(), 2);
    for value in ["Heat", "Al", "Ronin"] {
        assert!(has_param(&compiled.params, &json!(value)), "{value}");
    }
}

#[test]
fn rules_checked_after_a_nested_create_see_the_new_relationship() {
    let type_defs = r#"
        type Movie {
            title: String
            actors: [Actor!]! @relationship(type: "ACTED_IN", direction: IN)
        }

        type Actor @authorization(
            validate: [{ operations: [CREATE], when: [AFTER], where: { node: { movies_SOME: { title: "Heat" } } } }]
        ) {
            name: String
            movies: [Movie!]! @relationship(type: "ACTED_IN", direction: OUT)
        }
    "#;
    let context = RequestContext::with_jwt(json!({ "sub": "1" }).as_object().cloned().unwrap());
    let compiled = compile_with(
        type_defs,
        r#"mutation {
            createMovies(input: [{ title: "Heat", actors: { create: [{ node: { name: "Al" } }] } }]) {
                movies { title }
            }
        }"#,
        &context,
    );

    let lines: Vec<&str> = compiled.cypher.lines().map(str::trim).collect();
    let relationship = lines
        .iter()
        .position(|line| line.starts_with("CREATE (") && line.contains(":ACTED_IN]"))
        .unwrap();
    let validation = lines
        .iter()
        .position(|line| line.contains("apoc.util.validatePredicate"))
        .unwrap();
    assert!(relationship < validation, "{}", compiled.cypher);
}
