//! The shape of compiled results, and the reshaping of database records into GraphQL data.
//!
//! Compiled statements project maps keyed by response key. What Cypher cannot produce is
//! filled in here: `__typename` of abstract types, connection cursors and page info, and the
//! `info` counts of mutation responses.
use apollo_compiler::Name;
use apollo_compiler::collections::IndexMap;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Map;
use serde_json::Value;

use crate::error::CompileError;
use crate::execute::driver::Counters;

const CURSOR_PREFIX: &str = "arrayconnection:";

/// Key under which abstract projections carry the concrete type of each node.
pub(crate) const RESOLVE_TYPE: &str = "__resolveType";

pub(crate) fn encode_cursor(offset: usize) -> String {
    BASE64.encode(format!("{CURSOR_PREFIX}{offset}"))
}

pub(crate) fn decode_cursor(cursor: &str) -> Result<usize, CompileError> {
    let invalid = || CompileError::InvalidCursor {
        cursor: cursor.to_owned(),
    };
    let bytes = BASE64.decode(cursor).map_err(|_| invalid())?;
    let text = String::from_utf8(bytes).map_err(|_| invalid())?;
    text.strip_prefix(CURSOR_PREFIX)
        .and_then(|offset| offset.parse().ok())
        .ok_or_else(invalid)
}

/// Offset of the first item after `cursor`, bounded by the Cypher integer range.
pub(crate) fn offset_after(cursor: &str) -> Result<usize, CompileError> {
    decode_cursor(cursor)?
        .checked_add(1)
        .filter(|offset| i64::try_from(*offset).is_ok())
        .ok_or_else(|| CompileError::InvalidCursor {
            cursor: cursor.to_owned(),
        })
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Shape {
    /// Passed through as projected.
    Value,
    Object(ObjectShape),
    Connection(ConnectionShape),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ObjectShape {
    /// Selected fields per concrete type.
    pub(crate) types: IndexMap<Name, Vec<ShapeField>>,
    /// Whether the concrete type is read from [`RESOLVE_TYPE`].
    pub(crate) is_abstract: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ShapeField {
    pub(crate) response_key: String,
    pub(crate) kind: ShapeKind,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ShapeKind {
    Typename,
    Data(Shape),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ConnectionShape {
    /// Position of the first edge in the full result.
    pub(crate) offset: usize,
    pub(crate) fields: Vec<(String, ConnectionField)>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ConnectionField {
    Typename(Name),
    TotalCount,
    PageInfo(Vec<(String, PageInfoField)>),
    Edges(Vec<(String, EdgeField)>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PageInfoField {
    Typename,
    HasNextPage,
    HasPreviousPage,
    StartCursor,
    EndCursor,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum EdgeField {
    Typename(Name),
    Cursor,
    Node(Shape),
    Properties(Shape),
}

/// Counts reported in the `info` of mutation responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum InfoField {
    Typename(Name),
    NodesCreated,
    NodesDeleted,
    RelationshipsCreated,
    RelationshipsDeleted,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum MutationField {
    Typename(Name),
    Info(Vec<(String, InfoField)>),
    /// The created or updated nodes, one per returned row.
    Nodes(Shape),
}

/// How the records of one compiled statement become the value of its root field.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RootShape {
    /// The `this` column of every record: a list, or the first record.
    Rows { shape: Shape, list: bool },
    /// A create or update response.
    Mutation(Vec<(String, MutationField)>),
    /// A delete response: only counts.
    Delete(Vec<(String, InfoField)>),
}

pub(crate) fn reshape(value: Value, shape: &Shape) -> Value {
    match (value, shape) {
        (Value::Null, _) => Value::Null,
        (value, Shape::Value) => value,
        (Value::Array(items), shape) => {
            Value::Array(items.into_iter().map(|item| reshape(item, shape)).collect())
        }
        (Value::Object(object), Shape::Object(shape)) => reshape_object(object, shape),
        (Value::Object(object), Shape::Connection(shape)) => reshape_connection(object, shape),
        (value, _) => value,
    }
}

fn reshape_object(mut object: Map<String, Value>, shape: &ObjectShape) -> Value {
    let resolved = object.remove(RESOLVE_TYPE);
    let type_name = if shape.is_abstract {
        resolved
            .as_ref()
            .and_then(Value::as_str)
            .and_then(|name| shape.types.get_key_value(name))
    } else {
        shape.types.first()
    };
    let Some((type_name, fields)) = type_name else {
        return Value::Null;
    };
    let mut result = Map::new();
    for field in fields {
        let value = match &field.kind {
            ShapeKind::Typename => Value::String(type_name.to_string()),
            ShapeKind::Data(shape) => object
                .remove(&field.response_key)
                .map(|value| reshape(value, shape))
                .unwrap_or(Value::Null),
        };
        result.insert(field.response_key.clone(), value);
    }
    Value::Object(result)
}

fn reshape_connection(mut object: Map<String, Value>, shape: &ConnectionShape) -> Value {
    let total = object.get("totalCount").and_then(Value::as_u64).unwrap_or(0) as usize;
    let edges = match object.remove("edges") {
        Some(Value::Array(edges)) => edges,
        _ => Vec::new(),
    };
    let offset = shape.offset;
    let len = edges.len();
    let mut result = Map::new();
    for (key, field) in &shape.fields {
        let value = match field {
            ConnectionField::Typename(name) => Value::String(name.to_string()),
            ConnectionField::TotalCount => Value::from(total),
            ConnectionField::PageInfo(fields) => {
                let mut page_info = Map::new();
                for (key, field) in fields {
                    let value = match field {
                        PageInfoField::Typename => Value::String("PageInfo".to_owned()),
                        PageInfoField::HasNextPage => Value::Bool(offset + len < total),
                        PageInfoField::HasPreviousPage => Value::Bool(offset > 0),
                        PageInfoField::StartCursor if len > 0 => {
                            Value::String(encode_cursor(offset))
                        }
                        PageInfoField::EndCursor if len > 0 => {
                            Value::String(encode_cursor(offset + len - 1))
                        }
                        PageInfoField::StartCursor | PageInfoField::EndCursor => Value::Null,
                    };
                    page_info.insert(key.clone(), value);
                }
                Value::Object(page_info)
            }
            ConnectionField::Edges(fields) => Value::Array(
                edges
                    .iter()
                    .enumerate()
                    .map(|(index, edge)| reshape_edge(edge, offset + index, fields))
                    .collect(),
            ),
        };
        result.insert(key.clone(), value);
    }
    Value::Object(result)
}

fn reshape_edge(edge: &Value, position: usize, fields: &[(String, EdgeField)]) -> Value {
    let mut result = Map::new();
    for (key, field) in fields {
        let value = match field {
            EdgeField::Typename(name) => Value::String(name.to_string()),
            EdgeField::Cursor => Value::String(encode_cursor(position)),
            EdgeField::Node(shape) => reshape(edge.get("node").cloned().unwrap_or_default(), shape),
            EdgeField::Properties(shape) => reshape(
                edge.get("properties").cloned().unwrap_or_default(),
                shape,
            ),
        };
        result.insert(key.clone(), value);
    }
    Value::Object(result)
}

/// The `info` of a mutation response.
pub(crate) fn info(fields: &[(String, InfoField)], counts: Counters) -> Value {
    let mut result = Map::new();
    for (key, field) in fields {
        let value = match field {
            InfoField::Typename(name) => Value::String(name.to_string()),
            InfoField::NodesCreated => Value::from(counts.nodes_created),
            InfoField::NodesDeleted => Value::from(counts.nodes_deleted),
            InfoField::RelationshipsCreated => Value::from(counts.relationships_created),
            InfoField::RelationshipsDeleted => Value::from(counts.relationships_deleted),
        };
        result.insert(key.clone(), value);
    }
    Value::Object(result)
}

#[cfg(test)]
mod tests {
    use apollo_compiler::name;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn data(key: &str) -> ShapeField {
        ShapeField {
            response_key: key.to_owned(),
            kind: ShapeKind::Data(Shape::Value),
        }
    }

    fn typename() -> ShapeField {
        ShapeField {
            response_key: "__typename".to_owned(),
            kind: ShapeKind::Typename,
        }
    }

    #[test]
    fn cursors_round_trip() {
        assert_eq!(encode_cursor(0), "YXJyYXljb25uZWN0aW9uOjA=");
        assert_eq!(decode_cursor(&encode_cursor(41)), Ok(41));
        assert_eq!(
            decode_cursor("nope"),
            Err(CompileError::InvalidCursor {
                cursor: "nope".to_owned()
            })
        );
    }

    #[test]
    fn out_of_range_cursors_are_rejected() {
        assert_eq!(offset_after(&encode_cursor(41)), Ok(42));
        let last = encode_cursor(usize::MAX);
        assert_eq!(
            offset_after(&last),
            Err(CompileError::InvalidCursor { cursor: last.clone() })
        );
        let beyond_cypher = encode_cursor(i64::MAX as usize);
        assert!(offset_after(&beyond_cypher).is_err());
    }

    #[test]
    fn abstract_objects_resolve_their_type() {
        let mut types = IndexMap::default();
        types.insert(name!("Movie"), vec![typename(), data("title"), data("runtime")]);
        types.insert(name!("Series"), vec![typename(), data("title")]);
        let shape = Shape::Object(ObjectShape {
            types,
            is_abstract: true,
        });
        let value = json!([
            { "__resolveType": "Series", "title": "Dark" },
            { "__resolveType": "Movie", "title": "Heat" },
        ]);
        assert_eq!(
            reshape(value, &shape),
            json!([
                { "__typename": "Series", "title": "Dark" },
                { "__typename": "Movie", "title": "Heat", "runtime": null },
            ])
        );
    }

    #[test]
    fn connections_get_cursors_and_page_info() {
        let mut types = IndexMap::default();
        types.insert(name!("Movie"), vec![data("title")]);
        let shape = Shape::Connection(ConnectionShape {
            offset: 2,
            fields: vec![
                ("totalCount".to_owned(), ConnectionField::TotalCount),
                (
                    "pageInfo".to_owned(),
                    ConnectionField::PageInfo(vec![
                        ("hasNextPage".to_owned(), PageInfoField::HasNextPage),
                        ("hasPreviousPage".to_owned(), PageInfoField::HasPreviousPage),
                        ("endCursor".to_owned(), PageInfoField::EndCursor),
                    ]),
                ),
                (
                    "edges".to_owned(),
                    ConnectionField::Edges(vec![
                        ("cursor".to_owned(), EdgeField::Cursor),
                        (
                            "node".to_owned(),
                            EdgeField::Node(Shape::Object(ObjectShape {
                                types,
                                is_abstract: false,
                            })),
                        ),
                    ]),
                ),
            ],
        });
        let value = json!({
            "totalCount": 5,
            "edges": [{ "node": { "title": "C" } }, { "node": { "title": "D" } }],
        });
        assert_eq!(
            reshape(value, &shape),
            json!({
                "totalCount": 5,
                "pageInfo": {
                    "hasNextPage": true,
                    "hasPreviousPage": true,
                    "endCursor": encode_cursor(3),
                },
                "edges": [
                    { "cursor": encode_cursor(2), "node": { "title": "C" } },
                    { "cursor": encode_cursor(3), "node": { "title": "D" } },
                ],
            })
        );
    }

    #[test]
    fn last_page_has_no_next_page() {
        let shape = Shape::Connection(ConnectionShape {
            offset: 4,
            fields: vec![(
                "pageInfo".to_owned(),
                ConnectionField::PageInfo(vec![
                    ("hasNextPage".to_owned(), PageInfoField::HasNextPage),
                    ("startCursor".to_owned(), PageInfoField::StartCursor),
                ]),
            )],
        });
        let value = json!({ "totalCount": 5, "edges": [{ "node": {} }] });
        assert_eq!(
            reshape(value, &shape),
            json!({ "pageInfo": { "hasNextPage": false, "startCursor": encode_cursor(4) } })
        );
    }
}
