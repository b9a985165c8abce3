//! Mutation events: the metadata returned by write statements, and the events published from
//! it once the writes are committed.
use apollo_compiler::Name;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use tracing::debug;

use crate::execute::driver::Counters;
use crate::model::TypeModel;
use crate::schema::naming::EventKind;

/// One entry of the `meta` column of a write statement.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum EventRecord {
    Create(NodeRecord),
    Update(NodeRecord),
    Delete(NodeRecord),
    CreateRelationship(RelationshipRecord),
    DeleteRelationship(RelationshipRecord),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct NodeRecord {
    id: String,
    labels: Vec<String>,
    properties: NodeProperties,
    timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct NodeProperties {
    old: Option<Map<String, Value>>,
    new: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RelationshipRecord {
    id: String,
    relationship_name: String,
    from_id: String,
    from_labels: Vec<String>,
    to_id: String,
    to_labels: Vec<String>,
    properties: RelationshipProperties,
    timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct RelationshipProperties {
    from: Map<String, Value>,
    to: Map<String, Value>,
    relationship: Map<String, Value>,
}

impl EventRecord {
    fn kind(&self) -> EventKind {
        match self {
            EventRecord::Create(_) => EventKind::Created,
            EventRecord::Update(_) => EventKind::Updated,
            EventRecord::Delete(_) => EventKind::Deleted,
            EventRecord::CreateRelationship(_) => EventKind::RelationshipCreated,
            EventRecord::DeleteRelationship(_) => EventKind::RelationshipDeleted,
        }
    }

    fn id(&self) -> &str {
        match self {
            EventRecord::Create(node) | EventRecord::Update(node) | EventRecord::Delete(node) => &node.id,
            EventRecord::CreateRelationship(rel) | EventRecord::DeleteRelationship(rel) => &rel.id,
        }
    }
}

/// The events of the records of one statement, in emission order.
///
/// Cascading deletes may report the same deletion through several paths: every creation and
/// deletion is kept once, at its first occurrence. Updates are kept as they come.
pub(crate) fn parse_records<'r>(metas: impl IntoIterator<Item = &'r Value>) -> Vec<EventRecord> {
    let mut seen = std::collections::HashSet::new();
    let mut records = Vec::new();
    for meta in metas {
        let Some(items) = meta.as_array() else {
            continue;
        };
        for item in items {
            let record = match EventRecord::deserialize(item) {
                Ok(record) => record,
                Err(error) => {
                    debug!(%error, "skipping malformed mutation event");
                    continue;
                }
            };
            let kind = record.kind();
            if kind != EventKind::Updated && !seen.insert((kind, record.id().to_owned())) {
                continue;
            }
            records.push(record);
        }
    }
    records
}

/// Mutation counts equal to the number of events.
pub(crate) fn count(records: &[EventRecord]) -> Counters {
    let mut counters = Counters::default();
    for record in records {
        match record {
            EventRecord::Create(_) => counters.nodes_created += 1,
            EventRecord::Delete(_) => counters.nodes_deleted += 1,
            EventRecord::CreateRelationship(_) => counters.relationships_created += 1,
            EventRecord::DeleteRelationship(_) => counters.relationships_deleted += 1,
            EventRecord::Update(_) => {}
        }
    }
    counters
}

/// A node at one end of a relationship event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationshipEnd {
    pub id: String,
    pub type_name: Name,
    pub properties: Map<String, Value>,
}

/// A committed change, published to the subscriptions engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MutationEvent {
    Node {
        event: EventKind,
        id: String,
        type_name: Name,
        /// Properties before the change, `None` for creations.
        old: Option<Map<String, Value>>,
        /// Properties after the change, `None` for deletions.
        new: Option<Map<String, Value>>,
        /// Milliseconds since the epoch, as reported by the database.
        timestamp: i64,
    },
    Relationship {
        event: EventKind,
        id: String,
        /// The Cypher relationship type.
        rel_type: String,
        /// The start node, in stored direction.
        from: RelationshipEnd,
        to: RelationshipEnd,
        properties: Map<String, Value>,
        timestamp: i64,
    },
}

impl MutationEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            MutationEvent::Node { event, .. } | MutationEvent::Relationship { event, .. } => *event,
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            MutationEvent::Node { timestamp, .. } | MutationEvent::Relationship { timestamp, .. } => {
                *timestamp
            }
        }
    }

    /// Resolves the node types of a record. Records of nodes that are not of any known node
    /// type produce no event.
    pub(crate) fn from_record(model: &TypeModel, record: EventRecord) -> Option<Self> {
        let kind = record.kind();
        match record {
            EventRecord::Create(node) | EventRecord::Update(node) | EventRecord::Delete(node) => {
                let concept = model.concept_for_labels(&node.labels)?;
                Some(MutationEvent::Node {
                    event: kind,
                    id: node.id,
                    type_name: concept.name.clone(),
                    old: node.properties.old,
                    new: node.properties.new,
                    timestamp: node.timestamp,
                })
            }
            EventRecord::CreateRelationship(rel) | EventRecord::DeleteRelationship(rel) => {
                let from = model.concept_for_labels(&rel.from_labels)?;
                let to = model.concept_for_labels(&rel.to_labels)?;
                Some(MutationEvent::Relationship {
                    event: kind,
                    id: rel.id,
                    rel_type: rel.relationship_name,
                    from: RelationshipEnd {
                        id: rel.from_id,
                        type_name: from.name.clone(),
                        properties: rel.properties.from,
                    },
                    to: RelationshipEnd {
                        id: rel.to_id,
                        type_name: to.name.clone(),
                        properties: rel.properties.to,
                    },
                    properties: rel.properties.relationship,
                    timestamp: rel.timestamp,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn node(event: &str, id: &str) -> Value {
        json!({
            "event": event,
            "id": id,
            "labels": ["Movie"],
            "properties": { "old": null, "new": { "title": "Heat" } },
            "timestamp": 1,
        })
    }

    fn relationship(event: &str, id: &str) -> Value {
        json!({
            "event": event,
            "id": id,
            "relationshipName": "ACTED_IN",
            "fromId": "a",
            "fromLabels": ["Actor"],
            "toId": "m",
            "toLabels": ["Movie"],
            "properties": { "from": {}, "to": {}, "relationship": { "role": "Neil" } },
            "timestamp": 2,
        })
    }

    #[test]
    fn cascades_are_counted_once() {
        let first = json!([
            relationship("DELETE_RELATIONSHIP", "r1"),
            relationship("DELETE_RELATIONSHIP", "r2"),
            node("DELETE", "n1"),
        ]);
        let second = json!([relationship("DELETE_RELATIONSHIP", "r1"), node("DELETE", "n2")]);
        let records = parse_records([&first, &second]);
        assert_eq!(
            count(&records),
            Counters {
                nodes_deleted: 2,
                relationships_deleted: 2,
                ..Default::default()
            }
        );
    }

    #[test]
    fn updates_are_never_merged() {
        let meta = json!([node("UPDATE", "n1"), node("UPDATE", "n1"), { "event": "UNKNOWN" }]);
        assert_eq!(parse_records([&meta]).len(), 2);
    }

    #[test]
    fn events_resolve_node_types_from_labels() {
        let model = TypeModel::build(
            r#"
            type Movie { title: String actors: [Actor!]! @relationship(type: "ACTED_IN", direction: IN) }
            type Actor { name: String }
            "#,
        )
        .unwrap();
        let meta = json!([node("CREATE", "n1"), relationship("CREATE_RELATIONSHIP", "r1")]);
        let events: Vec<MutationEvent> = parse_records([&meta])
            .into_iter()
            .filter_map(|record| MutationEvent::from_record(&model, record))
            .collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind(), EventKind::Created);
        let MutationEvent::Relationship { from, to, properties, .. } = &events[1] else {
            panic!("expected a relationship event");
        };
        assert_eq!(from.type_name.as_str(), "Actor");
        assert_eq!(to.type_name.as_str(), "Movie");
        assert_eq!(properties, json!({ "role": "Neil" }).as_object().unwrap());
    }
}
