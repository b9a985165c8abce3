//! Mutation event metadata.
//!
//! Write statements return the events of every change they make as a list of maps, in the
//! order the changes were applied. The executor turns them into
//! [`MutationEvent`](crate::subscriptions::MutationEvent)s once the transaction commits. Nothing
//! is collected when subscriptions are disabled.
use super::Translator;
use crate::model::Direction;
use crate::model::Relationship;
use crate::schema::naming::EventKind;

/// An event list with nothing in it.
pub(super) const NO_EVENTS: &str = "[]";

/// Concatenates event lists.
pub(super) fn concat(lists: Vec<String>) -> String {
    let lists: Vec<String> = lists.into_iter().filter(|list| list != NO_EVENTS).collect();
    if lists.is_empty() {
        NO_EVENTS.to_owned()
    } else {
        lists.join(" + ")
    }
}

/// Flattens the event lists of every row into one list, in row order. Always returns one row.
pub(super) fn flatten(list: &str) -> String {
    format!("reduce(events = [], batch IN collect({list}) | events + batch)")
}

/// A one element list, or no events.
pub(super) fn single(event: Option<String>) -> String {
    match event {
        Some(event) => format!("[{event}]"),
        None => NO_EVENTS.to_owned(),
    }
}

fn node_event(kind: EventKind, node: &str, old: &str, new: &str) -> String {
    format!(
        "{{ event: \"{}\", id: elementId({node}), labels: labels({node}), properties: {{ old: {old}, new: {new} }}, timestamp: timestamp() }}",
        kind.event_type()
    )
}

/// The event of a relationship between the nodes `from` and `to`, in stored direction.
fn relationship_event(kind: EventKind, relationship: &str, from: &str, to: &str) -> String {
    format!(
        "{{ event: \"{}\", id: elementId({relationship}), relationshipName: type({relationship}), fromId: elementId({from}), fromLabels: labels({from}), toId: elementId({to}), toLabels: labels({to}), properties: {{ from: properties({from}), to: properties({to}), relationship: properties({relationship}) }}, timestamp: timestamp() }}",
        kind.event_type()
    )
}

impl Translator<'_> {
    pub(super) fn created_event(&self, node: &str) -> Option<String> {
        self.events_enabled()
            .then(|| node_event(EventKind::Created, node, "null", &format!("properties({node})")))
    }

    /// `snapshot` holds the properties before the update.
    pub(super) fn updated_event(&self, node: &str, snapshot: &str) -> Option<String> {
        self.events_enabled()
            .then(|| node_event(EventKind::Updated, node, snapshot, &format!("properties({node})")))
    }

    pub(super) fn deleted_event(&self, node: &str) -> Option<String> {
        self.events_enabled()
            .then(|| node_event(EventKind::Deleted, node, &format!("properties({node})"), "null"))
    }

    /// The event of a relationship written from `source` to `target` through a relationship
    /// field of `source`.
    pub(super) fn relationship_field_event(
        &self,
        kind: EventKind,
        relationship: &Relationship,
        source: &str,
        rel_variable: &str,
        target: &str,
    ) -> Option<String> {
        let (from, to) = match relationship.direction {
            Direction::Out => (source, target),
            Direction::In => (target, source),
        };
        self.events_enabled()
            .then(|| relationship_event(kind, rel_variable, from, to))
    }

    /// The deletion events of every relationship of `node`, to be evaluated right before the
    /// node is detached.
    pub(super) fn detached_events(&self, node: &str) -> String {
        if !self.events_enabled() {
            return NO_EVENTS.to_owned();
        }
        let event = relationship_event(
            EventKind::RelationshipDeleted,
            "detached",
            "startNode(detached)",
            "endNode(detached)",
        );
        format!("[({node})-[detached]-() | {event}]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_lists_are_dropped_from_concatenations() {
        assert_eq!(concat(vec![NO_EVENTS.to_owned(), NO_EVENTS.to_owned()]), "[]");
        assert_eq!(
            concat(vec!["[a]".to_owned(), NO_EVENTS.to_owned(), "var1".to_owned()]),
            "[a] + var1"
        );
        assert_eq!(single(None), "[]");
    }
}
