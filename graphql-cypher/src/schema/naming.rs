//! Names of generated types and fields.
//!
//! Both the schema generator and the query compiler go through these, so that the
//! `__typename` values the compiler reports always exist in the generated schema.
use crate::model::ScalarCategory;
use crate::utils::upper_first;

pub(crate) fn where_input(type_name: &str) -> String {
    format!("{type_name}Where")
}

pub(crate) fn sort_input(type_name: &str) -> String {
    format!("{type_name}Sort")
}

pub(crate) fn options_input(type_name: &str) -> String {
    format!("{type_name}Options")
}

pub(crate) fn create_input(type_name: &str) -> String {
    format!("{type_name}CreateInput")
}

pub(crate) fn update_input(type_name: &str) -> String {
    format!("{type_name}UpdateInput")
}

pub(crate) fn connect_where(type_name: &str) -> String {
    format!("{type_name}ConnectWhere")
}

pub(crate) fn connect_or_create_where(type_name: &str) -> String {
    format!("{type_name}ConnectOrCreateWhere")
}

pub(crate) fn unique_where(type_name: &str) -> String {
    format!("{type_name}UniqueWhere")
}

pub(crate) fn on_create_input(type_name: &str) -> String {
    format!("{type_name}OnCreateInput")
}

pub(crate) fn connect_input(type_name: &str) -> String {
    format!("{type_name}ConnectInput")
}

pub(crate) fn disconnect_input(type_name: &str) -> String {
    format!("{type_name}DisconnectInput")
}

pub(crate) fn delete_input(type_name: &str) -> String {
    format!("{type_name}DeleteInput")
}

pub(crate) fn implementations_where(type_name: &str) -> String {
    format!("{type_name}ImplementationsWhere")
}

/// Inputs of one relationship field, e.g. `MovieActorsFieldInput`.
pub(crate) fn relationship_input(type_name: &str, field: &str, suffix: &str) -> String {
    format!("{type_name}{}{suffix}", upper_first(field))
}

/// For union targets, inputs are keyed by member, e.g. `SearchResultMovieFieldInput`.
pub(crate) fn union_member_input(type_name: &str, field: &str, member: &str, suffix: &str) -> String {
    format!("{type_name}{}{member}{suffix}", upper_first(field))
}

pub(crate) fn connection(type_name: &str, field: &str) -> String {
    relationship_input(type_name, field, "Connection")
}

pub(crate) fn relationship(type_name: &str, field: &str) -> String {
    relationship_input(type_name, field, "Relationship")
}

pub(crate) fn connection_field(field: &str) -> String {
    format!("{field}Connection")
}

pub(crate) fn aggregate_field(field: &str) -> String {
    format!("{field}Aggregate")
}

pub(crate) fn relationship_aggregate(type_name: &str, target: &str, field: &str) -> String {
    format!("{type_name}{target}{}AggregationSelection", upper_first(field))
}

pub(crate) fn node_aggregate(type_name: &str, target: &str, field: &str) -> String {
    format!("{type_name}{target}{}NodeAggregateSelection", upper_first(field))
}

pub(crate) fn edge_aggregate(type_name: &str, target: &str, field: &str) -> String {
    format!("{type_name}{target}{}EdgeAggregateSelection", upper_first(field))
}

/// The selection type of one aggregated field, `None` for categories without aggregations.
pub(crate) fn field_aggregate(category: ScalarCategory) -> Option<&'static str> {
    Some(match category {
        ScalarCategory::String => "StringAggregateSelection",
        ScalarCategory::Id => "IDAggregateSelection",
        ScalarCategory::Int => "IntAggregateSelection",
        ScalarCategory::Float => "FloatAggregateSelection",
        ScalarCategory::BigInt => "BigIntAggregateSelection",
        ScalarCategory::DateTime => "DateTimeAggregateSelection",
        _ => return None,
    })
}

pub(crate) fn root_connection(plural: &str) -> String {
    format!("{}Connection", upper_first(plural))
}

pub(crate) fn root_edge(type_name: &str) -> String {
    format!("{type_name}Edge")
}

pub(crate) fn aggregate_selection(type_name: &str) -> String {
    format!("{type_name}AggregateSelection")
}

pub(crate) fn create_response(plural: &str) -> String {
    format!("Create{}MutationResponse", upper_first(plural))
}

pub(crate) fn update_response(plural: &str) -> String {
    format!("Update{}MutationResponse", upper_first(plural))
}

pub(crate) const CREATE_INFO: &str = "CreateInfo";
pub(crate) const UPDATE_INFO: &str = "UpdateInfo";
pub(crate) const DELETE_INFO: &str = "DeleteInfo";
pub(crate) const PAGE_INFO: &str = "PageInfo";
pub(crate) const SORT_DIRECTION: &str = "SortDirection";
pub(crate) const EVENT_TYPE: &str = "EventType";
/// Placeholder field of input objects that would otherwise have no field.
pub(crate) const EMPTY_INPUT: &str = "_emptyInput";

pub(crate) fn create_field(plural: &str) -> String {
    format!("create{}", upper_first(plural))
}

pub(crate) fn update_field(plural: &str) -> String {
    format!("update{}", upper_first(plural))
}

pub(crate) fn delete_field(plural: &str) -> String {
    format!("delete{}", upper_first(plural))
}

/// The kinds of mutation events, and of the subscriptions of one node type.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    serde::Serialize,
    strum_macros::IntoStaticStr,
    strum_macros::EnumIter,
)]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
    RelationshipCreated,
    RelationshipDeleted,
}

impl EventKind {
    /// The value of the `EventType` enum.
    pub(crate) fn event_type(self) -> &'static str {
        match self {
            EventKind::Created => "CREATE",
            EventKind::Updated => "UPDATE",
            EventKind::Deleted => "DELETE",
            EventKind::RelationshipCreated => "CREATE_RELATIONSHIP",
            EventKind::RelationshipDeleted => "DELETE_RELATIONSHIP",
        }
    }

    /// The subscription root field, e.g. `movieCreated`.
    pub(crate) fn field(self, type_name: &str) -> String {
        let suffix: &str = self.into();
        format!("{}{suffix}", crate::utils::lower_first(type_name))
    }

    /// The payload type, e.g. `MovieCreatedEvent`.
    pub(crate) fn payload(self, type_name: &str) -> String {
        let suffix: &str = self.into();
        format!("{type_name}{suffix}Event")
    }

    /// The payload field carrying the node, e.g. `createdMovie`.
    pub(crate) fn node_field(self, type_name: &str) -> String {
        match self {
            EventKind::Created => format!("created{type_name}"),
            EventKind::Updated => format!("updated{type_name}"),
            EventKind::Deleted => format!("deleted{type_name}"),
            EventKind::RelationshipCreated | EventKind::RelationshipDeleted => {
                crate::utils::lower_first(type_name)
            }
        }
    }

    pub(crate) fn is_relationship(self) -> bool {
        matches!(
            self,
            EventKind::RelationshipCreated | EventKind::RelationshipDeleted
        )
    }
}

pub(crate) fn event_payload(type_name: &str) -> String {
    format!("{type_name}EventPayload")
}

pub(crate) fn subscription_where(type_name: &str) -> String {
    format!("{type_name}SubscriptionWhere")
}

pub(crate) fn relationship_subscription_where(type_name: &str, kind: EventKind) -> String {
    let kind: &str = kind.into();
    format!("{type_name}{kind}SubscriptionWhere")
}

pub(crate) fn connected_relationships(type_name: &str) -> String {
    format!("{type_name}ConnectedRelationships")
}

pub(crate) fn connected_relationship(type_name: &str, field: &str) -> String {
    relationship_input(type_name, field, "ConnectedRelationship")
}

pub(crate) fn relationships_subscription_where(type_name: &str) -> String {
    format!("{type_name}RelationshipsSubscriptionWhere")
}

pub(crate) fn relationship_field_subscription_where(type_name: &str, field: &str) -> String {
    relationship_input(type_name, field, "RelationshipSubscriptionWhere")
}

/// The payload field of relationship events carrying the relationship, `None` for node
/// events.
pub(crate) fn relationship_event_field(kind: EventKind) -> Option<&'static str> {
    match kind {
        EventKind::RelationshipCreated => Some("createdRelationship"),
        EventKind::RelationshipDeleted => Some("deletedRelationship"),
        EventKind::Created | EventKind::Updated | EventKind::Deleted => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_names() {
        assert_eq!(connection("Movie", "actors"), "MovieActorsConnection");
        assert_eq!(relationship_input("Movie", "actors", "FieldInput"), "MovieActorsFieldInput");
        assert_eq!(
            relationship_aggregate("Movie", "Actor", "actors"),
            "MovieActorActorsAggregationSelection"
        );
        assert_eq!(root_connection("movies"), "MoviesConnection");
        assert_eq!(create_field("movies"), "createMovies");
        assert_eq!(create_response("movies"), "CreateMoviesMutationResponse");
        assert_eq!(EventKind::RelationshipCreated.field("Movie"), "movieRelationshipCreated");
        assert_eq!(EventKind::Updated.node_field("Movie"), "updatedMovie");
    }
}
