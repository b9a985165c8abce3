//! Delivery of mutation events to subscribers.
//!
//! Every subscriber is checked against every event concurrently: the checks only read the
//! event and the subscriber. Payloads are then pushed, in event order, into the subscriber's
//! own channel. A subscriber whose channel is full misses the event; a subscriber whose
//! receiving side is gone is dropped.
use std::sync::Arc;

use apollo_compiler::Name;
use futures::future::join_all;
use serde_json::Map;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

use super::MutationEvent;
use super::event::RelationshipEnd;
use crate::auth::rules::AuthorizationOperation;
use crate::auth::rules::SubscriptionEvent;
use crate::error::CompileError;
use crate::filter::Filter;
use crate::filter::FilterParser;
use crate::filter::evaluate::Scope;
use crate::filter::evaluate::matches;
use crate::graphql::Object;
use crate::graphql::Response;
use crate::model::ConceptType;
use crate::model::Entity;
use crate::model::Field;
use crate::model::Relationship;
use crate::model::TypeModel;
use crate::schema::naming;
use crate::schema::naming::EventKind;
use crate::translate::projection::TYPENAME;
use crate::translate::selection::SelectedField;
use crate::translate::selection::SelectionSet;
use crate::utils::generated_name;

/// A condition of a relationship event subscription's `where`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RelationshipCondition {
    And(Vec<RelationshipCondition>),
    Or(Vec<RelationshipCondition>),
    Not(Box<RelationshipCondition>),
    /// On the node of the subscribed type.
    Node(Filter),
    /// On the other end of the relationship, through one relationship field.
    Field {
        field: Name,
        node: Option<Filter>,
        edge: Option<Filter>,
    },
}

/// A parsed subscription `where`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SubscriptionFilter {
    None,
    Node(Filter),
    Relationship(RelationshipCondition),
}

/// One active subscription.
#[derive(Debug)]
pub(crate) struct Subscriber {
    pub(crate) type_name: Name,
    pub(crate) kind: EventKind,
    pub(crate) response_key: String,
    pub(crate) filter: SubscriptionFilter,
    pub(crate) selection: SelectionSet,
    pub(crate) jwt: Option<Object>,
    pub(crate) sender: mpsc::Sender<Response>,
}

/// What a relationship event looks like from the node of one relationship field.
struct RelationshipView<'e> {
    relationship: &'e Relationship,
    own: &'e RelationshipEnd,
    other: &'e RelationshipEnd,
    properties: &'e Map<String, Value>,
}

fn parse_error(key: &str, message: &str) -> CompileError {
    CompileError::InvalidArgument {
        key: key.to_owned(),
        message: message.to_owned(),
    }
}

fn local_filter(
    model: &TypeModel,
    entity: Entity<'_>,
    key: &str,
    value: &Value,
) -> Result<Option<Filter>, CompileError> {
    if value.is_null() {
        return Ok(None);
    }
    let object = value
        .as_object()
        .ok_or_else(|| parse_error(key, "expected an input object"))?;
    let filter = FilterParser::new(model).parse(entity, object)?;
    if filter.as_ref().is_some_and(|filter| !filter.is_local()) {
        return Err(parse_error(key, "subscriptions can only filter on attributes"));
    }
    Ok(filter)
}

/// Parses the `where` argument of a subscription root field.
pub(crate) fn parse_where(
    model: &TypeModel,
    concept: &ConceptType,
    kind: EventKind,
    value: Option<&Value>,
) -> Result<SubscriptionFilter, CompileError> {
    let Some(value) = value.filter(|value| !value.is_null()) else {
        return Ok(SubscriptionFilter::None);
    };
    if !kind.is_relationship() {
        return Ok(match local_filter(model, Entity::Concept(concept), "where", value)? {
            Some(filter) => SubscriptionFilter::Node(filter),
            None => SubscriptionFilter::None,
        });
    }
    let object = value
        .as_object()
        .ok_or_else(|| parse_error("where", "expected an input object"))?;
    Ok(SubscriptionFilter::Relationship(relationship_condition(
        model, concept, kind, object,
    )?))
}

fn relationship_condition(
    model: &TypeModel,
    concept: &ConceptType,
    kind: EventKind,
    object: &Map<String, Value>,
) -> Result<RelationshipCondition, CompileError> {
    let own_key = kind.node_field(&concept.name);
    let relationships_key = naming::relationship_event_field(kind).unwrap_or_default();
    let mut conditions = Vec::new();
    for (key, value) in object {
        if value.is_null() {
            continue;
        }
        match key.as_str() {
            "AND" | "OR" => {
                let items = value
                    .as_array()
                    .ok_or_else(|| parse_error(key, "expected a list of input objects"))?;
                let mut nested = Vec::new();
                for item in items {
                    let item = item
                        .as_object()
                        .ok_or_else(|| parse_error(key, "expected an input object"))?;
                    nested.push(relationship_condition(model, concept, kind, item)?);
                }
                conditions.push(if key == "AND" {
                    RelationshipCondition::And(nested)
                } else {
                    RelationshipCondition::Or(nested)
                });
            }
            "NOT" => {
                let item = value
                    .as_object()
                    .ok_or_else(|| parse_error(key, "expected an input object"))?;
                conditions.push(RelationshipCondition::Not(Box::new(relationship_condition(
                    model, concept, kind, item,
                )?)));
            }
            key if key == own_key => {
                if let Some(filter) = local_filter(model, Entity::Concept(concept), key, value)? {
                    conditions.push(RelationshipCondition::Node(filter));
                }
            }
            key if key == relationships_key => {
                let fields = value
                    .as_object()
                    .ok_or_else(|| parse_error(key, "expected an input object"))?;
                let mut any = Vec::new();
                for (field_name, value) in fields {
                    if value.is_null() {
                        continue;
                    }
                    any.push(field_condition(model, concept, field_name, value)?);
                }
                conditions.push(RelationshipCondition::Or(any));
            }
            _ => {
                return Err(CompileError::UnknownWhereField {
                    type_name: generated_name(naming::relationship_subscription_where(&concept.name, kind)),
                    field: key.to_owned(),
                });
            }
        }
    }
    Ok(RelationshipCondition::And(conditions))
}

fn field_condition(
    model: &TypeModel,
    concept: &ConceptType,
    field_name: &str,
    value: &Value,
) -> Result<RelationshipCondition, CompileError> {
    let relationship = concept
        .fields
        .get(field_name)
        .and_then(Field::relationship)
        .ok_or_else(|| CompileError::UnknownWhereField {
            type_name: generated_name(naming::relationships_subscription_where(&concept.name)),
            field: field_name.to_owned(),
        })?;
    let object = value
        .as_object()
        .ok_or_else(|| parse_error(field_name, "expected an input object"))?;
    let mut node = None;
    let mut edge = None;
    for (key, value) in object {
        match key.as_str() {
            "node" => {
                let target = model
                    .entity(relationship.target.name())
                    .ok_or_else(|| parse_error(key, "unknown relationship target"))?;
                node = local_filter(model, target, key, value)?;
            }
            "edge" => {
                let properties = relationship
                    .properties
                    .as_ref()
                    .and_then(|name| model.relationship_properties.get(name))
                    .ok_or_else(|| parse_error(key, "the relationship has no properties"))?;
                edge = local_filter(model, Entity::Properties(properties), key, value)?;
            }
            _ => {
                return Err(CompileError::UnknownWhereField {
                    type_name: generated_name(naming::relationship_field_subscription_where(
                        &concept.name,
                        field_name,
                    )),
                    field: key.clone(),
                });
            }
        }
    }
    Ok(RelationshipCondition::Field {
        field: relationship.field_name.clone(),
        node,
        edge,
    })
}

fn subscription_event(kind: EventKind) -> SubscriptionEvent {
    match kind {
        EventKind::Created => SubscriptionEvent::Created,
        EventKind::Updated => SubscriptionEvent::Updated,
        EventKind::Deleted => SubscriptionEvent::Deleted,
        EventKind::RelationshipCreated => SubscriptionEvent::RelationshipCreated,
        EventKind::RelationshipDeleted => SubscriptionEvent::RelationshipDeleted,
    }
}

/// Whether the subscriber may see a node of the subscribed type. Both the
/// `@subscriptionsAuthorization` rules for the event and the `@authorization` filter rules for
/// `SUBSCRIBE` apply; within each annotation at least one rule must match. Rules that need the
/// graph never match a snapshot.
fn authorized(
    model: &TypeModel,
    concept: &ConceptType,
    kind: EventKind,
    properties: &Map<String, Value>,
    jwt: Option<&Object>,
) -> bool {
    let event = subscription_event(kind);
    let scope = Scope {
        typename: Some(concept.name.as_str()),
        properties,
        jwt,
    };
    let holds = |require_authentication: bool, predicate: Option<&Filter>| {
        (!require_authentication || jwt.is_some())
            && predicate.is_none_or(|predicate| matches(predicate, scope))
    };
    let subscriptions = concept.subscriptions_authorization.iter().all(|annotation| {
        let mut rules = annotation
            .filter
            .iter()
            .filter(|rule| rule.events.contains(&event))
            .peekable();
        rules.peek().is_none()
            || rules.any(|rule| holds(rule.require_authentication, rule.predicate.as_ref()))
    });
    let interface_annotations = concept
        .interfaces
        .iter()
        .filter_map(|name| model.interfaces.get(name))
        .filter_map(|interface| interface.authorization.as_ref());
    subscriptions
        && concept
            .authorization
            .iter()
            .chain(interface_annotations)
            .all(|annotation| {
                let mut rules = annotation.filters_for(AuthorizationOperation::Subscribe).peekable();
                rules.peek().is_none()
                    || rules.any(|rule| holds(rule.require_authentication, rule.predicate.as_ref()))
            })
}

/// Whether a type condition of a payload selection applies to the payload of `concept`.
fn payload_applies(model: &TypeModel, concept: &ConceptType, condition: &Name) -> bool {
    let condition = condition.as_str();
    condition == naming::event_payload(&concept.name)
        || concept
            .unions
            .iter()
            .any(|union| condition == naming::event_payload(union))
        || model
            .interfaces
            .values()
            .filter(|interface| interface.implementations.contains(&concept.name))
            .any(|interface| condition == naming::event_payload(&interface.name))
}

/// Projects a property snapshot of a node of `concept` onto a `<Type>EventPayload` selection.
fn project_node(
    model: &TypeModel,
    concept: &ConceptType,
    properties: Option<&Map<String, Value>>,
    selection: &SelectionSet,
) -> Value {
    let Some(properties) = properties else {
        return Value::Null;
    };
    let mut result = Map::new();
    for field in selection.merged(|condition| payload_applies(model, concept, condition)) {
        let value = if field.name == TYPENAME {
            Value::String(naming::event_payload(&concept.name))
        } else {
            attribute(concept.fields.get(&field.name), properties)
        };
        result.insert(field.response_key, value);
    }
    Value::Object(result)
}

fn attribute(field: Option<&Field>, properties: &Map<String, Value>) -> Value {
    field
        .filter(|field| field.is_attribute())
        .and_then(|field| properties.get(&field.db_property))
        .cloned()
        .unwrap_or(Value::Null)
}

impl Subscriber {
    pub(crate) fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// The payloads this subscriber receives for an event. Relationship events may be seen
    /// through several relationship fields of the subscribed type.
    pub(crate) fn payloads(&self, model: &TypeModel, event: &MutationEvent) -> Vec<Value> {
        if event.kind() != self.kind {
            return Vec::new();
        }
        let Some(concept) = model.concept(&self.type_name) else {
            return Vec::new();
        };
        let jwt = self.jwt.as_ref();
        match event {
            MutationEvent::Node {
                type_name, old, new, ..
            } => {
                if *type_name != concept.name {
                    return Vec::new();
                }
                let snapshot = match self.kind {
                    EventKind::Deleted => old.as_ref(),
                    _ => new.as_ref(),
                };
                let Some(snapshot) = snapshot else {
                    return Vec::new();
                };
                if !authorized(model, concept, self.kind, snapshot, jwt) {
                    return Vec::new();
                }
                let scope = Scope {
                    typename: Some(concept.name.as_str()),
                    properties: snapshot,
                    jwt,
                };
                if let SubscriptionFilter::Node(filter) = &self.filter {
                    if !matches(filter, scope) {
                        return Vec::new();
                    }
                }
                vec![self.node_payload(model, concept, event, old.as_ref(), new.as_ref())]
            }
            MutationEvent::Relationship {
                rel_type,
                from,
                to,
                properties,
                ..
            } => concept
                .relationships()
                .filter(|relationship| relationship.rel_type == *rel_type)
                .filter_map(|relationship| {
                    let (own, other) = match relationship.direction {
                        crate::model::Direction::Out => (from, to),
                        crate::model::Direction::In => (to, from),
                    };
                    let reaches = own.type_name == concept.name
                        && relationship
                            .target
                            .concrete_types()
                            .contains(&other.type_name);
                    reaches.then_some(RelationshipView {
                        relationship,
                        own,
                        other,
                        properties,
                    })
                })
                .filter(|view| authorized(model, concept, self.kind, &view.own.properties, jwt))
                .filter(|view| match &self.filter {
                    SubscriptionFilter::Relationship(condition) => {
                        self.holds(model, concept, condition, view)
                    }
                    SubscriptionFilter::None | SubscriptionFilter::Node(_) => true,
                })
                .map(|view| self.relationship_payload(model, concept, event, &view))
                .collect(),
        }
    }

    fn holds(
        &self,
        model: &TypeModel,
        concept: &ConceptType,
        condition: &RelationshipCondition,
        view: &RelationshipView<'_>,
    ) -> bool {
        let jwt = self.jwt.as_ref();
        match condition {
            RelationshipCondition::And(conditions) => conditions
                .iter()
                .all(|condition| self.holds(model, concept, condition, view)),
            RelationshipCondition::Or(conditions) => conditions
                .iter()
                .any(|condition| self.holds(model, concept, condition, view)),
            RelationshipCondition::Not(condition) => !self.holds(model, concept, condition, view),
            RelationshipCondition::Node(filter) => matches(
                filter,
                Scope {
                    typename: Some(concept.name.as_str()),
                    properties: &view.own.properties,
                    jwt,
                },
            ),
            RelationshipCondition::Field { field, node, edge } => {
                if *field != view.relationship.field_name {
                    return false;
                }
                let node_matches = node.as_ref().is_none_or(|filter| {
                    matches(
                        filter,
                        Scope {
                            typename: Some(view.other.type_name.as_str()),
                            properties: &view.other.properties,
                            jwt,
                        },
                    )
                });
                let edge_matches = edge.as_ref().is_none_or(|filter| {
                    matches(
                        filter,
                        Scope {
                            typename: None,
                            properties: view.properties,
                            jwt,
                        },
                    )
                });
                node_matches && edge_matches
            }
        }
    }

    /// The root field of the subscription, selected on `<Type><Kind>Event`.
    fn event_fields(&self) -> Vec<SelectedField> {
        self.selection.fields()
    }

    fn node_payload(
        &self,
        model: &TypeModel,
        concept: &ConceptType,
        event: &MutationEvent,
        old: Option<&Map<String, Value>>,
        new: Option<&Map<String, Value>>,
    ) -> Value {
        let node_field = self.kind.node_field(&concept.name);
        let mut result = Map::new();
        for field in self.event_fields() {
            let value = match field.name.as_str() {
                TYPENAME => Value::String(self.kind.payload(&concept.name)),
                "event" => Value::String(self.kind.event_type().to_owned()),
                "timestamp" => Value::from(event.timestamp()),
                "previousState" => project_node(model, concept, old, &field.selection),
                name if name == node_field => {
                    let snapshot = if self.kind == EventKind::Deleted { old } else { new };
                    project_node(model, concept, snapshot, &field.selection)
                }
                _ => Value::Null,
            };
            result.insert(field.response_key, value);
        }
        Value::Object(result)
    }

    fn relationship_payload(
        &self,
        model: &TypeModel,
        concept: &ConceptType,
        event: &MutationEvent,
        view: &RelationshipView<'_>,
    ) -> Value {
        let own_field = self.kind.node_field(&concept.name);
        let relationships_field = naming::relationship_event_field(self.kind).unwrap_or_default();
        let mut result = Map::new();
        for field in self.event_fields() {
            let value = match field.name.as_str() {
                TYPENAME => Value::String(self.kind.payload(&concept.name)),
                "event" => Value::String(self.kind.event_type().to_owned()),
                "timestamp" => Value::from(event.timestamp()),
                "relationshipFieldName" => Value::String(view.relationship.field_name.to_string()),
                name if name == own_field => {
                    project_node(model, concept, Some(&view.own.properties), &field.selection)
                }
                name if name == relationships_field => {
                    connected_relationships(model, concept, view, &field.selection)
                }
                _ => Value::Null,
            };
            result.insert(field.response_key, value);
        }
        Value::Object(result)
    }
}

/// `<Type>ConnectedRelationships`: only the field the relationship was seen through is set.
fn connected_relationships(
    model: &TypeModel,
    concept: &ConceptType,
    view: &RelationshipView<'_>,
    selection: &SelectionSet,
) -> Value {
    let mut result = Map::new();
    for field in selection.fields() {
        let value = if field.name == TYPENAME {
            Value::String(naming::connected_relationships(&concept.name))
        } else if field.name == view.relationship.field_name {
            connected_relationship(model, concept, view, &field.selection)
        } else {
            Value::Null
        };
        result.insert(field.response_key, value);
    }
    Value::Object(result)
}

fn connected_relationship(
    model: &TypeModel,
    concept: &ConceptType,
    view: &RelationshipView<'_>,
    selection: &SelectionSet,
) -> Value {
    let relationship = view.relationship;
    let properties = relationship
        .properties
        .as_ref()
        .and_then(|name| model.relationship_properties.get(name));
    let mut result = Map::new();
    for field in selection.fields() {
        let value = match field.name.as_str() {
            TYPENAME => Value::String(naming::connected_relationship(
                &concept.name,
                &relationship.field_name,
            )),
            "node" => match model.concept(&view.other.type_name) {
                Some(other) => project_node(model, other, Some(&view.other.properties), &field.selection),
                None => Value::Null,
            },
            name => attribute(
                properties.and_then(|properties| properties.fields.get(name)),
                view.properties,
            ),
        };
        result.insert(field.response_key, value);
    }
    Value::Object(result)
}

/// The registered subscribers of one schema.
#[derive(Debug)]
pub(crate) struct SubscriptionFanout {
    model: Arc<TypeModel>,
    subscribers: RwLock<Vec<Arc<Subscriber>>>,
}

impl SubscriptionFanout {
    pub(crate) fn new(model: Arc<TypeModel>) -> Self {
        Self {
            model,
            subscribers: RwLock::new(Vec::new()),
        }
    }

    pub(crate) async fn register(&self, subscriber: Subscriber) {
        self.subscribers.write().await.push(Arc::new(subscriber));
    }

    /// Delivers one event to every subscriber it concerns.
    pub(crate) async fn dispatch(&self, event: &MutationEvent) {
        let subscribers = self.subscribers.read().await.clone();
        let model = &self.model;
        let deliveries = join_all(subscribers.iter().map(|subscriber| async move {
            (subscriber, subscriber.payloads(model, event))
        }))
        .await;

        let mut closed = false;
        for (subscriber, payloads) in deliveries {
            for payload in payloads {
                let mut data = Map::new();
                data.insert(subscriber.response_key.clone(), payload);
                let response = Response::builder().data(Value::Object(data)).build();
                match subscriber.sender.try_send(response) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        debug!(subscription = %subscriber.type_name, "subscriber buffer full, event dropped");
                    }
                    Err(TrySendError::Closed(_)) => closed = true,
                }
            }
            closed |= subscriber.is_closed();
        }
        if closed {
            self.subscribers
                .write()
                .await
                .retain(|subscriber| !subscriber.is_closed());
        }
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.subscribers.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    const TYPE_DEFS: &str = r#"
        type Movie @subscriptionsAuthorization(filter: [{ where: { node: { public: true } } }]) {
            title: String
            public: Boolean
            actors: [Actor!]! @relationship(type: "ACTED_IN", direction: IN, properties: "ActedIn")
        }
        type Actor {
            name: String
            movies: [Movie!]! @relationship(type: "ACTED_IN", direction: OUT, properties: "ActedIn")
        }
        type ActedIn @relationshipProperties { role: String }
    "#;

    fn selection(fields: &[(&str, &[&str])]) -> SelectionSet {
        let items = fields
            .iter()
            .map(|(name, nested)| crate::translate::selection::SelectionItem {
                conditions: Vec::new(),
                field: SelectedField {
                    response_key: (*name).to_owned(),
                    name: generated_name(name),
                    arguments: Map::new(),
                    selection: SelectionSet {
                        items: nested
                            .iter()
                            .map(|nested| crate::translate::selection::SelectionItem {
                                conditions: Vec::new(),
                                field: SelectedField {
                                    response_key: (*nested).to_owned(),
                                    name: generated_name(nested),
                                    arguments: Map::new(),
                                    selection: SelectionSet::default(),
                                },
                            })
                            .collect(),
                    },
                },
            })
            .collect();
        SelectionSet { items }
    }

    fn subscriber(
        model: &TypeModel,
        type_name: &str,
        kind: EventKind,
        filter: serde_json::Value,
        selection: SelectionSet,
    ) -> (Subscriber, mpsc::Receiver<Response>) {
        let (sender, receiver) = mpsc::channel(8);
        let concept = model.concept(type_name).unwrap();
        let filter = parse_where(model, concept, kind, Some(&filter)).unwrap();
        let subscriber = Subscriber {
            type_name: concept.name.clone(),
            kind,
            response_key: kind.field(type_name),
            filter,
            selection,
            jwt: json!({ "sub": "ada" }).as_object().cloned(),
            sender,
        };
        (subscriber, receiver)
    }

    async fn next(receiver: &mut mpsc::Receiver<Response>) -> Response {
        tokio::time::timeout(Duration::from_millis(500), receiver.recv())
            .await
            .expect("no event was delivered")
            .expect("the subscription was closed")
    }

    fn movie_created(title: &str, public: bool) -> MutationEvent {
        MutationEvent::Node {
            event: EventKind::Created,
            id: title.to_owned(),
            type_name: generated_name("Movie"),
            old: None,
            new: json!({ "title": title, "public": public }).as_object().cloned(),
            timestamp: 7,
        }
    }

    #[tokio::test]
    async fn node_events_are_filtered_and_reshaped() {
        let model = Arc::new(TypeModel::build(TYPE_DEFS).unwrap());
        let fanout = SubscriptionFanout::new(model.clone());
        let (subscriber, mut receiver) = subscriber(
            &model,
            "Movie",
            EventKind::Created,
            json!({ "title_STARTS_WITH": "The" }),
            selection(&[("event", &[]), ("createdMovie", &["title"])]),
        );
        fanout.register(subscriber).await;

        fanout.dispatch(&movie_created("Heat", true)).await;
        fanout.dispatch(&movie_created("The Matrix", false)).await;
        fanout.dispatch(&movie_created("The Thing", true)).await;

        let response = next(&mut receiver).await;
        assert_eq!(
            response.data,
            Some(json!({
                "movieCreated": { "event": "CREATE", "createdMovie": { "title": "The Thing" } }
            }))
        );
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn relationship_events_are_seen_from_both_ends() {
        let model = Arc::new(TypeModel::build(TYPE_DEFS).unwrap());
        let fanout = SubscriptionFanout::new(model.clone());
        let (actor_subscriber, mut actor_receiver) = subscriber(
            &model,
            "Actor",
            EventKind::RelationshipCreated,
            json!({ "createdRelationship": { "movies": { "edge": { "role": "Neil" } } } }),
            selection(&[("relationshipFieldName", &[]), ("actor", &["name"])]),
        );
        fanout.register(actor_subscriber).await;

        let event = MutationEvent::Relationship {
            event: EventKind::RelationshipCreated,
            id: "r".to_owned(),
            rel_type: "ACTED_IN".to_owned(),
            from: RelationshipEnd {
                id: "a".to_owned(),
                type_name: generated_name("Actor"),
                properties: json!({ "name": "Robert" }).as_object().cloned().unwrap(),
            },
            to: RelationshipEnd {
                id: "m".to_owned(),
                type_name: generated_name("Movie"),
                properties: json!({ "title": "Heat", "public": true }).as_object().cloned().unwrap(),
            },
            properties: json!({ "role": "Neil" }).as_object().cloned().unwrap(),
            timestamp: 1,
        };
        fanout.dispatch(&event).await;
        let response = next(&mut actor_receiver).await;
        assert_eq!(
            response.data,
            Some(json!({
                "actorRelationshipCreated": {
                    "relationshipFieldName": "movies",
                    "actor": { "name": "Robert" },
                }
            }))
        );
    }

    #[tokio::test]
    async fn anonymous_subscribers_miss_events_needing_authentication() {
        let model = Arc::new(TypeModel::build(TYPE_DEFS).unwrap());
        let fanout = SubscriptionFanout::new(model.clone());
        let (mut subscriber, mut receiver) = subscriber(
            &model,
            "Movie",
            EventKind::Created,
            serde_json::Value::Null,
            selection(&[("createdMovie", &["title"])]),
        );
        subscriber.jwt = None;
        fanout.register(subscriber).await;

        fanout.dispatch(&movie_created("Heat", true)).await;
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn subscribe_filter_rules_hide_nodes() {
        let model = Arc::new(
            TypeModel::build(
                r#"
                type Review @authorization(filter: [{ operations: [SUBSCRIBE], where: { node: { author: "$jwt.sub" } } }]) {
                    author: String
                    body: String
                }
                "#,
            )
            .unwrap(),
        );
        let fanout = SubscriptionFanout::new(model.clone());
        let (subscriber, mut receiver) = subscriber(
            &model,
            "Review",
            EventKind::Created,
            serde_json::Value::Null,
            selection(&[("createdReview", &["body"])]),
        );
        fanout.register(subscriber).await;

        let review = |author: &str, body: &str| MutationEvent::Node {
            event: EventKind::Created,
            id: body.to_owned(),
            type_name: generated_name("Review"),
            old: None,
            new: json!({ "author": author, "body": body }).as_object().cloned(),
            timestamp: 3,
        };
        fanout.dispatch(&review("bob", "hidden")).await;
        fanout.dispatch(&review("ada", "visible")).await;

        let response = next(&mut receiver).await;
        assert_eq!(
            response.data,
            Some(json!({ "reviewCreated": { "createdReview": { "body": "visible" } } }))
        );
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_subscribers_are_dropped() {
        let model = Arc::new(TypeModel::build(TYPE_DEFS).unwrap());
        let fanout = SubscriptionFanout::new(model.clone());
        let (subscriber, receiver) = subscriber(
            &model,
            "Movie",
            EventKind::Created,
            serde_json::Value::Null,
            selection(&[("event", &[])]),
        );
        fanout.register(subscriber).await;
        drop(receiver);
        fanout.dispatch(&movie_created("Heat", true)).await;
        assert_eq!(fanout.len().await, 0);
    }

    #[test]
    fn subscription_filters_only_read_attributes() {
        let model = TypeModel::build(TYPE_DEFS).unwrap();
        let concept = model.concept("Movie").unwrap();
        let error = parse_where(
            &model,
            concept,
            EventKind::Created,
            Some(&json!({ "actors_SOME": { "name": "Robert" } })),
        )
        .unwrap_err();
        assert_eq!(
            error,
            CompileError::InvalidArgument {
                key: "where".to_owned(),
                message: "subscriptions can only filter on attributes".to_owned(),
            }
        );
    }
}
