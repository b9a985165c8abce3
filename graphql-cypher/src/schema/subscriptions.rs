//! Event payload types, subscription filters and subscription root fields.
use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast::FieldDefinition;
use apollo_compiler::schema::Component;
use apollo_compiler::schema::ComponentName;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::InterfaceType;
use apollo_compiler::schema::ObjectType;
use apollo_compiler::schema::UnionType;
use strum::IntoEnumIterator;

use super::SchemaWriter;
use super::argument;
use super::entry;
use super::inputs::attribute_filters;
use super::list;
use super::named;
use super::naming;
use super::naming::EventKind;
use super::output_field;
use super::required;
use crate::model::ConceptType;
use crate::model::Entity;
use crate::model::Field;
use crate::model::Target;
use crate::utils::generated_name;

fn attribute_fields<'f>(fields: impl Iterator<Item = &'f Field>) -> Vec<Component<FieldDefinition>> {
    fields
        .filter(|field| field.is_attribute())
        .map(|field| output_field(&field.name, field.ty.clone(), Vec::new()))
        .collect()
}

impl<'a> SchemaWriter<'a> {
    /// Event payload types of every node type, interface and union, then the subscription
    /// root fields of every node type.
    pub(super) fn subscription_fields(&mut self) {
        let model = self.model;
        self.enum_type(
            naming::EVENT_TYPE,
            &EventKind::iter().map(EventKind::event_type).collect::<Vec<_>>(),
        );
        for interface in model.interfaces.values() {
            self.interface_payload(&interface.name);
        }
        for concept in model.concepts.values() {
            self.concept_payload(concept);
        }
        for union in model.unions.values() {
            let members: Vec<ComponentName> = union
                .members
                .iter()
                .map(|member| generated_name(naming::event_payload(member)))
                .filter(|payload| self.schema.types.contains_key(payload))
                .map(ComponentName::from)
                .collect();
            let name = generated_name(naming::event_payload(&union.name));
            if members.is_empty() || !self.claim(&name, "union") {
                continue;
            }
            let definition = UnionType {
                description: None,
                name: name.clone(),
                directives: Default::default(),
                members: members.into_iter().collect(),
            };
            self.insert(name, ExtendedType::Union(Node::new(definition)));
        }
        for concept in model.concepts.values() {
            self.concept_subscriptions(concept);
        }
    }

    fn payload_interfaces(&self, interfaces: &[Name]) -> Vec<ComponentName> {
        interfaces
            .iter()
            .map(|interface| generated_name(naming::event_payload(interface)))
            .filter(|payload| self.schema.types.contains_key(payload))
            .map(ComponentName::from)
            .collect()
    }

    /// `<Interface>EventPayload`, implemented by the payloads of its implementations.
    fn interface_payload(&mut self, type_name: &Name) -> Option<Name> {
        let model = self.model;
        let interface = model.interfaces.get(type_name)?;
        let name = generated_name(naming::event_payload(type_name));
        if self.schema.types.contains_key(&name) {
            return Some(name);
        }
        for parent in &interface.interfaces {
            self.interface_payload(parent);
        }
        let fields = attribute_fields(interface.fields.values());
        if fields.is_empty() || !self.claim(&name, "interface") {
            return None;
        }
        let definition = InterfaceType {
            description: None,
            name: name.clone(),
            implements_interfaces: self.payload_interfaces(&interface.interfaces).into_iter().collect(),
            directives: Default::default(),
            fields: fields.into_iter().map(|f| (f.name.clone(), f)).collect(),
        };
        self.insert(name.clone(), ExtendedType::Interface(Node::new(definition)));
        Some(name)
    }

    /// `<Type>EventPayload`: the attributes of a node in events.
    fn concept_payload(&mut self, concept: &ConceptType) -> Option<Name> {
        let name = generated_name(naming::event_payload(&concept.name));
        let fields = attribute_fields(concept.fields.values());
        if fields.is_empty() || !self.claim(&name, "object type") {
            return None;
        }
        let definition = ObjectType {
            description: None,
            name: name.clone(),
            implements_interfaces: self.payload_interfaces(&concept.interfaces).into_iter().collect(),
            directives: Default::default(),
            fields: fields.into_iter().map(|f| (f.name.clone(), f)).collect(),
        };
        self.insert(name.clone(), ExtendedType::Object(Node::new(definition)));
        Some(name)
    }

    /// `<Type>SubscriptionWhere`: attribute filters of a node type, interface or relationship
    /// properties type.
    fn subscription_where(&mut self, type_name: &Name) -> Option<Name> {
        let model = self.model;
        let entity = model.entity(type_name)?;
        if matches!(entity, Entity::Union(_) | Entity::Jwt(_)) {
            return None;
        }
        let name = naming::subscription_where(type_name);
        let this = name.clone();
        Some(self.input_object(name, |_| {
            let mut entries = Vec::new();
            for field in entity.fields() {
                if let Some(category) = field.scalar_category() {
                    entries.extend(attribute_filters(field, category));
                }
            }
            entries.push(entry("AND", list(&this)));
            entries.push(entry("OR", list(&this)));
            entries.push(entry("NOT", named(&this)));
            entries
        }))
    }

    fn concept_subscriptions(&mut self, concept: &'a ConceptType) {
        let Some(payload) = self.concept_payload_name(concept) else {
            return;
        };
        let Some(node_where) = self.subscription_where(&concept.name) else {
            return;
        };
        let event_type = generated_name(naming::EVENT_TYPE);
        for kind in [EventKind::Created, EventKind::Updated, EventKind::Deleted] {
            let node_field = kind.node_field(&concept.name);
            let event = self.object(kind.payload(&concept.name), |_| {
                let mut fields = vec![
                    output_field("event", required(&event_type), Vec::new()),
                    output_field("timestamp", required("Float"), Vec::new()),
                ];
                if kind == EventKind::Updated {
                    fields.push(output_field("previousState", required(&payload), Vec::new()));
                }
                fields.push(output_field(node_field, required(&payload), Vec::new()));
                fields
            });
            if let Some(event) = event {
                self.add_subscription(
                    output_field(
                        kind.field(&concept.name),
                        required(event),
                        vec![argument("where", named(&node_where))],
                    ),
                    concept.name.clone(),
                    kind,
                );
            }
        }

        let Some(connected) = self.connected_relationships(concept) else {
            return;
        };
        let relationships_where = self.relationships_subscription_where(concept);
        for kind in [EventKind::RelationshipCreated, EventKind::RelationshipDeleted] {
            let Some(relationship_field) = naming::relationship_event_field(kind) else {
                continue;
            };
            let own_field = kind.node_field(&concept.name);
            let event = self.object(kind.payload(&concept.name), |_| {
                vec![
                    output_field("event", required(&event_type), Vec::new()),
                    output_field("timestamp", required("Float"), Vec::new()),
                    output_field("relationshipFieldName", required("String"), Vec::new()),
                    output_field(&own_field, required(&payload), Vec::new()),
                    output_field(relationship_field, required(&connected), Vec::new()),
                ]
            });
            let Some(event) = event else {
                continue;
            };
            let this = naming::relationship_subscription_where(&concept.name, kind);
            let event_where = self.input_object(this.clone(), |_| {
                let mut entries = vec![
                    entry("AND", list(&this)),
                    entry("OR", list(&this)),
                    entry("NOT", named(&this)),
                    entry(&own_field, named(&node_where)),
                ];
                if let Some(relationships_where) = &relationships_where {
                    entries.push(entry(relationship_field, named(relationships_where)));
                }
                entries
            });
            self.add_subscription(
                output_field(
                    kind.field(&concept.name),
                    required(event),
                    vec![argument("where", named(event_where))],
                ),
                concept.name.clone(),
                kind,
            );
        }
    }

    fn concept_payload_name(&self, concept: &ConceptType) -> Option<Name> {
        let name = generated_name(naming::event_payload(&concept.name));
        self.schema.types.contains_key(&name).then_some(name)
    }

    /// The payload type of a relationship target, when it has one.
    fn target_payload(&self, target: &Target) -> Option<Name> {
        let name = generated_name(naming::event_payload(target.name()));
        self.schema.types.contains_key(&name).then_some(name)
    }

    /// `<Type>ConnectedRelationships`: one field per relationship whose target has a payload.
    fn connected_relationships(&mut self, concept: &'a ConceptType) -> Option<Name> {
        let model = self.model;
        self.object(naming::connected_relationships(&concept.name), |writer| {
            let mut fields = Vec::new();
            for relationship in concept.relationships() {
                let Some(node) = writer.target_payload(&relationship.target) else {
                    continue;
                };
                let properties = relationship
                    .properties
                    .as_ref()
                    .and_then(|name| model.relationship_properties.get(name));
                let connected = writer.object(
                    naming::connected_relationship(&concept.name, &relationship.field_name),
                    |_| {
                        let mut fields = vec![output_field("node", required(&node), Vec::new())];
                        if let Some(properties) = properties {
                            fields.extend(attribute_fields(properties.fields.values()));
                        }
                        fields
                    },
                );
                if let Some(connected) = connected {
                    fields.push(output_field(&relationship.field_name, named(connected), Vec::new()));
                }
            }
            fields
        })
    }

    /// `<Type>RelationshipsSubscriptionWhere`: filters on the relationship an event went
    /// through.
    fn relationships_subscription_where(&mut self, concept: &'a ConceptType) -> Option<Name> {
        let mut entries = Vec::new();
        for relationship in concept.relationships() {
            let node = match relationship.target {
                Target::Union { .. } => None,
                _ => self.subscription_where(relationship.target.name()),
            };
            let edge = match &relationship.properties {
                Some(properties) => self.subscription_where(properties),
                None => None,
            };
            if node.is_none() && edge.is_none() {
                continue;
            }
            let name = self.input_object(
                naming::relationship_field_subscription_where(&concept.name, &relationship.field_name),
                |_| {
                    let mut entries = Vec::new();
                    entries.extend(node.map(|node| entry("node", named(node))));
                    entries.extend(edge.map(|edge| entry("edge", named(edge))));
                    entries
                },
            );
            entries.push(entry(&relationship.field_name, named(name)));
        }
        if entries.is_empty() {
            return None;
        }
        Some(self.input_object(
            naming::relationships_subscription_where(&concept.name),
            |_| entries,
        ))
    }
}
