//! Filter, sort and mutation input types.
use apollo_compiler::Name;
use apollo_compiler::ast::Type;

use super::SchemaWriter;
use super::entry;
use super::list;
use super::named;
use super::naming;
use super::nullable;
use super::required;
use crate::filter::Operator;
use crate::filter::Quantifier;
use crate::model::ConceptType;
use crate::model::Entity;
use crate::model::Field;
use crate::model::Relationship;
use crate::model::ScalarCategory;
use crate::model::Target;

/// The inputs of one relationship field, or of one member of its union target.
#[derive(Clone, Copy)]
pub(super) struct RelatedInputs<'a> {
    owner: &'a Name,
    relationship: &'a Relationship,
    member: Option<&'a Name>,
}

impl<'a> RelatedInputs<'a> {
    pub(super) fn new(owner: &'a Name, relationship: &'a Relationship) -> Self {
        Self {
            owner,
            relationship,
            member: None,
        }
    }

    fn member(owner: &'a Name, relationship: &'a Relationship, member: &'a Name) -> Self {
        Self {
            owner,
            relationship,
            member: Some(member),
        }
    }

    fn name(&self, suffix: &str) -> String {
        let field = &self.relationship.field_name;
        match self.member {
            Some(member) => naming::union_member_input(self.owner, field, member, suffix),
            None => naming::relationship_input(self.owner, field, suffix),
        }
    }

    fn target(&self) -> &'a Name {
        self.member
            .unwrap_or_else(|| self.relationship.target.name())
    }

    /// One input or a list of them, following the cardinality of the relationship.
    fn many(&self, name: Name) -> Type {
        if self.relationship.is_list {
            list(name)
        } else {
            named(name)
        }
    }
}

/// Where fields of one attribute.
pub(super) fn attribute_filters(field: &Field, category: ScalarCategory) -> Vec<(Name, Type)> {
    Operator::supported(category, field.is_list())
        .into_iter()
        .map(|operator| {
            let ty = match operator {
                Operator::Equal | Operator::Not if field.is_list() => nullable(&field.ty),
                _ if operator.takes_list() => list(field.type_name()),
                _ => named(field.type_name()),
            };
            entry(format!("{}{}", field.name, operator.suffix()), ty)
        })
        .collect()
}

/// The type of a settable attribute in create inputs: optional when a default applies.
fn create_type(field: &Field) -> Type {
    if field.default.is_some() {
        nullable(&field.ty)
    } else {
        field.ty.clone()
    }
}

fn update_operators(field: &Field, category: ScalarCategory) -> Vec<(Name, Type)> {
    if field.is_list() {
        return vec![
            entry(format!("{}_PUSH", field.name), nullable(&field.ty)),
            entry(format!("{}_POP", field.name), named("Int")),
        ];
    }
    let suffixes: &[&str] = match category {
        ScalarCategory::Int | ScalarCategory::BigInt => &["_INCREMENT", "_DECREMENT"],
        ScalarCategory::Float => &["_ADD", "_SUBTRACT", "_MULTIPLY", "_DIVIDE"],
        _ => &[],
    };
    suffixes
        .iter()
        .map(|suffix| entry(format!("{}{suffix}", field.name), named(field.type_name())))
        .collect()
}

/// Settable attributes with their update operators, all optional.
fn update_fields<'f>(fields: impl Iterator<Item = &'f Field>) -> Vec<(Name, Type)> {
    let mut entries = Vec::new();
    for field in fields.filter(|f| f.is_settable()) {
        entries.push(entry(&field.name, nullable(&field.ty)));
        if let Some(category) = field.scalar_category() {
            entries.extend(update_operators(field, category));
        }
    }
    entries
}

impl<'a> SchemaWriter<'a> {
    /// `<Type>Where` of a node type, interface, union or relationship properties type.
    pub(super) fn where_input(&mut self, type_name: &Name) -> Name {
        let model = self.model;
        let name = naming::where_input(type_name);
        let this = name.clone();
        self.input_object(name, |writer| {
            let mut entries = Vec::new();
            let Some(entity) = model.entity(type_name) else {
                return entries;
            };
            if let Entity::Union(union) = entity {
                for member in &union.members {
                    entries.push(entry(member, named(writer.where_input(member))));
                }
                return entries;
            }
            for field in entity.fields() {
                if let Some(category) = field.scalar_category() {
                    entries.extend(attribute_filters(field, category));
                } else if let Some(relationship) = field.relationship() {
                    writer.relationship_filters(entity.name(), relationship, &mut entries);
                }
            }
            if let Entity::Interface(interface) = entity {
                if !interface.implementations.is_empty() {
                    let implementations = writer.input_object(
                        naming::implementations_where(type_name),
                        |writer| {
                            interface
                                .implementations
                                .iter()
                                .map(|concept| entry(concept, named(writer.where_input(concept))))
                                .collect()
                        },
                    );
                    entries.push(entry("_on", named(implementations)));
                }
            }
            entries.push(entry("AND", list(&this)));
            entries.push(entry("OR", list(&this)));
            entries.push(entry("NOT", named(&this)));
            entries
        })
    }

    fn relationship_filters(
        &mut self,
        owner: &Name,
        relationship: &Relationship,
        entries: &mut Vec<(Name, Type)>,
    ) {
        let field = &relationship.field_name;
        let target_where = self.where_input(relationship.target.name());
        let connection_where = self.connection_where(owner, relationship);
        let connection = naming::connection_field(field);
        if relationship.is_list {
            for quantifier in Quantifier::ALL {
                entries.push(entry(format!("{field}{}", quantifier.suffix()), named(&target_where)));
            }
            for quantifier in Quantifier::ALL {
                entries.push(entry(
                    format!("{connection}{}", quantifier.suffix()),
                    named(&connection_where),
                ));
            }
        } else {
            entries.push(entry(field, named(&target_where)));
            entries.push(entry(format!("{field}_NOT"), named(&target_where)));
            entries.push(entry(&connection, named(&connection_where)));
            entries.push(entry(format!("{connection}_NOT"), named(&connection_where)));
        }
        let count = self.input_object(
            naming::relationship_input(owner, field, "AggregateInput"),
            |_| {
                ["count", "count_LT", "count_LTE", "count_GT", "count_GTE"]
                    .into_iter()
                    .map(|name| entry(name, named("Int")))
                    .collect()
            },
        );
        entries.push(entry(naming::aggregate_field(field), named(count)));
    }

    /// `<Type><Field>ConnectionWhere`: filters on the related node and the relationship
    /// properties. Union targets are keyed by member.
    pub(super) fn connection_where(&mut self, owner: &Name, relationship: &Relationship) -> Name {
        let name = naming::relationship_input(owner, &relationship.field_name, "ConnectionWhere");
        let this = name.clone();
        self.input_object(name, |writer| match &relationship.target {
            Target::Union { members, .. } => members
                .iter()
                .map(|member| {
                    let related = RelatedInputs::member(owner, relationship, member);
                    let member_where = related.name("ConnectionWhere");
                    let member_where = writer.input_object(member_where.clone(), |writer| {
                        writer.edge_and_node_filters(&member_where, relationship, member)
                    });
                    entry(member, named(member_where))
                })
                .collect(),
            _ => writer.edge_and_node_filters(&this, relationship, relationship.target.name()),
        })
    }

    fn edge_and_node_filters(
        &mut self,
        this: &str,
        relationship: &Relationship,
        node: &Name,
    ) -> Vec<(Name, Type)> {
        let node_where = self.where_input(node);
        let mut entries = vec![
            entry("node", named(&node_where)),
            entry("node_NOT", named(&node_where)),
        ];
        if let Some(properties) = &relationship.properties {
            let edge_where = self.where_input(properties);
            entries.push(entry("edge", named(&edge_where)));
            entries.push(entry("edge_NOT", named(&edge_where)));
        }
        entries.push(entry("AND", list(this)));
        entries.push(entry("OR", list(this)));
        entries.push(entry("NOT", named(this)));
        entries
    }

    /// `<Type>Sort`, `None` when nothing of the type can be sorted on.
    pub(super) fn sort_input(&mut self, type_name: &Name) -> Option<Name> {
        let model = self.model;
        let entity = model.entity(type_name)?;
        let sortable: Vec<&Field> = entity
            .fields()
            .filter(|f| !f.is_list() && f.scalar_category().is_some_and(ScalarCategory::is_sortable))
            .collect();
        if sortable.is_empty() {
            return None;
        }
        let direction = self.enum_type(naming::SORT_DIRECTION, &["ASC", "DESC"]);
        Some(self.input_object(naming::sort_input(type_name), |_| {
            sortable
                .iter()
                .map(|field| entry(&field.name, named(&direction)))
                .collect()
        }))
    }

    /// `<Type>Options`: sorting and offset pagination of plural reads.
    pub(super) fn options_input(&mut self, type_name: &Name) -> Name {
        let sort = self.sort_input(type_name);
        self.input_object(naming::options_input(type_name), |_| {
            let mut entries = Vec::new();
            if let Some(sort) = sort {
                entries.push(entry("sort", list(sort)));
            }
            entries.push(entry("limit", named("Int")));
            entries.push(entry("offset", named("Int")));
            entries
        })
    }

    /// `<Type>CreateInput`. Interfaces are keyed by implementation; relationship properties
    /// without settable attributes have none.
    pub(super) fn create_input(&mut self, type_name: &Name) -> Option<Name> {
        let model = self.model;
        let name = naming::create_input(type_name);
        match model.entity(type_name)? {
            Entity::Concept(concept) => Some(self.input_object(name, |writer| {
                let mut entries = Vec::new();
                for field in concept.fields.values() {
                    if field.is_settable() {
                        entries.push(entry(&field.name, create_type(field)));
                    } else if let Some(relationship) = field.relationship() {
                        let ty = writer.relationship_create_input(&concept.name, relationship);
                        entries.push(entry(&field.name, ty));
                    }
                }
                entries
            })),
            Entity::Interface(interface) if !interface.implementations.is_empty() => {
                Some(self.input_object(name, |writer| {
                    interface
                        .implementations
                        .iter()
                        .filter_map(|concept| {
                            let input = writer.create_input(concept)?;
                            Some(entry(concept, named(input)))
                        })
                        .collect()
                }))
            }
            Entity::Properties(properties) => {
                let settable: Vec<&Field> =
                    properties.fields.values().filter(|f| f.is_settable()).collect();
                if settable.is_empty() {
                    return None;
                }
                Some(self.input_object(name, |_| {
                    settable
                        .iter()
                        .map(|field| entry(&field.name, create_type(field)))
                        .collect()
                }))
            }
            _ => None,
        }
    }

    /// `<Type>UpdateInput` of a node type, or of the attributes of an interface or
    /// relationship properties type.
    pub(super) fn update_input(&mut self, type_name: &Name) -> Option<Name> {
        let model = self.model;
        let name = naming::update_input(type_name);
        match model.entity(type_name)? {
            Entity::Concept(concept) => Some(self.input_object(name, |writer| {
                let mut entries = update_fields(concept.fields.values());
                for relationship in concept.relationships() {
                    let ty = writer.relationship_update_input(&concept.name, relationship);
                    entries.push(entry(&relationship.field_name, ty));
                }
                entries
            })),
            Entity::Interface(interface) => {
                let entries = update_fields(interface.fields.values());
                (!entries.is_empty()).then(|| self.input_object(name, |_| entries))
            }
            Entity::Properties(properties) => {
                let entries = update_fields(properties.fields.values());
                (!entries.is_empty()).then(|| self.input_object(name, |_| entries))
            }
            _ => None,
        }
    }

    fn relationship_create_input(&mut self, owner: &Name, relationship: &Relationship) -> Type {
        match &relationship.target {
            Target::Union { members, .. } => {
                let name = naming::relationship_input(owner, &relationship.field_name, "CreateInput");
                named(self.input_object(name, |writer| {
                    members
                        .iter()
                        .map(|member| {
                            let related = RelatedInputs::member(owner, relationship, member);
                            entry(member, named(writer.field_input(related)))
                        })
                        .collect()
                }))
            }
            _ => named(self.field_input(RelatedInputs::new(owner, relationship))),
        }
    }

    fn relationship_update_input(&mut self, owner: &Name, relationship: &Relationship) -> Type {
        match &relationship.target {
            Target::Union { members, .. } => {
                let name = naming::relationship_input(owner, &relationship.field_name, "UpdateInput");
                named(self.input_object(name, |writer| {
                    members
                        .iter()
                        .map(|member| {
                            let related = RelatedInputs::member(owner, relationship, member);
                            entry(member, related.many(writer.update_field_input(related)))
                        })
                        .collect()
                }))
            }
            _ => {
                let related = RelatedInputs::new(owner, relationship);
                related.many(self.update_field_input(related))
            }
        }
    }

    /// The node type nested operations other than create apply to: concrete targets and
    /// union members.
    fn nested_concept(&self, related: RelatedInputs<'_>) -> Option<&'a ConceptType> {
        let model = self.model;
        model.concept(related.target())
    }

    /// `<Type><Field>FieldInput`: what a create input accepts for a relationship.
    fn field_input(&mut self, related: RelatedInputs<'_>) -> Name {
        self.input_object(related.name("FieldInput"), |writer| {
            let mut entries = Vec::new();
            if let Some(create) = writer.create_field_input(related) {
                entries.push(entry("create", related.many(create)));
            }
            let connect = writer.connect_field_input(related);
            entries.push(entry("connect", related.many(connect)));
            if let Some(connect_or_create) = writer.connect_or_create_field_input(related) {
                entries.push(entry("connectOrCreate", related.many(connect_or_create)));
            }
            entries
        })
    }

    /// The edge properties accepted when creating a relationship.
    fn edge_create(&mut self, relationship: &Relationship) -> Option<Type> {
        let model = self.model;
        let properties = model.relationship_properties.get(relationship.properties.as_ref()?)?;
        let input = self.create_input(&properties.name)?;
        let required = properties
            .fields
            .values()
            .any(|f| f.is_settable() && f.is_required() && f.default.is_none());
        Some(if required { super::required(input) } else { named(input) })
    }

    fn create_field_input(&mut self, related: RelatedInputs<'_>) -> Option<Name> {
        let node = self.create_input(related.target())?;
        let edge = self.edge_create(related.relationship);
        Some(self.input_object(related.name("CreateFieldInput"), |_| {
            let mut entries = vec![entry("node", required(node))];
            entries.extend(edge.map(|edge| entry("edge", edge)));
            entries
        }))
    }

    fn connect_field_input(&mut self, related: RelatedInputs<'_>) -> Name {
        let target = related.target();
        let nested = self.nested_concept(related);
        let node_where = self.where_input(target);
        let connect_where = self.input_object(naming::connect_where(target), |_| {
            vec![entry("node", required(node_where))]
        });
        let connect = nested.and_then(|concept| self.connect_input(concept));
        let edge = self.edge_create(related.relationship);
        self.input_object(related.name("ConnectFieldInput"), |_| {
            let mut entries = vec![entry("where", named(connect_where))];
            entries.extend(connect.map(|connect| entry("connect", list(connect))));
            entries.extend(edge.map(|edge| entry("edge", edge)));
            entries.push(entry("asDuplicate", named("Boolean")));
            entries
        })
    }

    fn connect_or_create_field_input(&mut self, related: RelatedInputs<'_>) -> Option<Name> {
        let concept = self.nested_concept(related)?;
        let unique: Vec<&Field> = concept.unique_fields().filter(|f| !f.is_list()).collect();
        if unique.is_empty() {
            return None;
        }
        let unique_where = self.input_object(naming::unique_where(&concept.name), |_| {
            unique
                .iter()
                .map(|field| entry(&field.name, named(field.type_name())))
                .collect()
        });
        let connect_or_create_where =
            self.input_object(naming::connect_or_create_where(&concept.name), |_| {
                vec![entry("node", required(unique_where))]
            });
        let on_create_node = self.input_object(naming::on_create_input(&concept.name), |_| {
            concept
                .attributes()
                .filter(|f| f.is_settable())
                .map(|field| entry(&field.name, nullable(&field.ty)))
                .collect()
        });
        let edge = self.edge_create(related.relationship);
        let on_create = self.input_object(related.name("ConnectOrCreateFieldInputOnCreate"), |_| {
            let mut entries = vec![entry("node", required(on_create_node))];
            entries.extend(edge.map(|edge| entry("edge", edge)));
            entries
        });
        Some(self.input_object(related.name("ConnectOrCreateFieldInput"), |_| {
            vec![
                entry("where", required(connect_or_create_where)),
                entry("onCreate", required(on_create)),
            ]
        }))
    }

    fn update_field_input(&mut self, related: RelatedInputs<'_>) -> Name {
        self.input_object(related.name("UpdateFieldInput"), |writer| {
            let connection_where = writer.connection_where(related.owner, related.relationship);
            let mut entries = vec![entry("where", named(connection_where))];
            if let Some(update) = writer.update_connection_input(related) {
                entries.push(entry("update", named(update)));
            }
            let connect = writer.connect_field_input(related);
            entries.push(entry("connect", related.many(connect)));
            let disconnect = writer.disconnect_field_input(related);
            entries.push(entry("disconnect", related.many(disconnect)));
            if let Some(create) = writer.create_field_input(related) {
                entries.push(entry("create", related.many(create)));
            }
            if let Some(connect_or_create) = writer.connect_or_create_field_input(related) {
                entries.push(entry("connectOrCreate", related.many(connect_or_create)));
            }
            let delete = writer.delete_field_input(related);
            entries.push(entry("delete", related.many(delete)));
            entries
        })
    }

    fn update_connection_input(&mut self, related: RelatedInputs<'_>) -> Option<Name> {
        let node = self.update_input(related.target());
        let edge = match &related.relationship.properties {
            Some(properties) => self.update_input(properties),
            None => None,
        };
        if node.is_none() && edge.is_none() {
            return None;
        }
        Some(self.input_object(related.name("UpdateConnectionInput"), |_| {
            let mut entries = Vec::new();
            entries.extend(node.map(|node| entry("node", named(node))));
            entries.extend(edge.map(|edge| entry("edge", named(edge))));
            entries
        }))
    }

    fn disconnect_field_input(&mut self, related: RelatedInputs<'_>) -> Name {
        let connection_where = self.connection_where(related.owner, related.relationship);
        let nested = self
            .nested_concept(related)
            .and_then(|concept| self.disconnect_input(concept));
        self.input_object(related.name("DisconnectFieldInput"), |_| {
            let mut entries = vec![entry("where", named(connection_where))];
            entries.extend(nested.map(|nested| entry("disconnect", list(nested))));
            entries
        })
    }

    fn delete_field_input(&mut self, related: RelatedInputs<'_>) -> Name {
        let connection_where = self.connection_where(related.owner, related.relationship);
        let nested = self
            .nested_concept(related)
            .and_then(|concept| self.delete_input(concept));
        self.input_object(related.name("DeleteFieldInput"), |_| {
            let mut entries = vec![entry("where", named(connection_where))];
            entries.extend(nested.map(|nested| entry("delete", named(nested))));
            entries
        })
    }

    /// An input keyed by the relationship fields of a node type, `None` when it has none.
    /// Union targets get an intermediate input keyed by member.
    fn per_relationship(
        &mut self,
        concept: &'a ConceptType,
        name: String,
        union_suffix: &str,
        build: fn(&mut Self, RelatedInputs<'_>) -> Name,
    ) -> Option<Name> {
        concept.relationships().next()?;
        Some(self.input_object(name, |writer| {
            concept
                .relationships()
                .map(|relationship| {
                    let ty = match &relationship.target {
                        Target::Union { members, .. } => {
                            let name = naming::relationship_input(
                                &concept.name,
                                &relationship.field_name,
                                union_suffix,
                            );
                            named(writer.input_object(name, |writer| {
                                members
                                    .iter()
                                    .map(|member| {
                                        let related =
                                            RelatedInputs::member(&concept.name, relationship, member);
                                        entry(member, related.many(build(writer, related)))
                                    })
                                    .collect()
                            }))
                        }
                        _ => {
                            let related = RelatedInputs::new(&concept.name, relationship);
                            related.many(build(writer, related))
                        }
                    };
                    entry(&relationship.field_name, ty)
                })
                .collect()
        }))
    }

    /// `<Type>ConnectInput`: nested connects below a connected node.
    fn connect_input(&mut self, concept: &'a ConceptType) -> Option<Name> {
        self.per_relationship(
            concept,
            naming::connect_input(&concept.name),
            "ConnectInput",
            Self::connect_field_input,
        )
    }

    /// `<Type>DisconnectInput`: nested disconnects below a disconnected node.
    pub(super) fn disconnect_input(&mut self, concept: &'a ConceptType) -> Option<Name> {
        self.per_relationship(
            concept,
            naming::disconnect_input(&concept.name),
            "DisconnectInput",
            Self::disconnect_field_input,
        )
    }

    /// `<Type>DeleteInput`: nested deletes below a deleted node.
    pub(super) fn delete_input(&mut self, concept: &'a ConceptType) -> Option<Name> {
        self.per_relationship(
            concept,
            naming::delete_input(&concept.name),
            "DeleteInput",
            Self::delete_field_input,
        )
    }
}
