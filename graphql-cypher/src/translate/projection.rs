//! Projections of selected fields.
//!
//! A node is projected as a map projection keyed by response key. Every field that needs more
//! than a property access (relationships, connections, aggregations, custom Cypher) is
//! computed by a `CALL` subquery ahead of the projection and referenced by its variable.
use apollo_compiler::collections::IndexMap;
use serde_json::Value;

use super::NodeSet;
use super::Translator;
use super::authorization::validate_clause;
use super::cypher;
use super::selection::SelectedField;
use super::selection::SelectionSet;
use super::shape::ObjectShape;
use super::shape::RESOLVE_TYPE;
use super::shape::Shape;
use super::shape::ShapeField;
use super::shape::ShapeKind;
use crate::auth::rules::AuthorizationOperation;
use crate::auth::rules::ValidationWhen;
use crate::error::CompileError;
use crate::error::GraphCypherError;
use crate::filter::Filter;
use crate::filter::FilterParser;
use crate::model::ConceptType;
use crate::model::Entity;
use crate::model::Field;
use crate::model::FieldKind;
use crate::model::PropertiesType;
use crate::model::Relationship;
use crate::model::ScalarCategory;

pub(crate) const TYPENAME: &str = "__typename";

/// The projection of one node variable.
#[derive(Debug)]
pub(super) struct Projection {
    /// Validate rules of the node and of its selected fields.
    pub(super) validation: Option<String>,
    pub(super) subqueries: Vec<String>,
    pub(super) expression: String,
    pub(super) shape: Shape,
}

impl Projection {
    /// The clauses to run before `expression` can be evaluated.
    pub(super) fn clauses(&mut self) -> Vec<String> {
        let mut clauses: Vec<String> = self.validation.take().into_iter().collect();
        clauses.append(&mut self.subqueries);
        clauses
    }
}

/// A map projection, `{}` when nothing is selected.
fn map_projection(variable: &str, entries: &[String]) -> String {
    if entries.is_empty() {
        "{}".to_owned()
    } else {
        format!("{variable} {{ {} }}", entries.join(", "))
    }
}

/// The expression reading an attribute.
pub(super) fn attribute(variable: &str, field: &Field, category: ScalarCategory) -> String {
    let value = cypher::property(variable, &field.db_property);
    match category {
        ScalarCategory::DateTime | ScalarCategory::Date if field.is_list() => {
            format!("[value IN {value} | toString(value)]")
        }
        ScalarCategory::DateTime | ScalarCategory::Date => format!("toString({value})"),
        _ => value,
    }
}

impl<'a> Translator<'a> {
    pub(super) fn set_entity(&self, set: &NodeSet<'a>) -> Result<Entity<'a>, CompileError> {
        self.model
            .entity(set.name)
            .ok_or_else(|| CompileError::UnknownField {
                type_name: set.name.clone(),
                field: "<node>".to_owned(),
            })
    }

    /// The `where` argument of a field, parsed against a node set.
    pub(super) fn where_filter(
        &self,
        set: &NodeSet<'a>,
        field: &SelectedField,
    ) -> Result<Option<Filter>, CompileError> {
        let Some(value) = field.object_argument("where")? else {
            return Ok(None);
        };
        FilterParser::new(self.model).parse(self.set_entity(set)?, value)
    }

    /// Sort entries, e.g. `this.title ASC`.
    pub(super) fn sort_items(
        &self,
        entity: Entity<'a>,
        variable: &str,
        sort: &Value,
    ) -> Result<Vec<String>, CompileError> {
        let items: Vec<&Value> = match sort {
            Value::Array(items) => items.iter().collect(),
            Value::Object(_) => vec![sort],
            Value::Null => Vec::new(),
            _ => {
                return Err(CompileError::InvalidArgument {
                    key: "sort".to_owned(),
                    message: "expected a list of sort inputs".to_owned(),
                });
            }
        };
        let mut order = Vec::new();
        for item in items {
            let object = item.as_object().ok_or_else(|| CompileError::InvalidArgument {
                key: "sort".to_owned(),
                message: "expected a sort input".to_owned(),
            })?;
            for (key, direction) in object {
                if direction.is_null() {
                    continue;
                }
                let field = entity.field(key).ok_or_else(|| CompileError::UnknownField {
                    type_name: entity.name().clone(),
                    field: key.clone(),
                })?;
                match field.scalar_category() {
                    Some(category) if category.is_sortable() && !field.is_list() => {}
                    _ => {
                        return Err(CompileError::UnsortableField {
                            type_name: entity.name().clone(),
                            field: key.clone(),
                        });
                    }
                }
                let direction = match direction.as_str() {
                    Some("ASC") => "ASC",
                    Some("DESC") => "DESC",
                    _ => {
                        return Err(CompileError::InvalidArgument {
                            key: key.clone(),
                            message: "expected ASC or DESC".to_owned(),
                        });
                    }
                };
                order.push(format!(
                    "{} {direction}",
                    cypher::property(variable, &field.db_property)
                ));
            }
        }
        Ok(order)
    }

    /// `ORDER BY`, `SKIP` and `LIMIT` of a list field, from `options` or the equivalent
    /// top level arguments.
    pub(super) fn paging(
        &mut self,
        set: &NodeSet<'a>,
        variable: &str,
        field: &SelectedField,
    ) -> Result<Vec<String>, CompileError> {
        let options = field.object_argument("options")?;
        let argument = |name: &str| {
            options
                .and_then(|options| options.get(name))
                .filter(|value| !value.is_null())
                .or_else(|| field.argument(name))
        };
        let order = match argument("sort") {
            Some(sort) => self.sort_items(self.set_entity(set)?, variable, sort)?,
            None => Vec::new(),
        };
        let offset = argument("offset").cloned();
        let limit = argument("limit").cloned();
        Ok(self.page_clauses(order, offset, limit))
    }

    pub(super) fn page_clauses(
        &mut self,
        order: Vec<String>,
        offset: Option<Value>,
        limit: Option<Value>,
    ) -> Vec<String> {
        let mut clauses = Vec::new();
        if order.is_empty() && offset.is_none() && limit.is_none() {
            return clauses;
        }
        clauses.push("WITH *".to_owned());
        if !order.is_empty() {
            clauses.push(format!("ORDER BY {}", order.join(", ")));
        }
        if let Some(offset) = offset {
            clauses.push(format!("SKIP {}", self.env.param(offset)));
        }
        if let Some(limit) = limit {
            clauses.push(format!("LIMIT {}", self.env.param(limit)));
        }
        clauses
    }

    /// Projects the selection of the nodes of a set bound to `variable`.
    pub(super) fn project(
        &mut self,
        set: &NodeSet<'a>,
        variable: &str,
        selection: &SelectionSet,
    ) -> Result<Projection, GraphCypherError> {
        let mut subqueries = Vec::new();
        let mut validations = Vec::new();
        let mut validated = false;
        let mut branches = Vec::new();
        let mut types = IndexMap::default();
        for concept in set.concepts.iter().copied() {
            let fields = selection.fields_for(self.model, concept);
            self.authenticate(concept, AuthorizationOperation::Read, fields.iter().map(|f| &f.name))?;
            let model_fields: Vec<&'a Field> = fields
                .iter()
                .filter_map(|f| concept.fields.get(&f.name))
                .collect();
            let validation = self.validate_predicate(
                concept,
                variable,
                AuthorizationOperation::Read,
                ValidationWhen::Before,
                &model_fields,
            )?;
            validated |= validation.is_some();
            if set.is_abstract {
                let mut parts = vec![concept.label_check(variable)];
                parts.extend(validation);
                validations.extend(cypher::and(parts));
            } else {
                validations.extend(validation);
            }

            let mut entries = Vec::new();
            if set.is_abstract {
                entries.push(format!("{RESOLVE_TYPE}: \"{}\"", concept.name));
            }
            let mut shape_fields = Vec::new();
            for field in &fields {
                let kind = if field.name == TYPENAME {
                    ShapeKind::Typename
                } else {
                    let (entry, shape) = self.project_field(concept, variable, field, &mut subqueries)?;
                    entries.extend(entry);
                    ShapeKind::Data(shape)
                };
                shape_fields.push(ShapeField {
                    response_key: field.response_key.clone(),
                    kind,
                });
            }
            types.insert(concept.name.clone(), shape_fields);
            branches.push((concept, map_projection(variable, &entries)));
        }

        let expression = if set.is_abstract {
            let cases: Vec<String> = branches
                .iter()
                .map(|(concept, map)| format!("WHEN {} THEN {map}", concept.label_check(variable)))
                .collect();
            format!("CASE {} END", cases.join(" "))
        } else {
            branches
                .pop()
                .map(|(_, map)| map)
                .unwrap_or_else(|| "{}".to_owned())
        };
        let validation = if !validated {
            None
        } else if set.is_abstract {
            cypher::or(validations).map(|p| validate_clause(&p))
        } else {
            cypher::and(validations).map(|p| validate_clause(&p))
        };
        Ok(Projection {
            validation,
            subqueries,
            expression,
            shape: Shape::Object(ObjectShape {
                types,
                is_abstract: set.is_abstract,
            }),
        })
    }

    /// One map projection entry, `None` for fields read as null.
    fn project_field(
        &mut self,
        concept: &'a ConceptType,
        variable: &str,
        field: &SelectedField,
        subqueries: &mut Vec<String>,
    ) -> Result<(Option<String>, Shape), GraphCypherError> {
        let key = cypher::escape(&field.response_key);
        if let Some(model_field) = concept.fields.get(&field.name) {
            // Only the keys of entities resolved by another subgraph are stored here.
            if !concept.is_resolvable()
                && !concept
                    .keys
                    .iter()
                    .any(|k| k.field_names.contains(&model_field.name))
            {
                return Ok((None, Shape::Value));
            }
            return match &model_field.kind {
                FieldKind::Attribute(category) => {
                    let mut value = attribute(variable, model_field, *category);
                    if let Some(filter) = self.field_read_filter(model_field, variable)? {
                        value = format!("CASE WHEN {filter} THEN {value} ELSE null END");
                    }
                    Ok((Some(format!("{key}: {value}")), Shape::Value))
                }
                FieldKind::Relationship(relationship) => {
                    let (call, result, shape) = self.relationship_subquery(variable, relationship, field)?;
                    subqueries.push(call);
                    Ok((Some(format!("{key}: {result}")), shape))
                }
                FieldKind::Cypher(annotation) => {
                    let (call, result, shape) =
                        self.cypher_field_subquery(variable, model_field, annotation, field)?;
                    subqueries.push(call);
                    Ok((Some(format!("{key}: {result}")), shape))
                }
            };
        }
        let relationship = |suffix: &str| {
            field
                .name
                .strip_suffix(suffix)
                .and_then(|name| concept.fields.get(name))
                .and_then(Field::relationship)
        };
        if let Some(relationship) = relationship("Connection") {
            let (call, result, shape) =
                self.connection_subquery(concept, variable, relationship, field)?;
            subqueries.push(call);
            return Ok((Some(format!("{key}: {result}")), shape));
        }
        if let Some(relationship) = relationship("Aggregate").filter(|r| r.aggregate) {
            let (call, result) = self.aggregate_subquery(concept, variable, relationship, field)?;
            subqueries.push(call);
            return Ok((Some(format!("{key}: {result}")), Shape::Value));
        }
        Err(CompileError::UnknownField {
            type_name: concept.name.clone(),
            field: field.name.to_string(),
        }
        .into())
    }

    /// A subquery collecting the projected related nodes of `variable`.
    pub(super) fn relationship_subquery(
        &mut self,
        variable: &str,
        relationship: &'a Relationship,
        field: &SelectedField,
    ) -> Result<(String, String, Shape), GraphCypherError> {
        let target = self.node_set(relationship.target.name())?;
        let target_var = self.env.this();
        let pattern = relationship.pattern(
            variable,
            "",
            &target.node_pattern(&target_var),
            relationship.reads_directed(),
        );
        let mut predicates = Vec::new();
        predicates.extend(target.label_predicate(&target_var));
        let filter = self.where_filter(&target, field)?;
        self.push_predicate(&mut predicates, filter.as_ref(), &target_var, None)?;
        predicates.extend(self.read_filter(&target, &target_var)?);

        let mut body = vec![format!("WITH {variable}"), format!("MATCH {pattern}")];
        body.extend(cypher::where_clause(cypher::and(predicates)));
        body.extend(self.paging(&target, &target_var, field)?);
        let mut projection = self.project(&target, &target_var, &field.selection)?;
        body.extend(projection.clauses());
        let projected = self.env.var();
        body.push(format!("WITH {} AS {projected}", projection.expression));
        let result = self.env.var();
        body.push(if relationship.is_list {
            format!("RETURN collect({projected}) AS {result}")
        } else {
            format!("RETURN head(collect({projected})) AS {result}")
        });
        Ok((cypher::call(&body), result, projection.shape))
    }

    /// Projects the selected properties of a relationship.
    pub(super) fn project_properties(
        &mut self,
        properties: &'a PropertiesType,
        variable: &str,
        selection: &SelectionSet,
    ) -> Result<(String, Shape), GraphCypherError> {
        let mut entries = Vec::new();
        let mut shape_fields = Vec::new();
        for field in selection.fields() {
            let kind = if field.name == TYPENAME {
                ShapeKind::Typename
            } else {
                let model_field = properties.fields.get(&field.name).ok_or_else(|| {
                    CompileError::UnknownField {
                        type_name: properties.name.clone(),
                        field: field.name.to_string(),
                    }
                })?;
                if let FieldKind::Attribute(category) = model_field.kind {
                    entries.push(format!(
                        "{}: {}",
                        cypher::escape(&field.response_key),
                        attribute(variable, model_field, category)
                    ));
                }
                ShapeKind::Data(Shape::Value)
            };
            shape_fields.push(ShapeField {
                response_key: field.response_key,
                kind,
            });
        }
        let mut types = IndexMap::default();
        types.insert(properties.name.clone(), shape_fields);
        Ok((
            map_projection(variable, &entries),
            Shape::Object(ObjectShape {
                types,
                is_abstract: false,
            }),
        ))
    }
}
