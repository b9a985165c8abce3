//! Filters to Cypher predicates.
use itertools::Itertools;
use serde_json::Value;

use super::NodeSet;
use super::Translator;
use super::cypher;
use crate::error::CompileError;
use crate::filter::CountFilter;
use crate::filter::Filter;
use crate::filter::FilterValue;
use crate::filter::Operator;
use crate::filter::PropertyFilter;
use crate::filter::Quantifier;
use crate::filter::RelationshipFilter;
use crate::filter::Subject;

impl<'a> Translator<'a> {
    /// Compiles a filter on the node bound to `node`. Connection filters also see the
    /// relationship bound to `relationship`.
    pub(super) fn predicate(
        &mut self,
        filter: &Filter,
        node: &str,
        relationship: Option<&str>,
    ) -> Result<String, CompileError> {
        Ok(match filter {
            Filter::And(filters) => {
                let parts = self.predicates(filters, node, relationship)?;
                cypher::and(parts).unwrap_or_else(|| "true".to_owned())
            }
            Filter::Or(filters) => {
                let parts = self.predicates(filters, node, relationship)?;
                cypher::or(parts).unwrap_or_else(|| "false".to_owned())
            }
            Filter::Not(filter) => format!("NOT ({})", self.predicate(filter, node, relationship)?),
            Filter::Property(property) => self.property_predicate(property, node),
            Filter::Relationship(filter) => self.relationship_predicate(filter, node, false)?,
            Filter::Connection(filter) => self.relationship_predicate(filter, node, true)?,
            Filter::Count(filter) => self.count_predicate(filter, node)?,
            Filter::Implementation { type_name, filter } => {
                let concept = self.concept(type_name)?;
                let inner = self.predicate(filter, node, relationship)?;
                let mut parts = vec![concept.label_check(node)];
                if inner != "true" {
                    parts.push(inner);
                }
                cypher::and(parts).unwrap_or_else(|| "true".to_owned())
            }
            Filter::Node(filter) => self.predicate(filter, node, None)?,
            Filter::Edge(filter) => {
                let relationship = relationship.ok_or_else(|| CompileError::InvalidOperation {
                    message: "edge filter outside of a connection".to_owned(),
                })?;
                self.predicate(filter, relationship, None)?
            }
        })
    }

    fn predicates(
        &mut self,
        filters: &[Filter],
        node: &str,
        relationship: Option<&str>,
    ) -> Result<Vec<String>, CompileError> {
        filters
            .iter()
            .map(|filter| self.predicate(filter, node, relationship))
            .collect()
    }

    /// Compiles an optional `where` and appends it to `predicates`.
    pub(super) fn push_predicate(
        &mut self,
        predicates: &mut Vec<String>,
        filter: Option<&Filter>,
        node: &str,
        relationship: Option<&str>,
    ) -> Result<(), CompileError> {
        if let Some(filter) = filter {
            let predicate = self.predicate(filter, node, relationship)?;
            if predicate != "true" {
                predicates.push(predicate);
            }
        }
        Ok(())
    }

    fn property_predicate(&mut self, filter: &PropertyFilter, node: &str) -> String {
        let subject = match &filter.subject {
            Subject::Property(property) => cypher::property(node, property),
            Subject::Jwt(path) => self.env.jwt(path),
        };
        let (comparison, negate) = match filter.operator {
            Operator::Equal => ("=", false),
            Operator::Not => ("=", true),
            Operator::In => ("IN", false),
            Operator::NotIn => ("IN", true),
            Operator::Contains => ("CONTAINS", false),
            Operator::NotContains => ("CONTAINS", true),
            Operator::StartsWith => ("STARTS WITH", false),
            Operator::NotStartsWith => ("STARTS WITH", true),
            Operator::EndsWith => ("ENDS WITH", false),
            Operator::NotEndsWith => ("ENDS WITH", true),
            Operator::Lt => ("<", false),
            Operator::Lte => ("<=", false),
            Operator::Gt => (">", false),
            Operator::Gte => (">=", false),
            Operator::Includes => ("INCLUDES", false),
            Operator::NotIncludes => ("INCLUDES", true),
        };
        if let FilterValue::Literal(Value::Null) = &filter.value {
            return if negate {
                format!("{subject} IS NOT NULL")
            } else {
                format!("{subject} IS NULL")
            };
        }
        let list_value = comparison == "IN" || (comparison == "=" && filter.list);
        let mut guards = Vec::new();
        if let Subject::Jwt(_) = &filter.subject {
            guards.push(subject.clone());
        }
        let value = match &filter.value {
            FilterValue::Literal(value) => {
                let param = self.env.param(value.clone());
                cypher::typed_value(filter.category, &param, list_value)
            }
            FilterValue::Jwt(path) => {
                let reference = self.env.jwt(path);
                guards.push(reference.clone());
                reference
            }
        };
        let mut predicate = match comparison {
            "INCLUDES" => format!("{value} IN {subject}"),
            _ => format!("{subject} {comparison} {value}"),
        };
        if negate {
            predicate = format!("NOT ({predicate})");
        }
        // A missing claim never matches, not even a negated comparison.
        if guards.is_empty() {
            return predicate;
        }
        let guards = guards
            .iter()
            .map(|reference| format!("{reference} IS NOT NULL"))
            .join(" AND ");
        format!("({guards} AND {predicate})")
    }

    /// The part shared by every subquery over related nodes: the node type check of abstract
    /// targets and the target's read rules.
    fn target_predicates(&mut self, target: &NodeSet<'a>, variable: &str) -> Result<Vec<String>, CompileError> {
        let mut predicates = Vec::new();
        predicates.extend(target.label_predicate(variable));
        if !self.in_rule {
            predicates.extend(self.read_filter(target, variable)?);
        }
        Ok(predicates)
    }

    fn relationship_predicate(
        &mut self,
        filter: &RelationshipFilter,
        node: &str,
        connection: bool,
    ) -> Result<String, CompileError> {
        let relationship = &filter.relationship;
        let target = self.node_set(relationship.target.name())?;
        let target_var = self.env.this();
        let rel_var = if connection { self.env.this() } else { String::new() };
        let pattern = relationship.pattern(
            node,
            &rel_var,
            &target.node_pattern(&target_var),
            relationship.reads_directed(),
        );
        let base = self.target_predicates(&target, &target_var)?;
        let inner = match &filter.filter {
            Some(inner) => {
                let rel = connection.then_some(rel_var.as_str());
                Some(self.predicate(inner, &target_var, rel)?)
            }
            None => None,
        };
        let subquery = |keyword: &str, predicates: Vec<String>| match cypher::and(predicates) {
            Some(predicate) => format!("{keyword} {{ MATCH {pattern} WHERE {predicate} }}"),
            None => format!("{keyword} {{ MATCH {pattern} }}"),
        };
        let with_inner = |mut predicates: Vec<String>| {
            predicates.extend(inner.clone());
            predicates
        };
        Ok(match filter.quantifier {
            Quantifier::Some => subquery("EXISTS", with_inner(base)),
            Quantifier::None => format!("NOT {}", subquery("EXISTS", with_inner(base))),
            Quantifier::Single => format!("{} = 1", subquery("COUNT", with_inner(base))),
            Quantifier::All => match &inner {
                None => subquery("EXISTS", base),
                Some(inner) => {
                    let mut violations = base.clone();
                    violations.push(format!("NOT ({inner})"));
                    format!(
                        "({} AND NOT {})",
                        subquery("EXISTS", base),
                        subquery("EXISTS", violations)
                    )
                }
            },
        })
    }

    fn count_predicate(&mut self, filter: &CountFilter, node: &str) -> Result<String, CompileError> {
        let relationship = &filter.relationship;
        let target = self.node_set(relationship.target.name())?;
        let target_var = self.env.this();
        let pattern = relationship.pattern(
            node,
            "",
            &target.node_pattern(&target_var),
            relationship.reads_directed(),
        );
        let base = self.target_predicates(&target, &target_var)?;
        let count = match cypher::and(base) {
            Some(predicate) => format!("COUNT {{ MATCH {pattern} WHERE {predicate} }}"),
            None => format!("COUNT {{ MATCH {pattern} }}"),
        };
        let comparison = match filter.operator {
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            _ => "=",
        };
        let value = match &filter.value {
            FilterValue::Literal(value) => self.env.param(value.clone()),
            FilterValue::Jwt(path) => self.env.jwt(path),
        };
        Ok(format!("{count} {comparison} {value}"))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::config::Features;
    use crate::config::RequestContext;
    use crate::filter::FilterParser;
    use crate::model::Entity;
    use crate::model::TypeModel;

    const TYPE_DEFS: &str = r#"
        type Movie {
            title: String!
            released: DateTime
            tags: [String!]
            actors: [Actor!]! @relationship(type: "ACTED_IN", direction: IN, properties: "ActedIn")
        }
        type Actor {
            name: String!
        }
        type ActedIn @relationshipProperties {
            role: String
        }
    "#;

    fn compile(value: serde_json::Value) -> (String, serde_json::Map<String, Value>) {
        let model = TypeModel::build(TYPE_DEFS).unwrap();
        let features = Features::default();
        let context = RequestContext::default();
        let movie = model.concept("Movie").unwrap();
        let filter = FilterParser::new(&model)
            .parse(Entity::Concept(movie), value.as_object().unwrap())
            .unwrap()
            .unwrap();
        let mut translator = Translator::new(&model, &features, &context);
        let predicate = translator.predicate(&filter, "this", None).unwrap();
        (predicate, translator.env.into_params())
    }

    #[test]
    fn property_comparisons() {
        let (predicate, params) = compile(json!({ "title_STARTS_WITH": "The", "released_GT": "2000-01-01T00:00:00Z" }));
        assert_eq!(
            predicate,
            "(this.title STARTS WITH $param0) AND (this.released > datetime($param1))"
        );
        assert_eq!(params.get("param0"), Some(&json!("The")));
    }

    #[test]
    fn negations_and_null() {
        assert_eq!(compile(json!({ "title_NOT_IN": ["a"] })).0, "NOT (this.title IN $param0)");
        assert_eq!(compile(json!({ "title": null })).0, "this.title IS NULL");
        assert_eq!(compile(json!({ "title_NOT": null })).0, "this.title IS NOT NULL");
        assert_eq!(compile(json!({ "tags_INCLUDES": "x" })).0, "$param0 IN this.tags");
    }

    #[test]
    fn relationship_quantifiers() {
        assert_eq!(
            compile(json!({ "actors_SOME": { "name": "Keanu" } })).0,
            "EXISTS { MATCH (this)<-[:ACTED_IN]-(this0:Actor) WHERE this0.name = $param0 }"
        );
        assert_eq!(
            compile(json!({ "actors_ALL": { "name": "Keanu" } })).0,
            "(EXISTS { MATCH (this)<-[:ACTED_IN]-(this0:Actor) } AND NOT EXISTS { MATCH (this)<-[:ACTED_IN]-(this0:Actor) WHERE NOT (this0.name = $param0) })"
        );
        assert_eq!(
            compile(json!({ "actors_SINGLE": {} })).0,
            "COUNT { MATCH (this)<-[:ACTED_IN]-(this0:Actor) } = 1"
        );
    }

    #[test]
    fn connection_filters_see_the_edge() {
        assert_eq!(
            compile(json!({ "actorsConnection_NONE": { "edge": { "role": "Neo" } } })).0,
            "NOT EXISTS { MATCH (this)<-[this1:ACTED_IN]-(this0:Actor) WHERE this1.role = $param0 }"
        );
    }

    #[test]
    fn count_filters() {
        assert_eq!(
            compile(json!({ "actorsAggregate": { "count_GTE": 2 } })).0,
            "COUNT { MATCH (this)<-[:ACTED_IN]-(this0:Actor) } >= $param0"
        );
    }
}
