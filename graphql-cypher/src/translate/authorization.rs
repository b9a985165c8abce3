//! `@authorization` rules as Cypher.
//!
//! Filter rules become extra predicates of the `WHERE` that matches the nodes. Validate rules
//! become `apoc.util.validatePredicate` calls that abort the statement with a marker the
//! execution adapter turns into `Forbidden`.
use super::NodeSet;
use super::Translator;
use super::cypher;
use crate::auth::rules::AuthorizationAnnotation;
use crate::auth::rules::AuthorizationOperation;
use crate::auth::rules::ValidationWhen;
use crate::error::CompileError;
use crate::error::FORBIDDEN_MARKER;
use crate::filter::Filter;
use crate::model::ConceptType;
use crate::model::Field;

/// Aborts the statement unless `predicate` holds.
pub(super) fn validate_clause(predicate: &str) -> String {
    format!("WITH *\nWHERE apoc.util.validatePredicate(NOT ({predicate}), \"{FORBIDDEN_MARKER}\", [0])")
}

impl<'a> Translator<'a> {
    /// The annotations a node type is subject to: its own and those of its interfaces.
    fn annotations(&self, concept: &'a ConceptType) -> Vec<&'a AuthorizationAnnotation> {
        let model = self.model;
        concept
            .authorization
            .iter()
            .chain(
                concept
                    .interfaces
                    .iter()
                    .filter_map(|name| model.interfaces.get(name))
                    .filter_map(|interface| interface.authorization.as_ref()),
            )
            .collect()
    }

    /// One rule. `None` when the rule always holds.
    fn rule(
        &mut self,
        require_authentication: bool,
        predicate: Option<&Filter>,
        variable: &str,
    ) -> Result<Option<String>, CompileError> {
        let mut parts = Vec::new();
        if require_authentication {
            parts.push(format!("{} = true", self.env.is_authenticated()));
        }
        if let Some(predicate) = predicate {
            let nested = std::mem::replace(&mut self.in_rule, true);
            let compiled = self.predicate(predicate, variable, None);
            self.in_rule = nested;
            let compiled = compiled?;
            if compiled != "true" {
                parts.push(compiled);
            }
        }
        Ok(cypher::and(parts))
    }

    /// Any of the rules. `None` when there are none or one of them always holds.
    fn any_rule(
        &mut self,
        rules: Vec<(bool, Option<&Filter>)>,
        variable: &str,
    ) -> Result<Option<String>, CompileError> {
        let mut branches = Vec::new();
        for (require_authentication, predicate) in rules {
            match self.rule(require_authentication, predicate, variable)? {
                Some(branch) => branches.push(branch),
                None => return Ok(None),
            }
        }
        Ok(cypher::or(branches))
    }

    /// The filter rules of one node type for an operation.
    pub(super) fn auth_filter(
        &mut self,
        concept: &'a ConceptType,
        variable: &str,
        operation: AuthorizationOperation,
    ) -> Result<Option<String>, CompileError> {
        let mut parts = Vec::new();
        for annotation in self.annotations(concept) {
            let rules = annotation
                .filters_for(operation)
                .map(|rule| (rule.require_authentication, rule.predicate.as_ref()))
                .collect::<Vec<_>>();
            parts.extend(self.any_rule(rules, variable)?);
        }
        Ok(cypher::and(parts))
    }

    /// The filter rules of a node set: each node is checked against the rules of its type.
    pub(super) fn set_filter(
        &mut self,
        set: &NodeSet<'a>,
        variable: &str,
        operation: AuthorizationOperation,
    ) -> Result<Option<String>, CompileError> {
        if !set.is_abstract {
            return match set.concepts.first().copied() {
                Some(concept) => self.auth_filter(concept, variable, operation),
                None => Ok(None),
            };
        }
        let mut branches = Vec::new();
        let mut restricted = false;
        for concept in set.concepts.iter().copied() {
            let filter = self.auth_filter(concept, variable, operation)?;
            restricted |= filter.is_some();
            let mut parts = vec![concept.label_check(variable)];
            parts.extend(filter);
            branches.extend(cypher::and(parts));
        }
        Ok(if restricted {
            cypher::or(branches)
        } else {
            None
        })
    }

    pub(super) fn read_filter(&mut self, set: &NodeSet<'a>, variable: &str) -> Result<Option<String>, CompileError> {
        self.set_filter(set, variable, AuthorizationOperation::Read)
    }

    /// The validate rules of a node type and of the given fields of it, as a clause.
    pub(super) fn auth_validate(
        &mut self,
        concept: &'a ConceptType,
        variable: &str,
        operation: AuthorizationOperation,
        when: ValidationWhen,
        fields: &[&'a Field],
    ) -> Result<Option<String>, CompileError> {
        let predicate = self.validate_predicate(concept, variable, operation, when, fields)?;
        Ok(predicate.map(|p| validate_clause(&p)))
    }

    pub(super) fn validate_predicate(
        &mut self,
        concept: &'a ConceptType,
        variable: &str,
        operation: AuthorizationOperation,
        when: ValidationWhen,
        fields: &[&'a Field],
    ) -> Result<Option<String>, CompileError> {
        let mut annotations = self.annotations(concept);
        annotations.extend(fields.iter().filter_map(|field| field.authorization.as_ref()));
        // Reads have no before and after.
        let reading = matches!(
            operation,
            AuthorizationOperation::Read | AuthorizationOperation::Aggregate
        );
        let mut parts = Vec::new();
        for annotation in annotations {
            let rules = annotation
                .validate
                .iter()
                .filter(|rule| {
                    rule.operations.contains(&operation) && (reading || rule.when.contains(&when))
                })
                .map(|rule| (rule.require_authentication, rule.predicate.as_ref()))
                .collect::<Vec<_>>();
            parts.extend(self.any_rule(rules, variable)?);
        }
        Ok(cypher::and(parts))
    }

    /// The validate rules of a node set as a clause.
    pub(super) fn set_validate(
        &mut self,
        set: &NodeSet<'a>,
        variable: &str,
        operation: AuthorizationOperation,
        when: ValidationWhen,
    ) -> Result<Option<String>, CompileError> {
        if !set.is_abstract {
            return match set.concepts.first().copied() {
                Some(concept) => self.auth_validate(concept, variable, operation, when, &[]),
                None => Ok(None),
            };
        }
        let mut branches = Vec::new();
        let mut restricted = false;
        for concept in set.concepts.iter().copied() {
            let predicate = self.validate_predicate(concept, variable, operation, when, &[])?;
            restricted |= predicate.is_some();
            let mut parts = vec![concept.label_check(variable)];
            parts.extend(predicate);
            branches.extend(cypher::and(parts));
        }
        Ok(if restricted {
            cypher::or(branches).map(|p| validate_clause(&p))
        } else {
            None
        })
    }

    /// The read filter of one field: the field reads as null where it does not hold.
    pub(super) fn field_read_filter(
        &mut self,
        field: &'a Field,
        variable: &str,
    ) -> Result<Option<String>, CompileError> {
        let Some(annotation) = &field.authorization else {
            return Ok(None);
        };
        let rules = annotation
            .filters_for(AuthorizationOperation::Read)
            .map(|rule| (rule.require_authentication, rule.predicate.as_ref()))
            .collect::<Vec<_>>();
        self.any_rule(rules, variable)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::Features;
    use crate::config::RequestContext;
    use crate::model::TypeModel;

    const TYPE_DEFS: &str = r#"
        type Post @authorization(
            filter: [{ where: { node: { author: { id: "$jwt.sub" } } } }]
            validate: [{ operations: [DELETE], where: { jwt: { roles_INCLUDES: "admin" } } }]
        ) {
            title: String
            secret: String @authorization(filter: [{ requireAuthentication: false, where: { jwt: { roles_INCLUDES: "staff" } } }])
            author: User! @relationship(type: "WROTE", direction: IN)
        }
        type User @authorization(filter: [{ where: { node: { id: "$jwt.sub" } } }]) {
            id: ID!
        }
    "#;

    #[test]
    fn filter_rules_require_authentication_and_skip_nested_rules() {
        let model = TypeModel::build(TYPE_DEFS).unwrap();
        let (features, context) = (Features::default(), RequestContext::default());
        let mut translator = Translator::new(&model, &features, &context);
        let post = model.concept("Post").unwrap();
        let filter = translator
            .auth_filter(post, "this", AuthorizationOperation::Read)
            .unwrap();
        assert_eq!(
            filter.as_deref(),
            Some(
                "($isAuthenticated = true) AND (EXISTS { MATCH (this)<-[:WROTE]-(this0:User) WHERE ($jwt.sub IS NOT NULL AND this0.id = $jwt.sub) })"
            )
        );
        assert!(translator.env.uses_auth);
    }

    #[test]
    fn validate_rules_only_apply_to_their_operations() {
        let model = TypeModel::build(TYPE_DEFS).unwrap();
        let (features, context) = (Features::default(), RequestContext::default());
        let mut translator = Translator::new(&model, &features, &context);
        let post = model.concept("Post").unwrap();
        assert_eq!(
            translator
                .auth_validate(post, "this", AuthorizationOperation::Update, ValidationWhen::Before, &[])
                .unwrap(),
            None
        );
        let clause = translator
            .auth_validate(post, "this", AuthorizationOperation::Delete, ValidationWhen::Before, &[])
            .unwrap()
            .unwrap();
        assert_eq!(
            clause,
            format!(
                "WITH *\nWHERE apoc.util.validatePredicate(NOT (($isAuthenticated = true) AND (($jwt.roles IS NOT NULL AND $param0 IN $jwt.roles))), \"{FORBIDDEN_MARKER}\", [0])"
            )
        );
    }

    #[test]
    fn claims_compared_as_subjects_must_be_present() {
        let model = TypeModel::build(TYPE_DEFS).unwrap();
        let features = Features::default();
        let context = RequestContext::with_jwt(serde_json::json!({ "sub": "1" }).as_object().unwrap().clone());
        let mut translator = Translator::new(&model, &features, &context);
        let post = model.concept("Post").unwrap();
        let predicate = translator
            .validate_predicate(post, "this", AuthorizationOperation::Delete, ValidationWhen::Before, &[])
            .unwrap()
            .unwrap();
        // Without the guard a token lacking `roles` makes the rule unknown instead of false.
        assert!(predicate.contains("$jwt.roles IS NOT NULL AND $param0 IN $jwt.roles"), "{predicate}");
    }

    #[test]
    fn field_filters() {
        let model = TypeModel::build(TYPE_DEFS).unwrap();
        let (features, context) = (Features::default(), RequestContext::default());
        let mut translator = Translator::new(&model, &features, &context);
        let secret = &model.concept("Post").unwrap().fields["secret"];
        assert_eq!(
            translator.field_read_filter(secret, "this").unwrap().as_deref(),
            Some("($jwt.roles IS NOT NULL AND $param0 IN $jwt.roles)")
        );
    }
}
