//! Authorization: rule parsing, and the checks made before any statement is compiled.
//!
//! `filter` and `validate` rules reach the database as part of the compiled statement (see the
//! query compiler). `@authentication` only depends on the request's claims, so it is decided
//! here, without a round trip.
use std::sync::LazyLock;

use apollo_compiler::Name;
use apollo_compiler::ast;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::name;
use apollo_compiler::ty;
use tracing::debug;

use crate::config::Features;
use crate::config::RequestContext;
use crate::error::GraphCypherError;
use crate::filter::evaluate::Scope;
use crate::filter::evaluate::matches;
use crate::model::Field;
use crate::model::FieldKind;
use crate::model::JwtClaim;
use crate::model::JwtType;
use crate::model::ScalarCategory;

pub mod rules;

use rules::AuthenticationAnnotation;
use rules::AuthorizationOperation;

/// The claims of a JWT when the type definitions declare no `@jwt` type: the registered claims
/// plus `roles`.
pub(crate) static DEFAULT_JWT: LazyLock<JwtType> = LazyLock::new(|| {
    let claims = [
        (name!("iss"), ty!(String), ScalarCategory::String),
        (name!("sub"), ty!(String), ScalarCategory::String),
        (name!("aud"), ty!(String), ScalarCategory::String),
        (name!("exp"), ty!(Int), ScalarCategory::Int),
        (name!("nbf"), ty!(Int), ScalarCategory::Int),
        (name!("iat"), ty!(Int), ScalarCategory::Int),
        (name!("jti"), ty!(String), ScalarCategory::String),
        (name!("roles"), ty!([String!]), ScalarCategory::String),
    ];
    JwtType {
        name: name!("JWT"),
        claims: claims
            .into_iter()
            .map(|(name, ty, category)| {
                let claim = JwtClaim {
                    path: vec![name.to_string()],
                    field: claim_field(name.clone(), ty, category),
                };
                (name, claim)
            })
            .collect::<IndexMap<_, _>>(),
    }
});

fn claim_field(name: Name, ty: ast::Type, category: ScalarCategory) -> Field {
    Field {
        db_property: name.to_string(),
        name,
        ty,
        description: None,
        kind: FieldKind::Attribute(category),
        default: None,
        autogenerate: false,
        unique: false,
        timestamps: Vec::new(),
        authorization: None,
        authentication: None,
        passthrough: ast::DirectiveList::new(),
        arguments: Vec::new(),
    }
}

/// Requires a token when global authentication is enabled.
pub(crate) fn check_global_authentication(
    features: &Features,
    context: &RequestContext,
) -> Result<(), GraphCypherError> {
    let required = features
        .authorization
        .as_ref()
        .is_some_and(|a| a.global_authentication);
    if required && !context.is_authenticated() {
        debug!("global authentication required, request has no token");
        return Err(GraphCypherError::Unauthenticated);
    }
    Ok(())
}

/// Checks an `@authentication` annotation for one operation.
///
/// A request without a token is `Unauthenticated`; a token whose claims do not match the
/// annotation's `jwt` filter is `Forbidden`.
pub(crate) fn authenticate(
    annotation: Option<&AuthenticationAnnotation>,
    operation: AuthorizationOperation,
    context: &RequestContext,
) -> Result<(), GraphCypherError> {
    let Some(annotation) = annotation.filter(|a| a.applies_to(operation)) else {
        return Ok(());
    };
    let Some(jwt) = &context.jwt else {
        return Err(GraphCypherError::Unauthenticated);
    };
    match &annotation.jwt {
        Some(filter) if !matches(filter, Scope::jwt_only(Some(jwt))) => {
            Err(GraphCypherError::Forbidden)
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::AuthorizationFeature;
    use crate::model::TypeModel;

    fn annotation(type_defs: &str) -> AuthenticationAnnotation {
        let model = TypeModel::build(type_defs).unwrap();
        model
            .concept("Post")
            .unwrap()
            .authentication
            .clone()
            .unwrap()
    }

    fn context(jwt: serde_json::Value) -> RequestContext {
        RequestContext::with_jwt(jwt.as_object().unwrap().clone())
    }

    #[test]
    fn authentication_requires_a_token() {
        let annotation = annotation("type Post @authentication { id: ID }");
        assert_eq!(
            authenticate(
                Some(&annotation),
                AuthorizationOperation::Read,
                &RequestContext::default()
            ),
            Err(GraphCypherError::Unauthenticated)
        );
        assert_eq!(
            authenticate(
                Some(&annotation),
                AuthorizationOperation::Read,
                &context(json!({ "sub": "a" }))
            ),
            Ok(())
        );
    }

    #[test]
    fn authentication_only_applies_to_its_operations() {
        let annotation = annotation("type Post @authentication(operations: [DELETE]) { id: ID }");
        assert_eq!(
            authenticate(
                Some(&annotation),
                AuthorizationOperation::Read,
                &RequestContext::default()
            ),
            Ok(())
        );
    }

    #[test]
    fn authentication_claims_must_match() {
        let annotation = annotation(
            r#"type Post @authentication(jwt: { roles_INCLUDES: "admin" }) { id: ID }"#,
        );
        assert_eq!(
            authenticate(
                Some(&annotation),
                AuthorizationOperation::Create,
                &context(json!({ "roles": ["user"] }))
            ),
            Err(GraphCypherError::Forbidden)
        );
        assert_eq!(
            authenticate(
                Some(&annotation),
                AuthorizationOperation::Create,
                &context(json!({ "roles": ["admin"] }))
            ),
            Ok(())
        );
    }

    #[test]
    fn global_authentication() {
        let features = Features {
            authorization: Some(AuthorizationFeature {
                global_authentication: true,
            }),
            ..Default::default()
        };
        assert_eq!(
            check_global_authentication(&features, &RequestContext::default()),
            Err(GraphCypherError::Unauthenticated)
        );
        assert_eq!(
            check_global_authentication(&Features::default(), &RequestContext::default()),
            Ok(())
        );
    }
}
