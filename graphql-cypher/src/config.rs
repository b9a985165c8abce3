//! Schema features and execution configuration.
//!
//! Everything here is plain serde data so that it can be loaded from the same YAML or JSON file
//! that holds the rest of an embedding server's configuration.
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// Optional features of the generated schema.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Features {
    /// Authorization settings. Declared rules always apply; this only adds requirements on
    /// top of them.
    pub authorization: Option<AuthorizationFeature>,
    /// Enables the subscription root and the emission of mutation events.
    pub subscriptions: Option<SubscriptionsFeature>,
    /// Execution settings.
    pub execution: ExecutionConfig,
}

impl FromStr for Features {
    type Err = serde_yaml::Error;

    /// Parses features from YAML. JSON is valid YAML.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_yaml::from_str(s)
    }
}

/// Authorization settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct AuthorizationFeature {
    /// When set, every operation requires a JWT, whether or not the touched types declare
    /// `@authentication`.
    pub global_authentication: bool,
}

/// Subscription settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct SubscriptionsFeature {
    /// Capacity of each subscriber's delivery channel.
    pub subscriber_buffer: usize,
}

impl Default for SubscriptionsFeature {
    fn default() -> Self {
        Self {
            subscriber_buffer: 64,
        }
    }
}

/// How many write transactions a mutation request opens.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionScope {
    /// One transaction for all root fields of the request.
    #[default]
    Request,
    /// One transaction per root mutation field: a failing field does not roll back its
    /// siblings.
    Field,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct ExecutionConfig {
    pub transaction_scope: TransactionScope,
}

/// Database session settings of one request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct SessionConfig {
    /// Target database. `None` is the driver's default database.
    pub database: Option<String>,
    /// Causal consistency bookmarks handed to the driver.
    pub bookmarks: Vec<String>,
}

/// Per-request state threaded through compilation and execution.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestContext {
    /// Claims of the verified token, `None` when the request is unauthenticated.
    pub jwt: Option<serde_json::Map<String, Value>>,
    pub session: SessionConfig,
}

impl RequestContext {
    pub fn with_jwt(jwt: serde_json::Map<String, Value>) -> Self {
        Self {
            jwt: Some(jwt),
            session: SessionConfig::default(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.jwt.is_some()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn features_from_yaml() {
        let features: Features = r#"
authorization:
  global_authentication: true
subscriptions: {}
execution:
  transaction_scope: field
"#
        .parse()
        .unwrap();
        assert_eq!(
            features,
            Features {
                authorization: Some(AuthorizationFeature {
                    global_authentication: true
                }),
                subscriptions: Some(SubscriptionsFeature::default()),
                execution: ExecutionConfig {
                    transaction_scope: TransactionScope::Field
                },
            }
        );
    }

    #[test]
    fn features_from_json_default_to_disabled() {
        let features: Features = serde_json::from_str("{}").unwrap();
        assert_eq!(features, Features::default());
        assert_eq!(
            features.execution.transaction_scope,
            TransactionScope::Request
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!("authorisation: {}".parse::<Features>().is_err());
    }
}
