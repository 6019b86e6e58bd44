//! Application-defined custom claims.
//!
//! Deployments plug their own claims type `C` through an
//! extract / validate / defaults triple. Resolution never fails: anything
//! that cannot be extracted or does not validate falls back to the defaults.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Extracts custom claims from the raw claim set.
pub type ClaimsExtractor<C> = Arc<dyn Fn(&Map<String, Value>) -> Option<C> + Send + Sync>;

/// Checks extracted custom claims.
pub type ClaimsValidator<C> = Arc<dyn Fn(&C) -> bool + Send + Sync>;

/// Configuration for resolving custom claims of type `C`.
pub struct CustomClaimsConfig<C> {
    extract: ClaimsExtractor<C>,
    validate: ClaimsValidator<C>,
    defaults: C,
}

impl<C: Clone> Clone for CustomClaimsConfig<C> {
    fn clone(&self) -> Self {
        Self {
            extract: Arc::clone(&self.extract),
            validate: Arc::clone(&self.validate),
            defaults: self.defaults.clone(),
        }
    }
}

impl<C: fmt::Debug> fmt::Debug for CustomClaimsConfig<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomClaimsConfig")
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

impl<C: Clone> CustomClaimsConfig<C> {
    /// Creates a configuration from its three parts.
    pub fn new<E, V>(extract: E, validate: V, defaults: C) -> Self
    where
        E: Fn(&Map<String, Value>) -> Option<C> + Send + Sync + 'static,
        V: Fn(&C) -> bool + Send + Sync + 'static,
    {
        Self {
            extract: Arc::new(extract),
            validate: Arc::new(validate),
            defaults,
        }
    }

    /// Replaces the validator.
    pub fn with_validator<V>(mut self, validate: V) -> Self
    where
        V: Fn(&C) -> bool + Send + Sync + 'static,
    {
        self.validate = Arc::new(validate);
        self
    }

    /// Returns the fallback claims.
    pub fn defaults(&self) -> &C {
        &self.defaults
    }

    /// Resolves custom claims from the raw claim set.
    pub fn resolve(&self, raw: &Map<String, Value>) -> C {
        match (self.extract)(raw) {
            Some(claims) if (self.validate)(&claims) => claims,
            _ => self.defaults.clone(),
        }
    }
}

impl<C> CustomClaimsConfig<C>
where
    C: DeserializeOwned + Clone + 'static,
{
    /// Deserializes `C` from the claim stored under `namespace`.
    pub fn from_namespace(namespace: impl Into<String>, defaults: C) -> Self {
        let namespace = namespace.into();
        Self::new(
            move |raw| {
                raw.get(&namespace)
                    .cloned()
                    .and_then(|value| serde_json::from_value(value).ok())
            },
            |_| true,
            defaults,
        )
    }
}

impl CustomClaimsConfig<()> {
    /// Configuration for deployments without custom claims.
    pub fn none() -> Self {
        Self::new(|_| Some(()), |_| true, ())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct AppClaims {
        role: String,
        tenant_id: Option<String>,
    }

    fn defaults() -> AppClaims {
        AppClaims {
            role: "viewer".to_string(),
            tenant_id: None,
        }
    }

    fn raw(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_namespace_extraction() {
        let config = CustomClaimsConfig::from_namespace("app", defaults());
        let claims = config.resolve(&raw(json!({
            "sub": "u1",
            "app": { "role": "admin", "tenant_id": "t-9" }
        })));

        assert_eq!(claims.role, "admin");
        assert_eq!(claims.tenant_id.as_deref(), Some("t-9"));
    }

    #[test]
    fn test_missing_namespace_falls_back() {
        let config = CustomClaimsConfig::from_namespace("app", defaults());
        assert_eq!(config.resolve(&raw(json!({ "sub": "u1" }))), defaults());
    }

    #[test]
    fn test_malformed_claims_fall_back() {
        let config = CustomClaimsConfig::from_namespace("app", defaults());
        let claims = config.resolve(&raw(json!({ "app": { "role": 42 } })));
        assert_eq!(claims, defaults());

        let claims = config.resolve(&raw(json!({ "app": "not-an-object" })));
        assert_eq!(claims, defaults());
    }

    #[test]
    fn test_validator_rejection_falls_back() {
        let config = CustomClaimsConfig::from_namespace("app", defaults())
            .with_validator(|c: &AppClaims| ["viewer", "editor", "admin"].contains(&c.role.as_str()));

        let claims = config.resolve(&raw(json!({ "app": { "role": "superuser" } })));
        assert_eq!(claims, defaults());

        let claims = config.resolve(&raw(json!({ "app": { "role": "editor" } })));
        assert_eq!(claims.role, "editor");
    }

    #[test]
    fn test_custom_extractor() {
        let config = CustomClaimsConfig::new(
            |raw| raw.get("roles")?.as_array().map(|a| a.len()),
            |n| *n > 0,
            0usize,
        );

        assert_eq!(config.resolve(&raw(json!({ "roles": ["a", "b"] }))), 2);
        assert_eq!(config.resolve(&raw(json!({ "roles": [] }))), 0);
    }
}
