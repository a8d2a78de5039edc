use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::timeout::TimeoutCategory;

/// Scalar type a parameter is coerced to before dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Str,
    Int,
    Float,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParamSpec {
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default)]
    pub default: Option<Value>,
}

/// One external capability. Immutable, defined at process start.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointDescriptor {
    pub name: String,
    pub timeout_category: TimeoutCategory,
    pub supports_user_timeout: bool,
    #[serde(default)]
    pub required: BTreeMap<String, ParamSpec>,
    #[serde(default)]
    pub optional: BTreeMap<String, ParamSpec>,
}

/// The endpoint catalog, loaded once from embedded data. Lookup only —
/// never compiled branches per endpoint.
#[derive(Debug, Clone)]
pub struct EndpointRegistry {
    endpoints: HashMap<String, EndpointDescriptor>,
}

impl Default for EndpointRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl EndpointRegistry {
    /// Catalog shipped with the crate.
    pub fn builtin() -> Self {
        let descriptors: Vec<EndpointDescriptor> =
            serde_json::from_str(include_str!("endpoints.json"))
                .expect("embedded endpoint catalog is valid JSON");
        Self::from_descriptors(descriptors)
    }

    pub fn from_descriptors(descriptors: Vec<EndpointDescriptor>) -> Self {
        Self {
            endpoints: descriptors
                .into_iter()
                .map(|d| (d.name.clone(), d))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&EndpointDescriptor> {
        self.endpoints.get(name)
    }

    pub fn endpoint_names(&self) -> Vec<&str> {
        self.endpoints.keys().map(String::as_str).collect()
    }

    /// Validate and normalize caller parameters against the catalog.
    ///
    /// Unknown endpoints and missing required parameters without a default
    /// are rejected immediately (never retried downstream). Parameters not
    /// defined for the endpoint are dropped.
    pub fn validate_params(
        &self,
        endpoint: &str,
        params: &Map<String, Value>,
    ) -> Result<Map<String, Value>, ProviderError> {
        let descriptor = self.get(endpoint).ok_or_else(|| {
            ProviderError::Validation(format!("unknown endpoint: {endpoint}"))
        })?;

        let mut processed = Map::new();

        for (name, spec) in &descriptor.required {
            match params.get(name) {
                Some(value) => {
                    processed.insert(name.clone(), coerce(endpoint, name, spec, value)?);
                }
                None => match &spec.default {
                    Some(default) => {
                        processed.insert(name.clone(), default.clone());
                    }
                    None => {
                        return Err(ProviderError::Validation(format!(
                            "required parameter '{name}' is missing for {endpoint}"
                        )));
                    }
                },
            }
        }

        for (name, spec) in &descriptor.optional {
            match params.get(name) {
                Some(value) => {
                    processed.insert(name.clone(), coerce(endpoint, name, spec, value)?);
                }
                None => {
                    if let Some(default) = &spec.default {
                        processed.insert(name.clone(), default.clone());
                    }
                }
            }
        }

        for name in params.keys() {
            if !processed.contains_key(name) {
                tracing::debug!(endpoint, param = %name, "dropping parameter not in catalog");
            }
        }

        Ok(processed)
    }
}

fn coerce(
    endpoint: &str,
    name: &str,
    spec: &ParamSpec,
    value: &Value,
) -> Result<Value, ProviderError> {
    let coerced = match spec.param_type {
        ParamType::Str => match value {
            Value::String(s) => Some(Value::String(s.clone())),
            Value::Number(n) => Some(Value::String(n.to_string())),
            Value::Bool(b) => Some(Value::String(b.to_string())),
            _ => None,
        },
        ParamType::Int => match value {
            Value::Number(n) => n.as_i64().map(Value::from),
            Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
            _ => None,
        },
        ParamType::Float => match value {
            Value::Number(n) => n.as_f64().map(Value::from),
            Value::String(s) => s.trim().parse::<f64>().ok().map(Value::from),
            _ => None,
        },
    };

    coerced.ok_or_else(|| {
        ProviderError::Validation(format!(
            "parameter '{name}' for {endpoint} has an incompatible value: {value}"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_unknown_endpoint_rejected() {
        let registry = EndpointRegistry::builtin();
        let err = registry
            .validate_params("stock_made_up", &Map::new())
            .unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
    }

    #[test]
    fn test_missing_required_rejected() {
        let registry = EndpointRegistry::builtin();
        let err = registry
            .validate_params("stock_bid_ask_em", &Map::new())
            .unwrap_err();
        assert!(err.to_string().contains("symbol"));
    }

    #[test]
    fn test_defaults_filled_in() {
        let registry = EndpointRegistry::builtin();
        let processed = registry
            .validate_params(
                "stock_zh_a_hist",
                &params(&[("symbol", json!("600519"))]),
            )
            .unwrap();
        assert_eq!(processed["symbol"], json!("600519"));
        assert_eq!(processed["period"], json!("daily"));
        assert_eq!(processed["adjust"], json!(""));
    }

    #[test]
    fn test_unknown_params_dropped() {
        let registry = EndpointRegistry::builtin();
        let processed = registry
            .validate_params(
                "stock_bid_ask_em",
                &params(&[("symbol", json!("000001")), ("bogus", json!(1))]),
            )
            .unwrap();
        assert!(!processed.contains_key("bogus"));
    }

    #[test]
    fn test_numeric_symbol_coerced_to_string() {
        let registry = EndpointRegistry::builtin();
        let processed = registry
            .validate_params(
                "stock_bid_ask_em",
                &params(&[("symbol", json!(600519))]),
            )
            .unwrap();
        assert_eq!(processed["symbol"], json!("600519"));
    }
}
