// Request Builder
// Assembles the outbound `{ "<method>": { provider, lang, country, ...params } }` body

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Upstream catalog methods this gateway knows how to call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CatalogMethod {
    /// Vehicle lookup by Norwegian registration plate
    VehiclesByPlate,
    /// Article listing for a vehicle and assembly group (paginated)
    Articles,
    /// Single article by article number and brand
    ArticleDetail,
    /// Assembly-group hierarchy for a vehicle
    AssemblyGroups,
}

impl CatalogMethod {
    pub const ALL: [CatalogMethod; 4] = [
        CatalogMethod::VehiclesByPlate,
        CatalogMethod::Articles,
        CatalogMethod::ArticleDetail,
        CatalogMethod::AssemblyGroups,
    ];

    /// Method name as the upstream JSON endpoint expects it
    pub fn wire_name(self) -> &'static str {
        match self {
            CatalogMethod::VehiclesByPlate => "getVehiclesByKeyNumberPlates",
            CatalogMethod::Articles => "getArticles",
            CatalogMethod::ArticleDetail => "getArticleDirectSearchAllNumbersWithState",
            CatalogMethod::AssemblyGroups => "getChildNodesAllLinkingTarget2",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.wire_name() == name)
    }
}

impl fmt::Display for CatalogMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Per-gateway values merged under every request's parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeDefaults {
    pub provider: u32,
    pub language: String,
    pub country: String,
}

impl EnvelopeDefaults {
    pub fn new(provider: u32) -> Self {
        Self {
            provider,
            language: "no".to_string(),
            country: "NO".to_string(),
        }
    }
}

/// A fully assembled outbound request
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    pub method: CatalogMethod,
    pub parameters: Map<String, Value>,
}

impl RequestEnvelope {
    /// Merge caller parameters over the defaults; caller keys win on collision.
    /// No shape validation happens here, upstream reports bad parameters.
    pub fn build(
        method: CatalogMethod,
        params: &Map<String, Value>,
        defaults: &EnvelopeDefaults,
    ) -> Self {
        let mut parameters = Map::new();
        parameters.insert("provider".to_string(), Value::from(defaults.provider));
        parameters.insert("lang".to_string(), Value::from(defaults.language.clone()));
        parameters.insert("country".to_string(), Value::from(defaults.country.clone()));
        for (key, value) in params {
            parameters.insert(key.clone(), value.clone());
        }

        Self { method, parameters }
    }

    /// JSON body sent to the upstream endpoint
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert(
            self.method.wire_name().to_string(),
            Value::Object(self.parameters.clone()),
        );
        Value::Object(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test params must be an object"),
        }
    }

    #[test]
    fn test_defaults_are_merged() {
        let envelope = RequestEnvelope::build(
            CatalogMethod::Articles,
            &params(json!({"linkageTargetId": 1234})),
            &EnvelopeDefaults::new(22610),
        );

        assert_eq!(
            envelope.to_body(),
            json!({
                "getArticles": {
                    "provider": 22610,
                    "lang": "no",
                    "country": "NO",
                    "linkageTargetId": 1234
                }
            })
        );
    }

    #[test]
    fn test_caller_values_win_on_collision() {
        let envelope = RequestEnvelope::build(
            CatalogMethod::ArticleDetail,
            &params(json!({"lang": "en", "provider": 1})),
            &EnvelopeDefaults::new(22610),
        );

        assert_eq!(envelope.parameters["lang"], json!("en"));
        assert_eq!(envelope.parameters["provider"], json!(1));
        assert_eq!(envelope.parameters["country"], json!("NO"));
    }

    #[test]
    fn test_wire_names_round_trip() {
        for method in CatalogMethod::ALL {
            assert_eq!(CatalogMethod::from_wire_name(method.wire_name()), Some(method));
        }
        assert_eq!(CatalogMethod::from_wire_name("getNothing"), None);
    }
}
