use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Everything the engine needs to open a session: where each collection's
/// backend lives and the credential to call it with.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default)]
    pub collections: BTreeMap<String, Collection>,
    pub session_token: String,
    /// Engine-side verbosity for this session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_level: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub named_urls: NamedUrls,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model_id: Option<i32>,
}

/// Endpoint routes for one collection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedUrls {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predict: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enroll: Option<String>,
    #[serde(default, rename = "deleteUser", skip_serializing_if = "Option::is_none")]
    pub delete_user: Option<String>,
    /// Routes this crate has no field for, passed through untouched.
    #[serde(flatten)]
    pub other: BTreeMap<String, String>,
}

impl NamedUrls {
    /// `{base}/{prefix}/predict`, `/enroll` and `/deleteUser`.
    pub fn under(base_url: &str, prefix: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            base_url: Some(base.to_string()),
            predict: Some(format!("{base}/{prefix}/predict")),
            enroll: Some(format!("{base}/{prefix}/enroll")),
            delete_user: Some(format!("{base}/{prefix}/deleteUser")),
            other: BTreeMap::new(),
        }
    }
}

impl SessionSettings {
    pub fn new(session_token: impl Into<String>) -> Self {
        Self {
            session_token: session_token.into(),
            ..Self::default()
        }
    }

    pub fn with_collection(mut self, name: impl Into<String>, collection: Collection) -> Self {
        self.collections.insert(name.into(), collection);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_encodes_wire_names() {
        let settings = SessionSettings::new("token").with_collection(
            "RES100",
            Collection {
                named_urls: NamedUrls::under("https://api.example.com/", "RES100"),
                embedding_model_id: Some(14),
            },
        );

        let value: Value = serde_json::to_value(&settings).unwrap();

        assert_eq!(
            value,
            json!({
                "collections": {
                    "RES100": {
                        "named_urls": {
                            "base_url": "https://api.example.com",
                            "predict": "https://api.example.com/RES100/predict",
                            "enroll": "https://api.example.com/RES100/enroll",
                            "deleteUser": "https://api.example.com/RES100/deleteUser"
                        },
                        "embedding_model_id": 14
                    }
                },
                "session_token": "token"
            })
        );
    }

    #[test]
    fn test_unknown_routes_pass_through() {
        let text = r#"{"collections":{"default":{"named_urls":{"base_url":"b","healthcheck":"h"}}},"session_token":"t"}"#;
        let settings: SessionSettings = serde_json::from_str(text).unwrap();
        let urls = &settings.collections["default"].named_urls;
        assert_eq!(urls.other.get("healthcheck").map(String::as_str), Some("h"));
        assert!(urls.predict.is_none());

        let back = serde_json::to_value(&settings).unwrap();
        assert_eq!(back["collections"]["default"]["named_urls"]["healthcheck"], "h");
        assert!(back["collections"]["default"].get("embedding_model_id").is_none());
    }

    #[test]
    fn test_debug_level_round_trips() {
        let text = r#"{"collections":{},"session_token":"t","debug_level":2}"#;
        let settings: SessionSettings = serde_json::from_str(text).unwrap();
        assert_eq!(settings.debug_level, Some(2));

        let back = serde_json::to_value(&settings).unwrap();
        assert_eq!(back, json!({"collections": {}, "session_token": "t", "debug_level": 2}));

        let quiet = serde_json::to_value(SessionSettings::new("t")).unwrap();
        assert!(quiet.get("debug_level").is_none());
    }

    #[test]
    fn test_missing_token_is_rejected() {
        assert!(serde_json::from_str::<SessionSettings>(r#"{"collections":{}}"#).is_err());
    }
}
