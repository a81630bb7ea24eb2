use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// One device's shadow document: the last commanded state (`desired`), the
/// last state the unit published back (`reported`), per-field change
/// metadata, and a server-assigned version that only ever increases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShadowDocument {
    pub state: ShadowState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub version: u64,
    /// Whole-document timestamp, epoch seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShadowState {
    #[serde(default)]
    pub desired: Map<String, Value>,
    #[serde(default)]
    pub reported: Map<String, Value>,
}

impl ShadowDocument {
    pub fn parse(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| Error::Malformed(format!("shadow envelope: {e}")))
    }

    /// The attribute set the physical unit last published.
    pub fn reported(&self) -> &Map<String, Value> {
        &self.state.reported
    }

    /// Reported attributes with pending desired values layered on top.
    /// Used to fold a command echo into entity state before the unit has
    /// reported the change back.
    pub fn merged(&self) -> Map<String, Value> {
        let mut merged = self.state.reported.clone();
        for (key, value) in &self.state.desired {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_full_envelope() {
        let body = json!({
            "state": {
                "desired": { "targetTemperature": 24.0 },
                "reported": { "powerSwitch": 1, "targetTemperature": 26.0 }
            },
            "metadata": {
                "reported": { "powerSwitch": { "timestamp": 1716800000 } }
            },
            "version": 412,
            "timestamp": 1716800123
        })
        .to_string();

        let doc = ShadowDocument::parse(&body).unwrap();
        assert_eq!(doc.version, 412);
        assert_eq!(doc.timestamp, Some(1716800123));
        assert_eq!(doc.reported()["powerSwitch"], json!(1));
        assert!(doc.metadata.is_some());
    }

    #[test]
    fn missing_trees_default_to_empty() {
        let doc = ShadowDocument::parse(r#"{"state": {}, "version": 1}"#).unwrap();
        assert!(doc.reported().is_empty());
        assert!(doc.state.desired.is_empty());
    }

    #[test]
    fn missing_state_is_malformed() {
        let err = ShadowDocument::parse(r#"{"message": "OK"}"#).unwrap_err();
        assert!(matches!(err, Error::Malformed(_)));
    }

    #[test]
    fn not_json_is_malformed() {
        let err = ShadowDocument::parse("<html>teapot</html>").unwrap_err();
        assert!(matches!(err, Error::Malformed(_)));
    }

    #[test]
    fn merged_prefers_desired() {
        let doc = ShadowDocument::parse(
            &json!({
                "state": {
                    "desired": { "targetTemperature": 22.0 },
                    "reported": { "targetTemperature": 26.0, "powerSwitch": 1 }
                },
                "version": 2
            })
            .to_string(),
        )
        .unwrap();

        let merged = doc.merged();
        assert_eq!(merged["targetTemperature"], json!(22.0));
        assert_eq!(merged["powerSwitch"], json!(1));
    }
}
