//! JSON bodies exchanged between registry clients and the gateway.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, WaypostError};

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(WaypostError::InvalidArgument(format!(
            "'{}' must not be empty",
            field
        )));
    }
    Ok(())
}

/// Accepts a port as a JSON number or a numeric string. An empty string
/// counts as absent.
fn deserialize_port<'de, D>(deserializer: D) -> std::result::Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Option::<Port>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Port::Number(port)) => Ok(Some(port)),
        Some(Port::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(Port::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid port '{}'", text))),
    }
}

/// Body of `POST /register`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// Service type name.
    pub name: String,
    /// Endpoint to hand out on lookup. Defaulted by the gateway when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Port appended to a defaulted address.
    #[serde(
        default,
        deserialize_with = "deserialize_port",
        skip_serializing_if = "Option::is_none"
    )]
    pub port: Option<u16>,
}

impl RegisterRequest {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: Some(address.into()),
            port: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        require("name", &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub id: String,
    pub success: bool,
}

/// Body of `POST /deregister`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeregisterRequest {
    pub id: String,
}

impl DeregisterRequest {
    pub fn validate(&self) -> Result<()> {
        require("id", &self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeregisterResponse {
    pub success: bool,
}

/// Body of `POST /lookup`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupRequest {
    pub name: String,
}

impl LookupRequest {
    pub fn validate(&self) -> Result<()> {
        require("name", &self.name)
    }
}

/// Lookup result. `address` is empty when `success` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupResponse {
    pub success: bool,
    #[serde(default)]
    pub address: String,
}

impl LookupResponse {
    pub fn from_address(address: Option<String>) -> Self {
        match address {
            Some(address) => Self {
                success: true,
                address,
            },
            None => Self {
                success: false,
                address: String::new(),
            },
        }
    }
}

/// Body of `POST /heartbeat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub id: String,
}

impl HeartbeatRequest {
    pub fn validate(&self) -> Result<()> {
        require("id", &self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_optional_fields() {
        let req: RegisterRequest = serde_json::from_str(r#"{"name": "dungen"}"#).unwrap();
        assert_eq!(req.name, "dungen");
        assert!(req.address.is_none());
        assert!(req.port.is_none());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_register_request_port_forms() {
        let parse = |json: &str| serde_json::from_str::<RegisterRequest>(json).map(|r| r.port);

        assert_eq!(parse(r#"{"name": "a", "port": 5000}"#).unwrap(), Some(5000));
        assert_eq!(parse(r#"{"name": "a", "port": "5000"}"#).unwrap(), Some(5000));
        assert_eq!(parse(r#"{"name": "a", "port": ""}"#).unwrap(), None);
        assert_eq!(parse(r#"{"name": "a", "port": null}"#).unwrap(), None);
        assert!(parse(r#"{"name": "a", "port": "http"}"#).is_err());
        assert!(parse(r#"{"name": "a", "port": "70000"}"#).is_err());
        assert!(parse(r#"{"name": "a", "port": -1}"#).is_err());
    }

    #[test]
    fn test_register_request_missing_name() {
        let result = serde_json::from_str::<RegisterRequest>(r#"{"address": "x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_required_field_rejected() {
        let req = RegisterRequest::new("  ", "localhost:5000");
        assert!(matches!(
            req.validate(),
            Err(WaypostError::InvalidArgument(_))
        ));
        assert!(HeartbeatRequest { id: String::new() }.validate().is_err());
        assert!(DeregisterRequest { id: String::new() }.validate().is_err());
        assert!(LookupRequest { name: String::new() }.validate().is_err());
    }

    #[test]
    fn test_lookup_response_from_address() {
        let hit = LookupResponse::from_address(Some("http://a:1".into()));
        assert!(hit.success);
        assert_eq!(hit.address, "http://a:1");

        let miss = LookupResponse::from_address(None);
        assert!(!miss.success);
        assert!(miss.address.is_empty());
        let json = serde_json::to_string(&miss).unwrap();
        assert_eq!(json, r#"{"success":false,"address":""}"#);
    }
}
