//! Typed parsing of capability-statement queue messages
//!
//! Each field is checked separately so a malformed message is reported by
//! the name of the first offending field.

use super::checks::{included_fields, operation_resource, run_validation};
use crate::domain::{EndpointInfo, LanternError, RequestedVersion, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Value};

/// A parsed capability message
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCapability {
    /// Endpoint state with its observation in `info.metadata`
    pub info: EndpointInfo,

    /// Default FHIR version reported by the querier
    pub default_fhir_version: String,
}

struct Fields<'a> {
    map: &'a Map<String, Value>,
    url: Option<&'a str>,
}

impl<'a> Fields<'a> {
    fn malformed(&self, field: &str, expected: &str) -> LanternError {
        match self.url {
            Some(url) => LanternError::MalformedMessage(format!(
                "{url}: field '{field}' must be {expected}"
            )),
            None => LanternError::MalformedMessage(format!("field '{field}' must be {expected}")),
        }
    }

    fn string(&self, field: &str) -> Result<&'a str> {
        self.map
            .get(field)
            .and_then(Value::as_str)
            .ok_or_else(|| self.malformed(field, "a string"))
    }

    fn number(&self, field: &str) -> Result<f64> {
        self.map
            .get(field)
            .and_then(Value::as_f64)
            .ok_or_else(|| self.malformed(field, "a number"))
    }

    /// A JSON integer that fits an HTTP status slot
    fn status(&self, field: &str) -> Result<i32> {
        self.map
            .get(field)
            .and_then(Value::as_i64)
            .and_then(|n| i32::try_from(n).ok())
            .ok_or_else(|| self.malformed(field, "an integer"))
    }

    /// `None` when the field is absent or null
    fn optional(&self, field: &str) -> Option<&'a Value> {
        self.map.get(field).filter(|v| !v.is_null())
    }

    fn object(&self, field: &str) -> Result<Option<Value>> {
        match self.optional(field) {
            None => Ok(None),
            Some(v) if v.is_object() => Ok(Some(v.clone())),
            Some(_) => Err(self.malformed(field, "an object")),
        }
    }

    fn string_list(&self, field: &str) -> Result<Vec<String>> {
        let Some(value) = self.optional(field) else {
            return Ok(Vec::new());
        };
        let items = value
            .as_array()
            .ok_or_else(|| self.malformed(field, "a list of strings"))?;
        items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| self.malformed(field, "a list of strings"))
            })
            .collect()
    }

    fn base64_bytes(&self, field: &str) -> Result<Option<Vec<u8>>> {
        let Some(value) = self.optional(field) else {
            return Ok(None);
        };
        let encoded = value
            .as_str()
            .ok_or_else(|| self.malformed(field, "a base64 string"))?;
        STANDARD
            .decode(encoded)
            .map(Some)
            .map_err(|_| self.malformed(field, "a base64 string"))
    }
}

/// Parses a capability-statement message into endpoint state
///
/// The derived fields (`included_fields`, `operation_resource`,
/// `validation` and `capability_fhir_version`) are computed here. An empty
/// `requestedFhirVersion` becomes `"None"`.
///
/// # Errors
///
/// Returns `LanternError::MalformedMessage` naming the first field that is
/// missing or has the wrong type.
pub fn parse_capability_message(payload: &[u8]) -> Result<ParsedCapability> {
    let value: Value = serde_json::from_slice(payload)
        .map_err(|e| LanternError::MalformedMessage(format!("payload is not valid JSON: {e}")))?;
    let map = value
        .as_object()
        .ok_or_else(|| LanternError::MalformedMessage("payload must be a JSON object".to_string()))?;

    let mut fields = Fields { map, url: None };
    let url = fields.string("url")?;
    fields.url = Some(url);

    let errors = fields.string("err")?;
    let tls_version = fields.string("tlsVersion")?;
    let requested = RequestedVersion::new(fields.string("requestedFhirVersion")?);
    let default_fhir_version = fields.string("defaultFhirVersion")?.to_string();
    let mime_types = fields.string_list("mimeTypes")?;
    let http_response = fields.status("httpResponse")?;
    let smart_http_response = fields.status("smarthttpResponse")?;
    let capability_statement = fields.object("capabilityStatement")?;
    let capability_statement_bytes = fields.base64_bytes("capabilityStatementBytes")?;
    let smart_response = fields.object("smartResp")?;
    let smart_response_bytes = fields.base64_bytes("smartRespBytes")?;
    let response_time = fields.number("responseTime")?;

    let mut info = EndpointInfo::new(url, requested);
    info.capability_fhir_version = capability_statement
        .as_ref()
        .and_then(|cs| cs.get("fhirVersion"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    info.included_fields = included_fields(capability_statement.as_ref());
    info.operation_resource = operation_resource(capability_statement.as_ref());
    info.validation = run_validation(
        &info.capability_fhir_version,
        http_response,
        &mime_types,
        tls_version,
    );
    info.tls_version = tls_version.to_string();
    info.mime_types = mime_types;
    info.capability_statement = capability_statement;
    info.capability_statement_bytes = capability_statement_bytes;
    info.smart_response = smart_response;
    info.smart_response_bytes = smart_response_bytes;

    info.metadata.http_response = http_response;
    info.metadata.errors = errors.to_string();
    info.metadata.response_time_seconds = response_time;
    info.metadata.smart_http_response = smart_http_response;

    Ok(ParsedCapability {
        info,
        default_fhir_version,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    fn message() -> Value {
        json!({
            "url": "https://fhir.example.com/r4",
            "err": "",
            "tlsVersion": "TLS 1.2",
            "requestedFhirVersion": "",
            "defaultFhirVersion": "4.0",
            "mimeTypes": ["application/fhir+json"],
            "httpResponse": 200,
            "smarthttpResponse": 200,
            "capabilityStatement": {
                "fhirVersion": "4.0.1",
                "publisher": "Example Health"
            },
            "smartResp": {"authorization_endpoint": "https://auth.example.com"},
            "responseTime": 0.25
        })
    }

    fn parse(value: &Value) -> Result<ParsedCapability> {
        parse_capability_message(&serde_json::to_vec(value).unwrap())
    }

    #[test]
    fn test_parse_full_message() {
        let parsed = parse(&message()).unwrap();
        let info = parsed.info;
        assert_eq!(info.url, "https://fhir.example.com/r4");
        assert!(info.requested_fhir_version.is_none());
        assert_eq!(info.capability_fhir_version, "4.0.1");
        assert_eq!(info.metadata.http_response, 200);
        assert_eq!(info.metadata.response_time_seconds, 0.25);
        assert_eq!(info.metadata.requested_fhir_version, RequestedVersion::none());
        assert_eq!(info.included_fields.get("publisher"), Some(&true));
        assert_eq!(parsed.default_fhir_version, "4.0");
        assert!(info.smart_response.is_some());
    }

    #[test]
    fn test_missing_url_is_malformed() {
        let mut msg = message();
        msg.as_object_mut().unwrap().remove("url");
        let err = parse(&msg).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Malformed message: field 'url' must be a string"
        );
    }

    #[test_case("err", json!(5), "a string" ; "err not string")]
    #[test_case("tlsVersion", json!(null), "a string" ; "tls missing")]
    #[test_case("httpResponse", json!("200"), "an integer" ; "http as string")]
    #[test_case("httpResponse", json!(200.9), "an integer" ; "http fractional")]
    #[test_case("httpResponse", json!(1e12), "an integer" ; "http out of range")]
    #[test_case("smarthttpResponse", json!(4_294_967_496_u64), "an integer" ; "smart http past i32")]
    #[test_case("smarthttpResponse", json!(null), "an integer" ; "smart http missing")]
    #[test_case("responseTime", json!("fast"), "a number" ; "response time as string")]
    #[test_case("mimeTypes", json!([1, 2]), "a list of strings" ; "mime types not strings")]
    #[test_case("capabilityStatement", json!("text"), "an object" ; "statement not object")]
    #[test_case("capabilityStatementBytes", json!("%%%"), "a base64 string" ; "bytes not base64")]
    fn test_field_errors_name_the_field(field: &str, value: Value, expected: &str) {
        let mut msg = message();
        msg[field] = value;
        let err = parse(&msg).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(
                "Malformed message: https://fhir.example.com/r4: field '{field}' must be {expected}"
            )
        );
    }

    #[test]
    fn test_optional_fields_default_to_absent() {
        let mut msg = message();
        let obj = msg.as_object_mut().unwrap();
        obj.remove("mimeTypes");
        obj.remove("capabilityStatement");
        obj.insert("smartResp".to_string(), Value::Null);

        let info = parse(&msg).unwrap().info;
        assert!(info.mime_types.is_empty());
        assert!(info.capability_statement.is_none());
        assert!(info.smart_response.is_none());
        assert!(info.included_fields.is_empty());
        assert_eq!(info.capability_fhir_version, "");
    }

    #[test]
    fn test_bytes_fields_are_base64_decoded() {
        let mut msg = message();
        msg["capabilityStatementBytes"] = json!(STANDARD.encode(b"{\"fhirVersion\":\"4.0.1\"}"));
        let info = parse(&msg).unwrap().info;
        assert_eq!(
            info.capability_statement_bytes.as_deref(),
            Some(&b"{\"fhirVersion\":\"4.0.1\"}"[..])
        );
    }

    #[test]
    fn test_non_json_payload() {
        let err = parse_capability_message(b"not json").unwrap_err();
        assert!(matches!(err, LanternError::MalformedMessage(_)));
    }
}
