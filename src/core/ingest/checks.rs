//! Fields derived from a capability statement
//!
//! These run on every accepted message and are part of the content compared
//! when deciding between a full update and a telemetry refresh.

use crate::adapters::fhir::{FHIR2_LESS_JSON_MIME_TYPE, FHIR3_PLUS_JSON_MIME_TYPE};
use crate::domain::{Validation, ValidationRule};
use serde_json::Value;
use std::collections::BTreeMap;

/// Field paths reported in `included_fields`
const INCLUDED_FIELD_PATHS: &[&[&str]] = &[
    &["url"],
    &["version"],
    &["name"],
    &["title"],
    &["status"],
    &["experimental"],
    &["date"],
    &["publisher"],
    &["contact"],
    &["description"],
    &["requirements"],
    &["useContext"],
    &["jurisdiction"],
    &["purpose"],
    &["copyright"],
    &["kind"],
    &["instantiates"],
    &["imports"],
    &["software", "name"],
    &["software", "version"],
    &["software", "releaseDate"],
    &["implementation", "description"],
    &["implementation", "url"],
    &["implementation", "custodian"],
    &["fhirVersion"],
    &["format"],
    &["patchFormat"],
    &["acceptUnknown"],
    &["implementationGuide"],
    &["profile"],
    &["messaging"],
    &["document"],
];

const NOT_SPECIFIED: &str = "not specified";
const FHIR_HTTP_REFERENCE: &str = "http://hl7.org/fhir/http.html";
const FHIR3_PLUS_VERSIONS: &[&str] = &["3.0.0", "3.0.1", "3.0.2", "4.0.0", "4.0.1"];
const SECURE_TLS_VERSIONS: &[&str] = &["TLS 1.2", "TLS 1.3"];

/// Presence map over the standard CapabilityStatement field paths
///
/// Nested paths are joined with `.`, e.g. `software.name`. Empty when there is
/// no statement.
pub fn included_fields(capability_statement: Option<&Value>) -> BTreeMap<String, bool> {
    let Some(cs) = capability_statement else {
        return BTreeMap::new();
    };

    INCLUDED_FIELD_PATHS
        .iter()
        .map(|path| {
            let present = path
                .iter()
                .try_fold(cs, |v, key| v.get(key))
                .is_some_and(|v| !v.is_null());
            (path.join("."), present)
        })
        .collect()
}

/// Maps each interaction code to the resource types that declare it
///
/// Only the first `rest` entry is inspected. Resources with no usable
/// interaction are listed under `"not specified"`.
pub fn operation_resource(capability_statement: Option<&Value>) -> BTreeMap<String, Vec<String>> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let resources = capability_statement
        .and_then(|cs| cs.get("rest"))
        .and_then(Value::as_array)
        .and_then(|rest| rest.first())
        .and_then(|rest| rest.get("resource"))
        .and_then(Value::as_array);

    for resource in resources.into_iter().flatten() {
        let Some(resource_type) = resource.get("type").and_then(Value::as_str) else {
            continue;
        };

        let codes: Vec<&str> = resource
            .get("interaction")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|op| op.get("code").and_then(Value::as_str))
            .collect();

        if codes.is_empty() {
            map.entry(NOT_SPECIFIED.to_string())
                .or_default()
                .push(resource_type.to_string());
        }
        for code in codes {
            map.entry(code.to_string())
                .or_default()
                .push(resource_type.to_string());
        }
    }
    map
}

/// Runs the MIME type, HTTP status and TLS rules
pub fn run_validation(
    fhir_version: &str,
    http_response: i32,
    mime_types: &[String],
    tls_version: &str,
) -> Validation {
    Validation {
        results: vec![
            r4_mime_type_rule(mime_types),
            general_mime_type_rule(mime_types, fhir_version),
            http_response_rule(http_response),
            tls_version_rule(tls_version),
        ],
        warnings: Vec::new(),
    }
}

fn rule(name: &str, expected: &str, actual: String) -> ValidationRule {
    ValidationRule {
        rule_name: name.to_string(),
        valid: true,
        expected: expected.to_string(),
        actual,
        comment: String::new(),
        reference: FHIR_HTTP_REFERENCE.to_string(),
    }
}

fn r4_mime_type_rule(mime_types: &[String]) -> ValidationRule {
    let mut r = rule("r4MimeType", FHIR3_PLUS_JSON_MIME_TYPE, mime_types.join(", "));
    r.comment = "The formal MIME-type for FHIR resources is application/fhir+json for FHIR \
        version STU3 and above. The correct mime type SHALL be used by clients and servers."
        .to_string();
    r.valid = mime_types.iter().any(|mt| mt == FHIR3_PLUS_JSON_MIME_TYPE);
    r
}

fn general_mime_type_rule(mime_types: &[String], fhir_version: &str) -> ValidationRule {
    let mut r = rule("generalMimeType", "", mime_types.join(","));
    if fhir_version.is_empty() {
        r.valid = false;
        r.expected = "N/A".to_string();
        r.comment = "Unknown FHIR Version; cannot validate mime type.".to_string();
        return r;
    }

    let required = if FHIR3_PLUS_VERSIONS.contains(&fhir_version) {
        FHIR3_PLUS_JSON_MIME_TYPE
    } else {
        FHIR2_LESS_JSON_MIME_TYPE
    };
    r.expected = required.to_string();
    r.comment = format!("FHIR Version {fhir_version} requires the Mime Type to be {required}");
    r.valid = mime_types.iter().any(|mt| mt == required);
    r
}

fn http_response_rule(http_response: i32) -> ValidationRule {
    let mut r = rule("httpResponse", "200", http_response.to_string());
    match http_response {
        200 => {}
        0 => {
            r.valid = false;
            r.comment = "The GET request failed with no returned HTTP response status code. \
                Applications SHALL return a resource that describes the functionality of the \
                server end-point."
                .to_string();
        }
        code => {
            r.valid = false;
            r.comment = format!(
                "The HTTP response code was {code} instead of 200. Applications SHALL return a \
                 resource that describes the functionality of the server end-point."
            );
        }
    }
    r
}

fn tls_version_rule(tls_version: &str) -> ValidationRule {
    let mut r = rule("tlsVersion", "TLS 1.2, TLS 1.3", tls_version.to_string());
    r.comment = "Systems SHALL use TLS version 1.2 or higher for all transmissions not taking \
        place over a secure network connection."
        .to_string();
    r.valid = SECURE_TLS_VERSIONS.contains(&tls_version);
    r
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test]
    fn test_included_fields_nested_paths() {
        let cs = json!({
            "publisher": "Example",
            "software": {"name": "EHR", "version": null},
            "fhirVersion": "4.0.1"
        });
        let fields = included_fields(Some(&cs));
        assert_eq!(fields.len(), INCLUDED_FIELD_PATHS.len());
        assert_eq!(fields["publisher"], true);
        assert_eq!(fields["software.name"], true);
        assert_eq!(fields["software.version"], false);
        assert_eq!(fields["implementation.url"], false);
        assert!(included_fields(None).is_empty());
    }

    #[test]
    fn test_operation_resource() {
        let cs = json!({
            "rest": [{
                "resource": [
                    {"type": "Patient", "interaction": [{"code": "read"}, {"code": "search-type"}]},
                    {"type": "Observation", "interaction": [{"code": "read"}]},
                    {"type": "Device"},
                    {"type": "Location", "interaction": [{"nocode": true}]},
                    {"interaction": [{"code": "read"}]}
                ]
            }]
        });
        let map = operation_resource(Some(&cs));
        assert_eq!(map["read"], vec!["Patient", "Observation"]);
        assert_eq!(map["search-type"], vec!["Patient"]);
        assert_eq!(map["not specified"], vec!["Device", "Location"]);
        assert!(operation_resource(Some(&json!({}))).is_empty());
    }

    #[test_case("4.0.1", &["application/fhir+json"], true ; "r4 with fhir+json")]
    #[test_case("4.0.1", &["application/json+fhir"], false ; "r4 with old type")]
    #[test_case("1.0.2", &["application/json+fhir"], true ; "dstu2 with old type")]
    #[test_case("", &["application/fhir+json"], false ; "unknown version")]
    fn test_general_mime_type_rule(version: &str, mimes: &[&str], valid: bool) {
        let mimes: Vec<String> = mimes.iter().map(|s| s.to_string()).collect();
        assert_eq!(general_mime_type_rule(&mimes, version).valid, valid);
    }

    #[test]
    fn test_run_validation_rules() {
        let mimes = vec![FHIR3_PLUS_JSON_MIME_TYPE.to_string()];
        let validation = run_validation("4.0.1", 200, &mimes, "TLS 1.2");
        assert_eq!(validation.results.len(), 4);
        assert!(validation.all_valid());

        let failed = run_validation("4.0.1", 0, &mimes, "TLS 1.0");
        let invalid: Vec<&str> = failed
            .results
            .iter()
            .filter(|r| !r.valid)
            .map(|r| r.rule_name.as_str())
            .collect();
        assert_eq!(invalid, vec!["httpResponse", "tlsVersion"]);
    }
}
