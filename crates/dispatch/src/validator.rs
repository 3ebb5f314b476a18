/*!
 * Payload Validator
 *
 * Each event kind declares its required fields in a static table. Validation
 * runs before enqueue; invalid payloads are dropped with a log line and never
 * touch the queue.
 */

use forgehook_domain::EventKind;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex compiles"));

/// Declared type of a required payload field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldType {
    Str,
    /// Number strictly greater than zero.
    PositiveNum,
    /// Three ASCII letters (ISO 4217 style).
    Currency,
    /// One of the deployment environments.
    Environment,
}

/// Required fields per event kind.
fn contract(kind: EventKind) -> &'static [(&'static str, FieldType)] {
    use FieldType::*;
    match kind {
        EventKind::AppCreated => &[("appId", Str), ("appName", Str), ("userId", Str)],
        EventKind::AppDeployed => &[
            ("appId", Str),
            ("appName", Str),
            ("userId", Str),
            ("deploymentUrl", Str),
            ("environment", Environment),
        ],
        EventKind::AppExported => &[("appId", Str), ("userId", Str)],
        EventKind::AppError => &[("appId", Str), ("userId", Str), ("error", Str)],
        EventKind::GenerationComplete => &[("appId", Str), ("userId", Str)],
        EventKind::DeploymentComplete => &[("appId", Str), ("userId", Str), ("deploymentUrl", Str)],
        EventKind::UserRegistered => &[("userId", Str)],
        EventKind::UserVerified => &[("userId", Str)],
        EventKind::PaymentSuccess | EventKind::PaymentFailed => &[
            ("userId", Str),
            ("amount", PositiveNum),
            ("currency", Currency),
        ],
    }
}

/// Validate a payload against its event kind's contract.
///
/// Returns a list of human-readable errors; an empty list means valid.
/// An unknown event kind is itself an error.
pub fn validate(kind: &str, payload: &Value) -> Vec<String> {
    let parsed: EventKind = match kind.parse() {
        Ok(k) => k,
        Err(e) => return vec![e],
    };

    let Some(obj) = payload.as_object() else {
        return vec!["payload must be a JSON object".to_string()];
    };

    let mut errors = Vec::new();

    for (field, ty) in contract(parsed) {
        match obj.get(*field) {
            None => errors.push(format!("missing required field: {field}")),
            Some(value) => check_field(field, *ty, value, &mut errors),
        }
    }

    // timestamp is enriched by the router when absent, but a present one
    // must be numeric
    if let Some(ts) = obj.get("timestamp") {
        if !ts.is_number() {
            errors.push("timestamp must be a number (wall-clock ms)".to_string());
        }
    }

    // A free-form email field, wherever present, must look like an address
    if let Some(email) = obj.get("email") {
        match email.as_str() {
            Some(s) if EMAIL_RE.is_match(s) => {}
            _ => errors.push("email must be a valid address".to_string()),
        }
    }

    errors
}

fn check_field(field: &str, ty: FieldType, value: &Value, errors: &mut Vec<String>) {
    match ty {
        FieldType::Str => {
            if value.as_str().map(|s| !s.is_empty()) != Some(true) {
                errors.push(format!("{field} must be a non-empty string"));
            }
        }
        FieldType::PositiveNum => {
            if value.as_f64().map(|n| n > 0.0) != Some(true) {
                errors.push(format!("{field} must be a number greater than zero"));
            }
        }
        FieldType::Currency => {
            let ok = value
                .as_str()
                .map(|s| s.len() == 3 && s.chars().all(|c| c.is_ascii_alphabetic()))
                .unwrap_or(false);
            if !ok {
                errors.push(format!("{field} must be a 3-letter currency code"));
            }
        }
        FieldType::Environment => {
            let ok = matches!(value.as_str(), Some("preview") | Some("production"));
            if !ok {
                errors.push(format!("{field} must be one of: preview, production"));
            }
        }
    }
}
