//! LM-006: Identifier derivation — logical ids and stack names.
//!
//! Logical ids in the emitted template must be ASCII alphanumeric and at most
//! 255 characters. Stack names must match `[A-Za-z][-A-Za-z0-9]*` and be at
//! most 128 characters. Every derivation here is pure: the same inputs always
//! produce the same name, and over-long names are shortened by appending a
//! BLAKE3 digest of the full input rather than by plain truncation.

use super::error::GraphError;
use super::hasher::{short_digest, SHORT_DIGEST_LEN};
use super::types::HandlerRef;
use regex::Regex;
use std::sync::LazyLock;

pub const MAX_LOGICAL_ID_LEN: usize = 255;
pub const MAX_STACK_NAME_LEN: usize = 128;

static STACK_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][-A-Za-z0-9]*$").expect("stack name pattern is valid")
});

/// Check that `id` is already a legal logical id.
pub fn validate_logical_id(id: &str) -> Result<(), GraphError> {
    let reason = if id.is_empty() {
        "must not be empty".to_string()
    } else if !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        "must be ASCII alphanumeric".to_string()
    } else if id.len() > MAX_LOGICAL_ID_LEN {
        format!("longer than {} characters", MAX_LOGICAL_ID_LEN)
    } else {
        return Ok(());
    };
    Err(GraphError::InvalidIdentifier {
        id: id.to_string(),
        reason,
    })
}

/// Strip everything but ASCII alphanumerics and bound the length.
pub fn sanitize_logical_id(raw: &str) -> Result<String, GraphError> {
    let cleaned: String = raw.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    if cleaned.is_empty() {
        return Err(GraphError::InvalidIdentifier {
            id: raw.to_string(),
            reason: "no alphanumeric characters to build an id from".to_string(),
        });
    }
    Ok(bound(cleaned, MAX_LOGICAL_ID_LEN))
}

/// Upper-case the first letter of each alphanumeric segment and join them.
///
/// `hello_world::get` becomes `HelloWorldGet`; existing inner capitals are kept.
pub fn pascal_case(raw: &str) -> String {
    raw.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|seg| !seg.is_empty())
        .map(|seg| {
            let mut chars = seg.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Logical id of the function built from `handler`.
pub fn function_id(handler: &HandlerRef) -> Result<String, GraphError> {
    sanitize_logical_id(&pascal_case(handler.as_str())).map_err(|_| {
        GraphError::InvalidIdentifier {
            id: handler.to_string(),
            reason: "handler name yields an empty function id".to_string(),
        }
    })
}

/// Logical id of the role owned by function `function_id`.
pub fn role_id(function_id: &str) -> Result<String, GraphError> {
    sanitize_logical_id(&format!("{}Role", function_id))
}

/// Scope a service name to a user or environment token.
///
/// `("My Service", Some("alice"))` becomes `My-Service-alice`. The result is a
/// legal stack name; names that would exceed the limit keep a prefix and gain
/// a digest of the full `(service, scope)` pair.
pub fn scoped_stack_name(service: &str, scope: Option<&str>) -> Result<String, GraphError> {
    let base = stack_segment(service);
    if base.is_empty() {
        return Err(GraphError::InvalidIdentifier {
            id: service.to_string(),
            reason: "service name has no usable characters".to_string(),
        });
    }
    let scope = scope.map(stack_segment).unwrap_or_default();

    let mut name = if scope.is_empty() {
        base
    } else {
        format!("{}-{}", base, scope)
    };
    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        name = format!("s-{}", name);
    }
    if name.len() > MAX_STACK_NAME_LEN {
        let digest = short_digest(&[service, scope.as_str()]);
        let keep = MAX_STACK_NAME_LEN - SHORT_DIGEST_LEN - 1;
        let head = name[..keep].trim_end_matches('-');
        name = format!("{}-{}", head, digest);
    }

    if !STACK_NAME.is_match(&name) {
        return Err(GraphError::InvalidIdentifier {
            id: name,
            reason: "not a legal stack name".to_string(),
        });
    }
    Ok(name)
}

/// Map disallowed characters to `-`, collapse runs and trim the ends.
fn stack_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = if c.is_ascii_alphanumeric() { c } else { '-' };
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches('-').to_string()
}

fn bound(id: String, max: usize) -> String {
    if id.len() <= max {
        return id;
    }
    let digest = short_digest(&[id.as_str()]);
    format!("{}{}", &id[..max - SHORT_DIGEST_LEN], digest)
}
