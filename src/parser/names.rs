//! Identifier helpers shared by the graph builder and relationship output.

/// Longest identifier emitted into a schema.
///
/// `SpiceDB` accepts up to 64 characters for definition and relation names;
/// one character of headroom keeps prefixed forms valid.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Canonicalize an arbitrary Keycloak name into a schema-safe identifier body.
///
/// Rules:
/// - lowercase ASCII
/// - replace non `[a-z0-9_]` with `_`
/// - collapse repeated `_`
/// - trim leading/trailing `_`
/// - if empty, return `"unnamed"`
pub fn canonical_identifier(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut previous_was_underscore = false;

    for ch in name.trim().chars() {
        let lower = ch.to_ascii_lowercase();
        if lower.is_ascii_alphanumeric() {
            normalized.push(lower);
            previous_was_underscore = false;
        } else if !previous_was_underscore {
            normalized.push('_');
            previous_was_underscore = true;
        }
    }

    let trimmed = normalized.trim_matches('_');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Join a prefix and a canonicalized name, keeping the result within
/// [`MAX_IDENTIFIER_LEN`].
///
/// Over-long identifiers are cut and suffixed with a hash of the full form,
/// so two long names sharing a prefix still map to distinct identifiers.
pub fn bounded_identifier(prefix: &str, name: &str) -> String {
    let full = format!("{prefix}{}", canonical_identifier(name));
    if full.len() <= MAX_IDENTIFIER_LEN {
        return full;
    }

    let suffix = format!("_{:08x}", fnv1a(full.as_bytes()));
    let keep = MAX_IDENTIFIER_LEN - suffix.len();
    // `full` is pure ASCII, so byte slicing is char-safe.
    let head = full[..keep].trim_end_matches('_');
    format!("{head}{suffix}")
}

/// Make `base` unique to the object it was derived from.
///
/// Used when two source names canonicalize to the same identifier. The
/// suffix hashes `source`, the object's original identifier, so the result
/// is stable across runs and does not depend on declaration order.
pub fn disambiguated_identifier(base: &str, source: &str) -> String {
    let suffix = format!("_{:08x}", fnv1a(source.as_bytes()));
    let keep = base.len().min(MAX_IDENTIFIER_LEN - suffix.len());
    let head = base[..keep].trim_end_matches('_');
    format!("{head}{suffix}")
}

/// Canonicalize a value used as a relationship object id.
///
/// Object ids are more permissive than identifiers: case and `-` survive.
pub fn object_id(value: &str) -> String {
    let id: String = value
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '=' | '+' | '|') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if id.is_empty() {
        "default".to_string()
    } else {
        id
    }
}

fn fnv1a(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0x811c_9dc5_u32, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(0x0100_0193)
    })
}
