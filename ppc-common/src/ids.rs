//! Identifier issuing
//!
//! Every job and every audit chain hangs off an identifier minted here.
//! Identifiers are UUIDv4 and are stable strings once issued; nothing in the
//! system re-derives them.

use uuid::Uuid;

/// Mint a new ingestion job identifier
pub fn new_job_id() -> Uuid {
    Uuid::new_v4()
}

/// Mint a new correlation identifier
pub fn new_correlation_id() -> Uuid {
    Uuid::new_v4()
}

/// Parse an identifier from a string
pub fn parse(s: &str) -> Result<Uuid, uuid::Error> {
    Uuid::parse_str(s)
}

/// Normalize an optional caller-supplied correlation id.
///
/// A well-formed UUID is accepted verbatim; anything else (including empty
/// strings) is replaced with a freshly minted id. Malformed values are never
/// coerced.
pub fn resolve_correlation_id(supplied: Option<&str>) -> Uuid {
    match supplied {
        Some(s) => parse(s.trim()).unwrap_or_else(|_| new_correlation_id()),
        None => new_correlation_id(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(new_job_id(), new_job_id());
        assert_ne!(new_correlation_id(), new_correlation_id());
    }

    #[test]
    fn test_resolve_accepts_well_formed_uuid_verbatim() {
        let id = new_correlation_id();
        let resolved = resolve_correlation_id(Some(&id.to_string()));
        assert_eq!(resolved, id);
    }

    #[test]
    fn test_resolve_mints_for_malformed_input() {
        let resolved = resolve_correlation_id(Some("not-a-uuid"));
        assert_ne!(resolved.to_string(), "not-a-uuid");
    }

    #[test]
    fn test_resolve_mints_when_absent() {
        let a = resolve_correlation_id(None);
        let b = resolve_correlation_id(None);
        assert_ne!(a, b);
    }
}
