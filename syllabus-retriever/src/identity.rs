//! Content-addressed point identity.
//!
//! A point id is a pure function of the document id and the first 100
//! characters of the content: the MD5 digest of `"{document_id}_{prefix}"`,
//! truncated to its leading 15 hex digits (60 bits) and read as an integer.
//! Re-adding the same content under the same document therefore overwrites
//! the existing point instead of creating a duplicate.
//!
//! Two different contents that share their first 100 characters under the
//! same document id map to the same point, and the later one wins. This is a
//! known limitation kept for compatibility with ids already stored in
//! existing collections.

use crate::index::PointId;

/// Number of content characters that take part in the id.
pub const CONTENT_PREFIX_CHARS: usize = 100;

const ID_HEX_DIGITS: usize = 15;

/// Derive the point id for `(document_id, content)`.
pub fn derive_point_id(document_id: &str, content: &str) -> PointId {
    let prefix: String = content.chars().take(CONTENT_PREFIX_CHARS).collect();
    let digest = md5::compute(format!("{document_id}_{prefix}"));
    let hex = format!("{digest:x}");

    // 15 hex digits always fit in a u64, so fold them directly.
    hex.chars()
        .take(ID_HEX_DIGITS)
        .filter_map(|c| c.to_digit(16))
        .fold(0u64, |acc, d| (acc << 4) | u64::from(d))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let a = derive_point_id("doc-1", "Derivatives measure rate of change.");
        let b = derive_point_id("doc-1", "Derivatives measure rate of change.");
        assert_eq!(a, b);
    }

    #[test]
    fn test_matches_digest_prefix() {
        let digest = format!("{:x}", md5::compute("doc-1_hello"));
        let expected = u64::from_str_radix(&digest[..15], 16).unwrap();

        assert_eq!(derive_point_id("doc-1", "hello"), expected);
    }

    #[test]
    fn test_fits_in_sixty_bits() {
        for i in 0..50 {
            let id = derive_point_id(&format!("doc-{i}"), "content");
            assert!(id < (1u64 << 60));
        }
    }

    #[test]
    fn test_document_id_separates_points() {
        let content = "Same content in two documents.";
        assert_ne!(
            derive_point_id("doc-1", content),
            derive_point_id("doc-2", content)
        );
    }

    #[test]
    fn test_only_prefix_counts() {
        let prefix = "x".repeat(CONTENT_PREFIX_CHARS);
        let first = format!("{prefix} first ending");
        let second = format!("{prefix} a completely different ending");

        assert_eq!(
            derive_point_id("doc", &first),
            derive_point_id("doc", &second)
        );
        assert_ne!(
            derive_point_id("doc", &prefix[..99]),
            derive_point_id("doc", &prefix)
        );
    }

    #[test]
    fn test_prefix_counts_characters_not_bytes() {
        // 100 two-byte characters followed by different tails.
        let prefix = "é".repeat(CONTENT_PREFIX_CHARS);
        assert_eq!(
            derive_point_id("doc", &format!("{prefix}a")),
            derive_point_id("doc", &format!("{prefix}b"))
        );
    }
}
