//! Translation between the store's native key and its wire form.
//!
//! Blogs are keyed by BSON [`ObjectId`]s in storage and travel over gRPC as
//! 24-character lowercase hexadecimal strings. All conversions go through
//! [`parse_key`] and [`render_key`].

use blog_tonic_core::{Error, Result};
use bson::oid::ObjectId;

/// Parses a wire identifier into an [`ObjectId`].
///
/// # Errors
///
/// Returns [`Error::InvalidId`] for anything that is not exactly 24
/// hexadecimal characters, including the empty string.
pub fn parse_key(id: &str) -> Result<ObjectId> {
    if id.is_empty() {
        return Err(Error::InvalidId {
            id: String::new(),
            reason: "id must not be empty".to_string(),
        });
    }

    ObjectId::parse_str(id).map_err(|e| Error::InvalidId {
        id: id.to_string(),
        reason: e.to_string(),
    })
}

/// Renders an [`ObjectId`] as its wire identifier.
pub fn render_key(key: &ObjectId) -> String {
    key.to_hex()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_rendered_keys() {
        let key = ObjectId::new();
        let rendered = render_key(&key);
        assert_eq!(rendered.len(), 24);
        assert_eq!(parse_key(&rendered).unwrap(), key);
    }

    #[test]
    fn parse_accepts_uppercase_hex() {
        let key = parse_key("65F0C0FFEE0000000000BEEF").unwrap();
        assert_eq!(render_key(&key), "65f0c0ffee0000000000beef");
    }

    #[test]
    fn parse_rejects_malformed_ids() {
        for bad in [
            "",
            "_iud",
            "65f0c0ffee0000000000bee",
            "65f0c0ffee0000000000beef0",
            "zzzzzzzzzzzzzzzzzzzzzzzz",
            " 65f0c0ffee0000000000beef",
        ] {
            match parse_key(bad) {
                Err(Error::InvalidId { id, .. }) => assert_eq!(id, bad),
                other => panic!("expected InvalidId for {bad:?}, got {other:?}"),
            }
        }
    }
}
