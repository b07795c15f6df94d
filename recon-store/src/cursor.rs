// Keyset pagination cursor: base64url-encoded (created_at, id) ordering key

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, StoreError};

/// Ordering key of the last row on a page. Scans resume strictly below
/// it, so rows inserted after the cursor was issued can never reappear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageCursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

impl PageCursor {
    pub fn new(created_at: DateTime<Utc>, id: Uuid) -> Self {
        PageCursor { created_at, id }
    }

    /// Serialize to a URL-safe opaque token.
    pub fn encode(&self) -> String {
        // PageCursor serializes to a flat JSON object; this cannot fail
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Parse a client-supplied token, rejecting anything that is not a
    /// base64url JSON object with a valid RFC 3339 timestamp and UUID.
    pub fn decode(token: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|e| StoreError::BadCursor(format!("not base64url: {e}")))?;

        serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::BadCursor(format!("malformed cursor payload: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_round_trip() {
        let cursor = PageCursor::new(
            Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap(),
            Uuid::from_u128(42),
        );

        let token = cursor.encode();
        let decoded = PageCursor::decode(&token).unwrap();

        assert_eq!(decoded, cursor);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(PageCursor::decode("not a cursor!!").is_err());
        assert!(PageCursor::decode("").is_err());
    }

    #[test]
    fn test_rejects_valid_base64_with_bad_payload() {
        let token = URL_SAFE_NO_PAD.encode(b"{\"createdAt\":\"yesterday\",\"id\":\"nope\"}");
        let err = PageCursor::decode(&token).unwrap_err();
        assert!(matches!(err, StoreError::BadCursor(_)));
    }

    #[test]
    fn test_rejects_missing_fields() {
        let token = URL_SAFE_NO_PAD.encode(b"{\"createdAt\":\"2024-01-15T10:30:00Z\"}");
        assert!(PageCursor::decode(&token).is_err());
    }

    #[test]
    fn test_token_is_url_safe() {
        let cursor = PageCursor::new(Utc::now(), Uuid::new_v4());
        let token = cursor.encode();
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
