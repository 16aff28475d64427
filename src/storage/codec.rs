//! Payload codec for the opaque `data` field.
//!
//! Records are serialized to JSON and stored base64 encoded, so the payload
//! is a single keyword value the document store never tokenizes.

use crate::errors::StorageError;
use crate::storage::traits::Result;
use base64::prelude::*;
use serde::Serialize;
use serde::de::DeserializeOwned;

pub fn encode_payload<T: Serialize>(value: &T) -> Result<String> {
    let bytes = serde_json::to_vec(value).map_err(|e| {
        StorageError::SerializationFailed(format!("Failed to encode payload: {}", e))
    })?;
    Ok(BASE64_STANDARD.encode(bytes))
}

pub fn decode_payload<T: DeserializeOwned>(payload: &str) -> Result<T> {
    let bytes = BASE64_STANDARD.decode(payload).map_err(|e| {
        StorageError::SerializationFailed(format!("Payload is not valid base64: {}", e))
    })?;
    serde_json::from_slice(&bytes)
        .map_err(|e| StorageError::SerializationFailed(format!("Failed to decode payload: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::types::OAuthClient;

    #[test]
    fn test_payload_is_base64_json() {
        let client = OAuthClient::new("client-1", "secret", "https://example.com");
        let payload = encode_payload(&client).unwrap();

        let raw = BASE64_STANDARD.decode(&payload).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(json["id"], "client-1");

        let decoded: OAuthClient = decode_payload(&payload).unwrap();
        assert_eq!(decoded, client);
    }

    #[test]
    fn test_corrupt_payload_is_serialization_error() {
        let err = decode_payload::<OAuthClient>("not base64!").unwrap_err();
        assert!(matches!(err, StorageError::SerializationFailed(_)));

        let not_json = BASE64_STANDARD.encode(b"{\"id\":");
        let err = decode_payload::<OAuthClient>(&not_json).unwrap_err();
        assert!(matches!(err, StorageError::SerializationFailed(_)));
    }
}
