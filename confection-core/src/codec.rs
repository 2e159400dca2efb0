//! CBOR encoding of persisted values.

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode record: {0}")]
    Encode(String),
    #[error("failed to decode record: {0}")]
    Decode(String),
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Decodes a value. Items are re-validated on the way in, so a record
/// violating an invariant is reported as a decode error.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    ciborium::from_reader(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Item, ItemId, SchemaStamp, Status};

    #[test]
    fn item_survives_encoding() {
        let item = Item::new("Kyiv cake", "cake", 24.0, 1000)
            .unwrap()
            .with_description("hazelnut meringue")
            .with_status(Status::OutOfStock)
            .with_id(ItemId::new(7));

        let decoded: Item = decode(&encode(&item).unwrap()).unwrap();
        assert_eq!(decoded, item);
    }

    #[test]
    fn schema_stamp_survives_encoding() {
        let stamp = SchemaStamp::current();
        let decoded: SchemaStamp = decode(&encode(&stamp).unwrap()).unwrap();
        assert_eq!(decoded, stamp);
    }

    #[derive(Serialize)]
    struct RawRecord {
        id: u64,
        name: &'static str,
        category: &'static str,
        price: f64,
        weight: i64,
        description: Option<String>,
        status: &'static str,
    }

    #[test]
    fn invalid_record_fails_to_decode() {
        let raw = RawRecord {
            id: 3,
            name: "Macaron",
            category: "cookie",
            price: -1.0,
            weight: 20,
            description: None,
            status: "available",
        };
        let bytes = encode(&raw).unwrap();
        assert!(matches!(decode::<Item>(&bytes), Err(CodecError::Decode(_))));
    }

    #[test]
    fn unknown_status_fails_to_decode() {
        let raw = RawRecord {
            id: 3,
            name: "Macaron",
            category: "cookie",
            price: 1.0,
            weight: 20,
            description: None,
            status: "sold",
        };
        let bytes = encode(&raw).unwrap();
        assert!(decode::<Item>(&bytes).is_err());
    }
}
