//! Field value encodings.
//!
//! Structured fields (names, owners, flags, maps) share one JSON codec so a
//! new field never needs a new binary layout. Byte blobs are stored verbatim.
//! Timestamps use a fixed-width, order-preserving encoding.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{StoreError, StoreResult};

/// Width of an encoded timestamp.
pub const TIME_LEN: usize = 8;

const SIGN_BIT: u64 = 1 << 63;

pub fn encode_value<T: Serialize>(field: &'static str, value: &T) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| StoreError::Encode {
        field,
        reason: e.to_string(),
    })
}

pub fn decode_value<T: DeserializeOwned>(field: &'static str, bytes: &[u8]) -> StoreResult<T> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Decode {
        field,
        reason: e.to_string(),
    })
}

/// Encode a timestamp as big-endian microseconds with the sign bit flipped,
/// so that byte-wise comparison matches chronological order.
pub fn encode_time(time: &DateTime<Utc>) -> [u8; TIME_LEN] {
    ((time.timestamp_micros() as u64) ^ SIGN_BIT).to_be_bytes()
}

pub fn decode_time(field: &'static str, bytes: &[u8]) -> StoreResult<DateTime<Utc>> {
    let raw: [u8; TIME_LEN] = bytes.try_into().map_err(|_| StoreError::Decode {
        field,
        reason: format!("expected {TIME_LEN} bytes, got {}", bytes.len()),
    })?;
    let micros = (u64::from_be_bytes(raw) ^ SIGN_BIT) as i64;
    DateTime::<Utc>::from_timestamp_micros(micros).ok_or_else(|| StoreError::Decode {
        field,
        reason: format!("timestamp out of range: {micros}"),
    })
}

/// The current time at the store's resolution (microseconds).
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::<Utc>::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn time_roundtrip_at_micro_resolution() {
        let t = now();
        let back = decode_time("created_at", &encode_time(&t)).unwrap();
        assert_eq!(t, back);
    }

    #[test]
    fn time_encoding_preserves_order() {
        let times = [
            Utc.with_ymd_and_hms(1960, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 17, 12, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 17, 12, 0, 1).unwrap(),
        ];
        for pair in times.windows(2) {
            assert!(encode_time(&pair[0]) < encode_time(&pair[1]));
        }
    }

    #[test]
    fn decode_time_rejects_short_input() {
        let err = decode_time("updated_at", &[1, 2, 3]).unwrap_err();
        assert!(matches!(err, StoreError::Decode { field: "updated_at", .. }));
    }

    #[test]
    fn value_roundtrip() {
        let bytes = encode_value("name", &"photos".to_string()).unwrap();
        let back: String = decode_value("name", &bytes).unwrap();
        assert_eq!(back, "photos");
    }

    #[test]
    fn decode_value_reports_field() {
        let err = decode_value::<bool>("is_private", b"not json").unwrap_err();
        assert!(matches!(err, StoreError::Decode { field: "is_private", .. }));
    }
}
