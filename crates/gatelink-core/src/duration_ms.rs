//! Serde helper storing a `Duration` as integer milliseconds.
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use std::time::Duration;
//!
//! #[derive(Serialize, Deserialize)]
//! struct Timing {
//!     #[serde(with = "gatelink_core::duration_ms")]
//!     timeout: Duration,
//! }
//!
//! let timing: Timing = serde_json::from_str(r#"{"timeout": 500}"#).unwrap();
//! assert_eq!(timing.timeout, Duration::from_millis(500));
//! ```

use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis().min(u64::MAX as u128) as u64)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Timing {
        #[serde(with = "super")]
        timeout: Duration,
    }

    #[test]
    fn test_milliseconds_roundtrip() {
        let timing = Timing {
            timeout: Duration::from_millis(1500),
        };
        let json = serde_json::to_string(&timing).unwrap();
        assert_eq!(json, r#"{"timeout":1500}"#);
        assert_eq!(serde_json::from_str::<Timing>(&json).unwrap(), timing);
    }

    #[test]
    fn test_rejects_negative() {
        assert!(serde_json::from_str::<Timing>(r#"{"timeout":-1}"#).is_err());
    }
}
