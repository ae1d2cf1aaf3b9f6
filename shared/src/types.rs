//! Common types used across the platform

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// GPS coordinates
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GpsCoordinates {
    pub latitude: Decimal,
    pub longitude: Decimal,
}

impl GpsCoordinates {
    pub fn new(latitude: Decimal, longitude: Decimal) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl std::fmt::Display for GpsCoordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

/// Result of a lookup that is allowed to fail without failing its parent.
///
/// Consumers must match on the marker; a missing sub-lookup is never a
/// silent `null`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Availability<T> {
    Available { data: T },
    Unavailable { reason: String },
}

impl<T> Availability<T> {
    pub fn available(data: T) -> Self {
        Availability::Available { data }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Availability::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available { .. })
    }

    pub fn as_option(&self) -> Option<&T> {
        match self {
            Availability::Available { data } => Some(data),
            Availability::Unavailable { .. } => None,
        }
    }

    /// Reason recorded when the lookup failed
    pub fn reason(&self) -> Option<&str> {
        match self {
            Availability::Available { .. } => None,
            Availability::Unavailable { reason } => Some(reason),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Availability<U> {
        match self {
            Availability::Available { data } => Availability::Available { data: f(data) },
            Availability::Unavailable { reason } => Availability::Unavailable { reason },
        }
    }
}

impl<T, E: std::fmt::Display> From<Result<T, E>> for Availability<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(data) => Availability::available(data),
            Err(e) => Availability::unavailable(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_availability_from_result() {
        let ok: Availability<i32> = Ok::<_, String>(7).into();
        assert_eq!(ok.as_option(), Some(&7));
        assert!(ok.reason().is_none());

        let err: Availability<i32> = Err::<i32, _>("soil service timed out").into();
        assert!(!err.is_available());
        assert_eq!(err.reason(), Some("soil service timed out"));
    }

    #[test]
    fn test_availability_serializes_with_status_tag() {
        let marker: Availability<u8> = Availability::unavailable("offline");
        let json = serde_json::to_value(&marker).unwrap();
        assert_eq!(json["status"], "unavailable");
        assert_eq!(json["reason"], "offline");
    }
}
