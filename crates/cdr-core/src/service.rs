//! Service types a CDR can bill for.

use crate::error::CdrError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// The kind of usage a record bills for.
///
/// The usage unit depends on the service type: minutes for [`ServiceType::Call`],
/// message count for [`ServiceType::Sms`] and bytes for [`ServiceType::Data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceType {
    Call,
    Sms,
    Data,
}

impl ServiceType {
    /// All service types in their canonical order.
    pub const ALL: [ServiceType; 3] = [ServiceType::Call, ServiceType::Sms, ServiceType::Data];

    /// Lowercase identifier used on the wire and in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Call => "call",
            ServiceType::Sms => "sms",
            ServiceType::Data => "data",
        }
    }

    /// Price per usage unit.
    pub fn rate(&self) -> f64 {
        match self {
            ServiceType::Call => 0.50,
            ServiceType::Sms => 0.25,
            ServiceType::Data => 0.50,
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = CdrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "call" => Ok(ServiceType::Call),
            "sms" => Ok(ServiceType::Sms),
            "data" => Ok(ServiceType::Data),
            _ => Err(CdrError::UnknownServiceType(s.to_string())),
        }
    }
}

impl Serialize for ServiceType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ServiceType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
