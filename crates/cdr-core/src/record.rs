//! The call detail record.

use crate::error::CdrError;
use crate::service::ServiceType;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Storage-assigned surrogate key.
pub type CdrId = i64;

/// Format of [`Cdr::start_date_time`].
///
/// The format sorts lexically in chronological order and its first ten
/// characters are the calendar day, so day filtering is a prefix match.
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// One billable telecom usage event.
///
/// Field names on the wire follow the JSON payload published to the broker:
/// `id`, `anum`, `bnum`, `serviceType`, `usage`, `startDateTime`.
/// `bnum` is always serialized, as `null` when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cdr {
    /// Absent until the record is first persisted.
    #[serde(default)]
    pub id: Option<CdrId>,
    /// Originating number.
    pub anum: String,
    /// Terminating number, `None` for usage without a counterpart.
    #[serde(default)]
    pub bnum: Option<String>,
    pub service_type: ServiceType,
    /// Minutes, message count or bytes depending on `service_type`.
    pub usage: f64,
    pub start_date_time: String,
}

impl Cdr {
    /// Create a transient record (no id).
    pub fn new(
        anum: impl Into<String>,
        bnum: Option<String>,
        service_type: ServiceType,
        usage: f64,
        start_date_time: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            anum: anum.into(),
            bnum,
            service_type,
            usage,
            start_date_time: start_date_time.into(),
        }
    }

    /// Return the record with the given storage id.
    pub fn with_id(mut self, id: CdrId) -> Self {
        self.id = Some(id);
        self
    }

    /// Return the record with its identity cleared, so storage treats it as new.
    pub fn without_id(mut self) -> Self {
        self.id = None;
        self
    }

    /// Check the non-null field invariants.
    pub fn validate(&self) -> Result<(), CdrError> {
        if self.anum.trim().is_empty() {
            return Err(CdrError::BlankAnum);
        }
        if !self.usage.is_finite() || self.usage < 0.0 {
            return Err(CdrError::InvalidUsage(self.usage));
        }
        self.start_date()?;
        Ok(())
    }

    /// Calendar day the usage started on.
    pub fn start_date(&self) -> Result<NaiveDate, CdrError> {
        let invalid = || CdrError::InvalidStartDateTime(self.start_date_time.clone());
        let day = self.start_date_time.get(..10).ok_or_else(invalid)?;
        NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| invalid())
    }

    /// Whether the record started on `day` (`YYYY-MM-DD` prefix match).
    pub fn started_on(&self, day: &str) -> bool {
        self.start_date_time.starts_with(day)
    }

    /// Format a timestamp the way records store it.
    pub fn format_start(start: NaiveDateTime) -> String {
        start.format(DATE_TIME_FORMAT).to_string()
    }

    /// Read a lookup field as a string, `None` for a null `bnum`.
    pub fn field(&self, field: LookupField) -> Option<&str> {
        match field {
            LookupField::Anum => Some(&self.anum),
            LookupField::Bnum => self.bnum.as_deref(),
            LookupField::ServiceType => Some(self.service_type.as_str()),
            LookupField::StartDateTime => Some(&self.start_date_time),
        }
    }
}

impl fmt::Display for Cdr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CDR(id={}, anum={}, bnum={}, service={}, usage={}, start={})",
            self.id.map_or_else(|| "-".to_string(), |id| id.to_string()),
            self.anum,
            self.bnum.as_deref().unwrap_or("null"),
            self.service_type,
            self.usage,
            self.start_date_time
        )
    }
}

/// Fields storage can be queried by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupField {
    Anum,
    Bnum,
    ServiceType,
    StartDateTime,
}

impl LookupField {
    /// Storage column name.
    pub fn column(&self) -> &'static str {
        match self {
            LookupField::Anum => "anum",
            LookupField::Bnum => "bnum",
            LookupField::ServiceType => "service_type",
            LookupField::StartDateTime => "start_date_time",
        }
    }

    /// Whether `record` matches `value` on this field.
    ///
    /// Service types compare case-insensitively, everything else exactly.
    pub fn matches(&self, record: &Cdr, value: &str) -> bool {
        match self {
            LookupField::ServiceType => value
                .parse::<ServiceType>()
                .is_ok_and(|service| service == record.service_type),
            _ => record.field(*self) == Some(value),
        }
    }
}

impl FromStr for LookupField {
    type Err = CdrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "").as_str() {
            "anum" => Ok(LookupField::Anum),
            "bnum" => Ok(LookupField::Bnum),
            "servicetype" => Ok(LookupField::ServiceType),
            "startdatetime" => Ok(LookupField::StartDateTime),
            _ => Err(CdrError::UnknownField(s.to_string())),
        }
    }
}
