//! The record factory.

use crate::generators::{NumberGenerator, ServiceTypeGenerator, TimestampGenerator, UsageGenerator};
use cdr_core::{Cdr, CdrError, ServiceType};
use chrono::{NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

/// Error type for record generation.
///
/// Generation errors are local to one draft: the draft is dropped and the
/// caller asks for a new one.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The number generator has nothing to draw from
    #[error("Number pool is empty")]
    EmptyNumberPool,

    /// No terminating number different from the originating one could be drawn
    #[error("Could not draw a terminating number different from {0}")]
    NoDistinctCounterpart(String),

    /// Usage range for a service type is empty
    #[error("Usage range for {service_type} is empty ({min}..={max})")]
    InvalidUsageRange {
        service_type: ServiceType,
        min: u64,
        max: u64,
    },

    /// The target day has no midnight
    #[error("Invalid target day: {0}")]
    InvalidDay(NaiveDate),

    /// The assembled draft violates a record invariant
    #[error("Generated record is invalid: {0}")]
    InvalidRecord(#[from] CdrError),

    /// Failure reported by a custom record source
    #[error("Record source failed: {0}")]
    Source(String),
}

/// Anything that can hand out records one at a time.
///
/// The generation pipeline only depends on this trait, so tests can plug in
/// stubs and the CLI plugs in a [`RecordFactory`].
pub trait RecordSource: Send + 'static {
    fn next_record(&mut self) -> Result<Cdr, GenerationError>;
}

impl<F> RecordSource for F
where
    F: FnMut() -> Result<Cdr, GenerationError> + Send + 'static,
{
    fn next_record(&mut self) -> Result<Cdr, GenerationError> {
        self()
    }
}

/// Produces synthetic call detail records.
///
/// The factory is stateless apart from its RNG: every call assembles a
/// fresh draft from the field generators.
pub struct RecordFactory {
    numbers: NumberGenerator,
    services: ServiceTypeGenerator,
    usage: UsageGenerator,
    timestamps: TimestampGenerator,
    /// Seeded random number generator for reproducibility
    rng: StdRng,
    /// Day used by [`RecordSource::next_record`], `None` for the current day
    target_date: Option<NaiveDate>,
}

impl RecordFactory {
    /// Create a factory with default field generators and the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            numbers: NumberGenerator::default(),
            services: ServiceTypeGenerator,
            usage: UsageGenerator::default(),
            timestamps: TimestampGenerator,
            rng: StdRng::seed_from_u64(seed),
            target_date: None,
        }
    }

    pub fn with_numbers(mut self, numbers: NumberGenerator) -> Self {
        self.numbers = numbers;
        self
    }

    pub fn with_usage(mut self, usage: UsageGenerator) -> Self {
        self.usage = usage;
        self
    }

    /// Pin the records produced through [`RecordSource`] to `date`.
    pub fn with_target_date(mut self, date: Option<NaiveDate>) -> Self {
        self.target_date = date;
        self
    }

    /// Generate one record starting some time today (UTC).
    pub fn generate(&mut self) -> Result<Cdr, GenerationError> {
        self.generate_for_date(Utc::now().date_naive())
    }

    /// Generate one record starting some time on `date`.
    pub fn generate_for_date(&mut self, date: NaiveDate) -> Result<Cdr, GenerationError> {
        self.draft(date).inspect_err(|e| debug!("Discarding {date} draft: {e}"))
    }

    fn draft(&mut self, date: NaiveDate) -> Result<Cdr, GenerationError> {
        let service_type = self.services.generate(&mut self.rng);
        let (anum, bnum) = self.numbers.generate(&mut self.rng, service_type)?;
        let usage = self.usage.generate(&mut self.rng, service_type)?;
        let start = self.timestamps.generate(&mut self.rng, date)?;

        let cdr = Cdr::new(anum, bnum, service_type, usage, start);
        cdr.validate()?;
        Ok(cdr)
    }
}

impl RecordSource for RecordFactory {
    fn next_record(&mut self) -> Result<Cdr, GenerationError> {
        match self.target_date {
            Some(date) => self.generate_for_date(date),
            None => self.generate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_single_record() {
        let mut factory = RecordFactory::new(42);
        let cdr = factory.generate().unwrap();

        assert!(cdr.validate().is_ok());
        assert!(cdr.id.is_none());
        let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();
        // A run straddling midnight may see the next day.
        let tomorrow = (Utc::now().date_naive() + chrono::Duration::days(1))
            .format("%Y-%m-%d")
            .to_string();
        assert!(cdr.started_on(&today) || cdr.started_on(&tomorrow));
    }

    #[test]
    fn test_generate_for_date() {
        let mut factory = RecordFactory::new(42);
        let date = NaiveDate::from_ymd_opt(2023, 12, 24).unwrap();
        for _ in 0..50 {
            let cdr = factory.generate_for_date(date).unwrap();
            assert!(cdr.started_on("2023-12-24"));
            match cdr.service_type {
                ServiceType::Data => assert!(cdr.bnum.is_none()),
                _ => assert!(cdr.bnum.is_some()),
            }
        }
    }

    #[test]
    fn test_deterministic_generation() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut factory1 = RecordFactory::new(42);
        let mut factory2 = RecordFactory::new(42);
        for _ in 0..10 {
            assert_eq!(
                factory1.generate_for_date(date).unwrap(),
                factory2.generate_for_date(date).unwrap()
            );
        }
    }

    #[test]
    fn test_record_source_uses_target_date() {
        let date = NaiveDate::from_ymd_opt(2022, 6, 30).unwrap();
        let mut factory = RecordFactory::new(1).with_target_date(Some(date));
        let cdr = factory.next_record().unwrap();
        assert!(cdr.started_on("2022-06-30"));
    }

    #[test]
    fn test_sub_generator_failure_is_reported() {
        let mut factory =
            RecordFactory::new(1).with_numbers(NumberGenerator::from_directory(Vec::new()));
        assert!(matches!(
            factory.generate(),
            Err(GenerationError::EmptyNumberPool)
        ));
    }

    #[test]
    fn test_closure_record_source() {
        let mut calls = 0;
        let mut source = move || {
            calls += 1;
            Ok::<Cdr, GenerationError>(Cdr::new(
                format!("{calls}"),
                None,
                ServiceType::Data,
                1.0,
                "2024-01-01T00:00:00",
            ))
        };
        assert_eq!(source.next_record().unwrap().anum, "1");
        assert_eq!(source.next_record().unwrap().anum, "2");
    }
}
