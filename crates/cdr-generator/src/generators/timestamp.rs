//! Start timestamp generator.

use crate::factory::GenerationError;
use cdr_core::Cdr;
use chrono::{Duration, NaiveDate};
use rand::Rng;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Draws a start time uniformly within one calendar day.
#[derive(Debug, Clone, Default)]
pub struct TimestampGenerator;

impl TimestampGenerator {
    /// Random second of `day`, formatted as `YYYY-MM-DDTHH:MM:SS`.
    pub fn generate<R: Rng>(&self, rng: &mut R, day: NaiveDate) -> Result<String, GenerationError> {
        let midnight = day
            .and_hms_opt(0, 0, 0)
            .ok_or(GenerationError::InvalidDay(day))?;
        let offset = Duration::seconds(rng.gen_range(0..SECONDS_PER_DAY));
        Ok(Cdr::format_start(midnight + offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_timestamp_stays_within_day() {
        let mut rng = StdRng::seed_from_u64(42);
        let day = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        for _ in 0..100 {
            let ts = TimestampGenerator.generate(&mut rng, day).unwrap();
            assert!(ts.starts_with("2024-02-29T"), "{ts}");
            assert_eq!(ts.len(), 19);
        }
    }

    #[test]
    fn test_deterministic_generation() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut rng1 = StdRng::seed_from_u64(42);
        let mut rng2 = StdRng::seed_from_u64(42);
        assert_eq!(
            TimestampGenerator.generate(&mut rng1, day).unwrap(),
            TimestampGenerator.generate(&mut rng2, day).unwrap()
        );
    }
}
