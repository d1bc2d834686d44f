//! Usage value generator.

use crate::factory::GenerationError;
use cdr_core::ServiceType;
use rand::Rng;
use std::ops::RangeInclusive;

/// Draws a usage amount whose unit depends on the service type.
///
/// - call: whole minutes
/// - sms: message count
/// - data: bytes
#[derive(Debug, Clone)]
pub struct UsageGenerator {
    call_minutes: RangeInclusive<u64>,
    sms_messages: RangeInclusive<u64>,
    data_bytes: RangeInclusive<u64>,
}

impl Default for UsageGenerator {
    fn default() -> Self {
        Self {
            call_minutes: 1..=120,
            sms_messages: 1..=20,
            data_bytes: 1_024..=524_288_000,
        }
    }
}

impl UsageGenerator {
    pub fn new(
        call_minutes: RangeInclusive<u64>,
        sms_messages: RangeInclusive<u64>,
        data_bytes: RangeInclusive<u64>,
    ) -> Self {
        Self {
            call_minutes,
            sms_messages,
            data_bytes,
        }
    }

    pub fn generate<R: Rng>(
        &self,
        rng: &mut R,
        service_type: ServiceType,
    ) -> Result<f64, GenerationError> {
        let range = match service_type {
            ServiceType::Call => &self.call_minutes,
            ServiceType::Sms => &self.sms_messages,
            ServiceType::Data => &self.data_bytes,
        };
        if range.is_empty() {
            return Err(GenerationError::InvalidUsageRange {
                service_type,
                min: *range.start(),
                max: *range.end(),
            });
        }
        Ok(rng.gen_range(range.clone()) as f64)
    }
}
