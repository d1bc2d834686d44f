//! Service type generator.

use cdr_core::ServiceType;
use rand::Rng;

/// Draws a service type uniformly from call, sms and data.
#[derive(Debug, Clone, Default)]
pub struct ServiceTypeGenerator;

impl ServiceTypeGenerator {
    pub fn generate<R: Rng>(&self, rng: &mut R) -> ServiceType {
        ServiceType::ALL[rng.gen_range(0..ServiceType::ALL.len())]
    }
}
