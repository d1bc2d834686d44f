//! Subscriber number generator.

use crate::factory::GenerationError;
use cdr_core::ServiceType;
use rand::Rng;

/// Default dialing prefixes for generated numbers.
pub const DEFAULT_PREFIXES: [&str; 4] = ["+20100", "+20111", "+20122", "+20155"];

/// Digits appended after the prefix.
pub const DEFAULT_SUBSCRIBER_DIGITS: usize = 7;

/// How many draws are allowed to find a terminating number different from the originating one.
const MAX_DISTINCT_DRAWS: usize = 16;

#[derive(Debug, Clone)]
enum NumberPool {
    /// Prefix plus random subscriber digits.
    Random {
        prefixes: Vec<String>,
        digits: usize,
    },
    /// A fixed subscriber directory.
    Directory(Vec<String>),
}

/// Draws originating and terminating numbers.
///
/// Data sessions have no terminating party, so `bnum` is `None` for
/// [`ServiceType::Data`] and always a number different from `anum` otherwise.
#[derive(Debug, Clone)]
pub struct NumberGenerator {
    pool: NumberPool,
}

impl Default for NumberGenerator {
    fn default() -> Self {
        Self::random(
            DEFAULT_PREFIXES.iter().map(|p| p.to_string()).collect(),
            DEFAULT_SUBSCRIBER_DIGITS,
        )
    }
}

impl NumberGenerator {
    /// Numbers made of one of `prefixes` followed by `digits` random digits.
    pub fn random(prefixes: Vec<String>, digits: usize) -> Self {
        Self {
            pool: NumberPool::Random { prefixes, digits },
        }
    }

    /// Numbers drawn from a fixed subscriber directory.
    pub fn from_directory(numbers: Vec<String>) -> Self {
        Self {
            pool: NumberPool::Directory(numbers),
        }
    }

    /// Draw a single number.
    pub fn number<R: Rng>(&self, rng: &mut R) -> Result<String, GenerationError> {
        match &self.pool {
            NumberPool::Random { prefixes, digits } => {
                if prefixes.is_empty() || *digits == 0 {
                    return Err(GenerationError::EmptyNumberPool);
                }
                let prefix = &prefixes[rng.gen_range(0..prefixes.len())];
                let mut number = String::with_capacity(prefix.len() + digits);
                number.push_str(prefix);
                for _ in 0..*digits {
                    number.push(char::from(b'0' + rng.gen_range(0..10u8)));
                }
                Ok(number)
            }
            NumberPool::Directory(numbers) => {
                if numbers.is_empty() {
                    return Err(GenerationError::EmptyNumberPool);
                }
                Ok(numbers[rng.gen_range(0..numbers.len())].clone())
            }
        }
    }

    /// Draw the originating and terminating numbers for a record.
    pub fn generate<R: Rng>(
        &self,
        rng: &mut R,
        service_type: ServiceType,
    ) -> Result<(String, Option<String>), GenerationError> {
        let anum = self.number(rng)?;
        if service_type == ServiceType::Data {
            return Ok((anum, None));
        }
        for _ in 0..MAX_DISTINCT_DRAWS {
            let bnum = self.number(rng)?;
            if bnum != anum {
                return Ok((anum, Some(bnum)));
            }
        }
        Err(GenerationError::NoDistinctCounterpart(anum))
    }
}
