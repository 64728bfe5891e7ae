//! Execution context for data triggers and entropy generation

use chrono::{DateTime, TimeZone, Utc};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::data_contract::DataContract;
use crate::state_repository::StateRepository;
use crate::types::{BlockHeader, Identifier, TimestampMillis};

/// Frozen time taken from the latest block header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterministicTime {
    millis: TimestampMillis,
}

impl DeterministicTime {
    pub fn from_block_header(header: &BlockHeader) -> Self {
        Self {
            millis: header.time_millis(),
        }
    }

    pub fn from_millis(millis: TimestampMillis) -> Self {
        Self { millis }
    }

    pub fn millis(&self) -> TimestampMillis {
        self.millis
    }

    /// The frozen time as a UTC date, if representable
    pub fn current(&self) -> Option<DateTime<Utc>> {
        let millis = i64::try_from(self.millis).ok()?;
        Utc.timestamp_millis_opt(millis).single()
    }
}

/// Seeded random number generator for reproducible entropy
#[derive(Debug)]
pub struct SeededRandom {
    rng: ChaCha8Rng,
    seed: u64,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Seed from operating system randomness
    pub fn from_entropy() -> Self {
        let seed = rand::thread_rng().gen();
        Self::new(seed)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn next_u64(&mut self) -> u64 {
        self.rng.gen()
    }

    /// Fresh 32 bytes of entropy for id derivation
    pub fn entropy(&mut self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        self.rng.fill_bytes(&mut bytes);
        bytes
    }
}

impl Clone for SeededRandom {
    fn clone(&self) -> Self {
        // Restart from the seed so clones replay the same sequence
        Self::new(self.seed)
    }
}

/// What a data trigger may observe while it runs
///
/// The repository is read-only here: triggers run during validation and
/// must not mutate state.
pub struct DataTriggerExecutionContext<'a> {
    repository: &'a dyn StateRepository,
    owner_id: Identifier,
    data_contract: &'a DataContract,
    block_time: DeterministicTime,
}

impl<'a> DataTriggerExecutionContext<'a> {
    pub fn new(
        repository: &'a dyn StateRepository,
        owner_id: Identifier,
        data_contract: &'a DataContract,
        block_time: DeterministicTime,
    ) -> Self {
        Self {
            repository,
            owner_id,
            data_contract,
            block_time,
        }
    }

    pub fn repository(&self) -> &'a dyn StateRepository {
        self.repository
    }

    pub fn owner_id(&self) -> Identifier {
        self.owner_id
    }

    pub fn data_contract(&self) -> &'a DataContract {
        self.data_contract
    }

    pub fn block_time(&self) -> DeterministicTime {
        self.block_time
    }
}

impl fmt::Debug for DataTriggerExecutionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataTriggerExecutionContext")
            .field("owner_id", &self.owner_id)
            .field("data_contract_id", &self.data_contract.id())
            .field("block_time", &self.block_time)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_entropy_is_reproducible() {
        let mut a = SeededRandom::new(42);
        let mut b = SeededRandom::new(42);
        assert_eq!(a.entropy(), b.entropy());
        assert_ne!(a.entropy(), SeededRandom::new(43).entropy());
    }

    #[test]
    fn test_clone_restarts_sequence() {
        let mut original = SeededRandom::new(7);
        let first = original.next_u64();
        let mut clone = original.clone();
        assert_eq!(clone.next_u64(), first);
    }

    #[test]
    fn test_block_time() {
        let time = DeterministicTime::from_block_header(&BlockHeader::from_seconds(1_700_000_000));
        assert_eq!(time.millis(), 1_700_000_000_000);
        assert_eq!(time.current().map(|t| t.timestamp()), Some(1_700_000_000));
    }
}
