//! FaultInjector - Probabilistic, seeded backend failures
//!
//! TigerStyle: Faults are declared up front and fire from a seeded RNG, so a
//! failing run replays exactly from its seed.

use std::sync::Mutex;

use crate::error::{StoreError, StoreResult};

use super::rng::DeterministicRng;

/// Where in an operation a fault may fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    /// A read request (get, get_all, count, exists, search)
    Read,
    /// A write request (create, bulk_insert, update, increment, delete)
    Write,
    /// A transaction commit
    Commit,
}

/// What kind of failure to inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultType {
    /// Retryable failure on reads
    TransientRead,
    /// Retryable failure on writes
    TransientWrite,
    /// Non-retryable failure on reads and writes
    BackendFailure,
    /// Non-retryable failure on commit
    CommitFailure,
}

impl FaultType {
    fn applies_to(self, point: FaultPoint) -> bool {
        match self {
            Self::TransientRead => point == FaultPoint::Read,
            Self::TransientWrite => point == FaultPoint::Write,
            Self::BackendFailure => matches!(point, FaultPoint::Read | FaultPoint::Write),
            Self::CommitFailure => point == FaultPoint::Commit,
        }
    }

    fn to_error(self, point: FaultPoint) -> StoreError {
        match self {
            Self::TransientRead | Self::TransientWrite => {
                StoreError::transient(format!("injected transient fault on {point:?}"))
            }
            Self::BackendFailure | Self::CommitFailure => {
                StoreError::backend(format!("injected backend fault on {point:?}"))
            }
        }
    }
}

/// One declared fault.
#[derive(Debug, Clone, PartialEq)]
pub struct FaultConfig {
    /// Failure kind
    pub fault_type: FaultType,
    /// Chance of firing at each applicable point, in `[0, 1]`
    pub probability: f64,
    /// Stop firing after this many triggers (`None` = unbounded)
    pub triggers_max: Option<u32>,
}

impl FaultConfig {
    /// Create a fault.
    ///
    /// # Panics
    /// Panics if `probability` is outside `[0, 1]`.
    #[must_use]
    pub fn new(fault_type: FaultType, probability: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&probability),
            "probability {probability} must be within [0, 1]"
        );
        Self {
            fault_type,
            probability,
            triggers_max: None,
        }
    }

    /// Fire on every applicable point, `count` times, then never again.
    #[must_use]
    pub fn times(fault_type: FaultType, count: u32) -> Self {
        Self::new(fault_type, 1.0).with_triggers_max(count)
    }

    /// Bound the number of triggers.
    #[must_use]
    pub fn with_triggers_max(mut self, triggers_max: u32) -> Self {
        self.triggers_max = Some(triggers_max);
        self
    }
}

#[derive(Debug)]
struct InjectorState {
    rng: DeterministicRng,
    triggered: Vec<u32>,
    total: u64,
}

/// Decides, per fault point, whether a declared fault fires.
#[derive(Debug)]
pub struct FaultInjector {
    faults: Vec<FaultConfig>,
    state: Mutex<InjectorState>,
}

impl Default for FaultInjector {
    fn default() -> Self {
        Self::new(0)
    }
}

impl FaultInjector {
    /// Injector with no faults.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            faults: Vec::new(),
            state: Mutex::new(InjectorState {
                rng: DeterministicRng::new(seed),
                triggered: Vec::new(),
                total: 0,
            }),
        }
    }

    /// Injector seeded from `DST_SEED` (or entropy, logged).
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(DeterministicRng::from_env_or_random().seed())
    }

    /// Seed driving the dice rolls.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.state.lock().map_or(0, |s| s.rng.seed())
    }

    /// Declare a fault.
    #[must_use]
    pub fn with_fault(mut self, fault: FaultConfig) -> Self {
        self.faults.push(fault);
        if let Ok(state) = self.state.get_mut() {
            state.triggered.push(0);
        }
        self
    }

    /// Total faults fired so far.
    #[must_use]
    pub fn triggered_total(&self) -> u64 {
        self.state.lock().map_or(0, |s| s.total)
    }

    /// Fire the first applicable fault whose dice roll hits.
    ///
    /// # Errors
    /// Returns the injected error when a fault fires.
    pub fn check(&self, point: FaultPoint) -> StoreResult<()> {
        if self.faults.is_empty() {
            return Ok(());
        }
        let Ok(mut state) = self.state.lock() else {
            return Ok(());
        };

        for (i, fault) in self.faults.iter().enumerate() {
            if !fault.fault_type.applies_to(point) {
                continue;
            }
            if fault.triggers_max.is_some_and(|max| state.triggered[i] >= max) {
                continue;
            }
            if state.rng.chance(fault.probability) {
                state.triggered[i] += 1;
                state.total += 1;
                tracing::debug!(fault = ?fault.fault_type, ?point, "fault injected");
                return Err(fault.fault_type.to_error(point));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_faults_never_fire() {
        let injector = FaultInjector::new(1);
        for _ in 0..100 {
            assert!(injector.check(FaultPoint::Write).is_ok());
        }
        assert_eq!(injector.triggered_total(), 0);
    }

    #[test]
    fn test_bounded_triggers() {
        let injector =
            FaultInjector::new(1).with_fault(FaultConfig::times(FaultType::TransientRead, 2));

        assert!(injector.check(FaultPoint::Read).unwrap_err().is_retryable());
        assert!(injector.check(FaultPoint::Write).is_ok());
        assert!(injector.check(FaultPoint::Read).is_err());
        assert!(injector.check(FaultPoint::Read).is_ok());
        assert_eq!(injector.triggered_total(), 2);
    }

    #[test]
    fn test_backend_failure_is_not_retryable() {
        let injector =
            FaultInjector::new(1).with_fault(FaultConfig::new(FaultType::BackendFailure, 1.0));
        let err = injector.check(FaultPoint::Write).unwrap_err();
        assert!(!err.is_retryable());
        assert!(injector.check(FaultPoint::Commit).is_ok());
    }

    #[test]
    fn test_same_seed_same_faults() {
        let run = |seed| {
            let injector = FaultInjector::new(seed)
                .with_fault(FaultConfig::new(FaultType::TransientWrite, 0.5));
            (0..64)
                .map(|_| injector.check(FaultPoint::Write).is_err())
                .collect::<Vec<_>>()
        };
        assert_eq!(run(99), run(99));
    }
}
