//! DST - Deterministic Simulation Testing
//!
//! Seeded fault injection for the in-memory [`SimDriver`](crate::SimDriver).
//!
//! # Philosophy
//!
//! > "If you're not testing with fault injection, you're not testing."
//!
//! # Usage
//!
//! ```rust
//! use omnistore::dst::{FaultConfig, FaultInjector, FaultType};
//! use omnistore::SimDriver;
//!
//! let faults = FaultInjector::new(42)
//!     .with_fault(FaultConfig::new(FaultType::TransientWrite, 0.1));
//! let driver = SimDriver::new("accounts").with_faults(faults);
//! ```
//!
//! Run with explicit seed for reproducibility:
//! ```bash
//! DST_SEED=12345 cargo test
//! ```

mod fault;
mod rng;

pub use fault::{FaultConfig, FaultInjector, FaultPoint, FaultType};
pub use rng::DeterministicRng;
