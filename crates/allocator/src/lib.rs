//! Notebook Identifier Allocator
//!
//! Pure allocation logic shared by the notebook controller and the
//! admission webhook:
//!
//! - [`pool`]: the set of identifiers currently held and smallest-free search
//! - [`ports`]: deterministic port triple for an identifier
//! - [`config`]: `max-id` / `initial-port` parsing from ConfigMap data
//! - [`validation`]: ceiling and reassignment checks
//!
//! Nothing in this crate performs I/O. Callers list the cluster, build an
//! [`AllocationPool`] and ask it for a decision.

pub mod config;
pub mod error;
pub mod pool;
pub mod ports;
pub mod validation;

pub use config::AllocatorConfig;
pub use error::AllocatorError;
pub use pool::{next_free_id, AllocationPool};
pub use ports::{assign_ports, PortTriple, PORTS_PER_ID};
pub use validation::{validate_ceiling, validate_reassignment, IdViolation};
