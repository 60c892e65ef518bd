// crates/bulwark-core/src/lib.rs
//
// bulwark-core: Core types, traits, fixed-point math and hashing for the
// Bulwark safety module.
//
// This is the leaf crate the module and the CLI depend on. It defines the
// error type, the address space, the collaborator interfaces the module
// consumes (drip models, triggers, the manager, the asset bank), and
// reference implementations of those interfaces.

pub mod bank;
pub mod crypto;
pub mod drip_models;
pub mod error;
pub mod identity;
pub mod manager;
pub mod math;
pub mod traits;

// Re-export key types for ergonomic access from downstream crates.
// Usage: `use bulwark_core::Address;`

pub use bank::InMemoryBank;
pub use drip_models::{ConstantDripModel, ExponentialDripModel, LinearDripModel};
pub use error::BulwarkError;
pub use identity::{Address, AssetId};
pub use manager::StaticManager;
pub use math::{BulwarkResult, SafeMath, WAD, ZOC};
pub use traits::{AssetBank, DripModel, Manager, Trigger, TriggerState};
