// crates/bulwark-cli/src/commands/mod.rs
//
// Command module declarations for the Bulwark CLI.

pub mod hash;
pub mod run;
pub mod validate;
