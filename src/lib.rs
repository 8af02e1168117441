//! tfprune - prune applied Terraform directives
//!
//! Removes `moved`, `import` and `removed` blocks from Terraform configuration
//! once a state snapshot shows they have taken effect, leaving every other
//! byte of the file as it was.

pub mod app;
pub mod error;
pub mod prune;
pub mod sources;
pub mod terraform;

pub use error::{PruneError, Result};
pub use prune::{ByteRange, DeletionPlan, apply_all_deletions, plan_deletions};
pub use terraform::{Address, Directive, DirectiveKind, StateView, TfState};
