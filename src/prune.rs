//! Directive lifecycle engine: classify `moved`/`import`/`removed` blocks
//! against state and cut the applied ones out of the source text.

pub mod classify;
pub mod locate;
pub mod plan;
mod scanner;

pub use classify::is_applied;
pub use locate::{ByteRange, locate, locate_and_excise};
pub use plan::{DeletionPlan, PlannedDeletion, apply_all_deletions, plan_deletions};
