// Shared domain types, used by the provider layer, the engine and the CLI.
// None of those layers depends on another for its data shapes; all import
// from this module.

pub mod activity;
pub mod common;
pub mod contribution;
pub mod notification;
pub mod stats;

pub use activity::*;
pub use common::*;
pub use contribution::*;
pub use notification::*;
pub use stats::*;
