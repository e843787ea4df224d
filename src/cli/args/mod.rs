//! Shared CLI argument types

mod common;
mod global;

pub use common::{OutputFormat, SwitchState};
pub use global::GlobalOptions;
