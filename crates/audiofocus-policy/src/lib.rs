//! Interrupt policy for the audio focus engine.
//!
//! A [`PolicyTable`] answers, for every combination of requesting volume
//! type, active volume type and scene, how the two streams are treated.

mod error;
mod outcome;
mod rules;
mod table;

pub use error::PolicyError;
pub use outcome::{ActionTarget, Outcome, Treatment};
pub use rules::{built_in_rules, PolicyRule};
pub use table::{PolicyConfig, PolicyKey, PolicyTable, Resolution};
