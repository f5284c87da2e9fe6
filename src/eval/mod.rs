//! The level-synchronized evaluator and its ledger of evaluation state.
pub mod engine;
pub mod ledger;

pub use engine::{Evaluator, Granularity};
pub use ledger::{EvalError, Ledger, PkValues};
