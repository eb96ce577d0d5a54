//! Walk-forward backtesting.

pub mod evaluator;

pub use evaluator::{EvalError, WalkForwardEvaluator};
