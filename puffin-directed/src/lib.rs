//! Distance instrumentation for directed fuzzing.
//!
//! A precomputed distance file assigns every source location (`basename:line`) a distance to the
//! fuzzing targets. The [`pass::DirectedFuzzingPass`] walks a compiled unit, resolves the source
//! location of each basic block and, for blocks listed in the distance file, injects code that
//! accumulates the block's distance into [`counters::ACCUMULATOR_NAME`] and counts the hit in
//! [`counters::COUNTER_NAME`]. A fuzzing harness reads `accumulator / counter` as fitness.

pub mod block;
pub mod cli;
pub mod counters;
pub mod distance;
pub mod error;
pub mod ir;
pub mod log;
pub mod options;
pub mod pass;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{Error, Result};

pub const GIT_REF: &str = match option_env!("GIT_REF") {
    Some(env) => env,
    None => "undefined",
};

pub const MAYBE_GIT_REF: Option<&str> = option_env!("GIT_REF");
