// src/analysis/mod.rs
//! Static analysis over a finished ATN: LL(1) lookahead sets and the
//! closure/optional emptiness diagnostics built on them.

pub mod closure;
pub mod lookahead;

pub use closure::{check_epsilon_closure, check_optional_blocks};
pub use lookahead::Ll1Analyzer;
