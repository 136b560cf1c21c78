// src/lib.rs
pub mod analysis;
pub mod atn;
pub mod automata;
pub mod grammar;
pub mod tool;
