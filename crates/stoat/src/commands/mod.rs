//! Command implementations

pub mod release;
