//! This contains all of the `blockmesh` commands

pub mod config;
pub mod nodes;
pub mod sync;
