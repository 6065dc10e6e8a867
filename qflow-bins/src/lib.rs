//! Shared plumbing for the `qflow-bins` binaries.

pub mod common;
