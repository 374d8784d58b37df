//! Integration test suite for lpbench.
//!
//! These tests run full benchmarks against shell-script solver stubs in
//! temporary directories and inspect the resulting log file.
//!
//! # Test Categories
//!
//! - `end_to_end`: Outcome classification and per-task record order
//! - `timeout`: Timeout classification and child process cleanup
//! - `pool`: Bounded concurrency, sequential mode, cancellation
//! - `relay`: Log relay behavior under concurrent producers
//!
//! The stubs need `/bin/sh`, so the process-based tests are unix-only.


#[cfg(unix)]
mod end_to_end;
#[cfg(unix)]
mod pool;
