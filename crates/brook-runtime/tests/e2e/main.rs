//! End-to-end tests for the Brook runtime
//!
//! These tests evaluate scripts in a real `Runtime`, drive the dispatcher
//! loop, and check the console output and side effects.

mod harness;
mod fs;
mod http;
mod timers;
