//! Brook POSIX capabilities
//!
//! Engine-agnostic system pieces used by the Brook host API: text file
//! read/write, process argv/cwd, the HTTP/1.1 wire format, and a thread-safe
//! handle registry for resources shared with I/O threads.
//!
//! All I/O is synchronous and returns `std::io::Result`. Converting failures
//! into script exceptions is the binding layer's job.

#![warn(missing_docs)]

pub mod handles;

pub mod fs;
pub mod http;
pub mod process;

pub use handles::HandleRegistry;
