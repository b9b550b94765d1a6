//! Process information backing `process.argv` / `process.cwd()`

use std::io;
use std::path::PathBuf;

/// Snapshot the invocation arguments.
pub fn argv() -> Vec<String> {
    std::env::args().collect()
}

/// Current working directory as text.
pub fn cwd() -> io::Result<String> {
    let dir: PathBuf = std::env::current_dir()?;
    Ok(dir.to_string_lossy().into_owned())
}
