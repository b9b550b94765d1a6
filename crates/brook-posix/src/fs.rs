//! Filesystem operations backing `fs.readFileSync` / `fs.writeFileSync`

use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Permission bits for files created by [`write_text_file`].
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Read a file as UTF-8 text.
pub fn read_text_file(path: impl AsRef<Path>) -> io::Result<String> {
    fs::read_to_string(path)
}

/// Write text to a file, creating or truncating it.
///
/// New files get [`DEFAULT_FILE_MODE`] on Unix; existing files keep their mode.
pub fn write_text_file(path: impl AsRef<Path>, content: &str) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(DEFAULT_FILE_MODE);
    }
    let mut file = options.open(path)?;
    file.write_all(content.as_bytes())?;
    file.flush()
}
