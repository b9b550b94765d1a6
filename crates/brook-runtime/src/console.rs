//! Console sink and value formatting for `console.log`.

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use rquickjs::{Coerced, Ctx, Exception, FromJs, Value};

use crate::error::describe_exception;

/// Where `console.log` output and script diagnostics are written.
///
/// Cloning shares the underlying writer.
#[derive(Clone)]
pub struct Console {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl Console {
    /// Write to the process's standard output.
    pub fn stdout() -> Self {
        Self::from_writer(io::stdout())
    }

    /// Write to an arbitrary writer.
    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            out: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Collect output in memory (used by tests and embedders).
    pub fn capture() -> (Self, CapturedOutput) {
        let buffer = CapturedOutput::default();
        (Self::from_writer(buffer.clone()), buffer)
    }

    /// Write one line. Write failures are ignored.
    pub fn write_line(&self, line: &str) {
        let mut out = self.out.lock();
        let _ = writeln!(out, "{}", line);
        let _ = out.flush();
    }
}

impl fmt::Debug for Console {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Console").finish_non_exhaustive()
    }
}

/// In-memory console buffer.
#[derive(Clone, Default)]
pub struct CapturedOutput(Arc<Mutex<Vec<u8>>>);

impl CapturedOutput {
    /// Everything written so far.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }

    /// Everything written so far, split into lines.
    pub fn lines(&self) -> Vec<String> {
        self.text().lines().map(str::to_string).collect()
    }
}

impl Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Render a value the way `console.log` prints it.
///
/// Strings print verbatim, errors as `Name: message`, other objects as JSON
/// when they serialise, everything else through string coercion.
pub(crate) fn format_value<'js>(ctx: &Ctx<'js>, value: &Value<'js>) -> String {
    if let Some(s) = value.as_string() {
        return s.to_string().unwrap_or_default();
    }
    if value.is_function() {
        return "[Function]".to_string();
    }
    if let Some(obj) = value.as_object() {
        if Exception::from_object(obj.clone()).is_some() {
            return describe_exception(ctx, value.clone());
        }
        match ctx.json_stringify(value.clone()) {
            Ok(Some(json)) => {
                if let Ok(text) = json.to_string() {
                    return text;
                }
            }
            Ok(None) => {}
            Err(rquickjs::Error::Exception) => {
                // cyclic structures and throwing toJSON land here
                let _ = ctx.catch();
            }
            Err(_) => {}
        }
    }

    match Coerced::<String>::from_js(ctx, value.clone()) {
        Ok(text) => text.0,
        Err(rquickjs::Error::Exception) => {
            let _ = ctx.catch();
            "[object]".to_string()
        }
        Err(_) => "[object]".to_string(),
    }
}
