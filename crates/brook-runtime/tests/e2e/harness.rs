//! Test harness for end-to-end script execution
//!
//! Runs scripts in a fresh `Runtime` whose console output is captured, with a
//! temporary directory as base path.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::Path;
use std::thread;

use brook_runtime::{
    CapturedOutput, Console, RunMode, RunOutcome, Runtime, RuntimeError, RuntimeOptions,
    ShutdownHandle,
};
use tempfile::TempDir;

/// A runtime rooted in its own temporary directory.
pub struct Fixture {
    pub runtime: Runtime,
    pub output: CapturedOutput,
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_modules(&[])
    }

    /// Create `modules/<name>.js` for each entry before starting.
    pub fn with_modules(modules: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        for (name, source) in modules {
            write_module(dir.path(), name, source);
        }
        let (console, output) = Console::capture();
        let runtime = Runtime::new(options(dir.path(), console)).unwrap();
        Self { runtime, output, dir }
    }

    pub fn path(&self, name: &str) -> String {
        self.dir.path().join(name).to_string_lossy().into_owned()
    }

    /// Evaluate `source`, panicking on a script error.
    pub fn eval(&self, source: &str) -> String {
        match self.runtime.eval(source) {
            Ok(value) => value,
            Err(e) => panic!("Script failed: {}\nSource:\n{}", e, source),
        }
    }

    /// Run the dispatcher until nothing is left to do.
    pub fn run(&self) -> Vec<String> {
        assert_eq!(self.runtime.run(RunMode::UntilIdle), RunOutcome::Idle);
        self.output.lines()
    }
}

pub fn options(base_path: &Path, console: Console) -> RuntimeOptions {
    RuntimeOptions::default()
        .with_base_path(base_path)
        .with_http_host("127.0.0.1")
        .with_http_port(0)
        .with_argv(vec!["brook".to_string(), "test.js".to_string()])
        .with_console(console)
}

pub fn write_module(base_path: &Path, name: &str, source: &str) {
    let modules = base_path.join("modules");
    std::fs::create_dir_all(&modules).unwrap();
    std::fs::write(modules.join(format!("{name}.js")), source).unwrap();
}

/// Evaluate a script, run until idle, and return the console lines.
pub fn run_script(source: &str) -> Vec<String> {
    let fixture = Fixture::new();
    fixture.eval(source);
    fixture.run()
}

/// Same as [`run_script`] with module files available to `require`.
pub fn run_with_modules(modules: &[(&str, &str)], source: &str) -> Vec<String> {
    let fixture = Fixture::with_modules(modules);
    fixture.eval(source);
    fixture.run()
}

pub fn expect_output(source: &str, expected: &[&str]) {
    let lines = run_script(source);
    assert_eq!(lines, expected, "Wrong output for:\n{}", source);
}

pub fn expect_output_with_modules(modules: &[(&str, &str)], source: &str, expected: &[&str]) {
    let lines = run_with_modules(modules, source);
    assert_eq!(lines, expected, "Wrong output for:\n{}", source);
}

/// Evaluate a script that must fail.
pub fn expect_script_error(source: &str) -> RuntimeError {
    let fixture = Fixture::new();
    match fixture.runtime.eval(source) {
        Ok(value) => panic!("Expected an error, got {}\nSource:\n{}", value, source),
        Err(e) => e,
    }
}

struct ShutdownOnDrop(ShutdownHandle);

impl Drop for ShutdownOnDrop {
    fn drop(&mut self) {
        self.0.shutdown();
    }
}

/// Start a server script, run `client` against it on another thread, and
/// shut the runtime down once the client is done.
pub fn serve<T, F>(source: &str, client: F) -> (T, Vec<String>)
where
    F: FnOnce(SocketAddr) -> T + Send + 'static,
    T: Send + 'static,
{
    let fixture = Fixture::new();
    fixture.eval(source);
    let addr = fixture
        .runtime
        .http_address()
        .expect("script did not start a server");

    let shutdown = ShutdownOnDrop(fixture.runtime.shutdown_handle());
    let client = thread::spawn(move || {
        let _shutdown = shutdown;
        client(addr)
    });

    assert_eq!(fixture.runtime.run(RunMode::Forever), RunOutcome::Shutdown);
    let result = client.join().expect("client thread panicked");
    (result, fixture.output.lines())
}

/// Send one request and return the status code and body.
pub fn request(
    addr: SocketAddr,
    method: &str,
    path: &str,
    headers: &[(&str, &str)],
    body: &str,
) -> (u16, String) {
    let mut raw = format!(
        "{method} {path} HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\n",
        body.len()
    );
    for (name, value) in headers {
        raw.push_str(&format!("{name}: {value}\r\n"));
    }
    raw.push_str("\r\n");
    raw.push_str(body);
    send_raw(addr, raw.as_bytes())
}

/// Write `raw` as-is and return the status code and body of the answer.
pub fn send_raw(addr: SocketAddr, raw: &[u8]) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.write_all(raw).unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();
    let (head, body) = response
        .split_once("\r\n\r\n")
        .unwrap_or_else(|| panic!("malformed response: {response:?}"));
    let status = head
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap_or_else(|| panic!("malformed status line: {head:?}"));
    (status, body.to_string())
}

pub fn get(addr: SocketAddr, path: &str) -> (u16, String) {
    request(addr, "GET", path, &[], "")
}
