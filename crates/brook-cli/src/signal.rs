//! SIGINT/SIGTERM handling.
//!
//! Both signals are blocked in every thread and collected by a single
//! thread parked in `sigwait`, which turns the first one into a runtime
//! shutdown. A second signal exits immediately.

use std::io;
use std::mem::MaybeUninit;
use std::thread;

use brook_runtime::ShutdownHandle;

fn shutdown_signals() -> libc::sigset_t {
    let mut set = MaybeUninit::<libc::sigset_t>::uninit();
    unsafe {
        libc::sigemptyset(set.as_mut_ptr());
        libc::sigaddset(set.as_mut_ptr(), libc::SIGINT);
        libc::sigaddset(set.as_mut_ptr(), libc::SIGTERM);
        set.assume_init()
    }
}

/// Block SIGINT and SIGTERM for the calling thread and every thread it
/// spawns afterwards. Call before any other thread is started.
pub fn block() -> io::Result<()> {
    let set = shutdown_signals();
    let rc = unsafe { libc::pthread_sigmask(libc::SIG_BLOCK, &set, std::ptr::null_mut()) };
    if rc != 0 {
        return Err(io::Error::from_raw_os_error(rc));
    }
    Ok(())
}

/// Start the thread that waits for a blocked signal.
pub fn watch(shutdown: ShutdownHandle) -> io::Result<()> {
    thread::Builder::new()
        .name("brook-signal".to_string())
        .spawn(move || {
            let set = shutdown_signals();
            let mut requested = false;
            loop {
                let mut signal: libc::c_int = 0;
                let rc = unsafe { libc::sigwait(&set, &mut signal) };
                if rc != 0 {
                    tracing::warn!("sigwait failed: {}", io::Error::from_raw_os_error(rc));
                    return;
                }
                if requested {
                    tracing::warn!(signal, "second signal, exiting without shutdown");
                    std::process::exit(128 + signal);
                }
                tracing::info!(signal, "signal received, shutting down");
                requested = true;
                shutdown.shutdown();
            }
        })?;
    Ok(())
}
