//! Ctrl+C handling for cooperative shutdown.
//!
//! The first Ctrl+C sets a shared flag. Every pipeline stage polls it
//! between records, stops reading, drains in-flight hash jobs and flushes
//! the write queue, then the run exits with code 130. A second Ctrl+C
//! while that drain is still running exits immediately.
//!
//! ```rust,no_run
//! use dupescan::duplicates::FinderConfig;
//! use dupescan::signal::install_handler;
//!
//! let handler = install_handler().expect("signal handler");
//! let config = FinderConfig::default().with_shutdown_flag(handler.get_flag());
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

use crate::error::ExitCode;

/// Shared shutdown flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// Create a handler with the flag cleared.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether shutdown has been requested.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Request shutdown without a signal.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// The flag to hand to [`crate::duplicates::FinderConfig`] and the walker.
    #[must_use]
    pub fn get_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Clear the flag before another run.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Errors from installing the signal handler.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// The ctrlc hook could not be registered.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();
static SIGNALS_SEEN: AtomicU32 = AtomicU32::new(0);

fn on_signal(flag: &AtomicBool) {
    let seen = SIGNALS_SEEN.fetch_add(1, Ordering::SeqCst);
    flag.store(true, Ordering::SeqCst);

    let mut stderr = std::io::stderr();
    if seen == 0 {
        let _ = writeln!(stderr, "\nInterrupted. Finishing in-flight work...");
        let _ = stderr.flush();
        log::info!("Shutdown signal received");
    } else {
        let _ = writeln!(stderr, "\nInterrupted again. Exiting.");
        let _ = stderr.flush();
        std::process::exit(ExitCode::Interrupted.as_i32());
    }
}

/// Install the process-wide Ctrl+C handler.
///
/// Calling this again returns the already installed handler with its flag
/// cleared. If another component registered a ctrlc hook first, an
/// unhooked handler is returned that still honours
/// [`ShutdownHandler::request_shutdown`].
///
/// # Errors
///
/// Returns [`SignalError::InstallFailed`] if the hook cannot be installed
/// for a reason other than an existing registration.
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        SIGNALS_SEEN.store(0, Ordering::SeqCst);
        return Ok(handler.clone());
    }

    let handler = ShutdownHandler::new();
    let flag = handler.get_flag();

    match ctrlc::set_handler(move || on_signal(&flag)) {
        Ok(()) => {
            let _ = GLOBAL_HANDLER.set(handler.clone());
            Ok(GLOBAL_HANDLER.get().cloned().unwrap_or(handler))
        }
        Err(ctrlc::Error::MultipleHandlers) => {
            log::debug!("Ctrl+C handler already registered, using unhooked handler");
            let _ = GLOBAL_HANDLER.set(handler.clone());
            Ok(handler)
        }
        Err(e) => Err(e.into()),
    }
}
