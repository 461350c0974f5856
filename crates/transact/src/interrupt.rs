//! Interrupt notification
//!
//! Signals never terminate the process mid-step. The handler only stores the
//! signal number; the executor polls it between steps and rolls back there.
//! Once the run is over, [`InterruptFlag::release`] hands the signals back
//! their default effect.

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Shared flag holding the last received signal (0 = none)
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag {
    signal: Arc<AtomicUsize>,
    released: Arc<AtomicBool>,
}

impl InterruptFlag {
    /// A flag nothing is registered against yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Register SIGINT, SIGTERM and SIGHUP against a fresh flag
    pub fn install() -> std::io::Result<Self> {
        let flag = Self::new();
        for sig in [SIGINT, SIGTERM, SIGHUP] {
            signal_hook::flag::register_conditional_default(sig, Arc::clone(&flag.released))?;
            signal_hook::flag::register_usize(sig, Arc::clone(&flag.signal), sig as usize)?;
        }
        log::debug!("Interrupt handlers registered");
        Ok(flag)
    }

    /// Record a signal by hand
    pub fn raise(&self, signal: i32) {
        self.signal.store(signal as usize, Ordering::SeqCst);
    }

    /// Stop deferring signals; any later one ends the process as usual
    pub fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
        log::debug!("Interrupt handlers released");
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// The pending signal, if any
    pub fn pending(&self) -> Option<i32> {
        match self.signal.load(Ordering::SeqCst) {
            0 => None,
            sig => Some(sig as i32),
        }
    }
}

/// Human-readable signal name
pub fn signal_name(signal: i32) -> &'static str {
    match signal {
        SIGINT => "SIGINT",
        SIGTERM => "SIGTERM",
        SIGHUP => "SIGHUP",
        _ => "signal",
    }
}
