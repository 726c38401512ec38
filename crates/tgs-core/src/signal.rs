//! Renewable one-shot wakeup.
//!
//! [`RenewableSignal::fire`] wakes every listener obtained before the call
//! and atomically installs a fresh, unfired signal, so a listener obtained
//! afterwards is not woken by the stale firing.
//!
//! ```text
//! listen() ──▶ token A ─┐
//! listen() ──▶ token A ─┤  fire(): cancel A, install B
//!                       └─▶ both woken
//! listen() ──▶ token B      (pending until the next fire)
//! ```

use parking_lot::Mutex;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

/// A broadcast wakeup that resets itself every time it fires.
#[derive(Debug, Default)]
pub struct RenewableSignal {
    current: Mutex<CancellationToken>,
}

impl RenewableSignal {
    /// Creates an unfired signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a listener bound to the current generation.
    pub fn listen(&self) -> SignalListener {
        SignalListener {
            token: self.current.lock().clone(),
        }
    }

    /// Wakes all current listeners and starts a new generation.
    pub fn fire(&self) {
        let fired = std::mem::take(&mut *self.current.lock());
        fired.cancel();
    }
}

/// A handle on one generation of a [`RenewableSignal`].
#[derive(Debug, Clone)]
pub struct SignalListener {
    token: CancellationToken,
}

impl SignalListener {
    /// Whether this generation has fired.
    pub fn is_fired(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes once this generation fires.
    pub fn fired(self) -> WaitForCancellationFutureOwned {
        self.token.cancelled_owned()
    }
}
