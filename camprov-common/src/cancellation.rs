//! A cooperative cancellation signal shared by the DHCP server loop and
//! the provisioning orchestrator (§5: "The core exposes a cancellation
//! handle to the orchestrator and DHCP loop").
//!
//! Built on `tokio::sync::watch` rather than pulling in `tokio-util` for
//! a one-field signal; `tokio` is already a dependency everywhere this is
//! used.

#[derive(Clone)]
pub struct CancellationToken {
    rx: tokio::sync::watch::Receiver<bool>,
}

pub struct CancellationHandle {
    tx: tokio::sync::watch::Sender<bool>,
}

pub fn cancellation_pair() -> (CancellationHandle, CancellationToken) {
    let (tx, rx) = tokio::sync::watch::channel(false);
    (CancellationHandle { tx }, CancellationToken { rx })
}

impl CancellationHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl CancellationToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_observed_by_clones() {
        let (handle, token) = cancellation_pair();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        handle.cancel();
        assert!(token.is_cancelled());
        assert!(clone.is_cancelled());
    }
}
