//! Cancellation plumbing between process signals and running encoder tasks.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::warn;

use crate::error::{Result, ShortreelError};

/// Requests cancellation of every [`CancelToken`] created from it.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

/// Observes a [`CancelHandle`].
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx: Arc::new(tx) }, CancelToken { rx })
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        let (_, token) = cancel_pair();
        token
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested. Pending forever if the handle
    /// goes away without cancelling.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Route SIGINT and SIGTERM to a cancellation handle.
///
/// The handler only flips the flag; whoever owns a running child is
/// responsible for terminating it.
pub fn install_signal_bridge() -> Result<CancelHandle> {
    let (handle, _) = cancel_pair();
    let bridge = handle.clone();

    ctrlc::set_handler(move || {
        warn!("Signal received, terminating encoder...");
        bridge.cancel();
    })
    .map_err(|e| ShortreelError::Config(format!("Failed to install signal handler: {e}")))?;

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancelled_resolves_after_cancel() {
        let (handle, mut token) = cancel_pair();
        assert!(!token.is_cancelled());

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.cancel();
        });

        tokio::time::timeout(Duration::from_secs(2), token.cancelled())
            .await
            .expect("token should resolve");
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_never_token_stays_pending() {
        let mut token = CancelToken::never();
        let result = tokio::time::timeout(Duration::from_millis(50), token.cancelled()).await;
        assert!(result.is_err());
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn test_tokens_from_handle_share_state() {
        let (handle, first) = cancel_pair();
        let second = handle.token();
        handle.cancel();
        assert!(first.is_cancelled());
        assert!(second.is_cancelled());
    }
}
