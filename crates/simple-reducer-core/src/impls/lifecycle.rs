//! LifecycleGuard - `Liveness` on top of a `CancellationToken`.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::ports::Liveness;

/// Alive until the token is cancelled (and, if a host check is attached,
/// while the host reports alive).
///
/// Built from a child token when the host hands in its own token, so tearing
/// down the host also tears down the reducer, but disposing the reducer does
/// not cancel the host.
#[derive(Clone, Default)]
pub struct LifecycleGuard {
    token: CancellationToken,
    host: Option<Arc<dyn Liveness>>,
}

impl LifecycleGuard {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            host: None,
        }
    }

    pub fn child_of(parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
            host: None,
        }
    }

    /// Also consult a host-provided liveness check.
    pub fn with_host(mut self, host: Arc<dyn Liveness>) -> Self {
        self.host = Some(host);
        self
    }

    /// Mark the owning context as torn down.
    pub fn dispose(&self) {
        self.token.cancel();
    }

    /// Resolves once the guard has been disposed.
    ///
    /// Only watches the token; a host check that flips to dead is observed
    /// on the next `is_alive` call.
    pub async fn disposed(&self) {
        self.token.cancelled().await;
    }
}

impl Liveness for LifecycleGuard {
    fn is_alive(&self) -> bool {
        !self.token.is_cancelled() && self.host.as_ref().is_none_or(|host| host.is_alive())
    }
}

impl fmt::Debug for LifecycleGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleGuard")
            .field("cancelled", &self.token.is_cancelled())
            .field("has_host", &self.host.is_some())
            .finish()
    }
}
