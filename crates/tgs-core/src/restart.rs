//! Pre-restart notification hook.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ChatResult;

/// Called by the process supervisor before the server restarts.
#[async_trait]
pub trait RestartHandler: Send + Sync {
    /// Handles an imminent restart. `version` is set when the restart is an
    /// update to that version.
    async fn handle_restart(
        &self,
        version: Option<&str>,
        cancel: &CancellationToken,
    ) -> ChatResult<()>;
}
