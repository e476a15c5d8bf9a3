use std::time::Duration;

use tokio::task::AbortHandle;

use super::traits::Stage;

/// How long relays may keep running once every stage has been killed.
pub(crate) const KILL_GRACE: Duration = Duration::from_secs(2);

/// Kills every stage after the copy phase overran its deadline.
pub(crate) async fn abort_sequence(stages: &mut [Box<dyn Stage>], limit: Duration) {
    tracing::warn!(?limit, "pipeline deadline reached, killing stages");
    for (index, stage) in stages.iter_mut().enumerate() {
        if let Err(e) = stage.kill().await {
            tracing::warn!(index, stage = stage.name(), error = %e, "kill failed");
        }
    }
}

/// Cancels relays still blocked on streams that outlived the killed stages, e.g. pipes
/// inherited by a stage's own children.
pub(crate) fn abandon_relays(relays: &[AbortHandle], grace: Duration) {
    tracing::warn!(?grace, relays = relays.len(), "streams still open after kill, cancelling relays");
    for relay in relays {
        relay.abort();
    }
}
