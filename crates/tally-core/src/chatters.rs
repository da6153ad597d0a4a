use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{domain::Chatter, ports::ChatTransport};

/// Cached view of who is currently in the channel.
///
/// Refreshed on an interval from the platform API; a failed refresh keeps the
/// previous snapshot (stale-but-available beats unavailable). The cache has
/// its own lock, never held across the fetch itself.
#[derive(Default)]
pub struct ChatterMonitor {
    cached: Mutex<Vec<Chatter>>,
}

impl ChatterMonitor {
    pub async fn refresh(&self, transport: &dyn ChatTransport) {
        match transport.fetch_chatters().await {
            Ok(chatters) => {
                debug!(count = chatters.len(), "refreshed chatter list");
                *self.cached.lock().await = chatters;
            }
            Err(e) => {
                warn!(error = %e, "failed to fetch chatters, keeping previous list");
            }
        }
    }

    pub async fn snapshot(&self) -> Vec<Chatter> {
        self.cached.lock().await.clone()
    }
}
