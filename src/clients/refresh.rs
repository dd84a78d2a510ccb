use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::aggregator::Aggregator;

/// Starts and stops the periodic refresher. Stopping only prevents further
/// cycles; a cycle already running finishes normally.
pub struct RefreshControl {
    aggregator: Arc<Aggregator>,
    current: Mutex<Option<CancellationToken>>,
}

impl RefreshControl {
    pub fn new(aggregator: Arc<Aggregator>) -> Self {
        Self {
            aggregator,
            current: Mutex::new(None),
        }
    }

    /// Returns `false` if the refresher was already running.
    pub async fn start(&self) -> bool {
        let mut current = self.current.lock().await;
        if current.is_some() {
            return false;
        }

        let token = CancellationToken::new();
        let agg = self.aggregator.clone();
        let child = token.clone();
        tokio::spawn(async move {
            agg.run_refresher(child).await;
        });
        *current = Some(token);
        true
    }

    /// Returns `false` if nothing was running.
    pub async fn stop(&self) -> bool {
        match self.current.lock().await.take() {
            Some(token) => {
                info!("stopping refresher");
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn is_running(&self) -> bool {
        self.current.lock().await.is_some()
    }

    /// Run one cycle right away, independent of the periodic schedule.
    pub async fn refresh_now(&self) {
        self.aggregator.refresh_once().await;
    }
}
