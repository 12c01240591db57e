use std::sync::Arc;

use tokio::sync::watch;

use crate::error::GateMisuseError;

/// One-shot latch that is released when ICE gathering completes.
///
/// Only one signaling message can be exchanged, so the local description
/// must not be published before every candidate is known. Clones share the
/// same latch.
#[derive(Clone, Debug)]
pub struct GatheringGate {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for GatheringGate {
    fn default() -> Self {
        Self::new()
    }
}

impl GatheringGate {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn release(&self) -> Result<(), GateMisuseError> {
        let first = self.tx.send_if_modified(|released| {
            if *released {
                return false;
            }
            *released = true;
            true
        });
        if first {
            Ok(())
        } else {
            Err(GateMisuseError)
        }
    }

    pub fn is_released(&self) -> bool {
        *self.tx.borrow()
    }

    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|released| *released).await;
    }
}
