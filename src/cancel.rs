//! Single cancellation tree rooted at the batch: a batch-level cancel
//! propagates to every channel and video; a channel-level cancel never
//! touches its siblings.

use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct BatchCancellation {
    token: CancellationToken,
}

impl Default for BatchCancellation {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchCancellation {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    pub fn child(&self) -> BatchCancellation {
        BatchCancellation {
            token: self.token.child_token(),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}
