use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::types::{ContinuationToken, ResponseRecord};

/// Continuation token shared by every call of one client
///
/// Last decoded token wins. Clones share the same slot, so concurrent calls
/// race and the record processed last determines the stored value.
#[derive(Debug, Clone, Default)]
pub struct ConversationContext {
    token: Arc<Mutex<Option<ContinuationToken>>>,
}

impl ConversationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token to send with the next request
    pub fn current(&self) -> Option<ContinuationToken> {
        self.lock().clone()
    }

    /// Store the record's token if it carries a non-empty one
    ///
    /// Returns whether the stored token changed.
    pub fn observe(&self, record: &ResponseRecord) -> bool {
        let Some(token) = record.continuation() else {
            return false;
        };

        *self.lock() = Some(token.clone());
        tracing::debug!(length = token.as_slice().len(), "updated conversation context");
        true
    }

    /// Forget the stored token so the next request starts a new conversation
    pub fn clear(&self) {
        self.lock().take();
    }

    fn lock(&self) -> MutexGuard<'_, Option<ContinuationToken>> {
        // Writes replace the value whole, so a poisoned slot is still consistent
        self.token.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
