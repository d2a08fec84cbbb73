use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::models::{NotificationKind, NotificationPayload};

#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The attempt may succeed if repeated (network failures, timeouts,
    /// throttling). Counted into the retry budget.
    #[error("transient delivery failure: {0}")]
    Transient(#[source] anyhow::Error),
    /// Repeating cannot help (rejected recipient, malformed payload).
    #[error("permanent delivery failure: {0}")]
    Permanent(#[source] anyhow::Error),
}

/// A channel-specific sender. One adapter per notification kind.
#[async_trait]
pub trait DeliveryAdapter: Send + Sync {
    fn kind(&self) -> NotificationKind;
    async fn deliver(&self, payload: &NotificationPayload) -> Result<(), DeliveryError>;
}

/// Kind-keyed registry of adapters; the worker resolves the adapter for
/// each envelope by its kind.
#[derive(Clone)]
pub struct DeliveryGateway {
    adapters: HashMap<NotificationKind, Arc<dyn DeliveryAdapter>>,
}

impl DeliveryGateway {
    pub fn new(adapters: Vec<Arc<dyn DeliveryAdapter>>) -> Self {
        let mut map = HashMap::new();
        for adapter in adapters {
            map.insert(adapter.kind(), adapter);
        }
        Self { adapters: map }
    }

    pub fn get(&self, kind: NotificationKind) -> Option<Arc<dyn DeliveryAdapter>> {
        self.adapters.get(&kind).cloned()
    }
}
