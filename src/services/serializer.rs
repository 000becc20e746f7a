//! Per-entity update serialization.
//!
//! Every read-merge-write against an entity record runs inside
//! [`EntityQueue::run`]. Operations on one entity execute one at a time in
//! arrival order (tokio's mutex is FIFO-fair); different entities proceed in
//! parallel.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use crate::models::registry::entity_key;

/// Lock slots keyed by lower-cased entity name.
#[derive(Debug, Default)]
pub struct EntityQueue {
    slots: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl EntityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, entity: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.entry(entity_key(entity)).or_default().clone()
    }

    /// Run `op` once every earlier operation queued for `entity` has finished.
    pub async fn run<F, Fut, T>(&self, entity: &str, op: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let slot = self.slot(entity);
        let _turn = slot.lock().await;
        op().await
    }

    /// Number of entities that have had an operation queued.
    pub fn tracked(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
