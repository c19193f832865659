use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use super::{DocumentId, RemoteStore, StoreError};

/// In-memory store with failure injection.
///
/// Records every write attempt and the peak number of concurrent writes,
/// and can hold writes at a gate until released, which makes in-flight
/// behaviour deterministic in tests and demos.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    documents: HashMap<DocumentId, String>,
    attempts: Vec<(DocumentId, String)>,
    failing_reads: usize,
    failing_writes: usize,
    in_flight: usize,
    max_in_flight: usize,
    gate: Option<Arc<Semaphore>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding a single document.
    pub fn with_document(id: impl Into<DocumentId>, content: impl Into<String>) -> Self {
        let store = Self::new();
        store.insert(id, content);
        store
    }

    pub fn insert(&self, id: impl Into<DocumentId>, content: impl Into<String>) {
        self.lock().documents.insert(id.into(), content.into());
    }

    /// Current stored content of `id`.
    pub fn get(&self, id: &DocumentId) -> Option<String> {
        self.lock().documents.get(id).cloned()
    }

    /// Make the next `count` reads fail with a transport error.
    pub fn fail_next_reads(&self, count: usize) {
        self.lock().failing_reads = count;
    }

    /// Make the next `count` writes fail with a transport error.
    pub fn fail_next_writes(&self, count: usize) {
        self.lock().failing_writes = count;
    }

    /// Block subsequent writes until [`Self::release_writes`] is called.
    pub fn hold_writes(&self) {
        self.lock().gate = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let `count` held writes proceed.
    pub fn release_writes(&self, count: usize) {
        if let Some(gate) = &self.lock().gate {
            gate.add_permits(count);
        }
    }

    /// Content of every write attempt for `id`, in arrival order.
    pub fn write_attempts(&self, id: &DocumentId) -> Vec<String> {
        self.lock()
            .attempts
            .iter()
            .filter(|(target, _)| target == id)
            .map(|(_, content)| content.clone())
            .collect()
    }

    /// Writes currently inside the store.
    pub fn writes_in_flight(&self) -> usize {
        self.lock().in_flight
    }

    /// Highest number of writes ever in flight at once.
    pub fn max_concurrent_writes(&self) -> usize {
        self.lock().max_in_flight
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("memory store lock poisoned")
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn read(&self, id: &DocumentId) -> Result<String, StoreError> {
        let mut inner = self.lock();
        if inner.failing_reads > 0 {
            inner.failing_reads -= 1;
            return Err(StoreError::Transport("injected read failure".to_string()));
        }
        inner
            .documents
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn write(&self, id: &DocumentId, content: &str) -> Result<(), StoreError> {
        let gate = {
            let mut inner = self.lock();
            inner.in_flight += 1;
            inner.max_in_flight = inner.max_in_flight.max(inner.in_flight);
            inner.attempts.push((id.clone(), content.to_string()));
            inner.gate.clone()
        };

        let admitted = match gate {
            Some(gate) => gate.acquire().await.map(tokio::sync::SemaphorePermit::forget).is_ok(),
            None => true,
        };

        let mut inner = self.lock();
        inner.in_flight -= 1;
        if !admitted {
            return Err(StoreError::Transport("write gate closed".to_string()));
        }
        if inner.failing_writes > 0 {
            inner.failing_writes -= 1;
            return Err(StoreError::Transport("injected write failure".to_string()));
        }
        inner.documents.insert(id.clone(), content.to_string());
        Ok(())
    }
}
