//! Store wrappers for concurrency tests
//!
//! [`FaultInjectingStore`] forwards every call to a real store, but lets a
//! test run arbitrary modifications right before a transaction is submitted,
//! force the next transactions to fail with a chosen error, or make reads of
//! one path fail.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fleet_core::traits::{
    CoordinationStore, CreateMode, Node, Op, Stat, StoreError, StoreResult,
};
use futures::future::BoxFuture;

/// Runs before the n-th (1-based) transaction, against the wrapped store
pub type TransactionHook =
    Arc<dyn Fn(Arc<dyn CoordinationStore>, usize) -> BoxFuture<'static, ()> + Send + Sync>;

pub struct FaultInjectingStore {
    inner: Arc<dyn CoordinationStore>,
    before_transaction: Mutex<Option<TransactionHook>>,
    forced_failures: Mutex<VecDeque<StoreError>>,
    failing_reads: Mutex<HashMap<String, StoreError>>,
    transactions: AtomicUsize,
}

impl FaultInjectingStore {
    pub fn new(inner: Arc<dyn CoordinationStore>) -> Self {
        Self {
            inner,
            before_transaction: Mutex::new(None),
            forced_failures: Mutex::new(VecDeque::new()),
            failing_reads: Mutex::new(HashMap::new()),
            transactions: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> Arc<dyn CoordinationStore> {
        Arc::clone(&self.inner)
    }

    pub fn on_transaction(&self, hook: TransactionHook) {
        *self.before_transaction.lock().unwrap() = Some(hook);
    }

    /// Queue an error returned instead of running the next transaction
    pub fn fail_next_transaction(&self, error: StoreError) {
        self.forced_failures.lock().unwrap().push_back(error);
    }

    /// Make every `get_data`, `get_node` and `stat` of `path` fail with `error`
    pub fn fail_reads_of(&self, path: &str, error: StoreError) {
        self.failing_reads
            .lock()
            .unwrap()
            .insert(path.to_string(), error);
    }

    fn read_failure(&self, path: &str) -> StoreResult<()> {
        match self.failing_reads.lock().unwrap().get(path) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    /// Number of transactions submitted so far, including failed ones
    pub fn transaction_count(&self) -> usize {
        self.transactions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CoordinationStore for FaultInjectingStore {
    async fn ensure_path(&self, path: &str, exclude_last: bool) -> StoreResult<()> {
        self.inner.ensure_path(path, exclude_last).await
    }

    async fn get_data(&self, path: &str) -> StoreResult<Vec<u8>> {
        self.read_failure(path)?;
        self.inner.get_data(path).await
    }

    async fn get_node(&self, path: &str) -> StoreResult<Node> {
        self.read_failure(path)?;
        self.inner.get_node(path).await
    }

    async fn set_data(&self, path: &str, data: Vec<u8>) -> StoreResult<()> {
        self.inner.set_data(path, data).await
    }

    async fn get_children(&self, path: &str) -> StoreResult<Vec<String>> {
        self.inner.get_children(path).await
    }

    async fn stat(&self, path: &str) -> StoreResult<Option<Stat>> {
        self.read_failure(path)?;
        self.inner.stat(path).await
    }

    async fn delete(&self, path: &str) -> StoreResult<()> {
        self.inner.delete(path).await
    }

    async fn create_with_mode(
        &self,
        path: &str,
        data: Vec<u8>,
        mode: CreateMode,
    ) -> StoreResult<()> {
        self.inner.create_with_mode(path, data, mode).await
    }

    async fn transaction(&self, ops: Vec<Op>) -> StoreResult<()> {
        let count = self.transactions.fetch_add(1, Ordering::SeqCst) + 1;

        let hook = self.before_transaction.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook(self.inner(), count).await;
        }

        let forced = self.forced_failures.lock().unwrap().pop_front();
        if let Some(error) = forced {
            return Err(error);
        }

        self.inner.transaction(ops).await
    }

    async fn close(&self) -> StoreResult<()> {
        self.inner.close().await
    }
}
