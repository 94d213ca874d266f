//! Chaincode runtime: the [`Chaincode`] contract, per-invocation stubs, the
//! deployment registry, and query dispatch.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};
use vperiod_ledger::{Commit, StateStore, WriteSet};
use vperiod_telemetry::Metrics;

use crate::error::{ChaincodeError, ChaincodeResult};
use crate::invocation::ChaincodeInvocationSpec;

/// A deployable program owning one ledger namespace.
#[async_trait]
pub trait Chaincode: Send + Sync {
    /// Identifier (hash) the chaincode is deployed under.
    fn id(&self) -> &str;

    /// Called once at deployment; staged writes are committed afterwards.
    async fn init(&self, stub: &mut ChaincodeStub) -> ChaincodeResult<()>;

    /// Side-effect free read entry point.
    async fn query(
        &self,
        stub: &ChaincodeStub,
        function: &str,
        args: &[String],
    ) -> ChaincodeResult<Vec<u8>>;
}

/// Per-invocation view of a chaincode's namespace.
///
/// Reads go straight to committed state. Writes are staged and applied as one
/// commit by [`ChaincodeStub::commit`].
pub struct ChaincodeStub {
    chaincode_id: String,
    store: Arc<dyn StateStore>,
    writes: WriteSet,
}

impl fmt::Debug for ChaincodeStub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChaincodeStub")
            .field("chaincode_id", &self.chaincode_id)
            .field("staged", &self.writes.len())
            .finish_non_exhaustive()
    }
}

impl ChaincodeStub {
    /// Stub scoped to `chaincode_id`.
    #[must_use]
    pub fn new(chaincode_id: impl Into<String>, store: Arc<dyn StateStore>) -> Self {
        Self {
            chaincode_id: chaincode_id.into(),
            store,
            writes: WriteSet::new(),
        }
    }

    /// Namespace this stub reads and writes.
    #[must_use]
    pub fn chaincode_id(&self) -> &str {
        &self.chaincode_id
    }

    /// Committed value of `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ChaincodeError::Ledger`] when the store fails.
    pub fn get_state(&self, key: &str) -> ChaincodeResult<Option<Vec<u8>>> {
        self.store
            .get_state(&self.chaincode_id, key)
            .map_err(ChaincodeError::ledger("stub.get_state"))
    }

    /// Stage a put.
    pub fn put_state(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.writes.put(self.chaincode_id.clone(), key, value);
    }

    /// Stage a delete.
    pub fn del_state(&mut self, key: impl Into<String>) {
        self.writes.delete(self.chaincode_id.clone(), key);
    }

    /// Writes staged so far.
    #[must_use]
    pub fn staged(&self) -> &WriteSet {
        &self.writes
    }

    /// Apply staged writes as one commit.
    ///
    /// # Errors
    ///
    /// Returns [`ChaincodeError::Ledger`] when nothing is staged or the commit fails.
    pub fn commit(self) -> ChaincodeResult<Commit> {
        self.store
            .commit(self.writes)
            .map_err(ChaincodeError::ledger("stub.commit"))
    }
}

/// Deployed chaincodes keyed by id.
pub struct ChaincodeRegistry {
    store: Arc<dyn StateStore>,
    deployed: RwLock<HashMap<String, Arc<dyn Chaincode>>>,
    // Held from the duplicate check until registration so `init` runs once per id.
    deploying: Mutex<()>,
}

impl fmt::Debug for ChaincodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChaincodeRegistry")
            .field("deployed", &self.ids())
            .finish_non_exhaustive()
    }
}

impl ChaincodeRegistry {
    /// Empty registry over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            deployed: RwLock::new(HashMap::new()),
            deploying: Mutex::new(()),
        }
    }

    /// Store backing every deployed chaincode.
    #[must_use]
    pub fn store(&self) -> Arc<dyn StateStore> {
        Arc::clone(&self.store)
    }

    /// Run `init` and register the chaincode under its id.
    ///
    /// Returns the init commit, or `None` when `init` staged nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ChaincodeError::AlreadyDeployed`] for a duplicate id, or the
    /// error raised by `init` or its commit.
    pub async fn deploy(&self, chaincode: Arc<dyn Chaincode>) -> ChaincodeResult<Option<Commit>> {
        let chaincode_id = chaincode.id().to_string();
        let _deploying = self.deploying.lock().await;
        if self.contains(&chaincode_id) {
            return Err(ChaincodeError::AlreadyDeployed { chaincode_id });
        }

        let mut stub = ChaincodeStub::new(chaincode_id.clone(), self.store());
        chaincode.init(&mut stub).await?;
        let commit = if stub.staged().is_empty() {
            None
        } else {
            Some(stub.commit()?)
        };

        self.deployed
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(chaincode_id.clone(), chaincode);
        info!(
            chaincode_id = %chaincode_id,
            init_height = commit.as_ref().map(|c| c.height),
            "chaincode deployed"
        );
        Ok(commit)
    }

    /// Look up a deployed chaincode.
    ///
    /// # Errors
    ///
    /// Returns [`ChaincodeError::UnknownChaincode`] when nothing is deployed under `chaincode_id`.
    pub fn resolve(&self, chaincode_id: &str) -> ChaincodeResult<Arc<dyn Chaincode>> {
        self.deployed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(chaincode_id)
            .cloned()
            .ok_or_else(|| ChaincodeError::UnknownChaincode {
                chaincode_id: chaincode_id.to_string(),
            })
    }

    /// Ids of every deployed chaincode, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .deployed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    fn contains(&self, chaincode_id: &str) -> bool {
        self.deployed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(chaincode_id)
    }
}

/// Dispatches external invocations to deployed chaincodes.
pub struct ChaincodeSupport {
    registry: Arc<ChaincodeRegistry>,
    invoker_token: String,
    metrics: Option<Metrics>,
}

impl fmt::Debug for ChaincodeSupport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChaincodeSupport")
            .field("registry", &self.registry)
            .field("metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}

impl ChaincodeSupport {
    /// Support accepting invocations that present `invoker_token`.
    #[must_use]
    pub fn new(registry: Arc<ChaincodeRegistry>, invoker_token: impl Into<String>) -> Self {
        Self {
            registry,
            invoker_token: invoker_token.into(),
            metrics: None,
        }
    }

    /// Count query outcomes in `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Registry queried by this support.
    #[must_use]
    pub fn registry(&self) -> &Arc<ChaincodeRegistry> {
        &self.registry
    }

    /// Resolve the target chaincode and run its `query` entry point.
    ///
    /// # Errors
    ///
    /// Returns [`ChaincodeError::UnknownChaincode`], [`ChaincodeError::Unauthorized`],
    /// or whatever the chaincode's `query` raises.
    pub async fn query(&self, spec: &ChaincodeInvocationSpec) -> ChaincodeResult<Vec<u8>> {
        let result = self.dispatch(spec).await;
        let outcome = match &result {
            Ok(_) => "ok",
            Err(err) => err.outcome(),
        };
        if let Some(metrics) = &self.metrics {
            metrics.inc_chaincode_query(outcome);
        }
        debug!(
            chaincode_id = %spec.chaincode_id,
            function = %spec.function,
            outcome,
            "chaincode query dispatched"
        );
        result
    }

    async fn dispatch(&self, spec: &ChaincodeInvocationSpec) -> ChaincodeResult<Vec<u8>> {
        let chaincode = self.registry.resolve(&spec.chaincode_id)?;
        if spec.secure_context != self.invoker_token {
            return Err(ChaincodeError::Unauthorized {
                chaincode_id: spec.chaincode_id.clone(),
            });
        }
        let stub = ChaincodeStub::new(spec.chaincode_id.clone(), self.registry.store());
        chaincode.query(&stub, &spec.function, &spec.args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::SYSTEM_INVOKER;
    use vperiod_ledger::Ledger;

    struct Echo;

    #[async_trait]
    impl Chaincode for Echo {
        fn id(&self) -> &str {
            "echo"
        }

        async fn init(&self, stub: &mut ChaincodeStub) -> ChaincodeResult<()> {
            stub.put_state("greeting", b"hello".to_vec());
            Ok(())
        }

        async fn query(
            &self,
            stub: &ChaincodeStub,
            _function: &str,
            args: &[String],
        ) -> ChaincodeResult<Vec<u8>> {
            let key = args.first().map_or("greeting", String::as_str);
            stub.get_state(key)?.ok_or_else(|| ChaincodeError::NotFound {
                chaincode_id: stub.chaincode_id().to_string(),
                key: key.to_string(),
            })
        }
    }

    fn registry() -> Arc<ChaincodeRegistry> {
        Arc::new(ChaincodeRegistry::new(Arc::new(Ledger::in_memory())))
    }

    #[tokio::test]
    async fn deploy_commits_init_writes_once() {
        let registry = registry();
        let commit = registry.deploy(Arc::new(Echo)).await.expect("deploy");
        assert_eq!(commit.map(|c| c.height), Some(1));
        assert!(matches!(
            registry.deploy(Arc::new(Echo)).await,
            Err(ChaincodeError::AlreadyDeployed { .. })
        ));
        assert_eq!(registry.store().height(), 1);
        assert_eq!(registry.ids(), vec!["echo".to_string()]);
    }

    struct SlowInit {
        inits: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl Chaincode for SlowInit {
        fn id(&self) -> &str {
            "slow"
        }

        async fn init(&self, stub: &mut ChaincodeStub) -> ChaincodeResult<()> {
            self.inits.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            tokio::task::yield_now().await;
            stub.put_state("k", b"v".to_vec());
            Ok(())
        }

        async fn query(
            &self,
            _stub: &ChaincodeStub,
            _function: &str,
            _args: &[String],
        ) -> ChaincodeResult<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_deploys_of_one_id_init_once() {
        let registry = registry();
        let chaincode = Arc::new(SlowInit {
            inits: std::sync::atomic::AtomicUsize::new(0),
        });
        let attempts: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let chaincode: Arc<dyn Chaincode> = chaincode.clone();
                tokio::spawn(async move { registry.deploy(chaincode).await })
            })
            .collect();

        let mut deployed = 0;
        let mut rejected = 0;
        for attempt in attempts {
            match attempt.await.expect("join") {
                Ok(_) => deployed += 1,
                Err(ChaincodeError::AlreadyDeployed { .. }) => rejected += 1,
                Err(other) => panic!("unexpected deploy error: {other:?}"),
            }
        }
        assert_eq!((deployed, rejected), (1, 7));
        assert_eq!(chaincode.inits.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(registry.store().height(), 1);
    }

    #[tokio::test]
    async fn support_checks_target_and_token() {
        let registry = registry();
        registry.deploy(Arc::new(Echo)).await.expect("deploy");
        let support = ChaincodeSupport::new(registry, SYSTEM_INVOKER);

        let ok = support
            .query(&ChaincodeInvocationSpec::query("echo", Vec::new()))
            .await
            .expect("query");
        assert_eq!(ok, b"hello");

        assert!(matches!(
            support
                .query(&ChaincodeInvocationSpec::query("nope", Vec::new()))
                .await,
            Err(ChaincodeError::UnknownChaincode { .. })
        ));
        assert!(matches!(
            support
                .query(&ChaincodeInvocationSpec::query("echo", Vec::new()).with_secure_context("x"))
                .await,
            Err(ChaincodeError::Unauthorized { .. })
        ));
    }

    #[test]
    fn empty_stub_commit_is_rejected() {
        let stub = ChaincodeStub::new("cc", Arc::new(Ledger::in_memory()));
        assert!(matches!(
            stub.commit(),
            Err(ChaincodeError::Ledger {
                operation: "stub.commit",
                ..
            })
        ));
    }
}
