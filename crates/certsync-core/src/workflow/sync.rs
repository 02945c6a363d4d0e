use crate::{
    Error,
    config::{Config, ConfigModel, SyncConfig},
    dto::read::{CallStrategy, Channel, ReadError, ReadRequest, ReadResult},
    ids::ResourceKey,
    log,
    log::Topic,
    model::{
        metrics::{SyncMetricKind, SyncMetrics},
        store::Store,
    },
    ops::reader::{DualReader, ReadSource},
    policy::reconcile::Decision,
    utils::time,
};
use futures::StreamExt;
use std::{fmt, sync::Arc};

///
/// Loaded
/// Handed to `on_load` once per value the store accepted.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Loaded<T> {
    pub response: T,
    pub certified: bool,
}

///
/// Failed
/// Handed to `on_error` once per failed read, whatever the store did with it.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Failed {
    pub error: ReadError,
    pub certified: bool,
}

type LoadHook<'a, T> = Box<dyn FnMut(Loaded<T>) + Send + 'a>;
type ErrorHook<'a> = Box<dyn FnMut(Failed) + Send + 'a>;

///
/// SyncOptions
///

pub struct SyncOptions<'a, T> {
    strategy: Option<CallStrategy>,
    on_load: Option<LoadHook<'a, T>>,
    on_error: Option<ErrorHook<'a>>,
}

impl<T> Default for SyncOptions<'_, T> {
    fn default() -> Self {
        Self {
            strategy: None,
            on_load: None,
            on_error: None,
        }
    }
}

impl<T> fmt::Debug for SyncOptions<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncOptions")
            .field("strategy", &self.strategy)
            .field("on_load", &self.on_load.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl<'a, T> SyncOptions<'a, T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-call strategy; ignored when the config forces one.
    #[must_use]
    pub const fn strategy(mut self, strategy: CallStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    #[must_use]
    pub fn on_load<F>(mut self, hook: F) -> Self
    where
        F: FnMut(Loaded<T>) + Send + 'a,
    {
        self.on_load = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: FnMut(Failed) + Send + 'a,
    {
        self.on_error = Some(Box::new(hook));
        self
    }
}

///
/// SyncFacade
///
/// Binds one `ReadSource` to one `Store`. Each `sync` issues the reads its
/// strategy asks for and folds every result into the store entry for the
/// request's key as it lands. Overlapping syncs for the same key are not
/// de-duplicated; the store's reconciliation keeps the end state correct.
///

pub struct SyncFacade<S: ReadSource> {
    source: Arc<S>,
    store: Arc<Store<S::Value>>,
    config: SyncConfig,
    metrics: SyncMetrics,
}

impl<S> SyncFacade<S>
where
    S: ReadSource,
    S::Value: Clone,
{
    pub fn new(source: Arc<S>, store: Arc<Store<S::Value>>, config: SyncConfig) -> Self {
        Self {
            source,
            store,
            config,
            metrics: SyncMetrics::new(),
        }
    }

    /// Facade over a fresh store using the `[sync]` section of `config`.
    pub fn from_config(source: Arc<S>, config: &ConfigModel) -> Self {
        Self::new(source, Arc::new(Store::new()), config.sync.clone())
    }

    /// Parse `config_str`, apply its `[log]` section, and build a facade
    /// over a fresh store.
    pub fn from_toml(source: Arc<S>, config_str: &str) -> Result<Self, Error> {
        let config = Config::load(config_str)?;

        Ok(Self::from_config(source, &config))
    }

    #[must_use]
    pub const fn store(&self) -> &Arc<Store<S::Value>> {
        &self.store
    }

    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    #[must_use]
    pub const fn metrics(&self) -> &SyncMetrics {
        &self.metrics
    }

    /// Clear every key and zero the counters (logout, identity switch).
    pub fn reset(&self) {
        self.store.reset();
        self.metrics.reset();
        log!(Topic::Store, Info, "store reset");
    }

    /// Read `request` per the effective strategy and fold each result into
    /// the store as soon as it arrives.
    ///
    /// Hooks may fire once or twice; nothing is returned and nothing is
    /// raised. Dropping the future abandons the remaining deliveries.
    pub async fn sync(&self, request: ReadRequest, options: SyncOptions<'_, S::Value>) {
        let SyncOptions {
            strategy,
            mut on_load,
            mut on_error,
        } = options;

        let strategy = self.config.resolve(strategy);
        let started = time::now_millis();
        let key = request.key().clone();

        let reader = DualReader::new(self.source.as_ref());
        let mut stream = reader.stream(&request, strategy);
        let mut update_settled = false;

        while let Some(result) = stream.next().await {
            let certified = result.certified;
            let decision = self.reconcile(&key, &result, update_settled);

            if certified {
                update_settled = true;
            }

            let elapsed = time::now_millis().saturating_sub(started);
            Self::trace(&key, result.channel(), &result, decision, elapsed);

            match result.outcome {
                Ok(response) => {
                    if decision == Decision::Accept
                        && let Some(hook) = on_load.as_mut()
                    {
                        hook(Loaded {
                            response,
                            certified,
                        });
                    }
                }
                Err(error) => {
                    if let Some(hook) = on_error.as_mut() {
                        hook(Failed { error, certified });
                    }
                }
            }
        }
    }

    // Apply one result to the store and count it.
    fn reconcile(
        &self,
        key: &ResourceKey,
        result: &ReadResult<S::Value>,
        update_settled: bool,
    ) -> Decision {
        self.metrics.increment(SyncMetricKind::delivered(
            result.channel(),
            result.is_ok(),
        ));

        let decision = if !result.certified && update_settled && self.config.drop_query_after_update
        {
            Decision::Stale
        } else {
            self.store.apply(key, result)
        };

        self.metrics.increment(SyncMetricKind::decided(decision));

        decision
    }

    fn trace(
        key: &ResourceKey,
        channel: Channel,
        result: &ReadResult<S::Value>,
        decision: Decision,
        elapsed_ms: u64,
    ) {
        match (result.error(), decision) {
            (Some(err), Decision::Clear) => {
                log!(Topic::Sync, Error, "{channel} read for {key} failed after {elapsed_ms}ms, cleared: {err}");
            }
            (Some(err), _) => {
                log!(Topic::Sync, Warn, "{channel} read for {key} failed after {elapsed_ms}ms: {err}");
            }
            (None, Decision::Accept) => {
                log!(Topic::Sync, Debug, "{channel} result for {key} accepted after {elapsed_ms}ms");
            }
            (None, Decision::Reject) => {
                log!(Topic::Reconcile, Debug, "{channel} result for {key} rejected: key already proven");
            }
            (None, _) => {
                log!(Topic::Reconcile, Debug, "{channel} result for {key} dropped as {decision}");
            }
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::store::StoreEntry, ops::reader::ReadFns};
    use futures::executor::block_on;
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    fn key() -> ResourceKey {
        ResourceKey::named("balance")
    }

    fn request() -> ReadRequest {
        ReadRequest::anonymous(key())
    }

    fn facade_with(
        query: Result<u64, ReadError>,
        update: Result<u64, ReadError>,
        config: SyncConfig,
    ) -> SyncFacade<impl ReadSource<Value = u64>> {
        let source = ReadFns::new(
            move |_req: ReadRequest| {
                let reply = query.clone();
                async move { reply }
            },
            move |_req: ReadRequest| {
                let reply = update.clone();
                async move { reply }
            },
        );

        SyncFacade::new(Arc::new(source), Arc::new(Store::new()), config)
    }

    #[test]
    fn query_and_update_ends_certified() {
        let facade = facade_with(Ok(5), Ok(7), SyncConfig::default());
        let loads = Mutex::new(Vec::new());

        block_on(facade.sync(
            request(),
            SyncOptions::new().on_load(|l: Loaded<u64>| loads.lock().unwrap().push(l)),
        ));

        assert_eq!(
            facade.store().get(&key()),
            Some(StoreEntry {
                value: 7,
                certified: true
            })
        );
        // the update always loads; the query loads unless it landed second
        let loads = loads.into_inner().unwrap();
        assert!(loads.contains(&Loaded {
            response: 7,
            certified: true
        }));
        assert_eq!(facade.metrics().get(SyncMetricKind::UpdateDelivered), 1);
        assert_eq!(facade.metrics().get(SyncMetricKind::QueryDelivered), 1);
    }

    #[test]
    fn query_strategy_stays_unproven() {
        let facade = facade_with(Ok(5), Ok(7), SyncConfig::default());

        block_on(facade.sync(request(), SyncOptions::new().strategy(CallStrategy::Query)));

        assert_eq!(
            facade.store().get(&key()),
            Some(StoreEntry {
                value: 5,
                certified: false
            })
        );
        assert_eq!(facade.metrics().get(SyncMetricKind::UpdateDelivered), 0);
    }

    #[test]
    fn forced_strategy_beats_per_call_strategy() {
        let config = SyncConfig {
            force_strategy: Some(CallStrategy::Update),
            ..SyncConfig::default()
        };
        let facade = facade_with(Ok(5), Ok(7), config);

        block_on(facade.sync(request(), SyncOptions::new().strategy(CallStrategy::Query)));

        assert_eq!(facade.store().value(&key()), Some(7));
        assert_eq!(facade.metrics().get(SyncMetricKind::QueryDelivered), 0);
    }

    #[test]
    fn update_failure_clears_and_reports_certified_error() {
        let facade = facade_with(
            Ok(5),
            Err(ReadError::verification("stale certificate")),
            SyncConfig::default(),
        );
        facade.store().set(&key(), 3, true);
        let errors = Mutex::new(Vec::new());

        block_on(facade.sync(
            request(),
            SyncOptions::new()
                .strategy(CallStrategy::Update)
                .on_error(|f: Failed| errors.lock().unwrap().push(f)),
        ));

        assert_eq!(facade.store().get(&key()), None);
        assert_eq!(
            errors.into_inner().unwrap(),
            vec![Failed {
                error: ReadError::verification("stale certificate"),
                certified: true
            }]
        );
        assert_eq!(facade.metrics().get(SyncMetricKind::Cleared), 1);
    }

    #[test]
    fn query_failure_reports_but_keeps_value() {
        let facade = facade_with(
            Err(ReadError::transport("timeout")),
            Ok(7),
            SyncConfig::default(),
        );
        facade.store().set(&key(), 4, false);
        let errors = AtomicUsize::new(0);
        let loads = AtomicUsize::new(0);

        block_on(facade.sync(
            request(),
            SyncOptions::new()
                .strategy(CallStrategy::Query)
                .on_load(|_| {
                    loads.fetch_add(1, Ordering::SeqCst);
                })
                .on_error(|f| {
                    assert!(!f.certified);
                    errors.fetch_add(1, Ordering::SeqCst);
                }),
        ));

        assert_eq!(facade.store().value(&key()), Some(4));
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert_eq!(loads.load(Ordering::SeqCst), 0);
        assert_eq!(facade.metrics().get(SyncMetricKind::Ignored), 1);
    }

    #[test]
    fn rejected_query_does_not_fire_on_load() {
        let facade = facade_with(Ok(5), Ok(7), SyncConfig::default());
        facade.store().set(&key(), 9, true);
        let loads = AtomicUsize::new(0);

        block_on(facade.sync(
            request(),
            SyncOptions::new()
                .strategy(CallStrategy::Query)
                .on_load(|_| {
                    loads.fetch_add(1, Ordering::SeqCst);
                }),
        ));

        assert_eq!(facade.store().value(&key()), Some(9));
        assert_eq!(loads.load(Ordering::SeqCst), 0);
        assert_eq!(facade.metrics().get(SyncMetricKind::Rejected), 1);
    }

    #[test]
    fn reset_clears_store_and_allows_unproven_again() {
        let facade = facade_with(Ok(5), Ok(7), SyncConfig::default());
        block_on(facade.sync(request(), SyncOptions::new().strategy(CallStrategy::Update)));

        assert_eq!(facade.metrics().get(SyncMetricKind::UpdateDelivered), 1);

        facade.reset();
        facade.reset();
        assert!(facade.store().is_empty());
        assert!(facade.metrics().snapshot().is_empty());

        block_on(facade.sync(request(), SyncOptions::new().strategy(CallStrategy::Query)));
        assert_eq!(facade.store().value(&key()), Some(5));
    }

    #[test]
    fn from_config_uses_sync_section() {
        let config = Config::from_toml("[sync]\ndefault_strategy = \"update\"\n").unwrap();
        let source = ReadFns::new(
            |_req: ReadRequest| async { Ok::<u64, ReadError>(1) },
            |_req: ReadRequest| async { Ok::<u64, ReadError>(2) },
        );
        let facade = SyncFacade::from_config(Arc::new(source), &config);

        block_on(facade.sync(request(), SyncOptions::new()));

        assert_eq!(facade.config().default_strategy, CallStrategy::Update);
        assert_eq!(facade.store().value(&key()), Some(2));
        assert_eq!(facade.metrics().get(SyncMetricKind::delivered(Channel::Query, true)), 0);
    }

    #[test]
    fn from_toml_reports_config_errors_through_crate_error() {
        let source = ReadFns::new(
            |_req: ReadRequest| async { Ok::<u64, ReadError>(1) },
            |_req: ReadRequest| async { Ok::<u64, ReadError>(2) },
        );

        let err = SyncFacade::from_toml(Arc::new(source), "[sync]\nretries = 3\n")
            .err()
            .expect("unknown field must be rejected");

        assert!(!err.is_read());
        assert!(matches!(err, Error::Config(_)));
    }
}
