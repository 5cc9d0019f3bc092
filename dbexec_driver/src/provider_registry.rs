use crate::Error::{IoError, ProviderUnavailable, UnknownProviderKind};
use crate::error::{Error, Result};
use crate::{Driver, DriverNameTable, ProviderKind};
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::{Arc, Condvar, Mutex, PoisonError, RwLock};
use tracing::{debug, instrument, warn};

/// Fallible constructor for a driver, registered under a driver name
pub type DriverLoader = Arc<dyn Fn() -> Result<Arc<dyn Driver>> + Send + Sync>;

fn lock_error<T>(error: PoisonError<T>) -> Error {
    IoError(error.to_string())
}

#[derive(Debug, Default)]
enum SlotState {
    #[default]
    Idle,
    Loading {
        attempt: u64,
    },
    Loaded(Arc<dyn Driver>),
}

#[derive(Debug, Default)]
struct SlotInner {
    state: SlotState,
    attempts: u64,
    last_failure: Option<(u64, Error)>,
}

/// Per-kind coordination point; at most one load attempt is in flight at a time
#[derive(Debug, Default)]
struct ResolutionSlot {
    inner: Mutex<SlotInner>,
    finished: Condvar,
}

/// Releases waiters if a loader unwinds before the attempt is recorded
struct AttemptGuard<'a> {
    slot: &'a ResolutionSlot,
    attempt: u64,
    recorded: bool,
}

impl AttemptGuard<'_> {
    /// Publish the outcome of the attempt and wake every waiter.  A poisoned slot lock is
    /// recovered so waiters never stay blocked on a finished attempt.
    fn settle(&self, outcome: Result<Arc<dyn Driver>>) {
        let mut inner = self
            .slot
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match outcome {
            Ok(driver) => inner.state = SlotState::Loaded(driver),
            Err(error) => {
                inner.state = SlotState::Idle;
                inner.last_failure = Some((self.attempt, error));
            }
        }
        self.slot.finished.notify_all();
    }

    fn record(mut self, outcome: &Result<Arc<dyn Driver>>) {
        self.settle(outcome.clone());
        self.recorded = true;
    }
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        if !self.recorded {
            self.settle(Err(IoError("driver loader panicked".to_string())));
        }
    }
}

/// Resolves provider kinds to driver factories.
///
/// Driver names come from a fixed [`DriverNameTable`]; drivers are made available by
/// registering a loader (or an already constructed driver) under a driver name.  A
/// successful resolution is cached for the lifetime of the registry and every later call
/// returns the same `Arc`.  Failures are not cached: the next call for the kind retries.
/// Concurrent first resolutions of a kind share a single load attempt and its outcome.
pub struct ProviderRegistry {
    names: DriverNameTable,
    loaders: RwLock<HashMap<String, DriverLoader>>,
    resolved: RwLock<HashMap<ProviderKind, Arc<dyn Driver>>>,
    slots: Mutex<HashMap<ProviderKind, Arc<ResolutionSlot>>>,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new(names: DriverNameTable) -> Self {
        Self {
            names,
            loaders: RwLock::new(HashMap::new()),
            resolved: RwLock::new(HashMap::new()),
            slots: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn names(&self) -> &DriverNameTable {
        &self.names
    }

    #[must_use]
    pub fn driver_name(&self, kind: ProviderKind) -> Option<&'static str> {
        self.names.get(kind)
    }

    /// Register a loader under a driver name, replacing any previous loader for the name
    ///
    /// # Errors
    /// * If a lock for loaders cannot be acquired
    pub fn register_loader<S, F>(&self, driver_name: S, loader: F) -> Result<()>
    where
        S: Into<String>,
        F: Fn() -> Result<Arc<dyn Driver>> + Send + Sync + 'static,
    {
        let driver_name = driver_name.into();
        debug!("registering driver loader: {driver_name}");
        let mut loaders = self.loaders.write().map_err(lock_error)?;
        let _ = loaders.insert(driver_name, Arc::new(loader));
        Ok(())
    }

    /// Register a constructed driver under its identifier
    ///
    /// # Errors
    /// * If a lock for loaders cannot be acquired
    pub fn register_driver(&self, driver: Arc<dyn Driver>) -> Result<()> {
        let identifier = driver.identifier();
        self.register_loader(identifier, move || Ok(Arc::clone(&driver)))
    }

    /// Returns true if a loader is registered for the driver name
    ///
    /// # Errors
    /// * If a lock for loaders cannot be acquired
    pub fn is_registered(&self, driver_name: &str) -> Result<bool> {
        let loaders = self.loaders.read().map_err(lock_error)?;
        Ok(loaders.contains_key(driver_name))
    }

    /// Provider kinds that have been resolved successfully
    ///
    /// # Errors
    /// * If a lock for the cache cannot be acquired
    pub fn resolved_kinds(&self) -> Result<Vec<ProviderKind>> {
        let resolved = self.resolved.read().map_err(lock_error)?;
        let mut kinds: Vec<ProviderKind> = resolved.keys().copied().collect();
        kinds.sort();
        Ok(kinds)
    }

    /// Resolve a provider kind to its driver
    ///
    /// # Errors
    /// * [`UnknownProviderKind`](Error::UnknownProviderKind) if the kind has no driver name
    /// * [`ProviderUnavailable`](Error::ProviderUnavailable) if the driver could not be loaded
    /// * If a lock cannot be acquired
    #[instrument(level = "debug", skip(self))]
    pub fn resolve(&self, kind: ProviderKind) -> Result<Arc<dyn Driver>> {
        if let Some(driver) = self.resolved.read().map_err(lock_error)?.get(&kind) {
            return Ok(Arc::clone(driver));
        }

        let Some(driver_name) = self.names.get(kind) else {
            return Err(UnknownProviderKind(kind));
        };

        let slot = {
            let mut slots = self.slots.lock().map_err(lock_error)?;
            Arc::clone(slots.entry(kind).or_default())
        };

        let mut inner = slot.inner.lock().map_err(lock_error)?;
        loop {
            let in_flight = match &inner.state {
                SlotState::Loaded(driver) => return Ok(Arc::clone(driver)),
                SlotState::Loading { attempt } => Some(*attempt),
                SlotState::Idle => None,
            };

            let Some(attempt) = in_flight else {
                inner.attempts += 1;
                let attempt = inner.attempts;
                inner.state = SlotState::Loading { attempt };
                drop(inner);
                return self.load(kind, driver_name, &slot, attempt);
            };

            debug!(attempt, "waiting for in-flight load of {driver_name}");
            inner = slot
                .finished
                .wait_while(inner, |inner| match inner.state {
                    SlotState::Loading { attempt: current } => current == attempt,
                    _ => false,
                })
                .map_err(lock_error)?;
            if let Some((failed_attempt, error)) = &inner.last_failure {
                if *failed_attempt == attempt {
                    return Err(error.clone());
                }
            }
        }
    }

    fn load(
        &self,
        kind: ProviderKind,
        driver_name: &'static str,
        slot: &ResolutionSlot,
        attempt: u64,
    ) -> Result<Arc<dyn Driver>> {
        let guard = AttemptGuard {
            slot,
            attempt,
            recorded: false,
        };
        debug!(attempt, "loading driver {driver_name} for {kind}");

        let outcome = self.run_loader(kind, driver_name).and_then(|driver| {
            let mut resolved = self.resolved.write().map_err(lock_error)?;
            let _ = resolved.insert(kind, Arc::clone(&driver));
            Ok(driver)
        });
        guard.record(&outcome);

        if let Err(error) = &outcome {
            warn!("unable to load driver {driver_name} for {kind}: {error}");
        }
        outcome
    }

    fn run_loader(&self, kind: ProviderKind, driver_name: &str) -> Result<Arc<dyn Driver>> {
        let loader = {
            let loaders = self.loaders.read().map_err(lock_error)?;
            loaders.get(driver_name).cloned()
        };
        let Some(loader) = loader else {
            return Err(ProviderUnavailable {
                kind,
                driver: driver_name.to_string(),
                reason: "no driver is registered with this name".to_string(),
            });
        };

        loader().map_err(|error| match error {
            ProviderUnavailable { .. } => error,
            error => ProviderUnavailable {
                kind,
                driver: driver_name.to_string(),
                reason: error.to_string(),
            },
        })
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new(DriverNameTable::default())
    }
}

impl Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockDriver;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Barrier, mpsc};
    use std::thread;
    use std::time::Duration;

    fn mock_driver(identifier: &'static str) -> Arc<dyn Driver> {
        let mut mock_driver = MockDriver::new();
        mock_driver.expect_identifier().return_const(identifier);
        Arc::new(mock_driver)
    }

    fn counting_loader(
        identifier: &'static str,
        delay: Duration,
        fail: bool,
    ) -> (Arc<AtomicUsize>, impl Fn() -> Result<Arc<dyn Driver>> + Send + Sync + 'static) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let loader = move || {
            let _ = counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(delay);
            if fail {
                Err(IoError("client library not found".to_string()))
            } else {
                Ok(mock_driver(identifier))
            }
        };
        (calls, loader)
    }

    #[test_log::test]
    fn test_resolve_returns_same_instance() -> Result<()> {
        let registry = ProviderRegistry::default();
        registry.register_driver(mock_driver("sqlite"))?;

        let first = registry.resolve(ProviderKind::Sqlite)?;
        for _ in 0..10 {
            let driver = registry.resolve(ProviderKind::Sqlite)?;
            assert!(Arc::ptr_eq(&first, &driver));
        }
        assert_eq!(registry.resolved_kinds()?, vec![ProviderKind::Sqlite]);
        Ok(())
    }

    #[test]
    fn test_loader_runs_once_after_success() -> Result<()> {
        let registry = ProviderRegistry::default();
        let (calls, loader) = counting_loader("npgsql", Duration::ZERO, false);
        registry.register_loader("npgsql", loader)?;

        let _ = registry.resolve(ProviderKind::Postgres)?;
        let _ = registry.resolve(ProviderKind::Postgres)?;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[test]
    fn test_unknown_provider_kind() -> Result<()> {
        let registry = ProviderRegistry::default();
        registry.register_driver(mock_driver("sqlserverce"))?;

        for _ in 0..3 {
            let error = registry
                .resolve(ProviderKind::SqlServerCe)
                .expect_err("no driver name");
            assert_eq!(error, UnknownProviderKind(ProviderKind::SqlServerCe));
        }
        Ok(())
    }

    #[test]
    fn test_custom_name_table() -> Result<()> {
        let names = DriverNameTable::empty().with(ProviderKind::SqlServerCe, "sqlserverce");
        let registry = ProviderRegistry::new(names);
        registry.register_driver(mock_driver("sqlserverce"))?;

        assert!(registry.resolve(ProviderKind::SqlServerCe).is_ok());
        assert_eq!(
            registry.resolve(ProviderKind::Sqlite).expect_err("not in table"),
            UnknownProviderKind(ProviderKind::Sqlite)
        );
        Ok(())
    }

    #[test]
    fn test_unregistered_driver_is_retried() -> Result<()> {
        let registry = ProviderRegistry::default();

        let error = registry
            .resolve(ProviderKind::MySql)
            .expect_err("driver not registered");
        assert!(matches!(
            error,
            ProviderUnavailable { kind: ProviderKind::MySql, ref driver, .. }
                if driver == "mysqlclient"
        ));
        assert!(registry.resolved_kinds()?.is_empty());

        registry.register_driver(mock_driver("mysqlclient"))?;
        assert!(registry.is_registered("mysqlclient")?);
        let driver = registry.resolve(ProviderKind::MySql)?;
        assert_eq!(driver.identifier(), "mysqlclient");
        Ok(())
    }

    #[test]
    fn test_transient_loader_failure_is_retried() -> Result<()> {
        let registry = ProviderRegistry::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        registry.register_loader("oracleclient", move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(IoError("client library not found".to_string()))
            } else {
                Ok(mock_driver("oracleclient"))
            }
        })?;

        let error = registry
            .resolve(ProviderKind::Oracle)
            .expect_err("first load fails");
        assert_eq!(
            error,
            ProviderUnavailable {
                kind: ProviderKind::Oracle,
                driver: "oracleclient".to_string(),
                reason: "client library not found".to_string(),
            }
        );

        let first = registry.resolve(ProviderKind::Oracle)?;
        let second = registry.resolve(ProviderKind::Oracle)?;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        Ok(())
    }

    fn resolve_concurrently(
        registry: &Arc<ProviderRegistry>,
        kind: ProviderKind,
        callers: usize,
    ) -> Vec<Result<Arc<dyn Driver>>> {
        let barrier = Arc::new(Barrier::new(callers));
        let handles: Vec<_> = (0..callers)
            .map(|_| {
                let registry = Arc::clone(registry);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let _ = barrier.wait();
                    registry.resolve(kind)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("resolver thread panicked"))
            .collect()
    }

    #[test]
    fn test_concurrent_first_use_loads_once() -> Result<()> {
        let registry = Arc::new(ProviderRegistry::default());
        let (calls, loader) = counting_loader("npgsql", Duration::from_millis(200), false);
        registry.register_loader("npgsql", loader)?;

        let results = resolve_concurrently(&registry, ProviderKind::Postgres, 8);
        let drivers = results.into_iter().collect::<Result<Vec<_>>>()?;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(drivers.iter().all(|driver| Arc::ptr_eq(driver, &drivers[0])));
        Ok(())
    }

    #[test]
    fn test_concurrent_first_use_shares_failure() -> Result<()> {
        let registry = Arc::new(ProviderRegistry::default());
        let (calls, loader) = counting_loader("db2client", Duration::from_millis(200), true);
        registry.register_loader("db2client", loader)?;

        let results = resolve_concurrently(&registry, ProviderKind::Db2, 8);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for result in results {
            let error = result.expect_err("load failed");
            assert!(matches!(error, ProviderUnavailable { kind: ProviderKind::Db2, .. }));
        }
        Ok(())
    }

    #[test]
    fn test_slow_load_does_not_block_other_kinds() -> Result<()> {
        let registry = Arc::new(ProviderRegistry::default());
        let (started_sender, started_receiver) = mpsc::channel::<()>();
        let (release_sender, release_receiver) = mpsc::channel::<()>();
        let release_receiver = Mutex::new(release_receiver);
        registry.register_loader("npgsql", move || {
            let _ = started_sender.send(());
            let _ = release_receiver.lock().map_err(lock_error)?.recv();
            Ok(mock_driver("npgsql"))
        })?;
        registry.register_driver(mock_driver("sqlite"))?;

        let slow = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || registry.resolve(ProviderKind::Postgres))
        };
        started_receiver
            .recv()
            .map_err(|error| IoError(error.to_string()))?;

        let sqlite = registry.resolve(ProviderKind::Sqlite)?;
        assert_eq!(sqlite.identifier(), "sqlite");

        release_sender
            .send(())
            .map_err(|error| IoError(error.to_string()))?;
        let postgres = slow.join().expect("resolver thread panicked")?;
        assert_eq!(postgres.identifier(), "npgsql");
        Ok(())
    }

    #[test]
    fn test_panicking_loader_releases_slot() -> Result<()> {
        let registry = Arc::new(ProviderRegistry::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        registry.register_loader("informix", move || {
            assert!(
                counter.fetch_add(1, Ordering::SeqCst) > 0,
                "first load panics"
            );
            Ok(mock_driver("informix"))
        })?;

        let panicked = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || registry.resolve(ProviderKind::Informix)).join()
        };
        assert!(panicked.is_err());

        let driver = registry.resolve(ProviderKind::Informix)?;
        assert_eq!(driver.identifier(), "informix");
        Ok(())
    }

    #[test]
    fn test_cache_failure_after_load_is_shared() -> Result<()> {
        let registry = Arc::new(ProviderRegistry::default());
        let poisoner = Arc::clone(&registry);
        registry.register_loader("firebirdclient", move || {
            let registry = Arc::clone(&poisoner);
            let _ = thread::spawn(move || {
                let _resolved = registry.resolved.write();
                panic!("poison the driver cache");
            })
            .join();
            Ok(mock_driver("firebirdclient"))
        })?;

        let error = registry
            .resolve(ProviderKind::Firebird)
            .expect_err("driver cache is poisoned");
        assert!(matches!(error, IoError(ref message) if message != "driver loader panicked"));

        let slot = {
            let slots = registry.slots.lock().map_err(lock_error)?;
            Arc::clone(slots.get(&ProviderKind::Firebird).expect("slot"))
        };
        let inner = slot.inner.lock().map_err(lock_error)?;
        assert!(matches!(inner.state, SlotState::Idle));
        assert_eq!(inner.last_failure, Some((1, error)));
        Ok(())
    }
}
