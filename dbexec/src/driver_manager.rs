use dbexec_driver::{ProviderRegistry, Result};
use std::sync::Arc;
use tracing::instrument;

/// Register the statically linked drivers enabled by cargo features
///
/// # Errors
/// * If a lock for the registry cannot be acquired
#[instrument(level = "debug", skip(registry))]
pub fn initialize(registry: &ProviderRegistry) -> Result<()> {
    #[cfg(feature = "driver-rusqlite")]
    registry.register_driver(Arc::new(dbexec_driver_rusqlite::Driver))?;
    #[cfg(not(feature = "driver-rusqlite"))]
    let _ = registry;
    Ok(())
}

/// Registry with the default driver name table and every statically linked driver registered
///
/// # Errors
/// * If a lock for the registry cannot be acquired
pub fn default_registry() -> Result<Arc<ProviderRegistry>> {
    let registry = ProviderRegistry::default();
    initialize(&registry)?;
    Ok(Arc::new(registry))
}
