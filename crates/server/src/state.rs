//! Shared state behind every tool call.

use std::sync::Arc;

use shellcache_client::parse_origin;
use shellcache_core::{AppConfig, CacheDb, Error, Interceptor, Network, Registration};
use url::Url;

/// One controlled origin: its configuration, store, network and generations.
pub struct AppState {
    pub config: AppConfig,
    pub origin: Url,
    pub db: Arc<CacheDb>,
    pub network: Arc<dyn Network>,
    pub registration: Registration,
}

impl AppState {
    pub fn new(config: AppConfig, db: Arc<CacheDb>, network: Arc<dyn Network>) -> Result<Self, Error> {
        let origin = parse_origin(&config.origin).map_err(|e| Error::InvalidUrl(format!("{}: {e}", config.origin)))?;
        let registration = Registration::new(Arc::clone(&network));
        Ok(Self { config, origin, db, network, registration })
    }

    /// Build the handlers for `version`, or for the configured version.
    pub fn generation(&self, version: Option<&str>) -> Result<Arc<Interceptor>, Error> {
        let config = match version {
            Some(v) => self.config.with_version(v.trim()),
            None => self.config.clone(),
        };
        config.validate().map_err(|e| Error::InvalidInput(e.to_string()))?;

        let interceptor = Interceptor::new(&config, self.db.clone(), Arc::clone(&self.network))?;
        Ok(Arc::new(interceptor))
    }
}
