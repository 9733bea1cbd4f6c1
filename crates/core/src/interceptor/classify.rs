//! Request classification.
//!
//! Rules are checked in a fixed order and the first match wins:
//!
//! 1. Navigation: `navigate` mode, `document` destination, the root path, or
//!    an `.html`/`.htm` path.
//! 2. Immutable asset: under the asset prefix with a `-XXXXXXXX.` hash token.
//! 3. API: under the API prefix.
//! 4. Everything else is stale-while-revalidate.
//!
//! Cross-origin requests are never classified; they pass through.

use regex::Regex;
use serde::Serialize;
use url::Url;

use crate::Error;
use crate::config::AppConfig;
use crate::exchange::{Destination, Request, RequestMode};

/// Caching policy applied to an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Network-first, falling back to the store.
    Navigation,
    /// Cache-first; content under a hashed name never changes.
    ImmutableAsset,
    /// Network-only.
    Api,
    /// Serve from the store while refreshing it from the network.
    StaleWhileRevalidate,
}

/// Whether a request is handled at all, and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Not ours; the host's default network behavior applies.
    Passthrough,
    Intercept(Strategy),
}

/// Pure request classifier built from configuration.
#[derive(Debug, Clone)]
pub struct Classifier {
    origin: Url,
    asset_prefix: String,
    api_prefix: String,
    hashed_asset: Regex,
}

impl Classifier {
    /// Build a classifier for the configured origin and prefixes.
    pub fn new(config: &AppConfig) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("{}: {e}", config.origin)))?;
        let pattern = format!(r"^{}.*-[A-Za-z0-9]{{8}}\..+$", regex::escape(&config.asset_prefix));
        let hashed_asset = Regex::new(&pattern).map_err(|e| Error::InvalidInput(e.to_string()))?;

        Ok(Self {
            origin,
            asset_prefix: config.asset_prefix.clone(),
            api_prefix: config.api_prefix.clone(),
            hashed_asset,
        })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Whether the URL shares scheme, host and port with the controlled origin.
    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin.origin()
    }

    /// Decide whether to intercept a request and with which strategy.
    pub fn route(&self, request: &Request) -> Route {
        if !self.is_same_origin(&request.url) {
            return Route::Passthrough;
        }
        Route::Intercept(self.classify(request))
    }

    /// Map a request to its strategy, ignoring origin.
    pub fn classify(&self, request: &Request) -> Strategy {
        let path = request.url.path();

        if is_navigation(request, path) {
            Strategy::Navigation
        } else if path.starts_with(&self.asset_prefix) && self.hashed_asset.is_match(path) {
            Strategy::ImmutableAsset
        } else if path.starts_with(&self.api_prefix) {
            Strategy::Api
        } else {
            Strategy::StaleWhileRevalidate
        }
    }
}

fn is_navigation(request: &Request, path: &str) -> bool {
    request.mode == RequestMode::Navigate
        || request.destination == Destination::Document
        || path == "/"
        || path.ends_with(".html")
        || path.ends_with(".htm")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        let config = AppConfig { origin: "https://app.test".into(), ..Default::default() };
        Classifier::new(&config).unwrap()
    }

    fn get(path: &str) -> Request {
        Request::get(Url::parse("https://app.test").unwrap().join(path).unwrap())
    }

    #[test]
    fn test_navigation_rules() {
        let c = classifier();
        assert_eq!(c.classify(&get("/")), Strategy::Navigation);
        assert_eq!(c.classify(&get("/docs/index.html")), Strategy::Navigation);
        assert_eq!(c.classify(&get("/legacy.htm")), Strategy::Navigation);
        assert_eq!(c.classify(&get("/settings").with_mode(RequestMode::Navigate)), Strategy::Navigation);
        assert_eq!(c.classify(&get("/frame").with_destination(Destination::Document)), Strategy::Navigation);
    }

    #[test]
    fn test_navigation_wins_over_prefixes() {
        let c = classifier();
        assert_eq!(c.classify(&Request::navigate(get("/api/index.html").url)), Strategy::Navigation);
        assert_eq!(c.classify(&get("/api/index.html")), Strategy::Navigation);
        assert_eq!(c.classify(&get("/api/users").with_mode(RequestMode::Navigate)), Strategy::Navigation);
        assert_eq!(c.classify(&get("/assets/page-1a2b3c4d.html")), Strategy::Navigation);
    }

    #[test]
    fn test_hashed_assets() {
        let c = classifier();
        assert_eq!(c.classify(&get("/assets/app-1a2b3c4d.js")), Strategy::ImmutableAsset);
        assert_eq!(c.classify(&get("/assets/index-AbCdEfGh.css")), Strategy::ImmutableAsset);
        assert_eq!(c.classify(&get("/assets/vendor.react-00000000.min.js")), Strategy::ImmutableAsset);
        assert_eq!(c.classify(&get("/assets/fonts/inter-ZZZZ9999.woff2")), Strategy::ImmutableAsset);
    }

    #[test]
    fn test_unhashed_assets_fall_through() {
        let c = classifier();
        // seven and nine character tokens
        assert_eq!(c.classify(&get("/assets/app-1a2b3c4.js")), Strategy::StaleWhileRevalidate);
        assert_eq!(c.classify(&get("/assets/app-1a2b3c4d5.js")), Strategy::StaleWhileRevalidate);
        assert_eq!(c.classify(&get("/assets/logo.svg")), Strategy::StaleWhileRevalidate);
        assert_eq!(c.classify(&get("/assets/app_1a2b3c4d.js")), Strategy::StaleWhileRevalidate);
        // hash token outside the asset prefix
        assert_eq!(c.classify(&get("/static/app-1a2b3c4d.js")), Strategy::StaleWhileRevalidate);
    }

    #[test]
    fn test_api_prefix() {
        let c = classifier();
        assert_eq!(c.classify(&get("/api/data")), Strategy::Api);
        assert_eq!(c.classify(&get("/api/projects/1/files?path=x")), Strategy::Api);
        assert_eq!(c.classify(&get("/apiary")), Strategy::StaleWhileRevalidate);
    }

    #[test]
    fn test_default_strategy() {
        let c = classifier();
        assert_eq!(c.classify(&get("/manifest.json")), Strategy::StaleWhileRevalidate);
        assert_eq!(c.classify(&get("/favicon.svg")), Strategy::StaleWhileRevalidate);
    }

    #[test]
    fn test_route_cross_origin_passthrough() {
        let c = classifier();
        let cdn = Request::get(Url::parse("https://cdn.test/assets/app-1a2b3c4d.js").unwrap());
        assert_eq!(c.route(&cdn), Route::Passthrough);

        let other_port = Request::navigate(Url::parse("https://app.test:8443/").unwrap());
        assert_eq!(c.route(&other_port), Route::Passthrough);

        let other_scheme = Request::get(Url::parse("http://app.test/api/data").unwrap());
        assert_eq!(c.route(&other_scheme), Route::Passthrough);

        assert_eq!(c.route(&get("/api/data")), Route::Intercept(Strategy::Api));
    }

    #[test]
    fn test_custom_prefixes() {
        let config = AppConfig {
            origin: "https://app.test".into(),
            asset_prefix: "/build/static.v1/".into(),
            api_prefix: "/rpc/".into(),
            ..Default::default()
        };
        let c = Classifier::new(&config).unwrap();
        assert_eq!(c.classify(&get("/build/static.v1/main-abcdefgh.js")), Strategy::ImmutableAsset);
        assert_eq!(c.classify(&get("/build/staticXv1/main-abcdefgh.js")), Strategy::StaleWhileRevalidate);
        assert_eq!(c.classify(&get("/rpc/call")), Strategy::Api);
        assert_eq!(c.classify(&get("/api/data")), Strategy::StaleWhileRevalidate);
    }
}
