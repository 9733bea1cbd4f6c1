//! Strategy execution against the store and the network.

use std::sync::Arc;

use crate::Error;
use crate::cache::CacheStorage;
use crate::exchange::{Request, Response, check_storable};
use crate::network::Network;

use super::Interceptor;
use super::classify::Strategy;

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Network,
    Cache,
}

/// A response produced by one of the strategies.
#[derive(Debug, Clone)]
pub struct Served {
    pub strategy: Strategy,
    pub source: Source,
    pub response: Response,
}

/// Write a response for future requests, skipping pairs no store may hold.
async fn store_response(
    storage: &dyn CacheStorage, cache_name: &str, request: &Request, response: &Response,
) -> Result<(), Error> {
    match check_storable(request, response) {
        Ok(()) => storage.put(cache_name, request, response).await,
        Err(reason) => {
            tracing::debug!(url = %request.url, %reason, "not storing response");
            Ok(())
        }
    }
}

/// Fetch from the network and write the result into the store.
async fn revalidate(
    storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>, cache_name: String, request: Request,
) -> Result<Response, Error> {
    let response = network.fetch(&request).await?;
    store_response(storage.as_ref(), &cache_name, &request, &response).await?;
    Ok(response)
}

impl Interceptor {
    /// Run a strategy for an already classified same-origin request.
    pub async fn execute(&self, strategy: Strategy, request: &Request) -> Result<Served, Error> {
        let (source, response) = match strategy {
            Strategy::Navigation => self.network_first(request).await?,
            Strategy::ImmutableAsset => self.cache_first(request).await?,
            Strategy::Api => (Source::Network, self.network.fetch(request).await?),
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request).await?,
        };

        tracing::debug!(url = %request.url, ?strategy, ?source, status = response.status.as_u16(), "served");
        Ok(Served { strategy, source, response })
    }

    async fn network_first(&self, request: &Request) -> Result<(Source, Response), Error> {
        match self.network.fetch(request).await {
            Ok(response) => {
                store_response(self.storage.as_ref(), &self.cache_name, request, &response).await?;
                Ok((Source::Network, response))
            }
            Err(err) => {
                tracing::debug!(url = %request.url, error = %err, "network failed, trying store");
                match self.storage.match_request(&self.cache_name, request).await? {
                    Some(cached) => Ok((Source::Cache, cached)),
                    None => Err(Error::NoUsableResponse(format!("{}: {err}", request.url))),
                }
            }
        }
    }

    async fn cache_first(&self, request: &Request) -> Result<(Source, Response), Error> {
        if let Some(cached) = self.storage.match_request(&self.cache_name, request).await? {
            return Ok((Source::Cache, cached));
        }

        let response = self.network.fetch(request).await?;
        store_response(self.storage.as_ref(), &self.cache_name, request, &response).await?;
        Ok((Source::Network, response))
    }

    /// The network fetch starts before the store read so a hit never waits on it.
    async fn stale_while_revalidate(&self, request: &Request) -> Result<(Source, Response), Error> {
        let refresh = tokio::spawn(revalidate(
            Arc::clone(&self.storage),
            Arc::clone(&self.network),
            self.cache_name.clone(),
            request.clone(),
        ));

        let cached = match self.storage.match_request(&self.cache_name, request).await {
            Ok(cached) => cached,
            Err(err) => {
                self.finish_in_background(request, refresh);
                return Err(err);
            }
        };

        if let Some(cached) = cached {
            self.finish_in_background(request, refresh);
            return Ok((Source::Cache, cached));
        }

        match refresh.await.map_err(|e| Error::TaskFailed(e.to_string()))? {
            Ok(response) => Ok((Source::Network, response)),
            Err(err) if err.is_network() => Err(Error::NoUsableResponse(format!("{}: {err}", request.url))),
            Err(err) => Err(err),
        }
    }

    fn finish_in_background(&self, request: &Request, refresh: tokio::task::JoinHandle<Result<Response, Error>>) {
        let url = request.url.clone();
        self.track(async move {
            match refresh.await {
                Ok(Ok(_)) => tracing::debug!(%url, "revalidated"),
                Ok(Err(err)) => tracing::debug!(%url, error = %err, "revalidation failed"),
                Err(err) => tracing::warn!(%url, error = %err, "revalidation task failed"),
            }
        });
    }
}
