//! HTTP implementation of [`Fetch`] on top of `reqwest`.

use std::time::Duration;

use axum::body::Body;
use axum::http::header::{HeaderName, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use url::Url;

use crate::config::UpstreamConfig;
use crate::upstream::{Fetch, FetchError, UpstreamResponse};

/// Fetches targets with a plain GET, no headers beyond the client defaults.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher from the upstream configuration.
    pub fn new(config: &UpstreamConfig) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder();

        if let Some(secs) = config.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }

        let client = builder.build().map_err(FetchError::Client)?;
        Ok(Self { client })
    }

    async fn get(&self, target: &str) -> Result<UpstreamResponse, FetchError> {
        let url = Url::parse(target).map_err(|source| FetchError::InvalidUrl {
            url: target.to_string(),
            source,
        })?;

        let response = self.client.get(url).send().await?;

        let status = response.status();
        let content_type = joined(response.headers(), CONTENT_TYPE);

        tracing::trace!(
            target_url = %target,
            status = %status,
            "Upstream responded"
        );

        Ok(UpstreamResponse {
            status,
            content_type,
            body: Body::from_stream(response.bytes_stream()),
        })
    }
}

/// All values of `name` joined with `", "`, or `None` when absent.
fn joined(headers: &HeaderMap, name: HeaderName) -> Option<HeaderValue> {
    let mut values = headers.get_all(name).iter();
    let first = values.next()?.clone();

    values.try_fold(first, |acc, value| {
        let mut bytes = acc.as_bytes().to_vec();
        bytes.extend_from_slice(b", ");
        bytes.extend_from_slice(value.as_bytes());
        HeaderValue::from_bytes(&bytes).ok()
    })
}

impl Fetch for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<UpstreamResponse, FetchError>> {
        self.get(url).boxed()
    }
}
