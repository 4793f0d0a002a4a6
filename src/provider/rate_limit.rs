use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use tracing::debug;

use super::{ProviderError, QueryMeta, QueryProvider, QueryResponse};
use crate::dns::{DomainName, RecordType};

/// Holds queries back so the wrapped provider sees at most a fixed number
/// per second.
pub struct RateLimitedProvider<P> {
    inner: P,
    limiter: DefaultDirectRateLimiter,
}

impl<P: QueryProvider> RateLimitedProvider<P> {
    pub fn new(inner: P, queries_per_second: NonZeroU32) -> Self {
        debug!("Limiting queries to {} per second", queries_per_second);
        // no burst beyond one second's worth of queries
        let quota = Quota::per_second(queries_per_second).allow_burst(queries_per_second);
        Self {
            inner,
            limiter: RateLimiter::direct(quota),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: QueryProvider> QueryProvider for RateLimitedProvider<P> {
    async fn query(
        &self,
        name: &DomainName,
        rtype: RecordType,
    ) -> Result<(QueryResponse, QueryMeta), ProviderError> {
        self.limiter.until_ready().await;
        self.inner.query(name, rtype).await
    }
}
