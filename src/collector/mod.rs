//! Rate-limited page collection from the search API
//!
//! The collector walks a page range in increasing order, one request at a
//! time under [`RateLimiter`] control, and persists every successful page as
//! a pending [`RawCollection`]. Failures are isolated per page: a bad page is
//! logged against that page only and the walk continues. HTTP 429 is the one
//! exception: the same page is retried after a fixed cooldown and never
//! counts as a page failure.
//!
//! Every invocation is wrapped in an operation log; the log completes as
//! `Completed` whenever the full range was walked (page errors are folded
//! into the output summary) and `Failed` only when an error escapes the
//! per-page isolation.

pub mod backup;
pub mod client;

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::config::Config;
use crate::limiter::RateLimiter;
use crate::metrics;
use crate::models::{
    CollectionQuery, OperationLog, OperationType, ProcessingStatus, RawCollection,
};
use crate::storage::SqliteStore;
use crate::utils::error::FetchError;
use backup::RawBackupWriter;
use client::SearchApiClient;

/// One page that could not be collected
#[derive(Debug, Clone)]
pub struct PageError {
    pub page: u32,
    pub error: String,
}

/// Collects raw pages from the paginated search API
pub struct Collector {
    client: SearchApiClient,
    limiter: RateLimiter,
    store: Arc<SqliteStore>,
    backup: RawBackupWriter,
    provider: String,
    default_country: String,
    rate_limit_cooldown: Duration,
}

impl Collector {
    pub fn new(config: &Config, store: Arc<SqliteStore>) -> Result<Self, FetchError> {
        let client = SearchApiClient::new(&config.api)?;
        Ok(Self {
            client,
            limiter: RateLimiter::new(&config.limiter),
            store,
            backup: RawBackupWriter::new(config.collector.raw_data_dir.clone()),
            provider: config.api.provider.clone(),
            default_country: config.api.country.clone(),
            rate_limit_cooldown: Duration::from_secs(config.collector.rate_limit_cooldown_secs),
        })
    }

    /// Collect a range of result pages for one query.
    ///
    /// Returns the ids of the stored raw collections, in page order. The
    /// returned error only ever reflects a failure that escaped per-page
    /// isolation (and is mirrored in the operation log as `Failed`).
    pub async fn collect(
        &self,
        query: &str,
        country: Option<&str>,
        start_page: u32,
        num_pages: u32,
    ) -> anyhow::Result<Vec<Uuid>> {
        let country = country.unwrap_or(&self.default_country);
        let mut log = OperationLog::begin(
            OperationType::Collection,
            format!(
                "query={query} country={country} pages={start_page}..{}",
                start_page + num_pages
            ),
        );
        self.store.insert_operation_log(&log)?;

        match self.collect_pages(query, country, start_page, num_pages).await {
            Ok((ids, page_errors, rate_limit_retries)) => {
                log.items_total = num_pages as usize;
                log.items_failed = page_errors.len();
                let summary = format!(
                    "stored {} of {} pages; {} rate-limit retries; page errors: {:?}",
                    ids.len(),
                    num_pages,
                    rate_limit_retries,
                    page_errors
                        .iter()
                        .map(|e| format!("p{}: {}", e.page, e.error))
                        .collect::<Vec<_>>()
                );
                // The full range was walked: isolated page errors do not
                // downgrade the collection log.
                log.complete(ProcessingStatus::Completed, summary, None);
                self.store.complete_operation_log(&log)?;
                Ok(ids)
            }
            Err(e) => {
                log.items_total = num_pages as usize;
                log.complete(
                    ProcessingStatus::Failed,
                    "collection aborted",
                    Some(e.to_string()),
                );
                self.store.complete_operation_log(&log)?;
                Err(e)
            }
        }
    }

    /// Walk the page range, isolating failures per page
    async fn collect_pages(
        &self,
        query: &str,
        country: &str,
        start_page: u32,
        num_pages: u32,
    ) -> anyhow::Result<(Vec<Uuid>, Vec<PageError>, u32)> {
        let mut ids = Vec::with_capacity(num_pages as usize);
        let mut page_errors = Vec::new();
        let mut rate_limit_retries = 0u32;

        for page in start_page..start_page + num_pages {
            match self
                .collect_one_page(query, country, page, &mut rate_limit_retries)
                .await
            {
                Ok(id) => ids.push(id),
                Err(e) => {
                    tracing::warn!(page, error = %e, "Page collection failed, continuing");
                    metrics::record_page_error();
                    page_errors.push(PageError {
                        page,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok((ids, page_errors, rate_limit_retries))
    }

    /// Fetch and persist a single page, retrying the same page on HTTP 429
    async fn collect_one_page(
        &self,
        query: &str,
        country: &str,
        page: u32,
        rate_limit_retries: &mut u32,
    ) -> anyhow::Result<Uuid> {
        let collection_query = CollectionQuery {
            query: query.to_string(),
            country: country.to_string(),
            page,
        };

        loop {
            self.limiter.await_slot().await;

            match self.client.fetch_page(&collection_query).await {
                Ok(fetch) => {
                    self.limiter.mark_end(true).await;

                    let collection = RawCollection::new(
                        &self.provider,
                        collection_query.clone(),
                        fetch.payload,
                        fetch.metadata,
                    );
                    self.store.insert_raw_collection(&collection)?;
                    metrics::record_page_collected();
                    tracing::info!(
                        page,
                        collection_id = %collection.id,
                        jobs = collection.metadata.job_count,
                        "Stored raw collection"
                    );

                    // Durability fallback only: a failed backup is logged
                    // and never fails the collection.
                    if let Err(e) = self.backup.write(&collection).await {
                        tracing::warn!(collection_id = %collection.id, error = %e, "Raw backup failed");
                    }

                    return Ok(collection.id);
                }
                Err(FetchError::RateLimited) => {
                    self.limiter.mark_end(false).await;
                    metrics::record_rate_limit_retry();
                    *rate_limit_retries += 1;
                    tracing::info!(
                        page,
                        cooldown_secs = self.rate_limit_cooldown.as_secs(),
                        "Rate limited, retrying same page after cooldown"
                    );
                    tokio::time::sleep(self.rate_limit_cooldown).await;
                    // Same page, not a page failure
                }
                Err(e) => {
                    self.limiter.mark_end(false).await;
                    return Err(e.into());
                }
            }
        }
    }

    /// The limiter owned by this collector (observability)
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}
