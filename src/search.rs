use crate::config::Config;
use crate::discord::{SearchApi, PAGE_SIZE};
use crate::error::{ArchiveError, Result};
use crate::model::SearchPage;
use crate::rate_limit::Throttle;
use std::time::Duration;
use tracing::{debug, warn};

/// Lazily walks the search endpoint, one throttled request per page.
///
/// Yields every non-empty page in offset order and stops for good at the
/// first page without message groups. Any error also ends the sequence.
pub struct SearchPages<'a, S: SearchApi + ?Sized> {
    api: &'a S,
    throttle: Throttle,
    offset: u32,
    pages: usize,
    requests: usize,
    max_pages: usize,
    rate_limit_retries: u32,
    done: bool,
}

impl<'a, S: SearchApi + ?Sized> SearchPages<'a, S> {
    pub fn new(api: &'a S, delay: Duration, max_pages: usize, rate_limit_retries: u32) -> Self {
        Self {
            api,
            throttle: Throttle::new(delay),
            offset: 0,
            pages: 0,
            requests: 0,
            max_pages,
            rate_limit_retries,
            done: false,
        }
    }

    pub fn from_config(api: &'a S, config: &Config) -> Self {
        Self::new(
            api,
            config.search_delay,
            config.max_pages,
            config.rate_limit_retries,
        )
    }

    /// Offset the next request will use.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Search calls issued so far, including rate-limited ones.
    pub fn requests(&self) -> usize {
        self.requests
    }

    pub async fn next_page(&mut self) -> Result<Option<SearchPage>> {
        if self.done {
            return Ok(None);
        }

        let mut retries = 0;
        let page = loop {
            self.throttle.acquire().await;
            self.requests += 1;
            let result = self.api.search_page(self.offset).await;
            self.throttle.finish();
            match result {
                Ok(page) => break page,
                Err(ArchiveError::RateLimited {
                    offset,
                    retry_after,
                }) if retries < self.rate_limit_retries => {
                    retries += 1;
                    warn!(
                        "Search rate limited at offset {}, retrying in {:?} ({}/{})",
                        offset, retry_after, retries, self.rate_limit_retries
                    );
                    self.throttle.defer(retry_after);
                }
                Err(e) => {
                    self.done = true;
                    return Err(e);
                }
            }
        };

        if page.is_exhausted() {
            debug!(
                "Search: offset {} returned no results, {} pages fetched",
                self.offset, self.pages
            );
            self.done = true;
            return Ok(None);
        }

        if self.pages >= self.max_pages {
            self.done = true;
            return Err(ArchiveError::PaginationRunaway { pages: self.pages });
        }

        debug!(
            "Search: offset {} returned {} groups",
            self.offset,
            page.messages.len()
        );
        self.pages += 1;
        self.offset += PAGE_SIZE;
        Ok(Some(page))
    }
}
