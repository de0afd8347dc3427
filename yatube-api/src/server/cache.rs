//! Time-boxed cache for rendered pages.
//!
//! Entries are never invalidated by writes. A cached page stays as it is
//! until its time to live runs out or the whole cache is cleared.

use axum::{body::Bytes, http::Uri};
use moka::future::Cache;
use std::{
    fmt::{Debug, Formatter},
    sync::Arc,
    time::Duration,
};
use tracing::debug;

const MAX_CACHED_PAGES: u64 = 1_000;

#[derive(Clone)]
pub struct PageCache {
    pages: Cache<String, Bytes>,
    key_prefix: Arc<str>,
}

impl PageCache {
    #[must_use]
    pub fn new(time_to_live: Duration, key_prefix: impl Into<Arc<str>>) -> Self {
        let pages = Cache::builder()
            .max_capacity(MAX_CACHED_PAGES)
            .time_to_live(time_to_live)
            .build();

        Self {
            pages,
            key_prefix: key_prefix.into(),
        }
    }

    /// Pages differ by path and query, so `?page=2` is cached on its own.
    fn key(&self, uri: &Uri) -> String {
        let path_and_query = uri
            .path_and_query()
            .map_or_else(|| uri.path(), |path_and_query| path_and_query.as_str());

        format!("{}:{path_and_query}", self.key_prefix)
    }

    pub async fn get(&self, uri: &Uri) -> Option<Bytes> {
        let page = self.pages.get(&self.key(uri)).await;
        if page.is_some() {
            debug!(%uri, "Serving page from cache");
        }
        page
    }

    pub async fn insert(&self, uri: &Uri, page: Bytes) {
        self.pages.insert(self.key(uri), page).await;
    }

    pub fn clear(&self) {
        debug!(prefix = %self.key_prefix, "Clearing page cache");
        self.pages.invalidate_all();
    }
}

impl Debug for PageCache {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageCache")
            .field("key_prefix", &self.key_prefix)
            .field("entries", &self.pages.entry_count())
            .finish()
    }
}
