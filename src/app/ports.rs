use async_trait::async_trait;

use crate::common::error::{FetchError, Result};
use crate::pipeline::pagination::PageRef;
use crate::registry::SiteConfig;

/// One retrieved listing page: the URL the session ended up on and the
/// rendered markup.
#[derive(Clone, Debug)]
pub struct PageSnapshot {
    pub url: String,
    pub html: String,
}

/// A live per-site fetch context. Implementations own whatever underlying
/// resource they need (a Chromium tab, an HTTP client); dropping the boxed
/// session releases it, which is what guarantees cleanup on every exit path
/// of a site's crawl loop.
#[async_trait]
pub trait PageSession: Send {
    async fn fetch(&mut self, page: &PageRef) -> std::result::Result<PageSnapshot, FetchError>;
}

/// Hands out sessions, one per site worker. Selection between the browser
/// and plain-HTTP adapters happens here, by config lookup.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn acquire(&self, site: &SiteConfig) -> Result<Box<dyn PageSession>>;
}
