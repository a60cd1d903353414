pub mod backoff;
pub mod browser;
pub mod http;
pub mod identity;

use async_trait::async_trait;
use tracing::info;

use crate::app::ports::{PageSession, SessionProvider};
use crate::common::error::{Result, ScraperError};
use crate::config::CrawlerConfig;
use crate::registry::{FetchMode, SiteConfig};

/// Default [`SessionProvider`]: picks the browser or plain-HTTP adapter from
/// the site's configured fetch mode.
pub struct SessionManager {
    config: CrawlerConfig,
}

impl SessionManager {
    pub fn new(config: CrawlerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionProvider for SessionManager {
    async fn acquire(&self, site: &SiteConfig) -> Result<Box<dyn PageSession>> {
        match site.fetch_mode {
            FetchMode::Browser => {
                info!(site = %site.name, "launching headless browser session");
                let site = site.clone();
                let config = self.config.clone();
                let session =
                    tokio::task::spawn_blocking(move || browser::BrowserSession::launch(&site, &config))
                        .await
                        .map_err(|e| ScraperError::Browser(e.to_string()))??;
                Ok(Box::new(session))
            }
            FetchMode::Http => {
                info!(site = %site.name, "opening http session");
                Ok(Box::new(http::HttpSession::new(site, &self.config)?))
            }
        }
    }
}
