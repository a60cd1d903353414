//! Plain-HTTP session adapter for server-rendered catalogues.

use async_trait::async_trait;
use rand::Rng;
use reqwest::header;
use std::time::Duration;

use crate::app::ports::{PageSession, PageSnapshot};
use crate::common::error::{FetchError, ScraperError};
use crate::config::CrawlerConfig;
use crate::infra::identity;
use crate::pipeline::pagination::PageRef;
use crate::registry::SiteConfig;

pub struct HttpSession {
    site: String,
    client: reqwest::Client,
    delay_ms: (u64, u64),
    timeout: Duration,
}

impl HttpSession {
    pub fn new(site: &SiteConfig, config: &CrawlerConfig) -> Result<Self, ScraperError> {
        let client = reqwest::Client::builder()
            .gzip(true)
            .timeout(Duration::from_secs(config.page_timeout_secs))
            .build()?;
        Ok(Self {
            site: site.name.clone(),
            client,
            delay_ms: (config.min_delay_ms, config.max_delay_ms),
            timeout: Duration::from_secs(config.page_timeout_secs),
        })
    }
}

#[async_trait]
impl PageSession for HttpSession {
    async fn fetch(&mut self, page: &PageRef) -> Result<PageSnapshot, FetchError> {
        let (min, max) = self.delay_ms;
        let pause = {
            let mut rng = rand::thread_rng();
            rng.gen_range(min..=max.max(min))
        };
        tokio::time::sleep(Duration::from_millis(pause)).await;

        let identity = identity::sample();
        let response = self
            .client
            .get(&page.url)
            .header(header::USER_AGENT, identity.user_agent)
            .header(header::ACCEPT_LANGUAGE, identity.accept_language)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout(self.timeout)
                } else {
                    FetchError::Navigation(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Navigation(format!(
                "{}: HTTP status {}",
                self.site, status
            )));
        }
        let url = response.url().to_string();
        let html = response
            .text()
            .await
            .map_err(|e| FetchError::Navigation(e.to_string()))?;
        Ok(PageSnapshot { url, html })
    }
}
