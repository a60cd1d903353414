//! Headless-Chromium session adapter.

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use rand::Rng;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::app::ports::{PageSession, PageSnapshot};
use crate::common::error::{FetchError, ScraperError};
use crate::config::CrawlerConfig;
use crate::infra::identity;
use crate::pipeline::pagination::PageRef;
use crate::registry::SiteConfig;

pub struct BrowserSession {
    site: String,
    /// Keeps the Chromium child process alive; killed when the session drops.
    _browser: Browser,
    tab: Arc<Tab>,
    delay_ms: (u64, u64),
    timeout: Duration,
}

impl BrowserSession {
    /// Launches a Chromium child process. Blocking; call from a blocking
    /// context. The viewport identity is fixed for the session lifetime,
    /// user-agent and locale rotate per fetch.
    pub fn launch(site: &SiteConfig, config: &CrawlerConfig) -> Result<Self, ScraperError> {
        let identity = identity::sample();
        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .window_size(Some(identity.viewport))
            .idle_browser_timeout(Duration::from_secs(90))
            .args(vec![
                OsStr::new("--no-sandbox"),
                OsStr::new("--disable-dev-shm-usage"),
            ])
            .build()
            .map_err(|e| ScraperError::Browser(e.to_string()))?;
        let browser = Browser::new(options).map_err(|e| ScraperError::Browser(e.to_string()))?;
        let tab = browser.new_tab().map_err(|e| ScraperError::Browser(e.to_string()))?;
        tab.set_default_timeout(Duration::from_secs(config.page_timeout_secs));
        debug!(site = %site.name, viewport = ?identity.viewport, "browser session launched");
        Ok(Self {
            site: site.name.clone(),
            _browser: browser,
            tab,
            delay_ms: (config.min_delay_ms, config.max_delay_ms),
            timeout: Duration::from_secs(config.page_timeout_secs),
        })
    }

    async fn anti_detection_pause(&self) {
        let (min, max) = self.delay_ms;
        let pause = {
            let mut rng = rand::thread_rng();
            rng.gen_range(min..=max.max(min))
        };
        tokio::time::sleep(Duration::from_millis(pause)).await;
    }
}

#[async_trait]
impl PageSession for BrowserSession {
    async fn fetch(&mut self, page: &PageRef) -> Result<PageSnapshot, FetchError> {
        self.anti_detection_pause().await;

        let identity = identity::sample();
        let tab = Arc::clone(&self.tab);
        let url = page.url.clone();
        // Fragment-only navigations never hit the network; the listing grid
        // must be forced to re-render with a reload.
        let fragment_nav = page.number > 1 && url.contains('#');
        let work = tokio::task::spawn_blocking(move || -> Result<PageSnapshot, String> {
            tab.set_user_agent(identity.user_agent, Some(identity.accept_language), None)
                .map_err(|e| e.to_string())?;
            tab.navigate_to(&url).map_err(|e| e.to_string())?;
            tab.wait_until_navigated().map_err(|e| e.to_string())?;
            if fragment_nav {
                tab.reload(false, None).map_err(|e| e.to_string())?;
                tab.wait_until_navigated().map_err(|e| e.to_string())?;
            }
            let html = tab.get_content().map_err(|e| e.to_string())?;
            Ok(PageSnapshot { url: tab.get_url(), html })
        });

        match tokio::time::timeout(self.timeout, work).await {
            Err(_) => {
                warn!(site = %self.site, url = %page.url, "page fetch timed out");
                Err(FetchError::Timeout(self.timeout))
            }
            Ok(Err(join_err)) => Err(FetchError::Navigation(join_err.to_string())),
            Ok(Ok(Err(message))) => Err(FetchError::Navigation(message)),
            Ok(Ok(Ok(snapshot))) => Ok(snapshot),
        }
    }
}
