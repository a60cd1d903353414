//! Fixed identity pools for anti-detection rotation.
//!
//! Rotation is a policy knob, not a correctness mechanism: a site that
//! detects the scraper anyway just costs retries.

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;

#[derive(Clone, Copy, Debug)]
pub struct Identity {
    pub user_agent: &'static str,
    pub accept_language: &'static str,
    pub viewport: (u32, u32),
}

static USER_AGENTS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:124.0) Gecko/20100101 Firefox/124.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:124.0) Gecko/20100101 Firefox/124.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Edge/123.0.0.0 Safari/537.36",
    ]
});

// Tunisian sites serve French first; keep fr variants dominant.
static LOCALES: &[&str] = &["fr-FR,fr;q=0.9", "fr-TN,fr;q=0.9,ar;q=0.7", "fr;q=0.9,en-US;q=0.6"];

static VIEWPORTS: &[(u32, u32)] = &[(1366, 900), (1440, 900), (1536, 864), (1920, 1080)];

/// Draw a pseudo-random identity from the fixed pools.
pub fn sample() -> Identity {
    let mut rng = rand::thread_rng();
    Identity {
        user_agent: USER_AGENTS.choose(&mut rng).copied().unwrap_or(USER_AGENTS[0]),
        accept_language: LOCALES.choose(&mut rng).copied().unwrap_or(LOCALES[0]),
        viewport: VIEWPORTS.choose(&mut rng).copied().unwrap_or(VIEWPORTS[0]),
    }
}
