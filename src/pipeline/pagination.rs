//! Page advancement strategies.
//!
//! Two protocols are supported: a page-number query parameter, and the
//! ASP.NET-style hash fragment (`#mode=gallery&tt=261&page=2&...`) where the
//! fragment, not the path, selects the page. Both drive the same
//! `Active -> Exhausted | Failed` state machine on [`CrawlState`].

use url::Url;

use crate::common::error::PaginationError;
use crate::registry::{PaginationKind, SiteConfig};

/// A concrete reference to one listing page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageRef {
    pub url: String,
    pub number: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrawlStatus {
    Active,
    Exhausted,
    Failed,
}

/// Per-site crawl position. Owned by exactly one worker; mutated only by
/// the paginator's `advance`.
#[derive(Debug)]
pub struct CrawlState {
    pub site: String,
    pub current: PageRef,
    pub pages_fetched: u32,
    pub status: CrawlStatus,
}

impl CrawlState {
    pub fn new(site: &str, first: PageRef) -> Self {
        Self {
            site: site.to_string(),
            current: first,
            pages_fetched: 0,
            status: CrawlStatus::Active,
        }
    }
}

pub trait Paginator: Send + Sync {
    fn first_page(&self) -> Result<PageRef, PaginationError>;

    /// Record the page that was just fetched and move the state forward.
    /// Zero items or the page budget exhausts the site; an unparseable page
    /// reference fails it. Both are terminal.
    fn advance(&self, state: &mut CrawlState, item_count: usize) -> Result<(), PaginationError>;
}

/// Strategy selection is a config lookup, never a runtime probe.
pub fn paginator_for(site: &SiteConfig) -> Result<Box<dyn Paginator>, PaginationError> {
    match site.pagination {
        PaginationKind::Query => Ok(Box::new(QueryParamPaginator::new(site)?)),
        PaginationKind::Hash => Ok(Box::new(HashFragmentPaginator::new(site)?)),
    }
}

pub struct QueryParamPaginator {
    base: Url,
    page_param: String,
    max_pages: u32,
}

impl QueryParamPaginator {
    pub fn new(site: &SiteConfig) -> Result<Self, PaginationError> {
        let base = Url::parse(&site.base_url)
            .map_err(|e| PaginationError::BadPageRef(format!("{}: {}", site.base_url, e)))?;
        Ok(Self {
            base,
            page_param: site.page_param.clone(),
            max_pages: site.max_pages,
        })
    }

    fn url_for(&self, page: u32) -> String {
        let mut url = self.base.clone();
        let existing: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.clear();
            let mut replaced = false;
            for (k, v) in &existing {
                if k == &self.page_param {
                    pairs.append_pair(k, &page.to_string());
                    replaced = true;
                } else {
                    pairs.append_pair(k, v);
                }
            }
            if !replaced {
                pairs.append_pair(&self.page_param, &page.to_string());
            }
        }
        url.to_string()
    }
}

impl Paginator for QueryParamPaginator {
    fn first_page(&self) -> Result<PageRef, PaginationError> {
        Ok(PageRef { url: self.url_for(1), number: 1 })
    }

    fn advance(&self, state: &mut CrawlState, item_count: usize) -> Result<(), PaginationError> {
        state.pages_fetched += 1;
        if item_count == 0 || state.pages_fetched >= self.max_pages {
            state.status = CrawlStatus::Exhausted;
            return Ok(());
        }
        let next = state.current.number + 1;
        state.current = PageRef { url: self.url_for(next), number: next };
        Ok(())
    }
}

pub struct HashFragmentPaginator {
    base: String,
    default_fragment: String,
    max_pages: u32,
}

impl HashFragmentPaginator {
    pub fn new(site: &SiteConfig) -> Result<Self, PaginationError> {
        Url::parse(&site.base_url)
            .map_err(|e| PaginationError::BadPageRef(format!("{}: {}", site.base_url, e)))?;
        Ok(Self {
            base: site.base_url.clone(),
            default_fragment: site
                .default_fragment
                .clone()
                .unwrap_or_else(|| "mode=gallery".to_string()),
            max_pages: site.max_pages,
        })
    }

    fn ref_for(&self, current_url: &str, page: u32) -> Result<String, PaginationError> {
        let (base, fragment) = match current_url.split_once('#') {
            Some((base, fragment)) => (base, Some(fragment)),
            None => (current_url, None),
        };
        let mut params = match fragment {
            Some(fragment) => parse_fragment(fragment)?,
            None => parse_fragment(&self.default_fragment)?,
        };
        set_page(&mut params, page);
        Ok(format!("{}#{}", base, encode_fragment(&params)))
    }
}

impl Paginator for HashFragmentPaginator {
    fn first_page(&self) -> Result<PageRef, PaginationError> {
        Ok(PageRef { url: self.ref_for(&self.base, 1)?, number: 1 })
    }

    fn advance(&self, state: &mut CrawlState, item_count: usize) -> Result<(), PaginationError> {
        state.pages_fetched += 1;
        if item_count == 0 || state.pages_fetched >= self.max_pages {
            state.status = CrawlStatus::Exhausted;
            return Ok(());
        }
        let next = state.current.number + 1;
        match self.ref_for(&state.current.url, next) {
            Ok(url) => {
                state.current = PageRef { url, number: next };
                Ok(())
            }
            Err(e) => {
                state.status = CrawlStatus::Failed;
                Err(e)
            }
        }
    }
}

/// Split `k=v&k=v` fragment text into ordered pairs. A token without `=` is
/// malformed: guessing here would silently crawl the wrong pages.
fn parse_fragment(fragment: &str) -> Result<Vec<(String, String)>, PaginationError> {
    fragment
        .split('&')
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| PaginationError::MalformedFragment(token.to_string()))
        })
        .collect()
}

fn encode_fragment(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Overwrite the `page` token in place, preserving every other parameter's
/// position and value; append it when absent.
fn set_page(params: &mut Vec<(String, String)>, page: u32) {
    for (k, v) in params.iter_mut() {
        if k == "page" {
            *v = page.to_string();
            return;
        }
    }
    params.push(("page".to_string(), page.to_string()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SiteRegistry;

    fn query_site() -> SiteConfig {
        SiteRegistry::builtin()
            .sites()
            .iter()
            .find(|s| s.name == "brico_direct")
            .cloned()
            .unwrap()
    }

    fn hash_site() -> SiteConfig {
        SiteRegistry::builtin()
            .sites()
            .iter()
            .find(|s| s.name == "remax")
            .cloned()
            .unwrap()
    }

    #[test]
    fn query_paginator_sets_and_increments_page_param() {
        let paginator = QueryParamPaginator::new(&query_site()).unwrap();
        let first = paginator.first_page().unwrap();
        assert!(first.url.ends_with("?page=1"));

        let mut state = CrawlState::new("brico_direct", first);
        paginator.advance(&mut state, 24).unwrap();
        assert_eq!(state.status, CrawlStatus::Active);
        assert_eq!(state.current.number, 2);
        assert!(state.current.url.ends_with("?page=2"));
    }

    #[test]
    fn query_paginator_preserves_unrelated_query_params() {
        let mut site = query_site();
        site.base_url = "https://brico-direct.tn/search?q=ciment&sort=asc".to_string();
        let paginator = QueryParamPaginator::new(&site).unwrap();
        let first = paginator.first_page().unwrap();
        let url = Url::parse(&first.url).unwrap();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("q".to_string(), "ciment".to_string())));
        assert!(pairs.contains(&("sort".to_string(), "asc".to_string())));
        assert!(pairs.contains(&("page".to_string(), "1".to_string())));
    }

    #[test]
    fn exhausts_on_zero_items() {
        let paginator = QueryParamPaginator::new(&query_site()).unwrap();
        let mut state = CrawlState::new("brico_direct", paginator.first_page().unwrap());
        paginator.advance(&mut state, 0).unwrap();
        assert_eq!(state.status, CrawlStatus::Exhausted);
    }

    #[test]
    fn exhausts_at_max_pages() {
        let mut site = query_site();
        site.max_pages = 2;
        let paginator = QueryParamPaginator::new(&site).unwrap();
        let mut state = CrawlState::new("brico_direct", paginator.first_page().unwrap());
        paginator.advance(&mut state, 10).unwrap();
        assert_eq!(state.status, CrawlStatus::Active);
        paginator.advance(&mut state, 10).unwrap();
        assert_eq!(state.status, CrawlStatus::Exhausted);
        assert_eq!(state.pages_fetched, 2);
    }

    #[test]
    fn hash_paginator_synthesizes_default_fragment() {
        let paginator = HashFragmentPaginator::new(&hash_site()).unwrap();
        let first = paginator.first_page().unwrap();
        assert_eq!(
            first.url,
            "https://www.remax.com.tn/PublicListingList.aspx#mode=gallery&tt=261&cur=TND&sb=MostRecent&sc=1048&page=1"
        );
    }

    #[test]
    fn hash_paginator_preserves_unrelated_fragment_params() {
        let paginator = HashFragmentPaginator::new(&hash_site()).unwrap();
        let current = PageRef {
            url: "https://www.remax.com.tn/PublicListingList.aspx#mode=gallery&tt=261&cur=TND&page=2&sc=1048"
                .to_string(),
            number: 2,
        };
        let mut state = CrawlState::new("remax", current);
        paginator.advance(&mut state, 12).unwrap();
        assert_eq!(state.current.number, 3);
        let fragment = state.current.url.split_once('#').unwrap().1;
        let params = parse_fragment(fragment).unwrap();
        assert!(params.contains(&("page".to_string(), "3".to_string())));
        assert!(params.contains(&("tt".to_string(), "261".to_string())));
        assert!(params.contains(&("cur".to_string(), "TND".to_string())));
        assert!(params.contains(&("sc".to_string(), "1048".to_string())));
    }

    #[test]
    fn fragment_codec_round_trips_values() {
        let fragment = "mode=gallery&tt=261&cur=TND&sb=MostRecent&page=3&sc=1048";
        let params = parse_fragment(fragment).unwrap();
        let encoded = encode_fragment(&params);
        assert_eq!(parse_fragment(&encoded).unwrap(), params);
    }

    #[test]
    fn malformed_fragment_fails_the_site() {
        let paginator = HashFragmentPaginator::new(&hash_site()).unwrap();
        let current = PageRef {
            url: "https://www.remax.com.tn/PublicListingList.aspx#gallerynoequals&page=1".to_string(),
            number: 1,
        };
        let mut state = CrawlState::new("remax", current);
        let err = paginator.advance(&mut state, 5);
        assert!(err.is_err());
        assert_eq!(state.status, CrawlStatus::Failed);
    }
}
