//! Per-site crawl descriptors.
//!
//! A [`SiteConfig`] is an immutable, declarative description of one target
//! site: where listings live, how pages advance, and which selector chains
//! extract each field. Selector order is a priority contract: the most
//! specific/reliable selector for a site is listed first.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::common::error::{Result, ScraperError};

/// Fields a site can surface for one listing. `title` and `price` are
/// mandatory in every site's selector map; the rest are optional.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    Title,
    Price,
    Location,
    Area,
    Rooms,
    Baths,
    PropertyType,
    Description,
    Image,
    Link,
    Supplier,
    Unit,
}

impl FieldName {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::Title => "title",
            FieldName::Price => "price",
            FieldName::Location => "location",
            FieldName::Area => "area",
            FieldName::Rooms => "rooms",
            FieldName::Baths => "baths",
            FieldName::PropertyType => "property_type",
            FieldName::Description => "description",
            FieldName::Image => "image",
            FieldName::Link => "link",
            FieldName::Supplier => "supplier",
            FieldName::Unit => "unit",
        }
    }
}

/// One rule in a field's fallback chain. Most selectors read the element's
/// text; `attr` switches extraction to an attribute value (image `src`,
/// link `href`, `data-*` counters).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SelectorSpecDe")]
pub struct SelectorSpec {
    pub css: String,
    pub attr: Option<String>,
}

impl SelectorSpec {
    pub fn css(css: &str) -> Self {
        Self { css: css.to_string(), attr: None }
    }

    pub fn attr(css: &str, attr: &str) -> Self {
        Self { css: css.to_string(), attr: Some(attr.to_string()) }
    }
}

/// TOML ergonomics: a chain entry is either a bare CSS string or a table
/// with `css` and `attr` keys.
#[derive(Deserialize)]
#[serde(untagged)]
enum SelectorSpecDe {
    Css(String),
    Full { css: String, #[serde(default)] attr: Option<String> },
}

impl From<SelectorSpecDe> for SelectorSpec {
    fn from(de: SelectorSpecDe) -> Self {
        match de {
            SelectorSpecDe::Css(css) => SelectorSpec { css, attr: None },
            SelectorSpecDe::Full { css, attr } => SelectorSpec { css, attr },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationKind {
    /// Page number carried in a query parameter (`?page=2`).
    Query,
    /// Page number carried in the URL fragment (`#mode=gallery&page=2`).
    Hash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// Headless Chromium; required for sites that render listings client-side.
    #[default]
    Browser,
    /// Plain HTTP GET; enough for server-rendered catalogues.
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub name: String,
    pub base_url: String,
    pub pagination: PaginationKind,
    pub max_pages: u32,
    #[serde(default)]
    pub fetch_mode: FetchMode,
    /// Query parameter carrying the page number (query pagination only).
    #[serde(default = "default_page_param")]
    pub page_param: String,
    /// Fragment synthesized when a hash-paginated URL has none yet.
    /// `page` is inserted/overwritten by the paginator.
    #[serde(default)]
    pub default_fragment: Option<String>,
    /// Site quotes prices in millimes; enables the minor-unit correction.
    #[serde(default)]
    pub minor_unit_prices: bool,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub item_selectors: Vec<SelectorSpec>,
    pub fields: BTreeMap<FieldName, Vec<SelectorSpec>>,
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct SitesFile {
    sites: Vec<SiteConfig>,
}

#[derive(Debug, Clone)]
pub struct SiteRegistry {
    sites: Vec<SiteConfig>,
}

impl SiteRegistry {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            ScraperError::Config(format!("failed to read sites file '{}': {}", path.display(), e))
        })?;
        let parsed: SitesFile = toml::from_str(&raw)?;
        let registry = Self { sites: parsed.sites };
        registry.validate()?;
        Ok(registry)
    }

    /// The embedded site table, used when no sites file is given.
    pub fn builtin() -> Self {
        let registry = Self { sites: builtin_sites() };
        debug_assert!(registry.validate().is_ok());
        registry
    }

    pub fn sites(&self) -> &[SiteConfig] {
        &self.sites
    }

    /// Enabled sites, optionally filtered by name.
    pub fn select(&self, names: Option<&[String]>) -> Vec<SiteConfig> {
        self.sites
            .iter()
            .filter(|s| s.enabled)
            .filter(|s| match names {
                Some(wanted) => wanted.iter().any(|n| n == &s.name),
                None => true,
            })
            .cloned()
            .collect()
    }

    fn validate(&self) -> Result<()> {
        for site in &self.sites {
            validate_site(site)?;
        }
        Ok(())
    }
}

fn validate_site(site: &SiteConfig) -> Result<()> {
    if site.max_pages == 0 {
        return Err(ScraperError::Config(format!(
            "site '{}': max_pages must be greater than zero",
            site.name
        )));
    }
    url::Url::parse(&site.base_url).map_err(|e| {
        ScraperError::Config(format!("site '{}': invalid base_url: {}", site.name, e))
    })?;
    if site.item_selectors.is_empty() {
        return Err(ScraperError::Config(format!(
            "site '{}': item_selectors must not be empty",
            site.name
        )));
    }
    for mandatory in [FieldName::Title, FieldName::Price] {
        if site.fields.get(&mandatory).map_or(true, |chain| chain.is_empty()) {
            return Err(ScraperError::Config(format!(
                "site '{}': missing selector chain for mandatory field '{}'",
                site.name,
                mandatory.as_str()
            )));
        }
    }
    let all_specs = site
        .item_selectors
        .iter()
        .chain(site.fields.values().flatten());
    for spec in all_specs {
        if scraper::Selector::parse(&spec.css).is_err() {
            return Err(ScraperError::Config(format!(
                "site '{}': unparseable CSS selector '{}'",
                site.name, spec.css
            )));
        }
    }
    Ok(())
}

/// Default targets, carried over from the shipped site table: four
/// construction-material shops (query pagination) and a real-estate portal
/// whose listing grid paginates through the URL fragment.
fn builtin_sites() -> Vec<SiteConfig> {
    vec![
        SiteConfig {
            name: "brico_direct".to_string(),
            base_url: "https://brico-direct.tn/construction-et-gros-oeuvre/".to_string(),
            pagination: PaginationKind::Query,
            max_pages: 8,
            fetch_mode: FetchMode::Http,
            page_param: "page".to_string(),
            default_fragment: None,
            // brico-direct quotes prices in millimes
            minor_unit_prices: true,
            enabled: true,
            item_selectors: vec![
                SelectorSpec::css(".product-container"),
                SelectorSpec::css(".ajax_block_product"),
            ],
            fields: BTreeMap::from([
                (FieldName::Title, vec![
                    SelectorSpec::css("h5 a"),
                    SelectorSpec::css(".product-title"),
                ]),
                (FieldName::Price, vec![
                    SelectorSpec::css("span[itemprop=\"price\"]"),
                    SelectorSpec::css(".price"),
                ]),
                (FieldName::Description, vec![
                    SelectorSpec::css(".product-desc"),
                ]),
                (FieldName::Image, vec![
                    SelectorSpec::attr(".product-image img", "src"),
                ]),
                (FieldName::Link, vec![
                    SelectorSpec::attr("h5 a", "href"),
                ]),
            ]),
        },
        SiteConfig {
            name: "comaf".to_string(),
            base_url: "https://comaf.tn/categorie/materiaux-construction/".to_string(),
            pagination: PaginationKind::Query,
            max_pages: 5,
            fetch_mode: FetchMode::Browser,
            page_param: "page".to_string(),
            default_fragment: None,
            minor_unit_prices: false,
            enabled: true,
            item_selectors: vec![
                SelectorSpec::css(".product-item"),
                SelectorSpec::css(".product"),
            ],
            fields: BTreeMap::from([
                (FieldName::Title, vec![
                    SelectorSpec::css(".product-title"),
                    SelectorSpec::css("h3"),
                    SelectorSpec::css("h4"),
                ]),
                (FieldName::Price, vec![
                    SelectorSpec::css(".price"),
                    SelectorSpec::css(".prix"),
                    SelectorSpec::css("[class*=\"price\"]"),
                ]),
                (FieldName::Image, vec![
                    SelectorSpec::attr(".product-img img", "src"),
                    SelectorSpec::attr(".image img", "src"),
                ]),
            ]),
        },
        SiteConfig {
            name: "sabra".to_string(),
            base_url: "https://sabradecommerce.com/construction/".to_string(),
            pagination: PaginationKind::Query,
            max_pages: 3,
            fetch_mode: FetchMode::Browser,
            page_param: "page".to_string(),
            default_fragment: None,
            minor_unit_prices: false,
            enabled: true,
            item_selectors: vec![
                SelectorSpec::css(".product"),
                SelectorSpec::css(".product-item"),
            ],
            fields: BTreeMap::from([
                (FieldName::Title, vec![
                    SelectorSpec::css(".product-name"),
                    SelectorSpec::css(".titre"),
                    SelectorSpec::css("h3"),
                ]),
                (FieldName::Price, vec![
                    SelectorSpec::css(".price"),
                    SelectorSpec::css(".prix"),
                    SelectorSpec::css(".montant"),
                ]),
                (FieldName::Image, vec![
                    SelectorSpec::attr(".product-image img", "src"),
                ]),
            ]),
        },
        SiteConfig {
            name: "arkan".to_string(),
            base_url: "https://arkan.tn/materiaux/".to_string(),
            pagination: PaginationKind::Query,
            max_pages: 4,
            fetch_mode: FetchMode::Browser,
            page_param: "page".to_string(),
            default_fragment: None,
            minor_unit_prices: false,
            enabled: true,
            item_selectors: vec![
                SelectorSpec::css(".product-item"),
                SelectorSpec::css(".item"),
            ],
            fields: BTreeMap::from([
                (FieldName::Title, vec![
                    SelectorSpec::css(".product-title"),
                    SelectorSpec::css(".nom"),
                ]),
                (FieldName::Price, vec![
                    SelectorSpec::css(".price"),
                    SelectorSpec::css(".prix-produit"),
                ]),
                (FieldName::Image, vec![
                    SelectorSpec::attr(".produit-img img", "src"),
                ]),
            ]),
        },
        SiteConfig {
            name: "remax".to_string(),
            base_url: "https://www.remax.com.tn/PublicListingList.aspx".to_string(),
            pagination: PaginationKind::Hash,
            max_pages: 20,
            fetch_mode: FetchMode::Browser,
            page_param: "page".to_string(),
            default_fragment: Some(
                "mode=gallery&tt=261&cur=TND&sb=MostRecent&sc=1048".to_string(),
            ),
            minor_unit_prices: false,
            enabled: true,
            item_selectors: vec![
                SelectorSpec::css(".gallery-item"),
                SelectorSpec::css(".propertyListItem"),
                SelectorSpec::css(".listingGridBox"),
            ],
            fields: BTreeMap::from([
                (FieldName::Title, vec![
                    SelectorSpec::css(".gallery-title a"),
                    SelectorSpec::css(".proplist_title a"),
                    SelectorSpec::css("h3 a"),
                ]),
                (FieldName::Price, vec![
                    SelectorSpec::css(".gallery-price-main .proplist_price"),
                    SelectorSpec::css(".main-price"),
                    SelectorSpec::css(".price"),
                ]),
                (FieldName::Location, vec![
                    SelectorSpec::css(".gallery-title a"),
                    SelectorSpec::css(".location"),
                    SelectorSpec::css(".property-location"),
                ]),
                (FieldName::Area, vec![
                    SelectorSpec::attr(".gallery-icons span[data-area]", "data-area"),
                    SelectorSpec::css(".property-size"),
                    SelectorSpec::css(".surface"),
                ]),
                (FieldName::Rooms, vec![
                    SelectorSpec::attr(".gallery-icons span[data-bedrooms]", "data-bedrooms"),
                    SelectorSpec::css(".bedrooms"),
                ]),
                (FieldName::Baths, vec![
                    SelectorSpec::attr(".gallery-icons span[data-bathrooms]", "data-bathrooms"),
                    SelectorSpec::css(".bathrooms"),
                ]),
                (FieldName::PropertyType, vec![
                    SelectorSpec::css(".gallery-transtype span"),
                    SelectorSpec::css(".property-type"),
                ]),
                (FieldName::Supplier, vec![
                    SelectorSpec::css(".card-agent .popover-name a"),
                    SelectorSpec::css(".agent-name"),
                ]),
                (FieldName::Image, vec![
                    SelectorSpec::attr(".gallery-photo img", "src"),
                    SelectorSpec::attr("img.img-responsive", "src"),
                ]),
                (FieldName::Link, vec![
                    SelectorSpec::attr(".gallery-title a", "href"),
                    SelectorSpec::attr(".proplist_title a", "href"),
                ]),
            ]),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_is_valid() {
        let registry = SiteRegistry::builtin();
        assert!(registry.validate().is_ok());
        assert!(registry.sites().iter().any(|s| s.pagination == PaginationKind::Hash));
    }

    #[test]
    fn select_filters_by_name_and_enabled() {
        let mut registry = SiteRegistry::builtin();
        registry.sites[0].enabled = false;
        let disabled_name = registry.sites[0].name.clone();
        let all = registry.select(None);
        assert!(all.iter().all(|s| s.name != disabled_name));

        let names = vec!["remax".to_string()];
        let only = registry.select(Some(&names[..]));
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].name, "remax");
    }

    #[test]
    fn toml_site_parses_with_string_and_table_selectors() {
        let raw = r#"
            [[sites]]
            name = "example"
            base_url = "https://example.tn/listings/"
            pagination = "query"
            max_pages = 3
            item_selectors = [".listing"]

            [sites.fields]
            title = ["h2 a", ".titre"]
            price = [".prix"]
            image = [{ css = ".photo img", attr = "src" }]
        "#;
        let parsed: SitesFile = toml::from_str(raw).unwrap();
        let site = &parsed.sites[0];
        assert_eq!(site.fields[&FieldName::Title].len(), 2);
        assert_eq!(
            site.fields[&FieldName::Image][0],
            SelectorSpec::attr(".photo img", "src")
        );
        assert!(site.enabled);
        assert_eq!(site.page_param, "page");
        assert!(validate_site(site).is_ok());
    }

    #[test]
    fn validation_rejects_missing_price_chain() {
        let mut site = builtin_sites().remove(0);
        site.fields.remove(&FieldName::Price);
        assert!(validate_site(&site).is_err());
    }

    #[test]
    fn validation_rejects_zero_max_pages() {
        let mut site = builtin_sites().remove(0);
        site.max_pages = 0;
        assert!(validate_site(&site).is_err());
    }
}
