//! Raw extracted text to typed records.
//!
//! Normalization is pure: given the same extracted fields and context
//! (including the caller-supplied timestamp) it produces byte-identical
//! records, so re-running over a captured snapshot is reproducible.

pub mod category;
pub mod price;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use crate::config::NormalizeConfig;
use crate::pipeline::dedup::DropReason;
use crate::pipeline::extract::ExtractedFields;
use crate::pipeline::utils::normalize_title;
use crate::registry::{FieldName, SiteConfig};
use self::price::PriceParser;

pub const CURRENCY_TND: &str = "TND";

/// One listing, fully typed. Numeric fields serialize as plain JSON
/// numbers so downstream consumers stay agnostic of this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub id: String,
    pub title: String,
    pub price_amount: f64,
    pub currency: String,
    pub unit: Option<String>,
    pub category: String,
    pub location: Option<String>,
    pub region: Option<String>,
    pub area_m2: Option<f64>,
    pub rooms: Option<u32>,
    pub baths: Option<u32>,
    pub supplier: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub source_site: String,
    pub source_url: String,
    pub fetched_at: DateTime<Utc>,
}

/// Per-listing context the orchestrator owns: which site, which page, and
/// the wall-clock stamp taken at fetch time.
#[derive(Clone, Debug)]
pub struct NormalizeContext<'a> {
    pub site: &'a SiteConfig,
    pub page_url: &'a str,
    pub fetched_at: DateTime<Utc>,
}

pub struct Normalizer {
    price: PriceParser,
}

static DECIMAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:[.,]\d+)?)").unwrap());
static AREA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:[.,]\d+)?)\s*(?:m²|m2)").unwrap());
static INT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());
static SUITE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[sS]\+(\d+)").unwrap());

/// Governorate names recognized in location/title text, accented and plain.
static REGIONS: &[(&str, &str)] = &[
    ("tunis", "tunis"),
    ("ariana", "ariana"),
    ("ben arous", "ben-arous"),
    ("manouba", "manouba"),
    ("nabeul", "nabeul"),
    ("hammamet", "nabeul"),
    ("bizerte", "bizerte"),
    ("sousse", "sousse"),
    ("monastir", "monastir"),
    ("mahdia", "mahdia"),
    ("sfax", "sfax"),
    ("kairouan", "kairouan"),
    ("gabès", "gabes"),
    ("gabes", "gabes"),
    ("djerba", "medenine"),
    ("médenine", "medenine"),
    ("medenine", "medenine"),
    ("tozeur", "tozeur"),
    ("gafsa", "gafsa"),
    ("tataouine", "tataouine"),
];

impl Normalizer {
    pub fn new(config: &NormalizeConfig) -> Self {
        Self {
            price: PriceParser::new(config.minor_unit_correction, config.minor_unit_threshold),
        }
    }

    pub fn normalize(
        &self,
        fields: &ExtractedFields,
        ctx: &NormalizeContext<'_>,
    ) -> Result<NormalizedRecord, DropReason> {
        let title = match fields.raw(FieldName::Title) {
            Some(t) if !t.trim().is_empty() => t.trim().to_string(),
            _ => return Err(DropReason::MissingTitle),
        };
        let raw_price = fields.raw(FieldName::Price).ok_or(DropReason::MissingPrice)?;
        let price_amount = self
            .price
            .parse(raw_price, ctx.site.minor_unit_prices)
            .ok_or(DropReason::PriceParse)?;

        let description = fields.raw(FieldName::Description).map(str::to_string);
        let property_type = fields.raw(FieldName::PropertyType);
        let classify_extra = match (property_type, description.as_deref()) {
            (Some(t), Some(d)) => Some(format!("{} {}", t, d)),
            (Some(t), None) => Some(t.to_string()),
            (None, Some(d)) => Some(d.to_string()),
            (None, None) => None,
        };
        let category = category::classify(&title, classify_extra.as_deref()).to_string();

        let unit = if category == "immobilier" {
            None
        } else {
            let unit_text = fields.raw(FieldName::Unit).unwrap_or(&title);
            Some(category::detect_unit(unit_text).to_string())
        };

        let location = fields
            .raw(FieldName::Location)
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty());
        let region = detect_region(location.as_deref(), &title);

        let area_m2 = self.extract_area(fields, &title);
        let rooms = extract_count(fields.raw(FieldName::Rooms))
            .or_else(|| SUITE_RE.captures(&title).and_then(|c| c[1].parse().ok()));
        let baths = extract_count(fields.raw(FieldName::Baths));

        // base_url is validated at registry load
        let base = Url::parse(&ctx.site.base_url).ok();
        let image_url = fields
            .raw(FieldName::Image)
            .and_then(|raw| resolve_url(base.as_ref(), raw));
        let source_url = fields
            .raw(FieldName::Link)
            .and_then(|raw| resolve_url(base.as_ref(), raw))
            .unwrap_or_else(|| ctx.page_url.to_string());

        let supplier = fields.raw(FieldName::Supplier).map(str::to_string);

        let id = record_id(&ctx.site.name, &title, price_amount);

        Ok(NormalizedRecord {
            id,
            title,
            price_amount,
            currency: CURRENCY_TND.to_string(),
            unit,
            category,
            location,
            region,
            area_m2,
            rooms,
            baths,
            supplier,
            description,
            image_url,
            source_site: ctx.site.name.clone(),
            source_url,
            fetched_at: ctx.fetched_at,
        })
    }

    fn extract_area(&self, fields: &ExtractedFields, title: &str) -> Option<f64> {
        if let Some(raw) = fields.raw(FieldName::Area) {
            if let Some(captures) = DECIMAL_RE.captures(raw) {
                return parse_decimal(&captures[1]);
            }
        }
        AREA_RE
            .captures(title)
            .and_then(|captures| parse_decimal(&captures[1]))
    }
}

/// Stable within a run: same site, normalized title and price always hash
/// to the same id, which doubles as the uniqueness key.
fn record_id(site: &str, title: &str, price_amount: f64) -> String {
    let centimes = (price_amount * 100.0).round() as u64;
    let mut hasher = Sha256::new();
    hasher.update(site.as_bytes());
    hasher.update(b"|");
    hasher.update(normalize_title(title).as_bytes());
    hasher.update(b"|");
    hasher.update(centimes.to_string().as_bytes());
    hex::encode(hasher.finalize())[..16].to_string()
}

fn parse_decimal(raw: &str) -> Option<f64> {
    raw.replace(',', ".").parse().ok()
}

fn extract_count(raw: Option<&str>) -> Option<u32> {
    INT_RE.find(raw?).and_then(|m| m.as_str().parse().ok())
}

fn detect_region(location: Option<&str>, title: &str) -> Option<String> {
    let mut haystack = title.to_lowercase();
    if let Some(location) = location {
        haystack.push(' ');
        haystack.push_str(&location.to_lowercase());
    }
    REGIONS
        .iter()
        .find(|(needle, _)| haystack.contains(needle))
        .map(|(_, slug)| slug.to_string())
}

fn resolve_url(base: Option<&Url>, raw: &str) -> Option<String> {
    if let Ok(absolute) = Url::parse(raw) {
        return Some(absolute.to_string());
    }
    base?.join(raw).ok().map(|u| u.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extract::{ExtractedField, ExtractedFields};
    use crate::registry::SiteRegistry;
    use chrono::TimeZone;

    fn site(name: &str) -> SiteConfig {
        SiteRegistry::builtin()
            .sites()
            .iter()
            .find(|s| s.name == name)
            .cloned()
            .unwrap()
    }

    fn fields_with(pairs: &[(FieldName, &str)]) -> ExtractedFields {
        let mut fields = ExtractedFields::default();
        for (name, raw) in pairs {
            fields.insert(*name, ExtractedField { raw: raw.to_string(), selector_index: 0 });
        }
        fields
    }

    fn context<'a>(site: &'a SiteConfig) -> NormalizeContext<'a> {
        NormalizeContext {
            site,
            page_url: "https://example.tn/listings?page=1",
            fetched_at: Utc.with_ymd_and_hms(2025, 6, 11, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn normalizes_a_material_listing() {
        let site = site("brico_direct");
        let fields = fields_with(&[
            (FieldName::Title, "Ciment Portland en sac 50kg"),
            (FieldName::Price, "24,900"),
            (FieldName::Image, "/img/ciment.jpg"),
        ]);
        let record = Normalizer::new(&Default::default())
            .normalize(&fields, &context(&site))
            .unwrap();
        assert_eq!(record.category, "ciment-beton");
        assert_eq!(record.unit.as_deref(), Some("sac"));
        assert_eq!(record.currency, "TND");
        assert_eq!(record.price_amount, 24.9);
        assert_eq!(
            record.image_url.as_deref(),
            Some("https://brico-direct.tn/img/ciment.jpg")
        );
        assert_eq!(record.source_site, "brico_direct");
    }

    #[test]
    fn normalizes_a_property_listing() {
        let site = site("remax");
        let fields = fields_with(&[
            (FieldName::Title, "Appartement S+3 à Hammamet"),
            (FieldName::Price, "450 000 DT"),
            (FieldName::Area, "165 m²"),
            (FieldName::Baths, "2 sdb"),
            (FieldName::Location, "Hammamet Nord"),
        ]);
        let record = Normalizer::new(&Default::default())
            .normalize(&fields, &context(&site))
            .unwrap();
        assert_eq!(record.category, "immobilier");
        assert_eq!(record.unit, None);
        assert_eq!(record.price_amount, 450000.0);
        assert_eq!(record.area_m2, Some(165.0));
        assert_eq!(record.rooms, Some(3));
        assert_eq!(record.baths, Some(2));
        assert_eq!(record.region.as_deref(), Some("nabeul"));
    }

    #[test]
    fn missing_title_is_rejected() {
        let site = site("brico_direct");
        let fields = fields_with(&[(FieldName::Price, "12,5")]);
        let err = Normalizer::new(&Default::default())
            .normalize(&fields, &context(&site))
            .unwrap_err();
        assert_eq!(err, DropReason::MissingTitle);
    }

    #[test]
    fn unparseable_price_is_rejected_not_fatal() {
        let site = site("brico_direct");
        let fields = fields_with(&[
            (FieldName::Title, "Peinture acrylique"),
            (FieldName::Price, "prix sur demande"),
        ]);
        let err = Normalizer::new(&Default::default())
            .normalize(&fields, &context(&site))
            .unwrap_err();
        assert_eq!(err, DropReason::PriceParse);
    }

    #[test]
    fn normalization_is_deterministic() {
        let site = site("remax");
        let fields = fields_with(&[
            (FieldName::Title, "Villa S+4 avec jardin"),
            (FieldName::Price, "890000"),
        ]);
        let normalizer = Normalizer::new(&Default::default());
        let a = normalizer.normalize(&fields, &context(&site)).unwrap();
        let b = normalizer.normalize(&fields, &context(&site)).unwrap();
        assert_eq!(a, b);
        assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
    }

    #[test]
    fn record_ids_distinguish_price_and_site() {
        let a = record_id("brico_direct", "Ciment 50kg", 24.9);
        let b = record_id("brico_direct", "Ciment 50kg", 25.9);
        let c = record_id("comaf", "Ciment 50kg", 24.9);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, record_id("brico_direct", "ciment 50KG", 24.9));
    }

    #[test]
    fn absolute_urls_pass_through_resolution() {
        let base = Url::parse("https://example.tn/shop/").unwrap();
        assert_eq!(
            resolve_url(Some(&base), "https://cdn.example.tn/a.jpg").as_deref(),
            Some("https://cdn.example.tn/a.jpg")
        );
        assert_eq!(
            resolve_url(Some(&base), "images/a.jpg").as_deref(),
            Some("https://example.tn/shop/images/a.jpg")
        );
    }
}
