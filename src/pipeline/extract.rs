//! Selector fallback chains.
//!
//! Each field carries an ordered list of selectors; the first one that
//! yields non-empty trimmed text (or a non-empty attribute) wins, and the
//! winning index is kept for diagnostics. A chain that matches nothing is
//! not an error: the field is simply absent and the normalizer decides
//! whether the record survives.

use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;

use crate::registry::{FieldName, SelectorSpec};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedField {
    pub raw: String,
    /// Index into the field's selector chain that produced the value.
    pub selector_index: usize,
}

#[derive(Clone, Debug, Default)]
pub struct ExtractedFields {
    fields: BTreeMap<FieldName, ExtractedField>,
}

impl ExtractedFields {
    pub fn insert(&mut self, name: FieldName, field: ExtractedField) {
        self.fields.insert(name, field);
    }

    pub fn get(&self, name: FieldName) -> Option<&ExtractedField> {
        self.fields.get(&name)
    }

    pub fn raw(&self, name: FieldName) -> Option<&str> {
        self.fields.get(&name).map(|f| f.raw.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

/// Locate the listing containers on a page. The chains are tried in order
/// and the first selector that matches anything wins outright; containers
/// from different selectors are never mixed.
pub fn select_items<'a>(document: &'a Html, chains: &[SelectorSpec]) -> Vec<ElementRef<'a>> {
    for spec in chains {
        // Selectors are validated at registry load
        let Ok(selector) = Selector::parse(&spec.css) else {
            continue;
        };
        let found: Vec<ElementRef<'a>> = document.select(&selector).collect();
        if !found.is_empty() {
            return found;
        }
    }
    Vec::new()
}

/// Run one field's fallback chain against a listing container.
pub fn extract_field(item: &ElementRef, chain: &[SelectorSpec]) -> Option<ExtractedField> {
    for (index, spec) in chain.iter().enumerate() {
        let Ok(selector) = Selector::parse(&spec.css) else {
            continue;
        };
        for element in item.select(&selector) {
            let raw = match &spec.attr {
                Some(attr) => element
                    .value()
                    .attr(attr)
                    .map(|v| v.trim().to_string())
                    .unwrap_or_default(),
                None => collapse_whitespace(&element.text().collect::<String>()),
            };
            if !raw.is_empty() {
                return Some(ExtractedField { raw, selector_index: index });
            }
        }
    }
    None
}

/// Run every configured chain for one listing container.
pub fn extract_item(
    item: &ElementRef,
    fields: &BTreeMap<FieldName, Vec<SelectorSpec>>,
) -> ExtractedFields {
    let mut extracted = ExtractedFields::default();
    for (name, chain) in fields {
        if let Some(field) = extract_field(item, chain) {
            extracted.insert(*name, field);
        }
    }
    extracted
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_from(html: &str) -> (Html, Selector) {
        let document = Html::parse_fragment(html);
        let selector = Selector::parse(".listing").unwrap();
        (document, selector)
    }

    #[test]
    fn first_matching_selector_wins_and_reports_its_index() {
        let (document, selector) = item_from(
            r#"<div class="listing">
                <span class="fallback-title">Ciment Portland 50kg</span>
            </div>"#,
        );
        let item = document.select(&selector).next().unwrap();
        let chain = vec![
            SelectorSpec::css(".primary-title"),
            SelectorSpec::css(".fallback-title"),
        ];
        let field = extract_field(&item, &chain).unwrap();
        assert_eq!(field.raw, "Ciment Portland 50kg");
        assert_eq!(field.selector_index, 1);
    }

    #[test]
    fn earlier_selector_with_empty_text_is_skipped() {
        let (document, selector) = item_from(
            r#"<div class="listing">
                <span class="primary-title">   </span>
                <span class="fallback-title">Carrelage 60x60</span>
            </div>"#,
        );
        let item = document.select(&selector).next().unwrap();
        let chain = vec![
            SelectorSpec::css(".primary-title"),
            SelectorSpec::css(".fallback-title"),
        ];
        let field = extract_field(&item, &chain).unwrap();
        assert_eq!(field.raw, "Carrelage 60x60");
        assert_eq!(field.selector_index, 1);
    }

    #[test]
    fn exhausted_chain_yields_absent_not_error() {
        let (document, selector) = item_from(r#"<div class="listing"><p>rien</p></div>"#);
        let item = document.select(&selector).next().unwrap();
        let chain = vec![SelectorSpec::css(".title"), SelectorSpec::css("h5 a")];
        assert!(extract_field(&item, &chain).is_none());
    }

    #[test]
    fn attribute_selector_reads_the_attribute() {
        let (document, selector) = item_from(
            r#"<div class="listing">
                <img class="photo" src="/img/produit-42.jpg" alt="">
                <span data-area="120">icon</span>
            </div>"#,
        );
        let item = document.select(&selector).next().unwrap();
        let image = extract_field(&item, &[SelectorSpec::attr(".photo", "src")]).unwrap();
        assert_eq!(image.raw, "/img/produit-42.jpg");
        let area = extract_field(&item, &[SelectorSpec::attr("span[data-area]", "data-area")]).unwrap();
        assert_eq!(area.raw, "120");
    }

    #[test]
    fn multiline_text_is_collapsed() {
        let (document, selector) = item_from(
            "<div class=\"listing\"><h3>\n  Villa  S+4\n  Hammamet\n</h3></div>",
        );
        let item = document.select(&selector).next().unwrap();
        let field = extract_field(&item, &[SelectorSpec::css("h3")]).unwrap();
        assert_eq!(field.raw, "Villa S+4 Hammamet");
    }

    #[test]
    fn item_chains_never_mix_selectors() {
        let document = Html::parse_fragment(
            r#"<div>
                <div class="gallery-item">a</div>
                <div class="gallery-item">b</div>
                <div class="propertyListItem">c</div>
            </div>"#,
        );
        let chains = vec![
            SelectorSpec::css(".gallery-item"),
            SelectorSpec::css(".propertyListItem"),
        ];
        let items = select_items(&document, &chains);
        assert_eq!(items.len(), 2);
    }
}
