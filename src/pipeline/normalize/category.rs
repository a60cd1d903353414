//! Keyword-driven category classification.
//!
//! The category set is closed: a record is always labelled with one of the
//! slugs below or `"other"`. Sets are tested in a fixed priority order and
//! the first hit wins, so overlapping keywords resolve deterministically.

/// Fallback category when no keyword set matches.
pub const OTHER_CATEGORY: &str = "other";

/// Priority-ordered keyword sets. Accented and unaccented spellings both
/// appear because the source sites mix them freely.
static CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("ciment-beton", &[
        "ciment", "béton", "beton", "mortier", "chaux", "sable", "gravier", "clinker", "agregat",
    ]),
    ("carrelage", &[
        "carrelage", "carreau", "faience", "faïence", "revetement", "revêtement", "marbre",
    ]),
    ("peinture", &[
        "peinture", "enduit", "vernis", "pinceau", "rouleau", "brosse",
    ]),
    ("isolation", &[
        "isolation", "isolant", "laine de roche", "polystyrene", "polystyrène", "etancheite",
        "étanchéité",
    ]),
    ("plomberie", &[
        "tuyau", "robinet", "pvc", "raccord", "plomberie", "sanitaire",
    ]),
    ("electricite", &[
        "câble", "cable", "fil electrique", "fil électrique", "electrique", "électrique", "prise",
        "disjoncteur", "interrupteur",
    ]),
    ("menuiserie-bois", &[
        "bois", "porte", "fenetre", "fenêtre", "menuiserie", "planche", "contreplaque",
        "contreplaqué",
    ]),
    ("fer-metallurgie", &[
        "fer", "acier", "rond a beton", "ferraillage", "treillis", "tole", "tôle",
    ]),
    ("toiture", &[
        "tuile", "toiture", "zinc", "gouttiere", "gouttière", "charpente",
    ]),
    ("outillage", &[
        "outil", "marteau", "perceuse", "scie", "tournevis", "truelle", "niveau", "taloche",
        "spatule", "pince", "echelle", "escabeau",
    ]),
    ("quincaillerie", &[
        "vis", "clou", "boulon", "ecrou", "écrou", "rondelle", "cheville", "silicone", "mastic",
        "seau",
    ]),
    ("immobilier", &[
        "appartement", "villa", "maison", "studio", "duplex", "terrain", "bureau",
        "local commercial", "s+1", "s+2", "s+3", "s+4", "à vendre", "a vendre", "à louer",
        "a louer",
    ]),
];

/// Classify a listing from its title and optional descriptive text.
pub fn classify(title: &str, extra: Option<&str>) -> &'static str {
    let mut text = title.to_lowercase();
    if let Some(extra) = extra {
        text.push(' ');
        text.push_str(&extra.to_lowercase());
    }
    for (slug, keywords) in CATEGORY_KEYWORDS {
        if keywords.iter().any(|k| text.contains(k)) {
            return slug;
        }
    }
    OTHER_CATEGORY
}

/// Every category slug the classifier can emit, `"other"` included.
pub fn known_categories() -> Vec<&'static str> {
    CATEGORY_KEYWORDS
        .iter()
        .map(|(slug, _)| *slug)
        .chain(std::iter::once(OTHER_CATEGORY))
        .collect()
}

/// Sale-unit detection for material listings. Defaults to per-piece.
pub fn detect_unit(text: &str) -> &'static str {
    let text = text.to_lowercase();
    const UNITS: &[(&str, &str)] = &[
        ("sac", "sac"),
        ("m²", "m2"),
        ("m2", "m2"),
        ("ml", "ml"),
        ("kg", "kg"),
        ("litre", "litre"),
        ("rouleau", "rouleau"),
        ("botte", "botte"),
    ];
    for (needle, unit) in UNITS {
        if text.contains(needle) {
            return unit;
        }
    }
    "piece"
}
