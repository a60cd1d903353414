//! Raw price text to a decimal TND amount.

use tracing::debug;

/// Magnitude above which a price from a minor-unit site is assumed to be
/// quoted in millimes and divided by 100. This is an approximation with no
/// ground truth: a legitimately expensive item on such a site gets scaled
/// down too. Keep it configurable, never silent.
pub const MINOR_UNIT_THRESHOLD: f64 = 1000.0;

#[derive(Clone, Debug)]
pub struct PriceParser {
    pub minor_unit_correction: bool,
    pub threshold: f64,
}

impl Default for PriceParser {
    fn default() -> Self {
        Self { minor_unit_correction: true, threshold: MINOR_UNIT_THRESHOLD }
    }
}

impl PriceParser {
    pub fn new(minor_unit_correction: bool, threshold: f64) -> Self {
        Self { minor_unit_correction, threshold }
    }

    /// Parse raw price text. `minor_unit_site` marks listings from a site
    /// flagged as quoting millimes; the correction only ever applies there.
    ///
    /// Separator handling: with both `.` and `,` present, whichever occurs
    /// last is the decimal separator and the other is a thousands mark
    /// (`1.234,56` and `1,234.56` both parse to 1234.56); a lone `,` is a
    /// decimal comma.
    pub fn parse(&self, raw: &str, minor_unit_site: bool) -> Option<f64> {
        let cleaned: String = raw
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
            .collect();
        if cleaned.is_empty() {
            return None;
        }

        let has_dot = cleaned.contains('.');
        let has_comma = cleaned.contains(',');
        let decimal_text = if has_dot && has_comma {
            if cleaned.rfind(',') > cleaned.rfind('.') {
                cleaned.replace('.', "").replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        } else if has_comma {
            cleaned.replace(',', ".")
        } else {
            cleaned
        };

        let mut amount: f64 = decimal_text.parse().ok()?;
        if !amount.is_finite() || amount < 0.0 {
            return None;
        }
        if minor_unit_site && self.minor_unit_correction && amount > self.threshold {
            let corrected = amount / 100.0;
            debug!(raw, amount, corrected, "minor-unit correction applied");
            amount = corrected;
        }
        Some((amount * 100.0).round() / 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> PriceParser {
        PriceParser::default()
    }

    #[test]
    fn european_thousands_format() {
        assert_eq!(parser().parse("1.234,56 DT", false), Some(1234.56));
    }

    #[test]
    fn decimal_comma_only() {
        assert_eq!(parser().parse("1234,56", false), Some(1234.56));
    }

    #[test]
    fn english_thousands_format() {
        assert_eq!(parser().parse("1,234.56 TND", false), Some(1234.56));
    }

    #[test]
    fn currency_noise_is_stripped() {
        assert_eq!(parser().parse("Prix : 249 TND", false), Some(249.0));
        assert_eq!(parser().parse("850 DT / m²", false), Some(850.0));
    }

    #[test]
    fn minor_unit_heuristic_divides_above_threshold() {
        assert_eq!(parser().parse("71990", true), Some(719.90));
    }

    #[test]
    fn minor_unit_heuristic_ignores_non_flagged_sites() {
        assert_eq!(parser().parse("71990", false), Some(71990.0));
    }

    #[test]
    fn minor_unit_heuristic_disabled_keeps_magnitude() {
        let parser = PriceParser::new(false, MINOR_UNIT_THRESHOLD);
        assert_eq!(parser.parse("71990", true), Some(71990.0));
    }

    #[test]
    fn at_threshold_is_not_corrected() {
        assert_eq!(parser().parse("1000", true), Some(1000.0));
    }

    #[test]
    fn garbage_is_unparseable() {
        assert_eq!(parser().parse("sur demande", false), None);
        assert_eq!(parser().parse("", false), None);
        assert_eq!(parser().parse("1.2.3.4", false), None);
    }
}
