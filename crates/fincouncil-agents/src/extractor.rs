use std::collections::HashMap;
use std::str::FromStr;

use fincouncil_models::config::CollaborationConfig;
use fincouncil_models::conflict::ExtractedFigure;
use regex::Regex;
use rust_decimal::Decimal;

const NUMBER: &str = r"\d+(?:,\d+)*(?:\.\d+)?";

/// Pulls currency-denominated amounts out of free-form text.
///
/// A figure needs a currency marker directly before (`₹5,000`, `Rs. 5000`) or
/// after (`5 lakh rupees`) the number. Grouping commas are accepted in any
/// position, so both `1,00,000` and `100,000` read as one lakh. An optional
/// scale word from the configured table multiplies the value.
///
/// Extraction never fails: anything that does not parse cleanly is skipped.
pub struct AmountExtractor {
    pattern: Option<Regex>,
    scales: HashMap<String, Decimal>,
    noise_floor: Decimal,
}

impl AmountExtractor {
    pub fn new(config: &CollaborationConfig) -> Result<Self, regex::Error> {
        let scales: HashMap<String, Decimal> = config
            .currency_scale_table
            .iter()
            .map(|(suffix, multiplier)| (suffix.to_lowercase(), Decimal::from(*multiplier)))
            .collect();

        // Scale words may sit right against the digits (`40k`, `2lakh`).
        let scale_alt = alternation(scales.keys().map(String::as_str), false);
        let scale_group = |name: &str| match &scale_alt {
            Some(alt) => format!(r"(?:\s*(?P<{name}>{alt})\b)?"),
            None => String::new(),
        };

        let mut branches = Vec::new();
        if let Some(prefix) = alternation(config.currency_markers.prefix.iter().map(String::as_str), true) {
            branches.push(format!(
                r"(?:{prefix})\s*(?P<n1>{NUMBER}){}",
                scale_group("s1")
            ));
        }
        if let Some(suffix) = alternation(config.currency_markers.suffix.iter().map(String::as_str), true) {
            branches.push(format!(
                r"(?P<n2>\b{NUMBER}){}\s*(?:{suffix})",
                scale_group("s2")
            ));
        }

        let pattern = if branches.is_empty() {
            None
        } else {
            Some(Regex::new(&format!("(?i){}", branches.join("|")))?)
        };

        Ok(Self {
            pattern,
            scales,
            noise_floor: config.noise_floor,
        })
    }

    /// All figures in `text`, in left-to-right order. Figures are not yet attributed.
    pub fn extract(&self, text: &str) -> Vec<ExtractedFigure> {
        let Some(pattern) = &self.pattern else {
            return Vec::new();
        };

        pattern
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                if followed_by_percent(&text[whole.end()..]) {
                    return None;
                }
                let number = caps.name("n1").or_else(|| caps.name("n2"))?;
                let scale = caps.name("s1").or_else(|| caps.name("s2"));
                let amount = self.parse_amount(number.as_str(), scale.map(|m| m.as_str()))?;
                if amount < self.noise_floor {
                    return None;
                }
                Some(ExtractedFigure {
                    amount,
                    raw_span: whole.as_str().to_string(),
                    offset: whole.start(),
                    agent: None,
                })
            })
            .collect()
    }

    /// Smallest amount that counts as a figure.
    pub fn noise_floor(&self) -> Decimal {
        self.noise_floor
    }

    /// Just the amounts, for callers that do not care where they came from.
    pub fn amounts(&self, text: &str) -> Vec<Decimal> {
        self.extract(text).into_iter().map(|f| f.amount).collect()
    }

    fn parse_amount(&self, number: &str, scale: Option<&str>) -> Option<Decimal> {
        let value = Decimal::from_str(&number.replace(',', "")).ok()?;
        match scale {
            Some(suffix) => {
                let multiplier = self.scales.get(&suffix.to_lowercase())?;
                value.checked_mul(*multiplier)
            }
            None => Some(value),
        }
    }
}

/// Longest-first alternation of escaped literals. With `word_start`, alphabetic
/// literals get a leading word boundary so `Rs` does not fire inside `hours`.
fn alternation<'a>(tokens: impl Iterator<Item = &'a str>, word_start: bool) -> Option<String> {
    let mut tokens: Vec<&str> = tokens.filter(|t| !t.trim().is_empty()).collect();
    if tokens.is_empty() {
        return None;
    }
    tokens.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    tokens.dedup();
    let parts: Vec<String> = tokens
        .iter()
        .map(|t| {
            let escaped = regex::escape(t);
            if word_start && t.starts_with(|c: char| c.is_alphanumeric()) {
                format!(r"\b{escaped}")
            } else {
                escaped
            }
        })
        .collect();
    Some(parts.join("|"))
}

/// A number directly followed by a percent sign is a rate, not an amount.
fn followed_by_percent(rest: &str) -> bool {
    let rest = rest.trim_start();
    if rest.starts_with('%') {
        return true;
    }
    let lower = rest
        .chars()
        .take(8)
        .collect::<String>()
        .to_lowercase();
    lower.starts_with("percent") || lower.starts_with("per cent")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn extractor() -> AmountExtractor {
        AmountExtractor::new(&CollaborationConfig::default()).unwrap()
    }

    #[test]
    fn percent_is_not_an_amount() {
        assert!(extractor().extract("15%").is_empty());
        assert!(extractor().extract("returns of ₹12% a year").is_empty());
        assert!(extractor().extract("₹12 percent").is_empty());
    }

    #[test]
    fn symbol_with_grouping() {
        let figures = extractor().extract("₹5,000");
        assert_eq!(figures.len(), 1);
        assert_eq!(figures[0].amount, dec!(5000));
        assert_eq!(figures[0].raw_span, "₹5,000");
    }

    #[test]
    fn lakh_suffix() {
        let figures = extractor().extract("₹2 lakh");
        assert_eq!(figures.len(), 1);
        assert_eq!(figures[0].amount, dec!(200000));
    }

    #[test]
    fn indian_and_western_grouping() {
        assert_eq!(extractor().amounts("₹1,00,000 or ₹100,000"), vec![
            dec!(100000),
            dec!(100000)
        ]);
    }

    #[test]
    fn scale_words_and_suffix_markers() {
        let ex = extractor();
        assert_eq!(ex.amounts("about 2.5 lakh rupees"), vec![dec!(250000)]);
        assert_eq!(ex.amounts("Rs. 1.2 crore"), vec![dec!(12000000)]);
        assert_eq!(ex.amounts("INR 40k"), vec![dec!(40000)]);
        assert_eq!(ex.amounts("₹3 Lakhs"), vec![dec!(300000)]);
        assert_eq!(ex.amounts("5,000 INR"), vec![dec!(5000)]);
    }

    #[test]
    fn scale_word_joined_to_the_digits() {
        let ex = extractor();
        assert_eq!(ex.amounts("₹40k"), vec![dec!(40000)]);
        assert_eq!(ex.amounts("set aside ₹2lakh now"), vec![dec!(200000)]);
        assert_eq!(ex.amounts("about 5cr rupees"), vec![dec!(50000000)]);
        assert_eq!(ex.amounts("₹500 kids' fund"), vec![dec!(500)]);
    }

    #[test]
    fn below_noise_floor_is_discarded() {
        assert!(extractor().extract("page ₹12 of the report").is_empty());
        assert!(extractor().extract("₹99").is_empty());
        assert_eq!(extractor().amounts("₹100"), vec![dec!(100)]);
    }

    #[test]
    fn bare_numbers_need_a_currency_marker() {
        assert!(extractor().extract("in 2024 you saved 5000").is_empty());
        assert!(extractor().extract("worked 300 hours").is_empty());
    }

    #[test]
    fn order_matches_source() {
        let figures = extractor().extract("Clear ₹75,000 debt, save ₹25,000 and keep ₹1 lakh.");
        let amounts: Vec<Decimal> = figures.iter().map(|f| f.amount).collect();
        assert_eq!(amounts, vec![dec!(75000), dec!(25000), dec!(100000)]);
        assert!(figures.windows(2).all(|w| w[0].offset < w[1].offset));
    }

    #[test]
    fn extraction_is_pure() {
        let text = "Put ₹2 lakh in an FD, ₹50,000 in equity and 10% in gold.";
        let ex = extractor();
        assert_eq!(ex.extract(text), ex.extract(text));
    }

    #[test]
    fn malformed_input_never_panics() {
        let ex = extractor();
        for text in [
            "",
            "₹",
            "₹,,,",
            "₹99999999999999999999999999999999999 crore",
            "Rs.",
            "₹1,,000",
            "💰💰 ₹ lakh",
        ] {
            let _ = ex.extract(text);
        }
        assert!(ex.extract("₹99999999999999999999999999999999999 crore").is_empty());
    }

    #[test]
    fn custom_scale_table() {
        let mut config = CollaborationConfig::default();
        config.currency_markers.prefix = vec!["$".to_string()];
        config.currency_markers.suffix = vec![];
        config.currency_scale_table = [("grand".to_string(), 1000u64)].into_iter().collect();
        let ex = AmountExtractor::new(&config).unwrap();
        assert_eq!(ex.amounts("$5 grand, ₹9,000"), vec![dec!(5000)]);
    }

    #[test]
    fn no_markers_means_no_figures() {
        let mut config = CollaborationConfig::default();
        config.currency_markers.prefix.clear();
        config.currency_markers.suffix.clear();
        let ex = AmountExtractor::new(&config).unwrap();
        assert!(ex.extract("₹5,000").is_empty());
    }
}
