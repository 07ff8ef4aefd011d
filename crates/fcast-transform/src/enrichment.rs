//! Detection of external data joins that would help a forecast.
//!
//! Purely informational: suggestions never alter the data.

use std::sync::LazyLock;

use fcast_model::EnrichmentSuggestion;
use regex::Regex;

/// One kind of external dataset and the column signals that call for it.
#[derive(Debug, Clone)]
pub struct EnrichmentRule {
    pub title: &'static str,
    pub description: &'static str,
    pub benefit: &'static str,
    /// Every pattern must match at least one normalized column name.
    pub patterns: Vec<Regex>,
}

impl EnrichmentRule {
    fn applies_to(&self, columns: &[String]) -> bool {
        self.patterns
            .iter()
            .all(|pattern| columns.iter().any(|column| pattern.is_match(column)))
    }

    fn suggestion(&self) -> EnrichmentSuggestion {
        EnrichmentSuggestion {
            title: self.title.to_string(),
            description: self.description.to_string(),
            benefit: self.benefit.to_string(),
        }
    }
}

const DATE_SIGNAL: &str = r"(^|_)(date|day|week|month|period|timestamp|datetime|ds)(_|$)";
const DEMAND_SIGNAL: &str = r"(^|_)(sales|sold|qty|quantity|units|demand|orders|volume)(_|$)";
const PLACE_SIGNAL: &str =
    r"(^|_)(store|location|city|region|site|warehouse|zip|postcode|postal|country|state)(_|$)";
const MONEY_SIGNAL: &str = r"(^|_)(price|cost|revenue|amount|spend|margin)(_|$)";

fn rule(
    title: &'static str,
    description: &'static str,
    benefit: &'static str,
    patterns: &[&str],
) -> EnrichmentRule {
    EnrichmentRule {
        title,
        description,
        benefit,
        // Patterns are fixed literals above; a bad one is caught by the tests.
        patterns: patterns.iter().filter_map(|p| Regex::new(p).ok()).collect(),
    }
}

static ENRICHMENT_RULES: LazyLock<Vec<EnrichmentRule>> = LazyLock::new(|| {
    vec![
        rule(
            "Holiday Calendar",
            "Dated demand data can be joined with public and school holiday calendars.",
            "Explains demand spikes and dips around holidays.",
            &[DATE_SIGNAL, DEMAND_SIGNAL],
        ),
        rule(
            "Weather Data",
            "Location-level observations can be joined with historical weather by date and place.",
            "Captures temperature and precipitation effects on demand.",
            &[DATE_SIGNAL, PLACE_SIGNAL],
        ),
        rule(
            "Macroeconomic Indicators",
            "Price or revenue series can be joined with inflation and consumer confidence indices.",
            "Adjusts long-range forecasts for economic conditions.",
            &[DATE_SIGNAL, MONEY_SIGNAL],
        ),
    ]
});

/// The built-in enrichment table.
pub fn enrichment_rules() -> &'static [EnrichmentRule] {
    &ENRICHMENT_RULES
}

/// Suggestions for a set of `snake_case` column names.
pub fn detect_enrichment(columns: &[String]) -> Vec<EnrichmentSuggestion> {
    enrichment_rules()
        .iter()
        .filter(|rule| rule.applies_to(columns))
        .map(EnrichmentRule::suggestion)
        .collect()
}
