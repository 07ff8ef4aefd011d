//! Schema inference engine implementation.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use fcast_model::{CanonicalRole, ColumnMapping, MatchMethod, SchemaReport};
use rapidfuzz::distance::indel::normalized_similarity as indel_similarity;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::rules::{SchemaRules, default_rules};
use crate::utils::normalize_column_name;

const EXACT_CONFIDENCE: f64 = 100.0;
const SYNONYM_CONFIDENCE: f64 = 90.0;

/// Tunable thresholds for schema inference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Fuzzy matches must score strictly above this similarity (0.0-1.0).
    pub fuzzy_threshold: f64,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.8,
        }
    }
}

/// Normalized names a role answers to.
struct RolePatterns {
    role: CanonicalRole,
    exact: Vec<String>,
    synonyms: Vec<String>,
}

impl RolePatterns {
    fn fuzzy_score(&self, name: &str) -> f64 {
        self.exact
            .iter()
            .chain(&self.synonyms)
            .map(|pattern| indel_similarity(name.chars(), pattern.chars()))
            .fold(0.0, f64::max)
    }
}

struct Candidate {
    role_idx: usize,
    col_idx: usize,
    score: f64,
}

struct Assignment {
    col_idx: usize,
    confidence: f64,
    method: MatchMethod,
}

/// Engine for mapping input column names to canonical roles.
///
/// Matching runs in three tiers across all roles: every role tries an exact
/// match before any role tries a synonym, and synonyms before fuzzy
/// similarity. A column is consumed by the first role that claims it.
///
/// # Example
///
/// ```
/// use fcast_map::SchemaEngine;
///
/// let report = SchemaEngine::new().analyze(&["timestamp", "sku", "sold"]);
/// assert_eq!(report.overall_confidence, 90.0);
/// ```
pub struct SchemaEngine {
    rules: SchemaRules,
    config: SchemaConfig,
    patterns: Vec<RolePatterns>,
}

static DEFAULT_ENGINE: LazyLock<SchemaEngine> = LazyLock::new(SchemaEngine::new);

/// Analyze column names with the built-in rule tables.
pub fn analyze_columns<S: AsRef<str>>(columns: &[S]) -> SchemaReport {
    DEFAULT_ENGINE.analyze(columns)
}

impl Default for SchemaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaEngine {
    pub fn new() -> Self {
        Self::with_rules(default_rules().clone())
    }

    pub fn with_rules(rules: SchemaRules) -> Self {
        let patterns = rules
            .roles
            .iter()
            .map(|rule| {
                let mut exact: Vec<String> = [rule.role.canonical_name(), rule.role.frame_column()]
                    .iter()
                    .map(|name| normalize_column_name(name))
                    .collect();
                exact.dedup();
                let synonyms = rule
                    .synonyms
                    .iter()
                    .map(|name| normalize_column_name(name))
                    .filter(|name| !name.is_empty())
                    .collect();
                RolePatterns {
                    role: rule.role,
                    exact,
                    synonyms,
                }
            })
            .collect();
        Self {
            rules,
            config: SchemaConfig::default(),
            patterns,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: SchemaConfig) -> Self {
        self.config = config;
        self
    }

    pub fn rules(&self) -> &SchemaRules {
        &self.rules
    }

    pub fn config(&self) -> &SchemaConfig {
        &self.config
    }

    /// Map `columns` onto canonical roles. Never fails: columns that match
    /// nothing are listed as unmapped and lower the confidence.
    pub fn analyze<S: AsRef<str>>(&self, columns: &[S]) -> SchemaReport {
        let normalized: Vec<String> = columns
            .iter()
            .map(|column| normalize_column_name(column.as_ref()))
            .collect();
        let mut used = vec![false; columns.len()];
        let mut assigned: BTreeMap<usize, Assignment> = BTreeMap::new();

        for (role_idx, patterns) in self.patterns.iter().enumerate() {
            let hit = first_unused(&normalized, &used, |name| patterns.exact.iter().any(|p| p == name));
            if let Some(col_idx) = hit {
                used[col_idx] = true;
                assigned.insert(
                    role_idx,
                    Assignment {
                        col_idx,
                        confidence: EXACT_CONFIDENCE,
                        method: MatchMethod::Exact,
                    },
                );
            }
        }

        for (role_idx, patterns) in self.patterns.iter().enumerate() {
            if assigned.contains_key(&role_idx) {
                continue;
            }
            let hit = first_unused(&normalized, &used, |name| {
                patterns.synonyms.iter().any(|p| p == name)
            });
            if let Some(col_idx) = hit {
                used[col_idx] = true;
                assigned.insert(
                    role_idx,
                    Assignment {
                        col_idx,
                        confidence: SYNONYM_CONFIDENCE,
                        method: MatchMethod::Synonym,
                    },
                );
            }
        }

        let mut candidates = Vec::new();
        for (role_idx, patterns) in self.patterns.iter().enumerate() {
            if assigned.contains_key(&role_idx) {
                continue;
            }
            for (col_idx, name) in normalized.iter().enumerate() {
                if used[col_idx] || name.is_empty() {
                    continue;
                }
                let score = patterns.fuzzy_score(name);
                if score > self.config.fuzzy_threshold {
                    candidates.push(Candidate {
                        role_idx,
                        col_idx,
                        score,
                    });
                }
            }
        }
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a.role_idx.cmp(&b.role_idx))
                .then(a.col_idx.cmp(&b.col_idx))
        });
        for candidate in candidates {
            if assigned.contains_key(&candidate.role_idx) || used[candidate.col_idx] {
                continue;
            }
            used[candidate.col_idx] = true;
            assigned.insert(
                candidate.role_idx,
                Assignment {
                    col_idx: candidate.col_idx,
                    confidence: (candidate.score * 10_000.0).round() / 100.0,
                    method: MatchMethod::Fuzzy,
                },
            );
        }

        let mapped_schema: Vec<ColumnMapping> = assigned
            .iter()
            .map(|(role_idx, assignment)| ColumnMapping {
                column: columns[assignment.col_idx].as_ref().to_string(),
                role: self.patterns[*role_idx].role,
                confidence: assignment.confidence,
                method: assignment.method,
            })
            .collect();
        for mapping in &mapped_schema {
            debug!(
                column = %mapping.column,
                role = %mapping.role,
                confidence = mapping.confidence,
                method = ?mapping.method,
                "mapped column"
            );
        }

        let present: Vec<CanonicalRole> = mapped_schema.iter().map(|m| m.role).collect();
        let required: Vec<CanonicalRole> = self.rules.required_roles().collect();
        let missing_required: Vec<CanonicalRole> = required
            .iter()
            .copied()
            .filter(|role| !present.contains(role))
            .collect();
        let overall_confidence = overall_confidence(&mapped_schema, &required);
        let unmapped_columns = columns
            .iter()
            .zip(&used)
            .filter(|(_, used)| !**used)
            .map(|(column, _)| column.as_ref().to_string())
            .collect();
        let detected_domain = self.rules.detect_domain(&present).to_string();

        SchemaReport {
            mapped_schema,
            overall_confidence,
            missing_required,
            unmapped_columns,
            detected_domain,
        }
    }
}

fn first_unused(names: &[String], used: &[bool], matches: impl Fn(&str) -> bool) -> Option<usize> {
    names
        .iter()
        .enumerate()
        .find(|(idx, name)| !used[*idx] && !name.is_empty() && matches(name))
        .map(|(idx, _)| idx)
}

/// Weakest required mapping, scaled by the share of required roles found.
fn overall_confidence(mappings: &[ColumnMapping], required: &[CanonicalRole]) -> f64 {
    let scored: Vec<f64> = if required.is_empty() {
        mappings.iter().map(|m| m.confidence).collect()
    } else {
        mappings
            .iter()
            .filter(|m| required.contains(&m.role))
            .map(|m| m.confidence)
            .collect()
    };
    if scored.is_empty() {
        return 0.0;
    }
    let minimum = scored.iter().copied().fold(f64::INFINITY, f64::min);
    let coverage = if required.is_empty() {
        1.0
    } else {
        scored.len() as f64 / required.len() as f64
    };
    (minimum * coverage).clamp(0.0, 100.0)
}
