//! Declarative matching tables.
//!
//! The engine is generic over these tables; swapping in a custom
//! [`SchemaRules`] changes what is recognized without touching the matching
//! algorithm.

use std::sync::LazyLock;

use fcast_model::CanonicalRole;
use serde::{Deserialize, Serialize};

/// Known names for one canonical role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRule {
    pub role: CanonicalRole,
    /// Whether a dataset is incomplete without this role.
    pub required: bool,
    /// Alternative spellings, compared after normalization.
    #[serde(default)]
    pub synonyms: Vec<String>,
}

/// Maps a combination of present roles to a business domain label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRule {
    /// Every listed role must be mapped for the rule to fire.
    pub requires: Vec<CanonicalRole>,
    pub domain: String,
}

/// Complete rule set for schema inference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRules {
    /// Roles in matching priority order.
    pub roles: Vec<RoleRule>,
    /// Evaluated in order; the first rule whose roles are all present wins.
    pub domain_rules: Vec<DomainRule>,
    pub fallback_domain: String,
}

impl SchemaRules {
    pub fn rule_for(&self, role: CanonicalRole) -> Option<&RoleRule> {
        self.roles.iter().find(|rule| rule.role == role)
    }

    pub fn required_roles(&self) -> impl Iterator<Item = CanonicalRole> + '_ {
        self.roles
            .iter()
            .filter(|rule| rule.required)
            .map(|rule| rule.role)
    }

    /// Domain label for the set of mapped roles.
    pub fn detect_domain(&self, present: &[CanonicalRole]) -> &str {
        self.domain_rules
            .iter()
            .find(|rule| rule.requires.iter().all(|role| present.contains(role)))
            .map_or(self.fallback_domain.as_str(), |rule| rule.domain.as_str())
    }
}

impl Default for SchemaRules {
    fn default() -> Self {
        default_rules().clone()
    }
}

/// Built-in rule set, constructed once.
pub fn default_rules() -> &'static SchemaRules {
    &DEFAULT_RULES
}

fn role(role: CanonicalRole, required: bool, synonyms: &[&str]) -> RoleRule {
    RoleRule {
        role,
        required,
        synonyms: synonyms.iter().map(|s| (*s).to_string()).collect(),
    }
}

fn domain(requires: &[CanonicalRole], label: &str) -> DomainRule {
    DomainRule {
        requires: requires.to_vec(),
        domain: label.to_string(),
    }
}

static DEFAULT_RULES: LazyLock<SchemaRules> = LazyLock::new(|| SchemaRules {
    roles: vec![
        role(
            CanonicalRole::Date,
            true,
            &[
                "timestamp",
                "trans_date",
                "txn_date",
                "transaction_date",
                "order_date",
                "sale_date",
                "sales_date",
                "invoice_date",
                "posting_date",
                "datetime",
                "ds",
                "day",
                "week",
                "month",
                "period",
            ],
        ),
        role(
            CanonicalRole::Target,
            true,
            &[
                "sold",
                "sales_amount",
                "qty",
                "units",
                "units_sold",
                "sales",
                "demand",
                "volume",
                "amount",
                "orders",
                "revenue",
                "value",
                "y",
            ],
        ),
        role(
            CanonicalRole::Item,
            true,
            &[
                "sku",
                "product",
                "item_id",
                "item_code",
                "product_code",
                "product_name",
                "article",
                "material",
                "part_number",
                "category",
            ],
        ),
        role(
            CanonicalRole::Location,
            false,
            &[
                "store",
                "store_id",
                "location_id",
                "site",
                "warehouse",
                "branch",
                "region",
                "shop",
                "outlet",
                "market",
            ],
        ),
        role(
            CanonicalRole::Price,
            false,
            &[
                "cost",
                "unit_price",
                "unit_cost",
                "selling_price",
                "sale_price",
                "list_price",
                "avg_price",
            ],
        ),
    ],
    domain_rules: vec![
        domain(
            &[CanonicalRole::Item, CanonicalRole::Location],
            "Retail / Supply Chain",
        ),
        domain(
            &[CanonicalRole::Item, CanonicalRole::Price],
            "Retail / Supply Chain",
        ),
        domain(
            &[CanonicalRole::Location, CanonicalRole::Price],
            "Commerce / Pricing",
        ),
    ],
    fallback_domain: "Generic Time-Series".to_string(),
});
