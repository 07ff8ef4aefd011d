//! Naming helpers for output columns.

/// Converts a header to `snake_case`: camel-case humps and runs of
/// non-alphanumeric characters become single underscores.
///
/// Returns `"column"` when nothing alphanumeric remains.
pub fn to_snake_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_lower_or_digit = false;
    let mut pending_separator = false;
    for ch in raw.trim().chars() {
        if ch.is_alphanumeric() {
            let hump = ch.is_uppercase() && prev_lower_or_digit;
            if (pending_separator || hump) && !out.is_empty() {
                out.push('_');
            }
            pending_separator = false;
            out.extend(ch.to_lowercase());
            prev_lower_or_digit = ch.is_lowercase() || ch.is_ascii_digit();
        } else {
            pending_separator = true;
            prev_lower_or_digit = false;
        }
    }
    if out.is_empty() {
        "column".to_string()
    } else {
        out
    }
}

/// Returns `base`, or `base_2`, `base_3`, ... when `taken` already holds it.
pub fn unique_name(base: &str, taken: &[String]) -> String {
    if !taken.iter().any(|name| name == base) {
        return base.to_string();
    }
    (2..)
        .map(|suffix| format!("{base}_{suffix}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_conversions() {
        assert_eq!(to_snake_case("Unit Price ($)"), "unit_price");
        assert_eq!(to_snake_case("promoFlag"), "promo_flag");
        assert_eq!(to_snake_case("  Temp-Max  "), "temp_max");
        assert_eq!(to_snake_case("CPI"), "cpi");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
        assert_eq!(to_snake_case("%%"), "column");
    }

    #[test]
    fn unique_names_get_suffixes() {
        let taken = vec!["item".to_string(), "item_2".to_string()];
        assert_eq!(unique_name("item", &taken), "item_3");
        assert_eq!(unique_name("promo", &taken), "promo");
    }
}
