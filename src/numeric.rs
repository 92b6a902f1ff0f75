use rust_decimal::Decimal;
use std::str::FromStr;

/// Rewrites a Brazilian-formatted amount ("1.234,56") to canonical decimal
/// notation for the staging file. Unparseable values pass through unchanged;
/// strict validation happens later, in enrichment.
pub fn canonicalize_decimal(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let candidate = trimmed.replace('.', "").replace(',', ".");
    match Decimal::from_str(&candidate) {
        Ok(d) => d.to_string(),
        Err(_) => trimmed.to_string(),
    }
}

/// Lenient amount parser accepting both pt-BR ("1.234,56") and plain
/// ("1234.56") notation. `None` for empty or non-numeric input.
pub fn parse_decimal(value: &str) -> Option<Decimal> {
    let v = value.trim();
    if v.is_empty() {
        return None;
    }
    let v = v.replace(' ', "");
    let v = if v.contains(',') && v.contains('.') {
        v.replace('.', "").replace(',', ".")
    } else if v.contains(',') {
        v.replace(',', ".")
    } else {
        v
    };
    Decimal::from_str(&v).ok()
}

/// Staging-read parser: blank or unparseable closing balances count as zero,
/// so malformed rows still reach the consolidated keys.
pub fn parse_decimal_or_zero(value: &str) -> Decimal {
    let v = value.trim();
    if v.is_empty() {
        return Decimal::ZERO;
    }
    Decimal::from_str(v).unwrap_or(Decimal::ZERO)
}
