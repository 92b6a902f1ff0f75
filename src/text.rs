use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// NFKD-decomposes and drops combining marks: "Operações" -> "Operacoes".
pub fn strip_accents(value: &str) -> String {
    value.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Accent-free, whitespace-collapsed lowercase, for description matching.
pub fn normalize_text(value: &str) -> String {
    let value = strip_accents(value);
    WHITESPACE_RE.replace_all(&value, " ").trim().to_lowercase()
}

/// Canonical header cell: accent-free uppercase with underscore-joined words,
/// e.g. "Vl. Saldo Final " -> "VL._SALDO_FINAL".
pub fn normalize_header(name: &str) -> String {
    let name = strip_accents(name).to_uppercase();
    WHITESPACE_RE.replace_all(name.trim(), "_").to_string()
}

/// Registry header cell, lowercase variant: "Registro ANS" -> "registro_ans".
pub fn normalize_registry_header(name: &str) -> String {
    let name = strip_accents(name).to_lowercase();
    WHITESPACE_RE.replace_all(name.trim(), "_").to_string()
}

/// Keeps only ASCII digits; identifiers arrive with dots, slashes, dashes.
pub fn digits_only(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Expense-event row filter: "desp" plus either "evento" or "sinistro" in the
/// normalized description.
pub fn is_expense_event_description(description: &str) -> bool {
    let text = normalize_text(description);
    text.contains("desp") && (text.contains("evento") || text.contains("sinistro"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_portuguese_diacritics() {
        assert_eq!(strip_accents("razão social"), "razao social");
        assert_eq!(strip_accents("DESPESAS MÉDICAS"), "DESPESAS MEDICAS");
    }

    #[test]
    fn header_normalization_upper_and_lower() {
        assert_eq!(normalize_header("  Vl Saldo   Final "), "VL_SALDO_FINAL");
        assert_eq!(normalize_registry_header("Razão Social"), "razao_social");
    }

    #[test]
    fn expense_filter_requires_desp_and_event_or_claim() {
        assert!(is_expense_event_description("DESPESAS COM EVENTOS / SINISTROS"));
        assert!(is_expense_event_description("  Despesa de Sinistros conhecidos"));
        assert!(!is_expense_event_description("DESPESAS ADMINISTRATIVAS"));
        assert!(!is_expense_event_description("EVENTOS A LIQUIDAR"));
    }

    #[test]
    fn digits_only_drops_formatting() {
        assert_eq!(digits_only("11.444.777/0001-61"), "11444777000161");
        assert_eq!(digits_only(""), "");
    }
}
