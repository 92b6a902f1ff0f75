use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// A calendar quarter of a filing year. Ordered by (year, quarter) so a
/// descending sort yields the most recent periods first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    pub year: i32,
    pub quarter: u8,
}

impl Period {
    pub fn new(year: i32, quarter: u8) -> Self {
        debug_assert!((1..=4).contains(&quarter));
        Self { year, quarter }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}T{}", self.quarter, self.year)
    }
}

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"20\d{2}").unwrap());
static QUARTER_YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([1-4])t(20\d{2})").unwrap());
static YEAR_QUARTER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(20\d{2}).*?([1-4]).*?(trimestre|trim)").unwrap());

/// Resolves the filing period of a listing entry from its name, falling back
/// to the enclosing year directory when the name carries no year of its own.
///
/// Regulator names are wildly inconsistent (`1T2017.zip`, `20130416_1t2012.zip`,
/// `2007 2 trimestre.zip`, ...), hence the layered token heuristics.
pub fn extract_period(file_name: &str, folder_year: i32) -> Option<Period> {
    let name = file_name.to_lowercase();
    let base = name.split('.').next().unwrap_or("");

    let base = base.replace(['-', '_'], " ");
    let tokens: Vec<&str> = base.split_whitespace().collect();

    // Year: first 20xx substring anywhere in a token. Dates like 20130416
    // deliberately resolve to their leading 4 digits.
    let year = tokens
        .iter()
        .find_map(|t| YEAR_RE.find(t))
        .and_then(|m| m.as_str().parse::<i32>().ok())
        .unwrap_or(folder_year);

    // "Nt..." tokens (1t2017, 1t, ...) win over everything else.
    for t in &tokens {
        let mut chars = t.chars();
        if let (Some(first), Some(second)) = (chars.next(), chars.next()) {
            if ('1'..='4').contains(&first) && second == 't' {
                return Some(Period::new(year, first as u8 - b'0'));
            }
        }
    }

    // "2007 1 trimestre", "3 trim", ...
    if tokens.iter().any(|t| *t == "trimestre" || *t == "trim") {
        for t in &tokens {
            if t.chars().all(|c| c.is_ascii_digit()) {
                if let Ok(n) = t.parse::<u8>() {
                    if (1..=4).contains(&n) {
                        return Some(Period::new(year, n));
                    }
                }
            }
        }
    }

    None
}

/// Period inference for downloaded archive names, used to label staging rows.
/// Looser than [`extract_period`]: no fallback year is available here, so a
/// name without a 20xx year resolves to `None`.
pub fn infer_period_from_archive_name(name: &str) -> Option<Period> {
    let name = name.to_lowercase();

    if let Some(caps) = QUARTER_YEAR_RE.captures(&name) {
        let quarter: u8 = caps[1].parse().ok()?;
        let year: i32 = caps[2].parse().ok()?;
        return Some(Period::new(year, quarter));
    }

    if let Some(caps) = YEAR_QUARTER_RE.captures(&name) {
        let year: i32 = caps[1].parse().ok()?;
        let quarter: u8 = caps[2].parse().ok()?;
        return Some(Period::new(year, quarter));
    }

    None
}
