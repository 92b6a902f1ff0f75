use crate::archive::write_zip;
use crate::detect::{detect_delimiter, read_decoded};
use crate::error::{EtlError, Result};
use crate::numeric::parse_decimal;
use crate::paths::DataPaths;
use crate::welford::WelfordAccumulator;
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::PathBuf;
use tracing::{info, instrument};

pub const AGGREGATED_HEADER: [&str; 6] = [
    "RazaoSocial",
    "UF",
    "total_despesas",
    "media_trimestral",
    "desvio_padrao",
    "qtd_registros",
];

static ZIP_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]+").unwrap());

fn package_path(paths: &DataPaths, zip_name: Option<&str>) -> PathBuf {
    match zip_name {
        Some(name) => {
            let sanitized = ZIP_NAME_RE.replace_all(name.trim(), "_");
            paths.teste2_dir().join(format!("Teste_{}.zip", sanitized))
        }
        None => paths.teste2_dir().join("despesas_agregadas.zip"),
    }
}

/// A record is aggregation-eligible when its amount is positive, its legal
/// name is non-empty and its region is non-empty. CNPJ validity is recorded
/// upstream but deliberately not required here.
fn is_eligible(amount_positive: &str, legal_name_non_empty: &str, region: &str) -> bool {
    amount_positive == "1" && legal_name_non_empty == "1" && !region.trim().is_empty()
}

/// Aggregation stage: groups eligible enriched rows by (legal name, region)
/// and computes count, total, mean and population standard deviation in one
/// pass. Output is sorted by rounded total descending, ties staying in group
/// insertion order, and packaged into a zip next to the CSV.
#[instrument(skip(paths))]
pub fn run_aggregation(paths: &DataPaths, zip_name: Option<&str>) -> Result<(PathBuf, PathBuf)> {
    let enriched_path = paths.enriched_file();
    if !enriched_path.exists() {
        return Err(EtlError::missing_input(enriched_path, "enrich"));
    }

    fs::create_dir_all(paths.teste2_dir())?;

    let (decoded, encoding) = read_decoded(&enriched_path)?;
    let delimiter = detect_delimiter(&decoded);
    info!(encoding = encoding.label(), delimiter = tracing::field::display(delimiter as char), "reading enriched file");

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .quote(b'"')
        .flexible(true)
        .from_reader(decoded.as_bytes());

    let headers = reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h.trim() == name);
    let (name_col, region_col, amount_col, amount_ok_col, legal_ok_col) = (
        column("RazaoSocial"),
        column("UF"),
        column("ValorDespesas"),
        column("valor_positivo"),
        column("razao_social_nao_vazia"),
    );
    let field = |record: &csv::StringRecord, col: Option<usize>| -> String {
        col.and_then(|i| record.get(i)).unwrap_or("").trim().to_string()
    };

    // Vec keeps group insertion order so the stable sort below preserves it
    // for equal totals.
    let mut groups: Vec<((String, String), WelfordAccumulator)> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for record in reader.records() {
        let record = record?;

        if !is_eligible(
            &field(&record, amount_ok_col),
            &field(&record, legal_ok_col),
            &field(&record, region_col),
        ) {
            continue;
        }

        let Some(amount) = parse_decimal(&field(&record, amount_col)) else { continue };

        let key = (field(&record, name_col), field(&record, region_col));
        let slot = match index.get(&key) {
            Some(&i) => i,
            None => {
                groups.push((key.clone(), WelfordAccumulator::default()));
                index.insert(key, groups.len() - 1);
                groups.len() - 1
            }
        };
        groups[slot].1.add(amount);
    }

    struct SummaryRow {
        legal_name: String,
        region: String,
        total: Decimal,
        mean: Decimal,
        std_dev: Decimal,
        count: u64,
    }

    let mut rows: Vec<SummaryRow> = groups
        .into_iter()
        .map(|((legal_name, region), acc)| SummaryRow {
            legal_name,
            region,
            total: acc.total.round_dp(2),
            mean: acc.mean.round_dp(2),
            std_dev: acc.population_std_dev().round_dp(2),
            count: acc.count,
        })
        .collect();
    rows.sort_by(|a, b| b.total.cmp(&a.total));

    let csv_path = paths.aggregated_file();
    let zip_path = package_path(paths, zip_name);

    let mut writer = csv::WriterBuilder::new().delimiter(b';').from_writer(File::create(&csv_path)?);
    writer.write_record(AGGREGATED_HEADER)?;
    for row in &rows {
        let (total, mean, std_dev, count) = (
            format!("{:.2}", row.total),
            format!("{:.2}", row.mean),
            format!("{:.2}", row.std_dev),
            row.count.to_string(),
        );
        writer.write_record([
            row.legal_name.as_str(),
            row.region.as_str(),
            total.as_str(),
            mean.as_str(),
            std_dev.as_str(),
            count.as_str(),
        ])?;
    }
    writer.flush()?;

    write_zip(&csv_path, &zip_path)?;
    counter!("ans_aggregate_groups_total").increment(rows.len() as u64);
    info!(groups = rows.len(), output = %csv_path.display(), "aggregation finished");

    Ok((csv_path, zip_path))
}
