use crate::archive::write_zip;
use crate::error::{EtlError, Result};
use crate::numeric::parse_decimal_or_zero;
use crate::paths::DataPaths;
use metrics::counter;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::PathBuf;
use tracing::{info, instrument};

/// Placeholder legal name; the join against the registry happens in the
/// enrichment stage, never here.
pub const LEGAL_NAME_PLACEHOLDER: &str = "NÃO INFORMADA";

pub const CONSOLIDATED_HEADER: [&str; 5] =
    ["RegistroANS", "RazaoSocial", "Trimestre", "Ano", "ValorDespesas"];

/// Consolidation stage: streams the staging file and sums closing balances
/// per (operator id, year, quarter). Rows missing any key part are skipped;
/// unparseable balances count as zero; negative balances are dropped before
/// key creation, so a key with only negative entries never appears.
#[instrument(skip(paths))]
pub fn run_consolidation(paths: &DataPaths) -> Result<(PathBuf, PathBuf)> {
    let staging_path = paths.staging_file();
    if !staging_path.exists() {
        return Err(EtlError::missing_input(staging_path, "normalize"));
    }

    fs::create_dir_all(paths.teste1_dir())?;

    let mut reader = csv::Reader::from_reader(File::open(&staging_path)?);
    let headers = reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h == name);
    let (reg_col, year_col, quarter_col, balance_col) = (
        column("reg_ans"),
        column("ano"),
        column("trimestre"),
        column("vl_saldo_final"),
    );
    let field = |record: &csv::StringRecord, col: Option<usize>| -> String {
        col.and_then(|i| record.get(i)).unwrap_or("").trim().to_string()
    };

    let mut totals: BTreeMap<(String, String, String), Decimal> = BTreeMap::new();
    for record in reader.records() {
        let record = record?;

        let operator = field(&record, reg_col);
        let year = field(&record, year_col);
        let quarter = field(&record, quarter_col);
        if operator.is_empty() || year.is_empty() || quarter.is_empty() {
            continue;
        }

        let amount = parse_decimal_or_zero(&field(&record, balance_col));
        if amount < Decimal::ZERO {
            continue;
        }

        *totals.entry((operator, year, quarter)).or_insert(Decimal::ZERO) += amount;
    }

    let csv_path = paths.consolidated_file();
    let zip_path = paths.consolidated_zip();

    let mut writer =
        csv::WriterBuilder::new().delimiter(b';').from_writer(File::create(&csv_path)?);
    writer.write_record(CONSOLIDATED_HEADER)?;
    for ((operator, year, quarter), amount) in &totals {
        let amount = amount.to_string();
        writer.write_record([
            operator.as_str(),
            LEGAL_NAME_PLACEHOLDER,
            quarter.as_str(),
            year.as_str(),
            amount.as_str(),
        ])?;
    }
    writer.flush()?;

    write_zip(&csv_path, &zip_path)?;
    counter!("ans_consolidated_keys_total").increment(totals.len() as u64);
    info!(keys = totals.len(), output = %csv_path.display(), "consolidation finished");

    Ok((csv_path, zip_path))
}
