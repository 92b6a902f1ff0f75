use crate::archive::extract_zip;
use crate::config::AnsConfig;
use crate::detect::read_decoded;
use crate::error::{EtlError, Result};
use crate::fetch::run_download;
use crate::numeric::canonicalize_decimal;
use crate::paths::DataPaths;
use crate::period::{infer_period_from_archive_name, Period};
use crate::text::{is_expense_event_description, normalize_header};
use chrono::NaiveDate;
use metrics::counter;
use std::collections::{BTreeSet, HashMap};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Canonical staging schema, written once as the header of the staging file.
pub const CANON_HEADER: [&str; 9] = [
    "data",
    "reg_ans",
    "cd_conta_contabil",
    "descricao",
    "vl_saldo_inicial",
    "vl_saldo_final",
    "ano",
    "trimestre",
    "fonte_arquivo",
];

#[derive(Debug, Default, Clone, Copy)]
pub struct StagingStats {
    pub total: usize,
    pub matched: usize,
}

/// One downloaded archive awaiting extraction, with the period inferred from
/// its name when possible.
#[derive(Debug, Clone)]
pub struct ZipJob {
    pub zip_path: PathBuf,
    pub period: Option<Period>,
}

/// Accepted in `DD/MM/YYYY` or `YYYY-MM-DD`; anything else passes through
/// untouched rather than dropping the row.
fn normalize_date(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        return String::new();
    }
    for format in ["%d/%m/%Y", "%Y-%m-%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return date.format("%Y-%m-%d").to_string();
        }
    }
    value.to_string()
}

/// Streams one extracted source CSV into the shared staging file, keeping
/// only expense-event rows and mapping the quarter's header spelling onto the
/// canonical schema. The staging file grows across calls within a run; the
/// header is written only when the file did not yet exist.
#[instrument(skip(period), fields(file = %csv_path.display()))]
pub fn process_csv_to_staging(
    csv_path: &Path,
    staging_path: &Path,
    period: Option<Period>,
) -> Result<StagingStats> {
    if let Some(parent) = staging_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let staging_existed = staging_path.exists();

    let (decoded, encoding) = read_decoded(csv_path)?;
    info!(encoding = encoding.label(), "source encoding detected");

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .quote(b'"')
        .flexible(true)
        .has_headers(false)
        .from_reader(decoded.as_bytes());

    let mut records = reader.records();
    let header = match records.next() {
        Some(record) => record?,
        None => return Ok(StagingStats::default()),
    };

    let mut columns: HashMap<String, usize> = HashMap::new();
    for (index, cell) in header.iter().enumerate() {
        columns.insert(normalize_header(cell), index);
    }
    let get = |record: &csv::StringRecord, key: &str| -> String {
        columns
            .get(key)
            .and_then(|&i| record.get(i))
            .unwrap_or("")
            .to_string()
    };

    let staging_file = OpenOptions::new().create(true).append(true).open(staging_path)?;
    let mut writer = csv::WriterBuilder::new().from_writer(staging_file);
    if !staging_existed {
        writer.write_record(CANON_HEADER)?;
    }

    let source_name = csv_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (year, quarter) = match period {
        Some(p) => (p.year.to_string(), p.quarter.to_string()),
        None => (String::new(), String::new()),
    };

    let mut stats = StagingStats::default();
    for record in records {
        let record = record?;
        stats.total += 1;

        let description = get(&record, "DESCRICAO");
        if description.is_empty() || !is_expense_event_description(&description) {
            continue;
        }
        stats.matched += 1;

        // Opening balance: absent column stays empty, present-but-blank
        // value goes through the decimal rewrite like any other.
        let opening = if columns.contains_key("VL_SALDO_INICIAL") {
            canonicalize_decimal(&get(&record, "VL_SALDO_INICIAL"))
        } else {
            String::new()
        };

        writer.write_record([
            normalize_date(&get(&record, "DATA")).as_str(),
            get(&record, "REG_ANS").trim(),
            get(&record, "CD_CONTA_CONTABIL").trim(),
            description.trim(),
            opening.as_str(),
            canonicalize_decimal(&get(&record, "VL_SALDO_FINAL")).as_str(),
            year.as_str(),
            quarter.as_str(),
            source_name.as_str(),
        ])?;
    }
    writer.flush()?;

    counter!("ans_rows_staged_total").increment(stats.matched as u64);
    Ok(stats)
}

/// Lists downloaded archives in name order, pairing each with its inferred
/// period.
pub fn list_raw_zips(paths: &DataPaths) -> Result<Vec<ZipJob>> {
    fs::create_dir_all(paths.raw_dir())?;

    let mut zip_paths: Vec<PathBuf> = fs::read_dir(paths.raw_dir())?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().map(|e| e.eq_ignore_ascii_case("zip")).unwrap_or(false))
        .collect();
    zip_paths.sort();

    Ok(zip_paths
        .into_iter()
        .map(|zip_path| {
            let period = zip_path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(infer_period_from_archive_name);
            ZipJob { zip_path, period }
        })
        .collect())
}

/// Normalization stage: extract every raw archive and append its expense rows
/// to the staging file. Triggers the download stage first when `raw/` holds
/// no archives yet.
#[instrument(skip(cfg, paths))]
pub async fn run_normalization(cfg: &AnsConfig, paths: &DataPaths) -> Result<PathBuf> {
    let mut jobs = list_raw_zips(paths)?;
    if jobs.is_empty() {
        info!("no archives in raw/, running download stage first");
        run_download(cfg, paths).await?;
        jobs = list_raw_zips(paths)?;
    }
    if jobs.is_empty() {
        return Err(EtlError::missing_input(paths.raw_dir(), "download"));
    }

    let staging_path = paths.staging_file();

    for job in &jobs {
        let zip_name = job
            .zip_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let destination = match job.period {
            Some(period) => paths.extracted_dir().join(period.to_string()),
            None => paths
                .extracted_dir()
                .join(job.zip_path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()),
        };

        let extracted = extract_zip(&job.zip_path, &destination)?;

        let (csvs, others): (Vec<_>, Vec<_>) = extracted
            .into_iter()
            .partition(|p| p.extension().map(|e| e.eq_ignore_ascii_case("csv")).unwrap_or(false));

        if !others.is_empty() {
            let extensions: BTreeSet<String> = others
                .iter()
                .map(|p| {
                    p.extension()
                        .map(|e| e.to_string_lossy().to_lowercase())
                        .unwrap_or_else(|| "<sem_ext>".to_string())
                })
                .collect();
            warn!(archive = %zip_name, ?extensions, "non-CSV entries skipped");
        }

        if csvs.is_empty() {
            warn!(archive = %zip_name, "no CSV found, skipping archive");
            println!("⚠️  {} | nenhum CSV encontrado (ignorando)", zip_name);
            continue;
        }

        for csv_path in &csvs {
            let stats = process_csv_to_staging(csv_path, &staging_path, job.period)?;
            let csv_name = csv_path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            info!(file = %csv_name, total = stats.total, matched = stats.matched, "staged");
            println!("📄 {} | lidas={} | match={}", csv_name, stats.total, stats.matched);
        }
    }

    Ok(staging_path)
}
