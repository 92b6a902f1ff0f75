use crate::archive::write_zip;
use crate::config::AnsConfig;
use crate::detect::{detect_delimiter, read_decoded};
use crate::error::{EtlError, Result};
use crate::fetch::download_registry_if_missing;
use crate::numeric::parse_decimal;
use crate::paths::DataPaths;
use crate::registry::{load_registry, RegistryEntry};
use crate::text::digits_only;
use crate::cnpj::validate_cnpj;
use metrics::counter;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::PathBuf;
use tracing::{info, instrument};

pub const ENRICHED_HEADER: [&str; 12] = [
    "RegistroANS",
    "CNPJ",
    "RazaoSocial",
    "Modalidade",
    "UF",
    "Trimestre",
    "Ano",
    "ValorDespesas",
    "cnpj_valido",
    "valor_positivo",
    "razao_social_nao_vazia",
    "erros",
];

fn flag(ok: bool) -> &'static str {
    if ok {
        "1"
    } else {
        "0"
    }
}

/// Enrichment stage: left-joins consolidated records against the operator
/// registry and tags each row with three independent validity flags plus an
/// error-code list. Nothing is filtered here; a row may fail every rule and
/// still be written.
#[instrument(skip(cfg, paths))]
pub async fn run_enrichment(cfg: &AnsConfig, paths: &DataPaths) -> Result<(PathBuf, PathBuf)> {
    let consolidated_path = paths.consolidated_file();
    if !consolidated_path.exists() {
        return Err(EtlError::missing_input(consolidated_path, "consolidate"));
    }

    let registry_path = download_registry_if_missing(cfg, paths).await?;
    let registry = load_registry(&registry_path)?;

    fs::create_dir_all(paths.teste2_dir())?;

    let (decoded, encoding) = read_decoded(&consolidated_path)?;
    let delimiter = detect_delimiter(&decoded);
    info!(encoding = encoding.label(), delimiter = tracing::field::display(delimiter as char), "reading consolidated file");

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .quote(b'"')
        .flexible(true)
        .has_headers(false)
        .from_reader(decoded.as_bytes());

    let mut records = reader.records();
    let header = match records.next() {
        Some(record) => record?,
        None => return Err(EtlError::missing_input(paths.consolidated_file(), "consolidate")),
    };
    let mut columns: HashMap<String, usize> = HashMap::new();
    for (index, cell) in header.iter().enumerate() {
        columns.insert(cell.trim().to_string(), index);
    }
    // Consolidated headers vary by producer; accept both spellings.
    let get = |record: &csv::StringRecord, names: &[&str]| -> String {
        for name in names {
            if let Some(value) = columns.get(*name).and_then(|&i| record.get(i)) {
                if !value.is_empty() {
                    return value.trim().to_string();
                }
            }
        }
        String::new()
    };

    let csv_path = paths.enriched_file();
    let zip_path = paths.enriched_zip();
    let mut writer = csv::WriterBuilder::new().delimiter(b';').from_writer(File::create(&csv_path)?);
    writer.write_record(ENRICHED_HEADER)?;

    let empty = RegistryEntry::default();
    let mut rows = 0usize;
    for record in records {
        let record = record?;

        let operator_id = digits_only(&get(&record, &["RegistroANS", "reg_ans"]));
        let quarter = get(&record, &["Trimestre", "trimestre"]);
        let year = get(&record, &["Ano", "ano"]);
        let amount_raw = get(&record, &["ValorDespesas", "valorDespesas", "valor_despesas"]);

        let entry = registry.get(&operator_id).unwrap_or(&empty);

        let mut errors: Vec<&str> = Vec::new();

        let cnpj_ok = !entry.cnpj.is_empty() && validate_cnpj(&entry.cnpj);
        if !cnpj_ok {
            errors.push("cnpj_invalido");
        }

        let amount_ok = parse_decimal(&amount_raw).map(|v| v > Decimal::ZERO).unwrap_or(false);
        if !amount_ok {
            errors.push("valor_nao_positivo");
        }

        let legal_name_ok = !entry.legal_name.trim().is_empty();
        if !legal_name_ok {
            errors.push("razao_social_vazia");
        }

        let errors = errors.join(",");
        writer.write_record([
            operator_id.as_str(),
            entry.cnpj.as_str(),
            entry.legal_name.as_str(),
            entry.category.as_str(),
            entry.region.as_str(),
            quarter.as_str(),
            year.as_str(),
            amount_raw.as_str(),
            flag(cnpj_ok),
            flag(amount_ok),
            flag(legal_name_ok),
            errors.as_str(),
        ])?;
        rows += 1;
    }
    writer.flush()?;

    write_zip(&csv_path, &zip_path)?;
    counter!("ans_rows_enriched_total").increment(rows as u64);
    info!(rows, output = %csv_path.display(), "enrichment finished");

    Ok((csv_path, zip_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnsConfig;
    use tempfile::tempdir;

    fn setup(dir: &std::path::Path) -> (AnsConfig, DataPaths) {
        let cfg = AnsConfig { data_dir: dir.to_string_lossy().into_owned(), ..AnsConfig::default() };
        let paths = DataPaths::new(dir);
        fs::create_dir_all(paths.teste1_dir()).unwrap();
        fs::create_dir_all(paths.raw_dir()).unwrap();
        // local registry copy keeps the stage offline
        fs::write(
            paths.registry_file(&cfg.registry_file_name),
            "Registro ANS;CNPJ;Razão Social;Modalidade;UF\n\
             123456;11.444.777/0001-61;OPERADORA ALFA;Medicina de Grupo;SP\n\
             654321;00000000000000;OPERADORA BETA;Cooperativa;RJ\n",
        )
        .unwrap();
        (cfg, paths)
    }

    #[tokio::test]
    async fn joins_and_flags_independently() {
        let dir = tempdir().unwrap();
        let (cfg, paths) = setup(dir.path());
        fs::write(
            paths.consolidated_file(),
            "RegistroANS;RazaoSocial;Trimestre;Ano;ValorDespesas\n\
             123456;NÃO INFORMADA;1;2023;150.00\n\
             654321;NÃO INFORMADA;1;2023;0\n\
             777777;NÃO INFORMADA;1;2023;10.00\n",
        )
        .unwrap();

        let (csv_path, zip_path) = run_enrichment(&cfg, &paths).await.unwrap();
        assert!(zip_path.exists());

        let content = fs::read_to_string(&csv_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], ENRICHED_HEADER.join(";"));
        assert_eq!(
            lines[1],
            "123456;11444777000161;OPERADORA ALFA;Medicina de Grupo;SP;1;2023;150.00;1;1;1;"
        );
        // repdigit CNPJ invalid, zero amount not positive, name still fine
        assert_eq!(
            lines[2],
            "654321;00000000000000;OPERADORA BETA;Cooperativa;RJ;1;2023;0;0;0;1;cnpj_invalido,valor_nao_positivo"
        );
        // unknown operator: empty join, every rule fails
        assert_eq!(
            lines[3],
            "777777;;;;;1;2023;10.00;0;1;0;cnpj_invalido,razao_social_vazia"
        );
    }

    #[tokio::test]
    async fn missing_consolidated_is_a_precondition_error() {
        let dir = tempdir().unwrap();
        let (cfg, paths) = setup(dir.path());
        let err = run_enrichment(&cfg, &paths).await.unwrap_err();
        assert!(err.to_string().contains("consolidate"));
    }
}
