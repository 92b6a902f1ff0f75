use crate::detect::read_decoded;
use crate::error::Result;
use crate::text::{digits_only, normalize_registry_header};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, instrument};

/// One active-operator registry (cadop) entry, keyed by operator id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryEntry {
    pub operator_id: String,
    pub cnpj: String,
    pub legal_name: String,
    pub category: String,
    pub region: String,
}

impl RegistryEntry {
    /// Count of populated fields, used to break duplicate-id conflicts.
    fn completeness_score(&self) -> u32 {
        [&self.cnpj, &self.legal_name, &self.category, &self.region]
            .iter()
            .map(|f| u32::from(!f.is_empty()))
            .sum()
    }
}

/// Loads the registry CSV into an operator-id map. Duplicate ids keep the
/// more complete entry; on equal scores the first-seen entry wins.
#[instrument(fields(file = %path.display()))]
pub fn load_registry(path: &Path) -> Result<HashMap<String, RegistryEntry>> {
    let (decoded, encoding) = read_decoded(path)?;
    info!(encoding = encoding.label(), "registry encoding detected");

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .quote(b'"')
        .flexible(true)
        .has_headers(false)
        .from_reader(decoded.as_bytes());

    let mut records = reader.records();
    let header = match records.next() {
        Some(record) => record?,
        None => return Ok(HashMap::new()),
    };
    let mut columns: HashMap<String, usize> = HashMap::new();
    for (index, cell) in header.iter().enumerate() {
        columns.insert(normalize_registry_header(cell), index);
    }
    let get = |record: &csv::StringRecord, key: &str| -> String {
        columns
            .get(key)
            .and_then(|&i| record.get(i))
            .unwrap_or("")
            .trim()
            .to_string()
    };

    let mut entries: HashMap<String, RegistryEntry> = HashMap::new();
    for record in records {
        let record = record?;

        let mut operator_id = digits_only(&get(&record, "registro_ans"));
        if operator_id.is_empty() {
            operator_id = digits_only(&get(&record, "registro_operadora"));
        }
        if operator_id.is_empty() {
            continue;
        }

        let entry = RegistryEntry {
            operator_id: operator_id.clone(),
            cnpj: digits_only(&get(&record, "cnpj")),
            legal_name: get(&record, "razao_social"),
            category: get(&record, "modalidade"),
            region: get(&record, "uf"),
        };

        match entries.get(&operator_id) {
            Some(existing) if entry.completeness_score() <= existing.completeness_score() => {}
            _ => {
                entries.insert(operator_id, entry);
            }
        }
    }

    info!(operators = entries.len(), "registry loaded");
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn loads_and_dedupes_by_completeness() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Relatorio_cadop.csv");
        std::fs::write(
            &path,
            "Registro ANS;CNPJ;Razão Social;Modalidade;UF\n\
             123456;11.444.777/0001-61;OPERADORA ALFA;Medicina de Grupo;SP\n\
             123456;;OPERADORA ALFA;;\n\
             654321;;OPERADORA BETA;;RJ\n\
             ;;SEM REGISTRO;;\n",
        )
        .unwrap();

        let registry = load_registry(&path).unwrap();
        assert_eq!(registry.len(), 2);

        let alfa = &registry["123456"];
        assert_eq!(alfa.cnpj, "11444777000161");
        assert_eq!(alfa.region, "SP");

        let beta = &registry["654321"];
        assert_eq!(beta.legal_name, "OPERADORA BETA");
        assert_eq!(beta.cnpj, "");
    }

    #[test]
    fn first_seen_wins_score_ties() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cadop.csv");
        std::fs::write(
            &path,
            "registro_operadora;cnpj;razao_social;modalidade;uf\n\
             999;;PRIMEIRA;;SP\n\
             999;;SEGUNDA;;RJ\n",
        )
        .unwrap();

        let registry = load_registry(&path).unwrap();
        assert_eq!(registry["999"].legal_name, "PRIMEIRA");
    }
}
