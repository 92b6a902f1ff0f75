use crate::error::{EtlError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ans: AnsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnsConfig {
    /// Directory listing of quarterly accounting statements.
    pub base_url: String,
    /// Directory holding the active-operator registry (cadop) report.
    pub registry_base_url: String,
    /// File name of the registry report inside `registry_base_url`.
    pub registry_file_name: String,
    pub user_agent: String,
    /// Timeout for listing-page fetches, seconds.
    pub listing_timeout_seconds: u64,
    /// Timeout for file downloads, seconds.
    pub download_timeout_seconds: u64,
    /// Root of the raw/extracted/staging/output layout.
    pub data_dir: String,
}

impl Default for AnsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://dadosabertos.ans.gov.br/FTP/PDA/demonstracoes_contabeis/"
                .to_string(),
            registry_base_url:
                "https://dadosabertos.ans.gov.br/FTP/PDA/operadoras_de_plano_de_saude_ativas/"
                    .to_string(),
            registry_file_name: "Relatorio_cadop.csv".to_string(),
            user_agent: "ans_etl/0.1".to_string(),
            listing_timeout_seconds: 30,
            download_timeout_seconds: 60,
            data_dir: "data".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self { ans: AnsConfig::default() }
    }
}

impl Config {
    /// Loads `config.toml` from the working directory, falling back to
    /// defaults when the file is absent so the CLI runs with zero setup.
    pub fn load() -> Result<Self> {
        let config_path = "config.toml";
        if !Path::new(config_path).exists() {
            return Ok(Config::default());
        }
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            EtlError::Config(format!("Failed to read config file '{}': {}", config_path, e))
        })?;
        let config: Config = toml::from_str(&config_content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_the_regulator_server() {
        let cfg = Config::default();
        assert!(cfg.ans.base_url.contains("demonstracoes_contabeis"));
        assert!(cfg.ans.registry_base_url.contains("operadoras_de_plano_de_saude_ativas"));
        assert_eq!(cfg.ans.registry_file_name, "Relatorio_cadop.csv");
    }

    #[test]
    fn partial_toml_fills_missing_fields() {
        let cfg: Config = toml::from_str("[ans]\nuser_agent = \"test-agent\"\n").unwrap();
        assert_eq!(cfg.ans.user_agent, "test-agent");
        assert_eq!(cfg.ans.listing_timeout_seconds, 30);
    }
}
