use std::path::{Path, PathBuf};

pub const STAGING_FILE_NAME: &str = "eventos_sinistros_staging.csv";
pub const CONSOLIDATED_FILE_NAME: &str = "consolidado_despesas.csv";
pub const ENRICHED_FILE_NAME: &str = "consolidado_despesas_final.csv";
pub const AGGREGATED_FILE_NAME: &str = "despesas_agregadas.csv";

/// Well-known directory layout shared by every pipeline stage. Each stage's
/// precondition is that the prior stage's file exists at its path here.
#[derive(Debug, Clone)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.root.join("raw")
    }

    pub fn extracted_dir(&self) -> PathBuf {
        self.root.join("extracted")
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.root.join("staging")
    }

    pub fn staging_file(&self) -> PathBuf {
        self.staging_dir().join(STAGING_FILE_NAME)
    }

    pub fn teste1_dir(&self) -> PathBuf {
        self.root.join("output").join("teste1")
    }

    pub fn consolidated_file(&self) -> PathBuf {
        self.teste1_dir().join(CONSOLIDATED_FILE_NAME)
    }

    pub fn consolidated_zip(&self) -> PathBuf {
        self.teste1_dir().join("consolidado_despesas.zip")
    }

    pub fn teste2_dir(&self) -> PathBuf {
        self.root.join("output").join("teste2")
    }

    pub fn enriched_file(&self) -> PathBuf {
        self.teste2_dir().join(ENRICHED_FILE_NAME)
    }

    pub fn enriched_zip(&self) -> PathBuf {
        self.teste2_dir().join("consolidado_despesas_final.zip")
    }

    pub fn aggregated_file(&self) -> PathBuf {
        self.teste2_dir().join(AGGREGATED_FILE_NAME)
    }

    pub fn registry_file(&self, file_name: &str) -> PathBuf {
        self.raw_dir().join(file_name)
    }
}
