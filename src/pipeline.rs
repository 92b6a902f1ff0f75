use crate::aggregate::run_aggregation;
use crate::config::Config;
use crate::consolidate::run_consolidation;
use crate::enrich::run_enrichment;
use crate::error::Result;
use crate::paths::DataPaths;
use crate::staging::run_normalization;
use metrics::histogram;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, instrument};

/// Outcome of one pipeline stage, for the CLI summary.
#[derive(Debug)]
pub struct StageReport {
    pub stage: &'static str,
    pub outputs: Vec<PathBuf>,
    pub duration_secs: f64,
}

#[derive(Debug, Default)]
pub struct PipelineReport {
    pub stages: Vec<StageReport>,
}

impl PipelineReport {
    fn record(&mut self, stage: &'static str, started: Instant, outputs: Vec<PathBuf>) {
        let duration_secs = started.elapsed().as_secs_f64();
        histogram!("ans_stage_duration_seconds", "stage" => stage).record(duration_secs);
        info!(stage, duration_secs, "stage finished");
        self.stages.push(StageReport { stage, outputs, duration_secs });
    }
}

/// Runs the whole pipeline sequentially: normalize (downloading raw archives
/// when absent), consolidate, enrich, aggregate. Each stage persists its
/// output file before the next one starts; there is no cross-stage streaming
/// and no partial-success continuation.
#[instrument(skip(cfg))]
pub async fn run_full_pipeline(cfg: &Config, zip_name: Option<&str>) -> Result<PipelineReport> {
    let paths = DataPaths::new(&cfg.ans.data_dir);
    let mut report = PipelineReport::default();

    let started = Instant::now();
    let staging = run_normalization(&cfg.ans, &paths).await?;
    report.record("normalize", started, vec![staging]);

    let started = Instant::now();
    let (consolidated, consolidated_zip) = run_consolidation(&paths)?;
    report.record("consolidate", started, vec![consolidated, consolidated_zip]);

    let started = Instant::now();
    let (enriched, enriched_zip) = run_enrichment(&cfg.ans, &paths).await?;
    report.record("enrich", started, vec![enriched, enriched_zip]);

    let started = Instant::now();
    let (aggregated, package) = run_aggregation(&paths, zip_name)?;
    report.record("aggregate", started, vec![aggregated, package]);

    Ok(report)
}
