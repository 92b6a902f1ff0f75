use ans_etl::aggregate::run_aggregation;
use ans_etl::config::Config;
use ans_etl::consolidate::run_consolidation;
use ans_etl::enrich::run_enrichment;
use ans_etl::fetch::run_download;
use ans_etl::logging;
use ans_etl::paths::DataPaths;
use ans_etl::pipeline::run_full_pipeline;
use ans_etl::staging::run_normalization;
use clap::{Parser, Subcommand};
use tracing::error;

#[derive(Parser)]
#[command(name = "ans_etl")]
#[command(about = "ETL pipeline for ANS quarterly expense statements")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the 3 most recent quarters of accounting statements
    Download,
    /// Extract raw archives and build the expense staging file (downloads first if raw/ is empty)
    Normalize,
    /// Consolidate staged expenses per (operator, year, quarter)
    Consolidate,
    /// Join against the operator registry and flag validation results
    Enrich,
    /// Aggregate enriched expenses per (legal name, UF)
    Aggregate {
        /// Name for the packaged zip (sanitized); defaults to despesas_agregadas.zip
        #[arg(long)]
        zip_name: Option<String>,
    },
    /// Run the full pipeline: normalize, consolidate, enrich, aggregate
    Run {
        /// Name for the final packaged zip
        #[arg(long)]
        zip_name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load()?;
    let paths = DataPaths::new(&config.ans.data_dir);

    let outcome = match cli.command {
        Commands::Download => {
            println!("⬇️  Running download stage...");
            run_download(&config.ans, &paths).await.map(|files| {
                println!("✅ Downloaded {} file(s) to {}", files.len(), paths.raw_dir().display());
            })
        }
        Commands::Normalize => {
            println!("🔄 Running normalization stage...");
            run_normalization(&config.ans, &paths).await.map(|staging| {
                println!("✅ Staging file: {}", staging.display());
            })
        }
        Commands::Consolidate => {
            println!("🧮 Running consolidation stage...");
            run_consolidation(&paths).map(|(csv, zip)| {
                println!("✅ Generated: {}", csv.display());
                println!("📦 Packaged:  {}", zip.display());
            })
        }
        Commands::Enrich => {
            println!("🔎 Running enrichment/validation stage...");
            run_enrichment(&config.ans, &paths).await.map(|(csv, zip)| {
                println!("✅ Generated: {}", csv.display());
                println!("📦 Packaged:  {}", zip.display());
            })
        }
        Commands::Aggregate { zip_name } => {
            println!("📊 Running aggregation stage...");
            run_aggregation(&paths, zip_name.as_deref()).map(|(csv, zip)| {
                println!("✅ Generated: {}", csv.display());
                println!("📦 Packaged:  {}", zip.display());
            })
        }
        Commands::Run { zip_name } => {
            println!("🚀 Running full pipeline...");
            run_full_pipeline(&config, zip_name.as_deref()).await.map(|report| {
                println!("\n📊 Pipeline summary:");
                for stage in &report.stages {
                    println!("   {} ({:.1}s)", stage.stage, stage.duration_secs);
                    for output in &stage.outputs {
                        println!("      → {}", output.display());
                    }
                }
                println!("✅ Full pipeline completed successfully!");
            })
        }
    };

    if let Err(e) = outcome {
        error!("stage failed: {}", e);
        println!("❌ {}", e);
        std::process::exit(1);
    }
    Ok(())
}
