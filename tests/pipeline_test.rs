use ans_etl::aggregate::run_aggregation;
use ans_etl::config::AnsConfig;
use ans_etl::consolidate::run_consolidation;
use ans_etl::enrich::run_enrichment;
use ans_etl::paths::DataPaths;
use ans_etl::staging::run_normalization;
use anyhow::Result;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

fn write_quarter_zip(path: &Path, csv_name: &str, csv_body: &str) -> Result<()> {
    let mut writer = ZipWriter::new(File::create(path)?);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    writer.start_file(csv_name, options)?;
    writer.write_all(csv_body.as_bytes())?;
    writer.start_file("leiame.txt", options)?;
    writer.write_all(b"arquivo auxiliar")?;
    writer.finish()?;
    Ok(())
}

/// Full offline run over fixture archives: normalize -> consolidate ->
/// enrich -> aggregate, asserting the well-known files stages hand each
/// other plus the final summary content.
#[tokio::test]
async fn full_pipeline_over_fixture_archives() -> Result<()> {
    let dir = tempdir()?;
    let paths = DataPaths::new(dir.path());
    let cfg = AnsConfig {
        data_dir: dir.path().to_string_lossy().into_owned(),
        ..AnsConfig::default()
    };

    fs::create_dir_all(paths.raw_dir())?;
    write_quarter_zip(
        &paths.raw_dir().join("1T2023.zip"),
        "1T2023.csv",
        "DATA;REG_ANS;CD_CONTA_CONTABIL;DESCRICAO;VL_SALDO_INICIAL;VL_SALDO_FINAL\n\
         01/01/2023;123456;411;DESPESAS COM EVENTOS / SINISTROS;0,00;100,00\n\
         01/02/2023;123456;411;DESPESAS COM EVENTOS / SINISTROS;0,00;200,00\n\
         01/03/2023;123456;411;DESPESAS COM EVENTOS / SINISTROS;0,00;-50,00\n\
         01/01/2023;123456;412;DESPESAS ADMINISTRATIVAS;0,00;999,99\n\
         01/01/2023;654321;411;Despesa de Sinistros conhecidos;0,00;50,00\n",
    )?;
    write_quarter_zip(
        &paths.raw_dir().join("2T2023.zip"),
        "2T2023.csv",
        "DATA;REG_ANS;CD_CONTA_CONTABIL;DESCRICAO;VL_SALDO_INICIAL;VL_SALDO_FINAL\n\
         01/04/2023;123456;411;DESPESAS COM EVENTOS / SINISTROS;0,00;100,00\n",
    )?;

    // Local registry copy keeps the enrichment stage off the network.
    fs::write(
        paths.registry_file(&cfg.registry_file_name),
        "Registro ANS;CNPJ;Razão Social;Modalidade;UF\n\
         123456;11.444.777/0001-61;OPERADORA ALFA;Medicina de Grupo;SP\n\
         654321;;OPERADORA BETA;Cooperativa;RJ\n",
    )?;

    // Stage 1: normalize
    let staging = run_normalization(&cfg, &paths).await?;
    assert_eq!(staging, paths.staging_file());
    let staging_content = fs::read_to_string(&staging)?;
    // 1 header + 4 expense rows across both archives; admin row filtered out
    assert_eq!(staging_content.lines().count(), 5);
    assert!(staging_content.starts_with("data,reg_ans,cd_conta_contabil,descricao"));
    assert!(staging_content.contains("2023-01-01,123456,411,DESPESAS COM EVENTOS / SINISTROS,0.00,100.00,2023,1,1T2023.csv"));
    assert!(staging_content.contains(",2023,2,2T2023.csv"));
    assert!(!staging_content.contains("ADMINISTRATIVAS"));

    // Stage 2: consolidate
    let (consolidated, consolidated_zip) = run_consolidation(&paths)?;
    assert!(consolidated_zip.exists());
    let consolidated_content = fs::read_to_string(&consolidated)?;
    let lines: Vec<&str> = consolidated_content.lines().collect();
    assert_eq!(lines[0], "RegistroANS;RazaoSocial;Trimestre;Ano;ValorDespesas");
    // negative balance excluded from the 1T total
    assert!(lines.contains(&"123456;NÃO INFORMADA;1;2023;300.00"));
    assert!(lines.contains(&"123456;NÃO INFORMADA;2;2023;100.00"));
    assert!(lines.contains(&"654321;NÃO INFORMADA;1;2023;50.00"));
    assert_eq!(lines.len(), 4);

    // Stage 3: enrich + validate
    let (enriched, enriched_zip) = run_enrichment(&cfg, &paths).await?;
    assert!(enriched_zip.exists());
    let enriched_content = fs::read_to_string(&enriched)?;
    assert!(enriched_content
        .contains("123456;11444777000161;OPERADORA ALFA;Medicina de Grupo;SP;1;2023;300.00;1;1;1;"));
    // operator without CNPJ: flagged, still present
    assert!(enriched_content.contains("654321;;OPERADORA BETA;Cooperativa;RJ;1;2023;50.00;0;1;1;cnpj_invalido"));

    // Stage 4: aggregate
    let (aggregated, package) = run_aggregation(&paths, Some("Entrega Final"))?;
    assert!(package.ends_with("Teste_Entrega_Final.zip"));
    assert!(package.exists());

    let aggregated_content = fs::read_to_string(&aggregated)?;
    let lines: Vec<&str> = aggregated_content.lines().collect();
    assert_eq!(
        lines[0],
        "RazaoSocial;UF;total_despesas;media_trimestral;desvio_padrao;qtd_registros"
    );
    // ALFA: quarters 300.00 and 100.00 -> total 400, mean 200, pop std dev 100
    assert_eq!(lines[1], "OPERADORA ALFA;SP;400.00;200.00;100.00;2");
    // BETA aggregated despite its invalid-CNPJ flag
    assert_eq!(lines[2], "OPERADORA BETA;RJ;50.00;50.00;0.00;1");
    assert_eq!(lines.len(), 3);

    Ok(())
}

/// Re-running a stage regenerates its output instead of stacking onto the
/// previous run's file.
#[tokio::test]
async fn consolidation_is_repeatable() -> Result<()> {
    let dir = tempdir()?;
    let paths = DataPaths::new(dir.path());

    fs::create_dir_all(paths.staging_dir())?;
    fs::write(
        paths.staging_file(),
        "data,reg_ans,cd_conta_contabil,descricao,vl_saldo_inicial,vl_saldo_final,ano,trimestre,fonte_arquivo\n\
         2023-01-01,111,41,DESPESA EVENTOS,,10.00,2023,1,a.csv\n",
    )?;

    let (first, _) = run_consolidation(&paths)?;
    let first_content = fs::read_to_string(&first)?;
    let (second, _) = run_consolidation(&paths)?;
    let second_content = fs::read_to_string(&second)?;
    assert_eq!(first_content, second_content);

    Ok(())
}
