use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use batch_diagnosis::models::load_images_from_folder;
use batch_diagnosis::utils::logging;
use batch_diagnosis::{
    format_report_text, Config, DiagnosisPipeline, PipelineError, Report, RunRequest,
    VisionService,
};
use tracing::{error, warn};

/// 配置文件路径，可通过 `DIAGNOSIS_CONFIG` 覆盖
const DEFAULT_CONFIG_FILE: &str = "batch_diagnosis.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config_path = std::env::var("DIAGNOSIS_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = Config::load_layered(Some(&config_path)).context("加载配置失败")?;

    // 初始化日志
    logging::init(config.verbose_logging);
    logging::log_startup(config.batch_size, &config.llm_model_name);

    if config.llm_api_key.is_empty() {
        warn!("⚠️ 未设置 LLM_API_KEY，推理请求可能被拒绝");
    }

    let images = load_images_from_folder(&config.image_folder).await?;

    let run_id = std::env::var("RUN_ID")
        .unwrap_or_else(|_| chrono::Utc::now().format("%Y%m%d%H%M%S").to_string());
    let mut request = RunRequest::new(run_id, images);
    if let Ok(patient_id) = std::env::var("PATIENT_ID") {
        request = request.with_patient_id(patient_id);
    }
    if let Ok(instruction) = std::env::var("CUSTOM_INSTRUCTION") {
        request = request.with_instruction(instruction);
    }

    let pipeline = DiagnosisPipeline::from_config(VisionService::new(&config), &config)?;

    match pipeline.run(request).await {
        Ok(outcome) => {
            write_exports(&outcome.report, Path::new(&config.report_output_dir)).await?;
            logging::print_final_stats(&outcome);
            Ok(())
        }
        Err(PipelineError::AllBatchesFailed { detail, .. }) => {
            error!("❌ 所有批次均失败，未生成报告");
            anyhow::bail!("所有批次均失败:\n{}", detail)
        }
        Err(e) => Err(e.into()),
    }
}

/// 写出 `{report_id}.txt` 和 `{report_id}.json`
async fn write_exports(report: &Report, output_dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("无法创建输出目录: {}", output_dir.display()))?;

    let text_path = output_dir.join(format!("{}.txt", report.id));
    tokio::fs::write(&text_path, format_report_text(report))
        .await
        .with_context(|| format!("无法写入报告: {}", text_path.display()))?;

    let json_path = output_dir.join(format!("{}.json", report.id));
    let json = serde_json::to_string_pretty(report)?;
    tokio::fs::write(&json_path, json)
        .await
        .with_context(|| format!("无法写入报告: {}", json_path.display()))?;

    tracing::info!("\n报告已保存至: {}", text_path.display());
    Ok(())
}
