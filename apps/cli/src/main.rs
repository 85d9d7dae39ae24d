//! Rolewatch command line runtime.

#![forbid(unsafe_code)]

mod cli_config;
mod render;

use std::env;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use rolewatch_application::{BootstrapService, DriftService};
use rolewatch_core::{AppError, AppResult};
use rolewatch_domain::DriftSummary;
use rolewatch_infrastructure::{ArmAssignmentProvider, TerraformStateRepository};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli_config::CliConfig;

const EXIT_DRIFT_FOUND: u8 = 1;
const EXIT_READ_FAILURES: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    match run().await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("rolewatch: {error}");
            ExitCode::from(EXIT_READ_FAILURES)
        }
    }
}

async fn run() -> AppResult<ExitCode> {
    let mode = env::args().nth(1).unwrap_or_else(|| "check".to_owned());
    let config = CliConfig::load()?;

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;
    let provider = Arc::new(ArmAssignmentProvider::new(
        http_client,
        config.provider.clone(),
    )?);
    let state = Arc::new(TerraformStateRepository::new(config.state_locations()));

    match mode.as_str() {
        "check" => run_check(&config, provider, state).await,
        "bootstrap" => run_bootstrap(&config, provider, state).await,
        other => Err(AppError::Validation(format!(
            "unknown mode '{other}', expected 'check' or 'bootstrap'"
        ))),
    }
}

async fn run_check(
    config: &CliConfig,
    provider: Arc<ArmAssignmentProvider>,
    state: Arc<TerraformStateRepository>,
) -> AppResult<ExitCode> {
    let targets = config.targets()?;
    let service = DriftService::new(provider, state);

    let report = service.check_environments(targets.as_slice()).await;
    let summary = report.summary();

    print!("{}", render::console_report(&report));

    if let Some(report_dir) = config.report_dir.as_deref() {
        write_report_files(report_dir, &summary)?;
    }

    info!(
        environments = targets.len(),
        failures = report.failed_environments().len(),
        total_drift = summary.total(),
        "drift check finished"
    );

    if report.has_failures() {
        return Ok(ExitCode::from(EXIT_READ_FAILURES));
    }
    if summary.has_drift() {
        return Ok(ExitCode::from(EXIT_DRIFT_FOUND));
    }

    Ok(ExitCode::SUCCESS)
}

async fn run_bootstrap(
    config: &CliConfig,
    provider: Arc<ArmAssignmentProvider>,
    state: Arc<TerraformStateRepository>,
) -> AppResult<ExitCode> {
    let Some(environment) = env::args().nth(2) else {
        return Err(AppError::Validation(
            "bootstrap requires an environment name".to_owned(),
        ));
    };
    let target = config
        .targets()?
        .into_iter()
        .find(|target| target.name.as_str() == environment)
        .ok_or_else(|| {
            AppError::Validation(format!("environment '{environment}' is not configured"))
        })?;

    let service = BootstrapService::new(provider, state);
    let plan = service.plan_imports(&target).await?;

    let variable_document = serde_json::to_string_pretty(&render::variable_entries(&plan))
        .map_err(|error| {
            AppError::Internal(format!("failed to serialize variable entries: {error}"))
        })?;

    print!("{}", render::import_directives(&plan));
    println!("{variable_document}");

    info!(
        environment = %plan.environment,
        entry_count = plan.entries.len(),
        "bootstrap plan rendered"
    );

    Ok(ExitCode::SUCCESS)
}

fn write_report_files(report_dir: &Path, summary: &DriftSummary) -> AppResult<()> {
    std::fs::create_dir_all(report_dir).map_err(|error| {
        AppError::Internal(format!(
            "failed to create report directory '{}': {error}",
            report_dir.display()
        ))
    })?;

    let csv_path = report_dir.join("drift-report.csv");
    std::fs::write(csv_path.as_path(), render::csv_report(summary)).map_err(|error| {
        AppError::Internal(format!(
            "failed to write '{}': {error}",
            csv_path.display()
        ))
    })?;

    let markdown_path = report_dir.join("drift-report.md");
    std::fs::write(markdown_path.as_path(), render::markdown_report(summary)).map_err(|error| {
        AppError::Internal(format!(
            "failed to write '{}': {error}",
            markdown_path.display()
        ))
    })?;

    info!(report_dir = %report_dir.display(), "report files written");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
