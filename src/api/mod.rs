use axum::{
    Router,
    extract::Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;

use crate::core::{
    CapexForecast, DEFAULT_BALANCE_TOLERANCE, DEFAULT_CAPEX_LIFE, DebtTranche, EngineConfig,
    FixedAssetRecord, HistoricalAnchor, IncompleteAssumptionWarning, ModelInputs, NewDebtIssue,
    PeriodGranularity, ProjectedPeriodRecord, ProjectionOutcome, RawAssumptionTable,
    ScenarioReports, ValuationParams, ValuationResult, project,
};

pub const MAX_HORIZON: usize = 120;
const DEFAULT_HORIZON: usize = 5;
const DEFAULT_DISCOUNT_RATE: f64 = 10.0;
const DEFAULT_TERMINAL_GROWTH: f64 = 2.0;
const DEFAULT_PARTICIPATION_PERCENT: f64 = 15.0;
const DEFAULT_VALUATION_SCENARIO: &str = "Base";

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliGranularity {
    Yearly,
    Monthly,
}

impl From<CliGranularity> for PeriodGranularity {
    fn from(value: CliGranularity) -> Self {
        match value {
            CliGranularity::Yearly => PeriodGranularity::Yearly,
            CliGranularity::Monthly => PeriodGranularity::Monthly,
        }
    }
}

impl From<PeriodGranularity> for CliGranularity {
    fn from(value: PeriodGranularity) -> Self {
        match value {
            PeriodGranularity::Yearly => CliGranularity::Yearly,
            PeriodGranularity::Monthly => CliGranularity::Monthly,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "finmodel",
    version,
    about = "Three-statement financial projection with scenarios and DCF valuation"
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        default_value = "info",
        help = "Log filter used when RUST_LOG is not set"
    )]
    pub log_level: String,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Project every scenario in a model file and print the JSON result
    Project(ProjectArgs),
    /// Serve the projection API over HTTP
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

#[derive(Args, Debug)]
pub struct ProjectArgs {
    #[arg(long, value_name = "FILE", help = "Model document (JSON)")]
    pub input: PathBuf,
    #[arg(
        long,
        value_name = "FILE",
        help = "Historical statement CSV (line items as rows, periods as columns); repeatable"
    )]
    pub historical_csv: Vec<PathBuf>,
    #[arg(long, value_name = "DIR", help = "Write one CSV per scenario and statement")]
    pub export_dir: Option<PathBuf>,
    #[command(flatten)]
    pub options: ModelOptions,
}

#[derive(Args, Clone, Debug, PartialEq)]
pub struct ModelOptions {
    #[arg(long, default_value_t = DEFAULT_HORIZON, help = "Projection horizon in periods (1-120)")]
    pub horizon: usize,
    #[arg(long, value_enum, default_value_t = CliGranularity::Yearly)]
    pub granularity: CliGranularity,
    #[arg(long, default_value_t = DEFAULT_DISCOUNT_RATE, help = "Annual discount rate in percent")]
    pub discount_rate: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_TERMINAL_GROWTH,
        help = "Annual terminal growth rate in percent"
    )]
    pub terminal_growth: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_PARTICIPATION_PERCENT,
        help = "Workers' participation in percent of positive EBT"
    )]
    pub workers_participation_rate: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_CAPEX_LIFE,
        help = "Useful life in periods for driven and forecast CapEx"
    )]
    pub default_capex_life: u32,
    #[arg(long, help = "Scenario reported as the headline valuation; defaults to Base")]
    pub valuation_scenario: Option<String>,
}

/// The model as a JSON document: anchor, shared schedule inputs and one raw
/// assumption table per named scenario.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModelDocument {
    pub historical: HistoricalAnchor,
    pub fixed_assets: Vec<FixedAssetRecord>,
    pub capex: Vec<CapexForecast>,
    pub debt_tranches: Vec<DebtTranche>,
    pub new_debt: Vec<NewDebtIssue>,
    pub scenarios: BTreeMap<String, RawAssumptionTable>,
}

/// HTTP body: the model document plus optional overrides of the CLI options.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProjectPayload {
    #[serde(flatten)]
    model: ModelDocument,
    horizon: Option<usize>,
    granularity: Option<PeriodGranularity>,
    discount_rate: Option<f64>,
    terminal_growth: Option<f64>,
    workers_participation_rate: Option<f64>,
    default_capex_life: Option<u32>,
    valuation_scenario: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectRequest {
    pub model: ModelInputs,
    pub valuation_scenario: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarningResponse {
    message: String,
    #[serde(flatten)]
    detail: IncompleteAssumptionWarning,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResponse {
    name: String,
    periods: Vec<ProjectedPeriodRecord>,
    reports: ScenarioReports,
    valuation: ValuationResult,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectResponse {
    horizon: usize,
    granularity: PeriodGranularity,
    valuation_scenario: String,
    enterprise_value: Option<f64>,
    warnings: Vec<WarningResponse>,
    scenarios: Vec<ScenarioResponse>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub fn build_inputs(
    document: ModelDocument,
    options: &ModelOptions,
) -> Result<ProjectRequest, String> {
    if !(1..=MAX_HORIZON).contains(&options.horizon) {
        return Err(format!("--horizon must be between 1 and {MAX_HORIZON}"));
    }

    if !options.discount_rate.is_finite() || options.discount_rate <= -100.0 {
        return Err("--discount-rate must be a finite rate > -100".to_string());
    }

    if !options.terminal_growth.is_finite() || options.terminal_growth <= -100.0 {
        return Err("--terminal-growth must be a finite rate > -100".to_string());
    }

    if options.discount_rate <= options.terminal_growth {
        return Err("--discount-rate must be > --terminal-growth".to_string());
    }

    if !(0.0..=100.0).contains(&options.workers_participation_rate) {
        return Err("--workers-participation-rate must be between 0 and 100".to_string());
    }

    if options.default_capex_life == 0 {
        return Err("--default-capex-life must be >= 1".to_string());
    }

    if document.scenarios.is_empty() {
        return Err("model must define at least one scenario".to_string());
    }

    let valuation_scenario = match &options.valuation_scenario {
        Some(name) if document.scenarios.contains_key(name) => name.clone(),
        Some(name) => {
            return Err(format!(
                "--valuation-scenario '{name}' is not one of the model's scenarios"
            ));
        }
        None if document.scenarios.contains_key(DEFAULT_VALUATION_SCENARIO) => {
            DEFAULT_VALUATION_SCENARIO.to_string()
        }
        None => document
            .scenarios
            .keys()
            .next()
            .cloned()
            .unwrap_or_default(),
    };

    let config = EngineConfig {
        periods: options.horizon,
        granularity: options.granularity.into(),
        workers_participation_rate: options.workers_participation_rate / 100.0,
        default_capex_life: options.default_capex_life,
        balance_tolerance: DEFAULT_BALANCE_TOLERANCE,
    };

    Ok(ProjectRequest {
        model: ModelInputs {
            anchor: document.historical,
            fixed_assets: document.fixed_assets,
            capex: document.capex,
            debt_tranches: document.debt_tranches,
            new_debt: document.new_debt,
            scenarios: document.scenarios,
            config,
            valuation: ValuationParams {
                discount_rate: options.discount_rate / 100.0,
                terminal_growth: options.terminal_growth / 100.0,
            },
        },
        valuation_scenario,
    })
}

pub fn build_project_response(
    request: &ProjectRequest,
    outcome: &ProjectionOutcome,
) -> ProjectResponse {
    let scenarios = outcome
        .results
        .iter()
        .filter_map(|(name, result)| {
            Some(ScenarioResponse {
                name: name.clone(),
                periods: result.periods.clone(),
                reports: outcome.reports.get(name)?.clone(),
                valuation: outcome.valuations.get(name)?.clone(),
            })
        })
        .collect();

    ProjectResponse {
        horizon: request.model.config.periods,
        granularity: request.model.config.granularity,
        valuation_scenario: request.valuation_scenario.clone(),
        enterprise_value: outcome
            .valuations
            .get(&request.valuation_scenario)
            .map(|valuation| valuation.enterprise_value),
        warnings: outcome
            .warnings
            .iter()
            .map(|warning| WarningResponse {
                message: warning.to_string(),
                detail: warning.clone(),
            })
            .collect(),
        scenarios,
    }
}

pub fn router() -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/project", post(project_handler))
        .fallback(not_found_handler)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "finmodel HTTP API listening");

    axum::serve(listener, router()).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn project_handler(Json(payload): Json<ProjectPayload>) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    match project(&request.model) {
        Ok(outcome) => json_response(
            StatusCode::OK,
            build_project_response(&request, &outcome),
        ),
        Err(err) => {
            tracing::warn!(error = %err, "projection rejected");
            error_response(StatusCode::UNPROCESSABLE_ENTITY, &err.to_string())
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ProjectRequest, String> {
    let payload = serde_json::from_str::<ProjectPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: ProjectPayload) -> Result<ProjectRequest, String> {
    let mut options = default_options();

    if let Some(v) = payload.horizon {
        options.horizon = v;
    }
    if let Some(v) = payload.granularity {
        options.granularity = v.into();
    }
    if let Some(v) = payload.discount_rate {
        options.discount_rate = v;
    }
    if let Some(v) = payload.terminal_growth {
        options.terminal_growth = v;
    }
    if let Some(v) = payload.workers_participation_rate {
        options.workers_participation_rate = v;
    }
    if let Some(v) = payload.default_capex_life {
        options.default_capex_life = v;
    }
    if payload.valuation_scenario.is_some() {
        options.valuation_scenario = payload.valuation_scenario;
    }

    build_inputs(payload.model, &options)
}

fn default_options() -> ModelOptions {
    ModelOptions {
        horizon: DEFAULT_HORIZON,
        granularity: CliGranularity::Yearly,
        discount_rate: DEFAULT_DISCOUNT_RATE,
        terminal_growth: DEFAULT_TERMINAL_GROWTH,
        workers_participation_rate: DEFAULT_PARTICIPATION_PERCENT,
        default_capex_life: DEFAULT_CAPEX_LIFE,
        valuation_scenario: None,
    }
}
