mod assumptions;
mod debt;
mod depreciation;
mod engine;
mod error;
mod reports;
mod scenarios;
mod types;
mod valuation;

pub use assumptions::{resolve_all, resolve_assumptions};
pub use debt::build_debt_schedule;
pub use depreciation::build_depreciation_schedule;
pub use engine::{EngineInput, MAX_PERIODS, roll_forward};
pub use error::{IncompleteAssumptionWarning, MissingAssumption, ModelError, ModelResult};
pub use reports::{
    ReportKind, ScenarioReports, StatementRow, StatementTable, build_reports, period_labels,
};
pub use scenarios::{ModelInputs, ProjectionOutcome, project, run_scenarios};
pub use types::{
    AssumptionKey, AssumptionSet, CapexForecast, DEFAULT_BALANCE_TOLERANCE, DEFAULT_CAPEX_LIFE,
    DEFAULT_WORKERS_PARTICIPATION_RATE, DebtScheduleEntry, DebtTranche, DepreciationScheduleEntry,
    EngineConfig, FixedAssetRecord, HistoricalAnchor, NewDebtIssue, PeriodGranularity,
    ProjectedPeriodRecord, RawAssumption, RawAssumptionTable, ScenarioResult, ValuationParams,
    ValuationResult,
};
pub use valuation::{discounted_cash_flow, value_scenario};
