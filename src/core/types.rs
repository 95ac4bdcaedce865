use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodGranularity {
    #[default]
    Yearly,
    Monthly,
}

impl PeriodGranularity {
    pub fn periods_per_year(self) -> u32 {
        match self {
            PeriodGranularity::Yearly => 1,
            PeriodGranularity::Monthly => 12,
        }
    }

    /// Day-count divisor for working-capital lines.
    pub fn days_per_period(self) -> f64 {
        365.0 / self.periods_per_year() as f64
    }
}

/// Last actual snapshot; the seed for period 0's "previous" values.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HistoricalAnchor {
    pub base_period_label: Option<String>,
    pub revenue: f64,
    pub cogs: f64,
    pub operating_expenses: f64,
    pub cash: f64,
    pub receivables: f64,
    pub inventory: f64,
    pub fixed_assets: f64,
    pub other_assets: f64,
    pub payables: f64,
    pub short_term_debt: f64,
    pub long_term_debt: f64,
    pub other_liabilities: f64,
    /// Contributed capital and other equity, excluding retained earnings.
    pub equity: f64,
    pub retained_earnings: f64,
}

impl HistoricalAnchor {
    pub fn total_debt(&self) -> f64 {
        self.short_term_debt + self.long_term_debt
    }

    pub fn total_assets(&self) -> f64 {
        self.cash + self.receivables + self.inventory + self.fixed_assets + self.other_assets
    }

    pub fn total_liabilities(&self) -> f64 {
        self.payables + self.total_debt() + self.other_liabilities
    }

    pub fn total_equity(&self) -> f64 {
        self.equity + self.retained_earnings
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssumptionKey {
    RevenueGrowth,
    CogsPct,
    AdminPct,
    SalesPct,
    OtherIncomePct,
    OtherExpensePct,
    DaysReceivable,
    DaysInventory,
    DaysPayable,
    TaxRate,
    InterestRateOnCash,
    MinimumCashBalance,
    DepreciationPct,
    CapexPct,
}

impl AssumptionKey {
    pub const ALL: [AssumptionKey; 14] = [
        AssumptionKey::RevenueGrowth,
        AssumptionKey::CogsPct,
        AssumptionKey::AdminPct,
        AssumptionKey::SalesPct,
        AssumptionKey::OtherIncomePct,
        AssumptionKey::OtherExpensePct,
        AssumptionKey::DaysReceivable,
        AssumptionKey::DaysInventory,
        AssumptionKey::DaysPayable,
        AssumptionKey::TaxRate,
        AssumptionKey::InterestRateOnCash,
        AssumptionKey::MinimumCashBalance,
        AssumptionKey::DepreciationPct,
        AssumptionKey::CapexPct,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AssumptionKey::RevenueGrowth => "Revenue Growth %",
            AssumptionKey::CogsPct => "COGS % of Revenue",
            AssumptionKey::AdminPct => "Administrative Expenses % of Revenue",
            AssumptionKey::SalesPct => "Sales Expenses % of Revenue",
            AssumptionKey::OtherIncomePct => "Other Income % of Revenue",
            AssumptionKey::OtherExpensePct => "Other Expenses % of Revenue",
            AssumptionKey::DaysReceivable => "Days Receivables",
            AssumptionKey::DaysInventory => "Days Inventory",
            AssumptionKey::DaysPayable => "Days Payables",
            AssumptionKey::TaxRate => "Tax Rate %",
            AssumptionKey::InterestRateOnCash => "Interest Rate on Cash %",
            AssumptionKey::MinimumCashBalance => "Minimum Cash Balance",
            AssumptionKey::DepreciationPct => "Depreciation % of PPE",
            AssumptionKey::CapexPct => "CapEx % of Revenue",
        }
    }
}

/// One assumption as entered: either a single value for every period or an
/// explicit per-period sequence.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawAssumption {
    pub same_every_period: bool,
    pub values: Vec<f64>,
}

impl RawAssumption {
    pub fn constant(value: f64) -> Self {
        Self {
            same_every_period: true,
            values: vec![value],
        }
    }

    pub fn per_period(values: Vec<f64>) -> Self {
        Self {
            same_every_period: false,
            values,
        }
    }

    /// Values after the first when the constant flag is set; they are never read.
    pub fn ignored_values(&self) -> &[f64] {
        match self.values.split_first() {
            Some((_, rest)) if self.same_every_period => rest,
            _ => &[],
        }
    }
}

pub type RawAssumptionTable = BTreeMap<AssumptionKey, RawAssumption>;

/// Dense per-period assumptions for one scenario. Every key is present and
/// every sequence has exactly `periods` entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssumptionSet {
    periods: usize,
    values: BTreeMap<AssumptionKey, Vec<f64>>,
}

impl AssumptionSet {
    /// All keys at zero effect.
    pub fn uniform(periods: usize) -> Self {
        let values = AssumptionKey::ALL
            .iter()
            .map(|key| (*key, vec![0.0; periods]))
            .collect();
        Self { periods, values }
    }

    /// Replaces one key's sequence. The sequence is truncated or zero-padded
    /// to the set's period count.
    pub fn with(mut self, key: AssumptionKey, mut values: Vec<f64>) -> Self {
        values.resize(self.periods, 0.0);
        self.values.insert(key, values);
        self
    }

    pub fn with_constant(self, key: AssumptionKey, value: f64) -> Self {
        let periods = self.periods;
        self.with(key, vec![value; periods])
    }

    /// What-if variant with one key multiplied by `factor` in every period.
    pub fn scaled(&self, key: AssumptionKey, factor: f64) -> Self {
        let mut next = self.clone();
        if let Some(series) = next.values.get_mut(&key) {
            for value in series.iter_mut() {
                *value *= factor;
            }
        }
        next
    }

    pub fn periods(&self) -> usize {
        self.periods
    }

    pub fn value(&self, key: AssumptionKey, period: usize) -> f64 {
        self.values
            .get(&key)
            .and_then(|series| series.get(period))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn series(&self, key: AssumptionKey) -> &[f64] {
        self.values.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedAssetRecord {
    #[serde(default)]
    pub name: String,
    pub cost: f64,
    /// Periods; values <= 0 are expensed in full in period 0.
    pub useful_life: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapexForecast {
    pub period: usize,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepreciationScheduleEntry {
    pub period: usize,
    pub depreciation: f64,
    pub capex: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtTranche {
    #[serde(default)]
    pub name: String,
    pub balance: f64,
    pub annual_rate: f64,
    /// Amortization periods; 0 means interest-only for the whole horizon.
    pub term: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDebtIssue {
    pub period: usize,
    pub amount: f64,
    pub annual_rate: f64,
    pub term: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtScheduleEntry {
    pub period: usize,
    pub beginning_balance: f64,
    pub interest_expense: f64,
    pub principal_payment: f64,
    pub new_debt: f64,
    pub ending_balance: f64,
}

pub const DEFAULT_WORKERS_PARTICIPATION_RATE: f64 = 0.15;
pub const DEFAULT_CAPEX_LIFE: u32 = 5;
pub const DEFAULT_BALANCE_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub periods: usize,
    pub granularity: PeriodGranularity,
    pub workers_participation_rate: f64,
    pub default_capex_life: u32,
    pub balance_tolerance: f64,
}

impl EngineConfig {
    pub fn new(periods: usize) -> Self {
        Self {
            periods,
            granularity: PeriodGranularity::Yearly,
            workers_participation_rate: DEFAULT_WORKERS_PARTICIPATION_RATE,
            default_capex_life: DEFAULT_CAPEX_LIFE,
            balance_tolerance: DEFAULT_BALANCE_TOLERANCE,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedPeriodRecord {
    pub period: usize,

    pub revenue: f64,
    pub cogs: f64,
    pub gross_profit: f64,
    pub admin: f64,
    pub sales: f64,
    pub other_income: f64,
    pub other_expense: f64,
    pub ebitda: f64,
    pub depreciation: f64,
    pub ebit: f64,
    pub interest_expense: f64,
    pub interest_income: f64,
    pub ebt: f64,
    pub workers_participation: f64,
    pub taxable_income: f64,
    pub taxes: f64,
    pub net_income: f64,

    pub receivables: f64,
    pub inventory: f64,
    pub payables: f64,
    pub change_in_receivables: f64,
    pub change_in_inventory: f64,
    pub change_in_payables: f64,
    pub change_in_nwc: f64,
    pub capex: f64,
    pub free_cash_flow: f64,

    pub cfo: f64,
    pub cfi: f64,
    pub cff: f64,
    pub new_debt: f64,
    pub principal_payment: f64,
    pub net_cash_flow: f64,

    pub cash: f64,
    pub ppe: f64,
    pub other_assets: f64,
    pub total_assets: f64,
    pub debt: f64,
    pub other_liabilities: f64,
    pub total_liabilities: f64,
    pub equity: f64,
    pub retained_earnings: f64,
    pub total_equity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResult {
    pub name: String,
    pub periods: Vec<ProjectedPeriodRecord>,
}

impl ScenarioResult {
    pub fn free_cash_flows(&self) -> Vec<f64> {
        self.periods.iter().map(|p| p.free_cash_flow).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuationParams {
    pub discount_rate: f64,
    pub terminal_growth: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuationResult {
    pub scenario: String,
    pub discount_rate: f64,
    pub terminal_growth: f64,
    pub discounted_fcf: Vec<f64>,
    pub pv_fcf: f64,
    pub terminal_value: f64,
    pub pv_terminal: f64,
    pub enterprise_value: f64,
}
