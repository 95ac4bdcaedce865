use super::depreciation::straight_line_into;
use super::error::{ModelError, ModelResult, config_error};
use super::types::{
    AssumptionKey, AssumptionSet, DebtScheduleEntry, DepreciationScheduleEntry, EngineConfig,
    HistoricalAnchor, ProjectedPeriodRecord, ScenarioResult,
};

/// Upper bound on the projection horizon (50 years of months).
pub const MAX_PERIODS: usize = 600;

/// Everything one scenario's roll-forward reads. Nothing here is mutated.
#[derive(Debug, Clone, Copy)]
pub struct EngineInput<'a> {
    pub scenario: &'a str,
    pub anchor: &'a HistoricalAnchor,
    pub assumptions: &'a AssumptionSet,
    pub depreciation: &'a [DepreciationScheduleEntry],
    pub debt: &'a [DebtScheduleEntry],
    pub config: &'a EngineConfig,
}

/// Balances carried from one period into the next.
#[derive(Debug, Clone, Copy)]
struct CarryForward {
    revenue: f64,
    receivables: f64,
    inventory: f64,
    payables: f64,
    cash: f64,
    ppe: f64,
    retained_earnings: f64,
}

impl CarryForward {
    fn from_anchor(anchor: &HistoricalAnchor) -> Self {
        Self {
            revenue: anchor.revenue,
            receivables: anchor.receivables,
            inventory: anchor.inventory,
            payables: anchor.payables,
            cash: anchor.cash,
            ppe: anchor.fixed_assets,
            retained_earnings: anchor.retained_earnings,
        }
    }

    fn from_record(record: &ProjectedPeriodRecord) -> Self {
        Self {
            revenue: record.revenue,
            receivables: record.receivables,
            inventory: record.inventory,
            payables: record.payables,
            cash: record.cash,
            ppe: record.ppe,
            retained_earnings: record.retained_earnings,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct IncomeLines {
    revenue: f64,
    cogs: f64,
    admin: f64,
    sales: f64,
    other_income: f64,
    other_expense: f64,
}

impl IncomeLines {
    fn project(assumptions: &AssumptionSet, period: usize, prior_revenue: f64) -> Self {
        let pct = |key| assumptions.value(key, period);
        let revenue = prior_revenue * (1.0 + pct(AssumptionKey::RevenueGrowth));
        Self {
            revenue,
            cogs: revenue * pct(AssumptionKey::CogsPct),
            admin: revenue * pct(AssumptionKey::AdminPct),
            sales: revenue * pct(AssumptionKey::SalesPct),
            other_income: revenue * pct(AssumptionKey::OtherIncomePct),
            other_expense: revenue * pct(AssumptionKey::OtherExpensePct),
        }
    }

    fn ebitda(self) -> f64 {
        self.revenue - self.cogs - self.admin - self.sales
    }
}

#[derive(Debug, Clone, Copy)]
struct WorkingCapital {
    receivables: f64,
    inventory: f64,
    payables: f64,
}

impl WorkingCapital {
    fn project(
        assumptions: &AssumptionSet,
        period: usize,
        lines: &IncomeLines,
        days_per_period: f64,
    ) -> Self {
        let days = |key| assumptions.value(key, period);
        Self {
            receivables: days_balance(
                lines.revenue,
                days(AssumptionKey::DaysReceivable),
                days_per_period,
            ),
            inventory: days_balance(
                lines.cogs,
                days(AssumptionKey::DaysInventory),
                days_per_period,
            ),
            payables: days_balance(lines.cogs, days(AssumptionKey::DaysPayable), days_per_period),
        }
    }
}

/// Projects one scenario period by period. Period `i` reads only period
/// `i - 1` (or the anchor), and records are never revisited once pushed.
pub fn roll_forward(input: &EngineInput<'_>) -> ModelResult<ScenarioResult> {
    validate_input(input)?;

    let periods = input.config.periods;
    let mut carry = CarryForward::from_anchor(input.anchor);
    let mut driven_depreciation = vec![0.0; periods];
    let mut records = Vec::with_capacity(periods);

    for period in 0..periods {
        let record = project_period(input, period, &carry, &mut driven_depreciation);
        check_balance(input.scenario, &record, input.config.balance_tolerance)?;
        carry = CarryForward::from_record(&record);
        records.push(record);
    }

    tracing::debug!(scenario = input.scenario, periods, "roll-forward complete");

    Ok(ScenarioResult {
        name: input.scenario.to_string(),
        periods: records,
    })
}

fn project_period(
    input: &EngineInput<'_>,
    period: usize,
    prior: &CarryForward,
    driven_depreciation: &mut [f64],
) -> ProjectedPeriodRecord {
    let assumptions = input.assumptions;
    let config = input.config;
    let anchor = input.anchor;
    let scheduled = input.depreciation[period];
    let debt = input.debt[period];
    let rate = |key| assumptions.value(key, period);

    let lines = IncomeLines::project(assumptions, period, prior.revenue);
    let ebitda = lines.ebitda();

    let driven_capex = lines.revenue * rate(AssumptionKey::CapexPct);
    straight_line_into(
        driven_depreciation,
        period,
        driven_capex,
        config.default_capex_life as usize,
    );
    let capex = scheduled.capex + driven_capex;

    let uncapped_depreciation = scheduled.depreciation
        + driven_depreciation[period]
        + prior.ppe * rate(AssumptionKey::DepreciationPct);
    let depreciable_base = (prior.ppe + capex).max(0.0);
    let depreciation = uncapped_depreciation.min(depreciable_base);
    if depreciation < uncapped_depreciation {
        tracing::debug!(
            scenario = input.scenario,
            period,
            uncapped_depreciation,
            depreciation,
            "depreciation capped at remaining PPE"
        );
    }
    let ebit = ebitda - depreciation;

    let periods_per_year = config.granularity.periods_per_year() as f64;
    let interest_expense = debt.interest_expense;
    let interest_income = prior.cash.max(rate(AssumptionKey::MinimumCashBalance))
        * rate(AssumptionKey::InterestRateOnCash)
        / periods_per_year;
    let ebt = ebit - interest_expense + interest_income + lines.other_income - lines.other_expense;

    let workers_participation = if ebt > 0.0 {
        ebt * config.workers_participation_rate
    } else {
        0.0
    };
    let taxable_income = ebt - workers_participation;
    let taxes = if taxable_income > 0.0 {
        taxable_income * rate(AssumptionKey::TaxRate)
    } else {
        0.0
    };
    let net_income = taxable_income - taxes;

    let wc = WorkingCapital::project(
        assumptions,
        period,
        &lines,
        config.granularity.days_per_period(),
    );
    let change_in_receivables = wc.receivables - prior.receivables;
    let change_in_inventory = wc.inventory - prior.inventory;
    let change_in_payables = wc.payables - prior.payables;
    let change_in_nwc = change_in_receivables + change_in_inventory - change_in_payables;

    let free_cash_flow = net_income + depreciation - capex - change_in_nwc;

    // Interest is already inside net income; financing carries only principal
    // and draws.
    let cfo = net_income + depreciation - change_in_nwc;
    let cfi = -capex;
    let cff = debt.new_debt - debt.principal_payment;
    let net_cash_flow = cfo + cfi + cff;
    let cash = prior.cash + cfo + cfi + cff;

    let ppe = prior.ppe + capex - depreciation;
    let retained_earnings = prior.retained_earnings + net_income;

    let total_assets = cash + wc.receivables + wc.inventory + ppe + anchor.other_assets;
    let total_liabilities = wc.payables + debt.ending_balance + anchor.other_liabilities;
    let total_equity = anchor.equity + retained_earnings;

    ProjectedPeriodRecord {
        period,
        revenue: lines.revenue,
        cogs: lines.cogs,
        gross_profit: lines.revenue - lines.cogs,
        admin: lines.admin,
        sales: lines.sales,
        other_income: lines.other_income,
        other_expense: lines.other_expense,
        ebitda,
        depreciation,
        ebit,
        interest_expense,
        interest_income,
        ebt,
        workers_participation,
        taxable_income,
        taxes,
        net_income,
        receivables: wc.receivables,
        inventory: wc.inventory,
        payables: wc.payables,
        change_in_receivables,
        change_in_inventory,
        change_in_payables,
        change_in_nwc,
        capex,
        free_cash_flow,
        cfo,
        cfi,
        cff,
        new_debt: debt.new_debt,
        principal_payment: debt.principal_payment,
        net_cash_flow,
        cash,
        ppe,
        other_assets: anchor.other_assets,
        total_assets,
        debt: debt.ending_balance,
        other_liabilities: anchor.other_liabilities,
        total_liabilities,
        equity: anchor.equity,
        retained_earnings,
        total_equity,
    }
}

/// `amount * days / days_per_period`, or zero when the divisor is unusable.
fn days_balance(amount: f64, days: f64, days_per_period: f64) -> f64 {
    if !days_per_period.is_finite() || days_per_period <= 0.0 {
        return 0.0;
    }
    amount * days / days_per_period
}

pub(crate) fn balances_within(lhs: f64, rhs: f64, tolerance: f64) -> bool {
    (lhs - rhs).abs() <= tolerance * lhs.abs().max(rhs.abs()).max(1.0)
}

fn check_balance(scenario: &str, record: &ProjectedPeriodRecord, tolerance: f64) -> ModelResult<()> {
    let liabilities_and_equity = record.total_liabilities + record.total_equity;
    if balances_within(record.total_assets, liabilities_and_equity, tolerance) {
        return Ok(());
    }
    tracing::error!(
        scenario,
        period = record.period,
        assets = record.total_assets,
        liabilities_and_equity,
        "balance sheet invariant violated"
    );
    Err(ModelError::BalanceInvariant {
        scenario: scenario.to_string(),
        period: record.period,
        assets: record.total_assets,
        liabilities_and_equity,
    })
}

pub(crate) fn validate_anchor(anchor: &HistoricalAnchor, tolerance: f64) -> ModelResult<()> {
    let fields = [
        ("revenue", anchor.revenue),
        ("cogs", anchor.cogs),
        ("operatingExpenses", anchor.operating_expenses),
        ("cash", anchor.cash),
        ("receivables", anchor.receivables),
        ("inventory", anchor.inventory),
        ("fixedAssets", anchor.fixed_assets),
        ("otherAssets", anchor.other_assets),
        ("payables", anchor.payables),
        ("shortTermDebt", anchor.short_term_debt),
        ("longTermDebt", anchor.long_term_debt),
        ("otherLiabilities", anchor.other_liabilities),
        ("equity", anchor.equity),
        ("retainedEarnings", anchor.retained_earnings),
    ];
    for (name, value) in fields {
        if !value.is_finite() {
            return Err(config_error(format!(
                "historical {name} must be finite, got {value}"
            )));
        }
    }

    let assets = anchor.total_assets();
    let liabilities_and_equity = anchor.total_liabilities() + anchor.total_equity();
    if !balances_within(assets, liabilities_and_equity, tolerance) {
        return Err(config_error(format!(
            "historical balance sheet does not balance: assets {assets} vs \
             liabilities + equity {liabilities_and_equity}"
        )));
    }
    Ok(())
}

fn validate_input(input: &EngineInput<'_>) -> ModelResult<()> {
    let config = input.config;
    let periods = config.periods;
    if periods == 0 || periods > MAX_PERIODS {
        return Err(config_error(format!(
            "projection horizon must be between 1 and {MAX_PERIODS} periods, got {periods}"
        )));
    }
    if !config.workers_participation_rate.is_finite()
        || !(0.0..=1.0).contains(&config.workers_participation_rate)
    {
        return Err(config_error(
            "workers' participation rate must be between 0 and 1",
        ));
    }
    if config.default_capex_life == 0 {
        return Err(config_error("default CapEx useful life must be >= 1 period"));
    }
    if input.assumptions.periods() != periods {
        return Err(config_error(format!(
            "scenario '{}' has assumptions for {} periods, expected {periods}",
            input.scenario,
            input.assumptions.periods()
        )));
    }
    if input.depreciation.len() != periods || input.debt.len() != periods {
        return Err(config_error(format!(
            "schedules must cover {periods} periods (depreciation {}, debt {})",
            input.depreciation.len(),
            input.debt.len()
        )));
    }

    validate_anchor(input.anchor, config.balance_tolerance)?;

    let opening_debt = input.debt[0].beginning_balance;
    if !balances_within(opening_debt, input.anchor.total_debt(), config.balance_tolerance) {
        return Err(config_error(format!(
            "debt schedule opens at {opening_debt} but historical debt is {}",
            input.anchor.total_debt()
        )));
    }
    Ok(())
}
