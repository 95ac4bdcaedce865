use std::collections::BTreeMap;

use rayon::prelude::*;

use super::assumptions::resolve_all;
use super::debt::build_debt_schedule;
use super::depreciation::build_depreciation_schedule;
use super::engine::{EngineInput, MAX_PERIODS, roll_forward};
use super::error::{IncompleteAssumptionWarning, ModelResult, config_error};
use super::reports::{ScenarioReports, build_reports};
use super::types::{
    AssumptionSet, CapexForecast, DebtScheduleEntry, DebtTranche, DepreciationScheduleEntry,
    EngineConfig, FixedAssetRecord, HistoricalAnchor, NewDebtIssue, RawAssumptionTable,
    ScenarioResult, ValuationParams, ValuationResult,
};
use super::valuation::value_scenario;

/// Runs every scenario against the shared anchor and schedules.
///
/// Scenarios are independent and run in parallel. When several fail, the
/// error of the first scenario in name order is returned.
pub fn run_scenarios(
    anchor: &HistoricalAnchor,
    scenarios: &BTreeMap<String, AssumptionSet>,
    depreciation: &[DepreciationScheduleEntry],
    debt: &[DebtScheduleEntry],
    config: &EngineConfig,
) -> ModelResult<BTreeMap<String, ScenarioResult>> {
    let outcomes: Vec<(&String, ModelResult<ScenarioResult>)> = scenarios
        .par_iter()
        .map(|(name, assumptions)| {
            let input = EngineInput {
                scenario: name,
                anchor,
                assumptions,
                depreciation,
                debt,
                config,
            };
            (name, roll_forward(&input))
        })
        .collect();

    let mut results = BTreeMap::new();
    for (name, outcome) in outcomes {
        results.insert(name.clone(), outcome?);
    }
    Ok(results)
}

/// A complete model: historical anchor, shared schedule inputs and the raw
/// assumption table of each named scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInputs {
    pub anchor: HistoricalAnchor,
    pub fixed_assets: Vec<FixedAssetRecord>,
    pub capex: Vec<CapexForecast>,
    pub debt_tranches: Vec<DebtTranche>,
    pub new_debt: Vec<NewDebtIssue>,
    pub scenarios: BTreeMap<String, RawAssumptionTable>,
    pub config: EngineConfig,
    pub valuation: ValuationParams,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionOutcome {
    pub warnings: Vec<IncompleteAssumptionWarning>,
    pub results: BTreeMap<String, ScenarioResult>,
    pub valuations: BTreeMap<String, ValuationResult>,
    pub reports: BTreeMap<String, ScenarioReports>,
}

/// Resolves assumptions, builds the shared schedules, projects every
/// scenario, then values and reports each one.
pub fn project(model: &ModelInputs) -> ModelResult<ProjectionOutcome> {
    let config = &model.config;
    if config.periods == 0 || config.periods > MAX_PERIODS {
        return Err(config_error(format!(
            "projection horizon must be between 1 and {MAX_PERIODS} periods, got {}",
            config.periods
        )));
    }
    if model.scenarios.is_empty() {
        return Err(config_error("at least one scenario is required"));
    }

    let (assumptions, warnings) = resolve_all(&model.scenarios, config.periods)?;
    let depreciation = build_depreciation_schedule(
        &model.fixed_assets,
        &model.capex,
        config.default_capex_life,
        config.periods,
    )?;
    let debt = build_debt_schedule(
        model.anchor.total_debt(),
        &model.debt_tranches,
        &model.new_debt,
        config.granularity,
        config.periods,
    )?;

    let results = run_scenarios(&model.anchor, &assumptions, &depreciation, &debt, config)?;

    let mut valuations = BTreeMap::new();
    let mut reports = BTreeMap::new();
    for (name, result) in &results {
        valuations.insert(
            name.clone(),
            value_scenario(result, model.valuation, config.granularity)?,
        );
        reports.insert(
            name.clone(),
            build_reports(
                result,
                model.anchor.base_period_label.as_deref(),
                config.granularity,
            ),
        );
    }

    tracing::info!(
        scenarios = results.len(),
        periods = config.periods,
        warnings = warnings.len(),
        "projection complete"
    );

    Ok(ProjectionOutcome {
        warnings,
        results,
        valuations,
        reports,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ModelError;
    use crate::core::types::{AssumptionKey, PeriodGranularity, RawAssumption};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_anchor() -> HistoricalAnchor {
        HistoricalAnchor {
            base_period_label: Some("2024".to_string()),
            revenue: 140_000.0,
            cogs: 56_000.0,
            operating_expenses: 36_000.0,
            cash: 15_000.0,
            receivables: 20_000.0,
            inventory: 12_000.0,
            fixed_assets: 54_000.0,
            payables: 14_000.0,
            long_term_debt: 16_000.0,
            equity: 71_000.0,
            ..HistoricalAnchor::default()
        }
    }

    fn base_set(periods: usize) -> AssumptionSet {
        AssumptionSet::uniform(periods)
            .with_constant(AssumptionKey::RevenueGrowth, 0.10)
            .with_constant(AssumptionKey::CogsPct, 0.40)
            .with_constant(AssumptionKey::AdminPct, 0.15)
            .with_constant(AssumptionKey::SalesPct, 0.10)
            .with_constant(AssumptionKey::TaxRate, 0.25)
            .with_constant(AssumptionKey::DaysReceivable, 45.0)
            .with_constant(AssumptionKey::DaysInventory, 60.0)
            .with_constant(AssumptionKey::DaysPayable, 30.0)
    }

    fn raw_table(growth: f64) -> RawAssumptionTable {
        let mut raw: RawAssumptionTable = AssumptionKey::ALL
            .iter()
            .map(|key| (*key, RawAssumption::constant(0.0)))
            .collect();
        for (key, value) in [
            (AssumptionKey::RevenueGrowth, growth),
            (AssumptionKey::CogsPct, 0.40),
            (AssumptionKey::AdminPct, 0.15),
            (AssumptionKey::SalesPct, 0.10),
            (AssumptionKey::TaxRate, 0.25),
            (AssumptionKey::DaysReceivable, 45.0),
            (AssumptionKey::DaysInventory, 60.0),
            (AssumptionKey::DaysPayable, 30.0),
        ] {
            raw.insert(key, RawAssumption::constant(value));
        }
        raw
    }

    struct Shared {
        anchor: HistoricalAnchor,
        depreciation: Vec<DepreciationScheduleEntry>,
        debt: Vec<DebtScheduleEntry>,
        config: EngineConfig,
    }

    fn shared(periods: usize) -> Shared {
        let anchor = sample_anchor();
        let config = EngineConfig::new(periods);
        let assets = [FixedAssetRecord {
            name: "plant".to_string(),
            cost: 54_000.0,
            useful_life: 9,
        }];
        let tranches = [DebtTranche {
            name: "term loan".to_string(),
            balance: 16_000.0,
            annual_rate: 0.08,
            term: 4,
        }];
        Shared {
            depreciation: build_depreciation_schedule(&assets, &[], config.default_capex_life, periods)
                .expect("valid depreciation"),
            debt: build_debt_schedule(
                anchor.total_debt(),
                &tranches,
                &[],
                PeriodGranularity::Yearly,
                periods,
            )
            .expect("valid debt"),
            anchor,
            config,
        }
    }

    fn run(shared: &Shared, sets: &BTreeMap<String, AssumptionSet>) -> BTreeMap<String, ScenarioResult> {
        run_scenarios(
            &shared.anchor,
            sets,
            &shared.depreciation,
            &shared.debt,
            &shared.config,
        )
        .expect("valid scenarios")
    }

    fn sample_model(periods: usize) -> ModelInputs {
        ModelInputs {
            anchor: sample_anchor(),
            fixed_assets: vec![FixedAssetRecord {
                name: "plant".to_string(),
                cost: 54_000.0,
                useful_life: 9,
            }],
            capex: vec![CapexForecast {
                period: 1,
                amount: 5_000.0,
            }],
            debt_tranches: vec![DebtTranche {
                name: "term loan".to_string(),
                balance: 16_000.0,
                annual_rate: 0.08,
                term: 4,
            }],
            new_debt: Vec::new(),
            scenarios: BTreeMap::from([
                ("Base".to_string(), raw_table(0.10)),
                ("Pessimistic".to_string(), raw_table(-0.05)),
            ]),
            config: EngineConfig::new(periods),
            valuation: ValuationParams {
                discount_rate: 0.12,
                terminal_growth: 0.02,
            },
        }
    }

    #[test]
    fn scaled_scenario_matches_standalone_run() {
        let shared = shared(5);
        let base = base_set(5);
        let optimistic = base.scaled(AssumptionKey::RevenueGrowth, 1.2);
        let both = BTreeMap::from([
            ("Base".to_string(), base.clone()),
            ("Optimistic".to_string(), optimistic.clone()),
        ]);
        let alone = BTreeMap::from([("Optimistic".to_string(), optimistic)]);

        let combined = run(&shared, &both);
        let standalone = run(&shared, &alone);

        assert_eq!(combined["Optimistic"], standalone["Optimistic"]);
        assert_approx(combined["Optimistic"].periods[0].revenue, 140_000.0 * 1.12);
        assert_approx(combined["Base"].periods[0].revenue, 154_000.0);
    }

    #[test]
    fn changing_one_scenario_leaves_others_untouched() {
        let shared = shared(4);
        let mut sets = BTreeMap::from([
            ("Base".to_string(), base_set(4)),
            ("Downside".to_string(), base_set(4).scaled(AssumptionKey::RevenueGrowth, -0.5)),
        ]);
        let before = run(&shared, &sets);

        sets.insert(
            "Base".to_string(),
            base_set(4).with_constant(AssumptionKey::CogsPct, 0.70),
        );
        let after = run(&shared, &sets);

        assert_eq!(before["Downside"], after["Downside"]);
        assert_ne!(before["Base"], after["Base"]);
    }

    #[test]
    fn every_scenario_balances_each_period() {
        let shared = shared(6);
        let sets = BTreeMap::from([
            ("A".to_string(), base_set(6)),
            ("B".to_string(), base_set(6).scaled(AssumptionKey::RevenueGrowth, 2.0)),
            ("C".to_string(), base_set(6).with_constant(AssumptionKey::CogsPct, 0.95)),
        ]);
        let results = run(&shared, &sets);
        assert_eq!(results.keys().collect::<Vec<_>>(), vec!["A", "B", "C"]);
        for result in results.values() {
            assert_eq!(result.periods.len(), 6);
            for record in &result.periods {
                let gap = record.total_assets - record.total_liabilities - record.total_equity;
                assert!(gap.abs() <= 1e-6 * record.total_assets.abs().max(1.0));
            }
        }
    }

    #[test]
    fn first_failing_scenario_by_name_is_reported() {
        let shared = shared(3);
        let sets = BTreeMap::from([
            ("Alpha".to_string(), base_set(2)),
            ("Beta".to_string(), base_set(1)),
            ("Gamma".to_string(), base_set(3)),
        ]);
        let err = run_scenarios(
            &shared.anchor,
            &sets,
            &shared.depreciation,
            &shared.debt,
            &shared.config,
        )
        .expect_err("mismatched assumption lengths");
        assert!(matches!(err, ModelError::Configuration(_)));
        assert!(err.to_string().contains("'Alpha'"), "{err}");
    }

    #[test]
    fn project_runs_full_pipeline() {
        let outcome = project(&sample_model(5)).expect("valid model");

        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.valuations.len(), 2);
        assert_eq!(outcome.reports.len(), 2);

        let base = &outcome.results["Base"];
        assert_approx(base.periods[1].capex, 5_000.0);
        assert_approx(base.periods[0].interest_expense, 1_280.0);

        let valuation = &outcome.valuations["Base"];
        assert_eq!(valuation.discounted_fcf.len(), 5);
        assert_approx(
            valuation.enterprise_value,
            valuation.pv_fcf + valuation.pv_terminal,
        );

        let labels = &outcome.reports["Pessimistic"].income_statement.period_labels;
        assert_eq!(labels.first().map(String::as_str), Some("2025"));
        assert!(
            outcome.results["Pessimistic"].periods[4].revenue < base.periods[4].revenue
        );
    }

    #[test]
    fn project_reports_missing_assumptions_as_warnings() {
        let mut model = sample_model(3);
        if let Some(raw) = model.scenarios.get_mut("Base") {
            raw.remove(&AssumptionKey::TaxRate);
        }
        let outcome = project(&model).expect("missing keys default to zero");

        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].scenario, "Base");
        assert_eq!(outcome.warnings[0].key, AssumptionKey::TaxRate);
        assert_approx(outcome.results["Base"].periods[0].taxes, 0.0);
    }

    #[test]
    fn project_rejects_empty_scenarios_and_bad_valuation() {
        let mut model = sample_model(3);
        model.scenarios.clear();
        assert!(matches!(
            project(&model),
            Err(ModelError::Configuration(_))
        ));

        let mut model = sample_model(3);
        model.valuation.terminal_growth = 0.15;
        assert!(matches!(
            project(&model),
            Err(ModelError::ArithmeticDomain(_))
        ));
    }
}
