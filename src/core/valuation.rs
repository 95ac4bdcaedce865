use super::error::{ModelError, ModelResult, config_error};
use super::types::{PeriodGranularity, ScenarioResult, ValuationParams, ValuationResult};

/// Discounted cash flow over explicit periods plus a Gordon-growth terminal
/// value. `discount_rate` and `terminal_growth` are annual; for sub-annual
/// periods they are converted to equivalent per-period rates first.
pub fn discounted_cash_flow(
    scenario: &str,
    fcf: &[f64],
    params: ValuationParams,
    granularity: PeriodGranularity,
) -> ModelResult<ValuationResult> {
    let ValuationParams {
        discount_rate,
        terminal_growth,
    } = params;

    if !discount_rate.is_finite() || !terminal_growth.is_finite() {
        return Err(config_error("discount and terminal growth rates must be finite"));
    }
    if discount_rate <= terminal_growth {
        return Err(ModelError::ArithmeticDomain(format!(
            "discount rate {discount_rate} must exceed terminal growth rate {terminal_growth}"
        )));
    }
    if discount_rate <= -1.0 || terminal_growth <= -1.0 {
        return Err(config_error("rates must be greater than -100%"));
    }
    let Some(&last_fcf) = fcf.last() else {
        return Err(config_error(format!(
            "scenario '{scenario}' has no projected free cash flow to value"
        )));
    };

    let r = per_period_rate(discount_rate, granularity);
    let g = per_period_rate(terminal_growth, granularity);

    let mut factor = 1.0;
    let mut discounted_fcf = Vec::with_capacity(fcf.len());
    for cash_flow in fcf {
        factor *= 1.0 + r;
        discounted_fcf.push(cash_flow / factor);
    }
    let pv_fcf = discounted_fcf.iter().sum::<f64>();

    let terminal_value = last_fcf * (1.0 + g) / (r - g);
    let pv_terminal = terminal_value / factor;

    Ok(ValuationResult {
        scenario: scenario.to_string(),
        discount_rate,
        terminal_growth,
        discounted_fcf,
        pv_fcf,
        terminal_value,
        pv_terminal,
        enterprise_value: pv_fcf + pv_terminal,
    })
}

pub fn value_scenario(
    result: &ScenarioResult,
    params: ValuationParams,
    granularity: PeriodGranularity,
) -> ModelResult<ValuationResult> {
    discounted_cash_flow(&result.name, &result.free_cash_flows(), params, granularity)
}

fn per_period_rate(annual: f64, granularity: PeriodGranularity) -> f64 {
    match granularity {
        PeriodGranularity::Yearly => annual,
        other => (1.0 + annual).powf(1.0 / other.periods_per_year() as f64) - 1.0,
    }
}
