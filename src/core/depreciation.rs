use super::error::{ModelResult, config_error};
use super::types::{CapexForecast, DepreciationScheduleEntry, FixedAssetRecord};

/// Builds per-period D&A and CapEx totals from the historical asset register
/// and the explicit CapEx forecast. Scenario-independent.
pub fn build_depreciation_schedule(
    assets: &[FixedAssetRecord],
    capex: &[CapexForecast],
    default_capex_life: u32,
    periods: usize,
) -> ModelResult<Vec<DepreciationScheduleEntry>> {
    if default_capex_life == 0 {
        return Err(config_error("default CapEx useful life must be >= 1 period"));
    }

    let mut depreciation = vec![0.0; periods];
    let mut capex_totals = vec![0.0; periods];

    for asset in assets {
        if !asset.cost.is_finite() || asset.cost < 0.0 {
            return Err(config_error(format!(
                "fixed asset '{}' has invalid cost {}",
                asset.name, asset.cost
            )));
        }
        let life = usize::try_from(asset.useful_life.max(1)).unwrap_or(usize::MAX);
        straight_line_into(&mut depreciation, 0, asset.cost, life);
    }

    let capex_life = default_capex_life as usize;
    for entry in capex {
        if !entry.amount.is_finite() || entry.amount < 0.0 {
            return Err(config_error(format!(
                "CapEx for period {} has invalid amount {}",
                entry.period, entry.amount
            )));
        }
        if entry.period >= periods {
            tracing::warn!(
                period = entry.period,
                horizon = periods,
                "CapEx forecast outside projection horizon ignored"
            );
            continue;
        }
        capex_totals[entry.period] += entry.amount;
        straight_line_into(&mut depreciation, entry.period, entry.amount, capex_life);
    }

    Ok(depreciation
        .into_iter()
        .zip(capex_totals)
        .enumerate()
        .map(|(period, (depreciation, capex))| DepreciationScheduleEntry {
            period,
            depreciation,
            capex,
        })
        .collect())
}

/// Adds `amount / life` to each of `life` periods starting at `start`,
/// truncated at the end of `buckets`. A zero life expenses in full.
pub(crate) fn straight_line_into(buckets: &mut [f64], start: usize, amount: f64, life: usize) {
    let life = life.max(1);
    let charge = amount / life as f64;
    let end = start.saturating_add(life).min(buckets.len());
    if start >= end {
        return;
    }
    for bucket in &mut buckets[start..end] {
        *bucket += charge;
    }
}
