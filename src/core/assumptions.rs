use std::collections::BTreeMap;

use super::error::{
    IncompleteAssumptionWarning, MissingAssumption, ModelResult, config_error,
};
use super::types::{AssumptionKey, AssumptionSet, RawAssumptionTable};

/// Expands one scenario's raw table into a dense set. Missing keys and
/// missing trailing periods resolve to zero and are reported as warnings.
pub fn resolve_assumptions(
    scenario: &str,
    raw: &RawAssumptionTable,
    periods: usize,
) -> ModelResult<(AssumptionSet, Vec<IncompleteAssumptionWarning>)> {
    if periods == 0 {
        return Err(config_error("projection horizon must be >= 1 period"));
    }

    let mut set = AssumptionSet::uniform(periods);
    let mut warnings = Vec::new();

    for key in AssumptionKey::ALL {
        let Some(entry) = raw.get(&key) else {
            warnings.push(warn_missing(scenario, key, MissingAssumption::Key));
            continue;
        };

        if let Some(bad) = entry.values.iter().find(|v| !v.is_finite()) {
            return Err(config_error(format!(
                "scenario '{scenario}': '{}' has non-finite value {bad}",
                key.label()
            )));
        }

        if entry.same_every_period {
            let ignored = entry.ignored_values();
            if !ignored.is_empty() {
                tracing::warn!(
                    scenario,
                    key = key.label(),
                    ignored = ignored.len(),
                    "same value every period: only the first value is used"
                );
            }
            match entry.values.first() {
                Some(&value) => set = set.with_constant(key, value),
                None => warnings.push(warn_missing(scenario, key, MissingAssumption::Key)),
            }
            continue;
        }

        if entry.values.len() > periods {
            return Err(config_error(format!(
                "scenario '{scenario}': '{}' has {} values for a {periods}-period horizon",
                key.label(),
                entry.values.len()
            )));
        }

        if entry.values.len() < periods {
            let missing = if entry.values.is_empty() {
                MissingAssumption::Key
            } else {
                MissingAssumption::Periods {
                    first_missing: entry.values.len(),
                }
            };
            warnings.push(warn_missing(scenario, key, missing));
        }
        set = set.with(key, entry.values.clone());
    }

    Ok((set, warnings))
}

/// Resolves every scenario; warnings are concatenated in scenario-name order.
pub fn resolve_all(
    raw_by_scenario: &BTreeMap<String, RawAssumptionTable>,
    periods: usize,
) -> ModelResult<(BTreeMap<String, AssumptionSet>, Vec<IncompleteAssumptionWarning>)> {
    let mut sets = BTreeMap::new();
    let mut warnings = Vec::new();
    for (name, raw) in raw_by_scenario {
        let (set, scenario_warnings) = resolve_assumptions(name, raw, periods)?;
        sets.insert(name.clone(), set);
        warnings.extend(scenario_warnings);
    }
    Ok((sets, warnings))
}

fn warn_missing(
    scenario: &str,
    key: AssumptionKey,
    missing: MissingAssumption,
) -> IncompleteAssumptionWarning {
    let warning = IncompleteAssumptionWarning {
        scenario: scenario.to_string(),
        key,
        missing,
    };
    tracing::warn!(scenario, key = key.label(), "{warning}");
    warning
}
