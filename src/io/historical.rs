use std::io::Read;

use csv::{ReaderBuilder, Trim};

use super::{CsvIoError, CsvIoResult};
use crate::core::HistoricalAnchor;

/// A line-item by period table: first column row labels, header row period
/// labels. Empty cells are kept as `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalTable {
    pub periods: Vec<String>,
    pub rows: Vec<(String, Vec<Option<f64>>)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnchorField {
    Revenue,
    Cogs,
    OperatingExpenses,
    Cash,
    Receivables,
    Inventory,
    FixedAssets,
    OtherAssets,
    Payables,
    ShortTermDebt,
    LongTermDebt,
    OtherLiabilities,
    Equity,
    RetainedEarnings,
}

impl AnchorField {
    fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_lowercase();
        let field = match normalized.as_str() {
            "revenue" | "revenues" | "sales" => AnchorField::Revenue,
            "cogs" | "cost of goods sold" | "cost of sales" => AnchorField::Cogs,
            "operating expenses" | "opex" | "sg&a" => AnchorField::OperatingExpenses,
            "cash" | "cash and equivalents" => AnchorField::Cash,
            "accounts receivable" | "receivables" => AnchorField::Receivables,
            "inventory" | "inventories" => AnchorField::Inventory,
            "fixed assets" | "ppe" | "property, plant and equipment" => AnchorField::FixedAssets,
            "other assets" => AnchorField::OtherAssets,
            "accounts payable" | "payables" => AnchorField::Payables,
            "short-term debt" | "short term debt" => AnchorField::ShortTermDebt,
            "debt" | "long-term debt" | "long term debt" => AnchorField::LongTermDebt,
            "other liabilities" => AnchorField::OtherLiabilities,
            "equity" | "share capital" => AnchorField::Equity,
            "retained earnings" => AnchorField::RetainedEarnings,
            _ => return None,
        };
        Some(field)
    }

    fn slot(self, anchor: &mut HistoricalAnchor) -> &mut f64 {
        match self {
            AnchorField::Revenue => &mut anchor.revenue,
            AnchorField::Cogs => &mut anchor.cogs,
            AnchorField::OperatingExpenses => &mut anchor.operating_expenses,
            AnchorField::Cash => &mut anchor.cash,
            AnchorField::Receivables => &mut anchor.receivables,
            AnchorField::Inventory => &mut anchor.inventory,
            AnchorField::FixedAssets => &mut anchor.fixed_assets,
            AnchorField::OtherAssets => &mut anchor.other_assets,
            AnchorField::Payables => &mut anchor.payables,
            AnchorField::ShortTermDebt => &mut anchor.short_term_debt,
            AnchorField::LongTermDebt => &mut anchor.long_term_debt,
            AnchorField::OtherLiabilities => &mut anchor.other_liabilities,
            AnchorField::Equity => &mut anchor.equity,
            AnchorField::RetainedEarnings => &mut anchor.retained_earnings,
        }
    }
}

pub fn read_historical_csv<R: Read>(reader: R) -> CsvIoResult<HistoricalTable> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let periods = reader
        .headers()?
        .iter()
        .skip(1)
        .map(str::to_string)
        .collect::<Vec<_>>();
    if periods.is_empty() {
        return Err(CsvIoError::NoPeriods);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let Some(label) = record.get(0).filter(|label| !label.is_empty()) else {
            continue;
        };
        let mut values = Vec::with_capacity(periods.len());
        for (index, period) in periods.iter().enumerate() {
            let cell = record.get(index + 1).unwrap_or("");
            values.push(parse_cell(label, period, cell)?);
        }
        rows.push((label.to_string(), values));
    }

    Ok(HistoricalTable { periods, rows })
}

/// Accepts thousands separators and accounting-style `(123)` negatives.
fn parse_cell(label: &str, period: &str, cell: &str) -> CsvIoResult<Option<f64>> {
    let cleaned = cell.replace(',', "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "-" {
        return Ok(None);
    }
    let (negative, digits) = match cleaned.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, cleaned),
    };
    match digits.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(if negative { -value } else { value })),
        _ => Err(CsvIoError::InvalidValue {
            label: label.to_string(),
            period: period.to_string(),
            value: cell.to_string(),
        }),
    }
}

impl HistoricalTable {
    pub fn last_period(&self) -> Option<&str> {
        self.periods.last().map(String::as_str)
    }

    /// Builds an anchor from the latest period column.
    pub fn anchor(&self) -> HistoricalAnchor {
        let mut anchor = HistoricalAnchor::default();
        self.apply_to(&mut anchor);
        anchor
    }

    /// Overwrites the fields of `anchor` this table has a row for, reading the
    /// latest period column. Unrecognized rows and empty cells leave the
    /// anchor untouched.
    pub fn apply_to(&self, anchor: &mut HistoricalAnchor) {
        let column = self.periods.len().saturating_sub(1);
        for (label, values) in &self.rows {
            let Some(field) = AnchorField::from_label(label) else {
                tracing::debug!(label = label.as_str(), "historical row not used by the model");
                continue;
            };
            match values.get(column).copied().flatten() {
                Some(value) => *field.slot(anchor) = value,
                None => tracing::warn!(
                    label = label.as_str(),
                    period = self.last_period().unwrap_or(""),
                    "historical value missing, keeping existing anchor value"
                ),
            }
        }
        if let Some(period) = self.last_period() {
            anchor.base_period_label = Some(period.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INCOME_STATEMENT: &str = "\
,2022,2023,2024
Revenue,100000,120000,140000
COGS,40000,48000,56000
Operating Expenses,30000,33000,36000
Net Income,20000,26000,30000
";

    const BALANCE_SHEET: &str = "\
Line Item,2022,2023,2024
Cash,10000,12000,15000
Accounts Receivable,15000,17000,20000
Inventory,10000,11000,12000
Fixed Assets,50000,52000,54000
Accounts Payable,12000,13000,14000
Debt,20000,18000,16000
Equity,53000,61000,71000
";

    #[test]
    fn reads_periods_and_rows() {
        let table = read_historical_csv(INCOME_STATEMENT.as_bytes()).expect("valid csv");
        assert_eq!(table.periods, vec!["2022", "2023", "2024"]);
        assert_eq!(table.rows.len(), 4);
        assert_eq!(table.rows[0].0, "Revenue");
        assert_eq!(table.rows[0].1[2], Some(140_000.0));
    }

    #[test]
    fn anchor_takes_latest_column_from_both_statements() {
        let income = read_historical_csv(INCOME_STATEMENT.as_bytes()).expect("valid csv");
        let balance = read_historical_csv(BALANCE_SHEET.as_bytes()).expect("valid csv");

        let mut anchor = income.anchor();
        balance.apply_to(&mut anchor);

        assert_eq!(anchor.base_period_label.as_deref(), Some("2024"));
        assert_eq!(anchor.revenue, 140_000.0);
        assert_eq!(anchor.cogs, 56_000.0);
        assert_eq!(anchor.operating_expenses, 36_000.0);
        assert_eq!(anchor.cash, 15_000.0);
        assert_eq!(anchor.fixed_assets, 54_000.0);
        assert_eq!(anchor.long_term_debt, 16_000.0);
        assert_eq!(anchor.equity, 71_000.0);
        assert_eq!(anchor.total_assets(), anchor.total_liabilities() + anchor.total_equity());
    }

    #[test]
    fn labels_are_case_insensitive() {
        let csv = "item,FY\n  REVENUE ,10\naccounts payable,4\nShort-Term Debt,3\n";
        let anchor = read_historical_csv(csv.as_bytes()).expect("valid csv").anchor();
        assert_eq!(anchor.revenue, 10.0);
        assert_eq!(anchor.payables, 4.0);
        assert_eq!(anchor.short_term_debt, 3.0);
        assert_eq!(anchor.base_period_label.as_deref(), Some("FY"));
    }

    #[test]
    fn parses_separators_and_accounting_negatives() {
        let csv = "item,2024\nRevenue,\"1,250.5\"\nRetained Earnings,(300)\nCash,\n";
        let table = read_historical_csv(csv.as_bytes()).expect("valid csv");
        assert_eq!(table.rows[0].1[0], Some(1_250.5));
        assert_eq!(table.rows[1].1[0], Some(-300.0));
        assert_eq!(table.rows[2].1[0], None);
        assert_eq!(table.anchor().cash, 0.0);
    }

    #[test]
    fn empty_latest_cell_keeps_existing_anchor_value() {
        let csv = "item,2023,2024\nCash,900,\nInventory,5,7\n";
        let table = read_historical_csv(csv.as_bytes()).expect("valid csv");
        let mut anchor = HistoricalAnchor {
            cash: 1_500.0,
            inventory: 1.0,
            ..HistoricalAnchor::default()
        };

        table.apply_to(&mut anchor);
        assert_eq!(anchor.cash, 1_500.0);
        assert_eq!(anchor.inventory, 7.0);
        assert_eq!(anchor.base_period_label.as_deref(), Some("2024"));
    }

    #[test]
    fn rejects_non_numeric_cells_and_missing_periods() {
        let err = read_historical_csv("item,2024\nRevenue,lots\n".as_bytes())
            .expect_err("must reject");
        assert!(err.to_string().contains("Revenue"), "{err}");

        let err = read_historical_csv("item\nRevenue\n".as_bytes()).expect_err("no periods");
        assert!(matches!(err, CsvIoError::NoPeriods));
    }
}
