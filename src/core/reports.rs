use serde::Serialize;

use super::types::{PeriodGranularity, ProjectedPeriodRecord, ScenarioResult};

type LineItem = (&'static str, fn(&ProjectedPeriodRecord) -> f64);

const INCOME_STATEMENT: &[LineItem] = &[
    ("Revenue", |r| r.revenue),
    ("COGS", |r| r.cogs),
    ("Gross Profit", |r| r.gross_profit),
    ("Administrative Expenses", |r| r.admin),
    ("Sales Expenses", |r| r.sales),
    ("EBITDA", |r| r.ebitda),
    ("Depreciation & Amortization", |r| r.depreciation),
    ("EBIT", |r| r.ebit),
    ("Interest Expense", |r| r.interest_expense),
    ("Interest Income", |r| r.interest_income),
    ("Other Income", |r| r.other_income),
    ("Other Expenses", |r| r.other_expense),
    ("EBT", |r| r.ebt),
    ("Workers' Participation", |r| r.workers_participation),
    ("Taxable Income", |r| r.taxable_income),
    ("Taxes", |r| r.taxes),
    ("Net Income", |r| r.net_income),
];

// Working-capital changes carry their cash sign: an increase in receivables
// or inventory is negative, an increase in payables positive.
const CASH_FLOW: &[LineItem] = &[
    ("Net Income", |r| r.net_income),
    ("Depreciation & Amortization", |r| r.depreciation),
    ("Change in AR", |r| -r.change_in_receivables),
    ("Change in Inventory", |r| -r.change_in_inventory),
    ("Change in AP", |r| r.change_in_payables),
    ("Cash Flow from Operations", |r| r.cfo),
    ("CapEx", |r| -r.capex),
    ("Cash Flow from Investing", |r| r.cfi),
    ("New Debt", |r| r.new_debt),
    ("Principal Repayment", |r| -r.principal_payment),
    ("Cash Flow from Financing", |r| r.cff),
    ("Net Change in Cash", |r| r.net_cash_flow),
    ("Ending Cash", |r| r.cash),
    ("Free Cash Flow", |r| r.free_cash_flow),
];

const BALANCE_SHEET: &[LineItem] = &[
    ("Cash", |r| r.cash),
    ("Accounts Receivable", |r| r.receivables),
    ("Inventory", |r| r.inventory),
    ("Fixed Assets", |r| r.ppe),
    ("Other Assets", |r| r.other_assets),
    ("Total Assets", |r| r.total_assets),
    ("Accounts Payable", |r| r.payables),
    ("Debt", |r| r.debt),
    ("Other Liabilities", |r| r.other_liabilities),
    ("Total Liabilities", |r| r.total_liabilities),
    ("Equity", |r| r.equity),
    ("Retained Earnings", |r| r.retained_earnings),
    ("Total Equity", |r| r.total_equity),
    ("Total Liabilities & Equity", |r| {
        r.total_liabilities + r.total_equity
    }),
];

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportKind {
    IncomeStatement,
    CashFlow,
    BalanceSheet,
}

impl ReportKind {
    pub const ALL: [ReportKind; 3] = [
        ReportKind::IncomeStatement,
        ReportKind::CashFlow,
        ReportKind::BalanceSheet,
    ];

    pub fn title(self) -> &'static str {
        match self {
            ReportKind::IncomeStatement => "Income Statement",
            ReportKind::CashFlow => "Cash Flow Statement",
            ReportKind::BalanceSheet => "Balance Sheet",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            ReportKind::IncomeStatement => "income_statement",
            ReportKind::CashFlow => "cash_flow",
            ReportKind::BalanceSheet => "balance_sheet",
        }
    }

    fn line_items(self) -> &'static [LineItem] {
        match self {
            ReportKind::IncomeStatement => INCOME_STATEMENT,
            ReportKind::CashFlow => CASH_FLOW,
            ReportKind::BalanceSheet => BALANCE_SHEET,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementRow {
    pub label: &'static str,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementTable {
    pub kind: ReportKind,
    pub title: &'static str,
    pub period_labels: Vec<String>,
    pub rows: Vec<StatementRow>,
}

impl StatementTable {
    pub fn row(&self, label: &str) -> Option<&StatementRow> {
        self.rows.iter().find(|row| row.label == label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioReports {
    pub scenario: String,
    pub income_statement: StatementTable,
    pub cash_flow: StatementTable,
    pub balance_sheet: StatementTable,
}

impl ScenarioReports {
    pub fn tables(&self) -> [&StatementTable; 3] {
        [&self.income_statement, &self.cash_flow, &self.balance_sheet]
    }
}

/// Lays one scenario out as the three statements, one column per period.
pub fn build_reports(
    result: &ScenarioResult,
    base_period_label: Option<&str>,
    granularity: PeriodGranularity,
) -> ScenarioReports {
    let labels = period_labels(result.periods.len(), base_period_label, granularity);
    let table = |kind| build_table(kind, &result.periods, &labels);
    ScenarioReports {
        scenario: result.name.clone(),
        income_statement: table(ReportKind::IncomeStatement),
        cash_flow: table(ReportKind::CashFlow),
        balance_sheet: table(ReportKind::BalanceSheet),
    }
}

fn build_table(
    kind: ReportKind,
    records: &[ProjectedPeriodRecord],
    labels: &[String],
) -> StatementTable {
    let rows = kind
        .line_items()
        .iter()
        .map(|&(label, value)| StatementRow {
            label,
            values: records.iter().map(value).collect(),
        })
        .collect();
    StatementTable {
        kind,
        title: kind.title(),
        period_labels: labels.to_vec(),
        rows,
    }
}

/// Years following the anchor year when the anchor is labelled with one,
/// otherwise `P1..` (yearly) or `M1..` (monthly). An anchor year whose last
/// projected year would overflow `i64` gets the generic labels too.
pub fn period_labels(
    periods: usize,
    base_period_label: Option<&str>,
    granularity: PeriodGranularity,
) -> Vec<String> {
    let span = i64::try_from(periods).ok();
    let base_year = base_period_label
        .and_then(|label| label.trim().parse::<i64>().ok())
        .filter(|year| span.and_then(|span| year.checked_add(span)).is_some());
    (1..=periods)
        .map(|offset| match (granularity, base_year) {
            (PeriodGranularity::Yearly, Some(year)) => (year + offset as i64).to_string(),
            (PeriodGranularity::Yearly, None) => format!("P{offset}"),
            (PeriodGranularity::Monthly, Some(year)) => {
                let month_index = offset - 1;
                format!(
                    "{}-{:02}",
                    year + 1 + (month_index / 12) as i64,
                    month_index % 12 + 1
                )
            }
            (PeriodGranularity::Monthly, None) => format!("M{offset}"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> ScenarioResult {
        let periods = (0..3)
            .map(|period| ProjectedPeriodRecord {
                period,
                revenue: 100.0 * (period + 1) as f64,
                net_income: 10.0,
                change_in_receivables: 4.0,
                change_in_payables: 1.5,
                capex: 7.0,
                cash: 50.0,
                total_assets: 200.0,
                total_liabilities: 120.0,
                total_equity: 80.0,
                ..ProjectedPeriodRecord::default()
            })
            .collect();
        ScenarioResult {
            name: "Base".to_string(),
            periods,
        }
    }

    #[test]
    fn yearly_labels_follow_anchor_year() {
        assert_eq!(
            period_labels(3, Some("2024"), PeriodGranularity::Yearly),
            vec!["2025", "2026", "2027"]
        );
        assert_eq!(
            period_labels(2, Some("FY24"), PeriodGranularity::Yearly),
            vec!["P1", "P2"]
        );
    }

    #[test]
    fn out_of_range_anchor_year_falls_back_to_generic_labels() {
        let max = i64::MAX.to_string();
        assert_eq!(
            period_labels(2, Some(&max), PeriodGranularity::Yearly),
            vec!["P1", "P2"]
        );
        assert_eq!(
            period_labels(2, Some(&max), PeriodGranularity::Monthly),
            vec!["M1", "M2"]
        );

        let near_max = (i64::MAX - 1).to_string();
        assert_eq!(
            period_labels(2, Some(&near_max), PeriodGranularity::Yearly),
            vec!["P1", "P2"]
        );
        assert_eq!(
            period_labels(1, Some(&near_max), PeriodGranularity::Yearly),
            vec![i64::MAX.to_string()]
        );
    }

    #[test]
    fn monthly_labels_roll_over_years() {
        let labels = period_labels(14, Some("2024"), PeriodGranularity::Monthly);
        assert_eq!(labels[0], "2025-01");
        assert_eq!(labels[11], "2025-12");
        assert_eq!(labels[13], "2026-02");
        assert_eq!(period_labels(1, None, PeriodGranularity::Monthly), vec!["M1"]);
    }

    #[test]
    fn reports_carry_record_values_unchanged() {
        let result = sample_result();
        let reports = build_reports(&result, Some("2024"), PeriodGranularity::Yearly);

        assert_eq!(reports.scenario, "Base");
        let revenue = reports.income_statement.row("Revenue").expect("revenue row");
        assert_eq!(revenue.values, vec![100.0, 200.0, 300.0]);

        let ar = reports.cash_flow.row("Change in AR").expect("AR row");
        assert_eq!(ar.values, vec![-4.0; 3]);
        let ap = reports.cash_flow.row("Change in AP").expect("AP row");
        assert_eq!(ap.values, vec![1.5; 3]);
        let capex = reports.cash_flow.row("CapEx").expect("capex row");
        assert_eq!(capex.values, vec![-7.0; 3]);

        let check = reports
            .balance_sheet
            .row("Total Liabilities & Equity")
            .expect("total row");
        assert_eq!(check.values, vec![200.0; 3]);
        assert_eq!(reports.balance_sheet.period_labels, vec!["2025", "2026", "2027"]);
    }

    #[test]
    fn every_table_has_one_value_per_period() {
        let result = sample_result();
        let reports = build_reports(&result, None, PeriodGranularity::Yearly);
        for table in reports.tables() {
            assert_eq!(table.period_labels.len(), 3);
            assert!(table.rows.iter().all(|row| row.values.len() == 3));
        }
    }
}
