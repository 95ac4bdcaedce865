use super::error::{ModelResult, config_error};
use super::types::{DebtScheduleEntry, DebtTranche, NewDebtIssue, PeriodGranularity};

#[derive(Debug)]
struct Loan {
    balance: f64,
    rate_per_period: f64,
    installment: f64,
    installments_left: u32,
    amortizes_from: usize,
}

impl Loan {
    fn new(
        balance: f64,
        annual_rate: f64,
        term: u32,
        amortizes_from: usize,
        granularity: PeriodGranularity,
    ) -> Self {
        Self {
            balance,
            rate_per_period: annual_rate / granularity.periods_per_year() as f64,
            installment: if term == 0 { 0.0 } else { balance / term as f64 },
            installments_left: term,
            amortizes_from,
        }
    }

    fn interest(&self) -> f64 {
        self.balance * self.rate_per_period
    }

    /// Pays this period's installment, if one is due. The last installment
    /// settles whatever is left so the balance lands on exactly zero.
    fn amortize(&mut self, period: usize) -> f64 {
        if period < self.amortizes_from || self.installments_left == 0 {
            return 0.0;
        }
        let payment = if self.installments_left == 1 {
            self.balance
        } else {
            self.installment.min(self.balance)
        };
        self.balance -= payment;
        self.installments_left -= 1;
        payment
    }
}

/// Builds the scenario-independent debt schedule.
///
/// `anchor_debt` is the historical total debt. Any part of it not covered by
/// `tranches` is carried as a constant, interest-free balance. Tranches and
/// issues with `term == 0` are interest-only for the whole horizon.
pub fn build_debt_schedule(
    anchor_debt: f64,
    tranches: &[DebtTranche],
    issues: &[NewDebtIssue],
    granularity: PeriodGranularity,
    periods: usize,
) -> ModelResult<Vec<DebtScheduleEntry>> {
    if !anchor_debt.is_finite() || anchor_debt < 0.0 {
        return Err(config_error(format!(
            "historical debt must be a non-negative amount, got {anchor_debt}"
        )));
    }

    let mut loans = Vec::with_capacity(tranches.len() + issues.len());
    let mut tranched_total = 0.0;
    for tranche in tranches {
        validate_loan_terms(&tranche.name, tranche.balance, tranche.annual_rate)?;
        tranched_total += tranche.balance;
        loans.push(Loan::new(
            tranche.balance,
            tranche.annual_rate,
            tranche.term,
            0,
            granularity,
        ));
    }

    let residual = anchor_debt - tranched_total;
    if residual < -1e-6 * anchor_debt.max(1.0) {
        return Err(config_error(format!(
            "debt tranches total {tranched_total} exceeds historical debt {anchor_debt}"
        )));
    }
    let residual = residual.max(0.0);

    for issue in issues {
        validate_loan_terms("new debt", issue.amount, issue.annual_rate)?;
        if issue.period >= periods {
            tracing::warn!(
                period = issue.period,
                horizon = periods,
                "new debt issue outside projection horizon ignored"
            );
        }
    }

    let mut schedule = Vec::with_capacity(periods);
    let mut beginning_balance = anchor_debt;
    for period in 0..periods {
        let mut interest_expense = 0.0;
        let mut principal_payment = 0.0;
        for loan in &mut loans {
            interest_expense += loan.interest();
            principal_payment += loan.amortize(period);
        }

        let mut new_debt = 0.0;
        for issue in issues.iter().filter(|issue| issue.period == period) {
            let loan = Loan::new(
                issue.amount,
                issue.annual_rate,
                issue.term,
                period + 1,
                granularity,
            );
            interest_expense += loan.interest();
            new_debt += issue.amount;
            loans.push(loan);
        }

        let ending_balance = (residual + loans.iter().map(|l| l.balance).sum::<f64>()).max(0.0);
        schedule.push(DebtScheduleEntry {
            period,
            beginning_balance,
            interest_expense,
            principal_payment,
            new_debt,
            ending_balance,
        });
        beginning_balance = ending_balance;
    }

    Ok(schedule)
}

fn validate_loan_terms(name: &str, amount: f64, annual_rate: f64) -> ModelResult<()> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(config_error(format!(
            "debt '{name}' has invalid amount {amount}"
        )));
    }
    if !annual_rate.is_finite() || annual_rate < 0.0 {
        return Err(config_error(format!(
            "debt '{name}' has invalid rate {annual_rate}"
        )));
    }
    Ok(())
}
