use rust_decimal::{Decimal, MathematicalOps};

use crate::error::TaxSimError;
use crate::simulation::series::{mean_record, MonthRecord, SeriesEstimator};
use crate::types::{checked_div, checked_mul, checked_sub, checked_sum, round_money, Money, Rate};
use crate::TaxSimResult;

/// Projects missing months by compounding the average month-over-month
/// growth observed in the historical series. Deterministic: the same input
/// always produces the same projection.
#[derive(Debug, Clone)]
pub struct TrendEstimator {
    /// Minimum number of historical months required to estimate growth
    pub min_history: usize,
}

impl Default for TrendEstimator {
    fn default() -> Self {
        Self { min_history: 2 }
    }
}

/// Mean of (v[i] / v[i-1] - 1) over consecutive pairs with a positive
/// predecessor. `None` when no such pair exists.
pub fn average_growth(values: &[Money]) -> TaxSimResult<Option<Rate>> {
    let mut rates = Vec::new();
    for pair in values.windows(2) {
        let (prev, cur) = (pair[0], pair[1]);
        if prev > Decimal::ZERO {
            rates.push(checked_sub(checked_div(cur, prev, "growth ratio")?, Decimal::ONE, "growth ratio")?);
        }
    }
    if rates.is_empty() {
        return Ok(None);
    }
    let count = Decimal::from(rates.len() as u64);
    Ok(Some(checked_div(checked_sum(rates, "growth rates")?, count, "average growth")?))
}

fn project(anchor: Money, growth: Rate, periods: i64, context: &str) -> TaxSimResult<Money> {
    let factor = Decimal::ONE + growth;
    if factor <= Decimal::ZERO {
        return Err(TaxSimError::InsufficientData(format!(
            "{context}: growth of {growth} leaves nothing to compound"
        )));
    }
    let compounded = factor
        .checked_powi(periods)
        .ok_or_else(|| TaxSimError::ArithmeticOverflow {
            context: context.to_string(),
        })?;
    Ok(round_money(checked_mul(anchor, compounded, context)?))
}

impl SeriesEstimator for TrendEstimator {
    fn name(&self) -> &str {
        "trend"
    }

    fn estimate(
        &self,
        partial: &[MonthRecord],
        historical: &[MonthRecord],
        year: i32,
    ) -> TaxSimResult<Vec<MonthRecord>> {
        let mut history = historical.to_vec();
        history.sort_by_key(MonthRecord::ordinal);
        if history.len() < self.min_history {
            return Err(TaxSimError::InsufficientData(format!(
                "trend needs at least {} historical months, got {}",
                self.min_history,
                history.len()
            )));
        }

        let revenues: Vec<Money> = history.iter().map(|r| r.revenue).collect();
        let payrolls: Vec<Money> = history.iter().map(|r| r.payroll).collect();
        let revenue_growth = average_growth(&revenues)?.ok_or_else(|| {
            TaxSimError::InsufficientData("no positive historical revenue to grow from".into())
        })?;
        let payroll_growth = average_growth(&payrolls)?.unwrap_or(Decimal::ZERO);

        let mut timeline: Vec<MonthRecord> = partial
            .iter()
            .map(|r| r.normalized(year))
            .chain(history.iter().cloned())
            .collect();
        timeline.sort_by_key(MonthRecord::ordinal);

        let mean_source = if partial.is_empty() { historical } else { partial };
        let mut estimated = Vec::new();
        for month in 1..=12u32 {
            if partial.iter().any(|r| r.month == month) {
                continue;
            }
            let ordinal = MonthRecord::new(year, month, Decimal::ZERO, Decimal::ZERO).ordinal();
            // Nearest known month; ties go to the earlier one.
            let anchor = timeline
                .iter()
                .min_by_key(|r| ((r.ordinal() - ordinal).abs(), r.ordinal()))
                .ok_or_else(|| TaxSimError::InsufficientData("empty timeline".into()))?;
            let periods = ordinal - anchor.ordinal();

            let base = mean_record(mean_source, year, month)?;
            estimated.push(MonthRecord {
                revenue: project(anchor.revenue, revenue_growth, periods, "revenue projection")?,
                payroll: project(anchor.payroll, payroll_growth, periods, "payroll projection")?,
                ..base
            });
        }
        Ok(estimated)
    }
}
