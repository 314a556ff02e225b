use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::simulation::series::MonthRecord;
use crate::types::{checked_add, checked_div, checked_mul, checked_sub, checked_sum, money_str, round_money, Money};
use crate::TaxSimResult;

/// Tax attributed to one month of the simulated year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyAmount {
    #[serde(rename = "mes")]
    pub month: u32,
    #[serde(rename = "valor", with = "money_str")]
    pub amount: Money,
}

/// Split `total` across `weights` proportionally, rounding each part half-up
/// to two decimals. Zero total weight falls back to equal parts. Rounding
/// drift always lands on the last part, so the parts sum to `total`.
pub fn apportion(total: Money, weights: &[Decimal]) -> TaxSimResult<Vec<Money>> {
    if weights.is_empty() {
        return Ok(Vec::new());
    }
    let total = round_money(total);
    let weight_sum = checked_sum(weights.iter().copied(), "apportion weights")?;

    let mut parts = Vec::with_capacity(weights.len());
    if weight_sum.is_zero() {
        let equal = checked_div(total, Decimal::from(weights.len() as u64), "equal share")?;
        parts.extend(std::iter::repeat(round_money(equal)).take(weights.len()));
    } else {
        for weight in weights {
            let share = checked_div(*weight, weight_sum, "proportional share")?;
            parts.push(round_money(checked_mul(total, share, "proportional share")?));
        }
    }

    let allocated = checked_sum(parts.iter().copied(), "allocated parts")?;
    let drift = checked_sub(total, allocated, "rounding drift")?;
    if let Some(last) = parts.last_mut() {
        *last = round_money(checked_add(*last, drift, "rounding drift")?);
    }
    Ok(parts)
}

/// Distribute an annual tax over the months of `records` in proportion to
/// monthly revenue.
pub fn allocate_monthly(annual_tax: Money, records: &[MonthRecord]) -> TaxSimResult<Vec<MonthlyAmount>> {
    let revenues: Vec<Decimal> = records.iter().map(|r| r.revenue).collect();
    let amounts = apportion(annual_tax, &revenues)?;
    Ok(records
        .iter()
        .zip(amounts)
        .map(|(record, amount)| MonthlyAmount {
            month: record.month,
            amount,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn series(revenues: &[Money]) -> Vec<MonthRecord> {
        revenues
            .iter()
            .enumerate()
            .map(|(i, r)| MonthRecord::new(2026, i as u32 + 1, *r, dec!(0)))
            .collect()
    }

    fn total(amounts: &[MonthlyAmount]) -> Money {
        amounts.iter().map(|a| a.amount).sum()
    }

    #[test]
    fn test_equal_revenue_equal_shares() {
        let records = series(&[dec!(4000); 12]);
        let out = allocate_monthly(dec!(7200.00), &records).unwrap();
        assert_eq!(out.len(), 12);
        assert!(out.iter().all(|a| a.amount.to_string() == "600.00"));
        assert_eq!(out[11].month, 12);
    }

    #[test]
    fn test_drift_goes_to_last_month() {
        let records = series(&[dec!(1); 12]);
        let out = allocate_monthly(dec!(100.00), &records).unwrap();
        // 100 / 12 = 8.333.. -> 8.33 x 11, last absorbs 0.04
        assert!(out[..11].iter().all(|a| a.amount == dec!(8.33)));
        assert_eq!(out[11].amount.to_string(), "8.37");
        assert_eq!(total(&out), dec!(100.00));
    }

    #[test]
    fn test_zero_revenue_uses_equal_shares() {
        let records = series(&[dec!(0); 12]);
        let out = allocate_monthly(dec!(1.00), &records).unwrap();
        assert!(out[..11].iter().all(|a| a.amount == dec!(0.08)));
        assert_eq!(out[11].amount, dec!(0.12));
        assert_eq!(total(&out), dec!(1.00));
    }

    #[test]
    fn test_proportional_to_revenue() {
        let mut revenues = vec![dec!(0); 12];
        revenues[0] = dec!(3000);
        revenues[1] = dec!(1000);
        let out = allocate_monthly(dec!(1000.00), &series(&revenues)).unwrap();
        assert_eq!(out[0].amount, dec!(750.00));
        assert_eq!(out[1].amount, dec!(250.00));
        assert!(out[2..].iter().all(|a| a.amount.is_zero()));
        assert_eq!(out[11].amount.to_string(), "0.00");
    }

    #[test]
    fn test_uneven_revenue_sums_exactly() {
        let revenues = [
            dec!(52000.00),
            dec!(48123.45),
            dec!(50999.99),
            dec!(47000.01),
            dec!(61000.10),
            dec!(39999.90),
            dec!(55555.55),
            dec!(44444.44),
            dec!(50000.00),
            dec!(49876.54),
            dec!(51234.56),
            dec!(60000.33),
        ];
        for annual in [dec!(84567.22), dec!(0.01), dec!(99999.99), dec!(0.00)] {
            let out = allocate_monthly(annual, &series(&revenues)).unwrap();
            assert_eq!(total(&out), annual);
        }
    }

    #[test]
    fn test_apportion_components() {
        let parts = apportion(dec!(5040.00), &[dec!(0.0065), dec!(0.03), dec!(0.04)]).unwrap();
        assert_eq!(parts, vec![dec!(428.24), dec!(1976.47), dec!(2635.29)]);
    }
}
