use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::simulation::series::MonthRecord;
use crate::types::{checked_div, checked_mul, checked_sub, checked_sum, money_str, round_money, Money, Rate};
use crate::TaxSimResult;

/// Share of revenue treated as added value when no input credits are declared.
pub const PRESUMED_ADDED_VALUE_SHARE: Rate = dec!(0.70);

/// Margin applied to revenue when no book profit is declared.
pub const PRESUMED_PROFIT_MARGIN: Rate = dec!(0.10);

/// Annual totals and derived tax bases for one completed series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualBasis {
    #[serde(with = "money_str")]
    pub total_revenue: Money,
    #[serde(with = "money_str")]
    pub total_payroll: Money,
    #[serde(with = "money_str")]
    pub total_input_credits: Money,
    /// Base for CBS/IBS
    #[serde(with = "money_str")]
    pub added_value: Money,
    /// Base for IRPJ/CSLL under Lucro Real and the reform scenario
    #[serde(with = "money_str")]
    pub taxable_profit: Money,
    /// True when taxable profit is the sum of declared book profit, false
    /// when it was presumed from revenue
    pub profit_was_declared: bool,
    #[serde(with = "money_str")]
    pub total_irpj_withheld: Money,
    #[serde(with = "money_str")]
    pub total_csll_withheld: Money,
}

impl AnnualBasis {
    /// Payroll over revenue ("fator R"). Zero revenue yields zero.
    pub fn factor_r(&self) -> TaxSimResult<Rate> {
        if self.total_revenue.is_zero() {
            return Ok(Decimal::ZERO);
        }
        checked_div(self.total_payroll, self.total_revenue, "fator R")
    }

    /// Tax over revenue, rounded like every other monetary output.
    pub fn effective_rate(&self, annual_tax: Money) -> TaxSimResult<Money> {
        if self.total_revenue.is_zero() {
            return Ok(round_money(Decimal::ZERO));
        }
        Ok(round_money(checked_div(
            annual_tax,
            self.total_revenue,
            "effective rate",
        )?))
    }
}

/// Reduce a series to its annual basis. Derived bases are rounded at the
/// point of computation.
pub fn aggregate(records: &[MonthRecord]) -> TaxSimResult<AnnualBasis> {
    let total_revenue = round_money(checked_sum(records.iter().map(|r| r.revenue), "total revenue")?);
    let total_payroll = round_money(checked_sum(records.iter().map(|r| r.payroll), "total payroll")?);
    let total_input_credits = round_money(checked_sum(
        records.iter().map(|r| r.input_credits),
        "total input credits",
    )?);

    let credits_declared = records.iter().any(|r| !r.input_credits.is_zero());
    let added_value = if credits_declared {
        round_money(checked_sub(total_revenue, total_input_credits, "added value")?)
    } else {
        round_money(checked_mul(PRESUMED_ADDED_VALUE_SHARE, total_revenue, "added value")?)
    };

    let profit_was_declared = records.iter().any(|r| r.book_profit.is_some());
    let taxable_profit = if profit_was_declared {
        round_money(checked_sum(
            records.iter().filter_map(|r| r.book_profit),
            "taxable profit",
        )?)
    } else {
        round_money(checked_mul(PRESUMED_PROFIT_MARGIN, total_revenue, "taxable profit")?)
    };

    Ok(AnnualBasis {
        total_revenue,
        total_payroll,
        total_input_credits,
        added_value,
        taxable_profit,
        profit_was_declared,
        total_irpj_withheld: round_money(checked_sum(
            records.iter().map(|r| r.irpj_withheld),
            "IRPJ withheld",
        )?),
        total_csll_withheld: round_money(checked_sum(
            records.iter().map(|r| r.csll_withheld),
            "CSLL withheld",
        )?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn year_of(revenue: Money, payroll: Money) -> Vec<MonthRecord> {
        (1..=12).map(|m| MonthRecord::new(2026, m, revenue, payroll)).collect()
    }

    #[test]
    fn test_totals_and_presumed_bases() {
        let basis = aggregate(&year_of(dec!(4000), dec!(1000))).unwrap();
        assert_eq!(basis.total_revenue, dec!(48000.00));
        assert_eq!(basis.total_payroll, dec!(12000.00));
        assert_eq!(basis.total_input_credits, dec!(0.00));
        assert_eq!(basis.added_value, dec!(33600.00));
        assert_eq!(basis.taxable_profit, dec!(4800.00));
        assert!(!basis.profit_was_declared);
        assert_eq!(basis.factor_r().unwrap(), dec!(0.25));
    }

    #[test]
    fn test_declared_credits_drive_added_value() {
        let mut records = year_of(dec!(1000), dec!(0));
        records[3].input_credits = dec!(250.50);
        let basis = aggregate(&records).unwrap();
        assert_eq!(basis.total_input_credits, dec!(250.50));
        assert_eq!(basis.added_value, dec!(11749.50));
    }

    #[test]
    fn test_declared_profit_summed_even_if_partial() {
        let mut records = year_of(dec!(1000), dec!(0));
        records[0].book_profit = Some(dec!(100));
        records[1].book_profit = Some(dec!(-20.25));
        let basis = aggregate(&records).unwrap();
        assert!(basis.profit_was_declared);
        assert_eq!(basis.taxable_profit, dec!(79.75));
    }

    #[test]
    fn test_declared_zero_profit_is_still_declared() {
        let mut records = year_of(dec!(1000), dec!(0));
        records[0].book_profit = Some(dec!(0));
        let basis = aggregate(&records).unwrap();
        assert!(basis.profit_was_declared);
        assert_eq!(basis.taxable_profit.to_string(), "0.00");
    }

    #[test]
    fn test_presumed_bases_round_half_up() {
        // 0.70 * 0.05 = 0.035 -> 0.04 ; 0.10 * 0.05 = 0.005 -> 0.01
        let mut records = year_of(dec!(0), dec!(0));
        records[0].revenue = dec!(0.05);
        let basis = aggregate(&records).unwrap();
        assert_eq!(basis.added_value.to_string(), "0.04");
        assert_eq!(basis.taxable_profit.to_string(), "0.01");
    }

    #[test]
    fn test_zero_revenue_rates_are_zero() {
        let basis = aggregate(&year_of(dec!(0), dec!(500))).unwrap();
        assert_eq!(basis.factor_r().unwrap(), dec!(0));
        assert_eq!(basis.effective_rate(dec!(0)).unwrap().to_string(), "0.00");
    }

    #[test]
    fn test_withholdings_totalled() {
        let mut records = year_of(dec!(1000), dec!(0));
        records[0].irpj_withheld = dec!(15);
        records[5].csll_withheld = dec!(10);
        let basis = aggregate(&records).unwrap();
        assert_eq!(basis.total_irpj_withheld, dec!(15.00));
        assert_eq!(basis.total_csll_withheld, dec!(10.00));
    }
}
