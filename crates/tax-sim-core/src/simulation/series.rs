use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::error::TaxSimError;
use crate::types::{checked_div, checked_sum, money_str, opt_money_str, round_money, Money};
use crate::TaxSimResult;

pub const MONTHS_PER_YEAR: usize = 12;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One month of operating data for the simulated company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthRecord {
    /// Calendar year; 0 when the caller left it out
    #[serde(rename = "ano", default)]
    pub year: i32,
    /// Month number, 1..=12
    #[serde(rename = "mes")]
    pub month: u32,
    /// Gross revenue (receita bruta)
    #[serde(rename = "receitaBruta", with = "money_str", default)]
    pub revenue: Money,
    /// Payroll (folha de salários)
    #[serde(rename = "folhaSalarios", with = "money_str", default)]
    pub payroll: Money,
    /// Book profit. `None` means unknown, which is not the same as zero.
    #[serde(rename = "lucroLiquidoContabil", with = "opt_money_str", default)]
    pub book_profit: Option<Money>,
    /// Purchases that generate PIS/COFINS credits
    #[serde(rename = "insumosCreditoPisCofins", with = "money_str", default)]
    pub input_credits: Money,
    /// IRPJ withheld at source by customers
    #[serde(rename = "retencaoIRPJ", with = "money_str", default)]
    pub irpj_withheld: Money,
    /// CSLL withheld at source by customers
    #[serde(rename = "retencaoCSLL", with = "money_str", default)]
    pub csll_withheld: Money,
}

impl MonthRecord {
    pub fn new(year: i32, month: u32, revenue: Money, payroll: Money) -> Self {
        Self {
            year,
            month,
            revenue,
            payroll,
            book_profit: None,
            input_credits: Decimal::ZERO,
            irpj_withheld: Decimal::ZERO,
            csll_withheld: Decimal::ZERO,
        }
    }

    /// Copy with every amount rounded to two decimals and the year filled in.
    pub fn normalized(&self, default_year: i32) -> Self {
        Self {
            year: if self.year == 0 { default_year } else { self.year },
            month: self.month,
            revenue: round_money(self.revenue),
            payroll: round_money(self.payroll),
            book_profit: self.book_profit.map(round_money),
            input_credits: round_money(self.input_credits),
            irpj_withheld: round_money(self.irpj_withheld),
            csll_withheld: round_money(self.csll_withheld),
        }
    }

    /// Months elapsed since year 0, for chronological ordering.
    pub fn ordinal(&self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month) - 1
    }
}

/// The completed twelve-month series plus how many months an estimator filled.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesCompletion {
    pub records: Vec<MonthRecord>,
    pub estimated_months: usize,
}

/// Optional collaborator that projects missing months, typically from
/// historical growth. Results are advisory: any failure falls back to the
/// plain mean.
pub trait SeriesEstimator: Send + Sync {
    fn name(&self) -> &str;

    fn estimate(
        &self,
        partial: &[MonthRecord],
        historical: &[MonthRecord],
        year: i32,
    ) -> TaxSimResult<Vec<MonthRecord>>;
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Month numbers must be within 1..=12 and unique.
pub fn validate_months(records: &[MonthRecord], label: &str) -> TaxSimResult<()> {
    let mut seen = [false; MONTHS_PER_YEAR];
    for record in records {
        if !(1..=12).contains(&record.month) {
            return Err(TaxSimError::InvalidSeries(format!(
                "{label}: month {} is outside 1..12",
                record.month
            )));
        }
        let slot = (record.month - 1) as usize;
        if seen[slot] {
            return Err(TaxSimError::InvalidSeries(format!(
                "{label}: month {} appears more than once",
                record.month
            )));
        }
        seen[slot] = true;
    }
    Ok(())
}

/// Checks estimator output before it is trusted: valid, unique months that
/// the caller did not already supply.
pub fn validate_estimate(estimated: &[MonthRecord], target: &[MonthRecord]) -> TaxSimResult<()> {
    validate_months(estimated, "estimate").map_err(|e| {
        TaxSimError::UpstreamEstimatorUnavailable(format!("malformed estimate ({e})"))
    })?;
    if let Some(clash) = estimated
        .iter()
        .find(|e| target.iter().any(|t| t.month == e.month))
    {
        return Err(TaxSimError::UpstreamEstimatorUnavailable(format!(
            "malformed estimate (month {} was already supplied)",
            clash.month
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Mean fallback
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
struct FallbackMonth {
    revenue: Money,
    payroll: Money,
    input_credits: Money,
    book_profit: Option<Money>,
}

impl FallbackMonth {
    fn record(&self, year: i32, month: u32) -> MonthRecord {
        MonthRecord {
            book_profit: self.book_profit,
            input_credits: self.input_credits,
            ..MonthRecord::new(year, month, self.revenue, self.payroll)
        }
    }
}

fn mean(values: impl IntoIterator<Item = Decimal>, count: usize, context: &str) -> TaxSimResult<Money> {
    if count == 0 {
        return Ok(round_money(Decimal::ZERO));
    }
    let total = checked_sum(values, context)?;
    Ok(round_money(checked_div(total, Decimal::from(count as u64), context)?))
}

fn fallback_values(source: &[MonthRecord]) -> TaxSimResult<FallbackMonth> {
    let n = source.len();
    let declared: Vec<Money> = source.iter().filter_map(|r| r.book_profit).collect();
    let profit_mean = mean(declared.iter().copied(), declared.len(), "mean book profit")?;
    let book_profit = if declared.is_empty() || profit_mean.is_zero() {
        None
    } else {
        Some(profit_mean)
    };

    Ok(FallbackMonth {
        revenue: mean(source.iter().map(|r| r.revenue), n, "mean revenue")?,
        payroll: mean(source.iter().map(|r| r.payroll), n, "mean payroll")?,
        input_credits: mean(source.iter().map(|r| r.input_credits), n, "mean input credits")?,
        book_profit,
    })
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Record for `month` built from the plain mean of `source`. Withheld
/// amounts are not projected.
pub fn mean_record(source: &[MonthRecord], year: i32, month: u32) -> TaxSimResult<MonthRecord> {
    let fallback = fallback_values(source)?;
    Ok(fallback.record(year, month))
}

/// Year of the simulated series: the first year carried by a target record,
/// else the caller's declared year.
pub fn series_year(target: &[MonthRecord], year: i32) -> i32 {
    target
        .iter()
        .map(|r| r.year)
        .find(|y| *y != 0)
        .unwrap_or(year)
}

/// Fill a twelve-month series for the simulation year using the plain mean.
pub fn complete_series(
    target: &[MonthRecord],
    historical: &[MonthRecord],
    year: i32,
) -> TaxSimResult<Vec<MonthRecord>> {
    Ok(complete_series_with(target, historical, year, &[])?.records)
}

/// Fill a twelve-month series, preferring `estimated` records for months the
/// caller did not supply. `estimated` must already have passed
/// [`validate_estimate`].
pub fn complete_series_with(
    target: &[MonthRecord],
    historical: &[MonthRecord],
    year: i32,
    estimated: &[MonthRecord],
) -> TaxSimResult<SeriesCompletion> {
    validate_months(target, "targetYearMonthly")?;

    let series_year = series_year(target, year);

    let mut by_month: BTreeMap<u32, MonthRecord> = target
        .iter()
        .map(|r| (r.month, r.normalized(series_year)))
        .collect();

    if by_month.len() == MONTHS_PER_YEAR {
        return Ok(SeriesCompletion {
            records: by_month.into_values().collect(),
            estimated_months: 0,
        });
    }

    let source = if target.is_empty() { historical } else { target };
    let fallback = fallback_values(source)?;

    let mut estimated_months = 0;
    for month in 1..=MONTHS_PER_YEAR as u32 {
        if by_month.contains_key(&month) {
            continue;
        }
        let filled = match estimated.iter().find(|e| e.month == month) {
            Some(projection) => {
                estimated_months += 1;
                MonthRecord {
                    year: series_year,
                    ..projection.normalized(series_year)
                }
            }
            None => fallback.record(series_year, month),
        };
        by_month.insert(month, filled);
    }

    Ok(SeriesCompletion {
        records: by_month.into_values().collect(),
        estimated_months,
    })
}

/// Run an estimator on a worker thread, giving up after `timeout`. Every
/// failure mode is reported as `UpstreamEstimatorUnavailable`.
///
/// A worker that outlives `timeout` is detached, not cancelled: it keeps its
/// OS thread until `estimate` returns and its result is dropped. Estimators
/// that can block indefinitely must enforce their own deadline.
pub fn estimate_with_timeout(
    estimator: Arc<dyn SeriesEstimator>,
    partial: &[MonthRecord],
    historical: &[MonthRecord],
    year: i32,
    timeout: Duration,
) -> TaxSimResult<Vec<MonthRecord>> {
    let (tx, rx) = mpsc::channel();
    let worker = Arc::clone(&estimator);
    let partial = partial.to_vec();
    let historical = historical.to_vec();

    thread::Builder::new()
        .name("series-estimator".to_string())
        .spawn(move || {
            // Receiver may be gone after a timeout.
            let _ = tx.send(worker.estimate(&partial, &historical, year));
        })
        .map_err(|e| {
            TaxSimError::UpstreamEstimatorUnavailable(format!("could not start estimator: {e}"))
        })?;

    match rx.recv_timeout(timeout) {
        Ok(Ok(records)) => Ok(records),
        Ok(Err(e)) => Err(TaxSimError::UpstreamEstimatorUnavailable(format!(
            "{} failed: {e}",
            estimator.name()
        ))),
        Err(RecvTimeoutError::Timeout) => Err(TaxSimError::UpstreamEstimatorUnavailable(format!(
            "{} did not answer within {} ms",
            estimator.name(),
            timeout.as_millis()
        ))),
        Err(RecvTimeoutError::Disconnected) => Err(TaxSimError::UpstreamEstimatorUnavailable(
            format!("{} stopped without answering", estimator.name()),
        )),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
