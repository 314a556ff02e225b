use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::config::RateTable;
use crate::simulation::aggregate::AnnualBasis;
use crate::simulation::allocation::apportion;
use crate::types::{checked_mul, checked_sub, checked_sum, money_str, round_money, zero_money, Money, Rate};
use crate::TaxSimResult;

/// Minimum fator R for Simples Nacional Anexo III.
pub const FACTOR_R_THRESHOLD: Rate = dec!(0.28);

const PRESUMED_PROFIT_SHARE: Rate = dec!(0.32);
const IRPJ_RATE: Rate = dec!(0.15);
const CSLL_RATE: Rate = dec!(0.09);
const PRESUMIDO_PIS_RATE: Rate = dec!(0.0065);
const PRESUMIDO_COFINS_RATE: Rate = dec!(0.03);
const ISS_RATE: Rate = dec!(0.04);
const REAL_PIS_RATE: Rate = dec!(0.0165);
const REAL_COFINS_RATE: Rate = dec!(0.076);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The fixed set of regimes, declared in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Regime {
    SimplesAnexoIII,
    SimplesAnexoV,
    LucroPresumido,
    LucroReal,
    ReformaCbsIbs,
}

impl Regime {
    pub fn name(&self) -> &'static str {
        match self {
            Regime::SimplesAnexoIII => "Simples Nacional - Anexo III (Sistema Atual)",
            Regime::SimplesAnexoV => "Simples Nacional - Anexo V (Sistema Atual)",
            Regime::LucroPresumido => "Lucro Presumido - Sistema Atual",
            Regime::LucroReal => "Lucro Real - Sistema Atual",
            Regime::ReformaCbsIbs => "Regime Geral Serviços - Reforma (CBS/IBS)",
        }
    }
}

/// Tax components reported for every regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaxComponent {
    IRPJ,
    CSLL,
    PIS,
    COFINS,
    ISS,
    CPP,
    CBS,
    IBS,
    IS,
}

impl TaxComponent {
    pub const ALL: [TaxComponent; 9] = [
        TaxComponent::IRPJ,
        TaxComponent::CSLL,
        TaxComponent::PIS,
        TaxComponent::COFINS,
        TaxComponent::ISS,
        TaxComponent::CPP,
        TaxComponent::CBS,
        TaxComponent::IBS,
        TaxComponent::IS,
    ];
}

/// Per-component amounts. Components a regime does not use stay at "0.00".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxBreakdown {
    #[serde(rename = "IRPJ", with = "money_str", default)]
    pub irpj: Money,
    #[serde(rename = "CSLL", with = "money_str", default)]
    pub csll: Money,
    #[serde(rename = "PIS", with = "money_str", default)]
    pub pis: Money,
    #[serde(rename = "COFINS", with = "money_str", default)]
    pub cofins: Money,
    #[serde(rename = "ISS", with = "money_str", default)]
    pub iss: Money,
    #[serde(rename = "CPP", with = "money_str", default)]
    pub cpp: Money,
    #[serde(rename = "CBS", with = "money_str", default)]
    pub cbs: Money,
    #[serde(rename = "IBS", with = "money_str", default)]
    pub ibs: Money,
    #[serde(rename = "IS", with = "money_str", default)]
    pub is: Money,
}

impl Default for TaxBreakdown {
    fn default() -> Self {
        Self {
            irpj: zero_money(),
            csll: zero_money(),
            pis: zero_money(),
            cofins: zero_money(),
            iss: zero_money(),
            cpp: zero_money(),
            cbs: zero_money(),
            ibs: zero_money(),
            is: zero_money(),
        }
    }
}

impl TaxBreakdown {
    pub fn get(&self, component: TaxComponent) -> Money {
        match component {
            TaxComponent::IRPJ => self.irpj,
            TaxComponent::CSLL => self.csll,
            TaxComponent::PIS => self.pis,
            TaxComponent::COFINS => self.cofins,
            TaxComponent::ISS => self.iss,
            TaxComponent::CPP => self.cpp,
            TaxComponent::CBS => self.cbs,
            TaxComponent::IBS => self.ibs,
            TaxComponent::IS => self.is,
        }
    }

    pub fn total(&self) -> TaxSimResult<Money> {
        Ok(round_money(checked_sum(
            TaxComponent::ALL.iter().map(|c| self.get(*c)),
            "tax breakdown total",
        )?))
    }
}

/// One regime's annual outcome, before monthly allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RegimeAssessment {
    pub regime: Regime,
    pub annual_tax: Money,
    pub effective_rate: Money,
    pub breakdown: TaxBreakdown,
    pub note: String,
}

impl RegimeAssessment {
    fn from_breakdown(
        regime: Regime,
        basis: &AnnualBasis,
        breakdown: TaxBreakdown,
        note: String,
    ) -> TaxSimResult<Self> {
        let annual_tax = breakdown.total()?;
        Ok(Self {
            regime,
            annual_tax,
            effective_rate: basis.effective_rate(annual_tax)?,
            breakdown,
            note,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn tax(base: Money, rate: Rate, context: &str) -> TaxSimResult<Money> {
    Ok(round_money(checked_mul(base, rate, context)?))
}

fn percent(rate: Rate, context: &str) -> TaxSimResult<String> {
    Ok(checked_mul(rate, dec!(100), context)?.round_dp(2).normalize().to_string())
}

/// Simples Nacional effective rate for the revenue bracket.
pub fn simples_tier_rate(regime: Regime, total_revenue: Money) -> Rate {
    let tier = if total_revenue <= dec!(180000.00) {
        0
    } else if total_revenue <= dec!(360000.00) {
        1
    } else if total_revenue <= dec!(720000.00) {
        2
    } else {
        3
    };
    let rates = match regime {
        Regime::SimplesAnexoIII => [dec!(0.06), dec!(0.11), dec!(0.135), dec!(0.16)],
        _ => [dec!(0.15), dec!(0.18), dec!(0.20), dec!(0.22)],
    };
    rates[tier]
}

/// The Simples annex that fator R selects. Exactly one is ever eligible.
pub fn simples_annex(basis: &AnnualBasis) -> TaxSimResult<Regime> {
    if basis.factor_r()? >= FACTOR_R_THRESHOLD {
        Ok(Regime::SimplesAnexoIII)
    } else {
        Ok(Regime::SimplesAnexoV)
    }
}

/// Regimes that apply to `basis`, in emission order.
pub fn applicable_regimes(basis: &AnnualBasis) -> TaxSimResult<Vec<Regime>> {
    Ok(vec![
        simples_annex(basis)?,
        Regime::LucroPresumido,
        Regime::LucroReal,
        Regime::ReformaCbsIbs,
    ])
}

fn profit_basis_note(basis: &AnnualBasis) -> String {
    if basis.profit_was_declared {
        format!(
            "Lucro tributável de {} a partir do lucro contábil informado.",
            basis.taxable_profit
        )
    } else {
        format!(
            "Lucro tributável presumido em 10% do faturamento ({}), pois o lucro contábil não foi informado.",
            basis.taxable_profit
        )
    }
}

fn withholding_note(basis: &AnnualBasis) -> Option<String> {
    if basis.total_irpj_withheld.is_zero() && basis.total_csll_withheld.is_zero() {
        return None;
    }
    Some(format!(
        "Retenções na fonte informadas (IRPJ {}, CSLL {}) podem ser compensadas na apuração.",
        basis.total_irpj_withheld, basis.total_csll_withheld
    ))
}

fn join_notes(parts: Vec<String>) -> String {
    parts.join(" ")
}

// ---------------------------------------------------------------------------
// Regime calculators
// ---------------------------------------------------------------------------

fn calculate_simples(regime: Regime, basis: &AnnualBasis, rates: &RateTable) -> TaxSimResult<RegimeAssessment> {
    let factor_r = basis.factor_r()?;
    let rate = simples_tier_rate(regime, basis.total_revenue);
    let das = tax(basis.total_revenue, rate, "Simples DAS")?;

    // CPP embedded in the DAS, capped by what payroll would generate.
    let cpp_cap = checked_mul(basis.total_payroll, rates.cpp_rate, "Simples CPP")?;
    let non_cpp_share = checked_sub(Decimal::ONE, rates.simples_share, "Simples CPP")?;
    let cpp_share = checked_mul(das, non_cpp_share, "Simples CPP")?;
    let cpp = round_money(cpp_cap.min(cpp_share));
    let remainder = checked_sub(das, cpp, "Simples DAS remainder")?;
    let parts = apportion(
        remainder,
        &[PRESUMIDO_PIS_RATE, PRESUMIDO_COFINS_RATE, ISS_RATE],
    )?;

    let breakdown = TaxBreakdown {
        pis: parts[0],
        cofins: parts[1],
        iss: parts[2],
        cpp,
        ..Default::default()
    };

    let comparison = if regime == Regime::SimplesAnexoIII { ">=" } else { "<" };
    let note = format!(
        "Fator R de {}% {} 28%; alíquota efetiva de {}% sobre o faturamento, recolhida no DAS.",
        percent(factor_r, "fator R note")?,
        comparison,
        percent(rate, "Simples rate note")?
    );
    RegimeAssessment::from_breakdown(regime, basis, breakdown, note)
}

/// Simples Nacional Anexo III (fator R >= 0.28).
pub fn calculate_simples_anexo_iii(basis: &AnnualBasis, rates: &RateTable) -> TaxSimResult<RegimeAssessment> {
    calculate_simples(Regime::SimplesAnexoIII, basis, rates)
}

/// Simples Nacional Anexo V (fator R < 0.28).
pub fn calculate_simples_anexo_v(basis: &AnnualBasis, rates: &RateTable) -> TaxSimResult<RegimeAssessment> {
    calculate_simples(Regime::SimplesAnexoV, basis, rates)
}

/// Lucro Presumido with a 32% presumed base for services.
pub fn calculate_lucro_presumido(basis: &AnnualBasis) -> TaxSimResult<RegimeAssessment> {
    let revenue = basis.total_revenue;
    let presumed_base = checked_mul(revenue, PRESUMED_PROFIT_SHARE, "presumed base")?;

    let breakdown = TaxBreakdown {
        irpj: tax(presumed_base, IRPJ_RATE, "Presumido IRPJ")?,
        csll: tax(presumed_base, CSLL_RATE, "Presumido CSLL")?,
        pis: tax(revenue, PRESUMIDO_PIS_RATE, "Presumido PIS")?,
        cofins: tax(revenue, PRESUMIDO_COFINS_RATE, "Presumido COFINS")?,
        iss: tax(revenue, ISS_RATE, "Presumido ISS")?,
        ..Default::default()
    };

    let mut notes = vec![format!(
        "Base presumida de 32% do faturamento ({}); PIS/COFINS cumulativos e ISS aproximado de 4%.",
        round_money(presumed_base)
    )];
    notes.extend(withholding_note(basis));
    RegimeAssessment::from_breakdown(Regime::LucroPresumido, basis, breakdown, join_notes(notes))
}

fn income_taxes(basis: &AnnualBasis, context: &str) -> TaxSimResult<(Money, Money)> {
    // A declared loss is taxed as is and yields negative IRPJ/CSLL.
    let profit = basis.taxable_profit;
    Ok((tax(profit, IRPJ_RATE, context)?, tax(profit, CSLL_RATE, context)?))
}

/// Lucro Real on taxable profit with non-cumulative PIS/COFINS.
pub fn calculate_lucro_real(basis: &AnnualBasis, rates: &RateTable) -> TaxSimResult<RegimeAssessment> {
    let (irpj, csll) = income_taxes(basis, "Lucro Real income taxes")?;
    let recognized = checked_mul(
        basis.total_input_credits,
        rates.credit_recognition,
        "recognized input credits",
    )?;
    let pis_cofins_base =
        round_money(checked_sub(basis.total_revenue, recognized, "PIS/COFINS base")?.max(Decimal::ZERO));

    let breakdown = TaxBreakdown {
        irpj,
        csll,
        pis: tax(pis_cofins_base, REAL_PIS_RATE, "Lucro Real PIS")?,
        cofins: tax(pis_cofins_base, REAL_COFINS_RATE, "Lucro Real COFINS")?,
        ..Default::default()
    };

    let mut notes = vec![profit_basis_note(basis)];
    if !basis.total_input_credits.is_zero() {
        if rates.credit_recognition.is_zero() {
            notes.push(format!(
                "Créditos de PIS/COFINS de {} registrados, sem abatimento da base.",
                basis.total_input_credits
            ));
        } else {
            notes.push(format!(
                "Base de PIS/COFINS reduzida em {} de créditos sobre insumos.",
                round_money(recognized)
            ));
        }
    }
    notes.extend(withholding_note(basis));
    RegimeAssessment::from_breakdown(Regime::LucroReal, basis, breakdown, join_notes(notes))
}

/// Simplified post-reform regime: CBS/IBS on added value plus Lucro Real
/// income taxes.
pub fn calculate_reforma(basis: &AnnualBasis, rates: &RateTable) -> TaxSimResult<RegimeAssessment> {
    let (irpj, csll) = income_taxes(basis, "reform income taxes")?;
    let breakdown = TaxBreakdown {
        irpj,
        csll,
        cbs: tax(basis.added_value, rates.cbs_rate, "CBS")?,
        ibs: tax(basis.added_value, rates.ibs_rate, "IBS")?,
        ..Default::default()
    };

    let note = join_notes(vec![
        format!(
            "Regime simplificado da reforma tributária: CBS de {}% e IBS de {}% sobre valor adicionado de {}.",
            percent(rates.cbs_rate, "CBS note")?,
            percent(rates.ibs_rate, "IBS note")?,
            basis.added_value
        ),
        profit_basis_note(basis),
    ]);
    RegimeAssessment::from_breakdown(Regime::ReformaCbsIbs, basis, breakdown, note)
}

pub fn calculate_regime(
    regime: Regime,
    basis: &AnnualBasis,
    rates: &RateTable,
) -> TaxSimResult<RegimeAssessment> {
    match regime {
        Regime::SimplesAnexoIII => calculate_simples_anexo_iii(basis, rates),
        Regime::SimplesAnexoV => calculate_simples_anexo_v(basis, rates),
        Regime::LucroPresumido => calculate_lucro_presumido(basis),
        Regime::LucroReal => calculate_lucro_real(basis, rates),
        Regime::ReformaCbsIbs => calculate_reforma(basis, rates),
    }
}

/// Evaluate every applicable regime, in emission order.
pub fn calculate_all(basis: &AnnualBasis, rates: &RateTable) -> TaxSimResult<Vec<RegimeAssessment>> {
    applicable_regimes(basis)?
        .into_iter()
        .map(|regime| calculate_regime(regime, basis, rates))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
