use crate::simulation::regimes::RegimeAssessment;

/// Index of the cheapest regime. Ties keep the earliest entry, which is the
/// emission order of the input.
pub fn select_cheapest(assessments: &[RegimeAssessment]) -> Option<usize> {
    assessments
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, &RegimeAssessment)>, (i, candidate)| match best {
            Some((_, current)) if current.annual_tax <= candidate.annual_tax => best,
            _ => Some((i, candidate)),
        })
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::regimes::{Regime, TaxBreakdown};
    use crate::types::Money;
    use rust_decimal_macros::dec;

    fn assessment(regime: Regime, annual_tax: Money) -> RegimeAssessment {
        RegimeAssessment {
            regime,
            annual_tax,
            effective_rate: dec!(0),
            breakdown: TaxBreakdown::default(),
            note: String::new(),
        }
    }

    #[test]
    fn test_picks_minimum() {
        let all = vec![
            assessment(Regime::SimplesAnexoV, dec!(7200.00)),
            assessment(Regime::LucroPresumido, dec!(7358.40)),
            assessment(Regime::LucroReal, dec!(5592.00)),
            assessment(Regime::ReformaCbsIbs, dec!(9888.00)),
        ];
        assert_eq!(select_cheapest(&all), Some(2));
    }

    #[test]
    fn test_tie_keeps_first_in_emission_order() {
        let all = vec![
            assessment(Regime::SimplesAnexoIII, dec!(100.00)),
            assessment(Regime::LucroPresumido, dec!(100.00)),
            assessment(Regime::LucroReal, dec!(100.0)),
        ];
        assert_eq!(select_cheapest(&all), Some(0));
    }

    #[test]
    fn test_exact_decimal_comparison() {
        let all = vec![
            assessment(Regime::LucroPresumido, dec!(1000.01)),
            assessment(Regime::LucroReal, dec!(1000.00)),
        ];
        assert_eq!(select_cheapest(&all), Some(1));
    }

    #[test]
    fn test_empty_has_no_choice() {
        assert_eq!(select_cheapest(&[]), None);
    }
}
