//! Gamma-quantile income resampling.

use synpop_core::{
    config::{IncomeBracket, IncomeConfig, SynPopConfig},
    error::SynPopError,
    income::IncomeModel,
    rng::{RngBank, StageSlot},
};

#[test]
fn sampled_income_rebuckets_into_its_bracket() {
    let config = SynPopConfig::default_test();
    let model = IncomeModel::new(&config.income).expect("income model");
    let mut rng = RngBank::new(7).for_stage(StageSlot::Income);

    for bracket in config.income.brackets.iter().filter(|b| b.code != 90) {
        for _ in 0..200 {
            let income = model.sample(bracket.code, &mut rng).expect("sample");
            assert!(income >= bracket.low, "bracket {} gave {income}", bracket.code);
            if let Some(high) = bracket.high {
                assert!(income < high, "bracket {} gave {income}", bracket.code);
            }
            assert_eq!(
                model.bracket_of(income),
                Some(bracket.code),
                "income {income} left bracket {}",
                bracket.code
            );
        }
    }
}

#[test]
fn no_income_sentinel_always_yields_zero() {
    let config = SynPopConfig::default_test();
    let model = IncomeModel::new(&config.income).expect("income model");
    let mut rng = RngBank::new(7).for_stage(StageSlot::Income);
    for _ in 0..50 {
        assert_eq!(model.sample(model.no_income_code(), &mut rng).expect("sample"), 0.0);
    }
}

#[test]
fn incomes_spread_across_the_bracket() {
    let config = SynPopConfig::default_test();
    let model = IncomeModel::new(&config.income).expect("income model");
    let mut rng = RngBank::new(11).for_stage(StageSlot::Income);
    let draws: Vec<f64> = (0..500).map(|_| model.sample(4, &mut rng).expect("sample")).collect();
    let lower_half = draws.iter().filter(|&&x| x < 1_650.0).count();
    assert!(lower_half > 100 && lower_half < 400, "{lower_half} of 500 below midpoint");
}

#[test]
fn unknown_bracket_is_a_missing_category() {
    let model = IncomeModel::new(&SynPopConfig::default_test().income).expect("income model");
    let mut rng = RngBank::new(1).for_stage(StageSlot::Income);
    match model.sample(42, &mut rng) {
        Err(SynPopError::MissingCategory { dictionary, code }) => {
            assert_eq!(dictionary, "income_bracket");
            assert_eq!(code, "42");
        }
        other => panic!("expected MissingCategory, got {other:?}"),
    }
}

#[test]
fn invalid_gamma_parameters_are_rejected() {
    let config = IncomeConfig {
        gamma_shape: -1.0,
        gamma_rate: 0.001,
        no_income_code: 0,
        brackets: vec![IncomeBracket { code: 1, low: 0.0, high: None }],
    };
    assert!(matches!(IncomeModel::new(&config), Err(SynPopError::InvalidDistribution(_))));
}
