//! Read-only cost quotes

mod common;

use common::{with_fee, World, ONE};
use ramp_common::{Address, ConversionError, Currency, RampError};
use ramp_core::Cosigner;
use ramp_mocks::{FixedRateConverter, TestRateOracle};

#[test]
fn test_lend_cost_base() {
    let mut world = World::new();
    let id = world.request_loan(1000, false);
    let converter = world.par_converter(world.test());

    let cost = world
        .ramp
        .lend_cost(&world.ledger, &converter, world.test(), None, &id, &[], &[])
        .unwrap();
    assert_eq!(cost, 1000);
}

#[test]
fn test_lend_cost_with_cosigner() {
    let mut world = World::new();
    let id = world.request_loan(1000, false);
    world.cosigner.set_cost(id, 1234);
    let converter = world.par_converter(world.test());
    let cosigner: &dyn Cosigner = &*world.cosigner;

    let cost = world
        .ramp
        .lend_cost(&world.ledger, &converter, world.test(), Some(cosigner), &id, &[], &[])
        .unwrap();
    assert_eq!(cost, 1000 + 1234);
}

#[test]
fn test_lend_cost_with_cosigner_and_oracle() {
    let mut world = World::new();
    let id = world.request_loan(1000, true);
    world.cosigner.set_cost(id, 1234);
    let converter = world.par_converter(world.test());
    let oracle_data = TestRateOracle::encode_rate(ONE, 2 * ONE);
    let cosigner: &dyn Cosigner = &*world.cosigner;

    let cost = world
        .ramp
        .lend_cost(&world.ledger, &converter, world.test(), Some(cosigner), &id, &oracle_data, &[])
        .unwrap();
    assert_eq!(cost, (1000 + 1234) / 2);
}

#[test]
fn test_lend_cost_through_priced_converter() {
    let mut world = World::new();
    let id = world.request_loan(1000, false);
    let converter = FixedRateConverter::new(Address::from_label("amm")).with_rate(world.test(), world.eng(), 3, 2);

    let cost = world
        .ramp
        .lend_cost(&world.ledger, &converter, world.test(), None, &id, &[], &[])
        .unwrap();
    assert_eq!(cost, 1500);
}

#[test]
fn test_lend_cost_in_accounting_token_skips_converter() {
    let mut world = World::new();
    let id = world.request_loan(1000, false);
    let no_routes = FixedRateConverter::new(Address::from_label("empty"));

    let cost = world
        .ramp
        .lend_cost(&world.ledger, &no_routes, world.eng(), None, &id, &[], &[])
        .unwrap();
    assert_eq!(cost, 1000);
}

#[test]
fn test_lend_cost_without_route() {
    let mut world = World::new();
    let id = world.request_loan(1000, false);
    let no_routes = FixedRateConverter::new(Address::from_label("empty"));

    let result = world
        .ramp
        .lend_cost(&world.ledger, &no_routes, Currency::Native, None, &id, &[], &[]);
    assert!(matches!(
        result,
        Err(RampError::Conversion(ConversionError::NoRoute { .. }))
    ));
}

#[test]
fn test_pay_cost_loan_without_lend() {
    let mut world = World::new();
    let id = world.request_loan(1000, false);
    // Consulting this converter would fail
    let no_routes = FixedRateConverter::new(Address::from_label("empty"));

    let cost = world
        .ramp
        .pay_cost_with_fee(&world.ledger, &no_routes, world.test(), &id, 1000, &[])
        .unwrap();
    assert_eq!(cost, 0);
}

#[test]
fn test_pay_cost_base() {
    let mut world = World::new();
    let id = world.request_loan(1000, false);
    world.lend_directly(&id);
    let converter = world.par_converter(world.test());

    let cost = world
        .ramp
        .pay_cost_with_fee(&world.ledger, &converter, world.test(), &id, 100, &[])
        .unwrap();
    assert_eq!(cost, with_fee(100));
}

#[test]
fn test_pay_cost_with_oracle() {
    let mut world = World::new();
    let id = world.request_loan(1000, true);
    world.lend_directly(&id);
    let converter = world.par_converter(world.test());
    let oracle_data = TestRateOracle::encode_rate(ONE, 2 * ONE);

    let cost = world
        .ramp
        .pay_cost_with_fee(&world.ledger, &converter, world.test(), &id, 100, &oracle_data)
        .unwrap();
    assert_eq!(cost, with_fee(50));
}

#[test]
fn test_pay_cost_capped_at_outstanding() {
    let mut world = World::new();
    let id = world.request_loan(1000, true);
    world.lend_directly(&id);
    let converter = world.par_converter(world.test());
    let oracle_data = TestRateOracle::encode_rate(ONE, 2 * ONE);

    let cost = world
        .ramp
        .pay_cost_with_fee(&world.ledger, &converter, world.test(), &id, 10_000, &oracle_data)
        .unwrap();
    assert_eq!(cost, with_fee(500));
}

#[test]
fn test_pay_cost_zero_amount() {
    let mut world = World::new();
    let id = world.request_loan(1000, false);
    world.lend_directly(&id);
    let converter = world.par_converter(world.test());

    let cost = world
        .ramp
        .pay_cost_with_fee(&world.ledger, &converter, world.test(), &id, 0, &[])
        .unwrap();
    assert_eq!(cost, 0);
}

#[test]
fn test_fee_rounds_up_on_dust() {
    let mut world = World::new();
    let id = world.request_loan(1000, false);
    world.lend_directly(&id);
    let converter = world.par_converter(world.test());

    let cost = world
        .ramp
        .pay_cost_with_fee(&world.ledger, &converter, world.test(), &id, 1, &[])
        .unwrap();
    assert_eq!(cost, 2);
}

#[test]
fn test_quotes_leave_no_trace() {
    let mut world = World::new();
    let id = world.request_loan(1000, true);
    world.lend_directly(&id);
    let converter = world.par_converter(world.test());
    let events_before = world.ledger.events().len();

    world
        .ramp
        .pay_cost_with_fee(
            &world.ledger,
            &converter,
            world.test(),
            &id,
            100,
            &TestRateOracle::encode_rate(ONE, ONE),
        )
        .unwrap();
    assert_eq!(world.ledger.events().len(), events_before);
}

#[test]
fn test_suggested_max_spend() {
    let world = World::new();
    assert_eq!(world.ramp.suggested_max_spend(1000).unwrap(), 1020);
    assert_eq!(world.ramp.suggested_max_spend(1).unwrap(), 2);
}
