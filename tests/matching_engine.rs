//! End-to-end coverage of the matching/settlement contract against the
//! in-memory fake store in `tests/common`, covering the same scenarios the
//! Postgres-backed `MatchingEngine` handles: a clean fill, a multi-level
//! sweep leaving a resting remainder, a cancellation, self-trade avoidance,
//! dust discard, and cost-basis bookkeeping on both sides of a trade.

mod common;

use clob_matching_engine::models::Side;
use common::{cancel_order, new_order, place_order, test_market, FakeStore};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

#[tokio::test]
async fn full_fill_against_single_maker_settles_both_sides() {
    let market = test_market();
    let mut store = FakeStore::default();

    let maker_account = Uuid::new_v4();
    let taker_account = Uuid::new_v4();
    store.fund(maker_account, market.base_asset_id, dec!(10));
    store.fund(taker_account, market.quote_asset_id, dec!(1000));

    let maker_result =
        place_order(&mut store, &market, true, new_order(Side::Ask, dec!(10), dec!(10), maker_account))
            .expect("maker order should be accepted");
    assert!(maker_result.matches.is_empty());

    let taker_result =
        place_order(&mut store, &market, true, new_order(Side::Bid, dec!(10), dec!(10), taker_account))
            .expect("taker order should be accepted");

    assert_eq!(taker_result.matches.len(), 1);
    assert!(taker_result.remaining_order.is_none());
    assert_eq!(taker_result.completed_maker_ids.len(), 1);
    assert!(taker_result.updated_makers.is_empty());

    // Taker (buyer) ends up long 10 base at cost basis 10/unit.
    let buyer_base = store.holding(taker_account, market.base_asset_id);
    assert_eq!(buyer_base.quantity, dec!(10));
    assert_eq!(buyer_base.average_cost_basis, dec!(10));
    assert_eq!(buyer_base.total_cost, dec!(100));

    // Maker (seller) is credited proceeds in quote and has no base left.
    let seller_quote = store.holding(maker_account, market.quote_asset_id);
    assert_eq!(seller_quote.quantity, dec!(100));
    let seller_base = store.holding(maker_account, market.base_asset_id);
    assert_eq!(seller_base.quantity, Decimal::ZERO);
}

#[tokio::test]
async fn sweep_sweeps_multiple_levels_and_rests_remainder() {
    let market = test_market();
    let mut store = FakeStore::default();

    let maker1 = Uuid::new_v4();
    let maker2 = Uuid::new_v4();
    let taker = Uuid::new_v4();
    store.fund(maker1, market.base_asset_id, dec!(2));
    store.fund(maker2, market.base_asset_id, dec!(5));
    store.fund(taker, market.quote_asset_id, dec!(1000));

    place_order(&mut store, &market, true, new_order(Side::Ask, dec!(10), dec!(2), maker1)).unwrap();
    place_order(&mut store, &market, true, new_order(Side::Ask, dec!(11), dec!(5), maker2)).unwrap();

    // Bid for 8 at limit 11: sweeps both levels (2 + 5 = 7 filled), rests 1.
    let result =
        place_order(&mut store, &market, true, new_order(Side::Bid, dec!(11), dec!(8), taker)).unwrap();

    assert_eq!(result.matches.len(), 2);
    assert_eq!(result.completed_maker_ids.len(), 2);
    let remaining = result.remaining_order.expect("taker should rest the unfilled remainder");
    assert_eq!(remaining.quantity, dec!(1));

    // The taker's quote reservation was drawn down once at placement, at the
    // taker's own limit price (11 * 8 = 88): settlement only credits makers'
    // quote balances, it never refunds the taker for the better prices (10
    // and 11 vs. an 11 limit) its fills actually cleared at. That unspent
    // slack stays locked in the reservation alongside the genuinely-pending
    // 1-unit remainder, and is only freed by cancelling the resting order.
    let taker_quote = store.holding(taker, market.quote_asset_id);
    assert_eq!(taker_quote.quantity, dec!(1000) - dec!(88));
}

#[tokio::test]
async fn cancel_releases_the_original_reservation() {
    let market = test_market();
    let mut store = FakeStore::default();

    let account = Uuid::new_v4();
    store.fund(account, market.base_asset_id, dec!(5));

    let result =
        place_order(&mut store, &market, true, new_order(Side::Ask, dec!(10), dec!(5), account)).unwrap();
    assert!(result.matches.is_empty());
    assert_eq!(store.holding(account, market.base_asset_id).quantity, Decimal::ZERO);

    let cancelled = cancel_order(&mut store, &market, result.order_id, Side::Ask);
    assert!(cancelled);
    assert_eq!(store.holding(account, market.base_asset_id).quantity, dec!(5));
    assert!(store.orders.get(&result.order_id).is_none());

    // Cancelling again (already gone) reports false, not an error.
    assert!(!cancel_order(&mut store, &market, result.order_id, Side::Ask));
}

#[tokio::test]
async fn self_trade_disallowed_skips_own_resting_order() {
    let market = test_market();
    let mut store = FakeStore::default();

    let account = Uuid::new_v4();
    let other = Uuid::new_v4();
    store.fund(account, market.base_asset_id, dec!(5));
    store.fund(other, market.base_asset_id, dec!(5));
    store.fund(account, market.quote_asset_id, dec!(1000));

    place_order(&mut store, &market, false, new_order(Side::Ask, dec!(10), dec!(5), account)).unwrap();
    place_order(&mut store, &market, false, new_order(Side::Ask, dec!(10), dec!(5), other)).unwrap();

    let result =
        place_order(&mut store, &market, false, new_order(Side::Bid, dec!(10), dec!(3), account)).unwrap();

    assert_eq!(result.matches.len(), 1);
    assert_eq!(result.matches[0].maker_account_id, other);
}

#[tokio::test]
async fn dust_remainder_is_discarded_and_its_reservation_released() {
    let market = test_market();
    let mut store = FakeStore::default();

    let maker = Uuid::new_v4();
    let taker = Uuid::new_v4();
    store.fund(maker, market.base_asset_id, dec!(2));
    store.fund(taker, market.quote_asset_id, dec!(1000));

    place_order(&mut store, &market, true, new_order(Side::Ask, dec!(10), dec!(2), maker)).unwrap();

    // Taker wants 2.005; fills 2, leaving 0.005 below the 0.01 minimum
    // increment, discarded rather than rested.
    let result =
        place_order(&mut store, &market, true, new_order(Side::Bid, dec!(10), dec!(2.005), taker)).unwrap();

    assert!(result.remaining_order.is_none());
    assert_eq!(result.dust_discarded, dec!(0.005));

    let taker_quote = store.holding(taker, market.quote_asset_id);
    // Spent 2 * 10 = 20 on the fill; the dust's 0.005 * 10 = 0.05 reservation
    // is released back rather than retained for a resting order.
    assert_eq!(taker_quote.quantity, dec!(1000) - dec!(20));
}

#[tokio::test]
async fn cost_basis_rolls_forward_on_buys_and_shrinks_proportionally_on_sells() {
    let market = test_market();
    let mut store = FakeStore::default();

    let buyer = Uuid::new_v4();
    let seller = Uuid::new_v4();
    store.fund(buyer, market.quote_asset_id, dec!(10_000));
    store.fund(seller, market.base_asset_id, dec!(10));

    // Buyer acquires 1 @ 100, then 1 more @ 200: weighted average is 150.
    place_order(&mut store, &market, true, new_order(Side::Ask, dec!(100), dec!(1), seller)).unwrap();
    place_order(&mut store, &market, true, new_order(Side::Bid, dec!(100), dec!(1), buyer)).unwrap();
    place_order(&mut store, &market, true, new_order(Side::Ask, dec!(200), dec!(1), seller)).unwrap();
    place_order(&mut store, &market, true, new_order(Side::Bid, dec!(200), dec!(1), buyer)).unwrap();

    let buyer_base = store.holding(buyer, market.base_asset_id);
    assert_eq!(buyer_base.quantity, dec!(2));
    assert_eq!(buyer_base.average_cost_basis, dec!(150));
    assert_eq!(buyer_base.total_cost, dec!(300));

    // Seller started with 10 units at no recorded cost basis (never bought
    // through this engine), so `reduce_cost_basis_on_sell` is a no-op absent
    // a prior lot — total_cost stays at its default zero.
    let seller_base = store.holding(seller, market.base_asset_id);
    assert_eq!(seller_base.quantity, dec!(8));
    assert_eq!(seller_base.total_cost, Decimal::ZERO);

    // Now the buyer sells 1 of their 2 units at the same 150 average cost:
    // total_cost should shrink by 150 * 1 = 150, leaving 150.
    place_order(&mut store, &market, true, new_order(Side::Bid, dec!(150), dec!(1), seller)).unwrap();
    place_order(&mut store, &market, true, new_order(Side::Ask, dec!(150), dec!(1), buyer)).unwrap();

    let buyer_base_after_sell = store.holding(buyer, market.base_asset_id);
    assert_eq!(buyer_base_after_sell.quantity, dec!(1));
    assert_eq!(buyer_base_after_sell.average_cost_basis, dec!(150));
    assert_eq!(buyer_base_after_sell.total_cost, dec!(150));
}
