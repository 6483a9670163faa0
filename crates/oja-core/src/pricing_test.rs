use super::*;

fn dec(s: &str) -> Decimal {
    s.parse().expect("decimal literal")
}

fn offer(offer_id: i64, supplier_id: i64, price: &str, qty: i32) -> OfferCandidate {
    OfferCandidate {
        offer_id,
        supplier_id,
        unit_price: dec(price),
        available_qty: qty,
        is_active: true,
    }
}

fn sample_offers() -> Vec<OfferCandidate> {
    let mut inactive = offer(3, 12, "450", 4);
    inactive.is_active = false;
    vec![
        offer(1, 10, "500", 3),
        offer(2, 11, "450", 2),
        inactive,
        offer(4, 13, "0", 10),
        offer(5, 14, "300", 0),
    ]
}

// ---------------------------------------------------------------------------
// allocate
// ---------------------------------------------------------------------------

#[test]
fn allocate_takes_cheapest_usable_offers_first() {
    let allocation = allocate(5, &sample_offers());

    assert_eq!(allocation.allocated_qty, 5);
    assert_eq!(allocation.shortfall, 0);
    assert!(allocation.is_complete());
    assert_eq!(allocation.lines.len(), 2);
    assert_eq!(allocation.lines[0].offer_id, 2);
    assert_eq!(allocation.lines[0].quantity, 2);
    assert_eq!(allocation.lines[1].offer_id, 1);
    assert_eq!(allocation.lines[1].quantity, 3);
    assert_eq!(allocation.total_cost(), dec("2400"));
}

#[test]
fn allocate_reports_shortfall_when_stock_runs_out() {
    let allocation = allocate(10, &sample_offers());
    assert_eq!(allocation.requested_qty, 10);
    assert_eq!(allocation.allocated_qty, 5);
    assert_eq!(allocation.shortfall, 5);
    assert!(!allocation.is_complete());
}

#[test]
fn allocate_stops_once_satisfied() {
    let allocation = allocate(1, &sample_offers());
    assert_eq!(allocation.lines.len(), 1);
    assert_eq!(allocation.lines[0].offer_id, 2);
    assert_eq!(allocation.lines[0].quantity, 1);
}

#[test]
fn allocate_prefers_deeper_stock_on_equal_price() {
    let offers = vec![offer(5, 1, "700", 2), offer(6, 2, "700", 6)];
    let allocation = allocate(3, &offers);
    assert_eq!(allocation.lines.len(), 1);
    assert_eq!(allocation.lines[0].offer_id, 6);
}

#[test]
fn allocate_breaks_full_ties_by_offer_id() {
    let offers = vec![offer(9, 1, "700", 2), offer(4, 2, "700", 2)];
    let allocation = allocate(3, &offers);
    assert_eq!(allocation.lines[0].offer_id, 4);
    assert_eq!(allocation.lines[0].quantity, 2);
    assert_eq!(allocation.lines[1].offer_id, 9);
    assert_eq!(allocation.lines[1].quantity, 1);
}

#[test]
fn allocate_non_positive_quantity_is_empty() {
    let zero = allocate(0, &sample_offers());
    assert!(zero.lines.is_empty());
    assert_eq!(zero.shortfall, 0);

    let negative = allocate(-4, &sample_offers());
    assert!(negative.lines.is_empty());
    assert_eq!(negative.requested_qty, 0);
    assert_eq!(negative.shortfall, 0);
}

#[test]
fn allocate_with_no_usable_offers_is_all_shortfall() {
    let mut only_inactive = offer(1, 1, "100", 5);
    only_inactive.is_active = false;
    let allocation = allocate(2, &[only_inactive]);
    assert_eq!(allocation.allocated_qty, 0);
    assert_eq!(allocation.shortfall, 2);
}

// ---------------------------------------------------------------------------
// margin / tax / fees
// ---------------------------------------------------------------------------

#[test]
fn apply_margin_rounds_to_kobo() {
    assert_eq!(apply_margin(dec("1000"), dec("10")), dec("1100.00"));
    assert_eq!(apply_margin(dec("333.33"), dec("12.5")), dec("375.00"));
    assert_eq!(apply_margin(dec("100"), dec("-5")), dec("100.00"));
}

#[test]
fn resolve_margin_prefers_product_override() {
    assert_eq!(resolve_margin(Some(dec("5")), Some(dec("10"))), dec("5"));
    assert_eq!(resolve_margin(None, Some(dec("10"))), dec("10"));
    assert_eq!(resolve_margin(None, None), Decimal::ZERO);
}

#[test]
fn compute_tax_applies_vat() {
    assert_eq!(compute_tax(dec("1000"), dec("7.5")), dec("75.00"));
    assert_eq!(compute_tax(dec("199.99"), dec("7.5")), dec("15.00"));
    assert_eq!(compute_tax(Decimal::ZERO, dec("7.5")), Decimal::ZERO);
    assert_eq!(compute_tax(dec("1000"), Decimal::ZERO), Decimal::ZERO);
}

#[test]
fn service_fee_below_flat_threshold_has_no_flat_component() {
    let fee = service_fee(&PricingSettings::default(), dec("1075"));
    assert_eq!(fee.base_fee, dec("100"));
    assert_eq!(fee.comms_fee, dec("50"));
    assert_eq!(fee.gateway_fee, dec("18.38"));
    assert_eq!(fee.total, dec("168.38"));
}

#[test]
fn service_fee_above_threshold_adds_flat_fee() {
    let fee = service_fee(&PricingSettings::default(), dec("10750"));
    assert_eq!(fee.gateway_fee, dec("263.50"));
    assert_eq!(fee.total, dec("413.50"));
}

#[test]
fn service_fee_gateway_component_is_capped() {
    let fee = service_fee(&PricingSettings::default(), dec("200000"));
    assert_eq!(fee.gateway_fee, dec("2000"));
    assert_eq!(fee.total, dec("2150"));
}

#[test]
fn service_fee_for_empty_order_is_zero() {
    assert_eq!(
        service_fee(&PricingSettings::default(), Decimal::ZERO),
        ServiceFee::zero()
    );
}

// ---------------------------------------------------------------------------
// price_cart
// ---------------------------------------------------------------------------

#[test]
fn price_cart_totals_a_fulfillable_cart() {
    let lines = vec![CartLine {
        product_id: 1,
        variant_id: None,
        quantity: 5,
        margin_override: None,
        offers: sample_offers(),
    }];

    let quote = price_cart(&lines, &PricingSettings::default());

    assert_eq!(quote.currency, "NGN");
    assert!(quote.is_fulfillable);
    let line = &quote.lines[0];
    assert_eq!(line.margin_percent, dec("10"));
    assert_eq!(line.allocations[0].unit_price, dec("495.00"));
    assert_eq!(line.allocations[0].line_total, dec("990.00"));
    assert_eq!(line.allocations[1].unit_price, dec("550.00"));
    assert_eq!(line.line_total, dec("2640.00"));
    assert_eq!(line.unit_price, dec("528.00"));

    assert_eq!(quote.items_subtotal, dec("2640.00"));
    assert_eq!(quote.tax_total, dec("198.00"));
    assert_eq!(quote.service_fee.gateway_fee, dec("144.82"));
    assert_eq!(quote.service_fee.total, dec("294.82"));
    assert_eq!(quote.total, dec("3132.82"));
    assert_eq!(quote.total_kobo, 313_282);
}

#[test]
fn price_cart_flags_shortfall_lines() {
    let lines = vec![
        CartLine {
            product_id: 1,
            variant_id: None,
            quantity: 1,
            margin_override: None,
            offers: sample_offers(),
        },
        CartLine {
            product_id: 2,
            variant_id: Some(20),
            quantity: 2,
            margin_override: Some(Decimal::ZERO),
            offers: vec![offer(7, 15, "1000", 1)],
        },
    ];

    let quote = price_cart(&lines, &PricingSettings::default());

    assert!(!quote.is_fulfillable);
    let short = &quote.lines[1];
    assert_eq!(short.variant_id, Some(20));
    assert_eq!(short.allocated_qty, 1);
    assert_eq!(short.shortfall, 1);
    assert_eq!(short.line_total, dec("1000"));
    assert_eq!(short.margin_percent, Decimal::ZERO);
}

#[test]
fn price_cart_empty_is_zero_and_not_fulfillable() {
    let quote = price_cart(&[], &PricingSettings::default());
    assert_eq!(quote.total, Decimal::ZERO);
    assert_eq!(quote.total_kobo, 0);
    assert_eq!(quote.service_fee, ServiceFee::zero());
    assert!(!quote.is_fulfillable);
}

#[test]
fn quote_serializes_money_as_strings() {
    let quote = price_cart(&[], &PricingSettings::default());
    let json = serde_json::to_value(&quote).expect("serialize quote");
    assert_eq!(json["total"], serde_json::json!("0"));
    assert_eq!(json["currency"], "NGN");
}

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

#[test]
fn kobo_conversion_rounds_half_away_from_zero() {
    assert_eq!(to_kobo(dec("3132.82")), 313_282);
    assert_eq!(to_kobo(dec("1234.565")), 123_457);
    assert_eq!(from_kobo(313_282), dec("3132.82"));
}

#[test]
fn from_price_uses_cheapest_usable_offer() {
    assert_eq!(from_price(&sample_offers(), dec("10")), Some(dec("495.00")));
    assert_eq!(from_price(&[], dec("10")), None);
}

#[test]
fn total_available_ignores_unusable_offers() {
    assert_eq!(total_available(&sample_offers()), 5);
}
