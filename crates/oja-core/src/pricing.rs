//! Cart pricing: cheapest-offer allocation, margin, VAT and service fees.
//!
//! All money is Naira as [`Decimal`], rounded to kobo (2 dp) with
//! midpoint-away-from-zero. Paystack amounts are integer kobo, see [`to_kobo`].

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

pub const CURRENCY: &str = "NGN";

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// One supplier listing that can satisfy part of a cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferCandidate {
    pub offer_id: i64,
    pub supplier_id: i64,
    pub unit_price: Decimal,
    pub available_qty: i32,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationLine {
    pub offer_id: i64,
    pub supplier_id: i64,
    pub quantity: i32,
    pub unit_cost: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Allocation {
    pub lines: Vec<AllocationLine>,
    pub requested_qty: i32,
    pub allocated_qty: i32,
    pub shortfall: i32,
}

impl Allocation {
    /// Sum of supplier cost across all allocated units.
    #[must_use]
    pub fn total_cost(&self) -> Decimal {
        self.lines
            .iter()
            .map(|l| l.unit_cost * Decimal::from(l.quantity))
            .sum()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.shortfall == 0
    }
}

/// Platform-wide pricing knobs, stored as a single settings row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingSettings {
    pub margin_percent: Decimal,
    pub vat_percent: Decimal,
    pub base_service_fee: Decimal,
    pub comms_fee: Decimal,
    pub gateway_fee_percent: Decimal,
    pub gateway_flat_fee: Decimal,
    pub gateway_flat_fee_threshold: Decimal,
    pub gateway_fee_cap: Decimal,
}

impl Default for PricingSettings {
    /// Paystack local-card tariff (1.5% + ₦100 above ₦2,500, capped at ₦2,000)
    /// and Nigerian VAT at 7.5%.
    fn default() -> Self {
        Self {
            margin_percent: Decimal::new(10, 0),
            vat_percent: Decimal::new(75, 1),
            base_service_fee: Decimal::new(100, 0),
            comms_fee: Decimal::new(50, 0),
            gateway_fee_percent: Decimal::new(15, 1),
            gateway_flat_fee: Decimal::new(100, 0),
            gateway_flat_fee_threshold: Decimal::new(2500, 0),
            gateway_fee_cap: Decimal::new(2000, 0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceFee {
    pub base_fee: Decimal,
    pub comms_fee: Decimal,
    pub gateway_fee: Decimal,
    pub total: Decimal,
}

impl ServiceFee {
    #[must_use]
    pub fn zero() -> Self {
        Self {
            base_fee: Decimal::ZERO,
            comms_fee: Decimal::ZERO,
            gateway_fee: Decimal::ZERO,
            total: Decimal::ZERO,
        }
    }
}

/// A cart line with the offers that could fill it, as loaded from storage.
#[derive(Debug, Clone)]
pub struct CartLine {
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub quantity: i32,
    pub margin_override: Option<Decimal>,
    pub offers: Vec<OfferCandidate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricedAllocation {
    pub offer_id: i64,
    pub supplier_id: i64,
    pub quantity: i32,
    pub unit_cost: Decimal,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuoteLine {
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub requested_qty: i32,
    pub allocated_qty: i32,
    pub shortfall: i32,
    pub margin_percent: Decimal,
    /// Average customer price per allocated unit; zero when nothing was allocated.
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub allocations: Vec<PricedAllocation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub currency: String,
    pub lines: Vec<QuoteLine>,
    pub items_subtotal: Decimal,
    pub tax_total: Decimal,
    pub service_fee: ServiceFee,
    pub total: Decimal,
    pub total_kobo: i64,
    pub is_fulfillable: bool,
}

#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert Naira to integer kobo.
#[must_use]
pub fn to_kobo(amount: Decimal) -> i64 {
    (amount * HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        // NUMERIC(14,2) totals are far inside i64 range.
        .unwrap_or(i64::MAX)
}

#[must_use]
pub fn from_kobo(kobo: i64) -> Decimal {
    Decimal::new(kobo, 2)
}

/// Split `desired_qty` across the cheapest usable offers.
///
/// Inactive offers and offers with a non-positive price or quantity are
/// skipped. Equal prices prefer the offer with more stock, then the lower id.
#[must_use]
pub fn allocate(desired_qty: i32, offers: &[OfferCandidate]) -> Allocation {
    if desired_qty <= 0 {
        return Allocation {
            lines: Vec::new(),
            requested_qty: desired_qty.max(0),
            allocated_qty: 0,
            shortfall: 0,
        };
    }

    let mut usable: Vec<&OfferCandidate> = offers
        .iter()
        .filter(|o| o.is_active && o.unit_price > Decimal::ZERO && o.available_qty > 0)
        .collect();
    usable.sort_by(|a, b| {
        a.unit_price
            .cmp(&b.unit_price)
            .then_with(|| b.available_qty.cmp(&a.available_qty))
            .then_with(|| a.offer_id.cmp(&b.offer_id))
    });

    let mut remaining = desired_qty;
    let mut lines = Vec::new();
    for offer in usable {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(offer.available_qty);
        lines.push(AllocationLine {
            offer_id: offer.offer_id,
            supplier_id: offer.supplier_id,
            quantity: take,
            unit_cost: offer.unit_price,
        });
        remaining -= take;
    }

    Allocation {
        lines,
        requested_qty: desired_qty,
        allocated_qty: desired_qty - remaining,
        shortfall: remaining,
    }
}

/// Customer price for a supplier cost. Negative margins are treated as zero.
#[must_use]
pub fn apply_margin(cost: Decimal, margin_percent: Decimal) -> Decimal {
    let margin = margin_percent.max(Decimal::ZERO);
    round_money(cost * (Decimal::ONE + margin / HUNDRED))
}

/// Product-level override wins over the global margin; no margin at all is 0%.
#[must_use]
pub fn resolve_margin(product_override: Option<Decimal>, global: Option<Decimal>) -> Decimal {
    product_override.or(global).unwrap_or(Decimal::ZERO)
}

#[must_use]
pub fn compute_tax(subtotal: Decimal, vat_percent: Decimal) -> Decimal {
    if subtotal <= Decimal::ZERO || vat_percent <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    round_money(subtotal * vat_percent / HUNDRED)
}

/// Service fee for an order whose items and VAT come to `subtotal_plus_tax`.
#[must_use]
pub fn service_fee(settings: &PricingSettings, subtotal_plus_tax: Decimal) -> ServiceFee {
    if subtotal_plus_tax <= Decimal::ZERO {
        return ServiceFee::zero();
    }

    let base_fee = round_money(settings.base_service_fee.max(Decimal::ZERO));
    let comms_fee = round_money(settings.comms_fee.max(Decimal::ZERO));
    let chargeable = subtotal_plus_tax + base_fee + comms_fee;

    let mut gateway = chargeable * settings.gateway_fee_percent.max(Decimal::ZERO) / HUNDRED;
    if chargeable >= settings.gateway_flat_fee_threshold {
        gateway += settings.gateway_flat_fee.max(Decimal::ZERO);
    }
    if settings.gateway_fee_cap > Decimal::ZERO {
        gateway = gateway.min(settings.gateway_fee_cap);
    }
    let gateway_fee = round_money(gateway);

    ServiceFee {
        base_fee,
        comms_fee,
        gateway_fee,
        total: base_fee + comms_fee + gateway_fee,
    }
}

/// Price a whole cart against the offers loaded for each line.
#[must_use]
pub fn price_cart(lines: &[CartLine], settings: &PricingSettings) -> Quote {
    let quote_lines: Vec<QuoteLine> = lines
        .iter()
        .map(|line| price_line(line, settings.margin_percent))
        .collect();

    let items_subtotal: Decimal = quote_lines.iter().map(|l| l.line_total).sum();
    let tax_total = compute_tax(items_subtotal, settings.vat_percent);
    let fee = service_fee(settings, items_subtotal + tax_total);
    let total = items_subtotal + tax_total + fee.total;
    let is_fulfillable = !quote_lines.is_empty()
        && quote_lines
            .iter()
            .all(|l| l.shortfall == 0 && l.allocated_qty > 0);

    Quote {
        currency: CURRENCY.to_string(),
        lines: quote_lines,
        items_subtotal,
        tax_total,
        service_fee: fee,
        total,
        total_kobo: to_kobo(total),
        is_fulfillable,
    }
}

fn price_line(line: &CartLine, global_margin: Decimal) -> QuoteLine {
    let margin = resolve_margin(line.margin_override, Some(global_margin));
    let allocation = allocate(line.quantity, &line.offers);

    let allocations: Vec<PricedAllocation> = allocation
        .lines
        .iter()
        .map(|a| {
            let unit_price = apply_margin(a.unit_cost, margin);
            PricedAllocation {
                offer_id: a.offer_id,
                supplier_id: a.supplier_id,
                quantity: a.quantity,
                unit_cost: a.unit_cost,
                unit_price,
                line_total: unit_price * Decimal::from(a.quantity),
            }
        })
        .collect();

    let line_total: Decimal = allocations.iter().map(|a| a.line_total).sum();
    let unit_price = if allocation.allocated_qty > 0 {
        round_money(line_total / Decimal::from(allocation.allocated_qty))
    } else {
        Decimal::ZERO
    };

    QuoteLine {
        product_id: line.product_id,
        variant_id: line.variant_id,
        requested_qty: allocation.requested_qty,
        allocated_qty: allocation.allocated_qty,
        shortfall: allocation.shortfall,
        margin_percent: margin,
        unit_price,
        line_total,
        allocations,
    }
}

/// Cheapest customer-facing unit price among usable offers.
#[must_use]
pub fn from_price(offers: &[OfferCandidate], margin_percent: Decimal) -> Option<Decimal> {
    offers
        .iter()
        .filter(|o| o.is_active && o.unit_price > Decimal::ZERO && o.available_qty > 0)
        .map(|o| o.unit_price)
        .min()
        .map(|cost| apply_margin(cost, margin_percent))
}

/// Units available across usable offers.
#[must_use]
pub fn total_available(offers: &[OfferCandidate]) -> i64 {
    offers
        .iter()
        .filter(|o| o.is_active && o.unit_price > Decimal::ZERO && o.available_qty > 0)
        .map(|o| i64::from(o.available_qty))
        .sum()
}

#[cfg(test)]
#[path = "pricing_test.rs"]
mod tests;
