//! Order, purchase-order, payment and refund lifecycles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingPayment,
    Paid,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PendingPayment => "pending_payment",
            Self::Paid => "paid",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    #[must_use]
    pub fn can_transition(self, to: Self) -> bool {
        use OrderStatus::{
            Cancelled, Delivered, Paid, PendingPayment, Processing, Refunded, Shipped,
        };
        matches!(
            (self, to),
            (PendingPayment, Paid | Cancelled)
                | (Paid, Processing | Shipped | Delivered | Cancelled | Refunded)
                | (Processing, Shipped | Delivered | Cancelled | Refunded)
                | (Shipped, Delivered | Refunded)
                | (Delivered, Refunded)
        )
    }

    /// Orders a customer may request a refund against.
    #[must_use]
    pub fn is_refundable(self) -> bool {
        matches!(
            self,
            Self::Paid | Self::Processing | Self::Shipped | Self::Delivered
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_payment" => Ok(Self::PendingPayment),
            "paid" => Ok(Self::Paid),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            "refunded" => Ok(Self::Refunded),
            other => Err(CoreError::UnknownOrderStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl PurchaseOrderStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub fn can_transition(self, to: Self) -> bool {
        use PurchaseOrderStatus::{Cancelled, Confirmed, Delivered, Pending, Shipped};
        matches!(
            (self, to),
            (Pending, Confirmed | Cancelled)
                | (Confirmed, Shipped | Cancelled)
                | (Shipped, Delivered)
        )
    }
}

impl fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PurchaseOrderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(CoreError::UnknownPurchaseOrderStatus(other.to_string())),
        }
    }
}

/// Customer-facing order status after a purchase-order change.
///
/// Only orders that are already paid move; unpaid, cancelled and refunded
/// orders keep `current`.
#[must_use]
pub fn rollup_order_status(current: OrderStatus, pos: &[PurchaseOrderStatus]) -> OrderStatus {
    use PurchaseOrderStatus as Po;

    if !matches!(
        current,
        OrderStatus::Paid | OrderStatus::Processing | OrderStatus::Shipped
    ) || pos.is_empty()
    {
        return current;
    }

    let live: Vec<Po> = pos.iter().copied().filter(|s| *s != Po::Cancelled).collect();
    let next = if live.is_empty() {
        OrderStatus::Cancelled
    } else if live.iter().all(|s| *s == Po::Delivered) {
        OrderStatus::Delivered
    } else if live.iter().any(|s| matches!(s, Po::Shipped | Po::Delivered)) {
        OrderStatus::Shipped
    } else if live.iter().any(|s| *s == Po::Confirmed) {
        OrderStatus::Processing
    } else {
        current
    };

    if next == current || current.can_transition(next) {
        next
    } else {
        current
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Initialized,
    Success,
    Failed,
    Abandoned,
}

impl PaymentStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Abandoned => "abandoned",
        }
    }

    /// Map a Paystack transaction status onto ours. Anything still in flight
    /// (`ongoing`, `pending`, `processing`, `queued`) stays `initialized`.
    #[must_use]
    pub fn from_gateway(status: &str) -> Self {
        match status {
            "success" => Self::Success,
            "failed" | "reversed" => Self::Failed,
            "abandoned" => Self::Abandoned,
            _ => Self::Initialized,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Approved,
    Rejected,
    Processed,
    Failed,
}

impl RefundStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Processed => "processed",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for RefundStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "processed" => Ok(Self::Processed),
            "failed" => Ok(Self::Failed),
            other => Err(CoreError::UnknownRefundStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Supplier,
    Admin,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Supplier => "supplier",
            Self::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "supplier" => Ok(Self::Supplier),
            "admin" => Ok(Self::Admin),
            other => Err(CoreError::UnknownRole(other.to_string())),
        }
    }
}

/// New Paystack transaction reference: `OJA-` followed by 20 uppercase hex chars.
#[must_use]
pub fn payment_reference() -> String {
    use std::fmt::Write as _;

    let bytes: [u8; 10] = rand::random();
    let mut out = String::with_capacity(24);
    out.push_str("OJA-");
    for b in bytes {
        let _ = write!(out, "{b:02X}");
    }
    out
}

/// Reference for the `attempt`-th Paystack checkout of an order. The first
/// attempt uses the order's own reference; Paystack never accepts a reference
/// twice, so retries get a numbered suffix.
#[must_use]
pub fn payment_attempt_reference(order_reference: &str, attempt: i64) -> String {
    if attempt <= 1 {
        order_reference.to_owned()
    } else {
        format!("{order_reference}-{attempt}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PurchaseOrderStatus as Po;

    #[test]
    fn order_status_round_trips_through_strings() {
        for status in [
            OrderStatus::PendingPayment,
            OrderStatus::Paid,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::Refunded,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("lost".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn unpaid_orders_can_only_be_paid_or_cancelled() {
        let from = OrderStatus::PendingPayment;
        assert!(from.can_transition(OrderStatus::Paid));
        assert!(from.can_transition(OrderStatus::Cancelled));
        assert!(!from.can_transition(OrderStatus::Shipped));
        assert!(!from.can_transition(OrderStatus::Refunded));
    }

    #[test]
    fn terminal_order_states_do_not_move() {
        for to in [OrderStatus::Paid, OrderStatus::Shipped, OrderStatus::PendingPayment] {
            assert!(!OrderStatus::Cancelled.can_transition(to));
            assert!(!OrderStatus::Refunded.can_transition(to));
        }
    }

    #[test]
    fn purchase_order_transitions_follow_fulfilment_path() {
        assert!(Po::Pending.can_transition(Po::Confirmed));
        assert!(Po::Confirmed.can_transition(Po::Shipped));
        assert!(Po::Shipped.can_transition(Po::Delivered));
        assert!(Po::Confirmed.can_transition(Po::Cancelled));
        assert!(!Po::Shipped.can_transition(Po::Cancelled));
        assert!(!Po::Pending.can_transition(Po::Delivered));
        assert!(!Po::Delivered.can_transition(Po::Pending));
    }

    #[test]
    fn rollup_all_delivered_is_delivered() {
        let next = rollup_order_status(OrderStatus::Shipped, &[Po::Delivered, Po::Delivered]);
        assert_eq!(next, OrderStatus::Delivered);
    }

    #[test]
    fn rollup_ignores_cancelled_purchase_orders() {
        let next = rollup_order_status(OrderStatus::Paid, &[Po::Delivered, Po::Cancelled]);
        assert_eq!(next, OrderStatus::Delivered);
    }

    #[test]
    fn rollup_partial_shipment_is_shipped() {
        let next = rollup_order_status(OrderStatus::Processing, &[Po::Shipped, Po::Confirmed]);
        assert_eq!(next, OrderStatus::Shipped);
    }

    #[test]
    fn rollup_any_confirmed_is_processing() {
        let next = rollup_order_status(OrderStatus::Paid, &[Po::Confirmed, Po::Pending]);
        assert_eq!(next, OrderStatus::Processing);
    }

    #[test]
    fn rollup_all_cancelled_cancels_order() {
        let next = rollup_order_status(OrderStatus::Paid, &[Po::Cancelled, Po::Cancelled]);
        assert_eq!(next, OrderStatus::Cancelled);
    }

    #[test]
    fn rollup_leaves_unpaid_orders_alone() {
        let next = rollup_order_status(OrderStatus::PendingPayment, &[Po::Confirmed]);
        assert_eq!(next, OrderStatus::PendingPayment);
    }

    #[test]
    fn gateway_statuses_map_onto_payment_status() {
        assert_eq!(PaymentStatus::from_gateway("success"), PaymentStatus::Success);
        assert_eq!(PaymentStatus::from_gateway("failed"), PaymentStatus::Failed);
        assert_eq!(PaymentStatus::from_gateway("reversed"), PaymentStatus::Failed);
        assert_eq!(PaymentStatus::from_gateway("abandoned"), PaymentStatus::Abandoned);
        assert_eq!(PaymentStatus::from_gateway("ongoing"), PaymentStatus::Initialized);
    }

    #[test]
    fn payment_reference_has_expected_shape() {
        let reference = payment_reference();
        assert_eq!(reference.len(), 24);
        assert!(reference.starts_with("OJA-"));
        assert!(reference[4..]
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        assert_ne!(reference, payment_reference());
    }

    #[test]
    fn retries_get_numbered_references() {
        assert_eq!(payment_attempt_reference("OJA-AB12", 1), "OJA-AB12");
        assert_eq!(payment_attempt_reference("OJA-AB12", 2), "OJA-AB12-2");
        assert_eq!(payment_attempt_reference("OJA-AB12", 7), "OJA-AB12-7");
    }

    #[test]
    fn only_fulfilment_states_are_refundable() {
        assert!(OrderStatus::Delivered.is_refundable());
        assert!(!OrderStatus::PendingPayment.is_refundable());
        assert!(!OrderStatus::Refunded.is_refundable());
    }
}
