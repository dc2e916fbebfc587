//! Status vocabularies shared by the database layer, the API and the CLI.
//!
//! Every status is stored as lowercase snake-case text in Postgres; these enums
//! are the single place where the allowed values and transitions live.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::referral::random_suffix;
use crate::DomainError;

macro_rules! status_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(DomainError::UnknownStatus {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

status_enum! {
    /// Catalog visibility of a product.
    ProductStatus, "product status" {
        Draft => "draft",
        Active => "active",
        Archived => "archived",
    }
}

status_enum! {
    /// Customer order lifecycle.
    OrderStatus, "order status" {
        Pending => "pending",
        Confirmed => "confirmed",
        Processing => "processing",
        OutForDelivery => "out_for_delivery",
        Delivered => "delivered",
        Cancelled => "cancelled",
    }
}

status_enum! {
    /// Driver assignment lifecycle for a single order.
    DeliveryStatus, "delivery status" {
        Assigned => "assigned",
        PickedUp => "picked_up",
        InTransit => "in_transit",
        Delivered => "delivered",
        Failed => "failed",
    }
}

status_enum! {
    ProcurementStatus, "procurement status" {
        Queued => "queued",
        Ordered => "ordered",
        Received => "received",
        Cancelled => "cancelled",
    }
}

status_enum! {
    /// Franchise stock order lifecycle.
    StockOrderStatus, "stock order status" {
        Draft => "draft",
        Submitted => "submitted",
        Allocated => "allocated",
        Fulfilled => "fulfilled",
        Cancelled => "cancelled",
    }
}

status_enum! {
    UserRole, "user role" {
        Customer => "customer",
        Admin => "admin",
        Driver => "driver",
        Franchise => "franchise",
    }
}

impl OrderStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    #[must_use]
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::{Cancelled, Confirmed, Delivered, OutForDelivery, Pending, Processing};
        if next == Cancelled {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Confirmed, Processing)
                | (Processing, OutForDelivery)
                | (OutForDelivery, Delivered)
        )
    }
}

impl DeliveryStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Failed)
    }

    #[must_use]
    pub fn can_transition_to(self, next: DeliveryStatus) -> bool {
        use DeliveryStatus::{Assigned, Delivered, Failed, InTransit, PickedUp};
        if next == Failed {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Assigned, PickedUp) | (PickedUp, InTransit) | (InTransit, Delivered)
        )
    }
}

impl ProcurementStatus {
    #[must_use]
    pub fn can_transition_to(self, next: ProcurementStatus) -> bool {
        use ProcurementStatus::{Cancelled, Ordered, Queued, Received};
        matches!(
            (self, next),
            (Queued, Ordered) | (Queued | Ordered, Cancelled) | (Ordered, Received)
        )
    }
}

impl StockOrderStatus {
    #[must_use]
    pub fn can_transition_to(self, next: StockOrderStatus) -> bool {
        use StockOrderStatus::{Allocated, Cancelled, Draft, Fulfilled, Submitted};
        matches!(
            (self, next),
            (Draft, Submitted)
                | (Submitted, Allocated)
                | (Allocated, Fulfilled)
                | (Draft | Submitted | Allocated, Cancelled)
        )
    }
}

/// Validates a transition, returning a typed error naming both ends.
///
/// # Errors
///
/// Returns [`DomainError::InvalidTransition`] if `allowed` is `false`.
pub fn check_transition<S: fmt::Display>(
    kind: &'static str,
    from: S,
    to: S,
    allowed: bool,
) -> Result<(), DomainError> {
    if allowed {
        Ok(())
    } else {
        Err(DomainError::InvalidTransition {
            kind,
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Human-facing reference such as `JF-20261018-K3M9QX`.
///
/// Uniqueness is enforced by the database; callers retry on conflict.
#[must_use]
pub fn reference_number(prefix: &str, now: DateTime<Utc>) -> String {
    format!("{prefix}-{}-{}", now.format("%Y%m%d"), random_suffix(6))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_round_trip_through_text() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), *status);
        }
        for status in DeliveryStatus::ALL {
            assert_eq!(status.as_str().parse::<DeliveryStatus>().unwrap(), *status);
        }
        for role in UserRole::ALL {
            assert_eq!(role.to_string().parse::<UserRole>().unwrap(), *role);
        }
    }

    #[test]
    fn unknown_status_names_the_kind() {
        let err = "shipped".parse::<OrderStatus>().unwrap_err();
        assert_eq!(err.to_string(), "unknown order status 'shipped'");
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&OrderStatus::OutForDelivery).unwrap();
        assert_eq!(json, "\"out_for_delivery\"");
        let parsed: DeliveryStatus = serde_json::from_str("\"picked_up\"").unwrap();
        assert_eq!(parsed, DeliveryStatus::PickedUp);
    }

    #[test]
    fn order_happy_path_transitions() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Confirmed));
        assert!(OrderStatus::Confirmed.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::OutForDelivery));
        assert!(OrderStatus::OutForDelivery.can_transition_to(OrderStatus::Delivered));
    }

    #[test]
    fn order_cannot_skip_or_reopen() {
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Confirmed));
    }

    #[test]
    fn order_cancel_only_from_open_states() {
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn delivery_transitions() {
        assert!(DeliveryStatus::Assigned.can_transition_to(DeliveryStatus::PickedUp));
        assert!(DeliveryStatus::InTransit.can_transition_to(DeliveryStatus::Failed));
        assert!(!DeliveryStatus::Assigned.can_transition_to(DeliveryStatus::Delivered));
        assert!(!DeliveryStatus::Failed.can_transition_to(DeliveryStatus::Failed));
    }

    #[test]
    fn procurement_and_stock_order_transitions() {
        assert!(ProcurementStatus::Queued.can_transition_to(ProcurementStatus::Ordered));
        assert!(!ProcurementStatus::Received.can_transition_to(ProcurementStatus::Cancelled));
        assert!(StockOrderStatus::Submitted.can_transition_to(StockOrderStatus::Allocated));
        assert!(!StockOrderStatus::Fulfilled.can_transition_to(StockOrderStatus::Cancelled));
    }

    #[test]
    fn reference_number_has_date_and_suffix() {
        let now = chrono::TimeZone::with_ymd_and_hms(&Utc, 2026, 3, 9, 12, 0, 0).unwrap();
        let reference = reference_number("SO", now);
        assert!(reference.starts_with("SO-20260309-"), "{reference}");
        assert_eq!(reference.len(), "SO-20260309-".len() + 6);
    }

    #[test]
    fn check_transition_reports_both_ends() {
        let err = check_transition(
            "order status",
            OrderStatus::Delivered,
            OrderStatus::Pending,
            false,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid order status transition from 'delivered' to 'pending'"
        );
    }
}
