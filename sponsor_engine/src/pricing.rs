//! Price and delivery resolution for a purchase.
//!
//! Both functions are pure. Every field is resolved the same way: the version-level value if a version applies and
//! the version sets it, otherwise the work-level value.
use sponsor_common::Price;

use crate::db_types::{DeliveryLinks, Work, WorkVersion};

/// What the buyer has already paid towards the work, for an upgrade purchase.
///
/// This is the full price of the version the buyer owns, not the amount of the order that bought it. An order that was
/// itself an upgrade only carries the difference, but the buyer has still paid the whole price of that version over
/// their purchases. Amounts quoted by the client are never used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpgradeBasis {
    pub previously_paid: Price,
}

impl UpgradeBasis {
    pub fn owned_version(work: &Work, owned: &WorkVersion) -> Self {
        Self { previously_paid: resolve_price(work, Some(owned), None) }
    }
}

/// The amount to charge. Never negative.
///
/// * Free works cost nothing, whichever version is requested.
/// * Upgrades cost the difference between the target price and what was already paid, floored at zero.
/// * Otherwise the version price applies, falling back to the work's flat price, falling back to zero.
pub fn resolve_price(work: &Work, version: Option<&WorkVersion>, upgrade: Option<&UpgradeBasis>) -> Price {
    if work.is_free {
        return Price::ZERO;
    }
    let target = version.and_then(|v| v.price).or(work.price).unwrap_or(Price::ZERO).non_negative();
    match upgrade {
        Some(basis) => target.saturating_diff(basis.previously_paid),
        None => target,
    }
}

pub fn resolve_delivery(work: &Work, version: Option<&WorkVersion>) -> DeliveryLinks {
    let figma_url = version.and_then(|v| v.figma_url.clone()).or_else(|| work.figma_url.clone());
    let delivery_url = version.and_then(|v| v.delivery_url.clone()).or_else(|| work.delivery_url.clone());
    DeliveryLinks { figma_url: non_blank(figma_url), delivery_url: non_blank(delivery_url) }
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}
