//! Read-side projection for the review dashboard.
//!
//! Filtering and statistics are computed here; every per-row affordance is
//! delegated to [`ApprovalEngine`] so the dashboard never re-derives a
//! business rule.

use std::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::purchase::{PurchaseRequest, PurchaseStatus};
use crate::errors::DomainError;
use crate::session::{ActorRole, RoleContext};
use crate::workflow::{ApprovalEngine, AvailableActions};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Only(PurchaseStatus),
}

impl StatusFilter {
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("all") {
            return Some(Self::All);
        }
        PurchaseStatus::parse(value).map(Self::Only)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Only(status) => status.as_str(),
        }
    }

    pub fn matches(&self, status: PurchaseStatus) -> bool {
        match self {
            Self::All => true,
            Self::Only(expected) => *expected == status,
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for StatusFilter {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StatusFilter {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "unknown status filter `{raw}` (expected all|pending|director_approved|finance_approved|rejected)"
            ))
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardQuery {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub status: StatusFilter,
}

impl DashboardQuery {
    /// Case-insensitive substring match on uploader or vendor name, plus the status filter.
    pub fn matches(&self, purchase: &PurchaseRequest) -> bool {
        if !self.status.matches(purchase.status) {
            return false;
        }

        let needle = self.search.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        purchase.uploader_name.to_lowercase().contains(&needle)
            || purchase.vendor_name.to_lowercase().contains(&needle)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total: usize,
    pub pending: usize,
    /// Requests that reached `finance_approved`.
    pub approved: usize,
    pub rejected: usize,
    pub total_amount: Decimal,
    pub total_amount_display: String,
}

impl DashboardStats {
    /// Fails when the amounts do not fit in a `Decimal` sum.
    pub fn collect<'a>(
        purchases: impl IntoIterator<Item = &'a PurchaseRequest>,
    ) -> Result<Self, DomainError> {
        let mut stats = Self::default();
        for purchase in purchases {
            stats.total += 1;
            match purchase.status {
                PurchaseStatus::Pending => stats.pending += 1,
                PurchaseStatus::FinanceApproved => stats.approved += 1,
                PurchaseStatus::Rejected => stats.rejected += 1,
                PurchaseStatus::DirectorApproved => {}
            }
            stats.total_amount =
                stats.total_amount.checked_add(purchase.amount).ok_or_else(|| {
                    DomainError::InvariantViolation(format!(
                        "dashboard total overflows at purchase {}",
                        purchase.id
                    ))
                })?;
        }
        stats.total_amount_display = format_inr(stats.total_amount);
        Ok(stats)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DashboardRow {
    pub purchase: PurchaseRequest,
    pub requires_director: bool,
    pub actions: AvailableActions,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DashboardView {
    pub role: ActorRole,
    pub query: DashboardQuery,
    pub stats: DashboardStats,
    pub rows: Vec<DashboardRow>,
}

impl DashboardView {
    /// Keeps the store's ordering; rows are only filtered, never re-sorted.
    pub fn build<C>(
        purchases: Vec<PurchaseRequest>,
        query: DashboardQuery,
        actor: &C,
        engine: &ApprovalEngine,
    ) -> Result<Self, DomainError>
    where
        C: RoleContext + ?Sized,
    {
        let rows: Vec<DashboardRow> = purchases
            .into_iter()
            .filter(|purchase| query.matches(purchase))
            .map(|purchase| DashboardRow {
                requires_director: engine.requires_director(&purchase),
                actions: engine.available_actions(&purchase, actor),
                purchase,
            })
            .collect();

        let stats = DashboardStats::collect(rows.iter().map(|row| &row.purchase))?;
        Ok(Self { role: actor.current_role(), query, stats, rows })
    }
}

/// Renders an amount as Indian rupees with lakh/crore digit grouping, e.g. `₹12,34,567.50`.
pub fn format_inr(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.2}", rounded.abs());
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let grouped = if whole.len() <= 3 {
        whole.to_string()
    } else {
        let (head, tail) = whole.split_at(whole.len() - 3);
        let mut groups: Vec<&str> = Vec::new();
        let mut end = head.len();
        while end > 0 {
            let start = end.saturating_sub(2);
            groups.push(&head[start..end]);
            end = start;
        }
        groups.reverse();
        format!("{},{tail}", groups.join(","))
    };

    let sign = if negative { "-" } else { "" };
    format!("{sign}₹{grouped}.{fraction}")
}
