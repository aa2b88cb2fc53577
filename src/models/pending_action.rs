use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::config::RetryConfig;
use crate::error::QueueError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Create,
    Update,
    Delete,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Create => "create",
            ActionKind::Update => "update",
            ActionKind::Delete => "delete",
        }
    }

    /// Update and delete address an existing record, so their payload carries its id.
    pub fn requires_record_id(&self) -> bool {
        !matches!(self, ActionKind::Create)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" | "insert" => Ok(ActionKind::Create),
            "update" => Ok(ActionKind::Update),
            "delete" => Ok(ActionKind::Delete),
            other => Err(format!("unknown action kind: {}", other)),
        }
    }
}

/// Backend collections the queue is allowed to write to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Clients,
    ServiceOrders,
    Coupons,
    CouponRedemptions,
    Notes,
    DeliveryRoutes,
    PushSubscriptions,
}

impl Collection {
    pub const ALL: [Collection; 7] = [
        Collection::Clients,
        Collection::ServiceOrders,
        Collection::Coupons,
        Collection::CouponRedemptions,
        Collection::Notes,
        Collection::DeliveryRoutes,
        Collection::PushSubscriptions,
    ];

    /// Table name on the backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Clients => "clients",
            Collection::ServiceOrders => "service_orders",
            Collection::Coupons => "coupons",
            Collection::CouponRedemptions => "coupon_redemptions",
            Collection::Notes => "notes",
            Collection::DeliveryRoutes => "delivery_routes",
            Collection::PushSubscriptions => "push_subscriptions",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| QueueError::UnknownCollection(s.to_string()))
    }
}

/// A mutation waiting to be delivered to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAction {
    pub id: Uuid,
    pub kind: ActionKind,
    pub collection: Collection,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl PendingAction {
    pub fn new(kind: ActionKind, collection: Collection, payload: Value) -> Result<Self, QueueError> {
        if kind.requires_record_id() && record_id(&payload).is_none() {
            return Err(QueueError::MissingRecordId(kind));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            kind,
            collection,
            payload,
            created_at: Utc::now(),
        })
    }

    pub fn record_id(&self) -> Option<String> {
        record_id(&self.payload)
    }
}

/// `payload.id` as a string; numeric ids are accepted too.
pub fn record_id(payload: &Value) -> Option<String> {
    match payload.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ============================================================================
// PERSISTED QUEUE
// ============================================================================

/// Serialized form of the offline queue, plus the retry bookkeeping used for backoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingActionsQueue {
    pub actions: Vec<PendingAction>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub last_retry: Option<DateTime<Utc>>,
}

impl Default for PendingActionsQueue {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl PendingActionsQueue {
    pub fn new(actions: Vec<PendingAction>) -> Self {
        Self {
            actions,
            created_at: Utc::now(),
            retry_count: 0,
            last_retry: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn increment_retry(&mut self, now: DateTime<Utc>) {
        self.retry_count = self.retry_count.saturating_add(1);
        self.last_retry = Some(now);
    }

    pub fn reset_retry(&mut self) {
        self.retry_count = 0;
        self.last_retry = None;
    }

    pub fn should_retry_at(&self, now: DateTime<Utc>, retry: &RetryConfig) -> bool {
        self.backoff_remaining_at(now, retry) == 0
    }

    /// Seconds left before the next periodic retry is allowed.
    pub fn backoff_remaining_at(&self, now: DateTime<Utc>, retry: &RetryConfig) -> i64 {
        let last_retry = match self.last_retry {
            Some(ts) if self.retry_count > 0 => ts,
            _ => return 0,
        };
        let elapsed = (now - last_retry).num_seconds();
        (retry.backoff_seconds(self.retry_count) - elapsed).max(0)
    }
}
