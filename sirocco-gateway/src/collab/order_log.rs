//! Order log seam.
//!
//! An append-only durable sink keyed by idempotency key. The gateway
//! writes fire-and-forget and reads back for `orders.cancel` and
//! `orders.history`.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use sirocco_core::OrderStatus;

use super::CollabError;

/// One appended order-log record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    /// Idempotency key the write was made under.
    pub idempotency_key: String,
    /// Status at write time.
    pub status: OrderStatus,
    /// Order id the record concerns.
    pub order_id: String,
    /// Handler-provided detail payload.
    pub detail: Value,
    /// Append time, unix milliseconds.
    pub ts: i64,
}

/// Append-only order log.
#[async_trait]
pub trait OrderLog: Send + Sync {
    /// Appends a record.
    async fn append(
        &self,
        idempotency_key: &str,
        status: OrderStatus,
        order_id: &str,
        detail: Value,
    ) -> Result<(), CollabError>;

    /// Returns the latest record per order id within the time range,
    /// newest first, at most `limit` records.
    async fn latest_per_order(
        &self,
        from_ts: Option<i64>,
        to_ts: Option<i64>,
        limit: u32,
    ) -> Result<Vec<OrderRecord>, CollabError>;

    /// Returns the most recent record for one order id.
    async fn get_by_order_id(&self, order_id: &str) -> Result<Option<OrderRecord>, CollabError>;
}

/// In-memory demo order log.
#[derive(Debug, Default)]
pub struct MemoryOrderLog {
    records: RwLock<Vec<OrderRecord>>,
}

impl MemoryOrderLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of appended records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if nothing has been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl OrderLog for MemoryOrderLog {
    async fn append(
        &self,
        idempotency_key: &str,
        status: OrderStatus,
        order_id: &str,
        detail: Value,
    ) -> Result<(), CollabError> {
        let mut records = self.records.write();
        // Appends are idempotent on the key: a replayed write is a no-op.
        if records.iter().any(|r| r.idempotency_key == idempotency_key) {
            return Ok(());
        }
        records.push(OrderRecord {
            idempotency_key: idempotency_key.to_string(),
            status,
            order_id: order_id.to_string(),
            detail,
            ts: chrono::Utc::now().timestamp_millis(),
        });
        Ok(())
    }

    async fn latest_per_order(
        &self,
        from_ts: Option<i64>,
        to_ts: Option<i64>,
        limit: u32,
    ) -> Result<Vec<OrderRecord>, CollabError> {
        let records = self.records.read();
        let mut latest: HashMap<String, OrderRecord> = HashMap::new();
        for record in records.iter() {
            if from_ts.is_some_and(|from| record.ts < from)
                || to_ts.is_some_and(|to| record.ts > to)
            {
                continue;
            }
            match latest.get(&record.order_id) {
                Some(existing) if existing.ts >= record.ts => {}
                _ => {
                    latest.insert(record.order_id.clone(), record.clone());
                }
            }
        }

        let mut result: Vec<OrderRecord> = latest.into_values().collect();
        result.sort_by(|a, b| b.ts.cmp(&a.ts));
        result.truncate(limit as usize);
        Ok(result)
    }

    async fn get_by_order_id(&self, order_id: &str) -> Result<Option<OrderRecord>, CollabError> {
        let records = self.records.read();
        Ok(records
            .iter()
            .filter(|r| r.order_id == order_id)
            .max_by_key(|r| r.ts)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_append_and_get() {
        let log = MemoryOrderLog::new();
        log.append("k1", OrderStatus::Ack, "ORD_1", json!({"symbol": "BTC-USD"}))
            .await
            .unwrap();

        let record = log.get_by_order_id("ORD_1").await.unwrap().unwrap();
        assert_eq!(record.status, OrderStatus::Ack);
        assert_eq!(record.detail["symbol"], "BTC-USD");
    }

    #[tokio::test]
    async fn test_append_same_key_is_noop() {
        let log = MemoryOrderLog::new();
        log.append("k1", OrderStatus::Ack, "ORD_1", json!({}))
            .await
            .unwrap();
        log.append("k1", OrderStatus::Filled, "ORD_1", json!({}))
            .await
            .unwrap();

        assert_eq!(log.len(), 1);
        let record = log.get_by_order_id("ORD_1").await.unwrap().unwrap();
        assert_eq!(record.status, OrderStatus::Ack);
    }

    #[tokio::test]
    async fn test_latest_per_order_newest_first() {
        let log = MemoryOrderLog::new();
        log.append("k1", OrderStatus::Ack, "ORD_1", json!({}))
            .await
            .unwrap();
        log.append("CANCEL_ORD_1", OrderStatus::Canceled, "ORD_1", json!({}))
            .await
            .unwrap();
        log.append("k2", OrderStatus::Filled, "ORD_2", json!({}))
            .await
            .unwrap();

        let records = log.latest_per_order(None, None, 100).await.unwrap();
        assert_eq!(records.len(), 2);
        // One record per order id, the latest one.
        let ord1 = records.iter().find(|r| r.order_id == "ORD_1").unwrap();
        assert_eq!(ord1.status, OrderStatus::Canceled);
        // Newest first.
        assert!(records[0].ts >= records[1].ts);
    }

    #[tokio::test]
    async fn test_latest_per_order_limit() {
        let log = MemoryOrderLog::new();
        for i in 0..5 {
            log.append(&format!("k{i}"), OrderStatus::Ack, &format!("ORD_{i}"), json!({}))
                .await
                .unwrap();
        }
        let records = log.latest_per_order(None, None, 2).await.unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_order_is_none() {
        let log = MemoryOrderLog::new();
        assert!(log.get_by_order_id("ORD_X").await.unwrap().is_none());
    }
}
