use crate::domain::amounts::Currency;
use crate::domain::ports::RateSource;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// One observed market price of a coin in `currency`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatePoint {
    pub currency: Currency,
    pub at: DateTime<Utc>,
    pub rate: Decimal,
}

/// Timestamped market rates, answering with the newest rate not in the future.
#[derive(Default, Clone)]
pub struct InMemoryRateHistory {
    history: Arc<RwLock<HashMap<Currency, BTreeMap<DateTime<Utc>, Decimal>>>>,
}

impl InMemoryRateHistory {
    /// Creates a new, empty rate history.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, point: RatePoint) {
        let mut history = self.history.write().await;
        history
            .entry(point.currency)
            .or_default()
            .insert(point.at, point.rate);
    }

    pub async fn rate_at(&self, currency: Currency, at: DateTime<Utc>) -> Option<Decimal> {
        let history = self.history.read().await;
        history
            .get(&currency)
            .and_then(|points| points.range(..=at).next_back())
            .map(|(_, rate)| *rate)
    }
}

#[async_trait]
impl RateSource for InMemoryRateHistory {
    async fn current_rate(&self, currency: Currency) -> Result<Option<Decimal>> {
        Ok(self.rate_at(currency, Utc::now()).await)
    }
}
