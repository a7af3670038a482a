//! Feature extraction for the transaction risk classifier.
//!
//! Produces the 9-feature vector the classifier was trained on. Aggregate
//! features read the whole batch through a [`BatchContext`] built once per
//! batch; the batch itself is never modified.

use crate::error::FeatureError;
use crate::types::transaction::{Transaction, WEI_PER_UNIT};
use chrono::{DateTime, Datelike, Timelike, Utc};
use std::collections::{HashMap, HashSet};
use std::ops::Index;

/// Number of features produced for every transaction.
pub const FEATURE_COUNT: usize = 9;

/// `TimeSinceLast` when the sender has no earlier transaction in the batch.
/// This is "unknown", not a duration.
pub const TIME_SINCE_LAST_UNKNOWN: f64 = -1.0;

/// `SenderAge` when there is no batch context.
pub const SENDER_AGE_UNKNOWN: f64 = 0.0;

/// Feature positions, in the order the classifier expects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    ValueLog,
    BlockNumber,
    FromCount,
    ToCount,
    FromUniqueReceivers,
    HourOfDay,
    DayOfWeek,
    TimeSinceLast,
    SenderAge,
}

impl Feature {
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::ValueLog,
        Feature::BlockNumber,
        Feature::FromCount,
        Feature::ToCount,
        Feature::FromUniqueReceivers,
        Feature::HourOfDay,
        Feature::DayOfWeek,
        Feature::TimeSinceLast,
        Feature::SenderAge,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Column name used during training.
    pub fn name(self) -> &'static str {
        match self {
            Feature::ValueLog => "value_log",
            Feature::BlockNumber => "block_height",
            Feature::FromCount => "from_count",
            Feature::ToCount => "to_count",
            Feature::FromUniqueReceivers => "from_unique_receivers",
            Feature::HourOfDay => "hour",
            Feature::DayOfWeek => "day_of_week",
            Feature::TimeSinceLast => "time_since_last",
            Feature::SenderAge => "sender_age",
        }
    }
}

/// Positional model input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn new(values: [f64; FEATURE_COUNT]) -> Self {
        Self(values)
    }

    /// Single-precision copy for the ONNX input tensor.
    pub fn to_f32(&self) -> Vec<f32> {
        self.0.iter().map(|&v| v as f32).collect()
    }

    pub fn len(&self) -> usize {
        FEATURE_COUNT
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Index<Feature> for FeatureVector {
    type Output = f64;

    fn index(&self, feature: Feature) -> &f64 {
        &self.0[feature.index()]
    }
}

#[derive(Debug, Default)]
struct SenderStats<'a> {
    count: usize,
    receivers: HashSet<String>,
    /// (timestamp, hash), stably sorted by timestamp once the batch is indexed
    timeline: Vec<(i64, Option<&'a str>)>,
}

/// Per-batch index of sender and receiver activity.
///
/// Transactions whose addresses or timestamp cannot be read are left out of
/// the affected aggregates; their own extraction fails separately.
#[derive(Debug)]
pub struct BatchContext<'a> {
    len: usize,
    senders: HashMap<String, SenderStats<'a>>,
    receiver_counts: HashMap<String, usize>,
}

impl<'a> BatchContext<'a> {
    pub fn new(transactions: &'a [Transaction]) -> Self {
        let mut senders: HashMap<String, SenderStats<'a>> = HashMap::new();
        let mut receiver_counts: HashMap<String, usize> = HashMap::new();

        for tx in transactions {
            let to = tx.to_address().ok();
            if let Some(to) = &to {
                *receiver_counts.entry(to.clone()).or_insert(0) += 1;
            }

            let Ok(from) = tx.from_address() else {
                continue;
            };
            let stats = senders.entry(from).or_default();
            stats.count += 1;
            if let Some(to) = to {
                stats.receivers.insert(to);
            }
            if let Ok(ts) = tx.timestamp() {
                stats.timeline.push((ts, tx.hash()));
            }
        }

        for stats in senders.values_mut() {
            stats.timeline.sort_by_key(|&(ts, _)| ts);
        }

        Self {
            len: transactions.len(),
            senders,
            receiver_counts,
        }
    }

    /// Number of transactions in the batch.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn from_count(&self, from: &str) -> usize {
        self.senders.get(from).map_or(0, |s| s.count)
    }

    fn to_count(&self, to: &str) -> usize {
        self.receiver_counts.get(to).copied().unwrap_or(0)
    }

    fn unique_receivers(&self, from: &str) -> usize {
        self.senders.get(from).map_or(0, |s| s.receivers.len())
    }

    /// Delta to the sender's previous transaction, located by hash.
    fn time_since_last(&self, from: &str, hash: Option<&str>, timestamp: i64) -> Option<i64> {
        let timeline = &self.senders.get(from)?.timeline;
        let position = timeline.iter().position(|&(_, h)| h == hash)?;
        if position == 0 {
            return None;
        }
        Some(timestamp - timeline[position - 1].0)
    }

    fn first_seen(&self, from: &str) -> Option<i64> {
        self.senders
            .get(from)
            .and_then(|s| s.timeline.first())
            .map(|&(ts, _)| ts)
    }
}

/// Feature extractor that transforms transactions into model input features.
///
/// Features are extracted in the exact order given by [`Feature::ALL`].
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract features from a transaction.
    ///
    /// `context` is the batch the transaction belongs to. Without it, or when
    /// the batch holds fewer than two transactions, the aggregate features
    /// take their neutral values.
    pub fn extract(
        &self,
        tx: &Transaction,
        context: Option<&BatchContext<'_>>,
    ) -> Result<FeatureVector, FeatureError> {
        let value = tx.value_wei()? / WEI_PER_UNIT;
        let block_number = tx.block_number()?;
        let timestamp = tx.timestamp()?;
        let from = tx.from_address()?;
        let to = tx.to_address()?;

        let datetime = DateTime::<Utc>::from_timestamp(timestamp, 0)
            .ok_or(FeatureError::InvalidTimestamp(timestamp))?;

        let mut from_count = 1.0;
        let mut to_count = 1.0;
        let mut from_unique_receivers = 1.0;
        let mut time_since_last = TIME_SINCE_LAST_UNKNOWN;
        let mut sender_age = SENDER_AGE_UNKNOWN;

        if let Some(ctx) = context.filter(|c| c.len() > 1) {
            from_count = ctx.from_count(&from) as f64;
            to_count = ctx.to_count(&to) as f64;
            from_unique_receivers = match ctx.unique_receivers(&from) {
                0 => 1.0,
                n => n as f64,
            };
            if let Some(delta) = ctx.time_since_last(&from, tx.hash(), timestamp) {
                time_since_last = delta as f64;
            }
            if let Some(first_seen) = ctx.first_seen(&from) {
                sender_age = (timestamp - first_seen) as f64;
            }
        }

        Ok(FeatureVector([
            value.ln_1p(),
            block_number as f64,
            from_count,
            to_count,
            from_unique_receivers,
            datetime.hour() as f64,
            datetime.weekday().num_days_from_monday() as f64,
            time_since_last,
            sender_age,
        ]))
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }

    /// Get feature names (matching training order).
    pub fn feature_names(&self) -> Vec<&'static str> {
        Feature::ALL.iter().map(|f| f.name()).collect()
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}
