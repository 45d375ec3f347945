//! Aggregation of attributes the schema did not anticipate.
//!
//! Observations are keyed globally by attribute key. A secondary index
//! records which categories each key was seen under, so listings can be
//! scoped to a category while statistics stay shared.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::models::discovery::{
    DiscoveredAttribute, DiscoveryObservation, DiscoveryStats, SchemaFieldDraft,
};
use crate::models::schema::FieldType;

pub const DEFAULT_MIN_FREQUENCY: u32 = 2;
pub const DEFAULT_MIN_CONFIDENCE: u8 = 75;

/// Confidence at or above which a discovery counts as high confidence.
const HIGH_CONFIDENCE: u8 = 80;

/// Ranking boost for attributes with a closed vocabulary.
const SELECT_BOOST: f64 = 1.2;

#[derive(Debug, Default)]
struct DiscoveryState {
    by_key: HashMap<String, DiscoveredAttribute>,
    by_category: HashMap<String, BTreeSet<String>>,
}

/// Process-wide store of discovered attributes.
#[derive(Debug, Default)]
pub struct DiscoveryAggregator {
    state: RwLock<DiscoveryState>,
}

impl DiscoveryAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a batch of observations into the store.
    pub async fn observe(&self, observations: &[DiscoveryObservation], category_id: Option<&str>) {
        if observations.is_empty() {
            return;
        }

        let now = Utc::now();
        let mut state = self.state.write().await;

        for observation in observations {
            let updated = match state.by_key.get(&observation.key) {
                Some(existing) => update_discovery(existing, observation, now),
                None => new_discovery(observation, category_id, now),
            };

            debug!(
                key = %updated.key,
                frequency = updated.frequency,
                confidence = updated.confidence,
                promotable = updated.is_promotable,
                "Discovery observed"
            );

            if let Some(category) = category_id {
                state
                    .by_category
                    .entry(category.to_string())
                    .or_default()
                    .insert(updated.key.clone());
            }
            state.by_key.insert(updated.key.clone(), updated);
        }

        metrics::counter!("discovery_observations_total").increment(observations.len() as u64);
    }

    /// All discoveries (optionally scoped to a category), best ranked first.
    pub async fn list(&self, category_id: Option<&str>) -> Vec<DiscoveredAttribute> {
        let state = self.state.read().await;
        let mut items = scoped(&state, category_id);
        sort_by_rank(&mut items);
        items
    }

    /// Discoveries meeting the given frequency and confidence floors.
    pub async fn promotable(&self, min_frequency: u32, min_confidence: u8) -> Vec<DiscoveredAttribute> {
        let state = self.state.read().await;
        let mut items: Vec<_> = state
            .by_key
            .values()
            .filter(|d| {
                d.frequency >= min_frequency
                    && d.confidence >= min_confidence
                    && !d.normalized_value.is_empty()
            })
            .cloned()
            .collect();
        sort_by_rank(&mut items);
        items
    }

    pub async fn get(&self, key: &str) -> Option<DiscoveredAttribute> {
        self.state.read().await.by_key.get(key).cloned()
    }

    /// Draft a schema field from a promotable discovery. The store is not modified.
    pub async fn promote(&self, key: &str) -> Result<SchemaFieldDraft, DiscoveryError> {
        let state = self.state.read().await;
        let discovery = state
            .by_key
            .get(key)
            .ok_or_else(|| DiscoveryError::NotFound(key.to_string()))?;

        if !discovery.is_promotable {
            return Err(DiscoveryError::NotPromotable {
                key: key.to_string(),
                frequency: discovery.frequency,
                confidence: discovery.confidence,
            });
        }

        Ok(SchemaFieldDraft {
            key: discovery.key.clone(),
            label: discovery.label.clone(),
            field_type: discovery.suggested_type,
            options: (discovery.suggested_type == FieldType::Select)
                .then(|| discovery.possible_values.clone()),
            description: format!(
                "Discovered attribute seen {} times with {}% average confidence",
                discovery.frequency, discovery.confidence
            ),
        })
    }

    pub async fn stats(&self, category_id: Option<&str>) -> DiscoveryStats {
        let state = self.state.read().await;
        let items = scoped(&state, category_id);

        DiscoveryStats {
            total_found: items.iter().map(|d| d.frequency).sum(),
            high_confidence: items.iter().filter(|d| d.confidence >= HIGH_CONFIDENCE).count() as u32,
            schema_promotable: items.iter().filter(|d| d.is_promotable).count() as u32,
            unique_keys: items.len() as u32,
        }
    }

    /// Administrative reset.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.by_key.clear();
        state.by_category.clear();
    }
}

/// First observation of a key.
pub fn new_discovery(
    observation: &DiscoveryObservation,
    category_id: Option<&str>,
    now: DateTime<Utc>,
) -> DiscoveredAttribute {
    let possible_values = if observation.suggested_type == FieldType::Select
        && !observation.normalized_value.is_empty()
    {
        vec![observation.normalized_value.clone()]
    } else {
        Vec::new()
    };

    let mut discovery = DiscoveredAttribute {
        key: observation.key.clone(),
        label: observation.label.clone(),
        raw_value: observation.raw_value.clone(),
        normalized_value: observation.normalized_value.clone(),
        confidence: observation.confidence,
        reasoning: observation.reasoning.clone(),
        frequency: 1,
        suggested_type: observation.suggested_type,
        possible_values,
        is_promotable: false,
        category_id: category_id.map(str::to_string),
        created_at: now,
        updated_at: now,
    };
    discovery.is_promotable = is_promotable(&discovery);
    discovery
}

/// Fold a repeat observation into an existing discovery.
///
/// Frequency always grows by one, even when the observed value differs.
pub fn update_discovery(
    existing: &DiscoveredAttribute,
    observation: &DiscoveryObservation,
    now: DateTime<Utc>,
) -> DiscoveredAttribute {
    let mut next = existing.clone();
    next.frequency = existing.frequency + 1;

    let weighted = f64::from(existing.confidence) * f64::from(existing.frequency)
        + f64::from(observation.confidence);
    next.confidence = (weighted / f64::from(next.frequency)).round().clamp(0.0, 100.0) as u8;

    next.reasoning = observation.reasoning.clone();
    next.updated_at = now;

    if next.suggested_type == FieldType::Select && !observation.normalized_value.is_empty() {
        let mut values: BTreeSet<String> = next.possible_values.drain(..).collect();
        values.insert(observation.normalized_value.clone());
        next.possible_values = values.into_iter().collect();
    }

    next.is_promotable = is_promotable(&next);
    next
}

pub fn is_promotable(discovery: &DiscoveredAttribute) -> bool {
    discovery.frequency >= DEFAULT_MIN_FREQUENCY
        && discovery.confidence >= DEFAULT_MIN_CONFIDENCE
        && !discovery.normalized_value.is_empty()
}

/// Ranking score: frequency x confidence, boosted for select attributes.
pub fn rank_score(discovery: &DiscoveredAttribute) -> f64 {
    let boost = if discovery.suggested_type == FieldType::Select {
        SELECT_BOOST
    } else {
        1.0
    };
    f64::from(discovery.frequency) * f64::from(discovery.confidence) * boost
}

fn scoped(state: &DiscoveryState, category_id: Option<&str>) -> Vec<DiscoveredAttribute> {
    match category_id {
        Some(category) => state
            .by_category
            .get(category)
            .map(|keys| {
                keys.iter()
                    .filter_map(|key| state.by_key.get(key).cloned())
                    .collect()
            })
            .unwrap_or_default(),
        None => state.by_key.values().cloned().collect(),
    }
}

fn sort_by_rank(items: &mut [DiscoveredAttribute]) {
    items.sort_by(|a, b| {
        rank_score(b)
            .partial_cmp(&rank_score(a))
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.key.cmp(&b.key))
    });
}

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Discovery '{0}' not found")]
    NotFound(String),

    #[error("Discovery '{key}' is not promotable (frequency {frequency}, confidence {confidence})")]
    NotPromotable {
        key: String,
        frequency: u32,
        confidence: u8,
    },
}
