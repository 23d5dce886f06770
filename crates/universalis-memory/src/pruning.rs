//! Memory pruning: relevance decay, consolidation, and the hard cap.
//!
//! Retrieval latency grows with row count, so the host runs a pruning
//! pass every `prune_interval` cycles:
//!
//! 1. **Decay** -- importance decays exponentially with age; frequent
//!    access pushes back. Rows whose decayed importance falls below
//!    `min_importance` are dropped.
//! 2. **Consolidation** -- near-duplicate rows (default Jaccard >= 0.85
//!    on tokens, pluggable) merge into the more important one, which
//!    gets a 20 % importance boost capped at 1.0.
//! 3. **Hard cap** -- if more than `max_memories` rows survive, only
//!    the highest-importance rows are kept.

use std::collections::BTreeSet;

use tracing::info;

use crate::bank::{MemoryBank, MemoryRecord};

/// Importance boost factor applied to the survivor of a consolidation.
const CONSOLIDATION_BOOST: f64 = 1.2;

/// Configuration for memory pruning.
#[derive(Debug, Clone, PartialEq)]
pub struct PruningConfig {
    /// Importance decay rate per cycle, in `[0, 1]`.
    pub decay_rate: f64,
    /// Rows below this decayed importance are dropped.
    pub min_importance: f64,
    /// Similarity threshold for merging near-duplicates.
    pub consolidation_threshold: f64,
    /// Cycles between pruning runs.
    pub prune_interval: u64,
    /// Hard cap on surviving rows.
    pub max_memories: usize,
}

impl Default for PruningConfig {
    fn default() -> Self {
        Self {
            decay_rate: 0.05,
            min_importance: 0.1,
            consolidation_threshold: 0.85,
            prune_interval: 100,
            max_memories: 10_000,
        }
    }
}

/// Statistics from one pruning pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PruneStats {
    /// Rows present before the pass.
    pub before: usize,
    /// Rows dropped by decay.
    pub decayed: usize,
    /// Rows merged away by consolidation.
    pub consolidated: usize,
    /// Rows dropped by the hard cap.
    pub capped: usize,
    /// Rows remaining after the pass.
    pub after: usize,
}

/// Pluggable text-similarity function for consolidation.
pub type SimilarityFn = Box<dyn Fn(&str, &str) -> f64 + Send + Sync>;

/// Decayed importance of a row.
///
/// `decayed = importance * (1 - rate)^cycles`, plus a reinforcement
/// boost of `min(1, accesses * 0.1) * (1 - decayed)`. Clamped to
/// `[0, 1]`.
pub fn decayed_importance(
    importance: f64,
    cycles_elapsed: u64,
    access_count: u32,
    decay_rate: f64,
) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let decay_factor = (1.0 - decay_rate).powf(cycles_elapsed as f64);
    let decayed = importance * decay_factor;
    let access_boost = f64::from(access_count).mul_add(0.1, 0.0).min(1.0);
    let boosted = access_boost.mul_add(1.0 - decayed, decayed);
    boosted.clamp(0.0, 1.0)
}

/// Whether a row is pruneable: its decayed importance (without the
/// access boost) falls below `min_importance`.
pub fn should_prune(
    importance: f64,
    cycles_elapsed: u64,
    decay_rate: f64,
    min_importance: f64,
) -> bool {
    decayed_importance(importance, cycles_elapsed, 0, decay_rate) < min_importance
}

/// Default similarity: Jaccard index over lowercase whitespace tokens.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let words_a: BTreeSet<String> = a.to_lowercase().split_whitespace().map(ToOwned::to_owned).collect();
    let words_b: BTreeSet<String> = b.to_lowercase().split_whitespace().map(ToOwned::to_owned).collect();

    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }
    let intersection = words_a.intersection(&words_b).count();
    let union = words_a.union(&words_b).count();
    if union == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = intersection as f64 / union as f64;
    ratio
}

/// Orchestrates pruning passes over a [`MemoryBank`].
pub struct MemoryPruner {
    config: PruningConfig,
    similarity: SimilarityFn,
    last_prune_cycle: u64,
}

impl MemoryPruner {
    /// A pruner with the given configuration and Jaccard similarity.
    pub fn new(config: PruningConfig) -> Self {
        Self {
            config,
            similarity: Box::new(jaccard_similarity),
            last_prune_cycle: 0,
        }
    }

    /// Override the similarity function used for consolidation.
    #[must_use]
    pub fn with_similarity(mut self, similarity: SimilarityFn) -> Self {
        self.similarity = similarity;
        self
    }

    /// The cycle of the last pruning pass.
    pub const fn last_prune_cycle(&self) -> u64 {
        self.last_prune_cycle
    }

    /// Whether a pass is due at `current_cycle`.
    pub const fn should_run(&self, current_cycle: u64) -> bool {
        current_cycle.saturating_sub(self.last_prune_cycle) >= self.config.prune_interval
    }

    /// Run one pruning pass over the bank.
    pub async fn run(&mut self, bank: &MemoryBank, current_cycle: u64) -> PruneStats {
        self.last_prune_cycle = current_cycle;

        let records = bank.records_snapshot().await;
        let before = records.len();

        // Step 1: decay and filter.
        let mut surviving: Vec<MemoryRecord> = Vec::with_capacity(records.len());
        for mut record in records {
            let cycles_elapsed = current_cycle.saturating_sub(record.cycle);
            if should_prune(
                record.importance,
                cycles_elapsed,
                self.config.decay_rate,
                self.config.min_importance,
            ) {
                continue;
            }
            record.importance = decayed_importance(
                record.importance,
                cycles_elapsed,
                record.access_count,
                self.config.decay_rate,
            );
            surviving.push(record);
        }
        let decayed = before.saturating_sub(surviving.len());

        // Step 2: consolidate near-duplicates.
        let after_decay = surviving.len();
        let mut consolidated = self.consolidate(surviving);
        let merged = after_decay.saturating_sub(consolidated.len());

        // Step 3: hard cap by importance.
        let after_merge = consolidated.len();
        if consolidated.len() > self.config.max_memories {
            consolidated.sort_by(|a, b| b.importance.total_cmp(&a.importance));
            consolidated.truncate(self.config.max_memories);
        }
        let capped = after_merge.saturating_sub(consolidated.len());

        let after = consolidated.len();
        bank.replace_records(consolidated).await;

        let stats = PruneStats {
            before,
            decayed,
            consolidated: merged,
            capped,
            after,
        };
        info!(
            cycle = current_cycle,
            before, decayed, merged, capped, after, "Memory pruning complete"
        );
        stats
    }

    /// Merge similar rows pairwise: the more important of a pair
    /// survives with a boosted importance.
    fn consolidate(&self, mut records: Vec<MemoryRecord>) -> Vec<MemoryRecord> {
        if records.len() < 2 {
            return records;
        }

        let mut removed: BTreeSet<usize> = BTreeSet::new();
        for i in 0..records.len() {
            if removed.contains(&i) {
                continue;
            }
            for j in i.saturating_add(1)..records.len() {
                if removed.contains(&j) {
                    continue;
                }
                let (Some(first), Some(second)) = (records.get(i), records.get(j)) else {
                    continue;
                };
                let similarity = (self.similarity)(&first.text, &second.text);
                if similarity < self.config.consolidation_threshold {
                    continue;
                }

                let boosted = (first.importance.max(second.importance) * CONSOLIDATION_BOOST)
                    .min(1.0);
                if second.importance > first.importance {
                    records.swap(i, j);
                }
                if let Some(winner) = records.get_mut(i) {
                    winner.importance = boosted;
                }
                removed.insert(j);
            }
        }

        records
            .into_iter()
            .enumerate()
            .filter(|(idx, _)| !removed.contains(idx))
            .map(|(_, record)| record)
            .collect()
    }
}

impl Default for MemoryPruner {
    fn default() -> Self {
        Self::new(PruningConfig::default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use universalis_llm::Embedder;

    use crate::bank::MemoryParams;
    use crate::scopes::ScopeFilter;

    use super::*;

    fn make_bank() -> MemoryBank {
        MemoryBank::new("Alpha_Scenario", "memories", Embedder::HashSeeded { dim: 16 })
    }

    #[test]
    fn decay_reduces_importance_over_cycles() {
        let fresh = decayed_importance(0.8, 0, 0, 0.05);
        let aged = decayed_importance(0.8, 50, 0, 0.05);
        assert!((fresh - 0.8).abs() < 1e-12);
        assert!(aged < fresh);
    }

    #[test]
    fn access_boost_pushes_back_against_decay() {
        let ignored = decayed_importance(0.5, 40, 0, 0.05);
        let reinforced = decayed_importance(0.5, 40, 5, 0.05);
        assert!(reinforced > ignored);
        assert!(reinforced <= 1.0);
    }

    #[test]
    fn heavy_access_saturates_at_one() {
        let value = decayed_importance(0.5, 0, 100, 0.05);
        assert!(value <= 1.0);
    }

    #[test]
    fn should_prune_old_unimportant_rows() {
        assert!(should_prune(0.2, 100, 0.05, 0.1));
        assert!(!should_prune(0.9, 1, 0.05, 0.1));
    }

    #[test]
    fn jaccard_similarity_basics() {
        assert!((jaccard_similarity("a b c", "a b c") - 1.0).abs() < 1e-12);
        assert!(jaccard_similarity("a b", "c d").abs() < 1e-12);
        let half = jaccard_similarity("a b c d", "a b e f");
        assert!((half - 2.0 / 6.0).abs() < 1e-12);
        assert!(jaccard_similarity("", "a").abs() < 1e-12);
    }

    #[test]
    fn should_run_respects_interval() {
        let pruner = MemoryPruner::new(PruningConfig {
            prune_interval: 10,
            ..PruningConfig::default()
        });
        assert!(!pruner.should_run(5));
        assert!(pruner.should_run(10));
        assert!(pruner.should_run(25));
    }

    #[tokio::test]
    async fn decay_drops_stale_rows() {
        let bank = make_bank();
        bank.add(
            "ancient trivia",
            MemoryParams::public(0).with_importance(0.15),
        )
        .await
        .unwrap();
        bank.add(
            "crucial doctrine",
            MemoryParams::public(0).with_importance(1.0),
        )
        .await
        .unwrap();

        // At cycle 10 with rate 0.05: 0.15 * 0.95^10 ~= 0.09 < 0.1,
        // while 1.0 * 0.95^10 ~= 0.60 survives.
        let mut pruner = MemoryPruner::new(PruningConfig {
            prune_interval: 1,
            ..PruningConfig::default()
        });
        let stats = pruner.run(&bank, 10).await;

        assert_eq!(stats.before, 2);
        assert_eq!(stats.decayed, 1);
        assert_eq!(stats.after, 1);
        let remaining = bank
            .retrieve_recent(10, &ScopeFilter::default())
            .await;
        assert_eq!(remaining, vec![String::from("crucial doctrine")]);
    }

    #[tokio::test]
    async fn consolidation_keeps_more_important_duplicate() {
        let bank = make_bank();
        bank.add(
            "the bridge at dawn was heavily damaged",
            MemoryParams::private("A", 10).with_importance(0.4),
        )
        .await
        .unwrap();
        bank.add(
            "the bridge at dawn was heavily damaged today",
            MemoryParams::private("B", 10).with_importance(0.7),
        )
        .await
        .unwrap();

        let mut pruner = MemoryPruner::new(PruningConfig {
            prune_interval: 1,
            consolidation_threshold: 0.8,
            decay_rate: 0.0,
            ..PruningConfig::default()
        });
        let stats = pruner.run(&bank, 10).await;

        assert_eq!(stats.consolidated, 1);
        assert_eq!(stats.after, 1);
        let records = bank.records_snapshot().await;
        let survivor = records.first().unwrap();
        assert!(survivor.text.ends_with("today"));
        // 0.7 * 1.2 = 0.84
        assert!((survivor.importance - 0.84).abs() < 1e-9);
    }

    #[tokio::test]
    async fn consolidation_boost_caps_at_one() {
        let bank = make_bank();
        bank.add(
            "identical warning text",
            MemoryParams::private("A", 5).with_importance(0.95),
        )
        .await
        .unwrap();
        bank.add(
            "identical warning text",
            MemoryParams::private("B", 5).with_importance(0.9),
        )
        .await
        .unwrap();

        let mut pruner = MemoryPruner::new(PruningConfig {
            prune_interval: 1,
            decay_rate: 0.0,
            ..PruningConfig::default()
        });
        pruner.run(&bank, 5).await;

        let records = bank.records_snapshot().await;
        assert_eq!(records.len(), 1);
        assert!(records.first().unwrap().importance <= 1.0);
    }

    #[tokio::test]
    async fn hard_cap_keeps_highest_importance() {
        let bank = make_bank();
        bank.add("low value", MemoryParams::public(10).with_importance(0.3))
            .await
            .unwrap();
        bank.add("medium value", MemoryParams::public(10).with_importance(0.6))
            .await
            .unwrap();
        bank.add("high value", MemoryParams::public(10).with_importance(0.9))
            .await
            .unwrap();

        let mut pruner = MemoryPruner::new(PruningConfig {
            prune_interval: 1,
            decay_rate: 0.0,
            max_memories: 2,
            ..PruningConfig::default()
        });
        let stats = pruner.run(&bank, 10).await;

        assert_eq!(stats.capped, 1);
        let texts = bank.retrieve_recent(10, &ScopeFilter::default()).await;
        assert_eq!(texts.len(), 2);
        assert!(!texts.contains(&String::from("low value")));
    }

    #[tokio::test]
    async fn pruned_content_can_be_added_again() {
        let bank = make_bank();
        bank.add(
            "ephemeral note",
            MemoryParams::public(0).with_importance(0.15),
        )
        .await
        .unwrap();

        let mut pruner = MemoryPruner::new(PruningConfig {
            prune_interval: 1,
            ..PruningConfig::default()
        });
        pruner.run(&bank, 200).await;
        assert!(bank.is_empty().await);

        // The hash set was rebuilt, so the same text inserts cleanly.
        assert!(
            bank.add(
                "ephemeral note",
                MemoryParams::public(200).with_importance(0.5)
            )
            .await
            .unwrap()
        );
    }

    #[tokio::test]
    async fn run_updates_last_prune_cycle() {
        let bank = make_bank();
        let mut pruner = MemoryPruner::new(PruningConfig {
            prune_interval: 10,
            ..PruningConfig::default()
        });
        assert!(pruner.should_run(10));
        pruner.run(&bank, 10).await;
        assert_eq!(pruner.last_prune_cycle(), 10);
        assert!(!pruner.should_run(15));
        assert!(pruner.should_run(20));
    }
}
