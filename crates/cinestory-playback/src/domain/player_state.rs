//! Player stat/relation values and the active relation set.

use std::collections::{BTreeMap, BTreeSet};

use cinestory_content::domain::graph::{Bounds, DistributionMode, StatKind, StoryGraph};
use cinestory_core::error::DomainError;
use serde::Serialize;

/// A value change produced by one effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueChange {
    /// Value before the change.
    pub before: i64,
    /// Value after clamping.
    pub after: i64,
}

/// Keyed numeric store plus the set of engaged relations.
///
/// Missing keys read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlayerState {
    values: BTreeMap<String, i64>,
    active_relations: BTreeSet<String>,
}

impl PlayerState {
    /// Starting state from the story's initial values, clamped to bounds.
    #[must_use]
    pub fn from_story(graph: &StoryGraph) -> Self {
        let values = graph
            .initial_stats
            .iter()
            .map(|(key, value)| (key.clone(), graph.bounds_for(key).clamp(*value)))
            .collect();
        Self {
            values,
            active_relations: BTreeSet::new(),
        }
    }

    /// Starting state from a player allocation on top of the initial values.
    ///
    /// Points must be non-negative, may only go to defined keys of a kind the
    /// player distributes, and each distributed pool must be spent exactly.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the allocation breaks any of
    /// those rules.
    pub fn from_allocation(
        graph: &StoryGraph,
        allocation: &BTreeMap<String, i64>,
    ) -> Result<Self, DomainError> {
        let config = &graph.config;
        let mut spent_stats = 0_i64;
        let mut spent_relations = 0_i64;

        for (key, points) in allocation {
            if *points < 0 {
                return Err(DomainError::Validation(format!(
                    "allocation for {key} must not be negative"
                )));
            }
            let Some(definition) = graph.stat_definition(key) else {
                return Err(DomainError::Validation(format!("unknown stat {key}")));
            };
            let spent = match definition.kind {
                StatKind::Stat if config.stat_distribution == DistributionMode::User => {
                    &mut spent_stats
                }
                StatKind::Relation if config.relation_distribution == DistributionMode::User => {
                    &mut spent_relations
                }
                _ => {
                    return Err(DomainError::Validation(format!(
                        "{key} is not player-distributed"
                    )));
                }
            };
            *spent = spent.checked_add(*points).ok_or_else(|| {
                DomainError::Validation(format!("allocation for {key} is out of range"))
            })?;
        }

        check_pool(graph, StatKind::Stat, config.stat_distribution, config.stat_pool, spent_stats)?;
        check_pool(
            graph,
            StatKind::Relation,
            config.relation_distribution,
            config.relation_pool,
            spent_relations,
        )?;

        let mut state = Self::from_story(graph);
        for (key, points) in allocation {
            let bounds = graph.bounds_for(key);
            let base = state.value(key);
            state.values.insert(key.clone(), bounds.clamp(base.saturating_add(*points)));
        }
        Ok(state)
    }

    /// Current value of `key`.
    #[must_use]
    pub fn value(&self, key: &str) -> i64 {
        self.values.get(key).copied().unwrap_or(0)
    }

    /// All stored values.
    #[must_use]
    pub fn values(&self) -> &BTreeMap<String, i64> {
        &self.values
    }

    /// Adds `delta` to `key` and clamps the result.
    pub(crate) fn apply_delta(&mut self, key: &str, delta: i64, bounds: Bounds) -> ValueChange {
        let before = self.value(key);
        let after = bounds.clamp(before.saturating_add(delta));
        self.values.insert(key.to_owned(), after);
        ValueChange { before, after }
    }

    /// Engages a relation. Returns `false` if it was already active.
    pub(crate) fn start_relation(&mut self, key: &str) -> bool {
        self.active_relations.insert(key.to_owned())
    }

    /// Releases a relation. Returns `false` if it was not active.
    pub(crate) fn stop_relation(&mut self, key: &str) -> bool {
        self.active_relations.remove(key)
    }

    /// Whether `key` is an engaged relation.
    #[must_use]
    pub fn is_relation_active(&self, key: &str) -> bool {
        self.active_relations.contains(key)
    }

    /// The engaged relations.
    #[must_use]
    pub fn active_relations(&self) -> &BTreeSet<String> {
        &self.active_relations
    }
}

fn check_pool(
    graph: &StoryGraph,
    kind: StatKind,
    mode: DistributionMode,
    pool: i64,
    spent: i64,
) -> Result<(), DomainError> {
    let has_keys = graph.stat_definitions.iter().any(|def| def.kind == kind);
    if mode == DistributionMode::User && has_keys && spent != pool {
        let what = if kind == StatKind::Relation {
            "relation"
        } else {
            "stat"
        };
        return Err(DomainError::Validation(format!(
            "allocate exactly {pool} {what} points, got {spent}"
        )));
    }
    Ok(())
}
