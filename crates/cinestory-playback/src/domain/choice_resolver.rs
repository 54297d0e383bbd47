//! Applies a committed choice's effects and resolves where it leads.

use cinestory_content::domain::graph::{Choice, ContentBlock, StatKind, StoryGraph, VisibilityMode};
use cinestory_core::ids::SceneId;

use super::player_state::PlayerState;

/// How an applied effect is surfaced to the player.
#[derive(Debug, Clone, PartialEq)]
pub enum EffectNotice {
    /// Nothing is shown.
    Silent,
    /// A queued toast.
    Toast(String),
    /// A self-expiring delta beside the persistent display.
    Inline {
        /// Change as a percentage of the key's range.
        percent_change: f64,
    },
}

/// One effect after clamping.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedEffect {
    /// Stat key.
    pub key: String,
    /// Authored delta.
    pub delta: i64,
    /// Value before.
    pub before: i64,
    /// Value after clamping.
    pub after: i64,
    /// How to surface it.
    pub notice: EffectNotice,
}

/// Everything committing a choice produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Effects in authored order.
    pub effects: Vec<AppliedEffect>,
    /// Navigation target, if the choice leads anywhere.
    pub target: Option<SceneId>,
    /// Index of the dynamic route that overrode the default target.
    pub route_index: Option<usize>,
    /// Result blocks whose conditions hold after the effects.
    pub result_content: Vec<ContentBlock>,
}

/// Applies effects, resolves the target, and filters the result timeline.
pub fn resolve(graph: &StoryGraph, state: &mut PlayerState, choice: &Choice) -> Resolution {
    let effects = apply_effects(graph, state, choice);
    let (target, route_index) = resolve_target(state, choice);
    let result_content = visible_blocks(&choice.result_content, state);
    Resolution {
        effects,
        target,
        route_index,
        result_content,
    }
}

/// Applies each effect as `clamp(current + delta)` with the bounds of the
/// key's kind.
pub fn apply_effects(graph: &StoryGraph, state: &mut PlayerState, choice: &Choice) -> Vec<AppliedEffect> {
    choice
        .effects
        .iter()
        .map(|effect| {
            let bounds = graph.bounds_for(&effect.key);
            let change = state.apply_delta(&effect.key, effect.delta, bounds);
            let notice = notice_for(graph, &effect.key, effect.delta, bounds.percent_change(effect.delta));
            AppliedEffect {
                key: effect.key.clone(),
                delta: effect.delta,
                before: change.before,
                after: change.after,
                notice,
            }
        })
        .collect()
}

fn notice_for(graph: &StoryGraph, key: &str, delta: i64, percent_change: f64) -> EffectNotice {
    if delta == 0 || graph.stat_kind(key) == StatKind::Hidden {
        return EffectNotice::Silent;
    }
    match graph.visibility_for(key) {
        VisibilityMode::OnChange => {
            let sign = if percent_change > 0.0 { "+" } else { "" };
            EffectNotice::Toast(format!("{} {sign}{percent_change:.1}%", graph.label_for(key)))
        }
        VisibilityMode::AlwaysAndNotify => EffectNotice::Inline { percent_change },
        VisibilityMode::Hidden | VisibilityMode::Always => EffectNotice::Silent,
    }
}

/// Starts from the default target; the first dynamic route that holds
/// overrides it and later routes are not evaluated.
pub fn resolve_target(state: &PlayerState, choice: &Choice) -> (Option<SceneId>, Option<usize>) {
    choice
        .dynamic_routes
        .iter()
        .position(|route| route.matches(|key| state.value(key)))
        .map_or((choice.target_scene_id, None), |index| {
            (Some(choice.dynamic_routes[index].target), Some(index))
        })
}

/// Blocks whose conditions hold against the current values.
pub fn visible_blocks(blocks: &[ContentBlock], state: &PlayerState) -> Vec<ContentBlock> {
    blocks
        .iter()
        .filter(|block| block.is_visible(|key| state.value(key)))
        .cloned()
        .collect()
}
