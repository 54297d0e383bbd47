//! Authored storage shape and its normalisation into the graph model.
//!
//! Authored data has accumulated several shapes over time: relation triggers
//! and route keys as a single value or a list, routes and block lists stored
//! as JSON-encoded strings, a legacy single-condition block gate, and
//! numbers written as strings. All of it is folded into one shape here so
//! the engine never sees the variants.

use std::collections::BTreeMap;

use cinestory_core::error::DomainError;
use cinestory_core::ids::{ChapterId, SceneId};
use serde::Deserialize;

use super::conditions::{Condition, Operator};
use super::graph::{
    AudioLayers, Bounds, Chapter, CharacterProfile, Choice, ContentBlock, DEFAULT_CHARACTER_NAME,
    DistributionMode, DynamicRoute, Effect, GameConfig, MediaType, Scene, StatDefinition,
    StatKind, StoryGraph, Subtitle, VisibilityMode,
};

/// A number that may have been stored as a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum Numeric {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Numeric {
    fn as_f64(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            Self::Text(text) => text.trim().parse::<f64>().ok(),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => self
                .as_f64()
                .filter(|value| value.is_finite())
                .map(|value| value.round() as i64),
        }
    }
}

fn int_or(value: Option<&Numeric>, default: i64) -> i64 {
    value.and_then(Numeric::as_i64).unwrap_or(default)
}

/// A single value or a list of values.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_keys(self) -> Vec<String> {
        let keys = match self {
            Self::One(key) => vec![key],
            Self::Many(keys) => keys,
        };
        keys.into_iter()
            .map(|key| key.trim().to_owned())
            .filter(|key| !key.is_empty())
            .collect()
    }
}

/// A list that may have been stored as a JSON-encoded string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum Encoded<T> {
    List(Vec<T>),
    Text(String),
}

impl<T: for<'de> Deserialize<'de>> Encoded<T> {
    fn into_list(self) -> Vec<T> {
        match self {
            Self::List(items) => items,
            Self::Text(text) if text.trim().is_empty() => Vec::new(),
            Self::Text(text) => serde_json::from_str(&text).unwrap_or_else(|err| {
                tracing::warn!(error = %err, "discarding unparseable encoded list");
                Vec::new()
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawStory {
    pub game: RawGame,
    #[serde(default)]
    pub chapters: Option<Vec<RawChapter>>,
    #[serde(default)]
    pub scenes: Option<Vec<RawScene>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawGame {
    pub title: Option<String>,
    pub description: Option<String>,
    pub stat_definitions: Option<Vec<RawStatDefinition>>,
    pub game_config: Option<RawGameConfig>,
    pub initial_stats: Option<BTreeMap<String, Numeric>>,
    pub design_theme: Option<String>,
    pub default_char_name: Option<String>,
    pub default_char_image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawStatDefinition {
    pub key: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawGameConfig {
    pub stat_visibility: Option<String>,
    pub relation_visibility: Option<String>,
    pub stat_distribution: Option<String>,
    pub relation_distribution: Option<String>,
    pub stat_min: Option<Numeric>,
    pub stat_max: Option<Numeric>,
    pub relation_min: Option<Numeric>,
    pub relation_max: Option<Numeric>,
    pub stat_pool: Option<Numeric>,
    pub relation_pool: Option<Numeric>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawChapter {
    pub id: Numeric,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub sort_order: Option<Numeric>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawScene {
    pub id: Numeric,
    #[serde(default)]
    pub chapter_id: Option<Numeric>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<Encoded<RawBlock>>,
    #[serde(default)]
    pub choices: Option<Vec<RawChoice>>,
    #[serde(default)]
    pub is_starting_scene: Option<bool>,
    #[serde(default)]
    pub is_end_scene: Option<bool>,
    #[serde(default)]
    pub is_final: Option<bool>,
    #[serde(default)]
    pub choice_timeout: Option<Numeric>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawBlock {
    pub media_type: Option<String>,
    pub media_url: Option<String>,
    pub duration: Option<Numeric>,
    pub subtitles: Option<Vec<RawSubtitle>>,
    pub bg_audio: Option<String>,
    pub sfx_audio: Option<String>,
    pub voiceover_audio: Option<String>,
    pub conditions: Option<Vec<RawCondition>>,
    pub condition_key: Option<String>,
    pub condition_val: Option<Numeric>,
    pub relation_start: Option<OneOrMany>,
    pub relation_stop: Option<OneOrMany>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSubtitle {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub duration: Option<Numeric>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCondition {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub val: Option<Numeric>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawEffect {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub val: Option<Numeric>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawRoute {
    #[serde(default)]
    pub target: Option<Numeric>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub keys: Option<OneOrMany>,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub val: Option<Numeric>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawChoice {
    #[serde(default)]
    pub id: Option<Numeric>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub target_scene_id: Option<Numeric>,
    #[serde(default)]
    pub requirements: Option<Vec<RawCondition>>,
    #[serde(default)]
    pub effects: Option<Vec<RawEffect>>,
    #[serde(default)]
    pub dynamic_routes: Option<Encoded<RawRoute>>,
    #[serde(default)]
    pub result_content: Option<Encoded<RawBlock>>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_owned())
        .filter(|text| !text.is_empty())
}

fn visibility(value: Option<&str>) -> VisibilityMode {
    match value.map(str::trim) {
        Some("always") => VisibilityMode::Always,
        Some("on_change") => VisibilityMode::OnChange,
        Some("always_and_notify") => VisibilityMode::AlwaysAndNotify,
        _ => VisibilityMode::Hidden,
    }
}

fn distribution(value: Option<&str>) -> DistributionMode {
    match value.map(str::trim) {
        Some("user") => DistributionMode::User,
        _ => DistributionMode::Admin,
    }
}

fn stat_kind(value: Option<&str>) -> StatKind {
    match value.map(str::trim) {
        Some("relation") => StatKind::Relation,
        Some("hidden") => StatKind::Hidden,
        _ => StatKind::Stat,
    }
}

fn required_id(value: &Numeric, what: &str) -> Result<i64, DomainError> {
    value
        .as_i64()
        .ok_or_else(|| DomainError::Validation(format!("{what} has a non-numeric id: {value:?}")))
}

fn conditions(raw: Vec<RawCondition>) -> Vec<Condition> {
    raw.into_iter()
        .filter_map(|condition| {
            let key = non_empty(condition.key)?;
            Some(Condition {
                key,
                operator: condition
                    .operator
                    .as_deref()
                    .map_or(Operator::AtLeast, Operator::parse),
                value: int_or(condition.val.as_ref(), 0),
            })
        })
        .collect()
}

fn block(raw: RawBlock) -> ContentBlock {
    let mut gate = conditions(raw.conditions.unwrap_or_default());
    if gate.is_empty() {
        if let Some(key) = non_empty(raw.condition_key) {
            gate.push(Condition {
                key,
                operator: Operator::AtLeast,
                value: int_or(raw.condition_val.as_ref(), 0),
            });
        }
    }

    let media_type = match raw.media_type.as_deref().map(str::trim) {
        Some("video") => MediaType::Video,
        _ => MediaType::Image,
    };

    ContentBlock {
        media_type,
        media_ref: non_empty(raw.media_url),
        duration_seconds: raw.duration.as_ref().and_then(Numeric::as_f64),
        subtitles: raw
            .subtitles
            .unwrap_or_default()
            .into_iter()
            .map(|subtitle| Subtitle {
                text: subtitle.text.unwrap_or_default(),
                duration_seconds: subtitle
                    .duration
                    .as_ref()
                    .and_then(Numeric::as_f64)
                    .unwrap_or(0.0),
            })
            .collect(),
        audio: AudioLayers {
            background: non_empty(raw.bg_audio),
            emotion: non_empty(raw.sfx_audio),
            voiceover: non_empty(raw.voiceover_audio),
        },
        conditions: gate,
        relation_start: raw.relation_start.map(OneOrMany::into_keys).unwrap_or_default(),
        relation_stop: raw.relation_stop.map(OneOrMany::into_keys).unwrap_or_default(),
    }
}

fn blocks(raw: Option<Encoded<RawBlock>>) -> Vec<ContentBlock> {
    raw.map(Encoded::into_list)
        .unwrap_or_default()
        .into_iter()
        .map(block)
        .collect()
}

fn route(raw: RawRoute) -> Option<DynamicRoute> {
    let target = raw.target.as_ref().and_then(Numeric::as_i64)?;
    let keys = match (raw.keys.map(OneOrMany::into_keys), non_empty(raw.key)) {
        (Some(keys), _) if !keys.is_empty() => keys,
        (_, Some(key)) => vec![key],
        _ => return None,
    };
    Some(DynamicRoute {
        keys,
        operator: raw.operator.as_deref().map_or(Operator::Greater, Operator::parse),
        threshold: int_or(raw.val.as_ref(), 0),
        target: SceneId(target),
    })
}

fn choice(raw: RawChoice) -> Choice {
    Choice {
        id: raw.id.as_ref().and_then(Numeric::as_i64),
        text: raw.text.unwrap_or_default(),
        target_scene_id: raw
            .target_scene_id
            .as_ref()
            .and_then(Numeric::as_i64)
            .map(SceneId),
        requirements: conditions(raw.requirements.unwrap_or_default()),
        effects: raw
            .effects
            .unwrap_or_default()
            .into_iter()
            .filter_map(|effect| {
                Some(Effect {
                    key: non_empty(effect.key)?,
                    delta: int_or(effect.val.as_ref(), 0),
                })
            })
            .collect(),
        dynamic_routes: raw
            .dynamic_routes
            .map(Encoded::into_list)
            .unwrap_or_default()
            .into_iter()
            .filter_map(route)
            .collect(),
        result_content: blocks(raw.result_content),
    }
}

fn scene(raw: RawScene) -> Result<Scene, DomainError> {
    let id = required_id(&raw.id, "scene")?;
    let timeout = int_or(raw.choice_timeout.as_ref(), 0);
    Ok(Scene {
        id: SceneId(id),
        chapter_id: raw
            .chapter_id
            .as_ref()
            .and_then(Numeric::as_i64)
            .map(ChapterId),
        title: raw.title.unwrap_or_default(),
        content: blocks(raw.content),
        choices: raw
            .choices
            .unwrap_or_default()
            .into_iter()
            .map(choice)
            .collect(),
        is_starting_scene: raw.is_starting_scene.unwrap_or(false),
        is_end_scene: raw.is_end_scene.unwrap_or(false),
        is_final: raw.is_final.unwrap_or(false),
        choice_timeout_seconds: u32::try_from(timeout.max(0)).unwrap_or(u32::MAX),
    })
}

fn config(raw: RawGameConfig) -> GameConfig {
    let defaults = GameConfig::default();
    GameConfig {
        stat_visibility: visibility(raw.stat_visibility.as_deref()),
        relation_visibility: visibility(raw.relation_visibility.as_deref()),
        stat_distribution: distribution(raw.stat_distribution.as_deref()),
        relation_distribution: distribution(raw.relation_distribution.as_deref()),
        stat_bounds: Bounds {
            min: int_or(raw.stat_min.as_ref(), defaults.stat_bounds.min),
            max: int_or(raw.stat_max.as_ref(), defaults.stat_bounds.max),
        },
        relation_bounds: Bounds {
            min: int_or(raw.relation_min.as_ref(), defaults.relation_bounds.min),
            max: int_or(raw.relation_max.as_ref(), defaults.relation_bounds.max),
        },
        stat_pool: int_or(raw.stat_pool.as_ref(), defaults.stat_pool),
        relation_pool: int_or(raw.relation_pool.as_ref(), defaults.relation_pool),
    }
}

impl RawStory {
    /// Normalises the authored shape into a `StoryGraph`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if a scene or chapter id is not
    /// numeric.
    pub(crate) fn compile(self, version_hash: String) -> Result<StoryGraph, DomainError> {
        let game = self.game;

        let mut chapters = self
            .chapters
            .unwrap_or_default()
            .into_iter()
            .map(|chapter| {
                Ok(Chapter {
                    id: ChapterId(required_id(&chapter.id, "chapter")?),
                    title: chapter.title.unwrap_or_default(),
                    sort_order: int_or(chapter.sort_order.as_ref(), 0),
                })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;
        chapters.sort_by_key(|chapter| chapter.sort_order);

        let scenes = self
            .scenes
            .unwrap_or_default()
            .into_iter()
            .map(scene)
            .collect::<Result<Vec<_>, _>>()?;

        let stat_definitions = game
            .stat_definitions
            .unwrap_or_default()
            .into_iter()
            .map(|def| StatDefinition {
                label: non_empty(def.label).unwrap_or_else(|| def.key.clone()),
                kind: stat_kind(def.kind.as_deref()),
                key: def.key,
            })
            .collect();

        let initial_stats = game
            .initial_stats
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| (key, value.as_i64().unwrap_or(0)))
            .collect();

        Ok(StoryGraph {
            title: game.title.unwrap_or_default(),
            description: non_empty(game.description),
            chapters,
            scenes,
            stat_definitions,
            initial_stats,
            config: config(game.game_config.unwrap_or_default()),
            theme: non_empty(game.design_theme).unwrap_or_else(|| "default".to_owned()),
            character: CharacterProfile {
                name: non_empty(game.default_char_name)
                    .unwrap_or_else(|| DEFAULT_CHARACTER_NAME.to_owned()),
                image: non_empty(game.default_char_image),
            },
            version_hash,
        })
    }
}
