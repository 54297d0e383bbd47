//! The read-only story graph walked by the playback engine.

use std::collections::BTreeMap;

use cinestory_core::clock::{Millis, seconds_to_millis};
use cinestory_core::ids::{ChapterId, SceneId};
use serde::{Deserialize, Serialize};

use super::conditions::{Condition, Operator, all_hold};

/// Default name used when the story does not provide a character name.
pub const DEFAULT_CHARACTER_NAME: &str = "Wanderer";

/// A complete authored story, loaded once per session and never mutated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoryGraph {
    /// Story title.
    pub title: String,
    /// Optional blurb shown on the story start screen.
    pub description: Option<String>,
    /// Chapters ordered by their authored sort order.
    pub chapters: Vec<Chapter>,
    /// All scenes of the story.
    pub scenes: Vec<Scene>,
    /// Stat and relation definitions.
    pub stat_definitions: Vec<StatDefinition>,
    /// Starting values for stats and relations.
    pub initial_stats: BTreeMap<String, i64>,
    /// Visibility, distribution and bounds configuration.
    pub config: GameConfig,
    /// Presentation theme tag.
    pub theme: String,
    /// The player character shown alongside the story.
    pub character: CharacterProfile,
    /// SHA-256 of the authored source this graph was ingested from.
    pub version_hash: String,
}

impl StoryGraph {
    /// Looks up a scene by id.
    #[must_use]
    pub fn scene(&self, id: SceneId) -> Option<&Scene> {
        self.scenes.iter().find(|scene| scene.id == id)
    }

    /// Looks up a chapter by id.
    #[must_use]
    pub fn chapter(&self, id: ChapterId) -> Option<&Chapter> {
        self.chapters.iter().find(|chapter| chapter.id == id)
    }

    /// The scene flagged as the story's starting scene.
    #[must_use]
    pub fn starting_scene(&self) -> Option<&Scene> {
        self.scenes.iter().find(|scene| scene.is_starting_scene)
    }

    /// The definition for a stat key, if one exists.
    #[must_use]
    pub fn stat_definition(&self, key: &str) -> Option<&StatDefinition> {
        self.stat_definitions.iter().find(|def| def.key == key)
    }

    /// The kind of a stat key. Undefined keys behave as plain stats.
    #[must_use]
    pub fn stat_kind(&self, key: &str) -> StatKind {
        self.stat_definition(key).map_or(StatKind::Stat, |def| def.kind)
    }

    /// Display label for a stat key, falling back to the key itself.
    #[must_use]
    pub fn label_for<'a>(&'a self, key: &'a str) -> &'a str {
        self.stat_definition(key).map_or(key, |def| def.label.as_str())
    }

    /// Value bounds for a stat key: relation bounds for relations, stat
    /// bounds for everything else.
    #[must_use]
    pub fn bounds_for(&self, key: &str) -> Bounds {
        match self.stat_kind(key) {
            StatKind::Relation => self.config.relation_bounds,
            StatKind::Stat | StatKind::Hidden => self.config.stat_bounds,
        }
    }

    /// Visibility mode that governs a stat key.
    #[must_use]
    pub fn visibility_for(&self, key: &str) -> VisibilityMode {
        match self.stat_kind(key) {
            StatKind::Relation => self.config.relation_visibility,
            StatKind::Stat => self.config.stat_visibility,
            StatKind::Hidden => VisibilityMode::Hidden,
        }
    }

    /// Whether the player allocates stats or relations before the story
    /// starts.
    #[must_use]
    pub fn requires_character_setup(&self) -> bool {
        self.config.stat_distribution == DistributionMode::User
            || self.config.relation_distribution == DistributionMode::User
    }
}

/// A chapter grouping scenes under a title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    /// Chapter identifier.
    pub id: ChapterId,
    /// Title shown on chapter screens.
    pub title: String,
    /// Authored ordering key.
    pub sort_order: i64,
}

/// One node of the story graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Scene identifier.
    pub id: SceneId,
    /// Owning chapter, if any.
    pub chapter_id: Option<ChapterId>,
    /// Authoring title.
    pub title: String,
    /// Timed content played when the scene is entered.
    pub content: Vec<ContentBlock>,
    /// Choices offered once the content is exhausted.
    pub choices: Vec<Choice>,
    /// Exactly one scene per graph should carry this flag.
    pub is_starting_scene: bool,
    /// Leaving this scene ends the chapter.
    pub is_end_scene: bool,
    /// Reaching the end of this scene ends the story.
    pub is_final: bool,
    /// Seconds before an unanswered choice is auto-resolved; zero is
    /// unlimited.
    pub choice_timeout_seconds: u32,
}

/// Kind of visual media a block shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    /// A still image shown for the block's duration.
    #[default]
    Image,
    /// A video that advances only when the media output reports its end.
    Video,
}

/// A subtitle line with its own display duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtitle {
    /// Text to display.
    pub text: String,
    /// Seconds the line stays visible.
    pub duration_seconds: f64,
}

/// Audio layer references of a block. Each is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioLayers {
    /// Looping background bed.
    pub background: Option<String>,
    /// Looping emotion layer.
    pub emotion: Option<String>,
    /// Narration; absent means the previous narration keeps playing.
    pub voiceover: Option<String>,
}

/// One timed unit of media, audio, subtitles and relation triggers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    /// Image or video.
    pub media_type: MediaType,
    /// Asset reference for the visual.
    pub media_ref: Option<String>,
    /// Authored duration in seconds. Ignored for advancing video blocks.
    pub duration_seconds: Option<f64>,
    /// Subtitles shown in sequence.
    pub subtitles: Vec<Subtitle>,
    /// Audio layers.
    pub audio: AudioLayers,
    /// Visibility gate evaluated once when the block list is assembled.
    pub conditions: Vec<Condition>,
    /// Relation keys engaged by this block.
    pub relation_start: Vec<String>,
    /// Relation keys released by this block.
    pub relation_stop: Vec<String>,
}

impl ContentBlock {
    /// Effective duration: the authored duration when positive, otherwise
    /// `default`.
    #[must_use]
    pub fn duration_millis(&self, default: Millis) -> Millis {
        match self.duration_seconds.map(seconds_to_millis) {
            Some(millis) if millis > 0 => millis,
            _ => default,
        }
    }

    /// Whether the block's conditions hold against the given values.
    pub fn is_visible(&self, lookup: impl Fn(&str) -> i64) -> bool {
        all_hold(&self.conditions, lookup)
    }

    /// Whether the block carries any relation trigger.
    #[must_use]
    pub fn has_relation_triggers(&self) -> bool {
        !self.relation_start.is_empty() || !self.relation_stop.is_empty()
    }
}

/// A stat delta applied when a choice is committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effect {
    /// Stat or relation key.
    pub key: String,
    /// Signed change.
    pub delta: i64,
}

/// Conditional override of a choice's default target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicRoute {
    /// Keys whose values are summed.
    pub keys: Vec<String>,
    /// Comparison applied to the sum.
    pub operator: Operator,
    /// Right-hand side of the comparison.
    pub threshold: i64,
    /// Scene taken when the comparison holds.
    pub target: SceneId,
}

impl DynamicRoute {
    /// Evaluates the route against current values.
    pub fn matches(&self, lookup: impl Fn(&str) -> i64) -> bool {
        let total: i64 = self.keys.iter().map(|key| lookup(key)).sum();
        self.operator.compare(total, self.threshold)
    }
}

/// A player-facing option of a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// Authored identifier, when present.
    pub id: Option<i64>,
    /// Button text.
    pub text: String,
    /// Default navigation target.
    pub target_scene_id: Option<SceneId>,
    /// Visibility gate (logical AND).
    pub requirements: Vec<Condition>,
    /// Stat deltas applied on commit.
    pub effects: Vec<Effect>,
    /// Ordered overrides; the first that holds wins.
    pub dynamic_routes: Vec<DynamicRoute>,
    /// Intermediate timeline played before navigating.
    pub result_content: Vec<ContentBlock>,
}

impl Choice {
    /// Whether the requirements hold against the given values.
    pub fn is_available(&self, lookup: impl Fn(&str) -> i64) -> bool {
        all_hold(&self.requirements, lookup)
    }
}

/// Whether a tracked value is a plain stat, a relation or hidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    /// Plain stat.
    #[default]
    Stat,
    /// Relation with a start/stop lifecycle.
    Relation,
    /// Tracked but never shown or announced.
    Hidden,
}

/// A stat or relation definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatDefinition {
    /// Key referenced by conditions and effects.
    pub key: String,
    /// Display label.
    pub label: String,
    /// Kind of value.
    pub kind: StatKind,
}

/// How stat or relation changes are surfaced to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityMode {
    /// Never shown.
    #[default]
    Hidden,
    /// Persistent display, no notices.
    Always,
    /// Queued toast with the percentage-of-range change.
    OnChange,
    /// Persistent display with an inline, self-expiring delta.
    AlwaysAndNotify,
}

impl VisibilityMode {
    /// Whether the persistent display is shown.
    #[must_use]
    pub fn shows_display(self) -> bool {
        matches!(self, Self::Always | Self::AlwaysAndNotify)
    }

    /// Whether lifecycle notices are raised.
    #[must_use]
    pub fn announces(self) -> bool {
        matches!(self, Self::OnChange | Self::AlwaysAndNotify)
    }
}

/// Who assigns starting values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionMode {
    /// Values come from the story's initial stats.
    #[default]
    Admin,
    /// The player distributes a point pool before the story starts.
    User,
}

/// Inclusive value bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    /// Lower bound.
    pub min: i64,
    /// Upper bound.
    pub max: i64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self { min: 0, max: 100 }
    }
}

impl Bounds {
    /// Clamps `value` into the bounds.
    #[must_use]
    pub fn clamp(self, value: i64) -> i64 {
        value.max(self.min).min(self.max)
    }

    /// Width of the range.
    #[must_use]
    pub fn span(self) -> i64 {
        self.max - self.min
    }

    /// Position of `value` within the range as a percentage.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent_of(self, value: i64) -> f64 {
        let span = self.span();
        if span > 0 {
            ((self.clamp(value) - self.min) as f64 / span as f64) * 100.0
        } else {
            0.0
        }
    }

    /// A delta expressed as a percentage of the range.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent_change(self, delta: i64) -> f64 {
        let span = self.span();
        if span > 0 {
            (delta as f64 / span as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// Story-level presentation and allocation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Visibility of plain stats.
    pub stat_visibility: VisibilityMode,
    /// Visibility of relations.
    pub relation_visibility: VisibilityMode,
    /// Who assigns starting stats.
    pub stat_distribution: DistributionMode,
    /// Who assigns starting relations.
    pub relation_distribution: DistributionMode,
    /// Bounds for plain and hidden stats.
    pub stat_bounds: Bounds,
    /// Bounds for relations.
    pub relation_bounds: Bounds,
    /// Points the player distributes over stats.
    pub stat_pool: i64,
    /// Points the player distributes over relations.
    pub relation_pool: i64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            stat_visibility: VisibilityMode::Hidden,
            relation_visibility: VisibilityMode::Hidden,
            stat_distribution: DistributionMode::Admin,
            relation_distribution: DistributionMode::Admin,
            stat_bounds: Bounds::default(),
            relation_bounds: Bounds::default(),
            stat_pool: 10,
            relation_pool: 10,
        }
    }
}

/// The player character shown alongside the story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterProfile {
    /// Character name.
    pub name: String,
    /// Portrait asset reference.
    pub image: Option<String>,
}

impl Default for CharacterProfile {
    fn default() -> Self {
        Self {
            name: DEFAULT_CHARACTER_NAME.to_owned(),
            image: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(id: i64, chapter: Option<i64>, starting: bool) -> Scene {
        Scene {
            id: SceneId(id),
            chapter_id: chapter.map(ChapterId),
            title: format!("scene {id}"),
            content: Vec::new(),
            choices: Vec::new(),
            is_starting_scene: starting,
            is_end_scene: false,
            is_final: false,
            choice_timeout_seconds: 0,
        }
    }

    fn graph() -> StoryGraph {
        StoryGraph {
            scenes: vec![
                scene(1, Some(1), true),
                scene(2, Some(2), false),
                scene(3, Some(2), true),
            ],
            stat_definitions: vec![
                StatDefinition {
                    key: "trust".into(),
                    label: "Trust".into(),
                    kind: StatKind::Relation,
                },
                StatDefinition {
                    key: "karma".into(),
                    label: "Karma".into(),
                    kind: StatKind::Hidden,
                },
            ],
            config: GameConfig {
                relation_bounds: Bounds { min: -50, max: 50 },
                stat_visibility: VisibilityMode::OnChange,
                ..GameConfig::default()
            },
            ..StoryGraph::default()
        }
    }

    #[test]
    fn test_bounds_and_visibility_follow_stat_kind() {
        let graph = graph();

        assert_eq!(graph.bounds_for("trust"), Bounds { min: -50, max: 50 });
        assert_eq!(graph.bounds_for("gold"), Bounds::default());
        assert_eq!(graph.visibility_for("gold"), VisibilityMode::OnChange);
        assert_eq!(graph.visibility_for("karma"), VisibilityMode::Hidden);
        assert_eq!(graph.label_for("trust"), "Trust");
        assert_eq!(graph.label_for("gold"), "gold");
    }

    #[test]
    fn test_block_duration_falls_back_to_default() {
        let mut block = ContentBlock::default();
        assert_eq!(block.duration_millis(5_000), 5_000);

        block.duration_seconds = Some(0.0);
        assert_eq!(block.duration_millis(5_000), 5_000);

        block.duration_seconds = Some(2.5);
        assert_eq!(block.duration_millis(5_000), 2_500);
    }

    #[test]
    fn test_dynamic_route_sums_keys() {
        let route = DynamicRoute {
            keys: vec!["a".into(), "b".into()],
            operator: Operator::Greater,
            threshold: 10,
            target: SceneId(5),
        };

        assert!(route.matches(|key| if key == "a" { 6 } else { 5 }));
        assert!(!route.matches(|_| 5));
    }

    #[test]
    fn test_bounds_percentages() {
        let bounds = Bounds { min: 0, max: 200 };
        assert!((bounds.percent_change(20) - 10.0).abs() < f64::EPSILON);
        assert!((bounds.percent_of(50) - 25.0).abs() < f64::EPSILON);
        assert_eq!(bounds.clamp(250), 200);
        assert!(Bounds { min: 5, max: 5 }.percent_change(3).abs() < f64::EPSILON);
    }
}
