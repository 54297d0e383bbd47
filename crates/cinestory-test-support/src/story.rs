//! Fluent builders for story graph fixtures.

use cinestory_content::domain::conditions::{Condition, Operator};
use cinestory_content::domain::graph::{
    AudioLayers, Chapter, Choice, ContentBlock, DynamicRoute, Effect, GameConfig, MediaType,
    Scene, StatDefinition, StatKind, StoryGraph, Subtitle,
};
use cinestory_core::ids::{ChapterId, SceneId};

/// Builds a `StoryGraph` for tests.
#[derive(Debug, Default)]
pub struct StoryBuilder {
    graph: StoryGraph,
}

impl StoryBuilder {
    /// Starts an empty story with the given title.
    #[must_use]
    pub fn new(title: &str) -> Self {
        Self {
            graph: StoryGraph {
                title: title.to_owned(),
                theme: "default".to_owned(),
                ..StoryGraph::default()
            },
        }
    }

    /// Adds a chapter. Chapters keep insertion order.
    #[must_use]
    pub fn chapter(mut self, id: i64, title: &str) -> Self {
        let sort_order = i64::try_from(self.graph.chapters.len()).unwrap_or(i64::MAX);
        self.graph.chapters.push(Chapter {
            id: ChapterId(id),
            title: title.to_owned(),
            sort_order,
        });
        self
    }

    /// Adds a scene.
    #[must_use]
    pub fn scene(mut self, scene: SceneBuilder) -> Self {
        self.graph.scenes.push(scene.build());
        self
    }

    /// Defines a stat or relation key.
    #[must_use]
    pub fn stat(mut self, key: &str, label: &str, kind: StatKind) -> Self {
        self.graph.stat_definitions.push(StatDefinition {
            key: key.to_owned(),
            label: label.to_owned(),
            kind,
        });
        self
    }

    /// Sets a starting value.
    #[must_use]
    pub fn initial(mut self, key: &str, value: i64) -> Self {
        self.graph.initial_stats.insert(key.to_owned(), value);
        self
    }

    /// Edits the game configuration in place.
    #[must_use]
    pub fn config(mut self, edit: impl FnOnce(&mut GameConfig)) -> Self {
        edit(&mut self.graph.config);
        self
    }

    /// Finishes the graph.
    #[must_use]
    pub fn build(self) -> StoryGraph {
        self.graph
    }
}

/// Builds one scene.
#[derive(Debug)]
pub struct SceneBuilder {
    scene: Scene,
}

impl SceneBuilder {
    /// Starts a scene with no chapter, content or choices.
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self {
            scene: Scene {
                id: SceneId(id),
                chapter_id: None,
                title: format!("Scene {id}"),
                content: Vec::new(),
                choices: Vec::new(),
                is_starting_scene: false,
                is_end_scene: false,
                is_final: false,
                choice_timeout_seconds: 0,
            },
        }
    }

    /// Places the scene in a chapter.
    #[must_use]
    pub fn in_chapter(mut self, chapter: i64) -> Self {
        self.scene.chapter_id = Some(ChapterId(chapter));
        self
    }

    /// Flags the story's starting scene.
    #[must_use]
    pub fn starting(mut self) -> Self {
        self.scene.is_starting_scene = true;
        self
    }

    /// Flags the last scene of a chapter.
    #[must_use]
    pub fn end_scene(mut self) -> Self {
        self.scene.is_end_scene = true;
        self
    }

    /// Flags the last scene of the story.
    #[must_use]
    pub fn final_scene(mut self) -> Self {
        self.scene.is_final = true;
        self
    }

    /// Sets the decision timeout.
    #[must_use]
    pub fn timeout(mut self, seconds: u32) -> Self {
        self.scene.choice_timeout_seconds = seconds;
        self
    }

    /// Appends a content block.
    #[must_use]
    pub fn block(mut self, block: BlockBuilder) -> Self {
        self.scene.content.push(block.build());
        self
    }

    /// Appends a choice.
    #[must_use]
    pub fn choice(mut self, choice: ChoiceBuilder) -> Self {
        self.scene.choices.push(choice.build());
        self
    }

    fn build(self) -> Scene {
        self.scene
    }
}

/// Builds one content block.
#[derive(Debug)]
pub struct BlockBuilder {
    block: ContentBlock,
}

impl BlockBuilder {
    /// An image block shown for `seconds`.
    #[must_use]
    pub fn image(seconds: f64) -> Self {
        Self {
            block: ContentBlock {
                media_type: MediaType::Image,
                media_ref: Some("still.jpg".to_owned()),
                duration_seconds: Some(seconds),
                ..ContentBlock::default()
            },
        }
    }

    /// A video block with an authored duration that never drives advance.
    #[must_use]
    pub fn video(seconds: f64) -> Self {
        Self {
            block: ContentBlock {
                media_type: MediaType::Video,
                media_ref: Some("clip.mp4".to_owned()),
                duration_seconds: Some(seconds),
                ..ContentBlock::default()
            },
        }
    }

    /// Overrides the media reference.
    #[must_use]
    pub fn media(mut self, media_ref: &str) -> Self {
        self.block.media_ref = Some(media_ref.to_owned());
        self
    }

    /// Appends a subtitle line.
    #[must_use]
    pub fn subtitle(mut self, text: &str, seconds: f64) -> Self {
        self.block.subtitles.push(Subtitle {
            text: text.to_owned(),
            duration_seconds: seconds,
        });
        self
    }

    /// Sets the audio layers.
    #[must_use]
    pub fn audio(mut self, background: Option<&str>, emotion: Option<&str>, voiceover: Option<&str>) -> Self {
        self.block.audio = AudioLayers {
            background: background.map(str::to_owned),
            emotion: emotion.map(str::to_owned),
            voiceover: voiceover.map(str::to_owned),
        };
        self
    }

    /// Adds a visibility condition.
    #[must_use]
    pub fn when(mut self, key: &str, operator: Operator, value: i64) -> Self {
        self.block.conditions.push(Condition {
            key: key.to_owned(),
            operator,
            value,
        });
        self
    }

    /// Engages a relation during the block.
    #[must_use]
    pub fn starts(mut self, relation: &str) -> Self {
        self.block.relation_start.push(relation.to_owned());
        self
    }

    /// Releases a relation during the block.
    #[must_use]
    pub fn stops(mut self, relation: &str) -> Self {
        self.block.relation_stop.push(relation.to_owned());
        self
    }

    /// Finishes the block, for use in result content.
    #[must_use]
    pub fn build(self) -> ContentBlock {
        self.block
    }
}

/// Builds one choice.
#[derive(Debug)]
pub struct ChoiceBuilder {
    choice: Choice,
}

impl ChoiceBuilder {
    /// A choice with the given text and no target.
    #[must_use]
    pub fn new(text: &str) -> Self {
        Self {
            choice: Choice {
                id: None,
                text: text.to_owned(),
                target_scene_id: None,
                requirements: Vec::new(),
                effects: Vec::new(),
                dynamic_routes: Vec::new(),
                result_content: Vec::new(),
            },
        }
    }

    /// Sets the default target.
    #[must_use]
    pub fn to(mut self, scene: i64) -> Self {
        self.choice.target_scene_id = Some(SceneId(scene));
        self
    }

    /// Adds a requirement.
    #[must_use]
    pub fn requires(mut self, key: &str, operator: Operator, value: i64) -> Self {
        self.choice.requirements.push(Condition {
            key: key.to_owned(),
            operator,
            value,
        });
        self
    }

    /// Adds an effect.
    #[must_use]
    pub fn effect(mut self, key: &str, delta: i64) -> Self {
        self.choice.effects.push(Effect {
            key: key.to_owned(),
            delta,
        });
        self
    }

    /// Appends a dynamic route.
    #[must_use]
    pub fn route(mut self, keys: &[&str], operator: Operator, threshold: i64, target: i64) -> Self {
        self.choice.dynamic_routes.push(DynamicRoute {
            keys: keys.iter().map(|key| (*key).to_owned()).collect(),
            operator,
            threshold,
            target: SceneId(target),
        });
        self
    }

    /// Appends a result block played before navigating.
    #[must_use]
    pub fn result(mut self, block: BlockBuilder) -> Self {
        self.choice.result_content.push(block.build());
        self
    }

    /// Finishes the choice.
    #[must_use]
    pub fn build(self) -> Choice {
        self.choice
    }
}
