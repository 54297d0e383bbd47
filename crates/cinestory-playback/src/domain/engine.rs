//! The narrative state machine.
//!
//! `NarrativeEngine` walks a story graph for one session. It is driven
//! entirely from outside: player intents arrive through [`NarrativeEngine::handle`]
//! and time moves only through [`NarrativeEngine::advance_to`], which fires
//! due timers in order. Between calls the engine is quiescent, which keeps
//! it deterministic under test and lets an async runtime own the real clock.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use cinestory_content::domain::graph::{ContentBlock, DistributionMode, StatKind, StoryGraph};
use cinestory_core::clock::{Millis, to_millis};
use cinestory_core::error::DomainError;
use cinestory_core::ids::{ChapterId, SceneId};
use cinestory_core::rng::pick_index;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use super::choice_resolver::{self, EffectNotice};
use super::commands::PlayerIntent;
use super::config::PlaybackConfig;
use super::decision_timer::{DecisionTimer, TickOutcome};
use super::events::{
    BlockEntered, ChoiceCommitted, ChoicesPresented, EffectApplied, GameEnded, NoticeRaised,
    PauseToggled, PhaseChanged, PlaybackEvent, PlaybackEventKind, RelationToggled, ResultStarted,
    RouteResolved, SceneStarted, SessionLoaded, SubtitleChanged,
};
use super::notifications::{NoticeSender, NotificationQueue};
use super::player_state::PlayerState;
use super::session::{SessionContext, SessionPorts, TimerKind};
use super::snapshot::{Band, BlockView, ChoiceView, RenderSnapshot, SetupView, StatView};
use super::timeline::{Timeline, TimelineStep};

const TIME_IS_UP: &str = "Time is up!";
const NO_OPTION: &str = "No option available.";
const TARGET_NOT_FOUND: &str = "Target scene not found.";
const CHAPTER_COMPLETE: &str = "Chapter complete";

/// Coarse engine phase, as shown to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Waiting for the story graph.
    Loading,
    /// The player distributes starting points.
    CharacterSetup,
    /// Title screen.
    StoryStart,
    /// Chapter title card before its first scene.
    ChapterStart,
    /// A scene's content or choice menu.
    PlayingScene,
    /// A committed choice's result timeline.
    PlayingResult,
    /// End-of-chapter card.
    ChapterTransition,
    /// The story is over.
    GameEnd,
    /// The session cannot continue.
    Error,
}

impl Phase {
    /// Whether no further intents can change the session.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::GameEnd | Self::Error)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Loading => "loading",
            Self::CharacterSetup => "character_setup",
            Self::StoryStart => "story_start",
            Self::ChapterStart => "chapter_start",
            Self::PlayingScene => "playing_scene",
            Self::PlayingResult => "playing_result",
            Self::ChapterTransition => "chapter_transition",
            Self::GameEnd => "game_end",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// What the active content list belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowMode {
    /// The scene's own content, followed by its choice menu.
    Scene,
    /// A committed choice's result content, followed by navigation.
    Result {
        /// Where to go once the result content is exhausted.
        target: Option<SceneId>,
    },
}

#[derive(Debug)]
struct ActiveFlow {
    scene_id: SceneId,
    mode: FlowMode,
    timeline: Timeline,
    choices_visible: bool,
    decision: Option<DecisionTimer>,
}

#[derive(Debug)]
enum EngineState {
    Loading,
    CharacterSetup,
    StoryStart,
    ChapterStart { title: String, scene_id: SceneId },
    Playing(ActiveFlow),
    ChapterTransition { title: String, target: SceneId },
    GameEnd { scene_id: Option<SceneId> },
    Error(String),
}

impl EngineState {
    fn phase(&self) -> Phase {
        match self {
            Self::Loading => Phase::Loading,
            Self::CharacterSetup => Phase::CharacterSetup,
            Self::StoryStart => Phase::StoryStart,
            Self::ChapterStart { .. } => Phase::ChapterStart,
            Self::Playing(flow) => match flow.mode {
                FlowMode::Scene => Phase::PlayingScene,
                FlowMode::Result { .. } => Phase::PlayingResult,
            },
            Self::ChapterTransition { .. } => Phase::ChapterTransition,
            Self::GameEnd { .. } => Phase::GameEnd,
            Self::Error(_) => Phase::Error,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct InlineDelta {
    percent_change: f64,
    expires_at: Millis,
}

/// Top-level state machine of a playback session.
#[derive(Debug)]
pub struct NarrativeEngine {
    graph: Arc<StoryGraph>,
    config: PlaybackConfig,
    ctx: SessionContext,
    state: EngineState,
    player: PlayerState,
    notices: NotificationQueue,
    notice_sender: NoticeSender,
    inline_deltas: BTreeMap<String, InlineDelta>,
    current_chapter: Option<ChapterId>,
    deferred_media_end: Option<u64>,
}

impl NarrativeEngine {
    /// Creates a session waiting for its story graph.
    #[must_use]
    pub fn new(session_id: Uuid, config: PlaybackConfig, ports: SessionPorts) -> Self {
        let notices = NotificationQueue::new(config.notice_visible_ms, config.notice_gap_ms);
        let notice_sender = notices.sender();
        Self {
            graph: Arc::new(StoryGraph::default()),
            config,
            ctx: SessionContext::new(session_id, ports),
            state: EngineState::Loading,
            player: PlayerState::default(),
            notices,
            notice_sender,
            inline_deltas: BTreeMap::new(),
            current_chapter: None,
            deferred_media_end: None,
        }
    }

    /// Accepts the outcome of fetching the story graph.
    ///
    /// A failed fetch or a graph without a starting scene ends the session in
    /// the terminal error phase.
    pub fn load(&mut self, loaded: Result<StoryGraph, DomainError>) {
        if !matches!(self.state, EngineState::Loading) {
            warn!(phase = %self.phase(), "story graph delivered twice; ignoring");
            return;
        }
        let graph = match loaded {
            Ok(graph) => graph,
            Err(e) => {
                self.fail(DomainError::GraphIntegrity(format!(
                    "story could not be loaded: {e}"
                )));
                return;
            }
        };
        if graph.starting_scene().is_none() {
            self.graph = Arc::new(graph);
            self.fail(DomainError::GraphIntegrity(
                "story has no starting scene".to_owned(),
            ));
            return;
        }

        info!(
            session_id = %self.ctx.session_id,
            title = %graph.title,
            version_hash = %graph.version_hash,
            scenes = graph.scenes.len(),
            "story loaded"
        );
        self.player = PlayerState::from_story(&graph);
        self.ctx.record(PlaybackEventKind::SessionLoaded(SessionLoaded {
            title: graph.title.clone(),
            version_hash: graph.version_hash.clone(),
            scene_count: graph.scenes.len(),
        }));
        let next = if graph.requires_character_setup() {
            EngineState::CharacterSetup
        } else {
            EngineState::StoryStart
        };
        self.graph = Arc::new(graph);
        self.transition(next);
    }

    /// Applies a player intent, then fires anything it made due.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the intent is invalid in the
    /// current phase or while paused.
    pub fn handle(&mut self, intent: PlayerIntent) -> Result<(), DomainError> {
        let command = intent.as_command();
        self.ctx.correlation_id = command.correlation_id();
        debug!(command = command.command_type(), phase = %self.phase(), "handling intent");

        let result = match intent {
            PlayerIntent::SelectChoice(c) => self.select_choice(c.choice_index),
            PlayerIntent::TogglePause(_) => self.toggle_pause(),
            PlayerIntent::Continue(_) => self.continue_story(),
            PlayerIntent::CompleteCharacterSetup(c) => self.complete_character_setup(&c.allocation),
            PlayerIntent::MediaEnded(c) => self.media_ended(c.cue),
        };
        self.settle();
        result
    }

    /// Moves session time forward by `by`.
    pub fn advance(&mut self, by: Duration) {
        let target = self.ctx.timeline_clock.wall().saturating_add(to_millis(by));
        self.advance_to(target);
    }

    /// Moves session time forward to wall position `target`, firing every
    /// timer that comes due on the way in order.
    pub fn advance_to(&mut self, target: Millis) {
        self.settle();
        while let Some(deadline) = self.next_deadline() {
            if deadline > target || deadline <= self.ctx.timeline_clock.wall() {
                break;
            }
            self.ctx.timeline_clock.advance_to(deadline);
            self.settle();
        }
        self.ctx.timeline_clock.advance_to(target);
        self.settle();
    }

    /// Wall position at which the engine next has work to do.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Millis> {
        let wall = self.ctx.timeline_clock.wall();
        [
            self.ctx.next_timer_deadline(),
            self.notices.next_deadline(wall),
            self.inline_deltas.values().map(|d| d.expires_at).min(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Stops all audio and invalidates every pending timer.
    pub fn shutdown(&mut self) {
        let epoch = self.ctx.bump_epoch();
        self.ctx.timers.purge_before(epoch);
        self.ctx.mixer.stop_all();
        self.ctx.timeline_clock.set_paused(false);
        info!(session_id = %self.ctx.session_id, phase = %self.phase(), "session torn down");
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// Session identifier.
    #[must_use]
    pub fn session_id(&self) -> Uuid {
        self.ctx.session_id
    }

    /// Current wall position of session time.
    #[must_use]
    pub fn now(&self) -> Millis {
        self.ctx.timeline_clock.wall()
    }

    /// Current cancellation epoch.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.ctx.epoch
    }

    /// Whether playback is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.ctx.timeline_clock.is_paused()
    }

    /// The player's values and relations.
    #[must_use]
    pub fn player_state(&self) -> &PlayerState {
        &self.player
    }

    /// The loaded story graph.
    #[must_use]
    pub fn graph(&self) -> &StoryGraph {
        &self.graph
    }

    /// A handle for pushing notices from outside the engine.
    #[must_use]
    pub fn notice_sender(&self) -> NoticeSender {
        self.notice_sender.clone()
    }

    /// Takes the events recorded since the last drain.
    pub fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        self.ctx.drain_events()
    }

    // --- intents ---

    fn select_choice(&mut self, index: usize) -> Result<(), DomainError> {
        if self.is_paused() {
            return Err(DomainError::Validation(
                "cannot select a choice while paused".to_owned(),
            ));
        }
        let EngineState::Playing(flow) = &self.state else {
            return Err(DomainError::Validation(format!(
                "cannot select a choice during {}",
                self.phase()
            )));
        };
        if flow.mode != FlowMode::Scene || !flow.choices_visible {
            return Err(DomainError::Validation(
                "no choices are being offered".to_owned(),
            ));
        }
        let graph = Arc::clone(&self.graph);
        let choice = graph
            .scene(flow.scene_id)
            .and_then(|scene| scene.choices.get(index))
            .ok_or_else(|| DomainError::Validation(format!("scene has no choice {index}")))?;
        if !choice.is_available(|key| self.player.value(key)) {
            return Err(DomainError::Validation(format!(
                "requirements of choice {index} are not met"
            )));
        }
        self.commit_choice(index, false);
        Ok(())
    }

    fn toggle_pause(&mut self) -> Result<(), DomainError> {
        if !matches!(self.state, EngineState::Playing(_)) {
            return Err(DomainError::Validation(format!(
                "cannot pause during {}",
                self.phase()
            )));
        }
        let paused = !self.is_paused();
        self.ctx.timeline_clock.set_paused(paused);
        if paused {
            self.ctx.mixer.pause_voiceover();
        } else {
            self.ctx.mixer.resume_voiceover();
        }
        info!(paused, "playback pause toggled");
        self.ctx
            .record(PlaybackEventKind::PauseToggled(PauseToggled { paused }));

        if !paused {
            if let Some(cue) = self.deferred_media_end.take() {
                self.media_ended(cue)?;
            }
        }
        Ok(())
    }

    fn continue_story(&mut self) -> Result<(), DomainError> {
        match &self.state {
            EngineState::StoryStart => {
                let graph = Arc::clone(&self.graph);
                match graph.starting_scene() {
                    Some(start) => self.enter_scene(start.id),
                    None => self.fail(DomainError::GraphIntegrity(
                        "story has no starting scene".to_owned(),
                    )),
                }
                Ok(())
            }
            EngineState::ChapterStart { scene_id, .. } => {
                let scene_id = *scene_id;
                self.play_scene(scene_id);
                Ok(())
            }
            EngineState::ChapterTransition { target, .. } => {
                let target = *target;
                if let Some(chapter) = self.graph.scene(target).and_then(|s| s.chapter_id) {
                    self.current_chapter = Some(chapter);
                }
                self.play_scene(target);
                Ok(())
            }
            _ => Err(DomainError::Validation(format!(
                "nothing to continue during {}",
                self.phase()
            ))),
        }
    }

    fn complete_character_setup(
        &mut self,
        allocation: &BTreeMap<String, i64>,
    ) -> Result<(), DomainError> {
        if !matches!(self.state, EngineState::CharacterSetup) {
            return Err(DomainError::Validation(format!(
                "character setup is not open during {}",
                self.phase()
            )));
        }
        self.player = PlayerState::from_allocation(&self.graph, allocation)?;
        info!(keys = allocation.len(), "character setup completed");
        self.transition(EngineState::StoryStart);
        Ok(())
    }

    fn media_ended(&mut self, cue: u64) -> Result<(), DomainError> {
        let EngineState::Playing(flow) = &self.state else {
            return Err(DomainError::Validation(format!(
                "no media is playing during {}",
                self.phase()
            )));
        };
        if cue != flow.timeline.cue() || !flow.timeline.awaits_media_end() {
            debug!(cue, current = flow.timeline.cue(), "ignoring stale media-ended signal");
            return Ok(());
        }
        if self.is_paused() {
            debug!(cue, "deferring media-ended signal until resume");
            self.deferred_media_end = Some(cue);
            return Ok(());
        }
        self.step_timeline(false);
        Ok(())
    }

    // --- flow control ---

    fn transition(&mut self, next: EngineState) {
        let from = self.state.phase();
        self.state = next;
        let to = self.state.phase();
        if from != to {
            info!(%from, %to, "phase changed");
            self.ctx
                .record(PlaybackEventKind::PhaseChanged(PhaseChanged { from, to }));
        }
    }

    fn fail(&mut self, err: DomainError) {
        error!(error = %err, "session failed");
        self.ctx.bump_epoch();
        self.ctx.mixer.stop_all();
        self.ctx.timeline_clock.set_paused(false);
        self.transition(EngineState::Error(err.to_string()));
    }

    fn surface(&mut self, err: &DomainError) {
        warn!(error = %err, "non-fatal playback error");
        let text = match err {
            DomainError::MissingTarget(_) => TARGET_NOT_FOUND.to_owned(),
            DomainError::NoEligibleChoice(_) => NO_OPTION.to_owned(),
            other => other.to_string(),
        };
        self.raise_notice(text);
    }

    fn raise_notice(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.notice_sender.push(text.clone());
        self.ctx
            .record(PlaybackEventKind::NoticeRaised(NoticeRaised { text }));
    }

    /// Shows the chapter card first when the scene opens a chapter the
    /// player is not in yet.
    fn enter_scene(&mut self, scene_id: SceneId) {
        let graph = Arc::clone(&self.graph);
        let Some(scene) = graph.scene(scene_id) else {
            self.surface(&DomainError::MissingTarget(scene_id));
            return;
        };
        let new_chapter = scene
            .chapter_id
            .filter(|chapter| Some(*chapter) != self.current_chapter)
            .and_then(|chapter| graph.chapter(chapter));
        if let Some(chapter) = new_chapter {
            self.current_chapter = Some(chapter.id);
            self.ctx.bump_epoch();
            self.transition(EngineState::ChapterStart {
                title: chapter.title.clone(),
                scene_id,
            });
            return;
        }
        self.play_scene(scene_id);
    }

    fn play_scene(&mut self, scene_id: SceneId) {
        let graph = Arc::clone(&self.graph);
        let Some(scene) = graph.scene(scene_id) else {
            self.surface(&DomainError::MissingTarget(scene_id));
            return;
        };
        let blocks = choice_resolver::visible_blocks(&scene.content, &self.player);
        info!(%scene_id, blocks = blocks.len(), "scene started");
        self.start_flow(scene_id, FlowMode::Scene, blocks);
    }

    fn start_flow(&mut self, scene_id: SceneId, mode: FlowMode, blocks: Vec<ContentBlock>) {
        self.ctx.bump_epoch();
        self.deferred_media_end = None;
        let block_count = blocks.len();
        self.transition(EngineState::Playing(ActiveFlow {
            scene_id,
            mode,
            timeline: Timeline::new(blocks),
            choices_visible: false,
            decision: None,
        }));
        let started = match mode {
            FlowMode::Scene => PlaybackEventKind::SceneStarted(SceneStarted {
                scene_id,
                chapter_id: self.graph.scene(scene_id).and_then(|s| s.chapter_id),
                block_count,
            }),
            FlowMode::Result { target } => PlaybackEventKind::ResultStarted(ResultStarted {
                scene_id,
                target,
                block_count,
            }),
        };
        self.ctx.record(started);
        self.step_timeline(true);
    }

    fn step_timeline(&mut self, first: bool) {
        let EngineState::Playing(flow) = &mut self.state else {
            return;
        };
        let step = if first {
            flow.timeline.start(&mut self.ctx, &self.config)
        } else {
            flow.timeline.advance(&mut self.ctx, &self.config)
        };
        match step {
            TimelineStep::Entered => {
                if let (Some(block), Some(index)) = (flow.timeline.current(), flow.timeline.index()) {
                    let entered = BlockEntered {
                        cue: flow.timeline.cue(),
                        index,
                        media_type: block.media_type,
                        media_ref: block.media_ref.clone(),
                    };
                    self.ctx.record(PlaybackEventKind::BlockEntered(entered));
                }
            }
            TimelineStep::Exhausted => self.on_exhausted(),
        }
    }

    fn on_exhausted(&mut self) {
        let EngineState::Playing(flow) = &self.state else {
            return;
        };
        let scene_id = flow.scene_id;
        match flow.mode {
            FlowMode::Result { target } => {
                debug!(%scene_id, "result content exhausted");
                self.navigate(scene_id, target);
            }
            FlowMode::Scene => {
                let is_final = self.graph.scene(scene_id).is_some_and(|s| s.is_final);
                if is_final {
                    self.end_game(Some(scene_id));
                } else {
                    self.present_choices(true);
                }
            }
        }
    }

    fn present_choices(&mut self, with_timer: bool) {
        let graph = Arc::clone(&self.graph);
        let EngineState::Playing(flow) = &mut self.state else {
            return;
        };
        if flow.mode != FlowMode::Scene {
            return;
        }
        let Some(scene) = graph.scene(flow.scene_id) else {
            return;
        };
        let player = &self.player;
        let available: Vec<usize> = scene
            .choices
            .iter()
            .enumerate()
            .filter(|(_, choice)| choice.is_available(|key| player.value(key)))
            .map(|(index, _)| index)
            .collect();

        flow.choices_visible = true;
        let timeout_seconds = if with_timer {
            scene.choice_timeout_seconds
        } else {
            0
        };
        if timeout_seconds > 0 {
            flow.decision = Some(DecisionTimer::new(timeout_seconds));
            self.ctx
                .schedule_in(self.config.decision_tick_ms, TimerKind::DecisionTick);
        }
        debug!(scene_id = %scene.id, available = available.len(), timeout_seconds, "choices presented");
        self.ctx
            .record(PlaybackEventKind::ChoicesPresented(ChoicesPresented {
                scene_id: scene.id,
                available,
                timeout_seconds,
            }));
    }

    fn commit_choice(&mut self, index: usize, auto: bool) {
        let graph = Arc::clone(&self.graph);
        let EngineState::Playing(flow) = &mut self.state else {
            return;
        };
        let scene_id = flow.scene_id;
        let Some(choice) = graph.scene(scene_id).and_then(|s| s.choices.get(index)) else {
            return;
        };
        flow.choices_visible = false;
        flow.decision = None;

        self.ctx.bump_epoch();
        self.ctx.mixer.stop_all();
        info!(%scene_id, choice_index = index, auto, "choice committed");
        self.ctx
            .record(PlaybackEventKind::ChoiceCommitted(ChoiceCommitted {
                scene_id,
                choice_index: index,
                auto,
            }));

        let resolution = choice_resolver::resolve(&graph, &mut self.player, choice);
        let wall = self.ctx.timeline_clock.wall();
        for effect in resolution.effects {
            self.ctx
                .record(PlaybackEventKind::EffectApplied(EffectApplied {
                    key: effect.key.clone(),
                    delta: effect.delta,
                    before: effect.before,
                    after: effect.after,
                }));
            match effect.notice {
                EffectNotice::Toast(text) => self.raise_notice(text),
                EffectNotice::Inline { percent_change } => {
                    self.inline_deltas.insert(
                        effect.key,
                        InlineDelta {
                            percent_change,
                            expires_at: wall.saturating_add(self.config.inline_delta_ms),
                        },
                    );
                }
                EffectNotice::Silent => {}
            }
        }
        self.ctx
            .record(PlaybackEventKind::RouteResolved(RouteResolved {
                target: resolution.target,
                route_index: resolution.route_index,
            }));

        if resolution.result_content.is_empty() {
            self.navigate(scene_id, resolution.target);
        } else {
            self.start_flow(
                scene_id,
                FlowMode::Result {
                    target: resolution.target,
                },
                resolution.result_content,
            );
        }
    }

    /// Resolves where the story goes after leaving `from`.
    fn navigate(&mut self, from: SceneId, target: Option<SceneId>) {
        let graph = Arc::clone(&self.graph);
        let Some(current) = graph.scene(from) else {
            self.fail(DomainError::GraphIntegrity(format!(
                "current scene {from} vanished from the graph"
            )));
            return;
        };
        if current.is_final {
            self.end_game(Some(from));
            return;
        }
        let Some(target) = target else {
            self.surface(&DomainError::Validation(format!(
                "choice in {from} has no target scene"
            )));
            self.present_choices(false);
            return;
        };
        let Some(next) = graph.scene(target) else {
            self.surface(&DomainError::MissingTarget(target));
            self.present_choices(false);
            return;
        };
        if current.is_end_scene {
            let title = next
                .chapter_id
                .and_then(|chapter| graph.chapter(chapter))
                .map_or_else(|| CHAPTER_COMPLETE.to_owned(), |chapter| chapter.title.clone());
            self.ctx.bump_epoch();
            self.transition(EngineState::ChapterTransition { title, target });
            return;
        }
        if next.is_final {
            self.end_game(Some(target));
            return;
        }
        self.enter_scene(target);
    }

    fn end_game(&mut self, scene_id: Option<SceneId>) {
        self.ctx.bump_epoch();
        self.ctx.mixer.stop_all();
        info!(scene_id = ?scene_id, "story finished");
        self.transition(EngineState::GameEnd { scene_id });
        self.ctx
            .record(PlaybackEventKind::GameEnded(GameEnded { scene_id }));
    }

    // --- timers ---

    fn settle(&mut self) {
        while !self.ctx.timeline_clock.is_paused() {
            let now = self.ctx.timeline_clock.play();
            let Some(timer) = self.ctx.timers.pop_due(now) else {
                break;
            };
            if timer.epoch != self.ctx.epoch {
                trace!(
                    timer_epoch = timer.epoch,
                    epoch = self.ctx.epoch,
                    kind = ?timer.kind,
                    "discarding stale timer"
                );
                continue;
            }
            self.fire(timer.kind);
        }

        let wall = self.ctx.timeline_clock.wall();
        self.notices.poll(wall);
        self.inline_deltas.retain(|_, delta| delta.expires_at > wall);
    }

    fn fire(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::BlockElapsed => self.step_timeline(false),
            TimerKind::ShowSubtitle(position) => {
                if let EngineState::Playing(flow) = &mut self.state {
                    if let Some(text) = flow.timeline.show_subtitle(position) {
                        let text = Some(text.to_owned());
                        self.ctx
                            .record(PlaybackEventKind::SubtitleChanged(SubtitleChanged { text }));
                    }
                }
            }
            TimerKind::ClearSubtitle => {
                if let EngineState::Playing(flow) = &mut self.state {
                    if flow.timeline.clear_subtitle() {
                        self.ctx
                            .record(PlaybackEventKind::SubtitleChanged(SubtitleChanged {
                                text: None,
                            }));
                    }
                }
            }
            TimerKind::RelationTriggers => self.apply_relation_triggers(),
            TimerKind::DecisionTick => self.decision_tick(),
        }
    }

    fn apply_relation_triggers(&mut self) {
        let EngineState::Playing(flow) = &self.state else {
            return;
        };
        let Some(block) = flow.timeline.current() else {
            return;
        };
        let starts = block.relation_start.clone();
        let stops = block.relation_stop.clone();
        let graph = Arc::clone(&self.graph);
        let announces = |key: &str| {
            graph.config.relation_visibility.announces() && graph.stat_kind(key) != StatKind::Hidden
        };

        for key in starts {
            if self.player.start_relation(&key) {
                debug!(%key, "relation started");
                if announces(&key) {
                    self.raise_notice(format!("{} relation started", graph.label_for(&key)));
                }
                self.ctx
                    .record(PlaybackEventKind::RelationStarted(RelationToggled { key }));
            }
        }
        for key in stops {
            if self.player.stop_relation(&key) {
                debug!(%key, "relation stopped");
                if announces(&key) {
                    self.raise_notice(format!("{} relation ended", graph.label_for(&key)));
                }
                self.ctx
                    .record(PlaybackEventKind::RelationStopped(RelationToggled { key }));
            }
        }
    }

    fn decision_tick(&mut self) {
        let EngineState::Playing(flow) = &mut self.state else {
            return;
        };
        let Some(timer) = flow.decision.as_mut() else {
            return;
        };
        match timer.tick(self.config.decision_tick_ms) {
            TickOutcome::Running => self
                .ctx
                .schedule_in(self.config.decision_tick_ms, TimerKind::DecisionTick),
            TickOutcome::Expired => self.auto_select(),
            TickOutcome::Spent => debug!("decision timer already expired"),
        }
    }

    /// Picks uniformly among the choices whose requirements hold now.
    fn auto_select(&mut self) {
        let graph = Arc::clone(&self.graph);
        let EngineState::Playing(flow) = &self.state else {
            return;
        };
        let Some(scene) = graph.scene(flow.scene_id) else {
            return;
        };
        let available: Vec<usize> = scene
            .choices
            .iter()
            .enumerate()
            .filter(|(_, choice)| choice.is_available(|key| self.player.value(key)))
            .map(|(index, _)| index)
            .collect();

        self.raise_notice(TIME_IS_UP);
        let picked = pick_index(self.ctx.rng.as_mut(), available.len())
            .and_then(|pick| available.get(pick).copied());
        match picked.and_then(|index| scene.choices.get(index).map(|c| (index, c))) {
            Some((index, choice)) => {
                info!(scene_id = %scene.id, choice_index = index, "decision timer auto-selected a choice");
                self.raise_notice(format!("Selected: {}", choice.text));
                self.commit_choice(index, true);
            }
            None => self.surface(&DomainError::NoEligibleChoice(scene.id)),
        }
    }

    // --- rendering ---

    /// Builds the render state for the current instant.
    #[must_use]
    pub fn snapshot(&self) -> RenderSnapshot {
        let graph = &self.graph;
        let mut snapshot = RenderSnapshot {
            session_id: self.ctx.session_id,
            phase: self.phase(),
            paused: self.is_paused(),
            story_title: graph.title.clone(),
            description: graph.description.clone(),
            chapter_title: self
                .current_chapter
                .and_then(|chapter| graph.chapter(chapter))
                .map(|chapter| chapter.title.clone()),
            scene_id: None,
            block: None,
            subtitle: None,
            choices: Vec::new(),
            seconds_left: None,
            notice: self.notices.current().cloned(),
            pending_notices: self.notices.pending_len(),
            stats: self.stat_views(StatKind::Stat),
            relations: self.stat_views(StatKind::Relation),
            setup: None,
            theme: graph.theme.clone(),
            character: graph.character.clone(),
            error: None,
        };

        match &self.state {
            EngineState::Loading | EngineState::StoryStart => {}
            EngineState::CharacterSetup => snapshot.setup = Some(self.setup_view()),
            EngineState::ChapterStart { title, scene_id } => {
                snapshot.chapter_title = Some(title.clone());
                snapshot.scene_id = Some(*scene_id);
            }
            EngineState::ChapterTransition { title, target } => {
                snapshot.chapter_title = Some(title.clone());
                snapshot.scene_id = Some(*target);
            }
            EngineState::GameEnd { scene_id } => snapshot.scene_id = *scene_id,
            EngineState::Error(message) => snapshot.error = Some(message.clone()),
            EngineState::Playing(flow) => {
                snapshot.scene_id = Some(flow.scene_id);
                snapshot.subtitle = flow.timeline.subtitle().map(str::to_owned);
                snapshot.block = flow.timeline.current().zip(flow.timeline.index()).map(
                    |(block, index)| BlockView {
                        cue: flow.timeline.cue(),
                        media_type: block.media_type,
                        media_ref: block.media_ref.clone(),
                        index,
                        total: flow.timeline.len(),
                        awaits_media_end: flow.timeline.awaits_media_end(),
                    },
                );
                if flow.choices_visible {
                    let ratio = flow.decision.as_ref().map(DecisionTimer::remaining_ratio);
                    snapshot.seconds_left = flow.decision.as_ref().map(DecisionTimer::remaining_seconds);
                    snapshot.choices = graph
                        .scene(flow.scene_id)
                        .map(|scene| {
                            scene
                                .choices
                                .iter()
                                .enumerate()
                                .filter(|(_, c)| c.is_available(|key| self.player.value(key)))
                                .map(|(index, c)| ChoiceView {
                                    index,
                                    text: c.text.clone(),
                                    remaining_ratio: ratio,
                                })
                                .collect()
                        })
                        .unwrap_or_default();
                }
            }
        }
        snapshot
    }

    fn stat_views(&self, kind: StatKind) -> Vec<StatView> {
        let graph = &self.graph;
        let shown = match kind {
            StatKind::Stat => graph.config.stat_visibility.shows_display(),
            StatKind::Relation => graph.config.relation_visibility.shows_display(),
            StatKind::Hidden => false,
        };
        if !shown {
            return Vec::new();
        }
        graph
            .stat_definitions
            .iter()
            .filter(|def| def.kind == kind)
            .filter(|def| kind != StatKind::Relation || self.player.is_relation_active(&def.key))
            .map(|def| {
                let value = self.player.value(&def.key);
                let percent = graph.bounds_for(&def.key).percent_of(value);
                StatView {
                    key: def.key.clone(),
                    label: def.label.clone(),
                    value,
                    percent,
                    band: (kind == StatKind::Relation).then(|| Band::for_percent(percent)),
                    inline_delta: self.inline_deltas.get(&def.key).map(|d| d.percent_change),
                }
            })
            .collect()
    }

    fn setup_view(&self) -> SetupView {
        let config = &self.graph.config;
        let keys = |kind: StatKind, user: bool| -> Vec<String> {
            if !user {
                return Vec::new();
            }
            self.graph
                .stat_definitions
                .iter()
                .filter(|def| def.kind == kind)
                .map(|def| def.key.clone())
                .collect()
        };
        let stat_keys = keys(
            StatKind::Stat,
            config.stat_distribution == DistributionMode::User,
        );
        let relation_keys = keys(
            StatKind::Relation,
            config.relation_distribution == DistributionMode::User,
        );
        SetupView {
            stat_pool: if stat_keys.is_empty() { 0 } else { config.stat_pool },
            stat_keys,
            relation_pool: if relation_keys.is_empty() { 0 } else { config.relation_pool },
            relation_keys,
        }
    }
}
