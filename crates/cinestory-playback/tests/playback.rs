//! Timing, pause, media and notification behaviour of a running session.

mod common;

use std::collections::BTreeMap;

use cinestory_content::domain::conditions::Operator;
use cinestory_content::domain::graph::{DistributionMode, StatKind, VisibilityMode};
use cinestory_core::error::DomainError;
use cinestory_core::ids::SceneId;
use cinestory_core::media::{AudioChannel, MediaCommand};
use cinestory_playback::domain::commands::PlayerIntent;
use cinestory_playback::domain::engine::Phase;
use cinestory_playback::domain::events::PlaybackEventKind;
use cinestory_test_support::{BlockBuilder, ChoiceBuilder, SceneBuilder, SequenceRng, StoryBuilder};

use common::Harness;

fn single_scene(block: BlockBuilder) -> Harness {
    let graph = StoryBuilder::new("Single")
        .scene(
            SceneBuilder::new(1)
                .starting()
                .block(block)
                .block(BlockBuilder::image(4.0).media("second.jpg"))
                .choice(ChoiceBuilder::new("Stay").to(1)),
        )
        .build();
    let mut h = Harness::new(graph);
    h.send(PlayerIntent::proceed());
    h
}

fn block_index(h: &Harness) -> Option<usize> {
    h.engine.snapshot().block.map(|b| b.index)
}

#[test]
fn test_video_block_waits_for_media_end() {
    // Arrange
    let mut h = single_scene(BlockBuilder::video(2.0));
    let cue = h.engine.snapshot().block.map(|b| b.cue).unwrap();

    // Act
    h.advance_ms(60_000);
    let still_on_video = block_index(&h);
    h.send(PlayerIntent::media_ended(cue));

    // Assert
    assert_eq!(still_on_video, Some(0));
    assert_eq!(block_index(&h), Some(1));
}

#[test]
fn test_stale_media_end_is_ignored() {
    // Arrange
    let graph = StoryBuilder::new("Videos")
        .scene(
            SceneBuilder::new(1)
                .starting()
                .block(BlockBuilder::video(2.0))
                .block(BlockBuilder::video(2.0).media("second.mp4"))
                .block(BlockBuilder::image(3.0)),
        )
        .build();
    let mut h = Harness::new(graph);
    h.send(PlayerIntent::proceed());
    let first_cue = h.engine.snapshot().block.map(|b| b.cue).unwrap();
    h.send(PlayerIntent::media_ended(first_cue));

    // Act
    let late = h.engine.handle(PlayerIntent::media_ended(first_cue));

    // Assert
    assert!(late.is_ok());
    assert_eq!(block_index(&h), Some(1));
}

#[test]
fn test_image_block_advances_after_its_duration() {
    let mut h = single_scene(BlockBuilder::image(2.5));

    h.advance_ms(2_499);
    let before = block_index(&h);
    h.advance_ms(1);

    assert_eq!(before, Some(0));
    assert_eq!(block_index(&h), Some(1));
}

#[test]
fn test_missing_duration_uses_default() {
    let mut graph = StoryBuilder::new("Default")
        .scene(
            SceneBuilder::new(1)
                .starting()
                .block(BlockBuilder::image(1.0))
                .block(BlockBuilder::image(1.0)),
        )
        .build();
    graph.scenes[0].content[0].duration_seconds = None;
    let mut h = Harness::new(graph);
    h.send(PlayerIntent::proceed());

    h.advance_ms(4_999);
    let before = block_index(&h);
    h.advance_ms(1);

    assert_eq!(before, Some(0));
    assert_eq!(block_index(&h), Some(1));
}

#[test]
fn test_subtitles_step_then_clear() {
    // Arrange
    let mut h = single_scene(
        BlockBuilder::image(10.0)
            .subtitle("Who goes there?", 1.0)
            .subtitle("A friend.", 2.0),
    );

    // Act
    let first = h.engine.snapshot().subtitle;
    h.advance_ms(1_000);
    let second = h.engine.snapshot().subtitle;
    h.advance_ms(2_000);
    let cleared = h.engine.snapshot().subtitle;

    // Assert
    assert_eq!(first.as_deref(), Some("Who goes there?"));
    assert_eq!(second.as_deref(), Some("A friend."));
    assert_eq!(cleared, None);
}

#[test]
fn test_leaving_block_early_cancels_its_subtitles() {
    // Arrange
    let graph = StoryBuilder::new("Cancel")
        .scene(
            SceneBuilder::new(1)
                .starting()
                .block(
                    BlockBuilder::video(2.0)
                        .subtitle("one", 1.0)
                        .subtitle("two", 1.0),
                )
                .block(BlockBuilder::image(10.0)),
        )
        .build();
    let mut h = Harness::new(graph);
    h.send(PlayerIntent::proceed());
    let cue = h.engine.snapshot().block.map(|b| b.cue).unwrap();

    // Act
    h.send(PlayerIntent::media_ended(cue));
    h.advance_ms(5_000);

    // Assert
    assert_eq!(h.engine.snapshot().subtitle, None);
    let shown: Vec<_> = h
        .kinds()
        .filter_map(|kind| match kind {
            PlaybackEventKind::SubtitleChanged(s) => s.text.clone(),
            _ => None,
        })
        .collect();
    assert_eq!(shown, vec!["one".to_owned()]);
}

#[test]
fn test_pause_freezes_every_timer() {
    // Arrange
    let mut h = single_scene(
        BlockBuilder::image(3.0)
            .subtitle("hold", 1.0)
            .audio(None, None, Some("vo.ogg")),
    );
    h.advance_ms(2_000);

    // Act
    h.send(PlayerIntent::toggle_pause());
    h.advance_ms(60_000);
    let paused = h.engine.snapshot();
    h.send(PlayerIntent::toggle_pause());
    h.advance_ms(999);
    let before = block_index(&h);
    h.advance_ms(1);

    // Assert
    assert!(paused.paused);
    assert_eq!(paused.block.map(|b| b.index), Some(0));
    assert_eq!(before, Some(0));
    assert_eq!(block_index(&h), Some(1));
    let commands = h.media.commands_for(AudioChannel::Voiceover);
    assert!(commands.contains(&MediaCommand::Pause { channel: AudioChannel::Voiceover }));
    assert!(commands.contains(&MediaCommand::Resume { channel: AudioChannel::Voiceover }));
}

#[test]
fn test_pause_freezes_decision_countdown() {
    // Arrange
    let graph = StoryBuilder::new("Countdown")
        .scene(
            SceneBuilder::new(1)
                .starting()
                .timeout(3)
                .block(BlockBuilder::image(1.0))
                .choice(ChoiceBuilder::new("Wait").to(2)),
        )
        .scene(SceneBuilder::new(2).block(BlockBuilder::image(10.0)))
        .build();
    let mut h = Harness::new(graph);
    h.send(PlayerIntent::proceed());
    h.advance_ms(2_000);

    // Act
    h.send(PlayerIntent::toggle_pause());
    h.advance_ms(30_000);
    let paused = h.engine.snapshot();
    h.send(PlayerIntent::toggle_pause());
    h.advance_ms(2_000);

    // Assert
    assert_eq!(paused.seconds_left, Some(2));
    assert_eq!(h.count("playback.choice_committed"), 1);
    assert_eq!(h.engine.snapshot().scene_id, Some(SceneId(2)));
}

#[test]
fn test_select_is_rejected_while_paused() {
    let mut h = single_scene(BlockBuilder::image(1.0));
    h.advance_ms(5_000);
    h.send(PlayerIntent::toggle_pause());

    let result = h.engine.handle(PlayerIntent::select(0));

    match result.unwrap_err() {
        DomainError::Validation(msg) => assert!(msg.contains("paused")),
        other => panic!("expected Validation, got {other:?}"),
    }
}

#[test]
fn test_media_end_while_paused_applies_on_resume() {
    // Arrange
    let mut h = single_scene(BlockBuilder::video(2.0));
    let cue = h.engine.snapshot().block.map(|b| b.cue).unwrap();
    h.send(PlayerIntent::toggle_pause());

    // Act
    h.send(PlayerIntent::media_ended(cue));
    let while_paused = block_index(&h);
    h.send(PlayerIntent::toggle_pause());

    // Assert
    assert_eq!(while_paused, Some(0));
    assert_eq!(block_index(&h), Some(1));
}

#[test]
fn test_pause_outside_playback_is_rejected() {
    let graph = StoryBuilder::new("Menu")
        .scene(SceneBuilder::new(1).starting().block(BlockBuilder::image(1.0)))
        .build();
    let mut h = Harness::new(graph);

    let result = h.engine.handle(PlayerIntent::toggle_pause());

    match result.unwrap_err() {
        DomainError::Validation(msg) => assert!(msg.contains("story_start")),
        other => panic!("expected Validation, got {other:?}"),
    }
}

#[test]
fn test_select_before_menu_is_rejected() {
    let mut h = single_scene(BlockBuilder::image(5.0));

    let result = h.engine.handle(PlayerIntent::select(0));

    match result.unwrap_err() {
        DomainError::Validation(_) => {}
        other => panic!("expected Validation, got {other:?}"),
    }
}

#[test]
fn test_unavailable_choice_is_rejected() {
    let graph = StoryBuilder::new("Locked")
        .scene(
            SceneBuilder::new(1)
                .starting()
                .block(BlockBuilder::image(1.0))
                .choice(ChoiceBuilder::new("Bribe").requires("gold", Operator::AtLeast, 10).to(1)),
        )
        .build();
    let mut h = Harness::new(graph);
    h.send(PlayerIntent::proceed());
    h.advance_ms(1_000);

    let result = h.engine.handle(PlayerIntent::select(0));

    match result.unwrap_err() {
        DomainError::Validation(msg) => assert!(msg.contains("requirements")),
        other => panic!("expected Validation, got {other:?}"),
    }
    assert!(h.engine.snapshot().choices.is_empty());
}

#[test]
fn test_timeout_without_eligible_choice_raises_notice_and_stays() {
    // Arrange
    let graph = StoryBuilder::new("Stuck")
        .scene(
            SceneBuilder::new(1)
                .starting()
                .timeout(2)
                .block(BlockBuilder::image(1.0))
                .choice(ChoiceBuilder::new("Fly").requires("wings", Operator::Greater, 0).to(2)),
        )
        .scene(SceneBuilder::new(2).block(BlockBuilder::image(1.0)))
        .build();
    let mut h = Harness::new(graph);
    h.send(PlayerIntent::proceed());
    h.advance_ms(1_000);

    // Act
    h.advance_ms(30_000);

    // Assert
    assert_eq!(h.notices(), vec!["Time is up!".to_owned(), "No option available.".to_owned()]);
    assert_eq!(h.count("playback.choice_committed"), 0);
    assert_eq!(h.engine.phase(), Phase::PlayingScene);
    assert_eq!(h.engine.snapshot().scene_id, Some(SceneId(1)));
}

#[test]
fn test_auto_select_draws_among_available_choices() {
    let graph = StoryBuilder::new("Dice")
        .scene(
            SceneBuilder::new(1)
                .starting()
                .timeout(1)
                .block(BlockBuilder::image(1.0))
                .choice(ChoiceBuilder::new("Left").to(2))
                .choice(ChoiceBuilder::new("Locked").requires("key", Operator::Greater, 0).to(2))
                .choice(ChoiceBuilder::new("Right").to(3)),
        )
        .scene(SceneBuilder::new(2).block(BlockBuilder::image(9.0)))
        .scene(SceneBuilder::new(3).block(BlockBuilder::image(9.0)))
        .build();
    let mut h = Harness::with_rng(graph, Box::new(SequenceRng::new(vec![1])));
    h.send(PlayerIntent::proceed());

    h.advance_ms(2_000);

    assert_eq!(h.engine.snapshot().scene_id, Some(SceneId(3)));
    assert!(h.notices().contains(&"Selected: Right".to_owned()));
}

#[test]
fn test_missing_target_raises_notice_and_reoffers_choices() {
    // Arrange
    let graph = StoryBuilder::new("Broken")
        .scene(
            SceneBuilder::new(1)
                .starting()
                .timeout(5)
                .block(BlockBuilder::image(1.0))
                .choice(ChoiceBuilder::new("Nowhere").to(99)),
        )
        .build();
    let mut h = Harness::new(graph);
    h.send(PlayerIntent::proceed());
    h.advance_ms(1_000);

    // Act
    h.send(PlayerIntent::select(0));
    h.advance_ms(20_000);

    // Assert
    let snapshot = h.engine.snapshot();
    assert_eq!(snapshot.phase, Phase::PlayingScene);
    assert_eq!(snapshot.choices.len(), 1);
    assert_eq!(snapshot.seconds_left, None);
    assert_eq!(h.notices(), vec!["Target scene not found.".to_owned()]);
    assert_eq!(h.count("playback.choice_committed"), 1);
}

#[test]
fn test_relation_triggers_fire_before_block_end_and_are_idempotent() {
    // Arrange
    let graph = StoryBuilder::new("Bonds")
        .stat("mira", "Mira", StatKind::Relation)
        .initial("mira", 40)
        .config(|c| c.relation_visibility = VisibilityMode::AlwaysAndNotify)
        .scene(
            SceneBuilder::new(1)
                .starting()
                .block(BlockBuilder::image(5.0).starts("mira"))
                .block(BlockBuilder::image(5.0).starts("mira"))
                .block(BlockBuilder::image(5.0).stops("mira")),
        )
        .build();
    let mut h = Harness::new(graph);
    h.send(PlayerIntent::proceed());

    // Act
    h.advance_ms(1_999);
    let before_lead = h.engine.player_state().is_relation_active("mira");
    h.advance_ms(1);
    let shown = h.engine.snapshot().relations;
    h.advance_ms(5_000);
    h.advance_ms(5_000);

    // Assert
    assert!(!before_lead);
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].value, 40);
    assert_eq!(h.count("playback.relation_started"), 1);
    assert_eq!(h.count("playback.relation_stopped"), 1);
    assert!(!h.engine.player_state().is_relation_active("mira"));
    assert_eq!(
        h.notices(),
        vec!["Mira relation started".to_owned(), "Mira relation ended".to_owned()]
    );
}

#[test]
fn test_notices_show_one_at_a_time() {
    // Arrange
    let graph = StoryBuilder::new("Toasts")
        .stat("gold", "Gold", StatKind::Stat)
        .stat("wit", "Wit", StatKind::Stat)
        .config(|c| c.stat_visibility = VisibilityMode::OnChange)
        .scene(
            SceneBuilder::new(1)
                .starting()
                .block(BlockBuilder::image(1.0))
                .choice(ChoiceBuilder::new("Loot").effect("gold", 5).effect("wit", 10).to(2)),
        )
        .scene(SceneBuilder::new(2).block(BlockBuilder::image(60.0)))
        .build();
    let mut h = Harness::new(graph);
    h.send(PlayerIntent::proceed());
    h.advance_ms(1_000);

    // Act
    h.send(PlayerIntent::select(0));
    let first = h.engine.snapshot();
    h.advance_ms(3_000);
    let gap = h.engine.snapshot();
    h.advance_ms(500);
    let second = h.engine.snapshot();
    h.advance_ms(3_000);

    // Assert
    assert_eq!(first.notice.map(|n| n.text), Some("Gold +5.0%".to_owned()));
    assert_eq!(first.pending_notices, 1);
    assert_eq!(gap.notice, None);
    assert_eq!(second.notice.map(|n| n.text), Some("Wit +10.0%".to_owned()));
    assert_eq!(h.engine.snapshot().notice, None);
}

#[test]
fn test_inline_delta_expires_on_its_own() {
    // Arrange
    let graph = StoryBuilder::new("Inline")
        .stat("gold", "Gold", StatKind::Stat)
        .config(|c| c.stat_visibility = VisibilityMode::AlwaysAndNotify)
        .scene(
            SceneBuilder::new(1)
                .starting()
                .block(BlockBuilder::image(1.0))
                .choice(ChoiceBuilder::new("Earn").effect("gold", 25).to(2)),
        )
        .scene(SceneBuilder::new(2).block(BlockBuilder::image(60.0)))
        .build();
    let mut h = Harness::new(graph);
    h.send(PlayerIntent::proceed());
    h.advance_ms(1_000);

    // Act
    h.send(PlayerIntent::select(0));
    let shown = h.engine.snapshot().stats;
    h.advance_ms(3_000);
    let expired = h.engine.snapshot().stats;

    // Assert
    assert_eq!(shown[0].value, 25);
    assert_eq!(shown[0].inline_delta, Some(25.0));
    assert_eq!(expired[0].inline_delta, None);
    assert!(h.notices().is_empty());
}

#[test]
fn test_character_setup_gates_story_start() {
    // Arrange
    let graph = StoryBuilder::new("Heroes")
        .stat("str", "Strength", StatKind::Stat)
        .stat("dex", "Dexterity", StatKind::Stat)
        .config(|c| {
            c.stat_distribution = DistributionMode::User;
            c.stat_pool = 10;
        })
        .scene(SceneBuilder::new(1).starting().block(BlockBuilder::image(1.0)))
        .build();
    let mut h = Harness::new(graph);
    let setup = h.engine.snapshot().setup;
    let short: BTreeMap<String, i64> = [("str".to_owned(), 3)].into();
    let full: BTreeMap<String, i64> = [("str".to_owned(), 6), ("dex".to_owned(), 4)].into();

    // Act
    let rejected = h.engine.handle(PlayerIntent::complete_setup(short));
    let early = h.engine.handle(PlayerIntent::proceed());
    h.send(PlayerIntent::complete_setup(full));

    // Assert
    assert_eq!(setup.map(|s| s.stat_keys), Some(vec!["str".to_owned(), "dex".to_owned()]));
    assert!(matches!(rejected, Err(DomainError::Validation(_))));
    assert!(matches!(early, Err(DomainError::Validation(_))));
    assert_eq!(h.engine.phase(), Phase::StoryStart);
    assert_eq!(h.engine.player_state().value("str"), 6);
    assert_eq!(h.engine.player_state().value("dex"), 4);
}

#[test]
fn test_failed_load_enters_error_phase() {
    let media = cinestory_test_support::RecordingMediaOutput::new();
    let mut engine = cinestory_playback::domain::engine::NarrativeEngine::new(
        uuid::Uuid::new_v4(),
        cinestory_playback::domain::config::PlaybackConfig::default(),
        cinestory_playback::domain::session::SessionPorts {
            media: Box::new(media),
            clock: Box::new(cinestory_test_support::fixed_clock()),
            rng: Box::new(cinestory_test_support::MockRng),
        },
    );

    engine.load(Err(DomainError::Infrastructure("connection refused".into())));

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.phase, Phase::Error);
    assert!(snapshot.error.is_some_and(|e| e.contains("connection refused")));
    assert!(engine.handle(PlayerIntent::proceed()).is_err());
}

#[test]
fn test_story_without_starting_scene_enters_error_phase() {
    let graph = StoryBuilder::new("Headless")
        .scene(SceneBuilder::new(1).block(BlockBuilder::image(1.0)))
        .build();

    let h = Harness::new(graph);

    assert_eq!(h.engine.phase(), Phase::Error);
}

#[test]
fn test_pause_freezes_pending_subtitle_clear_and_relation_trigger() {
    // Arrange
    let mut h = single_scene(
        BlockBuilder::image(10.0)
            .subtitle("hold", 4.0)
            .starts("mira"),
    );
    h.advance_ms(2_000);

    // Act
    h.send(PlayerIntent::toggle_pause());
    h.advance_ms(60_000);
    let paused_subtitle = h.engine.snapshot().subtitle;
    let paused_relation = h.engine.player_state().is_relation_active("mira");
    h.send(PlayerIntent::toggle_pause());
    h.advance_ms(1_999);
    let before_clear = h.engine.snapshot().subtitle;
    h.advance_ms(1);
    let after_clear = h.engine.snapshot().subtitle;
    h.advance_ms(2_999);
    let before_trigger = h.engine.player_state().is_relation_active("mira");
    h.advance_ms(1);

    // Assert
    assert_eq!(paused_subtitle.as_deref(), Some("hold"));
    assert!(!paused_relation);
    assert_eq!(before_clear.as_deref(), Some("hold"));
    assert_eq!(after_clear, None);
    assert!(!before_trigger);
    assert!(h.engine.player_state().is_relation_active("mira"));
    assert_eq!(h.count("playback.relation_started"), 1);
}

#[test]
fn test_one_trigger_starts_every_listed_relation() {
    // Arrange
    let graph = StoryBuilder::new("Party")
        .stat("mira", "Mira", StatKind::Relation)
        .stat("tomas", "Tomas", StatKind::Relation)
        .scene(
            SceneBuilder::new(1)
                .starting()
                .block(BlockBuilder::image(5.0).starts("mira").starts("tomas")),
        )
        .build();
    let mut h = Harness::new(graph);
    h.send(PlayerIntent::proceed());

    // Act
    h.advance_ms(1_999);
    let before = h.engine.player_state().active_relations().len();
    h.advance_ms(1);

    // Assert
    assert_eq!(before, 0);
    let state = h.engine.player_state();
    assert!(state.is_relation_active("mira"));
    assert!(state.is_relation_active("tomas"));
    assert_eq!(h.count("playback.relation_started"), 2);
}

#[test]
fn test_huge_authored_durations_do_not_overflow() {
    // Arrange
    let mut h = single_scene(BlockBuilder::image(1e300).subtitle("forever", 1e300).starts("mira"));

    // Act
    h.advance_ms(60_000);

    // Assert
    let snapshot = h.engine.snapshot();
    assert_eq!(snapshot.block.map(|b| b.index), Some(0));
    assert_eq!(snapshot.subtitle.as_deref(), Some("forever"));
    assert!(h.engine.next_deadline().is_some());
}

#[test]
fn test_overflowing_allocation_is_rejected() {
    let graph = StoryBuilder::new("Greedy")
        .stat("str", "Strength", StatKind::Stat)
        .stat("dex", "Dexterity", StatKind::Stat)
        .config(|c| c.stat_distribution = DistributionMode::User)
        .scene(SceneBuilder::new(1).starting().block(BlockBuilder::image(1.0)))
        .build();
    let mut h = Harness::new(graph);
    let greedy: BTreeMap<String, i64> =
        [("str".to_owned(), i64::MAX), ("dex".to_owned(), i64::MAX)].into();

    let result = h.engine.handle(PlayerIntent::complete_setup(greedy));

    assert!(matches!(result, Err(DomainError::Validation(_))));
    assert_eq!(h.engine.phase(), Phase::CharacterSetup);
}
