//! End-to-end walks through small stories on a manually driven clock.

mod common;

use cinestory_content::domain::conditions::Operator;
use cinestory_content::domain::graph::{Bounds, StatKind};
use cinestory_core::ids::SceneId;
use cinestory_core::media::{AudioChannel, MediaCommand};
use cinestory_playback::domain::commands::PlayerIntent;
use cinestory_playback::domain::engine::Phase;
use cinestory_playback::domain::events::PlaybackEventKind;
use cinestory_test_support::{BlockBuilder, ChoiceBuilder, SceneBuilder, StoryBuilder};

use common::Harness;

#[test]
fn test_short_story_reaches_game_end_through_final_scene() {
    // Arrange
    let graph = StoryBuilder::new("Short")
        .chapter(1, "Beginnings")
        .scene(
            SceneBuilder::new(10)
                .in_chapter(1)
                .starting()
                .block(BlockBuilder::image(1.0).audio(Some("bed.ogg"), None, None))
                .choice(ChoiceBuilder::new("Onward").to(11)),
        )
        .scene(SceneBuilder::new(11).in_chapter(1).final_scene())
        .build();
    let mut h = Harness::new(graph);
    assert_eq!(h.engine.phase(), Phase::StoryStart);

    // Act
    h.send(PlayerIntent::proceed());
    let chapter_card = h.engine.snapshot();
    h.send(PlayerIntent::proceed());
    let before_elapse = h.engine.snapshot();
    h.advance_ms(1_000);
    let menu = h.engine.snapshot();
    h.send(PlayerIntent::select(0));

    // Assert
    assert_eq!(chapter_card.phase, Phase::ChapterStart);
    assert_eq!(chapter_card.chapter_title.as_deref(), Some("Beginnings"));
    assert_eq!(before_elapse.phase, Phase::PlayingScene);
    assert!(before_elapse.choices.is_empty());
    assert_eq!(menu.choices.len(), 1);
    assert_eq!(menu.choices[0].text, "Onward");
    assert_eq!(h.engine.phase(), Phase::GameEnd);
    assert!(h.kinds().any(|kind| matches!(
        kind,
        PlaybackEventKind::GameEnded(end) if end.scene_id == Some(SceneId(11))
    )));
    assert_eq!(h.count("playback.game_ended"), 1);
}

#[test]
fn test_final_target_ends_game_without_playing_its_content() {
    // Arrange
    let graph = StoryBuilder::new("Epilogue")
        .scene(
            SceneBuilder::new(1)
                .starting()
                .block(BlockBuilder::image(1.0))
                .choice(ChoiceBuilder::new("Finish").to(2)),
        )
        .scene(
            SceneBuilder::new(2)
                .final_scene()
                .block(BlockBuilder::image(10.0).audio(Some("credits.ogg"), None, None)),
        )
        .build();
    let mut h = Harness::new(graph);
    h.send(PlayerIntent::proceed());
    h.advance_ms(1_000);

    // Act
    h.send(PlayerIntent::select(0));

    // Assert
    assert_eq!(h.engine.phase(), Phase::GameEnd);
    assert_eq!(h.engine.snapshot().scene_id, Some(SceneId(2)));
    assert!(!h.kinds().any(|kind| matches!(
        kind,
        PlaybackEventKind::SceneStarted(s) if s.scene_id == SceneId(2)
    )));
    assert!(!h.media.commands().iter().any(|c| matches!(
        c,
        MediaCommand::Play { media_ref, .. } if media_ref == "credits.ogg"
    )));
}

#[test]
fn test_result_flow_into_final_target_ends_game() {
    let graph = StoryBuilder::new("Last words")
        .scene(
            SceneBuilder::new(1)
                .starting()
                .block(BlockBuilder::image(1.0))
                .choice(ChoiceBuilder::new("Farewell").to(2).result(BlockBuilder::image(2.0))),
        )
        .scene(SceneBuilder::new(2).final_scene().block(BlockBuilder::image(10.0)))
        .build();
    let mut h = Harness::new(graph);
    h.send(PlayerIntent::proceed());
    h.advance_ms(1_000);
    h.send(PlayerIntent::select(0));

    h.advance_ms(2_000);

    assert_eq!(h.engine.phase(), Phase::GameEnd);
    assert_eq!(h.count("playback.result_started"), 1);
    assert_eq!(h.count("playback.scene_started"), 1);
}

#[test]
fn test_timeout_auto_selects_exactly_once() {
    // Arrange
    let graph = StoryBuilder::new("Timed")
        .stat("courage", "Courage", StatKind::Stat)
        .scene(
            SceneBuilder::new(1)
                .starting()
                .timeout(5)
                .block(BlockBuilder::image(1.0))
                .choice(ChoiceBuilder::new("Hide").requires("courage", Operator::AtLeast, 50).to(2))
                .choice(ChoiceBuilder::new("Run").to(3)),
        )
        .scene(SceneBuilder::new(2).block(BlockBuilder::image(30.0)))
        .scene(SceneBuilder::new(3).block(BlockBuilder::image(30.0)))
        .build();
    let mut h = Harness::new(graph);
    h.send(PlayerIntent::proceed());
    h.advance_ms(1_000);
    let menu = h.engine.snapshot();

    // Act
    h.advance_ms(4_900);
    let just_before = h.engine.snapshot();
    h.advance_ms(100);
    h.advance_ms(10_000);

    // Assert
    assert_eq!(menu.seconds_left, Some(5));
    assert_eq!(just_before.choices.len(), 1);
    assert_eq!(h.count("playback.choice_committed"), 1);
    assert!(h.kinds().any(|kind| matches!(
        kind,
        PlaybackEventKind::ChoiceCommitted(c) if c.auto && c.choice_index == 1
    )));
    let started: Vec<SceneId> = h
        .kinds()
        .filter_map(|kind| match kind {
            PlaybackEventKind::SceneStarted(s) => Some(s.scene_id),
            _ => None,
        })
        .collect();
    assert_eq!(started, vec![SceneId(1), SceneId(3)]);
    assert_eq!(h.notices()[..2], ["Time is up!".to_owned(), "Selected: Run".to_owned()]);
}

#[test]
fn test_negative_effect_clamps_at_stat_minimum() {
    // Arrange
    let graph = StoryBuilder::new("Spend")
        .stat("gold", "Gold", StatKind::Stat)
        .initial("gold", 5)
        .config(|c| c.stat_bounds = Bounds { min: 0, max: 100 })
        .scene(
            SceneBuilder::new(1)
                .starting()
                .block(BlockBuilder::image(1.0))
                .choice(ChoiceBuilder::new("Buy").effect("gold", -10).to(2)),
        )
        .scene(SceneBuilder::new(2).block(BlockBuilder::image(5.0)))
        .build();
    let mut h = Harness::new(graph);
    h.send(PlayerIntent::proceed());
    h.advance_ms(1_000);

    // Act
    h.send(PlayerIntent::select(0));

    // Assert
    assert_eq!(h.engine.player_state().value("gold"), 0);
    assert!(h.kinds().any(|kind| matches!(
        kind,
        PlaybackEventKind::EffectApplied(e) if e.before == 5 && e.after == 0 && e.delta == -10
    )));
}

#[test]
fn test_end_scene_waits_for_continue_before_next_chapter() {
    // Arrange
    let graph = StoryBuilder::new("Chapters")
        .chapter(1, "The Village")
        .chapter(2, "The Forest")
        .scene(
            SceneBuilder::new(1)
                .in_chapter(1)
                .starting()
                .end_scene()
                .block(BlockBuilder::image(1.0))
                .choice(ChoiceBuilder::new("Leave").to(20)),
        )
        .scene(
            SceneBuilder::new(20)
                .in_chapter(2)
                .block(BlockBuilder::image(2.0).media("forest.jpg")),
        )
        .build();
    let mut h = Harness::new(graph);
    h.send(PlayerIntent::proceed());
    h.send(PlayerIntent::proceed());
    h.advance_ms(1_000);

    // Act
    h.send(PlayerIntent::select(0));
    let card = h.engine.snapshot();
    h.advance_ms(10_000);
    let still_card = h.engine.phase();
    h.send(PlayerIntent::proceed());

    // Assert
    assert_eq!(card.phase, Phase::ChapterTransition);
    assert_eq!(card.chapter_title.as_deref(), Some("The Forest"));
    assert_eq!(still_card, Phase::ChapterTransition);
    assert_eq!(h.engine.phase(), Phase::PlayingScene);
    let snapshot = h.engine.snapshot();
    assert_eq!(snapshot.scene_id, Some(SceneId(20)));
    assert_eq!(snapshot.chapter_title.as_deref(), Some("The Forest"));
    assert_eq!(
        snapshot.block.and_then(|b| b.media_ref),
        Some("forest.jpg".to_owned())
    );
}

#[test]
fn test_end_scene_into_chapterless_target_uses_fallback_title() {
    let graph = StoryBuilder::new("Loose")
        .scene(
            SceneBuilder::new(1)
                .starting()
                .end_scene()
                .block(BlockBuilder::image(1.0))
                .choice(ChoiceBuilder::new("Go").to(2)),
        )
        .scene(SceneBuilder::new(2).block(BlockBuilder::image(1.0)))
        .build();
    let mut h = Harness::new(graph);
    h.send(PlayerIntent::proceed());
    h.advance_ms(1_000);

    h.send(PlayerIntent::select(0));

    assert_eq!(
        h.engine.snapshot().chapter_title.as_deref(),
        Some("Chapter complete")
    );
}

#[test]
fn test_result_content_plays_before_navigation() {
    // Arrange
    let graph = StoryBuilder::new("Results")
        .stat("trust", "Trust", StatKind::Stat)
        .scene(
            SceneBuilder::new(1)
                .starting()
                .block(BlockBuilder::image(1.0))
                .choice(
                    ChoiceBuilder::new("Help")
                        .effect("trust", 20)
                        .to(2)
                        .result(BlockBuilder::image(2.0).when("trust", Operator::AtLeast, 20))
                        .result(BlockBuilder::image(2.0).when("trust", Operator::Less, 20)),
                ),
        )
        .scene(SceneBuilder::new(2).block(BlockBuilder::image(5.0)))
        .build();
    let mut h = Harness::new(graph);
    h.send(PlayerIntent::proceed());
    h.advance_ms(1_000);

    // Act
    h.send(PlayerIntent::select(0));
    let during = h.engine.snapshot();
    h.advance_ms(2_000);

    // Assert
    assert_eq!(during.phase, Phase::PlayingResult);
    assert_eq!(during.block.map(|b| b.total), Some(1));
    assert_eq!(h.engine.phase(), Phase::PlayingScene);
    assert_eq!(h.engine.snapshot().scene_id, Some(SceneId(2)));
}

#[test]
fn test_dynamic_route_overrides_default_target() {
    let graph = StoryBuilder::new("Routes")
        .initial("str", 6)
        .initial("dex", 6)
        .scene(
            SceneBuilder::new(1)
                .starting()
                .block(BlockBuilder::image(1.0))
                .choice(
                    ChoiceBuilder::new("Climb")
                        .to(2)
                        .route(&["str", "dex"], Operator::Greater, 10, 3),
                ),
        )
        .scene(SceneBuilder::new(2).block(BlockBuilder::image(5.0)))
        .scene(SceneBuilder::new(3).block(BlockBuilder::image(5.0)))
        .build();
    let mut h = Harness::new(graph);
    h.send(PlayerIntent::proceed());
    h.advance_ms(1_000);

    h.send(PlayerIntent::select(0));

    assert_eq!(h.engine.snapshot().scene_id, Some(SceneId(3)));
    assert!(h.kinds().any(|kind| matches!(
        kind,
        PlaybackEventKind::RouteResolved(r) if r.route_index == Some(0) && r.target == Some(SceneId(3))
    )));
}

#[test]
fn test_game_end_stops_every_channel() {
    // Arrange
    let graph = StoryBuilder::new("Quiet")
        .scene(
            SceneBuilder::new(1)
                .starting()
                .final_scene()
                .block(BlockBuilder::image(1.0).audio(Some("bed.ogg"), Some("swell.ogg"), None)),
        )
        .build();
    let mut h = Harness::new(graph);
    h.send(PlayerIntent::proceed());
    h.media.take();

    // Act
    h.advance_ms(1_000);

    // Assert
    assert_eq!(h.engine.phase(), Phase::GameEnd);
    let commands = h.media.commands();
    for channel in AudioChannel::ALL {
        assert!(commands.contains(&MediaCommand::Stop { channel }));
    }
    assert!(!commands.iter().any(|c| matches!(c, MediaCommand::Play { .. })));
}
