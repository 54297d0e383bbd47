//! Shared harness for engine integration tests.

#![allow(dead_code)]

use std::time::Duration;

use cinestory_content::domain::graph::StoryGraph;
use cinestory_core::event::DomainEvent;
use cinestory_core::rng::DeterministicRng;
use cinestory_playback::domain::commands::PlayerIntent;
use cinestory_playback::domain::config::PlaybackConfig;
use cinestory_playback::domain::engine::NarrativeEngine;
use cinestory_playback::domain::events::{PlaybackEvent, PlaybackEventKind};
use cinestory_playback::domain::session::SessionPorts;
use cinestory_test_support::{MockRng, RecordingMediaOutput, fixed_clock};
use uuid::Uuid;

pub struct Harness {
    pub engine: NarrativeEngine,
    pub media: RecordingMediaOutput,
    pub events: Vec<PlaybackEvent>,
}

impl Harness {
    pub fn new(graph: StoryGraph) -> Self {
        Self::with_rng(graph, Box::new(MockRng))
    }

    pub fn with_rng(graph: StoryGraph, rng: Box<dyn DeterministicRng>) -> Self {
        let media = RecordingMediaOutput::new();
        let mut engine = NarrativeEngine::new(
            Uuid::new_v4(),
            PlaybackConfig::default(),
            SessionPorts {
                media: Box::new(media.clone()),
                clock: Box::new(fixed_clock()),
                rng,
            },
        );
        engine.load(Ok(graph));
        Self {
            engine,
            media,
            events: Vec::new(),
        }
    }

    pub fn send(&mut self, intent: PlayerIntent) {
        self.engine.handle(intent).unwrap();
        self.collect();
    }

    pub fn advance_ms(&mut self, ms: u64) {
        self.engine.advance(Duration::from_millis(ms));
        self.collect();
    }

    pub fn collect(&mut self) {
        self.events.extend(self.engine.drain_events());
    }

    pub fn count(&self, event_type: &str) -> usize {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .count()
    }

    pub fn kinds(&self) -> impl Iterator<Item = &PlaybackEventKind> {
        self.events.iter().map(|e| &e.kind)
    }

    pub fn notices(&self) -> Vec<String> {
        self.kinds()
            .filter_map(|kind| match kind {
                PlaybackEventKind::NoticeRaised(n) => Some(n.text.clone()),
                _ => None,
            })
            .collect()
    }
}
