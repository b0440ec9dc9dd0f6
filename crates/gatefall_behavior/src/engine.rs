//! The scoring engine: a channel-fed worker that folds activity events
//! into profiles.
//!
//! `record_event` never blocks the caller; events go onto a bounded
//! channel and a dedicated worker applies them. `profile` reads are a
//! lock-and-copy snapshot, eventually consistent with the event stream
//! (staleness is bounded by the channel depth).

use std::collections::HashMap;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Sender, TrySendError};
use gatefall_core::PlayerId;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::profile::{ActivityEvent, BehaviorProfile};

/// Channel depth; past this, new events are dropped (scores are a soft
/// signal, losing one under pressure is acceptable).
const QUEUE_DEPTH: usize = 4_096;

enum Message {
    Event(PlayerId, ActivityEvent),
    /// Test/shutdown aid: replies once everything queued before it has
    /// been applied.
    Flush(Sender<()>),
}

/// Behavior scoring engine handle. Cloning is cheap; all clones feed the
/// same worker.
#[derive(Clone)]
pub struct BehaviorEngine {
    profiles: Arc<RwLock<HashMap<PlayerId, BehaviorProfile>>>,
    sender: Sender<Message>,
    _worker: Arc<WorkerHandle>,
}

struct WorkerHandle(Option<JoinHandle<()>>);

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            let _ = handle.join();
        }
    }
}

impl BehaviorEngine {
    /// Spawns the engine with the given decay factor (basis points kept
    /// per event).
    #[must_use]
    pub fn spawn(decay_bp: u32) -> Self {
        let profiles: Arc<RwLock<HashMap<PlayerId, BehaviorProfile>>> =
            Arc::new(RwLock::new(HashMap::new()));
        let (sender, receiver) = bounded::<Message>(QUEUE_DEPTH);

        let worker_profiles = Arc::clone(&profiles);
        let handle = thread::Builder::new()
            .name("behavior-scoring".to_string())
            .spawn(move || {
                while let Ok(message) = receiver.recv() {
                    match message {
                        Message::Event(player, event) => {
                            let mut map = worker_profiles.write();
                            let profile = map.entry(player).or_default();
                            profile.apply(event, decay_bp);
                        }
                        Message::Flush(reply) => {
                            let _ = reply.send(());
                        }
                    }
                }
                debug!("behavior worker stopped");
            });

        let worker = match handle {
            Ok(handle) => WorkerHandle(Some(handle)),
            Err(err) => {
                // Spawn failure leaves a dead channel; events will be
                // dropped and profiles stay at their defaults.
                warn!(%err, "failed to spawn behavior worker");
                WorkerHandle(None)
            }
        };

        Self {
            profiles,
            sender,
            _worker: Arc::new(worker),
        }
    }

    /// Records an event. Never blocks; under sustained overload the
    /// event is dropped and counted via a warning.
    pub fn record_event(&self, player: PlayerId, event: ActivityEvent) {
        match self.sender.try_send(Message::Event(player, event)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(%player, "behavior queue full, event dropped");
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!(%player, "behavior worker gone, event dropped");
            }
        }
    }

    /// Snapshot of a player's profile (defaults for unseen players).
    #[must_use]
    pub fn profile(&self, player: PlayerId) -> BehaviorProfile {
        self.profiles
            .read()
            .get(&player)
            .copied()
            .unwrap_or_default()
    }

    /// Blocks until every event queued before this call has been
    /// applied. Intended for tests and orderly shutdown.
    pub fn flush(&self) {
        let (reply, done) = bounded(1);
        if self.sender.send(Message::Flush(reply)).is_ok() {
            let _ = done.recv();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatefall_core::GateGrade;

    #[test]
    fn events_move_scores() {
        let engine = BehaviorEngine::spawn(9_000);
        let player = PlayerId(1);
        assert_eq!(engine.profile(player), BehaviorProfile::default());

        for _ in 0..20 {
            engine.record_event(player, ActivityEvent::GateCleared(GateGrade::C));
        }
        engine.flush();

        let profile = engine.profile(player);
        assert!(profile.gate_hunting > BehaviorProfile::default().gate_hunting);
        // Gambling untouched.
        assert_eq!(profile.gambling, BehaviorProfile::default().gambling);
    }

    #[test]
    fn profiles_are_per_player() {
        let engine = BehaviorEngine::spawn(9_000);
        engine.record_event(PlayerId(1), ActivityEvent::TradeCompleted);
        engine.flush();
        assert!(engine.profile(PlayerId(1)).trading > BehaviorProfile::default().trading);
        assert_eq!(engine.profile(PlayerId(2)), BehaviorProfile::default());
    }
}
