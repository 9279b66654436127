//! Headless level runner: scripted input on a fixed-rate tick loop

use std::future::Future;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::game::{GameSession, LevelOutcome, LevelPhase, SessionEvent, TickInput};
use crate::util::time::{tick_duration, Timer};
use crate::world::CollisionWorld;

/// Seeded stand-in for a player
#[derive(Debug, Clone)]
pub struct Autopilot {
    rng: ChaCha8Rng,
    steer: f32,
    /// Ticks the rewind button stays down
    rewind_ticks_left: u32,
    /// Ticks until the next rewind press
    next_rewind_in: u32,
}

impl Autopilot {
    pub fn new(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let next_rewind_in = rng.gen_range(150..400);
        Self {
            rng,
            steer: 0.0,
            rewind_ticks_left: 0,
            next_rewind_in,
        }
    }

    /// Input for the next tick of `session`
    pub fn next_input<W: CollisionWorld>(&mut self, session: &GameSession<W>) -> TickInput {
        match session.phase() {
            LevelPhase::Running => {}
            LevelPhase::AwaitingConfirm { .. } => {
                return TickInput {
                    confirm: true,
                    ..TickInput::default()
                };
            }
            LevelPhase::Fading { .. } | LevelPhase::Finished { .. } => {
                return TickInput::default();
            }
        }

        if self.rewind_ticks_left > 0 {
            self.rewind_ticks_left -= 1;
            return TickInput::rewinding();
        }

        self.next_rewind_in = self.next_rewind_in.saturating_sub(1);
        if self.next_rewind_in == 0 && session.rewinds_remaining() > 0 {
            self.rewind_ticks_left = self.rng.gen_range(10..40);
            self.next_rewind_in = self.rng.gen_range(150..400);
            return TickInput::rewinding();
        }

        self.steer = (self.steer + self.rng.gen_range(-0.15..0.15)).clamp(-1.0, 1.0);
        let forward = if self.rng.gen_bool(0.9) { 1.0 } else { -0.5 };
        TickInput::driving(forward, self.steer)
    }
}

/// What a run achieved
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub session_id: Uuid,
    pub level: String,
    pub ticks: u64,
    pub outcome: Option<LevelOutcome>,
    /// Level the session asked to load, if it got that far
    pub load_level: Option<String>,
    pub rewinds_used: u32,
    pub vehicles_spawned: usize,
    pub elapsed_ms: u64,
}

/// Run `session` at the simulation rate until the level finishes, the tick
/// limit is hit or `shutdown` resolves
pub async fn run_level<W, F>(
    mut session: GameSession<W>,
    mut autopilot: Autopilot,
    max_ticks: u64,
    shutdown: F,
) -> RunSummary
where
    W: CollisionWorld,
    F: Future<Output = ()>,
{
    info!(
        session_id = %session.id(),
        level = %session.level().name,
        max_ticks,
        "Level run started"
    );

    let timer = Timer::new();
    let mut tick_interval = interval(tick_duration());
    tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    let mut load_level = None;
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Shutdown requested, stopping level run");
                break;
            }
            _ = tick_interval.tick() => {}
        }

        let input = autopilot.next_input(&session);
        for event in session.tick(input) {
            match event {
                SessionEvent::LoadLevel { level } => load_level = Some(level),
                event => debug!(tick = session.tick_count(), event = ?event, "Session event"),
            }
        }

        if matches!(session.phase(), LevelPhase::Finished { .. }) {
            break;
        }
        if session.tick_count() >= max_ticks {
            warn!(max_ticks, "Tick limit reached, stopping level run");
            break;
        }
    }

    let summary = RunSummary {
        session_id: session.id(),
        level: session.level().name.clone(),
        ticks: session.tick_count(),
        outcome: session.phase().outcome().cloned(),
        load_level,
        rewinds_used: session.rewinds_used(),
        vehicles_spawned: session.vehicles_spawned(),
        elapsed_ms: timer.elapsed_ms(),
    };
    info!(
        ticks = summary.ticks,
        rewinds = summary.rewinds_used,
        vehicles = summary.vehicles_spawned,
        elapsed_ms = summary.elapsed_ms,
        "Level run finished"
    );
    summary
}
