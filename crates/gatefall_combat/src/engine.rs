//! The combat engine: gate entry, per-session resolver threads, and
//! terminal settlement.
//!
//! Each live session runs on its own resolver thread. The thread owns
//! the [`GateSession`] outright; the rest of the system talks to it
//! through a bounded command mailbox and reads a shared snapshot that
//! the resolver republishes after every step. Sessions tick on a timer
//! (`recv_timeout` on the mailbox doubles as the tick clock), so combat
//! advances with no client input at all.
//!
//! Settlement happens exactly once, inside the resolver thread, when
//! the session goes terminal: loot is computed and minted, wear is
//! committed, behavior events are recorded, and the re-entry cooldown
//! starts. Death side effects (currency confiscation, inventory drops)
//! apply at the tick that produced them, not at settlement, so a fallen
//! hunter's drop is claimable while the rest of the party fights on.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use gatefall_behavior::{ActivityEvent, BehaviorEngine};
use gatefall_core::{
    Amount, CurrencyCode, GameConfig, GateGrade, GateId, ItemInstanceId, PlayerId, SessionId,
    Tier, WalletId,
};
use gatefall_gear::{GearTracker, WearInput};
use gatefall_ledger::{Hold, Ledger, MintReason, OpKey};
use gatefall_reward::perturb::loot_quality_bp;
use gatefall_reward::{compute_loot, split_award, LootContext, RollSecret};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::error::{CombatError, CombatResult};
use crate::session::{
    EntrantSpec, GateSession, LifeState, SessionEvent, SessionStatus, Telemetry,
};
use crate::status::StatusEffect;

/// Owner id for items held in drop custody until claimed or archived.
const CUSTODY_OWNER: PlayerId = PlayerId(0);

/// High bit reserved for claim operation keys, keeping them disjoint
/// from every other keyed ledger operation.
const CLAIM_KEY_BIT: u128 = 1 << 126;

/// Purpose tag for the combat stream of a session's RNG.
const PURPOSE_COMBAT: u64 = 0x4657_4c4b;

/// How often the watchdog scans for stalled sessions and expired drops.
const SWEEP_INTERVAL: Duration = Duration::from_millis(250);

// ===== SNAPSHOTS =====

/// Read-only view of one participant.
#[derive(Clone, Debug)]
pub struct ParticipantView {
    /// The player.
    pub player: PlayerId,
    /// Their wallet.
    pub wallet: WalletId,
    /// Current hit points.
    pub hp: u32,
    /// Current mana.
    pub mana: u32,
    /// Life state.
    pub life: LifeState,
    /// Active status effects.
    pub statuses: Vec<StatusEffect>,
    /// Accumulated telemetry.
    pub telemetry: Telemetry,
}

/// What terminal settlement produced.
#[derive(Clone, Debug, Default)]
pub struct SettlementSummary {
    /// Crystals minted for the party before splitting.
    pub crystals_total: Amount,
    /// Per-survivor share actually minted.
    pub shares: Vec<(PlayerId, Amount)>,
    /// Tier of each item granted.
    pub item_tiers: Vec<Tier>,
}

/// Read-only view of a session, republished by its resolver after every
/// step.
#[derive(Clone, Debug)]
pub struct SessionSnapshot {
    /// Session id.
    pub session: SessionId,
    /// The gate.
    pub gate: GateId,
    /// Gate grade.
    pub grade: GateGrade,
    /// Lifecycle state.
    pub status: SessionStatus,
    /// Ticks resolved.
    pub tick: u64,
    /// Beasts still standing.
    pub beasts_remaining: usize,
    /// Participants.
    pub participants: Vec<ParticipantView>,
    /// Present once the session settled.
    pub settlement: Option<SettlementSummary>,
}

fn snapshot_of(session: &GateSession, grade: GateGrade) -> SessionSnapshot {
    SessionSnapshot {
        session: session.id,
        gate: session.gate,
        grade,
        status: session.status(),
        tick: session.tick_count(),
        beasts_remaining: session.beasts_remaining(),
        participants: session
            .participants()
            .iter()
            .map(|p| ParticipantView {
                player: p.spec.player,
                wallet: p.spec.wallet,
                hp: p.hp,
                mana: p.mana,
                life: p.life,
                statuses: p.statuses.iter().map(|s| s.effect).collect(),
                telemetry: p.telemetry,
            })
            .collect(),
        settlement: None,
    }
}

// ===== COMMANDS AND HANDLES =====

enum Command {
    /// Resolve one round now, ahead of the timer.
    Tick,
    Resurrect {
        caster: PlayerId,
        target: PlayerId,
        skill: String,
        reply: Sender<CombatResult<bool>>,
    },
    Cancel,
}

struct SessionHandle {
    commands: Sender<Command>,
    snapshot: Arc<RwLock<SessionSnapshot>>,
    last_progress: Arc<Mutex<Instant>>,
    thread: Option<JoinHandle<()>>,
}

/// A fallen participant's claimable drop.
#[derive(Clone, Debug)]
struct DropRecord {
    id: u64,
    session: SessionId,
    victim: PlayerId,
    currency: Vec<(CurrencyCode, Amount)>,
    items: Vec<ItemInstanceId>,
    created: Instant,
    claimed: bool,
}

// ===== ENGINE =====

struct Inner {
    config: Arc<RwLock<GameConfig>>,
    ledger: Arc<RwLock<Ledger>>,
    gear: Arc<GearTracker>,
    behavior: BehaviorEngine,
    secret: RollSecret,
    /// One registered gate per configured grade row.
    gates: Vec<(GateId, GateGrade)>,
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
    active: Mutex<HashMap<PlayerId, SessionId>>,
    /// Cooldown expiry per (gate, player).
    cooldowns: Mutex<HashMap<(GateId, PlayerId), Instant>>,
    drops: Mutex<Vec<DropRecord>>,
    next_session: AtomicU64,
    next_drop: AtomicU64,
    shutdown: AtomicBool,
}

/// Gate entry and automatic combat resolution.
pub struct CombatEngine {
    inner: Arc<Inner>,
    watchdog: Option<JoinHandle<()>>,
}

impl CombatEngine {
    /// Builds the engine and registers one gate per configured grade.
    /// Spawns the watchdog that fails stalled sessions and archives
    /// expired drops.
    #[must_use]
    pub fn new(
        config: Arc<RwLock<GameConfig>>,
        ledger: Arc<RwLock<Ledger>>,
        gear: Arc<GearTracker>,
        behavior: BehaviorEngine,
        secret: RollSecret,
    ) -> Self {
        let gates = config
            .read()
            .gates
            .iter()
            .enumerate()
            .map(|(idx, spec)| (GateId(idx as u64 + 1), spec.grade))
            .collect();
        let inner = Arc::new(Inner {
            config,
            ledger,
            gear,
            behavior,
            secret,
            gates,
            sessions: RwLock::new(HashMap::new()),
            active: Mutex::new(HashMap::new()),
            cooldowns: Mutex::new(HashMap::new()),
            drops: Mutex::new(Vec::new()),
            next_session: AtomicU64::new(1),
            next_drop: AtomicU64::new(1),
            shutdown: AtomicBool::new(false),
        });
        let watchdog_inner = Arc::clone(&inner);
        let watchdog = thread::Builder::new()
            .name("combat-watchdog".into())
            .spawn(move || {
                while !watchdog_inner.shutdown.load(Ordering::SeqCst) {
                    watchdog_inner.sweep();
                    thread::sleep(SWEEP_INTERVAL);
                }
            })
            .ok();
        Self { inner, watchdog }
    }

    /// Registered gates and their grades.
    #[must_use]
    pub fn gates(&self) -> Vec<(GateId, GateGrade)> {
        self.inner.gates.clone()
    }

    /// Admits a party into a gate and starts its resolver. The session
    /// is active immediately; combat advances on the configured tick
    /// timer with no further input.
    ///
    /// # Errors
    ///
    /// [`CombatError::UnknownGate`], [`CombatError::EmptyParty`],
    /// [`CombatError::PartyTooLarge`], [`CombatError::LevelOutOfRange`],
    /// [`CombatError::AlreadyInSession`], [`CombatError::GateOnCooldown`].
    pub fn enter_gate(
        &self,
        gate: GateId,
        entrants: Vec<EntrantSpec>,
    ) -> CombatResult<SessionId> {
        let inner = &self.inner;
        let grade = inner
            .gates
            .iter()
            .find(|(id, _)| *id == gate)
            .map(|(_, grade)| *grade)
            .ok_or(CombatError::UnknownGate(gate))?;

        let (spec, combat, element_rules) = {
            let config = inner.config.read();
            let spec = config
                .gate(grade)
                .ok_or(CombatError::UnknownGate(gate))?
                .clone();
            (spec, config.combat.clone(), config.elements.clone())
        };

        if entrants.is_empty() {
            return Err(CombatError::EmptyParty);
        }
        if entrants.len() > combat.max_party_size {
            return Err(CombatError::PartyTooLarge {
                size: entrants.len(),
                max: combat.max_party_size,
            });
        }
        for entrant in &entrants {
            if entrant.level < spec.min_level || entrant.level > spec.max_level {
                return Err(CombatError::LevelOutOfRange {
                    player: entrant.player,
                    level: entrant.level,
                    min: spec.min_level,
                    max: spec.max_level,
                });
            }
        }

        let now = Instant::now();
        {
            let cooldowns = inner.cooldowns.lock();
            for entrant in &entrants {
                if let Some(expiry) = cooldowns.get(&(gate, entrant.player)) {
                    if *expiry > now {
                        return Err(CombatError::GateOnCooldown {
                            gate,
                            player: entrant.player,
                            remaining_secs: (*expiry - now).as_secs().max(1),
                        });
                    }
                }
            }
        }

        // Reserve every member atomically before spawning anything.
        let session_id = SessionId(inner.next_session.fetch_add(1, Ordering::SeqCst));
        {
            let mut active = inner.active.lock();
            for entrant in &entrants {
                if let Some(existing) = active.get(&entrant.player) {
                    return Err(CombatError::AlreadyInSession {
                        player: entrant.player,
                        session: *existing,
                    });
                }
            }
            for entrant in &entrants {
                active.insert(entrant.player, session_id);
            }
        }

        let party = entrants.len() > 1;
        let band_mid = spec.min_level + (spec.max_level - spec.min_level) / 2;
        for entrant in &entrants {
            inner.behavior.record_event(
                entrant.player,
                ActivityEvent::GateEntered {
                    grade,
                    risky: entrant.level < band_mid,
                },
            );
            if party {
                inner
                    .behavior
                    .record_event(entrant.player, ActivityEvent::PartyJoined);
            }
        }

        let seed = inner.secret.session_seed(session_id, PURPOSE_COMBAT);
        let mut session = GateSession::new(
            session_id,
            gate,
            spec,
            combat.clone(),
            element_rules,
            entrants,
            seed,
        );
        session.activate();

        let snapshot = Arc::new(RwLock::new(snapshot_of(&session, grade)));
        let last_progress = Arc::new(Mutex::new(Instant::now()));
        let (tx, rx) = bounded::<Command>(64);

        let thread_inner = Arc::clone(inner);
        let thread_snapshot = Arc::clone(&snapshot);
        let thread_progress = Arc::clone(&last_progress);
        let thread = thread::Builder::new()
            .name(format!("gate-session-{}", session_id.0))
            .spawn(move || {
                resolver_loop(
                    &thread_inner,
                    session,
                    grade,
                    &rx,
                    &thread_snapshot,
                    &thread_progress,
                );
            })
            .ok();

        inner.sessions.write().insert(
            session_id,
            SessionHandle {
                commands: tx,
                snapshot,
                last_progress,
                thread,
            },
        );
        debug!(session = session_id.0, gate = gate.0, "session started");
        Ok(session_id)
    }

    /// Current view of a session (live or settled).
    ///
    /// # Errors
    ///
    /// [`CombatError::UnknownSession`].
    pub fn session_status(&self, session: SessionId) -> CombatResult<SessionSnapshot> {
        let sessions = self.inner.sessions.read();
        let handle = sessions
            .get(&session)
            .ok_or(CombatError::UnknownSession(session))?;
        let snapshot = handle.snapshot.read().clone();
        Ok(snapshot)
    }

    /// Forces one combat round ahead of the tick timer. Used by tests
    /// and admin tooling; a no-op once the session is terminal.
    ///
    /// # Errors
    ///
    /// [`CombatError::UnknownSession`].
    pub fn force_tick(&self, session: SessionId) -> CombatResult<()> {
        self.send(session, Command::Tick)
    }

    /// Cancels a live session; it settles as failed.
    ///
    /// # Errors
    ///
    /// [`CombatError::UnknownSession`].
    pub fn cancel(&self, session: SessionId) -> CombatResult<()> {
        self.send(session, Command::Cancel)
    }

    /// Casts a resurrection skill inside a live session. Returns `true`
    /// when the revived target is left in the restricted shadow state,
    /// in which case their wallet hold has been set to match.
    ///
    /// # Errors
    ///
    /// [`CombatError::UnknownSession`], [`CombatError::SessionNotActive`],
    /// plus anything the session-side resurrection rejects.
    pub fn resurrect(
        &self,
        session: SessionId,
        caster: PlayerId,
        target: PlayerId,
        skill: &str,
    ) -> CombatResult<bool> {
        let (reply_tx, reply_rx) = bounded(1);
        self.send(
            session,
            Command::Resurrect {
                caster,
                target,
                skill: skill.to_string(),
                reply: reply_tx,
            },
        )?;
        reply_rx
            .recv_timeout(Duration::from_secs(5))
            .map_err(|_| CombatError::SessionNotActive(session))?
    }

    /// Claims a fallen participant's drop: their confiscated currency
    /// moves from the unclaimed sink into the claimant's wallet and the
    /// dropped items change hands. First claimant wins; the claim is
    /// idempotent at the ledger so a retried call cannot double-pay.
    ///
    /// # Errors
    ///
    /// [`CombatError::NothingToClaim`] when nothing is pending for that
    /// victim (never dropped, already claimed, or archived); ledger and
    /// gear rejections.
    pub fn claim_drops(
        &self,
        session: SessionId,
        victim: PlayerId,
        claimant: PlayerId,
        claimant_wallet: WalletId,
    ) -> CombatResult<(Vec<(CurrencyCode, Amount)>, Vec<ItemInstanceId>)> {
        let inner = &self.inner;
        let claim_window = Duration::from_millis(inner.config.read().combat.claim_window_ms);
        let record = {
            let mut drops = inner.drops.lock();
            let record = drops
                .iter_mut()
                .find(|d| d.session == session && d.victim == victim && !d.claimed)
                .ok_or(CombatError::NothingToClaim(victim))?;
            if record.created.elapsed() > claim_window {
                return Err(CombatError::NothingToClaim(victim));
            }
            record.claimed = true;
            record.clone()
        };

        // The ledger legs are idempotent under their per-drop keys, so a
        // failed attempt unwinds to "unclaimed" and a retry replays any
        // leg that already landed without double-paying.
        if let Err(err) = inner.apply_claim(&record, claimant, claimant_wallet) {
            let mut drops = inner.drops.lock();
            if let Some(r) = drops.iter_mut().find(|d| d.id == record.id) {
                r.claimed = false;
            }
            return Err(err);
        }
        debug!(
            session = session.0,
            victim = victim.0,
            claimant = claimant.0,
            "death drop claimed"
        );
        Ok((record.currency, record.items))
    }

    fn send(&self, session: SessionId, command: Command) -> CombatResult<()> {
        let sessions = self.inner.sessions.read();
        let handle = sessions
            .get(&session)
            .ok_or(CombatError::UnknownSession(session))?;
        handle
            .commands
            .send(command)
            .map_err(|_| CombatError::SessionNotActive(session))
    }
}

impl Drop for CombatEngine {
    fn drop(&mut self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        let handles: Vec<SessionHandle> = {
            let mut sessions = self.inner.sessions.write();
            sessions.drain().map(|(_, h)| h).collect()
        };
        for mut handle in handles {
            let _ = handle.commands.send(Command::Cancel);
            if let Some(thread) = handle.thread.take() {
                let _ = thread.join();
            }
        }
        if let Some(watchdog) = self.watchdog.take() {
            let _ = watchdog.join();
        }
    }
}

impl Inner {
    /// Fails sessions with no tick progress past the watchdog timeout
    /// and archives expired drop records. Archived currency stays in
    /// the unclaimed sink; archived items stay with the custody account.
    fn sweep(&self) {
        let (watchdog_ms, claim_window_ms) = {
            let config = self.config.read();
            (
                config.combat.watchdog_timeout_ms,
                config.combat.claim_window_ms,
            )
        };
        let watchdog = Duration::from_millis(watchdog_ms);
        {
            let sessions = self.sessions.read();
            for (id, handle) in sessions.iter() {
                let stalled = handle.last_progress.lock().elapsed() > watchdog;
                let live = matches!(
                    handle.snapshot.read().status,
                    SessionStatus::Pending | SessionStatus::Active
                );
                if stalled && live {
                    warn!(session = id.0, "watchdog cancelling stalled session");
                    let _ = handle.commands.send(Command::Cancel);
                }
            }
        }
        let claim_window = Duration::from_millis(claim_window_ms);
        let mut drops = self.drops.lock();
        let before = drops.len();
        drops.retain(|d| d.claimed || d.created.elapsed() <= claim_window);
        if drops.len() < before {
            debug!(archived = before - drops.len(), "expired drops archived");
        }
    }

    /// The fallible legs of a drop claim: currency out of the unclaimed
    /// sink, items out of custody. The caller owns the claimed flag and
    /// unwinds it if any leg is rejected.
    fn apply_claim(
        &self,
        record: &DropRecord,
        claimant: PlayerId,
        claimant_wallet: WalletId,
    ) -> CombatResult<()> {
        let ledger = self.ledger.read();
        for (idx, (currency, amount)) in record.currency.iter().enumerate() {
            let key = OpKey(CLAIM_KEY_BIT | (u128::from(record.id) << 8) | idx as u128);
            ledger.claim_from_sink(key, claimant_wallet, *currency, *amount)?;
        }
        for item in &record.items {
            self.gear.reassign(*item, claimant, claimant_wallet)?;
        }
        Ok(())
    }

    /// Death side effects, applied at the tick that produced the death.
    fn on_death(&self, session: SessionId, player: PlayerId, wallet: WalletId) {
        let (penalty_bp, drop_bp) = {
            let config = self.config.read();
            (config.combat.death_penalty_bp, config.combat.death_drop_bp)
        };
        let mut confiscated = Vec::new();
        {
            let ledger = self.ledger.read();
            match ledger.balances(wallet) {
                Ok(balances) => {
                    for (currency, _) in balances {
                        match ledger.confiscate(wallet, currency, penalty_bp) {
                            Ok((_, amount)) if !amount.is_zero() => {
                                confiscated.push((currency, amount));
                            }
                            Ok(_) => {}
                            Err(err) => {
                                warn!(player = player.0, %err, "death penalty failed");
                            }
                        }
                    }
                }
                Err(err) => warn!(player = player.0, %err, "death penalty skipped"),
            }
        }

        let owned = self.gear.owned_by(player);
        let drop_count = owned.len() * drop_bp as usize / 10_000;
        let mut dropped = Vec::with_capacity(drop_count);
        let custody_wallet = self.ledger.read().config().sinks.unclaimed_sink;
        for item in owned.iter().take(drop_count) {
            if self.gear.reassign(item.id, CUSTODY_OWNER, custody_wallet).is_ok() {
                dropped.push(item.id);
            }
        }

        if !confiscated.is_empty() || !dropped.is_empty() {
            self.drops.lock().push(DropRecord {
                id: self.next_drop.fetch_add(1, Ordering::SeqCst),
                session,
                victim: player,
                currency: confiscated,
                items: dropped,
                created: Instant::now(),
                claimed: false,
            });
        }
        self.behavior.record_event(player, ActivityEvent::DiedInGate);
    }

    /// Terminal settlement: loot, wear, behavior, cooldowns. Runs once,
    /// on the resolver thread.
    fn settle(&self, session: &GateSession, grade: GateGrade) -> SettlementSummary {
        let config = self.config.read().clone();
        let completed = session.status() == SessionStatus::Completed;
        let mut summary = SettlementSummary::default();

        let survivors: Vec<_> = session
            .participants()
            .iter()
            .filter(|p| !matches!(p.life, LifeState::Dead))
            .collect();

        if completed && !survivors.is_empty() {
            let quality_sum: u64 = survivors
                .iter()
                .map(|p| u64::from(loot_quality_bp(&self.behavior.profile(p.spec.player))))
                .sum();
            let quality_bp = u32::try_from(quality_sum / survivors.len() as u64).unwrap_or(10_000);

            let award = compute_loot(
                &config,
                &self.secret,
                &LootContext {
                    session: session.id,
                    grade,
                    defeated: session.defeated().to_vec(),
                    party_size: session.participants().len(),
                    quality_bp,
                },
            );
            summary.crystals_total = award.crystals;
            summary.item_tiers = award.items.clone();

            if let Some(crystal) = config.currencies.iter().find(|c| c.gate_reward_eligible) {
                let shares = split_award(award.crystals, survivors.len());
                let ledger = self.ledger.read();
                for (survivor, share) in survivors.iter().zip(shares) {
                    if share.is_zero() {
                        continue;
                    }
                    match ledger.mint(
                        survivor.spec.wallet,
                        crystal.symbol,
                        share,
                        MintReason::GateReward,
                    ) {
                        Ok(_) => summary.shares.push((survivor.spec.player, share)),
                        Err(err) => {
                            // A capped supply forfeits the remainder of
                            // the reward rather than failing the clear.
                            warn!(player = survivor.spec.player.0, %err, "reward mint rejected");
                        }
                    }
                }
            }
        }

        let minutes = session.tick_count() * config.combat.tick_interval_ms / 60_000;
        for participant in session.participants() {
            let equipped = participant.spec.equipped.len() as u64;
            for item in &participant.spec.equipped {
                // Wear is split across the loadout.
                let input = WearInput {
                    damage_taken: (participant.telemetry.damage_taken / equipped.max(1)) as u32,
                    mana_used: (participant.telemetry.mana_used / equipped.max(1)) as u32,
                    minutes_in_gate: minutes as u32,
                };
                if let Err(err) = self.gear.apply_wear(*item, input) {
                    warn!(item = item.0, %err, "wear commit failed");
                }
            }
            let event = if completed {
                ActivityEvent::GateCleared(grade)
            } else {
                ActivityEvent::GateFailed(grade)
            };
            self.behavior.record_event(participant.spec.player, event);
        }

        let cooldown = Duration::from_secs(session.spec.cooldown_secs);
        let expiry = Instant::now() + cooldown;
        {
            let mut cooldowns = self.cooldowns.lock();
            let mut active = self.active.lock();
            for participant in session.participants() {
                cooldowns.insert((session.gate, participant.spec.player), expiry);
                active.remove(&participant.spec.player);
            }
        }
        debug!(
            session = session.id.0,
            completed,
            crystals = summary.crystals_total.raw(),
            "session settled"
        );
        summary
    }
}

fn resolver_loop(
    inner: &Arc<Inner>,
    mut session: GateSession,
    grade: GateGrade,
    commands: &Receiver<Command>,
    snapshot: &Arc<RwLock<SessionSnapshot>>,
    last_progress: &Arc<Mutex<Instant>>,
) {
    let tick_interval = {
        let ms = inner.config.read().combat.tick_interval_ms.max(1);
        Duration::from_millis(ms)
    };
    loop {
        match commands.recv_timeout(tick_interval) {
            Ok(Command::Tick) | Err(RecvTimeoutError::Timeout) => {
                let events = session.tick();
                *last_progress.lock() = Instant::now();
                for event in &events {
                    if let SessionEvent::Died { player, .. } = event {
                        let wallet = session
                            .participants()
                            .iter()
                            .find(|p| p.spec.player == *player)
                            .map(|p| p.spec.wallet);
                        if let Some(wallet) = wallet {
                            inner.on_death(session.id, *player, wallet);
                        }
                    }
                }
            }
            Ok(Command::Resurrect {
                caster,
                target,
                skill,
                reply,
            }) => {
                let result = session.resurrect(caster, target, &skill).and_then(
                    |leaves_shadow| {
                        let wallet = session
                            .participants()
                            .iter()
                            .find(|p| p.spec.player == target)
                            .map(|p| p.spec.wallet);
                        if let Some(wallet) = wallet {
                            let hold = if leaves_shadow { Hold::Shadow } else { Hold::None };
                            inner.ledger.read().set_hold(wallet, hold)?;
                        }
                        Ok(leaves_shadow)
                    },
                );
                let _ = reply.send(result);
            }
            Ok(Command::Cancel) | Err(RecvTimeoutError::Disconnected) => {
                session.fail();
            }
        }

        let terminal = matches!(
            session.status(),
            SessionStatus::Completed | SessionStatus::Failed
        );
        if terminal {
            let summary = inner.settle(&session, grade);
            let mut view = snapshot_of(&session, grade);
            view.settlement = Some(summary);
            *snapshot.write() = view;
            return;
        }
        *snapshot.write() = snapshot_of(&session, grade);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::Skill;
    use gatefall_core::Element;

    fn harness() -> (
        CombatEngine,
        Arc<RwLock<Ledger>>,
        Arc<GearTracker>,
        CurrencyCode,
    ) {
        let mut config = GameConfig::stock();
        // Tests drive ticks by hand; push the timer out of the way.
        config.combat.tick_interval_ms = 60_000;
        config.combat.watchdog_timeout_ms = 600_000;
        let crystal = config
            .currencies
            .iter()
            .find(|c| c.gate_reward_eligible)
            .map(|c| c.symbol)
            .unwrap();
        let config = Arc::new(RwLock::new(config));
        let ledger = Arc::new(RwLock::new(Ledger::new(config.read().clone())));
        let gear = Arc::new(GearTracker::new(Arc::clone(&config), Arc::clone(&ledger)));
        let behavior = BehaviorEngine::spawn(9_000);
        let engine = CombatEngine::new(
            Arc::clone(&config),
            Arc::clone(&ledger),
            Arc::clone(&gear),
            behavior,
            RollSecret::test_secret(),
        );
        (engine, ledger, gear, crystal)
    }

    fn entrant(player: u64, attack: u32) -> EntrantSpec {
        EntrantSpec {
            player: PlayerId(player),
            wallet: WalletId(100 + player),
            level: 5,
            element: Element::Fire,
            attack,
            defense: 50,
            max_hp: 5_000,
            max_mana: 1_000,
            equipped: Vec::new(),
            skills: vec![Skill::basic_attack(), Skill::arise()],
        }
    }

    fn run_to_terminal(engine: &CombatEngine, session: SessionId) -> SessionSnapshot {
        for _ in 0..500 {
            let snap = engine.session_status(session).unwrap();
            if snap.settlement.is_some() {
                return snap;
            }
            let _ = engine.force_tick(session);
            thread::sleep(Duration::from_millis(2));
        }
        engine.session_status(session).unwrap()
    }

    #[test]
    fn clearing_a_gate_mints_crystal_shares() {
        let (engine, ledger, _gear, crystal) = harness();
        let gate = engine.gates()[0].0;
        ledger
            .read()
            .create_wallet(WalletId(101), PlayerId(1))
            .unwrap();
        let session = engine
            .enter_gate(gate, vec![entrant(1, 50_000)])
            .unwrap();
        let snap = run_to_terminal(&engine, session);
        assert_eq!(snap.status, SessionStatus::Completed);
        let settlement = snap.settlement.unwrap();
        assert!(!settlement.crystals_total.is_zero());
        assert_eq!(settlement.shares.len(), 1);
        let (who, share) = settlement.shares[0];
        assert_eq!(who, PlayerId(1));
        assert_eq!(ledger.read().balance(WalletId(101), crystal).unwrap(), share);
    }

    #[test]
    fn entry_checks_party_and_levels() {
        let (engine, ledger, _gear, _crystal) = harness();
        let gate = engine.gates()[0].0;
        for id in 1..=7 {
            ledger
                .read()
                .create_wallet(WalletId(100 + id), PlayerId(id))
                .unwrap();
        }
        assert!(matches!(
            engine.enter_gate(gate, vec![]),
            Err(CombatError::EmptyParty)
        ));
        let party: Vec<_> = (1..=6).map(|id| entrant(id, 100)).collect();
        assert!(matches!(
            engine.enter_gate(gate, party),
            Err(CombatError::PartyTooLarge { size: 6, max: 5 })
        ));
        let mut over = entrant(7, 100);
        over.level = 999;
        assert!(matches!(
            engine.enter_gate(gate, vec![over]),
            Err(CombatError::LevelOutOfRange { .. })
        ));
    }

    #[test]
    fn double_entry_and_cooldown_are_rejected() {
        let (engine, ledger, _gear, _crystal) = harness();
        let gate = engine.gates()[0].0;
        ledger
            .read()
            .create_wallet(WalletId(101), PlayerId(1))
            .unwrap();
        let session = engine.enter_gate(gate, vec![entrant(1, 500)]).unwrap();
        assert!(matches!(
            engine.enter_gate(gate, vec![entrant(1, 500)]),
            Err(CombatError::AlreadyInSession { .. })
        ));
        engine.cancel(session).unwrap();
        let snap = run_to_terminal(&engine, session);
        assert_eq!(snap.status, SessionStatus::Failed);
        assert!(matches!(
            engine.enter_gate(gate, vec![entrant(1, 500)]),
            Err(CombatError::GateOnCooldown { .. })
        ));
    }

    #[test]
    fn death_confiscates_and_the_drop_is_claimable() {
        let (engine, ledger, _gear, crystal) = harness();
        let gate = engine.gates()[0].0;
        for id in 1..=2 {
            ledger
                .read()
                .create_wallet(WalletId(100 + id), PlayerId(id))
                .unwrap();
        }
        ledger
            .read()
            .mint(
                WalletId(101),
                crystal,
                Amount::from_whole(1_000),
                MintReason::Admin,
            )
            .unwrap();

        // Player 1 dies by engine-side fiat: exercise the death path
        // directly rather than waiting out a (random) fatal hit.
        let session = engine
            .enter_gate(gate, vec![entrant(1, 500), entrant(2, 50_000)])
            .unwrap();
        engine
            .inner
            .on_death(session, PlayerId(1), WalletId(101));

        let before = ledger.read().balance(WalletId(101), crystal).unwrap();
        // 10% penalty already gone.
        assert_eq!(before, Amount::from_whole(900));

        let (claimed, items) = engine
            .claim_drops(session, PlayerId(1), PlayerId(2), WalletId(102))
            .unwrap();
        assert!(items.is_empty());
        assert_eq!(claimed, vec![(crystal, Amount::from_whole(100))]);
        assert_eq!(
            ledger.read().balance(WalletId(102), crystal).unwrap(),
            Amount::from_whole(100)
        );

        // Second claim finds nothing.
        assert!(matches!(
            engine.claim_drops(session, PlayerId(1), PlayerId(2), WalletId(102)),
            Err(CombatError::NothingToClaim(PlayerId(1)))
        ));
        engine.cancel(session).unwrap();
        run_to_terminal(&engine, session);
    }

    #[test]
    fn claim_survives_a_transient_ledger_rejection() {
        let (engine, ledger, _gear, crystal) = harness();
        let gate = engine.gates()[0].0;
        for id in 1..=2 {
            ledger
                .read()
                .create_wallet(WalletId(100 + id), PlayerId(id))
                .unwrap();
        }
        ledger
            .read()
            .mint(
                WalletId(102),
                crystal,
                Amount::from_whole(1_000),
                MintReason::Admin,
            )
            .unwrap();
        let session = engine
            .enter_gate(gate, vec![entrant(1, 500), entrant(2, 500)])
            .unwrap();
        engine.inner.on_death(session, PlayerId(2), WalletId(102));

        // A frozen claimant wallet rejects the payout leg...
        ledger.read().set_hold(WalletId(101), Hold::Frozen).unwrap();
        let err = engine
            .claim_drops(session, PlayerId(2), PlayerId(1), WalletId(101))
            .unwrap_err();
        assert!(matches!(
            err,
            CombatError::Ledger(gatefall_ledger::LedgerError::HoldBlocks { .. })
        ));

        // ...but the drop stays claimable, not voided: unfreeze, retry.
        ledger.read().set_hold(WalletId(101), Hold::None).unwrap();
        let (claimed, _items) = engine
            .claim_drops(session, PlayerId(2), PlayerId(1), WalletId(101))
            .unwrap();
        assert_eq!(claimed, vec![(crystal, Amount::from_whole(100))]);
        assert_eq!(
            ledger.read().balance(WalletId(101), crystal).unwrap(),
            Amount::from_whole(100)
        );
        engine.cancel(session).unwrap();
        run_to_terminal(&engine, session);
    }

    #[test]
    fn arise_shadow_blocks_wallet_debits() {
        let (engine, ledger, _gear, crystal) = harness();
        let gate = engine.gates()[0].0;
        for id in 1..=2 {
            ledger
                .read()
                .create_wallet(WalletId(100 + id), PlayerId(id))
                .unwrap();
        }
        ledger
            .read()
            .mint(
                WalletId(102),
                crystal,
                Amount::from_whole(100),
                MintReason::Admin,
            )
            .unwrap();

        let session = engine
            .enter_gate(gate, vec![entrant(1, 500), entrant(2, 500)])
            .unwrap();
        engine.inner.on_death(session, PlayerId(2), WalletId(102));
        // The resurrection precondition path is covered in the session
        // tests; here the shadow hold plumbing is verified end to end.
        ledger
            .read()
            .set_hold(WalletId(102), Hold::Shadow)
            .unwrap();
        let err = ledger
            .read()
            .transfer(
                OpKey(9_999),
                WalletId(102),
                WalletId(101),
                crystal,
                Amount::from_whole(1),
                false,
            )
            .unwrap_err();
        assert!(matches!(err, gatefall_ledger::LedgerError::HoldBlocks { .. }));
        // Credits still land while shadowed.
        ledger
            .read()
            .mint(
                WalletId(102),
                crystal,
                Amount::from_whole(5),
                MintReason::Admin,
            )
            .unwrap();
        engine.cancel(session).unwrap();
        run_to_terminal(&engine, session);
    }
}
