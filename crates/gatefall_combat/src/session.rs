//! The gate session state machine.
//!
//! `pending -> active -> completed | failed`. A session owns its RNG
//! (seeded deterministically per session) and resolves one combat round
//! per tick. It never touches the ledger, gear tracker, or behavior
//! engine directly: ticks emit [`SessionEvent`]s and the engine applies
//! the side effects, so the whole state machine replays from a seed.

use gatefall_core::{
    BeastTier, CombatConfig, Element, ElementPairRule, GateGradeSpec, GateId, ItemInstanceId,
    PlayerId, SessionId, WalletId,
};
use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::beast::{spawn_roster, Beast};
use crate::elements;
use crate::error::{CombatError, CombatResult};
use crate::skills::Skill;
use crate::status::{ActiveStatus, StatusEffect};

/// Session lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    /// Created, not yet resolving.
    Pending,
    /// Resolving ticks.
    Active,
    /// Objectives met.
    Completed,
    /// Timeout, wipe, or cancellation.
    Failed,
}

/// A participant's life state within the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifeState {
    /// Fighting.
    Alive,
    /// Dead (decapitated or at zero HP).
    Dead,
    /// Revived by an Arise-style skill: fights on, but the restricted
    /// shadow state blocks all wallet debits until cleared.
    Shadow,
}

/// Combat telemetry accumulated per participant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Telemetry {
    /// Total damage dealt to beasts.
    pub damage_dealt: u64,
    /// Total damage taken.
    pub damage_taken: u64,
    /// Total mana spent.
    pub mana_used: u64,
}

/// What a player brings into the gate.
#[derive(Clone, Debug)]
pub struct EntrantSpec {
    /// The player.
    pub player: PlayerId,
    /// Their wallet, for settlement and penalties.
    pub wallet: WalletId,
    /// Hunter level.
    pub level: u32,
    /// Elemental affinity (from equipped gear).
    pub element: Element,
    /// Attack stat.
    pub attack: u32,
    /// Defense stat.
    pub defense: u32,
    /// Maximum hit points.
    pub max_hp: u32,
    /// Maximum mana.
    pub max_mana: u32,
    /// Equipped item instances, worn down on session end.
    pub equipped: Vec<ItemInstanceId>,
    /// Known skills; resurrection capabilities live here.
    pub skills: Vec<Skill>,
}

/// Live participant state.
#[derive(Clone, Debug)]
pub struct Participant {
    /// Entry data.
    pub spec: EntrantSpec,
    /// Current hit points.
    pub hp: u32,
    /// Current mana.
    pub mana: u32,
    /// Life state.
    pub life: LifeState,
    /// Active status effects.
    pub statuses: Vec<ActiveStatus>,
    /// Accumulated telemetry.
    pub telemetry: Telemetry,
}

impl Participant {
    fn new(spec: EntrantSpec) -> Self {
        Self {
            hp: spec.max_hp,
            mana: spec.max_mana,
            life: LifeState::Alive,
            statuses: Vec::new(),
            telemetry: Telemetry::default(),
            spec,
        }
    }

    /// Whether the participant takes combat actions this tick.
    #[must_use]
    pub fn can_act(&self) -> bool {
        !matches!(self.life, LifeState::Dead) && !self.has_status(StatusEffect::Frozen)
    }

    /// Whether a status is currently active.
    #[must_use]
    pub fn has_status(&self, effect: StatusEffect) -> bool {
        self.statuses.iter().any(|s| s.effect == effect)
    }

    fn damage_multiplier_bp(&self) -> u32 {
        let mut bp = 10_000u32;
        if self.has_status(StatusEffect::Feared) {
            bp = bp * 5_000 / 10_000;
        }
        if self.has_status(StatusEffect::Dismembered) {
            bp = bp * 7_000 / 10_000;
        }
        bp
    }
}

/// Something a tick decided; the engine turns these into ledger, gear,
/// and behavior side effects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// A participant died. `decapitated` deaths skip the HP path.
    Died {
        /// Who died.
        player: PlayerId,
        /// Was it a decapitation.
        decapitated: bool,
    },
    /// A beast went down.
    BeastKilled {
        /// Its tier, for loot scaling.
        tier: BeastTier,
    },
    /// A status landed on a participant.
    StatusApplied {
        /// The victim.
        player: PlayerId,
        /// The effect.
        effect: StatusEffect,
    },
    /// All beasts dead.
    Completed,
    /// Timeout or party wipe.
    Failed,
}

/// One gate session.
pub struct GateSession {
    /// Session id.
    pub id: SessionId,
    /// The gate entered.
    pub gate: GateId,
    /// Grade row the session runs under.
    pub spec: GateGradeSpec,
    status: SessionStatus,
    rng: ChaCha8Rng,
    participants: Vec<Participant>,
    beasts: Vec<Beast>,
    defeated: Vec<BeastTier>,
    tick_count: u64,
    max_ticks: u64,
    combat: CombatConfig,
    element_rules: Vec<ElementPairRule>,
}

impl GateSession {
    /// Builds a pending session and spawns its beast roster from the
    /// deterministic seed.
    #[must_use]
    pub fn new(
        id: SessionId,
        gate: GateId,
        spec: GateGradeSpec,
        combat: CombatConfig,
        element_rules: Vec<ElementPairRule>,
        entrants: Vec<EntrantSpec>,
        seed: u64,
    ) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let beasts = spawn_roster(&spec, &mut rng);
        let max_ticks = if combat.tick_interval_ms == 0 {
            u64::MAX
        } else {
            spec.time_limit_secs * 1_000 / combat.tick_interval_ms
        };
        Self {
            id,
            gate,
            spec,
            status: SessionStatus::Pending,
            rng,
            participants: entrants.into_iter().map(Participant::new).collect(),
            beasts,
            defeated: Vec::new(),
            tick_count: 0,
            max_ticks,
            combat,
            element_rules,
        }
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> SessionStatus {
        self.status
    }

    /// Ticks resolved so far.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Participant views.
    #[must_use]
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// Tiers of every beast defeated so far.
    #[must_use]
    pub fn defeated(&self) -> &[BeastTier] {
        &self.defeated
    }

    /// Beast views.
    #[must_use]
    pub fn beasts(&self) -> &[Beast] {
        &self.beasts
    }

    /// Beasts still standing.
    #[must_use]
    pub fn beasts_remaining(&self) -> usize {
        self.beasts.iter().filter(|b| b.is_alive()).count()
    }

    /// `pending -> active`.
    pub fn activate(&mut self) {
        if self.status == SessionStatus::Pending {
            self.status = SessionStatus::Active;
        }
    }

    /// Forces the session to `failed` (cancellation, watchdog).
    pub fn fail(&mut self) {
        if matches!(self.status, SessionStatus::Pending | SessionStatus::Active) {
            self.status = SessionStatus::Failed;
        }
    }

    /// Resolves one combat round. No-op unless active.
    pub fn tick(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if self.status != SessionStatus::Active {
            return events;
        }
        self.tick_count += 1;
        if self.tick_count > self.max_ticks {
            self.status = SessionStatus::Failed;
            events.push(SessionEvent::Failed);
            return events;
        }

        self.resolve_status_damage(&mut events);
        self.resolve_beast_statuses(&mut events);
        self.resolve_combat_round(&mut events);

        if self.beasts_remaining() == 0 {
            self.status = SessionStatus::Completed;
            events.push(SessionEvent::Completed);
        } else if self
            .participants
            .iter()
            .all(|p| matches!(p.life, LifeState::Dead))
        {
            self.status = SessionStatus::Failed;
            events.push(SessionEvent::Failed);
        }
        events
    }

    /// One generic resurrection path for every revival skill. The
    /// caster must know a skill tagged with a resurrection capability;
    /// the target must be dead (or, for a non-shadow-leaving raise, a
    /// shadow being upgraded back to full life). Returns `true` when
    /// the revived target is left in shadow state, which the engine
    /// mirrors onto their wallet hold.
    ///
    /// # Errors
    ///
    /// [`CombatError::NotAParticipant`], [`CombatError::CannotResurrect`].
    pub fn resurrect(
        &mut self,
        caster: PlayerId,
        target: PlayerId,
        skill_name: &str,
    ) -> CombatResult<bool> {
        let resurrection = self
            .participant(caster)?
            .spec
            .skills
            .iter()
            .find(|s| s.name == skill_name)
            .and_then(|s| s.grants_resurrection)
            .ok_or(CombatError::CannotResurrect)?;

        let target_state = self.participant(target)?.life;
        let applicable = match target_state {
            LifeState::Dead => true,
            LifeState::Shadow => !resurrection.leaves_shadow,
            LifeState::Alive => false,
        };
        if !applicable {
            return Err(CombatError::CannotResurrect);
        }

        let participant = self.participant_mut(target)?;
        participant.life = if resurrection.leaves_shadow {
            LifeState::Shadow
        } else {
            LifeState::Alive
        };
        participant.hp = participant.spec.max_hp / 2;
        participant
            .statuses
            .retain(|s| s.effect != StatusEffect::Decapitated);
        Ok(resurrection.leaves_shadow)
    }

    fn participant(&self, player: PlayerId) -> CombatResult<&Participant> {
        self.participants
            .iter()
            .find(|p| p.spec.player == player)
            .ok_or(CombatError::NotAParticipant(player))
    }

    fn participant_mut(&mut self, player: PlayerId) -> CombatResult<&mut Participant> {
        self.participants
            .iter_mut()
            .find(|p| p.spec.player == player)
            .ok_or(CombatError::NotAParticipant(player))
    }

    fn resolve_status_damage(&mut self, events: &mut Vec<SessionEvent>) {
        for participant in &mut self.participants {
            if matches!(participant.life, LifeState::Dead) {
                continue;
            }
            let mut dot: u32 = 0;
            for status in &participant.statuses {
                let bp = status.effect.tick_damage_bp();
                if bp > 0 {
                    dot += u32::try_from(
                        u64::from(participant.spec.max_hp) * u64::from(bp) / 10_000,
                    )
                    .unwrap_or(0);
                }
            }
            if dot > 0 {
                participant.hp = participant.hp.saturating_sub(dot);
                participant.telemetry.damage_taken += u64::from(dot);
                if participant.hp == 0 {
                    participant.life = LifeState::Dead;
                    events.push(SessionEvent::Died {
                        player: participant.spec.player,
                        decapitated: false,
                    });
                }
            }
            participant.statuses.retain_mut(ActiveStatus::advance);
        }
    }

    /// One combat round: each acting hunter is paired against the front
    /// living beast. The hunter strikes with their best affordable
    /// attack skill; the paired beast swings back unless the strike
    /// killed or froze it. Beasts without a pair this round do not act.
    fn resolve_combat_round(&mut self, events: &mut Vec<SessionEvent>) {
        for idx in 0..self.participants.len() {
            if !self.participants[idx].can_act() {
                continue;
            }
            // Confusion: a quarter of actions lash out at a random
            // fellow hunter instead of the beasts.
            if self.participants[idx].has_status(StatusEffect::Confused)
                && self.rng.gen_range(0..10_000u32) < 2_500
                && self.participants.len() > 1
            {
                let victim = self.random_other_participant(idx);
                if let Some(victim) = victim {
                    let skill = self.choose_attack_skill(idx);
                    let raw = self.attack_damage(idx, &skill, Element::Neutral);
                    self.spend_mana(idx, skill.mana_cost);
                    let dealt = raw.saturating_sub(self.participants[victim].spec.defense).max(1);
                    let p = &mut self.participants[victim];
                    p.hp = p.hp.saturating_sub(dealt);
                    p.telemetry.damage_taken += u64::from(dealt);
                    if p.hp == 0 {
                        p.life = LifeState::Dead;
                        events.push(SessionEvent::Died {
                            player: p.spec.player,
                            decapitated: false,
                        });
                    }
                }
                continue;
            }

            let Some(target) = self.beasts.iter().position(Beast::is_alive) else {
                return;
            };
            self.strike_beast(idx, target, events);
            if self.beasts[target].can_act() {
                self.beast_retaliates(target, idx, events);
            }
        }
    }

    /// The highest-damage attack skill the participant can afford this
    /// round; an unarmed strike when nothing qualifies.
    fn choose_attack_skill(&self, idx: usize) -> Skill {
        let participant = &self.participants[idx];
        participant
            .spec
            .skills
            .iter()
            .filter(|s| s.attack_bp > 0 && s.mana_cost <= participant.mana)
            .max_by_key(|s| s.attack_bp)
            .cloned()
            .unwrap_or_else(Skill::basic_attack)
    }

    fn spend_mana(&mut self, idx: usize, cost: u32) {
        let participant = &mut self.participants[idx];
        participant.mana = participant.mana.saturating_sub(cost);
        participant.telemetry.mana_used += u64::from(cost);
    }

    fn strike_beast(&mut self, idx: usize, target: usize, events: &mut Vec<SessionEvent>) {
        let skill = self.choose_attack_skill(idx);
        let beast_element = self.beasts[target].element;
        let dealt = self.attack_damage(idx, &skill, beast_element);
        self.spend_mana(idx, skill.mana_cost);
        self.participants[idx].telemetry.damage_dealt += u64::from(dealt);
        self.beasts[target].hp = self.beasts[target].hp.saturating_sub(dealt);
        if !self.beasts[target].is_alive() {
            let tier = self.beasts[target].tier;
            self.defeated.push(tier);
            events.push(SessionEvent::BeastKilled { tier });
            return;
        }
        if let Some((effect, chance_bp)) = skill.inflicts {
            if self.rng.gen_range(0..10_000u32) < chance_bp
                && !self.beasts[target].has_status(effect)
            {
                self.beasts[target].statuses.push(ActiveStatus::new(effect));
            }
        }
    }

    fn attack_damage(&mut self, idx: usize, skill: &Skill, defender_element: Element) -> u32 {
        let participant = &self.participants[idx];
        let element_bp = elements::modifier_bp(
            &self.combat,
            &self.element_rules,
            participant.spec.element,
            defender_element,
        );
        let mut damage = u64::from(participant.spec.attack) * u64::from(element_bp) / 10_000;
        damage = damage * u64::from(skill.attack_bp) / 10_000;
        damage = damage * u64::from(participant.damage_multiplier_bp()) / 10_000;
        if self.rng.gen_range(0..10_000u32) < self.combat.crit_chance_bp {
            damage = damage * u64::from(10_000 + self.combat.crit_bonus_bp) / 10_000;
        }
        u32::try_from(damage.max(1)).unwrap_or(u32::MAX)
    }

    fn random_other_participant(&mut self, idx: usize) -> Option<usize> {
        let candidates: Vec<usize> = self
            .participants
            .iter()
            .enumerate()
            .filter(|(i, p)| *i != idx && !matches!(p.life, LifeState::Dead))
            .map(|(i, _)| i)
            .collect();
        if candidates.is_empty() {
            None
        } else {
            Some(candidates[self.rng.gen_range(0..candidates.len())])
        }
    }

    fn beast_retaliates(&mut self, beast_idx: usize, victim_idx: usize, events: &mut Vec<SessionEvent>) {
        let beast_element = self.beasts[beast_idx].element;
        let victim_element = self.participants[victim_idx].spec.element;
        let element_bp =
            elements::modifier_bp(&self.combat, &self.element_rules, beast_element, victim_element);
        let attack = self.beasts[beast_idx].attack;
        let mut damage = u64::from(attack) * u64::from(element_bp) / 10_000;
        if self.rng.gen_range(0..10_000u32) < self.combat.crit_chance_bp {
            damage = damage * u64::from(10_000 + self.combat.crit_bonus_bp) / 10_000;
        }
        let defense = self.participants[victim_idx].spec.defense;
        let dealt = u32::try_from(damage).unwrap_or(u32::MAX).saturating_sub(defense).max(1);

        // Status roll before HP so a decapitation is attributed
        // even when the hit alone would have been survivable.
        let inflictable = self.beasts[beast_idx].inflictable();
        let candidate = inflictable[self.rng.gen_range(0..inflictable.len())];
        let status_roll = self.rng.gen_range(0..10_000u32);

        let victim = &mut self.participants[victim_idx];
        victim.hp = victim.hp.saturating_sub(dealt);
        victim.telemetry.damage_taken += u64::from(dealt);

        if status_roll < candidate.base_chance_bp() && !victim.has_status(candidate) {
            events.push(SessionEvent::StatusApplied {
                player: victim.spec.player,
                effect: candidate,
            });
            if candidate.is_lethal() {
                victim.hp = 0;
                victim.life = LifeState::Dead;
                victim.statuses.push(ActiveStatus::new(candidate));
                events.push(SessionEvent::Died {
                    player: victim.spec.player,
                    decapitated: true,
                });
                return;
            }
            victim.statuses.push(ActiveStatus::new(candidate));
        }

        if victim.hp == 0 && !matches!(victim.life, LifeState::Dead) {
            victim.life = LifeState::Dead;
            events.push(SessionEvent::Died {
                player: victim.spec.player,
                decapitated: false,
            });
        }
    }

    fn resolve_beast_statuses(&mut self, events: &mut Vec<SessionEvent>) {
        for idx in 0..self.beasts.len() {
            if !self.beasts[idx].is_alive() {
                continue;
            }
            let beast = &mut self.beasts[idx];
            let mut dot: u32 = 0;
            for status in &beast.statuses {
                let bp = status.effect.tick_damage_bp();
                if bp > 0 {
                    dot += u32::try_from(u64::from(beast.max_hp) * u64::from(bp) / 10_000)
                        .unwrap_or(0);
                }
            }
            if dot > 0 {
                beast.hp = beast.hp.saturating_sub(dot);
                if !beast.is_alive() {
                    let tier = beast.tier;
                    self.defeated.push(tier);
                    events.push(SessionEvent::BeastKilled { tier });
                }
            }
            self.beasts[idx].statuses.retain_mut(ActiveStatus::advance);
        }
    }
}
