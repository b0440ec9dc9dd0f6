//! The assembled Gatefall game core.
//!
//! [`GameCore`] wires the six engine crates together behind one handle:
//! the multi-currency tax ledger, the behavior scoring worker, the
//! behavior-weighted reward engine, the gear tracker, and the automatic
//! gate combat engine, all sharing one hot-reloadable [`GameConfig`].
//! The excluded web/API layer calls these methods with the shapes in
//! [`api`]; nothing here knows about transports.

pub mod api;
pub mod error;

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use gatefall_behavior::{ActivityEvent, BehaviorEngine, BehaviorProfile};
use gatefall_combat::{CombatEngine, SessionSnapshot};
use gatefall_core::{
    Amount, CurrencyCode, GameConfig, GateGrade, GateId, ItemInstanceId, PlayerId, PoolId,
    SessionId, WalletId,
};
use gatefall_gear::{GearTracker, ItemInstance, ItemTemplate, UpgradeOutcome};
use gatefall_ledger::{Hold, Ledger, OpKey};
use gatefall_reward::{perturb, RewardEngine, RollSecret};
use parking_lot::RwLock;
use tracing::info;

use api::{
    BurnRequest, EnterGateRequest, EnterGateResponse, FlipRequest, FlipResponse, MintRequest,
    RollRequest, RollResponse, TransferRequest, TransferResponse, TxResponse,
};
pub use error::{GameError, GameResult};

/// Reserved pool id for deriving item upgrade seeds; no gacha pool may
/// use it.
const UPGRADE_POOL: PoolId = PoolId(u64::MAX);

/// The assembled game core.
pub struct GameCore {
    config: Arc<RwLock<GameConfig>>,
    ledger: Arc<RwLock<Ledger>>,
    behavior: BehaviorEngine,
    reward: RewardEngine,
    gear: Arc<GearTracker>,
    combat: CombatEngine,
    secret: RollSecret,
    next_upgrade: AtomicU64,
}

impl GameCore {
    /// Builds an in-memory core (no journal) from a validated
    /// configuration and the process roll secret.
    #[must_use]
    pub fn new(config: GameConfig, secret: RollSecret) -> Self {
        Self::build(Ledger::new(config.clone()), config, secret)
    }

    /// Builds a journaled core, replaying any existing journal so the
    /// ledger resumes from its last intact commit.
    ///
    /// # Errors
    ///
    /// Journal I/O or replay failures.
    pub fn open(
        config: GameConfig,
        secret: RollSecret,
        journal: impl AsRef<Path>,
    ) -> GameResult<Self> {
        let ledger = Ledger::open(config.clone(), journal)?;
        Ok(Self::build(ledger, config, secret))
    }

    fn build(ledger: Ledger, config: GameConfig, secret: RollSecret) -> Self {
        let behavior = BehaviorEngine::spawn(config.behavior.decay_bp);
        let config = Arc::new(RwLock::new(config));
        let ledger = Arc::new(RwLock::new(ledger));
        let gear = Arc::new(GearTracker::new(Arc::clone(&config), Arc::clone(&ledger)));
        let reward = RewardEngine::new(
            Arc::clone(&config),
            Arc::clone(&ledger),
            behavior.clone(),
            secret,
        );
        let combat = CombatEngine::new(
            Arc::clone(&config),
            Arc::clone(&ledger),
            Arc::clone(&gear),
            behavior.clone(),
            secret,
        );
        Self {
            config,
            ledger,
            behavior,
            reward,
            gear,
            combat,
            secret,
            next_upgrade: AtomicU64::new(0),
        }
    }

    // ===== CONFIGURATION =====

    /// Snapshot of the active configuration.
    #[must_use]
    pub fn config(&self) -> GameConfig {
        self.config.read().clone()
    }

    /// Administrative hot reload from TOML. The candidate is parsed,
    /// validated, then checked against live state (a supply cap below a
    /// currency's circulating supply is rejected) before the swap; a
    /// rejection leaves the old configuration in force everywhere.
    ///
    /// # Errors
    ///
    /// [`GameError::Config`] on parse or invariant failure,
    /// [`GameError::Ledger`] when live state contradicts the candidate.
    pub fn reload_toml(&self, text: &str) -> GameResult<()> {
        self.reload(GameConfig::from_toml_str(text)?)
    }

    /// Hot reload from an already-parsed configuration.
    ///
    /// # Errors
    ///
    /// As [`GameCore::reload_toml`], minus parsing.
    pub fn reload(&self, config: GameConfig) -> GameResult<()> {
        config.validate()?;
        self.ledger.write().reload(config.clone())?;
        *self.config.write() = config;
        info!("configuration reloaded");
        Ok(())
    }

    /// Registers a new currency at runtime, at zero supply.
    ///
    /// # Errors
    ///
    /// [`GameError::Ledger`] if the symbol is taken.
    pub fn register_currency(&self, spec: gatefall_core::CurrencySpec) -> GameResult<()> {
        self.ledger.write().register_currency(spec.clone())?;
        self.config.write().currencies.push(spec);
        Ok(())
    }

    /// Retunes a currency's transfer tax rates.
    ///
    /// # Errors
    ///
    /// [`GameError::Ledger`] for an unknown currency.
    pub fn set_tax_rates(
        &self,
        currency: CurrencyCode,
        base_tax_bp: u32,
        guild_tax_bp: u32,
    ) -> GameResult<()> {
        self.ledger
            .write()
            .set_tax_rates(currency, base_tax_bp, guild_tax_bp)?;
        let mut config = self.config.write();
        if let Some(spec) = config.currencies.iter_mut().find(|c| c.symbol == currency) {
            spec.base_tax_bp = base_tax_bp;
            spec.guild_tax_bp = guild_tax_bp;
        }
        Ok(())
    }

    /// Moves a currency's supply cap. A cap below the circulating
    /// supply is rejected outright.
    ///
    /// # Errors
    ///
    /// [`GameError::Ledger`].
    pub fn set_max_supply(
        &self,
        currency: CurrencyCode,
        cap: Option<Amount>,
    ) -> GameResult<()> {
        self.ledger.write().set_max_supply(currency, cap)?;
        let mut config = self.config.write();
        if let Some(spec) = config.currencies.iter_mut().find(|c| c.symbol == currency) {
            spec.max_supply = cap;
        }
        Ok(())
    }

    // ===== WALLETS AND LEDGER =====

    /// Creates a player wallet.
    ///
    /// # Errors
    ///
    /// [`GameError::Ledger`] if the id is taken.
    pub fn create_wallet(&self, wallet: WalletId, owner: PlayerId) -> GameResult<()> {
        self.ledger.read().create_wallet(wallet, owner)?;
        Ok(())
    }

    /// A wallet's balance in one currency.
    ///
    /// # Errors
    ///
    /// [`GameError::Ledger`] for an unknown wallet or currency.
    pub fn balance(&self, wallet: WalletId, currency: CurrencyCode) -> GameResult<Amount> {
        Ok(self.ledger.read().balance(wallet, currency)?)
    }

    /// All non-zero balances of a wallet.
    ///
    /// # Errors
    ///
    /// [`GameError::Ledger`] for an unknown wallet.
    pub fn balances(&self, wallet: WalletId) -> GameResult<Vec<(CurrencyCode, Amount)>> {
        Ok(self.ledger.read().balances(wallet)?)
    }

    /// Taxed transfer. Retries under the same idempotency key return
    /// the original receipt without moving money again.
    ///
    /// # Errors
    ///
    /// [`GameError::Ledger`].
    pub fn transfer(&self, req: TransferRequest) -> GameResult<TransferResponse> {
        let receipt = self.ledger.read().transfer(
            req.idempotency_key,
            req.from,
            req.to,
            req.currency,
            req.amount,
            req.guild_context,
        )?;
        Ok(TransferResponse {
            transaction_id: receipt.tx,
            net_amount: receipt.net,
            tax_amount: receipt.tax,
        })
    }

    /// Administrative mint.
    ///
    /// # Errors
    ///
    /// [`GameError::Ledger`], notably `SupplyCapExceeded`.
    pub fn mint(&self, req: MintRequest) -> GameResult<TxResponse> {
        let tx = self
            .ledger
            .read()
            .mint(req.wallet, req.currency, req.amount, req.reason)?;
        Ok(TxResponse { transaction_id: tx })
    }

    /// Administrative burn.
    ///
    /// # Errors
    ///
    /// [`GameError::Ledger`].
    pub fn burn(&self, req: BurnRequest) -> GameResult<TxResponse> {
        let tx = self
            .ledger
            .read()
            .burn(req.wallet, req.currency, req.amount)?;
        Ok(TxResponse { transaction_id: tx })
    }

    /// Circulating supply of a currency.
    ///
    /// # Errors
    ///
    /// [`GameError::Ledger`] for an unknown currency.
    pub fn circulating(&self, currency: CurrencyCode) -> GameResult<Amount> {
        Ok(self.ledger.read().circulating(currency)?)
    }

    /// Reconciles held balances against the supply book. Returns the
    /// circulating supply when they agree; an `Integrity` error halts
    /// the currency for manual review when they do not.
    ///
    /// # Errors
    ///
    /// [`GameError::Ledger`].
    pub fn audit(&self, currency: CurrencyCode) -> GameResult<Amount> {
        Ok(self.ledger.read().audit(currency)?)
    }

    /// Administrative wallet freeze/unfreeze.
    ///
    /// # Errors
    ///
    /// [`GameError::Ledger`] for an unknown wallet.
    pub fn set_hold(&self, wallet: WalletId, hold: Hold) -> GameResult<()> {
        self.ledger.read().set_hold(wallet, hold)?;
        Ok(())
    }

    // ===== BEHAVIOR =====

    /// Snapshot of a player's behavior profile.
    #[must_use]
    pub fn profile(&self, player: PlayerId) -> BehaviorProfile {
        self.behavior.profile(player)
    }

    /// Records an activity event against a player's profile. Engine
    /// operations record their own events; this is for signals the
    /// engines never see, such as social actions from a chat service.
    pub fn record_activity(&self, player: PlayerId, event: ActivityEvent) {
        self.behavior.record_event(player, event);
    }

    /// Waits for all queued behavior events to be scored. Test and
    /// shutdown aid; normal operation never needs it.
    pub fn flush_behavior(&self) {
        self.behavior.flush();
    }

    // ===== REWARDS =====

    /// One gacha pull.
    ///
    /// # Errors
    ///
    /// [`GameError::Reward`].
    pub fn roll(&self, req: RollRequest) -> GameResult<RollResponse> {
        let outcome = self.reward.roll(
            req.player,
            req.wallet,
            req.pool,
            req.stake,
            req.idempotency_key,
        )?;
        Ok(RollResponse {
            tier: outcome.tier,
            pity_counter: outcome.pity_after,
            pity_triggered: outcome.pity_triggered,
            seed: outcome.seed,
        })
    }

    /// One coin flip against the band-clamped win probability.
    ///
    /// # Errors
    ///
    /// [`GameError::Reward`].
    pub fn coin_flip(&self, req: FlipRequest) -> GameResult<FlipResponse> {
        let outcome = self
            .reward
            .coin_flip(req.player, req.wallet, req.stake, req.idempotency_key)?;
        Ok(FlipResponse {
            won: outcome.won,
            payout: outcome.payout,
            seed: outcome.seed,
        })
    }

    // ===== GEAR =====

    /// Grants a fresh item instance to a player.
    #[must_use]
    pub fn grant_item(
        &self,
        template: ItemTemplate,
        owner: PlayerId,
        owner_wallet: WalletId,
    ) -> ItemInstanceId {
        self.gear.grant(template, owner, owner_wallet)
    }

    /// Snapshot of an item instance.
    ///
    /// # Errors
    ///
    /// [`GameError::Gear`] for an unknown item.
    pub fn item(&self, id: ItemInstanceId) -> GameResult<ItemInstance> {
        Ok(self.gear.get(id)?)
    }

    /// Items owned by a player.
    #[must_use]
    pub fn items_of(&self, owner: PlayerId) -> Vec<ItemInstance> {
        self.gear.owned_by(owner)
    }

    /// Repairs an item to full durability, charging the configured
    /// price per missing durability point.
    ///
    /// # Errors
    ///
    /// [`GameError::Gear`].
    pub fn repair_item(
        &self,
        id: ItemInstanceId,
        payer: PlayerId,
        payer_wallet: WalletId,
        key: OpKey,
    ) -> GameResult<Amount> {
        Ok(self.gear.repair(id, payer, payer_wallet, key)?)
    }

    /// Attempts one upgrade level on an item. The fee is charged whether
    /// or not the roll succeeds; success odds fall with each level
    /// already gained and bend slightly with the owner's behavior
    /// profile, clamped to [5%, 95%].
    ///
    /// # Errors
    ///
    /// [`GameError::Gear`], notably when the item is broken or the fee
    /// cannot be paid.
    pub fn upgrade_item(
        &self,
        id: ItemInstanceId,
        payer: PlayerId,
        payer_wallet: WalletId,
        key: OpKey,
    ) -> GameResult<UpgradeOutcome> {
        let level = self.gear.get(id)?.level;
        let base_bp = 9_000u32.saturating_sub(level.saturating_mul(800)).max(1_000);
        let profile = self.behavior.profile(payer);
        let quality = u64::from(perturb::loot_quality_bp(&profile));
        #[allow(clippy::cast_possible_truncation)]
        let success_bp = (u64::from(base_bp) * quality / 10_000).clamp(500, 9_500) as u32;
        let counter = self.next_upgrade.fetch_add(1, Ordering::SeqCst);
        let seed = self.secret.pool_roll_seed(payer, UPGRADE_POOL, counter);
        Ok(self
            .gear
            .upgrade(id, payer, payer_wallet, success_bp, seed, key)?)
    }

    /// Player-to-player item trade: taxed payment and ownership change
    /// in one operation. Records a trade event for both sides' behavior
    /// profiles.
    ///
    /// # Errors
    ///
    /// [`GameError::Gear`].
    #[allow(clippy::too_many_arguments)]
    pub fn trade_item(
        &self,
        id: ItemInstanceId,
        seller: PlayerId,
        buyer: PlayerId,
        buyer_wallet: WalletId,
        price: Amount,
        currency: CurrencyCode,
        guild_context: bool,
        key: OpKey,
    ) -> GameResult<()> {
        self.gear
            .trade(id, seller, buyer, buyer_wallet, price, currency, guild_context, key)?;
        self.behavior
            .record_event(seller, ActivityEvent::TradeCompleted);
        self.behavior
            .record_event(buyer, ActivityEvent::TradeCompleted);
        Ok(())
    }

    // ===== GATES =====

    /// Registered gates and their grades.
    #[must_use]
    pub fn gates(&self) -> Vec<(GateId, GateGrade)> {
        self.combat.gates()
    }

    /// Admits a party into a gate; combat resolves automatically from
    /// here.
    ///
    /// # Errors
    ///
    /// [`GameError::Combat`].
    pub fn enter_gate(&self, req: EnterGateRequest) -> GameResult<EnterGateResponse> {
        let session_id = self.combat.enter_gate(req.gate, req.entrants)?;
        Ok(EnterGateResponse { session_id })
    }

    /// Current view of a session: status, participants, telemetry, and
    /// the settlement once terminal.
    ///
    /// # Errors
    ///
    /// [`GameError::Combat`] for an unknown session.
    pub fn session_status(&self, session: SessionId) -> GameResult<SessionSnapshot> {
        Ok(self.combat.session_status(session)?)
    }

    /// Forces one combat round ahead of the timer (admin/test aid).
    ///
    /// # Errors
    ///
    /// [`GameError::Combat`].
    pub fn force_tick(&self, session: SessionId) -> GameResult<()> {
        Ok(self.combat.force_tick(session)?)
    }

    /// Cancels a live session; it settles as failed.
    ///
    /// # Errors
    ///
    /// [`GameError::Combat`].
    pub fn cancel_session(&self, session: SessionId) -> GameResult<()> {
        Ok(self.combat.cancel(session)?)
    }

    /// Casts a resurrection skill inside a live session. Returns `true`
    /// when the target came back in the restricted shadow state.
    ///
    /// # Errors
    ///
    /// [`GameError::Combat`].
    pub fn resurrect(
        &self,
        session: SessionId,
        caster: PlayerId,
        target: PlayerId,
        skill: &str,
    ) -> GameResult<bool> {
        Ok(self.combat.resurrect(session, caster, target, skill)?)
    }

    /// Claims a fallen participant's death drop.
    ///
    /// # Errors
    ///
    /// [`GameError::Combat`].
    pub fn claim_drops(
        &self,
        session: SessionId,
        victim: PlayerId,
        claimant: PlayerId,
        claimant_wallet: WalletId,
    ) -> GameResult<(Vec<(CurrencyCode, Amount)>, Vec<ItemInstanceId>)> {
        Ok(self
            .combat
            .claim_drops(session, victim, claimant, claimant_wallet)?)
    }
}
