//! Per-client turn arbitration for PvP matches.
//!
//! [`PvpMatch`] is a pure state machine. It never touches a socket: incoming
//! protocol lines arrive as [`MatchEvent`]s, local player commands are method
//! calls, and everything the caller must do (write a line, show a message,
//! close the session) comes back as a list of [`MatchAction`]s.
//!
//! STATE is the only authority over HP and turn ownership. ACTION lines from
//! the opponent are narration, passed through an [`ActionPolicy`] that
//! decides how much of the reported outcome to believe.

use crate::dice::{Dice, RngDice};
use crate::items::{ids, EquipSlot, Item, ItemCatalog, ItemId, Rarity, TemplateId};
use crate::protocol::{Action, InitState, Message, Side, StateUpdate};
use crate::rules::{max_possible_damage, BodyPart, CombatEngine, EffectError, ItemEffectManager};
use crate::world::{Character, CharacterError, InventoryError};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Delay between sending END and closing, so the line can flush.
pub const CLOSE_GRACE: Duration = Duration::from_millis(100);

/// Errors from local match commands.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatchError {
    #[error("The match has not started yet")]
    NotStarted,

    #[error("It is not your turn")]
    NotYourTurn,

    #[error("Waiting for the opponent to confirm the last turn")]
    AwaitingState,

    #[error("The match is over")]
    MatchOver,

    #[error("The connection was lost")]
    Disconnected,

    #[error("No item at position {0}")]
    NoSuchItem(usize),

    #[error(transparent)]
    Effect(#[from] EffectError),

    #[error(transparent)]
    Character(#[from] CharacterError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),
}

// ============================================================================
// Events, actions and phases
// ============================================================================

/// Input from the network side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchEvent {
    /// One received protocol line.
    Line(String),
    /// The read or write path failed.
    Disconnected(String),
}

/// Side effects requested by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchAction {
    /// Write this protocol line.
    Send(String),
    /// Show this message to the player.
    Notify(String),
    /// Close the session once `after` has elapsed.
    Close { after: Duration },
}

/// Where the local client is in the match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchPhase {
    WaitingForMatch,
    MyTurn,
    OpponentTurn,
    /// We acted and are waiting for the STATE echo that hands the turn over.
    WaitingForState,
    MatchOver { winner: Side },
    /// Transport failure. Terminal; no reconnect is attempted.
    Disconnected { reason: String },
}

impl MatchPhase {
    /// Over or disconnected; no further input changes anything.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MatchPhase::MatchOver { .. } | MatchPhase::Disconnected { .. }
        )
    }
}

impl fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchPhase::WaitingForMatch => write!(f, "waiting for an opponent"),
            MatchPhase::MyTurn => write!(f, "your turn"),
            MatchPhase::OpponentTurn => write!(f, "opponent's turn"),
            MatchPhase::WaitingForState => write!(f, "waiting for opponent"),
            MatchPhase::MatchOver { winner } => write!(f, "match over, side {winner} won"),
            MatchPhase::Disconnected { reason } => write!(f, "disconnected: {reason}"),
        }
    }
}

// ============================================================================
// Trust policy
// ============================================================================

/// How much of the opponent's self-reported outcome to believe.
pub trait ActionPolicy {
    /// Inspect an opponent ACTION. A returned string is shown as a warning.
    fn review_action(
        &mut self,
        action: &Action,
        attacker: &Character,
        defender: &Character,
    ) -> Option<String>;

    /// Adjust an incoming STATE before it is applied. `current_hp` is our
    /// HP before the update.
    fn review_state(&mut self, update: StateUpdate, me: Side, current_hp: i32) -> StateUpdate;
}

/// Believe everything. The default for casual play.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustReported;

impl ActionPolicy for TrustReported {
    fn review_action(&mut self, _: &Action, _: &Character, _: &Character) -> Option<String> {
        None
    }

    fn review_state(&mut self, update: StateUpdate, _: Side, _: i32) -> StateUpdate {
        update
    }
}

/// Recompute what the reported attack could have done and clip HP losses
/// beyond it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateReported {
    allowance: Option<i32>,
}

impl ActionPolicy for ValidateReported {
    fn review_action(
        &mut self,
        action: &Action,
        attacker: &Character,
        defender: &Character,
    ) -> Option<String> {
        match action {
            Action::Attack {
                body_part,
                block_part,
                damage,
            } => {
                let bound = if body_part == block_part {
                    0
                } else {
                    max_possible_damage(attacker, defender, body_part)
                };
                self.allowance = Some((*damage).clamp(0, bound));
                (*damage > bound).then(|| {
                    format!("Reported damage {damage} exceeds the possible {bound}; clipping")
                })
            }
            Action::Item { .. } | Action::Surrender => {
                self.allowance = Some(0);
                None
            }
        }
    }

    fn review_state(&mut self, mut update: StateUpdate, me: Side, current_hp: i32) -> StateUpdate {
        let allowance = self.allowance.take().unwrap_or(0);
        let floor = current_hp - allowance;
        if update.hp(me) < floor {
            tracing::warn!(
                reported = update.hp(me),
                clipped = floor,
                "clipping HP loss beyond the reported attack"
            );
            update.set_hp(me, floor);
        }
        update
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Items handed to the local player when a match starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loadout {
    pub items: Vec<TemplateId>,
    /// Template to equip from the loadout.
    pub equip: Option<TemplateId>,
}

impl Default for Loadout {
    fn default() -> Self {
        Self {
            items: vec![
                ids::NOVICE_SWORD,
                ids::SWIFT_BLADE,
                ids::HEAVY_BROADSWORD,
                ids::GUARDIAN_BLADE,
                ids::HEALTH_POTION,
            ],
            equip: Some(ids::NOVICE_SWORD),
        }
    }
}

/// Match tuning.
#[derive(Debug, Clone)]
pub struct PvpConfig {
    pub strength: i32,
    pub agility: i32,
    pub intelligence: i32,
    pub loadout: Loadout,
    pub grace: Duration,
}

impl Default for PvpConfig {
    fn default() -> Self {
        Self {
            strength: 14,
            agility: 7,
            intelligence: 4,
            loadout: Loadout::default(),
            grace: CLOSE_GRACE,
        }
    }
}

impl PvpConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attributes(mut self, strength: i32, agility: i32, intelligence: i32) -> Self {
        self.strength = strength;
        self.agility = agility;
        self.intelligence = intelligence;
        self
    }

    pub fn with_loadout(mut self, loadout: Loadout) -> Self {
        self.loadout = loadout;
        self
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    fn fighter(&self, name: &str, max_hp: i32) -> Result<Character, CharacterError> {
        Character::new(
            name,
            max_hp.max(0),
            self.strength,
            self.agility,
            self.intelligence,
        )
    }
}

/// Give `fighter` the loadout items and wear the configured one.
fn arm(fighter: &mut Character, catalog: &ItemCatalog, loadout: &Loadout) -> Result<(), MatchError> {
    for &template_id in &loadout.items {
        let item = catalog
            .create_item(template_id, Rarity::Common, 1)
            .map_err(CharacterError::from)?;
        fighter
            .inventory_mut()
            .add_item(item)
            .map_err(|rejected| rejected.into_error())?;
    }
    if let Some(template_id) = loadout.equip {
        if let Some(id) = fighter.inventory().find_template(template_id).map(|item| item.id) {
            fighter.equip_item(id)?;
        }
    }
    Ok(())
}

/// `fighter` wearing, in every slot, the catalog piece that adds the most
/// strength plus attack.
///
/// An opponent may swap weapons mid-match without telling us, so reported
/// damage is bounded against this build rather than the enemy model.
fn strongest_build(mut fighter: Character, catalog: &ItemCatalog) -> Result<Character, MatchError> {
    let power = |item: &Item| item.stats.strength + item.stats.attack;

    let mut best: HashMap<EquipSlot, Item> = HashMap::new();
    for template in catalog.iter() {
        let item = catalog
            .create_item(template.id, Rarity::Common, 1)
            .map_err(CharacterError::from)?;
        if !item.is_equippable() || power(&item) <= 0 {
            continue;
        }
        match best.get(&item.slot) {
            Some(current) if power(current) >= power(&item) => {}
            _ => {
                best.insert(item.slot, item);
            }
        }
    }

    for item in best.into_values() {
        let id = item.id;
        fighter
            .inventory_mut()
            .add_item(item)
            .map_err(|rejected| rejected.into_error())?;
        fighter.equip_item(id)?;
    }
    Ok(fighter)
}

// ============================================================================
// Match state machine
// ============================================================================

/// One client's view of a PvP match.
pub struct PvpMatch<D = RngDice, P = TrustReported> {
    config: PvpConfig,
    catalog: ItemCatalog,
    engine: CombatEngine<D>,
    effects: ItemEffectManager,
    policy: P,

    side: Option<Side>,
    player: Character,
    enemy: Character,
    /// The opponent in the hardest-hitting gear the catalog offers.
    enemy_ceiling: Character,
    round: u32,
    turn: Option<Side>,
    phase: MatchPhase,
}

impl PvpMatch<RngDice, TrustReported> {
    /// A match with the standard catalog, entropy-seeded dice and full trust.
    pub fn new(config: PvpConfig) -> Result<Self, MatchError> {
        Self::with_parts(
            config,
            ItemCatalog::standard(),
            CombatEngine::default(),
            TrustReported,
        )
    }
}

impl<D: Dice, P: ActionPolicy> PvpMatch<D, P> {
    pub fn with_parts(
        config: PvpConfig,
        catalog: ItemCatalog,
        engine: CombatEngine<D>,
        policy: P,
    ) -> Result<Self, MatchError> {
        let player = config.fighter("You", 100)?;
        let enemy = config.fighter("Opponent", 100)?;
        let enemy_ceiling = strongest_build(config.fighter("Opponent", 100)?, &catalog)?;
        Ok(Self {
            config,
            catalog,
            engine,
            effects: ItemEffectManager::new(),
            policy,
            side: None,
            player,
            enemy,
            enemy_ceiling,
            round: 0,
            turn: None,
            phase: MatchPhase::WaitingForMatch,
        })
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn phase(&self) -> &MatchPhase {
        &self.phase
    }

    pub fn side(&self) -> Option<Side> {
        self.side
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn turn(&self) -> Option<Side> {
        self.turn
    }

    pub fn player(&self) -> &Character {
        &self.player
    }

    pub fn enemy(&self) -> &Character {
        &self.enemy
    }

    pub fn can_act(&self) -> bool {
        self.phase == MatchPhase::MyTurn
    }

    pub fn is_finished(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn winner(&self) -> Option<Side> {
        match self.phase {
            MatchPhase::MatchOver { winner } => Some(winner),
            _ => None,
        }
    }

    /// Potions and consumables usable this turn, in menu order.
    pub fn usable_items(&self) -> Vec<&Item> {
        self.effects.usable_items(&self.player)
    }

    /// Inventory items that can be worn, in menu order.
    pub fn equippable_items(&self) -> Vec<&Item> {
        self.player
            .inventory()
            .items()
            .iter()
            .filter(|item| item.is_equippable())
            .collect()
    }

    /// Describe a usable item for a menu.
    pub fn describe_item(&self, item: &Item) -> String {
        self.effects.describe(item)
    }

    /// One-line scoreboard.
    pub fn status_line(&self) -> String {
        format!(
            "Round {} | {} {}/{} | {} {}/{} | {}",
            self.round,
            self.player.name(),
            self.player.hp(),
            self.player.max_hp(),
            self.enemy.name(),
            self.enemy.hp(),
            self.enemy.max_hp(),
            self.phase
        )
    }

    // ------------------------------------------------------------------
    // Network input
    // ------------------------------------------------------------------

    /// Feed one network event.
    pub fn handle(&mut self, event: MatchEvent) -> Vec<MatchAction> {
        match event {
            MatchEvent::Line(line) => match Message::parse(&line) {
                Ok(message) => self.handle_message(message),
                Err(e) => {
                    tracing::debug!(%line, error = %e, "ignoring malformed line");
                    Vec::new()
                }
            },
            MatchEvent::Disconnected(reason) => self.handle_disconnect(reason),
        }
    }

    fn handle_message(&mut self, message: Message) -> Vec<MatchAction> {
        if self.is_finished() {
            return Vec::new();
        }

        let waiting = self.phase == MatchPhase::WaitingForMatch;
        match message {
            Message::YouAre(side) if waiting => {
                tracing::info!(%side, "assigned side");
                self.side = Some(side);
                Vec::new()
            }
            Message::Init(init) if waiting => self.start(init),
            Message::Chat(text) => vec![MatchAction::Notify(format!("[chat] {text}"))],
            _ if waiting => Vec::new(),
            Message::Action(action) => self.on_action(action),
            Message::State(update) => self.on_state(update),
            Message::End { winner } => {
                self.phase = MatchPhase::MatchOver { winner };
                vec![
                    MatchAction::Notify(self.result_text(winner)),
                    MatchAction::Close {
                        after: Duration::ZERO,
                    },
                ]
            }
            Message::YouAre(_) | Message::Init(_) => Vec::new(),
        }
    }

    fn start(&mut self, init: InitState) -> Vec<MatchAction> {
        let Some(side) = self.side else {
            tracing::warn!("INIT before YOU_ARE, ignoring");
            return Vec::new();
        };

        let (hp, max) = init.health(side);
        let (enemy_hp, enemy_max) = init.health(side.opponent());
        match (
            self.config.fighter(init.name(side), max),
            self.config.fighter(init.name(side.opponent()), enemy_max),
        ) {
            (Ok(player), Ok(enemy)) => {
                self.player = player;
                self.enemy = enemy;
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!(error = %e, "invalid fighter configuration");
            }
        }
        self.player.set_hp(hp);
        self.enemy.set_hp(enemy_hp);

        // both sides start from the same loadout
        for fighter in [&mut self.player, &mut self.enemy] {
            if let Err(e) = arm(fighter, &self.catalog, &self.config.loadout) {
                tracing::warn!(error = %e, "failed to equip PvP loadout");
            }
        }

        self.round = init.round;
        let turn = init.turn_side().unwrap_or(Side::One);
        self.turn = Some(turn);
        self.phase = if turn == side {
            MatchPhase::MyTurn
        } else {
            MatchPhase::OpponentTurn
        };
        tracing::info!(%side, round = self.round, phase = %self.phase, "match started");

        vec![MatchAction::Notify(format!(
            "Match found! You are {} (side {side}) against {}. {}.",
            self.player.name(),
            self.enemy.name(),
            capitalize(&self.phase.to_string())
        ))]
    }

    fn on_action(&mut self, action: Action) -> Vec<MatchAction> {
        let mut actions = Vec::new();
        let review = self
            .policy
            .review_action(&action, &self.enemy_ceiling, &self.player);
        if let Some(warning) = review {
            tracing::warn!(%warning, "suspicious opponent action");
            actions.push(MatchAction::Notify(warning));
        }

        let opponent = self.enemy.name().to_string();
        match action {
            Action::Surrender => {
                let me = self.side.unwrap_or(Side::One);
                self.phase = MatchPhase::MatchOver { winner: me };
                actions.push(MatchAction::Notify(format!(
                    "{opponent} surrendered. You win!"
                )));
                actions.push(MatchAction::Close {
                    after: Duration::ZERO,
                });
            }
            Action::Attack {
                body_part, damage, ..
            } if !body_part.is_empty() => {
                let part = BodyPart::from_wire(&body_part)
                    .map(|p| p.name().to_string())
                    .unwrap_or(body_part);
                let text = if damage > 0 {
                    format!("{opponent} strikes your {part} for {damage} damage!")
                } else {
                    format!("{opponent} aimed at your {part}, but you blocked!")
                };
                actions.push(MatchAction::Notify(text));
            }
            Action::Attack { .. } => {}
            Action::Item { .. } => {
                actions.push(MatchAction::Notify(format!("{opponent} used an item.")));
            }
        }
        actions
    }

    fn on_state(&mut self, update: StateUpdate) -> Vec<MatchAction> {
        let Some(side) = self.side else {
            return Vec::new();
        };
        let update = self.policy.review_state(update, side, self.player.hp());

        self.round = update.round;
        self.player.set_hp(update.hp(side));
        self.enemy.set_hp(update.hp(side.opponent()));

        let Some(turn) = update.turn_side() else {
            return Vec::new();
        };
        self.turn = Some(turn);
        if turn == side {
            self.phase = MatchPhase::MyTurn;
            vec![MatchAction::Notify(format!(
                "Your turn (round {}). HP {}/{}.",
                self.round,
                self.player.hp(),
                self.player.max_hp()
            ))]
        } else {
            self.phase = MatchPhase::OpponentTurn;
            Vec::new()
        }
    }

    fn handle_disconnect(&mut self, reason: String) -> Vec<MatchAction> {
        if self.is_finished() {
            return Vec::new();
        }
        tracing::warn!(%reason, "connection lost during match");
        self.phase = MatchPhase::Disconnected {
            reason: reason.clone(),
        };
        vec![MatchAction::Notify(format!(
            "Connection lost ({reason}). The match cannot continue."
        ))]
    }

    // ------------------------------------------------------------------
    // Local commands
    // ------------------------------------------------------------------

    fn ensure_can_act(&self) -> Result<Side, MatchError> {
        match &self.phase {
            MatchPhase::MyTurn => self.side.ok_or(MatchError::NotStarted),
            MatchPhase::WaitingForMatch => Err(MatchError::NotStarted),
            MatchPhase::OpponentTurn => Err(MatchError::NotYourTurn),
            MatchPhase::WaitingForState => Err(MatchError::AwaitingState),
            MatchPhase::MatchOver { .. } => Err(MatchError::MatchOver),
            MatchPhase::Disconnected { .. } => Err(MatchError::Disconnected),
        }
    }

    /// Strike the opponent and hand the turn over.
    pub fn attack(&mut self) -> Result<Vec<MatchAction>, MatchError> {
        let side = self.ensure_can_act()?;
        let outcome = self.engine.player_attack(&self.player, &mut self.enemy);

        let enemy = self.enemy.name().to_string();
        let text = if outcome.blocked {
            format!("{enemy} blocked your strike to the {}!", outcome.attack_part)
        } else if outcome.result.dodged {
            format!("{enemy} dodged your strike!")
        } else {
            format!(
                "{}You hit {enemy}'s {} for {} damage. {enemy}: {}/{} HP",
                if outcome.critical { "Critical! " } else { "" },
                outcome.attack_part,
                outcome.result.damage_taken,
                self.enemy.hp(),
                self.enemy.max_hp()
            )
        };

        let mut actions = vec![
            MatchAction::Notify(text),
            send(Message::Action(Action::Attack {
                body_part: outcome.attack_part.wire_name().to_string(),
                block_part: outcome.block_part.wire_name().to_string(),
                damage: outcome.damage,
            })),
        ];
        self.finish_turn(side, &mut actions);
        Ok(actions)
    }

    /// Use the `index`-th entry of [`usable_items`](Self::usable_items).
    pub fn use_item(&mut self, index: usize) -> Result<Vec<MatchAction>, MatchError> {
        let side = self.ensure_can_act()?;
        let (id, name) = self
            .usable_items()
            .get(index)
            .map(|item| (item.id, item.name.clone()))
            .ok_or(MatchError::NoSuchItem(index))?;

        let applied = self.effects.use_item(&mut self.player, id)?;
        self.player.inventory_mut().remove_item(id)?;

        let summary = applied
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let mut actions = vec![
            MatchAction::Notify(format!("You used {name}. {summary}")),
            send(Message::Action(Action::Item { index })),
        ];
        self.finish_turn(side, &mut actions);
        Ok(actions)
    }

    /// Wear the `index`-th entry of [`equippable_items`](Self::equippable_items),
    /// swapping out whatever occupies its slot. Does not end the turn.
    pub fn equip(&mut self, index: usize) -> Result<Vec<MatchAction>, MatchError> {
        self.ensure_can_act()?;
        let (id, slot, name) = self
            .equippable_items()
            .get(index)
            .map(|item| (item.id, item.slot, item.display_name()))
            .ok_or(MatchError::NoSuchItem(index))?;

        self.swap_into(id, slot)?;
        Ok(vec![MatchAction::Notify(format!(
            "Equipped {name}. Attack {:.0}, defense {:.0}.",
            self.player.attack(),
            self.player.defense()
        ))])
    }

    fn swap_into(&mut self, id: ItemId, slot: EquipSlot) -> Result<(), MatchError> {
        let previous = self.player.equipment().get(slot).map(|item| item.id);
        if previous.is_some() {
            self.player.unequip_item(slot)?;
        }
        if let Err(e) = self.player.equip_item(id) {
            if let Some(previous) = previous {
                self.player.equip_item(previous)?;
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Concede. Allowed at any point of a running match.
    pub fn surrender(&mut self) -> Result<Vec<MatchAction>, MatchError> {
        let side = match &self.phase {
            MatchPhase::MyTurn | MatchPhase::OpponentTurn | MatchPhase::WaitingForState => {
                self.side.ok_or(MatchError::NotStarted)?
            }
            MatchPhase::WaitingForMatch => return Err(MatchError::NotStarted),
            MatchPhase::MatchOver { .. } => return Err(MatchError::MatchOver),
            MatchPhase::Disconnected { .. } => return Err(MatchError::Disconnected),
        };
        let winner = side.opponent();
        self.phase = MatchPhase::MatchOver { winner };
        Ok(vec![
            send(Message::Action(Action::Surrender)),
            send(Message::End { winner }),
            MatchAction::Notify("You surrendered.".to_string()),
            MatchAction::Close {
                after: self.config.grace,
            },
        ])
    }

    /// Send a chat line to the opponent.
    pub fn chat(&self, text: &str) -> Result<Vec<MatchAction>, MatchError> {
        match self.phase {
            MatchPhase::MatchOver { .. } => Err(MatchError::MatchOver),
            MatchPhase::Disconnected { .. } => Err(MatchError::Disconnected),
            _ => Ok(vec![send(Message::Chat(text.to_string()))]),
        }
    }

    /// Advance the round, then either end the match or pass the turn.
    fn finish_turn(&mut self, side: Side, actions: &mut Vec<MatchAction>) {
        self.round += 1;

        let winner = if !self.player.is_alive() {
            Some(side.opponent())
        } else if !self.enemy.is_alive() {
            Some(side)
        } else {
            None
        };

        if let Some(winner) = winner {
            self.phase = MatchPhase::MatchOver { winner };
            actions.push(send(Message::End { winner }));
            actions.push(MatchAction::Notify(self.result_text(winner)));
            actions.push(MatchAction::Close {
                after: self.config.grace,
            });
            return;
        }

        let turn = side.opponent();
        self.turn = Some(turn);
        self.phase = MatchPhase::WaitingForState;

        let mut update = StateUpdate {
            round: self.round,
            turn: turn.number(),
            ..Default::default()
        };
        update.set_hp(side, self.player.hp());
        update.set_hp(side.opponent(), self.enemy.hp());
        actions.push(send(Message::State(update)));
    }

    fn result_text(&self, winner: Side) -> String {
        if Some(winner) == self.side {
            "Victory! You won the match.".to_string()
        } else {
            "Defeat. Your opponent won the match.".to_string()
        }
    }
}

fn send(message: Message) -> MatchAction {
    MatchAction::Send(message.to_string())
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::ScriptedDice;

    const INIT: &str =
        "INIT p1name=Player1 p1hp=100 p1max=100 p2name=Player2 p2hp=100 p2max=100 round=1 turn=1";

    fn scripted(dice: ScriptedDice) -> PvpMatch<ScriptedDice, TrustReported> {
        PvpMatch::with_parts(
            PvpConfig::default(),
            ItemCatalog::standard(),
            CombatEngine::new(dice),
            TrustReported,
        )
        .unwrap()
    }

    fn started(side: u8, dice: ScriptedDice) -> PvpMatch<ScriptedDice, TrustReported> {
        let mut m = scripted(dice);
        m.handle(MatchEvent::Line(format!("YOU_ARE {side}")));
        m.handle(MatchEvent::Line(INIT.to_string()));
        m
    }

    fn sent(actions: &[MatchAction]) -> Vec<&str> {
        actions
            .iter()
            .filter_map(|a| match a {
                MatchAction::Send(line) => Some(line.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_waiting_for_match_ignores_input() {
        let mut m = scripted(ScriptedDice::new());
        assert!(m.handle(MatchEvent::Line("STATE round=4 p1hp=1 p2hp=1 turn=1".into())).is_empty());
        assert_eq!(m.attack().unwrap_err(), MatchError::NotStarted);
        assert_eq!(*m.phase(), MatchPhase::WaitingForMatch);
    }

    #[test]
    fn test_init_picks_turn_and_loadout() {
        let one = started(1, ScriptedDice::new());
        assert_eq!(*one.phase(), MatchPhase::MyTurn);
        assert_eq!(one.player().name(), "Player1");
        assert_eq!(one.enemy().name(), "Player2");
        assert_eq!(one.player().strength(), 16);
        assert_eq!(one.player().attack(), 5.0);
        assert_eq!(one.enemy().strength(), 16);
        assert_eq!(one.enemy().attack(), 5.0);
        assert_eq!(one.equippable_items().len(), 3);
        assert_eq!(one.usable_items().len(), 1);

        let mut two = started(2, ScriptedDice::new());
        assert_eq!(*two.phase(), MatchPhase::OpponentTurn);
        assert_eq!(two.attack().unwrap_err(), MatchError::NotYourTurn);
    }

    #[test]
    fn test_init_without_turn_starts_with_side_one() {
        let init = "INIT p1name=Player1 p1hp=100 p1max=100 p2name=Player2 p2hp=100 p2max=100 round=1";
        let phases: Vec<MatchPhase> = [1, 2]
            .into_iter()
            .map(|side| {
                let mut m = scripted(ScriptedDice::new());
                m.handle(MatchEvent::Line(format!("YOU_ARE {side}")));
                m.handle(MatchEvent::Line(init.to_string()));
                assert_eq!(m.turn(), Some(Side::One));
                m.phase().clone()
            })
            .collect();
        assert_eq!(phases, vec![MatchPhase::MyTurn, MatchPhase::OpponentTurn]);
    }

    #[test]
    fn test_attack_sends_action_then_state() {
        // torso vs head, neutral variance, no crit, no dodge
        let mut m = started(1, ScriptedDice::new().with_indices([1, 0]));
        let actions = m.attack().unwrap();
        let lines = sent(&actions);
        // (14 + 2 + 5) * 1.0 = 21
        assert_eq!(lines, vec![
            "ACTION attack torso|head|21",
            "STATE round=2 p1hp=100 p2hp=79 turn=2",
        ]);
        assert_eq!(*m.phase(), MatchPhase::WaitingForState);
        assert_eq!(m.attack().unwrap_err(), MatchError::AwaitingState);
    }

    #[test]
    fn test_state_returns_turn() {
        let mut m = started(1, ScriptedDice::new().with_indices([1, 0]));
        m.attack().unwrap();

        // a STATE without a valid turn does not release us
        m.handle(MatchEvent::Line("STATE round=2 p1hp=100 p2hp=79 turn=0".into()));
        assert_eq!(*m.phase(), MatchPhase::WaitingForState);

        m.handle(MatchEvent::Line("ACTION attack head|torso|12".into()));
        let actions = m.handle(MatchEvent::Line("STATE round=3 p1hp=88 p2hp=79 turn=1".into()));
        assert!(matches!(actions[0], MatchAction::Notify(_)));
        assert_eq!(*m.phase(), MatchPhase::MyTurn);
        assert_eq!(m.player().hp(), 88);
        assert_eq!(m.enemy().hp(), 79);
        assert_eq!(m.round(), 3);
    }

    #[test]
    fn test_killing_blow_ends_match() {
        let mut m = started(1, ScriptedDice::new().with_indices([1, 0]));
        m.handle(MatchEvent::Line("STATE round=1 p1hp=100 p2hp=5 turn=1".into()));

        let actions = m.attack().unwrap();
        assert_eq!(
            sent(&actions),
            vec!["ACTION attack torso|head|21", "END winner=1"]
        );
        assert!(actions.contains(&MatchAction::Close { after: CLOSE_GRACE }));
        assert_eq!(m.winner(), Some(Side::One));
    }

    #[test]
    fn test_use_item_consumes_potion() {
        let mut m = started(2, ScriptedDice::new());
        m.handle(MatchEvent::Line("STATE round=2 p1hp=100 p2hp=30 turn=2".into()));
        assert_eq!(m.player().hp(), 30);

        let actions = m.use_item(0).unwrap();
        assert_eq!(
            sent(&actions),
            vec!["ACTION item 0", "STATE round=3 p1hp=100 p2hp=80 turn=1"]
        );
        assert!(m.usable_items().is_empty());
        assert_eq!(m.use_item(0).unwrap_err(), MatchError::AwaitingState);
    }

    #[test]
    fn test_equip_swaps_weapon_without_ending_turn() {
        let mut m = started(1, ScriptedDice::new());
        let heavy = m
            .equippable_items()
            .iter()
            .position(|item| item.template_id == ids::HEAVY_BROADSWORD)
            .unwrap();
        let actions = m.equip(heavy).unwrap();
        assert!(sent(&actions).is_empty());
        assert_eq!(m.player().attack(), 7.0);
        assert_eq!(m.player().strength(), 15);
        assert_eq!(*m.phase(), MatchPhase::MyTurn);
        assert_eq!(m.equippable_items().len(), 3);
        assert_eq!(m.equip(9).unwrap_err(), MatchError::NoSuchItem(9));
    }

    #[test]
    fn test_surrender() {
        let mut m = started(2, ScriptedDice::new());
        let actions = m.surrender().unwrap();
        assert_eq!(sent(&actions), vec!["ACTION surrender", "END winner=1"]);
        assert_eq!(m.winner(), Some(Side::One));
        assert_eq!(m.surrender().unwrap_err(), MatchError::MatchOver);
    }

    #[test]
    fn test_opponent_surrender_wins() {
        let mut m = started(1, ScriptedDice::new());
        m.handle(MatchEvent::Line("ACTION surrender".into()));
        assert_eq!(m.winner(), Some(Side::One));
        // the trailing END and socket close change nothing
        m.handle(MatchEvent::Line("END winner=1".into()));
        m.handle(MatchEvent::Disconnected("eof".into()));
        assert_eq!(m.winner(), Some(Side::One));
    }

    #[test]
    fn test_end_from_peer() {
        let mut m = started(2, ScriptedDice::new());
        let actions = m.handle(MatchEvent::Line("END winner=1".into()));
        assert_eq!(m.winner(), Some(Side::One));
        assert!(actions.contains(&MatchAction::Close {
            after: Duration::ZERO
        }));
    }

    #[test]
    fn test_disconnect_is_distinct_from_match_over() {
        let mut m = started(1, ScriptedDice::new());
        let actions = m.handle(MatchEvent::Disconnected("connection reset".into()));
        assert!(matches!(
            &actions[..],
            [MatchAction::Notify(text)] if text.contains("connection reset") && !text.contains("menu")
        ));
        assert_eq!(
            *m.phase(),
            MatchPhase::Disconnected {
                reason: "connection reset".into()
            }
        );
        assert_eq!(m.winner(), None);
        assert_eq!(m.attack().unwrap_err(), MatchError::Disconnected);
    }

    #[test]
    fn test_malformed_lines_are_ignored() {
        let mut m = started(1, ScriptedDice::new());
        assert!(m.handle(MatchEvent::Line("STATE round=x".into())).is_empty());
        assert!(m.handle(MatchEvent::Line("GARBAGE".into())).is_empty());
        assert_eq!(*m.phase(), MatchPhase::MyTurn);
    }

    #[test]
    fn test_chat() {
        let mut m = started(1, ScriptedDice::new());
        assert_eq!(
            m.handle(MatchEvent::Line("CHAT gl hf".into())),
            vec![MatchAction::Notify("[chat] gl hf".into())]
        );
        assert_eq!(sent(&m.chat("you too").unwrap()), vec!["CHAT you too"]);
    }

    fn validating(side: u8, dice: ScriptedDice) -> PvpMatch<ScriptedDice, ValidateReported> {
        let mut m = PvpMatch::with_parts(
            PvpConfig::default(),
            ItemCatalog::standard(),
            CombatEngine::new(dice),
            ValidateReported::default(),
        )
        .unwrap();
        m.handle(MatchEvent::Line(format!("YOU_ARE {side}")));
        m.handle(MatchEvent::Line(INIT.into()));
        m
    }

    #[test]
    fn test_validating_policy_clips_inflated_state() {
        let mut m = validating(2, ScriptedDice::new());

        // broadsword and gauntlets: (16 + 7) * 1.5 * 1.1 * 1.5 = 56.925 -> 57
        let actions = m.handle(MatchEvent::Line("ACTION attack head|torso|90".into()));
        assert!(matches!(&actions[0], MatchAction::Notify(text) if text.contains("57")));

        m.handle(MatchEvent::Line("STATE round=2 p1hp=100 p2hp=10 turn=2".into()));
        assert_eq!(m.player().hp(), 43);
        assert_eq!(*m.phase(), MatchPhase::MyTurn);
    }

    #[test]
    fn test_validating_policy_accepts_honest_crit() {
        // head vs torso, variance 1.0999, crit: 31.5 * 1.0999 -> 34, * 1.5 -> 51
        let dice = ScriptedDice::new()
            .with_indices([0, 1])
            .with_units([0.9995, 0.0]);
        let mut attacker = started(1, dice);
        let mut defender = validating(2, ScriptedDice::new());

        let lines: Vec<String> = sent(&attacker.attack().unwrap())
            .into_iter()
            .map(str::to_string)
            .collect();
        assert_eq!(lines[0], "ACTION attack head|torso|51");
        for line in lines {
            let actions = defender.handle(MatchEvent::Line(line));
            assert!(!actions
                .iter()
                .any(|a| matches!(a, MatchAction::Notify(text) if text.contains("exceeds"))));
        }

        assert_eq!(defender.player().hp(), attacker.enemy().hp());
        assert_eq!(defender.player().hp(), 49);
    }

    #[test]
    fn test_trusting_policy_accepts_state() {
        let mut m = started(2, ScriptedDice::new());
        m.handle(MatchEvent::Line("ACTION attack head|torso|90".into()));
        m.handle(MatchEvent::Line("STATE round=2 p1hp=100 p2hp=10 turn=2".into()));
        assert_eq!(m.player().hp(), 10);
    }
}
