//! Combat resolution: damage, strikes and battle item effects.
//!
//! The [`CombatEngine`] owns its [`Dice`] so matches can be replayed from a
//! seed. All arithmetic lives here; [`Character`] only knows how to absorb a
//! hit once the damage number is decided.

use crate::dice::{Dice, RngDice};
use crate::items::{ids, EquipSlot, Item, ItemEffect, ItemError, ItemId, TemplateId};
use crate::world::{Character, DamageResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

// ============================================================================
// Body parts
// ============================================================================

/// Where a strike is aimed or a block is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodyPart {
    Head,
    Torso,
    LeftLeg,
    RightLeg,
    LeftArm,
    RightArm,
}

impl BodyPart {
    pub const ALL: [BodyPart; 6] = [
        BodyPart::Head,
        BodyPart::Torso,
        BodyPart::LeftLeg,
        BodyPart::RightLeg,
        BodyPart::LeftArm,
        BodyPart::RightArm,
    ];

    /// Token used on the wire.
    pub fn wire_name(&self) -> &'static str {
        match self {
            BodyPart::Head => "head",
            BodyPart::Torso => "torso",
            BodyPart::LeftLeg => "left_leg",
            BodyPart::RightLeg => "right_leg",
            BodyPart::LeftArm => "left_arm",
            BodyPart::RightArm => "right_arm",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        BodyPart::ALL.into_iter().find(|p| p.wire_name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            BodyPart::Head => "head",
            BodyPart::Torso => "torso",
            BodyPart::LeftLeg => "left leg",
            BodyPart::RightLeg => "right leg",
            BodyPart::LeftArm => "left arm",
            BodyPart::RightArm => "right arm",
        }
    }

    pub fn multiplier(&self) -> f64 {
        match self {
            BodyPart::Head => 1.5,
            BodyPart::Torso => 1.0,
            BodyPart::LeftLeg | BodyPart::RightLeg => 0.8,
            BodyPart::LeftArm | BodyPart::RightArm => 0.9,
        }
    }

    /// Multiplier for a wire token; unknown parts hit like the torso.
    pub fn multiplier_for(name: &str) -> f64 {
        BodyPart::from_wire(name).map_or(1.0, |p| p.multiplier())
    }
}

impl fmt::Display for BodyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// Combat engine
// ============================================================================

/// Result of a full player attack.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttackOutcome {
    pub attack_part: BodyPart,
    pub block_part: BodyPart,
    /// Damage rolled before the defender's dodge and defense.
    pub damage: i32,
    pub blocked: bool,
    pub critical: bool,
    /// What the defender actually absorbed.
    pub result: DamageResult,
}

impl AttackOutcome {
    fn blocked(attack_part: BodyPart, block_part: BodyPart) -> Self {
        Self {
            attack_part,
            block_part,
            damage: 0,
            blocked: true,
            critical: false,
            result: DamageResult {
                damage_taken: 0,
                dodged: false,
                dropped_to_zero: false,
            },
        }
    }
}

/// Damage and strike resolution over an injected random source.
#[derive(Debug, Clone)]
pub struct CombatEngine<D = RngDice> {
    dice: D,
}

impl Default for CombatEngine<RngDice> {
    fn default() -> Self {
        Self::new(RngDice::from_entropy())
    }
}

impl<D: Dice> CombatEngine<D> {
    pub fn new(dice: D) -> Self {
        Self { dice }
    }

    pub fn dice_mut(&mut self) -> &mut D {
        &mut self.dice
    }

    /// Pick a body part uniformly at random.
    pub fn pick_part(&mut self) -> BodyPart {
        BodyPart::ALL[self.dice.index(BodyPart::ALL.len())]
    }

    /// Raw damage of a hit on `part`, never below 1.
    pub fn calculate_damage(
        &mut self,
        attacker: &Character,
        defender: &Character,
        part: BodyPart,
    ) -> i32 {
        self.damage_with_multiplier(attacker, defender, part.multiplier())
    }

    /// Like [`calculate_damage`](Self::calculate_damage) but keyed by wire name.
    pub fn calculate_damage_for(
        &mut self,
        attacker: &Character,
        defender: &Character,
        part_name: &str,
    ) -> i32 {
        self.damage_with_multiplier(attacker, defender, BodyPart::multiplier_for(part_name))
    }

    fn damage_with_multiplier(
        &mut self,
        attacker: &Character,
        defender: &Character,
        multiplier: f64,
    ) -> i32 {
        let base = attacker.strength() + attacker.attack() as i32;
        let defense = defender.defense() as i32;

        let mut damage = base as f64 * multiplier - defense as f64 * 0.5;
        damage *= self.dice.between(0.9, 1.1);
        damage.max(1.0) as i32
    }

    /// Random hit-versus-block exchange. Matching parts block completely.
    ///
    /// Returns `(0, false)` without rolling when the defender is already down.
    pub fn simple_strike(&mut self, attacker: &Character, defender: &mut Character) -> (i32, bool) {
        if !defender.is_alive() {
            return (0, false);
        }
        let attack_part = self.pick_part();
        let block_part = self.pick_part();
        self.strike(attacker, defender, attack_part, block_part)
    }

    /// Strike with explicit parts. `(damage, blocked)` like [`simple_strike`](Self::simple_strike).
    pub fn strike(
        &mut self,
        attacker: &Character,
        defender: &mut Character,
        attack_part: BodyPart,
        block_part: BodyPart,
    ) -> (i32, bool) {
        if attack_part == block_part {
            return (0, true);
        }
        let damage = self.calculate_damage(attacker, defender, attack_part);
        defender.take_damage(damage, &mut self.dice);
        (damage, false)
    }

    /// Apply an attack with chosen parts. False if the defender was already down.
    pub fn execute_attack(
        &mut self,
        attacker: &Character,
        defender: &mut Character,
        attack_part: BodyPart,
        block_part: BodyPart,
    ) -> bool {
        if !defender.is_alive() {
            return false;
        }
        self.strike(attacker, defender, attack_part, block_part);
        true
    }

    /// The player-facing attack: random parts, block check, crit roll, dodge.
    pub fn player_attack(&mut self, attacker: &Character, defender: &mut Character) -> AttackOutcome {
        let attack_part = self.pick_part();
        let block_part = self.pick_part();
        if attack_part == block_part {
            return AttackOutcome::blocked(attack_part, block_part);
        }

        let mut damage = self.calculate_damage(attacker, defender, attack_part);
        let critical = self.dice.chance(attacker.crit_chance());
        if critical {
            damage = (damage as f64 * attacker.crit_damage()) as i32;
        }

        let result = defender.take_damage(damage, &mut self.dice);
        tracing::debug!(
            attacker = attacker.name(),
            defender = defender.name(),
            part = %attack_part,
            damage,
            critical,
            dodged = result.dodged,
            "attack resolved"
        );

        AttackOutcome {
            attack_part,
            block_part,
            damage,
            blocked: false,
            critical,
            result,
        }
    }
}

/// Upper bound on what `attacker` could roll against `defender` on `part`,
/// including the best variance and a crit.
pub fn max_possible_damage(attacker: &Character, defender: &Character, part_name: &str) -> i32 {
    let base = attacker.strength() + attacker.attack() as i32;
    let defense = defender.defense() as i32;
    let damage = base as f64 * BodyPart::multiplier_for(part_name) - defense as f64 * 0.5;
    (damage * 1.1 * attacker.crit_damage().max(1.0)).max(1.0).ceil() as i32
}

// ============================================================================
// Battle item effects
// ============================================================================

/// Errors from [`ItemEffectManager::use_item`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EffectError {
    #[error("Item {0} not found")]
    NotFound(ItemId),

    #[error("{0} cannot be used in battle")]
    NotUsable(String),

    #[error(transparent)]
    Item(#[from] ItemError),
}

/// Hand-tuned battle effect for a template.
#[derive(Debug, Clone, PartialEq)]
pub struct CuratedEffect {
    pub effects: Vec<ItemEffect>,
    /// Declared duration in turns. Not enforced: boosts last the match.
    pub duration: u32,
}

/// Applies potions and consumables during a fight.
#[derive(Debug, Clone)]
pub struct ItemEffectManager {
    curated: HashMap<TemplateId, CuratedEffect>,
}

impl Default for ItemEffectManager {
    fn default() -> Self {
        let mut curated = HashMap::new();
        curated.insert(
            ids::HEALTH_POTION,
            CuratedEffect {
                effects: vec![ItemEffect::Heal(50)],
                duration: 0,
            },
        );
        curated.insert(
            ids::MANA_POTION,
            CuratedEffect {
                effects: vec![ItemEffect::RestoreMana(30)],
                duration: 0,
            },
        );
        curated.insert(
            ids::STRENGTH_POTION,
            CuratedEffect {
                effects: vec![ItemEffect::BoostAttack(10)],
                duration: 3,
            },
        );
        Self { curated }
    }
}

impl ItemEffectManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Manager with no curated entries; every item falls back to its own effects.
    pub fn uncurated() -> Self {
        Self {
            curated: HashMap::new(),
        }
    }

    pub fn with_curated(mut self, template_id: TemplateId, effect: CuratedEffect) -> Self {
        self.curated.insert(template_id, effect);
        self
    }

    pub fn curated(&self, template_id: TemplateId) -> Option<&CuratedEffect> {
        self.curated.get(&template_id)
    }

    /// Potions and consumables that are neither wearable nor worn.
    pub fn usable_in_battle(item: &Item) -> bool {
        !item.equipped && item.slot == EquipSlot::None && item.is_usable()
    }

    /// Battle-usable items in inventory order.
    pub fn usable_items<'a>(&self, character: &'a Character) -> Vec<&'a Item> {
        character
            .inventory()
            .items()
            .iter()
            .filter(|item| Self::usable_in_battle(item))
            .collect()
    }

    /// Use an inventory item on `user`.
    ///
    /// Curated templates apply their table entry without touching durability;
    /// anything else goes through [`Item::use_item`]. Only positive effects
    /// are applied. The item stays in the inventory.
    pub fn use_item(&self, user: &mut Character, id: ItemId) -> Result<Vec<ItemEffect>, EffectError> {
        let item = user
            .inventory_mut()
            .get_mut(id)
            .ok_or(EffectError::NotFound(id))?;
        if !Self::usable_in_battle(item) {
            return Err(EffectError::NotUsable(item.name.clone()));
        }

        let effects = match self.curated.get(&item.template_id) {
            Some(curated) => curated.effects.clone(),
            None => item.use_item()?,
        };

        let applied: Vec<ItemEffect> = effects.into_iter().filter(is_positive).collect();
        for effect in &applied {
            user.apply_effect(*effect);
        }
        Ok(applied)
    }

    /// One-line description of what using `item` does.
    pub fn describe(&self, item: &Item) -> String {
        let effects = match self.curated.get(&item.template_id) {
            Some(curated) => curated.effects.clone(),
            None => item.effects(),
        };
        let mut parts: Vec<String> = effects
            .iter()
            .filter(|e| is_positive(e))
            .map(ToString::to_string)
            .collect();
        if parts.is_empty() {
            return "Special effect".to_string();
        }
        if let Some(curated) = self.curated.get(&item.template_id) {
            if curated.duration > 0 {
                parts.push(format!("for {} turns", curated.duration));
            }
        }
        parts.join(", ")
    }
}

fn is_positive(effect: &ItemEffect) -> bool {
    match *effect {
        ItemEffect::Heal(n)
        | ItemEffect::RestoreMana(n)
        | ItemEffect::BoostAttack(n)
        | ItemEffect::BoostDefense(n) => n > 0,
        ItemEffect::HealthRegen(r) | ItemEffect::ManaRegen(r) => r > 0.0,
    }
}
