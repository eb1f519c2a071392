//! Character stat model: equipment, inventory and derived attributes.
//!
//! A [`Character`] exclusively owns one [`Inventory`] and one [`Equipment`].
//! Every item lives in exactly one of the two. Derived attributes are a pure
//! function of base attributes plus equipped items and are rebuilt by
//! [`Character::calculate_stats`] after every equip or unequip.

use crate::dice::Dice;
use crate::items::{
    ids, EquipSlot, Item, ItemCatalog, ItemEffect, ItemError, ItemId, Rarity, StatBlock,
    TemplateId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Inventory size used by every character.
pub const DEFAULT_CAPACITY: usize = 20;

/// Baseline crit chance restored by [`Character::calculate_stats`].
pub const BASE_CRIT_CHANCE: f64 = 0.05;

/// Baseline crit damage multiplier.
pub const BASE_CRIT_DAMAGE: f64 = 1.5;

/// Crit chance gained per point of agility.
pub const CRIT_PER_AGILITY: f64 = 0.001;

/// Dodge chance gained per point of agility.
pub const DODGE_PER_AGILITY: f64 = 0.01;

// ============================================================================
// Errors
// ============================================================================

/// Errors from [`Equipment`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EquipmentError {
    #[error("{item} cannot be worn in the {slot} slot")]
    WrongSlot { item: String, slot: EquipSlot },

    #[error("{0} slot is already occupied")]
    SlotOccupied(EquipSlot),

    #[error("{0} slot is empty")]
    EmptySlot(EquipSlot),
}

/// Errors from [`Inventory`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    #[error("Inventory is full ({0} items)")]
    Full(usize),

    #[error("{0} is equipped and cannot be stored")]
    AlreadyEquipped(String),

    #[error("Item {0} not found")]
    NotFound(ItemId),

    #[error("{0} is equipped and cannot be removed")]
    ItemEquipped(String),

    #[error("Item {0} is not in the source inventory")]
    SourceItemMissing(ItemId),

    #[error("Target inventory is full")]
    TargetFull,
}

/// Errors from [`Character`] operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CharacterError {
    #[error("Invalid stats: {0}")]
    InvalidStats(String),

    #[error("Item {0} not found")]
    ItemNotFound(ItemId),

    #[error("Unknown class: {0}")]
    UnknownClass(String),

    #[error(transparent)]
    Equipment(#[from] EquipmentError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Item(#[from] ItemError),
}

/// A failed insertion that hands the item back to the caller.
#[derive(Debug)]
pub struct Rejected<E> {
    pub error: E,
    pub item: Box<Item>,
}

impl<E> Rejected<E> {
    fn new(error: E, item: Item) -> Self {
        Self {
            error,
            item: Box::new(item),
        }
    }

    pub fn into_error(self) -> E {
        self.error
    }
}

impl<E: fmt::Display> fmt::Display for Rejected<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.error, self.item.name)
    }
}

impl<E: std::error::Error + 'static> std::error::Error for Rejected<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

// ============================================================================
// Equipment
// ============================================================================

/// Worn items, at most one per slot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Equipment {
    slots: BTreeMap<EquipSlot, Item>,
}

impl Equipment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether `item` could be equipped right now.
    pub fn check(&self, item: &Item) -> Result<(), EquipmentError> {
        if !item.is_equippable() {
            return Err(EquipmentError::WrongSlot {
                item: item.name.clone(),
                slot: item.slot,
            });
        }
        if self.slots.contains_key(&item.slot) {
            return Err(EquipmentError::SlotOccupied(item.slot));
        }
        Ok(())
    }

    /// Wear `item` in its slot. On failure the item is handed back untouched.
    pub fn equip(&mut self, mut item: Item) -> Result<(), Rejected<EquipmentError>> {
        if let Err(e) = self.check(&item) {
            return Err(Rejected::new(e, item));
        }
        item.equipped = true;
        self.slots.insert(item.slot, item);
        Ok(())
    }

    /// Take off whatever is in `slot`.
    pub fn unequip(&mut self, slot: EquipSlot) -> Result<Item, EquipmentError> {
        let mut item = self
            .slots
            .remove(&slot)
            .ok_or(EquipmentError::EmptySlot(slot))?;
        item.equipped = false;
        Ok(item)
    }

    pub fn get(&self, slot: EquipSlot) -> Option<&Item> {
        self.slots.get(&slot)
    }

    pub fn weapon(&self) -> Option<&Item> {
        self.get(EquipSlot::Weapon)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Equipped items in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (EquipSlot, &Item)> {
        self.slots.iter().map(|(slot, item)| (*slot, item))
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.slots.values().any(|item| item.id == id)
    }

    /// Sum of the stats of every worn item.
    pub fn total_bonuses(&self) -> StatBlock {
        let mut total = StatBlock::default();
        for item in self.slots.values() {
            total += item.stats;
        }
        total
    }
}

// ============================================================================
// Inventory
// ============================================================================

/// Ordered, capacity-bounded item storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inventory {
    items: Vec<Item>,
    capacity: usize,
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Inventory {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Vec::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    pub fn position(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    /// First item rolled from the given template, if any.
    pub fn find_template(&self, template_id: TemplateId) -> Option<&Item> {
        self.items.iter().find(|item| item.template_id == template_id)
    }

    /// Store `item` at the end of the list.
    pub fn add_item(&mut self, item: Item) -> Result<(), Rejected<InventoryError>> {
        if self.is_full() {
            return Err(Rejected::new(InventoryError::Full(self.capacity), item));
        }
        if item.equipped {
            let error = InventoryError::AlreadyEquipped(item.name.clone());
            return Err(Rejected::new(error, item));
        }
        self.items.push(item);
        Ok(())
    }

    pub fn remove_item(&mut self, id: ItemId) -> Result<Item, InventoryError> {
        let index = self.position(id).ok_or(InventoryError::NotFound(id))?;
        if self.items[index].equipped {
            return Err(InventoryError::ItemEquipped(self.items[index].name.clone()));
        }
        Ok(self.items.remove(index))
    }

    /// Move an item into `target`. Either both inventories change or neither does.
    pub fn transfer_item(&mut self, id: ItemId, target: &mut Inventory) -> Result<(), InventoryError> {
        let index = self
            .position(id)
            .ok_or(InventoryError::SourceItemMissing(id))?;
        if self.items[index].equipped {
            return Err(InventoryError::ItemEquipped(self.items[index].name.clone()));
        }
        if target.is_full() {
            return Err(InventoryError::TargetFull);
        }

        let item = self.items.remove(index);
        if let Err(rejected) = target.add_item(item) {
            self.items.insert(index, *rejected.item);
            return Err(InventoryError::TargetFull);
        }
        Ok(())
    }

    /// Put an item back where it came from, bypassing the capacity check.
    fn restore(&mut self, index: usize, item: Item) {
        let index = index.min(self.items.len());
        self.items.insert(index, item);
    }
}

// ============================================================================
// Character
// ============================================================================

/// Primary attributes fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    pub strength: i32,
    pub agility: i32,
    pub intelligence: i32,
}

/// Coarse health description derived from HP percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Wounded,
    BadlyWounded,
    NearDeath,
    Dead,
}

impl HealthStatus {
    pub fn name(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "Healthy",
            HealthStatus::Wounded => "Wounded",
            HealthStatus::BadlyWounded => "Badly wounded",
            HealthStatus::NearDeath => "Near death",
            HealthStatus::Dead => "Dead",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Character archetypes with preset base stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CharacterClass {
    Warrior,
    Mage,
    Rogue,
}

impl CharacterClass {
    pub fn name(&self) -> &'static str {
        match self {
            CharacterClass::Warrior => "Warrior",
            CharacterClass::Mage => "Mage",
            CharacterClass::Rogue => "Rogue",
        }
    }

    /// `(hp, strength, agility, intelligence)`.
    pub fn base_stats(&self) -> (i32, i32, i32, i32) {
        match self {
            CharacterClass::Warrior => (100, 15, 8, 5),
            CharacterClass::Mage => (70, 5, 8, 15),
            CharacterClass::Rogue => (80, 8, 15, 5),
        }
    }

    pub fn create(&self, name: impl Into<String>) -> Character {
        let (hp, strength, agility, intelligence) = self.base_stats();
        Character::build(name.into(), hp, strength, agility, intelligence)
    }
}

impl std::str::FromStr for CharacterClass {
    type Err = CharacterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "warrior" => Ok(CharacterClass::Warrior),
            "mage" => Ok(CharacterClass::Mage),
            "rogue" => Ok(CharacterClass::Rogue),
            _ => Err(CharacterError::UnknownClass(s.to_string())),
        }
    }
}

impl fmt::Display for CharacterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Result of [`Character::take_damage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageResult {
    pub damage_taken: i32,
    pub dodged: bool,
    pub dropped_to_zero: bool,
}

/// A combatant with base attributes, derived totals and owned items.
#[derive(Debug, Clone)]
pub struct Character {
    name: String,

    current_hp: i32,
    max_hp: i32,
    base_hp: i32,
    mana: i32,
    max_mana: i32,
    base_mana: i32,

    base: Attributes,
    strength: i32,
    agility: i32,
    intelligence: i32,
    attack: f64,
    defense: f64,
    crit_chance: f64,
    crit_damage: f64,
    health_regen: f64,
    mana_regen: f64,

    inventory: Inventory,
    equipment: Equipment,
}

impl Character {
    /// Create a character, rejecting negative HP or any attribute below 1.
    pub fn new(
        name: impl Into<String>,
        hp: i32,
        strength: i32,
        agility: i32,
        intelligence: i32,
    ) -> Result<Self, CharacterError> {
        if hp < 0 {
            return Err(CharacterError::InvalidStats(format!(
                "HP cannot be negative, got {hp}"
            )));
        }
        for (label, value) in [
            ("strength", strength),
            ("agility", agility),
            ("intelligence", intelligence),
        ] {
            if value < 1 {
                return Err(CharacterError::InvalidStats(format!(
                    "{label} must be at least 1, got {value}"
                )));
            }
        }
        Ok(Self::build(name.into(), hp, strength, agility, intelligence))
    }

    fn build(name: String, hp: i32, strength: i32, agility: i32, intelligence: i32) -> Self {
        let mut character = Self {
            name,
            current_hp: hp,
            max_hp: hp,
            base_hp: hp,
            mana: 100,
            max_mana: 100,
            base_mana: 100,
            base: Attributes {
                strength,
                agility,
                intelligence,
            },
            strength,
            agility,
            intelligence,
            attack: 0.0,
            defense: 0.0,
            crit_chance: 0.1,
            crit_damage: BASE_CRIT_DAMAGE,
            health_regen: 0.5,
            mana_regen: 1.0,
            inventory: Inventory::default(),
            equipment: Equipment::new(),
        };
        character.calculate_stats();
        character
    }

    /// Add a Common sword and health potion to the inventory.
    pub fn give_starter_items(&mut self, catalog: &ItemCatalog) -> Result<(), CharacterError> {
        for template_id in [ids::NOVICE_SWORD, ids::HEALTH_POTION] {
            let item = catalog.create_item(template_id, Rarity::Common, 1)?;
            self.inventory
                .add_item(item)
                .map_err(Rejected::into_error)?;
        }
        Ok(())
    }

    /// Rebuild derived attributes from base attributes and worn items.
    pub fn calculate_stats(&mut self) {
        self.max_hp = self.base_hp;
        self.max_mana = self.base_mana;
        self.strength = self.base.strength;
        self.agility = self.base.agility;
        self.intelligence = self.base.intelligence;
        self.attack = 0.0;
        self.defense = 0.0;
        self.crit_chance = BASE_CRIT_CHANCE;
        self.crit_damage = BASE_CRIT_DAMAGE;

        let bonuses = self.equipment.total_bonuses();
        self.strength += bonuses.strength;
        self.agility += bonuses.agility;
        self.intelligence += bonuses.intelligence;
        self.attack += bonuses.attack as f64;
        self.defense += bonuses.defense as f64;
        self.max_hp += bonuses.health;
        self.max_mana += bonuses.mana;

        self.crit_chance += self.agility as f64 * CRIT_PER_AGILITY;

        self.current_hp = self.current_hp.min(self.max_hp);
        self.mana = self.mana.min(self.max_mana);
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hp(&self) -> i32 {
        self.current_hp
    }

    pub fn max_hp(&self) -> i32 {
        self.max_hp
    }

    pub fn mana(&self) -> i32 {
        self.mana
    }

    pub fn max_mana(&self) -> i32 {
        self.max_mana
    }

    pub fn base_attributes(&self) -> Attributes {
        self.base
    }

    /// HP the character was created with, before item bonuses.
    pub fn base_hp(&self) -> i32 {
        self.base_hp
    }

    pub fn strength(&self) -> i32 {
        self.strength
    }

    pub fn agility(&self) -> i32 {
        self.agility
    }

    pub fn intelligence(&self) -> i32 {
        self.intelligence
    }

    pub fn attack(&self) -> f64 {
        self.attack
    }

    pub fn defense(&self) -> f64 {
        self.defense
    }

    pub fn crit_chance(&self) -> f64 {
        self.crit_chance
    }

    pub fn crit_damage(&self) -> f64 {
        self.crit_damage
    }

    pub fn health_regen(&self) -> f64 {
        self.health_regen
    }

    pub fn mana_regen(&self) -> f64 {
        self.mana_regen
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn inventory_mut(&mut self) -> &mut Inventory {
        &mut self.inventory
    }

    pub fn equipment(&self) -> &Equipment {
        &self.equipment
    }

    pub fn is_alive(&self) -> bool {
        self.current_hp > 0
    }

    pub fn status(&self) -> HealthStatus {
        if !self.is_alive() || self.max_hp <= 0 {
            return HealthStatus::Dead;
        }
        let percent = self.current_hp as f64 / self.max_hp as f64 * 100.0;
        if percent >= 80.0 {
            HealthStatus::Healthy
        } else if percent >= 50.0 {
            HealthStatus::Wounded
        } else if percent >= 25.0 {
            HealthStatus::BadlyWounded
        } else {
            HealthStatus::NearDeath
        }
    }

    // ------------------------------------------------------------------
    // Mutators
    // ------------------------------------------------------------------

    /// Apply an incoming hit after a dodge check and defense mitigation.
    pub fn take_damage(&mut self, damage: i32, dice: &mut impl Dice) -> DamageResult {
        let damage = damage.max(0);
        if damage == 0 || !self.is_alive() {
            return DamageResult {
                damage_taken: 0,
                dodged: false,
                dropped_to_zero: false,
            };
        }

        if dice.chance(self.agility as f64 * DODGE_PER_AGILITY) {
            return DamageResult {
                damage_taken: 0,
                dodged: true,
                dropped_to_zero: false,
            };
        }

        let actual = (damage - self.defense as i32).max(1);
        let before = self.current_hp;
        self.current_hp = (self.current_hp - actual).max(0);
        DamageResult {
            damage_taken: before - self.current_hp,
            dodged: false,
            dropped_to_zero: self.current_hp == 0,
        }
    }

    /// Restore `floor(amount)` HP, capped at max. Returns HP actually gained.
    pub fn heal(&mut self, amount: f64) -> i32 {
        if amount <= 0.0 {
            return 0;
        }
        let before = self.current_hp;
        // float-to-int casts saturate
        let gain = amount.floor() as i32;
        self.current_hp = self.current_hp.saturating_add(gain).min(self.max_hp);
        self.current_hp - before
    }

    /// Restore mana, capped at max. Returns mana actually gained.
    pub fn restore_mana(&mut self, amount: i32) -> i32 {
        if amount <= 0 {
            return 0;
        }
        let before = self.mana;
        self.mana = self.mana.saturating_add(amount).min(self.max_mana);
        self.mana - before
    }

    pub fn set_hp(&mut self, hp: i32) {
        self.current_hp = hp.clamp(0, self.max_hp.max(0));
    }

    pub fn set_mana(&mut self, mana: i32) {
        self.mana = mana.clamp(0, self.max_mana.max(0));
    }

    pub fn set_attack(&mut self, attack: f64) {
        self.attack = attack.max(0.0);
    }

    pub fn set_defense(&mut self, defense: f64) {
        self.defense = defense.max(0.0);
    }

    /// Apply one consumable effect to this character.
    ///
    /// Attack and defense boosts are additive and last until the next
    /// [`calculate_stats`](Self::calculate_stats).
    pub fn apply_effect(&mut self, effect: ItemEffect) {
        match effect {
            ItemEffect::Heal(amount) => {
                self.heal(amount as f64);
            }
            ItemEffect::RestoreMana(amount) => {
                self.restore_mana(amount);
            }
            ItemEffect::BoostAttack(amount) => self.set_attack(self.attack + amount as f64),
            ItemEffect::BoostDefense(amount) => self.set_defense(self.defense + amount as f64),
            ItemEffect::HealthRegen(rate) => self.health_regen += rate,
            ItemEffect::ManaRegen(rate) => self.mana_regen += rate,
        }
    }

    /// Move an item from the inventory into its equipment slot.
    pub fn equip_item(&mut self, id: ItemId) -> Result<(), CharacterError> {
        let index = self
            .inventory
            .position(id)
            .ok_or(CharacterError::ItemNotFound(id))?;
        let item = self.inventory.remove_item(id)?;

        if let Err(rejected) = self.equipment.equip(item) {
            self.inventory.restore(index, *rejected.item);
            return Err(rejected.error.into());
        }

        self.calculate_stats();
        tracing::debug!(character = %self.name, item = %id, "equipped item");
        Ok(())
    }

    /// Move whatever is worn in `slot` back into the inventory.
    pub fn unequip_item(&mut self, slot: EquipSlot) -> Result<(), CharacterError> {
        let item = self.equipment.unequip(slot)?;

        if let Err(rejected) = self.inventory.add_item(item) {
            let mut item = *rejected.item;
            item.equipped = true;
            self.equipment.slots.insert(slot, item);
            return Err(rejected.error.into());
        }

        self.calculate_stats();
        tracing::debug!(character = %self.name, %slot, "unequipped item");
        Ok(())
    }

    /// Use an inventory item on this character, discarding it once spent.
    pub fn use_item(&mut self, id: ItemId) -> Result<Vec<ItemEffect>, CharacterError> {
        let item = self
            .inventory
            .get_mut(id)
            .ok_or(CharacterError::ItemNotFound(id))?;
        let effects = item.use_item()?;
        let spent = item.is_broken();

        for effect in &effects {
            self.apply_effect(*effect);
        }
        if spent {
            self.inventory.remove_item(id)?;
        }
        Ok(effects)
    }

    /// Short multi-line stat sheet.
    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("{} ({})", self.name, self.status()),
            format!("  HP: {}/{}  Mana: {}/{}", self.current_hp, self.max_hp, self.mana, self.max_mana),
            format!(
                "  STR {}  AGI {}  INT {}",
                self.strength, self.agility, self.intelligence
            ),
            format!(
                "  Attack {:.1}  Defense {:.1}  Crit {:.1}% x{:.1}",
                self.attack,
                self.defense,
                self.crit_chance * 100.0,
                self.crit_damage
            ),
        ];
        for (slot, item) in self.equipment.iter() {
            lines.push(format!("  [{slot}] {}", item.display_name()));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::ScriptedDice;

    fn catalog() -> ItemCatalog {
        ItemCatalog::standard()
    }

    fn item(template_id: TemplateId) -> Item {
        catalog().create_item(template_id, Rarity::Common, 1).unwrap()
    }

    #[test]
    fn test_constructor_validation() {
        assert!(Character::new("Ok", 0, 1, 1, 1).is_ok());
        assert!(matches!(
            Character::new("Bad", -1, 5, 5, 5),
            Err(CharacterError::InvalidStats(_))
        ));
        assert!(matches!(
            Character::new("Bad", 10, 5, 0, 5),
            Err(CharacterError::InvalidStats(_))
        ));
    }

    #[test]
    fn test_presets() {
        let warrior = CharacterClass::Warrior.create("Conan");
        assert_eq!(warrior.max_hp(), 100);
        assert_eq!(warrior.strength(), 15);
        assert_eq!(warrior.mana(), 100);

        let mage = CharacterClass::Mage.create("Merlin");
        assert_eq!(mage.max_hp(), 70);
        assert_eq!(mage.intelligence(), 15);

        let rogue = CharacterClass::Rogue.create("Vex");
        assert_eq!(rogue.agility(), 15);
        assert!((rogue.crit_chance() - (0.05 + 15.0 * 0.001)).abs() < 1e-9);

        assert_eq!("Mage".parse::<CharacterClass>(), Ok(CharacterClass::Mage));
        assert_eq!("rogue".parse::<CharacterClass>(), Ok(CharacterClass::Rogue));
        assert_eq!(
            "bard".parse::<CharacterClass>(),
            Err(CharacterError::UnknownClass("bard".into()))
        );
    }

    #[test]
    fn test_starter_items() {
        let mut hero = CharacterClass::Warrior.create("Hero");
        hero.give_starter_items(&catalog()).unwrap();
        assert_eq!(hero.inventory().len(), 2);
        assert!(hero.inventory().find_template(ids::NOVICE_SWORD).is_some());
        assert!(hero.inventory().find_template(ids::HEALTH_POTION).is_some());
    }

    #[test]
    fn test_equipment_rules() {
        let mut equipment = Equipment::new();

        let potion = item(ids::HEALTH_POTION);
        let rejected = equipment.equip(potion).unwrap_err();
        assert!(matches!(rejected.error, EquipmentError::WrongSlot { .. }));
        assert!(!rejected.item.equipped);

        equipment.equip(item(ids::NOVICE_SWORD)).unwrap();
        let rejected = equipment.equip(item(ids::SWIFT_BLADE)).unwrap_err();
        assert_eq!(rejected.error, EquipmentError::SlotOccupied(EquipSlot::Weapon));

        equipment.equip(item(ids::CHAIN_VEST)).unwrap();
        equipment.equip(item(ids::SENTINEL_TOTEM)).unwrap();
        let bonuses = equipment.total_bonuses();
        assert_eq!(bonuses.attack, 5);
        assert_eq!(bonuses.defense, 7);
        assert_eq!(bonuses.health, 15);

        let sword = equipment.unequip(EquipSlot::Weapon).unwrap();
        assert!(!sword.equipped);
        assert_eq!(
            equipment.unequip(EquipSlot::Weapon).unwrap_err(),
            EquipmentError::EmptySlot(EquipSlot::Weapon)
        );
    }

    #[test]
    fn test_inventory_rejects_equipped_items() {
        let mut inventory = Inventory::default();
        let mut sword = item(ids::NOVICE_SWORD);
        sword.equipped = true;
        let rejected = inventory.add_item(sword).unwrap_err();
        assert!(matches!(rejected.error, InventoryError::AlreadyEquipped(_)));
        assert!(inventory.is_empty());
    }

    #[test]
    fn test_inventory_remove() {
        let mut inventory = Inventory::default();
        let potion = item(ids::HEALTH_POTION);
        let id = potion.id;
        inventory.add_item(potion).unwrap();

        let missing = ItemId::new();
        assert_eq!(
            inventory.remove_item(missing).unwrap_err(),
            InventoryError::NotFound(missing)
        );
        assert_eq!(inventory.remove_item(id).unwrap().id, id);
        assert!(inventory.is_empty());
    }

    #[test]
    fn test_transfer_moves_item() {
        let mut source = Inventory::default();
        let mut target = Inventory::new(5);
        let potion = item(ids::HEALTH_POTION);
        let id = potion.id;
        source.add_item(potion).unwrap();

        source.transfer_item(id, &mut target).unwrap();
        assert!(source.get(id).is_none());
        assert!(target.get(id).is_some());

        assert_eq!(
            source.transfer_item(id, &mut target).unwrap_err(),
            InventoryError::SourceItemMissing(id)
        );
    }

    #[test]
    fn test_calculate_stats_is_idempotent() {
        let mut hero = Character::new("Hero", 100, 10, 10, 10).unwrap();
        hero.inventory_mut().add_item(item(ids::SWIFT_BLADE)).unwrap();
        let id = hero.inventory().items()[0].id;
        hero.equip_item(id).unwrap();

        let before = (hero.strength(), hero.agility(), hero.attack(), hero.crit_chance());
        hero.calculate_stats();
        hero.calculate_stats();
        let after = (hero.strength(), hero.agility(), hero.attack(), hero.crit_chance());
        assert_eq!(before, after);
        assert_eq!(hero.agility(), 14);
        assert_eq!(hero.attack(), 3.0);
    }

    #[test]
    fn test_equip_unequip_round_trip() {
        let mut hero = Character::new("Hero", 100, 10, 10, 10).unwrap();
        let snapshot = |c: &Character| {
            (
                c.strength(),
                c.agility(),
                c.intelligence(),
                c.attack(),
                c.defense(),
                c.max_hp(),
                c.crit_chance(),
            )
        };
        let before = snapshot(&hero);

        let vest = item(ids::CHAIN_VEST);
        let id = vest.id;
        hero.inventory_mut().add_item(vest).unwrap();
        hero.equip_item(id).unwrap();
        assert_eq!(hero.max_hp(), 115);
        assert_eq!(hero.defense(), 4.0);
        assert!(hero.inventory().is_empty());
        assert!(hero.equipment().contains(id));

        hero.unequip_item(EquipSlot::Body).unwrap();
        assert_eq!(snapshot(&hero), before);
        assert!(hero.inventory().get(id).is_some());
    }

    #[test]
    fn test_failed_equip_restores_inventory_order() {
        let mut hero = Character::new("Hero", 100, 10, 10, 10).unwrap();
        let first = item(ids::HEALTH_POTION);
        let second = item(ids::NOVICE_SWORD);
        let potion_id = first.id;
        hero.inventory_mut().add_item(first).unwrap();
        hero.inventory_mut().add_item(second).unwrap();

        let err = hero.equip_item(potion_id).unwrap_err();
        assert!(matches!(err, CharacterError::Equipment(EquipmentError::WrongSlot { .. })));
        assert_eq!(hero.inventory().items()[0].id, potion_id);
        assert_eq!(hero.inventory().len(), 2);
    }

    #[test]
    fn test_unequip_into_full_inventory_keeps_item_worn() {
        let mut hero = Character::new("Hero", 100, 10, 10, 10).unwrap();
        let sword = item(ids::NOVICE_SWORD);
        let id = sword.id;
        hero.inventory_mut().add_item(sword).unwrap();
        hero.equip_item(id).unwrap();
        while !hero.inventory().is_full() {
            hero.inventory_mut().add_item(item(ids::HEALTH_POTION)).unwrap();
        }

        let err = hero.unequip_item(EquipSlot::Weapon).unwrap_err();
        assert_eq!(err, CharacterError::Inventory(InventoryError::Full(20)));
        assert!(hero.equipment().contains(id));
        assert!(hero.equipment().weapon().unwrap().equipped);
        assert_eq!(hero.attack(), 5.0);
    }

    #[test]
    fn test_take_damage() {
        let mut hero = Character::new("Hero", 50, 10, 10, 10).unwrap();
        let mut dice = ScriptedDice::new();

        let result = hero.take_damage(-5, &mut dice);
        assert_eq!(result.damage_taken, 0);
        assert_eq!(hero.hp(), 50);

        hero.take_damage(10, &mut dice);
        assert_eq!(hero.hp(), 40);

        hero.set_defense(20.0);
        hero.take_damage(5, &mut dice);
        assert_eq!(hero.hp(), 39);

        let result = hero.take_damage(1000, &mut dice);
        assert!(result.dropped_to_zero);
        assert_eq!(hero.hp(), 0);
        assert!(!hero.is_alive());

        hero.take_damage(10, &mut dice);
        assert_eq!(hero.hp(), 0);
    }

    #[test]
    fn test_dodge_negates_hit() {
        let mut hero = Character::new("Hero", 50, 10, 10, 10).unwrap();
        // agility 10 -> 10% dodge
        let mut dice = ScriptedDice::new().with_units([0.05]);
        let result = hero.take_damage(30, &mut dice);
        assert!(result.dodged);
        assert_eq!(hero.hp(), 50);
    }

    #[test]
    fn test_heal_and_clamps() {
        let mut hero = Character::new("Hero", 100, 10, 10, 10).unwrap();
        hero.set_hp(40);
        assert_eq!(hero.heal(0.0), 0);
        assert_eq!(hero.heal(-3.0), 0);
        assert_eq!(hero.heal(10.9), 10);
        assert_eq!(hero.heal(500.0), 50);
        assert_eq!(hero.hp(), 100);

        hero.set_hp(-10);
        assert_eq!(hero.hp(), 0);
        hero.set_hp(1000);
        assert_eq!(hero.hp(), 100);

        hero.set_mana(500);
        assert_eq!(hero.mana(), 100);
        hero.set_attack(-4.0);
        assert_eq!(hero.attack(), 0.0);
    }

    #[test]
    fn test_huge_restores_saturate() {
        let mut hero = Character::new("Hero", 100, 10, 10, 10).unwrap();
        hero.set_hp(40);
        assert_eq!(hero.heal(f64::from(i32::MAX)), 60);
        hero.set_hp(40);
        assert_eq!(hero.heal(f64::INFINITY), 60);
        assert_eq!(hero.hp(), 100);

        hero.set_mana(10);
        assert_eq!(hero.restore_mana(i32::MAX), hero.max_mana() - 10);
        assert_eq!(hero.mana(), hero.max_mana());
    }

    #[test]
    fn test_status_thresholds() {
        let mut hero = Character::new("Hero", 100, 10, 10, 10).unwrap();
        assert_eq!(hero.status(), HealthStatus::Healthy);
        hero.set_hp(79);
        assert_eq!(hero.status(), HealthStatus::Wounded);
        hero.set_hp(49);
        assert_eq!(hero.status(), HealthStatus::BadlyWounded);
        hero.set_hp(24);
        assert_eq!(hero.status(), HealthStatus::NearDeath);
        hero.set_hp(0);
        assert_eq!(hero.status(), HealthStatus::Dead);
    }

    #[test]
    fn test_use_item_spends_consumables() {
        let mut hero = Character::new("Hero", 100, 10, 10, 10).unwrap();
        hero.set_hp(20);
        let potion = item(ids::HEALTH_POTION);
        let potion_id = potion.id;
        let scroll = item(ids::SCROLL_OF_RETURN);
        let scroll_id = scroll.id;
        hero.inventory_mut().add_item(potion).unwrap();
        hero.inventory_mut().add_item(scroll).unwrap();

        let effects = hero.use_item(potion_id).unwrap();
        assert_eq!(effects, vec![ItemEffect::Heal(50)]);
        assert_eq!(hero.hp(), 70);
        assert_eq!(hero.inventory().get(potion_id).unwrap().durability, 99);

        hero.use_item(scroll_id).unwrap();
        assert!(hero.inventory().get(scroll_id).is_none());
    }
}
