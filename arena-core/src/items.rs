//! Item catalog and item instances.
//!
//! Templates are immutable catalog entries keyed by [`TemplateId`]. An [`Item`]
//! is a concrete instance rolled from a template at a given rarity and level,
//! carrying its own scaled stats, durability and a unique [`ItemId`].
//!
//! The catalog is built explicitly and handed to whoever needs it; there is no
//! process-wide item table.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::AddAssign;
use thiserror::Error;
use uuid::Uuid;

/// Catalog key for an [`ItemTemplate`].
pub type TemplateId = u32;

/// Durability every freshly created item starts with.
pub const MAX_DURABILITY: i32 = 100;

/// Absorbs float error so that e.g. 5 * 4.2 floors to 21, not 20.
const ROLL_EPSILON: f64 = 1e-9;

/// Errors from item creation and use.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    #[error("Unknown item template: {0}")]
    InvalidTemplate(TemplateId),

    #[error("Item level must be at least 1, got {0}")]
    InvalidLevel(u32),

    #[error("Unknown rarity tier: {0}")]
    InvalidRarity(u8),

    #[error("{0} cannot be used")]
    CannotUse(String),

    #[error("{0} is broken")]
    Broken(String),
}

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier of an item instance, assigned at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(pub Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Categories, slots and rarity
// ============================================================================

/// Broad kind of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemCategory {
    Weapon,
    Potion,
    Armor,
    Accessory,
    Consumable,
}

impl ItemCategory {
    pub fn name(&self) -> &'static str {
        match self {
            ItemCategory::Weapon => "Weapon",
            ItemCategory::Potion => "Potion",
            ItemCategory::Armor => "Armor",
            ItemCategory::Accessory => "Accessory",
            ItemCategory::Consumable => "Consumable",
        }
    }

    /// Whether items of this category can be consumed with [`Item::use_item`].
    pub fn is_usable(&self) -> bool {
        matches!(self, ItemCategory::Potion | ItemCategory::Consumable)
    }
}

impl fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Equipment slot an item occupies when worn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EquipSlot {
    Weapon,
    Head,
    Body,
    Hands,
    Feet,
    Boots,
    Accessory,
    /// The item cannot be worn.
    None,
}

impl EquipSlot {
    /// Every slot an item can actually be equipped into.
    pub const WEARABLE: [EquipSlot; 7] = [
        EquipSlot::Weapon,
        EquipSlot::Head,
        EquipSlot::Body,
        EquipSlot::Hands,
        EquipSlot::Feet,
        EquipSlot::Boots,
        EquipSlot::Accessory,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EquipSlot::Weapon => "Weapon",
            EquipSlot::Head => "Head",
            EquipSlot::Body => "Body",
            EquipSlot::Hands => "Hands",
            EquipSlot::Feet => "Feet",
            EquipSlot::Boots => "Boots",
            EquipSlot::Accessory => "Accessory",
            EquipSlot::None => "None",
        }
    }

    /// Whether an item of `category` may be stored in this slot.
    pub fn accepts(&self, category: ItemCategory) -> bool {
        match self {
            EquipSlot::Weapon => category == ItemCategory::Weapon,
            EquipSlot::Head
            | EquipSlot::Body
            | EquipSlot::Hands
            | EquipSlot::Feet
            | EquipSlot::Boots => category == ItemCategory::Armor,
            EquipSlot::Accessory => category == ItemCategory::Accessory,
            EquipSlot::None => false,
        }
    }
}

impl fmt::Display for EquipSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Six rarity tiers, each scaling an item's stats and price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
    Mythic,
}

impl Rarity {
    pub const ALL: [Rarity; 6] = [
        Rarity::Common,
        Rarity::Uncommon,
        Rarity::Rare,
        Rarity::Epic,
        Rarity::Legendary,
        Rarity::Mythic,
    ];

    pub fn multiplier(&self) -> f64 {
        match self {
            Rarity::Common => 1.0,
            Rarity::Uncommon => 1.3,
            Rarity::Rare => 1.7,
            Rarity::Epic => 2.2,
            Rarity::Legendary => 3.0,
            Rarity::Mythic => 4.0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Rarity::Common => "Common",
            Rarity::Uncommon => "Uncommon",
            Rarity::Rare => "Rare",
            Rarity::Epic => "Epic",
            Rarity::Legendary => "Legendary",
            Rarity::Mythic => "Mythic",
        }
    }

    /// Look up a rarity by its numeric tier (0 = Common .. 5 = Mythic).
    pub fn from_tier(tier: u8) -> Result<Self, ItemError> {
        Rarity::ALL
            .get(tier as usize)
            .copied()
            .ok_or(ItemError::InvalidRarity(tier))
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// Stats
// ============================================================================

/// The seven primary stat grants of an item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatBlock {
    pub strength: i32,
    pub agility: i32,
    pub intelligence: i32,
    pub attack: i32,
    pub defense: i32,
    pub health: i32,
    pub mana: i32,
}

impl StatBlock {
    /// Scale every stat by `multiplier`, flooring each result.
    pub fn scaled(&self, multiplier: f64) -> Self {
        let roll = |base: i32| (base as f64 * multiplier + ROLL_EPSILON).floor() as i32;
        Self {
            strength: roll(self.strength),
            agility: roll(self.agility),
            intelligence: roll(self.intelligence),
            attack: roll(self.attack),
            defense: roll(self.defense),
            health: roll(self.health),
            mana: roll(self.mana),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl AddAssign for StatBlock {
    fn add_assign(&mut self, other: Self) {
        self.strength += other.strength;
        self.agility += other.agility;
        self.intelligence += other.intelligence;
        self.attack += other.attack;
        self.defense += other.defense;
        self.health += other.health;
        self.mana += other.mana;
    }
}

/// Secondary modifiers. Only shown in descriptions; combat ignores them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Modifiers {
    pub health_regen: f64,
    pub mana_regen: f64,
    pub attack_speed: f64,
    pub evasion: f64,
    pub critical_chance: f64,
    pub magic_amp: f64,
    pub lifesteal: f64,
    /// Declared effect duration in turns.
    pub duration: u32,
}

// ============================================================================
// Effects
// ============================================================================

/// A single effect produced by consuming an item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ItemEffect {
    Heal(i32),
    RestoreMana(i32),
    BoostAttack(i32),
    BoostDefense(i32),
    HealthRegen(f64),
    ManaRegen(f64),
}

impl fmt::Display for ItemEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemEffect::Heal(n) => write!(f, "Restores {n} HP"),
            ItemEffect::RestoreMana(n) => write!(f, "Restores {n} mana"),
            ItemEffect::BoostAttack(n) => write!(f, "+{n} attack"),
            ItemEffect::BoostDefense(n) => write!(f, "+{n} defense"),
            ItemEffect::HealthRegen(r) => write!(f, "+{r} HP regeneration"),
            ItemEffect::ManaRegen(r) => write!(f, "+{r} mana regeneration"),
        }
    }
}

// ============================================================================
// Templates and catalog
// ============================================================================

/// Immutable catalog entry describing a kind of item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemTemplate {
    pub id: TemplateId,
    pub name: String,
    pub category: ItemCategory,
    pub slot: EquipSlot,
    pub description: String,
    pub stats: StatBlock,
    pub modifiers: Modifiers,
}

impl ItemTemplate {
    pub fn new(
        id: TemplateId,
        name: impl Into<String>,
        category: ItemCategory,
        slot: EquipSlot,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            category,
            slot,
            description: String::new(),
            stats: StatBlock::default(),
            modifiers: Modifiers::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_stats(mut self, stats: StatBlock) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// Template ids used by presets and the curated effect table.
pub mod ids {
    use super::TemplateId;

    pub const NOVICE_SWORD: TemplateId = 1;
    pub const RING_OF_REGENERATION: TemplateId = 4;
    pub const HEALTH_POTION: TemplateId = 19;
    pub const SCROLL_OF_RETURN: TemplateId = 20;
    pub const SENTINEL_TOTEM: TemplateId = 21;
    pub const MANA_POTION: TemplateId = 22;
    pub const STRENGTH_POTION: TemplateId = 23;
    pub const SWIFT_BLADE: TemplateId = 24;
    pub const HEAVY_BROADSWORD: TemplateId = 25;
    pub const GUARDIAN_BLADE: TemplateId = 26;
    pub const LEATHER_CAP: TemplateId = 30;
    pub const CHAIN_VEST: TemplateId = 31;
    pub const IRON_GAUNTLETS: TemplateId = 32;
    pub const SOFT_SHOES: TemplateId = 33;
    pub const TRAVEL_BOOTS: TemplateId = 34;
}

/// Immutable mapping from template id to template.
#[derive(Debug, Clone, Default)]
pub struct ItemCatalog {
    templates: BTreeMap<TemplateId, ItemTemplate>,
}

impl ItemCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from an explicit list of templates.
    ///
    /// Later entries replace earlier ones with the same id.
    pub fn from_templates(templates: impl IntoIterator<Item = ItemTemplate>) -> Self {
        Self {
            templates: templates.into_iter().map(|t| (t.id, t)).collect(),
        }
    }

    /// The standard game catalog.
    pub fn standard() -> Self {
        Self::from_templates(standard_templates())
    }

    pub fn get(&self, id: TemplateId) -> Option<&ItemTemplate> {
        self.templates.get(&id)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemTemplate> {
        self.templates.values()
    }

    /// Find a template by case-insensitive name.
    pub fn find_by_name(&self, name: &str) -> Option<&ItemTemplate> {
        let name_lower = name.to_lowercase();
        self.templates
            .values()
            .find(|t| t.name.to_lowercase() == name_lower)
    }

    /// Roll a new item instance from a template.
    pub fn create_item(
        &self,
        template_id: TemplateId,
        rarity: Rarity,
        level: u32,
    ) -> Result<Item, ItemError> {
        let template = self
            .get(template_id)
            .ok_or(ItemError::InvalidTemplate(template_id))?;
        Item::from_template(template, rarity, level)
    }
}

fn standard_templates() -> Vec<ItemTemplate> {
    use ids::*;

    vec![
        ItemTemplate::new(NOVICE_SWORD, "Novice Sword", ItemCategory::Weapon, EquipSlot::Weapon)
            .with_description("A plain blade handed to every recruit.")
            .with_stats(StatBlock {
                attack: 5,
                strength: 2,
                ..Default::default()
            }),
        ItemTemplate::new(
            RING_OF_REGENERATION,
            "Ring of Regeneration",
            ItemCategory::Accessory,
            EquipSlot::Accessory,
        )
        .with_description("A warm band that slowly knits wounds closed.")
        .with_stats(StatBlock {
            health: 10,
            ..Default::default()
        })
        .with_modifiers(Modifiers {
            health_regen: 1.0,
            ..Default::default()
        }),
        ItemTemplate::new(HEALTH_POTION, "Health Potion", ItemCategory::Potion, EquipSlot::None)
            .with_description("Restores a portion of health.")
            .with_stats(StatBlock {
                health: 50,
                ..Default::default()
            }),
        ItemTemplate::new(
            SCROLL_OF_RETURN,
            "Scroll of Return",
            ItemCategory::Consumable,
            EquipSlot::None,
        )
        .with_description("Carries the reader back to town. Burns up when read."),
        ItemTemplate::new(
            SENTINEL_TOTEM,
            "Sentinel Totem",
            ItemCategory::Accessory,
            EquipSlot::Accessory,
        )
        .with_description("A carved charm that hardens the skin.")
        .with_stats(StatBlock {
            defense: 3,
            ..Default::default()
        }),
        ItemTemplate::new(MANA_POTION, "Mana Potion", ItemCategory::Potion, EquipSlot::None)
            .with_description("Restores a portion of mana.")
            .with_stats(StatBlock {
                mana: 30,
                ..Default::default()
            }),
        ItemTemplate::new(
            STRENGTH_POTION,
            "Strength Potion",
            ItemCategory::Potion,
            EquipSlot::None,
        )
        .with_description("Bitter draught that sharpens every blow.")
        .with_stats(StatBlock {
            attack: 10,
            ..Default::default()
        })
        .with_modifiers(Modifiers {
            duration: 3,
            ..Default::default()
        }),
        ItemTemplate::new(SWIFT_BLADE, "Swift Blade", ItemCategory::Weapon, EquipSlot::Weapon)
            .with_description("Light and quick, favoured by duelists.")
            .with_stats(StatBlock {
                attack: 3,
                agility: 4,
                ..Default::default()
            }),
        ItemTemplate::new(
            HEAVY_BROADSWORD,
            "Heavy Broadsword",
            ItemCategory::Weapon,
            EquipSlot::Weapon,
        )
        .with_description("Slow, but it hits like a falling tree.")
        .with_stats(StatBlock {
            attack: 7,
            strength: 1,
            ..Default::default()
        }),
        ItemTemplate::new(
            GUARDIAN_BLADE,
            "Guardian Blade",
            ItemCategory::Weapon,
            EquipSlot::Weapon,
        )
        .with_description("A broad guard turns aside careless strikes.")
        .with_stats(StatBlock {
            attack: 4,
            defense: 2,
            ..Default::default()
        }),
        ItemTemplate::new(LEATHER_CAP, "Leather Cap", ItemCategory::Armor, EquipSlot::Head)
            .with_description("Boiled leather, better than nothing.")
            .with_stats(StatBlock {
                defense: 1,
                ..Default::default()
            }),
        ItemTemplate::new(CHAIN_VEST, "Chain Vest", ItemCategory::Armor, EquipSlot::Body)
            .with_description("Riveted rings over a padded jerkin.")
            .with_stats(StatBlock {
                defense: 4,
                health: 15,
                ..Default::default()
            }),
        ItemTemplate::new(
            IRON_GAUNTLETS,
            "Iron Gauntlets",
            ItemCategory::Armor,
            EquipSlot::Hands,
        )
        .with_description("Heavy gloves that add weight to a punch.")
        .with_stats(StatBlock {
            defense: 1,
            strength: 1,
            ..Default::default()
        }),
        ItemTemplate::new(SOFT_SHOES, "Soft Shoes", ItemCategory::Armor, EquipSlot::Feet)
            .with_description("Quiet footwear for quick feet.")
            .with_stats(StatBlock {
                agility: 1,
                ..Default::default()
            }),
        ItemTemplate::new(TRAVEL_BOOTS, "Travel Boots", ItemCategory::Armor, EquipSlot::Boots)
            .with_description("Sturdy boots for the long road.")
            .with_stats(StatBlock {
                defense: 1,
                agility: 2,
                ..Default::default()
            }),
    ]
}

// ============================================================================
// Item instances
// ============================================================================

/// A concrete item rolled from a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub template_id: TemplateId,
    pub name: String,
    pub category: ItemCategory,
    pub slot: EquipSlot,
    pub description: String,
    pub rarity: Rarity,
    pub level: u32,
    /// Template stats scaled by rarity and level.
    pub stats: StatBlock,
    pub modifiers: Modifiers,
    pub durability: i32,
    pub max_durability: i32,
    pub price: i32,
    pub equipped: bool,
}

impl Item {
    /// Roll an instance of `template` at the given rarity and level.
    pub fn from_template(
        template: &ItemTemplate,
        rarity: Rarity,
        level: u32,
    ) -> Result<Self, ItemError> {
        if level < 1 {
            return Err(ItemError::InvalidLevel(level));
        }

        let multiplier = total_multiplier(rarity, level);
        let price = ((10 + level as i64 * 5) as f64 * multiplier + ROLL_EPSILON) as i32;

        Ok(Self {
            id: ItemId::new(),
            template_id: template.id,
            name: template.name.clone(),
            category: template.category,
            slot: template.slot,
            description: template.description.clone(),
            rarity,
            level,
            stats: template.stats.scaled(multiplier),
            modifiers: template.modifiers,
            durability: MAX_DURABILITY,
            max_durability: MAX_DURABILITY,
            price,
            equipped: false,
        })
    }

    /// Name decorated with the rarity, e.g. `Novice Sword (Rare)`.
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.name, self.rarity)
    }

    pub fn is_usable(&self) -> bool {
        self.category.is_usable()
    }

    pub fn is_equippable(&self) -> bool {
        self.slot.accepts(self.category)
    }

    pub fn is_broken(&self) -> bool {
        self.durability <= 0
    }

    pub fn repair(&mut self) {
        self.durability = self.max_durability;
    }

    /// Consume the item, returning the effects it grants.
    ///
    /// Consumables burn out in one use; potions lose one point of durability.
    pub fn use_item(&mut self) -> Result<Vec<ItemEffect>, ItemError> {
        if !self.is_usable() {
            return Err(ItemError::CannotUse(self.name.clone()));
        }
        if self.is_broken() {
            return Err(ItemError::Broken(self.name.clone()));
        }

        let effects = self.effects();

        match self.category {
            ItemCategory::Consumable => self.durability = 0,
            ItemCategory::Potion => self.durability -= 1,
            _ => {}
        }

        Ok(effects)
    }

    /// Effects this item would produce if used, without consuming it.
    pub fn effects(&self) -> Vec<ItemEffect> {
        let mut effects = Vec::new();
        if self.stats.health != 0 {
            effects.push(ItemEffect::Heal(self.stats.health));
        }
        if self.stats.mana != 0 {
            effects.push(ItemEffect::RestoreMana(self.stats.mana));
        }
        if self.stats.attack != 0 {
            effects.push(ItemEffect::BoostAttack(self.stats.attack));
        }
        if self.stats.defense != 0 {
            effects.push(ItemEffect::BoostDefense(self.stats.defense));
        }
        if self.modifiers.health_regen != 0.0 {
            effects.push(ItemEffect::HealthRegen(self.modifiers.health_regen));
        }
        if self.modifiers.mana_regen != 0.0 {
            effects.push(ItemEffect::ManaRegen(self.modifiers.mana_regen));
        }
        effects
    }

    /// Multi-line human readable summary of the item.
    pub fn describe(&self) -> String {
        let mut lines = vec![
            format!("{} [{} lvl {}]", self.display_name(), self.category, self.level),
            self.description.clone(),
        ];

        let stats = [
            ("Strength", self.stats.strength),
            ("Agility", self.stats.agility),
            ("Intelligence", self.stats.intelligence),
            ("Attack", self.stats.attack),
            ("Defense", self.stats.defense),
            ("Health", self.stats.health),
            ("Mana", self.stats.mana),
        ];
        for (label, value) in stats {
            if value != 0 {
                lines.push(format!("  {label}: {value:+}"));
            }
        }

        let m = &self.modifiers;
        let secondary = [
            ("HP regen", m.health_regen),
            ("Mana regen", m.mana_regen),
            ("Attack speed", m.attack_speed),
            ("Evasion", m.evasion),
            ("Crit chance", m.critical_chance),
            ("Magic amp", m.magic_amp),
            ("Lifesteal", m.lifesteal),
        ];
        for (label, value) in secondary {
            if value != 0.0 {
                lines.push(format!("  {label}: {value:+}"));
            }
        }
        if m.duration > 0 {
            lines.push(format!("  Duration: {} turns", m.duration));
        }

        lines.push(format!(
            "  Durability: {}/{}  Price: {}",
            self.durability, self.max_durability, self.price
        ));
        lines.join("\n")
    }
}

/// `rarity multiplier * (1 + 0.1 * (level - 1))`.
pub fn total_multiplier(rarity: Rarity, level: u32) -> f64 {
    rarity.multiplier() * (level as f64 + 9.0) / 10.0
}
