//! Turn-based arena combat engine with networked PvP.
//!
//! This crate provides:
//! - An item, equipment and inventory model with rarity scaling
//! - Characters whose combat stats are derived from base attributes and gear
//! - A combat engine over an injectable random source
//! - A single-player duel against a computer opponent
//! - A line protocol, sessions and a per-client turn state machine for PvP
//! - A relay server that pairs clients and forwards their lines
//! - Character snapshots for save/load
//!
//! # Quick Start
//!
//! ```ignore
//! use arena_core::{CharacterClass, CombatEngine, ItemCatalog};
//!
//! let catalog = ItemCatalog::standard();
//! let mut hero = CharacterClass::Warrior.create("Hero");
//! hero.give_starter_items(&catalog)?;
//!
//! let mut goblin = CharacterClass::Rogue.create("Goblin");
//! let mut engine = CombatEngine::default();
//! let outcome = engine.player_attack(&hero, &mut goblin);
//! println!("{} damage to the {}", outcome.result.damage_taken, outcome.attack_part);
//! ```

pub mod config;
pub mod dice;
pub mod duel;
pub mod headless;
pub mod items;
pub mod persist;
pub mod protocol;
pub mod pvp;
pub mod relay;
pub mod rules;
pub mod session;
pub mod world;

// Primary public API
pub use config::{ConfigError, NetConfig};
pub use dice::{Dice, RngDice, ScriptedDice};
pub use duel::{Duel, DuelError, DuelOutcome};
pub use headless::{connect_with_fallback, MatchClient};
pub use items::{EquipSlot, Item, ItemCatalog, ItemCategory, ItemEffect, ItemId, Rarity};
pub use persist::{GameState, PersistError, SavedCharacter};
pub use protocol::{Action, InitState, Message, ProtocolError, Side, StateUpdate};
pub use pvp::{
    ActionPolicy, MatchAction, MatchError, MatchEvent, MatchPhase, PvpConfig, PvpMatch,
    TrustReported, ValidateReported,
};
pub use relay::{RelayConfig, RelayServer};
pub use rules::{AttackOutcome, BodyPart, CombatEngine, ItemEffectManager};
pub use session::{Session, SessionError};
pub use world::{Character, CharacterClass, CharacterError, Equipment, Inventory};
