//! Single-player duel against a computer opponent.
//!
//! Every player command is answered by the enemy in the same call: attack
//! or use an item, then the enemy strikes back unless the fight already
//! ended. The duel works on a fresh copy of the hero built from base stats,
//! so nothing that happens here leaks back into the saved character.

use crate::dice::{Dice, RngDice};
use crate::items::{Item, ItemCatalog};
use crate::rules::{BodyPart, CombatEngine, EffectError, ItemEffectManager};
use crate::world::{Character, CharacterError};
use std::fmt;
use thiserror::Error;

/// Name of the default opponent.
pub const DRAGON_NAME: &str = "Dragon";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DuelError {
    #[error("The duel is over")]
    Over,

    #[error("No item at position {0}")]
    NoSuchItem(usize),

    #[error(transparent)]
    Effect(#[from] EffectError),

    #[error(transparent)]
    Character(#[from] CharacterError),
}

/// How a duel ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuelOutcome {
    Victory,
    Defeat,
    Surrendered,
}

impl fmt::Display for DuelOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuelOutcome::Victory => write!(f, "victory"),
            DuelOutcome::Defeat => write!(f, "defeat"),
            DuelOutcome::Surrendered => write!(f, "surrender"),
        }
    }
}

/// The stock opponent: tough and strong, but slow.
pub fn dragon(catalog: &ItemCatalog) -> Result<Character, CharacterError> {
    let mut dragon = Character::new(DRAGON_NAME, 120, 15, 1, 1)?;
    dragon.give_starter_items(catalog)?;
    Ok(dragon)
}

pub struct Duel<D = RngDice> {
    engine: CombatEngine<D>,
    effects: ItemEffectManager,
    player: Character,
    enemy: Character,
    round: u32,
    outcome: Option<DuelOutcome>,
}

impl Duel<RngDice> {
    /// `hero` against the dragon with entropy-seeded dice.
    pub fn new(hero: &Character, catalog: &ItemCatalog) -> Result<Self, DuelError> {
        Self::with_parts(hero, dragon(catalog)?, catalog, CombatEngine::default())
    }
}

impl<D: Dice> Duel<D> {
    pub fn with_parts(
        hero: &Character,
        enemy: Character,
        catalog: &ItemCatalog,
        engine: CombatEngine<D>,
    ) -> Result<Self, DuelError> {
        let base = hero.base_attributes();
        let mut player = Character::new(
            hero.name(),
            hero.base_hp(),
            base.strength,
            base.agility,
            base.intelligence,
        )?;
        player.give_starter_items(catalog)?;

        Ok(Self {
            engine,
            effects: ItemEffectManager::new(),
            player,
            enemy,
            round: 1,
            outcome: None,
        })
    }

    pub fn player(&self) -> &Character {
        &self.player
    }

    pub fn enemy(&self) -> &Character {
        &self.enemy
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn outcome(&self) -> Option<DuelOutcome> {
        self.outcome
    }

    pub fn is_over(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn usable_items(&self) -> Vec<&Item> {
        self.effects.usable_items(&self.player)
    }

    pub fn describe_item(&self, item: &Item) -> String {
        self.effects.describe(item)
    }

    pub fn status_line(&self) -> String {
        format!(
            "Round {} | {} {}/{} | {} {}/{}",
            self.round,
            self.player.name(),
            self.player.hp(),
            self.player.max_hp(),
            self.enemy.name(),
            self.enemy.hp(),
            self.enemy.max_hp()
        )
    }

    /// Strike at a random part, then take the enemy's answer.
    pub fn attack(&mut self) -> Result<Vec<String>, DuelError> {
        self.ensure_running()?;
        let (damage, blocked) = self.engine.simple_strike(&self.player, &mut self.enemy);
        let line = if blocked {
            format!("{} blocked your strike!", self.enemy.name())
        } else {
            self.hit_line(damage)
        };
        Ok(self.enemy_turn(vec![line]))
    }

    /// Strike at `part`. The enemy still guesses a part to block.
    pub fn aimed_attack(&mut self, part: BodyPart) -> Result<Vec<String>, DuelError> {
        self.ensure_running()?;
        let block = self.engine.pick_part();
        let before = self.enemy.hp();
        self.engine.execute_attack(&self.player, &mut self.enemy, part, block);

        let line = if part == block {
            format!("{} saw it coming and blocked your {part} strike!", self.enemy.name())
        } else {
            self.hit_line(before - self.enemy.hp())
        };
        Ok(self.enemy_turn(vec![line]))
    }

    /// Use the `index`-th usable item. It is consumed and the enemy answers.
    pub fn use_item(&mut self, index: usize) -> Result<Vec<String>, DuelError> {
        self.ensure_running()?;
        let (id, name) = self
            .usable_items()
            .get(index)
            .map(|item| (item.id, item.name.clone()))
            .ok_or(DuelError::NoSuchItem(index))?;

        self.effects.use_item(&mut self.player, id)?;
        let line = match self.player.inventory_mut().remove_item(id) {
            Ok(_) => format!("Used {name}!"),
            Err(e) => {
                tracing::warn!(error = %e, item = %name, "used item could not be removed");
                format!("Used {name}, but it could not be removed: {e}")
            }
        };
        Ok(self.enemy_turn(vec![line]))
    }

    pub fn surrender(&mut self) -> Result<String, DuelError> {
        self.ensure_running()?;
        self.outcome = Some(DuelOutcome::Surrendered);
        tracing::info!(round = self.round, "player surrendered");
        Ok("You surrendered!".to_string())
    }

    fn ensure_running(&self) -> Result<(), DuelError> {
        if self.is_over() {
            Err(DuelError::Over)
        } else {
            Ok(())
        }
    }

    fn hit_line(&self, damage: i32) -> String {
        format!(
            "You hit for {damage} damage! {}: {}/{} HP",
            self.enemy.name(),
            self.enemy.hp(),
            self.enemy.max_hp()
        )
    }

    fn enemy_turn(&mut self, mut lines: Vec<String>) -> Vec<String> {
        if self.check_end(&mut lines) {
            return lines;
        }

        let (damage, blocked) = self.engine.simple_strike(&self.enemy, &mut self.player);
        self.round += 1;
        lines.push(if blocked {
            format!("You blocked the {}'s attack!", self.enemy.name())
        } else {
            format!(
                "{} deals {damage} damage! Your HP: {}/{}",
                self.enemy.name(),
                self.player.hp(),
                self.player.max_hp()
            )
        });
        self.check_end(&mut lines);
        lines
    }

    fn check_end(&mut self, lines: &mut Vec<String>) -> bool {
        let outcome = if !self.player.is_alive() {
            DuelOutcome::Defeat
        } else if !self.enemy.is_alive() {
            DuelOutcome::Victory
        } else {
            return false;
        };

        self.outcome = Some(outcome);
        tracing::info!(%outcome, round = self.round, "duel finished");
        lines.push(match outcome {
            DuelOutcome::Victory => format!("Victory! You defeated the {}!", self.enemy.name()),
            _ => format!("You lost! The {} won!", self.enemy.name()),
        });
        true
    }
}
