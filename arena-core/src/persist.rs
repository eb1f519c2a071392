//! Character snapshots for save/load.
//!
//! Only base values are stored. Loading rebuilds the character and re-derives
//! every stat, so a hand-edited save cannot smuggle in inflated totals.

use crate::world::{Character, CharacterError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Current save format version.
pub const SAVE_VERSION: &str = "1.0.0";

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: String, found: String },

    #[error("Cannot save while in the {0} screen")]
    UnsavableState(GameState),

    #[error("Invalid character in save: {0}")]
    Character(#[from] CharacterError),
}

/// Which screen the player was on when the snapshot was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameState {
    #[default]
    Menu,
    Battle,
    Inventory,
    Eula,
    Settings,
    Story,
    Loading,
    GameOver,
    Victory,
    Paused,
}

impl GameState {
    pub fn name(&self) -> &'static str {
        match self {
            GameState::Menu => "menu",
            GameState::Battle => "battle",
            GameState::Inventory => "inventory",
            GameState::Eula => "EULA",
            GameState::Settings => "settings",
            GameState::Story => "story",
            GameState::Loading => "loading",
            GameState::GameOver => "game over",
            GameState::Victory => "victory",
            GameState::Paused => "paused",
        }
    }

    /// Mid-fight and transitional screens are not saveable.
    pub fn can_save(&self) -> bool {
        !matches!(
            self,
            GameState::Battle | GameState::Loading | GameState::Paused
        )
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A flat character snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedCharacter {
    pub version: String,
    pub saved_at: DateTime<Utc>,
    pub name: String,
    pub current_hp: i32,
    pub max_hp: i32,
    pub strength: i32,
    pub agility: i32,
    pub intelligence: i32,
    pub game_state: GameState,
    #[serde(default)]
    pub play_time_secs: u64,
}

impl SavedCharacter {
    /// Snapshot `character`'s base values.
    pub fn new(
        character: &Character,
        game_state: GameState,
        play_time_secs: u64,
    ) -> Result<Self, PersistError> {
        if !game_state.can_save() {
            return Err(PersistError::UnsavableState(game_state));
        }
        let base = character.base_attributes();
        Ok(Self {
            version: SAVE_VERSION.to_string(),
            saved_at: Utc::now(),
            name: character.name().to_string(),
            current_hp: character.hp(),
            max_hp: character.base_hp(),
            strength: base.strength,
            agility: base.agility,
            intelligence: base.intelligence,
            game_state,
            play_time_secs,
        })
    }

    /// Rebuild a character. Derived stats are recomputed, current HP is clamped.
    pub fn restore(&self) -> Result<Character, PersistError> {
        let mut character = Character::new(
            &self.name,
            self.max_hp,
            self.strength,
            self.agility,
            self.intelligence,
        )?;
        character.calculate_stats();
        character.set_hp(self.current_hp);
        Ok(character)
    }

    fn check_version(&self) -> Result<(), PersistError> {
        if self.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION.to_string(),
                found: self.version.clone(),
            });
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(content: &str) -> Result<Self, PersistError> {
        let saved: Self = serde_json::from_str(content)?;
        saved.check_version()?;
        Ok(saved)
    }

    /// Save to a JSON file.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, self.to_json()?).await?;
        tracing::info!(path = %path.display(), name = %self.name, "saved character");
        Ok(())
    }

    /// Load from a JSON file.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path.as_ref()).await?;
        Self::from_json(&content)
    }
}

/// Snapshot and write `character` in one step.
pub async fn save_character(
    character: &Character,
    game_state: GameState,
    play_time_secs: u64,
    path: impl AsRef<Path>,
) -> Result<SavedCharacter, PersistError> {
    let saved = SavedCharacter::new(character, game_state, play_time_secs)?;
    saved.save_json(path).await?;
    Ok(saved)
}

/// Read a save and rebuild its character.
pub async fn load_character(path: impl AsRef<Path>) -> Result<(Character, SavedCharacter), PersistError> {
    let saved = SavedCharacter::load_json(path).await?;
    let character = saved.restore()?;
    Ok((character, saved))
}

/// File name for a character's save inside `base_dir`.
pub fn character_save_path(base_dir: impl AsRef<Path>, name: &str) -> PathBuf {
    let sanitized = name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>();
    base_dir.as_ref().join(format!("{sanitized}.json"))
}
