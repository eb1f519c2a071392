//! QA tests for save/load of character snapshots.
//!
//! Run with: `cargo test -p arena-core --test qa_persistence`

use arena_core::items::{ids, ItemCatalog};
use arena_core::persist::{
    character_save_path, load_character, save_character, GameState, PersistError,
    SavedCharacter,
};
use arena_core::world::CharacterClass;
use tempfile::TempDir;

// =============================================================================
// TEST 1: Save and load
// =============================================================================

#[tokio::test]
async fn test_save_and_load_basic() {
    let dir = TempDir::new().unwrap();
    let path = character_save_path(dir.path(), "Thorin");

    let mut hero = CharacterClass::Warrior.create("Thorin");
    hero.set_hp(63);
    let saved = save_character(&hero, GameState::Inventory, 754, &path)
        .await
        .unwrap();
    assert!(path.exists());

    let (restored, loaded) = load_character(&path).await.unwrap();
    assert_eq!(loaded, saved);
    assert_eq!(loaded.game_state, GameState::Inventory);
    assert_eq!(loaded.play_time_secs, 754);
    assert_eq!(restored.name(), "Thorin");
    assert_eq!(restored.hp(), 63);
    assert_eq!(restored.max_hp(), hero.max_hp());
    assert_eq!(restored.strength(), hero.strength());
}

#[tokio::test]
async fn test_save_creates_missing_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("saves").join("hero.json");

    let hero = CharacterClass::Mage.create("Merlin");
    save_character(&hero, GameState::Menu, 0, &path)
        .await
        .unwrap();
    assert!(SavedCharacter::load_json(&path).await.is_ok());
}

// =============================================================================
// TEST 2: Derived stats are never trusted
// =============================================================================

#[tokio::test]
async fn test_gear_bonuses_are_not_persisted() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("geared.json");

    let catalog = ItemCatalog::standard();
    let mut hero = CharacterClass::Warrior.create("Geared");
    hero.give_starter_items(&catalog).unwrap();
    let sword = hero
        .inventory()
        .find_template(ids::NOVICE_SWORD)
        .unwrap()
        .id;
    hero.equip_item(sword).unwrap();

    save_character(&hero, GameState::Story, 10, &path)
        .await
        .unwrap();
    let (restored, _) = load_character(&path).await.unwrap();

    assert_eq!(restored.strength(), hero.base_attributes().strength);
    assert_eq!(restored.attack(), 0.0);
    assert!(restored.equipment().is_empty());
}

#[tokio::test]
async fn test_edited_save_is_clamped() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("edited.json");

    let hero = CharacterClass::Rogue.create("Cheater");
    let mut saved = SavedCharacter::new(&hero, GameState::Menu, 0).unwrap();
    saved.current_hp = 9999;
    saved.save_json(&path).await.unwrap();

    let (restored, _) = load_character(&path).await.unwrap();
    assert_eq!(restored.hp(), restored.max_hp());
}

#[tokio::test]
async fn test_invalid_stats_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");

    let hero = CharacterClass::Rogue.create("Broken");
    let mut saved = SavedCharacter::new(&hero, GameState::Menu, 0).unwrap();
    saved.strength = 0;
    saved.save_json(&path).await.unwrap();

    assert!(matches!(
        load_character(&path).await,
        Err(PersistError::Character(_))
    ));
}

// =============================================================================
// TEST 3: Refusals
// =============================================================================

#[tokio::test]
async fn test_cannot_save_mid_battle() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("battle.json");

    let hero = CharacterClass::Warrior.create("Busy");
    for state in [GameState::Battle, GameState::Loading, GameState::Paused] {
        let result = save_character(&hero, state, 0, &path).await;
        assert!(matches!(result, Err(PersistError::UnsavableState(s)) if s == state));
    }
    assert!(!path.exists());
}

#[tokio::test]
async fn test_load_errors() {
    let dir = TempDir::new().unwrap();

    let missing = dir.path().join("missing.json");
    assert!(matches!(
        load_character(&missing).await,
        Err(PersistError::Io(_))
    ));

    let garbage = dir.path().join("garbage.json");
    tokio::fs::write(&garbage, "not json").await.unwrap();
    assert!(matches!(
        load_character(&garbage).await,
        Err(PersistError::Json(_))
    ));
}
