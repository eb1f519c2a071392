//! `arena duel`: fight the dragon offline.
//!
//! The hero is loaded from its save file when one exists, otherwise created
//! from a class preset. Play time is written back once the duel ends.

use anyhow::Context;
use arena_core::duel::Duel;
use arena_core::items::ItemCatalog;
use arena_core::persist::{character_save_path, load_character, save_character, GameState};
use arena_core::rules::BodyPart;
use arena_core::world::{Character, CharacterClass};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Options for the duel subcommand.
#[derive(Debug, Clone)]
pub struct DuelConfig {
    pub name: String,
    pub class: CharacterClass,
    pub save_dir: PathBuf,
}

impl Default for DuelConfig {
    fn default() -> Self {
        Self {
            name: "Hero".to_string(),
            class: CharacterClass::Warrior,
            save_dir: std::env::var("SAVE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("saves")),
        }
    }
}

pub fn parse_config_from_args(args: &[String]) -> DuelConfig {
    let mut config = DuelConfig::default();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--name" => {
                if let Some(name) = args.get(i + 1) {
                    config.name = name.clone();
                    i += 1;
                }
            }
            "--class" => {
                if let Some(class) = args.get(i + 1) {
                    match class.parse() {
                        Ok(class) => config.class = class,
                        Err(e) => eprintln!("{e}, using {}", config.class),
                    }
                    i += 1;
                }
            }
            "--save-dir" => {
                if let Some(dir) = args.get(i + 1) {
                    config.save_dir = PathBuf::from(dir);
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }

    config
}

pub async fn run(config: DuelConfig) -> anyhow::Result<()> {
    let path = character_save_path(&config.save_dir, &config.name);
    let (hero, play_time) = load_or_create(&config, &path).await?;

    let catalog = ItemCatalog::standard();
    let mut duel = Duel::new(&hero, &catalog).context("could not set up the duel")?;
    let started = Instant::now();

    println!("A {} blocks your path!", duel.enemy().name());
    print_commands();

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    while !duel.is_over() {
        let Some(line) = stdin.next_line().await? else {
            break;
        };
        let line = line.trim();
        let (command, rest) = match line.split_once(' ') {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        let result = match command {
            "" => continue,
            "quit" | "exit" => break,
            "help" => {
                print_commands();
                continue;
            }
            "status" => {
                println!("[STATUS] {}", duel.status_line());
                println!("{}", duel.player().summary());
                continue;
            }
            "items" => {
                print_items(&duel);
                continue;
            }
            "attack" | "a" if rest.is_empty() => duel.attack(),
            "attack" | "a" => match BodyPart::from_wire(rest) {
                Some(part) => duel.aimed_attack(part),
                None => {
                    println!("[ERROR] Unknown body part: {rest}");
                    continue;
                }
            },
            "use" => match rest.parse() {
                Ok(index) => duel.use_item(index),
                Err(_) => {
                    println!("[ERROR] Usage: use <n>");
                    continue;
                }
            },
            "surrender" => duel.surrender().map(|line| vec![line]),
            other => {
                println!("[ERROR] Unknown command: {other}. Type 'help' for commands.");
                continue;
            }
        };

        match result {
            Ok(lines) => println!("{}", lines.join("  |  ")),
            Err(e) => println!("[ERROR] {e}"),
        }
    }

    let play_time = play_time + started.elapsed().as_secs();
    let state = if duel.is_over() {
        GameState::Menu
    } else {
        GameState::Battle
    };
    match save_character(&hero, state, play_time, &path).await {
        Ok(_) => println!("Saved {} to {}.", hero.name(), path.display()),
        Err(e) => println!("[ERROR] Progress not saved: {e}"),
    }
    Ok(())
}

async fn load_or_create(config: &DuelConfig, path: &Path) -> anyhow::Result<(Character, u64)> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        println!("Creating a new {} named {}.", config.class, config.name);
        return Ok((config.class.create(config.name.as_str()), 0));
    }

    let (hero, saved) = load_character(path)
        .await
        .with_context(|| format!("could not load {}", path.display()))?;
    println!(
        "Welcome back, {} ({}s played).",
        hero.name(),
        saved.play_time_secs
    );
    Ok((hero, saved.play_time_secs))
}

fn print_items<D: arena_core::dice::Dice>(duel: &Duel<D>) {
    let usable = duel.usable_items();
    if usable.is_empty() {
        println!("  (no usable items)");
    }
    for (index, item) in usable.iter().enumerate() {
        println!("  {index}. {} - {}", item.display_name(), duel.describe_item(item));
    }
}

fn print_commands() {
    println!("Commands:");
    println!("  attack [part] - Strike (head, torso, left_arm, right_arm, left_leg, right_leg)");
    println!("  items         - List usable items");
    println!("  use <n>       - Use an item; the enemy still answers");
    println!("  surrender     - Give up the duel");
    println!("  status        - Show HP and stats");
    println!("  quit          - Leave");
    println!();
}
