//! Line-oriented match interface.
//!
//! Reads one command per line from stdin while network events arrive on the
//! client's channel. Output is plain text, suitable for scripting.

use arena_core::dice::Dice;
use arena_core::headless::MatchClient;
use arena_core::pvp::{ActionPolicy, MatchError, MatchPhase};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Play until the match ends, the connection drops or the player quits.
pub async fn run<D: Dice, P: ActionPolicy>(mut client: MatchClient<D, P>) -> anyhow::Result<()> {
    print_commands();

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        flush_messages(&mut client);
        if client.phase().is_terminal() {
            break;
        }

        tokio::select! {
            event = client.recv() => match event {
                Some(event) => client.apply(event).await,
                None => break,
            },
            line = stdin.next_line() => match line? {
                Some(line) => {
                    if !handle_command(&mut client, line.trim()).await {
                        break;
                    }
                }
                None => break,
            },
        }
    }

    flush_messages(&mut client);
    match client.phase() {
        MatchPhase::MatchOver { winner } => println!("[END] Side {winner} won."),
        MatchPhase::Disconnected { reason } => println!("[END] Disconnected: {reason}"),
        _ => {
            client.close().await;
            println!("Goodbye!");
        }
    }
    Ok(())
}

/// Returns false when the player asked to quit.
async fn handle_command<D: Dice, P: ActionPolicy>(client: &mut MatchClient<D, P>, line: &str) -> bool {
    let (command, rest) = match line.split_once(' ') {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    let result = match command {
        "" => Ok(()),
        "quit" | "exit" => return false,
        "help" => {
            print_commands();
            Ok(())
        }
        "status" => {
            print_status(client);
            Ok(())
        }
        "items" => {
            print_items(client);
            Ok(())
        }
        "attack" | "a" => client.attack().await,
        "use" => match rest.parse() {
            Ok(index) => client.use_item(index).await,
            Err(_) => {
                println!("[ERROR] Usage: use <n>");
                Ok(())
            }
        },
        "equip" => match rest.parse() {
            Ok(index) => client.equip(index).await,
            Err(_) => {
                println!("[ERROR] Usage: equip <n>");
                Ok(())
            }
        },
        "surrender" => client.surrender().await,
        "say" => client.chat(rest).await,
        other => {
            println!("[ERROR] Unknown command: {other}. Type 'help' for commands.");
            Ok(())
        }
    };

    if let Err(e) = result {
        report(e);
    }
    true
}

fn report(error: MatchError) {
    println!("[ERROR] {error}");
}

fn flush_messages<D: Dice, P: ActionPolicy>(client: &mut MatchClient<D, P>) {
    for message in client.drain_messages() {
        println!("{message}");
    }
}

fn print_status<D: Dice, P: ActionPolicy>(client: &MatchClient<D, P>) {
    let game = client.game();
    println!("[STATUS] {}", game.status_line());
    println!("{}", game.player().summary());
}

fn print_items<D: Dice, P: ActionPolicy>(client: &MatchClient<D, P>) {
    let game = client.game();

    println!("Usable:");
    let usable = game.usable_items();
    if usable.is_empty() {
        println!("  (none)");
    }
    for (index, item) in usable.iter().enumerate() {
        println!("  {index}. {} - {}", item.display_name(), game.describe_item(item));
    }

    println!("Equippable:");
    let equippable = game.equippable_items();
    if equippable.is_empty() {
        println!("  (none)");
    }
    for (index, item) in equippable.iter().enumerate() {
        println!("  {index}. {} [{}]", item.display_name(), item.slot);
    }

    println!("Worn:");
    for (slot, item) in game.player().equipment().iter() {
        println!("  [{slot}] {}", item.display_name());
    }
}

fn print_commands() {
    println!("Commands:");
    println!("  attack       - Strike your opponent (ends your turn)");
    println!("  items        - List usable and equippable items");
    println!("  use <n>      - Use a usable item (ends your turn)");
    println!("  equip <n>    - Equip an item (does not end your turn)");
    println!("  surrender    - Concede the match");
    println!("  say <text>   - Chat with your opponent");
    println!("  status       - Show HP and stats");
    println!("  quit         - Leave");
    println!();
}
