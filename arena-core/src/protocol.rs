//! PvP wire protocol.
//!
//! One message per newline-terminated line, space separated tokens and
//! `key=value` fields:
//!
//! ```text
//! YOU_ARE 1
//! INIT p1name=Player1 p1hp=100 p1max=100 p2name=Player2 p2hp=100 p2max=100 round=1 turn=1
//! STATE round=2 p1hp=100 p2hp=88 turn=2
//! ACTION attack head|torso|12
//! ACTION item 0
//! ACTION surrender
//! CHAT good luck
//! END winner=1
//! ```
//!
//! [`Message`]'s `Display` produces the line without its trailing newline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from [`Message::parse`]. Callers drop the offending line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Empty line")]
    Empty,

    #[error("Unknown message kind: {0}")]
    UnknownKind(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for {field}: {value:?}")]
    InvalidValue { field: &'static str, value: String },

    #[error("Invalid side: {0:?}")]
    InvalidSide(String),
}

// ============================================================================
// Side
// ============================================================================

/// One of the two match participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    One,
    Two,
}

impl Side {
    pub fn number(&self) -> u8 {
        match self {
            Side::One => 1,
            Side::Two => 2,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Side::One),
            2 => Some(Side::Two),
            _ => None,
        }
    }

    pub fn opponent(&self) -> Self {
        match self {
            Side::One => Side::Two,
            Side::Two => Side::One,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

impl FromStr for Side {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u8>()
            .ok()
            .and_then(Side::from_number)
            .ok_or_else(|| ProtocolError::InvalidSide(s.to_string()))
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// Starting snapshot sent by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitState {
    pub p1_name: String,
    pub p1_hp: i32,
    pub p1_max: i32,
    pub p2_name: String,
    pub p2_hp: i32,
    pub p2_max: i32,
    pub round: u32,
    /// Raw turn owner; only 1 and 2 are meaningful.
    pub turn: u8,
}

impl Default for InitState {
    fn default() -> Self {
        Self {
            p1_name: "Player1".to_string(),
            p1_hp: 0,
            p1_max: 100,
            p2_name: "Player2".to_string(),
            p2_hp: 0,
            p2_max: 100,
            round: 0,
            turn: 0,
        }
    }
}

impl InitState {
    /// Both players at full health, round 1, side 1 to move.
    pub fn new_match(p1_name: impl Into<String>, p2_name: impl Into<String>, hp: i32) -> Self {
        Self {
            p1_name: p1_name.into(),
            p1_hp: hp,
            p1_max: hp,
            p2_name: p2_name.into(),
            p2_hp: hp,
            p2_max: hp,
            round: 1,
            turn: 1,
        }
    }

    pub fn turn_side(&self) -> Option<Side> {
        Side::from_number(self.turn)
    }

    pub fn name(&self, side: Side) -> &str {
        match side {
            Side::One => &self.p1_name,
            Side::Two => &self.p2_name,
        }
    }

    /// `(hp, max)` for `side`.
    pub fn health(&self, side: Side) -> (i32, i32) {
        match side {
            Side::One => (self.p1_hp, self.p1_max),
            Side::Two => (self.p2_hp, self.p2_max),
        }
    }
}

/// Authoritative round/HP/turn update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateUpdate {
    pub round: u32,
    pub p1_hp: i32,
    pub p2_hp: i32,
    pub turn: u8,
}

impl StateUpdate {
    pub fn turn_side(&self) -> Option<Side> {
        Side::from_number(self.turn)
    }

    pub fn hp(&self, side: Side) -> i32 {
        match side {
            Side::One => self.p1_hp,
            Side::Two => self.p2_hp,
        }
    }

    pub fn set_hp(&mut self, side: Side, hp: i32) {
        match side {
            Side::One => self.p1_hp = hp,
            Side::Two => self.p2_hp = hp,
        }
    }
}

/// What the acting side just did. Narration only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Attack {
        body_part: String,
        block_part: String,
        damage: i32,
    },
    Item {
        index: usize,
    },
    Surrender,
}

// ============================================================================
// Messages
// ============================================================================

/// Every line that can cross the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    YouAre(Side),
    Init(InitState),
    State(StateUpdate),
    Action(Action),
    Chat(String),
    End { winner: Side },
}

impl Message {
    /// Parse one line, with or without its line terminator.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim();
        let (kind, rest) = match line.split_once(' ') {
            Some((kind, rest)) => (kind, rest.trim_start()),
            None => (line, ""),
        };

        match kind {
            "" => Err(ProtocolError::Empty),
            "YOU_ARE" => Ok(Message::YouAre(rest.trim().parse()?)),
            "INIT" => parse_init(rest).map(Message::Init),
            "STATE" => parse_state(rest).map(Message::State),
            "ACTION" => parse_action(rest).map(Message::Action),
            "CHAT" => Ok(Message::Chat(rest.to_string())),
            "END" => parse_end(rest),
            other => Err(ProtocolError::UnknownKind(other.to_string())),
        }
    }
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Message::parse(s)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::YouAre(side) => write!(f, "YOU_ARE {side}"),
            Message::Init(init) => write!(
                f,
                "INIT p1name={} p1hp={} p1max={} p2name={} p2hp={} p2max={} round={} turn={}",
                wire_name(&init.p1_name),
                init.p1_hp,
                init.p1_max,
                wire_name(&init.p2_name),
                init.p2_hp,
                init.p2_max,
                init.round,
                init.turn
            ),
            Message::State(s) => write!(
                f,
                "STATE round={} p1hp={} p2hp={} turn={}",
                s.round, s.p1_hp, s.p2_hp, s.turn
            ),
            Message::Action(Action::Attack {
                body_part,
                block_part,
                damage,
            }) => write!(f, "ACTION attack {body_part}|{block_part}|{damage}"),
            Message::Action(Action::Item { index }) => write!(f, "ACTION item {index}"),
            Message::Action(Action::Surrender) => write!(f, "ACTION surrender"),
            Message::Chat(text) => write!(f, "CHAT {}", text.replace(['\r', '\n'], " ")),
            Message::End { winner } => write!(f, "END winner={winner}"),
        }
    }
}

/// Names travel as single tokens.
fn wire_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join("_")
}

fn parse_int<T: FromStr>(field: &'static str, value: &str) -> Result<T, ProtocolError> {
    value.parse().map_err(|_| ProtocolError::InvalidValue {
        field,
        value: value.to_string(),
    })
}

fn parse_init(rest: &str) -> Result<InitState, ProtocolError> {
    let mut init = InitState::default();
    for (key, value) in rest.split_whitespace().filter_map(|t| t.split_once('=')) {
        match key {
            "p1name" => init.p1_name = value.to_string(),
            "p2name" => init.p2_name = value.to_string(),
            "p1hp" => init.p1_hp = parse_int("p1hp", value)?,
            "p1max" => init.p1_max = parse_int("p1max", value)?,
            "p2hp" => init.p2_hp = parse_int("p2hp", value)?,
            "p2max" => init.p2_max = parse_int("p2max", value)?,
            "round" => init.round = parse_int("round", value)?,
            "turn" => init.turn = parse_int("turn", value)?,
            _ => {}
        }
    }
    Ok(init)
}

fn parse_state(rest: &str) -> Result<StateUpdate, ProtocolError> {
    let mut state = StateUpdate::default();
    for (key, value) in rest.split_whitespace().filter_map(|t| t.split_once('=')) {
        match key {
            "round" => state.round = parse_int("round", value)?,
            "p1hp" => state.p1_hp = parse_int("p1hp", value)?,
            "p2hp" => state.p2_hp = parse_int("p2hp", value)?,
            "turn" => state.turn = parse_int("turn", value)?,
            _ => {}
        }
    }
    Ok(state)
}

fn parse_action(rest: &str) -> Result<Action, ProtocolError> {
    let mut tokens = rest.split_whitespace();
    let kind = tokens.next().ok_or(ProtocolError::MissingField("action"))?;

    match kind {
        "attack" => {
            let payload = tokens.next().ok_or(ProtocolError::MissingField("attack"))?;
            let mut parts = payload.split('|');
            let body_part = parts.next().unwrap_or_default().to_string();
            let block_part = parts.next().unwrap_or_default().to_string();
            let damage = match parts.next() {
                Some(raw) => parse_int("damage", raw)?,
                None => 0,
            };
            Ok(Action::Attack {
                body_part,
                block_part,
                damage,
            })
        }
        "item" => {
            let raw = tokens.next().ok_or(ProtocolError::MissingField("item"))?;
            Ok(Action::Item {
                index: parse_int("item", raw)?,
            })
        }
        "surrender" => Ok(Action::Surrender),
        other => Err(ProtocolError::UnknownAction(other.to_string())),
    }
}

fn parse_end(rest: &str) -> Result<Message, ProtocolError> {
    let raw = rest
        .split_whitespace()
        .filter_map(|t| t.split_once('='))
        .find(|(key, _)| *key == "winner")
        .map(|(_, value)| value)
        .ok_or(ProtocolError::MissingField("winner"))?;
    Ok(Message::End {
        winner: raw.parse()?,
    })
}
