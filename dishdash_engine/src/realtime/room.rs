use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const ORDER_PREFIX: &str = "order_";
const BROADCAST: &str = "broadcast";

#[derive(Debug, Clone, Error)]
#[error("Invalid room name: {0}")]
pub struct RoomParseError(String);

/// A named pub-sub channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Room {
    /// Everyone tracking a single order. Named `order_{id}`.
    Order(i64),
    /// A user's personal room, named after the user id.
    User(String),
    /// The global room that every client may join.
    Broadcast,
}

impl Room {
    pub fn order(order_id: i64) -> Self {
        Self::Order(order_id)
    }

    pub fn user<S: Into<String>>(user_id: S) -> Self {
        Self::User(user_id.into())
    }

    /// Whether a user with this id can reach their personal room by name. Ids that read as another kind of room,
    /// or that change under trimming, cannot, so they are not accepted as user ids.
    pub fn is_valid_user_id(user_id: &str) -> bool {
        !user_id.is_empty() &&
            user_id.trim() == user_id &&
            user_id != BROADCAST &&
            !user_id.starts_with(ORDER_PREFIX)
    }
}

impl Display for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Room::Order(id) => write!(f, "{ORDER_PREFIX}{id}"),
            Room::User(id) => f.write_str(id),
            Room::Broadcast => f.write_str(BROADCAST),
        }
    }
}

impl FromStr for Room {
    type Err = RoomParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(RoomParseError("room name cannot be empty".into()));
        }
        if s == BROADCAST {
            return Ok(Room::Broadcast);
        }
        match s.strip_prefix(ORDER_PREFIX) {
            Some(id) => {
                id.parse::<i64>().map(Room::Order).map_err(|_| RoomParseError(format!("{s} is not a valid order room")))
            },
            None => Ok(Room::User(s.to_string())),
        }
    }
}

impl TryFrom<String> for Room {
    type Error = RoomParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Room> for String {
    fn from(room: Room) -> Self {
        room.to_string()
    }
}
