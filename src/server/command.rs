//! Text protocol spoken with hotel clients, one command per line.
//!
//! ```text
//! BOOK <room> <day> <nights> <client>   ->  OK room <room> booked
//! LIST <day> <client>                   ->  | Room: <n>, Status: FREE|RESERVED|OCCUPIED ... END
//! FREE <day> <nights>                   ->  OK room <n> available
//! ```
//! Failures answer `ERR <reason>`.

use crate::hotel::{Day, RoomId, RoomStatus};
use std::{fmt, str::FromStr};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Book {
        room: RoomId,
        day: Day,
        nights: u32,
        client: String,
    },
    List {
        day: Day,
        client: String,
    },
    Free {
        day: Day,
        nights: u32,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command {0:?}")]
    UnknownVerb(String),
    #[error("{verb} expects {expected} argument(s)")]
    Arity { verb: &'static str, expected: usize },
    #[error("{field} must be a positive number, got {value:?}")]
    InvalidNumber { field: &'static str, value: String },
}

fn number(field: &'static str, value: &str) -> Result<u32, CommandError> {
    value.parse().map_err(|_| CommandError::InvalidNumber {
        field,
        value: value.to_owned(),
    })
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or(CommandError::Empty)?;
        let args: Vec<&str> = words.collect();

        match verb.to_ascii_uppercase().as_str() {
            "BOOK" => match args[..] {
                [room, day, nights, client] => Ok(Self::Book {
                    room: number("room", room)?,
                    day: number("day", day)?,
                    nights: number("nights", nights)?,
                    client: client.to_owned(),
                }),
                _ => Err(CommandError::Arity {
                    verb: "BOOK",
                    expected: 4,
                }),
            },
            "LIST" => match args[..] {
                [day, client] => Ok(Self::List {
                    day: number("day", day)?,
                    client: client.to_owned(),
                }),
                _ => Err(CommandError::Arity {
                    verb: "LIST",
                    expected: 2,
                }),
            },
            "FREE" => match args[..] {
                [day, nights] => Ok(Self::Free {
                    day: number("day", day)?,
                    nights: number("nights", nights)?,
                }),
                _ => Err(CommandError::Arity {
                    verb: "FREE",
                    expected: 2,
                }),
            },
            _ => Err(CommandError::UnknownVerb(verb.to_owned())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Booked(RoomId),
    Rooms(Vec<(RoomId, RoomStatus)>),
    Available(RoomId),
    Error(String),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Booked(room) => write!(f, "OK room {room} booked"),
            Self::Rooms(rooms) => {
                for (room, status) in rooms {
                    writeln!(f, "| Room: {room}, Status: {status}")?;
                }
                f.write_str("END")
            }
            Self::Available(room) => write!(f, "OK room {room} available"),
            Self::Error(reason) => write!(f, "ERR {reason}"),
        }
    }
}
