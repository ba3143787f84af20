use thiserror::Error;

use crate::traffic::ShipId;

/// Reasons a room refuses a command. None of these reach the sender; the
/// next snapshot is what converges clients.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("room '{0}' does not exist")]
    UnknownRoom(String),
    #[error("unknown region '{0}'")]
    UnknownRegion(String),
    #[error("{0} is not in the current population")]
    UnknownShip(ShipId),
    #[error("{field} value {value} is out of range")]
    OutOfRange { field: &'static str, value: String },
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}
