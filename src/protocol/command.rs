//! Command definitions
//!
//! Represents commands from clients.

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    Get = 0x01,
    Put = 0x02,
    Count = 0x03,
    Ping = 0x04,
}

impl TryFrom<u8> for CommandType {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x01 => Ok(CommandType::Get),
            0x02 => Ok(CommandType::Put),
            0x03 => Ok(CommandType::Count),
            0x04 => Ok(CommandType::Ping),
            other => Err(other),
        }
    }
}

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Resolve a short key
    Get { key: String },

    /// Store a url under a new key
    Put { url: String },

    /// Number of stored entries
    Count,

    /// Ping (health check)
    Ping,
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Get { .. } => CommandType::Get,
            Command::Put { .. } => CommandType::Put,
            Command::Count => CommandType::Count,
            Command::Ping => CommandType::Ping,
        }
    }
}
