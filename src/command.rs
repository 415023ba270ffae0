//! High-level command module for the echo client.
//!
//! This module defines the [`Command`] enum, which encapsulates what a user can ask the echo
//! client to do, and the parsing of a line of user input into one.
//!
//! # Overview
//! The `Command` enum represents supported operations such as:
//!
//! - `KeyExchange` (`#`): Establish a session key with the server.
//! - `Encrypted(String)` (`!text`): Echo `text` over the encrypted session.
//! - `ExitClient` (`exit`): Close this client's connection.
//! - `ExitServer` (`=` or `exit server`): Ask the server to shut down.
//! - `Data(String)`: Anything else is echoed as plain text.
//!
//! # Example
//! ```rust
//! use crypto_echo::Command;
//!
//! let cmd: Command = "!hello".try_into().unwrap();
//! assert_eq!(cmd, Command::Encrypted("hello".to_string()));
//! ```
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("no command provided")]
    Empty,

    #[error("encrypted message is empty. Example: !hello")]
    EmptyEncrypted,

    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
}

/// User supplied commands to run against an echo server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    KeyExchange,
    Data(String),
    Encrypted(String),
    /// Close this connection; the server keeps running.
    ExitClient,
    /// Shut the server down.
    ExitServer,
}

impl TryFrom<&str> for Command {
    type Error = CommandError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim() {
            "" => Err(CommandError::Empty),
            "#" => Ok(Command::KeyExchange),
            "exit" => Ok(Command::ExitClient),
            "=" | "exit server" => Ok(Command::ExitServer),
            s if s.starts_with('!') => match &s[1..] {
                "" => Err(CommandError::EmptyEncrypted),
                text => Ok(Command::Encrypted(text.to_string())),
            },
            s => Ok(Command::Data(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_from_string() {
        let inputs = vec![
            ("#", Command::KeyExchange),
            ("exit", Command::ExitClient),
            ("=", Command::ExitServer),
            ("exit server", Command::ExitServer),
            ("!secret message", Command::Encrypted("secret message".into())),
            ("ping", Command::Data("ping".into())),
            ("  padded  \n", Command::Data("padded".into())),
        ];

        for (input, expected) in inputs {
            let command: Command = input.try_into().unwrap();
            assert_eq!(command, expected);
        }
    }

    #[test]
    #[should_panic(expected = "Empty")]
    fn command_from_empty_string() {
        let _: Command = "   \n".try_into().unwrap();
    }

    #[test]
    #[should_panic(expected = "EmptyEncrypted")]
    fn command_from_bare_bang() {
        let _: Command = "!".try_into().unwrap();
    }
}
