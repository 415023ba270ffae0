pub mod cli;
pub mod command;
pub mod crypto;
pub mod protocol;

pub use cli::prompt;
pub use command::{Command, CommandError};
pub use crypto::{CryptoKey, SessionKeys};
