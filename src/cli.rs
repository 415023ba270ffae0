//! CLI utilities for the echo client.
//!
//! The utilities present in this module can be used to create an interactive client for the
//! echo server.
use std::io::{BufRead, Write};

use crate::{Command, CommandError};

/// Prompt user for a command.
///
/// End of input is treated as [`Command::ExitClient`].
pub fn prompt<R, W>(mut reader: R, mut writer: W) -> Result<Command, CommandError>
where
    R: BufRead,
    W: Write,
{
    let mut s = String::default();
    write!(&mut writer, "> ")?;
    writer.flush()?;

    if reader.read_line(&mut s)? == 0 {
        return Ok(Command::ExitClient);
    }

    s.as_str().try_into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_prints_correctly() {
        let input = b"exit\n";
        let mut output = Vec::new();

        prompt(&input[..], &mut output).unwrap();

        let output = String::from_utf8(output).expect("not valid UTF-8");
        assert_eq!("> ", output);
    }

    #[test]
    fn prompt_handles_data() {
        let input = b"hello there\n";
        let mut output = Vec::new();

        let res = prompt(&input[..], &mut output).unwrap();
        assert_eq!(Command::Data("hello there".into()), res);
    }

    #[test]
    fn prompt_end_of_input_exits() {
        let input = b"";
        let mut output = Vec::new();

        let res = prompt(&input[..], &mut output).unwrap();
        assert_eq!(Command::ExitClient, res);
    }

    #[test]
    #[should_panic(expected = "Empty")]
    fn prompt_empty_line() {
        let input = b"\n";
        let mut output = Vec::new();

        prompt(&input[..], &mut output).unwrap();
    }
}
