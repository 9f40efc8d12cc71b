//! Operator commands typed at the console.

use ttymux_core::{Unit, UnitError};

/// One parsed console line.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    /// Spawn a session, optionally on a given unit.
    Spawn(Option<Unit>),
    /// Close a session this console spawned.
    Close(Unit),
    /// Simulate a session crashing without unregistering.
    Kill(Unit),
    /// Print the roster.
    Units,
    /// Type a line on a secondary's keyboard.
    Send(Unit, String),
    Help,
    Quit,
    /// Anything else is typed on unit 0.
    Type(String),
}

/// Command parse error.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error(transparent)]
    Unit(#[from] UnitError),
}

impl Command {
    /// Parse a console line. Lines starting with `:` are commands.
    ///
    /// # Errors
    /// Returns error if a command's arguments are missing or invalid.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let Some(rest) = line.strip_prefix(':') else {
            return Ok(Self::Type(line.to_string()));
        };
        let mut words = rest.splitn(3, ' ');
        let name = words.next().unwrap_or_default();
        let arg = words.next();

        match name {
            "spawn" => Ok(Self::Spawn(arg.map(parse_unit).transpose()?)),
            "close" => Ok(Self::Close(required_unit(arg, ":close N")?)),
            "kill" => Ok(Self::Kill(required_unit(arg, ":kill N")?)),
            "units" => Ok(Self::Units),
            "send" => {
                let unit = required_unit(arg, ":send N text")?;
                Ok(Self::Send(unit, words.next().unwrap_or_default().to_string()))
            }
            "help" => Ok(Self::Help),
            "quit" | "q" => Ok(Self::Quit),
            _ => Err(CommandError::Usage(HELP)),
        }
    }
}

pub const HELP: &str =
    ":spawn [N] | :close N | :kill N | :units | :send N text | :quit (other lines go to TTY0)";

fn parse_unit(raw: &str) -> Result<Unit, CommandError> {
    let n: i64 = raw
        .trim()
        .parse()
        .map_err(|_| CommandError::Usage("unit must be a number 0-7"))?;
    Ok(Unit::new(n)?)
}

fn required_unit(arg: Option<&str>, usage: &'static str) -> Result<Unit, CommandError> {
    arg.map_or(Err(CommandError::Usage(usage)), parse_unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(n: i64) -> Unit {
        Unit::new(n).unwrap()
    }

    #[test]
    fn test_plain_lines_are_typed() {
        assert_eq!(Command::parse("ls -l"), Ok(Command::Type("ls -l".into())));
    }

    #[test]
    fn test_commands() {
        assert_eq!(Command::parse(":spawn"), Ok(Command::Spawn(None)));
        assert_eq!(Command::parse(":spawn 4"), Ok(Command::Spawn(Some(unit(4)))));
        assert_eq!(Command::parse(":close 2"), Ok(Command::Close(unit(2))));
        assert_eq!(
            Command::parse(":send 3 echo hi"),
            Ok(Command::Send(unit(3), "echo hi".into()))
        );
        assert_eq!(Command::parse(":q"), Ok(Command::Quit));
    }

    #[test]
    fn test_bad_arguments() {
        assert_eq!(Command::parse(":close"), Err(CommandError::Usage(":close N")));
        assert!(matches!(Command::parse(":kill 9"), Err(CommandError::Unit(_))));
        assert!(matches!(Command::parse(":frobnicate"), Err(CommandError::Usage(_))));
    }
}
