use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BotCommand {
    Start,
    Help,
    Menu,
    Cancel,
    Invoice,
    Debtor,
}

impl BotCommand {
    pub const ALL: [BotCommand; 6] =
        [Self::Start, Self::Help, Self::Menu, Self::Cancel, Self::Invoice, Self::Debtor];

    pub fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::Menu => "menu",
            Self::Cancel => "cancel",
            Self::Invoice => "invoice",
            Self::Debtor => "debtor",
        }
    }

    /// One-line description shown in the client's command list.
    pub fn description(self) -> &'static str {
        match self {
            Self::Start => "Open the dashboard",
            Self::Help => "How to use the assistant",
            Self::Menu => "Show the main menu",
            Self::Cancel => "Cancel the current action",
            Self::Invoice => "Create a sales invoice",
            Self::Debtor => "Create a debtor account",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("not a bot command: {0}")]
    NotACommand(String),
    #[error("unsupported bot command: /{0}")]
    UnsupportedCommand(String),
}

/// Parses `/name`, `/name@botname` and `/name args`. Arguments are ignored;
/// every supported command is a bare trigger.
pub fn parse_command(text: &str) -> Result<BotCommand, CommandParseError> {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Err(CommandParseError::NotACommand(trimmed.to_owned()));
    };

    let token = rest.split_whitespace().next().unwrap_or_default();
    let name = token.split('@').next().unwrap_or_default().to_ascii_lowercase();

    BotCommand::ALL
        .into_iter()
        .find(|command| command.name() == name)
        .ok_or(CommandParseError::UnsupportedCommand(name))
}

#[cfg(test)]
mod tests {
    use super::{parse_command, BotCommand, CommandParseError};

    #[test]
    fn parses_bare_and_addressed_commands() {
        assert_eq!(parse_command("/start"), Ok(BotCommand::Start));
        assert_eq!(parse_command("  /Invoice@aiaa_bot now "), Ok(BotCommand::Invoice));
        assert_eq!(parse_command("/cancel please"), Ok(BotCommand::Cancel));
    }

    #[test]
    fn rejects_plain_text_and_unknown_commands() {
        assert_eq!(
            parse_command("sales today"),
            Err(CommandParseError::NotACommand("sales today".to_owned()))
        );
        assert_eq!(
            parse_command("/pizza"),
            Err(CommandParseError::UnsupportedCommand("pizza".to_owned()))
        );
        assert_eq!(parse_command("/"), Err(CommandParseError::UnsupportedCommand(String::new())));
    }

    #[test]
    fn every_command_round_trips_through_its_name() {
        for command in BotCommand::ALL {
            assert_eq!(parse_command(&format!("/{}", command.name())), Ok(command));
        }
    }
}
