use std::str::FromStr;

use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::api::ExportFormat;
use crate::error::{Error, Result};

/// Commands that can be invoked by starting a message with a leading slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Start a new conversation
    New,
    /// List saved conversations
    Chats,
    /// Open a conversation from the list
    Open,
    /// Delete a conversation
    Delete,
    /// Export an answer as a report
    Export,
    /// Thumbs up
    Good,
    /// Thumbs down
    Bad,
    /// Detailed rating
    Feedback,
    /// Query history panel
    History,
    /// Save the transcript as HTML
    Save,
    /// Show help
    Help,
    /// Exit the application
    Quit,
}

pub fn command_entries() -> Vec<CommandEntry> {
    SlashCommand::iter()
        .map(|command| CommandEntry {
            command,
            keyword: command.command(),
            description: command.description(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: SlashCommand,
    pub argument: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEntry {
    pub command: SlashCommand,
    pub keyword: &'static str,
    pub description: &'static str,
}

fn parse_index(value: &str) -> Result<usize> {
    match value.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(Error::Validation(format!(
            "Expected a message number starting at 1, got '{}'",
            value
        ))),
    }
}

impl ParsedCommand {
    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }

    /// Optional 1-based index, as taken by /open, /delete, /good and /bad
    pub fn index(&self) -> Result<Option<usize>> {
        self.argument().map(parse_index).transpose()
    }

    /// `/export <pdf|csv> [n]`
    pub fn export_target(&self) -> Result<(ExportFormat, Option<usize>)> {
        let mut parts = self.argument().unwrap_or_default().split_whitespace();
        let format = parts
            .next()
            .ok_or_else(|| Error::Validation("Usage: /export <pdf|csv> [n]".to_string()))?;
        let format = ExportFormat::from_str(format)
            .map_err(|_| Error::Validation(format!("Unknown export format '{}'", format)))?;
        let index = parts.next().map(parse_index).transpose()?;
        Ok((format, index))
    }

    /// `/feedback <1-5> [comment]`
    pub fn rating(&self) -> Result<(u8, Option<String>)> {
        let usage = || Error::Validation("Usage: /feedback <1-5> [comment]".to_string());
        let argument = self.argument().ok_or_else(usage)?;
        let (rating, comment) = match argument.split_once(char::is_whitespace) {
            Some((rating, comment)) => (rating, Some(comment.trim().to_string())),
            None => (argument, None),
        };
        let rating = rating.parse::<u8>().map_err(|_| usage())?;
        Ok((rating, comment.filter(|c| !c.is_empty())))
    }
}

impl SlashCommand {
    /// User-visible description shown in help.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::New => "start a new conversation",
            SlashCommand::Chats => "show saved conversations in the sidebar",
            SlashCommand::Open => "open conversation <n> from the sidebar",
            SlashCommand::Delete => "delete conversation [n] (default: current)",
            SlashCommand::Export => "export answer [n] as <pdf|csv> (default: latest)",
            SlashCommand::Good => "mark answer [n] as helpful",
            SlashCommand::Bad => "mark answer [n] as not helpful",
            SlashCommand::Feedback => "rate the latest answer <1-5> with an optional comment",
            SlashCommand::History => "search query history [term], --clear to wipe it",
            SlashCommand::Save => "save the transcript as HTML [path]",
            SlashCommand::Help => "show available commands",
            SlashCommand::Quit => "exit the application",
        }
    }

    /// Command string without the leading '/'.
    pub fn command(self) -> &'static str {
        self.into()
    }
}

/// Return all built-in commands in a Vec paired with their command string.
pub fn built_in_slash_commands() -> Vec<(&'static str, SlashCommand)> {
    SlashCommand::iter().map(|c| (c.command(), c)).collect()
}

/// Parse a slash command from user input
pub fn parse_slash_command(input: &str) -> Option<ParsedCommand> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let (head, argument) = match rest.split_once(char::is_whitespace) {
        Some((head, argument)) => (head, Some(argument.trim())),
        None => (rest, None),
    };

    let command = SlashCommand::from_str(head).ok().or_else(|| {
        match head.to_lowercase().as_str() {
            "q" | "bye" | "exit" => Some(SlashCommand::Quit),
            "n" => Some(SlashCommand::New),
            "ls" | "list" => Some(SlashCommand::Chats),
            "rm" => Some(SlashCommand::Delete),
            "up" | "+1" => Some(SlashCommand::Good),
            "down" | "-1" => Some(SlashCommand::Bad),
            "rate" => Some(SlashCommand::Feedback),
            "h" | "?" => Some(SlashCommand::Help),
            _ => None,
        }
    })?;

    let argument = argument.filter(|a| !a.is_empty()).map(str::to_string);
    Some(ParsedCommand { command, argument })
}

/// Get help text for all available commands
pub fn get_help_text() -> String {
    let mut help = String::from("Available commands:\n\n");
    for (command_str, command) in built_in_slash_commands() {
        help.push_str(&format!("/{} - {}\n", command_str, command.description()));
    }

    help.push_str("\n[n] counts answers from the top of the transcript, 1 = oldest.");
    help.push_str("\nAliases: /q for /quit, /ls for /chats, /rm for /delete, /rate for /feedback.");
    help.push_str("\nTab switches focus to the history search; PageUp/PageDown scroll; Ctrl+C quits.");

    help
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_and_aliases() {
        assert_eq!(
            parse_slash_command("/new"),
            Some(ParsedCommand {
                command: SlashCommand::New,
                argument: None
            })
        );
        assert_eq!(parse_slash_command("/q").unwrap().command, SlashCommand::Quit);
        assert_eq!(parse_slash_command("/rm 2").unwrap().command, SlashCommand::Delete);
        assert_eq!(parse_slash_command("hello /new"), None);
        assert_eq!(parse_slash_command("/frobnicate"), None);
    }

    #[test]
    fn index_arguments_are_one_based() {
        assert_eq!(parse_slash_command("/good").unwrap().index().unwrap(), None);
        assert_eq!(parse_slash_command("/good 3").unwrap().index().unwrap(), Some(3));
        assert!(parse_slash_command("/good 0").unwrap().index().is_err());
        assert!(parse_slash_command("/open two").unwrap().index().is_err());
    }

    #[test]
    fn export_takes_a_format_and_optional_index() {
        let (format, index) = parse_slash_command("/export PDF 2")
            .unwrap()
            .export_target()
            .unwrap();
        assert_eq!(format, ExportFormat::Pdf);
        assert_eq!(index, Some(2));

        let (format, index) = parse_slash_command("/export csv")
            .unwrap()
            .export_target()
            .unwrap();
        assert_eq!(format, ExportFormat::Csv);
        assert_eq!(index, None);

        assert!(parse_slash_command("/export docx").unwrap().export_target().is_err());
        assert!(parse_slash_command("/export").unwrap().export_target().is_err());
    }

    #[test]
    fn feedback_splits_rating_and_comment() {
        let parsed = parse_slash_command("/feedback 4 missed the C2 domains").unwrap();
        assert_eq!(
            parsed.rating().unwrap(),
            (4, Some("missed the C2 domains".to_string()))
        );
        assert_eq!(parse_slash_command("/rate 2").unwrap().rating().unwrap(), (2, None));
        assert!(parse_slash_command("/feedback great").unwrap().rating().is_err());
    }

    #[test]
    fn help_lists_every_command() {
        let help = get_help_text();
        for (keyword, _) in built_in_slash_commands() {
            assert!(help.contains(&format!("/{} ", keyword)), "missing /{}", keyword);
        }
    }
}
