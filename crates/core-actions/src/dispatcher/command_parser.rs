//! Structured command line parsing.
//!
//! Converts a raw `:name args` line into a [`ParsedCommand`]. Host-level
//! commands (`:q`, `:w`, `:tree`) stay separate from document [`Command`]s
//! since only the runtime can act on them. Each command has a long name
//! matching the command surface and, where common, a short alias.
//!
//! Errors are represented as `ParsedCommand::Unknown(String)` which the
//! runtime turns into a message. No side effects here; pure classification.

use crate::Command;
use core_tree::NodeId;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    Quit,
    Write,
    /// Print the visible tree.
    Tree,
    Loom(Command),
    Unknown(String),
}

pub struct CommandParser;

impl CommandParser {
    pub fn parse(raw: &str) -> ParsedCommand {
        let s = raw.trim();
        let Some(body) = s.strip_prefix(':') else {
            return ParsedCommand::Unknown(s.to_string());
        };
        if body.is_empty() {
            return ParsedCommand::Unknown(String::new());
        }
        let (name, rest) = match body.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (body, ""),
        };
        let target = || (!rest.is_empty()).then(|| NodeId::from(rest));

        let cmd = match name {
            "q" | "quit" => return ParsedCommand::Quit,
            "w" | "write" => return ParsedCommand::Write,
            "tree" => return ParsedCommand::Tree,
            "complete" | "c" => Command::Complete,
            "generate-siblings" | "gs" => Command::GenerateSiblings,
            "create-child" => Command::CreateChild,
            "create-sibling" => Command::CreateSibling,
            "clone" => Command::Clone,
            "split-at-point" | "split" => Command::SplitAtPoint,
            "branch-at-point" | "branch" => Command::BranchAtPoint,
            "merge-with-parent" | "merge" => Command::MergeWithParent,
            "delete" | "d" => Command::Delete(rest.split_whitespace().map(NodeId::from).collect()),
            "clear-children" => Command::ClearChildren,
            "clear-siblings" => Command::ClearSiblings,
            "switch-to" | "to" => match target() {
                Some(id) => Command::SwitchTo(id),
                None => return ParsedCommand::Unknown(body.to_string()),
            },
            "switch-to-parent" | "up" => Command::SwitchToParent,
            "switch-to-child" | "down" => Command::SwitchToChild,
            "switch-to-next-sibling" | "next" => Command::SwitchToNextSibling,
            "switch-to-prev-sibling" | "prev" => Command::SwitchToPrevSibling,
            "toggle-collapse" => Command::ToggleCollapse(target()),
            "toggle-bookmark" => Command::ToggleBookmark(target()),
            "hoist" => Command::Hoist(target()),
            "unhoist" => Command::Unhoist,
            "set-setting" | "set" => match rest.split_once(char::is_whitespace) {
                Some((key, value)) => Command::SetSetting {
                    key: key.to_string(),
                    value: value.trim().to_string(),
                },
                None => return ParsedCommand::Unknown(body.to_string()),
            },
            "import" if !rest.is_empty() => Command::Import(PathBuf::from(rest)),
            "export" if !rest.is_empty() => Command::Export(PathBuf::from(rest)),
            "search" => Command::Search(rest.to_string()),
            _ => return ParsedCommand::Unknown(body.to_string()),
        };
        ParsedCommand::Loom(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_host_commands() {
        assert_eq!(CommandParser::parse(":q"), ParsedCommand::Quit);
        assert_eq!(CommandParser::parse(":w"), ParsedCommand::Write);
        assert_eq!(CommandParser::parse("  :tree "), ParsedCommand::Tree);
    }

    #[test]
    fn parse_long_and_short_names() {
        assert_eq!(
            CommandParser::parse(":generate-siblings"),
            ParsedCommand::Loom(Command::GenerateSiblings)
        );
        assert_eq!(
            CommandParser::parse(":next"),
            ParsedCommand::Loom(Command::SwitchToNextSibling)
        );
    }

    #[test]
    fn parse_targets_and_lists() {
        assert_eq!(
            CommandParser::parse(":to abc-123"),
            ParsedCommand::Loom(Command::SwitchTo(NodeId::from("abc-123")))
        );
        assert_eq!(
            CommandParser::parse(":delete a b"),
            ParsedCommand::Loom(Command::Delete(vec![NodeId::from("a"), NodeId::from("b")]))
        );
        assert_eq!(
            CommandParser::parse(":delete"),
            ParsedCommand::Loom(Command::Delete(vec![]))
        );
        assert_eq!(
            CommandParser::parse(":hoist"),
            ParsedCommand::Loom(Command::Hoist(None))
        );
    }

    #[test]
    fn parse_setting_keeps_value_spaces() {
        assert_eq!(
            CommandParser::parse(":set model.prepend  <|endoftext|> x"),
            ParsedCommand::Loom(Command::SetSetting {
                key: "model.prepend".into(),
                value: "<|endoftext|> x".into()
            })
        );
    }

    #[test]
    fn parse_search_with_empty_term_clears() {
        assert_eq!(
            CommandParser::parse(":search"),
            ParsedCommand::Loom(Command::Search(String::new()))
        );
        assert_eq!(
            CommandParser::parse(":search dark night"),
            ParsedCommand::Loom(Command::Search("dark night".into()))
        );
    }

    #[test]
    fn parse_unknown_and_missing_args() {
        assert_eq!(
            CommandParser::parse(":doesnotexist"),
            ParsedCommand::Unknown("doesnotexist".into())
        );
        assert_eq!(CommandParser::parse(":to"), ParsedCommand::Unknown("to".into()));
        assert_eq!(
            CommandParser::parse(":import"),
            ParsedCommand::Unknown("import".into())
        );
        assert_eq!(
            CommandParser::parse("no colon"),
            ParsedCommand::Unknown("no colon".into())
        );
    }
}
