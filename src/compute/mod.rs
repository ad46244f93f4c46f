//! Command trie, parser and argument schemas for the wire protocol.

mod parser;
mod trie;

pub use parser::{parse_args, ParsedArgs};
pub use trie::{command_schema, CommandSchema, ArgSpec, COMMANDS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    pub args: ParsedArgs,
}

use crate::error::{DbError, Result};

/// Splits raw request text into a command name (matched against the trie,
/// longest-known-prefix first so multi-word commands like `CREATE USER`
/// resolve before `CREATE`) and its remaining argument tokens, then
/// validates those tokens against the command's schema.
pub fn parse_command(line: &str) -> Result<ParsedCommand> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(DbError::ParseError("empty command".to_string()));
    }
    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    let (name, consumed) = trie::match_longest(&tokens)
        .ok_or_else(|| DbError::ParseError(format!("unknown command: {}", tokens[0])))?;
    let schema = command_schema(&name).expect("matched name must have a schema");
    let args = parser::parse_args(&tokens[consumed..], schema)?;
    Ok(ParsedCommand { name, args })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_set() {
        let cmd = parse_command("SET foo bar").unwrap();
        assert_eq!(cmd.name, "SET");
        assert_eq!(cmd.args.positional, vec!["foo", "bar"]);
    }

    #[test]
    fn parses_multi_word_command() {
        let cmd = parse_command("CREATE NAMESPACE app").unwrap();
        assert_eq!(cmd.name, "CREATE NAMESPACE");
        assert_eq!(cmd.args.positional, vec!["app"]);
    }

    #[test]
    fn parses_named_options() {
        let cmd = parse_command("SET foo bar TTL=30s NS=app").unwrap();
        assert_eq!(cmd.args.positional, vec!["foo", "bar"]);
        assert_eq!(cmd.args.named.get("TTL").map(|s| s.as_str()), Some("30s"));
        assert_eq!(cmd.args.named.get("NS").map(|s| s.as_str()), Some("app"));
    }

    #[test]
    fn unknown_command_is_parse_error() {
        assert!(matches!(parse_command("FROBNICATE x"), Err(DbError::ParseError(_))));
    }
}
