use super::trie::CommandSchema;
use crate::error::{DbError, Result};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedArgs {
    pub positional: Vec<String>,
    pub named: HashMap<String, String>,
}

/// Tokenizes the remaining whitespace-separated tokens of a command,
/// splitting bare positional arguments from `KEY=VALUE` named options.
pub fn parse_args(tokens: &[&str], schema: CommandSchema) -> Result<ParsedArgs> {
    let mut positional = Vec::new();
    let mut named = HashMap::new();

    for token in tokens {
        if let Some((key, value)) = token.split_once('=') {
            let key = key.to_ascii_uppercase();
            if !schema.named_allowed.contains(&key.as_str()) {
                return Err(DbError::ParseError(format!("unknown option: {key}")));
            }
            named.insert(key, value.to_string());
        } else {
            if positional.len() >= schema.positional.len() {
                return Err(DbError::ParseError(format!(
                    "unexpected extra argument: {token}"
                )));
            }
            positional.push(token.to_string());
        }
    }

    let required = schema.positional.iter().filter(|a| a.required).count();
    if positional.len() < required {
        let missing = &schema.positional[positional.len()];
        return Err(DbError::ParseError(format!(
            "missing required argument: {}",
            missing.name
        )));
    }

    Ok(ParsedArgs { positional, named })
}
