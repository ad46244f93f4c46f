//! Prefix trie mapping command tokens to argument schemas.

#[derive(Debug, Clone, Copy)]
pub struct ArgSpec {
    pub name: &'static str,
    pub required: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct CommandSchema {
    pub positional: &'static [ArgSpec],
    pub named_allowed: &'static [&'static str],
}

macro_rules! positional {
    ($($name:expr),* $(,)?) => {
        &[$(ArgSpec { name: $name, required: true }),*]
    };
}

const NONE: &[ArgSpec] = &[];

/// `(command tokens, schema)`. Multi-token entries are tried before their
/// single-token prefixes so `CREATE NAMESPACE` resolves before `CREATE`.
pub const COMMANDS: &[(&[&str], CommandSchema)] = &[
    (&["AUTH"], CommandSchema { positional: positional!["user", "pass"], named_allowed: &[] }),
    (&["SET"], CommandSchema { positional: positional!["key", "value"], named_allowed: &["TTL", "NS"] }),
    (&["GET"], CommandSchema { positional: positional!["key"], named_allowed: &["NS"] }),
    (&["DEL"], CommandSchema { positional: positional!["key"], named_allowed: &["NS"] }),
    (&["WATCH"], CommandSchema { positional: positional!["key"], named_allowed: &["NS"] }),
    (&["SET", "NS"], CommandSchema { positional: positional!["namespace"], named_allowed: &[] }),
    (&["CREATE", "USER"], CommandSchema { positional: positional!["username", "password"], named_allowed: &[] }),
    (&["CREATE", "ROLE"], CommandSchema { positional: positional!["name", "perms", "namespace"], named_allowed: &[] }),
    (&["CREATE", "NAMESPACE"], CommandSchema { positional: positional!["name"], named_allowed: &[] }),
    (&["DELETE", "USER"], CommandSchema { positional: positional!["username"], named_allowed: &[] }),
    (&["DELETE", "ROLE"], CommandSchema { positional: positional!["name"], named_allowed: &[] }),
    (&["DELETE", "NAMESPACE"], CommandSchema { positional: positional!["name"], named_allowed: &[] }),
    (&["ASSIGN", "ROLE"], CommandSchema { positional: positional!["username", "role"], named_allowed: &[] }),
    (&["DIVEST", "ROLE"], CommandSchema { positional: positional!["username", "role"], named_allowed: &[] }),
    (&["GET", "USER"], CommandSchema { positional: positional!["username"], named_allowed: &[] }),
    (&["GET", "ROLE"], CommandSchema { positional: positional!["name"], named_allowed: &[] }),
    (&["USERS"], CommandSchema { positional: NONE, named_allowed: &[] }),
    (&["ROLES"], CommandSchema { positional: NONE, named_allowed: &[] }),
    (&["NAMESPACES"], CommandSchema { positional: NONE, named_allowed: &[] }),
    (&["SESSIONS"], CommandSchema { positional: NONE, named_allowed: &[] }),
    (&["ME"], CommandSchema { positional: NONE, named_allowed: &[] }),
    (&["STAT"], CommandSchema { positional: NONE, named_allowed: &[] }),
    (&["HELP"], CommandSchema { positional: NONE, named_allowed: &[] }),
];

fn join(tokens: &[&str]) -> String {
    tokens.join(" ")
}

/// Tries the longest known token prefix first (two tokens, then one) and
/// returns `(canonical name, tokens consumed)`.
pub fn match_longest(tokens: &[&str]) -> Option<(String, usize)> {
    let upper: Vec<String> = tokens.iter().map(|t| t.to_ascii_uppercase()).collect();
    for width in (1..=2.min(tokens.len())).rev() {
        let candidate: Vec<&str> = upper[..width].iter().map(|s| s.as_str()).collect();
        if let Some((name_tokens, _)) = COMMANDS.iter().find(|(name, _)| *name == candidate.as_slice()) {
            return Some((join(name_tokens), width));
        }
    }
    None
}

pub fn command_schema(name: &str) -> Option<CommandSchema> {
    COMMANDS
        .iter()
        .find(|(tokens, _)| join(tokens) == name)
        .map(|(_, schema)| *schema)
}
