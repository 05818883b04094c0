// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Script header parsing and command-name normalization.
//!
//! A submission may start with line-prefixed directives:
//!
//! ```text
//! ###COMMAND: ping
//! ###DESCRIPTION: replies with pong
//! ###CODE:
//! function execute(event, ctx, args) return 'pong' end
//! ```
//!
//! Every line after `###CODE:` is the body.

const COMMAND_DIRECTIVE: &str = "###COMMAND:";
const DESCRIPTION_DIRECTIVE: &str = "###DESCRIPTION:";
const CODE_DIRECTIVE: &str = "###CODE:";

/// Fields extracted from a submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptHeader {
    /// Normalized command key, if a non-empty `###COMMAND:` line was present.
    pub command: Option<String>,
    /// Trimmed description, if a non-empty `###DESCRIPTION:` line was present.
    pub description: Option<String>,
    /// Lines after `###CODE:`. Empty when the directive is absent.
    pub code: String,
}

impl ScriptHeader {
    /// The extracted body, or `raw` when no body was found.
    pub fn code_or<'a>(&'a self, raw: &'a str) -> &'a str {
        if self.code.trim().is_empty() {
            raw
        } else {
            &self.code
        }
    }
}

/// Parse the directive block of a submission.
///
/// Directives are only recognized at the start of a line, and only before
/// `###CODE:`; once the body starts every line is code.
pub fn parse_script_text(text: &str, marker: &str) -> ScriptHeader {
    let mut header = ScriptHeader::default();
    let mut code_lines: Vec<&str> = Vec::new();
    let mut in_code = false;

    for line in text.trim().split('\n') {
        if in_code {
            code_lines.push(line);
        } else if let Some(rest) = line.strip_prefix(COMMAND_DIRECTIVE) {
            let rest = rest.trim();
            header.command = (!rest.is_empty()).then(|| normalize_command(rest, marker));
        } else if let Some(rest) = line.strip_prefix(DESCRIPTION_DIRECTIVE) {
            let rest = rest.trim();
            header.description = (!rest.is_empty()).then(|| rest.to_string());
        } else if line.starts_with(CODE_DIRECTIVE) {
            in_code = true;
        }
    }

    header.code = code_lines.join("\n");
    header
}

/// Lowercase a command name and make sure it carries the marker.
///
/// `/MyCmd`, `mycmd` and `/mycmd` all become `/mycmd`.
pub fn normalize_command(raw: &str, marker: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    if lowered.starts_with(marker) {
        lowered
    } else {
        format!("{marker}{lowered}")
    }
}

/// Split a command message into its normalized command and arguments.
///
/// A `@botname` mention suffix on the command token is dropped. Returns `None`
/// when the text does not start with the marker.
pub fn split_command<'a>(text: &'a str, marker: &str) -> Option<(String, Vec<&'a str>)> {
    let text = text.trim_start();
    if !text.starts_with(marker) {
        return None;
    }
    let mut parts = text.split_whitespace();
    let token = parts.next()?;
    let token = token.split('@').next().unwrap_or(token);
    if token.len() <= marker.len() {
        return None;
    }
    Some((token.to_lowercase(), parts.collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_all_three_directives() {
        let text = "###COMMAND: Ping\n###DESCRIPTION: test\n###CODE:\nfunction execute(event, ctx, args)\n  return 'pong'\nend";
        let header = parse_script_text(text, "/");
        assert_eq!(header.command.as_deref(), Some("/ping"));
        assert_eq!(header.description.as_deref(), Some("test"));
        assert_eq!(
            header.code,
            "function execute(event, ctx, args)\n  return 'pong'\nend"
        );
    }

    #[test]
    fn missing_code_directive_yields_empty_body() {
        let header = parse_script_text("function execute() end", "/");
        assert_eq!(header.command, None);
        assert_eq!(header.code, "");
        assert_eq!(header.code_or("raw"), "raw");
    }

    #[test]
    fn directives_inside_body_are_code() {
        let text = "###CODE:\n-- ###COMMAND: nope\n###DESCRIPTION: still code";
        let header = parse_script_text(text, "/");
        assert_eq!(header.command, None);
        assert_eq!(header.description, None);
        assert_eq!(header.code, "-- ###COMMAND: nope\n###DESCRIPTION: still code");
    }

    #[test]
    fn blank_directives_are_ignored() {
        let header = parse_script_text("###COMMAND:   \n###DESCRIPTION:\n###CODE:\nx", "/");
        assert_eq!(header.command, None);
        assert_eq!(header.description, None);
    }

    #[test]
    fn normalization_lowercases_and_prefixes() {
        for raw in ["/MyCmd", "mycmd", "/mycmd", "  MYCMD "] {
            assert_eq!(normalize_command(raw, "/"), "/mycmd");
        }
        assert_eq!(normalize_command("Run", "!"), "!run");
    }

    #[test]
    fn split_command_strips_mention_and_collects_args() {
        let (cmd, args) = split_command("/Ping@ChatletBot a  b", "/").unwrap();
        assert_eq!(cmd, "/ping");
        assert_eq!(args, vec!["a", "b"]);
        assert!(split_command("hello /ping", "/").is_none());
        assert!(split_command("/", "/").is_none());
        assert!(split_command("/@bot", "/").is_none());
    }

    proptest! {
        #[test]
        fn reparse_is_idempotent(
            command in "[a-zA-Z][a-zA-Z0-9_]{0,12}",
            description in "[a-zA-Z0-9 ]{0,30}",
            body in "[a-zA-Z0-9 =()'\n]{0,80}",
        ) {
            let text = format!("###COMMAND: {command}\n###DESCRIPTION: {description}\n###CODE:\n{body}");
            let first = parse_script_text(&text, "/");
            let second = parse_script_text(&text, "/");
            prop_assert_eq!(first, second);
        }

        #[test]
        fn normalization_is_idempotent(raw in "/?[a-zA-Z0-9_]{1,16}") {
            let once = normalize_command(&raw, "/");
            prop_assert_eq!(normalize_command(&once, "/"), once.clone());
            prop_assert!(once.starts_with('/'));
        }
    }
}
