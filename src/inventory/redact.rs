//! Credential redaction
//!
//! Composes the loggable form of an inventory command and scrubs secret
//! values from failure text that leaves the executor.

use crate::domain::ports::{InventoryCommand, Secret, SessionContext};
use regex::Regex;
use std::sync::OnceLock;

/// Placeholder written in place of any secret value
pub const REDACTED: &str = "******";

/// Environment variable that carries the secret
pub const CREDENTIAL_MARKER: &str = "GOVC_PASSWORD";

/// Matches `GOVC_PASSWORD=<value>` where the value is double-quoted (with
/// backslash escapes), single-quoted, or a bare word.
fn marker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?s)(GOVC_PASSWORD=)("(?:[^"\\]|\\.)*"|'[^']*'|\S+)"#)
            .expect("credential marker pattern is valid")
    })
}

/// Quote a value for display the way a POSIX shell would accept it
pub fn shell_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\'' | '$' | '`' | '\\') || c.is_whitespace() {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

fn needs_quoting(value: &str) -> bool {
    value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '$' | '`' | '\\' | ';' | '&' | '|' | '*'))
}

/// Compose the full command line, secret included. Never log this directly.
fn compose_command_line(cli_path: &str, session: &SessionContext, command: &InventoryCommand) -> String {
    let mut line = format!(
        "GOVC_INSECURE={} GOVC_URL={} GOVC_USERNAME={} {}={} {} {}",
        if session.insecure_tls() { "1" } else { "0" },
        shell_quote(session.endpoint()),
        shell_quote(session.principal()),
        CREDENTIAL_MARKER,
        shell_quote(session.secret().expose()),
        cli_path,
        command.subcommand(),
    );
    for arg in command.args() {
        line.push(' ');
        if needs_quoting(arg) {
            line.push_str(&shell_quote(arg));
        } else {
            line.push_str(arg);
        }
    }
    line
}

/// The loggable command line, with the credential value replaced
pub fn display_command(cli_path: &str, session: &SessionContext, command: &InventoryCommand) -> String {
    redact(&compose_command_line(cli_path, session, command), session.secret())
}

/// Replace every occurrence of `secret` in `text`
///
/// Handles the credential marker, the shell-quoted form and the raw value.
pub fn redact(text: &str, secret: &Secret) -> String {
    let replacement = format!("${{1}}{}", REDACTED);
    let mut scrubbed = marker_pattern()
        .replace_all(text, replacement.as_str())
        .into_owned();

    let raw = secret.expose();
    if raw.is_empty() {
        return scrubbed;
    }

    let quoted = shell_quote(raw);
    let escaped = &quoted[1..quoted.len() - 1];
    if escaped != raw {
        scrubbed = scrubbed.replace(escaped, REDACTED);
    }
    scrubbed.replace(raw, REDACTED)
}
