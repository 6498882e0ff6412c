//! Fixed strings sent to clients: help text, the about banner, and misc notices.
//!
//! Kept in one place, as ellidri keeps its RPL text helpers in `lines.rs`, so that wording stays
//! consistent and is easy to audit.

pub const HELP: &str = "\
Available commands:
  /about             - About this chat
  /exit              - Exit the chat
  /help              - Show this help
  /list              - List connected users
  /me <action>       - Show an action
  /nick <name>       - Rename yourself
  /op <name>         - Op a user (admin only)
  /ban <name>        - Ban a user (admin only)
  /silence <name> [duration] - Silence a user (admin only)
  /whois <name>      - Information about a user";

pub const ABOUT: &str = "\
  ssh-chat is a custom SSH server that lets you chat over a terminal.
  Source: https://github.com/shazow/ssh-chat";

pub const MESSAGE_REJECTED: &str = "-> Message rejected.";
pub const NOT_AN_ADMIN: &str = "-> You're not an admin.";

/// `/me` used with no further text.
pub const ME_DEFAULT_SUFFIX: &str = " is at a loss for words.";

/// Placeholder used in place of an oversized or control-character-laden client version string.
pub const VERSION_PLACEHOLDER: &str = "(unprintable client version)";

pub fn missing_arg(cmd: &str) -> String {
    format!("-> Missing $NAME from: /{} $NAME", cmd)
}

pub fn invalid_command(raw: &str) -> String {
    format!("-> Invalid command: {}", raw)
}

pub fn no_such_name(name: &str) -> String {
    format!("-> No such name: {}", name)
}

pub fn list(names: &[String]) -> String {
    format!("-> {} connected: {}", names.len(), names.join(", "))
}

pub fn joined(name: &str, total: usize) -> String {
    format!("* {} joined. (Total: {})", name, total)
}

pub fn left(name: &str) -> String {
    format!("* {} left.", name)
}

pub fn renamed(old: &str, new: &str) -> String {
    format!("* {} is now known as {}", old, new)
}

pub fn banned_notice(by: &str) -> String {
    format!("-> Banned by {}.", by)
}

pub fn banned_broadcast(name: &str, by: &str) -> String {
    format!("* {} was banned by {}", name, by)
}

pub fn made_op(by: &str) -> String {
    format!("-> Made op by {}.", by)
}

pub fn silenced_notice(duration: &str, by: &str) -> String {
    format!("-> Silenced for {} by {}.", duration, by)
}
