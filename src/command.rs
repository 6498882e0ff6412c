//! The slash-command dispatcher: a (mostly) pure function of `(actor, raw line)` that calls back
//! into the hub or the actor's own mailbox. See `SPEC_FULL.md` §4.3.

use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::client::ClientHandle;
use crate::config::Config;
use crate::error::HubError;
use crate::hub::Hub;
use crate::lines;

/// What the session loop should do after a dispatched command.
pub enum Effect {
    /// Nothing further; keep reading.
    None,
    /// `/exit` was issued: close the session channel.
    Exit,
}

/// Splits `rest` (everything after the command token) into up to two further tokens, the second
/// of which retains any remaining internal spaces.
fn split_args(rest: &str) -> (Option<&str>, Option<&str>) {
    let rest = rest.trim_start();
    if rest.is_empty() {
        return (None, None);
    }
    let arg1_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    let arg1 = &rest[..arg1_end];
    let arg2 = rest[arg1_end..].trim_start();
    (Some(arg1), if arg2.is_empty() { None } else { Some(arg2) })
}

/// Whether `line`'s first whitespace-separated token begins with `/`, i.e. whether the reader
/// should route it to `dispatch` rather than treat it as a plain chat line.
pub fn is_command(line: &str) -> bool {
    line.trim_end_matches(['\r', '\n'])
        .split_whitespace()
        .next()
        .is_some_and(|token| token.starts_with('/'))
}

/// Applies the silence/length gate shared by plain chat lines and `/me`: if the actor is
/// silenced, or the formatted message would exceed the configured byte cap, the message is
/// dropped and the actor is told so; otherwise it is broadcast to everyone else.
pub fn try_broadcast(hub: &Hub, config: &Config, actor: &ClientHandle, formatted: String) {
    if actor.is_silenced() || formatted.len() > config.max_message_bytes {
        actor.enqueue(lines::MESSAGE_REJECTED);
        return;
    }
    hub.broadcast(formatted, Some(&actor.name()));
}

/// Sanitizes a client version string for `/whois`: strips control characters, then falls back to
/// a fixed placeholder if the result is still longer than 100 bytes. The threshold and the
/// behavior of substituting (rather than truncating) are preserved verbatim from the original
/// service's observable behavior.
pub fn sanitize_client_version(raw: &str) -> String {
    let stripped: String = raw.chars().filter(|c| !c.is_control()).collect();
    if stripped.len() > 100 {
        lines::VERSION_PLACEHOLDER.to_owned()
    } else {
        stripped
    }
}

pub fn dispatch(hub: &Hub, config: &Config, actor: &Arc<ClientHandle>, raw: &str) -> Effect {
    let trimmed = raw.trim_end_matches(['\r', '\n']);
    let cmd_end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
    let cmd = &trimmed[..cmd_end];
    let rest = &trimmed[cmd_end..];

    if cmd.starts_with('/') {
        debug!("{} dispatched {}", actor.name(), cmd);
    }

    // `/me` extracts its argument as a literal prefix strip, not via the generic tokenizer: the
    // text is everything after the literal "/me", leading space included.
    if cmd == "/me" {
        let text = if rest.is_empty() {
            lines::ME_DEFAULT_SUFFIX.to_owned()
        } else {
            rest.to_owned()
        };
        let formatted = format!("** {}{}", actor.colored_name(), text);
        try_broadcast(hub, config, actor, formatted);
        return Effect::None;
    }

    match cmd {
        "/help" => {
            actor.enqueue(lines::HELP);
            Effect::None
        }
        "/about" => {
            actor.enqueue(lines::ABOUT);
            Effect::None
        }
        "/exit" => Effect::Exit,
        "/list" => {
            let mut names = hub.list(None);
            names.sort();
            actor.enqueue(lines::list(&names));
            Effect::None
        }
        "/nick" => {
            let (arg1, _) = split_args(rest);
            match arg1 {
                None => actor.enqueue(lines::missing_arg("nick")),
                Some(name) => {
                    if let Err(err) = hub.rename(&actor.name(), name) {
                        actor.enqueue(rename_error_line(err));
                    }
                }
            }
            Effect::None
        }
        "/whois" => {
            let (arg1, _) = split_args(rest);
            match arg1 {
                None => actor.enqueue(lines::missing_arg("whois")),
                Some(name) => match hub.who(name) {
                    Some(target) => actor.enqueue(format!(
                        "-> {} is {} via {}",
                        target.colored_name(),
                        target.fingerprint,
                        sanitize_client_version(&target.client_version),
                    )),
                    None => actor.enqueue(lines::no_such_name(name)),
                },
            }
            Effect::None
        }
        "/ban" => {
            if !hub.is_op(&actor.fingerprint) {
                actor.enqueue(lines::NOT_AN_ADMIN);
                return Effect::None;
            }
            let (arg1, _) = split_args(rest);
            match arg1 {
                None => actor.enqueue(lines::missing_arg("ban")),
                Some(name) => match hub.who(name) {
                    None => actor.enqueue(lines::no_such_name(name)),
                    Some(target) => {
                        target.enqueue(lines::banned_notice(&actor.name()));
                        hub.ban(target.fingerprint.clone(), None);
                        target.kill();
                        hub.broadcast(
                            lines::banned_broadcast(&target.name(), &actor.colored_name()),
                            None,
                        );
                    }
                },
            }
            Effect::None
        }
        "/op" => {
            if !hub.is_op(&actor.fingerprint) {
                actor.enqueue(lines::NOT_AN_ADMIN);
                return Effect::None;
            }
            let (arg1, _) = split_args(rest);
            match arg1 {
                None => actor.enqueue(lines::missing_arg("op")),
                Some(name) => match hub.who(name) {
                    None => actor.enqueue(lines::no_such_name(name)),
                    Some(target) => {
                        hub.op(target.fingerprint.clone());
                        target.enqueue(lines::made_op(&actor.name()));
                    }
                },
            }
            Effect::None
        }
        "/silence" => {
            if !hub.is_op(&actor.fingerprint) {
                actor.enqueue(lines::NOT_AN_ADMIN);
                return Effect::None;
            }
            let (arg1, arg2) = split_args(rest);
            match arg1 {
                None => actor.enqueue(lines::missing_arg("silence")),
                Some(name) => match hub.who(name) {
                    None => actor.enqueue(lines::no_such_name(name)),
                    Some(target) => {
                        let duration = match arg2.map(humantime::parse_duration) {
                            Some(Ok(duration)) => duration,
                            Some(Err(_)) => {
                                log::warn!("unparseable /silence duration {:?}, using default", arg2);
                                config.default_silence
                            }
                            None => config.default_silence,
                        };
                        target.silence(duration);
                        target.enqueue(lines::silenced_notice(
                            &humantime::format_duration(duration).to_string(),
                            &actor.name(),
                        ));
                    }
                },
            }
            Effect::None
        }
        _ if cmd.starts_with('/') => {
            actor.enqueue(lines::invalid_command(trimmed));
            Effect::None
        }
        _ => Effect::None,
    }
}

fn rename_error_line(err: HubError) -> String {
    match err {
        HubError::NameTaken => "-> That name is already taken.".to_owned(),
        HubError::NameInvalid => "-> That name is invalid.".to_owned(),
        HubError::NoSuchName(name) => lines::no_such_name(&name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::test::add_client;

    fn setup() -> (Hub, Config) {
        (Hub::new(16), Config::sample())
    }

    #[test]
    fn me_with_no_text_uses_default_suffix() {
        let (hub, config) = setup();
        let (alice, _rx, _) = add_client(&hub, "fp-alice", "alice");
        let (_bob, mut bob_rx, _) = add_client(&hub, "fp-bob", "bob");
        let _ = dispatch(&hub, &config, &alice, "/me");
        let msgs = crate::hub::test::drain(&mut bob_rx);
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].ends_with("is at a loss for words."));
    }

    #[test]
    fn me_distinguishes_from_longer_command_names() {
        let (hub, config) = setup();
        let (alice, mut alice_rx, _) = add_client(&hub, "fp-alice", "alice");
        let effect = dispatch(&hub, &config, &alice, "/meet bob");
        assert!(matches!(effect, Effect::None));
        let msgs = crate::hub::test::drain(&mut alice_rx);
        assert_eq!(msgs, vec![lines::invalid_command("/meet bob")]);
    }

    #[test]
    fn missing_nick_argument() {
        let (hub, config) = setup();
        let (alice, mut rx, _) = add_client(&hub, "fp-alice", "alice");
        dispatch(&hub, &config, &alice, "/nick");
        assert_eq!(
            crate::hub::test::drain(&mut rx),
            vec![lines::missing_arg("nick")]
        );
    }

    #[test]
    fn non_admin_ban_is_rejected() {
        let (hub, config) = setup();
        let (alice, mut alice_rx, _) = add_client(&hub, "fp-alice", "alice");
        let (_bob, _rx, _) = add_client(&hub, "fp-bob", "bob");
        dispatch(&hub, &config, &alice, "/ban bob");
        assert_eq!(
            crate::hub::test::drain(&mut alice_rx),
            vec![lines::NOT_AN_ADMIN.to_owned()]
        );
        assert!(!hub.is_banned("fp-bob"));
    }

    #[test]
    fn s6_ban_closes_and_broadcasts() {
        let (hub, config) = setup();
        let (carol, mut carol_rx, _) = add_client(&hub, "fp-carol", "carol");
        hub.op(carol.fingerprint.clone());
        let (bob, mut bob_rx, _) = add_client(&hub, "fp-bob", "bob");
        let (_alice, mut alice_rx, _) = add_client(&hub, "fp-alice", "alice");
        crate::hub::test::drain(&mut carol_rx);
        crate::hub::test::drain(&mut bob_rx);
        crate::hub::test::drain(&mut alice_rx);

        dispatch(&hub, &config, &carol, "/ban bob");

        assert!(hub.is_banned("fp-bob"));
        assert_eq!(
            crate::hub::test::drain(&mut bob_rx),
            vec![lines::banned_notice("carol")]
        );
        let alice_msgs = crate::hub::test::drain(&mut alice_rx);
        assert_eq!(
            alice_msgs,
            vec![lines::banned_broadcast("bob", &carol.colored_name())]
        );
    }

    #[test]
    fn s4_silence_rejects_then_expires() {
        let (hub, config) = setup();
        let (carol, _rx, _) = add_client(&hub, "fp-carol", "carol");
        hub.op(carol.fingerprint.clone());
        let (bob, mut bob_rx, _) = add_client(&hub, "fp-bob", "bob");
        let (_alice, mut alice_rx, _) = add_client(&hub, "fp-alice", "alice");
        crate::hub::test::drain(&mut bob_rx);
        crate::hub::test::drain(&mut alice_rx);

        dispatch(&hub, &config, &carol, "/silence bob 50ms");
        crate::hub::test::drain(&mut bob_rx);

        try_broadcast(&hub, &config, &bob, format!("{}: hi", bob.colored_name()));
        assert_eq!(
            crate::hub::test::drain(&mut bob_rx),
            vec![lines::MESSAGE_REJECTED.to_owned()]
        );
        assert!(crate::hub::test::drain(&mut alice_rx).is_empty());

        std::thread::sleep(Duration::from_millis(60));
        try_broadcast(&hub, &config, &bob, format!("{}: hi", bob.colored_name()));
        assert_eq!(
            crate::hub::test::drain(&mut alice_rx),
            vec![format!("{}: hi", bob.colored_name())]
        );
    }

    #[test]
    fn s7_oversized_message_is_rejected() {
        let (hub, config) = setup();
        let (alice, mut alice_rx, _) = add_client(&hub, "fp-alice", "alice");
        let (_bob, mut bob_rx, _) = add_client(&hub, "fp-bob", "bob");
        crate::hub::test::drain(&mut alice_rx);
        crate::hub::test::drain(&mut bob_rx);

        let huge = "x".repeat(config.max_message_bytes + 1);
        try_broadcast(&hub, &config, &alice, huge);
        assert_eq!(
            crate::hub::test::drain(&mut alice_rx),
            vec![lines::MESSAGE_REJECTED.to_owned()]
        );
        assert!(crate::hub::test::drain(&mut bob_rx).is_empty());
    }

    #[test]
    fn is_command_distinguishes_chat_from_slash() {
        assert!(is_command("/nick bob"));
        assert!(!is_command("hello"));
        assert!(!is_command("  "));
        assert!(!is_command(""));
        assert!(is_command("/me waves\r\n"));
    }

    #[test]
    fn client_version_sanitation_threshold() {
        let short = "SSH-2.0-OpenSSH_9.0";
        assert_eq!(sanitize_client_version(short), short);

        let long = "x".repeat(101);
        assert_eq!(sanitize_client_version(&long), lines::VERSION_PLACEHOLDER);

        let with_control = "SSH-2.0-\x07evil";
        assert_eq!(sanitize_client_version(with_control), "SSH-2.0-evil");
    }
}
