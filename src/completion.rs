//! Tab-completion: consulted by the terminal adapter on the Tab key.
//!
//! This is a pure function of the hub's current membership and the line buffer; it has no
//! process-wide state (contrast with the teacher's note on avoiding a singleton completion
//! cursor — the closure the terminal adapter is given simply closes over a `Hub` clone).

use crate::hub::Hub;

/// Given the line buffer up to the cursor, finds the nick-prefix fragment (the text since the
/// last space) and, if it matches at least one member, splices the last match in its place.
///
/// Returns `None` if there is no match (the terminal adapter should leave the line untouched).
pub fn complete(hub: &Hub, line: &str, cursor: usize) -> Option<(String, usize)> {
    let head = &line[..cursor];
    let fragment_start = head.rfind(' ').map(|i| i + 1).unwrap_or(0);
    let fragment = &head[fragment_start..];

    let matches = hub.list(Some(fragment));
    let chosen = matches.last()?;

    let mut new_line = String::with_capacity(line.len() - fragment.len() + chosen.len());
    new_line.push_str(&line[..fragment_start]);
    new_line.push_str(chosen);
    new_line.push_str(&line[cursor..]);
    let new_cursor = fragment_start + chosen.len();

    Some((new_line, new_cursor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::test::add_client;

    #[test]
    fn s5_tab_completion_picks_last_match() {
        let hub = Hub::new(16);
        add_client(&hub, "fp-alice", "alice");
        add_client(&hub, "fp-alan", "alan");
        add_client(&hub, "fp-bob", "bob");

        let (line, cursor) = complete(&hub, "al", 2).expect("expected a completion");
        assert_eq!(cursor, 4);
        // The last match per the hub's (unspecified but stable-per-call) iteration order is
        // either "alice" or "alan"; whichever it is, the line must consist of that name alone and
        // the cursor must land right after it.
        assert!(line == "alice" || line == "alan");
        assert_eq!(line.len(), cursor);
    }

    #[test]
    fn completes_mid_line_fragment() {
        let hub = Hub::new(16);
        add_client(&hub, "fp-bob", "bob");

        let (line, cursor) = complete(&hub, "hey bo", 6).expect("expected a completion");
        assert_eq!(line, "hey bob");
        assert_eq!(cursor, 7);
    }

    #[test]
    fn no_match_returns_none() {
        let hub = Hub::new(16);
        add_client(&hub, "fp-bob", "bob");
        assert!(complete(&hub, "zzz", 3).is_none());
    }
}
