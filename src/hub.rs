//! The shared chat hub: membership, bans, operators, and broadcast fan-out.
//!
//! All mutation goes through a single `parking_lot::Mutex` guarding `HubInner`. Every critical
//! section here is a handful of map operations plus non-blocking mailbox sends; nothing awaits
//! while the lock is held, so a plain (non-async) mutex is the right tool — it also lets the
//! tab-completion provider, which the terminal adapter invokes synchronously, call straight into
//! the hub without needing an async bridge.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::client::ClientHandle;
use crate::error::HubError;
use crate::lines;

#[derive(Clone)]
pub struct Hub(Arc<Mutex<HubInner>>);

struct HubInner {
    members: HashMap<String, Arc<ClientHandle>>,
    operators: HashSet<String>,
    bans: HashSet<String>,
    name_max_len: usize,
}

impl Hub {
    pub fn new(name_max_len: usize) -> Hub {
        Hub(Arc::new(Mutex::new(HubInner {
            members: HashMap::new(),
            operators: HashSet::new(),
            bans: HashSet::new(),
            name_max_len,
        })))
    }

    /// Seeds the operator set at startup, e.g. from an authorized-keys-style file.
    pub fn seed_operator(&self, fingerprint: String) {
        self.0.lock().operators.insert(fingerprint);
    }

    /// Registers a new member, assigning it a unique, valid name derived from `requested_name`.
    /// Returns the name actually assigned. Broadcasts the join notice, excluding the joiner.
    pub fn add(&self, handle: Arc<ClientHandle>, requested_name: &str) -> String {
        let mut inner = self.0.lock();
        let name = inner.unique_name(requested_name);
        handle.set_name(&name);
        inner.members.insert(name.clone(), handle);
        let total = inner.members.len();
        inner.broadcast(lines::joined(&name, total), Some(&name));
        name
    }

    /// Removes a member by its current name, if still present. Broadcasts the leave notice.
    pub fn remove(&self, name: &str) {
        let mut inner = self.0.lock();
        if inner.members.remove(name).is_some() {
            inner.broadcast(lines::left(name), None);
        }
    }

    /// Attempts to rename `name` to `new_name`. On success, broadcasts the rename notice and
    /// returns the (possibly unchanged) name; on failure, returns the error the caller should
    /// report to the renaming client.
    pub fn rename(&self, name: &str, new_name: &str) -> Result<(), HubError> {
        let mut inner = self.0.lock();
        if !is_valid_name(new_name, inner.name_max_len) {
            return Err(HubError::NameInvalid);
        }
        if inner.members.contains_key(new_name) {
            return Err(HubError::NameTaken);
        }
        let handle = match inner.members.remove(name) {
            Some(handle) => handle,
            None => return Err(HubError::NoSuchName(name.to_owned())),
        };
        handle.set_name(new_name);
        inner.members.insert(new_name.to_owned(), handle);
        inner.broadcast(lines::renamed(name, new_name), None);
        Ok(())
    }

    /// Enqueues `message` into every member's mailbox, excluding `except` if given.
    pub fn broadcast(&self, message: impl Into<String>, except: Option<&str>) {
        self.0.lock().broadcast(message, except);
    }

    /// Current member names, optionally filtered to those with the given prefix.
    pub fn list(&self, prefix: Option<&str>) -> Vec<String> {
        let inner = self.0.lock();
        inner
            .members
            .keys()
            .filter(|name| prefix.map_or(true, |p| name.starts_with(p)))
            .cloned()
            .collect()
    }

    pub fn who(&self, name: &str) -> Option<Arc<ClientHandle>> {
        self.0.lock().members.get(name).cloned()
    }

    /// Bans `fingerprint`. If `duration` is given, the ban is automatically lifted after it
    /// elapses (spawned on the calling task's runtime).
    pub fn ban(&self, fingerprint: String, duration: Option<Duration>) {
        self.0.lock().bans.insert(fingerprint.clone());
        if let Some(duration) = duration {
            let hub = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                hub.0.lock().bans.remove(&fingerprint);
            });
        }
    }

    pub fn is_banned(&self, fingerprint: &str) -> bool {
        self.0.lock().bans.contains(fingerprint)
    }

    /// Grants operator status to `fingerprint`. If a connected member currently has that
    /// fingerprint, nothing further needs to happen: `is_op` always consults the operator set, so
    /// status takes effect immediately and survives renames (it is keyed by fingerprint, not
    /// name).
    pub fn op(&self, fingerprint: String) {
        self.0.lock().operators.insert(fingerprint);
    }

    pub fn is_op(&self, fingerprint: &str) -> bool {
        self.0.lock().operators.contains(fingerprint)
    }

    pub fn member_count(&self) -> usize {
        self.0.lock().members.len()
    }
}

impl HubInner {
    fn broadcast(&self, message: impl Into<String>, except: Option<&str>) {
        let message = message.into();
        for (name, handle) in &self.members {
            if Some(name.as_str()) == except {
                continue;
            }
            handle.enqueue(message.clone());
        }
    }

    /// Derives a unique, valid member name from `requested`, sanitizing and then appending
    /// incrementing numeric suffixes as needed (see DESIGN.md for the sanitization rule, which
    /// the distilled spec leaves implicit).
    fn unique_name(&self, requested: &str) -> String {
        let base = sanitize_name(requested, self.name_max_len);
        if is_valid_name(&base, self.name_max_len) && !self.members.contains_key(&base) {
            return base;
        }
        let mut suffix = 1u32;
        loop {
            let mut candidate = base.clone();
            let suffix_str = suffix.to_string();
            let max_base_len = self.name_max_len.saturating_sub(suffix_str.len());
            candidate.truncate(max_base_len);
            candidate.push_str(&suffix_str);
            if is_valid_name(&candidate, self.name_max_len) && !self.members.contains_key(&candidate) {
                return candidate;
            }
            suffix += 1;
        }
    }
}

/// A name is valid if it is non-empty, at most `max_len` bytes, contains no whitespace, and
/// contains only printable characters.
pub fn is_valid_name(name: &str, max_len: usize) -> bool {
    !name.is_empty()
        && name.len() <= max_len
        && name.chars().all(|c| !c.is_whitespace() && !c.is_control())
}

/// Best-effort cleanup of a requested name (typically the SSH username) into something that has
/// a chance of being valid: trims surrounding whitespace, replaces interior whitespace and control
/// characters with `_`, and truncates to `max_len` bytes. Falls back to "anonymous" if nothing
/// usable remains.
fn sanitize_name(requested: &str, max_len: usize) -> String {
    let cleaned: String = requested
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() || c.is_control() { '_' } else { c })
        .collect();
    let mut cleaned = cleaned;
    cleaned.truncate(max_len);
    if cleaned.is_empty() {
        "anonymous".to_owned()
    } else {
        cleaned
    }
}

#[cfg(test)]
pub(crate) mod test {
    //! Test-support helpers, mirroring the teacher's `state::test` module: build a hub and fake
    //! mailboxes without needing a real SSH transport.

    use std::sync::Arc;

    use tokio::sync::mpsc;

    use super::*;
    use crate::client::ClientHandle;

    pub fn hub() -> Hub {
        Hub::new(16)
    }

    pub fn add_client(hub: &Hub, fingerprint: &str, requested_name: &str) -> (Arc<ClientHandle>, mpsc::Receiver<String>, String) {
        let (handle, rx) = ClientHandle::new(fingerprint.to_owned(), "SSH-2.0-test".to_owned(), 10);
        let name = hub.add(handle.clone(), requested_name);
        (handle, rx, name)
    }

    pub fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::test::*;
    use super::*;

    #[test]
    fn name_uniqueness_is_injective() {
        let hub = hub();
        let (_a, _rxa, alice) = add_client(&hub, "fp-alice", "alice");
        let (_b, _rxb, alice1) = add_client(&hub, "fp-alice2", "alice");
        assert_eq!(alice, "alice");
        assert_eq!(alice1, "alice1");
        let mut names = hub.list(None);
        names.sort();
        assert_eq!(names, vec!["alice".to_owned(), "alice1".to_owned()]);
    }

    #[test]
    fn s1_join_leave() {
        let hub = hub();
        let (_alice, mut alice_rx, _) = add_client(&hub, "fp-alice", "alice");
        let (bob, mut bob_rx, bob_name) = add_client(&hub, "fp-bob", "bob");
        assert_eq!(bob_name, "bob");

        assert_eq!(drain(&mut alice_rx), vec!["* bob joined. (Total: 2)".to_owned()]);
        assert!(drain(&mut bob_rx).is_empty());

        hub.remove(&bob.name());
        assert_eq!(drain(&mut alice_rx), vec!["* bob left.".to_owned()]);
    }

    #[test]
    fn rename_to_existing_name_is_rejected_and_unchanged() {
        let hub = hub();
        let (_alice, _rxa, _) = add_client(&hub, "fp-alice", "alice");
        let (_bob, mut bob_rx, _) = add_client(&hub, "fp-bob", "bob");
        drain(&mut bob_rx);

        let err = hub.rename("bob", "alice").unwrap_err();
        assert_eq!(err, HubError::NameTaken);
        let mut names = hub.list(None);
        names.sort();
        assert_eq!(names, vec!["alice".to_owned(), "bob".to_owned()]);
    }

    #[test]
    fn rename_rejects_invalid_names() {
        let hub = hub();
        let (_bob, _rx, _) = add_client(&hub, "fp-bob", "bob");
        assert_eq!(hub.rename("bob", "has space").unwrap_err(), HubError::NameInvalid);
        assert_eq!(hub.rename("bob", "").unwrap_err(), HubError::NameInvalid);
    }

    #[test]
    fn operator_status_survives_rename() {
        let hub = hub();
        let (carol, _rx, carol_name) = add_client(&hub, "fp-carol", "carol");
        hub.op(carol.fingerprint.clone());
        assert!(hub.is_op(&carol.fingerprint));

        hub.rename(&carol_name, "carol2").unwrap();
        assert!(hub.is_op(&carol.fingerprint));
    }

    #[test]
    fn s3_broadcast_excludes_sender() {
        let hub = hub();
        let (alice, mut alice_rx, _) = add_client(&hub, "fp-alice", "alice");
        let (_bob, mut bob_rx, _) = add_client(&hub, "fp-bob", "bob");
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        hub.broadcast(format!("{}: hello", alice.colored_name()), Some(&alice.name()));
        assert!(drain(&mut alice_rx).is_empty());
        assert_eq!(drain(&mut bob_rx), vec![format!("{}: hello", alice.colored_name())]);
    }

    #[test]
    fn ban_inserts_fingerprint() {
        let hub = hub();
        let (bob, _rx, bob_name) = add_client(&hub, "fp-bob", "bob");
        hub.ban(bob.fingerprint.clone(), None);
        assert!(hub.is_banned(&bob.fingerprint));
        hub.remove(&bob_name);
        assert!(hub.list(None).is_empty());
    }

    #[test]
    fn name_validation() {
        assert!(is_valid_name("alice", 16));
        assert!(!is_valid_name("", 16));
        assert!(!is_valid_name("has space", 16));
        assert!(!is_valid_name("way-too-long-a-name-for-this", 16));
    }
}
