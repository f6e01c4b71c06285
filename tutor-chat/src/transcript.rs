use std::collections::{HashMap, HashSet};

use tutor_client::ServerId;

use crate::composer::Composer;
use crate::message::{Delivery, Message};

/// Local identity of a transcript or thread entry.
///
/// Unlike [`crate::MessageId`] it never changes and is unique even among
/// messages still carrying the sentinel id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryKey(u64);

#[derive(Debug, Clone, PartialEq)]
pub enum EntryKind {
    Message(Message),
    /// Placeholder shown while the assistant is answering.
    Typing,
    /// Inline failure notice.
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: EntryKey,
    pub kind: EntryKind,
}

impl Entry {
    pub fn message(&self) -> Option<&Message> {
        match &self.kind {
            EntryKind::Message(msg) => Some(msg),
            _ => None,
        }
    }

    fn message_mut(&mut self) -> Option<&mut Message> {
        match &mut self.kind {
            EntryKind::Message(msg) => Some(msg),
            _ => None,
        }
    }

    fn has_server_id(&self, ids: &HashSet<&ServerId>) -> bool {
        self.message()
            .and_then(|m| m.id.server())
            .is_some_and(|id| ids.contains(id))
    }
}

/// Replies attached to an assistant message.
#[derive(Debug, Clone, Default)]
pub struct Thread {
    entries: Vec<Entry>,
    pub composer: Composer,
    pub composer_open: bool,
}

impl Thread {
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().filter_map(Entry::message)
    }
}

/// The conversation as the widget knows it.
///
/// Entries are ordered top to bottom. Threads hang off top-level entries and
/// share the same key space.
#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<Entry>,
    threads: HashMap<EntryKey, Thread>,
    next_key: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_key(&mut self) -> EntryKey {
        let key = EntryKey(self.next_key);
        self.next_key += 1;
        key
    }

    /// Appends an entry at the bottom of the transcript.
    pub fn push(&mut self, kind: EntryKind) -> EntryKey {
        let key = self.alloc_key();
        self.entries.push(Entry { key, kind });
        key
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: EntryKey) -> bool {
        self.position(key).is_some()
    }

    pub fn position(&self, key: EntryKey) -> Option<usize> {
        self.entries.iter().position(|e| e.key == key)
    }

    pub fn get(&self, key: EntryKey) -> Option<&Entry> {
        self.entries.iter().find(|e| e.key == key)
    }

    pub fn message(&self, key: EntryKey) -> Option<&Message> {
        self.get(key).and_then(Entry::message)
    }

    pub fn message_mut(&mut self, key: EntryKey) -> Option<&mut Message> {
        self.entries
            .iter_mut()
            .find(|e| e.key == key)
            .and_then(Entry::message_mut)
    }

    /// Top-level messages, oldest first.
    pub fn messages(&self) -> impl Iterator<Item = (EntryKey, &Message)> {
        self.entries
            .iter()
            .filter_map(|e| e.message().map(|m| (e.key, m)))
    }

    /// Finds the top-level message carrying a server id.
    pub fn find(&self, id: &ServerId) -> Option<EntryKey> {
        self.messages()
            .find(|(_, m)| m.id.server() == Some(id))
            .map(|(key, _)| key)
    }

    pub fn pending_count(&self) -> usize {
        self.messages()
            .filter(|(_, m)| m.delivery == Delivery::Pending)
            .count()
    }

    /// Removes a top-level entry together with its thread.
    pub fn remove(&mut self, key: EntryKey) -> Option<Entry> {
        let pos = self.position(key)?;
        self.threads.remove(&key);
        Some(self.entries.remove(pos))
    }

    /// Removes the messages after `key` whose server id is listed in `ids`.
    ///
    /// Entries before `key`, and later entries not named in `ids`, are kept.
    /// Returns the removed keys in transcript order.
    pub fn remove_following(&mut self, key: EntryKey, ids: &[ServerId]) -> Vec<EntryKey> {
        let Some(pos) = self.position(key) else {
            return Vec::new();
        };
        let ids: HashSet<&ServerId> = ids.iter().collect();

        let removed: Vec<EntryKey> = self.entries[pos + 1..]
            .iter()
            .filter(|e| e.has_server_id(&ids))
            .map(|e| e.key)
            .collect();

        for key in &removed {
            self.threads.remove(key);
        }
        self.entries.retain(|e| !removed.contains(&e.key));
        removed
    }

    pub fn thread(&self, parent: EntryKey) -> Option<&Thread> {
        self.threads.get(&parent)
    }

    pub fn thread_mut(&mut self, parent: EntryKey) -> Option<&mut Thread> {
        self.threads.get_mut(&parent)
    }

    /// Returns the parent's thread, creating it on first use.
    ///
    /// Returns `None` when the parent is not in the transcript.
    pub fn ensure_thread(&mut self, parent: EntryKey) -> Option<&mut Thread> {
        if !self.contains(parent) {
            return None;
        }
        Some(self.threads.entry(parent).or_default())
    }

    /// Appends to the parent's thread. `None` if the parent is gone.
    pub fn push_to_thread(&mut self, parent: EntryKey, kind: EntryKind) -> Option<EntryKey> {
        if !self.contains(parent) {
            return None;
        }
        let key = self.alloc_key();
        self.threads
            .entry(parent)
            .or_default()
            .entries
            .push(Entry { key, kind });
        Some(key)
    }

    pub fn remove_from_thread(&mut self, parent: EntryKey, key: EntryKey) -> Option<Entry> {
        let thread = self.threads.get_mut(&parent)?;
        let pos = thread.entries.iter().position(|e| e.key == key)?;
        Some(thread.entries.remove(pos))
    }
}
