//! Optimistic list reconciliation.
//!
//! Each entry moves Idle → Optimistic → {Confirmed | RolledBack}. A pending
//! entry carries a temporary id and a correlation key; it is confirmed
//! either by its own HTTP response (matched by temporary id) or by a hub
//! event whose correlation key matches (oldest pending first). Whichever
//! confirmation arrives second is a no-op, detected by the authoritative id
//! already being present. Ids deleted locally are tombstoned so a late
//! event can never bring them back.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::models::comment::Comment;
use crate::models::post::Post;

/// How long an entry may stay pending before a sweep rolls it back.
pub const DEFAULT_PENDING_TIMEOUT: Duration = Duration::from_secs(30);

/// Prefix of locally synthesized ids.
pub const TEMP_ID_PREFIX: &str = "temp-";

pub fn is_temp_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

/// Matches a pending entry to its authoritative twin when no id is known yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationKey {
    author_id: String,
    parent_id: Option<String>,
    content: String,
}

impl CorrelationKey {
    pub fn new(author_id: &str, parent_id: Option<&str>, content: &str) -> Self {
        Self {
            author_id: author_id.to_string(),
            parent_id: parent_id.map(str::to_string),
            content: normalize(content),
        }
    }
}

/// Trim and collapse internal whitespace runs, as the server trims input.
fn normalize(content: &str) -> String {
    content.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// An entity that can live in an [`OptimisticList`].
pub trait Reconcilable: Clone {
    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn correlation_key(&self) -> CorrelationKey;
}

impl Reconcilable for Comment {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn correlation_key(&self) -> CorrelationKey {
        CorrelationKey::new(&self.author.id, self.parent_id.as_deref(), &self.content)
    }
}

impl Reconcilable for Post {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn correlation_key(&self) -> CorrelationKey {
        CorrelationKey::new(&self.author.id, None, &self.content)
    }
}

/// Where new entries appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    NewestFirst,
    OldestFirst,
}

#[derive(Debug, Clone)]
struct PendingMeta {
    key: CorrelationKey,
    submitted_at: Instant,
}

#[derive(Debug, Clone)]
struct Slot<T> {
    item: T,
    /// `Some` while the entry is optimistic.
    pending: Option<PendingMeta>,
}

/// What reconciling an authoritative entity did to the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// A pending entry was replaced in place.
    Confirmed,
    /// No pending entry matched; the entity was added.
    Inserted,
    /// The authoritative id was already present. Nothing changed.
    Duplicate,
    /// The id was deleted locally. Nothing changed.
    Tombstoned,
}

/// One visible list (a feed, a comment thread) with optimistic entries.
#[derive(Debug, Clone)]
pub struct OptimisticList<T> {
    slots: Vec<Slot<T>>,
    tombstones: HashSet<String>,
    order: Order,
    next_temp: u64,
}

impl<T: Reconcilable> OptimisticList<T> {
    pub fn new(order: Order) -> Self {
        Self {
            slots: Vec::new(),
            tombstones: HashSet::new(),
            order,
            next_temp: 0,
        }
    }

    /// Seed with already-confirmed entities, in display order.
    pub fn with_items(order: Order, items: impl IntoIterator<Item = T>) -> Self {
        let mut list = Self::new(order);
        list.slots = items
            .into_iter()
            .map(|item| Slot { item, pending: None })
            .collect();
        list
    }

    fn insert(&mut self, slot: Slot<T>) {
        match self.order {
            Order::NewestFirst => self.slots.insert(0, slot),
            Order::OldestFirst => self.slots.push(slot),
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.item.id() == id)
    }

    fn is_confirmed(&self, id: &str) -> bool {
        self.slots
            .iter()
            .any(|s| s.pending.is_none() && s.item.id() == id)
    }

    /// Show a candidate immediately. Returns its temporary id.
    pub fn submit(&mut self, mut candidate: T) -> String {
        self.next_temp += 1;
        let temp_id = format!("{TEMP_ID_PREFIX}{}", self.next_temp);
        candidate.set_id(temp_id.clone());
        let key = candidate.correlation_key();
        self.insert(Slot {
            item: candidate,
            pending: Some(PendingMeta {
                key,
                submitted_at: Instant::now(),
            }),
        });
        temp_id
    }

    /// Confirm from the mutation's own HTTP response.
    pub fn confirm(&mut self, temp_id: &str, authoritative: T) -> Reconciled {
        let pending_at = self
            .slots
            .iter()
            .position(|s| s.pending.is_some() && s.item.id() == temp_id);

        if self.tombstones.contains(authoritative.id()) {
            if let Some(i) = pending_at {
                self.slots.remove(i);
            }
            return Reconciled::Tombstoned;
        }
        if self.is_confirmed(authoritative.id()) {
            // The broadcast won the race and already took this entry's place.
            if let Some(i) = pending_at {
                self.slots.remove(i);
            }
            return Reconciled::Duplicate;
        }

        match pending_at {
            Some(i) => {
                self.slots[i] = Slot {
                    item: authoritative,
                    pending: None,
                };
                Reconciled::Confirmed
            }
            None => {
                self.insert(Slot {
                    item: authoritative,
                    pending: None,
                });
                Reconciled::Inserted
            }
        }
    }

    /// Reconcile an entity announced by the hub.
    pub fn apply(&mut self, authoritative: T) -> Reconciled {
        if self.tombstones.contains(authoritative.id()) {
            return Reconciled::Tombstoned;
        }
        if self.position(authoritative.id()).is_some() {
            return Reconciled::Duplicate;
        }

        let key = authoritative.correlation_key();
        // Oldest pending first, independent of display order.
        let matched = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.pending.as_ref().map(|p| (i, p)))
            .filter(|(_, p)| p.key == key)
            .min_by_key(|(_, p)| p.submitted_at)
            .map(|(i, _)| i);

        match matched {
            Some(i) => {
                self.slots[i] = Slot {
                    item: authoritative,
                    pending: None,
                };
                Reconciled::Confirmed
            }
            None => {
                self.insert(Slot {
                    item: authoritative,
                    pending: None,
                });
                Reconciled::Inserted
            }
        }
    }

    /// Drop a pending entry after its mutation failed, returning the draft.
    pub fn rollback(&mut self, temp_id: &str) -> Option<T> {
        let i = self
            .slots
            .iter()
            .position(|s| s.pending.is_some() && s.item.id() == temp_id)?;
        Some(self.slots.remove(i).item)
    }

    /// Roll back every entry pending for at least `max_age`, oldest first.
    pub fn rollback_expired(&mut self, max_age: Duration) -> Vec<T> {
        let mut expired: Vec<(Instant, T)> = Vec::new();
        self.slots.retain(|s| match &s.pending {
            Some(p) if p.submitted_at.elapsed() >= max_age => {
                expired.push((p.submitted_at, s.item.clone()));
                false
            }
            _ => true,
        });
        expired.sort_by_key(|(at, _)| *at);
        expired.into_iter().map(|(_, item)| item).collect()
    }

    /// Replace a confirmed entity with a newer authoritative version.
    pub fn replace(&mut self, authoritative: T) -> bool {
        if self.tombstones.contains(authoritative.id()) {
            return false;
        }
        match self.position(authoritative.id()) {
            Some(i) => {
                self.slots[i].item = authoritative;
                true
            }
            None => false,
        }
    }

    /// Mutate a confirmed entity in place.
    pub fn update(&mut self, id: &str, f: impl FnOnce(&mut T)) -> bool {
        match self.slots.iter_mut().find(|s| s.item.id() == id) {
            Some(slot) => {
                f(&mut slot.item);
                true
            }
            None => false,
        }
    }

    /// Mutate every entity, e.g. to repaint an embedded author.
    pub fn update_all(&mut self, mut f: impl FnMut(&mut T)) {
        for slot in &mut self.slots {
            f(&mut slot.item);
        }
    }

    /// Delete an entity and tombstone its id.
    pub fn remove(&mut self, id: &str) -> Option<T> {
        self.tombstones.insert(id.to_string());
        let i = self.position(id)?;
        Some(self.slots.remove(i).item)
    }

    /// Drop an entity from view without tombstoning it; it may come back.
    pub fn discard(&mut self, id: &str) -> Option<T> {
        let i = self.position(id)?;
        Some(self.slots.remove(i).item)
    }

    /// Undo a local delete whose request failed.
    pub fn restore(&mut self, item: T) {
        self.tombstones.remove(item.id());
        if self.position(item.id()).is_none() {
            self.insert(Slot { item, pending: None });
        }
    }

    pub fn discard_where(&mut self, mut f: impl FnMut(&T) -> bool) {
        self.slots.retain(|s| s.pending.is_some() || !f(&s.item));
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.slots.iter().find(|s| s.item.id() == id).map(|s| &s.item)
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.slots
            .iter()
            .any(|s| s.pending.is_some() && s.item.id() == id)
    }

    pub fn is_tombstoned(&self, id: &str) -> bool {
        self.tombstones.contains(id)
    }

    /// Entities in display order, each with its pending flag for rendering.
    pub fn entries(&self) -> impl Iterator<Item = (&T, bool)> {
        self.slots.iter().map(|s| (&s.item, s.pending.is_some()))
    }

    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().map(|s| &s.item)
    }

    pub fn pending_count(&self) -> usize {
        self.slots.iter().filter(|s| s.pending.is_some()).count()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        id: String,
        author: String,
        text: String,
    }

    impl Reconcilable for Note {
        fn id(&self) -> &str {
            &self.id
        }

        fn set_id(&mut self, id: String) {
            self.id = id;
        }

        fn correlation_key(&self) -> CorrelationKey {
            CorrelationKey::new(&self.author, None, &self.text)
        }
    }

    fn note(id: &str, text: &str) -> Note {
        Note {
            id: id.to_string(),
            author: "usr_a".to_string(),
            text: text.to_string(),
        }
    }

    fn ids(list: &OptimisticList<Note>) -> Vec<&str> {
        list.items().map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn submit_shows_pending_entry_with_temp_id() {
        let mut list = OptimisticList::new(Order::OldestFirst);
        let temp = list.submit(note("", "hi"));
        assert!(is_temp_id(&temp));
        assert!(list.is_pending(&temp));
        assert_eq!(list.pending_count(), 1);
    }

    #[test]
    fn response_then_broadcast_yields_one_entry() {
        let mut list = OptimisticList::new(Order::OldestFirst);
        let temp = list.submit(note("", "hi"));

        assert_eq!(list.confirm(&temp, note("cmt_1", "hi")), Reconciled::Confirmed);
        assert_eq!(list.apply(note("cmt_1", "hi")), Reconciled::Duplicate);

        assert_eq!(ids(&list), vec!["cmt_1"]);
        assert_eq!(list.pending_count(), 0);
    }

    #[test]
    fn broadcast_then_response_yields_one_entry() {
        let mut list = OptimisticList::new(Order::OldestFirst);
        let temp = list.submit(note("", "hi"));

        assert_eq!(list.apply(note("cmt_1", "  hi ")), Reconciled::Confirmed);
        assert_eq!(list.confirm(&temp, note("cmt_1", "hi")), Reconciled::Duplicate);

        assert_eq!(ids(&list), vec!["cmt_1"]);
    }

    #[test]
    fn entries_flag_pending_until_confirmed() {
        let mut list = OptimisticList::with_items(Order::OldestFirst, vec![note("cmt_0", "first")]);
        let temp = list.submit(note("", "second"));

        let flags: Vec<(&str, bool)> = list.entries().map(|(n, p)| (n.id.as_str(), p)).collect();
        assert_eq!(flags, vec![("cmt_0", false), (temp.as_str(), true)]);

        list.confirm(&temp, note("cmt_1", "second"));
        let flags: Vec<(&str, bool)> = list.entries().map(|(n, p)| (n.id.as_str(), p)).collect();
        assert_eq!(flags, vec![("cmt_0", false), ("cmt_1", false)]);
    }

    #[test]
    fn confirmation_keeps_position() {
        let mut list = OptimisticList::with_items(Order::OldestFirst, vec![note("cmt_0", "first")]);
        let temp = list.submit(note("", "second"));
        list.apply(note("cmt_9", "from someone else"));

        list.confirm(&temp, note("cmt_1", "second"));
        assert_eq!(ids(&list), vec!["cmt_0", "cmt_1", "cmt_9"]);
    }

    #[test]
    fn identical_drafts_match_oldest_pending_first() {
        let mut list = OptimisticList::new(Order::NewestFirst);
        let first = list.submit(note("", "same"));
        let second = list.submit(note("", "same"));

        list.apply(note("post_1", "same"));
        assert!(!list.is_pending(&first));
        assert!(list.is_pending(&second));
        assert_eq!(list.get("post_1").map(|n| n.text.as_str()), Some("same"));
    }

    #[test]
    fn unmatched_event_inserts_in_display_order() {
        let mut newest = OptimisticList::with_items(Order::NewestFirst, vec![note("p1", "old")]);
        assert_eq!(newest.apply(note("p2", "new")), Reconciled::Inserted);
        assert_eq!(ids(&newest), vec!["p2", "p1"]);
    }

    #[test]
    fn rollback_returns_the_draft() {
        let mut list = OptimisticList::new(Order::OldestFirst);
        let temp = list.submit(note("", "keep me"));

        let draft = list.rollback(&temp).unwrap();
        assert_eq!(draft.text, "keep me");
        assert!(list.is_empty());
        assert!(list.rollback(&temp).is_none());
    }

    #[test]
    fn rollback_ignores_confirmed_entries() {
        let mut list = OptimisticList::new(Order::OldestFirst);
        let temp = list.submit(note("", "x"));
        list.confirm(&temp, note("cmt_1", "x"));
        assert!(list.rollback("cmt_1").is_none());
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn deleted_entity_is_never_reinserted() {
        let mut list = OptimisticList::with_items(Order::OldestFirst, vec![note("cmt_1", "x")]);
        list.remove("cmt_1");

        assert_eq!(list.apply(note("cmt_1", "x")), Reconciled::Tombstoned);
        assert!(!list.replace(note("cmt_1", "edited")));
        assert!(list.is_empty());
    }

    #[test]
    fn delete_before_confirmation_discards_the_response() {
        let mut list = OptimisticList::new(Order::OldestFirst);
        let temp = list.submit(note("", "x"));
        // The server id became known through the broadcast and was deleted.
        list.apply(note("cmt_1", "x"));
        list.remove("cmt_1");

        assert_eq!(list.confirm(&temp, note("cmt_1", "x")), Reconciled::Tombstoned);
        assert!(list.is_empty());
    }

    #[test]
    fn restore_undoes_a_failed_delete() {
        let mut list = OptimisticList::with_items(Order::OldestFirst, vec![note("cmt_1", "x")]);
        let removed = list.remove("cmt_1").unwrap();
        list.restore(removed);

        assert!(!list.is_tombstoned("cmt_1"));
        assert_eq!(list.apply(note("cmt_1", "x")), Reconciled::Duplicate);
    }

    #[test]
    fn expired_entries_roll_back_oldest_first() {
        let mut list = OptimisticList::new(Order::NewestFirst);
        list.submit(note("", "a"));
        list.submit(note("", "b"));
        let keep = list.apply(note("p1", "confirmed"));
        assert_eq!(keep, Reconciled::Inserted);

        assert!(list.rollback_expired(DEFAULT_PENDING_TIMEOUT).is_empty());

        let expired = list.rollback_expired(Duration::ZERO);
        let texts: Vec<_> = expired.iter().map(|n| n.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b"]);
        assert_eq!(ids(&list), vec!["p1"]);
    }
}
