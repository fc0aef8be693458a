//! In-memory note store
//!
//! Notes live in three indexes: by id, by creation instant (FIFO eviction
//! order), and by expiry instant. Creation instants are strictly increasing
//! and expiry instants are unique, so both ordered indexes are keyed without
//! collisions. The store is bounded by `max_memory_usage`; when a new note
//! does not fit, the oldest notes are evicted first.
//!
//! Every operation takes `now` explicitly so expiry can be tested without
//! sleeping.

use bytes::Bytes;
use rand::{rngs::OsRng, RngCore};
use secnote_core::{NoteSettings, NoteStatus, SecnoteError, SecnoteResult};
use std::collections::{hash_map::Entry, BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::debug;

pub const NOTE_ID_LEN: usize = 32;

/// Unguessable 256-bit note identifier; textual form is base64url.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteId([u8; NOTE_ID_LEN]);

impl NoteId {
    fn generate() -> Self {
        let mut id = [0u8; NOTE_ID_LEN];
        OsRng.fill_bytes(&mut id);
        Self(id)
    }

    pub fn as_bytes(&self) -> &[u8; NOTE_ID_LEN] {
        &self.0
    }
}

impl FromStr for NoteId {
    type Err = SecnoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = secnote_crypto::base64url::decode(s)?;
        let id: [u8; NOTE_ID_LEN] = raw.as_slice().try_into().map_err(|_| {
            SecnoteError::invalid(
                "note id",
                format!("expected {NOTE_ID_LEN} bytes, got {}", raw.len()),
            )
        })?;
        Ok(Self(id))
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&secnote_crypto::base64url::encode(&self.0))
    }
}

impl fmt::Debug for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NoteId({self})")
    }
}

/// A note as submitted: opaque blob plus lifetime settings.
#[derive(Debug, Clone)]
pub struct NoteContent {
    pub data: Bytes,
    pub settings: NoteSettings,
}

impl NoteContent {
    fn expire_at(&self, created_at: Instant) -> Option<Instant> {
        (self.settings.expires_after > 0)
            .then(|| created_at + Duration::from_secs(self.settings.expires_after.into()))
    }
}

/// A note as read back.
#[derive(Debug, Clone)]
pub struct NoteRead {
    pub data: Bytes,
    pub status: NoteStatus,
}

/// Bookkeeping cost charged per note on top of its data.
pub const NOTE_OVERHEAD: usize = std::mem::size_of::<NoteId>() * 3
    + std::mem::size_of::<Instant>() * 3
    + std::mem::size_of::<NoteContent>();

fn note_memory_usage(content: &NoteContent) -> usize {
    content.data.len() + NOTE_OVERHEAD
}

#[derive(Debug)]
pub struct NoteStore {
    by_id: HashMap<NoteId, (Instant, NoteContent)>,
    /// (created_at, id), sorted by created_at
    by_creation: VecDeque<(Instant, NoteId)>,
    by_expiry: BTreeMap<Instant, NoteId>,
    memory_usage: usize,
    max_memory_usage: usize,
}

impl NoteStore {
    pub fn new(max_memory_usage: usize) -> Self {
        Self {
            by_id: HashMap::new(),
            by_creation: VecDeque::new(),
            by_expiry: BTreeMap::new(),
            memory_usage: 0,
            max_memory_usage,
        }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Bytes currently charged against the store capacity.
    pub fn memory_usage(&self) -> usize {
        self.memory_usage
    }

    pub fn max_memory_usage(&self) -> usize {
        self.max_memory_usage
    }

    /// Store a note and return its fresh id.
    ///
    /// Expired notes are collected first; then the oldest notes are evicted
    /// until the new one fits.
    pub fn add_note(&mut self, content: NoteContent, now: Instant) -> SecnoteResult<NoteId> {
        let cost = note_memory_usage(&content);
        if cost > self.max_memory_usage {
            return Err(SecnoteError::NoteTooBig {
                size: cost as u64,
                capacity: self.max_memory_usage as u64,
            });
        }

        let id = loop {
            let id = NoteId::generate();
            if !self.by_id.contains_key(&id) {
                break id;
            }
        };

        let mut created_at = match self.by_creation.back() {
            Some(&(last, _)) if last >= now => last + Duration::from_nanos(1),
            _ => now,
        };
        while content
            .expire_at(created_at)
            .is_some_and(|at| self.by_expiry.contains_key(&at))
        {
            created_at += Duration::from_nanos(1);
        }

        self.collect_expired(now);
        self.reclaim(cost);

        if let Some(at) = content.expire_at(created_at) {
            self.by_expiry.insert(at, id);
        }
        self.by_creation.push_back((created_at, id));
        self.by_id.insert(id, (created_at, content));
        self.memory_usage += cost;
        Ok(id)
    }

    /// Read a note, consuming one view if its views are limited.
    ///
    /// Returns `None` for unknown or expired ids. The last view removes the
    /// note and reports `remaining_views = Some(0)`.
    pub fn read_note(&mut self, id: &NoteId, now: Instant) -> Option<NoteRead> {
        self.collect_expired(now);

        let mut entry = match self.by_id.entry(*id) {
            Entry::Occupied(entry) => entry,
            Entry::Vacant(_) => return None,
        };

        let (created_at, content) = entry.get_mut();
        let created_at = *created_at;
        if content.settings.remaining_views > 0 {
            content.settings.remaining_views -= 1;
            if content.settings.remaining_views == 0 {
                let (_, content) = entry.remove();
                self.unindex(created_at, &content);
                debug!(note = %id, "note burned after last view");
                return Some(NoteRead {
                    data: content.data,
                    status: NoteStatus {
                        expires_after: None,
                        remaining_views: Some(0),
                    },
                });
            }
        }

        let expires_after = (content.settings.expires_after > 0).then(|| {
            let elapsed = u32::try_from(now.saturating_duration_since(created_at).as_secs())
                .unwrap_or(u32::MAX);
            content.settings.expires_after.saturating_sub(elapsed).max(1)
        });
        let remaining_views =
            (content.settings.remaining_views > 0).then_some(content.settings.remaining_views);

        Some(NoteRead {
            data: content.data.clone(),
            status: NoteStatus {
                expires_after,
                remaining_views,
            },
        })
    }

    /// Drop every note whose expiry instant is strictly before `now`.
    pub fn collect_expired(&mut self, now: Instant) -> usize {
        let mut collected = 0;
        while let Some(entry) = self.by_expiry.first_entry() {
            if *entry.key() >= now {
                break;
            }
            let id = entry.remove();
            if let Some((created_at, content)) = self.by_id.remove(&id) {
                self.remove_from_creation(created_at);
                self.memory_usage -= note_memory_usage(&content);
            }
            collected += 1;
        }
        if collected > 0 {
            debug!(collected, "expired notes collected");
        }
        collected
    }

    fn reclaim(&mut self, cost: usize) {
        while self.memory_usage + cost > self.max_memory_usage {
            let Some((_, id)) = self.by_creation.pop_front() else {
                break;
            };
            if let Some((created_at, content)) = self.by_id.remove(&id) {
                if let Some(at) = content.expire_at(created_at) {
                    self.by_expiry.remove(&at);
                }
                self.memory_usage -= note_memory_usage(&content);
                debug!(note = %id, "evicted oldest note to reclaim memory");
            }
        }
    }

    fn unindex(&mut self, created_at: Instant, content: &NoteContent) {
        if let Some(at) = content.expire_at(created_at) {
            self.by_expiry.remove(&at);
        }
        self.remove_from_creation(created_at);
        self.memory_usage -= note_memory_usage(content);
    }

    fn remove_from_creation(&mut self, created_at: Instant) {
        if let Ok(idx) = self
            .by_creation
            .binary_search_by_key(&created_at, |&(at, _)| at)
        {
            self.by_creation.remove(idx);
        }
    }
}
