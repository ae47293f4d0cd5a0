//! Generational arena and the player registry built on it.
//!
//! Front-ends that address players by number (FFI, scripting bindings) get a
//! [`Handle`] instead of a raw index. A handle names a slot *and* the
//! generation that slot had when the value was inserted, so a handle kept
//! after `remove` never reaches whatever is stored there next.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::config::StreamConfig;
use crate::decoder::{AudioDecoder, AudioSink, ImageSink, VideoDecoder};
use crate::error::{Result, StreamError};
use crate::player::MediaPlayer;

/// Typed, generation-checked index into an [`Arena`].
pub struct Handle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _marker: PhantomData,
        }
    }

    /// Packs the handle into a single integer for foreign callers.
    pub fn to_raw(self) -> u64 {
        (u64::from(self.generation) << 32) | u64::from(self.index)
    }

    /// Rebuilds a handle from [`to_raw`](Self::to_raw). Validity is checked on use.
    pub fn from_raw(raw: u64) -> Self {
        Self::new(raw as u32, (raw >> 32) as u32)
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}v{})", self.index, self.generation)
    }
}

enum Entry<T> {
    Occupied { generation: u32, value: T },
    Free { generation: u32, next_free: Option<u32> },
}

/// Slot storage with free-list reuse and stale-handle detection.
pub struct Arena<T> {
    entries: Vec<Entry<T>>,
    free_head: Option<u32>,
    len: usize,
}

impl<T> Arena<T> {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            free_head: None,
            len: 0,
        }
    }

    /// Stores `value`, reusing a freed slot when possible.
    pub fn insert(&mut self, value: T) -> Handle<T> {
        self.len += 1;
        if let Some(index) = self.free_head {
            let entry = &mut self.entries[index as usize];
            if let Entry::Free {
                generation,
                next_free,
            } = *entry
            {
                self.free_head = next_free;
                *entry = Entry::Occupied { generation, value };
                return Handle::new(index, generation);
            }
        }

        let index = self.entries.len() as u32;
        self.entries.push(Entry::Occupied {
            generation: 0,
            value,
        });
        Handle::new(index, 0)
    }

    /// Returns the value for `handle` unless it was removed.
    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        match self.entries.get(handle.index as usize)? {
            Entry::Occupied { generation, value } if *generation == handle.generation => Some(value),
            _ => None,
        }
    }

    /// Mutable variant of [`get`](Self::get).
    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        match self.entries.get_mut(handle.index as usize)? {
            Entry::Occupied { generation, value } if *generation == handle.generation => Some(value),
            _ => None,
        }
    }

    /// Removes and returns the value; the handle (and copies of it) go stale.
    pub fn remove(&mut self, handle: Handle<T>) -> Option<T> {
        let entry = self.entries.get_mut(handle.index as usize)?;
        match entry {
            Entry::Occupied { generation, .. } if *generation == handle.generation => {}
            _ => return None,
        }

        let freed = Entry::Free {
            generation: handle.generation.wrapping_add(1),
            next_free: self.free_head,
        };
        let Entry::Occupied { value, .. } = std::mem::replace(entry, freed) else {
            return None;
        };
        self.free_head = Some(handle.index);
        self.len -= 1;
        Some(value)
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterates live values with their handles.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| match entry {
                Entry::Occupied { generation, value } => {
                    Some((Handle::new(index as u32, *generation), value))
                }
                Entry::Free { .. } => None,
            })
    }

    /// Removes every value, leaving all outstanding handles stale.
    pub fn drain(&mut self) -> Vec<T> {
        let handles: Vec<Handle<T>> = self.iter().map(|(handle, _)| handle).collect();
        handles
            .into_iter()
            .filter_map(|handle| self.remove(handle))
            .collect()
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns every opened [`MediaPlayer`], addressed by handle.
#[derive(Default)]
pub struct PlayerRegistry {
    players: Arena<MediaPlayer>,
}

impl PlayerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a stream and registers its player.
    pub fn open(
        &mut self,
        audio: Option<Box<dyn AudioDecoder>>,
        video: Option<Box<dyn VideoDecoder>>,
        audio_sink: Option<Box<dyn AudioSink>>,
        image_sink: Arc<dyn ImageSink>,
        config: StreamConfig,
    ) -> Result<Handle<MediaPlayer>> {
        let player = MediaPlayer::open(audio, video, audio_sink, image_sink, config)?;
        let handle = self.players.insert(player);
        tracing::debug!("Registered player {:?}", handle);
        Ok(handle)
    }

    /// Returns the player for `handle`.
    pub fn get(&self, handle: Handle<MediaPlayer>) -> Result<&MediaPlayer> {
        self.players.get(handle).ok_or(StreamError::InvalidHandle)
    }

    /// Closes and unregisters the player for `handle`.
    pub fn close(&mut self, handle: Handle<MediaPlayer>) -> Result<()> {
        let player = self.players.remove(handle).ok_or(StreamError::InvalidHandle)?;
        player.close();
        tracing::debug!("Closed player {:?}", handle);
        Ok(())
    }

    /// Closes every player.
    pub fn close_all(&mut self) {
        for player in self.players.drain() {
            player.close();
        }
    }

    /// Number of open players.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Returns true when no player is open.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
