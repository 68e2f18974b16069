//! Logical channel slot bookkeeping
//!
//! Clients see small integer channel indices; the provider hands out its own
//! handles. The registry maps one onto the other. Index 0 is the basic channel
//! and is always present. Indices never move: closing a channel frees its slot
//! and the next open reuses the lowest free slot before the table grows.

use crate::config::DEFAULT_MAX_LOGICAL_CHANNELS;
use crate::provider::ProviderHandle;
use crate::{Error, Result};

/// Index of the basic channel
pub const BASIC_CHANNEL: usize = 0;

/// State of one channel slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    /// The basic channel, which has no provider handle
    Basic,
    /// Closed, available for reuse
    Free,
    /// Open logical channel
    Open(ProviderHandle),
}

/// Table of channel slots
#[derive(Debug, Clone)]
pub struct ChannelRegistry {
    slots: Vec<Slot>,
    max_logical_channels: usize,
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelRegistry {
    /// Create a registry holding only the basic channel
    pub fn new() -> Self {
        Self::with_max_logical_channels(DEFAULT_MAX_LOGICAL_CHANNELS)
    }

    /// Create a registry that never grows past `max` logical channels
    ///
    /// The cap never exceeds the highest channel a class byte can address.
    pub fn with_max_logical_channels(max: usize) -> Self {
        Self {
            slots: vec![Slot::Basic],
            max_logical_channels: max.min(DEFAULT_MAX_LOGICAL_CHANNELS),
        }
    }

    /// Number of slots, including the basic channel and free slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false: the basic channel slot is never removed
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn first_free(&self) -> Option<usize> {
        self.slots
            .iter()
            .skip(1)
            .position(|slot| *slot == Slot::Free)
            .map(|offset| offset + 1)
    }

    /// Whether [`Self::allocate`] would succeed
    pub fn has_capacity(&self) -> bool {
        self.first_free().is_some() || self.slots.len() - 1 < self.max_logical_channels
    }

    /// Fail with [`Error::ChannelOpenFailed`] unless a slot can be allocated
    pub fn ensure_capacity(&self) -> Result<()> {
        if self.has_capacity() {
            Ok(())
        } else {
            Err(Error::ChannelOpenFailed(format!(
                "all {} logical channels in use",
                self.max_logical_channels
            )))
        }
    }

    /// Pick the slot for a new logical channel
    ///
    /// Reuses the lowest free slot, or appends one. The slot stays free until
    /// [`Self::bind`] stores the provider handle in it.
    pub fn allocate(&mut self) -> Result<usize> {
        if let Some(index) = self.first_free() {
            return Ok(index);
        }
        self.ensure_capacity()?;
        self.slots.push(Slot::Free);
        Ok(self.slots.len() - 1)
    }

    /// Store the provider handle for a freshly allocated slot
    pub fn bind(&mut self, index: usize, handle: ProviderHandle) {
        debug_assert_ne!(index, BASIC_CHANNEL, "the basic channel has no handle");
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = Slot::Open(handle);
        }
    }

    /// Whether `index` designates an open channel
    pub fn is_open(&self, index: usize) -> bool {
        matches!(self.slots.get(index), Some(Slot::Basic | Slot::Open(_)))
    }

    /// Provider handle of an open logical channel
    pub fn handle_of(&self, index: usize) -> Result<ProviderHandle> {
        match self.slots.get(index) {
            Some(Slot::Open(handle)) => Ok(*handle),
            _ => Err(Error::ChannelNotOpen(index)),
        }
    }

    /// Mark a logical channel closed, returning the handle it held
    ///
    /// Freeing the basic channel does nothing.
    pub fn free(&mut self, index: usize) -> Result<Option<ProviderHandle>> {
        match self.slots.get(index).copied() {
            Some(Slot::Basic) => Ok(None),
            Some(Slot::Open(handle)) => {
                self.slots[index] = Slot::Free;
                Ok(Some(handle))
            }
            _ => Err(Error::ChannelNotOpen(index)),
        }
    }

    /// Open logical channels as `(index, handle)` pairs
    pub fn open_channels(&self) -> impl Iterator<Item = (usize, ProviderHandle)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Open(handle) => Some((index, *handle)),
                _ => None,
            })
    }
}
