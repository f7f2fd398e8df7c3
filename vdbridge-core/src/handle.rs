// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Handle table for host objects.
//!
//! The guest cannot hold pointers to host objects, so every object it works
//! with is registered here and referred to by a small integer [`Handle`].
//! Slots are addressed by handle value:
//!
//! ```text
//! slot:   0      1      2      3      4
//!       [None][Some A][None][Some C][None]   next_id = 5
//!                       ^             ^
//!                  free list (FIFO): [2, 4]
//! ```
//!
//! Slot `0` is reserved and never handed out, so `0` can serve as a null
//! value on the guest side. Released handles are reused oldest-first before
//! the table grows.

use crate::error::{BridgeError, BridgeResult};
use std::collections::VecDeque;
use std::fmt;

/// Opaque reference to a host object, as seen by the guest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u32);

impl Handle {
    /// Reserved handle that never resolves.
    pub const NULL: Handle = Handle(0);

    /// Wrap a raw value received from the guest.
    pub const fn from_raw(raw: u32) -> Self {
        Handle(raw)
    }

    /// Raw value to pass back to the guest.
    pub const fn as_raw(self) -> u32 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<Handle> for u32 {
    fn from(handle: Handle) -> u32 {
        handle.0
    }
}

/// Where a freshly added handle came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Issued {
    /// Popped from the free list.
    Recycled,
    /// Minted from `next_id`, growing the table.
    Minted,
}

/// Indexed store mapping handles to host objects, with FIFO recycling.
#[derive(Debug)]
pub struct ResourceTable<T> {
    /// Slot `i` holds the object for handle `i`. Always at least `next_id` long.
    slots: Vec<Option<T>>,
    /// Released handles awaiting reuse, oldest first.
    free_list: VecDeque<Handle>,
    /// Smallest handle value never allocated.
    next_id: u32,
    /// Handles are always below this value.
    limit: u32,
    /// Number of occupied slots.
    live: usize,
}

impl<T> Default for ResourceTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ResourceTable<T> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty table with room for `capacity` handles before reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_limit(capacity, u32::MAX)
    }

    /// Create an empty table that never issues a handle at or above `limit`.
    pub fn with_limit(capacity: usize, limit: u32) -> Self {
        let mut slots = Vec::with_capacity(capacity.max(1));
        slots.push(None);
        Self {
            slots,
            free_list: VecDeque::new(),
            next_id: 1,
            limit: limit.max(1),
            live: 0,
        }
    }

    /// Register `object` and return its handle.
    ///
    /// Fails with [`BridgeError::CapacityExceeded`] when the free list is
    /// empty and every handle below the limit has been minted.
    pub fn add(&mut self, object: T) -> BridgeResult<Handle> {
        self.add_tracked(object).map(|(handle, _)| handle)
    }

    /// Like [`add`](Self::add), but also reports whether the handle was reused.
    pub fn add_tracked(&mut self, object: T) -> BridgeResult<(Handle, Issued)> {
        let (handle, issued) = match self.free_list.pop_front() {
            Some(handle) => (handle, Issued::Recycled),
            None => {
                let handle = Handle(self.next_id);
                self.next_id = self
                    .next_id
                    .checked_add(1)
                    .filter(|next| *next <= self.limit)
                    .ok_or_else(|| BridgeError::CapacityExceeded("handle table".to_string()))?;
                if self.slots.len() < self.next_id as usize {
                    self.slots.resize_with(self.next_id as usize, || None);
                }
                (handle, Issued::Minted)
            }
        };

        debug_assert!(self.slots[handle.index()].is_none());
        self.slots[handle.index()] = Some(object);
        self.live += 1;
        Ok((handle, issued))
    }

    /// Clear the slot for `handle`, queue the handle for reuse and return the
    /// object it held.
    ///
    /// Releasing a handle whose slot is already empty fails with
    /// [`BridgeError::DoubleRelease`]; the free list is left untouched so the
    /// handle can never be issued to two owners.
    pub fn release(&mut self, handle: Handle) -> BridgeResult<T> {
        if handle.is_null() || handle.as_raw() >= self.next_id {
            return Err(BridgeError::InvalidHandle(handle.as_raw()));
        }

        let object = self.slots[handle.index()]
            .take()
            .ok_or(BridgeError::DoubleRelease(handle.as_raw()))?;
        self.free_list.push_back(handle);
        self.live -= 1;
        Ok(object)
    }

    /// Resolve `handle` to the object registered under it.
    pub fn get(&self, handle: Handle) -> BridgeResult<&T> {
        self.slots
            .get(handle.index())
            .and_then(Option::as_ref)
            .ok_or(BridgeError::InvalidHandle(handle.as_raw()))
    }

    /// Mutable variant of [`get`](Self::get).
    pub fn get_mut(&mut self, handle: Handle) -> BridgeResult<&mut T> {
        self.slots
            .get_mut(handle.index())
            .and_then(Option::as_mut)
            .ok_or(BridgeError::InvalidHandle(handle.as_raw()))
    }

    /// Whether `handle` currently resolves.
    pub fn is_live(&self, handle: Handle) -> bool {
        matches!(self.slots.get(handle.index()), Some(Some(_)))
    }

    /// Number of live handles.
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Number of released handles waiting for reuse.
    pub fn free_count(&self) -> usize {
        self.free_list.len()
    }

    /// Smallest handle value that has never been issued.
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Number of slots, including the reserved slot `0`.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Iterate over live handles in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| {
                let handle = Handle(u32::try_from(idx).ok()?);
                slot.as_ref().map(|obj| (handle, obj))
            })
    }
}
