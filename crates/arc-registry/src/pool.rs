use std::fmt;
use std::marker::PhantomData;

use arc_core::CartridgeId;

use crate::{Error, Result};

/// Typed opaque handle. The wire value packs `index + 1` in the low 32 bits
/// and the slot generation in the high bits, so a freed-and-reused slot
/// invalidates old handles by construction. `0` is the invalid handle.
pub struct Handle<T> {
    raw: u64,
    _pd: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub const INVALID: Self = Self {
        raw: 0,
        _pd: PhantomData,
    };

    fn pack(index: u32, generation: u32) -> Self {
        Self {
            raw: (u64::from(generation) << 32) | u64::from(index + 1),
            _pd: PhantomData,
        }
    }

    fn unpack(self) -> Option<(u32, u32)> {
        let low = (self.raw & 0xFFFF_FFFF) as u32;
        if low == 0 {
            None
        } else {
            Some((low - 1, (self.raw >> 32) as u32))
        }
    }

    /// Interprets a script-provided integer. Negative and zero values are
    /// never valid.
    pub fn from_raw(raw: i64) -> Self {
        if raw <= 0 {
            Self::INVALID
        } else {
            Self {
                raw: raw as u64,
                _pd: PhantomData,
            }
        }
    }

    /// The script-visible integer value.
    pub fn as_raw(self) -> i64 {
        self.raw as i64
    }

    pub fn is_invalid(self) -> bool {
        self.raw == 0
    }
}

// Manual impls: `derive` would bound them on `T`.
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Handle<T> {}
impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}
impl<T> Eq for Handle<T> {}
impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.raw)
    }
}

struct Slot<T> {
    generation: u32,
    owner: CartridgeId,
    /// `None` while the slot sits on the free list.
    payload: Option<T>,
}

/// A slab of resources of one type with a free list and a live cap.
pub struct Pool<T> {
    name: &'static str,
    limit: u32,
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: u32,
}

impl<T> Pool<T> {
    pub fn new(name: &'static str, limit: u32) -> Self {
        Self {
            name,
            limit,
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn live_count(&self) -> u32 {
        self.live
    }

    /// Stores a payload and returns its handle. Never returns the invalid
    /// handle; exhaustion is an error instead.
    pub fn allocate(&mut self, owner: &CartridgeId, payload: T) -> Result<Handle<T>> {
        if self.live >= self.limit {
            return Err(Error::Exhausted {
                pool: self.name,
                limit: self.limit,
            });
        }
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.payload = Some(payload);
            slot.owner = owner.clone();
            Ok(Handle::pack(index, slot.generation))
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                owner: owner.clone(),
                payload: Some(payload),
            });
            Ok(Handle::pack(index, 0))
        }
    }

    /// Frees a handle and returns the payload for destruction. Freeing an
    /// invalid, stale, or already-freed handle is a no-op returning `None`.
    pub fn free(&mut self, handle: Handle<T>) -> Option<T> {
        let (index, generation) = handle.unpack()?;
        let slot = self.slots.get_mut(index as usize)?;
        if slot.generation != generation || slot.payload.is_none() {
            return None;
        }
        let payload = slot.payload.take();
        // Bump the generation so the slot's next tenant gets fresh handles.
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        self.live -= 1;
        payload
    }

    pub fn get(&self, handle: Handle<T>, owner: &CartridgeId) -> Result<&T> {
        self.slot(handle, owner)
            .map(|index| self.slots[index].payload.as_ref().unwrap())
    }

    pub fn get_mut(&mut self, handle: Handle<T>, owner: &CartridgeId) -> Result<&mut T> {
        let index = self.slot(handle, owner)?;
        Ok(self.slots[index].payload.as_mut().unwrap())
    }

    fn slot(&self, handle: Handle<T>, owner: &CartridgeId) -> Result<usize> {
        let invalid = || Error::InvalidHandle {
            pool: self.name,
            raw: handle.as_raw(),
        };
        let (index, generation) = handle.unpack().ok_or_else(invalid)?;
        let slot = self.slots.get(index as usize).ok_or_else(invalid)?;
        if slot.generation != generation || slot.payload.is_none() || slot.owner != *owner {
            return Err(invalid());
        }
        Ok(index as usize)
    }

    /// Frees every slot owned by `owner`, returning the payloads so the
    /// caller can destroy backing resources. Used on stop and reload.
    pub fn clear_owned_by(&mut self, owner: &CartridgeId) -> Vec<T> {
        let mut reclaimed = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.payload.is_some() && slot.owner == *owner {
                reclaimed.push(slot.payload.take().unwrap());
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
                self.live -= 1;
            }
        }
        reclaimed
    }

    /// Iterates live payloads in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.payload
                .as_ref()
                .map(|payload| (Handle::pack(index as u32, slot.generation), payload))
        })
    }

    /// Iterates live payloads mutably, in slot order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle<T>, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let generation = slot.generation;
            slot.payload
                .as_mut()
                .map(move |payload| (Handle::pack(index as u32, generation), payload))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> CartridgeId {
        CartridgeId::new("com.example.owner").unwrap()
    }

    #[test]
    fn handles_start_at_one_and_zero_is_invalid() {
        let mut pool = Pool::new("surface", 8);
        let handle = pool.allocate(&owner(), "payload").unwrap();
        assert_eq!(handle.as_raw(), 1);
        assert!(Handle::<&str>::from_raw(0).is_invalid());
        assert!(Handle::<&str>::from_raw(-5).is_invalid());
    }

    #[test]
    fn resolve_checks_existence_and_owner() {
        let mut pool = Pool::new("surface", 8);
        let me = owner();
        let other = CartridgeId::new("someone.else").unwrap();
        let handle = pool.allocate(&me, 42).unwrap();

        assert_eq!(*pool.get(handle, &me).unwrap(), 42);
        assert!(matches!(
            pool.get(handle, &other),
            Err(Error::InvalidHandle { .. })
        ));
        assert!(pool.get(Handle::from_raw(99), &me).is_err());
    }

    #[test]
    fn double_free_is_a_no_op() {
        let mut pool = Pool::new("surface", 8);
        let handle = pool.allocate(&owner(), 1).unwrap();
        assert_eq!(pool.free(handle), Some(1));
        assert_eq!(pool.free(handle), None);
        assert_eq!(pool.live_count(), 0);
    }

    #[test]
    fn stale_handles_never_alias_reused_slots() {
        let mut pool = Pool::new("surface", 8);
        let me = owner();
        let old = pool.allocate(&me, "old").unwrap();
        pool.free(old);
        let new = pool.allocate(&me, "new").unwrap();

        // Same slot, different generation: old handle stays dead.
        assert_ne!(old, new);
        assert!(pool.get(old, &me).is_err());
        assert_eq!(*pool.get(new, &me).unwrap(), "new");
        assert_eq!(pool.free(old), None);
        assert_eq!(pool.live_count(), 1);
    }

    #[test]
    fn exhaustion_is_an_error_not_a_zero_handle() {
        let mut pool = Pool::new("surface", 2);
        let me = owner();
        pool.allocate(&me, 1).unwrap();
        pool.allocate(&me, 2).unwrap();
        assert!(matches!(
            pool.allocate(&me, 3),
            Err(Error::Exhausted { .. })
        ));
    }

    #[test]
    fn clear_owned_by_reclaims_everything() {
        let mut pool = Pool::new("sound", 16);
        let me = owner();
        let handles: Vec<_> = (0..10)
            .map(|i| pool.allocate(&me, i).unwrap())
            .collect();
        let mut reclaimed = pool.clear_owned_by(&me);
        reclaimed.sort_unstable();
        assert_eq!(reclaimed, (0..10).collect::<Vec<_>>());
        assert_eq!(pool.live_count(), 0);
        for handle in handles {
            assert!(pool.get(handle, &me).is_err());
        }
        // The pool is reusable afterwards.
        assert!(pool.allocate(&me, 99).is_ok());
    }
}
