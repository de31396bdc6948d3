//! Type-safe generational handles and the arena storage they index.
//!
//! A [`Handle`] pairs a slot index with a generation counter. When a slot is
//! freed and later reused, its generation is bumped, so handles to the old
//! occupant stop resolving instead of silently aliasing the new one.

use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;

/// A cheap, copyable reference to a value of type `T` stored in an [`Arena`].
pub struct Handle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// Generation value reserved for the null handle.
    const NULL_GENERATION: u32 = 0;

    /// Create a handle from its raw parts.
    #[inline]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _marker: PhantomData,
        }
    }

    /// The null handle. Never resolves to a value.
    #[inline]
    pub const fn null() -> Self {
        Self::new(u32::MAX, Self::NULL_GENERATION)
    }

    /// Whether this is the null handle.
    #[inline]
    pub const fn is_null(&self) -> bool {
        self.generation == Self::NULL_GENERATION
    }

    /// Slot index within the owning arena.
    #[inline]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Generation counter this handle was issued with.
    #[inline]
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

// Manual impls so `T` does not need to satisfy any bounds.
impl<T> Clone for Handle<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    #[inline]
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
        if self.is_null() {
            write!(f, "Handle<{}>(null)", core::any::type_name::<T>())
        } else {
            write!(
                f,
                "Handle<{}>({}v{})",
                core::any::type_name::<T>(),
                self.index,
                self.generation
            )
        }
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::null()
    }
}

struct Slot<T> {
    /// Generation the slot will issue (occupied) or issued last (vacant).
    generation: u32,
    value: Option<T>,
}

/// Generational arena: stable handles, O(1) insert/remove/lookup.
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Arena<T> {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Insert a value, returning a handle to it.
    pub fn insert(&mut self, value: T) -> Handle<T> {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            Handle::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            // Generation 0 is the null sentinel, fresh slots start at 1.
            self.slots.push(Slot {
                generation: 1,
                value: Some(value),
            });
            Handle::new(index, 1)
        }
    }

    /// Remove the value behind `handle`, if it is still live.
    pub fn remove(&mut self, handle: Handle<T>) -> Option<T> {
        let slot = self.slots.get_mut(handle.index() as usize)?;
        if slot.generation != handle.generation() || slot.value.is_none() {
            return None;
        }
        slot.generation = slot.generation.wrapping_add(1).max(1);
        self.free.push(handle.index());
        self.len -= 1;
        slot.value.take()
    }

    /// Borrow the value behind `handle`.
    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        let slot = self.slots.get(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.value.as_ref()
    }

    /// Mutably borrow the value behind `handle`.
    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.value.as_mut()
    }

    /// Mutably borrow two distinct values at once.
    ///
    /// Returns `None` if either handle is dead or both refer to the same slot.
    pub fn get_pair_mut(
        &mut self,
        a: Handle<T>,
        b: Handle<T>,
    ) -> Option<(&mut T, &mut T)> {
        if a.index() == b.index() {
            return None;
        }
        if !self.contains(a) || !self.contains(b) {
            return None;
        }
        let (ia, ib) = (a.index() as usize, b.index() as usize);
        let (lo, hi) = if ia < ib { (ia, ib) } else { (ib, ia) };
        let (head, tail) = self.slots.split_at_mut(hi);
        let lo_val = head[lo].value.as_mut()?;
        let hi_val = tail[0].value.as_mut()?;
        if ia < ib {
            Some((lo_val, hi_val))
        } else {
            Some((hi_val, lo_val))
        }
    }

    /// Whether `handle` still resolves to a live value.
    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.slots
            .get(handle.index() as usize)
            .map(|s| s.generation == handle.generation() && s.value.is_some())
            .unwrap_or(false)
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the arena holds no live values.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over live `(handle, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.value
                .as_ref()
                .map(|v| (Handle::new(i as u32, slot.generation), v))
        })
    }

    /// Handles of all live values, collected eagerly.
    ///
    /// Useful when the caller needs to mutate the arena while walking it.
    pub fn handles(&self) -> Vec<Handle<T>> {
        self.iter().map(|(h, _)| h).collect()
    }

    /// Drop every value and forget all handles issued so far.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.len = 0;
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_remove() {
        let mut arena: Arena<&str> = Arena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");

        assert_eq!(arena.get(a), Some(&"a"));
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(arena.len(), 2);

        assert_eq!(arena.remove(a), Some("a"));
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.remove(a), None);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn stale_handle_does_not_alias_reused_slot() {
        let mut arena: Arena<i32> = Arena::new();
        let old = arena.insert(1);
        arena.remove(old);

        let new = arena.insert(2);
        assert_eq!(new.index(), old.index());
        assert_ne!(new.generation(), old.generation());
        assert_eq!(arena.get(old), None);
        assert_eq!(arena.get(new), Some(&2));
    }

    #[test]
    fn pair_borrow() {
        let mut arena: Arena<i32> = Arena::new();
        let a = arena.insert(1);
        let b = arena.insert(2);

        let (va, vb) = arena.get_pair_mut(a, b).unwrap();
        core::mem::swap(va, vb);
        assert_eq!(arena.get(a), Some(&2));
        assert_eq!(arena.get(b), Some(&1));

        assert!(arena.get_pair_mut(a, a).is_none());
    }

    #[test]
    fn null_handle_never_resolves() {
        let arena: Arena<i32> = Arena::new();
        assert!(Handle::<i32>::null().is_null());
        assert!(!arena.contains(Handle::null()));
    }
}
