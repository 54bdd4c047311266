//! Generation-checked slot storage.
//!
//! An [`Arena`] owns its values and hands out copyable [`Handle`]s. A slot is
//! reused after removal, but its generation is bumped first, so a handle to
//! the old occupant never resolves to the new one. Stale handles simply miss.

use std::fmt;

/// Copyable reference to an arena slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    /// Slot index.
    pub fn index(self) -> u32 {
        self.index
    }

    /// Generation of the slot when this handle was issued.
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot storage with stable, generation-checked handles.
#[derive(Debug)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self { slots: Vec::new(), free: Vec::new(), len: 0 }
    }

    /// Store `value`, reusing a vacant slot when one exists.
    pub fn insert(&mut self, value: T) -> Handle {
        self.insert_with(|_| value).0
    }

    /// Store the value built by `make`, which receives the handle it will
    /// live under.
    pub fn insert_with(&mut self, make: impl FnOnce(Handle) -> T) -> (Handle, &mut T) {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot { generation: 0, value: None });
                // Slot counts beyond u32 are unreachable for socket-backed
                // arenas; saturate rather than wrap.
                u32::try_from(self.slots.len() - 1).unwrap_or(u32::MAX)
            },
        };

        let slot = &mut self.slots[index as usize];
        let handle = Handle { index, generation: slot.generation };
        self.len += 1;
        (handle, slot.value.insert(make(handle)))
    }

    /// Look up a live value.
    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    /// Look up a live value mutably.
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    /// Whether `handle` still refers to a live value.
    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    /// Remove and return the value, invalidating every copy of `handle`.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }

        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.len -= 1;
        Some(value)
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the arena holds no live values.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate live values in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let value = slot.value.as_ref()?;
            let index = u32::try_from(index).ok()?;
            Some((Handle { index, generation: slot.generation }, value))
        })
    }

    /// Remove every live value.
    pub fn drain(&mut self) -> Vec<T> {
        let handles: Vec<Handle> = self.iter().map(|(handle, _)| handle).collect();
        handles.into_iter().filter_map(|handle| self.remove(handle)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let mut arena = Arena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");

        assert_eq!(arena.get(a), Some(&"a"));
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn stale_handle_misses_after_reuse() {
        let mut arena = Arena::new();
        let old = arena.insert(1);
        assert_eq!(arena.remove(old), Some(1));

        let new = arena.insert(2);
        assert_eq!(new.index(), old.index());
        assert_ne!(new.generation(), old.generation());
        assert_eq!(arena.get(old), None);
        assert_eq!(arena.remove(old), None);
        assert_eq!(arena.get(new), Some(&2));
    }

    #[test]
    fn insert_with_sees_own_handle() {
        let mut arena = Arena::new();
        let (handle, value) = arena.insert_with(|handle| handle);
        assert_eq!(*value, handle);
        assert_eq!(arena.get(handle), Some(&handle));
    }

    #[test]
    fn drain_empties_arena() {
        let mut arena = Arena::new();
        arena.insert(1);
        let two = arena.insert(2);
        arena.insert(3);
        arena.remove(two);

        let mut drained = arena.drain();
        drained.sort_unstable();
        assert_eq!(drained, vec![1, 3]);
        assert!(arena.is_empty());
    }

    #[test]
    fn handle_display() {
        let mut arena = Arena::new();
        let handle = arena.insert(());
        assert_eq!(handle.to_string(), "#0.0");
    }
}
