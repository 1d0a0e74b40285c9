//! A growable array of atomic pointers: the raw storage behind the bucket
//! directory.
//!
//! `size` doubling in the hash set facade only ever decides *which* index a
//! key maps to; it is not load-bearing for memory safety here. Instead
//! `GrowableArray::get` is self-healing: if the requested index doesn't fit
//! the directory generation it currently observes, it grows the array to
//! fit, gated by a `compare_exchange` on its own pointer field. That keeps
//! correctness independent of any ordering assumption between the facade's
//! `size` counter and this array's own length.

use std::sync::atomic::Ordering;

use crossbeam_epoch::{unprotected, Atomic, Guard, Owned, Shared};

struct Directory<T> {
    slots: Box<[Atomic<T>]>,
}

impl<T> Directory<T> {
    fn with_len(len: usize) -> Self {
        Directory {
            slots: (0..len)
                .map(|_| Atomic::null())
                .collect::<Vec<_>>()
                .into_boxed_slice(),
        }
    }

    /// Builds a directory of `new_len` slots, with the first `self.len()`
    /// slots copied *by reference* from `self` — the same nodes remain
    /// reachable, nothing is rehashed or reallocated at the node level.
    fn grown_to(&self, new_len: usize) -> Self {
        debug_assert!(new_len >= self.slots.len());
        let grown = Self::with_len(new_len);
        // Safety: copying the raw pointer value between directory
        // generations does not dereference it, so no guard is needed for
        // the load; the node itself is still owned by the list, not by
        // either directory.
        let guard = unsafe { unprotected() };
        for (dst, src) in grown.slots.iter().zip(self.slots.iter()) {
            dst.store(src.load(Ordering::Relaxed, guard), Ordering::Relaxed);
        }
        grown
    }
}

/// A lock-free growable array of `Atomic<T>` slots.
pub struct GrowableArray<T> {
    directory: Atomic<Directory<T>>,
}

impl<T> GrowableArray<T> {
    /// Creates an array with `initial_len` null slots.
    pub fn new(initial_len: usize) -> Self {
        assert!(initial_len > 0);
        GrowableArray {
            directory: Atomic::new(Directory::with_len(initial_len)),
        }
    }

    /// Returns the slot at `index`, growing the backing array first if the
    /// currently-visible generation is too short.
    pub fn get<'g>(&'g self, index: usize, guard: &'g Guard) -> &'g Atomic<T> {
        loop {
            let current = self.directory.load(Ordering::Acquire, guard);
            let current_ref = unsafe { current.deref() };
            if index < current_ref.slots.len() {
                return &current_ref.slots[index];
            }
            self.grow_to_fit(current, current_ref, index + 1, guard);
        }
    }

    fn grow_to_fit<'g>(
        &'g self,
        current: Shared<'g, Directory<T>>,
        current_ref: &Directory<T>,
        min_len: usize,
        guard: &'g Guard,
    ) {
        let mut new_len = current_ref.slots.len().max(1);
        while new_len < min_len {
            new_len *= 2;
        }
        let grown = Owned::new(current_ref.grown_to(new_len));
        match self
            .directory
            .compare_exchange(current, grown, Ordering::AcqRel, Ordering::Acquire, guard)
        {
            Ok(_) => unsafe { guard.defer_destroy(current) },
            Err(_) => {
                // Someone else grew (or is growing) the array already; the
                // caller's loop will observe the newer generation.
            }
        }
    }
}

impl<T> Drop for GrowableArray<T> {
    fn drop(&mut self) {
        unsafe {
            let guard = unprotected();
            let current = self.directory.load(Ordering::Relaxed, guard);
            if !current.is_null() {
                drop(current.into_owned());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_epoch as epoch;
    use std::sync::atomic::Ordering as StdOrdering;

    #[test]
    fn grows_to_fit_an_out_of_range_index() {
        let array: GrowableArray<u32> = GrowableArray::new(2);
        let guard = epoch::pin();
        let slot = array.get(9, &guard);
        assert!(slot.load(StdOrdering::Acquire, &guard).is_null());
    }

    #[test]
    fn preserves_previously_published_slots_across_growth() {
        let array: GrowableArray<u32> = GrowableArray::new(2);
        let guard = epoch::pin();
        array
            .get(1, &guard)
            .store(crossbeam_epoch::Owned::new(7u32), StdOrdering::Release);

        let _ = array.get(20, &guard); // forces growth well past index 1
        let slot = array.get(1, &guard);
        let value = unsafe { slot.load(StdOrdering::Acquire, &guard).deref() };
        assert_eq!(*value, 7);
    }
}
