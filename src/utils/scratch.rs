//! Pool of temporary vectors.
//!
//! A [`Scratch`] guard hands out a pooled vector and puts it back when dropped, so
//! temporaries are released on every exit path of a step, `?` included.

use std::cell::RefCell;
use std::ops::{Deref, DerefMut};

pub struct ScratchPool<V> {
    free: RefCell<Vec<V>>,
}

impl<V: Default> ScratchPool<V> {
    pub fn new() -> Self {
        Self { free: RefCell::new(Vec::new()) }
    }

    /// Take a pooled vector, or build one with `make` when the pool is empty.
    ///
    /// Contents of a recycled vector are unspecified.
    pub fn acquire(&self, make: impl FnOnce() -> V) -> Scratch<'_, V> {
        let vec = self.free.borrow_mut().pop().unwrap_or_else(make);
        Scratch { pool: self, vec }
    }

    /// Vectors currently idle in the pool.
    pub fn available(&self) -> usize {
        self.free.borrow().len()
    }
}

impl<V: Default> Default for ScratchPool<V> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Scratch<'a, V: Default> {
    pool: &'a ScratchPool<V>,
    vec: V,
}

impl<V: Default> Deref for Scratch<'_, V> {
    type Target = V;
    fn deref(&self) -> &V {
        &self.vec
    }
}

impl<V: Default> DerefMut for Scratch<'_, V> {
    fn deref_mut(&mut self) -> &mut V {
        &mut self.vec
    }
}

impl<V: Default> Drop for Scratch<'_, V> {
    fn drop(&mut self) {
        let vec = std::mem::take(&mut self.vec);
        self.pool.free.borrow_mut().push(vec);
    }
}
