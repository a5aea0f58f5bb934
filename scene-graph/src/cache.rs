use std::cell::Cell;

use glam::Mat4;

/// A node's world matrix and whether it still reflects the hierarchy. Refreshed through a shared
/// reference so world queries don't need `&mut`.
#[derive(Debug)]
pub struct WorldCache {
    matrix: Cell<Mat4>,
    stale: Cell<bool>,
}

impl Default for WorldCache {
    fn default() -> Self {
        Self {
            matrix: Cell::new(Mat4::IDENTITY),
            stale: Cell::new(true),
        }
    }
}

impl WorldCache {
    #[inline]
    pub fn invalidate(&self) {
        self.stale.set(true);
    }

    #[inline]
    pub fn is_stale(&self) -> bool {
        self.stale.get()
    }

    /// The cached matrix, recomputed with `compute` first if stale.
    pub fn get_or_refresh(&self, compute: impl FnOnce() -> Mat4) -> Mat4 {
        if self.stale.get() {
            self.matrix.set(compute());
            self.stale.set(false);
        }
        self.matrix.get()
    }
}
