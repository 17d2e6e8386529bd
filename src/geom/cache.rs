//! Tessellation grid caching for patch and wrapped surfaces.
//!
//! Patch grids are computed lazily on first draw and shared between every
//! later draw of the same patch at the same resolution. Wrapped surfaces key
//! their grids by revision so editing a control point invalidates them.
//!
//! # Example
//! ```ignore
//! let mut cache = GridCache::default();
//! let grid = cache.get_or_insert_grid(GridSource::Patch { surface: 0, patch: 0 }, 8, 8, || {
//!     patch.grid(8, 8)
//! });
//! let stats = cache.stats();
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use super::patch::SurfaceGrid;

/// What a cached grid was evaluated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GridSource {
    Patch { surface: usize, patch: usize },
    Wrapped { surface: usize, revision: u64 },
}

impl GridSource {
    fn surface(self) -> usize {
        match self {
            Self::Patch { surface, .. } | Self::Wrapped { surface, .. } => surface,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct GridKey {
    source: GridSource,
    s_div: usize,
    t_div: usize,
}

#[derive(Debug, Default)]
pub struct GridCache {
    grids: HashMap<GridKey, Arc<SurfaceGrid>>,
    grid_hits: usize,
    grid_misses: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GridCacheStats {
    pub grid_entries: usize,
    pub grid_hits: usize,
    pub grid_misses: usize,
    /// Estimated memory usage in bytes.
    pub estimated_memory_bytes: usize,
}

impl GridCacheStats {
    /// Hit rate between 0.0 and 1.0; 0.0 before any access.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.grid_hits + self.grid_misses;
        if total == 0 { 0.0 } else { self.grid_hits as f64 / total as f64 }
    }
}

impl GridCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn stats(&self) -> GridCacheStats {
        GridCacheStats {
            grid_entries: self.grids.len(),
            grid_hits: self.grid_hits,
            grid_misses: self.grid_misses,
            estimated_memory_bytes: self.estimate_memory_usage(),
        }
    }

    /// Clears all cached data and resets hit/miss counters.
    pub fn clear(&mut self) {
        self.grids.clear();
        self.reset_counters();
    }

    pub fn reset_counters(&mut self) {
        self.grid_hits = 0;
        self.grid_misses = 0;
    }

    /// Drops every grid evaluated from patch surface `surface`.
    pub fn invalidate_patch_surface(&mut self, surface: usize) {
        self.grids.retain(|key, _| {
            !(matches!(key.source, GridSource::Patch { .. }) && key.source.surface() == surface)
        });
    }

    /// Drops stale revisions of wrapped surface `surface`.
    pub fn invalidate_wrapped_surface(&mut self, surface: usize, current_revision: u64) {
        self.grids.retain(|key, _| match key.source {
            GridSource::Wrapped { surface: s, revision } => s != surface || revision == current_revision,
            GridSource::Patch { .. } => true,
        });
    }

    #[must_use]
    pub fn estimate_memory_usage(&self) -> usize {
        let vertex = std::mem::size_of::<super::mesh::Vertex>();
        let grids: usize = self.grids.values().map(|g| g.vertices.len() * vertex).sum();
        let entry_overhead = std::mem::size_of::<(GridKey, Arc<SurfaceGrid>)>();
        grids + self.grids.len() * entry_overhead
    }

    /// Returns the cached grid for `source` at `(s_div, t_div)`, computing it with `make` on a miss.
    pub fn get_or_insert_grid(
        &mut self,
        source: GridSource,
        s_div: usize,
        t_div: usize,
        make: impl FnOnce() -> SurfaceGrid,
    ) -> Arc<SurfaceGrid> {
        let key = GridKey { source, s_div, t_div };
        if let Some(cached) = self.grids.get(&key) {
            self.grid_hits += 1;
            return Arc::clone(cached);
        }
        self.grid_misses += 1;
        let grid = Arc::new(make());
        self.grids.insert(key, Arc::clone(&grid));
        grid
    }

    #[must_use]
    pub fn has_grid(&self, source: GridSource, s_div: usize, t_div: usize) -> bool {
        self.grids.contains_key(&GridKey { source, s_div, t_div })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{Point3, Vec3};

    fn grid() -> SurfaceGrid {
        SurfaceGrid::sample(2, 2, |s, t| (Point3::new(s, t, 0.0), Vec3::X, Vec3::Y))
    }

    #[test]
    fn grid_hit_skips_make() {
        let mut cache = GridCache::new();
        let source = GridSource::Patch { surface: 0, patch: 0 };
        let mut calls = 0;
        let _ = cache.get_or_insert_grid(source, 2, 2, || {
            calls += 1;
            grid()
        });
        let _ = cache.get_or_insert_grid(source, 2, 2, || {
            calls += 1;
            grid()
        });
        assert_eq!(calls, 1);
        let stats = cache.stats();
        assert_eq!(stats.grid_entries, 1);
        assert_eq!(stats.grid_hits, 1);
        assert_eq!(stats.grid_misses, 1);
        assert!((stats.hit_rate() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn wrapped_revisions_are_invalidated() {
        let mut cache = GridCache::new();
        let old = GridSource::Wrapped { surface: 1, revision: 1 };
        let new = GridSource::Wrapped { surface: 1, revision: 2 };
        let _ = cache.get_or_insert_grid(old, 2, 2, grid);
        let _ = cache.get_or_insert_grid(new, 2, 2, grid);
        cache.invalidate_wrapped_surface(1, 2);
        assert!(!cache.has_grid(old, 2, 2));
        assert!(cache.has_grid(new, 2, 2));
    }

    #[test]
    fn clear_resets_everything() {
        let mut cache = GridCache::new();
        let _ = cache.get_or_insert_grid(GridSource::Patch { surface: 0, patch: 0 }, 2, 2, grid);
        assert_eq!(cache.stats().grid_entries, 1);
        assert!(cache.estimate_memory_usage() > 0);
        cache.clear();
        assert_eq!(cache.stats(), GridCacheStats::default());
    }
}
