//! Viewport-to-surface assignment policy.

use crate::viewport::PipelineKind;

/// Deterministic surface picker for a pool of `pool_size` surfaces
#[derive(Debug, Clone, Copy)]
pub struct SurfaceAssigner {
    pool_size: usize,
}

impl SurfaceAssigner {
    pub fn new(pool_size: usize) -> Self {
        Self { pool_size }
    }

    /// Surface for a new viewport, given how many are already assigned.
    ///
    /// Distributable kinds go round-robin; other GPU kinds share surface 0;
    /// custom pipelines get none.
    pub fn surface_for(&self, pipeline: PipelineKind, assigned_count: usize) -> Option<usize> {
        match pipeline {
            PipelineKind::DistributableGpu => Some(assigned_count % self.pool_size.max(1)),
            PipelineKind::PinnedGpu => Some(0),
            PipelineKind::CustomPipeline => None,
        }
    }
}
