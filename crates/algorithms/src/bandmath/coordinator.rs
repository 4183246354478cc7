//! Splitting a pass across workers and merging their results

use super::context::{Diagnostics, EvaluationContext};
use super::engine::{evaluate_region, PassPlan, RegionBuffer};
use super::error::{BandMathError, Result};
use super::output::OutputRaster;
use rastermath_core::GeoTransform;
use rastermath_parallel::{CancelToken, ParallelStrategy, ProcessingMode, Region};
use tracing::debug;

/// Lifecycle of a coordinator: Idle → Partitioned → Running → Merging → Idle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    Partitioned,
    Running,
    Merging,
}

/// Result of one pass, in compilation order
#[derive(Debug)]
pub struct PassOutput {
    pub rasters: Vec<OutputRaster>,
    pub diagnostics: Vec<Diagnostics>,
}

/// Runs one evaluation engine per disjoint sub-region
#[derive(Debug)]
pub struct ThreadCoordinator {
    mode: ProcessingMode,
    tile_size: Option<usize>,
    state: CoordinatorState,
    cancel: CancelToken,
}

impl ThreadCoordinator {
    pub fn new(mode: ProcessingMode, tile_size: Option<usize>, cancel: CancelToken) -> Self {
        Self {
            mode,
            tile_size,
            state: CoordinatorState::Idle,
            cancel,
        }
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    fn transition(&mut self, next: CoordinatorState) {
        debug!("Coordinator {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Disjoint sub-regions covering `region` exactly once: one row strip per
    /// worker, or fixed-size tiles when a tile size is configured.
    pub fn partition(&mut self, region: Region, workers: usize) -> Vec<Region> {
        let parts = match self.tile_size {
            Some(size) => region.tiles(size),
            None => region.strips(workers),
        };
        self.transition(CoordinatorState::Partitioned);
        parts
    }

    /// Evaluate `plan` over `region`.
    ///
    /// `transform` is the full-raster transform of the first input; outputs
    /// are sized to `region` and georeferenced at its origin.
    pub fn run(
        &mut self,
        plan: &PassPlan<'_, '_>,
        region: Region,
        transform: GeoTransform,
    ) -> Result<PassOutput> {
        let result = self.run_inner(plan, region, transform);
        if self.state != CoordinatorState::Idle {
            self.transition(CoordinatorState::Idle);
        }
        result
    }

    fn run_inner(
        &mut self,
        plan: &PassPlan<'_, '_>,
        region: Region,
        transform: GeoTransform,
    ) -> Result<PassOutput> {
        let parts = self.partition(region, self.mode.worker_count());
        debug!("Partitioned {:?} into {} sub-region(s)", region, parts.len());

        self.transition(CoordinatorState::Running);
        let cancel = &self.cancel;
        let results: Vec<Option<(Vec<RegionBuffer>, Vec<Diagnostics>)>> =
            self.mode.par_map(0..parts.len(), |i| {
                if cancel.is_cancelled() {
                    return None;
                }
                let mut context = EvaluationContext::new(plan);
                let buffers = evaluate_region(plan, parts[i], &mut context);
                Some((buffers, context.into_diagnostics()))
            })?;

        if results.iter().any(Option::is_none) {
            return Err(BandMathError::Cancelled);
        }

        self.transition(CoordinatorState::Merging);
        let origin = transform.shifted(region.col_offset, region.row_offset);
        let mut rasters: Vec<OutputRaster> = plan
            .specs()
            .iter()
            .map(|s| OutputRaster::new(s.pixel_type, s.band_count, region.rows, region.cols, origin))
            .collect();
        let mut diagnostics = vec![Diagnostics::default(); rasters.len()];

        for (buffers, counters) in results.into_iter().flatten() {
            for (e, buffer) in buffers.iter().enumerate() {
                let at = (
                    buffer.region.row_offset - region.row_offset,
                    buffer.region.col_offset - region.col_offset,
                );
                rasters[e].write_region(buffer, at)?;
            }
            for (total, part) in diagnostics.iter_mut().zip(counters) {
                *total += part;
            }
        }

        Ok(PassOutput {
            rasters,
            diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bandmath::catalog::VariableCatalog;
    use crate::bandmath::compiler::compile;
    use rastermath_core::{PixelType, Raster};

    #[test]
    fn test_partition_modes() {
        let region = Region::new(2, 3, 10, 7);
        let mut strips = ThreadCoordinator::new(ProcessingMode::Sequential, None, CancelToken::new());
        assert_eq!(strips.state(), CoordinatorState::Idle);
        assert_eq!(strips.partition(region, 4).len(), 4);
        assert_eq!(strips.state(), CoordinatorState::Partitioned);

        let mut tiles =
            ThreadCoordinator::new(ProcessingMode::Sequential, Some(4), CancelToken::new());
        let parts = tiles.partition(region, 4);
        assert_eq!(parts.len(), 3 * 2);
        assert_eq!(parts.iter().map(Region::len).sum::<usize>(), region.len());
    }

    #[test]
    fn test_run_returns_to_idle() {
        let a = Raster::from_vec((0..20).map(f64::from).collect(), 1, 4, 5).unwrap();
        let mut catalog = VariableCatalog::new();
        catalog.register_input(&a, None).unwrap();
        let exprs = vec![compile(&mut catalog, "im1b1 * 20", PixelType::U8).unwrap()];
        let plan = PassPlan::new(&catalog, &exprs).unwrap();

        let mut coordinator =
            ThreadCoordinator::new(ProcessingMode::ParallelWith(3), None, CancelToken::new());
        let out = coordinator
            .run(&plan, Region::new(1, 1, 3, 4), GeoTransform::default())
            .unwrap();
        assert_eq!(coordinator.state(), CoordinatorState::Idle);

        let raster = &out.rasters[0];
        assert_eq!(raster.shape(), (3, 4));
        // local (0, 0) is source (1, 1) = 6
        assert_eq!(raster.get_f64(0, 0, 0), 120.0);
        // 13, 14, 16, 17, 18 and 19 overflow u8
        assert_eq!(out.diagnostics[0].overflow, 6);
        assert_eq!(raster.get_f64(0, 2, 3), 255.0);
    }

    #[test]
    fn test_cancelled_before_start() {
        let a: Raster<f64> = Raster::new(1, 4, 4);
        let mut catalog = VariableCatalog::new();
        catalog.register_input(&a, None).unwrap();
        let exprs = vec![compile(&mut catalog, "im1b1", PixelType::F64).unwrap()];
        let plan = PassPlan::new(&catalog, &exprs).unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let mut coordinator = ThreadCoordinator::new(ProcessingMode::Sequential, None, cancel);
        assert!(matches!(
            coordinator.run(&plan, Region::full(4, 4), GeoTransform::default()),
            Err(BandMathError::Cancelled)
        ));
        assert_eq!(coordinator.state(), CoordinatorState::Idle);
    }
}
