//! Band math facade
//!
//! Register co-registered inputs, declare constants and matrices, compile
//! expressions, then run passes over the whole raster or a sub-region.
//!
//! # Example
//! ```ignore
//! let mut bm = BandMathX::new(BandMathParams::default());
//! bm.register_input(&image, Some("s2"))?;
//! bm.compile("(s2b4 - s2b3) / (s2b4 + s2b3)")?;
//! let outputs = bm.run()?;
//! ```

use super::catalog::VariableCatalog;
use super::compiler::{compile, CompiledExpression, OutputSpec};
use super::context::Diagnostics;
use super::coordinator::ThreadCoordinator;
use super::engine::PassPlan;
use super::error::{BandMathError, Result};
use super::output::OutputRaster;
use super::params::BandMathParams;
use rastermath_core::{Algorithm, PixelType, Raster, RasterSource};
use rastermath_parallel::{CancelToken, Region};
use tracing::{info, warn};

/// Index of a compiled expression, in compilation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExpressionHandle(usize);

impl ExpressionHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Output of one expression after a pass
#[derive(Debug)]
pub struct ExpressionOutput {
    pub expression: String,
    pub raster: OutputRaster,
    /// Always present, zero when nothing was clamped
    pub diagnostics: Diagnostics,
}

/// Multi-band raster expression engine
#[derive(Debug)]
pub struct BandMathX<'a> {
    catalog: VariableCatalog<'a>,
    expressions: Vec<CompiledExpression>,
    params: BandMathParams,
    cancel: CancelToken,
}

impl<'a> BandMathX<'a> {
    pub fn new(params: BandMathParams) -> Self {
        Self {
            catalog: VariableCatalog::new(),
            expressions: Vec::new(),
            params,
            cancel: CancelToken::new(),
        }
    }

    pub fn params(&self) -> &BandMathParams {
        &self.params
    }

    pub fn catalog(&self) -> &VariableCatalog<'a> {
        &self.catalog
    }

    /// Add an input, named `imN` (and `alias` when given); returns its 0-based index.
    ///
    /// Every input must have the spatial size of the first one.
    pub fn register_input(&mut self, source: &'a dyn RasterSource, alias: Option<&str>) -> Result<usize> {
        self.catalog.register_input(source, alias)
    }

    pub fn declare_constant(&mut self, name: &str, value: f64) -> Result<()> {
        self.catalog.declare_constant(name, value)
    }

    /// Declare a row-major `rows x cols` matrix
    pub fn declare_matrix(&mut self, name: &str, rows: usize, cols: usize, values: Vec<f64>) -> Result<()> {
        self.catalog.declare_matrix(name, rows, cols, values)
    }

    /// Declare a matrix written as `{ a, b; c, d }`
    pub fn declare_matrix_text(&mut self, name: &str, text: &str) -> Result<()> {
        self.catalog.declare_matrix_text(name, text)
    }

    /// Compile an expression writing the configured output type
    pub fn compile(&mut self, text: &str) -> Result<ExpressionHandle> {
        self.compile_typed(text, self.params.output_type)
    }

    /// Compile an expression writing `pixel_type`.
    ///
    /// A failed compile leaves the registered expressions unchanged.
    pub fn compile_typed(&mut self, text: &str, pixel_type: PixelType) -> Result<ExpressionHandle> {
        let compiled = compile(&mut self.catalog, text, pixel_type)?;
        self.expressions.push(compiled);
        Ok(ExpressionHandle(self.expressions.len() - 1))
    }

    pub fn expression(&self, handle: ExpressionHandle) -> Option<&CompiledExpression> {
        self.expressions.get(handle.0)
    }

    pub fn expressions(&self) -> &[CompiledExpression] {
        &self.expressions
    }

    /// Output layout of every compiled expression
    pub fn output_specs(&self) -> Vec<OutputSpec> {
        self.expressions.iter().map(CompiledExpression::output_spec).collect()
    }

    /// Token aborting the current or next pass between sub-regions.
    ///
    /// The token is cleared when a pass returns.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Evaluate every expression over the whole extent of the inputs
    pub fn run(&mut self) -> Result<Vec<ExpressionOutput>> {
        let (rows, cols) = self.first_input()?.shape();
        self.run_region(Region::full(rows, cols))
    }

    /// Evaluate every expression over `region` of the inputs.
    ///
    /// Outputs are sized to `region`. Neighborhoods still read across the
    /// region boundary and global statistics cover the whole inputs.
    pub fn run_region(&mut self, region: Region) -> Result<Vec<ExpressionOutput>> {
        let first = self.first_input()?;
        if self.expressions.is_empty() {
            return Err(BandMathError::Configuration(
                "no expression has been compiled".to_string(),
            ));
        }
        let (rows, cols) = first.shape();
        let transform = first.transform();
        region.check_within(rows, cols)?;

        self.recompile_stale()?;

        info!(
            "Band math: {} expression(s) over {}x{} at ({}, {}), {} worker(s)",
            self.expressions.len(),
            region.rows,
            region.cols,
            region.row_offset,
            region.col_offset,
            self.params.mode.worker_count()
        );

        let plan = PassPlan::new(&self.catalog, &self.expressions)?;
        let mut coordinator =
            ThreadCoordinator::new(self.params.mode, self.params.tile_size, self.cancel.clone());
        let result = coordinator.run(&plan, region, transform);
        // a request that arrived too late to stop this pass must not stop the next
        self.cancel.reset();
        let output = match result {
            Err(BandMathError::Cancelled) => {
                warn!("Band math pass cancelled");
                return Err(BandMathError::Cancelled);
            }
            other => other?,
        };

        let outputs: Vec<ExpressionOutput> = self
            .expressions
            .iter()
            .zip(output.rasters)
            .zip(output.diagnostics)
            .map(|((expression, raster), diagnostics)| ExpressionOutput {
                expression: expression.source().to_string(),
                raster,
                diagnostics,
            })
            .collect();

        for out in &outputs {
            let d = out.diagnostics;
            if d.clamped() > 0 {
                warn!(
                    "'{}': {} value(s) clamped to the {} range ({} underflow, {} overflow)",
                    out.expression,
                    d.clamped(),
                    out.raster.pixel_type(),
                    d.underflow,
                    d.overflow
                );
            }
            if d.runtime_errors > 0 {
                warn!(
                    "'{}': evaluation failed at {} position(s), written as NaN",
                    out.expression, d.runtime_errors
                );
            }
            if d.nan_to_integer > 0 {
                warn!(
                    "'{}': {} NaN value(s) written as 0 to the {} output",
                    out.expression,
                    d.nan_to_integer,
                    out.raster.pixel_type()
                );
            }
        }
        info!("Band math pass complete");

        Ok(outputs)
    }

    fn first_input(&self) -> Result<&'a dyn RasterSource> {
        self.catalog
            .inputs()
            .first()
            .map(|input| input.source)
            .ok_or_else(|| BandMathError::Configuration("no input has been registered".to_string()))
    }

    /// Recompile expressions compiled before the last catalog change
    fn recompile_stale(&mut self) -> Result<()> {
        for i in 0..self.expressions.len() {
            if self.expressions[i].is_stale(&self.catalog) {
                let source = self.expressions[i].source().to_string();
                let pixel_type = self.expressions[i].output_spec().pixel_type;
                self.expressions[i] = compile(&mut self.catalog, &source, pixel_type)?;
            }
        }
        Ok(())
    }
}

impl Default for BandMathX<'_> {
    fn default() -> Self {
        Self::new(BandMathParams::default())
    }
}

/// Inputs and expressions for a one-shot [`BandMath`] run
#[derive(Debug, Clone, Default)]
pub struct BandMathInput {
    /// Registered in order as `im1`, `im2`, ...
    pub images: Vec<Raster<f64>>,
    pub expressions: Vec<String>,
}

/// One-shot band math over owned rasters
#[derive(Debug, Clone, Copy, Default)]
pub struct BandMath;

impl Algorithm for BandMath {
    type Input = BandMathInput;
    type Output = Vec<ExpressionOutput>;
    type Params = BandMathParams;
    type Error = BandMathError;

    fn name(&self) -> &'static str {
        "BandMathX"
    }

    fn description(&self) -> &'static str {
        "Evaluate per-pixel expressions over multi-band rasters, with neighborhoods and matrix operations"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let mut engine = BandMathX::new(params);
        for image in &input.images {
            engine.register_input(image, None)?;
        }
        for text in &input.expressions {
            engine.compile(text)?;
        }
        engine.run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rastermath_parallel::ProcessingMode;

    #[test]
    fn test_configuration_errors_at_run() {
        let a: Raster<f64> = Raster::new(1, 2, 2);
        let mut bm = BandMathX::default();
        assert!(matches!(bm.run(), Err(BandMathError::Configuration(_))));

        bm.register_input(&a, None).unwrap();
        assert!(matches!(bm.run(), Err(BandMathError::Configuration(_))));
    }

    #[test]
    fn test_failed_compile_keeps_expressions() {
        let a: Raster<f64> = Raster::new(1, 2, 2);
        let mut bm = BandMathX::default();
        bm.register_input(&a, None).unwrap();
        bm.compile("im1b1").unwrap();
        assert!(bm.compile("im1b1 +").is_err());
        assert_eq!(bm.expressions().len(), 1);
    }

    #[test]
    fn test_region_outside_inputs() {
        let a: Raster<f64> = Raster::new(1, 4, 4);
        let mut bm = BandMathX::default();
        bm.register_input(&a, None).unwrap();
        bm.compile("im1b1").unwrap();
        assert!(matches!(
            bm.run_region(Region::new(2, 0, 3, 4)),
            Err(BandMathError::Core(_))
        ));
    }

    #[test]
    fn test_alias_and_positional_names() {
        let a = Raster::from_vec(vec![1.0, 2.0, 3.0, 4.0, 10.0, 20.0, 30.0, 40.0], 2, 2, 2).unwrap();
        let mut bm = BandMathX::new(BandMathParams {
            mode: ProcessingMode::Sequential,
            ..Default::default()
        });
        bm.register_input(&a, Some("img")).unwrap();
        let h = bm.compile("imgb2 - im1b1").unwrap();
        assert_eq!(bm.expression(h).unwrap().output_spec().band_count, 1);

        let out = bm.run().unwrap();
        assert_eq!(out.len(), 1);
        assert_relative_eq!(out[0].raster.get_f64(0, 1, 1), 36.0);
        assert!(out[0].diagnostics.is_clean());
    }

    #[test]
    fn test_compile_typed_and_specs() {
        let a: Raster<f64> = Raster::new(3, 2, 2);
        let mut bm = BandMathX::default();
        bm.register_input(&a, None).unwrap();
        bm.compile_typed("im1", PixelType::U16).unwrap();
        bm.compile("im1b1").unwrap();
        let specs = bm.output_specs();
        assert_eq!(specs[0].band_count, 3);
        assert_eq!(specs[0].pixel_type, PixelType::U16);
        assert_eq!(specs[1].pixel_type, PixelType::F64);
    }

    #[test]
    fn test_algorithm_trait() {
        let a = Raster::from_vec(vec![1.0, 2.0, 3.0, 4.0], 1, 2, 2).unwrap();
        let input = BandMathInput {
            images: vec![a],
            expressions: vec!["im1b1 * 2".to_string(), "im1b1Sum".to_string()],
        };
        let out = BandMath.execute_default(input).unwrap();
        assert_eq!(BandMath.name(), "BandMathX");
        assert_eq!(out[0].raster.get_f64(0, 1, 0), 6.0);
        assert_eq!(out[1].raster.get_f64(0, 0, 0), 10.0);
    }
}
