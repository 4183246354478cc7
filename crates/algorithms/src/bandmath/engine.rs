//! Per-position evaluation loop over one sub-region

use super::catalog::{InputBinding, VariableCatalog, VariableKind};
use super::compiler::{CompiledExpression, OutputSpec};
use super::context::{Diagnostics, EvaluationContext};
use super::error::Result;
use super::neighborhood::{NeighborhoodCache, NeighborhoodKey};
use rastermath_core::{GeoTransform, PixelType};
use rastermath_expr::{Program, Value};
use rastermath_parallel::Region;
use std::collections::HashMap;

/// How a position-dependent slot is refreshed
#[derive(Debug, Clone, Copy)]
enum SlotSource {
    Pixel { image: usize },
    Band { image: usize, band: usize },
    Neighborhood(NeighborhoodKey),
    PhysicalX(GeoTransform),
    PhysicalY(GeoTransform),
    IndexX,
    IndexY,
}

/// Read-only description of a pass, shared by every worker
#[derive(Debug)]
pub struct PassPlan<'c, 'a> {
    pub(crate) inputs: &'c [InputBinding<'a>],
    pub(crate) programs: Vec<Program>,
    pub(crate) specs: Vec<OutputSpec>,
    /// Initial slot values; position-independent slots are final
    pub(crate) template: Vec<Value>,
    /// Position-dependent slots referenced by at least one program
    refresh: Vec<(usize, SlotSource)>,
}

impl<'c, 'a> PassPlan<'c, 'a> {
    /// Gather the slots the expressions need and compute whole-band
    /// statistics they reference.
    pub fn new(catalog: &'c VariableCatalog<'a>, expressions: &[CompiledExpression]) -> Result<Self> {
        let mut referenced: Vec<usize> = expressions
            .iter()
            .flat_map(|e| e.program().slots().iter().copied())
            .collect();
        referenced.sort_unstable();
        referenced.dedup();

        let inputs = catalog.inputs();
        let mut template = catalog.placeholder_slots();
        let mut refresh = Vec::new();
        let mut statistics = HashMap::new();

        for slot in referenced {
            let Some(descriptor) = catalog.descriptor(slot) else {
                continue;
            };
            let source = match descriptor.kind {
                VariableKind::PixelVector { image, .. } => SlotSource::Pixel { image },
                VariableKind::BandScalar { image, band } => SlotSource::Band { image, band },
                VariableKind::Neighborhood {
                    image,
                    band,
                    window,
                } => SlotSource::Neighborhood(NeighborhoodKey {
                    image,
                    band,
                    window,
                }),
                VariableKind::PhysicalX { image } => {
                    SlotSource::PhysicalX(inputs[image].source.transform())
                }
                VariableKind::PhysicalY { image } => {
                    SlotSource::PhysicalY(inputs[image].source.transform())
                }
                VariableKind::IndexX => SlotSource::IndexX,
                VariableKind::IndexY => SlotSource::IndexY,
                VariableKind::GlobalStat { image, band, stat } => {
                    let stats = match statistics.get(&(image, band)) {
                        Some(s) => *s,
                        None => {
                            let s = inputs[image].source.band_statistics(band)?;
                            statistics.insert((image, band), s);
                            s
                        }
                    };
                    template[slot] = Value::Scalar(stat.pick(&stats));
                    continue;
                }
                VariableKind::Constant(_) | VariableKind::Matrix(_) => continue,
            };
            refresh.push((slot, source));
        }

        Ok(Self {
            inputs,
            programs: expressions.iter().map(|e| e.program().clone()).collect(),
            specs: expressions.iter().map(CompiledExpression::output_spec).collect(),
            template,
            refresh,
        })
    }

    pub fn specs(&self) -> &[OutputSpec] {
        &self.specs
    }
}

/// Output samples of one expression over one region, laid out (band, row, col)
#[derive(Debug, Clone)]
pub struct RegionBuffer {
    pub region: Region,
    pub bands: usize,
    pub data: Vec<f64>,
}

impl RegionBuffer {
    pub fn new(region: Region, bands: usize) -> Self {
        Self {
            region,
            bands,
            data: vec![f64::NAN; bands * region.len()],
        }
    }

    /// Sample at region-local (row, col)
    pub fn get(&self, band: usize, row: usize, col: usize) -> f64 {
        self.data[(band * self.region.rows + row) * self.region.cols + col]
    }

    fn set(&mut self, band: usize, row: usize, col: usize, value: f64) {
        let i = (band * self.region.rows + row) * self.region.cols + col;
        self.data[i] = value;
    }
}

/// Clamp to the range of `pixel_type`, counting what was clamped.
///
/// NaN passes through; it is counted when `pixel_type` cannot store it.
pub fn clamp_value(value: f64, pixel_type: PixelType, diagnostics: &mut Diagnostics) -> f64 {
    let (lo, hi) = pixel_type.range();
    if value.is_nan() {
        if !pixel_type.is_float() {
            diagnostics.nan_to_integer += 1;
        }
        value
    } else if value < lo {
        diagnostics.underflow += 1;
        lo
    } else if value > hi {
        diagnostics.overflow += 1;
        hi
    } else {
        value
    }
}

/// Evaluate every expression at every position of `region`, row-major.
///
/// Failed evaluations write NaN and are counted; they never abort the region.
pub fn evaluate_region(
    plan: &PassPlan<'_, '_>,
    region: Region,
    context: &mut EvaluationContext,
) -> Vec<RegionBuffer> {
    let mut buffers: Vec<RegionBuffer> = plan
        .specs
        .iter()
        .map(|s| RegionBuffer::new(region, s.band_count))
        .collect();
    let types: Vec<PixelType> = plan.specs.iter().map(|s| s.pixel_type).collect();

    let EvaluationContext {
        slots,
        cache,
        programs,
        diagnostics,
    } = context;

    for r in 0..region.rows {
        for c in 0..region.cols {
            let (row, col) = region.to_source_coords(r, c);
            refresh_slots(plan, slots, cache, row, col);

            for (e, program) in programs.iter().enumerate() {
                let buffer = &mut buffers[e];
                let diag = &mut diagnostics[e];
                let result = program.evaluate(slots);
                match result.as_ref().ok().and_then(Value::as_row) {
                    Some(values) if values.len() == buffer.bands => {
                        for (band, &v) in values.iter().enumerate() {
                            buffer.set(band, r, c, clamp_value(v, types[e], diag));
                        }
                    }
                    _ => {
                        diag.runtime_errors += 1;
                        for band in 0..buffer.bands {
                            buffer.set(band, r, c, f64::NAN);
                        }
                    }
                }
            }
        }
    }

    buffers
}

fn refresh_slots(
    plan: &PassPlan<'_, '_>,
    slots: &mut [Value],
    cache: &mut NeighborhoodCache,
    row: usize,
    col: usize,
) {
    for &(slot, source) in &plan.refresh {
        match source {
            SlotSource::Pixel { image } => {
                if let Value::Matrix(m) = &mut slots[slot] {
                    plan.inputs[image].source.read_pixel(row, col, m.as_mut_slice());
                }
            }
            SlotSource::Band { image, band } => {
                slots[slot] = Value::Scalar(plan.inputs[image].source.sample(band, row, col));
            }
            SlotSource::Neighborhood(key) => {
                let values = cache.get(plan.inputs[key.image].source, key, row, col);
                if let Value::Matrix(m) = &mut slots[slot] {
                    m.as_mut_slice().copy_from_slice(values);
                }
            }
            SlotSource::PhysicalX(transform) => {
                slots[slot] = Value::Scalar(transform.pixel_to_geo(col, row).0);
            }
            SlotSource::PhysicalY(transform) => {
                slots[slot] = Value::Scalar(transform.pixel_to_geo(col, row).1);
            }
            SlotSource::IndexX => slots[slot] = Value::Scalar(col as f64),
            SlotSource::IndexY => slots[slot] = Value::Scalar(row as f64),
        }
    }
}
