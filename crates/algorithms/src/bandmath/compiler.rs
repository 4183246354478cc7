//! Expression compilation: parse, resolve, bind and probe

use super::catalog::VariableCatalog;
use super::error::{BandMathError, Result};
use rastermath_core::PixelType;
use rastermath_expr::{Expression, Program, Shape};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Shape of the raster an expression writes, fixed before any pixel is read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSpec {
    /// Components per output pixel
    pub band_count: usize,
    pub pixel_type: PixelType,
}

/// An expression bound to catalog slots with a known result shape.
///
/// Only valid for the catalog generation it was compiled against.
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    source: String,
    program: Program,
    variables: Vec<String>,
    result_shape: Shape,
    spec: OutputSpec,
    generation: u64,
}

impl CompiledExpression {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Identifiers the expression references, in order of first appearance
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn result_shape(&self) -> Shape {
        self.result_shape
    }

    pub fn output_spec(&self) -> OutputSpec {
        self.spec
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the catalog changed since this expression was compiled
    pub fn is_stale(&self, catalog: &VariableCatalog<'_>) -> bool {
        self.generation != catalog.generation()
    }
}

/// Compile `text` against `catalog`, writing outputs of `pixel_type`.
///
/// Neighborhood names are registered in the catalog on first use. Every
/// unresolved identifier is reported, not just the first.
pub fn compile(
    catalog: &mut VariableCatalog<'_>,
    text: &str,
    pixel_type: PixelType,
) -> Result<CompiledExpression> {
    let expression = Expression::parse(text).map_err(|e| BandMathError::from_parse(text, e))?;

    let mut slots = Vec::with_capacity(expression.identifiers().len());
    let mut unknown = Vec::new();
    for name in expression.identifiers() {
        match catalog.resolve(name) {
            Ok(slot) => slots.push((name.as_str(), slot)),
            Err(BandMathError::UnknownVariable { names, .. }) => unknown.extend(names),
            Err(e) => return Err(e.in_expression(text)),
        }
    }
    if !unknown.is_empty() {
        return Err(BandMathError::UnknownVariable {
            expression: text.to_string(),
            names: unknown,
        });
    }

    let program = expression.bind(|name| {
        slots
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, slot)| *slot)
            .ok_or_else(|| BandMathError::UnknownVariable {
                expression: text.to_string(),
                names: vec![name.to_string()],
            })
    })?;

    // Probe on placeholders: the result shape depends only on declared shapes
    let probe = program
        .probe(&catalog.placeholder_slots())
        .map_err(|e| BandMathError::from_probe(text, e))?;
    let result_shape = probe.shape();
    let band_count = probe
        .as_row()
        .map(<[f64]>::len)
        .ok_or_else(|| BandMathError::Dimensionality {
            expression: text.to_string(),
            operation: "output".to_string(),
            expected: "a scalar or a 1xN row vector".to_string(),
            found: result_shape.to_string(),
        })?;

    debug!(
        "Compiled '{}': {} band(s) of {}, variables {:?}",
        text,
        band_count,
        pixel_type,
        expression.identifiers()
    );

    Ok(CompiledExpression {
        source: text.to_string(),
        program,
        variables: expression.identifiers().to_vec(),
        result_shape,
        spec: OutputSpec {
            band_count,
            pixel_type,
        },
        generation: catalog.generation(),
    })
}
