//! Variable catalog: the identifiers an expression may reference.
//!
//! Registering input `N` (1-based) with `B` bands creates:
//!
//! | Name | Value |
//! |------|-------|
//! | `imN` | pixel vector, 1xB |
//! | `imNbJ` | band J of the pixel, scalar |
//! | `imNPhyX`, `imNPhyY` | physical coordinates of the pixel center |
//! | `imNbJMini`, `imNbJMaxi`, `imNbJMean`, `imNbJSum`, `imNbJVar` | whole-band statistics |
//! | `imNbJNwxh` | `w x h` window of band J (created on first use), h rows by w columns |
//!
//! An alias mirrors every name with the alias in place of `imN`; the
//! positional names stay valid. `idxX` and `idxY` always exist.

use super::error::{BandMathError, Result};
use rastermath_core::{BandStatistics, RasterSource, Window};
use rastermath_expr::{Matrix, Shape, Value, reserved_names};
use std::collections::HashMap;

/// Whole-band statistic exposed as a scalar variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalStat {
    Min,
    Max,
    Mean,
    Sum,
    Var,
}

impl GlobalStat {
    pub const ALL: [GlobalStat; 5] = [
        GlobalStat::Min,
        GlobalStat::Max,
        GlobalStat::Mean,
        GlobalStat::Sum,
        GlobalStat::Var,
    ];

    /// Suffix appended to `imNbJ`
    pub fn suffix(self) -> &'static str {
        match self {
            GlobalStat::Min => "Mini",
            GlobalStat::Max => "Maxi",
            GlobalStat::Mean => "Mean",
            GlobalStat::Sum => "Sum",
            GlobalStat::Var => "Var",
        }
    }

    pub fn pick(self, stats: &BandStatistics) -> f64 {
        match self {
            GlobalStat::Min => stats.min,
            GlobalStat::Max => stats.max,
            GlobalStat::Mean => stats.mean,
            GlobalStat::Sum => stats.sum,
            GlobalStat::Var => stats.variance,
        }
    }
}

/// What a variable holds. Image indices and bands are 0-based.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableKind {
    PixelVector { image: usize, bands: usize },
    BandScalar { image: usize, band: usize },
    Neighborhood { image: usize, band: usize, window: Window },
    PhysicalX { image: usize },
    PhysicalY { image: usize },
    IndexX,
    IndexY,
    GlobalStat { image: usize, band: usize, stat: GlobalStat },
    Constant(f64),
    Matrix(Matrix),
}

impl VariableKind {
    /// Whether the value changes with the output position
    pub fn is_positional(&self) -> bool {
        !matches!(
            self,
            VariableKind::GlobalStat { .. } | VariableKind::Constant(_) | VariableKind::Matrix(_)
        )
    }
}

/// A catalog entry; its index in the catalog is its evaluation slot
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDescriptor {
    /// Canonical (positional) name
    pub name: String,
    pub kind: VariableKind,
    pub shape: Shape,
    /// Scalar as opposed to a (possibly 1x1) matrix
    pub scalar: bool,
}

impl VariableDescriptor {
    fn new(name: String, kind: VariableKind) -> Self {
        let (shape, scalar) = match &kind {
            VariableKind::PixelVector { bands, .. } => (Shape::new(1, *bands), false),
            VariableKind::Neighborhood { window, .. } => {
                (Shape::new(window.height(), window.width()), false)
            }
            VariableKind::Matrix(m) => (m.shape(), false),
            _ => (Shape::SCALAR, true),
        };
        Self {
            name,
            kind,
            shape,
            scalar,
        }
    }

    /// Value used when probing an expression's result shape.
    ///
    /// Raster-derived variables are zeros of the declared shape; user
    /// constants and matrices carry their real values.
    pub fn placeholder(&self) -> Value {
        match &self.kind {
            VariableKind::Constant(v) => Value::Scalar(*v),
            VariableKind::Matrix(m) => Value::Matrix(m.clone()),
            _ => Value::zeros(self.shape, self.scalar),
        }
    }
}

/// A registered input raster
#[derive(Clone, Copy)]
pub struct InputBinding<'a> {
    /// 0-based registration order
    pub index: usize,
    pub source: &'a dyn RasterSource,
    pub band_count: usize,
}

impl std::fmt::Debug for InputBinding<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputBinding")
            .field("index", &self.index)
            .field("band_count", &self.band_count)
            .field("shape", &self.source.shape())
            .finish()
    }
}

/// Owns every legal identifier of a band math session
#[derive(Debug)]
pub struct VariableCatalog<'a> {
    inputs: Vec<InputBinding<'a>>,
    variables: Vec<VariableDescriptor>,
    names: HashMap<String, usize>,
    /// `imN` and aliases, mapped to the 0-based input index
    roots: HashMap<String, usize>,
    neighborhoods: HashMap<(usize, usize, Window), usize>,
    generation: u64,
}

impl Default for VariableCatalog<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> VariableCatalog<'a> {
    pub fn new() -> Self {
        let mut catalog = Self {
            inputs: Vec::new(),
            variables: Vec::new(),
            names: HashMap::new(),
            roots: HashMap::new(),
            neighborhoods: HashMap::new(),
            generation: 0,
        };
        catalog.push("idxX".to_string(), VariableKind::IndexX);
        catalog.push("idxY".to_string(), VariableKind::IndexY);
        catalog
    }

    /// Register an input and generate its names. Returns the 0-based index.
    ///
    /// Every input must have the spatial shape of the first one.
    pub fn register_input(&mut self, source: &'a dyn RasterSource, alias: Option<&str>) -> Result<usize> {
        let band_count = source.band_count();
        if band_count == 0 {
            return Err(BandMathError::Configuration(
                "input raster has no bands".to_string(),
            ));
        }
        if let Some(first) = self.inputs.first() {
            let (er, ec) = first.source.shape();
            let (ar, ac) = source.shape();
            if (er, ec) != (ar, ac) {
                return Err(rastermath_core::Error::SizeMismatch { er, ec, ar, ac }.into());
            }
        }

        let index = self.inputs.len();
        let positional = format!("im{}", index + 1);
        let mut roots = vec![positional.clone()];
        if let Some(alias) = alias {
            if alias != positional {
                self.check_name_available(alias)?;
                roots.push(alias.to_string());
            }
        }

        let entries = input_entries(index, band_count);

        // Check everything first so a collision leaves the catalog untouched
        for root in &roots {
            if self.roots.contains_key(root) {
                return Err(BandMathError::NameCollision { name: root.clone() });
            }
            for (suffix, _) in &entries {
                let name = format!("{}{}", root, suffix);
                if self.names.contains_key(&name) {
                    return Err(BandMathError::NameCollision { name });
                }
            }
        }

        for (suffix, kind) in entries {
            let slot = self.push(format!("{}{}", positional, suffix), kind);
            for root in roots.iter().skip(1) {
                self.names.insert(format!("{}{}", root, suffix), slot);
            }
        }
        for root in roots {
            self.roots.insert(root, index);
        }

        self.inputs.push(InputBinding {
            index,
            source,
            band_count,
        });
        self.generation += 1;
        Ok(index)
    }

    /// Declare a read-only scalar
    pub fn declare_constant(&mut self, name: &str, value: f64) -> Result<()> {
        self.check_name_available(name)?;
        self.push(name.to_string(), VariableKind::Constant(value));
        self.generation += 1;
        Ok(())
    }

    /// Declare a read-only `rows x cols` matrix from row-major values
    pub fn declare_matrix(&mut self, name: &str, rows: usize, cols: usize, values: Vec<f64>) -> Result<()> {
        self.check_name_available(name)?;
        if rows == 0 || cols == 0 || values.len() != rows * cols {
            return Err(BandMathError::Dimensionality {
                expression: name.to_string(),
                operation: "declare_matrix".to_string(),
                expected: format!("{} values for a {}x{} matrix", rows * cols, rows, cols),
                found: format!("{} values", values.len()),
            });
        }
        let matrix = Matrix::new(rows, cols, values)
            .map_err(|e| BandMathError::from_probe(name, e))?;
        self.push(name.to_string(), VariableKind::Matrix(matrix));
        self.generation += 1;
        Ok(())
    }

    /// Declare a matrix written as `{ a, b, c; d, e, f }`
    pub fn declare_matrix_text(&mut self, name: &str, text: &str) -> Result<()> {
        let (rows, cols, values) = parse_matrix_text(text)?;
        self.declare_matrix(name, rows, cols, values)
    }

    /// Slot of `name`, registering a neighborhood variable on first use
    pub fn resolve(&mut self, name: &str) -> Result<usize> {
        if let Some(&slot) = self.names.get(name) {
            return Ok(slot);
        }

        if let Some(n) = split_neighborhood(name) {
            if let Some(&image) = self.roots.get(n.root) {
                let band = self.check_band(name, image, n.band)?;
                let window = Window::new(n.width, n.height).map_err(|_| {
                    BandMathError::InvalidNeighborhoodSize {
                        expression: String::new(),
                        name: name.to_string(),
                        width: n.width,
                        height: n.height,
                    }
                })?;

                let key = (image, band, window);
                let slot = match self.neighborhoods.get(&key) {
                    Some(&slot) => slot,
                    None => {
                        let canonical = format!(
                            "im{}b{}N{}x{}",
                            image + 1,
                            band + 1,
                            window.width(),
                            window.height()
                        );
                        let slot = self.push(canonical, VariableKind::Neighborhood { image, band, window });
                        self.neighborhoods.insert(key, slot);
                        slot
                    }
                };
                self.names.insert(name.to_string(), slot);
                return Ok(slot);
            }
        }

        if let Some((root, band)) = split_band_reference(name) {
            if let Some(&image) = self.roots.get(root) {
                self.check_band(name, image, band)?;
            }
        }

        Err(BandMathError::UnknownVariable {
            expression: String::new(),
            names: vec![name.to_string()],
        })
    }

    /// Descriptor of an existing name, without lazy registration
    pub fn lookup(&self, name: &str) -> Result<&VariableDescriptor> {
        self.names
            .get(name)
            .map(|&slot| &self.variables[slot])
            .ok_or_else(|| BandMathError::UnknownVariable {
                expression: String::new(),
                names: vec![name.to_string()],
            })
    }

    /// Descriptor stored in `slot`
    pub fn descriptor(&self, slot: usize) -> Option<&VariableDescriptor> {
        self.variables.get(slot)
    }

    /// All descriptors, indexed by slot
    pub fn variables(&self) -> &[VariableDescriptor] {
        &self.variables
    }

    pub fn inputs(&self) -> &[InputBinding<'a>] {
        &self.inputs
    }

    /// Changes whenever a registration or declaration invalidates compiled expressions
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Probe values for every slot
    pub fn placeholder_slots(&self) -> Vec<Value> {
        self.variables.iter().map(VariableDescriptor::placeholder).collect()
    }

    fn push(&mut self, name: String, kind: VariableKind) -> usize {
        let slot = self.variables.len();
        self.names.insert(name.clone(), slot);
        self.variables.push(VariableDescriptor::new(name, kind));
        slot
    }

    fn check_name_available(&self, name: &str) -> Result<()> {
        let mut chars = name.chars();
        let well_formed = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !well_formed {
            return Err(BandMathError::Configuration(format!(
                "'{}' is not a valid variable name",
                name
            )));
        }
        if self.names.contains_key(name)
            || self.roots.contains_key(name)
            || reserved_names().any(|r| r == name)
            || is_positional_name(name)
        {
            return Err(BandMathError::NameCollision {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Validate a 1-based band of `image`, returning it 0-based
    fn check_band(&self, name: &str, image: usize, band: usize) -> Result<usize> {
        let count = self.inputs[image].band_count;
        if band == 0 || band > count {
            return Err(BandMathError::BandOutOfRange {
                expression: String::new(),
                name: name.to_string(),
                band,
                count,
            });
        }
        Ok(band - 1)
    }
}

/// Whether `name` lies in the `im<N>...` space generated for inputs
fn is_positional_name(name: &str) -> bool {
    name.strip_prefix("im")
        .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
}

/// Name suffixes and kinds generated for one input
fn input_entries(image: usize, band_count: usize) -> Vec<(String, VariableKind)> {
    let mut entries = vec![(
        String::new(),
        VariableKind::PixelVector {
            image,
            bands: band_count,
        },
    )];
    for band in 0..band_count {
        entries.push((format!("b{}", band + 1), VariableKind::BandScalar { image, band }));
    }
    entries.push(("PhyX".to_string(), VariableKind::PhysicalX { image }));
    entries.push(("PhyY".to_string(), VariableKind::PhysicalY { image }));
    for band in 0..band_count {
        for stat in GlobalStat::ALL {
            entries.push((
                format!("b{}{}", band + 1, stat.suffix()),
                VariableKind::GlobalStat { image, band, stat },
            ));
        }
    }
    entries
}

struct NeighborhoodName<'n> {
    root: &'n str,
    band: usize,
    width: usize,
    height: usize,
}

fn parse_digits(text: &str) -> Option<usize> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Split `<root>b<band>N<w>x<h>`
fn split_neighborhood(name: &str) -> Option<NeighborhoodName<'_>> {
    let n = name.rfind('N')?;
    let (w, h) = name[n + 1..].split_once('x')?;
    let (root, band) = split_band(&name[..n])?;
    Some(NeighborhoodName {
        root,
        band,
        width: parse_digits(w)?,
        height: parse_digits(h)?,
    })
}

/// Split `<root>b<band>` with an optional statistic suffix
fn split_band_reference(name: &str) -> Option<(&str, usize)> {
    let stem = GlobalStat::ALL
        .iter()
        .find_map(|s| name.strip_suffix(s.suffix()))
        .unwrap_or(name);
    split_band(stem)
}

/// Split `<root>b<band>`
fn split_band(name: &str) -> Option<(&str, usize)> {
    let b = name.rfind('b')?;
    let band = parse_digits(&name[b + 1..])?;
    Some((&name[..b], band))
}

/// Parse `{ a, b; c, d }` into (rows, cols, row-major values)
pub fn parse_matrix_text(text: &str) -> Result<(usize, usize, Vec<f64>)> {
    let syntax = |position: usize, message: &str| BandMathError::Syntax {
        expression: text.to_string(),
        position,
        message: message.to_string(),
    };

    let trimmed = text.trim();
    let lead = text.len() - text.trim_start().len();
    let inner = trimmed
        .strip_prefix('{')
        .ok_or_else(|| syntax(lead, "matrix must start with '{'"))?
        .strip_suffix('}')
        .ok_or_else(|| syntax(lead + trimmed.len(), "matrix must end with '}'"))?;
    if inner.trim().is_empty() {
        return Err(syntax(lead + 1, "matrix is empty"));
    }

    let mut rows: Vec<Vec<f64>> = Vec::new();
    let mut offset = lead + 1;
    for row_text in inner.split(';') {
        let mut row = Vec::new();
        let mut element_offset = offset;
        for element in row_text.split(',') {
            let value = element
                .trim()
                .parse::<f64>()
                .map_err(|_| syntax(element_offset, "expected a number"))?;
            row.push(value);
            element_offset += element.len() + 1;
        }
        rows.push(row);
        offset += row_text.len() + 1;
    }

    let cols = rows[0].len();
    if let Some(bad) = rows.iter().find(|r| r.len() != cols) {
        return Err(BandMathError::Dimensionality {
            expression: text.to_string(),
            operation: "matrix".to_string(),
            expected: format!("{} elements per row", cols),
            found: format!("a row of {} elements", bad.len()),
        });
    }
    let row_count = rows.len();
    Ok((row_count, cols, rows.into_iter().flatten().collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rastermath_core::Raster;

    fn raster(bands: usize) -> Raster<f64> {
        Raster::new(bands, 4, 5)
    }

    #[test]
    fn test_positional_names() {
        let a = raster(3);
        let mut catalog = VariableCatalog::new();
        assert_eq!(catalog.register_input(&a, None).unwrap(), 0);

        let px = catalog.lookup("im1").unwrap();
        assert_eq!(px.kind, VariableKind::PixelVector { image: 0, bands: 3 });
        assert_eq!(px.shape, Shape::new(1, 3));
        assert!(!px.scalar);

        assert_eq!(
            catalog.lookup("im1b3").unwrap().kind,
            VariableKind::BandScalar { image: 0, band: 2 }
        );
        assert!(catalog.lookup("im1PhyX").is_ok());
        assert!(catalog.lookup("im1b2Maxi").is_ok());
        assert!(catalog.lookup("idxY").is_ok());
        assert!(catalog.lookup("im1b4").is_err());
    }

    #[test]
    fn test_alias_mirrors_names_and_keeps_positional() {
        let a = raster(2);
        let mut catalog = VariableCatalog::new();
        catalog.register_input(&a, Some("nir")).unwrap();

        let by_alias = catalog.resolve("nirb2").unwrap();
        let by_position = catalog.resolve("im1b2").unwrap();
        assert_eq!(by_alias, by_position);
        assert_eq!(catalog.resolve("nir").unwrap(), catalog.resolve("im1").unwrap());
    }

    #[test]
    fn test_name_collisions() {
        let a = raster(1);
        let b = raster(1);
        let mut catalog = VariableCatalog::new();
        catalog.register_input(&a, Some("img")).unwrap();

        assert!(matches!(
            catalog.declare_constant("im1b1", 2.0),
            Err(BandMathError::NameCollision { .. })
        ));
        assert!(matches!(
            catalog.declare_constant("sin", 2.0),
            Err(BandMathError::NameCollision { .. })
        ));
        catalog.declare_constant("k", 2.0).unwrap();
        assert!(matches!(
            catalog.declare_constant("k", 3.0),
            Err(BandMathError::NameCollision { .. })
        ));
        assert!(matches!(
            catalog.register_input(&b, Some("img")),
            Err(BandMathError::NameCollision { .. })
        ));
        // the failed registration left no trace
        assert!(catalog.lookup("im2").is_err());
        assert_eq!(catalog.register_input(&b, None).unwrap(), 1);
    }

    #[test]
    fn test_future_positional_names_are_reserved() {
        let a = raster(1);
        let b = raster(2);
        let mut catalog = VariableCatalog::new();

        assert!(matches!(
            catalog.register_input(&a, Some("im2")),
            Err(BandMathError::NameCollision { .. })
        ));
        for name in ["im2", "im3b1", "im10PhyX"] {
            assert!(matches!(
                catalog.declare_constant(name, 5.0),
                Err(BandMathError::NameCollision { .. })
            ));
        }
        assert!(matches!(
            catalog.declare_matrix("im2", 1, 1, vec![1.0]),
            Err(BandMathError::NameCollision { .. })
        ));
        catalog.declare_constant("img2", 5.0).unwrap();

        // an input may still be aliased with its own positional name
        assert_eq!(catalog.register_input(&a, Some("im1")).unwrap(), 0);
        assert_eq!(catalog.register_input(&b, None).unwrap(), 1);
        assert_eq!(
            catalog.lookup("im2b2").unwrap().kind,
            VariableKind::BandScalar { image: 1, band: 1 }
        );
    }

    #[test]
    fn test_generation_advances_on_mutation() {
        let a = raster(1);
        let mut catalog = VariableCatalog::new();
        let g0 = catalog.generation();
        catalog.register_input(&a, None).unwrap();
        let g1 = catalog.generation();
        assert!(g1 > g0);
        catalog.resolve("im1b1N3x3").unwrap();
        assert_eq!(catalog.generation(), g1);
        catalog.declare_constant("k", 1.0).unwrap();
        assert!(catalog.generation() > g1);
    }

    #[test]
    fn test_neighborhood_resolution() {
        let a = raster(2);
        let mut catalog = VariableCatalog::new();
        catalog.register_input(&a, Some("red")).unwrap();

        let slot = catalog.resolve("im1b2N5x3").unwrap();
        let d = catalog.descriptor(slot).unwrap();
        assert_eq!(d.shape, Shape::new(3, 5));
        assert_eq!(catalog.resolve("redb2N5x3").unwrap(), slot);

        assert!(matches!(
            catalog.resolve("im1b1N4x3"),
            Err(BandMathError::InvalidNeighborhoodSize { width: 4, height: 3, .. })
        ));
        assert!(matches!(
            catalog.resolve("im1b3N3x3"),
            Err(BandMathError::BandOutOfRange { band: 3, count: 2, .. })
        ));
        assert!(matches!(
            catalog.resolve("im2b1N3x3"),
            Err(BandMathError::UnknownVariable { .. })
        ));
    }

    #[test]
    fn test_band_out_of_range_is_not_unknown() {
        let a = raster(3);
        let mut catalog = VariableCatalog::new();
        catalog.register_input(&a, None).unwrap();
        assert!(matches!(
            catalog.resolve("im1b9"),
            Err(BandMathError::BandOutOfRange { band: 9, count: 3, .. })
        ));
        assert!(matches!(
            catalog.resolve("im1b0Mean"),
            Err(BandMathError::BandOutOfRange { band: 0, .. })
        ));
        assert!(matches!(
            catalog.resolve("foo"),
            Err(BandMathError::UnknownVariable { .. })
        ));
    }

    #[test]
    fn test_mismatched_input_shape_rejected() {
        let a: Raster<f64> = Raster::new(1, 4, 5);
        let b: Raster<f64> = Raster::new(1, 5, 4);
        let mut catalog = VariableCatalog::new();
        catalog.register_input(&a, None).unwrap();
        assert!(matches!(
            catalog.register_input(&b, None),
            Err(BandMathError::Core(rastermath_core::Error::SizeMismatch { .. }))
        ));
    }

    #[test]
    fn test_matrix_text() {
        assert_eq!(
            parse_matrix_text("{ 1, 2, 3; 4, 5, 6 }").unwrap(),
            (2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
        );
        assert_eq!(parse_matrix_text(" {-0.5} ").unwrap(), (1, 1, vec![-0.5]));
        assert!(matches!(
            parse_matrix_text("{1, 2; 3}"),
            Err(BandMathError::Dimensionality { .. })
        ));
        assert!(matches!(
            parse_matrix_text("1, 2"),
            Err(BandMathError::Syntax { position: 0, .. })
        ));
        assert!(matches!(
            parse_matrix_text("{1, x}"),
            Err(BandMathError::Syntax { position: 3, .. })
        ));
    }

    #[test]
    fn test_declared_matrix_placeholder_is_real() {
        let mut catalog = VariableCatalog::new();
        catalog.declare_matrix_text("kernel", "{1, 2; 3, 4}").unwrap();
        let d = catalog.lookup("kernel").unwrap();
        assert_eq!(d.shape, Shape::new(2, 2));
        assert_eq!(d.placeholder().values(), &[1.0, 2.0, 3.0, 4.0]);
        assert!(catalog.declare_matrix("bad", 2, 2, vec![1.0]).is_err());
    }
}
