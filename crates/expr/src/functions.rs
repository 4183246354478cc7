//! Built-in function registry

use crate::error::{EvalError, Result};
use crate::value::{Matrix, Value};
use std::fmt;

/// Named constants substituted at parse time
pub const CONSTANTS: &[(&str, f64)] = &[("pi", std::f64::consts::PI), ("e", std::f64::consts::E)];

/// Divisors smaller than this in magnitude yield NaN.
///
/// The bound is absolute: `1e-12 / 1e-12` is NaN, not 1.
pub const DIVISION_EPSILON: f64 = 1e-10;

/// `a / b`, or NaN when `|b| < DIVISION_EPSILON`.
///
/// Every division in the language goes through here: `/`, `div`, `dv`,
/// `ndvi` and `corr`.
pub fn safe_div(a: f64, b: f64) -> f64 {
    if b.abs() < DIVISION_EPSILON {
        f64::NAN
    } else {
        a / b
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Exp,
    Log,
    Log10,
    Log2,
    Sqrt,
    Abs,
    Floor,
    Ceil,
    Round,
    Sign,
    Atan2,
    Ndvi,
    VSin,
    VCos,
    VTan,
    VAsin,
    VAcos,
    VAtan,
    VSinh,
    VCosh,
    VTanh,
    VExp,
    VLog,
    VLog10,
    VSqrt,
    VAbs,
    Bands,
    Cat,
    Min,
    Max,
    Mean,
    Var,
    Median,
    Sum,
    Maj,
    VMin,
    VMax,
    VNorm,
    Vect2Scal,
    Corr,
    Conv,
}

const REGISTRY: &[(&str, Function)] = &[
    ("sin", Function::Sin),
    ("cos", Function::Cos),
    ("tan", Function::Tan),
    ("asin", Function::Asin),
    ("acos", Function::Acos),
    ("atan", Function::Atan),
    ("sinh", Function::Sinh),
    ("cosh", Function::Cosh),
    ("tanh", Function::Tanh),
    ("exp", Function::Exp),
    ("log", Function::Log),
    ("ln", Function::Log),
    ("log10", Function::Log10),
    ("log2", Function::Log2),
    ("sqrt", Function::Sqrt),
    ("abs", Function::Abs),
    ("floor", Function::Floor),
    ("ceil", Function::Ceil),
    ("round", Function::Round),
    ("sign", Function::Sign),
    ("atan2", Function::Atan2),
    ("ndvi", Function::Ndvi),
    ("vsin", Function::VSin),
    ("vcos", Function::VCos),
    ("vtan", Function::VTan),
    ("vasin", Function::VAsin),
    ("vacos", Function::VAcos),
    ("vatan", Function::VAtan),
    ("vsinh", Function::VSinh),
    ("vcosh", Function::VCosh),
    ("vtanh", Function::VTanh),
    ("vexp", Function::VExp),
    ("vlog", Function::VLog),
    ("vlog10", Function::VLog10),
    ("vsqrt", Function::VSqrt),
    ("vabs", Function::VAbs),
    ("bands", Function::Bands),
    ("cat", Function::Cat),
    ("min", Function::Min),
    ("max", Function::Max),
    ("mean", Function::Mean),
    ("var", Function::Var),
    ("median", Function::Median),
    ("sum", Function::Sum),
    ("maj", Function::Maj),
    ("vmin", Function::VMin),
    ("vmax", Function::VMax),
    ("vnorm", Function::VNorm),
    ("vect2scal", Function::Vect2Scal),
    ("corr", Function::Corr),
    ("conv", Function::Conv),
    ("dotpr", Function::Conv),
];

/// Number of arguments a function takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(1) => write!(f, "1 argument"),
            Arity::Exact(n) => write!(f, "{} arguments", n),
            Arity::AtLeast(1) => write!(f, "at least 1 argument"),
            Arity::AtLeast(n) => write!(f, "at least {} arguments", n),
        }
    }
}

impl Function {
    /// Find a function by the name used in expressions
    pub fn lookup(name: &str) -> Option<Function> {
        REGISTRY.iter().find(|(n, _)| *n == name).map(|(_, f)| *f)
    }

    /// Every name the registry answers to, aliases included
    pub fn names() -> impl Iterator<Item = &'static str> {
        REGISTRY.iter().map(|(n, _)| *n)
    }

    /// Primary name
    pub fn name(self) -> &'static str {
        REGISTRY
            .iter()
            .find(|(_, f)| *f == self)
            .map_or("?", |(n, _)| *n)
    }

    pub fn arity(self) -> Arity {
        use Function::*;
        match self {
            Atan2 | Ndvi | Corr | Bands => Arity::Exact(2),
            Cat | Min | Max | Mean | Var | Median | Sum | Maj => Arity::AtLeast(1),
            Conv => Arity::AtLeast(2),
            _ => Arity::Exact(1),
        }
    }

    /// Element function and whether it applies to whole matrices
    fn elementwise(self) -> Option<(fn(f64) -> f64, bool)> {
        use Function::*;
        let entry: (fn(f64) -> f64, bool) = match self {
            Sin => (f64::sin, false),
            Cos => (f64::cos, false),
            Tan => (f64::tan, false),
            Asin => (f64::asin, false),
            Acos => (f64::acos, false),
            Atan => (f64::atan, false),
            Sinh => (f64::sinh, false),
            Cosh => (f64::cosh, false),
            Tanh => (f64::tanh, false),
            Exp => (f64::exp, false),
            Log => (f64::ln, false),
            Log10 => (f64::log10, false),
            Log2 => (f64::log2, false),
            Sqrt => (f64::sqrt, false),
            Abs => (f64::abs, false),
            Floor => (f64::floor, false),
            Ceil => (f64::ceil, false),
            Round => (f64::round, false),
            Sign => (sign, false),
            VSin => (f64::sin, true),
            VCos => (f64::cos, true),
            VTan => (f64::tan, true),
            VAsin => (f64::asin, true),
            VAcos => (f64::acos, true),
            VAtan => (f64::atan, true),
            VSinh => (f64::sinh, true),
            VCosh => (f64::cosh, true),
            VTanh => (f64::tanh, true),
            VExp => (f64::exp, true),
            VLog => (f64::ln, true),
            VLog10 => (f64::log10, true),
            VSqrt => (f64::sqrt, true),
            VAbs => (f64::abs, true),
            _ => return None,
        };
        Some(entry)
    }

    /// Reduction applied to each argument of the windowed family
    fn reduction(self) -> Option<fn(&[f64]) -> f64> {
        use Function::*;
        let f: fn(&[f64]) -> f64 = match self {
            Min => reduce_min,
            Max => reduce_max,
            Mean => reduce_mean,
            Var => reduce_var,
            Median => reduce_median,
            Sum => reduce_sum,
            Maj => reduce_majority,
            _ => return None,
        };
        Some(f)
    }

    /// Apply to already evaluated arguments
    pub fn apply(self, args: &[Value]) -> Result<Value> {
        use Function::*;
        let name = self.name();
        if !self.arity().accepts(args.len()) {
            return Err(EvalError::dimensionality(
                name,
                self.arity().to_string(),
                format!("{} arguments", args.len()),
            ));
        }

        if let Some((f, vectorized)) = self.elementwise() {
            let arg = &args[0];
            return if vectorized {
                Ok(arg.map(f))
            } else {
                Ok(Value::Scalar(f(arg.expect_scalar(name)?)))
            };
        }

        if let Some(reduce) = self.reduction() {
            // min/max over scalars stay scalar
            if matches!(self, Min | Max) && args.iter().all(Value::is_scalar) {
                return Ok(Value::Scalar(reduce(
                    &args.iter().map(|a| a.values()[0]).collect::<Vec<_>>(),
                )));
            }
            return Ok(Value::Matrix(Matrix::row(
                args.iter().map(|a| reduce(a.values())).collect(),
            )));
        }

        match self {
            Atan2 => {
                let y = args[0].expect_scalar(name)?;
                let x = args[1].expect_scalar(name)?;
                Ok(Value::Scalar(y.atan2(x)))
            }
            Ndvi => {
                let red = args[0].expect_scalar(name)?;
                let nir = args[1].expect_scalar(name)?;
                Ok(Value::Scalar(safe_div(nir - red, nir + red)))
            }
            Bands => select_bands(&args[0], &args[1]),
            Cat => concatenate(args),
            VMin => Ok(Value::Scalar(reduce_min(args[0].values()))),
            VMax => Ok(Value::Scalar(reduce_max(args[0].values()))),
            VNorm => Ok(Value::Scalar(
                args[0].values().iter().map(|v| v * v).sum::<f64>().sqrt(),
            )),
            Vect2Scal => Ok(Value::Scalar(args[0].expect_scalar(name)?)),
            Corr => correlation(&args[0], &args[1]),
            Conv => convolve(&args[0], &args[1..]),
            _ => Err(EvalError::dimensionality(name, "a supported call", "no implementation")),
        }
    }
}

fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        v
    }
}

fn valid(values: &[f64]) -> impl Iterator<Item = f64> + '_ {
    values.iter().copied().filter(|v| !v.is_nan())
}

fn reduce_min(values: &[f64]) -> f64 {
    valid(values).fold(f64::NAN, f64::min)
}

fn reduce_max(values: &[f64]) -> f64 {
    valid(values).fold(f64::NAN, f64::max)
}

fn reduce_sum(values: &[f64]) -> f64 {
    valid(values).sum()
}

fn reduce_mean(values: &[f64]) -> f64 {
    let (sum, count) = valid(values).fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 { f64::NAN } else { sum / count as f64 }
}

/// Population variance
fn reduce_var(values: &[f64]) -> f64 {
    let mean = reduce_mean(values);
    if mean.is_nan() {
        return f64::NAN;
    }
    let (sq, count) = valid(values).fold((0.0, 0usize), |(s, n), v| (s + (v - mean).powi(2), n + 1));
    sq / count as f64
}

/// Middle element of the sorted valid samples (upper middle for even counts)
fn reduce_median(values: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = valid(values).collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(f64::total_cmp);
    sorted[sorted.len() / 2]
}

/// Most frequent valid value; ties go to the smallest value
fn reduce_majority(values: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = valid(values).collect();
    sorted.sort_by(f64::total_cmp);

    let mut best = f64::NAN;
    let mut best_count = 0;
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i;
        while j < sorted.len() && sorted[j] == sorted[i] {
            j += 1;
        }
        if j - i > best_count {
            best_count = j - i;
            best = sorted[i];
        }
        i = j;
    }
    best
}

fn select_bands(vector: &Value, indices: &Value) -> Result<Value> {
    let source = vector
        .as_row()
        .ok_or_else(|| EvalError::dimensionality("bands", "a row vector", vector.shape()))?;
    let picks = indices
        .as_row()
        .ok_or_else(|| EvalError::dimensionality("bands", "a row of band indices", indices.shape()))?;

    let selected = picks
        .iter()
        .map(|&index| {
            let i = index.round();
            if i >= 1.0 && i <= source.len() as f64 {
                Ok(source[i as usize - 1])
            } else {
                Err(EvalError::IndexOutOfRange {
                    operation: "bands",
                    index,
                    len: source.len(),
                })
            }
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::Matrix(Matrix::row(selected)))
}

fn concatenate(args: &[Value]) -> Result<Value> {
    let mut out = Vec::new();
    for arg in args {
        let row = arg
            .as_row()
            .ok_or_else(|| EvalError::dimensionality("cat", "scalars or row vectors", arg.shape()))?;
        out.extend_from_slice(row);
    }
    Ok(Value::Matrix(Matrix::row(out)))
}

/// Pearson correlation over sample pairs where both values are valid
fn correlation(a: &Value, b: &Value) -> Result<Value> {
    if a.shape() != b.shape() {
        return Err(EvalError::ShapeMismatch {
            operation: "corr",
            left: a.shape(),
            right: b.shape(),
        });
    }
    let pairs: Vec<(f64, f64)> = a
        .values()
        .iter()
        .zip(b.values())
        .filter(|(x, y)| !x.is_nan() && !y.is_nan())
        .map(|(&x, &y)| (x, y))
        .collect();
    if pairs.is_empty() {
        return Ok(Value::Scalar(f64::NAN));
    }

    let n = pairs.len() as f64;
    let mean_a = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_b = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        cov += (x - mean_a) * (y - mean_b);
        var_a += (x - mean_a).powi(2);
        var_b += (y - mean_b).powi(2);
    }
    Ok(Value::Scalar(safe_div(cov, (var_a * var_b).sqrt())))
}

/// Weighted sum of each neighborhood with `kernel`, one result per neighborhood.
///
/// Invalid (NaN) samples propagate.
fn convolve(kernel: &Value, neighborhoods: &[Value]) -> Result<Value> {
    let weights = kernel.values();
    let mut out = Vec::with_capacity(neighborhoods.len());
    for n in neighborhoods {
        if n.values().len() != weights.len() {
            return Err(EvalError::dimensionality(
                "conv",
                format!("{} elements to match the {} kernel", weights.len(), kernel.shape()),
                format!("{} ({} elements)", n.shape(), n.values().len()),
            ));
        }
        out.push(weights.iter().zip(n.values()).map(|(w, v)| w * v).sum());
    }
    Ok(Value::Matrix(Matrix::row(out)))
}
