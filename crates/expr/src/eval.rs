//! Tree-walking evaluation of bound programs

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::{EvalError, Result};
use crate::functions::safe_div;
use crate::value::{Matrix, Value};

/// How conditionals are evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Evaluate only the selected branch
    Normal,
    /// Evaluate both branches and require them to have the same shape
    Probe,
}

/// An expression whose variables are bound to slot indices.
///
/// A program is immutable; evaluating it reads slot values supplied by the
/// caller, so one program can be cloned into any number of workers.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    root: Expr<usize>,
    slots: Vec<usize>,
}

impl Program {
    pub(crate) fn new(root: Expr<usize>) -> Self {
        let mut slots = Vec::new();
        root.visit_variables(&mut |s: &usize| {
            if !slots.contains(s) {
                slots.push(*s);
            }
        });
        Self { root, slots }
    }

    /// Slots the program reads, in order of first appearance
    pub fn slots(&self) -> &[usize] {
        &self.slots
    }

    pub fn tree(&self) -> &Expr<usize> {
        &self.root
    }

    /// Evaluate against the current slot values
    pub fn evaluate(&self, slots: &[Value]) -> Result<Value> {
        eval(&self.root, slots, Mode::Normal)
    }

    /// Evaluate against placeholder slot values to discover the result shape
    pub fn probe(&self, slots: &[Value]) -> Result<Value> {
        eval(&self.root, slots, Mode::Probe)
    }
}

fn truthy(v: f64) -> bool {
    v != 0.0 && !v.is_nan()
}

fn flag(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

fn eval(node: &Expr<usize>, slots: &[Value], mode: Mode) -> Result<Value> {
    match node {
        Expr::Number(n) => Ok(Value::Scalar(*n)),
        Expr::Variable(slot) => slots
            .get(*slot)
            .cloned()
            .ok_or(EvalError::UnboundSlot(*slot)),
        Expr::Unary { op, operand } => {
            let v = eval(operand, slots, mode)?;
            Ok(match op {
                UnaryOp::Neg => v.map(|x| -x),
                UnaryOp::Not => v.map(|x| flag(!truthy(x))),
            })
        }
        Expr::Binary { op, lhs, rhs } => {
            let a = eval(lhs, slots, mode)?;
            let b = eval(rhs, slots, mode)?;
            binary(*op, &a, &b)
        }
        Expr::Conditional {
            condition,
            then,
            otherwise,
        } => {
            let c = eval(condition, slots, mode)?.expect_scalar("?:")?;
            match mode {
                Mode::Normal => {
                    if truthy(c) {
                        eval(then, slots, mode)
                    } else {
                        eval(otherwise, slots, mode)
                    }
                }
                Mode::Probe => {
                    let t = eval(then, slots, mode)?;
                    let o = eval(otherwise, slots, mode)?;
                    if t.shape() != o.shape() || t.is_scalar() != o.is_scalar() {
                        return Err(EvalError::ShapeMismatch {
                            operation: "?:",
                            left: t.shape(),
                            right: o.shape(),
                        });
                    }
                    Ok(t)
                }
            }
        }
        Expr::Call { function, args } => {
            let values = args
                .iter()
                .map(|a| eval(a, slots, mode))
                .collect::<Result<Vec<_>>>()?;
            function.apply(&values)
        }
        Expr::Matrix { rows } => {
            let cols = rows.first().map_or(0, Vec::len);
            let mut data = Vec::with_capacity(rows.len() * cols);
            for element in rows.iter().flatten() {
                let v = eval(element, slots, mode)?;
                data.push(v.expect_scalar("{}")?);
            }
            Ok(Value::Matrix(Matrix::new(rows.len(), cols, data)?))
        }
    }
}

fn binary(op: BinaryOp, a: &Value, b: &Value) -> Result<Value> {
    let symbol = op.symbol();
    match op {
        BinaryOp::Add => a.zip_with(b, symbol, |x, y| x + y),
        BinaryOp::Sub => a.zip_with(b, symbol, |x, y| x - y),
        BinaryOp::Mul => match (a, b) {
            (Value::Matrix(l), Value::Matrix(r)) => Ok(Value::Matrix(l.matmul(r)?)),
            _ => a.zip_with(b, symbol, |x, y| x * y),
        },
        BinaryOp::Div | BinaryOp::ScalarDiv => {
            let d = b.expect_scalar(symbol)?;
            Ok(a.map(|x| safe_div(x, d)))
        }
        BinaryOp::ElemDiv => a.zip_with(b, symbol, safe_div),
        BinaryOp::ElemMul => a.zip_with(b, symbol, |x, y| x * y),
        BinaryOp::ScalarMul => {
            let k = b.expect_scalar(symbol)?;
            Ok(a.map(|x| x * k))
        }
        BinaryOp::Pow | BinaryOp::ElemPow => a.zip_with(b, symbol, f64::powf),
        BinaryOp::ScalarPow => {
            let p = b.expect_scalar(symbol)?;
            Ok(a.map(|x| x.powf(p)))
        }
        BinaryOp::Eq => a.zip_with(b, symbol, |x, y| flag(x == y)),
        BinaryOp::Ne => a.zip_with(b, symbol, |x, y| flag(x != y)),
        BinaryOp::Lt => a.zip_with(b, symbol, |x, y| flag(x < y)),
        BinaryOp::Le => a.zip_with(b, symbol, |x, y| flag(x <= y)),
        BinaryOp::Gt => a.zip_with(b, symbol, |x, y| flag(x > y)),
        BinaryOp::Ge => a.zip_with(b, symbol, |x, y| flag(x >= y)),
        BinaryOp::And => a.zip_with(b, symbol, |x, y| flag(truthy(x) && truthy(y))),
        BinaryOp::Or => a.zip_with(b, symbol, |x, y| flag(truthy(x) || truthy(y))),
    }
}
