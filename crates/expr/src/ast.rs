//! Expression tree, generic over how variables are referenced.
//!
//! A freshly parsed tree names its variables (`Expr<String>`); binding
//! replaces every name with a slot index (`Expr<usize>`) so evaluation
//! never looks names up.

use crate::functions::Function;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    /// `*`: scalar product, broadcast, or matrix product
    Mul,
    /// `/`: divisor must be a scalar
    Div,
    /// `div`
    ElemDiv,
    /// `dv`
    ScalarDiv,
    /// `mult`
    ElemMul,
    /// `mlt`
    ScalarMul,
    /// `^`
    Pow,
    /// `pow`
    ElemPow,
    /// `pw`
    ScalarPow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    /// Operator as written in an expression
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::ElemDiv => "div",
            BinaryOp::ScalarDiv => "dv",
            BinaryOp::ElemMul => "mult",
            BinaryOp::ScalarMul => "mlt",
            BinaryOp::Pow => "^",
            BinaryOp::ElemPow => "pow",
            BinaryOp::ScalarPow => "pw",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr<V> {
    Number(f64),
    Variable(V),
    Unary {
        op: UnaryOp,
        operand: Box<Expr<V>>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr<V>>,
        rhs: Box<Expr<V>>,
    },
    Conditional {
        condition: Box<Expr<V>>,
        then: Box<Expr<V>>,
        otherwise: Box<Expr<V>>,
    },
    Call {
        function: Function,
        args: Vec<Expr<V>>,
    },
    /// `{a, b; c, d}`, rows of equal length
    Matrix { rows: Vec<Vec<Expr<V>>> },
}

impl<V> Expr<V> {
    /// Call `f` on every variable reference, depth first, left to right
    pub fn visit_variables(&self, f: &mut impl FnMut(&V)) {
        match self {
            Expr::Number(_) => {}
            Expr::Variable(v) => f(v),
            Expr::Unary { operand, .. } => operand.visit_variables(f),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.visit_variables(f);
                rhs.visit_variables(f);
            }
            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => {
                condition.visit_variables(f);
                then.visit_variables(f);
                otherwise.visit_variables(f);
            }
            Expr::Call { args, .. } => args.iter().for_each(|a| a.visit_variables(f)),
            Expr::Matrix { rows } => rows.iter().flatten().for_each(|e| e.visit_variables(f)),
        }
    }

    /// Rebuild the tree with every variable reference mapped through `f`
    pub fn try_map_variables<W, E>(
        &self,
        f: &mut impl FnMut(&V) -> Result<W, E>,
    ) -> Result<Expr<W>, E> {
        Ok(match self {
            Expr::Number(n) => Expr::Number(*n),
            Expr::Variable(v) => Expr::Variable(f(v)?),
            Expr::Unary { op, operand } => Expr::Unary {
                op: *op,
                operand: Box::new(operand.try_map_variables(f)?),
            },
            Expr::Binary { op, lhs, rhs } => Expr::Binary {
                op: *op,
                lhs: Box::new(lhs.try_map_variables(f)?),
                rhs: Box::new(rhs.try_map_variables(f)?),
            },
            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => Expr::Conditional {
                condition: Box::new(condition.try_map_variables(f)?),
                then: Box::new(then.try_map_variables(f)?),
                otherwise: Box::new(otherwise.try_map_variables(f)?),
            },
            Expr::Call { function, args } => Expr::Call {
                function: *function,
                args: args
                    .iter()
                    .map(|a| a.try_map_variables(f))
                    .collect::<Result<_, _>>()?,
            },
            Expr::Matrix { rows } => Expr::Matrix {
                rows: rows
                    .iter()
                    .map(|row| row.iter().map(|e| e.try_map_variables(f)).collect())
                    .collect::<Result<_, _>>()?,
            },
        })
    }
}
