use std::collections::BTreeSet;
use std::fmt;

/// A small symbolic expression over a fixed set of angle variables.
///
/// Variables are indices into the sweep's χ list; evaluation substitutes
/// numeric values and collapses the tree in a single pass. The smart
/// constructors fold constants on the way in, so purely numeric
/// sub-products never survive as trees.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(f64),
    Var(usize),
    Sum(Box<Expr>, Box<Expr>),
    Product(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Sin(Box<Expr>),
    Cos(Box<Expr>),
}

impl Expr {
    pub const ZERO: Expr = Expr::Const(0.0);
    pub const ONE: Expr = Expr::Const(1.0);

    pub fn constant(value: f64) -> Self {
        Expr::Const(value)
    }

    pub fn var(index: usize) -> Self {
        Expr::Var(index)
    }

    fn as_const(&self) -> Option<f64> {
        match self {
            Expr::Const(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Expr::Const(v) if *v == 0.0)
    }

    pub fn is_one(&self) -> bool {
        matches!(self, Expr::Const(v) if *v == 1.0)
    }

    pub fn add(lhs: Expr, rhs: Expr) -> Self {
        if let (Some(a), Some(b)) = (lhs.as_const(), rhs.as_const()) {
            return Expr::Const(a + b);
        }
        if lhs.is_zero() {
            return rhs;
        }
        if rhs.is_zero() {
            return lhs;
        }
        Expr::Sum(Box::new(lhs), Box::new(rhs))
    }

    pub fn mul(lhs: Expr, rhs: Expr) -> Self {
        if let (Some(a), Some(b)) = (lhs.as_const(), rhs.as_const()) {
            return Expr::Const(a * b);
        }
        if lhs.is_zero() || rhs.is_zero() {
            return Expr::ZERO;
        }
        if lhs.is_one() {
            return rhs;
        }
        if rhs.is_one() {
            return lhs;
        }
        Expr::Product(Box::new(lhs), Box::new(rhs))
    }

    pub fn neg(inner: Expr) -> Self {
        match inner {
            Expr::Const(v) => Expr::Const(-v),
            Expr::Neg(e) => *e,
            other => Expr::Neg(Box::new(other)),
        }
    }

    pub fn sin(inner: Expr) -> Self {
        match inner.as_const() {
            Some(v) => Expr::Const(v.sin()),
            None => Expr::Sin(Box::new(inner)),
        }
    }

    pub fn cos(inner: Expr) -> Self {
        match inner.as_const() {
            Some(v) => Expr::Const(v.cos()),
            None => Expr::Cos(Box::new(inner)),
        }
    }

    /// Substitutes `vars[i]` for every `Var(i)` and collapses the tree.
    /// Unbound variables evaluate as zero.
    pub fn eval(&self, vars: &[f64]) -> f64 {
        match self {
            Expr::Const(v) => *v,
            Expr::Var(i) => vars.get(*i).copied().unwrap_or(0.0),
            Expr::Sum(a, b) => a.eval(vars) + b.eval(vars),
            Expr::Product(a, b) => a.eval(vars) * b.eval(vars),
            Expr::Neg(e) => -e.eval(vars),
            Expr::Sin(e) => e.eval(vars).sin(),
            Expr::Cos(e) => e.eval(vars).cos(),
        }
    }

    /// Collects the variable indices referenced by this expression.
    pub fn collect_vars(&self, out: &mut BTreeSet<usize>) {
        match self {
            Expr::Const(_) => {}
            Expr::Var(i) => {
                out.insert(*i);
            }
            Expr::Sum(a, b) | Expr::Product(a, b) => {
                a.collect_vars(out);
                b.collect_vars(out);
            }
            Expr::Neg(e) | Expr::Sin(e) | Expr::Cos(e) => e.collect_vars(out),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(v) => write!(f, "{v}"),
            Expr::Var(i) => write!(f, "chi{i}"),
            Expr::Sum(a, b) => write!(f, "({a} + {b})"),
            Expr::Product(a, b) => write!(f, "({a} * {b})"),
            Expr::Neg(e) => write!(f, "-{e}"),
            Expr::Sin(e) => write!(f, "sin({e})"),
            Expr::Cos(e) => write!(f, "cos({e})"),
        }
    }
}
