use super::expr::Expr;
use nalgebra::{Matrix4, Point3};
use std::collections::BTreeSet;

/// A 4×4 homogeneous transform whose entries are symbolic expressions.
///
/// Composition is plain matrix multiplication over [`Expr`]; because the
/// smart constructors fold constants, chains of numeric transforms
/// collapse and only the entries that genuinely depend on an angle
/// variable stay symbolic.
#[derive(Debug, Clone, PartialEq)]
pub struct SymMatrix4 {
    entries: [[Expr; 4]; 4],
}

impl SymMatrix4 {
    pub fn identity() -> Self {
        let mut entries = std::array::from_fn(|_| std::array::from_fn(|_| Expr::ZERO));
        for (i, row) in entries.iter_mut().enumerate() {
            row[i] = Expr::ONE;
        }
        Self { entries }
    }

    /// Lifts a numeric transform into the symbolic domain.
    pub fn from_numeric(m: &Matrix4<f64>) -> Self {
        let entries =
            std::array::from_fn(|r| std::array::from_fn(|c| Expr::constant(m[(r, c)])));
        Self { entries }
    }

    /// The canonical bond-axis rotation `R_z(χ)` with a symbolic angle.
    pub fn rotation_z_var(var: usize) -> Self {
        let mut m = Self::identity();
        let cos = Expr::cos(Expr::var(var));
        let sin = Expr::sin(Expr::var(var));
        m.entries[0][0] = cos.clone();
        m.entries[0][1] = Expr::neg(sin.clone());
        m.entries[1][0] = sin;
        m.entries[1][1] = cos;
        m
    }

    /// Bond-angle rotation about the local x-axis with a symbolic angle.
    pub fn rotation_x_var(var: usize) -> Self {
        let mut m = Self::identity();
        let cos = Expr::cos(Expr::var(var));
        let sin = Expr::sin(Expr::var(var));
        m.entries[1][1] = cos.clone();
        m.entries[1][2] = Expr::neg(sin.clone());
        m.entries[2][1] = sin;
        m.entries[2][2] = cos;
        m
    }

    /// Bond-angle rotation about the local y-axis with a symbolic angle.
    pub fn rotation_y_var(var: usize) -> Self {
        let mut m = Self::identity();
        let cos = Expr::cos(Expr::var(var));
        let sin = Expr::sin(Expr::var(var));
        m.entries[0][0] = cos.clone();
        m.entries[0][2] = sin.clone();
        m.entries[2][0] = Expr::neg(sin);
        m.entries[2][2] = cos;
        m
    }

    /// Bond-length stretch along the local z-axis with a symbolic length.
    pub fn translation_z_var(var: usize) -> Self {
        let mut m = Self::identity();
        m.entries[2][3] = Expr::var(var);
        m
    }

    /// Symbolic matrix product `self · rhs`.
    pub fn mul(&self, rhs: &Self) -> Self {
        let entries = std::array::from_fn(|r| {
            std::array::from_fn(|c| {
                (0..4).fold(Expr::ZERO, |acc, k| {
                    Expr::add(
                        acc,
                        Expr::mul(self.entries[r][k].clone(), rhs.entries[k][c].clone()),
                    )
                })
            })
        });
        Self { entries }
    }

    /// Substitutes numeric angle values and collapses to a numeric matrix.
    pub fn eval(&self, vars: &[f64]) -> Matrix4<f64> {
        Matrix4::from_fn(|r, c| self.entries[r][c].eval(vars))
    }

    /// Evaluates the transform and applies it to a point.
    pub fn eval_point(&self, vars: &[f64], p: &Point3<f64>) -> Point3<f64> {
        self.eval(vars).transform_point(p)
    }

    /// Variable indices appearing anywhere in the matrix.
    pub fn vars(&self) -> BTreeSet<usize> {
        let mut out = BTreeSet::new();
        for row in &self.entries {
            for entry in row {
                entry.collect_vars(&mut out);
            }
        }
        out
    }

    pub fn entry(&self, row: usize, col: usize) -> &Expr {
        &self.entries[row][col]
    }
}
