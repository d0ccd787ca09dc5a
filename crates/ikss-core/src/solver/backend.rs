use anyhow::{anyhow, Result};
use faer::{complex_native::c64, prelude::*, solvers::PartialPivLu, Mat};
use num_complex::Complex64;

/// Trait for factorizing dense complex systems (A·x = b) once and solving
/// them for many right-hand sides.
pub trait LinearSystemBackend: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Factorize a square matrix given row-major
    fn factorize(&self, matrix: &[Vec<Complex64>]) -> Result<Box<dyn FactoredSystem>>;

    /// Solve a single system without keeping the factorization
    fn solve(&self, matrix: &[Vec<Complex64>], rhs: &[Complex64]) -> Result<Vec<Complex64>> {
        self.factorize(matrix)?.solve(rhs)
    }
}

/// A factorized system ready for repeated solves.
pub trait FactoredSystem: Send + Sync {
    fn dim(&self) -> usize;

    fn solve(&self, rhs: &[Complex64]) -> Result<Vec<Complex64>>;

    /// Solve for the `col`-th column of the inverse
    fn solve_unit(&self, col: usize) -> Result<Vec<Complex64>> {
        let n = self.dim();
        if col >= n {
            return Err(anyhow!("column {} out of range for dimension {}", col, n));
        }
        let mut rhs = vec![Complex64::new(0.0, 0.0); n];
        rhs[col] = Complex64::new(1.0, 0.0);
        self.solve(&rhs)
    }
}

fn check_square(matrix: &[Vec<Complex64>]) -> Result<usize> {
    let n = matrix.len();
    if matrix.iter().any(|row| row.len() != n) {
        return Err(anyhow!("matrix must be square"));
    }
    Ok(n)
}

fn check_rhs(n: usize, rhs: &[Complex64]) -> Result<()> {
    if rhs.len() != n {
        return Err(anyhow!(
            "rhs length ({}) does not match matrix dimension {}",
            rhs.len(),
            n
        ));
    }
    Ok(())
}

fn check_finite(solution: Vec<Complex64>) -> Result<Vec<Complex64>> {
    if solution.iter().any(|v| !v.is_finite()) {
        return Err(anyhow!("singular matrix: solution is not finite"));
    }
    Ok(solution)
}

/// Pivot magnitudes below this are treated as singular
const PIVOT_TOLERANCE: f64 = 1e-14;

#[derive(Debug, Clone, Default)]
pub struct GaussSolver;

/// LU factors from Gaussian elimination with partial pivoting. `lu` holds
/// the unit-lower multipliers below the diagonal and U on and above it.
struct GaussFactors {
    lu: Vec<Vec<Complex64>>,
    perm: Vec<usize>,
}

impl LinearSystemBackend for GaussSolver {
    fn name(&self) -> &'static str {
        "gauss"
    }

    fn factorize(&self, matrix: &[Vec<Complex64>]) -> Result<Box<dyn FactoredSystem>> {
        let n = check_square(matrix)?;
        let mut a = matrix.to_vec();
        let mut perm: Vec<usize> = (0..n).collect();

        for i in 0..n {
            let mut pivot = i;
            for row in i + 1..n {
                if a[row][i].norm() > a[pivot][i].norm() {
                    pivot = row;
                }
            }
            if pivot != i {
                a.swap(i, pivot);
                perm.swap(i, pivot);
            }

            let diag = a[i][i];
            if diag.norm() < PIVOT_TOLERANCE {
                return Err(anyhow!("singular matrix (pivot {} vanished)", i));
            }

            let pivot_segment = a[i][i + 1..].to_vec();
            for row in a.iter_mut().skip(i + 1) {
                let factor = row[i] / diag;
                row[i] = factor;
                for (target, &p) in row[i + 1..].iter_mut().zip(pivot_segment.iter()) {
                    *target -= factor * p;
                }
            }
        }

        Ok(Box::new(GaussFactors { lu: a, perm }))
    }
}

impl FactoredSystem for GaussFactors {
    fn dim(&self) -> usize {
        self.lu.len()
    }

    fn solve(&self, rhs: &[Complex64]) -> Result<Vec<Complex64>> {
        let n = self.dim();
        check_rhs(n, rhs)?;

        // forward substitution on the permuted rhs
        let mut y: Vec<Complex64> = self.perm.iter().map(|&p| rhs[p]).collect();
        for i in 0..n {
            let mut acc = y[i];
            for j in 0..i {
                acc -= self.lu[i][j] * y[j];
            }
            y[i] = acc;
        }

        for i in (0..n).rev() {
            let mut acc = y[i];
            for j in i + 1..n {
                acc -= self.lu[i][j] * y[j];
            }
            y[i] = acc / self.lu[i][i];
        }

        check_finite(y)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FaerSolver;

struct FaerFactors {
    lu: PartialPivLu<c64>,
    dim: usize,
}

fn to_c64(z: Complex64) -> c64 {
    c64 { re: z.re, im: z.im }
}

impl LinearSystemBackend for FaerSolver {
    fn name(&self) -> &'static str {
        "faer"
    }

    fn factorize(&self, matrix: &[Vec<Complex64>]) -> Result<Box<dyn FactoredSystem>> {
        let n = check_square(matrix)?;
        let mut mat = Mat::<c64>::zeros(n, n);
        for (i, row) in matrix.iter().enumerate() {
            for (j, &value) in row.iter().enumerate() {
                mat.write(i, j, to_c64(value));
            }
        }
        let lu = mat.partial_piv_lu();
        Ok(Box::new(FaerFactors { lu, dim: n }))
    }
}

impl FactoredSystem for FaerFactors {
    fn dim(&self) -> usize {
        self.dim
    }

    fn solve(&self, rhs: &[Complex64]) -> Result<Vec<Complex64>> {
        let n = self.dim;
        check_rhs(n, rhs)?;
        if n == 0 {
            return Ok(Vec::new());
        }

        let rhs_mat = Mat::<c64>::from_fn(n, 1, |i, _| to_c64(rhs[i]));
        let sol = self.lu.solve(&rhs_mat);
        let solution = (0..n)
            .map(|i| {
                let v = sol.read(i, 0);
                Complex64::new(v.re, v.im)
            })
            .collect();

        check_finite(solution)
    }
}
