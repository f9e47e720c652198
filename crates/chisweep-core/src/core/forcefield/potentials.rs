/// The Coulomb constant 1/(4πε₀) in kcal·Å/(mol·e²), the standard unit
/// system of molecular mechanics force fields.
pub const COULOMB_CONSTANT: f64 = 332.0637;

/// Calculates the hard-sphere contact energy between two atoms.
///
/// The pair is either in clash or it is not: any center-to-center
/// distance below the contact radius σ returns positive infinity, and
/// everything else returns zero. The sentinel propagates through
/// summation (∞ + finite = ∞) and ranks as the worst possible energy.
///
/// # Arguments
///
/// * `dist_sq` - Squared distance between the two atoms.
/// * `sigma` - Contact radius, the sum of the two van-der-Waals radii.
///
/// # Return
///
/// Returns `f64::INFINITY` on overlap, `0.0` otherwise.
#[inline]
pub fn hard_sphere(dist_sq: f64, sigma: f64) -> f64 {
    if dist_sq < sigma * sigma {
        f64::INFINITY
    } else {
        0.0
    }
}

/// Calculates the finite soft-sphere repulsion between two atoms.
///
/// Inside the contact radius the energy rises as `ε·(σ/r)ⁿ`; outside it
/// the pair does not interact. The exponent defaults to 12 to match the
/// repulsive wall of the Lennard-Jones potential.
///
/// # Arguments
///
/// * `dist` - The distance between the two atoms.
/// * `sigma` - Contact radius, the sum of the two van-der-Waals radii.
/// * `epsilon` - Repulsion strength scale.
/// * `exponent` - Repulsion steepness n.
///
/// # Return
///
/// Returns the repulsion energy, zero beyond σ.
#[inline]
pub fn soft_sphere(dist: f64, sigma: f64, epsilon: f64, exponent: f64) -> f64 {
    if dist > sigma {
        return 0.0;
    }
    if dist < 1e-6 {
        return f64::INFINITY;
    }
    epsilon * (sigma / dist).powf(exponent)
}

/// Calculates the classical 12-6 Lennard-Jones energy between two atoms.
///
/// σ is the zero-crossing distance: the energy vanishes exactly at
/// `r = σ`, reaches its minimum −ε at `r = 2^(1/6)·σ`, and rises as
/// r⁻¹² inside the core.
///
/// # Arguments
///
/// * `dist` - The distance between the two atoms.
/// * `sigma` - The zero-crossing distance.
/// * `epsilon` - The depth of the potential well.
///
/// # Return
///
/// Returns the potential energy. Positive values indicate repulsion.
#[inline]
pub fn lennard_jones(dist: f64, sigma: f64, epsilon: f64) -> f64 {
    if dist < 1e-6 {
        return f64::INFINITY;
    }
    let rho = sigma / dist;
    let rho6 = rho.powi(6);
    let rho12 = rho6 * rho6;
    4.0 * epsilon * (rho12 - rho6)
}

/// Calculates the screened Coulomb energy between two charged atoms.
///
/// The interaction decays with the squared distance, a distance-dependent
/// dielectric treatment.
///
/// # Arguments
///
/// * `dist_sq` - Squared distance between the two atoms.
/// * `q1` - The charge of the first atom.
/// * `q2` - The charge of the second atom.
/// * `dielectric` - The dielectric constant of the medium.
///
/// # Return
///
/// Returns the electrostatic energy; the sign follows the charges.
#[inline]
pub fn coulomb(dist_sq: f64, q1: f64, q2: f64, dielectric: f64) -> f64 {
    if dist_sq < 1e-12 {
        return q1.signum() * q2.signum() * f64::INFINITY;
    }
    COULOMB_CONSTANT * q1 * q2 / (dielectric * dist_sq)
}

/// Calculates one donor-hydrogen contribution of the 12-10 hydrogen-bond
/// potential.
///
/// The radial part `5·(r_DH/r)¹² − 6·(r_DH/r)¹⁰` is scaled by the cosine
/// of the acceptor–hydrogen–donor angle; the contribution is gated to
/// donor-antiparallel geometries (`cos θ ≤ 0`), so a straight hydrogen
/// bond (θ = 180°) is maximally attractive.
///
/// # Arguments
///
/// * `dist_da` - Donor–acceptor distance.
/// * `r_dh` - Donor–hydrogen covalent bond length.
/// * `epsilon` - The hydrogen-bond well depth ε_H.
/// * `cos_theta` - Cosine of the acceptor–hydrogen–donor angle.
///
/// # Return
///
/// Returns the contribution of this hydrogen, zero outside the angular
/// window.
#[inline]
pub fn hbond_12_10(dist_da: f64, r_dh: f64, epsilon: f64, cos_theta: f64) -> f64 {
    if cos_theta > 0.0 {
        return 0.0;
    }
    if dist_da < 1e-6 {
        return f64::INFINITY;
    }
    let rho = r_dh / dist_da;
    let rho10 = rho.powi(10);
    let rho12 = rho10 * rho * rho;
    epsilon * (5.0 * rho12 - 6.0 * rho10) * cos_theta
}

/// Calculates the classical threefold torsion energy.
///
/// # Arguments
///
/// * `omega` - The torsion angle of the 1-4 chain.
/// * `k` - The torsion weight k_T.
/// * `epsilon` - The barrier height ε_T.
///
/// # Return
///
/// Returns `k·(ε/2)·(1 + cos(3ω))`.
#[inline]
pub fn torsion_classical(omega: f64, k: f64, epsilon: f64) -> f64 {
    k * (epsilon / 2.0) * (1.0 + (3.0 * omega).cos())
}

/// Calculates the windowed torsion energy of the tabulated mode.
///
/// The same periodic form as the classical mode, restricted to the
/// window `ω ∈ [−π/phase, π/phase]`; outside it the chain contributes
/// nothing. The phase is fixed at 3 regardless of hybridization.
///
/// # Arguments
///
/// * `omega` - The torsion angle of the 1-4 chain.
/// * `k` - The torsion weight k_T.
/// * `epsilon` - The tabulated barrier height for the 1-4 name pair.
/// * `phase` - The window divisor (and periodicity).
///
/// # Return
///
/// Returns the windowed torsion energy.
#[inline]
pub fn torsion_windowed(omega: f64, k: f64, epsilon: f64, phase: f64) -> f64 {
    let window = std::f64::consts::PI / phase;
    if omega < -window || omega > window {
        return 0.0;
    }
    k * (epsilon / 2.0) * (1.0 + (phase * omega).cos())
}

/// Calculates the cosine blending factor of the composite potential.
///
/// Below `start·σ` the factor is one (the sum is used unblended); above
/// `end·σ` it is zero; in between it follows a quarter-cosine, which
/// keeps the blended energy C⁰-continuous at both boundaries.
///
/// # Arguments
///
/// * `dist` - The distance between the two atoms.
/// * `sigma` - Contact radius, the sum of the two van-der-Waals radii.
/// * `start` - Taper onset as a multiple of σ.
/// * `end` - Taper end as a multiple of σ.
///
/// # Return
///
/// Returns the blending factor in [0, 1].
#[inline]
pub fn taper_factor(dist: f64, sigma: f64, start: f64, end: f64) -> f64 {
    let onset = start * sigma;
    let finish = end * sigma;
    if dist <= onset {
        return 1.0;
    }
    if dist >= finish {
        return 0.0;
    }
    (std::f64::consts::PI * (dist - onset) / (2.0 * (end - start) * sigma)).cos()
}
