//! Standard-normal primitives backing the truncated proposal kernel:
//! log-density, CDF, quantile, and inverse-CDF sampling on an interval.
//! Compact approximations adapted from *Numerical Recipes* (erfc) and
//! Acklam's inverse-normal algorithm (see doc comments for accuracy).

use rand::Rng;
use rand_distr::StandardNormal;

/// ln sqrt(2 pi), the normalizing constant of the standard normal.
const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_7;

/// Log-density of the standard normal at `z`.
pub(crate) fn ln_phi(z: f64) -> f64 {
    -0.5 * z * z - LN_SQRT_2PI
}

/// CDF of the standard normal.
pub(crate) fn cdf(z: f64) -> f64 {
    0.5 * erfc(-z * std::f64::consts::FRAC_1_SQRT_2)
}

/// Complementary error function, fractional error below 1.2e-7 everywhere.
/// Chebyshev-fit approximation from *Numerical Recipes in C* (2nd ed., 6.2).
fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let ans = t
        * (-z * z - 1.265_512_23
            + t * (1.000_023_68
                + t * (0.374_091_96
                    + t * (0.096_784_18
                        + t * (-0.186_288_06
                            + t * (0.278_868_07
                                + t * (-1.135_203_98
                                    + t * (1.488_515_87
                                        + t * (-0.822_152_23 + t * 0.170_872_77)))))))))
        .exp();
    if x >= 0.0 {
        ans
    } else {
        2.0 - ans
    }
}

/// P(a <= Z <= b) for a standard normal, evaluated in whichever tail keeps
/// `erfc` well conditioned so far-tail intervals keep relative accuracy.
pub(crate) fn interval_mass(a: f64, b: f64) -> f64 {
    debug_assert!(a <= b);
    let s = std::f64::consts::FRAC_1_SQRT_2;
    if a > 0.0 {
        0.5 * (erfc(a * s) - erfc(b * s))
    } else {
        0.5 * (erfc(-b * s) - erfc(-a * s))
    }
}

/// Quantile (inverse CDF) of the standard normal.
///
/// Acklam's two-region rational approximation, relative error below 1.15e-9.
/// `p <= 0` maps to -inf and `p >= 1` to +inf.
pub(crate) fn quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.02425;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -((((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0))
    }
}

/// Draws Z ~ N(0,1) conditioned on `a <= Z <= b` by inverse-CDF sampling.
///
/// Unbounded intervals fall through to a plain standard-normal draw. Right
/// half-line intervals are mirrored into the left tail, where the CDF keeps
/// relative precision.
pub(crate) fn draw_truncated<R: Rng + ?Sized>(rng: &mut R, a: f64, b: f64) -> f64 {
    debug_assert!(a <= b);
    if a == f64::NEG_INFINITY && b == f64::INFINITY {
        return rng.sample(StandardNormal);
    }
    if a > 0.0 {
        return -draw_truncated_lower(rng, -b, -a);
    }
    draw_truncated_lower(rng, a, b)
}

fn draw_truncated_lower<R: Rng + ?Sized>(rng: &mut R, a: f64, b: f64) -> f64 {
    let fa = cdf(a);
    let fb = cdf(b);
    let u: f64 = rng.gen();
    // Extreme intervals can round the quantile just past an endpoint.
    quantile(fa + u * (fb - fa)).clamp(a, b)
}

#[test]
fn test_cdf_known_values() {
    assert!((cdf(0.0) - 0.5).abs() < 1e-12);
    assert!((cdf(1.0) - 0.841_344_746_068_542_9).abs() < 1e-7);
    assert!((cdf(1.96) - 0.975_002_104_851_779_5).abs() < 1e-7);
    assert!((cdf(-1.96) - 0.024_997_895_148_220_5).abs() < 1e-7);
    assert_eq!(cdf(f64::NEG_INFINITY), 0.0);
    assert_eq!(cdf(f64::INFINITY), 1.0);
}

#[test]
fn test_cdf_far_tail_relative_accuracy() {
    // Q(5) = 2.866515718791939e-7; the Chebyshev fit keeps relative error
    // through the tail, not just absolute error.
    let q5 = 1.0 - cdf(5.0);
    assert!(
        (q5 - 2.866_515_718_791_939e-7).abs() / 2.866_515_718_791_939e-7 < 1e-5,
        "Q(5) = {q5:e}"
    );
}

#[test]
fn test_quantile_known_values() {
    assert!((quantile(0.5)).abs() < 1e-12);
    assert!((quantile(0.975) - 1.959_963_984_540_054).abs() < 1e-7);
    assert!((quantile(0.025) + 1.959_963_984_540_054).abs() < 1e-7);
    assert_eq!(quantile(0.0), f64::NEG_INFINITY);
    assert_eq!(quantile(1.0), f64::INFINITY);
}

#[test]
fn test_quantile_inverts_cdf() {
    for &z in &[-3.0, -1.2, -0.3, 0.0, 0.7, 1.9, 3.5] {
        let back = quantile(cdf(z));
        assert!((back - z).abs() < 1e-6, "round trip {z} -> {back}");
    }
}

#[test]
fn test_interval_mass_central_and_tail() {
    // P(-1 <= Z <= 1) = 0.6826894921370859.
    assert!((interval_mass(-1.0, 1.0) - 0.682_689_492_137_085_9).abs() < 1e-7);
    // P(5 <= Z <= 6) = 2.8566498e-7, checked to relative accuracy.
    let tail = interval_mass(5.0, 6.0);
    assert!(
        (tail - 2.856_649_842_341_562e-7).abs() / 2.856_649_842_341_562e-7 < 1e-4,
        "tail mass = {tail:e}"
    );
    assert!((interval_mass(f64::NEG_INFINITY, f64::INFINITY) - 1.0).abs() < 1e-12);
}

#[test]
fn test_draw_truncated_respects_bounds() {
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    let mut rng = SmallRng::seed_from_u64(7);
    for _ in 0..10_000 {
        let z = draw_truncated(&mut rng, -0.5, 2.0);
        assert!((-0.5..=2.0).contains(&z), "draw {z} escaped [-0.5, 2]");
    }
}

#[test]
fn test_draw_truncated_half_line_mean() {
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    // E[Z | Z >= 0] = sqrt(2/pi) = 0.7978845608028654.
    let mut rng = SmallRng::seed_from_u64(42);
    let n = 200_000;
    let mean: f64 =
        (0..n).map(|_| draw_truncated(&mut rng, 0.0, f64::INFINITY)).sum::<f64>() / n as f64;
    assert!(
        (mean - 0.797_884_560_802_865_4).abs() < 5e-3,
        "mean = {mean}"
    );
}
