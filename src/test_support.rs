//! Deterministic series generators for unit tests

use crate::domain::PairSeries;

/// 64-bit LCG with Box-Muller normals, reproducible across platforms
pub struct Lcg {
    state: u64,
}

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Uniform in the open interval (0, 1)
    pub fn uniform(&mut self) -> f64 {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((self.state >> 11) as f64 + 0.5) / (1u64 << 53) as f64
    }

    /// Standard normal draw
    pub fn gaussian(&mut self) -> f64 {
        let u1 = self.uniform();
        let u2 = self.uniform();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }
}

/// x_t = phi·x_{t-1} + sigma·e_t, starting at 0
pub fn ar1_series(n: usize, phi: f64, sigma: f64, seed: u64) -> Vec<f64> {
    let mut rng = Lcg::new(seed);
    let mut x = 0.0;
    (0..n)
        .map(|_| {
            x = phi * x + sigma * rng.gaussian();
            x
        })
        .collect()
}

/// x_t = x_{t-1} + drift + sigma·e_t, starting at 0
pub fn drifting_walk(n: usize, drift: f64, sigma: f64, seed: u64) -> Vec<f64> {
    let mut rng = Lcg::new(seed);
    let mut x = 0.0;
    (0..n)
        .map(|_| {
            x += drift + sigma * rng.gaussian();
            x
        })
        .collect()
}

/// Price pair with ln(primary) = 0.5 + beta·ln(secondary) + AR(1) residual.
///
/// The secondary leg oscillates (amplitude 0.3 in log space, period ~94
/// bars) on top of a slow random walk, so any 100-bar window carries
/// enough variance to pin the hedge ratio.
pub fn cointegrated_prices(n: usize, beta: f64, phi: f64, sigma: f64, seed: u64) -> PairSeries {
    let residual = ar1_series(n, phi, sigma, seed);
    let walk = drifting_walk(n, 0.0, 0.002, seed.wrapping_add(7919));
    let mut primary = Vec::with_capacity(n);
    let mut secondary = Vec::with_capacity(n);
    for t in 0..n {
        let ls = 50f64.ln() + 0.3 * (t as f64 / 15.0).sin() + walk[t];
        let lp = 0.5 + beta * ls + residual[t];
        primary.push(lp.exp());
        secondary.push(ls.exp());
    }
    PairSeries::new(primary, secondary)
}

/// Secondary as in `cointegrated_prices`; primary drifts steadily away
/// from it, so the spread trends instead of reverting
pub fn diverging_prices(n: usize, seed: u64) -> PairSeries {
    let walk = drifting_walk(n, 0.0, 0.002, seed);
    let drift = drifting_walk(n, 0.01, 0.002, seed.wrapping_add(104729));
    let mut primary = Vec::with_capacity(n);
    let mut secondary = Vec::with_capacity(n);
    for t in 0..n {
        let ls = 50f64.ln() + 0.3 * (t as f64 / 15.0).sin() + walk[t];
        primary.push((ls + drift[t]).exp());
        secondary.push(ls.exp());
    }
    PairSeries::new(primary, secondary)
}

/// `cointegrated_prices(400, 1.2, 0.8, 0.01, seed)` with the last primary
/// close pushed `shock` in log space, a fresh divergence on a tradable pair
pub fn shocked_pair(shock: f64, seed: u64) -> PairSeries {
    let mut series = cointegrated_prices(400, 1.2, 0.8, 0.01, seed);
    if let Some(last) = series.primary.last_mut() {
        *last *= shock.exp();
    }
    series
}
