//! Specific orbital energy of a nearly parabolic orbit.
//!
//! `E = v²/2 - μ/r` is the difference of two large, nearly equal terms.
//! Run with `RUST_LOG=orrery_eval=debug` to watch folds and upgrades.

use orrery::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Standard gravitational parameter of the Sun, m³/s².
const MU: f64 = 1.327_124_400_18e20;

fn energy(v: Expr, r: Expr, mu: Expr) -> Expr {
    let kinetic = Expr::quotient(v.clone() * v, Expr::int(2));
    let potential = Expr::quotient(mu, r);
    kinetic - potential
}

fn main() -> Result<(), ArithError> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let r = 1.496e11;
    let escape = (2.0 * MU / r).sqrt();
    let v = escape * (1.0 + 1.0e-12);

    let naive = v * v / 2.0 - MU / r;
    println!("naive f64:     {naive:e}");

    let mut cx = EvalContext::new();
    let mut e = energy(Expr::f64(v)?, Expr::f64(r)?, Expr::f64(MU)?);
    let progress = e.canonicalize(&mut cx)?;
    println!("orrery f64:    {e}  ({} steps)", progress.steps);

    let mut bounded = energy(
        Expr::interval_f64(v, v)?,
        Expr::interval_f64(r, r)?,
        Expr::interval_f64(MU, MU)?,
    );
    bounded.canonicalize(&mut cx)?;
    println!("orrery bounds: {bounded}");

    println!("stats: {:?}", cx.stats);
    Ok(())
}
