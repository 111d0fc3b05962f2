///
/// Math functions.
///
/// Arguments are coerced like SQLite's own numeric functions, so
/// `sqrt('16')` is 4.0. Results outside the real domain (sqrt(-1), log(0))
/// are returned as NULL rather than NaN or infinity.
///

use rusqlite::{Connection, Result};

use crate::{arg_real, deterministic};

const UNARY: &[(&str, fn(f64) -> f64)] = &[
    ("sqrt", f64::sqrt),
    ("log", f64::ln),
    ("log10", f64::log10),
    ("ceil", f64::ceil),
    ("floor", f64::floor),
    ("degrees", f64::to_degrees),
    ("radians", f64::to_radians),
    ("sin", f64::sin),
    ("cos", f64::cos),
    ("tan", f64::tan),
];

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

pub fn register(conn: &Connection) -> Result<()> {
    for &(name, f) in UNARY {
        conn.create_scalar_function(name, 1, deterministic(), move |ctx| {
            Ok(arg_real(ctx, 0).and_then(|x| finite(f(x))))
        })?;
    }

    // log(base, x)
    conn.create_scalar_function("log", 2, deterministic(), |ctx| {
        Ok(match (arg_real(ctx, 0), arg_real(ctx, 1)) {
            (Some(base), Some(x)) => finite(x.log(base)),
            _ => None,
        })
    })?;

    conn.create_scalar_function("power", 2, deterministic(), |ctx| {
        Ok(match (arg_real(ctx, 0), arg_real(ctx, 1)) {
            (Some(x), Some(y)) => finite(x.powf(y)),
            _ => None,
        })
    })?;

    conn.create_scalar_function("pi", 0, deterministic(), |_ctx| Ok(std::f64::consts::PI))?;
    Ok(())
}
