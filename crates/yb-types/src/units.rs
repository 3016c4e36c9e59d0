//! Length units. Everything is stored in metres, the solver's native unit.

/// One micrometre in metres.
pub const UM: f64 = 1e-6;

/// One nanometre in metres.
pub const NM: f64 = 1e-9;

/// One femtosecond in seconds.
pub const FS: f64 = 1e-15;

/// Convert metres to micrometres (for display).
pub fn to_um(metres: f64) -> f64 {
    metres / UM
}

/// Evenly spaced values over `[start, stop]`, both ends included.
pub fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (count - 1) as f64;
            (0..count)
                .map(|i| if i == count - 1 { stop } else { start + step * i as f64 })
                .collect()
        }
    }
}
