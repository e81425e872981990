// Vector operations - small dense f64 helpers shared by the feature pipeline
// and the network
//
// Binary operations work over the shorter of the two operands.

/// Dot product of `a` and `b`
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// `a * scalar` as a new vector
pub fn scaled(a: &[f64], scalar: f64) -> Vec<f64> {
    a.iter().map(|x| x * scalar).collect()
}

/// Multiply `a` by `scalar` in place
pub fn scale(a: &mut [f64], scalar: f64) {
    for x in a {
        *x *= scalar;
    }
}

/// `a + b` as a new vector
pub fn add(a: &[f64], b: &[f64]) -> Vec<f64> {
    combine(a, b, |x, y| x + y)
}

/// `a - b` as a new vector
pub fn sub(a: &[f64], b: &[f64]) -> Vec<f64> {
    combine(a, b, |x, y| x - y)
}

/// `a += b`
pub fn add_to(a: &mut [f64], b: &[f64]) {
    for (x, y) in a.iter_mut().zip(b) {
        *x += y;
    }
}

/// `a += b * scalar`
pub fn add_scaled_to(a: &mut [f64], b: &[f64], scalar: f64) {
    for (x, y) in a.iter_mut().zip(b) {
        *x += y * scalar;
    }
}

/// `a -= b`
pub fn sub_from(a: &mut [f64], b: &[f64]) {
    for (x, y) in a.iter_mut().zip(b) {
        *x -= y;
    }
}

/// Elementwise `op(a[i], b[i])`
pub fn combine<F>(a: &[f64], b: &[f64], op: F) -> Vec<f64>
where
    F: Fn(f64, f64) -> f64,
{
    a.iter().zip(b).map(|(&x, &y)| op(x, y)).collect()
}

/// Largest element, or `None` for an empty slice
pub fn max(a: &[f64]) -> Option<f64> {
    a.iter().copied().reduce(f64::max)
}

/// Index of the first non-finite element
pub fn first_non_finite(a: &[f64]) -> Option<usize> {
    a.iter().position(|x| !x.is_finite())
}
