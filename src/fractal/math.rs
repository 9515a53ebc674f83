use num_complex::Complex64;

/// Denominators below this magnitude are treated as degenerate.
pub const DIV_EPSILON: f64 = 1e-10;

/// Value returned by [`complex_div`] for a degenerate denominator. It lands far outside the
/// visible frame instead of turning into NaN.
pub const DIV_SENTINEL: Complex64 = Complex64::new(1000.0, 1000.0);

/// Six-coefficient affine map `(a*x + b*y + e, c*x + d*y + f)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Affine {
    pub const IDENTITY: Self = Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

    pub const fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub const fn from_parts(matrix: [f64; 4], translation: [f64; 2]) -> Self {
        Self::new(
            matrix[0],
            matrix[1],
            matrix[2],
            matrix[3],
            translation[0],
            translation[1],
        )
    }

    pub fn to_array(self) -> [f64; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }

    pub fn from_array(v: [f64; 6]) -> Self {
        Self::new(v[0], v[1], v[2], v[3], v[4], v[5])
    }

    #[inline]
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        apply_affine(x, y, self)
    }

    pub fn lerp(&self, other: &Self, t: f64) -> Self {
        let a = self.to_array();
        let b = other.to_array();
        let mut out = [0.0; 6];
        for i in 0..6 {
            out[i] = lerp(a[i], b[i], t);
        }
        Self::from_array(out)
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[inline]
pub fn apply_affine(x: f64, y: f64, m: &Affine) -> (f64, f64) {
    (m.a * x + m.b * y + m.e, m.c * x + m.d * y + m.f)
}

#[inline]
pub fn complex_add(a: Complex64, b: Complex64) -> Complex64 {
    Complex64::new(a.re + b.re, a.im + b.im)
}

#[inline]
pub fn complex_mul(a: Complex64, b: Complex64) -> Complex64 {
    Complex64::new(a.re * b.re - a.im * b.im, a.re * b.im + a.im * b.re)
}

/// Complex division with a degenerate-denominator guard.
///
/// Returns [`DIV_SENTINEL`] when `|den| < 1e-10`; never panics and never produces NaN from the
/// denominator alone.
#[inline]
pub fn complex_div(num: Complex64, den: Complex64) -> Complex64 {
    let mag2 = den.re * den.re + den.im * den.im;
    if mag2.sqrt() < DIV_EPSILON {
        return DIV_SENTINEL;
    }
    Complex64::new(
        (num.re * den.re + num.im * den.im) / mag2,
        (num.im * den.re - num.re * den.im) / mag2,
    )
}

/// `f(z) = (a*z + b) / (c*z + d)`.
#[inline]
pub fn apply_mobius(z: Complex64, a: Complex64, b: Complex64, c: Complex64, d: Complex64) -> Complex64 {
    let num = complex_add(complex_mul(a, z), b);
    let den = complex_add(complex_mul(c, z), d);
    complex_div(num, den)
}

#[inline]
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

#[inline]
pub fn lerp_complex(a: Complex64, b: Complex64, t: f64) -> Complex64 {
    Complex64::new(lerp(a.re, b.re, t), lerp(a.im, b.im, t))
}

#[inline]
pub fn rotate2(x: f64, y: f64, angle: f64) -> (f64, f64) {
    let (s, c) = angle.sin_cos();
    (x * c - y * s, x * s + y * c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complex_div_matches_textbook_quotient() {
        let q = complex_div(Complex64::new(1.0, 2.0), Complex64::new(3.0, -1.0));
        // (1+2i)/(3-i) = (1+7i)/10
        assert!((q.re - 0.1).abs() < 1e-12);
        assert!((q.im - 0.7).abs() < 1e-12);
    }

    #[test]
    fn mobius_identity_returns_input() {
        let one = Complex64::new(1.0, 0.0);
        let zero = Complex64::new(0.0, 0.0);
        let z = Complex64::new(0.3, -0.7);
        let w = apply_mobius(z, one, zero, zero, one);
        assert!((w - z).norm() < 1e-12);
    }
}
