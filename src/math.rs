use faer::{Col, Mat};
use itertools::izip;

/// `0.5 * ln(2π)`
pub(crate) const HALF_LN_2PI: f64 = 0.918_938_533_204_672_8;

/// Log density of a normal distribution at `x`.
#[inline]
pub fn normal_logpdf_scalar(x: f64, loc: f64, scale: f64) -> f64 {
    let z = (x - loc) / scale;
    -0.5 * z * z - scale.ln() - HALF_LN_2PI
}

/// Elementwise normal log density.
///
/// The output has the same shape as `x`, a `1 × 1` input gives a `1 × 1`
/// output, not a scalar.
pub fn normal_logpdf(x: &Mat<f64>, loc: f64, scale: f64) -> Mat<f64> {
    Mat::from_fn(x.nrows(), x.ncols(), |i, j| {
        normal_logpdf_scalar(x[(i, j)], loc, scale)
    })
}

/// Copy row `row` of a sample batch into `out`.
#[inline]
pub(crate) fn copy_row(samples: &Mat<f64>, row: usize, out: &mut [f64]) {
    assert!(out.len() == samples.ncols());
    out.iter_mut()
        .enumerate()
        .for_each(|(j, val)| *val = samples[(row, j)]);
}

/// `acc += x`, elementwise.
pub(crate) fn add_assign(arch: pulp::Arch, acc: &mut Col<f64>, x: &Col<f64>) {
    assert!(acc.nrows() == x.nrows());
    arch.dispatch(|| {
        izip!(acc.try_as_col_major_mut().unwrap().as_slice_mut().iter_mut(), x.try_as_col_major().unwrap().as_slice().iter()).for_each(|(acc, &x)| *acc += x);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn logpdf_constants() {
        assert_abs_diff_eq!(
            normal_logpdf_scalar(0., 0., 1.),
            -0.918938533205,
            epsilon = 1e-10
        );
        assert_abs_diff_eq!(
            normal_logpdf_scalar(0., 5., 1.),
            -13.4189385332,
            epsilon = 1e-9
        );
    }

    #[test]
    fn logpdf_keeps_shape() {
        let x = Mat::<f64>::zeros(1, 1);
        let out = normal_logpdf(&x, 0., 1.);
        assert_eq!((out.nrows(), out.ncols()), (1, 1));
        assert_abs_diff_eq!(out[(0, 0)], -0.918938533205, epsilon = 1e-10);

        let x = Mat::from_fn(2, 3, |i, j| (i + j) as f64);
        let out = normal_logpdf(&x, 5., 2.);
        assert_eq!((out.nrows(), out.ncols()), (2, 3));
        assert_abs_diff_eq!(out[(1, 2)], normal_logpdf_scalar(3., 5., 2.));
    }

    #[test]
    fn accumulate() {
        let arch = pulp::Arch::new();
        let mut acc = Col::<f64>::zeros(3);
        let x = Col::from_fn(3, |i| i as f64);
        add_assign(arch, &mut acc, &x);
        add_assign(arch, &mut acc, &x);
        assert_eq!(acc.try_as_col_major().unwrap().as_slice(), &[0., 2., 4.]);
    }

    #[test]
    fn rows() {
        let x = Mat::from_fn(2, 3, |i, j| (10 * i + j) as f64);
        let mut buf = vec![0.; 3];
        copy_row(&x, 1, &mut buf);
        assert_eq!(buf, vec![10., 11., 12.]);
    }
}
