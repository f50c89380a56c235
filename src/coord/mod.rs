// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Mapping between image pixels, direction cosines, sky directions and
//! Fourier-plane grid cells.

mod error;
mod wcs;

pub use error::WcsError;
pub use wcs::WorldCoordinates;

use ndarray::prelude::*;

/// Grid coordinates spanning [-0.5, 0.5) with zero at index `n / 2`.
pub fn coordinates(n: usize) -> Array1<f64> {
    let half = (n / 2) as f64;
    Array1::from_shape_fn(n, |i| (i as f64 - half) / n as f64)
}

/// Two-dimensional [`coordinates`]. The returned arrays are `(m, l)`, both with
/// shape `(n, n)`; `m` varies along the first axis and `l` along the second.
pub fn coordinates2(n: usize) -> (Array2<f64>, Array2<f64>) {
    let c = coordinates(n);
    let m = Array2::from_shape_fn((n, n), |(y, _)| c[y]);
    let l = Array2::from_shape_fn((n, n), |(_, x)| c[x]);
    (m, l)
}

/// Compute the integer grid index and the oversampled fractional phase of the
/// coordinate `p`, which is in units of the grid's extent (i.e. `p` in
/// [-0.5, 0.5) lands on the grid). The index is signed so that callers can
/// detect coordinates falling off the grid.
///
/// The phase is always within `0..oversampling`.
pub fn frac_coord(npixel: usize, oversampling: usize, p: f64) -> (isize, usize) {
    let n = npixel as f64;
    let ov = oversampling as f64;
    let x = (npixel / 2) as f64 + p * n;
    let flx = (x + 0.5 / ov).floor();
    let frac = ((x - flx) * ov + 0.5).floor();
    let frac = frac.clamp(0.0, ov - 1.0) as usize;
    (flx as isize, frac)
}
