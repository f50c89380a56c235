// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Centred, unnormalised FFTs.
//!
//! Index `n / 2` is the origin of both the input and the output, i.e. the
//! forward transform computes
//! `F[k] = sum_x f[x] exp(-2 pi i (k - n/2) (x - n/2) / n)`.

use marlu::c64;
use ndarray::{parallel::prelude::*, prelude::*};
use rustfft::{Fft, FftDirection, FftPlanner};

/// In-place, centred forward 2D FFT.
pub fn fft2(a: ArrayViewMut2<c64>) {
    centred_fft2(a, FftDirection::Forward);
}

/// In-place, centred inverse 2D FFT. No 1/N normalisation is applied.
pub fn ifft2(a: ArrayViewMut2<c64>) {
    centred_fft2(a, FftDirection::Inverse);
}

/// In-place, centred forward 1D FFT.
pub fn fft1(a: ArrayViewMut1<c64>) {
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft(a.len(), FftDirection::Forward);
    centred_fft1(a, &*fft);
}

fn centred_fft2(mut a: ArrayViewMut2<c64>, direction: FftDirection) {
    let (ny, nx) = a.dim();
    if ny == 0 || nx == 0 {
        return;
    }
    let mut planner = FftPlanner::new();
    let fft_x = planner.plan_fft(nx, direction);
    let fft_y = planner.plan_fft(ny, direction);

    a.axis_iter_mut(Axis(0))
        .into_par_iter()
        .for_each(|row| centred_fft1(row, &*fft_x));
    a.axis_iter_mut(Axis(1))
        .into_par_iter()
        .for_each(|col| centred_fft1(col, &*fft_y));
}

fn centred_fft1(mut lane: ArrayViewMut1<c64>, fft: &dyn Fft<f64>) {
    let n = lane.len();
    if n == 0 {
        return;
    }
    let h = n / 2;
    let mut buffer: Vec<c64> = (0..n).map(|i| lane[(i + h) % n]).collect();
    fft.process(&mut buffer);
    for (k, out) in lane.iter_mut().enumerate() {
        *out = buffer[(k + n - h) % n];
    }
}

/// Place `a` in the middle of a larger (zero-filled) array, keeping the
/// centre pixel at the centre.
pub fn pad_mid(a: ArrayView2<c64>, ny: usize, nx: usize) -> Array2<c64> {
    let (ay, ax) = a.dim();
    assert!(ny >= ay && nx >= ax, "pad_mid can't shrink an array");
    let (y0, x0) = (ny / 2 - ay / 2, nx / 2 - ax / 2);
    let mut out = Array2::zeros((ny, nx));
    out.slice_mut(s![y0..y0 + ay, x0..x0 + ax]).assign(&a);
    out
}

/// The middle `ny` by `nx` pixels of `a`, keeping the centre pixel at the
/// centre.
pub fn extract_mid<T: Clone>(a: ArrayView2<T>, ny: usize, nx: usize) -> Array2<T> {
    let (ay, ax) = a.dim();
    assert!(ny <= ay && nx <= ax, "extract_mid can't grow an array");
    let (y0, x0) = (ay / 2 - ny / 2, ax / 2 - nx / 2);
    a.slice(s![y0..y0 + ny, x0..x0 + nx]).to_owned()
}
