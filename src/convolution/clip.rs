// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Bounding-box compression of convolution functions.

use log::debug;
use ndarray::prelude::*;

use super::{ClippingError, ConvolutionFunction, KernelSlice};

/// Trim the taps of every kernel slice to the smallest symmetric box that
/// keeps all values with magnitude at least `level` times the slice's peak.
///
/// Each (pol, w plane, a-term) slice uses its own peak, so slices may end up
/// with different numbers of taps. A level of 0 returns an identical function.
/// The input is left untouched.
pub fn clip_convolution_function(
    kernel: &ConvolutionFunction,
    level: f64,
) -> Result<ConvolutionFunction, ClippingError> {
    if !level.is_finite() || level < 0.0 {
        return Err(ClippingError::BadLevel(level));
    }

    let nw = kernel.w_planes.len();
    let na = kernel.num_a_terms;
    let mut slices = Vec::with_capacity(kernel.slices.len());
    for (i, slice) in kernel.slices.iter().enumerate() {
        let (pol, w, a) = (i / (nw * na), (i / na) % nw, i % na);
        slices.push(clip_slice(slice, level).map_err(|e| match e {
            SliceClipError::ZeroPeak => ClippingError::ZeroPeak { pol, w, a },
            SliceClipError::NothingLeft => ClippingError::TooAggressive { level, pol, w, a },
        })?);
    }

    let clipped = ConvolutionFunction {
        slices,
        npol: kernel.npol,
        w_planes: kernel.w_planes.clone(),
        w_step: kernel.w_step,
        num_a_terms: kernel.num_a_terms,
        oversampling: kernel.oversampling,
        cell: kernel.cell,
        image_shape: kernel.image_shape,
        grid_correction: kernel.grid_correction.clone(),
    };
    let (before, after) = (kernel.shape(), clipped.shape());
    debug!(
        "Clipped convolution function at level {level}: largest slice {}x{} -> {}x{} taps",
        before.5, before.6, after.5, after.6
    );
    Ok(clipped)
}

enum SliceClipError {
    ZeroPeak,
    NothingLeft,
}

fn clip_slice(slice: &KernelSlice, level: f64) -> Result<KernelSlice, SliceClipError> {
    let amps = slice.data.mapv(|v| v.norm());
    let peak = amps.iter().copied().fold(0.0, f64::max);
    if peak == 0.0 {
        return Err(SliceClipError::ZeroPeak);
    }
    let threshold = level * peak;

    let (ty, tx) = slice.taps();
    // Is any value of each tap row/column significant?
    let mut keep_y = vec![false; ty];
    let mut keep_x = vec![false; tx];
    for ((_, _, iy, ix), &amp) in amps.indexed_iter() {
        if amp >= threshold {
            keep_y[iy] = true;
            keep_x[ix] = true;
        }
    }

    let trim = |keep: &[bool], centre: usize| -> Option<usize> {
        let lo = keep.iter().position(|&k| k)?;
        let hi = keep.iter().rposition(|&k| k)?;
        let n = keep.len();
        Some(lo.min(n - 1 - hi).min(centre).min(n - 1 - centre))
    };
    let trim_y = trim(&keep_y, slice.centre[0]).ok_or(SliceClipError::NothingLeft)?;
    let trim_x = trim(&keep_x, slice.centre[1]).ok_or(SliceClipError::NothingLeft)?;

    Ok(KernelSlice {
        data: slice
            .data
            .slice(s![.., .., trim_y..ty - trim_y, trim_x..tx - trim_x])
            .to_owned(),
        centre: [slice.centre[0] - trim_y, slice.centre[1] - trim_x],
    })
}
