// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Time slices are treated as coplanar. Visibilities on the plane
//! `w = a u + b v` see a source at (l, m) at
//! `(l + a (n - 1), m + b (n - 1))`, so imaging a slice is 2D imaging of a
//! distorted sky.

use ndarray::prelude::*;

use crate::{coord::WorldCoordinates, data::Visibilities};

/// The least-squares plane `w = a u + b v` through the visibilities' uvw.
/// Degenerate geometries (e.g. a single baseline) give a flat plane.
pub(crate) fn fit_uvw_plane(vis: &Visibilities) -> (f64, f64) {
    let (mut suu, mut suv, mut svv, mut suw, mut svw) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for uvw in &vis.uvw {
        suu += uvw.u * uvw.u;
        suv += uvw.u * uvw.v;
        svv += uvw.v * uvw.v;
        suw += uvw.u * uvw.w;
        svw += uvw.v * uvw.w;
    }
    let det = suu * svv - suv * suv;
    if !det.is_finite() || det.abs() <= 1e-12 * (suu * svv).abs() {
        return (0.0, 0.0);
    }
    (
        (suw * svv - svw * suv) / det,
        (svw * suu - suw * suv) / det,
    )
}

/// Bilinear interpolation corners: the first (x, y) pixel and the fractional
/// offsets from it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Bilinear {
    x: isize,
    y: isize,
    fx: f64,
    fy: f64,
}

impl Bilinear {
    fn corners(&self) -> [(isize, isize, f64); 4] {
        let Self { x, y, fx, fy } = *self;
        [
            (x, y, (1.0 - fx) * (1.0 - fy)),
            (x + 1, y, fx * (1.0 - fy)),
            (x, y + 1, (1.0 - fx) * fy),
            (x + 1, y + 1, fx * fy),
        ]
    }
}

/// For every pixel of an `ny` by `nx` image, where the sky at that pixel
/// appears to visibilities on the plane `w = a u + b v`. Pixels beyond the
/// celestial sphere map to nothing.
pub(crate) fn distortion(
    wcs: &WorldCoordinates,
    ny: usize,
    nx: usize,
    (a, b): (f64, f64),
) -> Array2<Option<Bilinear>> {
    Array2::from_shape_fn((ny, nx), |(y, x)| {
        let lmn = wcs.pixel_to_lmn(x as f64, y as f64)?;
        let (xd, yd) = wcs.lm_to_pixel(lmn.l + a * (lmn.n - 1.0), lmn.m + b * (lmn.n - 1.0));
        let (x0, y0) = (xd.floor(), yd.floor());
        Some(Bilinear {
            x: x0 as isize,
            y: y0 as isize,
            fx: xd - x0,
            fy: yd - y0,
        })
    })
}

fn in_bounds(x: isize, y: isize, ny: usize, nx: usize) -> bool {
    x >= 0 && y >= 0 && x < nx as isize && y < ny as isize
}

/// Move the flux of every pixel of `image` (pol, chan, y, x) to its distorted
/// position. Flux landing off the image is lost.
pub(crate) fn distort(image: ArrayView4<f64>, map: &Array2<Option<Bilinear>>) -> Array4<f64> {
    let (npol, nchan, ny, nx) = image.dim();
    let mut out = Array4::zeros(image.dim());
    for (pol, chan) in (0..npol).flat_map(|p| (0..nchan).map(move |c| (p, c))) {
        let in_plane = image.slice(s![pol, chan, .., ..]);
        let mut out_plane = out.slice_mut(s![pol, chan, .., ..]);
        for ((y, x), bilinear) in map.indexed_iter() {
            let Some(bilinear) = bilinear else { continue };
            let v = in_plane[(y, x)];
            if v == 0.0 {
                continue;
            }
            for (cx, cy, weight) in bilinear.corners() {
                if in_bounds(cx, cy, ny, nx) {
                    out_plane[(cy as usize, cx as usize)] += v * weight;
                }
            }
        }
    }
    out
}

/// The adjoint of [`distort`]: sample a distorted image (pol, chan, y, x) at
/// every pixel's distorted position.
pub(crate) fn undistort(image: ArrayView4<f64>, map: &Array2<Option<Bilinear>>) -> Array4<f64> {
    let (npol, nchan, ny, nx) = image.dim();
    let mut out = Array4::zeros(image.dim());
    for (pol, chan) in (0..npol).flat_map(|p| (0..nchan).map(move |c| (p, c))) {
        let in_plane = image.slice(s![pol, chan, .., ..]);
        let mut out_plane = out.slice_mut(s![pol, chan, .., ..]);
        for ((y, x), bilinear) in map.indexed_iter() {
            let Some(bilinear) = bilinear else { continue };
            out_plane[(y, x)] = bilinear
                .corners()
                .into_iter()
                .filter(|&(cx, cy, _)| in_bounds(cx, cy, ny, nx))
                .map(|(cx, cy, weight)| in_plane[(cy as usize, cx as usize)] * weight)
                .sum();
        }
    }
    out
}
