// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Predict and invert for a single unit of work.

use std::borrow::Cow;

use log::{trace, warn};
use marlu::{c64, LMN};
use ndarray::{parallel::prelude::*, prelude::*};

use super::timeslice::{distort, distortion, fit_uvw_plane, undistort};
use crate::{
    constants::TAU,
    context::UnitKind,
    convolution::ConvolutionFunction,
    coord::WorldCoordinates,
    data::{Image, Visibilities},
    gridding::{
        degrid_visibilities,
        fft::{fft2, ifft2},
        grid_visibilities,
    },
    ImagingError,
};

/// The direction cosines of the middle pixel of an `nx` by `ny` image, if it
/// isn't the phase centre. `None` inside means the middle is beyond the
/// celestial sphere.
fn unit_centre(wcs: &WorldCoordinates, nx: usize, ny: usize) -> Option<Option<LMN>> {
    let (x, y) = ((nx / 2) as f64, (ny / 2) as f64);
    if x == wcs.reference_pixel[0] && y == wcs.reference_pixel[1] {
        return None;
    }
    Some(wcs.pixel_to_lmn(x, y))
}

/// Multiply every visibility by `exp(sign 2 pi i (u l + v m + w (n - 1)))`,
/// moving the phase centre to (or from) `lmn`.
fn rotate(vis: &mut Array2<c64>, uvws: &[marlu::UVW], lmn: LMN, sign: f64) {
    vis.outer_iter_mut()
        .into_par_iter()
        .zip(uvws.par_iter())
        .for_each(|(mut row, uvw)| {
            let phase =
                c64::cis(sign * TAU * (uvw.u * lmn.l + uvw.v * lmn.m + uvw.w * (lmn.n - 1.0)));
            row.mapv_inplace(|v| v * phase);
        });
}

/// The w screen `exp(-2 pi i w (n - n0))` over the pixels of an image, where
/// `n0` is n at the image's middle. Pixels beyond the celestial sphere are
/// zero.
fn w_screen(wcs: &WorldCoordinates, ny: usize, nx: usize, w: f64, n0: f64) -> Array2<c64> {
    Array2::from_shape_fn((ny, nx), |(y, x)| match wcs.pixel_to_lmn(x as f64, y as f64) {
        Some(lmn) => c64::cis(-TAU * w * (lmn.n - n0)),
        None => c64::default(),
    })
}

/// The visibilities to hand to the (de)gridder. A w slice gridded with a
/// multi-plane kernel only needs the kernel to correct w relative to the
/// slice's mean.
fn for_gridding<'a>(
    vis: &'a Visibilities,
    kind: &UnitKind,
    kernel: &ConvolutionFunction,
) -> Cow<'a, Visibilities> {
    match kind.w_mean() {
        Some(w_mean) if kernel.w_step().is_some() => Cow::Owned(vis.w_relative_to(w_mean)),
        _ => Cow::Borrowed(vis),
    }
}

fn complex_with_gcf(data: ArrayView4<f64>, kernel: &ConvolutionFunction) -> Array4<c64> {
    let gcf = kernel.grid_correction().mapv(|g| c64::new(g, 0.0));
    let mut planes = data.mapv(|v| c64::new(v, 0.0));
    planes *= &gcf;
    planes
}

/// Predict the visibilities of one unit from `model`, which covers exactly
/// this unit's part of the image. Returns `None` if the unit can't see any of
/// the sky.
pub(crate) fn predict_2d_unit(
    vis: &Visibilities,
    model: &Image,
    kernel: &ConvolutionFunction,
    kind: &UnitKind,
) -> Result<Option<Array2<c64>>, ImagingError> {
    let (ny, nx) = (model.ny(), model.nx());
    let centre = unit_centre(&model.wcs, nx, ny);
    if let Some(None) = centre {
        warn!("The middle of {kind:?} is beyond the celestial sphere; it contributes nothing");
        return Ok(None);
    }

    let mut planes = match kind {
        UnitKind::TimeSlice { .. } => {
            let plane = fit_uvw_plane(vis);
            trace!("Time slice uvw plane: w = {:.5} u + {:.5} v", plane.0, plane.1);
            let map = distortion(&model.wcs, ny, nx, plane);
            complex_with_gcf(distort(model.data.view(), &map).view(), kernel)
        }
        _ => complex_with_gcf(model.data.view(), kernel),
    };
    let n0 = match centre {
        Some(Some(lmn)) => lmn.n,
        _ => 1.0,
    };
    if let Some(w_mean) = kind.w_mean() {
        planes *= &w_screen(&model.wcs, ny, nx, w_mean, n0);
    }

    for mut plane in planes.outer_iter_mut() {
        for plane in plane.outer_iter_mut() {
            fft2(plane);
        }
    }
    let gridded = for_gridding(vis, kind, kernel);
    let mut predicted = degrid_visibilities(planes.view(), &gridded, kernel, &model.wcs)?;

    if let Some(Some(lmn)) = centre {
        rotate(&mut predicted, &vis.uvw, lmn, -1.0);
    }
    Ok(Some(predicted))
}

/// Make the (unnormalised) dirty image of one unit onto `template`'s pixels,
/// along with the sum of weights with shape (pol, chan). Returns `None` if the
/// unit can't see any of the sky.
pub(crate) fn invert_2d_unit(
    vis: &Visibilities,
    template: &Image,
    kernel: &ConvolutionFunction,
    kind: &UnitKind,
    dopsf: bool,
) -> Result<Option<(Image, Array2<f64>)>, ImagingError> {
    let (npol, nchan, ny, nx) = template.data.dim();
    let centre = unit_centre(&template.wcs, nx, ny);
    if let Some(None) = centre {
        warn!("The middle of {kind:?} is beyond the celestial sphere; it contributes nothing");
        return Ok(None);
    }

    let mut grid = Array4::<c64>::zeros((npol, nchan, ny, nx));
    let mut sumwt = Array2::<f64>::zeros((npol, nchan));
    let mut gridded = for_gridding(vis, kind, kernel);
    let n0 = match centre {
        Some(Some(lmn)) => {
            // The PSF is a point source at the phase centre, which a facet
            // sees off its own middle.
            let gridded = gridded.to_mut();
            if dopsf {
                gridded.vis.fill(c64::new(1.0, 0.0));
            }
            rotate(&mut gridded.vis, &vis.uvw, lmn, 1.0);
            grid_visibilities(
                grid.view_mut(),
                sumwt.view_mut(),
                gridded,
                kernel,
                &template.wcs,
                false,
            )?;
            lmn.n
        }
        _ => {
            grid_visibilities(
                grid.view_mut(),
                sumwt.view_mut(),
                &gridded,
                kernel,
                &template.wcs,
                dopsf,
            )?;
            1.0
        }
    };

    for mut plane in grid.outer_iter_mut() {
        for plane in plane.outer_iter_mut() {
            ifft2(plane);
        }
    }
    if let Some(w_mean) = kind.w_mean() {
        grid *= &w_screen(&template.wcs, ny, nx, w_mean, n0).mapv(|s| s.conj());
    }
    let gcf = kernel.grid_correction();
    let mut data = grid.mapv(|v| v.re);
    data *= &gcf;

    if let UnitKind::TimeSlice { .. } = kind {
        let map = distortion(&template.wcs, ny, nx, fit_uvw_plane(vis));
        data = undistort(data.view(), &map);
    }

    Ok(Some((
        Image {
            data,
            wcs: template.wcs,
            polarisation_frame: template.polarisation_frame,
        },
        sumwt,
    )))
}
