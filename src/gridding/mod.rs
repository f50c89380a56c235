// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Convolutional gridding and degridding.
//!
//! Grids have shape (pol, chan, v, u). A visibility at (u, v) wavelengths
//! lands at fractional grid position `n/2 + u * cell * n` (see
//! [`frac_coord`]); the kernel taps around that position are weighted by the
//! oversampled phase nearest to the fractional offset.

mod error;
pub mod fft;
#[cfg(test)]
mod tests;
mod weighting;

pub use error::GriddingError;
pub use weighting::{weight_visibility, Weighting, WEIGHTINGS};

use log::trace;
use marlu::c64;
use ndarray::{parallel::prelude::*, prelude::*, Zip};

use crate::{
    convolution::{ConvolutionFunction, KernelSlice},
    coord::{frac_coord, WorldCoordinates},
    data::Visibilities,
};

/// Where a visibility lands on a grid.
#[derive(Debug, Clone, Copy)]
struct Placement {
    chan: usize,
    w: usize,
    a: usize,
    /// The grid cell nearest to the visibility.
    x: isize,
    y: isize,
    /// The oversampled phases.
    xf: usize,
    yf: usize,
}

impl Placement {
    /// The first grid cell (y, x) covered by `slice`. Only valid once the
    /// placement has been checked with [`fits`].
    fn origin(&self, slice: &KernelSlice) -> (usize, usize) {
        (
            (self.y - slice.centre[0] as isize) as usize,
            (self.x - slice.centre[1] as isize) as usize,
        )
    }
}

fn fits(slice: &KernelSlice, x: isize, y: isize, ny: usize, nx: usize) -> bool {
    let (ty, tx) = slice.taps();
    let y0 = y - slice.centre[0] as isize;
    let x0 = x - slice.centre[1] as isize;
    y0 >= 0 && x0 >= 0 && y0 + ty as isize <= ny as isize && x0 + tx as isize <= nx as isize
}

fn check_kernel(
    kernel: &ConvolutionFunction,
    npol: usize,
    nchan: usize,
    ny: usize,
    nx: usize,
) -> Result<(), GriddingError> {
    if kernel.image_shape != [ny, nx] {
        return Err(GriddingError::KernelGeometry {
            kernel: kernel.image_shape,
            grid: [ny, nx],
        });
    }
    if kernel.npol != 1 && kernel.npol != npol {
        return Err(GriddingError::KernelPols {
            kernel: kernel.npol,
            grid: npol,
        });
    }
    if kernel.num_a_terms != 1 && kernel.num_a_terms != nchan {
        return Err(GriddingError::KernelATerms {
            kernel: kernel.num_a_terms,
            nchan,
        });
    }
    Ok(())
}

/// Work out where every visibility goes. Without a kernel, visibilities go to
/// their nearest cell.
fn placements(
    vis: &Visibilities,
    wcs: &WorldCoordinates,
    (nchan, ny, nx): (usize, usize, usize),
    kernel: Option<&ConvolutionFunction>,
) -> Result<Vec<Placement>, GriddingError> {
    let oversampling = kernel.map(|k| k.oversampling).unwrap_or(1);
    let [cell_x, cell_y] = wcs.cell;

    (0..vis.len())
        .into_par_iter()
        .map(|index| {
            let uvw = vis.uvw[index];
            let freq = vis.frequency[index];
            let chan = wcs
                .nearest_channel(freq, nchan)
                .ok_or(GriddingError::NoChannel { index, freq })?;
            let (x, xf) = frac_coord(nx, oversampling, uvw.u * cell_x);
            let (y, yf) = frac_coord(ny, oversampling, uvw.v * cell_y);

            let (w, a, on_grid) = match kernel {
                None => (
                    0,
                    0,
                    x >= 0 && y >= 0 && x < nx as isize && y < ny as isize,
                ),
                Some(k) => {
                    let w = k.nearest_w_plane(uvw.w).ok_or_else(|| {
                        let (min, max) = k.w_range();
                        GriddingError::WOutOfRange {
                            index,
                            w: uvw.w,
                            min,
                            max,
                        }
                    })?;
                    let a = if k.num_a_terms == 1 { 0 } else { chan };
                    let on_grid = (0..k.npol).all(|pol| fits(k.slice(pol, w, a), x, y, ny, nx));
                    (w, a, on_grid)
                }
            };
            if !on_grid {
                return Err(GriddingError::OutOfGrid {
                    index,
                    u: uvw.u,
                    v: uvw.v,
                });
            }

            Ok(Placement {
                chan,
                w,
                a,
                x,
                y,
                xf,
                yf,
            })
        })
        .collect()
}

/// Check that every visibility of `vis` has an image channel and (with its
/// kernel footprint) lands inside an `nchan` by `ny` by `nx` grid. Nothing is
/// gridded.
pub fn check_coverage(
    vis: &Visibilities,
    wcs: &WorldCoordinates,
    (nchan, ny, nx): (usize, usize, usize),
    kernel: Option<&ConvolutionFunction>,
) -> Result<(), GriddingError> {
    if let Some(k) = kernel {
        check_kernel(k, vis.npol(), nchan, ny, nx)?;
    }
    placements(vis, wcs, (nchan, ny, nx), kernel).map(|_| ())
}

/// Grid visibilities (weighted by their imaging weights) onto `grid`, which
/// has shape (pol, chan, y, x), using the conjugate of `kernel`. The imaging
/// weights are added to `sumwt`, with shape (pol, chan). With `dopsf`, every
/// visibility is treated as 1 to make the point-spread function.
pub fn grid_visibilities(
    mut grid: ArrayViewMut4<c64>,
    mut sumwt: ArrayViewMut2<f64>,
    vis: &Visibilities,
    kernel: &ConvolutionFunction,
    wcs: &WorldCoordinates,
    dopsf: bool,
) -> Result<(), GriddingError> {
    let (npol, nchan, ny, nx) = grid.dim();
    if vis.npol() != npol {
        return Err(GriddingError::PolMismatch {
            vis: vis.npol(),
            grid: npol,
        });
    }
    debug_assert_eq!(sumwt.dim(), (npol, nchan));
    check_kernel(kernel, npol, nchan, ny, nx)?;
    let placements = placements(vis, wcs, (nchan, ny, nx), Some(kernel))?;

    // Each polarisation has its own grid plane, so they can be done in
    // parallel without contention.
    grid.outer_iter_mut()
        .into_par_iter()
        .zip(sumwt.outer_iter_mut())
        .enumerate()
        .for_each(|(pol, (mut grid, mut sumwt))| {
            let kpol = if kernel.npol == 1 { 0 } else { pol };
            for (i, p) in placements.iter().enumerate() {
                let wt = vis.imaging_weight[(i, pol)];
                let value = if dopsf {
                    c64::new(wt, 0.0)
                } else {
                    vis.vis[(i, pol)] * wt
                };
                let slice = kernel.slice(kpol, p.w, p.a);
                let (y0, x0) = p.origin(slice);
                let (ty, tx) = slice.taps();
                Zip::from(grid.slice_mut(s![p.chan, y0..y0 + ty, x0..x0 + tx]))
                    .and(slice.data.slice(s![p.yf, p.xf, .., ..]))
                    .for_each(|g, k| *g += k.conj() * value);
                sumwt[p.chan] += wt;
            }
        });
    trace!(
        "Gridded {} visibilities onto a {npol}x{nchan}x{ny}x{nx} grid",
        vis.len()
    );
    Ok(())
}

/// Sample `grid` (shape (pol, chan, y, x)) at every visibility's (u, v) with
/// `kernel`, returning values with shape (nvis, pol).
pub fn degrid_visibilities(
    grid: ArrayView4<c64>,
    vis: &Visibilities,
    kernel: &ConvolutionFunction,
    wcs: &WorldCoordinates,
) -> Result<Array2<c64>, GriddingError> {
    let (npol, nchan, ny, nx) = grid.dim();
    if vis.npol() != npol {
        return Err(GriddingError::PolMismatch {
            vis: vis.npol(),
            grid: npol,
        });
    }
    check_kernel(kernel, npol, nchan, ny, nx)?;
    let placements = placements(vis, wcs, (nchan, ny, nx), Some(kernel))?;

    let mut out = Array2::zeros((vis.len(), npol));
    out.outer_iter_mut()
        .into_par_iter()
        .zip(placements.par_iter())
        .for_each(|(mut row, p)| {
            for (pol, v) in row.iter_mut().enumerate() {
                let kpol = if kernel.npol == 1 { 0 } else { pol };
                let slice = kernel.slice(kpol, p.w, p.a);
                let (y0, x0) = p.origin(slice);
                let (ty, tx) = slice.taps();
                *v = Zip::from(grid.slice(s![pol, p.chan, y0..y0 + ty, x0..x0 + tx]))
                    .and(slice.data.slice(s![p.yf, p.xf, .., ..]))
                    .fold(c64::default(), |acc, g, k| acc + g * k);
            }
        });
    trace!(
        "Degridded {} visibilities from a {npol}x{nchan}x{ny}x{nx} grid",
        vis.len()
    );
    Ok(out)
}

/// Grid visibilities onto their nearest cells without any kernel.
pub fn box_grid(
    mut grid: ArrayViewMut4<c64>,
    mut sumwt: ArrayViewMut2<f64>,
    vis: &Visibilities,
    wcs: &WorldCoordinates,
    dopsf: bool,
) -> Result<(), GriddingError> {
    let (npol, nchan, ny, nx) = grid.dim();
    if vis.npol() != npol {
        return Err(GriddingError::PolMismatch {
            vis: vis.npol(),
            grid: npol,
        });
    }
    let placements = placements(vis, wcs, (nchan, ny, nx), None)?;
    for (i, p) in placements.iter().enumerate() {
        for pol in 0..npol {
            let wt = vis.imaging_weight[(i, pol)];
            let value = if dopsf {
                c64::new(wt, 0.0)
            } else {
                vis.vis[(i, pol)] * wt
            };
            grid[(pol, p.chan, p.y as usize, p.x as usize)] += value;
            sumwt[(pol, p.chan)] += wt;
        }
    }
    Ok(())
}
