// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Convolution (gridding) functions.
//!
//! A [`ConvolutionFunction`] is a set of oversampled kernels, one per
//! (polarisation, w plane, a-term), with an accompanying grid-correction image
//! that undoes the kernel's taper on the image plane.

mod clip;
mod error;
mod pswf;
#[cfg(test)]
mod tests;

pub use clip::clip_convolution_function;
pub use error::{ClippingError, ConvolutionError};
pub use pswf::grdsf;

use log::{debug, trace, warn};
use marlu::c64;
use ndarray::{parallel::prelude::*, prelude::*};
use serde::{Deserialize, Serialize};
use vec1::Vec1;

use crate::{
    constants::{
        DEFAULT_OVERSAMPLING, DEFAULT_SUPPORT, GCF_FLOOR, MIN_FAR_FIELD_SIZE, PSWF_SUPPORT, TAU,
    },
    coord::coordinates2,
    data::{Image, PolarisationFrame},
    gridding::fft::{fft1, fft2, pad_mid},
};

/// The parameters used to build a [`ConvolutionFunction`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KernelParams {
    /// The number of w planes.
    pub w_planes: usize,

    /// The spacing of w planes \[wavelengths\]. Required when there is more
    /// than one plane.
    pub w_step: Option<f64>,

    /// The number of kernel samples per grid cell.
    pub oversampling: usize,

    /// The kernel half-width \[grid cells\]. Kernels are `2 * support` taps
    /// wide.
    pub support: usize,

    /// Taper the kernel with a prolate spheroidal function?
    pub use_anti_aliasing: bool,
}

impl Default for KernelParams {
    fn default() -> Self {
        Self {
            w_planes: 1,
            w_step: None,
            oversampling: DEFAULT_OVERSAMPLING,
            support: DEFAULT_SUPPORT,
            use_anti_aliasing: true,
        }
    }
}

/// The kernel of one (polarisation, w plane, a-term).
#[derive(Debug, Clone)]
pub struct KernelSlice {
    /// Shape (oversample y, oversample x, tap y, tap x).
    pub data: Array4<c64>,

    /// The (y, x) tap that sits on the grid cell nearest to a visibility.
    pub centre: [usize; 2],
}

impl KernelSlice {
    /// The number of (y, x) taps.
    pub fn taps(&self) -> (usize, usize) {
        (self.data.len_of(Axis(2)), self.data.len_of(Axis(3)))
    }
}

#[derive(Debug, Clone)]
pub struct ConvolutionFunction {
    /// Ordered by polarisation, then w plane, then a-term.
    pub(crate) slices: Vec<KernelSlice>,
    pub(crate) npol: usize,
    pub(crate) w_planes: Vec1<f64>,
    pub(crate) w_step: Option<f64>,
    pub(crate) num_a_terms: usize,
    pub(crate) oversampling: usize,
    /// The signed (x, y) cell sizes of the image this function was made for.
    pub(crate) cell: [f64; 2],
    /// (ny, nx) of the image this function was made for.
    pub(crate) image_shape: [usize; 2],
    pub(crate) grid_correction: Array2<f64>,
}

impl ConvolutionFunction {
    /// The 7-axis shape (pol, w, a, oversample y, oversample x, tap y, tap x).
    /// Slices may have been clipped to fewer taps; the largest is reported.
    pub fn shape(&self) -> (usize, usize, usize, usize, usize, usize, usize) {
        let (sy, sx) = self.slices.iter().fold((0, 0), |(sy, sx), s| {
            let (ty, tx) = s.taps();
            (sy.max(ty), sx.max(tx))
        });
        (
            self.npol,
            self.w_planes.len(),
            self.num_a_terms,
            self.oversampling,
            self.oversampling,
            sy,
            sx,
        )
    }

    pub fn slice(&self, pol: usize, w: usize, a: usize) -> &KernelSlice {
        let nw = self.w_planes.len();
        &self.slices[(pol * nw + w) * self.num_a_terms + a]
    }

    pub fn npol(&self) -> usize {
        self.npol
    }

    pub fn num_a_terms(&self) -> usize {
        self.num_a_terms
    }

    pub fn oversampling(&self) -> usize {
        self.oversampling
    }

    /// The w value at the centre of each plane \[wavelengths\].
    pub fn w_planes(&self) -> &[f64] {
        &self.w_planes
    }

    pub fn w_step(&self) -> Option<f64> {
        self.w_step
    }

    pub fn cell(&self) -> [f64; 2] {
        self.cell
    }

    pub fn image_shape(&self) -> [usize; 2] {
        self.image_shape
    }

    /// The grid-correction function, with shape (ny, nx).
    pub fn grid_correction(&self) -> ArrayView2<'_, f64> {
        self.grid_correction.view()
    }

    /// The plane whose w is nearest to `w`, or `None` if `w` is beyond the
    /// planes (by more than half a step). Kernels without a w axis accept any
    /// w.
    pub fn nearest_w_plane(&self, w: f64) -> Option<usize> {
        let step = match self.w_step {
            None => return Some(0),
            Some(s) => s,
        };
        let half = (self.w_planes.len() as f64 - 1.0) / 2.0;
        let k = (w / step + half).round();
        if k >= 0.0 && k < self.w_planes.len() as f64 {
            Some(k as usize)
        } else {
            None
        }
    }

    /// The range of w \[wavelengths\] that can be gridded with this function.
    pub fn w_range(&self) -> (f64, f64) {
        match self.w_step {
            None => (f64::NEG_INFINITY, f64::INFINITY),
            Some(step) => (
                *self.w_planes.first() - 0.5 * step,
                *self.w_planes.last() + 0.5 * step,
            ),
        }
    }
}

/// The gridding function's tap offsets. Tap `i` of phase `phase` is `d` grid
/// cells from the visibility, where `d = centre - i + phase / oversampling`.
fn tap_offset(centre: usize, i: usize, phase: usize, oversampling: usize) -> f64 {
    centre as f64 - i as f64 + phase as f64 / oversampling as f64
}

/// The one-dimensional PSWF gridding function with shape
/// (oversampling, 2 * support). The function is [`PSWF_SUPPORT`] cells wide
/// either side of the visibility whatever the support; taps beyond that are
/// zero. Each phase sums to 1.
fn pswf_kernel_1d(oversampling: usize, support: usize) -> Array2<f64> {
    let width = 2 * support;
    let centre = support - 1;
    let mut k = Array2::from_shape_fn((oversampling, width), |(phase, i)| {
        let d = tap_offset(centre, i, phase, oversampling);
        grdsf(d / PSWF_SUPPORT as f64).1
    });
    for mut phase in k.outer_iter_mut() {
        let sum = phase.sum();
        if sum > 0.0 {
            phase /= sum;
        }
    }
    k
}

/// The image-plane response of a 1D gridding function at `x_c` pixels from the
/// image centre, averaged over phases. This is what the grid-correction
/// function divides out.
fn kernel_taper_1d<T>(kernel: ArrayView2<T>, centre: usize, npixel: usize, x_c: f64) -> f64
where
    T: Copy + Into<c64>,
{
    let oversampling = kernel.len_of(Axis(0));
    let mut sum = c64::default();
    for ((phase, i), &v) in kernel.indexed_iter() {
        let d = tap_offset(centre, i, phase, oversampling);
        let v: c64 = v.into();
        sum += v * c64::cis(TAU * d * x_c / npixel as f64);
    }
    sum.re / oversampling as f64
}

/// Turn a 1D taper into a 1D grid-correction function over `npixel` pixels.
fn grid_correction_1d<F: Fn(f64) -> f64>(npixel: usize, taper: F) -> Array1<f64> {
    let half = (npixel / 2) as f64;
    Array1::from_shape_fn(npixel, |x| {
        let t = taper(x as f64 - half);
        if t.abs() < GCF_FLOOR {
            0.0
        } else {
            1.0 / t
        }
    })
}

fn outer(gy: &Array1<f64>, gx: &Array1<f64>) -> Array2<f64> {
    Array2::from_shape_fn((gy.len(), gx.len()), |(y, x)| gy[y] * gx[x])
}

fn grid_correction_image(image: &Image, gcf: &Array2<f64>) -> Image {
    Image {
        data: gcf.clone().insert_axis(Axis(0)).insert_axis(Axis(0)),
        wcs: image.wcs,
        polarisation_frame: PolarisationFrame::StokesI,
    }
}

fn check_kernel_params(image: &Image, params: &KernelParams) -> Result<(), ConvolutionError> {
    if params.w_planes == 0 {
        return Err(ConvolutionError::NoWPlanes);
    }
    match params.w_step {
        None if params.w_planes > 1 => return Err(ConvolutionError::NoWStep),
        Some(s) if !s.is_finite() || s <= 0.0 => return Err(ConvolutionError::BadWStep(s)),
        _ => (),
    }
    if params.oversampling == 0 {
        return Err(ConvolutionError::ZeroOversampling);
    }
    if params.support == 0 {
        return Err(ConvolutionError::ZeroSupport);
    }
    let npixel = image.nx().min(image.ny());
    if 2 * params.support >= npixel {
        return Err(ConvolutionError::SupportTooLarge {
            support: params.support,
            npixel,
        });
    }
    image.wcs.check_cell()?;
    image.wcs.check_field_of_view(image.nx(), image.ny())?;
    Ok(())
}

/// The single-plane prolate-spheroidal anti-aliasing function for `image`, and
/// its grid-correction image. This is the kernel used when there is no w or
/// a-term correction.
pub fn anti_aliasing_function(
    image: &Image,
    oversampling: usize,
    support: usize,
) -> Result<(ConvolutionFunction, Image), ConvolutionError> {
    check_kernel_params(
        image,
        &KernelParams {
            w_planes: 1,
            w_step: None,
            oversampling,
            support,
            use_anti_aliasing: true,
        },
    )?;

    let (ny, nx) = (image.ny(), image.nx());
    let k1 = pswf_kernel_1d(oversampling, support);
    let width = 2 * support;
    let data = Array4::from_shape_fn((oversampling, oversampling, width, width), |(yf, xf, iy, ix)| {
        c64::new(k1[(yf, iy)] * k1[(xf, ix)], 0.0)
    });

    let centre = support - 1;
    let gy = grid_correction_1d(ny, |y_c| kernel_taper_1d(k1.view(), centre, ny, y_c));
    let gx = grid_correction_1d(nx, |x_c| kernel_taper_1d(k1.view(), centre, nx, x_c));
    let grid_correction = outer(&gy, &gx);
    let gcf_image = grid_correction_image(image, &grid_correction);
    trace!("Built a {width}x{width} PSWF kernel with {oversampling}x oversampling");

    Ok((
        ConvolutionFunction {
            slices: vec![KernelSlice {
                data,
                centre: [centre, centre],
            }],
            npol: 1,
            w_planes: Vec1::new(0.0),
            w_step: None,
            num_a_terms: 1,
            oversampling,
            cell: image.wcs.cell,
            image_shape: [ny, nx],
            grid_correction,
        },
        gcf_image,
    ))
}

/// Nearest-cell ("box car") gridding: a single tap, no oversampling, and a
/// sinc grid correction.
pub fn box_function(image: &Image) -> Result<(ConvolutionFunction, Image), ConvolutionError> {
    image.wcs.check_cell()?;
    let (ny, nx) = (image.ny(), image.nx());
    let sinc = |n: usize| {
        move |x_c: f64| {
            let a = std::f64::consts::PI * x_c / n as f64;
            if a == 0.0 {
                1.0
            } else {
                a.sin() / a
            }
        }
    };
    let grid_correction = outer(&grid_correction_1d(ny, sinc(ny)), &grid_correction_1d(nx, sinc(nx)));
    let gcf_image = grid_correction_image(image, &grid_correction);

    Ok((
        ConvolutionFunction {
            slices: vec![KernelSlice {
                data: Array4::from_elem((1, 1, 1, 1), c64::new(1.0, 0.0)),
                centre: [0, 0],
            }],
            npol: 1,
            w_planes: Vec1::new(0.0),
            w_step: None,
            num_a_terms: 1,
            oversampling: 1,
            cell: image.wcs.cell,
            image_shape: [ny, nx],
            grid_correction,
        },
        gcf_image,
    ))
}

/// The Fresnel w screen `exp(-2 pi i w (n - 1))` sampled on an `npixel` by
/// `npixel` grid spanning `fov` (x, y) radians. Directions beyond the celestial
/// sphere are zero.
pub fn w_beam(npixel: usize, fov: (f64, f64), w: f64) -> Array2<c64> {
    let (m, l) = coordinates2(npixel);
    Array2::from_shape_fn((npixel, npixel), |(y, x)| {
        let (l, m) = (l[(y, x)] * fov.0, m[(y, x)] * fov.1);
        let r2 = l * l + m * m;
        if r2 >= 1.0 {
            c64::default()
        } else {
            c64::cis(-TAU * w * ((1.0 - r2).sqrt() - 1.0))
        }
    })
}

/// Build a convolution function for `image`, correcting for the w term (with
/// `params.w_planes` planes spaced by `params.w_step`) and optionally
/// a-terms (primary-beam images with the same pixel grid as `image`; one, or
/// one per image channel). Also returns the grid-correction image.
///
/// With one w plane and no a-terms this is [`anti_aliasing_function`] (or
/// [`box_function`] without anti-aliasing). Otherwise each kernel slice is the
/// oversampled Fourier transform of the image-plane screen
/// `taper(l) taper(m) exp(-2 pi i w (n - 1)) a(l, m)`, computed on a coarse
/// "far-field" sampling of the image and normalised so that its zero-phase
/// taps sum to unit magnitude.
pub fn create_convolution_function(
    image: &Image,
    params: &KernelParams,
    a_terms: Option<&[Image]>,
) -> Result<(ConvolutionFunction, Image), ConvolutionError> {
    check_kernel_params(image, params)?;
    let KernelParams {
        w_planes: nw,
        w_step,
        oversampling,
        support,
        use_anti_aliasing,
    } = *params;

    if nw == 1 && a_terms.is_none() {
        return if use_anti_aliasing {
            anti_aliasing_function(image, oversampling, support)
        } else {
            box_function(image)
        };
    }

    let (ny, nx) = (image.ny(), image.nx());
    let (npol, na) = match a_terms {
        None => (1, 1),
        Some(terms) => {
            if terms.len() != 1 && terms.len() != image.nchan() {
                return Err(ConvolutionError::BadATermCount {
                    got: terms.len(),
                    nchan: image.nchan(),
                });
            }
            let npol = terms[0].npol();
            for term in terms {
                let got = (term.npol(), term.ny(), term.nx());
                if got != (npol, ny, nx) || (npol != 1 && npol != image.npol()) {
                    return Err(ConvolutionError::ATermShape {
                        expected: (npol, ny, nx),
                        got,
                    });
                }
            }
            (npol, terms.len())
        }
    };

    let step = w_step.unwrap_or(0.0);
    let half = (nw as f64 - 1.0) / 2.0;
    let w_centres: Vec<f64> = (0..nw).map(|k| (k as f64 - half) * step).collect();
    let w_planes = Vec1::try_from_vec(w_centres.clone()).map_err(|_| ConvolutionError::NoWPlanes)?;

    let width = 2 * support;
    let centre = support - 1;
    let far_field = (4 * width).max(MIN_FAR_FIELD_SIZE).next_multiple_of(2);
    let padded = far_field * oversampling;
    debug!(
        "Building {} w-projection kernel slices ({nw} w planes, {na} a-terms, {npol} pols); far field {far_field}, padded to {padded}",
        npol * nw * na
    );

    // The anti-aliasing taper, evaluated at the far-field sample positions.
    // It doesn't depend on the support.
    let pswf = pswf_kernel_1d(oversampling, PSWF_SUPPORT);
    let taper = |npixel: usize| -> Array1<f64> {
        Array1::from_shape_fn(far_field, |f| {
            if use_anti_aliasing {
                let x_c = (f as f64 - (far_field / 2) as f64) * npixel as f64 / far_field as f64;
                kernel_taper_1d(pswf.view(), PSWF_SUPPORT - 1, npixel, x_c)
            } else {
                1.0
            }
        })
    };
    let (taper_y, taper_x) = (taper(ny), taper(nx));

    // The kernel of the taper alone gives the grid correction.
    let k1_y = taper_kernel_1d(&taper_y, oversampling, centre, width);
    let k1_x = taper_kernel_1d(&taper_x, oversampling, centre, width);
    let gy = grid_correction_1d(ny, |y_c| kernel_taper_1d(k1_y.view(), centre, ny, y_c));
    let gx = grid_correction_1d(nx, |x_c| kernel_taper_1d(k1_x.view(), centre, nx, x_c));
    let grid_correction = outer(&gy, &gx);

    let fov = image.wcs.field_of_view(nx, ny);
    let jobs: Vec<(usize, usize, usize)> = (0..npol)
        .flat_map(|p| (0..nw).flat_map(move |w| (0..na).map(move |a| (p, w, a))))
        .collect();
    let slices: Vec<KernelSlice> = jobs
        .into_par_iter()
        .map(|(pol, iw, ia)| {
            let mut screen = w_beam(far_field, fov, w_centres[iw]);
            screen.indexed_iter_mut().for_each(|((fy, fx), s)| {
                *s *= taper_y[fy] * taper_x[fx];
            });
            if let Some(terms) = a_terms {
                let beam = terms[ia].data.slice(s![pol, 0, .., ..]);
                screen.indexed_iter_mut().for_each(|((fy, fx), s)| {
                    let y = far_field_to_pixel(fy, far_field, ny);
                    let x = far_field_to_pixel(fx, far_field, nx);
                    *s *= beam[(y, x)];
                });
            }

            let mut af = pad_mid(screen.view(), padded, padded);
            fft2(af.view_mut());
            let scale = 1.0 / (far_field * far_field) as f64;
            let mid = (padded / 2) as isize;
            let mut data = Array4::from_shape_fn(
                (oversampling, oversampling, width, width),
                |(yf, xf, iy, ix)| {
                    let qy = (centre as isize - iy as isize) * oversampling as isize + yf as isize;
                    let qx = (centre as isize - ix as isize) * oversampling as isize + xf as isize;
                    af[((mid + qy) as usize, (mid + qx) as usize)] * scale
                },
            );

            let norm = data.slice(s![0, 0, .., ..]).sum().norm();
            if norm > 0.0 {
                data.mapv_inplace(|v| v / norm);
            } else {
                warn!("Kernel slice (pol {pol}, w {iw}, a {ia}) has no zero-phase response; not normalising it");
            }
            KernelSlice {
                data,
                centre: [centre, centre],
            }
        })
        .collect();

    let gcf_image = grid_correction_image(image, &grid_correction);
    Ok((
        ConvolutionFunction {
            slices,
            npol,
            w_planes,
            w_step: if nw == 1 { None } else { Some(step) },
            num_a_terms: na,
            oversampling,
            cell: image.wcs.cell,
            image_shape: [ny, nx],
            grid_correction,
        },
        gcf_image,
    ))
}

/// The image pixel nearest to far-field sample `f`.
fn far_field_to_pixel(f: usize, far_field: usize, npixel: usize) -> usize {
    let x_c = (f as f64 - (far_field / 2) as f64) * npixel as f64 / far_field as f64;
    let x = (x_c + (npixel / 2) as f64).round();
    x.clamp(0.0, npixel as f64 - 1.0) as usize
}

/// The oversampled 1D kernel of a far-field taper, normalised so that its
/// zero-phase taps sum to 1. Shape (oversampling, width).
fn taper_kernel_1d(taper: &Array1<f64>, oversampling: usize, centre: usize, width: usize) -> Array2<c64> {
    let far_field = taper.len();
    let padded = far_field * oversampling;
    let mut af = Array1::<c64>::zeros(padded);
    let offset = padded / 2 - far_field / 2;
    for (i, &t) in taper.iter().enumerate() {
        af[offset + i] = c64::new(t, 0.0);
    }
    fft1(af.view_mut());

    let mid = (padded / 2) as isize;
    let mut k = Array2::from_shape_fn((oversampling, width), |(phase, i)| {
        let q = (centre as isize - i as isize) * oversampling as isize + phase as isize;
        af[(mid + q) as usize] / far_field as f64
    });
    let norm = k.row(0).sum().norm();
    if norm > 0.0 {
        k.mapv_inplace(|v| v / norm);
    }
    k
}
