// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Imaging contexts: how a predict or invert is split into independent units of
work.
 */

mod error;
#[cfg(test)]
mod tests;

pub use error::ContextError;

use std::{borrow::Cow, fmt, str::FromStr, sync::Arc};

use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{
    convolution::ConvolutionFunction,
    data::{Image, Visibilities},
    gridding::check_coverage,
};

/// The tag selecting a decomposition.
#[derive(
    Debug,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
)]
pub enum ImagingContext {
    /// The whole image and every visibility in one unit.
    #[strum(serialize = "2d")]
    #[serde(rename = "2d")]
    TwoD,

    /// Image-plane tiles.
    #[strum(serialize = "facets")]
    #[serde(rename = "facets")]
    Facets,

    /// Ranges of time.
    #[strum(serialize = "timeslice")]
    #[serde(rename = "timeslice")]
    Timeslice,

    /// Ranges of w.
    #[strum(serialize = "wstack")]
    #[serde(rename = "wstack")]
    WStack,

    /// Image-plane tiles, each split into ranges of w.
    #[strum(serialize = "facets_wstack")]
    #[serde(rename = "facets_wstack")]
    FacetsWStack,

    /// One unit, with the w term absorbed by a multi-plane convolution
    /// function.
    #[strum(serialize = "wprojection")]
    #[serde(rename = "wprojection")]
    WProjection,
}

lazy_static::lazy_static! {
    pub static ref IMAGING_CONTEXTS: String = ImagingContext::iter().join(", ");
}

impl ImagingContext {
    pub fn parse(tag: &str) -> Result<Self, ContextError> {
        Self::from_str(tag).map_err(|_| ContextError::Unsupported(tag.to_string()))
    }
}

/// A validated decomposition, carrying its parameters.
#[derive(Debug, Clone)]
pub enum Decomposition {
    TwoD,
    Facets {
        /// Facets per image axis.
        facets: usize,
    },
    Timeslice {
        vis_slices: usize,
    },
    WStack {
        vis_slices: usize,

        /// Corrects the w remaining within each slice, measured from the
        /// slice's mean w.
        kernel: Option<Arc<ConvolutionFunction>>,
    },
    FacetsWStack {
        facets: usize,
        vis_slices: usize,
    },
    WProjection {
        kernel: Arc<ConvolutionFunction>,
    },
}

impl Decomposition {
    /// Parameters that a context doesn't use are ignored. The kernel is
    /// required for w-projection and optional for w-stacking.
    pub fn new(
        context: ImagingContext,
        facets: usize,
        vis_slices: usize,
        kernel: Option<Arc<ConvolutionFunction>>,
    ) -> Result<Self, ContextError> {
        let d = match context {
            ImagingContext::TwoD => Self::TwoD,
            ImagingContext::Facets | ImagingContext::FacetsWStack if facets == 0 => {
                return Err(ContextError::ZeroFacets)
            }
            ImagingContext::Facets => Self::Facets { facets },
            ImagingContext::Timeslice | ImagingContext::WStack | ImagingContext::FacetsWStack
                if vis_slices == 0 =>
            {
                return Err(ContextError::ZeroSlices)
            }
            ImagingContext::Timeslice => Self::Timeslice { vis_slices },
            ImagingContext::WStack => Self::WStack { vis_slices, kernel },
            ImagingContext::FacetsWStack => Self::FacetsWStack { facets, vis_slices },
            ImagingContext::WProjection => Self::WProjection {
                kernel: kernel.ok_or(ContextError::MissingKernel)?,
            },
        };
        Ok(d)
    }

    pub fn context(&self) -> ImagingContext {
        match self {
            Self::TwoD => ImagingContext::TwoD,
            Self::Facets { .. } => ImagingContext::Facets,
            Self::Timeslice { .. } => ImagingContext::Timeslice,
            Self::WStack { .. } => ImagingContext::WStack,
            Self::FacetsWStack { .. } => ImagingContext::FacetsWStack,
            Self::WProjection { .. } => ImagingContext::WProjection,
        }
    }

    /// The kernel shared by every unit, if the decomposition has one.
    pub fn kernel(&self) -> Option<&ConvolutionFunction> {
        match self {
            Self::WProjection { kernel }
            | Self::WStack {
                kernel: Some(kernel),
                ..
            } => Some(kernel.as_ref()),
            _ => None,
        }
    }

    /// Split imaging `vis` onto (or from) `image` into units. Everything that
    /// can be known about the units' validity is checked here, so that a
    /// request with bad geometry fails before any work is done.
    pub fn units(
        &self,
        vis: &Visibilities,
        image: &Image,
    ) -> Result<Vec<DecompositionUnit>, ContextError> {
        let units = match self {
            Self::TwoD => vec![DecompositionUnit::whole()],

            Self::Facets { facets } => facet_regions(image, *facets)?
                .into_iter()
                .enumerate()
                .map(|(index, (x0, y0, nx, ny))| DecompositionUnit {
                    index,
                    kind: UnitKind::Facet { x0, y0, nx, ny },
                    vis_indices: None,
                })
                .collect(),

            Self::Timeslice { vis_slices } => time_slices(vis, *vis_slices)?,

            Self::WStack { vis_slices, kernel } => {
                let units = w_slices(vis, *vis_slices)?;
                if let Some(kernel) = kernel {
                    for unit in &units {
                        if let Some(w_mean) = unit.kind.w_mean() {
                            let residual = unit.visibilities(vis).w_relative_to(w_mean);
                            check_projection_kernel(kernel, &residual, image)?;
                        }
                    }
                }
                units
            }

            Self::FacetsWStack { facets, vis_slices } => {
                let regions = facet_regions(image, *facets)?;
                let bins = w_bins(vis, *vis_slices)?;
                regions
                    .into_iter()
                    .cartesian_product(bins)
                    .enumerate()
                    .map(|(index, ((x0, y0, nx, ny), bin))| DecompositionUnit {
                        index,
                        kind: UnitKind::FacetWSlice {
                            x0,
                            y0,
                            nx,
                            ny,
                            w_min: bin.w_min,
                            w_max: bin.w_max,
                            w_mean: bin.w_mean,
                        },
                        vis_indices: Some(bin.indices),
                    })
                    .collect()
            }

            Self::WProjection { kernel } => {
                check_projection_kernel(kernel, vis, image)?;
                vec![DecompositionUnit::whole()]
            }
        };
        debug!(
            "'{}' decomposition: {} unit(s) for {} visibilities",
            self.context(),
            units.len(),
            vis.len()
        );
        Ok(units)
    }
}

/// What part of the problem a unit covers.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitKind {
    /// Everything.
    Whole,

    /// An `nx` by `ny` region of the image starting at pixel `(x0, y0)`, with
    /// every visibility.
    Facet {
        x0: usize,
        y0: usize,
        nx: usize,
        ny: usize,
    },

    /// The visibilities with times in `start..=end` \[seconds\].
    TimeSlice { start: f64, end: f64 },

    /// The visibilities with w in `w_min..=w_max` \[wavelengths\]; `w_mean` is
    /// their average w.
    WSlice { w_min: f64, w_max: f64, w_mean: f64 },

    /// The region of a [`UnitKind::Facet`] imaged from the visibilities of a
    /// [`UnitKind::WSlice`].
    FacetWSlice {
        x0: usize,
        y0: usize,
        nx: usize,
        ny: usize,
        w_min: f64,
        w_max: f64,
        w_mean: f64,
    },
}

impl UnitKind {
    /// The image region `(x0, y0, nx, ny)` of a unit covering only part of
    /// the image.
    pub fn region(&self) -> Option<(usize, usize, usize, usize)> {
        match *self {
            Self::Facet { x0, y0, nx, ny } | Self::FacetWSlice { x0, y0, nx, ny, .. } => {
                Some((x0, y0, nx, ny))
            }
            _ => None,
        }
    }

    /// The mean w \[wavelengths\] of a unit's w slice.
    pub fn w_mean(&self) -> Option<f64> {
        match *self {
            Self::WSlice { w_mean, .. } | Self::FacetWSlice { w_mean, .. } => Some(w_mean),
            _ => None,
        }
    }
}

/// One independently computable piece of a predict or invert.
#[derive(Debug, Clone)]
pub struct DecompositionUnit {
    /// The position of this unit among its decomposition's units. Results are
    /// reduced in this order.
    pub index: usize,

    pub kind: UnitKind,

    /// The rows of the visibilities this unit covers; `None` means all of
    /// them.
    pub vis_indices: Option<Vec<usize>>,
}

impl DecompositionUnit {
    fn whole() -> Self {
        Self {
            index: 0,
            kind: UnitKind::Whole,
            vis_indices: None,
        }
    }

    /// The visibilities of this unit.
    pub fn visibilities<'a>(&self, vis: &'a Visibilities) -> Cow<'a, Visibilities> {
        match &self.vis_indices {
            None => Cow::Borrowed(vis),
            Some(indices) => Cow::Owned(vis.select(indices)),
        }
    }

    pub fn num_vis(&self, vis: &Visibilities) -> usize {
        self.vis_indices
            .as_ref()
            .map(|i| i.len())
            .unwrap_or_else(|| vis.len())
    }
}

impl fmt::Display for DecompositionUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            UnitKind::Whole => write!(f, "unit {}", self.index),
            UnitKind::Facet { x0, y0, nx, ny } => {
                write!(f, "facet {} ({nx}x{ny} at x={x0}, y={y0})", self.index)
            }
            UnitKind::TimeSlice { start, end } => {
                write!(f, "time slice {} ({start:.1}s to {end:.1}s)", self.index)
            }
            UnitKind::WSlice { w_min, w_max, .. } => {
                write!(f, "w slice {} (w {w_min:.1} to {w_max:.1})", self.index)
            }
            UnitKind::FacetWSlice {
                x0,
                y0,
                nx,
                ny,
                w_min,
                w_max,
                ..
            } => write!(
                f,
                "facet w slice {} ({nx}x{ny} at x={x0}, y={y0}, w {w_min:.1} to {w_max:.1})",
                self.index
            ),
        }
    }
}

/// The `(x0, y0, nx, ny)` regions of `n` by `n` equal facets of `image`, row
/// by row.
fn facet_regions(
    image: &Image,
    n: usize,
) -> Result<Vec<(usize, usize, usize, usize)>, ContextError> {
    let (nx, ny) = (image.nx(), image.ny());
    if nx % n != 0 || ny % n != 0 {
        return Err(ContextError::FacetsDontDivide { facets: n, nx, ny });
    }
    let (fnx, fny) = (nx / n, ny / n);
    Ok((0..n)
        .cartesian_product(0..n)
        .map(|(fy, fx)| (fx * fnx, fy * fny, fnx, fny))
        .collect())
}

/// A multi-plane kernel must share the image's cell, cover every w of `vis`
/// and keep every visibility's footprint on the grid.
fn check_projection_kernel(
    kernel: &ConvolutionFunction,
    vis: &Visibilities,
    image: &Image,
) -> Result<(), ContextError> {
    let [kx, ky] = kernel.cell;
    let [ix, iy] = image.wcs.cell;
    if (kx - ix).abs() > 1e-9 * ix.abs() || (ky - iy).abs() > 1e-9 * iy.abs() {
        return Err(ContextError::KernelCell {
            kernel: kernel.cell,
            image: image.wcs.cell,
        });
    }
    let (min, max) = kernel.w_range();
    let max_w = vis.max_abs_w();
    if max_w > max || -max_w < min {
        return Err(ContextError::WNotCovered { max_w, min, max });
    }
    check_coverage(
        vis,
        &image.wcs,
        (image.nchan(), image.ny(), image.nx()),
        Some(kernel),
    )?;
    Ok(())
}

/// Split the unique times of `vis` into `n` contiguous groups whose sizes
/// differ by at most one; the first groups get the extras.
fn time_slices(vis: &Visibilities, n: usize) -> Result<Vec<DecompositionUnit>, ContextError> {
    let times = vis.unique_times();
    if n > times.len() {
        return Err(ContextError::TooManySlices {
            slices: n,
            available: times.len(),
            what: "unique times",
        });
    }

    let (per, extra) = (times.len() / n, times.len() % n);
    let mut units = Vec::with_capacity(n);
    let mut first = 0;
    for index in 0..n {
        let count = per + usize::from(index < extra);
        let (start, end) = (times[first], times[first + count - 1]);
        first += count;
        let vis_indices = vis
            .time
            .iter()
            .enumerate()
            .filter(|&(_, &t)| t >= start && t <= end)
            .map(|(i, _)| i)
            .collect();
        units.push(DecompositionUnit {
            index,
            kind: UnitKind::TimeSlice { start, end },
            vis_indices: Some(vis_indices),
        });
    }
    Ok(units)
}

/// Split `vis` into `n` equal-width slices of w. Empty slices are dropped.
fn w_slices(vis: &Visibilities, n: usize) -> Result<Vec<DecompositionUnit>, ContextError> {
    Ok(w_bins(vis, n)?
        .into_iter()
        .enumerate()
        .map(|(index, bin)| DecompositionUnit {
            index,
            kind: UnitKind::WSlice {
                w_min: bin.w_min,
                w_max: bin.w_max,
                w_mean: bin.w_mean,
            },
            vis_indices: Some(bin.indices),
        })
        .collect())
}

#[derive(Clone)]
struct WBin {
    w_min: f64,
    w_max: f64,
    w_mean: f64,
    indices: Vec<usize>,
}

fn w_bins(vis: &Visibilities, n: usize) -> Result<Vec<WBin>, ContextError> {
    if n > vis.len() {
        return Err(ContextError::TooManySlices {
            slices: n,
            available: vis.len(),
            what: "visibilities",
        });
    }

    let (w_lo, w_hi) = vis
        .uvw
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), uvw| {
            (lo.min(uvw.w), hi.max(uvw.w))
        });
    let width = (w_hi - w_lo) / n as f64;
    let mut bins: Vec<Vec<usize>> = vec![vec![]; n];
    for (i, uvw) in vis.uvw.iter().enumerate() {
        let bin = if width > 0.0 {
            (((uvw.w - w_lo) / width).floor() as usize).min(n - 1)
        } else {
            0
        };
        bins[bin].push(i);
    }

    let mut kept = vec![];
    for (bin, indices) in bins.into_iter().enumerate() {
        if indices.is_empty() {
            debug!("w bin {bin} is empty; skipping it");
            continue;
        }
        let w_mean = indices.iter().map(|&i| vis.uvw[i].w).sum::<f64>() / indices.len() as f64;
        kept.push(WBin {
            w_min: w_lo + bin as f64 * width,
            w_max: w_lo + (bin + 1) as f64 * width,
            w_mean,
            indices,
        });
    }
    Ok(kept)
}
