// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Imaging parameters.
//!
//! [`ImagingArgs`] is unparsed, user-facing configuration; every field is
//! optional so that arguments can come from several places (a file, a
//! caller, advice about the observation) and be merged. Parsing produces
//! [`ImagingParams`], whose values have been validated and are ready to be
//! used directly.

mod error;

pub use error::ImagingArgsError;

use std::{fs::File, io::Read, path::Path, str::FromStr, sync::Arc};

use itertools::Itertools;
use log::{debug, trace};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use crate::{
    constants::{DEFAULT_CLIP_LEVEL, DEFAULT_NPIXEL, DEFAULT_OVERSAMPLING, DEFAULT_SUPPORT},
    context::{ContextError, Decomposition, ImagingContext},
    convolution::{
        clip_convolution_function, create_convolution_function, ClippingError, ConvolutionError,
        ConvolutionFunction, KernelParams,
    },
    data::{create_image_from_visibility, Image, Visibilities, WideFieldAdvice},
    gridding::{weight_visibility, Weighting, WEIGHTINGS},
    imaging::{self, GriddingOptions},
    scheduler::Scheduler,
    ImagingError,
};

lazy_static::lazy_static! {
    pub(crate) static ref ARG_FILE_TYPES_COMMA_SEPARATED: String = ArgFileTypes::iter().join(", ");
}

#[derive(Debug, Display, EnumIter, EnumString)]
enum ArgFileTypes {
    #[strum(serialize = "toml")]
    Toml,
    #[strum(serialize = "json")]
    Json,
}

/// Arguments for predict and invert. Anything not given is defaulted when
/// parsed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImagingArgs {
    /// The decomposition to use: one of 2d, facets, timeslice, wstack,
    /// facets_wstack or wprojection. Default: 2d
    pub context: Option<String>,

    /// The number of pixels along each image axis.
    pub npixel: Option<usize>,

    /// The pixel size \[radians\]. If not given, half of the critical cell size
    /// of the longest baseline is used.
    pub cellsize: Option<f64>,

    /// The number of facets along each image axis (facets and facets_wstack
    /// contexts only).
    pub facets: Option<usize>,

    /// The number of time or w slices (timeslice, wstack and facets_wstack
    /// contexts only).
    pub vis_slices: Option<usize>,

    /// The number of w-projection planes. With wstack, more than one plane
    /// corrects the w within each slice.
    pub w_planes: Option<usize>,

    /// The spacing of w-projection planes \[wavelengths\].
    pub w_step: Option<f64>,

    pub oversampling: Option<usize>,
    pub support: Option<usize>,
    pub use_anti_aliasing: Option<bool>,

    /// Kernel taps below this fraction of each kernel's peak are clipped.
    pub clip_level: Option<f64>,

    /// natural or uniform.
    pub weighting: Option<String>,

    /// The number of scheduler workers. 0 means one per CPU.
    pub num_workers: Option<usize>,

    /// Make point-spread functions rather than dirty images.
    pub dopsf: Option<bool>,

    /// Divide dirty images by their sums of weights.
    pub normalize: Option<bool>,
}

impl ImagingArgs {
    /// Read arguments from a toml or json file.
    pub fn from_file<P: AsRef<Path>>(arg_file: P) -> Result<Self, ImagingArgsError> {
        let arg_file = arg_file.as_ref();
        debug!("Attempting to parse argument file {}", arg_file.display());
        let file = arg_file.display().to_string();

        let arg_file_type = arg_file
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .and_then(|e| ArgFileTypes::from_str(&e).ok())
            .ok_or_else(|| ImagingArgsError::UnrecognisedArgFileExt(file.clone()))?;
        if !arg_file.exists() {
            return Err(ImagingArgsError::ArgFile(file));
        }

        let mut contents = String::new();
        let mut fh = File::open(arg_file)?;
        fh.read_to_string(&mut contents)?;
        match arg_file_type {
            ArgFileTypes::Toml => {
                debug!("Parsing toml file...");
                toml::from_str(&contents).map_err(|err| ImagingArgsError::TomlDecode {
                    file,
                    err: err.to_string(),
                })
            }
            ArgFileTypes::Json => {
                debug!("Parsing json file...");
                serde_json::from_str(&contents).map_err(|err| ImagingArgsError::JsonDecode {
                    file,
                    err: err.to_string(),
                })
            }
        }
    }

    /// Combine two sets of arguments, preferring `self`'s when both are set.
    pub fn merge(self, other: Self) -> Self {
        Self {
            context: self.context.or(other.context),
            npixel: self.npixel.or(other.npixel),
            cellsize: self.cellsize.or(other.cellsize),
            facets: self.facets.or(other.facets),
            vis_slices: self.vis_slices.or(other.vis_slices),
            w_planes: self.w_planes.or(other.w_planes),
            w_step: self.w_step.or(other.w_step),
            oversampling: self.oversampling.or(other.oversampling),
            support: self.support.or(other.support),
            use_anti_aliasing: self.use_anti_aliasing.or(other.use_anti_aliasing),
            clip_level: self.clip_level.or(other.clip_level),
            weighting: self.weighting.or(other.weighting),
            num_workers: self.num_workers.or(other.num_workers),
            dopsf: self.dopsf.or(other.dopsf),
            normalize: self.normalize.or(other.normalize),
        }
    }

    /// Fill any unset geometry from advice about the observation. The advised
    /// w planes are only taken for w-projection.
    pub fn apply_advice(self, advice: &WideFieldAdvice) -> Self {
        trace!("Applying advice {advice:?}");
        let wprojection = self.context.as_deref() == Some("wprojection");
        Self {
            npixel: self.npixel.or(Some(advice.npixels)),
            cellsize: self.cellsize.or(Some(advice.cellsize)),
            vis_slices: self.vis_slices.or(Some(advice.vis_slices)),
            w_planes: self
                .w_planes
                .or_else(|| wprojection.then_some(advice.wprojection_planes)),
            w_step: self.w_step.or(advice.w_step.filter(|_| wprojection)),
            ..self
        }
    }

    pub fn parse(self) -> Result<ImagingParams, ImagingArgsError> {
        debug!("{:#?}", self);

        // Expose all the struct fields to ensure they're all used.
        let ImagingArgs {
            context,
            npixel,
            cellsize,
            facets,
            vis_slices,
            w_planes,
            w_step,
            oversampling,
            support,
            use_anti_aliasing,
            clip_level,
            weighting,
            num_workers,
            dopsf,
            normalize,
        } = self;

        let context = match context {
            Some(tag) => ImagingContext::parse(&tag)?,
            None => ImagingContext::TwoD,
        };

        let npixel = npixel.unwrap_or(DEFAULT_NPIXEL);
        if npixel == 0 {
            return Err(ImagingArgsError::InvalidValue {
                arg: "npixel",
                value: npixel.to_string(),
                expected: "a positive number of pixels".to_string(),
            });
        }
        if let Some(c) = cellsize {
            if !c.is_finite() || c <= 0.0 {
                return Err(ImagingArgsError::InvalidValue {
                    arg: "cellsize",
                    value: c.to_string(),
                    expected: "a positive cell size in radians".to_string(),
                });
            }
        }

        let facets = facets.unwrap_or(1);
        let vis_slices = vis_slices.unwrap_or(1);
        match context {
            ImagingContext::Facets | ImagingContext::FacetsWStack if facets == 0 => {
                return Err(ContextError::ZeroFacets.into())
            }
            ImagingContext::Timeslice | ImagingContext::WStack | ImagingContext::FacetsWStack
                if vis_slices == 0 =>
            {
                return Err(ContextError::ZeroSlices.into())
            }
            _ => (),
        }

        // Only w-projection and w-stacking have more than one w plane.
        let multi_plane = matches!(
            context,
            ImagingContext::WProjection | ImagingContext::WStack
        );
        let kernel = KernelParams {
            w_planes: if multi_plane { w_planes.unwrap_or(1) } else { 1 },
            w_step: if multi_plane { w_step } else { None },
            oversampling: oversampling.unwrap_or(DEFAULT_OVERSAMPLING),
            support: support.unwrap_or(DEFAULT_SUPPORT),
            use_anti_aliasing: use_anti_aliasing.unwrap_or(true),
        };
        if kernel.w_planes == 0 {
            return Err(ConvolutionError::NoWPlanes.into());
        }
        match kernel.w_step {
            None if kernel.w_planes > 1 => return Err(ConvolutionError::NoWStep.into()),
            Some(s) if !s.is_finite() || s <= 0.0 => {
                return Err(ConvolutionError::BadWStep(s).into())
            }
            _ => (),
        }
        if kernel.oversampling == 0 {
            return Err(ConvolutionError::ZeroOversampling.into());
        }
        if kernel.support == 0 {
            return Err(ConvolutionError::ZeroSupport.into());
        }

        let clip_level = clip_level.unwrap_or(DEFAULT_CLIP_LEVEL);
        if !clip_level.is_finite() || clip_level < 0.0 {
            return Err(ClippingError::BadLevel(clip_level).into());
        }

        let weighting = match weighting {
            Some(w) => {
                Weighting::from_str(&w.to_lowercase()).map_err(|_| ImagingArgsError::InvalidValue {
                    arg: "weighting",
                    value: w,
                    expected: format!("one of: {}", *WEIGHTINGS),
                })?
            }
            None => Weighting::Natural,
        };

        Ok(ImagingParams {
            context,
            npixel,
            cellsize,
            facets,
            vis_slices,
            kernel,
            clip_level,
            weighting,
            num_workers: num_workers.unwrap_or(0),
            dopsf: dopsf.unwrap_or(false),
            normalize: normalize.unwrap_or(true),
        })
    }
}

/// Validated imaging parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagingParams {
    pub context: ImagingContext,
    pub npixel: usize,
    pub cellsize: Option<f64>,
    pub facets: usize,
    pub vis_slices: usize,
    pub kernel: KernelParams,
    pub clip_level: f64,
    pub weighting: Weighting,
    pub num_workers: usize,
    pub dopsf: bool,
    pub normalize: bool,
}

impl ImagingParams {
    /// The options for the kernels that contexts other than w-projection
    /// build for themselves.
    pub fn gridding_options(&self) -> GriddingOptions {
        GriddingOptions {
            oversampling: self.kernel.oversampling,
            support: self.kernel.support,
            use_anti_aliasing: self.kernel.use_anti_aliasing,
        }
    }

    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(self.num_workers)
    }

    /// An empty (multi-frequency synthesis) image for `vis`.
    pub fn template(&self, vis: &Visibilities) -> Result<Image, ImagingError> {
        Ok(create_image_from_visibility(vis, self.npixel, self.cellsize, true)?)
    }

    /// The decomposition for imaging onto `template`. For w-projection, and
    /// w-stacking with more than one w plane, this builds (and, if asked,
    /// clips) the kernel.
    pub fn decomposition(&self, template: &Image) -> Result<Decomposition, ImagingArgsError> {
        let kernel = match self.context {
            ImagingContext::WProjection => Some(self.w_kernel(template)?),
            ImagingContext::WStack if self.kernel.w_planes > 1 => Some(self.w_kernel(template)?),
            _ => None,
        };
        Ok(Decomposition::new(
            self.context,
            self.facets,
            self.vis_slices,
            kernel,
        )?)
    }

    fn w_kernel(&self, template: &Image) -> Result<Arc<ConvolutionFunction>, ImagingArgsError> {
        let (kernel, _) = create_convolution_function(template, &self.kernel, None)?;
        let kernel = if self.clip_level > 0.0 {
            clip_convolution_function(&kernel, self.clip_level)?
        } else {
            kernel
        };
        Ok(Arc::new(kernel))
    }

    /// A copy of `vis` with imaging weights set by this weighting. Uniform
    /// weights are found on the grid of `template`.
    pub fn weight(
        &self,
        vis: &Visibilities,
        template: &Image,
    ) -> Result<Visibilities, ImagingError> {
        Ok(weight_visibility(vis, template, self.weighting)?)
    }

    /// Predict visibilities for the geometry of `vis` from `model` with this
    /// decomposition.
    pub fn predict(
        &self,
        scheduler: &Scheduler,
        vis: &Visibilities,
        model: &Image,
    ) -> Result<Visibilities, ImagingError> {
        let decomposition = self.decomposition(model)?;
        imaging::predict(scheduler, &decomposition, vis, model, &self.gridding_options())
    }

    /// Weight `vis`, then make its dirty image (or PSF, if `dopsf` is set) on
    /// the pixels of `template` with this decomposition. Returns the image
    /// and its sum of weights per (pol, chan) plane.
    pub fn invert(
        &self,
        scheduler: &Scheduler,
        vis: &Visibilities,
        template: &Image,
    ) -> Result<(Image, Array2<f64>), ImagingError> {
        let decomposition = self.decomposition(template)?;
        let weighted = self.weight(vis, template)?;
        imaging::invert(
            scheduler,
            &decomposition,
            &weighted,
            template,
            &self.gridding_options(),
            self.dopsf,
            self.normalize,
        )
    }
}
