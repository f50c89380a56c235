// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all imaging-related errors. This should be the *only* error
//! enum that is publicly visible from the engines.

use thiserror::Error;

use crate::{
    context::ContextError,
    convolution::{ClippingError, ConvolutionError},
    coord::WcsError,
    data::DataError,
    gridding::GriddingError,
    params::ImagingArgsError,
    scheduler::SchedulerError,
};

#[derive(Error, Debug)]
pub enum ImagingError {
    /// Invalid geometry or kernel parameters.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A clipping threshold that is too aggressive for the kernel support.
    #[error("Clipping error: {0}")]
    Clipping(String),

    /// An unknown decomposition tag.
    #[error("{0}")]
    UnsupportedContext(String),

    /// w-projection was requested without a convolution function.
    #[error("The 'wprojection' context requires a convolution function, but none was supplied")]
    MissingKernel,

    /// Visibility and image geometry don't agree with what was requested.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A unit of work panicked. The scheduler reports this as the source of
    /// a [`ImagingError::TaskFailure`].
    #[error("Panicked: {0}")]
    Panicked(String),

    /// A unit of work failed while the scheduler was executing it. No partial
    /// results are kept.
    #[error("Unit {index} ({unit}) failed: {source}")]
    TaskFailure {
        index: usize,
        unit: String,
        source: Box<ImagingError>,
    },
}

// When changing the error propagation below, ensure `Self::from(e)` uses the
// correct `e`!

impl From<WcsError> for ImagingError {
    fn from(e: WcsError) -> Self {
        let s = e.to_string();
        match e {
            WcsError::InvalidCell { .. }
            | WcsError::InvalidReferenceFrequency(_)
            | WcsError::FieldOfView { .. } => Self::Configuration(s),
            WcsError::BelowHorizon { .. } => Self::ShapeMismatch(s),
        }
    }
}

impl From<ConvolutionError> for ImagingError {
    fn from(e: ConvolutionError) -> Self {
        let s = e.to_string();
        match e {
            ConvolutionError::NoWPlanes
            | ConvolutionError::NoWStep
            | ConvolutionError::BadWStep(_)
            | ConvolutionError::ZeroOversampling
            | ConvolutionError::ZeroSupport
            | ConvolutionError::SupportTooLarge { .. }
            | ConvolutionError::BadATermCount { .. }
            | ConvolutionError::ATermShape { .. } => Self::Configuration(s),
            ConvolutionError::Wcs(e) => Self::from(e),
        }
    }
}

impl From<ClippingError> for ImagingError {
    fn from(e: ClippingError) -> Self {
        let s = e.to_string();
        match e {
            ClippingError::BadLevel(_) => Self::Configuration(s),
            ClippingError::TooAggressive { .. } | ClippingError::ZeroPeak { .. } => {
                Self::Clipping(s)
            }
        }
    }
}

impl From<GriddingError> for ImagingError {
    fn from(e: GriddingError) -> Self {
        let s = e.to_string();
        match e {
            GriddingError::OutOfGrid { .. }
            | GriddingError::NoChannel { .. }
            | GriddingError::WOutOfRange { .. }
            | GriddingError::PolMismatch { .. }
            | GriddingError::KernelPols { .. }
            | GriddingError::KernelATerms { .. }
            | GriddingError::KernelGeometry { .. } => Self::ShapeMismatch(s),
        }
    }
}

impl From<ContextError> for ImagingError {
    fn from(e: ContextError) -> Self {
        let s = e.to_string();
        match e {
            ContextError::Unsupported(_) => Self::UnsupportedContext(s),
            ContextError::MissingKernel => Self::MissingKernel,
            ContextError::ZeroFacets | ContextError::ZeroSlices => Self::Configuration(s),
            ContextError::FacetsDontDivide { .. }
            | ContextError::TooManySlices { .. }
            | ContextError::WNotCovered { .. }
            | ContextError::KernelCell { .. } => Self::ShapeMismatch(s),
            ContextError::Gridding(e) => Self::from(e),
        }
    }
}

impl From<SchedulerError> for ImagingError {
    fn from(e: SchedulerError) -> Self {
        match e {
            SchedulerError::TaskFailure {
                index,
                label,
                source,
            } => Self::TaskFailure {
                index,
                unit: label,
                source,
            },
        }
    }
}

impl From<DataError> for ImagingError {
    fn from(e: DataError) -> Self {
        let s = e.to_string();
        match e {
            DataError::ImageShape { .. }
            | DataError::VisShape { .. }
            | DataError::RegionOutOfBounds { .. }
            | DataError::ImagesDiffer => Self::ShapeMismatch(s),
            DataError::NoBaselines
            | DataError::NoFrequencies
            | DataError::CellTooLarge { .. }
            | DataError::ZeroPixels => Self::Configuration(s),
            DataError::Wcs(e) => Self::from(e),
        }
    }
}

impl From<ImagingArgsError> for ImagingError {
    fn from(e: ImagingArgsError) -> Self {
        let s = e.to_string();
        match e {
            ImagingArgsError::Context(e) => Self::from(e),
            ImagingArgsError::Convolution(e) => Self::from(e),
            ImagingArgsError::Clipping(e) => Self::from(e),
            ImagingArgsError::UnrecognisedArgFileExt(_)
            | ImagingArgsError::ArgFile(_)
            | ImagingArgsError::TomlDecode { .. }
            | ImagingArgsError::JsonDecode { .. }
            | ImagingArgsError::InvalidValue { .. }
            | ImagingArgsError::IO(_) => Self::Configuration(s),
        }
    }
}
