// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Containers for visibilities, images and sky components, and the code that
//! creates them from an array configuration.

mod advice;
mod configuration;
mod error;
mod image;
mod polarisation;
mod skycomponent;
mod visibility;

pub use advice::{WideFieldAdvice, WideFieldAdvisor};
pub use configuration::{
    create_visibility, ArrayConfiguration, ConfigurationDescriptor, ObservationConfig,
};
pub use error::DataError;
pub use image::{create_image_from_visibility, Image, ImageQa};
pub use polarisation::{PolarisationFrame, POLARISATION_FRAMES};
pub use skycomponent::{insert_skycomponent, InsertMethod, SkyComponent};
pub use visibility::Visibilities;
