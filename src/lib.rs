// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Wide-field predict and invert for radio interferometric imaging.

Visibilities are turned into dirty images (and model images back into
visibilities) through convolutional gridding, with the w-term handled by one of
several decompositions (faceting, time slicing, w-stacking or w-projection).
Independent units of work are executed by a small [`scheduler`].
 */

pub mod constants;
pub mod context;
pub mod convolution;
pub mod coord;
pub mod data;
mod error;
pub mod gridding;
pub mod imaging;
pub mod params;
pub mod scheduler;

#[cfg(test)]
mod tests;

use crossbeam_utils::atomic::AtomicCell;

// Re-exports.
pub use context::{Decomposition, DecompositionUnit, ImagingContext, UnitKind};
pub use convolution::{clip_convolution_function, create_convolution_function, ConvolutionFunction};
pub use coord::WorldCoordinates;
pub use data::{
    create_image_from_visibility, create_visibility, Image, PolarisationFrame, SkyComponent,
    Visibilities,
};
pub use error::ImagingError;
pub use imaging::{invert, predict, predict_skycomponent, residual, subtract_visibility};
pub use params::{ImagingArgs, ImagingParams};
pub use scheduler::{Scattered, Scheduler, TaskGraph};

/// Should progress bars be drawn? This is false by default so that library
/// users don't get surprise output.
pub static PROGRESS_BARS: AtomicCell<bool> = AtomicCell::new(false);

/// Activate a logger. All log messages are put onto `stdout`. `env_logger`
/// automatically only uses colours and fancy symbols if we're on a tty (e.g. a
/// terminal); piped output will be formatted sensibly. Source code lines are
/// displayed in log messages when verbosity >= 3.
pub fn setup_logging(verbosity: u8) -> Result<(), log::SetLoggerError> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.target(env_logger::Target::Stdout);
    builder.format_target(false);
    match verbosity {
        0 => builder.filter_level(log::LevelFilter::Info),
        1 => builder.filter_level(log::LevelFilter::Debug),
        2 => builder.filter_level(log::LevelFilter::Trace),
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
            builder.format(|buf, record| {
                use std::io::Write;

                let timestamp = buf.timestamp();
                let level = record.level();
                let target = record.target();
                let line = record.line().unwrap_or(0);
                let message = record.args();

                writeln!(buf, "[{timestamp} {level} {target}:{line}] {message}")
            })
        }
    };
    builder.try_init()
}
