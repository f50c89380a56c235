// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

use super::ARG_FILE_TYPES_COMMA_SEPARATED;
use crate::{
    context::ContextError,
    convolution::{ClippingError, ConvolutionError},
};

#[derive(Error, Debug)]
pub enum ImagingArgsError {
    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Convolution(#[from] ConvolutionError),

    #[error(transparent)]
    Clipping(#[from] ClippingError),

    #[error("Argument file '{0}' doesn't have a recognised file extension! Valid extensions are: {}", *ARG_FILE_TYPES_COMMA_SEPARATED)]
    UnrecognisedArgFileExt(String),

    #[error("Argument file '{0}' doesn't exist")]
    ArgFile(String),

    #[error("Couldn't decode toml structure from '{file}':\n{err}")]
    TomlDecode { file: String, err: String },

    #[error("Couldn't decode json structure from '{file}':\n{err}")]
    JsonDecode { file: String, err: String },

    #[error("Invalid value '{value}' for {arg}; expected {expected}")]
    InvalidValue {
        arg: &'static str,
        value: String,
        expected: String,
    },

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
