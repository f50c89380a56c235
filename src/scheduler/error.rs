// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::ImagingError;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Unit {index} ({label}) failed: {source}")]
    TaskFailure {
        index: usize,
        label: String,
        source: Box<ImagingError>,
    },
}
