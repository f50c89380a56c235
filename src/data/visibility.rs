// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use marlu::{c64, RADec, UVW};
use ndarray::prelude::*;

use super::{DataError, PolarisationFrame};

/// A set of visibilities, stored as a structure of arrays. Row `i` of every
/// field describes the same (baseline, time, frequency) sample; the second
/// axis of the 2D arrays is polarisation.
#[derive(Debug, Clone)]
pub struct Visibilities {
    /// \[wavelengths\]
    pub uvw: Vec<UVW>,

    /// \[seconds\]
    pub time: Vec<f64>,

    /// \[Hz\]
    pub frequency: Vec<f64>,

    /// \[Hz\]
    pub channel_bandwidth: Vec<f64>,

    /// \[seconds\]
    pub integration_time: Vec<f64>,

    pub antenna1: Vec<usize>,
    pub antenna2: Vec<usize>,

    /// Complex visibilities with shape (nvis, npol).
    pub vis: Array2<c64>,

    /// Natural weights with shape (nvis, npol).
    pub weight: Array2<f64>,

    /// Weights used for imaging with shape (nvis, npol).
    pub imaging_weight: Array2<f64>,

    pub phase_centre: RADec,
    pub polarisation_frame: PolarisationFrame,
}

impl Visibilities {
    pub fn len(&self) -> usize {
        self.uvw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uvw.is_empty()
    }

    pub fn npol(&self) -> usize {
        self.vis.len_of(Axis(1))
    }

    /// Fail if the fields don't all describe the same number of records, or the
    /// polarisation axis doesn't match the polarisation frame.
    pub fn check(&self) -> Result<(), DataError> {
        let n = self.uvw.len();
        for (what, got) in [
            ("time", self.time.len()),
            ("frequency", self.frequency.len()),
            ("channel_bandwidth", self.channel_bandwidth.len()),
            ("integration_time", self.integration_time.len()),
            ("antenna1", self.antenna1.len()),
            ("antenna2", self.antenna2.len()),
            ("vis rows", self.vis.len_of(Axis(0))),
            ("weight rows", self.weight.len_of(Axis(0))),
            ("imaging_weight rows", self.imaging_weight.len_of(Axis(0))),
        ] {
            if got != n {
                return Err(DataError::VisShape {
                    what,
                    expected: n,
                    got,
                });
            }
        }

        let npol = self.polarisation_frame.npol();
        for (what, got) in [
            ("polarisations", self.vis.len_of(Axis(1))),
            ("weight polarisations", self.weight.len_of(Axis(1))),
            (
                "imaging_weight polarisations",
                self.imaging_weight.len_of(Axis(1)),
            ),
        ] {
            if got != npol {
                return Err(DataError::VisShape {
                    what,
                    expected: npol,
                    got,
                });
            }
        }
        Ok(())
    }

    /// A new set containing only the given rows, in the given order.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            uvw: indices.iter().map(|&i| self.uvw[i]).collect(),
            time: indices.iter().map(|&i| self.time[i]).collect(),
            frequency: indices.iter().map(|&i| self.frequency[i]).collect(),
            channel_bandwidth: indices
                .iter()
                .map(|&i| self.channel_bandwidth[i])
                .collect(),
            integration_time: indices.iter().map(|&i| self.integration_time[i]).collect(),
            antenna1: indices.iter().map(|&i| self.antenna1[i]).collect(),
            antenna2: indices.iter().map(|&i| self.antenna2[i]).collect(),
            vis: self.vis.select(Axis(0), indices),
            weight: self.weight.select(Axis(0), indices),
            imaging_weight: self.imaging_weight.select(Axis(0), indices),
            phase_centre: self.phase_centre,
            polarisation_frame: self.polarisation_frame,
        }
    }

    /// A copy of this set with every visibility value zeroed.
    pub fn zeroed_like(&self) -> Self {
        let mut new = self.clone();
        new.vis.fill(c64::default());
        new
    }

    /// A copy of this set with its visibility values replaced. `vis` must have
    /// the same shape as `self.vis`.
    pub fn with_vis(&self, vis: Array2<c64>) -> Result<Self, DataError> {
        if vis.dim() != self.vis.dim() {
            return Err(DataError::VisShape {
                what: "replacement vis",
                expected: self.vis.len(),
                got: vis.len(),
            });
        }
        Ok(Self {
            vis,
            ..self.clone()
        })
    }

    /// A copy of this set with its imaging weights replaced.
    pub fn with_imaging_weight(&self, imaging_weight: Array2<f64>) -> Result<Self, DataError> {
        if imaging_weight.dim() != self.imaging_weight.dim() {
            return Err(DataError::VisShape {
                what: "replacement imaging_weight",
                expected: self.imaging_weight.len(),
                got: imaging_weight.len(),
            });
        }
        Ok(Self {
            imaging_weight,
            ..self.clone()
        })
    }

    /// A copy of this set with `w0` subtracted from every w. The visibility
    /// values are untouched.
    pub fn w_relative_to(&self, w0: f64) -> Self {
        let mut new = self.clone();
        new.uvw.iter_mut().for_each(|uvw| uvw.w -= w0);
        new
    }

    /// The largest |w| \[wavelengths\].
    pub fn max_abs_w(&self) -> f64 {
        self.uvw.iter().fold(0.0_f64, |acc, uvw| acc.max(uvw.w.abs()))
    }

    /// The longest projected baseline in the uv plane \[wavelengths\].
    pub fn uv_max(&self) -> f64 {
        self.uvw
            .iter()
            .fold(0.0_f64, |acc, uvw| acc.max(uvw.u.hypot(uvw.v)))
    }

    /// The sorted, unique timestamps of this set.
    pub fn unique_times(&self) -> Vec<f64> {
        let mut times = self.time.clone();
        times.sort_unstable_by(|a, b| a.total_cmp(b));
        times.dedup();
        times
    }
}
