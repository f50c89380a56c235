// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A small task-graph executor.
//!
//! Units of work are submitted to a [`TaskGraph`], then [`Scheduler::await_all`]
//! runs them on a pool of scoped worker threads and gathers their results in
//! submission order. Inputs shared by every unit are [`Scheduler::scatter`]ed
//! once rather than copied per unit. If any unit fails (or panics), units that
//! haven't started are cancelled and every result is discarded.

mod error;

pub use error::SchedulerError;

use std::{
    any::Any,
    num::NonZeroUsize,
    ops::Deref,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread,
};

use crossbeam_channel::unbounded;
use crossbeam_utils::atomic::AtomicCell;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, trace, warn};
use scopeguard::defer_on_unwind;

use crate::{ImagingError, PROGRESS_BARS};

/// A read-only value shared by every unit of a task graph.
#[derive(Debug)]
pub struct Scattered<T>(Arc<T>);

impl<T> Clone for Scattered<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> Deref for Scattered<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

type Job<'a, T> = Box<dyn FnOnce() -> Result<T, ImagingError> + Send + 'a>;

struct Task<'a, T> {
    index: usize,
    label: String,
    job: Job<'a, T>,
}

/// Independent units of work waiting to be run. Jobs may borrow anything that
/// outlives the graph.
pub struct TaskGraph<'a, T> {
    tasks: Vec<Task<'a, T>>,
}

impl<'a, T> Default for TaskGraph<'a, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T> TaskGraph<'a, T> {
    pub fn new() -> Self {
        Self { tasks: vec![] }
    }

    /// Add a unit of work, returning its index. Results are returned in index
    /// order.
    pub fn submit<F>(&mut self, label: impl Into<String>, job: F) -> usize
    where
        F: FnOnce() -> Result<T, ImagingError> + Send + 'a,
    {
        let index = self.tasks.len();
        self.tasks.push(Task {
            index,
            label: label.into(),
            job: Box::new(job),
        });
        index
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[derive(Debug)]
pub struct Scheduler {
    num_workers: usize,
    dispatched: AtomicCell<usize>,
    broadcasts: AtomicCell<usize>,
}

impl Scheduler {
    /// A scheduler with `num_workers` worker threads. Zero means one per
    /// available CPU.
    pub fn new(num_workers: usize) -> Self {
        let num_workers = if num_workers == 0 {
            thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        } else {
            num_workers
        };
        Self {
            num_workers,
            dispatched: AtomicCell::new(0),
            broadcasts: AtomicCell::new(0),
        }
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// The total number of units this scheduler has started running.
    pub fn dispatched(&self) -> usize {
        self.dispatched.load()
    }

    /// The total number of values this scheduler has scattered.
    pub fn broadcasts(&self) -> usize {
        self.broadcasts.load()
    }

    /// Make `value` available to every unit without copying it.
    pub fn scatter<T>(&self, value: T) -> Scattered<T> {
        self.broadcasts.fetch_add(1);
        Scattered(Arc::new(value))
    }

    /// Run every unit of `graph` and return their results in submission order.
    /// This is the only point at which the caller waits.
    pub fn await_all<T: Send>(&self, graph: TaskGraph<'_, T>) -> Result<Vec<T>, SchedulerError> {
        let num_tasks = graph.len();
        if num_tasks == 0 {
            return Ok(vec![]);
        }
        let num_workers = self.num_workers.min(num_tasks);
        debug!("Running {num_tasks} unit(s) on {num_workers} worker(s)");

        let progress = ProgressBar::with_draw_target(
            Some(num_tasks as _),
            if PROGRESS_BARS.load() {
                ProgressDrawTarget::stdout()
            } else {
                ProgressDrawTarget::hidden()
            },
        )
        .with_style(
            ProgressStyle::default_bar()
                .template("{msg:17}: [{wide_bar:.blue}] {pos:2}/{len:2} units ({elapsed_precise}<{eta_precise})").unwrap()
                .progress_chars("=> "),
        )
        .with_position(0)
        .with_message("Imaging units");

        let (tx, rx) = unbounded();
        for task in graph.tasks {
            // The receiver is alive, so this can't fail.
            let _ = tx.send(task);
        }
        drop(tx);

        // Use a variable to track whether any units have failed.
        let error = AtomicCell::new(false);

        let mut outcomes: Vec<(usize, String, Result<T, ImagingError>)> = thread::scope(|scope| {
            let handles: Vec<_> = (0..num_workers)
                .map(|i_worker| {
                    let rx = rx.clone();
                    let error = &error;
                    let progress = &progress;
                    thread::Builder::new()
                        .name(format!("worker{i_worker}"))
                        .spawn_scoped(scope, move || {
                            // If a panic happens, update our atomic error.
                            defer_on_unwind! { error.store(true); }

                            let mut outcomes = vec![];
                            // Don't start any more units once one has failed.
                            while !error.load() {
                                let Task { index, label, job } = match rx.recv() {
                                    Ok(t) => t,
                                    Err(_) => break,
                                };
                                self.dispatched.fetch_add(1);
                                trace!("worker{i_worker} running {label}");
                                let result = panic::catch_unwind(AssertUnwindSafe(job))
                                    .unwrap_or_else(|payload| {
                                        let message = panic_message(payload.as_ref());
                                        warn!("{label} panicked: {message}");
                                        Err(ImagingError::Panicked(message))
                                    });
                                if result.is_err() {
                                    error.store(true);
                                }
                                outcomes.push((index, label, result));
                                progress.inc(1);
                            }
                            outcomes
                        })
                        .expect("OS can create threads")
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });

        if error.load() {
            progress.abandon_with_message("Imaging failed");
        } else {
            progress.finish_with_message("Imaging done");
        }

        // Reduce in submission order, regardless of completion order.
        outcomes.sort_unstable_by_key(|(index, _, _)| *index);
        let mut results = Vec::with_capacity(num_tasks);
        for (index, label, result) in outcomes {
            match result {
                Ok(r) => results.push(r),
                Err(e) => {
                    return Err(SchedulerError::TaskFailure {
                        index,
                        label,
                        source: Box::new(e),
                    })
                }
            }
        }
        Ok(results)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
