// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Common implements for exponential backoff.
//!
//! This module provides an implementation of truncated [exponential backoff]
//! with full jitter. It implements the [BackoffPolicy] trait.
//!
//! [BackoffPolicy]: crate::backoff_policy::BackoffPolicy
//! [exponential backoff]: https://en.wikipedia.org/wiki/Exponential_backoff

use crate::backoff_policy::BackoffPolicy;
use std::time::Duration;

/// The error type for exponential backoff creation.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("the scaling value ({0}) should be >= 1.0")]
    InvalidScalingFactor(f64),
    #[error("the initial delay ({0:?}) should be greater than zero")]
    InvalidInitialDelay(Duration),
    #[error(
        "the maximum delay ({maximum:?}) should be greater than or equal to the initial delay ({initial:?})"
    )]
    EmptyRange {
        maximum: Duration,
        initial: Duration,
    },
}

/// Implements truncated exponential backoff with jitter.
#[derive(Clone, Debug)]
pub struct ExponentialBackoffBuilder {
    initial_delay: Duration,
    maximum_delay: Duration,
    scaling: f64,
}

impl ExponentialBackoffBuilder {
    /// Creates a builder with the default parameters.
    ///
    /// # Example
    /// ```
    /// # use gcloud_gax::exponential_backoff::Error;
    /// # use gcloud_gax::exponential_backoff::ExponentialBackoffBuilder;
    /// use std::time::Duration;
    ///
    /// let policy = ExponentialBackoffBuilder::new()
    ///         .with_initial_delay(Duration::from_millis(100))
    ///         .with_maximum_delay(Duration::from_secs(5))
    ///         .with_scaling(4.0)
    ///         .build()?;
    /// # Ok::<(), Error>(())
    /// ```
    pub fn new() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            maximum_delay: Duration::from_secs(60),
            scaling: 2.0,
        }
    }

    /// Change the initial delay.
    pub fn with_initial_delay<V: Into<Duration>>(mut self, v: V) -> Self {
        self.initial_delay = v.into();
        self
    }

    /// Change the maximum delay.
    pub fn with_maximum_delay<V: Into<Duration>>(mut self, v: V) -> Self {
        self.maximum_delay = v.into();
        self
    }

    /// Change the scaling factor in this backoff policy.
    pub fn with_scaling<V: Into<f64>>(mut self, v: V) -> Self {
        self.scaling = v.into();
        self
    }

    /// Creates a new exponential backoff policy.
    ///
    /// # Example
    /// ```
    /// # use gcloud_gax::exponential_backoff::Error;
    /// # use gcloud_gax::exponential_backoff::ExponentialBackoffBuilder;
    /// # use gcloud_gax::backoff_policy::BackoffPolicy;
    /// use std::time::Duration;
    /// let mut backoff = ExponentialBackoffBuilder::new()
    ///     .with_initial_delay(Duration::from_secs(5))
    ///     .with_maximum_delay(Duration::from_secs(50))
    ///     .with_scaling(2.0)
    ///     .build()?;
    /// let p = backoff.on_completion();
    /// assert!(p <= Duration::from_secs(5));
    /// let p = backoff.on_completion();
    /// assert!(p <= Duration::from_secs(10));
    /// # Ok::<(), Error>(())
    /// ```
    pub fn build(self) -> Result<ExponentialBackoff, Error> {
        if self.scaling.is_nan() || self.scaling < 1.0 {
            return Err(Error::InvalidScalingFactor(self.scaling));
        }
        if self.initial_delay.is_zero() {
            return Err(Error::InvalidInitialDelay(self.initial_delay));
        }
        if self.maximum_delay < self.initial_delay {
            return Err(Error::EmptyRange {
                maximum: self.maximum_delay,
                initial: self.initial_delay,
            });
        }
        Ok(ExponentialBackoff::with_parameters(
            self.initial_delay,
            self.maximum_delay,
            self.scaling,
        ))
    }

    /// Creates a new exponential backoff policy clamping the ranges towards
    /// recommended values.
    ///
    /// The maximum delay is clamped first, to be between one second and one day
    /// (both inclusive). The upper value is hardly useful, typically the retry
    /// policy would expire earlier than such a long backoff. The exceptions may
    /// tests and very long running operations.
    ///
    /// Then the initial delay is clamped to be between one millisecond and the
    /// maximum delay. One millisecond is rarely useful outside of tests, but it
    /// is unlikely to cause problems.
    ///
    /// Finally, the scaling factor is clamped to the `[1.0, 32.0]` range.
    /// Neither extreme is very useful, but neither are necessarily going to
    /// cause trouble.
    ///
    /// # Example
    /// ```
    /// # use gcloud_gax::*;
    /// # use gcloud_gax::exponential_backoff::ExponentialBackoffBuilder;
    /// # use gcloud_gax::backoff_policy::BackoffPolicy;
    /// use std::time::Duration;
    /// let mut backoff = ExponentialBackoffBuilder::new()
    ///     .with_initial_delay(Duration::ZERO)
    ///     .clamp();
    /// assert!(backoff.on_completion() <= Duration::from_millis(1));
    /// ```
    pub fn clamp(self) -> ExponentialBackoff {
        let scaling = if self.scaling.is_nan() {
            1.0
        } else {
            self.scaling.clamp(1.0, 32.0)
        };
        let maximum_delay = self
            .maximum_delay
            .clamp(Duration::from_secs(1), Duration::from_secs(24 * 60 * 60));
        let current_delay = self
            .initial_delay
            .clamp(Duration::from_millis(1), maximum_delay);
        ExponentialBackoff::with_parameters(current_delay, maximum_delay, scaling)
    }
}

impl Default for ExponentialBackoffBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Implements truncated exponential backoff with full jitter.
///
/// Each call to [on_completion()][BackoffPolicy::on_completion] returns a
/// random delay in `[0, bound]`, and then multiplies the bound by the scaling
/// factor, up to the maximum delay. The bound starts at the initial delay, and
/// is reset by [clone_policy()][BackoffPolicy::clone_policy].
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    maximum_delay: Duration,
    scaling: f64,
    current_delay: Duration,
}

impl ExponentialBackoff {
    fn with_parameters(initial_delay: Duration, maximum_delay: Duration, scaling: f64) -> Self {
        Self {
            initial_delay,
            maximum_delay,
            scaling,
            current_delay: initial_delay,
        }
    }

    fn advance(&mut self) {
        let ratio = self.maximum_delay.div_duration_f64(self.current_delay);
        self.current_delay = if self.scaling >= ratio {
            self.maximum_delay
        } else {
            // .mul_f64() cannot panic: scaling >= 1.0 and the product is
            // below the maximum delay.
            self.current_delay.mul_f64(self.scaling)
        };
    }

    fn delay_with_jitter(&mut self, rng: &mut impl rand::Rng) -> Duration {
        let bound = self.current_delay;
        self.advance();
        rng.random_range(Duration::ZERO..=bound)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::with_parameters(Duration::from_secs(1), Duration::from_secs(60), 2.0)
    }
}

impl BackoffPolicy for ExponentialBackoff {
    fn on_completion(&mut self) -> Duration {
        self.delay_with_jitter(&mut rand::rng())
    }

    fn clone_policy(&self) -> Box<dyn BackoffPolicy> {
        Box::new(Self::with_parameters(
            self.initial_delay,
            self.maximum_delay,
            self.scaling,
        ))
    }
}
