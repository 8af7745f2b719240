/*
 * Copyright 2021 Luca Fulchir <luker@fenrirproject.org>
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Construction-time sizing
//!
//! There is no runtime configuration: capacity and bucket count are fixed
//! once the structure is built.

use crate::results::Error;

/// Default ratio of cached elements to hash buckets
pub const DEFAULT_LOAD_FACTOR: f32 = 1.0;

/// Sizing parameters shared by every structure in this crate
///
/// ```
/// use shardcache::config::Config;
///
/// let cfg = Config::new(100).with_load_factor(0.5);
/// assert_eq!(cfg.bucket_count(), 201);
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    capacity: usize,
    load_factor: f32,
}

impl Config {
    pub fn new(capacity: usize) -> Self {
        Config {
            capacity,
            load_factor: DEFAULT_LOAD_FACTOR,
        }
    }
    /// Set the expected ratio `elements / buckets`.
    /// Lower means more buckets and shorter chains
    pub fn with_load_factor(mut self, load_factor: f32) -> Self {
        self.load_factor = load_factor;
        self
    }
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    pub fn load_factor(&self) -> f32 {
        self.load_factor
    }
    /// `ceil(capacity / load_factor) + 1`
    pub fn bucket_count(&self) -> usize {
        let raw = (self.capacity as f64 / self.load_factor as f64).ceil();
        (raw as usize).saturating_add(1)
    }
    /// Check the parameters before any allocation happens
    pub fn validate(&self) -> Result<(), Error> {
        if self.capacity == 0 {
            return Err(Error::InvalidConfig("capacity must be > 0"));
        }
        // the node index must fit the handle
        if self.capacity > u32::MAX as usize {
            return Err(Error::InvalidConfig("capacity must fit in 32 bits"));
        }
        if !self.load_factor.is_finite() || self.load_factor <= 0.0 {
            return Err(Error::InvalidConfig(
                "load factor must be finite and > 0",
            ));
        }
        Ok(())
    }
}
