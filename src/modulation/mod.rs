//! Modulation Module
//!
//! This module provides the fixed modulation routing for a voice. Sources
//! and destinations are closed enums; a route carries a scalar amount and
//! an active flag. Everything is plain arrays so the per-sample path does
//! no hashing and no allocation.
//!
//! # Usage
//!
//! ```rust
//! use halcyon::modulation::{ModMatrix, ModSource, ModDestination};
//!
//! let mut matrix = ModMatrix::new();
//! matrix.add_route(ModSource::Lfo1, ModDestination::Pitch, 0.5).unwrap();
//! matrix.set_source(ModSource::Lfo1, 1.0);
//! matrix.run();
//! assert!((matrix.destination(ModDestination::Pitch) - 0.5).abs() < 1e-6);
//! ```

pub mod matrix;

pub use matrix::{
    ModDestination, ModMatrix, ModMatrixError, ModRoute, ModSource, MAX_ROUTES,
};
