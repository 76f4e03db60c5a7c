//! Synthetic population core: calibration, synthesis and assignment.

pub mod assignment;
pub mod categories;
pub mod config;
pub mod diagnostics;
pub mod dictionary;
pub mod error;
pub mod event;
pub mod frequency;
pub mod geography;
pub mod ids;
pub mod impedance;
pub mod income;
pub mod inputs;
pub mod ipu;
pub mod microdata;
pub mod pipeline;
pub mod population;
pub mod rng;
pub mod sampling;
pub mod store;
pub mod synthesis;
pub mod types;
pub mod vacancy;
pub mod weights;
