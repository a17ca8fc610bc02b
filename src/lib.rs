//! Drift-A-Tone library - a drone instrument shaped by Lorenz attractors
//!
//! Each voice integrates its own Lorenz system and turns the trajectory
//! into a wavetable that drifts with use. Sounding voices are summed into
//! one tone, analysed for spectral complexity, and shown as circles.

pub mod audio;
pub mod cli;
pub mod config;
pub mod controls;
pub mod error;
pub mod instrument;
pub mod logging;
pub mod lorenz;
pub mod params;
pub mod pulse;
pub mod rendering;
pub mod style;
