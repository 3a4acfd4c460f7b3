//! DSP: the software audio graph behind the voice engine.
//!
//! The same graph renders inside an AudioWorklet (via WASM) and, with the
//! `native` feature, on a desktop output device.

pub mod graph;
pub mod mixer;
#[cfg(feature = "native")]
pub mod native;
pub mod oscillator;
pub mod param;
