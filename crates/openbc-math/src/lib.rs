//! Mathematical primitives for the open-boundary potential solve.

pub mod fft;
pub mod green;
pub mod stencil;
