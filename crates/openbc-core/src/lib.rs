//! Distributed open-boundary potential solve.
//!
//! Layout exchange, periodic-aware reduction and scatter copies, the solve
//! pipeline and the nodal field stencil.

pub mod comm;
pub mod context;
pub mod copy;
pub mod decomposition;
pub mod derive;
pub mod field;
pub mod layout;
pub mod pipeline;
pub mod source;
