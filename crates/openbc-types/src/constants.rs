// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — OpenBC Constants
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
/// Vacuum permittivity (F/m) - real SI value.
/// NOTE: configs may override it with 1.0 for normalized units.
pub const EPSILON0_SI: f64 = 8.8541878128e-12;

/// Maximum number of spatial axes carried by a Region.
pub const MAX_AXES: usize = 3;

/// Default ghost width of the deposited source field.
pub const DEFAULT_SOURCE_GHOST: usize = 1;

/// Halo width of the scattered potential; one layer feeds the 3-point stencil.
pub const POTENTIAL_HALO: usize = 1;
