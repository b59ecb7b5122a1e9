//! Integration flows across `payload-envelope` and `payload-gateway`.

pub mod envelope_flows;
pub mod legacy_compat;
