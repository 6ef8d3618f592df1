//! Application layer: the visit-aggregation and promotion engine.
//!
//! Services here consume the collaborator traits from
//! [`crate::domain::repositories`] and are wired together by
//! [`services::Engine`], which HTTP handlers, the visit worker and the
//! scheduler call into.

pub mod services;
