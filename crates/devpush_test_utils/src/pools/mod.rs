//! Connection pool factories.

pub mod postgres;
