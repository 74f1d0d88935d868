//! Docker compose control for the test servers.

pub mod lifecycle;
