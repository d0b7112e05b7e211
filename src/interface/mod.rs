//! Interface layer - observability surface

pub mod metrics;
