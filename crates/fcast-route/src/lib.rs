//! Model routing for Forecast Studio.
//!
//! Inspects a [`NormalizedFrame`](fcast_transform::NormalizedFrame) and
//! emits a [`RoutingPlan`](fcast_model::RoutingPlan): an ordered chain of
//! forecasting strategies that always ends in the baselines.

#![deny(unsafe_code)]

mod router;

pub use router::{ModelRouter, RouterConfig, coefficient_of_variation, route_model};
