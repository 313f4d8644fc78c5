//! Domain core for UNCASE quality evaluation: metrics, thresholds, the
//! composite scorer, the dashboard aggregator and the evaluation run that
//! ties them to a metrics source and a report store.

mod core_domain;

pub mod core {
    pub use crate::core_domain::*;
}
