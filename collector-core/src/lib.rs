#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::items_after_statements)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::inefficient_to_string,
    clippy::multiple_crate_versions,
    clippy::redundant_pub_crate,
    clippy::use_self
)]

#[macro_use]
extern crate log;

pub mod error;
pub mod vartable;
pub mod expr;
pub mod probe;
pub mod measurement;
pub mod store;
pub mod evaluator;
pub mod pipeline;
pub mod sink;

pub use error::CollectorError;
pub use measurement::Measurement;
pub use pipeline::{SensorDescriptor, SensorPipeline};
pub use probe::{ProbeDescriptor, ProbeKind, ProbeOutcome, ProbeSession};
pub use sink::SinkRecord;
pub use store::MeasurementStore;

#[cfg(test)]
mod tests {}
