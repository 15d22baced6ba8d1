#![forbid(unsafe_code)]

mod admission;
mod fulfillment;

pub use admission::{AdmissionConfig, AdmissionVerdict, admit, priority_of};
pub use fulfillment::{FulfillmentConfig, FulfillmentMetrics, FulfillmentService};
