//! BART travel-cost matrix builder.
//!
//! Builds a table answering "what does it cost to get from station A to
//! station B?" for every pair of BART stations: the transit fare, and the
//! time and distance of the same trip by car. Results are fetched
//! incrementally from the BART and GraphHopper APIs and saved as a JSON
//! document, so an interrupted run resumes without repeating calls.

pub mod builder;
pub mod config;
pub mod document;
pub mod domain;
pub mod error;
pub mod providers;
pub mod registry;
pub mod store;

pub use error::Error;
