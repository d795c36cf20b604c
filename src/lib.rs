#![doc = "Censogeo public API"]
mod common;

pub mod cli;
pub mod commands;
pub mod download;
pub mod frame;
pub mod io;
pub mod log;
pub mod similarity;
pub mod types;

#[doc(inline)]
pub use frame::{GeoFrame, GeoRecord};

#[doc(inline)]
pub use log::{Log, QuietLog, StderrLog};

#[doc(inline)]
pub use similarity::{Method, SimilarityOptions, record_similarity, similarity};

#[doc(inline)]
pub use types::{Censo, Nivel};
