pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod mirror;
pub mod parse;
pub mod util;

pub use error::MirrorError;
