pub mod config;

pub use config::{DiagramConfig, ModelClass};
