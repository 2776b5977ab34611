pub mod config;
pub mod error;
pub mod graph;
pub mod id;
pub mod io;
pub mod model;
pub mod navigation;
