pub mod compute;
pub mod consts;
pub mod error;
pub mod graph;
pub mod image;
pub mod io;
pub mod pipeline;
pub mod sampler;
pub mod schedule;
