pub mod cancel;
pub mod chunk_plan;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod lang;
pub mod manifest;
pub mod merger;
pub mod naming;
pub mod pdf;
pub mod pipeline;
pub mod probe;
pub mod report;
pub mod splitter;
pub mod util;
