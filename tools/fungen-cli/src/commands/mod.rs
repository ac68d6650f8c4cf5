pub mod config;
pub mod generate;
pub mod info;
pub mod options;
pub mod postprocess;
pub mod recommend;
