pub mod apptweak;
pub mod catalog;
pub mod config;
pub mod export;
pub mod pacing;
pub mod pipeline;
