pub mod browse;
pub mod compare;
pub mod generator;
pub mod refresh;
pub mod scoring;
