pub mod command;
pub mod config;
pub mod interpreter;
pub mod jog;
pub mod motor;
pub mod patterns;
pub mod raster;
pub mod runtime;
