pub mod config;
pub mod gateway;
pub mod model;
pub mod sync;
pub mod view;
