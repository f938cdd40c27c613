pub mod config;
pub mod counter;
pub mod db;
pub mod error;
pub mod frame;
pub mod logging;
pub mod pose;
pub mod store;
pub mod tracker;
pub mod workout;
