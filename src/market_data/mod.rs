pub mod catalog;
pub mod delta;
pub mod feed;
pub mod generator;
pub mod history;
pub mod types;
