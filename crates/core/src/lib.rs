pub mod bitmap;
pub mod capture;
pub mod color;
pub mod error;
pub mod executor;
pub mod logger;
pub mod palette;
pub mod planner;
pub mod platform;
pub mod preprocess;
pub mod session;
pub mod sleep;
pub mod types;
