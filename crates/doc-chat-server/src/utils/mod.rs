pub mod error;
pub mod logger;

pub use logger::init_logger;
