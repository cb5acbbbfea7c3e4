pub mod api;
pub mod chains;
pub mod config;
pub mod crypto;
pub mod db;
pub mod enums;
pub mod error;
pub mod executor;
pub mod fees;
pub mod services;

pub use config::Config;
pub use error::{ AppError, Result };
