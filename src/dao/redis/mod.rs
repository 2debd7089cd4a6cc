mod config;
mod error;
mod store;

pub use config::RedisConfig;
pub use error::{RedisDaoError, RedisResult};
pub use store::RedisStore;
