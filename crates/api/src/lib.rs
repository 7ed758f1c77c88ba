pub mod auth;
pub mod client;
pub mod limiter;
pub mod types;

pub use auth::Credentials;
pub use client::ApiClient;
pub use limiter::RateLimiter;
