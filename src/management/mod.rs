mod auth;
mod store;

pub use auth::ACCESS_TOKEN_KEY;
pub use auth::EXPIRES_AT_KEY;
pub use auth::REFRESH_TOKEN_KEY;
pub use auth::TokenStore;
pub use store::FileStore;
pub use store::KeyValueStore;
pub use store::MemoryStore;
