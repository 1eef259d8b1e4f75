pub mod middleware;
pub mod tokens;

pub use middleware::AuthUser;
