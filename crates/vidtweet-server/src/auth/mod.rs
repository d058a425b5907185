mod jwt;
mod middleware;
mod password;

pub use jwt::{create_access_token, create_refresh_token, verify_token, Claims};
pub use middleware::{auth_middleware, AuthUser};
pub use password::{hash_password, verify_password, Password};
