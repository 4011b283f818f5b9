use crate::password::PasswordHasher;
use crate::store::Store;
use crate::token::TokenService;

/// Shared per-request context. Everything here is a cheap clone: the store
/// wraps a connection pool, the token service holds immutable keys.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub tokens: TokenService,
    pub hasher: PasswordHasher,
}
