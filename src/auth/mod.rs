// Authentication module
// Loads client credentials and manages the OAuth token lifecycle

mod credentials;
mod manager;
mod pkce;
mod refresh;
mod store;
mod types;

pub use credentials::{load_client_secrets, CredentialSource};
pub use manager::{AuthManager, AuthorizationRequest, CallbackParams};
pub use store::TokenStore;
pub use types::{ClientSecrets, StoredToken, DEFAULT_AUTH_URI, DEFAULT_TOKEN_URI, YOUTUBE_SCOPE};
