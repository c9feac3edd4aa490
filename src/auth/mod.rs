//! GigaChat credential lifecycle: the OAuth exchange, the cached credential and its
//! background renewal.

pub mod oauth;
pub mod refresher;
pub mod token_manager;

pub use oauth::{AccessToken, GigaChatOAuth};
pub use refresher::BackgroundRefresher;
pub use token_manager::{Credential, CredentialState, TokenManager, TokenSource};
