pub mod auth;
pub mod clock;
pub mod config;
mod error;
pub mod observability;
pub mod proxy;
pub mod utils;

pub use auth::{
    AccessToken, BackgroundRefresher, Credential, CredentialState, GigaChatOAuth, TokenManager,
    TokenSource,
};
pub use clock::{Clock, SystemClock};
pub use config::{AuthMode, Env, ProxyConfig, parse_dotenv};
pub use error::{ProxyError, Result};
pub use proxy::{ChatFailure, CompletionsClient, ProxyState, router};
