//! Google service-account credentials and the OAuth2 access tokens minted
//! from them for the document database REST API.

pub mod service_account;

pub use service_account::{
    AccessTokenSource, ServiceAccountKey, ServiceAccountTokenSource, StaticTokenSource, TokenError,
};
