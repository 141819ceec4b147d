//! Credential handling and SSRF protection.

mod credentials;
mod url_validator;

pub use credentials::SecretString;
pub use url_validator::UrlValidator;
