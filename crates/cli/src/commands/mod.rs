//! Subcommand implementations.

pub mod migrate;
pub mod seed;

use secrecy::SecretString;

/// Environment variables consulted for the database URL, in order.
const DATABASE_URL_VARS: [&str; 2] = ["QUICKCART_DATABASE_URL", "DATABASE_URL"];

/// Read the storefront database URL after loading `.env`.
///
/// Returns the first variable that is set, or `None`.
fn database_url() -> Option<SecretString> {
    dotenvy::dotenv().ok();

    DATABASE_URL_VARS
        .iter()
        .find_map(|name| std::env::var(name).ok())
        .filter(|url| !url.trim().is_empty())
        .map(SecretString::from)
}
