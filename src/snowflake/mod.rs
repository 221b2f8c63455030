//! Snowflake account connection settings shared by the analyst client and
//! the SQL statements client.

pub mod sql_api;

pub use sql_api::{ SqlApiClient, SqlApiError };

use crate::cli::Args;
use reqwest::header::{ HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE };
use std::error::Error;
use std::fmt;
use std::str::FromStr;

const TOKEN_TYPE_HEADER: &str = "x-snowflake-authorization-token-type";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    OAuth,
    KeypairJwt,
    ProgrammaticAccessToken,
    /// Legacy session token, sent as `Snowflake Token="..."`.
    Session,
}

impl TokenType {
    fn header_value(&self) -> Option<&'static str> {
        match self {
            TokenType::OAuth => Some("OAUTH"),
            TokenType::KeypairJwt => Some("KEYPAIR_JWT"),
            TokenType::ProgrammaticAccessToken => Some("PROGRAMMATIC_ACCESS_TOKEN"),
            TokenType::Session => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseTokenTypeError {
    message: String,
}

impl fmt::Display for ParseTokenTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for ParseTokenTypeError {}

impl FromStr for TokenType {
    type Err = ParseTokenTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "OAUTH" => Ok(TokenType::OAuth),
            "KEYPAIR_JWT" | "JWT" => Ok(TokenType::KeypairJwt),
            "PROGRAMMATIC_ACCESS_TOKEN" | "PAT" => Ok(TokenType::ProgrammaticAccessToken),
            "SESSION" => Ok(TokenType::Session),
            _ =>
                Err(ParseTokenTypeError {
                    message: format!("Invalid Snowflake token type: '{}'", s),
                }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SnowflakeConfig {
    pub base_url: String,
    pub token: String,
    pub token_type: TokenType,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub warehouse: Option<String>,
    pub role: Option<String>,
    pub timeout_secs: u64,
}

impl SnowflakeConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, token_type: TokenType) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            token_type,
            database: None,
            schema: None,
            warehouse: None,
            role: None,
            timeout_secs: 60,
        }
    }

    pub fn from_args(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let base_url = match &args.snowflake_host {
            Some(host) if !host.trim().is_empty() => normalize_host(host),
            _ => {
                if args.account.trim().is_empty() {
                    return Err("Either SNOWFLAKE_ACCOUNT or SNOWFLAKE_HOST must be set".into());
                }
                format!("https://{}.snowflakecomputing.com", args.account.trim())
            }
        };
        if args.token.is_empty() {
            return Err("SNOWFLAKE_TOKEN is required".into());
        }

        Ok(Self {
            base_url,
            token: args.token.clone(),
            token_type: args.token_type.parse()?,
            database: args.database.clone(),
            schema: args.schema.clone(),
            warehouse: args.warehouse.clone(),
            role: args.role.clone(),
            timeout_secs: args.sql_timeout_secs,
        })
    }

    pub fn url(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route)
    }

    pub fn authorization(&self) -> String {
        match self.token_type {
            TokenType::Session => format!("Snowflake Token=\"{}\"", self.token),
            _ => format!("Bearer {}", self.token),
        }
    }

    pub fn default_headers(&self) -> Result<HeaderMap, Box<dyn Error + Send + Sync>> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&self.authorization()).map_err(|e|
                format!("Invalid Snowflake token format: {}", e)
            )?
        );
        if let Some(kind) = self.token_type.header_value() {
            headers.insert(HeaderName::from_static(TOKEN_TYPE_HEADER), HeaderValue::from_static(kind));
        }
        Ok(headers)
    }

    pub fn http_client(&self) -> Result<reqwest::Client, Box<dyn Error + Send + Sync>> {
        reqwest::Client
            ::builder()
            .default_headers(self.default_headers()?)
            .build()
            .map_err(|e| Box::new(e) as Box<dyn Error + Send + Sync>)
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn token_type_parses_aliases() {
        assert_eq!("oauth".parse::<TokenType>().unwrap(), TokenType::OAuth);
        assert_eq!("pat".parse::<TokenType>().unwrap(), TokenType::ProgrammaticAccessToken);
        assert_eq!("KEYPAIR_JWT".parse::<TokenType>().unwrap(), TokenType::KeypairJwt);
        assert!("basic".parse::<TokenType>().is_err());
    }

    #[test]
    fn host_is_derived_from_account() {
        let args = Args::parse_from([
            "cortex-analyst-chat",
            "--account",
            "myorg-acct",
            "--token",
            "t0k",
        ]);
        let config = SnowflakeConfig::from_args(&args).unwrap();
        assert_eq!(config.base_url, "https://myorg-acct.snowflakecomputing.com");
        assert_eq!(
            config.url("/api/v2/statements"),
            "https://myorg-acct.snowflakecomputing.com/api/v2/statements"
        );
    }

    #[test]
    fn explicit_host_keeps_scheme() {
        assert_eq!(normalize_host("http://127.0.0.1:9000/"), "http://127.0.0.1:9000");
        assert_eq!(normalize_host("acct.snowflakecomputing.com"), "https://acct.snowflakecomputing.com");
    }

    #[test]
    fn missing_token_is_rejected() {
        let args = Args::parse_from(["cortex-analyst-chat", "--account", "a", "--token", ""]);
        assert!(SnowflakeConfig::from_args(&args).is_err());
    }

    #[test]
    fn session_tokens_use_snowflake_scheme() {
        let config = SnowflakeConfig::new("https://h", "abc", TokenType::Session);
        assert_eq!(config.authorization(), "Snowflake Token=\"abc\"");
        let headers = config.default_headers().unwrap();
        assert!(headers.get(TOKEN_TYPE_HEADER).is_none());

        let config = SnowflakeConfig::new("https://h", "abc", TokenType::KeypairJwt);
        let headers = config.default_headers().unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer abc");
        assert_eq!(headers.get(TOKEN_TYPE_HEADER).unwrap(), "KEYPAIR_JWT");
    }
}
