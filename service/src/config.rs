use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::fmt;
use std::str::FromStr;

/// Assertion type sent with every client assertion unless overridden.
pub const DEFAULT_CLIENT_ASSERTION_TYPE: &str =
    "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

/// Where session records are kept.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionBackend {
    /// Shared Redis instance; required when running more than one replica.
    Redis,
    /// In-process map; records are lost on restart.
    Memory,
}

#[derive(Debug, PartialEq, Eq)]
pub struct SessionBackendParseError;

impl FromStr for SessionBackend {
    type Err = SessionBackendParseError;
    fn from_str(backend: &str) -> Result<SessionBackend, Self::Err> {
        match backend.to_lowercase().as_str() {
            "redis" => Ok(SessionBackend::Redis),
            "memory" => Ok(SessionBackend::Memory),
            _ => Err(SessionBackendParseError),
        }
    }
}

impl fmt::Display for SessionBackend {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SessionBackend::Redis => write!(f, "redis"),
            SessionBackend::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Client identifier registered with the identity provider.
    #[arg(long, env)]
    client_id: Option<String>,

    /// Upstream authorization endpoint the browser is redirected to.
    #[arg(long, env)]
    authorization_endpoint: Option<String>,

    /// Upstream token endpoint; also the audience of client assertions.
    #[arg(long, env)]
    token_endpoint: Option<String>,

    /// Upstream user-info endpoint.
    #[arg(long, env)]
    userinfo_endpoint: Option<String>,

    /// The `client_assertion_type` form value sent with the code exchange.
    #[arg(long, env, default_value = DEFAULT_CLIENT_ASSERTION_TYPE)]
    pub client_assertion_type: String,

    /// Redirect URI registered upstream. Authorization requests are refused while unset.
    #[arg(long, env)]
    redirect_uri: Option<String>,

    /// Standard-base64 RSA private JWK used to sign client assertions.
    #[arg(long, env, hide_env_values = true)]
    fayda_oauth_private_key: Option<String>,

    /// Path to a PEM RSA private key used to sign client assertions, as an
    /// alternative to the JWK.
    #[arg(long, env)]
    client_private_key_path: Option<String>,

    /// Scope requested from the identity provider.
    #[arg(long, env, default_value = "openid profile email")]
    pub oauth_scope: String,

    /// Lifetime in seconds of each client assertion.
    #[arg(long, env, default_value_t = 300)]
    pub client_assertion_ttl_secs: u64,

    /// Timeout in seconds for each upstream request.
    #[arg(long, env, default_value_t = 10)]
    pub upstream_timeout_secs: u64,

    /// PEM RSA private key used to sign locally issued tokens.
    #[arg(long, env, default_value = "/auth/private.pem")]
    pub signing_key_path: String,

    /// Write a freshly generated signing key to `signing_key_path` so it survives restarts.
    #[arg(long, env, default_value_t = false)]
    pub persist_generated_signing_key: bool,

    /// Where to write the PEM public key of the local signing key, if anywhere.
    #[arg(long, env)]
    public_key_path: Option<String>,

    /// The `iss` claim of locally issued tokens.
    #[arg(long, env, default_value = "adVouch-AuthServer")]
    pub token_issuer: String,

    /// Access token lifetime in hours.
    #[arg(long, env, default_value_t = 1)]
    pub access_token_ttl_hours: u64,

    /// Refresh token lifetime in hours (default: 30 days).
    #[arg(long, env, default_value_t = 720)]
    pub refresh_token_ttl_hours: u64,

    /// Lifetime in seconds of a session between authorize and authenticate.
    #[arg(long, env, default_value_t = 900)]
    pub pending_session_ttl_secs: u64,

    /// Lifetime in seconds of an authenticated session, reset on every login.
    #[arg(long, env, default_value_t = 86400)]
    pub authenticated_session_ttl_secs: u64,

    /// Session store backend.
    #[arg(
        long,
        env,
        default_value_t = SessionBackend::Redis,
        value_parser = clap::builder::PossibleValuesParser::new(["redis", "memory", "REDIS", "MEMORY"])
            .map(|s| s.parse::<SessionBackend>().unwrap_or(SessionBackend::Redis)),
    )]
    pub session_backend: SessionBackend,

    /// Redis host.
    #[arg(long, env, default_value = "127.0.0.1")]
    pub redis_host: String,

    /// Redis port.
    #[arg(long, env, default_value_t = 6379)]
    pub redis_port: u16,

    /// Number of connection attempts made to Redis at startup.
    #[arg(long, env, default_value_t = 5)]
    pub redis_connect_attempts: u32,

    /// A list of full CORS origin URLs that allowed to receive server responses.
    /// `*` allows any origin.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "*"
    )]
    pub allowed_origins: Vec<String>,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "0.0.0.0")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 8080)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap_or(LevelFilter::Info)),
        )]
    pub log_level_filter: LevelFilter,

    /// Set the Rust runtime environment to use.
    #[arg(
    short,
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .map(|s| s.parse::<RustEnv>().unwrap_or(RustEnv::Development)),
    )]
    pub runtime_env: RustEnv,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn client_id(&self) -> Option<&str> {
        non_empty(&self.client_id)
    }

    pub fn authorization_endpoint(&self) -> Option<&str> {
        non_empty(&self.authorization_endpoint)
    }

    pub fn token_endpoint(&self) -> Option<&str> {
        non_empty(&self.token_endpoint)
    }

    pub fn userinfo_endpoint(&self) -> Option<&str> {
        non_empty(&self.userinfo_endpoint)
    }

    /// Returns the configured redirect URI; `None` when unset or empty.
    pub fn redirect_uri(&self) -> Option<&str> {
        non_empty(&self.redirect_uri)
    }

    pub fn fayda_oauth_private_key(&self) -> Option<&str> {
        non_empty(&self.fayda_oauth_private_key)
    }

    pub fn client_private_key_path(&self) -> Option<&str> {
        non_empty(&self.client_private_key_path)
    }

    pub fn public_key_path(&self) -> Option<&str> {
        non_empty(&self.public_key_path)
    }

    /// Names of the settings without which the server cannot broker a login.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.client_id().is_none() {
            missing.push("CLIENT_ID");
        }
        if self.authorization_endpoint().is_none() {
            missing.push("AUTHORIZATION_ENDPOINT");
        }
        if self.token_endpoint().is_none() {
            missing.push("TOKEN_ENDPOINT");
        }
        if self.userinfo_endpoint().is_none() {
            missing.push("USERINFO_ENDPOINT");
        }
        if self.fayda_oauth_private_key().is_none() && self.client_private_key_path().is_none() {
            missing.push("FAYDA_OAUTH_PRIVATE_KEY or CLIENT_PRIVATE_KEY_PATH");
        }
        missing
    }

    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}/", self.redis_host, self.redis_port)
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::parse_from(std::iter::once("advouch_auth").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert_eq!(config.client_assertion_type, DEFAULT_CLIENT_ASSERTION_TYPE);
        assert_eq!(config.oauth_scope, "openid profile email");
        assert_eq!(config.client_assertion_ttl_secs, 300);
        assert_eq!(config.upstream_timeout_secs, 10);
        assert_eq!(config.signing_key_path, "/auth/private.pem");
        assert!(!config.persist_generated_signing_key);
        assert_eq!(config.token_issuer, "adVouch-AuthServer");
        assert_eq!(config.access_token_ttl_hours, 1);
        assert_eq!(config.refresh_token_ttl_hours, 720);
        assert_eq!(config.pending_session_ttl_secs, 900);
        assert_eq!(config.authenticated_session_ttl_secs, 86400);
        assert_eq!(config.session_backend, SessionBackend::Redis);
        assert_eq!(config.redis_url(), "redis://127.0.0.1:6379/");
        assert_eq!(config.allowed_origins, vec!["*".to_string()]);
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_empty_redirect_uri_is_treated_as_missing() {
        let config = parse(&["--redirect-uri", ""]);
        assert_eq!(config.redirect_uri(), None);

        let config = parse(&["--redirect-uri", "https://app.example/callback"]);
        assert_eq!(config.redirect_uri(), Some("https://app.example/callback"));
    }

    #[test]
    fn test_missing_required_lists_every_gap() {
        let config = parse(&["--client-id", "client-123"]);
        let missing = config.missing_required();
        assert!(!missing.contains(&"CLIENT_ID"));
        assert!(missing.contains(&"TOKEN_ENDPOINT"));
        assert!(missing.contains(&"FAYDA_OAUTH_PRIVATE_KEY or CLIENT_PRIVATE_KEY_PATH"));

        let config = parse(&[
            "--client-id",
            "client-123",
            "--authorization-endpoint",
            "https://esignet.example/authorize",
            "--token-endpoint",
            "https://esignet.example/token",
            "--userinfo-endpoint",
            "https://esignet.example/userinfo",
            "--client-private-key-path",
            "/keys/client.pem",
        ]);
        assert!(config.missing_required().is_empty());
    }

    #[test]
    fn test_session_backend_parse() {
        assert_eq!("memory".parse(), Ok(SessionBackend::Memory));
        assert_eq!("REDIS".parse(), Ok(SessionBackend::Redis));
        assert_eq!(
            "sqlite".parse::<SessionBackend>(),
            Err(SessionBackendParseError)
        );
        let config = parse(&["--session-backend", "memory"]);
        assert_eq!(config.session_backend, SessionBackend::Memory);
    }

    #[test]
    fn test_allowed_origins_split_on_comma() {
        let config = parse(&[
            "--allowed-origins",
            "https://a.example,https://b.example",
        ]);
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
    }
}
