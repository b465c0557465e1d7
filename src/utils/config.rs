use std::{env, fmt, str::FromStr};

/// Application configuration
///
/// Built once at startup and shared behind an `Arc`; nothing mutates it afterwards.
#[derive(Clone)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// JWT configuration
    pub jwt: JwtConfig,
    /// API key and password hashing configuration
    pub auth: AuthConfig,
    /// Optional administrator seeded at startup
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub max_body_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackend {
    Memory,
    Postgrest,
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub supabase_url: String,
    pub supabase_key: String,
}

#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_hours: i64,
}

#[derive(Clone)]
pub struct AuthConfig {
    /// Static API keys; position in the list is the key's identity
    pub api_keys: Vec<String>,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    pub argon2_parallelism: u32,
}

#[derive(Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let supabase_url = var("SUPABASE_URL").unwrap_or_default();
        let backend = match var("DATABASE_BACKEND").as_deref() {
            Some("memory") => DatabaseBackend::Memory,
            Some("postgrest") => DatabaseBackend::Postgrest,
            Some(other) => anyhow::bail!("Invalid DATABASE_BACKEND value: {other}"),
            None if supabase_url.is_empty() => DatabaseBackend::Memory,
            None => DatabaseBackend::Postgrest,
        };

        let database = DatabaseConfig {
            backend,
            supabase_key: var("SUPABASE_SERVICE_ROLE_KEY").unwrap_or_default(),
            supabase_url,
        };
        if database.backend == DatabaseBackend::Postgrest && database.supabase_url.is_empty() {
            anyhow::bail!("SUPABASE_URL is required for the postgrest backend");
        }

        let jwt = JwtConfig {
            secret: var("JWT_SECRET").ok_or_else(|| anyhow::anyhow!("JWT_SECRET is required"))?,
            issuer: var("JWT_ISSUER").unwrap_or_else(|| "services-api".to_string()),
            access_ttl_minutes: parse_or(&var, "JWT_ACCESS_TTL_MINUTES", 15)?,
            refresh_ttl_hours: parse_or(&var, "JWT_REFRESH_TTL_HOURS", 168)?,
        };
        if jwt.access_ttl_minutes <= 0 || jwt.refresh_ttl_hours <= 0 {
            anyhow::bail!("JWT token lifetimes must be positive");
        }

        let defaults = argon2::Params::default();
        let auth = AuthConfig {
            api_keys: var("API_KEYS")
                .map(|keys| parse_api_keys(&keys))
                .unwrap_or_default(),
            argon2_memory_kib: parse_or(&var, "ARGON2_MEMORY_KIB", defaults.m_cost())?,
            argon2_iterations: parse_or(&var, "ARGON2_ITERATIONS", defaults.t_cost())?,
            argon2_parallelism: parse_or(&var, "ARGON2_PARALLELISM", defaults.p_cost())?,
        };

        let bootstrap_admin = match (var("BOOTSTRAP_ADMIN_EMAIL"), var("BOOTSTRAP_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(BootstrapAdmin { email, password }),
            (None, None) => None,
            _ => anyhow::bail!(
                "BOOTSTRAP_ADMIN_EMAIL and BOOTSTRAP_ADMIN_PASSWORD must be set together"
            ),
        };

        Ok(Self {
            server: ServerConfig {
                host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(&var, "PORT", 8080)?,
                cors_origins: var("CORS_ORIGINS")
                    .unwrap_or_else(|| "*".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                max_body_size: parse_or(&var, "MAX_BODY_SIZE", 1_048_576)?, // 1MB
            },
            database,
            jwt,
            auth,
            bootstrap_admin,
        })
    }

    pub fn has_api_keys(&self) -> bool {
        !self.auth.api_keys.is_empty()
    }
}

/// Split a comma-separated key list, dropping blank entries
pub fn parse_api_keys(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid {key} value")),
        None => Ok(default),
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("server", &self.server)
            .field("database", &self.database)
            .field("jwt", &self.jwt)
            .field("auth", &self.auth)
            .field(
                "bootstrap_admin",
                &self.bootstrap_admin.as_ref().map(|admin| &admin.email),
            )
            .finish()
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("backend", &self.backend)
            .field("supabase_url", &self.supabase_url)
            .field("supabase_key", &"[redacted]")
            .finish()
    }
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"[redacted]")
            .field("issuer", &self.issuer)
            .field("access_ttl_minutes", &self.access_ttl_minutes)
            .field("refresh_ttl_hours", &self.refresh_ttl_hours)
            .finish()
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("api_keys", &format_args!("[{} redacted]", self.api_keys.len()))
            .field("argon2_memory_kib", &self.argon2_memory_kib)
            .field("argon2_iterations", &self.argon2_iterations)
            .field("argon2_parallelism", &self.argon2_parallelism)
            .finish()
    }
}
