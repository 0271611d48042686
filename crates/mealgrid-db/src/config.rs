use std::env;

/// Where the plan store lives.
///
/// `MEALGRID_DATABASE_URL` wins over the built-in local default.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Full PostgreSQL connection URL.
    pub database_url: String,
}

impl DbConfig {
    pub const URL_ENV: &str = "MEALGRID_DATABASE_URL";

    pub const DEFAULT_URL: &str = "postgresql://localhost:5432/mealgrid";

    pub fn from_env() -> Self {
        let database_url =
            env::var(Self::URL_ENV).unwrap_or_else(|_| Self::DEFAULT_URL.to_owned());
        Self { database_url }
    }

    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }

    /// Database name from the URL path, without query parameters.
    pub fn database_name(&self) -> Option<&str> {
        let (_, tail) = self.database_url.rsplit_once('/')?;
        let name = tail.split('?').next().unwrap_or(tail);
        (!name.is_empty()).then_some(name)
    }

    /// The same server's `postgres` database, for `CREATE DATABASE`.
    /// Query parameters (TLS settings and the like) are kept.
    pub fn maintenance_url(&self) -> String {
        let Some((base, tail)) = self.database_url.rsplit_once('/') else {
            return self.database_url.clone();
        };
        match tail.split_once('?') {
            Some((_, query)) => format!("{base}/postgres?{query}"),
            None => format!("{base}/postgres"),
        }
    }

    /// The URL with any password replaced, for logs and error messages.
    pub fn redacted_url(&self) -> String {
        let url = &self.database_url;
        let Some(scheme_end) = url.find("://").map(|i| i + 3) else {
            return url.clone();
        };
        let rest = &url[scheme_end..];
        let authority_end = rest.find('/').unwrap_or(rest.len());
        let Some(at) = rest[..authority_end].rfind('@') else {
            return url.clone();
        };
        match rest[..at].split_once(':') {
            Some((user, _)) => format!("{}{user}:***{}", &url[..scheme_end], &rest[at..]),
            None => url.clone(),
        }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
