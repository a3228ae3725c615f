//! Where the plan database lives.

/// Connection settings for the plan database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    /// Full PostgreSQL connection URL.
    pub database_url: String,
}

impl DbConfig {
    pub const DEFAULT_URL: &str = "postgresql://localhost:5432/sprout";

    /// Environment variable that overrides the config file's URL.
    pub const ENV_VAR: &str = "SPROUT_DATABASE_URL";

    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }

    /// Database named by the URL path.
    ///
    /// `None` when the URL has no path or the name is not a plain
    /// identifier; `CREATE DATABASE` cannot take it as a bind parameter.
    pub fn database_name(&self) -> Option<&str> {
        let (_, name, _) = self.parts();
        is_identifier(name).then_some(name)
    }

    /// Same server and options, another database.
    pub fn with_database(&self, name: &str) -> Self {
        let (server, _, query) = self.parts();
        Self::new(format!("{server}/{name}{query}"))
    }

    /// The `postgres` database on the same server, where databases are
    /// created and dropped.
    pub fn maintenance(&self) -> Self {
        self.with_database("postgres")
    }

    /// `(server, database, query)`, e.g. `("postgresql://h:5432", "plans", "?sslmode=disable")`.
    fn parts(&self) -> (&str, &str, &str) {
        let url = self.database_url.as_str();
        let authority = url.find("://").map_or(0, |i| i + 3);
        let (server, path) = match url[authority..].find('/') {
            Some(i) => url.split_at(authority + i),
            None => (url, ""),
        };
        let path = path.strip_prefix('/').unwrap_or(path);
        let (name, query) = match path.find('?') {
            Some(i) => path.split_at(i),
            None => (path, ""),
        };
        (server, name, query)
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
