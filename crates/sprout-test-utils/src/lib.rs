//! Test support for sprout: throwaway plan databases and canned generator
//! output ([`fixtures`]).
//!
//! All databases live on one PostgreSQL server per test binary, either
//! `SPROUT_TEST_PG_URL` or a testcontainers instance started on first use.

pub mod fixtures;

use chrono::{Duration, NaiveDate};
use sqlx::PgPool;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

use sprout_db::config::DbConfig;
use sprout_db::pool;
use sprout_db::queries::meals;

struct Server {
    url: String,
    _container: Option<ContainerAsync<Postgres>>,
}

static SERVER: OnceCell<Server> = OnceCell::const_new();

async fn start_server() -> Server {
    if let Ok(url) = std::env::var("SPROUT_TEST_PG_URL") {
        return Server {
            url: url.trim_end_matches('/').to_string(),
            _container: None,
        };
    }

    let container = Postgres::default()
        .with_tag("16")
        .start()
        .await
        .expect("failed to start PostgreSQL container");
    let host = container.get_host().await.expect("failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("failed to get mapped port");

    Server {
        url: format!("postgresql://postgres:postgres@{host}:{port}"),
        _container: Some(container),
    }
}

/// A migrated database that exists for one test.
pub struct TestDb {
    pub pool: PgPool,
    config: DbConfig,
}

impl TestDb {
    pub async fn create() -> Self {
        let server = SERVER.get_or_init(start_server).await;
        let name = format!("sprout_test_{}", Uuid::new_v4().simple());
        let config = DbConfig::new(server.url.as_str()).with_database(&name);

        pool::ensure_database_exists(&config)
            .await
            .unwrap_or_else(|e| panic!("failed to create {name}: {e:#}"));
        let pool = pool::create_pool(&config)
            .await
            .unwrap_or_else(|e| panic!("failed to connect to {name}: {e:#}"));
        pool::run_migrations(&pool)
            .await
            .expect("migrations should succeed");

        Self { pool, config }
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Store `days` days of [`fixtures::stored_meal`] rows for `user`,
    /// starting at `start`. Returns the number of rows written.
    pub async fn seed_meals(&self, user: Uuid, start: NaiveDate, days: usize) -> usize {
        let mut written = 0;
        for day in 0..days {
            let date = start + Duration::days(day as i64);
            for slot in 0..fixtures::MEALS_PER_DAY {
                meals::insert_meal(&self.pool, user, date, &fixtures::stored_meal(day, slot))
                    .await
                    .unwrap_or_else(|e| panic!("failed to seed meal for {date}: {e:#}"));
                written += 1;
            }
        }
        written
    }

    /// Close the pool and drop the database.
    pub async fn drop(self) {
        self.pool.close().await;
        if let Err(e) = pool::drop_database(&self.config).await {
            eprintln!("leaving test database behind: {e:#}");
        }
    }
}
