use chrono::Utc;
use sqlx::sqlite::SqlitePool;
use std::fmt;
use tracing::info;

/// One schema step and the statement that reverts it.
#[derive(Clone, Debug)]
pub struct Migration {
    version: i32,
    up: &'static str,
    down: &'static str,
}

impl Migration {
    pub const fn new(version: i32, up: &'static str, down: &'static str) -> Self {
        Self { version, up, down }
    }

    pub fn version(&self) -> i32 {
        self.version
    }
}

impl fmt::Display for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "migration {}", self.version)
    }
}

pub const MIGRATIONS: &[Migration] = &[
    Migration::new(
        1,
        r#"
        CREATE TABLE IF NOT EXISTS listings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source TEXT NOT NULL,
            typology TEXT NOT NULL,
            title TEXT NOT NULL,
            link TEXT NOT NULL,
            full_address TEXT,
            price TEXT,
            price_per_area TEXT,
            city TEXT,
            region TEXT,
            extra_attributes TEXT NOT NULL DEFAULT '{}',
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            UNIQUE(source, link)
        )
        "#,
        "DROP TABLE IF EXISTS listings",
    ),
    Migration::new(
        2,
        "CREATE INDEX IF NOT EXISTS idx_listings_source_typology ON listings(source, typology)",
        "DROP INDEX IF EXISTS idx_listings_source_typology",
    ),
];

const HISTORY_TABLE: &str = "CREATE TABLE IF NOT EXISTS migrations (
    version INTEGER PRIMARY KEY,
    applied_at DATETIME NOT NULL
)";

/// Brings the schema up to the latest version. Each pending migration runs in
/// its own transaction together with its history row. Returns how many ran.
pub async fn apply_migrations(pool: &SqlitePool) -> Result<usize, sqlx::Error> {
    sqlx::query(HISTORY_TABLE).execute(pool).await?;
    let applied = applied_versions(pool).await?;

    let mut count = 0;
    for migration in MIGRATIONS.iter().filter(|m| !applied.contains(&m.version)) {
        let mut tx = pool.begin().await?;
        sqlx::query(migration.up).execute(&mut *tx).await?;
        sqlx::query("INSERT INTO migrations (version, applied_at) VALUES (?, ?)")
            .bind(migration.version)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!("Applied {}", migration);
        count += 1;
    }

    Ok(count)
}

/// Reverts a single applied migration.
pub async fn rollback_migration(pool: &SqlitePool, version: i32) -> Result<(), sqlx::Error> {
    let Some(migration) = MIGRATIONS.iter().find(|m| m.version == version) else {
        return Err(sqlx::Error::Protocol(format!("unknown migration version {}", version)));
    };

    let mut tx = pool.begin().await?;
    sqlx::query(migration.down).execute(&mut *tx).await?;
    sqlx::query("DELETE FROM migrations WHERE version = ?")
        .bind(version)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!("Rolled back {}", migration);
    Ok(())
}

pub async fn applied_versions(pool: &SqlitePool) -> Result<Vec<i32>, sqlx::Error> {
    sqlx::query_scalar("SELECT version FROM migrations ORDER BY version")
        .fetch_all(pool)
        .await
}
