pub mod migrations;

pub use migrations::{apply_migrations, rollback_migration, Migration, MIGRATIONS};

use crate::{EnrichedRecord, Result};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqliteRow};
use sqlx::{FromRow, QueryBuilder, Row, Sqlite};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;
use url::Url;

/// An enriched record as persisted, with its bookkeeping columns.
#[derive(Debug, Clone)]
pub struct StoredListing {
    pub id: i64,
    pub source: String,
    pub typology: String,
    pub record: EnrichedRecord,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for StoredListing {
    fn from_row(row: &'r SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        let link: String = row.try_get("link")?;
        let link = Url::from_str(&link).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        let extra: String = row.try_get("extra_attributes")?;
        let extra_attributes: IndexMap<String, String> =
            serde_json::from_str(&extra).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        Ok(StoredListing {
            id: row.try_get("id")?,
            source: row.try_get("source")?,
            typology: row.try_get("typology")?,
            record: EnrichedRecord {
                title: row.try_get("title")?,
                link,
                full_address: row.try_get("full_address")?,
                price: row.try_get("price")?,
                price_per_area: row.try_get("price_per_area")?,
                city: row.try_get("city")?,
                region: row.try_get("region")?,
                extra_attributes,
            },
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub source: Option<String>,
    pub typology: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Clone, Debug)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;

        let applied = apply_migrations(&pool).await?;
        debug!("{} pending migrations applied to {}", applied, db_path.display());

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Inserts the record, or refreshes the stored row with the same source and link.
    pub async fn save_record(
        &self,
        source: &str,
        typology: &str,
        record: &EnrichedRecord,
    ) -> Result<i64> {
        let now = Utc::now();
        let extra = serde_json::to_string(&record.extra_attributes)?;

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM listings WHERE source = ? AND link = ?")
                .bind(source)
                .bind(record.link.as_str())
                .fetch_optional(&self.pool)
                .await?;

        match existing {
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE listings SET
                        typology = ?,
                        title = ?,
                        full_address = ?,
                        price = ?,
                        price_per_area = ?,
                        city = ?,
                        region = ?,
                        extra_attributes = ?,
                        updated_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(typology)
                .bind(&record.title)
                .bind(&record.full_address)
                .bind(&record.price)
                .bind(&record.price_per_area)
                .bind(&record.city)
                .bind(&record.region)
                .bind(&extra)
                .bind(now)
                .bind(id)
                .execute(&self.pool)
                .await?;

                Ok(id)
            }
            None => {
                let id = sqlx::query(
                    r#"
                    INSERT INTO listings (
                        source, typology, title, link, full_address, price,
                        price_per_area, city, region, extra_attributes,
                        created_at, updated_at
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(source)
                .bind(typology)
                .bind(&record.title)
                .bind(record.link.as_str())
                .bind(&record.full_address)
                .bind(&record.price)
                .bind(&record.price_per_area)
                .bind(&record.city)
                .bind(&record.region)
                .bind(&extra)
                .bind(now)
                .bind(now)
                .execute(&self.pool)
                .await?
                .last_insert_rowid();

                Ok(id)
            }
        }
    }

    pub async fn save_records(
        &self,
        source: &str,
        typology: &str,
        records: &[EnrichedRecord],
    ) -> Result<usize> {
        for record in records {
            self.save_record(source, typology, record).await?;
        }
        Ok(records.len())
    }

    pub async fn list_records(&self, filter: &RecordFilter) -> Result<Vec<StoredListing>> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM listings WHERE 1=1");

        if let Some(source) = &filter.source {
            builder.push(" AND source = ");
            builder.push_bind(source);
        }
        if let Some(typology) = &filter.typology {
            builder.push(" AND typology = ");
            builder.push_bind(typology);
        }

        builder.push(" ORDER BY id");

        // SQLite only accepts OFFSET after a LIMIT; -1 means unbounded.
        if filter.limit.is_some() || filter.offset.is_some() {
            builder.push(" LIMIT ");
            builder.push_bind(filter.limit.unwrap_or(-1));
        }
        if let Some(offset) = filter.offset {
            builder.push(" OFFSET ");
            builder.push_bind(offset);
        }

        let listings = builder
            .build_query_as::<StoredListing>()
            .fetch_all(&self.pool)
            .await?;

        Ok(listings)
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM listings")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
