//! PostGIS-backed observation table.
//!
//! Expected layout (schema management is out of scope):
//!
//! ```sql
//! CREATE TABLE weather_observations (
//!     station_id  TEXT NOT NULL,
//!     value       DOUBLE PRECISION,
//!     observed_at TIMESTAMPTZ NOT NULL,
//!     geom        geometry(Point, 4326),
//!     UNIQUE (station_id, observed_at)
//! );
//! ```

use crate::config::{StationSelection, StoreConfig};
use crate::error::Result;
use crate::geometry::ObservationPoint;
use crate::source::{PointSource, StationReading};
use chrono::{DateTime, Utc};
use log::{debug, info};
use sqlx::postgres::{PgPool, PgPoolOptions};

/// SRID of stored station geometries (lon/lat)
pub const OBSERVATION_SRID: i32 = 4326;

fn insert_sql(table: &str) -> String {
    format!(
        "INSERT INTO {} (station_id, value, observed_at, geom) \
         VALUES ($1, $2, $3, ST_SetSRID(ST_MakePoint($4, $5), $6)) \
         ON CONFLICT DO NOTHING",
        table
    )
}

fn quorum_sql(table: &str) -> String {
    format!(
        "SELECT observed_at FROM {} \
         WHERE station_id = ANY($1) \
         GROUP BY observed_at \
         HAVING COUNT(DISTINCT station_id) >= $2 \
         ORDER BY observed_at DESC \
         LIMIT 1",
        table
    )
}

fn points_sql(table: &str) -> String {
    format!(
        "SELECT ST_X(geom) AS x, ST_Y(geom) AS y, value FROM {} WHERE observed_at = $1",
        table
    )
}

#[derive(Debug, Clone)]
pub struct PostgisStore {
    pool: PgPool,
    table: String,
}

impl PostgisStore {
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        info!("Connecting to observation store (table {})", config.table);
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(&config.database_url)
            .await?;

        Ok(Self {
            pool,
            table: config.table.clone(),
        })
    }

    /// Insert readings in one transaction; duplicates are ignored.
    /// Returns the number of rows actually inserted.
    pub async fn insert_readings(&self, readings: &[StationReading]) -> Result<u64> {
        let sql = insert_sql(&self.table);
        let mut transaction = self.pool.begin().await?;
        let mut inserted = 0;

        for reading in readings {
            let result = sqlx::query(&sql)
                .bind(&reading.station_id)
                .bind(reading.value)
                .bind(reading.observed_at)
                .bind(reading.lon)
                .bind(reading.lat)
                .bind(OBSERVATION_SRID)
                .execute(&mut *transaction)
                .await?;
            inserted += result.rows_affected();
        }

        transaction.commit().await?;
        info!("{} of {} records inserted", inserted, readings.len());
        Ok(inserted)
    }
}

impl PointSource for PostgisStore {
    async fn latest_complete_timestamp(
        &self,
        selection: &StationSelection,
    ) -> Result<Option<DateTime<Utc>>> {
        let latest = sqlx::query_scalar::<_, DateTime<Utc>>(&quorum_sql(&self.table))
            .bind(&selection.stations)
            .bind(selection.quorum as i64)
            .fetch_optional(&self.pool)
            .await?;
        debug!("Latest quorum timestamp: {:?}", latest);
        Ok(latest)
    }

    async fn points_at(&self, at: DateTime<Utc>) -> Result<Vec<ObservationPoint>> {
        let rows = sqlx::query_as::<_, (f64, f64, f64)>(&points_sql(&self.table))
            .bind(at)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(x, y, value)| ObservationPoint::new(x, y, value))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_TABLE;
    use chrono::TimeZone;

    #[test]
    fn test_sql_uses_table() {
        assert!(insert_sql("obs").starts_with("INSERT INTO obs "));
        assert!(quorum_sql("public.obs").contains("FROM public.obs "));
        assert!(points_sql("obs").ends_with("FROM obs WHERE observed_at = $1"));
    }

    #[test]
    fn test_insert_is_idempotent_sql() {
        assert!(insert_sql(DEFAULT_TABLE).ends_with("ON CONFLICT DO NOTHING"));
    }

    #[tokio::test]
    #[ignore]
    async fn should_round_trip_readings() {
        let url = std::env::var("DATABASE_URL").unwrap();
        let store = PostgisStore::connect(&StoreConfig::new(url, DEFAULT_TABLE).unwrap())
            .await
            .unwrap();

        let observed_at = Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap();
        let readings: Vec<StationReading> = ["scl016", "scl069"]
            .iter()
            .enumerate()
            .map(|(i, id)| StationReading {
                station_id: id.to_string(),
                observed_at,
                lon: 13.0 + i as f64,
                lat: 38.0,
                value: i as f64,
            })
            .collect();
        store.insert_readings(&readings).await.unwrap();

        let selection = StationSelection {
            stations: vec!["scl016".to_string(), "scl069".to_string()],
            quorum: 2,
        };
        assert!(store
            .latest_complete_timestamp(&selection)
            .await
            .unwrap()
            .is_some());
        assert!(store.points_at(observed_at).await.unwrap().len() >= 2);
    }
}
