//! PostgreSQL marketplace store
//!
//! Match queries are translated into parameterised `WHERE` clauses; every
//! user-supplied value is bound, never interpolated.

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{ListingStatus, Requirement, RequirementStatus, VehicleListing, VehicleType};
use crate::query::{Collection, MatchQuery, Predicate};
use crate::store::traits::{expect_collection, MarketplaceStore, StoreError, StoreResult};

const LISTING_COLUMNS: &str =
    "id, vehicle_type, make, model, year, price, location, status, posted_by, created_at";

const REQUIREMENT_COLUMNS: &str = "id, vehicle_type, make, model, year_range_min, year_range_max, \
     price_range_min, price_range_max, location, description, status, posted_by, created_at";

/// PostgreSQL-backed marketplace store
#[derive(Debug, Clone)]
pub struct PostgresMarketplaceStore {
    pool: PgPool,
}

impl PostgresMarketplaceStore {
    /// Connect using the store configuration
    pub async fn connect(config: &config::PostgresConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
            .connect(&config.connection_url())
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to connect to database: {}", e)))?;

        info!(
            host = %config.host,
            database = %config.database,
            "Connected to PostgreSQL marketplace store"
        );

        Ok(Self { pool })
    }

    /// Create from an existing connection pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the marketplace tables if they do not exist
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        let migration_sql = include_str!("../../../../migrations/001_create_marketplace.sql");
        sqlx::raw_sql(migration_sql)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {}", e)))?;
        info!("Marketplace schema ready");
        Ok(())
    }

    async fn fetch(&self, columns: &str, query: &MatchQuery) -> StoreResult<Vec<PgRow>> {
        let (clause, params) = where_clause(query);
        let sql = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY {} {}",
            columns,
            query.collection.as_str(),
            clause,
            query.order_by.column(),
            if query.order_by.descending { "DESC" } else { "ASC" }
        );
        debug!(sql = %sql, "Running match query");

        let mut q = sqlx::query(&sql);
        for param in params {
            q = q.bind(param);
        }
        q.fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

/// Render predicates as `AND`-joined SQL with `$n` placeholders
pub(crate) fn where_clause(query: &MatchQuery) -> (String, Vec<String>) {
    if query.predicates.is_empty() {
        return ("TRUE".to_string(), Vec::new());
    }

    let mut clauses = Vec::with_capacity(query.predicates.len());
    let mut params = Vec::with_capacity(query.predicates.len());

    for (idx, predicate) in query.predicates.iter().enumerate() {
        let n = idx + 1;
        let column = predicate.field().column();
        match predicate {
            Predicate::Equals { value, .. } => {
                clauses.push(format!("{} = ${}", column, n));
                params.push(value.clone());
            }
            Predicate::EqualsIgnoreCase { value, .. } => {
                clauses.push(format!("LOWER({}) = LOWER(${})", column, n));
                params.push(value.clone());
            }
            Predicate::ContainsIgnoreCase { value, .. } => {
                clauses.push(format!("{} ILIKE ${} ESCAPE '\\'", column, n));
                params.push(format!("%{}%", escape_like(value)));
            }
        }
    }

    (clauses.join(" AND "), params)
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn decode_err(e: sqlx::Error) -> StoreError {
    StoreError::Serialization(e.to_string())
}

fn parse_column<T: FromStr>(row: &PgRow, column: &str) -> StoreResult<T>
where
    T::Err: std::fmt::Display,
{
    let raw: String = row.try_get(column).map_err(decode_err)?;
    raw.parse::<T>()
        .map_err(|e| StoreError::Serialization(format!("column '{}': {}", column, e)))
}

fn row_to_listing(row: &PgRow) -> StoreResult<VehicleListing> {
    Ok(VehicleListing {
        id: row.try_get("id").map_err(decode_err)?,
        vehicle_type: parse_column::<VehicleType>(row, "vehicle_type")?,
        make: row.try_get("make").map_err(decode_err)?,
        model: row.try_get("model").map_err(decode_err)?,
        year: row.try_get("year").map_err(decode_err)?,
        price: row.try_get("price").map_err(decode_err)?,
        location: row.try_get("location").map_err(decode_err)?,
        status: parse_column::<ListingStatus>(row, "status")?,
        posted_by: row.try_get("posted_by").map_err(decode_err)?,
        created_at: row.try_get("created_at").map_err(decode_err)?,
    })
}

fn row_to_requirement(row: &PgRow) -> StoreResult<Requirement> {
    Ok(Requirement {
        id: row.try_get("id").map_err(decode_err)?,
        vehicle_type: parse_column::<VehicleType>(row, "vehicle_type")?,
        make: row.try_get("make").map_err(decode_err)?,
        model: row.try_get("model").map_err(decode_err)?,
        year_range_min: row.try_get("year_range_min").map_err(decode_err)?,
        year_range_max: row.try_get("year_range_max").map_err(decode_err)?,
        price_range_min: row.try_get("price_range_min").map_err(decode_err)?,
        price_range_max: row.try_get("price_range_max").map_err(decode_err)?,
        location: row.try_get("location").map_err(decode_err)?,
        description: row.try_get("description").map_err(decode_err)?,
        status: parse_column::<RequirementStatus>(row, "status")?,
        posted_by: row.try_get("posted_by").map_err(decode_err)?,
        created_at: row.try_get("created_at").map_err(decode_err)?,
    })
}

#[async_trait]
impl MarketplaceStore for PostgresMarketplaceStore {
    async fn find_requirements(&self, query: &MatchQuery) -> StoreResult<Vec<Requirement>> {
        expect_collection(query, Collection::Requirements)?;
        let rows = self.fetch(REQUIREMENT_COLUMNS, query).await?;
        rows.iter().map(row_to_requirement).collect()
    }

    async fn find_listings(&self, query: &MatchQuery) -> StoreResult<Vec<VehicleListing>> {
        expect_collection(query, Collection::Listings)?;
        let rows = self.fetch(LISTING_COLUMNS, query).await?;
        rows.iter().map(row_to_listing).collect()
    }

    async fn insert_listing(&self, listing: VehicleListing) -> StoreResult<VehicleListing> {
        sqlx::query(&format!(
            "INSERT INTO vehicles ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            LISTING_COLUMNS
        ))
        .bind(listing.id)
        .bind(listing.vehicle_type.as_str())
        .bind(&listing.make)
        .bind(&listing.model)
        .bind(listing.year)
        .bind(listing.price)
        .bind(&listing.location)
        .bind(listing.status.as_str())
        .bind(&listing.posted_by)
        .bind(listing.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        info!(listing_id = %listing.id, "Listing inserted");
        Ok(listing)
    }

    async fn insert_requirement(&self, requirement: Requirement) -> StoreResult<Requirement> {
        sqlx::query(&format!(
            "INSERT INTO requirements ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
            REQUIREMENT_COLUMNS
        ))
        .bind(requirement.id)
        .bind(requirement.vehicle_type.as_str())
        .bind(&requirement.make)
        .bind(&requirement.model)
        .bind(requirement.year_range_min)
        .bind(requirement.year_range_max)
        .bind(requirement.price_range_min)
        .bind(requirement.price_range_max)
        .bind(&requirement.location)
        .bind(&requirement.description)
        .bind(requirement.status.as_str())
        .bind(&requirement.posted_by)
        .bind(requirement.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        info!(requirement_id = %requirement.id, "Requirement inserted");
        Ok(requirement)
    }

    async fn update_listing_status(&self, id: Uuid, status: ListingStatus) -> StoreResult<()> {
        let result = sqlx::query("UPDATE vehicles SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn update_requirement_status(
        &self,
        id: Uuid,
        status: RequirementStatus,
    ) -> StoreResult<()> {
        let result = sqlx::query("UPDATE requirements SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RequirementCriteria, VehicleCriteria};

    #[test]
    fn test_exact_vehicle_query_sql() {
        let vehicle = VehicleCriteria::new(VehicleType::Car, "Toyota", "Innova", 2021);
        let (clause, params) = where_clause(&MatchQuery::vehicle_to_requirement(&vehicle));
        assert_eq!(
            clause,
            "status = $1 AND vehicle_type = $2 AND LOWER(make) = LOWER($3) AND LOWER(model) = LOWER($4)"
        );
        assert_eq!(params, vec!["open", "car", "Toyota", "Innova"]);
    }

    #[test]
    fn test_substring_query_escapes_wildcards() {
        let criteria = RequirementCriteria::new(VehicleType::Bike).with_make("50%_off");
        let (clause, params) = where_clause(&MatchQuery::requirement_to_vehicle(&criteria));
        assert!(clause.ends_with("make ILIKE $3 ESCAPE '\\'"));
        assert_eq!(params[2], "%50\\%\\_off%");
    }
}
