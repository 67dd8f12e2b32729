use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

const COLUMNS: &str = "id, vehicle_model_id, vehicle_make_name, vehicle_model_name, year, \
                       distance_value, distance_unit, carbon_emission_g";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct VehicleEmission {
    pub id: Uuid,
    pub vehicle_model_id: Uuid,
    pub vehicle_make_name: String,
    pub vehicle_model_name: String,
    pub year: i32,
    pub distance_value: f64,
    pub distance_unit: String,
    pub carbon_emission_g: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub vehicle_make_name: Option<String>,
    pub vehicle_model_name: Option<String>,
    pub year: Option<i32>,
    pub cursor: Option<Uuid>,
    pub limit: Option<i64>,
}

impl ListQuery {
    pub fn page_size(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionsPage {
    pub data: Vec<VehicleEmission>,
    pub next_cursor: Option<String>,
}

impl EmissionsPage {
    /// `rows` holds up to one record more than `page_size`; that extra record
    /// only signals that another page exists.
    pub fn from_rows(mut rows: Vec<VehicleEmission>, page_size: i64) -> Self {
        let page_size = usize::try_from(page_size).unwrap_or(0);
        let has_more = rows.len() > page_size;
        rows.truncate(page_size);

        let next_cursor = if has_more {
            rows.last().map(|row| row.id.to_string())
        } else {
            None
        };

        EmissionsPage {
            data: rows,
            next_cursor,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehicleSpec {
    pub make: String,
    pub model: String,
    pub year: i32,
}

impl VehicleSpec {
    pub fn as_key_parts(&self) -> (&str, &str, i32) {
        (&self.make, &self.model, self.year)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompareRequest {
    pub vehicle_1: VehicleSpec,
    pub vehicle_2: VehicleSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareResponse {
    pub vehicle_1: VehicleEmission,
    pub vehicle_2: VehicleEmission,
    pub difference_g: f64,
}

impl CompareResponse {
    pub fn new(vehicle_1: VehicleEmission, vehicle_2: VehicleEmission) -> Self {
        let difference_g = vehicle_1.carbon_emission_g - vehicle_2.carbon_emission_g;
        CompareResponse {
            vehicle_1,
            vehicle_2,
            difference_g,
        }
    }
}

impl VehicleEmission {
    pub async fn list(pool: &PgPool, query: &ListQuery) -> Result<Vec<Self>, sqlx::Error> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM vehicle_emissions WHERE TRUE", COLUMNS));

        if let Some(make) = &query.vehicle_make_name {
            builder.push(" AND vehicle_make_name = ").push_bind(make);
        }
        if let Some(model) = &query.vehicle_model_name {
            builder.push(" AND vehicle_model_name = ").push_bind(model);
        }
        if let Some(year) = query.year {
            builder.push(" AND year = ").push_bind(year);
        }
        if let Some(cursor) = query.cursor {
            builder.push(" AND id > ").push_bind(cursor);
        }
        builder
            .push(" ORDER BY id LIMIT ")
            .push_bind(query.page_size() + 1);

        let rows = builder.build_query_as::<VehicleEmission>().fetch_all(pool).await?;
        tracing::debug!("Fetched {} vehicle emission rows", rows.len());
        Ok(rows)
    }

    pub async fn find_one(pool: &PgPool, spec: &VehicleSpec) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, VehicleEmission>(&format!(
            "SELECT {} FROM vehicle_emissions \
             WHERE vehicle_make_name = $1 AND vehicle_model_name = $2 AND year = $3 \
             ORDER BY id LIMIT 1",
            COLUMNS
        ))
        .bind(&spec.make)
        .bind(&spec.model)
        .bind(spec.year)
        .fetch_optional(pool)
        .await
    }
}
