//! Query functions for segment, incident, and risk rows.
//!
//! The segment and incident queries exclude rows with null coordinates at
//! the SQL level and re-check while decoding — upstream ETL bugs drop
//! individual rows with a warning instead of aborting a scoring run.

use std::fmt::Write as _;

use chrono::NaiveDateTime;
use moosicbox_json_utils::database::ToValue as _;
use street_risk_models::{Incident, RiskLabel, RiskRow, Segment, SegmentRiskDetail};
use switchy_database::{Database, DatabaseValue};

use crate::DbError;

/// Maximum number of parameters `PostgreSQL` allows per statement.
pub const PG_MAX_PARAMS: usize = 65_535;

/// Fetches all street segments that have midpoint coordinates.
///
/// Rows with an empty segment id are dropped.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn fetch_segments(db: &dyn Database) -> Result<Vec<Segment>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT segment_id, street_name, length_m, midpoint_lng, midpoint_lat
             FROM street_segments
             WHERE midpoint_lng IS NOT NULL AND midpoint_lat IS NOT NULL",
            &[],
        )
        .await?;

    let mut segments = Vec::with_capacity(rows.len());

    for row in &rows {
        let segment_id: String = row.to_value("segment_id").unwrap_or_default();
        if segment_id.is_empty() {
            continue;
        }

        let latitude: Option<f64> = row.to_value("midpoint_lat").unwrap_or(None);
        let longitude: Option<f64> = row.to_value("midpoint_lng").unwrap_or(None);
        let (Some(latitude), Some(longitude)) = (latitude, longitude) else {
            log::warn!("Segment {segment_id} has no midpoint, skipping");
            continue;
        };

        segments.push(Segment {
            segment_id,
            street_name: row.to_value("street_name").unwrap_or(None),
            length_m: row.to_value("length_m").unwrap_or(None),
            latitude,
            longitude,
        });
    }

    Ok(segments)
}

/// Fetches incidents with coordinates and an offense date inside the
/// lookback window.
///
/// Rows whose coordinates or offense date fail to decode are dropped with
/// a warning, not treated as fatal.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn fetch_incidents(
    db: &dyn Database,
    window_start: NaiveDateTime,
) -> Result<Vec<Incident>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT cr.report_number, ro.offense_at, cr.latitude, cr.longitude
             FROM report_offenses ro
             INNER JOIN crime_reports cr ON ro.report_number = cr.report_number
             WHERE cr.latitude IS NOT NULL
               AND cr.longitude IS NOT NULL
               AND ro.offense_at IS NOT NULL
               AND ro.offense_at >= $1",
            &[DatabaseValue::DateTime(window_start)],
        )
        .await?;

    let mut incidents = Vec::with_capacity(rows.len());
    let mut dropped = 0u64;

    for row in &rows {
        let report_number: String = row.to_value("report_number").unwrap_or_default();
        let occurred_at: Option<NaiveDateTime> = row.to_value("offense_at").unwrap_or(None);
        let latitude: Option<f64> = row.to_value("latitude").unwrap_or(None);
        let longitude: Option<f64> = row.to_value("longitude").unwrap_or(None);

        let (Some(occurred_at), Some(latitude), Some(longitude)) =
            (occurred_at, latitude, longitude)
        else {
            dropped += 1;
            continue;
        };

        incidents.push(Incident {
            report_number,
            occurred_at,
            latitude,
            longitude,
        });
    }

    if dropped > 0 {
        log::warn!("Dropped {dropped} incident rows with malformed coordinates or dates");
    }

    Ok(incidents)
}

/// Creates the risk table if it does not already exist.
///
/// Safe to call on every run; the foreign key cascades keep risk rows in
/// lockstep with segment renames and deletions.
///
/// # Errors
///
/// Returns [`DbError`] if the DDL statement fails.
pub async fn ensure_risk_table(db: &dyn Database) -> Result<(), DbError> {
    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS street_segment_risk (
            segment_id VARCHAR(50) PRIMARY KEY
                REFERENCES street_segments(segment_id)
                ON UPDATE CASCADE ON DELETE CASCADE,
            cluster_id INT NOT NULL,
            risk_label VARCHAR(10) NOT NULL,
            risk_score DOUBLE PRECISION NOT NULL,
            incident_density DOUBLE PRECISION,
            night_fraction DOUBLE PRECISION,
            window_incidents INT,
            model_version VARCHAR(20),
            summary VARCHAR(255),
            updated_at TIMESTAMP NOT NULL
        )",
    )
    .await?;

    Ok(())
}

/// Parameters consumed per row in the upsert VALUES clause.
const UPSERT_PARAMS_PER_ROW: usize = 10;

/// Upserts the full batch of risk rows inside a single transaction.
///
/// Keyed by `segment_id`: new segments insert, existing ones overwrite
/// every non-key column including `updated_at`. Re-running with identical
/// input rewrites identical values, so the operation is idempotent.
///
/// # Errors
///
/// Returns [`DbError`] if the transaction or any statement fails; nothing
/// is committed in that case.
pub async fn upsert_risk_rows(db: &dyn Database, rows: &[RiskRow]) -> Result<u64, DbError> {
    if rows.is_empty() {
        return Ok(0);
    }

    let chunk_size = PG_MAX_PARAMS / UPSERT_PARAMS_PER_ROW;
    let mut total = 0u64;

    let txn = db.begin_transaction().await?;

    for chunk in rows.chunks(chunk_size) {
        let mut sql = String::from(
            "INSERT INTO street_segment_risk (
                segment_id, cluster_id, risk_label, risk_score,
                incident_density, night_fraction, window_incidents,
                model_version, summary, updated_at
            ) VALUES ",
        );
        let mut params: Vec<DatabaseValue> = Vec::with_capacity(chunk.len() * UPSERT_PARAMS_PER_ROW);
        let mut idx = 1u32;

        for (i, row) in chunk.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            write!(
                sql,
                "(${idx}, ${p1}, ${p2}, ${p3}, ${p4}, ${p5}, ${p6}, ${p7}, ${p8}, ${p9})",
                p1 = idx + 1,
                p2 = idx + 2,
                p3 = idx + 3,
                p4 = idx + 4,
                p5 = idx + 5,
                p6 = idx + 6,
                p7 = idx + 7,
                p8 = idx + 8,
                p9 = idx + 9,
            )
            .unwrap();

            params.push(DatabaseValue::String(row.segment_id.clone()));
            params.push(DatabaseValue::Int32(row.cluster_id));
            params.push(DatabaseValue::String(row.risk_label.as_ref().to_string()));
            params.push(DatabaseValue::Real64(row.risk_score));
            params.push(DatabaseValue::Real64(row.incident_density));
            params.push(DatabaseValue::Real64(row.night_fraction));
            params.push(DatabaseValue::Int64(
                i64::try_from(row.window_incidents).unwrap_or(i64::MAX),
            ));
            params.push(DatabaseValue::String(row.model_version.clone()));
            params.push(DatabaseValue::String(row.summary.clone()));
            params.push(DatabaseValue::DateTime(row.updated_at.naive_utc()));
            idx += 10;
        }

        sql.push_str(
            " ON CONFLICT (segment_id) DO UPDATE SET
                cluster_id = EXCLUDED.cluster_id,
                risk_label = EXCLUDED.risk_label,
                risk_score = EXCLUDED.risk_score,
                incident_density = EXCLUDED.incident_density,
                night_fraction = EXCLUDED.night_fraction,
                window_incidents = EXCLUDED.window_incidents,
                model_version = EXCLUDED.model_version,
                summary = EXCLUDED.summary,
                updated_at = EXCLUDED.updated_at",
        );

        total += txn.exec_raw_params(&sql, &params).await?;
    }

    txn.commit().await?;

    Ok(total)
}

/// Looks up one segment's risk row joined to its street name and midpoint.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails or the stored risk
/// label cannot be decoded.
pub async fn get_segment_risk(
    db: &dyn Database,
    segment_id: &str,
) -> Result<Option<SegmentRiskDetail>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT r.segment_id, r.cluster_id, r.risk_label, r.risk_score,
                    r.incident_density, r.night_fraction, r.window_incidents,
                    r.model_version, r.summary, r.updated_at,
                    s.street_name, s.midpoint_lat, s.midpoint_lng
             FROM street_segment_risk r
             JOIN street_segments s ON r.segment_id = s.segment_id
             WHERE r.segment_id = $1",
            &[DatabaseValue::String(segment_id.to_string())],
        )
        .await?;

    rows.first().map(decode_detail).transpose()
}

/// Fetches all risk rows whose segment midpoints fall inside the bounding
/// box, densest first.
///
/// # Errors
///
/// Returns [`DbError::InvalidBounds`] for an inverted box and [`DbError`]
/// if the database operation fails.
pub async fn risks_within_bounds(
    db: &dyn Database,
    west: f64,
    south: f64,
    east: f64,
    north: f64,
) -> Result<Vec<SegmentRiskDetail>, DbError> {
    if east < west {
        return Err(DbError::InvalidBounds {
            message: format!("east ({east}) is less than west ({west})"),
        });
    }
    if north < south {
        return Err(DbError::InvalidBounds {
            message: format!("north ({north}) is less than south ({south})"),
        });
    }

    let rows = db
        .query_raw_params(
            "SELECT r.segment_id, r.cluster_id, r.risk_label, r.risk_score,
                    r.incident_density, r.night_fraction, r.window_incidents,
                    r.model_version, r.summary, r.updated_at,
                    s.street_name, s.midpoint_lat, s.midpoint_lng
             FROM street_segment_risk r
             JOIN street_segments s ON r.segment_id = s.segment_id
             WHERE s.midpoint_lng BETWEEN $1 AND $2
               AND s.midpoint_lat BETWEEN $3 AND $4
             ORDER BY r.risk_score DESC",
            &[
                DatabaseValue::Real64(west),
                DatabaseValue::Real64(east),
                DatabaseValue::Real64(south),
                DatabaseValue::Real64(north),
            ],
        )
        .await?;

    rows.iter().map(decode_detail).collect()
}

/// Fetches every risk row joined to its segment's name and midpoint.
///
/// Used to build in-memory lookups (e.g. route scoring) from the current
/// risk table.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn all_risks(db: &dyn Database) -> Result<Vec<SegmentRiskDetail>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT r.segment_id, r.cluster_id, r.risk_label, r.risk_score,
                    r.incident_density, r.night_fraction, r.window_incidents,
                    r.model_version, r.summary, r.updated_at,
                    s.street_name, s.midpoint_lat, s.midpoint_lng
             FROM street_segment_risk r
             JOIN street_segments s ON r.segment_id = s.segment_id",
            &[],
        )
        .await?;

    rows.iter().map(decode_detail).collect()
}

/// Decodes one joined risk+segment row into a [`SegmentRiskDetail`].
fn decode_detail(row: &switchy_database::Row) -> Result<SegmentRiskDetail, DbError> {
    let label_name: String = row.to_value("risk_label").unwrap_or_default();
    let risk_label = label_name
        .parse::<RiskLabel>()
        .map_err(|_| DbError::Conversion {
            message: format!("Unknown risk label: {label_name}"),
        })?;

    let updated_at_naive: NaiveDateTime = row.to_value("updated_at").unwrap_or_default();
    let updated_at = chrono::DateTime::<chrono::Utc>::from_naive_utc_and_offset(
        updated_at_naive,
        chrono::Utc,
    );

    let window_incidents: i64 = row.to_value("window_incidents").unwrap_or(0);

    #[allow(clippy::cast_sign_loss)]
    let risk = RiskRow {
        segment_id: row.to_value("segment_id").unwrap_or_default(),
        cluster_id: row.to_value("cluster_id").unwrap_or(0),
        risk_label,
        risk_score: row.to_value("risk_score").unwrap_or(0.0),
        incident_density: row.to_value("incident_density").unwrap_or(0.0),
        night_fraction: row.to_value("night_fraction").unwrap_or(0.0),
        window_incidents: window_incidents.max(0) as u64,
        model_version: row.to_value("model_version").unwrap_or_default(),
        summary: row.to_value("summary").unwrap_or_default(),
        updated_at,
    };

    Ok(SegmentRiskDetail {
        risk,
        street_name: row.to_value("street_name").unwrap_or(None),
        latitude: row.to_value("midpoint_lat").unwrap_or(0.0),
        longitude: row.to_value("midpoint_lng").unwrap_or(0.0),
    })
}
