//! DamageRecordService: training data CRUD, distribution stats, and CSV import.

use crate::{
    errors::{ServiceError, ServiceResult},
    models::{
        damage_record::{
            BulkImportResult, DamageDistribution, DamageFeatures, DamageLevel, DamageRecord,
            DamageRecordResponse, DamageRecordUpdate, FEATURE_COUNT, NewDamageRecord,
        },
        pagination::{Page, PageParams},
    },
    services::component_service::ComponentService,
};
use chrono::Utc;
use serde::Deserialize;
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, info};
use uuid::Uuid;

const RECORD_COLUMNS: &str = "id, component_id, damage_area, damage_depth, damage_point_count, \
     component_age, usage_frequency, corrosion_level, deformation, damage_level, notes, \
     created_at, updated_at";

/// Import errors returned to the client beyond this count are dropped.
pub const MAX_REPORTED_IMPORT_ERRORS: usize = 20;

/// Filters accepted by [`DamageRecordService::list`].
#[derive(Debug, Clone, Default)]
pub struct DamageRecordFilter {
    pub component_id: Option<Uuid>,
    pub damage_level: Option<DamageLevel>,
}

#[derive(Clone)]
pub struct DamageRecordService {
    pub db: Arc<SqlitePool>,
    components: ComponentService,
}

impl DamageRecordService {
    pub fn new(db: Arc<SqlitePool>, components: ComponentService) -> Self {
        Self { db, components }
    }

    pub async fn create(&self, data: NewDamageRecord) -> ServiceResult<DamageRecordResponse> {
        data.features.validate().map_err(ServiceError::Validation)?;
        let component = self.components.require(data.component_id).await?;
        info!("Creating damage record for component: {}", data.component_id);

        let now = Utc::now();
        let record = DamageRecord {
            id: Uuid::new_v4(),
            component_id: data.component_id,
            features: data.features,
            damage_level: data.damage_level,
            notes: data.notes,
            created_at: now,
            updated_at: now,
        };
        insert_record(&*self.db, &record).await?;

        info!("Damage record created: {}", record.id);
        Ok(DamageRecordResponse {
            record,
            component: Some(component),
        })
    }

    async fn fetch(&self, id: Uuid) -> ServiceResult<DamageRecord> {
        debug!("Getting damage record: {}", id);
        sqlx::query_as::<_, DamageRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM damage_records WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(ServiceError::NotFound("Damage record"))
    }

    pub async fn get(&self, id: Uuid) -> ServiceResult<DamageRecordResponse> {
        let record = self.fetch(id).await?;
        let component = self.components.get_by_id(record.component_id).await?;
        Ok(DamageRecordResponse { record, component })
    }

    pub async fn list(
        &self,
        params: PageParams,
        filter: &DamageRecordFilter,
    ) -> ServiceResult<Page<DamageRecordResponse>> {
        params.validate().map_err(ServiceError::Validation)?;
        debug!(
            "Getting damage records: page={}, size={}",
            params.page, params.size
        );

        let mut count =
            QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM damage_records WHERE 1 = 1");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&*self.db).await?;

        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {RECORD_COLUMNS} FROM damage_records WHERE 1 = 1"
        ));
        push_filters(&mut builder, filter);
        builder.push(" ORDER BY created_at DESC, rowid DESC LIMIT ");
        builder.push_bind(params.limit());
        builder.push(" OFFSET ");
        builder.push_bind(params.offset());
        let records: Vec<DamageRecord> = builder.build_query_as().fetch_all(&*self.db).await?;

        let ids: Vec<Uuid> = records.iter().map(|r| r.component_id).collect();
        let components = self.components.get_many(&ids).await?;
        let items = records
            .into_iter()
            .map(|record| DamageRecordResponse {
                component: components.get(&record.component_id).cloned(),
                record,
            })
            .collect();

        Ok(Page::new(items, total, params))
    }

    pub async fn update(
        &self,
        id: Uuid,
        data: DamageRecordUpdate,
    ) -> ServiceResult<DamageRecordResponse> {
        info!("Updating damage record: {}", id);
        let mut record = self.fetch(id).await?;

        let features = data.apply_features(&record.features);
        features.validate().map_err(ServiceError::Validation)?;

        let component_id = data.component_id.unwrap_or(record.component_id);
        let component = self.components.require(component_id).await?;

        record.component_id = component_id;
        record.features = features;
        if let Some(level) = data.damage_level {
            record.damage_level = level;
        }
        if let Some(notes) = data.notes {
            record.notes = notes;
        }
        record.updated_at = Utc::now();

        let f = &record.features;
        sqlx::query(
            "UPDATE damage_records
             SET component_id = ?, damage_area = ?, damage_depth = ?, damage_point_count = ?,
                 component_age = ?, usage_frequency = ?, corrosion_level = ?, deformation = ?,
                 damage_level = ?, notes = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(record.component_id)
        .bind(f.damage_area)
        .bind(f.damage_depth)
        .bind(f.damage_point_count)
        .bind(f.component_age)
        .bind(f.usage_frequency)
        .bind(f.corrosion_level)
        .bind(f.deformation)
        .bind(record.damage_level)
        .bind(&record.notes)
        .bind(record.updated_at)
        .bind(id)
        .execute(&*self.db)
        .await?;

        info!("Damage record updated: {}", id);
        Ok(DamageRecordResponse {
            record,
            component: Some(component),
        })
    }

    pub async fn delete(&self, id: Uuid) -> ServiceResult<()> {
        info!("Deleting damage record: {}", id);
        let result = sqlx::query("DELETE FROM damage_records WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("Damage record"));
        }
        info!("Damage record deleted: {}", id);
        Ok(())
    }

    pub async fn count(&self) -> ServiceResult<i64> {
        let total = sqlx::query_scalar("SELECT COUNT(*) FROM damage_records")
            .fetch_one(&*self.db)
            .await?;
        Ok(total)
    }

    pub async fn distribution(&self) -> ServiceResult<DamageDistribution> {
        debug!("Getting damage distribution");
        let rows: Vec<(DamageLevel, i64)> = sqlx::query_as(
            "SELECT damage_level, COUNT(*) FROM damage_records GROUP BY damage_level",
        )
        .fetch_all(&*self.db)
        .await?;

        let mut distribution = DamageDistribution::default();
        for (level, count) in rows {
            match level {
                DamageLevel::Ringan => distribution.ringan = count,
                DamageLevel::Sedang => distribution.sedang = count,
                DamageLevel::Berat => distribution.berat = count,
            }
            distribution.total += count;
        }
        Ok(distribution)
    }

    /// Every record as a feature vector and its label.
    pub async fn training_data(
        &self,
    ) -> ServiceResult<(Vec<[f64; FEATURE_COUNT]>, Vec<DamageLevel>)> {
        info!("Getting training data");
        let records = sqlx::query_as::<_, DamageRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM damage_records ORDER BY rowid"
        ))
        .fetch_all(&*self.db)
        .await?;

        let data: (Vec<_>, Vec<_>) = records
            .iter()
            .map(|r| (r.features.to_vector(), r.damage_level))
            .unzip();
        info!("Training data retrieved: {} samples", data.0.len());
        Ok(data)
    }

    /// Import records from CSV text.
    ///
    /// Bad rows are skipped and reported as `Row N: reason` (the header is
    /// row 1). Valid rows are inserted in a single transaction.
    pub async fn bulk_import(&self, csv_text: &str) -> ServiceResult<BulkImportResult> {
        let (rows, mut errors) = parse_import_csv(csv_text);
        info!("Bulk importing {} parsed damage records", rows.len());

        let mut component_ids: HashMap<String, Option<Uuid>> = HashMap::new();
        let now = Utc::now();
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let component_id = match component_ids.get(&row.component_code) {
                Some(cached) => *cached,
                None => {
                    let found = self
                        .components
                        .get_by_code(&row.component_code)
                        .await?
                        .map(|c| c.id);
                    component_ids.insert(row.component_code.clone(), found);
                    found
                }
            };
            let Some(component_id) = component_id else {
                errors.push((
                    row.line,
                    format!("Component '{}' not found", row.component_code),
                ));
                continue;
            };
            records.push(DamageRecord {
                id: Uuid::new_v4(),
                component_id,
                features: row.features,
                damage_level: row.damage_level,
                notes: row.notes,
                created_at: now,
                updated_at: now,
            });
        }

        if !records.is_empty() {
            let mut tx = self.db.begin().await?;
            for record in &records {
                insert_record(&mut *tx, record).await?;
            }
            tx.commit().await?;
        }

        errors.sort_by_key(|(line, _)| *line);
        let error_count = errors.len();
        info!(
            "Bulk create completed: {} success, {} errors",
            records.len(),
            error_count
        );
        Ok(BulkImportResult {
            success_count: records.len(),
            error_count,
            errors: errors
                .into_iter()
                .take(MAX_REPORTED_IMPORT_ERRORS)
                .map(|(line, msg)| format!("Row {line}: {msg}"))
                .collect(),
        })
    }
}

async fn insert_record<'e, E>(executor: E, record: &DamageRecord) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let f = &record.features;
    sqlx::query(
        "INSERT INTO damage_records (
            id, component_id, damage_area, damage_depth, damage_point_count, component_age,
            usage_frequency, corrosion_level, deformation, damage_level, notes, created_at, updated_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(record.id)
    .bind(record.component_id)
    .bind(f.damage_area)
    .bind(f.damage_depth)
    .bind(f.damage_point_count)
    .bind(f.component_age)
    .bind(f.usage_frequency)
    .bind(f.corrosion_level)
    .bind(f.deformation)
    .bind(record.damage_level)
    .bind(record.notes.clone())
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(executor)
    .await?;
    Ok(())
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &DamageRecordFilter) {
    if let Some(component_id) = filter.component_id {
        builder.push(" AND component_id = ");
        builder.push_bind(component_id);
    }
    if let Some(level) = filter.damage_level {
        builder.push(" AND damage_level = ");
        builder.push_bind(level);
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    component_code: String,
    damage_area: f64,
    damage_depth: f64,
    damage_point_count: i64,
    component_age: i64,
    usage_frequency: i64,
    corrosion_level: i64,
    deformation: f64,
    damage_level: String,
    #[serde(default)]
    notes: Option<String>,
}

/// A CSV row that passed parsing and validation.
#[derive(Debug, Clone)]
pub struct ImportRow {
    pub line: usize,
    pub component_code: String,
    pub features: DamageFeatures,
    pub damage_level: DamageLevel,
    pub notes: Option<String>,
}

/// Parse and validate import CSV, returning good rows and `(line, reason)` errors.
pub fn parse_import_csv(text: &str) -> (Vec<ImportRow>, Vec<(usize, String)>) {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    let mut errors = Vec::new();
    for (i, result) in reader.deserialize::<CsvRow>().enumerate() {
        let line = i + 2;
        let raw = match result {
            Ok(raw) => raw,
            Err(err) => {
                errors.push((line, csv_error_reason(&err)));
                continue;
            }
        };

        let damage_level = match raw.damage_level.parse::<DamageLevel>() {
            Ok(level) => level,
            Err(err) => {
                errors.push((line, err.to_string()));
                continue;
            }
        };
        let features = DamageFeatures {
            damage_area: raw.damage_area,
            damage_depth: raw.damage_depth,
            damage_point_count: raw.damage_point_count,
            component_age: raw.component_age,
            usage_frequency: raw.usage_frequency,
            corrosion_level: raw.corrosion_level,
            deformation: raw.deformation,
        };
        if let Err(reason) = features.validate() {
            errors.push((line, reason));
            continue;
        }

        rows.push(ImportRow {
            line,
            component_code: raw.component_code,
            features,
            damage_level,
            notes: raw.notes.filter(|n| !n.is_empty()),
        });
    }
    (rows, errors)
}

fn csv_error_reason(err: &csv::Error) -> String {
    match err.kind() {
        csv::ErrorKind::Deserialize { err, .. } => match err.field() {
            Some(field) => format!("invalid value in column {}: {}", field + 1, err.kind()),
            None => err.kind().to_string(),
        },
        _ => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::memory_pool, models::component::NewComponent};

    const HEADER: &str = "component_code,damage_area,damage_depth,damage_point_count,component_age,usage_frequency,corrosion_level,deformation,damage_level,notes";

    fn features() -> DamageFeatures {
        DamageFeatures {
            damage_area: 5.5,
            damage_depth: 1.2,
            damage_point_count: 3,
            component_age: 12,
            usage_frequency: 5,
            corrosion_level: 2,
            deformation: 0.8,
        }
    }

    async fn setup() -> (DamageRecordService, Uuid) {
        let db = Arc::new(memory_pool().await);
        let components = ComponentService::new(db.clone());
        let component = components
            .create(NewComponent {
                code: "KRS-001".into(),
                name: "Roof Panel".into(),
                category: "Body Panel".into(),
                description: None,
            })
            .await
            .unwrap();
        (DamageRecordService::new(db, components), component.id)
    }

    fn new_record(component_id: Uuid, level: DamageLevel) -> NewDamageRecord {
        NewDamageRecord {
            component_id,
            features: features(),
            damage_level: level,
            notes: None,
        }
    }

    #[test]
    fn parses_valid_rows_and_reports_bad_ones() {
        let csv = format!(
            "{HEADER}\n\
             KRS-001,5.5,1.2,3,12,5,2,0.8,Ringan,first\n\
             KRS-001,abc,1.2,3,12,5,2,0.8,Sedang,\n\
             KRS-001,5.5,1.2,3,12,11,2,0.8,Berat,\n\
             KRS-001,5.5,1.2,3,12,5,2,0.8,parah,\n\
             KRS-002,40,6,9,48,8,4,5.0,berat,\n"
        );
        let (rows, errors) = parse_import_csv(&csv);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[0].notes.as_deref(), Some("first"));
        assert_eq!(rows[1].damage_level, DamageLevel::Berat);
        assert_eq!(rows[1].notes, None);

        let lines: Vec<usize> = errors.iter().map(|(l, _)| *l).collect();
        assert_eq!(lines, vec![3, 4, 5]);
        assert!(errors[1].1.contains("usage_frequency"));
        assert!(errors[2].1.contains("damage_level"));
    }

    #[test]
    fn notes_column_is_optional() {
        let csv = "component_code,damage_area,damage_depth,damage_point_count,component_age,usage_frequency,corrosion_level,deformation,damage_level\n\
                   KRS-001,5.5,1.2,3,12,5,2,0.8,ringan\n";
        let (rows, errors) = parse_import_csv(csv);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn create_requires_existing_component() {
        let (svc, _) = setup().await;
        let err = svc
            .create(new_record(Uuid::new_v4(), DamageLevel::Ringan))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("Component")));
    }

    #[tokio::test]
    async fn create_rejects_invalid_features() {
        let (svc, component_id) = setup().await;
        let mut data = new_record(component_id, DamageLevel::Ringan);
        data.features.corrosion_level = 9;
        let err = svc.create(data).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn crud_and_distribution() {
        let (svc, component_id) = setup().await;
        let a = svc
            .create(new_record(component_id, DamageLevel::Ringan))
            .await
            .unwrap();
        svc.create(new_record(component_id, DamageLevel::Berat))
            .await
            .unwrap();
        svc.create(new_record(component_id, DamageLevel::Berat))
            .await
            .unwrap();

        let fetched = svc.get(a.record.id).await.unwrap();
        assert_eq!(fetched.component.unwrap().code, "KRS-001");

        let dist = svc.distribution().await.unwrap();
        assert_eq!(
            dist,
            DamageDistribution {
                ringan: 1,
                sedang: 0,
                berat: 2,
                total: 3
            }
        );

        let heavy = svc
            .list(
                PageParams::default(),
                &DamageRecordFilter {
                    damage_level: Some(DamageLevel::Berat),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(heavy.total, 2);
        assert!(heavy.items.iter().all(|i| i.component.is_some()));

        let updated = svc
            .update(
                a.record.id,
                DamageRecordUpdate {
                    damage_level: Some(DamageLevel::Sedang),
                    damage_area: Some(12.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.record.damage_level, DamageLevel::Sedang);
        assert_eq!(updated.record.features.damage_area, 12.0);
        assert_eq!(updated.record.features.damage_depth, 1.2);

        svc.delete(a.record.id).await.unwrap();
        assert!(matches!(
            svc.get(a.record.id).await.unwrap_err(),
            ServiceError::NotFound("Damage record")
        ));
        assert_eq!(svc.count().await.unwrap(), 2);

        let (x, y) = svc.training_data().await.unwrap();
        assert_eq!(x.len(), 2);
        assert_eq!(y, vec![DamageLevel::Berat, DamageLevel::Berat]);
    }

    #[tokio::test]
    async fn update_can_clear_notes() {
        let (svc, component_id) = setup().await;
        let mut data = new_record(component_id, DamageLevel::Sedang);
        data.notes = Some("left side".into());
        let created = svc.create(data).await.unwrap();

        let kept = svc
            .update(created.record.id, DamageRecordUpdate::default())
            .await
            .unwrap();
        assert_eq!(kept.record.notes.as_deref(), Some("left side"));

        let update: DamageRecordUpdate = serde_json::from_str(r#"{"notes": null}"#).unwrap();
        svc.update(created.record.id, update).await.unwrap();
        assert_eq!(svc.get(created.record.id).await.unwrap().record.notes, None);
    }

    #[tokio::test]
    async fn update_to_unknown_component_is_not_found() {
        let (svc, component_id) = setup().await;
        let created = svc
            .create(new_record(component_id, DamageLevel::Ringan))
            .await
            .unwrap();
        let err = svc
            .update(
                created.record.id,
                DamageRecordUpdate {
                    component_id: Some(Uuid::new_v4()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("Component")));
    }

    #[tokio::test]
    async fn bulk_import_inserts_valid_rows() {
        let (svc, _) = setup().await;
        let mut csv = format!("{HEADER}\n");
        for _ in 0..3 {
            csv.push_str("KRS-001,5.5,1.2,3,12,5,2,0.8,ringan,\n");
        }
        for _ in 0..25 {
            csv.push_str("KRS-404,5.5,1.2,3,12,5,2,0.8,ringan,\n");
        }

        let result = svc.bulk_import(&csv).await.unwrap();
        assert_eq!(result.success_count, 3);
        assert_eq!(result.error_count, 25);
        assert_eq!(result.errors.len(), MAX_REPORTED_IMPORT_ERRORS);
        assert_eq!(result.errors[0], "Row 5: Component 'KRS-404' not found");
        assert_eq!(svc.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn deleting_component_cascades() {
        let (svc, component_id) = setup().await;
        svc.create(new_record(component_id, DamageLevel::Ringan))
            .await
            .unwrap();
        svc.components.delete(component_id).await.unwrap();
        assert_eq!(svc.count().await.unwrap(), 0);
    }
}
