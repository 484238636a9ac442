//! ComponentService: CRUD over karoseri components.

use crate::{
    errors::{ServiceError, ServiceResult},
    models::{
        component::{Component, ComponentUpdate, NewComponent},
        pagination::{Page, PageParams},
    },
};
use chrono::Utc;
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, info};
use uuid::Uuid;

const COMPONENT_COLUMNS: &str =
    "id, code, name, category, description, is_active, created_at, updated_at";

/// Filters accepted by [`ComponentService::list`].
#[derive(Debug, Clone, Default)]
pub struct ComponentFilter {
    pub category: Option<String>,
    pub is_active: Option<bool>,
    /// Case-insensitive substring of `code` or `name`.
    pub search: Option<String>,
}

#[derive(Clone)]
pub struct ComponentService {
    pub db: Arc<SqlitePool>,
}

impl ComponentService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    pub async fn create(&self, data: NewComponent) -> ServiceResult<Component> {
        data.validate().map_err(ServiceError::Validation)?;
        info!("Creating component: {}", data.code);

        if self.get_by_code(&data.code).await?.is_some() {
            return Err(ServiceError::DuplicateCode(data.code));
        }

        let now = Utc::now();
        let component = Component {
            id: Uuid::new_v4(),
            code: data.code,
            name: data.name,
            category: data.category,
            description: data.description,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO components (id, code, name, category, description, is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(component.id)
        .bind(&component.code)
        .bind(&component.name)
        .bind(&component.category)
        .bind(&component.description)
        .bind(component.is_active)
        .bind(component.created_at)
        .bind(component.updated_at)
        .execute(&*self.db)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                ServiceError::DuplicateCode(component.code.clone())
            } else {
                ServiceError::Sqlx(err)
            }
        })?;

        info!("Component created: {}", component.id);
        Ok(component)
    }

    pub async fn get_by_id(&self, id: Uuid) -> ServiceResult<Option<Component>> {
        debug!("Getting component: {}", id);
        let component = sqlx::query_as::<_, Component>(&format!(
            "SELECT {COMPONENT_COLUMNS} FROM components WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&*self.db)
        .await?;
        Ok(component)
    }

    /// Like [`get_by_id`](Self::get_by_id) but missing rows are an error.
    pub async fn require(&self, id: Uuid) -> ServiceResult<Component> {
        self.get_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound("Component"))
    }

    pub async fn get_by_code(&self, code: &str) -> ServiceResult<Option<Component>> {
        let component = sqlx::query_as::<_, Component>(&format!(
            "SELECT {COMPONENT_COLUMNS} FROM components WHERE code = ?"
        ))
        .bind(code)
        .fetch_optional(&*self.db)
        .await?;
        Ok(component)
    }

    /// Load many components at once, keyed by id.
    pub async fn get_many(&self, ids: &[Uuid]) -> ServiceResult<HashMap<Uuid, Component>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {COMPONENT_COLUMNS} FROM components WHERE id IN ("
        ));
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let rows: Vec<Component> = builder.build_query_as().fetch_all(&*self.db).await?;
        Ok(rows.into_iter().map(|c| (c.id, c)).collect())
    }

    pub async fn list(
        &self,
        params: PageParams,
        filter: &ComponentFilter,
    ) -> ServiceResult<Page<Component>> {
        params.validate().map_err(ServiceError::Validation)?;
        debug!("Getting components: page={}, size={}", params.page, params.size);

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM components WHERE 1 = 1");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&*self.db).await?;

        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {COMPONENT_COLUMNS} FROM components WHERE 1 = 1"
        ));
        push_filters(&mut builder, filter);
        builder.push(" ORDER BY created_at DESC, rowid DESC LIMIT ");
        builder.push_bind(params.limit());
        builder.push(" OFFSET ");
        builder.push_bind(params.offset());

        let items: Vec<Component> = builder.build_query_as().fetch_all(&*self.db).await?;
        Ok(Page::new(items, total, params))
    }

    pub async fn update(&self, id: Uuid, data: ComponentUpdate) -> ServiceResult<Component> {
        data.validate().map_err(ServiceError::Validation)?;
        info!("Updating component: {}", id);

        let mut component = self.require(id).await?;
        if let Some(code) = &data.code {
            if let Some(existing) = self.get_by_code(code).await? {
                if existing.id != id {
                    return Err(ServiceError::DuplicateCode(code.clone()));
                }
            }
        }

        if let Some(code) = data.code {
            component.code = code;
        }
        if let Some(name) = data.name {
            component.name = name;
        }
        if let Some(category) = data.category {
            component.category = category;
        }
        if let Some(description) = data.description {
            component.description = description;
        }
        if let Some(is_active) = data.is_active {
            component.is_active = is_active;
        }
        component.updated_at = Utc::now();

        sqlx::query(
            "UPDATE components
             SET code = ?, name = ?, category = ?, description = ?, is_active = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&component.code)
        .bind(&component.name)
        .bind(&component.category)
        .bind(&component.description)
        .bind(component.is_active)
        .bind(component.updated_at)
        .bind(id)
        .execute(&*self.db)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                ServiceError::DuplicateCode(component.code.clone())
            } else {
                ServiceError::Sqlx(err)
            }
        })?;

        info!("Component updated: {}", id);
        Ok(component)
    }

    /// Delete a component along with its damage records and predictions.
    pub async fn delete(&self, id: Uuid) -> ServiceResult<()> {
        info!("Deleting component: {}", id);
        let result = sqlx::query("DELETE FROM components WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("Component"));
        }
        info!("Component deleted: {}", id);
        Ok(())
    }

    pub async fn count(&self) -> ServiceResult<i64> {
        let total = sqlx::query_scalar("SELECT COUNT(*) FROM components")
            .fetch_one(&*self.db)
            .await?;
        Ok(total)
    }

    /// Distinct categories in alphabetical order.
    pub async fn categories(&self) -> ServiceResult<Vec<String>> {
        let categories =
            sqlx::query_scalar("SELECT DISTINCT category FROM components ORDER BY category")
                .fetch_all(&*self.db)
                .await?;
        Ok(categories)
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &ComponentFilter) {
    if let Some(category) = &filter.category {
        builder.push(" AND category = ");
        builder.push_bind(category.clone());
    }
    if let Some(is_active) = filter.is_active {
        builder.push(" AND is_active = ");
        builder.push_bind(is_active);
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(search));
        builder.push(" AND (code LIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" ESCAPE '\\' OR name LIKE ");
        builder.push_bind(pattern);
        builder.push(" ESCAPE '\\')");
    }
}

/// Escape LIKE wildcards so user input matches literally.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Return true if SQLx error indicates a unique constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;

    fn new_component(code: &str, name: &str, category: &str) -> NewComponent {
        NewComponent {
            code: code.into(),
            name: name.into(),
            category: category.into(),
            description: None,
        }
    }

    async fn service() -> ComponentService {
        ComponentService::new(Arc::new(memory_pool().await))
    }

    #[tokio::test]
    async fn create_and_fetch() {
        let svc = service().await;
        let created = svc
            .create(new_component("KRS-001", "Roof Panel", "Body Panel"))
            .await
            .unwrap();
        assert!(created.is_active);

        let fetched = svc.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.code, "KRS-001");
        assert_eq!(svc.get_by_code("KRS-001").await.unwrap().unwrap().id, created.id);
    }

    #[tokio::test]
    async fn duplicate_code_is_rejected() {
        let svc = service().await;
        svc.create(new_component("KRS-001", "Roof", "Body"))
            .await
            .unwrap();
        let err = svc
            .create(new_component("KRS-001", "Door", "Body"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateCode(code) if code == "KRS-001"));
    }

    #[tokio::test]
    async fn list_filters_and_paginates() {
        let svc = service().await;
        svc.create(new_component("KRS-001", "Roof Panel", "Body Panel"))
            .await
            .unwrap();
        svc.create(new_component("KRS-002", "Side Door", "Door"))
            .await
            .unwrap();
        svc.create(new_component("KRS-003", "Rear Door", "Door"))
            .await
            .unwrap();

        let all = svc
            .list(PageParams { page: 1, size: 2 }, &ComponentFilter::default())
            .await
            .unwrap();
        assert_eq!(all.total, 3);
        assert_eq!(all.pages, 2);
        assert_eq!(all.items.len(), 2);
        // newest first
        assert_eq!(all.items[0].code, "KRS-003");

        let doors = svc
            .list(
                PageParams::default(),
                &ComponentFilter {
                    category: Some("Door".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(doors.total, 2);

        let search = svc
            .list(
                PageParams::default(),
                &ComponentFilter {
                    search: Some("roof".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(search.total, 1);
        assert_eq!(search.items[0].code, "KRS-001");

        assert_eq!(svc.categories().await.unwrap(), vec!["Body Panel", "Door"]);
        assert_eq!(svc.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn update_is_partial_and_guards_code() {
        let svc = service().await;
        let a = svc
            .create(new_component("KRS-001", "Roof", "Body"))
            .await
            .unwrap();
        svc.create(new_component("KRS-002", "Door", "Body"))
            .await
            .unwrap();

        let updated = svc
            .update(
                a.id,
                ComponentUpdate {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!updated.is_active);
        assert_eq!(updated.name, "Roof");

        let inactive = svc
            .list(
                PageParams::default(),
                &ComponentFilter {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(inactive.total, 1);

        let err = svc
            .update(
                a.id,
                ComponentUpdate {
                    code: Some("KRS-002".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateCode(_)));

        // keeping its own code is fine
        svc.update(
            a.id,
            ComponentUpdate {
                code: Some("KRS-001".into()),
                description: Some(Some("outer skin".into())),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let cleared = svc
            .update(
                a.id,
                ComponentUpdate {
                    description: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.description, None);
        assert_eq!(svc.require(a.id).await.unwrap().description, None);
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let svc = service().await;
        let err = svc.delete(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("Component")));
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_a\\b"), "50\\%\\_a\\\\b");
    }
}
