use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::dto::tags::{CreateTagInput, SavedTagDto, TagDetailDto};
use crate::application::services::tagging::TaggingError;
use crate::application::use_cases::logs::list_logs_by_tag::ListLogsByTag;
use crate::application::use_cases::tags::create_tag::CreateTag;
use crate::application::use_cases::tags::get_tag::GetTag;
use crate::application::use_cases::tags::list_tag_links::{ListReferrers, ListTagTags};
use crate::application::use_cases::tags::relink_tag::RelinkTag;
use crate::application::use_cases::tags::search_tags::SearchTags;
use crate::application::use_cases::tags::update_tag::UpdateTag;
use crate::bootstrap::app_context::AppContext;
use crate::domain::tags::tag::{AssociationSort, Tag, TagPatch};
use crate::presentation::http::auth::{self, Bearer};
use crate::presentation::http::logs::LogItem;

#[derive(Debug, Serialize, ToSchema)]
pub struct TagItem {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    pub created_by: Uuid,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub usage_count: i64,
}

impl From<Tag> for TagItem {
    fn from(t: Tag) -> Self {
        TagItem {
            id: t.id,
            name: t.name,
            description: t.description,
            metadata: t.metadata,
            created_by: t.created_by,
            created_at: t.created_at,
            updated_at: t.updated_at,
            usage_count: t.usage_count,
        }
    }
}

pub(crate) fn tag_items(tags: Vec<Tag>) -> Vec<TagItem> {
    tags.into_iter().map(Into::into).collect()
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SavedTagResponse {
    pub tag: TagItem,
    pub associated_tags: Vec<TagItem>,
    pub created: bool,
}

impl From<SavedTagDto> for SavedTagResponse {
    fn from(d: SavedTagDto) -> Self {
        SavedTagResponse {
            tag: d.tag.into(),
            associated_tags: tag_items(d.associated_tags),
            created: d.created,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TagDetailResponse {
    pub tag: TagItem,
    pub associated_tags: Vec<TagItem>,
    pub referrers: Vec<TagItem>,
}

impl From<TagDetailDto> for TagDetailResponse {
    fn from(d: TagDetailDto) -> Self {
        TagDetailResponse {
            tag: d.tag.into(),
            associated_tags: tag_items(d.associated_tags),
            referrers: tag_items(d.referrers),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTagRequest {
    pub name: String,
    pub description: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateTagRequest {
    pub name: Option<String>,
    /// Absent keeps the description; `null` clears it.
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
}

pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LinksQuery {
    pub sort: Option<String>,
    pub limit: Option<i64>,
}

impl LinksQuery {
    pub(crate) fn sort(&self) -> Result<AssociationSort, StatusCode> {
        match self.sort.as_deref() {
            None => Ok(AssociationSort::default()),
            Some(s) => AssociationSort::parse(s).ok_or(StatusCode::BAD_REQUEST),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

/// Maps tagging failures onto HTTP status codes; storage failures are logged.
pub(crate) fn status_for(err: TaggingError) -> StatusCode {
    match err {
        TaggingError::Validation(msg) => {
            tracing::debug!(reason = %msg, "tagging_validation_failed");
            StatusCode::BAD_REQUEST
        }
        TaggingError::SelfReference { tag_id } => {
            tracing::debug!(tag_id = %tag_id, "tag_self_reference_rejected");
            StatusCode::UNPROCESSABLE_ENTITY
        }
        TaggingError::Storage(e) => {
            tracing::error!(error = ?e, "tagging_storage_failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub(crate) fn internal(e: anyhow::Error) -> StatusCode {
    tracing::error!(error = ?e, "request_failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

#[utoipa::path(post, path = "/api/tags", tag = "Tags", request_body = CreateTagRequest,
    responses(
        (status = 201, body = SavedTagResponse, description = "Tag created"),
        (status = 200, body = SavedTagResponse, description = "Existing tag with the same name"),
        (status = 400, description = "Invalid name"),
        (status = 422, description = "Description references the tag itself")
    ))]
pub async fn create_tag(
    State(ctx): State<AppContext>,
    bearer: Bearer,
    Json(req): Json<CreateTagRequest>,
) -> Result<(StatusCode, Json<SavedTagResponse>), StatusCode> {
    let user_id = auth::require_user(&ctx.cfg, bearer)?;
    let tags = ctx.tag_repo();
    let associations = ctx.association_repo();
    let uc = CreateTag {
        tags: tags.as_ref(),
        associations: associations.as_ref(),
        policy: ctx.policy(),
    };
    let saved = uc
        .execute(
            user_id,
            CreateTagInput {
                name: req.name,
                description: req.description,
                metadata: req.metadata,
            },
        )
        .await
        .map_err(status_for)?;
    let status = if saved.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(saved.into())))
}

#[utoipa::path(get, path = "/api/tags", tag = "Tags",
    params(
        ("q" = Option<String>, Query, description = "Case-insensitive substring of the name"),
        ("limit" = Option<i64>, Query, description = "Max results (1-100, default 50)")
    ),
    responses((status = 200, body = [TagItem])))]
pub async fn search_tags(
    State(ctx): State<AppContext>,
    Query(q): Query<SearchQuery>,
) -> Result<Json<Vec<TagItem>>, StatusCode> {
    let repo = ctx.tag_repo();
    let uc = SearchTags {
        repo: repo.as_ref(),
    };
    let tags = uc
        .execute(q.q, q.limit.unwrap_or(50))
        .await
        .map_err(internal)?;
    Ok(Json(tag_items(tags)))
}

#[utoipa::path(get, path = "/api/tags/{id}", tag = "Tags",
    params(("id" = Uuid, Path, description = "Tag ID")),
    responses((status = 200, body = TagDetailResponse), (status = 404)))]
pub async fn get_tag(
    State(ctx): State<AppContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<TagDetailResponse>, StatusCode> {
    let tags = ctx.tag_repo();
    let associations = ctx.association_repo();
    let uc = GetTag {
        tags: tags.as_ref(),
        associations: associations.as_ref(),
    };
    let detail = uc
        .execute(id, ctx.cfg.referrers_default_limit)
        .await
        .map_err(internal)?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(detail.into()))
}

#[utoipa::path(put, path = "/api/tags/{id}", tag = "Tags", request_body = UpdateTagRequest,
    params(("id" = Uuid, Path, description = "Tag ID")),
    responses(
        (status = 200, body = SavedTagResponse),
        (status = 400, description = "Invalid or taken name"),
        (status = 404, description = "Unknown tag or not the creator"),
        (status = 422, description = "Description references the tag itself")
    ))]
pub async fn update_tag(
    State(ctx): State<AppContext>,
    bearer: Bearer,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTagRequest>,
) -> Result<Json<SavedTagResponse>, StatusCode> {
    let user_id = auth::require_user(&ctx.cfg, bearer)?;
    let tags = ctx.tag_repo();
    let associations = ctx.association_repo();
    let uc = UpdateTag {
        tags: tags.as_ref(),
        associations: associations.as_ref(),
        policy: ctx.policy(),
    };
    let patch = TagPatch {
        name: req.name,
        description: req.description,
        metadata: req.metadata,
    };
    let saved = uc
        .execute(id, user_id, patch)
        .await
        .map_err(status_for)?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(saved.into()))
}

#[utoipa::path(get, path = "/api/tags/{id}/tags", tag = "Tags",
    params(
        ("id" = Uuid, Path, description = "Tag ID"),
        ("sort" = Option<String>, Query, description = "order (default) or recent"),
        ("limit" = Option<i64>, Query, description = "Max results")
    ),
    responses((status = 200, body = [TagItem]), (status = 404)))]
pub async fn list_tag_tags(
    State(ctx): State<AppContext>,
    Path(id): Path<Uuid>,
    Query(q): Query<LinksQuery>,
) -> Result<Json<Vec<TagItem>>, StatusCode> {
    let sort = q.sort()?;
    let tags = ctx.tag_repo();
    let associations = ctx.association_repo();
    let uc = ListTagTags {
        tags: tags.as_ref(),
        associations: associations.as_ref(),
    };
    let linked = uc
        .execute(id, sort, q.limit)
        .await
        .map_err(internal)?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(tag_items(linked)))
}

#[utoipa::path(get, path = "/api/tags/{id}/referrers", tag = "Tags",
    params(
        ("id" = Uuid, Path, description = "Tag ID"),
        ("limit" = Option<i64>, Query, description = "Max results")
    ),
    responses((status = 200, body = [TagItem]), (status = 404)))]
pub async fn list_referrers(
    State(ctx): State<AppContext>,
    Path(id): Path<Uuid>,
    Query(q): Query<LimitQuery>,
) -> Result<Json<Vec<TagItem>>, StatusCode> {
    let tags = ctx.tag_repo();
    let associations = ctx.association_repo();
    let uc = ListReferrers {
        tags: tags.as_ref(),
        associations: associations.as_ref(),
    };
    let referrers = uc
        .execute(id, q.limit.unwrap_or(ctx.cfg.referrers_default_limit))
        .await
        .map_err(internal)?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(tag_items(referrers)))
}

#[utoipa::path(get, path = "/api/tags/{id}/logs", tag = "Tags",
    params(
        ("id" = Uuid, Path, description = "Tag ID"),
        ("limit" = Option<i64>, Query, description = "Max results (1-100, default 20)")
    ),
    responses((status = 200, body = [LogItem])))]
pub async fn list_tag_logs(
    State(ctx): State<AppContext>,
    Path(id): Path<Uuid>,
    Query(q): Query<LimitQuery>,
) -> Result<Json<Vec<LogItem>>, StatusCode> {
    let logs = ctx.log_repo();
    let uc = ListLogsByTag {
        logs: logs.as_ref(),
    };
    let found = uc
        .execute(id, q.limit.unwrap_or(20))
        .await
        .map_err(internal)?;
    Ok(Json(found.into_iter().map(Into::into).collect()))
}

#[utoipa::path(post, path = "/api/tags/{id}/relink", tag = "Tags",
    params(("id" = Uuid, Path, description = "Tag ID")),
    responses(
        (status = 200, body = [TagItem]),
        (status = 404, description = "Unknown tag or not the creator"),
        (status = 422, description = "Description references the tag itself")
    ))]
pub async fn relink_tag(
    State(ctx): State<AppContext>,
    bearer: Bearer,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TagItem>>, StatusCode> {
    let user_id = auth::require_user(&ctx.cfg, bearer)?;
    let tags = ctx.tag_repo();
    let associations = ctx.association_repo();
    let uc = RelinkTag {
        tags: tags.as_ref(),
        associations: associations.as_ref(),
        policy: ctx.policy(),
    };
    let linked = uc
        .execute(id, user_id)
        .await
        .map_err(status_for)?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(tag_items(linked)))
}

pub fn routes(ctx: AppContext) -> Router {
    Router::new()
        .route("/tags", get(search_tags).post(create_tag))
        .route("/tags/:id", get(get_tag).put(update_tag))
        .route("/tags/:id/tags", get(list_tag_tags))
        .route("/tags/:id/referrers", get(list_referrers))
        .route("/tags/:id/logs", get(list_tag_logs))
        .route("/tags/:id/relink", post(relink_tag))
        .with_state(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_request_distinguishes_absent_and_null_description() {
        let absent: UpdateTagRequest = serde_json::from_str(r#"{"name":"RPG"}"#).unwrap();
        assert_eq!(absent.description, None);
        let cleared: UpdateTagRequest = serde_json::from_str(r#"{"description":null}"#).unwrap();
        assert_eq!(cleared.description, Some(None));
        let set: UpdateTagRequest =
            serde_json::from_str(r##"{"description":"see #Action"}"##).unwrap();
        assert_eq!(set.description, Some(Some("see #Action".to_string())));
    }

    #[test]
    fn tagging_errors_map_to_statuses() {
        assert_eq!(
            status_for(TaggingError::Validation("empty".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(TaggingError::SelfReference {
                tag_id: Uuid::new_v4()
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(TaggingError::Storage(anyhow::anyhow!("down"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unknown_sort_is_bad_request() {
        let q = LinksQuery {
            sort: Some("newest".into()),
            limit: None,
        };
        assert_eq!(q.sort(), Err(StatusCode::BAD_REQUEST));
        let q = LinksQuery {
            sort: Some("recent".into()),
            limit: None,
        };
        assert_eq!(q.sort(), Ok(AssociationSort::Recent));
    }
}
