use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::dto::logs::{CreateLogInput, LogDetailDto, UpdateLogInput};
use crate::application::use_cases::logs::create_log::CreateLog;
use crate::application::use_cases::logs::delete_log::DeleteLog;
use crate::application::use_cases::logs::get_log::GetLog;
use crate::application::use_cases::logs::list_log_tags::ListLogTags;
use crate::application::use_cases::logs::update_log::UpdateLog;
use crate::bootstrap::app_context::AppContext;
use crate::domain::logs::log::Log;
use crate::presentation::http::auth::{self, Bearer};
use crate::presentation::http::tags::{
    LinksQuery, TagItem, double_option, internal, status_for, tag_items,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct LogItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: Option<String>,
    pub content_md: String,
    pub is_public: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Log> for LogItem {
    fn from(l: Log) -> Self {
        LogItem {
            id: l.id,
            user_id: l.user_id,
            title: l.title,
            content_md: l.content_md,
            is_public: l.is_public,
            created_at: l.created_at,
            updated_at: l.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LogResponse {
    #[serde(flatten)]
    pub log: LogItem,
    pub associated_tags: Vec<TagItem>,
}

impl From<LogDetailDto> for LogResponse {
    fn from(d: LogDetailDto) -> Self {
        LogResponse {
            log: d.log.into(),
            associated_tags: tag_items(d.associated_tags),
        }
    }
}

fn default_public() -> bool {
    true
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateLogRequest {
    pub title: Option<String>,
    #[serde(default)]
    pub content_md: String,
    #[serde(default = "default_public")]
    pub is_public: bool,
    /// Explicit tags; linked before hashtags found in `content_md`.
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateLogRequest {
    /// Absent keeps the title; `null` clears it.
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub title: Option<Option<String>>,
    pub content_md: Option<String>,
    pub is_public: Option<bool>,
    /// When present, replaces the explicit tags and relinks the log.
    pub tags: Option<Vec<String>>,
}

#[utoipa::path(post, path = "/api/logs", tag = "Logs", request_body = CreateLogRequest,
    responses(
        (status = 201, body = LogResponse),
        (status = 400, description = "Invalid tag name")
    ))]
pub async fn create_log(
    State(ctx): State<AppContext>,
    bearer: Bearer,
    Json(req): Json<CreateLogRequest>,
) -> Result<(StatusCode, Json<LogResponse>), StatusCode> {
    let user_id = auth::require_user(&ctx.cfg, bearer)?;
    let logs = ctx.log_repo();
    let tags = ctx.tag_repo();
    let associations = ctx.association_repo();
    let uc = CreateLog {
        logs: logs.as_ref(),
        tags: tags.as_ref(),
        associations: associations.as_ref(),
        policy: ctx.policy(),
    };
    let created = uc
        .execute(
            user_id,
            CreateLogInput {
                title: req.title,
                content_md: req.content_md,
                is_public: req.is_public,
                tags: req.tags,
            },
        )
        .await
        .map_err(status_for)?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

#[utoipa::path(get, path = "/api/logs/{id}", tag = "Logs",
    params(("id" = Uuid, Path, description = "Log ID")),
    responses((status = 200, body = LogResponse), (status = 404)))]
pub async fn get_log(
    State(ctx): State<AppContext>,
    bearer: Option<Bearer>,
    Path(id): Path<Uuid>,
) -> Result<Json<LogResponse>, StatusCode> {
    let viewer = auth::optional_user(&ctx.cfg, bearer);
    let logs = ctx.log_repo();
    let associations = ctx.association_repo();
    let uc = GetLog {
        logs: logs.as_ref(),
        associations: associations.as_ref(),
    };
    let detail = uc
        .execute(id, viewer)
        .await
        .map_err(internal)?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(detail.into()))
}

#[utoipa::path(put, path = "/api/logs/{id}", tag = "Logs", request_body = UpdateLogRequest,
    params(("id" = Uuid, Path, description = "Log ID")),
    responses(
        (status = 200, body = LogResponse),
        (status = 400, description = "Invalid tag name"),
        (status = 404, description = "Unknown log or not the owner")
    ))]
pub async fn update_log(
    State(ctx): State<AppContext>,
    bearer: Bearer,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateLogRequest>,
) -> Result<Json<LogResponse>, StatusCode> {
    let user_id = auth::require_user(&ctx.cfg, bearer)?;
    let logs = ctx.log_repo();
    let tags = ctx.tag_repo();
    let associations = ctx.association_repo();
    let uc = UpdateLog {
        logs: logs.as_ref(),
        tags: tags.as_ref(),
        associations: associations.as_ref(),
        policy: ctx.policy(),
    };
    let input = UpdateLogInput {
        title: req.title,
        content_md: req.content_md,
        is_public: req.is_public,
        tags: req.tags,
    };
    let updated = uc
        .execute(id, user_id, input)
        .await
        .map_err(status_for)?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(updated.into()))
}

#[utoipa::path(delete, path = "/api/logs/{id}", tag = "Logs",
    params(("id" = Uuid, Path, description = "Log ID")),
    responses((status = 204), (status = 404)))]
pub async fn delete_log(
    State(ctx): State<AppContext>,
    bearer: Bearer,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    let user_id = auth::require_user(&ctx.cfg, bearer)?;
    let logs = ctx.log_repo();
    let uc = DeleteLog {
        logs: logs.as_ref(),
    };
    let ok = uc.execute(id, user_id).await.map_err(internal)?;
    if ok {
        tracing::info!(log_id = %id, user_id = %user_id, "log_deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

#[utoipa::path(get, path = "/api/logs/{id}/tags", tag = "Logs",
    params(
        ("id" = Uuid, Path, description = "Log ID"),
        ("sort" = Option<String>, Query, description = "order (default) or recent"),
        ("limit" = Option<i64>, Query, description = "Max results")
    ),
    responses((status = 200, body = [TagItem]), (status = 404)))]
pub async fn list_log_tags(
    State(ctx): State<AppContext>,
    bearer: Option<Bearer>,
    Path(id): Path<Uuid>,
    Query(q): Query<LinksQuery>,
) -> Result<Json<Vec<TagItem>>, StatusCode> {
    let sort = q.sort()?;
    let viewer = auth::optional_user(&ctx.cfg, bearer);
    let logs = ctx.log_repo();
    let associations = ctx.association_repo();
    let uc = ListLogTags {
        logs: logs.as_ref(),
        associations: associations.as_ref(),
    };
    let linked = uc
        .execute(id, viewer, sort, q.limit)
        .await
        .map_err(internal)?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(tag_items(linked)))
}

pub fn routes(ctx: AppContext) -> Router {
    Router::new()
        .route("/logs", post(create_log))
        .route("/logs/:id", get(get_log).put(update_log).delete(delete_log))
        .route("/logs/:id/tags", get(list_log_tags))
        .with_state(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_defaults_to_public_without_tags() {
        let req: CreateLogRequest =
            serde_json::from_str(r##"{"content_md":"Beat #EldenRing"}"##).unwrap();
        assert!(req.is_public);
        assert!(req.tags.is_empty());
        assert_eq!(req.title, None);
    }

    #[test]
    fn update_request_relinks_only_with_content_or_tags() {
        let req: UpdateLogRequest = serde_json::from_str(r#"{"title":null}"#).unwrap();
        assert_eq!(req.title, Some(None));
        let input = UpdateLogInput {
            title: req.title,
            content_md: req.content_md,
            is_public: req.is_public,
            tags: req.tags,
        };
        assert!(!input.relinks());

        let req: UpdateLogRequest = serde_json::from_str(r#"{"tags":[]}"#).unwrap();
        assert_eq!(req.tags, Some(vec![]));
    }
}
