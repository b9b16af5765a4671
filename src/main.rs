use std::net::SocketAddr;

use axum::Router;
use axum::extract::MatchedPath;
use dotenvy::dotenv;
use http::HeaderValue;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use hobbylog::bootstrap::app_context::{AppContext, AppServices};
use hobbylog::bootstrap::config::{Config, DbBackend};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
        paths(
            hobbylog::presentation::http::logs::create_log,
            hobbylog::presentation::http::logs::get_log,
            hobbylog::presentation::http::logs::update_log,
            hobbylog::presentation::http::logs::delete_log,
            hobbylog::presentation::http::logs::list_log_tags,
            hobbylog::presentation::http::tags::create_tag,
            hobbylog::presentation::http::tags::search_tags,
            hobbylog::presentation::http::tags::get_tag,
            hobbylog::presentation::http::tags::update_tag,
            hobbylog::presentation::http::tags::list_tag_tags,
            hobbylog::presentation::http::tags::list_referrers,
            hobbylog::presentation::http::tags::list_tag_logs,
            hobbylog::presentation::http::tags::relink_tag,
            hobbylog::presentation::http::health::health,
        ),
        components(schemas(
            hobbylog::presentation::http::logs::LogItem,
            hobbylog::presentation::http::logs::LogResponse,
            hobbylog::presentation::http::logs::CreateLogRequest,
            hobbylog::presentation::http::logs::UpdateLogRequest,
            hobbylog::presentation::http::tags::TagItem,
            hobbylog::presentation::http::tags::SavedTagResponse,
            hobbylog::presentation::http::tags::TagDetailResponse,
            hobbylog::presentation::http::tags::CreateTagRequest,
            hobbylog::presentation::http::tags::UpdateTagRequest,
            hobbylog::presentation::http::health::HealthResp,
        )),
        tags(
            (name = "Logs", description = "Hobby logs and their tags"),
            (name = "Tags", description = "Tags, tag links and referrers"),
            (name = "Health", description = "System health checks")
        )
    )]
struct ApiDoc;

fn cors_layer(cfg: &Config) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::PUT,
            http::Method::DELETE,
            http::Method::OPTIONS,
        ])
        .allow_headers([http::header::CONTENT_TYPE, http::header::AUTHORIZATION]);
    match cfg.frontend_url.as_deref().map(HeaderValue::from_str) {
        Some(Ok(origin)) => base.allow_origin(origin).allow_credentials(true),
        // Production requires FRONTEND_URL (checked in Config), so this only denies
        _ if cfg.is_production => base.allow_origin(AllowOrigin::exact(
            HeaderValue::from_static("http://invalid"),
        )),
        _ => base
            .allow_origin(AllowOrigin::mirror_request())
            .allow_credentials(true),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(?e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "hobbylog=debug,axum=info,tower_http=info".into()),
        )
        .init();

    let cfg = Config::from_env()?;
    info!(
        port = cfg.api_port,
        backend = ?cfg.db_backend,
        production = cfg.is_production,
        "Starting hobbylog backend"
    );

    let services = match cfg.db_backend {
        DbBackend::Postgres => {
            let pool = hobbylog::infrastructure::db::connect_pool(&cfg).await?;
            hobbylog::infrastructure::db::migrate(&pool).await?;
            AppServices::postgres(pool)
        }
        DbBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on exit");
            AppServices::memory()
        }
    };
    let ctx = AppContext::new(cfg.clone(), services);

    let app = Router::new()
        .nest("/api", hobbylog::presentation::http::health::routes(ctx.clone()))
        .nest("/api", hobbylog::presentation::http::logs::routes(ctx.clone()))
        .nest("/api", hobbylog::presentation::http::tags::routes(ctx.clone()))
        .merge(SwaggerUi::new("/api/docs").url("/api/openapi.json", ApiDoc::openapi()))
        .layer(cors_layer(&cfg))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &http::Request<_>| {
                let method = req.method().clone();
                let uri = req.uri().clone();
                let matched = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(|p| p.as_str().to_string())
                    .unwrap_or_default();
                tracing::info_span!("http", %method, %uri, matched_path = %matched)
            }),
        );

    let api_addr = SocketAddr::from(([0, 0, 0, 0], cfg.api_port));
    info!(%api_addr, "HTTP API listening");
    let listener = tokio::net::TcpListener::bind(api_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
