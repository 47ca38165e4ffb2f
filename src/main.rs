use std::collections::HashMap;
use std::env;
use std::sync::{Arc, RwLock};

use axum::{
    routing::{get, post},
    Router,
};
use dotenv::dotenv;
use sqlx::postgres::PgPoolOptions;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use lead_crawler::api::{self, AppState};
use lead_crawler::{db, models};

#[derive(OpenApi)]
#[openapi(
    paths(
        api::start_search,
        api::start_bulk_search,
        api::get_task,
        api::list_history,
        api::get_history,
        api::delete_history,
        api::export_history
    ),
    components(schemas(
        api::SearchRequest,
        api::SearchTriple,
        api::BulkSearchRequest,
        api::RunResponse,
        api::DeleteResponse,
        api::TaskEntry,
        api::TaskStatus,
        models::Lead,
        models::SearchQuery,
        models::SearchSummary,
        models::SearchRecord
    )),
    tags(
        (name = "searches", description = "Scrape runs and their progress"),
        (name = "history", description = "Stored search history")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let db_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    tracing::info!("connecting to database");
    let pool = {
        let mut attempts = 0;
        loop {
            match PgPoolOptions::new()
                .max_connections(5)
                .connect(&db_url)
                .await
            {
                Ok(pool) => break pool,
                Err(err) => {
                    attempts += 1;
                    if attempts >= 15 {
                        tracing::error!(error = %err, "database unreachable after 15 attempts");
                        return Err(err.into());
                    }
                    tracing::warn!(error = %err, attempt = attempts, "database connect failed, retrying in 2s");
                    tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;
                }
            }
        }
    };

    db::init_db(&pool).await?;

    let state = Arc::new(AppState {
        pool,
        tasks: Arc::new(RwLock::new(HashMap::new())),
    });

    let app = Router::new()
        .merge(SwaggerUi::new("/lead-crawler-swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/searches", post(api::start_search))
        .route("/searches/bulk", post(api::start_bulk_search))
        .route("/tasks/:task_id", get(api::get_task))
        .route("/history", get(api::list_history))
        .route(
            "/history/:id",
            get(api::get_history).delete(api::delete_history),
        )
        .route("/history/:id/export", get(api::export_history))
        .with_state(state);

    let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
