// Axum start-up code. Pages are rendered server-side with minijinja; per-browser state
// lives in the session store, so every handler resolves the session cookie first.
pub mod handlers;
pub mod routes;
pub mod state;
pub mod static_files;
pub mod templates;

use axum::Router;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::WebConfig;
use state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::ui_routes())
        .merge(routes::api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new()),
        )
        .with_state(state)
}

pub async fn run_server(config: WebConfig, state: Arc<AppState>) -> std::io::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db::executor::test_support::student_db;
    use crate::llm::{FixedTranslator, LlmManager};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use std::path::Path;
    use tower::ServiceExt; // for `oneshot`

    fn app(database_path: &Path, translator: FixedTranslator) -> Router {
        let mut config = AppConfig::default();
        config.database.path = database_path.to_string_lossy().to_string();
        let llm = LlmManager::with_translator("fixed", "test-model", Box::new(translator));
        build_router(Arc::new(AppState::new(config, llm)))
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn session_cookie(response: &Response) -> String {
        response.headers()[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string()
    }

    fn get_page(cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri("/");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn generate(question: &str, cookie: Option<&str>) -> Request<Body> {
        let form = format!("question={}", question.replace(' ', "+").replace('?', "%3F"));
        let mut builder = Request::builder()
            .method("POST")
            .uri("/generate")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(form)).unwrap()
    }

    fn toggle(cookie: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/toggle-sql")
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap()
    }

    async fn session_count(app: Router) -> u64 {
        let response = app
            .oneshot(Request::builder().uri("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status: Value = serde_json::from_str(&body_text(response).await).unwrap();
        status["session_count"].as_u64().unwrap()
    }

    #[tokio::test]
    async fn fresh_session_shows_no_grid_and_no_sql_toggle() {
        let (_dir, path) = student_db();
        let translator = FixedTranslator::answering("SELECT 1;");
        let response = app(&path, translator).oneshot(get_page(None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
        assert!(response.headers().get(header::SET_COOKIE).is_none());

        let html = body_text(response).await;
        assert!(html.contains("Generate Results"));
        assert!(!html.contains("Query Results"));
        assert!(!html.contains("Show SQL"));
        assert!(!html.contains("<table"));
    }

    #[tokio::test]
    async fn count_question_renders_single_cell_grid() {
        let (_dir, path) = student_db();
        let app = app(&path, FixedTranslator::answering("SELECT COUNT(*) FROM STUDENT;"));

        let response = app
            .oneshot(generate("How many entries of records are present?", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let html = body_text(response).await;
        assert!(html.contains("Query Results"));
        assert_eq!(html.matches("<th>").count(), 1);
        assert_eq!(html.matches("<td>").count(), 1);
        assert!(html.contains("<td>5</td>"));
        assert!(html.contains("Show SQL"));
        assert!(!html.contains("Generated SQL Query"));
        assert!(html.contains("value=\"How many entries of records are present?\""));
    }

    #[tokio::test]
    async fn class_filter_renders_four_columns_by_two_rows() {
        let (_dir, path) = student_db();
        let app = app(
            &path,
            FixedTranslator::answering("SELECT * FROM STUDENT WHERE CLASS='Data Science';"),
        );

        let response = app
            .oneshot(generate("Tell me all the students studying in Data Science class?", None))
            .await
            .unwrap();
        let html = body_text(response).await;

        assert_eq!(html.matches("<th>").count(), 4);
        assert_eq!(html.matches("<td>").count(), 8);
        assert!(html.contains("<td>Krish</td>"));
        assert!(html.contains("<td>Sudhanshu</td>"));
        assert!(!html.contains("Vikash"));
    }

    #[tokio::test]
    async fn unknown_table_refusal_surfaces_as_execution_error() {
        let (_dir, path) = student_db();
        let app = app(
            &path,
            FixedTranslator::answering(
                "Error: The table FOO does not exist. The available table is STUDENT.",
            ),
        );

        let response = app
            .oneshot(generate("Show all rows of FOO", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let html = body_text(response).await;
        assert!(html.contains("An error occurred: "));
        assert!(!html.contains("<table"));
        // the refusal is still stored, so it can be revealed
        assert!(html.contains("Show SQL"));
    }

    #[tokio::test]
    async fn empty_result_says_no_data_found() {
        let (_dir, path) = student_db();
        let app = app(
            &path,
            FixedTranslator::answering("SELECT * FROM STUDENT WHERE MARKS > 1000;"),
        );

        let html = body_text(app.oneshot(generate("Who scored over 1000?", None)).await.unwrap()).await;
        assert!(html.contains("No data found for the query."));
    }

    #[tokio::test]
    async fn insert_statement_says_no_data_found() {
        let (_dir, path) = student_db();
        let app = app(
            &path,
            FixedTranslator::answering("INSERT INTO STUDENT VALUES ('Asha', 'Data Science', 'C', 77);"),
        );

        let html = body_text(app.clone().oneshot(generate("Add Asha", None)).await.unwrap()).await;
        assert!(html.contains("No data found for the query."));
        assert!(!html.contains("<table"));
        assert!(!html.contains("Count"));
    }

    #[tokio::test]
    async fn visits_without_a_session_create_none() {
        let (_dir, path) = student_db();
        let app = app(&path, FixedTranslator::answering("SELECT 1;"));

        for _ in 0..10 {
            let response = app.clone().oneshot(get_page(None)).await.unwrap();
            assert!(response.headers().get(header::SET_COOKIE).is_none());
        }
        let response = app
            .clone()
            .oneshot(get_page(Some("querybridge_session=forged")))
            .await
            .unwrap();
        assert!(response.headers().get(header::SET_COOKIE).is_none());

        let response = app
            .clone()
            .oneshot(toggle("querybridge_session=forged"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(session_count(app.clone()).await, 0);

        app.clone().oneshot(generate("first", None)).await.unwrap();
        assert_eq!(session_count(app).await, 1);
    }

    #[tokio::test]
    async fn translation_failure_is_shown_and_session_stays_usable() {
        let (_dir, path) = student_db();
        let app = app(&path, FixedTranslator::failing("upstream timed out"));

        let response = app.clone().oneshot(generate("anything", None)).await.unwrap();
        let cookie = session_cookie(&response);
        let html = body_text(response).await;
        assert!(html.contains("An error occurred: LLM connection error: upstream timed out"));
        assert!(!html.contains("Show SQL"));

        let response = app.oneshot(get_page(Some(&cookie))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn toggle_reveals_and_hides_sql_and_new_submit_hides_it() {
        let (_dir, path) = student_db();
        let app = app(&path, FixedTranslator::answering("SELECT COUNT(*) FROM STUDENT;"));

        let response = app.clone().oneshot(generate("How many?", None)).await.unwrap();
        let cookie = session_cookie(&response);

        let response = app.clone().oneshot(toggle(&cookie)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");

        let html = body_text(app.clone().oneshot(get_page(Some(&cookie))).await.unwrap()).await;
        assert!(html.contains("Generated SQL Query"));
        assert!(html.contains("SELECT COUNT(*) FROM STUDENT;"));
        // results are not kept between requests
        assert!(!html.contains("Query Results"));

        app.clone().oneshot(toggle(&cookie)).await.unwrap();
        let html = body_text(app.clone().oneshot(get_page(Some(&cookie))).await.unwrap()).await;
        assert!(!html.contains("Generated SQL Query"));

        app.clone().oneshot(toggle(&cookie)).await.unwrap();
        let html = body_text(app.clone().oneshot(generate("Again?", Some(&cookie))).await.unwrap()).await;
        assert!(!html.contains("Generated SQL Query"));
    }

    #[tokio::test]
    async fn sessions_do_not_share_state() {
        let (_dir, path) = student_db();
        let app = app(&path, FixedTranslator::answering("SELECT 1;"));

        app.clone().oneshot(generate("first", None)).await.unwrap();
        let html = body_text(app.oneshot(get_page(None)).await.unwrap()).await;
        assert!(!html.contains("Show SQL"));
    }

    #[tokio::test]
    async fn api_nl_query_returns_sql_and_rows() {
        let (_dir, path) = student_db();
        let app = app(&path, FixedTranslator::answering("SELECT COUNT(*) FROM STUDENT;"));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/nl-query")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({"question": "How many entries of records are present?"}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["sql"], "SELECT COUNT(*) FROM STUDENT;");
        assert_eq!(body["rows"], json!([["5"]]));
        assert_eq!(body["row_count"], 1);
    }

    #[tokio::test]
    async fn api_query_with_bad_sql_is_bad_request() {
        let (_dir, path) = student_db();
        let app = app(&path, FixedTranslator::answering("unused"));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/query")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(json!({"query": "SELECT * FROM FOO"}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.starts_with("An error occurred: "));
    }

    #[tokio::test]
    async fn api_translation_failure_is_bad_gateway() {
        let (_dir, path) = student_db();
        let app = app(&path, FixedTranslator::failing("down"));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/nl-query")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(json!({"question": "q"}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn api_schema_and_status() {
        let (_dir, path) = student_db();
        let app = app(&path, FixedTranslator::answering("unused"));

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/api/schema").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let tables: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(tables[0]["name"], "STUDENT");
        assert_eq!(tables[0]["columns"].as_array().unwrap().len(), 4);

        let response = app
            .oneshot(Request::builder().uri("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(status["llm_backend"], "fixed");
        assert_eq!(status["llm_model"], "test-model");
        assert_eq!(status["session_count"], 0);
    }

    #[tokio::test]
    async fn stylesheet_is_served() {
        let (_dir, path) = student_db();
        let app = app(&path, FixedTranslator::answering("unused"));

        let response = app
            .oneshot(Request::builder().uri("/static/style.css").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/css");
    }
}
