use axum::{
    extract::{Form, State},
    http::{header, HeaderMap},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

use crate::db::executor::ResultSet;
use crate::pipeline::{self, QueryError};
use crate::session::{SessionHandle, SessionState, SESSION_COOKIE};
use crate::web::state::AppState;
use crate::web::templates::render_template;

#[derive(Debug, Deserialize)]
pub struct GenerateForm {
    #[serde(default)]
    pub question: String,
}

/// What the main area shows below the rule.
#[derive(Debug)]
enum ResultView {
    /// No submit in this request.
    Idle,
    Results(ResultSet),
    Error(QueryError),
}

/// Everything the page template reads.
#[derive(Debug, Serialize)]
struct PageContext<'a> {
    question: &'a str,
    has_sql: bool,
    visible_sql: Option<&'a str>,
    submitted: bool,
    result: Option<&'a ResultSet>,
    no_rows: bool,
    column_count: usize,
    error: Option<String>,
}

impl<'a> PageContext<'a> {
    fn new(question: &'a str, session: &'a SessionState, view: &'a ResultView) -> Self {
        let (submitted, result, error) = match view {
            ResultView::Idle => (false, None, None),
            ResultView::Results(rows) => (true, Some(rows), None),
            ResultView::Error(err) => (true, None, Some(err.to_string())),
        };

        Self {
            question,
            has_sql: session.has_sql(),
            visible_sql: session.visible_sql(),
            submitted,
            result,
            no_rows: result.is_none_or(ResultSet::is_empty),
            column_count: result.map_or(0, ResultSet::column_count),
            error,
        }
    }
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

/// The session named by the request's cookie, if the store still knows it.
async fn known_session(state: &AppState, headers: &HeaderMap) -> Option<(String, SessionHandle)> {
    let id = session_cookie(headers)?;
    let handle = state.sessions.get(&id).await?;
    Some((id, handle))
}

fn set_cookie(session_id: &str) -> [(header::HeaderName, String); 1] {
    [(
        header::SET_COOKIE,
        format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, session_id),
    )]
}

fn render_page(
    state: &AppState,
    question: &str,
    session: &SessionState,
    view: &ResultView,
) -> Html<String> {
    let context = PageContext::new(question, session, view);
    Html(render_template(&state.template_env, "index.html", context))
}

// Main UI entry point. Visitors without a live session see a blank page and get no cookie.
pub async fn index_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    match known_session(&state, &headers).await {
        Some((_, session)) => {
            let session = session.lock().await;
            render_page(&state, "", &session, &ResultView::Idle).into_response()
        }
        None => {
            render_page(&state, "", &SessionState::default(), &ResultView::Idle).into_response()
        }
    }
}

/// "Generate Results": one translation, at most one execution, results rendered in place.
/// The only handler that creates sessions.
pub async fn generate_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<GenerateForm>,
) -> Response {
    let cookie = session_cookie(&headers);
    let (session_id, session) = state.sessions.get_or_create(cookie.as_deref()).await;
    // Held until the page is rendered; one submit per session at a time
    let mut session = session.lock().await;

    debug!("Session {} submitted: {}", session_id, form.question);
    let view = match pipeline::submit(
        &state.llm_manager,
        &state.database_path,
        &form.question,
        &mut session,
    )
    .await
    {
        Ok(rows) => ResultView::Results(rows),
        Err(err) => {
            error!("Submit failed for session {}: {}", session_id, err);
            ResultView::Error(err)
        }
    };

    let page = render_page(&state, &form.question, &session, &view);
    (set_cookie(&session_id), page).into_response()
}

/// "Show SQL": flips visibility and sends the browser back to the page.
/// Without a live session there is no SQL to show, so nothing is toggled.
pub async fn toggle_sql_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    if let Some((session_id, session)) = known_session(&state, &headers).await {
        let visible = session.lock().await.toggle_sql();
        debug!("Session {} SQL visible: {}", session_id, visible);
    }

    Redirect::to("/").into_response()
}
