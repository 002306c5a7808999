use crate::ai::EmotionAnalyzer;
use crate::analyzer;
use crate::config::Config;
use crate::db::{Database, RecordStore};
use crate::diary::{self, chat, parse_optional_date};
use crate::validation::{ValidationError, parse_day, parse_user_id, require_text};
use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::error;

#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
    pub analyzer: Arc<dyn EmotionAnalyzer>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/user", post(user_create))
        .route("/api/user/with-diaries/first", get(user_with_diaries))
        .route("/api/user/nickname/:nickname", get(user_by_nickname))
        .route("/api/user/:user_id", get(user_by_id))
        .route("/api/calendar/:user_id/all", get(calendar_all))
        .route("/api/calendar/:user_id/date/:date", get(calendar_date))
        .route("/api/calendar/:user_id/:year/:month", get(calendar_month))
        .route("/api/report/:user_id/weekly", get(report_weekly))
        .route("/api/report/:user_id/monthly", get(report_monthly))
        .route("/api/diary/text", post(diary_text))
        .route("/api/diary/chat", post(diary_chat))
        .route("/api/diary/chat/save", post(diary_chat_save))
        .route("/api/diary/:id", put(diary_update))
        .route("/api/chat/message", post(chat_message))
        .route("/api/chat/session/:session_id", get(chat_session))
        .route("/api/chat/user/:user_id", get(chat_user_sessions))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            attach_error_details,
        ))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UserCreateBody {
    nickname: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WeeklyQuery {
    start_date: Option<String>,
    end_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MonthlyQuery {
    year: Option<String>,
    month: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct TextDiaryBody {
    user_id: Option<Value>,
    content: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DiaryUpdateBody {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ChatExchangeBody {
    user_id: Option<Value>,
    message: Option<String>,
    session_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ChatSaveBody {
    user_id: Option<Value>,
    session_id: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ChatMessageBody {
    user_id: Option<Value>,
    session_id: Option<String>,
    role: Option<String>,
    content: Option<String>,
}

async fn health(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let database = Database::open(&state.config.db_path)?;
    let users = database.count_users()?;

    Ok(Json(json!({
        "success": true,
        "status": "ok",
        "users": users,
    })))
}

async fn user_create(
    State(state): State<ApiState>,
    Json(body): Json<UserCreateBody>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let nickname = require_text(body.nickname.as_deref(), "A nickname is required.")?;
    let user = Database::open(&state.config.db_path)?.find_or_create_user(nickname)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": user,
            "message": "User ready.",
        })),
    ))
}

async fn user_by_id(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let user_id = parse_user_id(&user_id)?;
    let user = Database::open(&state.config.db_path)?
        .find_user(user_id)?
        .ok_or_else(|| ApiError::NotFound("User not found.".to_string()))?;

    Ok(Json(json!({ "success": true, "data": user })))
}

async fn user_by_nickname(
    State(state): State<ApiState>,
    Path(nickname): Path<String>,
) -> ApiResult<Json<Value>> {
    let user = Database::open(&state.config.db_path)?
        .find_user_by_nickname(&nickname)?
        .ok_or_else(|| ApiError::NotFound("User not found.".to_string()))?;

    Ok(Json(json!({ "success": true, "data": user })))
}

async fn user_with_diaries(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let (user, diary_count) = Database::open(&state.config.db_path)?
        .user_with_most_records()?
        .ok_or_else(|| ApiError::NotFound("No user has written a diary yet.".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "data": user,
        "diaryCount": diary_count,
    })))
}

async fn calendar_month(
    State(state): State<ApiState>,
    Path((user_id, year, month)): Path<(String, String, String)>,
) -> ApiResult<Json<Value>> {
    let user_id = parse_user_id(&user_id)?;
    let database = Database::open(&state.config.db_path)?;
    let (window, days) = analyzer::calendar_month(&database, &state.config, user_id, &year, &month)?;

    Ok(Json(json!({
        "success": true,
        "data": days,
        "year": window.year,
        "month": window.month,
    })))
}

async fn calendar_date(
    State(state): State<ApiState>,
    Path((user_id, date)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let user_id = parse_user_id(&user_id)?;
    let day = parse_day(&date)?;

    let mut records = Database::open(&state.config.db_path)?.find_by_user_and_day(user_id, day)?;
    records.sort_by(|left, right| {
        right
            .created_at
            .cmp(&left.created_at)
            .then_with(|| right.id.cmp(&left.id))
    });

    Ok(Json(json!({ "success": true, "data": records })))
}

async fn calendar_all(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let user_id = parse_user_id(&user_id)?;
    let records = Database::open(&state.config.db_path)?.find_all_by_user(user_id)?;

    Ok(Json(json!({
        "success": true,
        "count": records.len(),
        "data": records,
    })))
}

async fn report_weekly(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
    Query(query): Query<WeeklyQuery>,
) -> ApiResult<Json<Value>> {
    let user_id = parse_user_id(&user_id)?;
    let database = Database::open(&state.config.db_path)?;
    let report = analyzer::weekly_report(
        &database,
        user_id,
        query.start_date.as_deref(),
        query.end_date.as_deref(),
    )?;

    Ok(Json(json!({ "success": true, "data": report })))
}

async fn report_monthly(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
    Query(query): Query<MonthlyQuery>,
) -> ApiResult<Json<Value>> {
    let user_id = parse_user_id(&user_id)?;
    let database = Database::open(&state.config.db_path)?;
    let report = analyzer::monthly_report(
        &database,
        &state.config,
        user_id,
        query.year.as_deref(),
        query.month.as_deref(),
    )?;

    Ok(Json(json!({ "success": true, "data": report })))
}

async fn diary_text(
    State(state): State<ApiState>,
    Json(body): Json<TextDiaryBody>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let user_id = user_id_from_body(body.user_id.as_ref())?;
    let content = require_text(body.content.as_deref(), "Diary content is required.")?;
    let date = parse_optional_date(body.date.as_deref())?;

    let record = diary::save_text_diary(
        &state.config,
        state.analyzer.clone(),
        user_id,
        content,
        date,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": record,
            "message": "Diary saved and analyzed.",
        })),
    ))
}

async fn diary_update(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(body): Json<DiaryUpdateBody>,
) -> ApiResult<Json<Value>> {
    let id = id
        .trim()
        .parse::<i64>()
        .map_err(|_| ValidationError::new(format!("Invalid diary ID: {}", id.trim())))?;
    let content = require_text(body.content.as_deref(), "Diary content is required.")?;

    let record = diary::update_diary_content(&state.config, state.analyzer.clone(), id, content)
        .await?
        .ok_or_else(|| ApiError::NotFound("Diary not found.".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "data": record,
        "message": "Diary updated and re-analyzed.",
    })))
}

async fn diary_chat(
    State(state): State<ApiState>,
    Json(body): Json<ChatExchangeBody>,
) -> ApiResult<Json<Value>> {
    let user_id = user_id_from_body(body.user_id.as_ref())?;
    let message = require_text(body.message.as_deref(), "A user ID and a message are required.")?;
    let session_id = require_text(body.session_id.as_deref(), "A session ID is required.")?;

    let exchange = chat::chat_exchange(
        &state.config,
        state.analyzer.clone(),
        user_id,
        session_id,
        message,
    )
    .await?;

    Ok(Json(json!({ "success": true, "data": exchange })))
}

async fn diary_chat_save(
    State(state): State<ApiState>,
    Json(body): Json<ChatSaveBody>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let user_id = user_id_from_body(body.user_id.as_ref())?;
    let session_id = require_text(body.session_id.as_deref(), "A session ID is required.")?;
    let date = parse_optional_date(body.date.as_deref())?;

    let record = chat::save_chat_diary(
        &state.config,
        state.analyzer.clone(),
        user_id,
        session_id,
        date,
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("There is no conversation to save.".to_string()))?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": record,
            "message": "Conversation saved and analyzed.",
        })),
    ))
}

async fn chat_message(
    State(state): State<ApiState>,
    Json(body): Json<ChatMessageBody>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let user_id = user_id_from_body(body.user_id.as_ref())?;
    let message = chat::append_chat_message(
        &state.config,
        user_id,
        body.session_id.as_deref().unwrap_or_default(),
        body.role.as_deref().unwrap_or_default(),
        body.content.as_deref().unwrap_or_default(),
    )?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": message,
            "message": "Chat message saved.",
        })),
    ))
}

async fn chat_session(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let messages = chat::session_history(&state.config, &session_id)?;

    Ok(Json(json!({
        "success": true,
        "sessionId": session_id,
        "count": messages.len(),
        "data": messages,
    })))
}

async fn chat_user_sessions(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let user_id = parse_user_id(&user_id)?;
    let sessions = chat::recent_sessions(&state.config, user_id)?;

    Ok(Json(json!({
        "success": true,
        "count": sessions.len(),
        "data": sessions,
    })))
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Route not found.".to_string())
}

// Clients send the id either as a JSON number or a string.
fn user_id_from_body(raw: Option<&Value>) -> Result<i64, ValidationError> {
    match raw {
        Some(Value::Number(number)) => number
            .as_i64()
            .filter(|id| *id > 0)
            .ok_or_else(|| ValidationError::new(format!("Invalid user ID: {number}"))),
        Some(Value::String(text)) => parse_user_id(text),
        _ => Err(ValidationError::new("A user ID is required.")),
    }
}

/// Internal failure text, exposed only when diagnostics are switched on.
#[derive(Debug, Clone)]
struct ErrorDetail {
    message: String,
    detail: String,
}

async fn attach_error_details(
    State(state): State<ApiState>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    if !state.config.expose_error_details {
        return response;
    }

    match response.extensions().get::<ErrorDetail>().cloned() {
        Some(ErrorDetail { message, detail }) => (
            response.status(),
            Json(json!({
                "success": false,
                "message": message,
                "error": detail,
            })),
        )
            .into_response(),
        None => response,
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        match value.downcast_ref::<ValidationError>() {
            Some(validation) => Self::BadRequest(validation.to_string()),
            None => Self::Internal(value),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(value: ValidationError) -> Self {
        Self::BadRequest(value.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "message": message })),
            )
                .into_response(),
            ApiError::NotFound(message) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "success": false, "message": message })),
            )
                .into_response(),
            ApiError::Internal(failure) => {
                let detail = format!("{failure:#}");
                error!(error = %detail, "request failed");

                let message = "A server error occurred. Please try again later.".to_string();
                let mut response = (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "success": false, "message": message })),
                )
                    .into_response();
                response
                    .extensions_mut()
                    .insert(ErrorDetail { message, detail });
                response
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiState, router};
    use crate::ai::testing::StubAnalyzer;
    use crate::config::Config;
    use crate::diary::tests::temp_config;
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use chrono::NaiveDate;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn app_with(config: Config, analyzer: StubAnalyzer) -> Router {
        router(ApiState {
            config: Arc::new(config),
            analyzer: Arc::new(analyzer),
        })
    }

    fn test_app(analyzer: StubAnalyzer) -> (TempDir, Router) {
        let (dir, config) = temp_config();
        (dir, app_with(config, analyzer))
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .expect("request");

        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        (status, json)
    }

    #[tokio::test]
    async fn calendar_rejects_bad_year_and_month() {
        let (_dir, app) = test_app(StubAnalyzer::failing());

        let (status, body) = send(&app, Method::GET, "/api/calendar/1/1800/5", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, _) = send(&app, Method::GET, "/api/calendar/1/2024/13", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, Method::GET, "/api/calendar/abc/2024/5", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn empty_month_is_a_successful_empty_list() {
        let (_dir, app) = test_app(StubAnalyzer::failing());

        let (status, body) = send(&app, Method::GET, "/api/calendar/1/2024/11", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], json!([]));
        assert_eq!(body["year"], 2024);
        assert_eq!(body["month"], 11);
    }

    #[tokio::test]
    async fn diary_save_shows_up_in_calendar_and_day_view() {
        let (_dir, app) = test_app(StubAnalyzer::scripted("Happy", json!(92)));

        let (status, saved) = send(
            &app,
            Method::POST,
            "/api/diary/text",
            Some(json!({"userId": 1, "content": "Beach day", "date": "2024-11-01"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(saved["data"]["emotion"], "Happy");
        assert_eq!(saved["data"]["recordType"], "text");

        let (_, calendar) = send(&app, Method::GET, "/api/calendar/1/2024/11", None).await;
        assert_eq!(calendar["data"][0]["date"], "2024-11-01");
        assert_eq!(calendar["data"][0]["emotion"], "Happy");
        assert_eq!(calendar["data"][0]["emotionScore"], 92);
        assert_eq!(calendar["data"][0]["hasRecord"], true);

        let (_, day) = send(&app, Method::GET, "/api/calendar/1/date/2024-11-01", None).await;
        assert_eq!(day["data"][0]["content"], "Beach day");

        let (_, all) = send(&app, Method::GET, "/api/calendar/1/all", None).await;
        assert_eq!(all["count"], 1);
    }

    #[tokio::test]
    async fn diary_requires_user_and_content() {
        let (_dir, app) = test_app(StubAnalyzer::failing());

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/diary/text",
            Some(json!({"content": "no user"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "A user ID is required.");

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/diary/text",
            Some(json!({"userId": "1", "content": "  "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn reports_require_their_parameters() {
        let (_dir, app) = test_app(StubAnalyzer::failing());

        let (status, _) = send(&app, Method::GET, "/api/report/1/weekly?startDate=2024-11-01", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, Method::GET, "/api/report/1/monthly?year=2024", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            Method::GET,
            "/api/report/1/weekly?startDate=2024-11-04&endDate=2024-11-10",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["averageScore"], 50);
        assert_eq!(body["data"]["totalRecords"], 0);
        assert_eq!(body["data"]["period"]["startDate"], "2024-11-04");
    }

    #[tokio::test]
    async fn unbounded_report_and_day_dates_are_bad_requests() {
        let (_dir, app) = test_app(StubAnalyzer::failing());
        let last_day = NaiveDate::MAX.to_string().replace('+', "%2B");

        let (status, body) = send(
            &app,
            Method::GET,
            &format!("/api/report/1/weekly?startDate=2024-11-01&endDate={last_day}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, _) = send(&app, Method::GET, &format!("/api/calendar/1/date/{last_day}"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn monthly_report_has_statistics_and_details() {
        let (_dir, app) = test_app(StubAnalyzer::scripted("Sad", json!(60)));

        send(
            &app,
            Method::POST,
            "/api/diary/text",
            Some(json!({"userId": 1, "content": "Quiet day", "date": "2024-11-02"})),
        )
        .await;

        let (status, body) = send(&app, Method::GET, "/api/report/1/monthly?year=2024&month=11", None).await;
        assert_eq!(status, StatusCode::OK);
        let stats = &body["data"]["statistics"];
        assert_eq!(stats["totalRecords"], 1);
        assert_eq!(stats["emotionDistribution"]["negative"], 1);
        assert_eq!(stats["topKeywords"][0]["keyword"], "work");
        assert_eq!(body["data"]["detailedData"][0]["contentPreview"], "Quiet day");
        assert_eq!(body["data"]["timeline"][0]["summary"], "Sad day");
    }

    #[tokio::test]
    async fn chat_flow_saves_a_chatbot_diary() {
        let (_dir, app) = test_app(StubAnalyzer::scripted("Anxious", json!(45)));

        let (status, exchange) = send(
            &app,
            Method::POST,
            "/api/diary/chat",
            Some(json!({"userId": 1, "sessionId": "abc", "message": "Big interview tomorrow"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(exchange["data"]["sessionId"], "abc");

        let (_, history) = send(&app, Method::GET, "/api/chat/session/abc", None).await;
        assert_eq!(history["count"], 2);

        let (status, saved) = send(
            &app,
            Method::POST,
            "/api/diary/chat/save",
            Some(json!({"userId": 1, "sessionId": "abc"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(saved["data"]["recordType"], "chatbot");
        assert_eq!(saved["data"]["chatHistory"].as_array().map(Vec::len), Some(2));

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/diary/chat/save",
            Some(json!({"userId": 1, "sessionId": "missing"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn chat_messages_validate_roles() {
        let (_dir, app) = test_app(StubAnalyzer::failing());

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/chat/message",
            Some(json!({"userId": 1, "sessionId": "s", "role": "robot", "content": "beep"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/chat/message",
            Some(json!({"userId": 1, "sessionId": "s", "role": "user", "content": "hi"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["role"], "user");

        let (_, sessions) = send(&app, Method::GET, "/api/chat/user/1", None).await;
        assert_eq!(sessions["count"], 1);
    }

    #[tokio::test]
    async fn users_are_created_and_found() {
        let (_dir, app) = test_app(StubAnalyzer::failing());

        let (status, created) = send(&app, Method::POST, "/api/user", Some(json!({"nickname": "mina"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["data"]["id"].as_i64().expect("id");

        let (status, found) = send(&app, Method::GET, &format!("/api/user/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found["data"]["nickname"], "mina");

        let (status, _) = send(&app, Method::GET, "/api/user/nickname/nobody", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, Method::GET, "/api/user/with-diaries/first", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn store_failures_hide_details_unless_diagnostics_are_on() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("not-a-directory");
        std::fs::write(&blocker, "file").expect("write");
        let broken = Config {
            db_path: blocker.join("journal.db"),
            ..Config::default()
        };

        let app = app_with(broken.clone(), StubAnalyzer::failing());
        let (status, body) = send(&app, Method::GET, "/api/calendar/1/2024/11", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert!(body.get("error").is_none());

        let diagnostic = Config {
            expose_error_details: true,
            ..broken
        };
        let app = app_with(diagnostic, StubAnalyzer::failing());
        let (status, body) = send(&app, Method::GET, "/api/calendar/1/2024/11", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().is_some_and(|detail| !detail.is_empty()));
    }

    #[tokio::test]
    async fn unknown_routes_are_json_404s() {
        let (_dir, app) = test_app(StubAnalyzer::failing());

        let (status, body) = send(&app, Method::GET, "/api/nowhere", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }
}
