use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Extension, Json, Path, State,
    },
    http::{header, HeaderMap, StatusCode},
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, post},
    Router,
};

use crate::{
    auth::{self, cleared_session_cookie, session_cookie, AuthenticatedUser},
    cqrs::{
        CommandHandler, CreateCookieStandCommand, DeleteCookieStandCommand, GetCookieStandQuery,
        GetCookieStandsQuery, QueryHandler, ReplaceCookieStandCommand, UpdateCookieStandCommand,
    },
    domain::CookieStandId,
    dtos::{
        CookieStandListResponse, CookieStandPatchRequest, CookieStandRequest, CookieStandResponse,
        LoginRequest, LoginResponse,
    },
    error::AppError,
    state::AppState,
};

pub fn router(state: Arc<AppState>) -> Router {
    let authentication = from_fn_with_state(state.clone(), auth::authentication_middleware);

    // route_layer keeps unsupported methods answering 405 before authentication runs
    let collection = get(list_cookie_stands)
        .post(create_cookie_stand)
        .route_layer(authentication.clone());
    let detail = get(retrieve_cookie_stand)
        .put(replace_cookie_stand)
        .patch(update_cookie_stand)
        .delete(delete_cookie_stand)
        .route_layer(authentication.clone());

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout).route_layer(authentication))
        .route("/cookie-stands", collection.clone())
        .route("/cookie-stands/", collection)
        .route("/cookie-stands/{id}", detail.clone())
        .route("/cookie-stands/{id}/", detail)
        .with_state(state)
}

pub async fn index() -> &'static str {
    "Cookie Stand API"
}

pub async fn health() -> &'static str {
    "ok"
}

fn stand_id(id: Result<Path<CookieStandId>, PathRejection>) -> Result<CookieStandId, AppError> {
    id.map(|Path(id)| id)
        .map_err(|_| AppError::NotFound(String::from("Not found.")))
}

fn payload<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

pub async fn list_cookie_stands(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CookieStandListResponse>, AppError> {
    let stands = state
        .get_cookie_stands_query_handler
        .handle(&GetCookieStandsQuery)
        .await?;
    Ok(Json(stands))
}

pub async fn retrieve_cookie_stand(
    id: Result<Path<CookieStandId>, PathRejection>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<CookieStandResponse>, AppError> {
    let query = GetCookieStandQuery { id: stand_id(id)? };
    let stand = state.get_cookie_stands_query_handler.handle(&query).await?;
    Ok(Json(stand))
}

pub async fn create_cookie_stand(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CookieStandRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CookieStandResponse>), AppError> {
    let command = CreateCookieStandCommand {
        stand: payload(body)?,
    };
    let created = state.create_cookie_stand_command_handler.handle(command).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn replace_cookie_stand(
    id: Result<Path<CookieStandId>, PathRejection>,
    State(state): State<Arc<AppState>>,
    body: Result<Json<CookieStandRequest>, JsonRejection>,
) -> Result<Json<CookieStandResponse>, AppError> {
    let command = ReplaceCookieStandCommand {
        id: stand_id(id)?,
        stand: payload(body)?,
    };
    let updated = state.replace_cookie_stand_command_handler.handle(command).await?;
    Ok(Json(updated))
}

pub async fn update_cookie_stand(
    id: Result<Path<CookieStandId>, PathRejection>,
    State(state): State<Arc<AppState>>,
    body: Result<Json<CookieStandPatchRequest>, JsonRejection>,
) -> Result<Json<CookieStandResponse>, AppError> {
    let command = UpdateCookieStandCommand {
        id: stand_id(id)?,
        patch: payload(body)?,
    };
    let updated = state.update_cookie_stand_command_handler.handle(command).await?;
    Ok(Json(updated))
}

pub async fn delete_cookie_stand(
    id: Result<Path<CookieStandId>, PathRejection>,
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, AppError> {
    let command = DeleteCookieStandCommand { id: stand_id(id)? };
    state.delete_cookie_stand_command_handler.handle(command).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let credentials = payload(body)?;
    let session = state
        .auth_service
        .login(&credentials.username, &credentials.password)
        .await?;

    let mut headers = HeaderMap::new();
    if let Some(cookie) = session_cookie(&session.token, state.auth_service.sessions().ttl()) {
        headers.insert(header::SET_COOKIE, cookie);
    }

    Ok((
        headers,
        Json(LoginResponse {
            token: session.token,
            expires_at: session.expires_at,
        }),
    ))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> impl IntoResponse {
    state.auth_service.logout(&user).await;

    let mut headers = HeaderMap::new();
    if let Some(cookie) = cleared_session_cookie() {
        headers.insert(header::SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, headers)
}
