use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    error::AppError,
    middleware::CurrentSession,
    models::{Priority, UnknownPriority},
    oauth::OAuthCredentials,
    utils::success_to_api_response,
};

/// 返回当前账户某一优先级的已入库邮件
///
/// 优先级在访问存储之前校验，未知值直接返回 400。
pub async fn list_by_priority(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(priority): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let priority: Priority = priority
        .parse()
        .map_err(|UnknownPriority(value)| AppError::InvalidPriority(value))?;

    let session_id = session.ok_or(AppError::NotAuthenticated)?;
    let payload = state.vault.retrieve(&session_id).await?;
    let credentials =
        OAuthCredentials::from_payload(&payload).map_err(|_| AppError::NotAuthenticated)?;

    let emails = state
        .emails
        .list_by_priority(&credentials.account, priority)
        .await?;
    Ok((StatusCode::OK, success_to_api_response(emails)))
}
