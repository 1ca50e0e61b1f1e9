use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use super::model::{CallbackQuery, emails_page, landing_page};
use crate::{
    AppState,
    cache::SessionField,
    error::AppError,
    middleware::{CurrentSession, session_cookie},
    oauth::OAuthCredentials,
    session::TriggerDecision,
    sync::bounded,
    utils::short_id,
};

/// 确保会话存在：没有有效 Cookie 时签发新会话
pub async fn index(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    jar: CookieJar,
) -> Result<(CookieJar, Html<String>), AppError> {
    let (session_id, jar) = match session {
        Some(id) => (id, jar),
        None => {
            let (id, cookie_value) = state.codec.issue();
            let cookie = session_cookie(state.config.session_cookie_name.clone(), cookie_value);
            (id, jar.add(cookie))
        }
    };

    let created_at = state
        .sessions
        .get_field(&session_id, SessionField::CreatedAt)
        .await?;
    if created_at.is_none() {
        state
            .sessions
            .set_field(
                &session_id,
                SessionField::CreatedAt,
                &Utc::now().to_rfc3339(),
                None,
            )
            .await?;
        info!(session = short_id(&session_id), "session created");
    }

    let signed_in = match state.vault.retrieve(&session_id).await {
        Ok(_) => true,
        Err(AppError::NotAuthenticated) => false,
        Err(e) => return Err(e),
    };

    Ok((jar, Html(landing_page(signed_in))))
}

/// 跳转到授权页，随机 state 存入会话供回调校验
pub async fn login(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Redirect, AppError> {
    let Some(session_id) = session else {
        return Ok(Redirect::to("/"));
    };

    let csrf_state = Uuid::new_v4().simple().to_string();
    state
        .sessions
        .set_field(
            &session_id,
            SessionField::OAuthState,
            &csrf_state,
            Some(state.config.oauth_state_ttl()),
        )
        .await?;

    let url = state.oauth.authorization_url(&csrf_state)?;
    Ok(Redirect::to(url.as_str()))
}

pub async fn callback(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Query(query): Query<CallbackQuery>,
) -> Result<Redirect, AppError> {
    let Some(session_id) = session else {
        return Ok(Redirect::to("/"));
    };

    // state 只能使用一次，并发回调中只有一个能取到
    let expected = state
        .sessions
        .take_field(&session_id, SessionField::OAuthState)
        .await?;

    match (expected.as_deref(), query.state.as_deref()) {
        (Some(expected), Some(received)) if expected == received => {}
        _ => {
            warn!(session = short_id(&session_id), "oauth state mismatch");
            return Err(AppError::InvalidOAuthState);
        }
    }

    if let Some(error) = query.error {
        return Err(AppError::BadRequest(format!("authorization denied: {error}")));
    }
    let code = query
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AppError::BadRequest("missing authorization code".into()))?;

    let timeout = state.config.external_call_timeout();
    let grant = bounded("oauth exchange", timeout, state.oauth.exchange_code(&code)).await?;
    let account = bounded(
        "gmail profile",
        timeout,
        state.provider.account_address(&grant.access_token),
    )
    .await?;

    let credentials = OAuthCredentials::from_grant(grant, account);
    let payload = credentials
        .to_payload()
        .map_err(|e| AppError::Internal(e.to_string()))?;
    state.vault.store(&session_id, &payload).await?;

    info!(
        session = short_id(&session_id),
        account = %credentials.account,
        "account connected"
    );
    Ok(Redirect::to("/emails"))
}

/// 页面总是立即返回，同步在后台进行
pub async fn emails(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Response, AppError> {
    let Some(session_id) = session else {
        return Ok(Redirect::to("/").into_response());
    };

    let decision = state.scheduler.maybe_trigger(&session_id).await?;
    if decision == TriggerDecision::Unauthenticated {
        return Ok(Redirect::to("/").into_response());
    }

    let window = state.scheduler.debouncer().window();
    Ok(Html(emails_page(decision, window)).into_response())
}

pub async fn logout(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), AppError> {
    if let Some(session_id) = session {
        state.sessions.clear(&session_id).await?;
        info!(session = short_id(&session_id), "session cleared");
    }

    let name = state.config.session_cookie_name.clone();
    let jar = jar.remove(Cookie::build((name, "")).path("/"));
    Ok((jar, Redirect::to("/")))
}
