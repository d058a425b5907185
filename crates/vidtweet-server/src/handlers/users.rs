use axum::{
    extract::{FromRequest, Multipart, Request, State},
    http::{header, HeaderMap, StatusCode},
    Extension,
};
use serde_json::{json, Value};
use vidtweet_shared::api::{
    ChangePasswordRequest, LoginRequest, LoginResponse, RefreshRequest, RegisterRequest,
    TokenPair,
};
use vidtweet_shared::{User, Video};

use super::extract::AppJson;
use super::form::RegistrationForm;
use super::{respond, ApiResult};
use crate::auth::{create_access_token, create_refresh_token, verify_token, AuthUser, Password};
use crate::db::{NewUser, UserRecord, DUPLICATE_USER};
use crate::error::AppError;
use crate::media;
use crate::routes::AppState;

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map_or(false, |value| value.starts_with("application/json"))
}

/// POST /api/v1/users/register
///
/// Multipart form with `avatar`/`coverImages` files, or a JSON body carrying
/// the text fields only (which then fails the avatar check).
pub async fn register(State(state): State<AppState>, request: Request) -> ApiResult<User> {
    let form = if is_json(request.headers()) {
        let AppJson(fields) = AppJson::<RegisterRequest>::from_request(request, &state).await?;
        RegistrationForm::from_fields(fields)
    } else {
        let multipart = Multipart::from_request(request, &state).await?;
        RegistrationForm::from_multipart(multipart, &state.config.upload_temp_dir).await?
    };
    let user = register_user(&state, form).await?;

    Ok(respond(
        StatusCode::CREATED,
        user,
        "User registered successfully",
    ))
}

/// Validates, uploads media, persists and returns the sanitized new user.
///
/// Temp files left in `form` are removed when it drops, on every exit path.
pub async fn register_user(state: &AppState, form: RegistrationForm) -> Result<User, AppError> {
    check_registration(state, &form).await?;

    let RegistrationForm {
        fields,
        avatar: avatar_file,
        cover_image: cover_file,
    } = form;

    let store = state.media.as_ref();
    let (avatar, cover_image) = tokio::join!(
        media::upload(store, avatar_file.as_deref()),
        media::upload(store, cover_file.as_deref()),
    );

    let avatar =
        avatar.ok_or_else(|| AppError::UploadFailed("Avatar file failed to upload".to_string()))?;
    let cover_image = cover_image.map(|media| media.url).unwrap_or_default();

    let created = state
        .users
        .create(NewUser {
            username: fields.username.trim().to_lowercase(),
            email: fields.email.trim().to_string(),
            full_name: fields.full_name.trim().to_string(),
            password: fields.password,
            avatar: avatar.url,
            cover_image,
        })
        .await?;

    let user = state
        .users
        .find_public_by_id(created.id)
        .await?
        .ok_or_else(|| {
            AppError::Internal("Something went wrong while registering the user".to_string())
        })?;

    tracing::info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(user)
}

/// Everything that must hold before any media leaves the machine.
async fn check_registration(state: &AppState, form: &RegistrationForm) -> Result<(), AppError> {
    let fields = &form.fields;
    let missing: Vec<&'static str> = [
        ("fullName", &fields.full_name),
        ("email", &fields.email),
        ("password", &fields.password),
        ("username", &fields.username),
    ]
    .into_iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(name, _)| name)
    .collect();

    if !missing.is_empty() {
        return Err(AppError::MissingFields(missing));
    }

    let existing = state
        .users
        .find_by_username_or_email(
            &fields.username.trim().to_lowercase(),
            &fields.email.trim().to_lowercase(),
        )
        .await?;

    if existing.is_some() {
        return Err(AppError::Conflict(DUPLICATE_USER.to_string()));
    }

    if form.avatar.is_none() {
        return Err(AppError::Validation("Avatar file is required".to_string()));
    }

    Ok(())
}

/// Issues a fresh token pair and stores the refresh token on the user.
async fn issue_tokens(state: &AppState, user: &mut UserRecord) -> Result<TokenPair, AppError> {
    let config = &state.config;
    let access_token = create_access_token(
        user,
        &config.access_token_secret,
        config.access_token_expires_in,
    )?;
    let refresh_token = create_refresh_token(
        user,
        &config.refresh_token_secret,
        config.refresh_token_expires_in,
    )?;

    user.refresh_token = Some(refresh_token.clone());
    state.users.save(user).await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

async fn load_user(state: &AppState, auth: &AuthUser) -> Result<UserRecord, AppError> {
    state
        .users
        .find_by_id(auth.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// POST /api/v1/users/login
pub async fn login(
    State(state): State<AppState>,
    AppJson(req): AppJson<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let normalized = |value: Option<String>| {
        value
            .map(|v| v.trim().to_lowercase())
            .filter(|v| !v.is_empty())
    };
    let username = normalized(req.username);
    let email = normalized(req.email);

    if username.is_none() && email.is_none() {
        return Err(AppError::Validation(
            "Username or email is required".to_string(),
        ));
    }

    let mut user = state
        .users
        .find_by_username_or_email(
            username.as_deref().unwrap_or_default(),
            email.as_deref().unwrap_or_default(),
        )
        .await?
        .ok_or_else(|| AppError::NotFound("User does not exist".to_string()))?;

    if !user.password.verify(&req.password).await? {
        return Err(AppError::Unauthorized(
            "Invalid user credentials".to_string(),
        ));
    }

    let tokens = issue_tokens(&state, &mut user).await?;
    tracing::info!(user_id = %user.id, "user logged in");

    Ok(respond(
        StatusCode::OK,
        LoginResponse {
            user: user.to_public(),
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        },
        "User logged in successfully",
    ))
}

/// POST /api/v1/users/logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Value> {
    let mut user = load_user(&state, &auth).await?;
    user.refresh_token = None;
    state.users.save(&mut user).await?;

    tracing::info!(user_id = %auth.id, username = %auth.username, "user logged out");
    Ok(respond(StatusCode::OK, json!({}), "User logged out"))
}

/// POST /api/v1/users/refresh-token
pub async fn refresh_token(
    State(state): State<AppState>,
    AppJson(req): AppJson<RefreshRequest>,
) -> ApiResult<TokenPair> {
    let invalid = || AppError::Unauthorized("Invalid refresh token".to_string());

    let claims = verify_token(&req.refresh_token, &state.config.refresh_token_secret)
        .map_err(|_| invalid())?;
    let mut user = state
        .users
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(invalid)?;

    if user.refresh_token.as_deref() != Some(req.refresh_token.as_str()) {
        return Err(AppError::Unauthorized(
            "Refresh token is expired or used".to_string(),
        ));
    }

    let tokens = issue_tokens(&state, &mut user).await?;
    Ok(respond(StatusCode::OK, tokens, "Access token refreshed"))
}

/// POST /api/v1/users/change-password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppJson(req): AppJson<ChangePasswordRequest>,
) -> ApiResult<Value> {
    if req.new_password.trim().is_empty() {
        return Err(AppError::Validation("New password is required".to_string()));
    }

    let mut user = load_user(&state, &auth).await?;
    if !user.password.verify(&req.old_password).await? {
        return Err(AppError::Validation("Invalid old password".to_string()));
    }

    user.password = Password::Changed(req.new_password);
    state.users.save(&mut user).await?;
    tracing::info!(user_id = %auth.id, email = %auth.email, "password changed");

    Ok(respond(
        StatusCode::OK,
        json!({}),
        "Password changed successfully",
    ))
}

/// GET /api/v1/users/current-user
pub async fn current_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<User> {
    let user = state
        .users
        .find_public_by_id(auth.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(respond(
        StatusCode::OK,
        user,
        "Current user fetched successfully",
    ))
}

/// GET /api/v1/users/history
pub async fn watch_history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Vec<Video>> {
    let user = load_user(&state, &auth).await?;
    let videos = state.videos.find_by_ids(&user.watch_history).await?;

    Ok(respond(
        StatusCode::OK,
        videos,
        "Watch history fetched successfully",
    ))
}
