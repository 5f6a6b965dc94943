use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;

use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::SurveyProfile,
};

use super::AppState;

/// The six survey answers of a create/update request
#[derive(Debug, Deserialize)]
pub struct SurveyAnswers {
    pub residence_env: Option<String>,
    pub care_period: Option<String>,
    pub pet_color_pref: Option<String>,
    pub pet_size_pref: Option<String>,
    pub activity_time: Option<String>,
    pub diet_management: Option<String>,
}

impl SurveyAnswers {
    fn into_profile(self, username: String) -> SurveyProfile {
        SurveyProfile {
            username,
            residence_env: self.residence_env,
            care_period: self.care_period,
            pet_color_pref: self.pet_color_pref,
            pet_size_pref: self.pet_size_pref,
            activity_time: self.activity_time,
            diet_management: self.diet_management,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub username: String,
    #[serde(flatten)]
    pub answers: SurveyAnswers,
}

/// Handler for account signup
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<CreateAccountRequest>,
) -> AppResult<StatusCode> {
    if request.username.trim().is_empty() {
        return Err(AppError::InvalidInput("Username must not be empty".to_string()));
    }

    tracing::info!(
        request_id = %request_id,
        username = %request.username,
        "Creating account profile"
    );

    let profile = request.answers.into_profile(request.username);
    state.accounts.save_profile(&profile).await?;

    // The profile is committed; the refresh re-reads it from the store.
    state.scheduler.schedule(&profile.username).await;

    Ok(StatusCode::CREATED)
}

/// Handler for survey profile updates
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(username): Path<String>,
    Json(answers): Json<SurveyAnswers>,
) -> AppResult<StatusCode> {
    if username.trim().is_empty() {
        return Err(AppError::InvalidInput("Username must not be empty".to_string()));
    }

    tracing::info!(
        request_id = %request_id,
        username = %username,
        "Updating survey profile"
    );

    let profile = answers.into_profile(username);
    state.accounts.save_profile(&profile).await?;

    state.scheduler.schedule(&profile.username).await;

    Ok(StatusCode::NO_CONTENT)
}

/// Handler for reading a stored survey profile
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> AppResult<Json<SurveyProfile>> {
    let profile = state
        .accounts
        .get_profile(&username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Account {} not found", username)))?;

    Ok(Json(profile))
}
