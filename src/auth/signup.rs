use axum::{Json, debug_handler, extract::State};
use serde::{Deserialize, Serialize};

use crate::{AppResult, AppState, model::Participant};

use super::{Authenticated, Profiles};

#[derive(Deserialize)]
pub(crate) struct SignupRequest {
    #[serde(default)]
    name: String,
    email: String,
}

#[derive(Serialize)]
pub(crate) struct SignupResponse {
    token: String,
    user: Participant,
}

#[derive(Serialize)]
pub(crate) struct MeResponse {
    user: Participant,
}

#[debug_handler(state = AppState)]
pub(crate) async fn signup(
    State(profiles): State<Profiles>,
    Json(SignupRequest { name, email }): Json<SignupRequest>,
) -> AppResult<Json<SignupResponse>> {
    let (token, user) = profiles.signup(&name, &email).await?;
    Ok(Json(SignupResponse { token, user }))
}

#[debug_handler(state = AppState)]
pub(crate) async fn me(Authenticated(user): Authenticated) -> Json<MeResponse> {
    Json(MeResponse { user })
}
