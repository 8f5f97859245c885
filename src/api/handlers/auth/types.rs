//! Request types for auth endpoints.
//!
//! Missing string fields deserialize as empty so they surface as field errors rather than
//! JSON rejections.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
#[serde(default)]
pub struct RegisterRequest {
    pub email: String,
    pub name: Option<String>,
    pub password: String,
    /// `USER` (default) or `ADMIN`.
    pub role: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
#[serde(default)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub reset_token: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// Documented shape of a profile update. Any other field is ignored.
#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}
