//! Field validation for auth request bodies.
//!
//! Each validator returns every field error it finds so the caller can answer with a
//! single 422.

use regex::Regex;

use super::types::{
    ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, RegisterRequest,
    ResetPasswordRequest, UpdateProfileRequest,
};
use crate::api::response::FieldError;
use crate::auth::Role;

pub const PASSWORD_MIN_LENGTH: usize = 6;
pub const NAME_MIN_LENGTH: usize = 2;
pub const NAME_MAX_LENGTH: usize = 50;

const INVALID_EMAIL: &str = "Please provide a valid email";
const INVALID_NAME: &str = "Name must be between 2 and 50 characters";
const CONFIRMATION_MISMATCH: &str = "Password confirmation does not match new password";

pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").is_ok_and(|re| re.is_match(email.trim()))
}

/// At least one lowercase letter, one uppercase letter and one digit.
pub fn strong_password(password: &str) -> bool {
    password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
}

fn valid_name(name: &str) -> bool {
    (NAME_MIN_LENGTH..=NAME_MAX_LENGTH).contains(&name.trim().chars().count())
}

fn check_password(errors: &mut Vec<FieldError>, field: &str, password: &str, prefix: &str) {
    if password.chars().count() < PASSWORD_MIN_LENGTH {
        errors.push(FieldError::new(
            field,
            &format!("{prefix} must be at least {PASSWORD_MIN_LENGTH} characters long"),
        ));
    } else if !strong_password(password) {
        errors.push(FieldError::new(
            field,
            &format!(
                "{prefix} must contain at least one uppercase letter, one lowercase letter, and one number"
            ),
        ));
    }
}

fn check_email(errors: &mut Vec<FieldError>, email: &str) {
    if !valid_email(email) {
        errors.push(FieldError::new("email", INVALID_EMAIL));
    }
}

fn check_required(errors: &mut Vec<FieldError>, field: &str, value: &str, message: &str) {
    if value.trim().is_empty() {
        errors.push(FieldError::new(field, message));
    }
}

pub fn validate_register(request: &RegisterRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();
    check_email(&mut errors, &request.email);
    if let Some(name) = &request.name {
        if !valid_name(name) {
            errors.push(FieldError::new("name", INVALID_NAME));
        }
    }
    check_password(&mut errors, "password", &request.password, "Password");
    if let Some(role) = &request.role {
        if role.parse::<Role>().is_err() {
            errors.push(FieldError::new("role", "Role must be either USER or ADMIN"));
        }
    }
    errors
}

pub fn validate_login(request: &LoginRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();
    check_email(&mut errors, &request.email);
    check_required(&mut errors, "password", &request.password, "Password is required");
    errors
}

pub fn validate_change_password(request: &ChangePasswordRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();
    check_required(
        &mut errors,
        "currentPassword",
        &request.current_password,
        "Current password is required",
    );
    check_password(&mut errors, "newPassword", &request.new_password, "New password");
    if request.confirm_password != request.new_password {
        errors.push(FieldError::new("confirmPassword", CONFIRMATION_MISMATCH));
    }
    errors
}

pub fn validate_forgot_password(request: &ForgotPasswordRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();
    check_email(&mut errors, &request.email);
    errors
}

pub fn validate_reset_password(request: &ResetPasswordRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();
    check_required(
        &mut errors,
        "resetToken",
        &request.reset_token,
        "Reset token is required",
    );
    check_password(&mut errors, "newPassword", &request.new_password, "New password");
    if request.confirm_password != request.new_password {
        errors.push(FieldError::new("confirmPassword", CONFIRMATION_MISMATCH));
    }
    errors
}

/// Only the fields a profile update can change are checked; anything else is dropped later.
pub fn validate_profile_update(request: &UpdateProfileRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if let Some(email) = &request.email {
        check_email(&mut errors, email);
    }
    if let Some(name) = &request.name {
        if !valid_name(name) {
            errors.push(FieldError::new("name", INVALID_NAME));
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(errors: &[FieldError]) -> Vec<&str> {
        errors.iter().map(|error| error.field.as_str()).collect()
    }

    #[test]
    fn email_shapes() {
        assert!(valid_email("ana@example.com"));
        assert!(valid_email(" ana@example.com "));
        assert!(!valid_email("ana@example"));
        assert!(!valid_email("ana example@x.com"));
        assert!(!valid_email(""));
    }

    #[test]
    fn password_strength() {
        assert!(strong_password("Secret1"));
        assert!(!strong_password("secret1"));
        assert!(!strong_password("SECRET1"));
        assert!(!strong_password("Secret"));
    }

    #[test]
    fn register_collects_every_error() {
        let request = RegisterRequest {
            email: "nope".to_string(),
            name: Some(" a ".to_string()),
            password: "abc".to_string(),
            role: Some("root".to_string()),
        };
        let errors = validate_register(&request);
        assert_eq!(fields(&errors), vec!["email", "name", "password", "role"]);
        assert_eq!(errors[2].message, "Password must be at least 6 characters long");
    }

    #[test]
    fn register_accepts_minimal_body() {
        let request = RegisterRequest {
            email: "ana@example.com".to_string(),
            password: "Secret1".to_string(),
            ..RegisterRequest::default()
        };
        assert!(validate_register(&request).is_empty());
    }

    #[test]
    fn weak_password_message() {
        let request = RegisterRequest {
            email: "ana@example.com".to_string(),
            password: "lowercase1".to_string(),
            ..RegisterRequest::default()
        };
        let errors = validate_register(&request);
        assert_eq!(
            errors[0].message,
            "Password must contain at least one uppercase letter, one lowercase letter, and one number"
        );
    }

    #[test]
    fn change_password_requires_matching_confirmation() {
        let request = ChangePasswordRequest {
            current_password: String::new(),
            new_password: "Newpass1".to_string(),
            confirm_password: "Newpass2".to_string(),
        };
        let errors = validate_change_password(&request);
        assert_eq!(fields(&errors), vec!["currentPassword", "confirmPassword"]);
        assert_eq!(errors[1].message, CONFIRMATION_MISMATCH);
    }

    #[test]
    fn reset_requires_token() {
        let request = ResetPasswordRequest {
            reset_token: " ".to_string(),
            new_password: "short".to_string(),
            confirm_password: "short".to_string(),
        };
        let errors = validate_reset_password(&request);
        assert_eq!(fields(&errors), vec!["resetToken", "newPassword"]);
        assert_eq!(
            errors[1].message,
            "New password must be at least 6 characters long"
        );
    }

    #[test]
    fn login_requires_password() {
        let request = LoginRequest {
            email: "ana@example.com".to_string(),
            password: String::new(),
        };
        let errors = validate_login(&request);
        assert_eq!(errors, vec![FieldError::new("password", "Password is required")]);
    }

    #[test]
    fn profile_update_checks_present_fields_only() {
        assert!(validate_profile_update(&UpdateProfileRequest::default()).is_empty());

        let request = UpdateProfileRequest {
            name: Some("X".to_string()),
            email: Some("bad".to_string()),
        };
        assert_eq!(fields(&validate_profile_update(&request)), vec!["email", "name"]);
        assert!(validate_forgot_password(&ForgotPasswordRequest::default()).len() == 1);
    }
}
