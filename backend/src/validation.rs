use lettre::Address;

use crate::models::NewConsultation;

pub const MIN_CREDENTIAL_LENGTH: usize = 8;
pub const MAX_CREDENTIAL_LENGTH: usize = 128;
// Column widths of `consultation_requests`.
pub const MAX_NAME_LENGTH: usize = 255;
pub const MAX_EMAIL_LENGTH: usize = 320;
pub const MAX_PHONE_LENGTH: usize = 64;
pub const MAX_LOCALE_LENGTH: usize = 16;

pub fn is_valid_email(email: &str) -> bool {
    email.parse::<Address>().is_ok()
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Checks the contact fields of a submission and returns it with name and
/// email normalised. The intake payload is passed through untouched.
pub fn validate_submission(mut submission: NewConsultation) -> Result<NewConsultation, String> {
    let name = submission.name.trim();
    if name.is_empty() {
        return Err("name must not be empty".to_string());
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(format!("name must be at most {MAX_NAME_LENGTH} characters"));
    }
    submission.name = name.to_string();

    let email = normalize_email(&submission.email);
    if email.is_empty() {
        return Err("email must not be empty".to_string());
    }
    if email.chars().count() > MAX_EMAIL_LENGTH {
        return Err(format!("email must be at most {MAX_EMAIL_LENGTH} characters"));
    }
    if !is_valid_email(&email) {
        return Err("email is not a valid address".to_string());
    }
    submission.email = email;

    submission.phone = optional_field("phone", submission.phone, MAX_PHONE_LENGTH)?;
    submission.locale = optional_field("locale", submission.locale, MAX_LOCALE_LENGTH)?;

    if submission.intake.is_null() {
        submission.intake = serde_json::Value::Object(Default::default());
    }
    if !submission.intake.is_object() {
        return Err("intake must be a JSON object".to_string());
    }

    Ok(submission)
}

/// Trims an optional text field; blank counts as absent.
fn optional_field(
    field: &str,
    value: Option<String>,
    max_length: usize,
) -> Result<Option<String>, String> {
    let Some(value) = value else {
        return Ok(None);
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > max_length {
        return Err(format!("{field} must be at most {max_length} characters"));
    }
    Ok(Some(trimmed.to_string()))
}

pub fn validate_credential(credential: &str) -> Result<(), String> {
    let length = credential.chars().count();
    if length < MIN_CREDENTIAL_LENGTH {
        return Err(format!(
            "password must be at least {MIN_CREDENTIAL_LENGTH} characters"
        ));
    }
    if length > MAX_CREDENTIAL_LENGTH {
        return Err(format!(
            "password must be at most {MAX_CREDENTIAL_LENGTH} characters"
        ));
    }
    if credential.trim().is_empty() {
        return Err("password must not be blank".to_string());
    }
    Ok(())
}
