/// Input validation for names reaching the avatar service and for startup config
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Player name cannot be empty")]
    PlayerNameEmpty,

    #[error("Player name too long (max 16 characters, got {0})")]
    PlayerNameTooLong(usize),

    #[error("Player name contains invalid characters (only alphanumeric and underscore allowed)")]
    PlayerNameInvalidChars,

    #[error("Server address cannot be empty")]
    AddressEmpty,

    #[error("Server address too long (max 253 characters, got {0})")]
    AddressTooLong(usize),

    #[error("Server address cannot contain whitespace")]
    AddressWhitespace,

    #[error("Avatar URL must contain the {{name}} placeholder")]
    AvatarTemplateMissingName,

    #[error("Status API URL must start with http:// or https://")]
    ApiUrlScheme,

    #[error("Poll interval must be at least one second")]
    PollIntervalTooShort,
}

/// Validates a player name before it is substituted into the avatar URL
///
/// Rules:
/// - Cannot be empty
/// - Max 16 characters
/// - Only ASCII alphanumeric characters and underscores
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::PlayerNameEmpty);
    }

    if name.len() > 16 {
        return Err(ValidationError::PlayerNameTooLong(name.len()));
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ValidationError::PlayerNameInvalidChars);
    }

    Ok(())
}

/// Validates the address copied to the clipboard (host, optionally with port)
pub fn validate_server_address(address: &str) -> Result<(), ValidationError> {
    if address.is_empty() {
        return Err(ValidationError::AddressEmpty);
    }

    if address.len() > 253 {
        return Err(ValidationError::AddressTooLong(address.len()));
    }

    if address.chars().any(char::is_whitespace) {
        return Err(ValidationError::AddressWhitespace);
    }

    Ok(())
}

pub fn validate_avatar_template(template: &str) -> Result<(), ValidationError> {
    if !template.contains(crate::avatars::NAME_PLACEHOLDER) {
        return Err(ValidationError::AvatarTemplateMissingName);
    }
    Ok(())
}

pub fn validate_api_url(url: &str) -> Result<(), ValidationError> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ValidationError::ApiUrlScheme);
    }
    Ok(())
}

pub fn validate_poll_interval(interval: Duration) -> Result<(), ValidationError> {
    if interval < crate::board::MIN_POLL_INTERVAL {
        return Err(ValidationError::PollIntervalTooShort);
    }
    Ok(())
}
