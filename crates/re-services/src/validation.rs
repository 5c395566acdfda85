//! Input checks shared by the rating and forum services.

use re_core::{AppError, Result};

/// Longest review accepted, in characters.
pub const MAX_REVIEW_CHARS: usize = 1000;

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;

/// Identifiers must be non-empty.
pub fn require_id(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(())
}

/// Accepts only whole numbers from 1 to 5.
pub fn score(value: f64) -> Result<u8> {
    let in_range = (f64::from(MIN_SCORE)..=f64::from(MAX_SCORE)).contains(&value);
    if !in_range || value.fract() != 0.0 {
        return Err(AppError::Validation(format!(
            "rating must be a whole number between {MIN_SCORE} and {MAX_SCORE}, got {value}"
        )));
    }
    Ok(value as u8)
}

pub fn review(text: Option<&str>) -> Result<()> {
    if let Some(text) = text {
        let chars = text.chars().count();
        if chars > MAX_REVIEW_CHARS {
            return Err(AppError::Validation(format!(
                "review must be {MAX_REVIEW_CHARS} characters or less, got {chars}"
            )));
        }
    }
    Ok(())
}

/// Returns `value` trimmed, or fails if nothing is left.
pub fn non_blank<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty")));
    }
    Ok(trimmed)
}
