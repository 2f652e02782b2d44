use crate::{ApiError, ApiResult};
use chrono::NaiveDate;
use serde_json::json;
use std::collections::BTreeMap;

pub(crate) const DEFAULT_PAGE_SIZE: i64 = 20;
pub(crate) const MAX_PAGE_SIZE: i64 = 100;
pub(crate) const MAX_MEDIA_REF_LEN: usize = 500;

/// Per-field validation messages, rendered into `details.fields`.
#[derive(Debug, Default)]
pub(crate) struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn into_result(self) -> ApiResult<()> {
        if self.is_empty() {
            return Ok(());
        }
        Err(self.into_error())
    }

    pub(crate) fn into_error(self) -> ApiError {
        ApiError::validation("request validation failed").with_details(json!({ "fields": self.0 }))
    }

    /// Trims `value` and records an error when it is blank or too long.
    pub(crate) fn required_text(
        &mut self,
        field: &'static str,
        value: &str,
        max_chars: usize,
    ) -> String {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.add(field, "must not be blank");
        } else if trimmed.chars().count() > max_chars {
            self.add(field, format!("must be at most {max_chars} characters"));
        }
        trimmed.to_string()
    }

    pub(crate) fn optional_text(
        &mut self,
        field: &'static str,
        value: &str,
        max_chars: usize,
    ) -> String {
        let trimmed = value.trim();
        if trimmed.chars().count() > max_chars {
            self.add(field, format!("must be at most {max_chars} characters"));
        }
        trimmed.to_string()
    }

    /// Blank media references collapse to `None`.
    pub(crate) fn media_ref(&mut self, field: &'static str, value: Option<&str>) -> Option<String> {
        let trimmed = value.map(str::trim).filter(|value| !value.is_empty())?;
        if trimmed.len() > MAX_MEDIA_REF_LEN {
            self.add(field, format!("must be at most {MAX_MEDIA_REF_LEN} bytes"));
        }
        Some(trimmed.to_string())
    }

    pub(crate) fn media_refs(&mut self, field: &'static str, values: &[String]) -> Vec<String> {
        values
            .iter()
            .filter_map(|value| self.media_ref(field, Some(value)))
            .collect()
    }

    pub(crate) fn date_range(
        &mut self,
        start_field: &'static str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) {
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                self.add(start_field, "must not be after the end date");
            }
        }
    }
}

pub(crate) fn page_size(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

/// Builds a `LIKE` pattern matching `query` anywhere; pair with `ESCAPE '\'`.
pub(crate) fn contains_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}
