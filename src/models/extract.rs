//! Tolerant JSON recovery from model responses.
//!
//! Models are prompted for pure JSON but routinely wrap it in prose or
//! code fences. The extractor locates the first balanced `{...}` (or
//! `[...]`) substring, tracking string literals and escapes so braces
//! inside strings do not unbalance the scan. The recovered substring is
//! then type-checked against the declared shape; a mismatch is a
//! `ModelFailure`, never a silent default.

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// First balanced JSON object substring of `text`, if any.
pub fn first_json_object(text: &str) -> Option<&str> {
    first_balanced(text, '{', '}')
}

/// First balanced JSON array substring of `text`, if any.
pub fn first_json_array(text: &str) -> Option<&str> {
    first_balanced(text, '[', ']')
}

fn first_balanced(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Extract and deserialize the first JSON object in a model response.
///
/// `model` names the backend for error attribution.
pub fn parse_model_json<T: DeserializeOwned>(model: &str, response: &str) -> Result<T> {
    let fragment = first_json_object(response).ok_or_else(|| {
        Error::model_failure(model, "no JSON object found in response")
    })?;
    serde_json::from_str(fragment)
        .map_err(|e| Error::model_failure(model, format!("response shape mismatch: {e}")))
}
