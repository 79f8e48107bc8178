use axum::extract::Multipart;
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    images::services::{ImageInput, UploadItem},
};

/// Multipart fields accepted by create and update. Empty text fields count
/// as not supplied.
#[derive(Debug, Default)]
pub struct CarForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<String>,
    pub images: Vec<ImageInput>,
}

impl CarForm {
    /// `images` parts carrying a file name are uploads; text `images` parts
    /// are URLs of already hosted images. Unknown fields and empty file
    /// inputs are ignored.
    pub async fn from_multipart(mut mp: Multipart) -> Result<Self, AppError> {
        let mut form = CarForm::default();
        while let Some(field) = mp
            .next_field()
            .await
            .map_err(|e| AppError::Validation(format!("Invalid form data: {}", e.body_text())))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "images" | "images[]" if field.file_name().is_some() => {
                    let file_name = field.file_name().map(str::to_string);
                    let content_type = field.content_type().map(str::to_string);
                    let body = field.bytes().await.map_err(|e| {
                        AppError::Validation(format!("Failed to read image: {}", e.body_text()))
                    })?;
                    // An empty file input is submitted as a nameless, empty part.
                    if file_name.as_deref().is_some_and(str::is_empty) && body.is_empty() {
                        continue;
                    }
                    form.images.push(ImageInput::File(UploadItem {
                        file_name,
                        content_type,
                        body,
                    }));
                }
                "images" | "images[]" | "title" | "description" | "tags" => {
                    let text = field.text().await.map_err(|e| {
                        AppError::Validation(format!("Invalid form data: {}", e.body_text()))
                    })?;
                    let text = text.trim().to_string();
                    if text.is_empty() {
                        continue;
                    }
                    match name.as_str() {
                        "title" => form.title = Some(text),
                        "description" => form.description = Some(text),
                        "tags" => form.tags = Some(text),
                        _ => form.images.push(ImageInput::Url(text)),
                    }
                }
                _ => {}
            }
        }
        Ok(form)
    }
}

/// Splits a comma-separated tag string. Blank entries and repeats are dropped.
pub fn parse_tags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub keyword: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_trimmed_and_deduplicated() {
        assert_eq!(parse_tags(" sedan, red ,,sedan , "), vec!["sedan", "red"]);
        assert!(parse_tags("").is_empty());
        assert!(parse_tags(" , ,").is_empty());
    }

    #[test]
    fn tags_keep_case() {
        assert_eq!(parse_tags("SUV,suv"), vec!["SUV", "suv"]);
    }
}
