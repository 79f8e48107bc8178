use anyhow::Context;
use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

pub const MAX_IMAGES: usize = 10;

/// A file part received from the client.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// An image attached to a create/update request: either already hosted
/// somewhere, or raw bytes that still have to go through the uploader.
#[derive(Debug, Clone)]
pub enum ImageInput {
    Url(String),
    File(UploadItem),
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        _ => None,
    }
}

fn ext_from_file_name(name: &str) -> Option<&'static str> {
    let (_, ext) = name.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("jpg"),
        "png" => Some("png"),
        _ => None,
    }
}

impl UploadItem {
    /// Storage extension, or `None` if this is not a JPEG/PNG image.
    fn image_ext(&self) -> Option<&'static str> {
        self.content_type
            .as_deref()
            .and_then(ext_from_mime)
            .or_else(|| self.file_name.as_deref().and_then(ext_from_file_name))
    }

    fn mime(&self, ext: &str) -> String {
        match self.content_type.as_deref() {
            Some(ct) if ext_from_mime(ct).is_some() => ct.to_string(),
            _ if ext == "png" => "image/png".into(),
            _ => "image/jpeg".into(),
        }
    }
}

/// Checks count, URL scheme and file type before anything is uploaded.
pub fn validate_images(images: &[ImageInput]) -> Result<(), AppError> {
    if images.len() > MAX_IMAGES {
        return Err(AppError::Validation(format!(
            "Maximum {MAX_IMAGES} images allowed"
        )));
    }
    for image in images {
        match image {
            ImageInput::Url(url) => {
                if !(url.starts_with("https://") || url.starts_with("http://")) {
                    return Err(AppError::Validation(format!("Invalid image URL: {url}")));
                }
            }
            ImageInput::File(item) => {
                if item.image_ext().is_none() {
                    return Err(AppError::Validation(
                        "Only JPEG, JPG, and PNG images are allowed".into(),
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Uploads file inputs and returns the URL of every input in request order.
pub async fn resolve_images(
    st: &AppState,
    user_id: Uuid,
    images: Vec<ImageInput>,
) -> Result<Vec<String>, AppError> {
    validate_images(&images)?;

    let mut urls = Vec::with_capacity(images.len());
    for image in images {
        match image {
            ImageInput::Url(url) => urls.push(url),
            ImageInput::File(item) => {
                let url = upload_one(st, user_id, item)
                    .await
                    .map_err(AppError::upstream("Image upload failed"))?;
                urls.push(url);
            }
        }
    }
    Ok(urls)
}

async fn upload_one(st: &AppState, user_id: Uuid, item: UploadItem) -> anyhow::Result<String> {
    let ext = item.image_ext().unwrap_or("jpg");
    let content_type = item.mime(ext);
    let key = format!("{}/{}/{}.{}", st.media_folder, user_id, Uuid::new_v4(), ext);
    let size = item.body.len();
    let url = st
        .media
        .upload(&key, item.body, &content_type)
        .await
        .with_context(|| format!("upload {}", key))?;
    info!(%user_id, %key, size, "image uploaded");
    Ok(url)
}

#[cfg(test)]
mod image_tests {
    use super::*;

    fn file(name: Option<&str>, ct: Option<&str>) -> ImageInput {
        ImageInput::File(UploadItem {
            file_name: name.map(Into::into),
            content_type: ct.map(Into::into),
            body: Bytes::from_static(b"\x89PNG"),
        })
    }

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), None);
        assert_eq!(ext_from_mime("application/octet-stream"), None);
    }

    #[test]
    fn test_ext_from_file_name() {
        assert_eq!(ext_from_file_name("car.JPEG"), Some("jpg"));
        assert_eq!(ext_from_file_name("a.b.png"), Some("png"));
        assert_eq!(ext_from_file_name("noext"), None);
        assert_eq!(ext_from_file_name("doc.pdf"), None);
    }

    #[test]
    fn validate_accepts_images_and_urls() {
        let images = vec![
            file(Some("front.png"), Some("application/octet-stream")),
            file(None, Some("image/jpeg")),
            ImageInput::Url("https://cdn.example.com/a.jpg".into()),
        ];
        assert!(validate_images(&images).is_ok());
    }

    #[test]
    fn validate_rejects_bad_inputs() {
        assert!(validate_images(&[file(Some("notes.txt"), Some("text/plain"))]).is_err());
        assert!(validate_images(&[ImageInput::Url("ftp://x/y.png".into())]).is_err());
        let too_many: Vec<_> = (0..=MAX_IMAGES)
            .map(|i| ImageInput::Url(format!("https://x/{i}.png")))
            .collect();
        assert!(matches!(
            validate_images(&too_many),
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn resolve_uploads_files_and_keeps_order() {
        let state = AppState::fake();
        let user_id = Uuid::new_v4();
        let urls = resolve_images(
            &state,
            user_id,
            vec![
                ImageInput::Url("https://elsewhere/1.jpg".into()),
                file(Some("two.png"), None),
            ],
        )
        .await
        .expect("resolve");
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[0], "https://elsewhere/1.jpg");
        assert!(urls[1].starts_with(&format!("https://media.test/car_management/{user_id}/")));
        assert!(urls[1].ends_with(".png"));
    }

    #[tokio::test]
    async fn resolve_reports_upload_failure() {
        let state = AppState::fake_with_failing_uploads();
        let err = resolve_images(&state, Uuid::new_v4(), vec![file(Some("a.jpg"), None)])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Image upload failed");
    }
}
