//! File attachment upload.

use std::path::{Path as FsPath, PathBuf};

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Multipart, Path, State};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use chatis_core::config::UploadConfig;
use chatis_core::error::AppError;
use chatis_core::types::UserId;
use chatis_entity::message::{FileDescriptor, MessageRecord};

use crate::dto::response::ApiResponse;
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::state::AppState;

struct UploadedFile {
    name: String,
    media_type: String,
    data: Bytes,
}

/// POST /api/messages/upload/{receiver_id}
///
/// Multipart `file` plus optional `content`.
///
/// The file is written to the uploads directory, then sent as a message so
/// the receiver gets real-time delivery.
pub async fn upload(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(receiver_id): Path<UserId>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<MessageRecord>>, ApiError> {
    let config = &state.config.uploads;
    let mut content: Option<String> = None;
    let mut file: Option<UploadedFile> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("Multipart error: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "content" => {
                content = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::validation(format!("Read error: {e}")))?,
                );
            }
            "file" => {
                let name = field.file_name().unwrap_or("file").to_string();
                let media_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::validation(format!("Read error: {e}")))?;
                file = Some(UploadedFile {
                    name,
                    media_type,
                    data,
                });
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| AppError::validation("No file uploaded"))?;
    check_upload(config, &file)?;

    let stored_name = stored_file_name(&file.name);
    let path = PathBuf::from(&config.directory).join(&stored_name);
    tokio::fs::create_dir_all(&config.directory)
        .await
        .map_err(AppError::from)?;
    tokio::fs::write(&path, &file.data)
        .await
        .map_err(AppError::from)?;

    let descriptor = FileDescriptor {
        name: file.name,
        media_type: file.media_type,
        size: file.data.len() as i64,
        url: format!("{}/{}", config.public_path.trim_end_matches('/'), stored_name),
    };

    match state
        .realtime
        .router
        .send_message(&auth, None, receiver_id, content, Some(descriptor))
        .await
    {
        Ok(record) => {
            info!(
                message_id = %record.id,
                sender_id = %auth.user_id,
                %receiver_id,
                file = %stored_name,
                "File message sent"
            );
            Ok(Json(ApiResponse::ok(record)))
        }
        Err(e) => {
            if let Err(io) = tokio::fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %io, "Failed to remove orphaned upload");
            }
            Err(e.into())
        }
    }
}

fn check_upload(config: &UploadConfig, file: &UploadedFile) -> Result<(), AppError> {
    if !config.accepts(&file.media_type) || file.data.len() as u64 > config.max_file_size_bytes {
        return Err(AppError::validation(format!(
            "Invalid file type or size exceeds {}MB",
            config.max_file_size_bytes / (1024 * 1024)
        )));
    }
    Ok(())
}

/// `<millis>-<random><ext>`, keeping a short alphanumeric extension of the original name.
fn stored_file_name(original: &str) -> String {
    let suffix = Uuid::new_v4().as_u128() % 1_000_000_000;
    let ext = FsPath::new(original)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 10 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();
    format!("{}-{}{}", Utc::now().timestamp_millis(), suffix, ext)
}
