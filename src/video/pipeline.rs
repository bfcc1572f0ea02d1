use std::path::Path;

use futures::future::try_join_all;

use crate::db::models::{Quality, VideoVariant};
use crate::error::AppError;
use crate::storage::client::{delete_all, StorageClient};
use crate::video::transcoder::Transcoder;

/// Storage locations produced by a successful pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeOutput {
    pub variants: Vec<VideoVariant>,
    pub thumbnail_key: Option<String>,
}

pub fn variant_key(video_id: &str, quality: Quality) -> String {
    format!("videos/{}/{}.mp4", video_id, quality.as_str())
}

pub fn thumbnail_key(video_id: &str) -> String {
    format!("videos/{}/thumbnail.jpg", video_id)
}

/// Encode an uploaded video into every [`Quality`], extract a thumbnail and
/// upload all outputs under `videos/{video_id}/`.
///
/// Work happens in a private temporary directory that is removed whether or
/// not the run succeeds. If any rendition fails, already uploaded objects are
/// deleted and the error is returned.
pub async fn process_video(
    transcoder: &dyn Transcoder,
    storage: &dyn StorageClient,
    video_id: &str,
    source: Vec<u8>,
) -> Result<TranscodeOutput, AppError> {
    let workdir = tempfile::Builder::new()
        .prefix("safety-hub-video-")
        .tempdir()
        .map_err(|e| AppError::Internal(format!("Failed to create work directory: {e}")))?;

    let result = run(transcoder, storage, video_id, source, workdir.path()).await;

    if let Err(e) = workdir.close() {
        tracing::warn!(%video_id, "Failed to remove transcode work directory: {e}");
    }

    match &result {
        Ok(out) => tracing::info!(%video_id, variants = out.variants.len(), "Video processed"),
        Err(e) => tracing::error!(%video_id, "Video processing failed: {e}"),
    }
    result
}

async fn run(
    transcoder: &dyn Transcoder,
    storage: &dyn StorageClient,
    video_id: &str,
    source: Vec<u8>,
    workdir: &Path,
) -> Result<TranscodeOutput, AppError> {
    let input = workdir.join("source");
    tokio::fs::write(&input, source)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to write upload to disk: {e}")))?;

    // Encode all renditions concurrently.
    let encodes = Quality::ALL.iter().map(|&quality| {
        let output = workdir.join(format!("{}.mp4", quality.as_str()));
        let input = input.as_path();
        async move {
            transcoder.transcode(input, &output, quality).await?;
            Ok::<_, AppError>((quality, output))
        }
    });
    let encoded = try_join_all(encodes).await?;

    let thumb_path = workdir.join("thumbnail.jpg");
    let has_thumbnail = match transcoder.thumbnail(&input, &thumb_path).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(%video_id, "Thumbnail extraction failed, continuing without: {e}");
            false
        }
    };

    let mut uploads: Vec<(String, std::path::PathBuf, &'static str)> = encoded
        .into_iter()
        .map(|(quality, path)| (variant_key(video_id, quality), path, "video/mp4"))
        .collect();
    if has_thumbnail {
        uploads.push((thumbnail_key(video_id), thumb_path, "image/jpeg"));
    }

    let results = futures::future::join_all(uploads.iter().map(|(key, path, content_type)| {
        async move {
            let bytes = tokio::fs::read(path).await.map_err(|e| {
                AppError::Internal(format!("Failed to read '{}': {e}", path.display()))
            })?;
            storage.put_object(key, bytes, content_type).await
        }
    }))
    .await;

    if let Some(err) = results.iter().position(Result::is_err) {
        let uploaded: Vec<String> = uploads
            .iter()
            .zip(&results)
            .filter(|(_, r)| r.is_ok())
            .map(|((key, _, _), _)| key.clone())
            .collect();
        delete_all(storage, &uploaded).await;

        return Err(results
            .into_iter()
            .nth(err)
            .and_then(Result::err)
            .unwrap_or_else(|| AppError::Storage("Upload failed".into())));
    }

    Ok(TranscodeOutput {
        variants: Quality::ALL
            .iter()
            .map(|&quality| VideoVariant {
                quality,
                key: variant_key(video_id, quality),
            })
            .collect(),
        thumbnail_key: has_thumbnail.then(|| thumbnail_key(video_id)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeTranscoder, MemoryStorage};

    #[tokio::test]
    async fn test_pipeline_uploads_all_outputs() {
        let transcoder = FakeTranscoder::default();
        let storage = MemoryStorage::default();

        let out = process_video(&transcoder, &storage, "vid-1", b"raw-video".to_vec())
            .await
            .unwrap();

        assert_eq!(out.variants.len(), 3);
        assert_eq!(out.variants[0].key, "videos/vid-1/high.mp4");
        assert_eq!(out.thumbnail_key.as_deref(), Some("videos/vid-1/thumbnail.jpg"));

        for quality in Quality::ALL {
            let stored = storage.object(&variant_key("vid-1", quality)).unwrap();
            assert_eq!(stored, format!("encoded:{}", quality.as_str()).into_bytes());
        }
        assert_eq!(storage.content_type("videos/vid-1/thumbnail.jpg").as_deref(), Some("image/jpeg"));

        let mut qualities = transcoder.calls();
        qualities.sort_by_key(|q| q.height());
        assert_eq!(qualities, vec![Quality::Low, Quality::Medium, Quality::High]);
    }

    #[tokio::test]
    async fn test_pipeline_removes_workdir_on_success() {
        let transcoder = FakeTranscoder::default();
        let storage = MemoryStorage::default();

        process_video(&transcoder, &storage, "vid-2", b"raw".to_vec())
            .await
            .unwrap();

        let workdir = transcoder.last_workdir().unwrap();
        assert!(!workdir.exists(), "work directory should be removed");
    }

    #[tokio::test]
    async fn test_pipeline_failure_cleans_up() {
        let transcoder = FakeTranscoder::failing_on(Quality::Low);
        let storage = MemoryStorage::default();

        let result = process_video(&transcoder, &storage, "vid-3", b"raw".to_vec()).await;
        assert!(matches!(result, Err(AppError::Transcode(_))));

        assert!(storage.keys().is_empty(), "nothing should be uploaded");
        assert!(!transcoder.last_workdir().unwrap().exists());
    }

    #[tokio::test]
    async fn test_upload_failure_rolls_back_uploaded_objects() {
        let transcoder = FakeTranscoder::default();
        let storage = MemoryStorage::failing_on("videos/vid-4/medium.mp4");

        let result = process_video(&transcoder, &storage, "vid-4", b"raw".to_vec()).await;
        assert!(matches!(result, Err(AppError::Storage(_))));
        assert!(storage.keys().is_empty(), "partial uploads should be deleted");
    }

    #[tokio::test]
    async fn test_thumbnail_failure_is_not_fatal() {
        let transcoder = FakeTranscoder::without_thumbnail();
        let storage = MemoryStorage::default();

        let out = process_video(&transcoder, &storage, "vid-5", b"raw".to_vec())
            .await
            .unwrap();
        assert!(out.thumbnail_key.is_none());
        assert_eq!(storage.keys().len(), 3);
    }
}
