//! Audio object storage.

use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use crate::client::BackendClient;
use crate::error::BackendResult;
use crate::store::AudioStore;

/// Content types accepted for uploads and the file extension stored for each.
const AUDIO_TYPES: &[(&str, &str)] = &[
    ("audio/webm", "webm"),
    ("audio/ogg", "ogg"),
    ("audio/mp4", "m4a"),
    ("audio/aac", "aac"),
    ("audio/mpeg", "mp3"),
    ("audio/wav", "wav"),
    ("audio/x-wav", "wav"),
];

/// File extension for an audio content type, ignoring parameters such as
/// `;codecs=opus`. `None` if the type is not an accepted audio format.
pub fn audio_extension(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    AUDIO_TYPES
        .iter()
        .find(|(mime, _)| *mime == essence)
        .map(|(_, ext)| *ext)
}

/// Object path for a new recording: `{owner}/{uuid}.{ext}`.
pub fn recording_path(owner: &str, extension: &str) -> String {
    format!("{}/{}.{}", owner, Uuid::new_v4(), extension)
}

/// Storage bucket holding uploaded recordings.
#[derive(Debug, Clone)]
pub struct AudioStorage {
    client: BackendClient,
    bucket: String,
}

impl AudioStorage {
    pub fn new(client: BackendClient) -> Self {
        let bucket = client.config().audio_bucket.clone();
        Self { client, bucket }
    }
}

#[async_trait]
impl AudioStore for AudioStorage {
    async fn upload_audio(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> BackendResult<String> {
        debug!(bucket = %self.bucket, path, size = bytes.len(), "Uploading audio");

        let url = self.client.object_url(&self.bucket, path);
        self.client
            .post_bytes("upload_audio", &url, &bytes, content_type)
            .await?;

        info!(bucket = %self.bucket, path, "Uploaded audio");
        Ok(self.public_url(path))
    }

    fn public_url(&self, path: &str) -> String {
        self.client.public_object_url(&self.bucket, path)
    }
}
