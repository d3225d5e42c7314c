use serde::{Deserialize, Serialize};

use crate::client::SessionClient;
use crate::dispatch::PendingRequest;
use crate::error::Error;
use crate::types::MessageResponse;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Photo {
    pub id: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub media_metadata: Option<MediaMetadata>,
    #[serde(default)]
    pub scores: Option<PhotoScores>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaMetadata {
    #[serde(default)]
    pub creation_time: Option<String>,
    #[serde(default)]
    pub width: Option<String>,
    #[serde(default)]
    pub height: Option<String>,
}

/// Ranking scores attached by the ranking service, all in `0.0..=1.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoScores {
    pub technical: f64,
    pub aesthetic: f64,
    pub semantic: f64,
    pub novelty: f64,
    pub trendy_vibe: f64,
    pub metadata: f64,
    pub activity: f64,
    pub achievement: f64,
    pub talent: f64,
    pub overall: f64,
}

/// One entry of the latest completed ranking session, best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct TopPick {
    pub google_media_id: String,
    #[serde(default)]
    pub base_url: Option<String>,
    pub combined_score: f64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct PhotosEnvelope<T> {
    #[serde(default)]
    photos: Option<Vec<T>>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
struct ConnectionStatus {
    #[serde(default)]
    connected: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RankRequest<'a> {
    photo_ids: &'a [String],
}

/// Photo library endpoints, all routed through the refresh coordinator.
#[derive(Debug, Clone, Copy)]
pub struct PhotosApi<'a> {
    client: &'a SessionClient,
}

impl<'a> PhotosApi<'a> {
    pub(crate) fn new(client: &'a SessionClient) -> Self {
        Self { client }
    }

    /// `GET /api/photos`. A reply without a `photos` field reads as empty.
    ///
    /// # Errors
    ///
    /// See [`SessionClient::send_json`].
    pub async fn list(&self) -> Result<Vec<Photo>, Error> {
        let envelope: PhotosEnvelope<Photo> = self
            .client
            .send_json(&PendingRequest::get("/api/photos"), "list photos")
            .await?;
        Ok(envelope.photos.unwrap_or_else(|| {
            tracing::error!("Photo list reply has no photos field");
            Vec::new()
        }))
    }

    /// `GET /api/photos/connection-status`. Any failure reads as disconnected.
    pub async fn connection_status(&self) -> bool {
        match self
            .client
            .send_json::<ConnectionStatus>(
                &PendingRequest::get("/api/photos/connection-status"),
                "connection status",
            )
            .await
        {
            Ok(status) => status.connected,
            Err(e) => {
                tracing::warn!(error = %e, "Photo library connection check failed");
                false
            }
        }
    }

    /// `POST /api/photos/disconnect`.
    ///
    /// # Errors
    ///
    /// See [`SessionClient::send_json`].
    pub async fn disconnect(&self) -> Result<(), Error> {
        self.client
            .send_unit(&PendingRequest::post("/api/photos/disconnect"), "disconnect")
            .await
    }

    /// `GET /api/photos/top-picks`. Empty until a ranking session has completed.
    ///
    /// # Errors
    ///
    /// See [`SessionClient::send_json`].
    pub async fn top_picks(&self) -> Result<Vec<TopPick>, Error> {
        let envelope: PhotosEnvelope<TopPick> = self
            .client
            .send_json(&PendingRequest::get("/api/photos/top-picks"), "top picks")
            .await?;
        Ok(envelope.photos.unwrap_or_default())
    }

    /// `POST /api/photos/rank {photoIds}`. Starts a ranking session; the
    /// results are read back through [`PhotosApi::top_picks`].
    ///
    /// Returns the server's acknowledgement message, if any.
    ///
    /// # Errors
    ///
    /// See [`SessionClient::send_json`]. A failed ranking run carries the
    /// server's `error` text.
    pub async fn rank(&self, photo_ids: &[String]) -> Result<Option<String>, Error> {
        let request = PendingRequest::post("/api/photos/rank")
            .with_json(&RankRequest { photo_ids })?;
        let ack: MessageResponse = self.client.send_json(&request, "rank photos").await?;
        Ok(ack.message)
    }
}
