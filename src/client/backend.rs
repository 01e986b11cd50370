use async_trait::async_trait;
use serde::Deserialize;

use crate::chat::{MarkRead, MarkedRead, Message, NewMessage, UnreadCounts};

/// The message endpoints of the REST API, as seen from a client.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn create(&self, message: &NewMessage) -> anyhow::Result<Message>;
    async fn list_by_counterpart(&self, user_id: &str, counterpart_id: &str) -> anyhow::Result<Vec<Message>>;
    async fn mark_read_by_sender(&self, reader_id: &str, sender_id: &str) -> anyhow::Result<u64>;
    async fn unread_counts_by_sender(&self, user_id: &str) -> anyhow::Result<UnreadCounts>;
}

/// Hosts an image and hands back its public URL.
#[async_trait]
pub trait MediaUploader: Send + Sync {
    async fn upload(&self, bytes: Vec<u8>, content_type: &str) -> anyhow::Result<String>;
}

pub struct HttpChatBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpChatBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpChatBackend {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn create(&self, message: &NewMessage) -> anyhow::Result<Message> {
        Ok(
            self.client.post(format!("{}/chat/messages", self.base_url))
                .json(message)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?
        )
    }

    async fn list_by_counterpart(&self, user_id: &str, counterpart_id: &str) -> anyhow::Result<Vec<Message>> {
        Ok(
            self.client.get(format!("{}/chat/messages/{user_id}/{counterpart_id}", self.base_url))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?
        )
    }

    async fn mark_read_by_sender(&self, reader_id: &str, sender_id: &str) -> anyhow::Result<u64> {
        let MarkedRead { updated } = self.client.post(format!("{}/chat/read", self.base_url))
            .json(&MarkRead { reader_id: reader_id.to_owned(), sender_id: sender_id.to_owned() })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(updated)
    }

    async fn unread_counts_by_sender(&self, user_id: &str) -> anyhow::Result<UnreadCounts> {
        Ok(
            self.client.get(format!("{}/chat/unread/{user_id}", self.base_url))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?
        )
    }
}

#[derive(Deserialize)]
struct Uploaded {
    #[serde(alias = "secure_url")]
    url: String,
}

/// Uploads raw bytes to an image host that answers with `{"url": ...}`.
pub struct HttpMediaUploader {
    client: reqwest::Client,
    upload_url: String,
}

impl HttpMediaUploader {
    pub fn new(upload_url: impl Into<String>) -> Self {
        HttpMediaUploader {
            client: reqwest::Client::new(),
            upload_url: upload_url.into(),
        }
    }
}

#[async_trait]
impl MediaUploader for HttpMediaUploader {
    async fn upload(&self, bytes: Vec<u8>, content_type: &str) -> anyhow::Result<String> {
        let Uploaded { url } = self.client.post(&self.upload_url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(url)
    }
}
