use std::path::PathBuf;

use log::{debug, info};
use reqwest::blocking::multipart::{Form, Part};
use serde::Deserialize;

use im_core::error::{Error, Result};

use crate::config::{DiscordTarget, NotifyTarget};
use crate::job::JobOutput;

/// Publishes job files and returns their public URLs
pub trait AssetSink: Send {
    fn deliver(&self, message: &str, files: &[PathBuf]) -> Result<Vec<String>>;
}

/// Receives the final job record
pub trait StatusSink: Send {
    fn notify(&self, output: &JobOutput) -> Result<()>;
}

/// Sinks a single job reports to
pub struct JobSinks {
    pub assets: Box<dyn AssetSink>,
    pub status: Option<Box<dyn StatusSink>>,
}

impl JobSinks {
    /// Discord delivery plus the HTTP status hook, when one is configured
    pub fn http(api: &str, discord: &DiscordTarget, notify: &NotifyTarget) -> Self {
        let status = notify.uri.as_ref().map(|uri| {
            Box::new(HttpStatusSink::new(uri.clone(), notify.token.clone())) as Box<dyn StatusSink>
        });

        Self {
            assets: Box::new(DiscordSink::new(api, discord.clone())),
            status,
        }
    }
}

#[derive(Deserialize)]
struct MessageResponse {
    attachments: Vec<Attachment>,
}

#[derive(Deserialize)]
struct Attachment {
    url: String,
}

/// Uploads files as attachments of a Discord channel message
pub struct DiscordSink {
    api: String,
    target: DiscordTarget,
    client: reqwest::blocking::Client,
}

impl DiscordSink {
    pub fn new(api: &str, target: DiscordTarget) -> Self {
        Self {
            api: api.trim_end_matches('/').to_string(),
            target,
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl AssetSink for DiscordSink {
    fn deliver(&self, message: &str, files: &[PathBuf]) -> Result<Vec<String>> {
        let (Some(channel), Some(token)) = (&self.target.channel, &self.target.token) else {
            return Err(Error::Delivery("no discord channel or token configured".to_string()));
        };

        let content = match &self.target.user_id {
            Some(id) => format!("{message} <@{id}>"),
            None => message.to_string(),
        };

        let mut form = Form::new().text("content", content);
        for (i, path) in files.iter().enumerate() {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("attachment")
                .to_string();
            let bytes = std::fs::read(path)
                .map_err(|e| Error::Delivery(format!("failed to read {}: {e}", path.display())))?;
            form = form.part(format!("files[{i}]"), Part::bytes(bytes).file_name(name));
        }

        let url = format!("{}/channels/{channel}/messages", self.api);
        debug!("Uploading {} file(s) to {url}", files.len());

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bot {token}"))
            .multipart(form)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Delivery(format!("upload to {url} failed: {e}")))?;

        let message: MessageResponse = response
            .json()
            .map_err(|e| Error::Delivery(format!("invalid upload response: {e}")))?;

        let urls: Vec<String> = message.attachments.into_iter().map(|a| a.url).collect();
        info!("Delivered {} attachment(s)", urls.len());
        Ok(urls)
    }
}

/// POSTs the job record as JSON
pub struct HttpStatusSink {
    uri: String,
    token: Option<String>,
    client: reqwest::blocking::Client,
}

impl HttpStatusSink {
    pub fn new(uri: String, token: Option<String>) -> Self {
        Self {
            uri,
            token,
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl StatusSink for HttpStatusSink {
    fn notify(&self, output: &JobOutput) -> Result<()> {
        let mut request = self.client.post(&self.uri).json(output);
        if let Some(token) = &self.token {
            request = request.header("Authorization", token);
        }

        request
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Notify(format!("{}: {e}", self.uri)))?;
        Ok(())
    }
}
