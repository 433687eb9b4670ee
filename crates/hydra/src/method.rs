//! Local method interface of the server.
//!
//! Methods come in two shapes: typed ([`LocalMethod`]) for Rust callers, and
//! a method name plus string frames for callers that speak the textual form,
//! parsed by [`LocalMethod::parse`].

use std::path::PathBuf;

use bytes::Bytes;
use tokio::sync::mpsc;

use hydra_core::{Post, PostId, DEFAULT_MIME_TYPE};

use crate::error::{HydraError, Result};

/// Content of a post being created through the method interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentArg {
    /// Inline text.
    String(String),
    /// Path of a file whose bytes are the content.
    File(PathBuf),
    /// Inline binary frame.
    Frame(Bytes),
}

/// Arguments of the POST method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRequest {
    /// Subject line.
    pub subject: String,
    /// Post being replied to.
    pub parent_id: Option<PostId>,
    /// Content mime type.
    pub mime_type: String,
    /// The content.
    pub content: ContentArg,
}

impl PostRequest {
    /// A text post with the default mime type.
    pub fn text(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            parent_id: None,
            mime_type: DEFAULT_MIME_TYPE.to_string(),
            content: ContentArg::String(body.into()),
        }
    }

    /// A post of arbitrary content.
    pub fn new(
        subject: impl Into<String>,
        mime_type: impl Into<String>,
        content: ContentArg,
    ) -> Self {
        Self {
            subject: subject.into(),
            parent_id: None,
            mime_type: mime_type.into(),
            content,
        }
    }

    /// Sets the parent post.
    pub fn with_parent(mut self, parent: PostId) -> Self {
        self.parent_id = Some(parent);
        self
    }

    /// Build the post. File content is read and hashed here.
    pub fn build(self) -> Result<Post> {
        let builder = Post::builder(self.subject)
            .parent_opt(self.parent_id)
            .mime_type(self.mime_type);
        let builder = match self.content {
            ContentArg::String(text) => builder.text(text),
            ContentArg::File(path) => builder.file(path),
            ContentArg::Frame(data) => builder.data(data),
        };
        Ok(builder.build()?)
    }
}

/// A local method call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalMethod {
    /// Get a handle to the ingestion channel.
    Sink,
    /// Create a post and append it to the ledger.
    Post(PostRequest),
}

impl LocalMethod {
    /// Parse a method from its name and argument frames.
    ///
    /// POST takes five frames: subject, parent id (hex, empty for none),
    /// mime type, content kind (`string`, `file` or `frame`) and content.
    pub fn parse(name: &str, frames: Vec<Bytes>) -> Result<Self> {
        match name {
            "SINK" => Ok(LocalMethod::Sink),
            "POST" => {
                let mut frames = frames.into_iter();
                let subject = next_string(&mut frames, "subject")?;
                let parent_id = next_string(&mut frames, "parent_id")?;
                let mime_type = next_string(&mut frames, "mime_type")?;
                let kind = next_string(&mut frames, "content kind")?;
                let content = frames
                    .next()
                    .ok_or(HydraError::MissingArgument("content"))?;

                let parent_id = if parent_id.is_empty() {
                    None
                } else {
                    Some(PostId::from_hex(&parent_id).map_err(|e| {
                        HydraError::InvalidArgument(format!("parent_id '{}': {}", parent_id, e))
                    })?)
                };
                let content = match kind.as_str() {
                    "string" => ContentArg::String(utf8(content, "content")?),
                    "file" => ContentArg::File(PathBuf::from(utf8(content, "content")?)),
                    "frame" => ContentArg::Frame(content),
                    _ => return Err(HydraError::UnknownContentKind(kind)),
                };

                Ok(LocalMethod::Post(PostRequest {
                    subject,
                    parent_id,
                    mime_type,
                    content,
                }))
            }
            other => Err(HydraError::UnknownMethod(other.to_string())),
        }
    }
}

fn next_string(frames: &mut impl Iterator<Item = Bytes>, name: &'static str) -> Result<String> {
    let frame = frames.next().ok_or(HydraError::MissingArgument(name))?;
    utf8(frame, name)
}

fn utf8(frame: Bytes, name: &str) -> Result<String> {
    String::from_utf8(frame.to_vec())
        .map_err(|_| HydraError::InvalidArgument(format!("{} is not UTF-8", name)))
}

/// Reply to a local method call.
#[derive(Debug, Clone)]
pub enum MethodReply {
    /// Handle to the ingestion channel.
    Sink(PostSink),
    /// Identity of the new post.
    Posted(PostId),
}

/// Ingestion channel handle.
///
/// Posts sent here are moved into the server and appended to its ledger.
/// Store failures are logged by the server, not reported back.
#[derive(Debug, Clone)]
pub struct PostSink {
    sender: mpsc::Sender<Post>,
}

impl PostSink {
    pub(crate) fn new(sender: mpsc::Sender<Post>) -> Self {
        Self { sender }
    }

    /// Hand a post to the server.
    pub async fn send(&self, post: Post) -> Result<()> {
        self.sender.send(post).await.map_err(|_| HydraError::Stopped)
    }

    /// Check if the server behind the sink has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
