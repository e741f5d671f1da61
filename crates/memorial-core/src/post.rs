//! This module defines the `Post` struct, in both of its flavours, and the
//! submissions that create one.

use crate::{constant, credential::OwnerCredential, MemorialError, MemorialResult, ResourceType};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use textwrap::core::display_width;
use textwrap::{self, wrap};

/// The part of a post that differs between clips and messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PostContent {
    Clip {
        title: String,
        #[serde(rename = "videoReference")]
        video_reference: String,
    },
    Message {
        body: String,
        /// Picture attached by the author after posting, as a data url.
        #[serde(
            default,
            rename = "imageUrl",
            skip_serializing_if = "Option::is_none"
        )]
        image_url: Option<String>,
    },
}

impl PostContent {
    /// Build clip content from raw input. Both fields are trimmed.
    pub fn clip(title: &str, video_reference: &str) -> MemorialResult<Self> {
        let title = title.trim();
        let video_reference = video_reference.trim();
        verify_title(title)?;
        verify_video_reference(video_reference)?;
        Ok(PostContent::Clip {
            title: title.to_string(),
            video_reference: video_reference.to_string(),
        })
    }

    /// Build message content from raw input. The body is trimmed.
    pub fn message(body: &str) -> MemorialResult<Self> {
        let body = body.trim();
        verify_body(body)?;
        Ok(PostContent::Message {
            body: body.to_string(),
            image_url: None,
        })
    }

    pub fn kind(&self) -> ResourceType {
        match self {
            PostContent::Clip { .. } => ResourceType::Clip,
            PostContent::Message { .. } => ResourceType::Message,
        }
    }
}

/// A post as the store keeps it, owner credential included. Never leaves
/// the server in this form; see [`PublicPost`].
#[derive(Debug, Clone)]
pub struct Post {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub author_display_name: String,
    pub owner_credential: OwnerCredential,
    pub content: PostContent,
}

impl Post {
    pub fn kind(&self) -> ResourceType {
        self.content.kind()
    }

    /// The view of this post that read operations hand out.
    pub fn public(&self) -> PublicPost {
        PublicPost {
            id: self.id.clone(),
            created_at: self.created_at,
            author_display_name: self.author_display_name.clone(),
            content: self.content.clone(),
        }
    }
}

/// A post without its owner credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicPost {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub author_display_name: String,
    #[serde(flatten)]
    pub content: PostContent,
}

impl PublicPost {
    pub fn kind(&self) -> ResourceType {
        self.content.kind()
    }
}

/// Body of `POST /clips`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ClipSubmission {
    pub title: String,
    #[serde(alias = "url")]
    pub video_reference: String,
    #[serde(default, alias = "author", skip_serializing_if = "Option::is_none")]
    pub author_display_name: Option<String>,
}

/// Body of `POST /messages`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MessageSubmission {
    #[serde(default, alias = "name", skip_serializing_if = "Option::is_none")]
    pub author_display_name: Option<String>,
    pub body: String,
}

/// A picture uploaded for a message, as it came off the wire.
#[derive(Debug, Clone, Default)]
pub struct ImageUpload {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Validate the upload and turn it into a `data:` url that is stored
    /// alongside the message.
    pub fn into_data_url(self) -> MemorialResult<String> {
        if self.bytes.is_empty() {
            return Err(MemorialError::invalid_request("Image file is required"));
        }
        let content_type = self.content_type.trim().to_ascii_lowercase();
        if !content_type.starts_with("image/") || content_type.len() == "image/".len() {
            return Err(MemorialError::invalid_request(
                "Only image files can be attached",
            ));
        }
        if self.bytes.len() > constant::MAX_IMAGE_BYTES {
            return Err(MemorialError::InvalidLength {
                field: "image",
                max_size: constant::MAX_IMAGE_BYTES,
                curr_size: self.bytes.len(),
            });
        }
        Ok(format!(
            "data:{content_type};base64,{}",
            STANDARD.encode(&self.bytes)
        ))
    }
}

/// Trim the display name and fall back to the default author when blank.
pub fn normalize_author(name: Option<&str>) -> MemorialResult<String> {
    let name = name.map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Ok(constant::DEFAULT_AUTHOR.to_string());
    }
    verify_length("author name", name, constant::MAX_AUTHOR_LEN)?;
    Ok(name.to_string())
}

/// Some necessary checks for a clip's title.
fn verify_title(title: &str) -> MemorialResult<()> {
    if title.is_empty() {
        return Err(MemorialError::EmptyTitle);
    }
    verify_length("title", title, constant::MAX_TITLE_LEN)
}

fn verify_video_reference(video_reference: &str) -> MemorialResult<()> {
    if video_reference.is_empty() {
        return Err(MemorialError::EmptyVideoReference);
    }
    verify_length("video reference", video_reference, constant::MAX_VIDEO_REF_LEN)
}

/// Some necessary checks for a message's body.
fn verify_body(body: &str) -> MemorialResult<()> {
    if body.is_empty() {
        return Err(MemorialError::EmptyBody);
    }
    verify_length("message", body, constant::MAX_BODY_LEN)
}

fn verify_length(field: &'static str, value: &str, max_size: usize) -> MemorialResult<()> {
    let curr_size = value.chars().count();
    if curr_size > max_size {
        return Err(MemorialError::InvalidLength {
            field,
            max_size,
            curr_size,
        });
    }
    Ok(())
}

impl Display for PublicPost {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let (heading, text) = match &self.content {
            PostContent::Clip {
                title,
                video_reference,
            } => (title.as_str(), video_reference.as_str()),
            PostContent::Message { body, .. } => {
                (self.author_display_name.as_str(), body.as_str())
            }
        };
        write!(f, "{:-<54}\n", "")?;
        write!(f, "\\ {:^50} /\n/ {:50} \\\n", heading, "")?;
        let mut count = 0u8;
        let content_width = 50;
        let wrapping_config = textwrap::Options::new(content_width).break_words(true);
        let stamp = self.created_at.format("%Y-%m-%d %H:%M UTC");
        let footer = match self.content {
            PostContent::Clip { .. } => format!("by {} · {stamp}", self.author_display_name),
            PostContent::Message {
                image_url: Some(_),
                ..
            } => format!("{stamp} · image attached"),
            PostContent::Message { .. } => stamp.to_string(),
        };
        for line in wrap(&format!("{text}\n\n{footer}"), wrapping_config) {
            let (left_closure, right_closure) = if count % 2 == 0 {
                ("\\ ", " /")
            } else {
                ("/ ", " \\")
            };
            let text_width = display_width(&line);
            let whitespace = content_width.saturating_sub(text_width);
            write!(
                f,
                "{left_closure}{}{}{right_closure}\n",
                line,
                " ".repeat(whitespace)
            )?;
            count = count.wrapping_add(1);
        }
        write!(f, "{:-<54}", "")
    }
}
