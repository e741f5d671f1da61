//! Merging clips and messages into one reverse-chronological feed.
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::{post::PublicPost, ResourceType};

/// A post tagged with the collection it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    #[serde(rename = "type")]
    pub kind: ResourceType,
    #[serde(flatten)]
    pub post: PublicPost,
}

/// Tag every post with its origin and sort the lot newest first. The sort is
/// stable, so posts sharing a timestamp keep their input order, clips first.
pub fn compose_feed(clips: Vec<PublicPost>, messages: Vec<PublicPost>) -> Vec<FeedItem> {
    let mut feed: Vec<FeedItem> = clips
        .into_iter()
        .map(|post| FeedItem {
            kind: ResourceType::Clip,
            post,
        })
        .chain(messages.into_iter().map(|post| FeedItem {
            kind: ResourceType::Message,
            post,
        }))
        .collect();
    feed.sort_by(|a, b| b.post.created_at.cmp(&a.post.created_at));
    feed
}

impl Display for FeedItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} {}]\n{}", self.kind, self.post.id, self.post)
    }
}
