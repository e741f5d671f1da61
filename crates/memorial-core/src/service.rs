//! Creation, listing, editing and deletion of posts on top of a
//! [`ResourceStore`].
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    auth::{authorize_delete, authorize_owner, DeleteCredentials},
    credential::{AdminCredential, OwnerCredential},
    post::{
        normalize_author, ClipSubmission, ImageUpload, MessageSubmission, Post, PostContent,
        PublicPost,
    },
    store::ResourceStore,
    MemorialResult, ResourceType,
};

/// What a successful create hands back. This is the only place the owner
/// credential is ever returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedPost {
    pub item: PublicPost,
    pub owner_credential: OwnerCredential,
}

/// Hands out ids from the creation time in milliseconds, bumped when two
/// posts land in the same millisecond so ids stay unique and increasing.
/// Seeded from the store so a restart with a slow clock never reuses an id.
#[derive(Debug, Default)]
struct IdGenerator {
    last: i64,
}

impl IdGenerator {
    fn starting_after(last: i64) -> Self {
        Self { last }
    }

    fn next(&mut self, now: DateTime<Utc>) -> String {
        let id = now.timestamp_millis().max(self.last + 1);
        self.last = id;
        id.to_string()
    }
}

pub struct PostService {
    store: Box<dyn ResourceStore>,
    admin: Option<AdminCredential>,
    ids: IdGenerator,
}

impl PostService {
    pub fn new(store: Box<dyn ResourceStore>, admin: Option<AdminCredential>) -> Self {
        let last = store.max_id().unwrap_or_else(|e| {
            tracing::warn!("Unable to read the newest id, starting from the clock: {e}");
            0
        });
        Self {
            store,
            admin,
            ids: IdGenerator::starting_after(last),
        }
    }

    /// Validate and store a new clip.
    pub fn create_clip(&mut self, submission: ClipSubmission) -> MemorialResult<CreatedPost> {
        let content = PostContent::clip(&submission.title, &submission.video_reference)?;
        let author = normalize_author(submission.author_display_name.as_deref())?;
        self.create(author, content)
    }

    /// Validate and store a new message.
    pub fn create_message(&mut self, submission: MessageSubmission) -> MemorialResult<CreatedPost> {
        let content = PostContent::message(&submission.body)?;
        let author = normalize_author(submission.author_display_name.as_deref())?;
        self.create(author, content)
    }

    pub fn list(&self, kind: ResourceType) -> MemorialResult<Vec<PublicPost>> {
        self.store.list(kind)
    }

    pub fn get(&self, kind: ResourceType, id: &str) -> MemorialResult<PublicPost> {
        Ok(self.store.find_by_id(kind, id)?.public())
    }

    /// Remove a post once `credentials` are found to allow it.
    pub fn delete(
        &mut self,
        kind: ResourceType,
        id: &str,
        credentials: &DeleteCredentials,
    ) -> MemorialResult<()> {
        authorize_delete(
            self.store.as_ref(),
            kind,
            id,
            credentials,
            self.admin.as_ref(),
        )?;
        self.store.remove(kind, id)?;
        tracing::info!("deleted {kind} {id}");
        Ok(())
    }

    /// Attach a picture to a message. Only the message's owner credential
    /// opens it; a newer picture replaces the old one.
    pub fn attach_image(
        &mut self,
        id: &str,
        owner: &str,
        upload: ImageUpload,
    ) -> MemorialResult<PublicPost> {
        let kind = ResourceType::Message;
        authorize_owner(self.store.as_ref(), kind, id, Some(owner))?;
        let image_url = upload.into_data_url()?;
        self.store.attach_image(id, image_url)?;
        tracing::info!("attached image to {kind} {id}");
        self.get(kind, id)
    }

    fn create(&mut self, author: String, content: PostContent) -> MemorialResult<CreatedPost> {
        let created_at = Utc::now();
        let post = Post {
            id: self.ids.next(created_at),
            created_at,
            author_display_name: author,
            owner_credential: OwnerCredential::generate(),
            content,
        };
        let created = CreatedPost {
            item: post.public(),
            owner_credential: post.owner_credential.clone(),
        };
        self.store.append(post)?;
        tracing::info!("created {} {}", created.item.kind(), created.item.id);
        Ok(created)
    }
}
