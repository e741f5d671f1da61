use std::{
    collections::{HashMap, VecDeque},
    num::NonZeroUsize,
};

use crate::{
    post::{Post, PostContent, PublicPost},
    MemorialError, MemorialResult, ResourceType,
};

/// Ordered storage of posts, one collection per resource type, newest
/// first. The board task is the only owner of a store, so methods take
/// `&mut self` and implementations need no locking of their own.
pub trait ResourceStore: Send {
    /// Insert `post` at the head of its collection.
    fn append(&mut self, post: Post) -> MemorialResult<()>;

    /// All posts of a kind, newest first, without owner credentials.
    fn list(&self, kind: ResourceType) -> MemorialResult<Vec<PublicPost>>;

    /// # Errors
    ///
    /// Returns `NotFound` when no post with `id` exists in the collection.
    fn find_by_id(&self, kind: ResourceType, id: &str) -> MemorialResult<Post>;

    /// Delete exactly one post.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no post with `id` exists in the collection.
    fn remove(&mut self, kind: ResourceType, id: &str) -> MemorialResult<()>;

    /// Set the picture of a message, replacing any earlier one.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no message with `id` exists.
    fn attach_image(&mut self, id: &str, image_url: String) -> MemorialResult<()>;

    /// Highest numeric id across all collections, 0 for an empty store.
    fn max_id(&self) -> MemorialResult<i64> {
        let mut max = 0;
        for kind in ResourceType::ALL {
            for post in self.list(kind)? {
                max = max.max(post.id.parse::<i64>().unwrap_or(0));
            }
        }
        Ok(max)
    }
}

/// Keeps every collection in a `VecDeque` with the newest post at the front.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: HashMap<ResourceType, VecDeque<Post>>,
    retention: Option<NonZeroUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `retention` posts per collection; the oldest go first.
    pub fn with_retention(retention: Option<NonZeroUsize>) -> Self {
        Self {
            collections: HashMap::new(),
            retention,
        }
    }

    /// Number of posts in a collection.
    pub fn size(&self, kind: ResourceType) -> usize {
        self.collections.get(&kind).map_or(0, VecDeque::len)
    }

    /// Returns the index of the post with the given ID.
    fn post_id_to_idx(&self, kind: ResourceType, id: &str) -> MemorialResult<usize> {
        self.collections
            .get(&kind)
            .and_then(|posts| posts.iter().position(|post| post.id == id))
            .ok_or_else(|| MemorialError::not_found(kind, id))
    }
}

impl ResourceStore for MemoryStore {
    fn append(&mut self, post: Post) -> MemorialResult<()> {
        let posts = self.collections.entry(post.kind()).or_default();
        posts.push_front(post);
        if let Some(cap) = self.retention {
            posts.truncate(cap.get());
        }
        Ok(())
    }

    fn list(&self, kind: ResourceType) -> MemorialResult<Vec<PublicPost>> {
        Ok(self
            .collections
            .get(&kind)
            .map(|posts| posts.iter().map(Post::public).collect())
            .unwrap_or_default())
    }

    fn find_by_id(&self, kind: ResourceType, id: &str) -> MemorialResult<Post> {
        let idx = self.post_id_to_idx(kind, id)?;
        self.collections
            .get(&kind)
            .and_then(|posts| posts.get(idx))
            .cloned()
            .ok_or_else(|| MemorialError::not_found(kind, id))
    }

    fn remove(&mut self, kind: ResourceType, id: &str) -> MemorialResult<()> {
        let idx = self.post_id_to_idx(kind, id)?;
        if let Some(posts) = self.collections.get_mut(&kind) {
            posts.remove(idx);
        }
        Ok(())
    }

    fn attach_image(&mut self, id: &str, image_url: String) -> MemorialResult<()> {
        let kind = ResourceType::Message;
        let idx = self.post_id_to_idx(kind, id)?;
        match self
            .collections
            .get_mut(&kind)
            .and_then(|posts| posts.get_mut(idx))
            .map(|post| &mut post.content)
        {
            Some(PostContent::Message { image_url: slot, .. }) => {
                *slot = Some(image_url);
                Ok(())
            }
            _ => Err(MemorialError::not_found(kind, id)),
        }
    }
}
