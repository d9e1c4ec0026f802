use std::collections::HashMap;

use uuid::Uuid;

use crate::domain::entities::{MediaRecord, PostWithMedia};

use super::service::PostService;
use super::types::{CurrentUser, PostWorkflowError};

impl PostService {
    /// The user's posts, newest first, each with its ordered media.
    pub async fn list(&self, user: &CurrentUser) -> Result<Vec<PostWithMedia>, PostWorkflowError> {
        let posts = self.posts.list_posts(user.id()).await?;
        if posts.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = posts.iter().map(|post| post.id).collect();
        let mut grouped: HashMap<Uuid, Vec<MediaRecord>> = HashMap::new();
        for record in self.media.list_for_posts(&ids).await? {
            grouped.entry(record.post_id).or_default().push(record);
        }

        Ok(posts
            .into_iter()
            .map(|post| {
                let media = grouped.remove(&post.id).unwrap_or_default();
                PostWithMedia::new(post, media)
            })
            .collect())
    }

    pub async fn get(
        &self,
        user: &CurrentUser,
        post_id: Uuid,
    ) -> Result<PostWithMedia, PostWorkflowError> {
        let post = self
            .posts
            .find_post(user.id(), post_id)
            .await?
            .ok_or(PostWorkflowError::NotFound)?;
        let media = self.media.list_for_post(post.id).await?;
        Ok(PostWithMedia::new(post, media))
    }
}
