use std::sync::Arc;

use crate::application::repos::{MediaRepo, PostsRepo};
use crate::application::storage::ObjectStorage;

use super::submission::SubmissionGate;

#[derive(Clone)]
pub struct PostService {
    pub(crate) posts: Arc<dyn PostsRepo>,
    pub(crate) media: Arc<dyn MediaRepo>,
    pub(crate) storage: Arc<dyn ObjectStorage>,
    pub(crate) submissions: SubmissionGate,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        media: Arc<dyn MediaRepo>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        Self {
            posts,
            media,
            storage,
            submissions: SubmissionGate::new(),
        }
    }

    pub fn submissions(&self) -> &SubmissionGate {
        &self.submissions
    }
}
