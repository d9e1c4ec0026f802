use std::sync::Arc;

use crate::application::api_keys::ApiKeyService;
use crate::application::posts::PostService;

#[derive(Clone)]
pub struct ApiState {
    pub api_keys: Arc<ApiKeyService>,
    pub posts: Arc<PostService>,
}
