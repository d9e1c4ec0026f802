//! Postgres repository behaviour. Needs `DATABASE_URL` pointing at a server
//! where test databases can be created.

use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use memoria::application::repos::{
    ApiKeysRepo, CreateApiKeyParams, CreateMediaParams, CreatePostParams, HealthRepo, MediaRepo,
    PostsRepo, RepoError, UpdateMediaParams,
};
use memoria::domain::api_keys::{ApiKeyStatus, ApiScope};
use memoria::infra::db::PostgresRepositories;

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn posts_and_media_round_trip_in_position_order(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let owner = Uuid::new_v4();

    let post = repos
        .create_post(CreatePostParams {
            owner_id: owner,
            title: "Trip".into(),
        })
        .await
        .expect("post");

    for (position, note) in [(1, "second"), (0, "first")] {
        repos
            .insert_media(CreateMediaParams {
                post_id: post.id,
                url: format!("http://localhost/storage/memoria/{position}.jpg"),
                note: note.into(),
                position,
            })
            .await
            .expect("media");
    }

    let media = repos.list_for_post(post.id).await.expect("list");
    let notes: Vec<&str> = media.iter().map(|m| m.note.as_str()).collect();
    assert_eq!(notes, ["first", "second"]);

    let updated = repos
        .update_media(UpdateMediaParams {
            id: media[1].id,
            note: "second, edited".into(),
            position: 1,
        })
        .await
        .expect("update");
    assert_eq!(updated.note, "second, edited");

    let removed = repos
        .delete_media(post.id, &[media[0].id])
        .await
        .expect("delete media");
    assert_eq!(removed, 1);

    repos.delete_post(owner, post.id).await.expect("delete post");
    assert!(repos.list_for_post(post.id).await.expect("list").is_empty());
    repos.health_check().await.expect("healthy");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn posts_are_invisible_to_other_owners(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let owner = Uuid::new_v4();
    let stranger = Uuid::new_v4();

    let post = repos
        .create_post(CreatePostParams {
            owner_id: owner,
            title: "Mine".into(),
        })
        .await
        .expect("post");

    assert!(repos.find_post(stranger, post.id).await.expect("find").is_none());
    assert!(repos.list_posts(stranger).await.expect("list").is_empty());
    assert!(matches!(
        repos.delete_post(stranger, post.id).await,
        Err(RepoError::NotFound)
    ));
    assert!(matches!(
        repos.update_title(stranger, post.id, "Theirs").await,
        Err(RepoError::NotFound)
    ));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn api_keys_store_scopes_and_revocation(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let owner = Uuid::new_v4();

    let key = repos
        .create_key(CreateApiKeyParams {
            name: "cli".into(),
            description: None,
            prefix: "abcdef012345".into(),
            hashed_secret: vec![1, 2, 3],
            scopes: vec![ApiScope::PostRead, ApiScope::PostWrite],
            owner_id: owner,
            expires_at: None,
        })
        .await
        .expect("key");
    assert_eq!(key.scopes, [ApiScope::PostRead, ApiScope::PostWrite]);

    let found = repos
        .find_by_prefix("abcdef012345")
        .await
        .expect("find")
        .expect("present");
    assert_eq!(found.id, key.id);

    repos
        .revoke_key(key.id, OffsetDateTime::now_utc())
        .await
        .expect("revoke");
    let listed = repos.list_keys(Some(owner)).await.expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, ApiKeyStatus::Revoked);
    assert!(listed[0].revoked_at.is_some());
}
