//! # Rest Store Sample
//!
//! Opens the post collection, waits for every author and tag to load, then creates and
//! deletes a post.
//!
//! ```bash
//! # Fixture data
//! RUST_LOG=info cargo run -p rest-store-sample
//!
//! # A real server
//! REST_STORE_BASE_URL=http://localhost:8080 RUST_LOG=info cargo run -p rest-store-sample
//! ```

use rest_store::tracing::setup_tracing;
use rest_store_sample::blog::{context_from_env, Blog};
use rest_store_sample::model::{decode, Post, PostCreate};
use tracing::{error, info, Instrument};

#[tokio::main]
async fn main() -> Result<(), String> {
    setup_tracing();

    let ctx = context_from_env().map_err(|e| e.to_string())?;
    let blog = Blog::open(ctx);

    let span = tracing::info_span!("load_posts");
    let state = async {
        info!("Waiting for posts to settle");
        blog.posts.settled().await
    }
    .instrument(span)
    .await;

    if let Some(e) = state.error() {
        error!(error = %e, "Loading posts failed");
        return Err(e.to_string());
    }

    let posts: Vec<Post> = decode(&state).map_err(|e| e.to_string())?;
    for post in &posts {
        let tags: Vec<&str> = post.tags.iter().map(|tag| tag.label.as_str()).collect();
        info!(
            id = post.id,
            title = %post.title,
            author = %post.author.name,
            tags = ?tags,
            "Post"
        );
    }

    let draft = PostCreate {
        title: "Draft".to_string(),
        author: 1,
    };
    let payload = serde_json::to_value(&draft).map_err(|e| e.to_string())?;
    match blog.posts.post(payload).await {
        Ok(created) => info!(%created, "Post created"),
        Err(e) => error!(error = %e, "Creating post failed"),
    }

    if let Some(first) = posts.first() {
        match blog.posts.delete(serde_json::json!({ "id": first.id })).await {
            Ok(remaining) => info!(remaining = %remaining.to_value(), "Post deleted"),
            Err(e) => error!(error = %e, "Deleting post failed"),
        }
    }

    info!("Sample completed");
    Ok(())
}
