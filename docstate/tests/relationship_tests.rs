mod common;

use common::{Comment, CountingStore, Post, memory_engine};
use docstate::{
    bson::{Bson, doc},
    prelude::*,
};

async fn post_with_comments(engine: &StorageEngine, bodies: &[&str]) -> Post {
    let mut post = Post::titled("with comments");
    let comments = post.comments.get_mut(engine).await.unwrap();
    for body in bodies {
        comments.append(Comment::with_body(body));
    }

    assert_eq!(engine.save(&mut post).await.unwrap(), SaveOutcome::Inserted);
    post
}

#[tokio::test]
async fn test_members_are_saved_and_referenced_in_order() {
    let (engine, store) = memory_engine();
    let mut post = post_with_comments(&engine, &["one", "two", "three"]).await;

    let comments = post.comments.get(&engine).await.unwrap();
    assert_eq!(comments.len(), 3);
    assert!(comments.iter().all(|comment| comment.id().is_some()));
    assert!(comments.iter().all(|comment| comment.state() == LifecycleState::Clean));

    let expected = comments
        .iter()
        .map(|comment| Bson::from(doc! { "$ref": "comments", "$id": comment.id().unwrap() }))
        .collect::<Vec<_>>();

    let stored = &store.documents("posts").await[0];
    assert_eq!(stored.get_array("comments").unwrap(), &expected);
    assert_eq!(store.documents("comments").await.len(), 3);
}

#[tokio::test]
async fn test_fetched_relationship_materializes_once() {
    let store = CountingStore::default();
    let engine = StorageEngine::new(store.clone());
    let post = post_with_comments(&engine, &["one", "two", "three"]).await;

    let mut fetched = Post::default();
    engine.fetch_by_id(&mut fetched, post.id().unwrap()).await.unwrap();
    assert!(!fetched.comments.is_loaded());
    assert_eq!(fetched.comments.references().len(), 3);

    let before = store.finds();
    let bodies = fetched
        .comments
        .get(&engine)
        .await
        .unwrap()
        .iter()
        .map(|comment| comment.body.get().clone())
        .collect::<Vec<_>>();
    assert_eq!(bodies, vec!["one", "two", "three"]);
    assert_eq!(store.finds(), before + 1);

    fetched.comments.get(&engine).await.unwrap();
    assert_eq!(store.finds(), before + 1);

    assert_eq!(fetched.core.state(), LifecycleState::Clean);
}

#[tokio::test]
async fn test_appending_to_a_clean_owner_marks_it_dirty() {
    let (engine, store) = memory_engine();
    let post = post_with_comments(&engine, &["one"]).await;

    let mut fetched = Post::default();
    engine.fetch_by_id(&mut fetched, post.id().unwrap()).await.unwrap();
    fetched
        .comments
        .get_mut(&engine)
        .await
        .unwrap()
        .append(Comment::with_body("two"));

    assert_eq!(fetched.core.state(), LifecycleState::Dirty);
    assert_eq!(engine.save(&mut fetched).await.unwrap(), SaveOutcome::Updated);

    let stored = &store.documents("posts").await[0];
    assert_eq!(stored.get_array("comments").unwrap().len(), 2);
    assert_eq!(store.documents("comments").await.len(), 2);
}

#[tokio::test]
async fn test_replacing_a_member_in_place_marks_the_owner_dirty() {
    let (engine, store) = memory_engine();
    let post = post_with_comments(&engine, &["original"]).await;

    let mut fetched = Post::default();
    engine.fetch_by_id(&mut fetched, post.id().unwrap()).await.unwrap();
    let comments = fetched.comments.get_mut(&engine).await.unwrap();
    assert_eq!(fetched.core.state(), LifecycleState::Clean);

    *comments.get_mut(0).unwrap() = Comment::with_body("replacement");

    assert_eq!(fetched.core.state(), LifecycleState::Dirty);
    assert_eq!(engine.save(&mut fetched).await.unwrap(), SaveOutcome::Updated);
    assert_eq!(store.documents("comments").await.len(), 2);

    let mut reloaded = Post::default();
    engine.fetch_by_id(&mut reloaded, post.id().unwrap()).await.unwrap();
    let bodies = reloaded
        .comments
        .get(&engine)
        .await
        .unwrap()
        .iter()
        .map(|comment| comment.body.get().clone())
        .collect::<Vec<_>>();
    assert_eq!(bodies, vec!["replacement"]);
}

#[tokio::test]
async fn test_set_replaces_members() {
    let (engine, _store) = memory_engine();
    let mut post = post_with_comments(&engine, &["old"]).await;

    post.comments.set(
        ["new", "newer"]
            .into_iter()
            .map(Comment::with_body)
            .collect(),
    );
    assert_eq!(post.core.state(), LifecycleState::Dirty);
    engine.save(&mut post).await.unwrap();

    let mut fetched = Post::default();
    engine.fetch_by_id(&mut fetched, post.id().unwrap()).await.unwrap();
    let bodies = fetched
        .comments
        .get(&engine)
        .await
        .unwrap()
        .iter()
        .map(|comment| comment.body.get().clone())
        .collect::<Vec<_>>();
    assert_eq!(bodies, vec!["new", "newer"]);
}

#[tokio::test]
async fn test_dangling_references_are_skipped() {
    let (engine, _store) = memory_engine();
    let mut post = post_with_comments(&engine, &["keep", "drop", "keep too"]).await;

    let dropped = &post.comments.get(&engine).await.unwrap()[1];
    assert!(engine.delete(dropped).await.unwrap());

    let mut fetched = Post::default();
    engine.fetch_by_id(&mut fetched, post.id().unwrap()).await.unwrap();
    let bodies = fetched
        .comments
        .get(&engine)
        .await
        .unwrap()
        .iter()
        .map(|comment| comment.body.get().clone())
        .collect::<Vec<_>>();
    assert_eq!(bodies, vec!["keep", "keep too"]);
}

#[tokio::test]
async fn test_relationship_display_renders_members() {
    let (engine, _store) = memory_engine();
    let mut post = post_with_comments(&engine, &["a", "b"]).await;
    post.comments.get(&engine).await.unwrap();

    let rendered = post.comments.to_string();
    let lines = rendered.lines().collect::<Vec<_>>();

    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("\"body\":\"a\""));
    assert!(lines[1].contains("\"body\":\"b\""));
}
