mod common;

use std::io::Write;

use common::{CountingStore, Post, Rule, memory_engine};
use docstate::{
    bson::{Bson, Uuid, doc},
    memory::InMemoryStore,
    prelude::*,
};

#[tokio::test]
async fn test_insert_then_fetch_round_trip() {
    let (engine, _store) = memory_engine();
    let mut post = Post::titled("Hello");
    post.tags.update(|tags| tags.push("rust".to_string()));
    assert_eq!(post.core.state(), LifecycleState::New);

    let outcome = engine.save(&mut post).await.unwrap();

    assert_eq!(outcome, SaveOutcome::Inserted);
    assert_eq!(post.core.state(), LifecycleState::Clean);
    let id = post.id().expect("inserted posts have an id");

    let mut fetched = Post::default();
    engine.fetch_by_id(&mut fetched, id).await.unwrap();

    assert_eq!(fetched.core.state(), LifecycleState::Clean);
    assert_eq!(fetched.title.get(), "Hello");
    assert_eq!(fetched.tags.get(), &vec!["rust".to_string()]);
    assert_eq!(fetched.to_raw().unwrap(), post.to_raw().unwrap());
}

#[tokio::test]
async fn test_stored_documents_use_storage_names() {
    let (engine, store) = memory_engine();
    let mut post = Post::titled("Hello");
    post.draft_notes = "not persisted".to_string();

    engine.save(&mut post).await.unwrap();

    let documents = store.documents("posts").await;
    assert_eq!(documents.len(), 1);
    assert_eq!(
        documents[0],
        doc! {
            "_id": post.id().unwrap(),
            "t": "Hello",
            "tags": [],
            "views": 0_i64,
            "comments": [],
        }
    );
}

#[tokio::test]
async fn test_save_routes_by_lifecycle_state() {
    let (engine, store) = memory_engine();
    let mut post = Post::titled("first");
    engine.save(&mut post).await.unwrap();

    // Simple properties never dirty the object, so nothing is written.
    post.title.set("second".to_string());
    assert_eq!(post.core.state(), LifecycleState::Clean);
    assert_eq!(engine.save(&mut post).await.unwrap(), SaveOutcome::Unchanged);
    assert_eq!(store.documents("posts").await[0].get_str("t").unwrap(), "first");

    post.tags.update(|tags| tags.push("news".to_string()));
    assert_eq!(post.core.state(), LifecycleState::Dirty);
    assert_eq!(engine.save(&mut post).await.unwrap(), SaveOutcome::Updated);
    assert_eq!(post.core.state(), LifecycleState::Clean);

    let stored = &store.documents("posts").await[0];
    assert_eq!(stored.get_array("tags").unwrap(), &vec![Bson::from("news")]);
    assert_eq!(stored.get_str("t").unwrap(), "second");
}

#[tokio::test]
async fn test_update_writes_only_changed_fields() {
    let (engine, store) = memory_engine();
    let mut post = Post::titled("mine");
    engine.save(&mut post).await.unwrap();

    // Someone else changes a field this object never touches.
    let mut other = Post::default();
    engine.fetch_by_id(&mut other, post.id().unwrap()).await.unwrap();
    other.views.set(42);
    other.tags.on_change();
    engine.save(&mut other).await.unwrap();

    post.tags.set(vec!["merged".to_string()]);
    engine.save(&mut post).await.unwrap();

    let stored = &store.documents("posts").await[0];
    assert_eq!(stored.get_i64("views").unwrap(), 42);
    assert_eq!(stored.get_array("tags").unwrap(), &vec![Bson::from("merged")]);
}

#[tokio::test]
async fn test_identity_preconditions() {
    let (engine, _store) = memory_engine();

    let mut fresh = Post::default();
    assert!(matches!(engine.update(&mut fresh).await, Err(StorageError::InvalidState(_))));
    assert!(matches!(engine.delete(&fresh).await, Err(StorageError::InvalidState(_))));

    let mut saved = Post::titled("saved");
    engine.insert(&mut saved).await.unwrap();
    assert!(matches!(engine.insert(&mut saved).await, Err(StorageError::InvalidState(_))));
}

#[tokio::test]
async fn test_missing_objects_are_reported() {
    let (engine, _store) = memory_engine();
    let mut post = Post::default();

    let result = engine.fetch_by_id(&mut post, Uuid::new()).await;
    assert!(matches!(result, Err(StorageError::ObjectNotFound(collection, _)) if collection == "posts"));

    let query = Query::builder().filter(Filter::eq("title", "nope")).build();
    let result = engine.find_one_by_query(&mut post, Some(query)).await;
    assert!(matches!(result, Err(StorageError::ObjectNotFound(_, _))));

    let dangling = DocumentRef::new("posts", Uuid::new());
    let result = engine.fetch_by_ref(&mut post, &dangling).await;
    assert!(matches!(result, Err(StorageError::ObjectNotFound(_, _))));

    assert_eq!(post.core.state(), LifecycleState::New);
}

#[tokio::test]
async fn test_queries_use_property_names() {
    let (engine, _store) = memory_engine();
    for (title, views) in [("a", 1), ("b", 5), ("c", 3)] {
        let mut post = Post::titled(title);
        post.views.set(views);
        engine.save(&mut post).await.unwrap();
    }

    let mut found = Post::default();
    let query = Query::builder().filter(Filter::eq("title", "b")).build();
    engine.find_one_by_query(&mut found, Some(query)).await.unwrap();
    assert_eq!(*found.views.get(), 5);
    assert_eq!(found.core.state(), LifecycleState::Clean);

    let query = Query::builder()
        .filter(Filter::gt("views", 1))
        .sort("title", SortDirection::Desc)
        .build();
    let titles = engine
        .find_by_query(&Post::default(), Some(query))
        .unwrap()
        .try_collect()
        .await
        .unwrap()
        .iter()
        .map(|post| post.title.get().clone())
        .collect::<Vec<_>>();
    assert_eq!(titles, vec!["c".to_string(), "b".to_string()]);

    let query = Query::builder()
        .sort("views", SortDirection::Asc)
        .offset(1)
        .limit(1)
        .build();
    let page = engine
        .find_by_query(&Post::default(), Some(query))
        .unwrap()
        .into_collection()
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].title.get(), "c");
    assert!(page.owner().is_none());
}

#[tokio::test]
async fn test_cursor_defers_the_query() {
    let (engine, _store) = memory_engine();
    engine.save(&mut Post::titled("only")).await.unwrap();

    let mut cursor = engine.find_by_query(&Post::default(), None).unwrap();
    assert!(!cursor.is_executed());

    let first = cursor.next().await.unwrap().expect("one post is stored");
    assert!(cursor.is_executed());
    assert_eq!(first.title.get(), "only");
    assert!(cursor.next().await.unwrap().is_none());
}

#[tokio::test]
async fn test_fetch_by_ids_and_refs() {
    let (engine, _store) = memory_engine();
    let mut ids = Vec::new();
    for title in ["a", "b", "c"] {
        let mut post = Post::titled(title);
        engine.save(&mut post).await.unwrap();
        ids.push(post.id().unwrap());
    }

    let found = engine
        .fetch_by_ids(&Post::default(), [ids[0], ids[2]])
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|post| post.id() != Some(ids[1])));

    let mut post = Post::default();
    engine
        .fetch_by_ref(&mut post, &DocumentRef::new("posts", ids[1]))
        .await
        .unwrap();
    assert_eq!(post.title.get(), "b");
}

#[tokio::test]
async fn test_delete_and_delete_by_query() {
    let (engine, store) = memory_engine();
    let mut posts = Vec::new();
    for views in 1..=3 {
        let mut post = Post::titled("p");
        post.views.set(views);
        engine.save(&mut post).await.unwrap();
        posts.push(post);
    }

    let query = Query::builder().filter(Filter::gte("views", 2)).build();
    assert_eq!(engine.delete_by_query(&Post::default(), Some(query), None).await.unwrap(), 2);

    assert!(engine.delete(&posts[0]).await.unwrap());
    assert!(!engine.delete(&posts[0]).await.unwrap());
    assert!(store.documents("posts").await.is_empty());

    engine.save(&mut Post::titled("again")).await.unwrap();
    assert_eq!(engine.delete_by_query(&Post::default(), None, None).await.unwrap(), 1);
}

#[tokio::test]
async fn test_files_round_trip_and_replace() {
    let (engine, _store) = memory_engine();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"hello blob").unwrap();

    let id = engine.save_file(file.path(), None).await.unwrap();
    let stored = engine.fetch_file(id).await.unwrap().expect("file was stored");
    assert_eq!(stored.data, b"hello blob");
    assert_eq!(stored.length, 10);

    let replacement = engine.save_file(file.path(), Some(id)).await.unwrap();
    assert_ne!(replacement, id);
    assert!(engine.fetch_file(id).await.unwrap().is_none());
    assert!(engine.fetch_file(replacement).await.unwrap().is_some());

    let missing = file.path().with_extension("missing");
    assert!(matches!(
        engine.save_file(&missing, None).await,
        Err(StorageError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn test_shutdown_and_reinit() {
    let (mut engine, _store) = memory_engine();
    assert!(engine.is_initialized());
    assert!(engine.backend_as::<InMemoryStore>().is_some());

    engine.shutdown().await.unwrap();

    assert!(!engine.is_initialized());
    assert!(matches!(
        engine.save(&mut Post::titled("x")).await,
        Err(StorageError::NotInitialized)
    ));

    engine.init(InMemoryStore::new(), StorageConfig { safe_writes: true });
    assert!(engine.config().safe_writes);
    assert_eq!(engine.save(&mut Post::titled("x")).await.unwrap(), SaveOutcome::Inserted);
}

#[tokio::test]
async fn test_configuration_is_applied_through_the_builder() {
    let config: StorageConfig = serde_json::from_str(r#"{ "safe_writes": true }"#).unwrap();
    let engine = StorageEngine::builder()
        .backend(InMemoryStore::new())
        .config(config)
        .build();

    assert!(engine.config().safe_writes);
    assert!(engine.collection("posts").unwrap().options().safe);
}

#[tokio::test]
async fn test_delete_by_query_can_override_safe_writes() {
    let store = CountingStore::default();
    let engine = StorageEngine::new(store.clone());
    for title in ["a", "b"] {
        engine.save(&mut Post::titled(title)).await.unwrap();
    }

    let query = Query::builder().filter(Filter::eq("title", "a")).build();
    assert_eq!(engine.delete_by_query(&Post::default(), Some(query), Some(true)).await.unwrap(), 1);
    assert_eq!(store.safe_removes(), 1);

    assert_eq!(engine.delete_by_query(&Post::default(), None, None).await.unwrap(), 1);
    assert_eq!(store.safe_removes(), 1);
}

#[tokio::test]
async fn test_patterns_are_stored_as_regular_expressions() {
    let (engine, store) = memory_engine();
    let mut rule = Rule::default();
    rule.name.set("letters".to_string());
    rule.matcher.set("/^a+$/i");
    engine.save(&mut rule).await.unwrap();

    let stored = &store.documents("rules").await[0];
    match stored.get("matcher") {
        Some(Bson::RegularExpression(regex)) => {
            assert_eq!(regex.pattern.to_string(), "^a+$");
            assert_eq!(regex.options.to_string(), "i");
        }
        other => panic!("expected a regular expression, got {other:?}"),
    }

    let mut fetched = Rule::default();
    engine.fetch_by_id(&mut fetched, rule.id().unwrap()).await.unwrap();
    assert_eq!(fetched.matcher.get().as_deref(), Some("/^a+$/"));
    assert_eq!(fetched.matcher.options(), "i");
    assert_eq!(fetched.name.get(), "letters");
}
