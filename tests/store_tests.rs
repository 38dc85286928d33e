//! Session store backends.

use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use codemind::store::{ElasticConfig, ElasticSessionStore, FileSessionStore, MemorySessionStore, SessionStore};
use codemind::types::{AppMode, Session};

fn sample_session() -> Session {
    let mut session = Session::new(AppMode::Support);
    session.push_user("my invoice is wrong", None);
    session
}

async fn exercise_round_trip(store: &dyn SessionStore) {
    store.initialize().await.unwrap();
    let session = sample_session();
    store.save(&session).await.unwrap();

    assert_eq!(store.load(&session.id).await.unwrap(), Some(session.clone()));
    let all = store.load_all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[&session.id].title, "my invoice is wrong");

    store.delete(&session.id).await.unwrap();
    assert_eq!(store.load(&session.id).await.unwrap(), None);
    assert!(store.load_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn memory_store_round_trip() {
    exercise_round_trip(&MemorySessionStore::new()).await;
}

#[tokio::test]
async fn file_store_round_trip() {
    let dir = TempDir::new().unwrap();
    exercise_round_trip(&FileSessionStore::new(dir.path().join("sessions"))).await;
}

#[tokio::test]
async fn file_store_survives_reopening() {
    let dir = TempDir::new().unwrap();
    let session = sample_session();
    FileSessionStore::new(dir.path()).save(&session).await.unwrap();

    let reopened = FileSessionStore::new(dir.path());
    assert_eq!(reopened.load(&session.id).await.unwrap(), Some(session));
}

#[tokio::test]
async fn deleting_a_missing_session_is_not_an_error() {
    let dir = TempDir::new().unwrap();
    FileSessionStore::new(dir.path()).delete("nope").await.unwrap();
    MemorySessionStore::new().delete("nope").await.unwrap();
}

fn elastic(server: &MockServer) -> ElasticSessionStore {
    ElasticSessionStore::new(
        ElasticConfig::new(server.uri())
            .with_api_key("secret")
            .with_index("chats"),
    )
}

#[tokio::test]
async fn elastic_initialize_creates_a_missing_index() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/chats"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/chats"))
        .and(header("authorization", "ApiKey secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "acknowledged": true })))
        .expect(1)
        .mount(&server)
        .await;

    elastic(&server).initialize().await.unwrap();
}

#[tokio::test]
async fn elastic_save_indexes_the_session_document() {
    let server = MockServer::start().await;
    let session = sample_session();
    Mock::given(method("HEAD"))
        .and(path("/chats"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("/chats/_doc/{}", session.id)))
        .and(query_param("refresh", "true"))
        .and(body_partial_json(json!({ "id": session.id, "mode": "Support Tickets" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "result": "created" })))
        .expect(1)
        .mount(&server)
        .await;

    elastic(&server).save(&session).await.unwrap();
}

#[tokio::test]
async fn elastic_load_reads_source_and_maps_404_to_none() {
    let server = MockServer::start().await;
    let session = sample_session();
    Mock::given(method("GET"))
        .and(path(format!("/chats/_doc/{}", session.id)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "_id": session.id, "found": true, "_source": session })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/chats/_doc/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "found": false })))
        .mount(&server)
        .await;

    let store = elastic(&server);
    assert_eq!(store.load(&session.id).await.unwrap(), Some(session));
    assert_eq!(store.load("missing").await.unwrap(), None);
}

#[tokio::test]
async fn elastic_load_all_collects_hits() {
    let server = MockServer::start().await;
    let a = sample_session();
    let b = Session::new(AppMode::Research);
    Mock::given(method("POST"))
        .and(path("/chats/_search"))
        .and(body_partial_json(json!({ "size": 100 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hits": { "hits": [{ "_source": a }, { "_source": b }] }
        })))
        .mount(&server)
        .await;

    let all = elastic(&server).load_all().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[&a.id], a);
    assert_eq!(all[&b.id], b);
}

#[tokio::test]
async fn elastic_load_all_skips_unreadable_documents() {
    let server = MockServer::start().await;
    let good = sample_session();
    Mock::given(method("POST"))
        .and(path("/chats/_search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hits": { "hits": [
                { "_id": "broken", "_source": { "id": "broken", "messages": "not a list" } },
                { "_id": good.id, "_source": good }
            ] }
        })))
        .mount(&server)
        .await;

    let all = elastic(&server).load_all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[&good.id], good);
}

#[tokio::test]
async fn elastic_checks_the_index_once() {
    let server = MockServer::start().await;
    let session = sample_session();
    Mock::given(method("HEAD"))
        .and(path("/chats"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("/chats/_doc/{}", session.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "updated" })))
        .expect(3)
        .mount(&server)
        .await;

    let store = elastic(&server);
    store.initialize().await.unwrap();
    store.save(&session).await.unwrap();
    store.save(&session).await.unwrap();
    store.save(&session).await.unwrap();
}

#[tokio::test]
async fn elastic_errors_carry_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/chats/_doc/s1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("shard failure"))
        .mount(&server)
        .await;

    let err = elastic(&server).delete("s1").await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("500"));
    assert!(message.contains("shard failure"));
}
