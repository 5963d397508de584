//! Handshake and web sync against an in-process Tomboy server

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use pretty_assertions::assert_eq;
use url::Url;

use notesync_core::config::ServerConfig;
use notesync_core::db::NoteStore;
use notesync_core::manifest::MemoryManifestStore;
use notesync_core::models::Note;
use notesync_core::oauth::{
    perform_handshake, AccessToken, AuthorizationError, CallbackError, ConsumerCredentials,
};
use notesync_core::services::NoteService;
use notesync_core::sync::{LocalSyncClient, SyncClient, SyncManager, SyncServer};
use notesync_core::transport::TransportErrorKind;
use notesync_core::web::wire::{
    ApiRoot, NoteChange, NoteChanges, NotesDocument, ResourceRef, UserDocument, WireNote,
};
use notesync_core::web::WebSyncServer;

const VERIFIER: &str = "verifier-123";

#[derive(Debug, Default)]
struct MockState {
    revision: i64,
    guid: String,
    notes: BTreeMap<String, WireNote>,
    puts: usize,
}

#[derive(Clone, Default)]
struct Mock {
    state: Arc<Mutex<MockState>>,
}

impl Mock {
    fn put_remote(&self, note: &Note) {
        let mut state = self.state.lock().unwrap();
        state.revision += 1;
        let mut wire = WireNote::from(note);
        wire.last_sync_revision = Some(state.revision);
        state.notes.insert(wire.guid.clone(), wire);
    }

    fn revision(&self) -> i64 {
        self.state.lock().unwrap().revision
    }
}

fn header(headers: &HeaderMap) -> String {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn signed_with_access_token(headers: &HeaderMap) -> Result<(), StatusCode> {
    if header(headers).contains("oauth_token=\"acc\"") {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

async fn api_root(headers: HeaderMap) -> Json<ApiRoot> {
    let user_ref = signed_with_access_token(&headers).ok().map(|()| ResourceRef {
        api_ref: "/api/1.0/alice/".into(),
        href: None,
    });
    Json(ApiRoot {
        oauth_request_token_url: "/oauth/request_token".into(),
        oauth_authorize_url: "/oauth/authorize/".into(),
        oauth_access_token_url: "/oauth/access_token".into(),
        api_version: Some("1.0".into()),
        user_ref,
    })
}

async fn request_token(headers: HeaderMap) -> Result<String, StatusCode> {
    if !header(&headers).contains("oauth_callback=") {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok("oauth_token=req&oauth_token_secret=reqsecret&oauth_callback_confirmed=true".into())
}

async fn access_token(headers: HeaderMap) -> Result<String, StatusCode> {
    let header = header(&headers);
    if header.contains("oauth_token=\"req\"")
        && header.contains(&format!("oauth_verifier=\"{VERIFIER}\""))
    {
        Ok("oauth_token=acc&oauth_token_secret=accsecret".into())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

async fn user(State(mock): State<Mock>, headers: HeaderMap) -> Result<Json<UserDocument>, StatusCode> {
    signed_with_access_token(&headers)?;
    let state = mock.state.lock().unwrap();
    Ok(Json(UserDocument {
        user_name: "alice".into(),
        latest_sync_revision: state.revision,
        current_sync_guid: state.guid.clone(),
        notes_ref: ResourceRef {
            api_ref: "/api/1.0/alice/notes/".into(),
            href: None,
        },
    }))
}

async fn list_notes(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<NotesDocument>, StatusCode> {
    signed_with_access_token(&headers)?;
    let state = mock.state.lock().unwrap();
    let since: i64 = query.get("since").and_then(|raw| raw.parse().ok()).unwrap_or(-1);
    let full = query.get("include_notes").is_some_and(|raw| raw == "true");

    let notes = state
        .notes
        .values()
        .filter(|note| note.last_sync_revision.unwrap_or_default() > since)
        .map(|note| {
            if full {
                note.clone()
            } else {
                WireNote {
                    guid: note.guid.clone(),
                    title: note.title.clone(),
                    ..WireNote::from(&Note::new("", ""))
                }
            }
        })
        .collect();
    Ok(Json(NotesDocument {
        latest_sync_revision: state.revision,
        notes,
    }))
}

async fn put_notes(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Json(changes): Json<NoteChanges>,
) -> Result<Json<NotesDocument>, StatusCode> {
    signed_with_access_token(&headers)?;
    let mut state = mock.state.lock().unwrap();
    if changes.latest_sync_revision != state.revision + 1 {
        return Err(StatusCode::CONFLICT);
    }

    state.revision += 1;
    state.puts += 1;
    let revision = state.revision;
    for change in changes.note_changes {
        match change {
            NoteChange::Delete { guid, .. } => {
                state.notes.remove(&guid);
            }
            NoteChange::Update(mut note) => {
                note.last_sync_revision = Some(revision);
                state.notes.insert(note.guid.clone(), note);
            }
        }
    }
    Ok(Json(NotesDocument {
        latest_sync_revision: revision,
        notes: Vec::new(),
    }))
}

async fn start(mock: Mock) -> String {
    mock.state.lock().unwrap().guid = "guid-1".into();
    let app = Router::new()
        .route("/api/1.0/", get(api_root))
        .route("/oauth/request_token", post(request_token))
        .route("/oauth/access_token", post(access_token))
        .route("/api/1.0/alice/", get(user))
        .route("/api/1.0/alice/notes/", get(list_notes).put(put_notes))
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{address}")
}

async fn connect(server_url: &str) -> WebSyncServer {
    WebSyncServer::connect_with_client(
        reqwest::Client::new(),
        server_url,
        ConsumerCredentials::default(),
        AccessToken::new("acc", "accsecret"),
    )
    .await
    .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn handshake_obtains_access_token() {
    let server_url = start(Mock::default()).await;
    let config = ServerConfig::new(&server_url).unwrap();

    let callback = |url: &Url| -> Result<String, CallbackError> {
        let pairs: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs.get("oauth_token").map(String::as_str), Some("req"));
        assert!(url.path().ends_with("/oauth/authorize/"));
        Ok(VERIFIER.to_string())
    };
    let token = perform_handshake(&config, &callback).await.unwrap();

    assert_eq!(token, AccessToken::new("acc", "accsecret"));
}

#[tokio::test(flavor = "multi_thread")]
async fn denied_grant_fails_the_handshake() {
    let server_url = start(Mock::default()).await;
    let config = ServerConfig::new(&server_url).unwrap();

    let callback =
        |_: &Url| -> Result<String, CallbackError> { Err(CallbackError::Denied("user said no".into())) };
    let error = perform_handshake(&config, &callback).await.unwrap_err();

    assert!(matches!(error, AuthorizationError::AuthorizationDenied(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn wrong_verifier_is_a_transport_error() {
    let server_url = start(Mock::default()).await;
    let config = ServerConfig::new(&server_url).unwrap();

    let callback = |_: &Url| -> Result<String, CallbackError> { Ok("forged".into()) };
    let error = perform_handshake(&config, &callback).await.unwrap_err();

    assert!(matches!(
        error,
        AuthorizationError::Transport(ref e) if e.kind() == TransportErrorKind::Unauthorized
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_access_token_cannot_connect() {
    let server_url = start(Mock::default()).await;

    let result = WebSyncServer::connect_with_client(
        reqwest::Client::new(),
        &server_url,
        ConsumerCredentials::default(),
        AccessToken::new("stolen", "nope"),
    )
    .await;

    assert_eq!(
        result.err().map(|error| error.kind()),
        Some(TransportErrorKind::Protocol)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_manager_round_trips_through_the_web_server() {
    let mock = Mock::default();
    let remote = Note::new("From the server", "remote body");
    mock.put_remote(&remote);
    let server_url = start(mock.clone()).await;

    let store = NoteService::open_in_memory().await.unwrap();
    let local = store.save(&Note::new("From here", "local body")).await.unwrap();
    let client = LocalSyncClient::open(store.clone(), MemoryManifestStore::new())
        .await
        .unwrap();
    let mut manager = SyncManager::new(client, connect(&server_url).await);

    let report = manager.sync().await.unwrap();

    assert_eq!(report.uploaded, vec![local.id]);
    assert_eq!(report.applied, vec![remote.id]);
    assert_eq!(report.revision, 2);
    assert_eq!(mock.revision(), 2);
    assert_eq!(manager.client().manifest().server_id.as_deref(), Some("guid-1"));

    let applied = store.get(&remote.id).await.unwrap();
    assert_eq!(applied.body, "remote body");
    assert_eq!(applied.last_change_date, remote.last_change_date);

    let uploaded = mock.state.lock().unwrap().notes.get(&local.id.to_string()).cloned().unwrap();
    assert_eq!(uploaded.note_content, "local body");

    let again = manager.sync().await.unwrap();
    assert!(again.is_empty());
    assert_eq!(mock.state.lock().unwrap().puts, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn deletes_are_sent_as_commands() {
    let mock = Mock::default();
    let note = Note::new("doomed", "");
    mock.put_remote(&note);
    let server_url = start(mock.clone()).await;
    let server = connect(&server_url).await;

    server.current_revision().await.unwrap();
    server.delete_notes(&[note.id]).await.unwrap();

    assert!(mock.state.lock().unwrap().notes.is_empty());
    assert!(server.note_ids().await.unwrap().is_empty());
    assert_eq!(server.current_revision().await.unwrap(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_writer_causes_revision_mismatch() {
    let mock = Mock::default();
    let server_url = start(mock.clone()).await;
    let server = connect(&server_url).await;

    assert_eq!(server.current_revision().await.unwrap(), 0);
    mock.put_remote(&Note::new("other device", ""));

    let error = server.upload_notes(&[Note::new("mine", "")]).await.unwrap_err();
    assert_eq!(error.kind(), TransportErrorKind::RevisionMismatch);
    assert_eq!(mock.revision(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn notes_changed_since_filters_by_revision() {
    let mock = Mock::default();
    let first = Note::new("first", "");
    let second = Note::new("second", "");
    mock.put_remote(&first);
    mock.put_remote(&second);
    let server_url = start(mock).await;
    let server = connect(&server_url).await;

    let changed = server.notes_changed_since(1).await.unwrap();
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].id, second.id);
    assert_eq!(changed[0].revision, 2);
    assert_eq!(server.note_ids().await.unwrap().len(), 2);
}
