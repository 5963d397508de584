//! Tomboy REST sync server

use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::OnceCell;
use url::Url;

use super::http::{api_root_url, get_json, put_json, resolve_ref};
use super::wire::{ApiRoot, NoteChange, NoteChanges, NotesDocument, UserDocument};
use crate::config::build_http_client;
use crate::models::{Note, NoteId};
use crate::oauth::signature::Signer;
use crate::oauth::{AccessToken, ConsumerCredentials};
use crate::sync::SyncServer;
use crate::transport::TransportError;

/// [`SyncServer`] talking to a Tomboy-compatible REST API with OAuth-signed requests
///
/// Every write sends `latest-sync-revision` one past the revision this handle
/// last saw, so the server rejects it with a revision mismatch if another
/// client wrote in between.
pub struct WebSyncServer {
    client: Client,
    consumer: ConsumerCredentials,
    access_token: AccessToken,
    user_url: Url,
    notes_url: OnceCell<Url>,
    observed_revision: Mutex<Option<i64>>,
}

impl WebSyncServer {
    /// Locate the user document for `access_token` on the server
    pub async fn connect(
        server_url: &str,
        consumer: ConsumerCredentials,
        access_token: AccessToken,
        timeout: std::time::Duration,
    ) -> Result<Self, TransportError> {
        let client = build_http_client(timeout)?;
        Self::connect_with_client(client, server_url, consumer, access_token).await
    }

    pub async fn connect_with_client(
        client: Client,
        server_url: &str,
        consumer: ConsumerCredentials,
        access_token: AccessToken,
    ) -> Result<Self, TransportError> {
        let base = api_root_url(server_url)?;
        let signer = Signer::new(&consumer, Some(access_token.as_oauth()));
        let root: ApiRoot = get_json(&client, Some(signer), &base).await?;
        let user_ref = root.user_ref.ok_or_else(|| {
            TransportError::protocol("API root did not include user-ref; is the access token valid?")
        })?;
        let user_url = resolve_ref(&base, &user_ref.api_ref)?;
        tracing::debug!("Sync user document at {user_url}");

        Ok(Self {
            client,
            consumer,
            access_token,
            user_url,
            notes_url: OnceCell::new(),
            observed_revision: Mutex::new(None),
        })
    }

    pub const fn user_url(&self) -> &Url {
        &self.user_url
    }

    fn signer(&self) -> Signer<'_> {
        Signer::new(&self.consumer, Some(self.access_token.as_oauth()))
    }

    fn observe(&self, revision: i64) {
        *self
            .observed_revision
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(revision);
    }

    fn observed(&self) -> Option<i64> {
        *self
            .observed_revision
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn user(&self) -> Result<UserDocument, TransportError> {
        let user: UserDocument = get_json(&self.client, Some(self.signer()), &self.user_url).await?;
        self.observe(user.latest_sync_revision);
        Ok(user)
    }

    async fn notes_url(&self) -> Result<&Url, TransportError> {
        self.notes_url
            .get_or_try_init(|| async {
                let user = self.user().await?;
                resolve_ref(&self.user_url, &user.notes_ref.api_ref)
            })
            .await
    }

    async fn base_revision(&self) -> Result<i64, TransportError> {
        match self.observed() {
            Some(revision) => Ok(revision),
            None => Ok(self.user().await?.latest_sync_revision),
        }
    }

    async fn put_changes(&self, note_changes: Vec<NoteChange>) -> Result<(), TransportError> {
        let url = self.notes_url().await?.clone();
        let base = self.base_revision().await?;
        let body = NoteChanges {
            latest_sync_revision: base + 1,
            note_changes,
        };
        let reply: NotesDocument = put_json(&self.client, self.signer(), &url, &body).await?;
        tracing::debug!(
            "Server accepted {} changes at revision {}",
            body.note_changes.len(),
            reply.latest_sync_revision
        );
        self.observe(reply.latest_sync_revision);
        Ok(())
    }
}

#[async_trait]
impl SyncServer for WebSyncServer {
    async fn server_id(&self) -> Result<String, TransportError> {
        Ok(self.user().await?.current_sync_guid)
    }

    async fn current_revision(&self) -> Result<i64, TransportError> {
        Ok(self.user().await?.latest_sync_revision)
    }

    async fn notes_changed_since(&self, revision: i64) -> Result<Vec<Note>, TransportError> {
        let mut url = self.notes_url().await?.clone();
        url.query_pairs_mut()
            .append_pair("include_notes", "true")
            .append_pair("since", &revision.to_string());

        let document: NotesDocument = get_json(&self.client, Some(self.signer()), &url).await?;
        self.observe(document.latest_sync_revision);
        document
            .notes
            .into_iter()
            .map(super::wire::WireNote::into_note)
            .collect()
    }

    async fn note_ids(&self) -> Result<BTreeSet<NoteId>, TransportError> {
        let url = self.notes_url().await?.clone();
        let document: NotesDocument = get_json(&self.client, Some(self.signer()), &url).await?;
        document.notes.iter().map(super::wire::WireNote::id).collect()
    }

    async fn upload_notes(&self, notes: &[Note]) -> Result<(), TransportError> {
        self.put_changes(notes.iter().map(NoteChange::update).collect())
            .await
    }

    async fn delete_notes(&self, ids: &[NoteId]) -> Result<(), TransportError> {
        self.put_changes(ids.iter().map(NoteChange::delete).collect())
            .await
    }
}
