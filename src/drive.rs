//! Google Drive v3 backend for the task document.
//!
//! The document is a single file identified by name inside one folder. Reads
//! download it whole; writes overwrite it whole, creating it on first save.
//! Authentication uses a service-account key: an RS256-signed JWT is exchanged
//! for a bearer token, which is cached until shortly before it expires.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::config::{Config, ServiceAccountKey};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::store::TaskStore;

const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";
const TOKEN_LIFETIME_SECS: i64 = 3600;
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);
const MULTIPART_BOUNDARY: &str = "taskbot-document-boundary";

// ---------------------------------------------------------------------------
// Access tokens
// ---------------------------------------------------------------------------

/// Source of OAuth bearer tokens for Drive requests.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// A fixed token, for tests and externally managed credentials.
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Service-account JWT bearer flow.
pub struct ServiceAccountAuth {
    key: ServiceAccountKey,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    pub fn new(key: ServiceAccountKey, client: reqwest::Client) -> Self {
        Self { key, client, cached: Mutex::new(None) }
    }

    async fn exchange(&self) -> Result<CachedToken> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| Error::Auth(format!("system clock before epoch: {e}")))?
            .as_secs() as i64;
        let assertion = signed_assertion(&self.key, now)?;

        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Auth(format!("token exchange failed ({status}): {body}")));
        }
        let token: TokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(TOKEN_LIFETIME_SECS as u64));
        debug!(expires_in = lifetime.as_secs(), "obtained drive access token");
        Ok(CachedToken {
            value: token.access_token,
            refresh_at: Instant::now() + lifetime.saturating_sub(TOKEN_REFRESH_MARGIN),
        })
    }
}

#[async_trait]
impl TokenSource for ServiceAccountAuth {
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }
        let fresh = self.exchange().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }
}

/// Claims of the service-account assertion sent to the token endpoint.
#[derive(Debug, Serialize, Deserialize)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

/// Build the RS256-signed JWT for the token exchange.
fn signed_assertion(key: &ServiceAccountKey, now: i64) -> Result<String> {
    let claims = AssertionClaims {
        iss: key.client_email.clone(),
        scope: DRIVE_SCOPE.to_string(),
        aud: key.token_uri.clone(),
        iat: now,
        exp: now + TOKEN_LIFETIME_SECS,
    };
    let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| Error::Auth(format!("private key is not valid PEM: {e}")))?;
    jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &signing_key)
        .map_err(|e| Error::Auth(format!("failed to sign token request: {e}")))
}

// ---------------------------------------------------------------------------
// Document store
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileRef>,
}

#[derive(Deserialize)]
struct FileRef {
    id: String,
}

/// Task document stored as one JSON file in a Drive folder.
pub struct DriveStore {
    folder_id: String,
    file_name: String,
    base_url: String,
    client: reqwest::Client,
    auth: Arc<dyn TokenSource>,
}

async fn ensure_success(op: &'static str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Drive { op, status: status.as_u16(), body })
}

impl DriveStore {
    pub fn new(
        folder_id: &str,
        file_name: &str,
        base_url: &str,
        client: reqwest::Client,
        auth: Arc<dyn TokenSource>,
    ) -> Self {
        Self {
            folder_id: folder_id.to_string(),
            file_name: file_name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            auth,
        }
    }

    /// Store authenticated with the configured service account.
    pub fn from_config(config: &Config) -> Self {
        let client = reqwest::Client::new();
        let auth = Arc::new(ServiceAccountAuth::new(config.credentials.clone(), client.clone()));
        Self::new(&config.folder_id, &config.file_name, &config.drive_api, client, auth)
    }

    fn search_query(&self) -> String {
        format!(
            "name='{}' and '{}' in parents and trashed=false",
            self.file_name.replace('\'', "\\'"),
            self.folder_id.replace('\'', "\\'"),
        )
    }

    async fn find_file(&self, token: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(format!("{}/drive/v3/files", self.base_url))
            .bearer_auth(token)
            .query(&[("q", self.search_query().as_str()), ("fields", "files(id)")])
            .send()
            .await?;
        let list: FileList = ensure_success("list", response).await?.json().await?;
        Ok(list.files.into_iter().next().map(|f| f.id))
    }

    /// Download and parse the document. A missing file is an empty collection.
    pub async fn fetch(&self) -> Result<Database> {
        let token = self.auth.access_token().await?;
        let Some(file_id) = self.find_file(&token).await? else {
            debug!(file = %self.file_name, "task document not found, starting empty");
            return Ok(Database::default());
        };
        let response = self
            .client
            .get(format!("{}/drive/v3/files/{file_id}", self.base_url))
            .bearer_auth(&token)
            .query(&[("alt", "media")])
            .send()
            .await?;
        let bytes = ensure_success("download", response).await?.bytes().await?;
        let db = Database::from_json(&bytes)?;

        let dups = db.duplicate_ids();
        if !dups.is_empty() {
            warn!(ids = ?dups, "task document contains duplicate ids");
        }
        Ok(db)
    }

    /// Overwrite the document, creating it in the folder if absent.
    pub async fn upload(&self, db: &Database) -> Result<()> {
        let content = db.to_json()?;
        let token = self.auth.access_token().await?;
        let response = match self.find_file(&token).await? {
            Some(file_id) => {
                self.client
                    .patch(format!("{}/upload/drive/v3/files/{file_id}", self.base_url))
                    .bearer_auth(&token)
                    .query(&[("uploadType", "media")])
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(content)
                    .send()
                    .await?
            }
            None => {
                let metadata = json!({ "name": self.file_name, "parents": [self.folder_id] });
                self.client
                    .post(format!("{}/upload/drive/v3/files", self.base_url))
                    .bearer_auth(&token)
                    .query(&[("uploadType", "multipart")])
                    .header(
                        reqwest::header::CONTENT_TYPE,
                        format!("multipart/related; boundary={MULTIPART_BOUNDARY}"),
                    )
                    .body(multipart_related(&serde_json::to_vec(&metadata)?, &content))
                    .send()
                    .await?
            }
        };
        ensure_success("upload", response).await?;
        Ok(())
    }
}

fn multipart_related(metadata: &[u8], content: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(metadata.len() + content.len() + 256);
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--").as_bytes());
    body
}

#[async_trait]
impl TaskStore for DriveStore {
    async fn load(&self) -> Database {
        match self.fetch().await {
            Ok(db) => db,
            Err(e) => {
                error!(error = %e, "failed to read task document");
                Database::default()
            }
        }
    }

    async fn save(&self, db: &Database) -> bool {
        match self.upload(db).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "failed to write task document");
                false
            }
        }
    }
}
