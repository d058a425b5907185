#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use vidtweet_server::{
    config::CloudinaryConfig,
    create_router,
    db::{MemoryUserRepository, MemoryVideoRepository, UserRepository},
    media::{MediaStore, UploadedMedia},
    AppState, Config,
};

pub const BOUNDARY: &str = "vidtweet-test-boundary";

/// Media host double that records what it was asked to upload.
///
/// `fail` rejects every upload; `fail_names` rejects files whose name ends
/// with one of the entries; `delay` stalls each upload before it answers.
#[derive(Default)]
pub struct FakeMediaStore {
    pub fail: AtomicBool,
    pub fail_names: Mutex<Vec<String>>,
    pub delay: Mutex<Option<Duration>>,
    pub uploaded: Mutex<Vec<PathBuf>>,
}

impl FakeMediaStore {
    pub fn fail_on(&self, file_name: &str) {
        self.fail_names.lock().unwrap().push(file_name.to_string());
    }

    pub fn stall_for(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl MediaStore for FakeMediaStore {
    async fn upload_file(&self, path: &Path) -> anyhow::Result<UploadedMedia> {
        self.uploaded.lock().unwrap().push(path.to_path_buf());

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        let rejected = self
            .fail_names
            .lock()
            .unwrap()
            .iter()
            .any(|suffix| name.ends_with(suffix.as_str()));
        if rejected || self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("media host unavailable");
        }

        let bytes = tokio::fs::metadata(path).await?.len();
        Ok(UploadedMedia {
            url: format!("https://media.test/{name}"),
            public_id: name,
            resource_type: "image".to_string(),
            bytes,
            duration: None,
        })
    }
}

pub struct TestApp {
    pub router: Router,
    pub users: Arc<MemoryUserRepository>,
    pub videos: Arc<MemoryVideoRepository>,
    pub media: Arc<FakeMediaStore>,
    pub temp_dir: TempDir,
}

pub fn test_config(upload_temp_dir: PathBuf) -> Config {
    Config {
        database_url: "postgres://unused".to_string(),
        database_name: None,
        cors_origin: "*".to_string(),
        access_token_secret: "access-secret".to_string(),
        access_token_expires_in: 900,
        refresh_token_secret: "refresh-secret".to_string(),
        refresh_token_expires_in: 864_000,
        cloudinary: CloudinaryConfig {
            api_base: "http://127.0.0.1:9".to_string(),
            cloud_name: "test".to_string(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
        },
        upload_temp_dir,
        request_timeout_secs: 30,
        port: 0,
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(None, test_config)
    }

    /// Builds the app around a custom user repository; `self.users` is then unused.
    pub fn with_user_repository(users: Arc<dyn UserRepository>) -> Self {
        Self::build(Some(users), test_config)
    }

    /// App whose requests are cut off after `secs` seconds.
    pub fn with_request_timeout(secs: u64) -> Self {
        Self::build(None, |dir| Config {
            request_timeout_secs: secs,
            ..test_config(dir)
        })
    }

    fn build(
        custom_users: Option<Arc<dyn UserRepository>>,
        config: impl FnOnce(PathBuf) -> Config,
    ) -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let users = Arc::new(MemoryUserRepository::new());
        let videos = Arc::new(MemoryVideoRepository::new());
        let media = Arc::new(FakeMediaStore::default());

        let state = AppState {
            users: custom_users.unwrap_or_else(|| users.clone() as Arc<dyn UserRepository>),
            videos: videos.clone(),
            media: media.clone(),
            config: config(temp_dir.path().to_path_buf()),
        };

        Self {
            router: create_router(state),
            users,
            videos,
            media,
            temp_dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    pub async fn post_json(&self, uri: &str, body: Value, token: Option<&str>) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(request.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut request = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(request.body(Body::empty()).unwrap()).await
    }

    /// Registers `username` with an avatar and returns the response.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> (StatusCode, Value) {
        let request = MultipartBody::new()
            .text("username", username)
            .text("email", email)
            .text("password", password)
            .text("fullName", "Test User")
            .file("avatar", "avatar.png", b"avatar-bytes")
            .into_request("/api/v1/users/register");
        self.send(request).await
    }

    /// Registers and logs in, returning `(access_token, refresh_token)`.
    pub async fn sign_up(&self, username: &str, email: &str, password: &str) -> (String, String) {
        let (status, _) = self.register(username, email, password).await;
        assert_eq!(status, StatusCode::CREATED);
        self.login(email, password).await
    }

    /// Logs in by email, returning `(access_token, refresh_token)`.
    pub async fn login(&self, email: &str, password: &str) -> (String, String) {
        let (status, body) = self
            .post_json(
                "/api/v1/users/login",
                serde_json::json!({ "email": email, "password": password }),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        (
            body["data"]["accessToken"].as_str().unwrap().to_string(),
            body["data"]["refreshToken"].as_str().unwrap().to_string(),
        )
    }

    /// Files left behind in the upload temp directory.
    pub fn temp_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.temp_dir.path())
            .map(|entries| entries.map(|e| e.unwrap().path()).collect())
            .unwrap_or_default()
    }
}

/// Hand-assembled multipart/form-data body.
pub struct MultipartBody {
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self { body: Vec::new() }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, contents: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(contents);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn into_request(mut self, uri: &str) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(self.body))
            .unwrap()
    }
}
