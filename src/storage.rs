use std::path::PathBuf;

use tracing::info;
use uuid::Uuid;

use crate::error::{ImportError, Result};
use crate::settings::{Backend, StorageSettings};

/// Where embedded images go. Returns a publicly resolvable URL.
pub trait ObjectStore {
    fn upload(&self, filename: &str, bytes: &[u8], content_type: &str) -> Result<String>;
}

/// Random name whose extension is the subtype of `content_type`.
pub fn image_filename(content_type: &str) -> String {
    let ext = content_type.rsplit('/').next().unwrap_or("bin");
    format!("{}.{}", Uuid::new_v4(), ext)
}

// ── Local directory ──

pub struct LocalDir {
    dir: PathBuf,
    base_url: String,
}

impl LocalDir {
    pub fn new(dir: PathBuf, base_url: Option<String>) -> Result<Self> {
        std::fs::create_dir_all(&dir)?;
        let base_url = match base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("file://{}", std::fs::canonicalize(&dir)?.display()),
        };
        Ok(LocalDir { dir, base_url })
    }
}

impl ObjectStore for LocalDir {
    fn upload(&self, filename: &str, bytes: &[u8], _content_type: &str) -> Result<String> {
        std::fs::write(self.dir.join(filename), bytes)?;
        Ok(format!("{}/{}", self.base_url, filename))
    }
}

// ── HTTP bucket (Supabase storage API) ──

pub struct HttpBucket {
    client: reqwest::blocking::Client,
    endpoint: String,
    bucket: String,
    api_key: String,
}

impl HttpBucket {
    pub fn new(endpoint: &str, bucket: &str, api_key: &str) -> Self {
        HttpBucket {
            client: reqwest::blocking::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn object_url(&self, filename: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.endpoint, self.bucket, filename)
    }

    pub fn public_url(&self, filename: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.endpoint, self.bucket, filename)
    }
}

impl ObjectStore for HttpBucket {
    fn upload(&self, filename: &str, bytes: &[u8], content_type: &str) -> Result<String> {
        self.client
            .post(self.object_url(filename))
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes.to_vec())
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| ImportError::Storage(format!("{}: {}", filename, e)))?;
        Ok(self.public_url(filename))
    }
}

pub fn from_settings(settings: &StorageSettings) -> Result<Box<dyn ObjectStore>> {
    match settings.backend {
        Backend::Local => Ok(Box::new(LocalDir::new(
            settings.dir.clone(),
            settings.public_base_url.clone(),
        )?)),
        Backend::Http => {
            let endpoint = settings
                .endpoint
                .as_deref()
                .ok_or_else(|| ImportError::Storage("storage.endpoint is not set".into()))?;
            let api_key = settings
                .api_key
                .as_deref()
                .ok_or_else(|| ImportError::Storage("storage.api_key is not set".into()))?;
            Ok(Box::new(HttpBucket::new(endpoint, &settings.bucket, api_key)))
        }
    }
}

/// Store one image under a fresh name and log where it went.
pub fn upload_image(store: &dyn ObjectStore, bytes: &[u8], content_type: &str) -> Result<String> {
    let filename = image_filename(content_type);
    let url = store.upload(&filename, bytes, content_type)?;
    info!(file = %filename, url = %url, "uploaded image");
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_takes_subtype_as_extension() {
        let name = image_filename("image/png");
        assert!(name.ends_with(".png"));
        assert_eq!(name.len(), 36 + 4);
        assert_ne!(image_filename("image/png"), name);
    }

    #[test]
    fn local_dir_writes_and_returns_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDir::new(dir.path().join("img"), Some("https://cdn.test/q/".into())).unwrap();
        let url = store.upload("a.png", b"data", "image/png").unwrap();
        assert_eq!(url, "https://cdn.test/q/a.png");
        assert_eq!(std::fs::read(dir.path().join("img/a.png")).unwrap(), b"data");
    }

    #[test]
    fn local_dir_default_url_is_file_scheme() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDir::new(dir.path().to_path_buf(), None).unwrap();
        let url = upload_image(&store, b"x", "image/jpeg").unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with(".jpeg"));
    }

    #[test]
    fn bucket_urls() {
        let b = HttpBucket::new("https://x.supabase.co/", "question-images", "k");
        assert_eq!(
            b.object_url("f.png"),
            "https://x.supabase.co/storage/v1/object/question-images/f.png"
        );
        assert_eq!(
            b.public_url("f.png"),
            "https://x.supabase.co/storage/v1/object/public/question-images/f.png"
        );
    }

    #[test]
    fn http_backend_needs_endpoint_and_key() {
        let settings = StorageSettings {
            backend: Backend::Http,
            ..Default::default()
        };
        assert!(matches!(from_settings(&settings), Err(ImportError::Storage(_))));
    }
}
