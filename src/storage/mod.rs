mod blob;

use async_trait::async_trait;
use url::Url;

pub use blob::{BlobStorage, SHAREABLE_LINK_TTL};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object store error: {0}")]
    Store(#[from] object_store::Error),
    #[error("not a blob URL: {0}")]
    InvalidUrl(String),
    #[error("invalid storage configuration: {0}")]
    Config(String),
}

/// Blob storage operations the controller depends on.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// A time-limited URL granting read access to the blob at `url`.
    async fn shareable_read_link(&self, url: &Url) -> Result<Url, StorageError>;

    /// Create or overwrite `path` in `container` with `content`.
    async fn write_text(&self, content: &str, container: &str, path: &str)
        -> Result<(), StorageError>;

    /// Copy a blob to another container, then delete the source.
    async fn move_file(
        &self,
        source_container: &str,
        source_name: &str,
        target_container: &str,
        target_name: &str,
    ) -> Result<(), StorageError>;
}

/// First path segment of a blob URL:
/// `https://acct.blob.core.windows.net/{container}/{name}`.
pub fn container_name(url: &Url) -> Option<String> {
    url.path_segments()?
        .next()
        .filter(|s| !s.is_empty())
        .map(percent_decode)
}

/// Blob name inside its container (everything after the container segment),
/// percent-decoded.
pub fn file_name(url: &Url) -> Result<String, StorageError> {
    let segments: Vec<&str> = url
        .path_segments()
        .ok_or_else(|| StorageError::InvalidUrl(url.to_string()))?
        .skip(1)
        .collect();

    if segments.is_empty() || segments.iter().all(|s| s.is_empty()) {
        return Err(StorageError::InvalidUrl(url.to_string()));
    }

    Ok(percent_decode(&segments.join("/")))
}

fn percent_decode(raw: &str) -> String {
    percent_encoding::percent_decode_str(raw)
        .decode_utf8_lossy()
        .into_owned()
}

/// Value of `key` in a `Key1=Value1;Key2=Value2` connection string
/// (key match is case-insensitive).
pub fn connection_string_value(connection_string: &str, key: &str) -> Option<String> {
    connection_string.split(';').find_map(|part| {
        let (k, v) = part.split_once('=')?;
        k.trim().eq_ignore_ascii_case(key).then(|| v.trim().to_owned())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn resolves_container_and_nested_file_name() {
        let u = url("https://acct.blob.core.windows.net/audio-input/2024/05/call%20one.wav");
        assert_eq!(container_name(&u).as_deref(), Some("audio-input"));
        assert_eq!(file_name(&u).unwrap(), "2024/05/call one.wav");
    }

    #[test]
    fn plus_sign_is_not_a_space_in_paths() {
        let u = url("https://acct.blob.core.windows.net/in/a+b.wav");
        assert_eq!(file_name(&u).unwrap(), "a+b.wav");
    }

    #[test]
    fn container_only_url_has_no_file_name() {
        let u = url("https://acct.blob.core.windows.net/audio-input/");
        assert_eq!(container_name(&u).as_deref(), Some("audio-input"));
        assert!(file_name(&u).is_err());
    }

    #[test]
    fn reads_connection_string_values() {
        let cs = "DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=a2V5==;EndpointSuffix=core.windows.net";
        assert_eq!(connection_string_value(cs, "AccountName").as_deref(), Some("acct"));
        assert_eq!(connection_string_value(cs, "accountkey").as_deref(), Some("a2V5=="));
        assert_eq!(connection_string_value(cs, "Missing"), None);
    }
}
