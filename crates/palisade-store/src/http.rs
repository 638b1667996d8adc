//! HTTP transport to the remote notary server
//!
//! The server exposes one endpoint per role plus a key endpoint:
//!
//! ```text
//! GET|PUT <base>/v2/<gun>/_trust/tuf/<role>.json
//! GET     <base>/v2/<gun>/_trust/tuf/<role>.key
//! ```
//!
//! A 404 maps to [`Error::MetaNotFound`], which the publish pipeline uses
//! as its repository-never-pushed signal; every other transport failure
//! is [`Error::RemoteUnavailable`].

use std::pin::Pin;

use reqwest::StatusCode;
use url::Url;

use palisade_types::{keys::parse_public_key, PublicKey, RoleName};

use crate::error::{Error, Result};
use crate::{MetadataStore, RemoteStore, MAX_SMALL_SIZE};

/// Remote store speaking the notary-server wire protocol
#[derive(Debug, Clone)]
pub struct HttpStore {
    base_url: String,
    gun: String,
    client: reqwest::Client,
}

impl HttpStore {
    /// Create a store for a collection on a server
    ///
    /// Fails if `base_url` is not an absolute URL.
    pub fn new(base_url: &str, gun: &str) -> Result<Self> {
        Self::with_client(base_url, gun, reqwest::Client::new())
    }

    /// Create a store with a caller-supplied HTTP client
    ///
    /// Timeouts, proxies, and retries are the transport's business; the
    /// store issues one request per operation.
    pub fn with_client(base_url: &str, gun: &str, client: reqwest::Client) -> Result<Self> {
        Url::parse(base_url)
            .map_err(|e| Error::RemoteUnavailable(format!("invalid base URL: {e}")))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            gun: gun.to_string(),
            client,
        })
    }

    fn meta_url(&self, role: RoleName) -> String {
        format!(
            "{}/v2/{}/_trust/tuf/{}.json",
            self.base_url,
            self.gun,
            role.as_str()
        )
    }

    fn key_url(&self, role: RoleName) -> String {
        format!(
            "{}/v2/{}/_trust/tuf/{}.key",
            self.base_url,
            self.gun,
            role.as_str()
        )
    }

    /// Issue a capped GET, rejecting bodies larger than `max_size`
    async fn get_capped(&self, url: &str, role: RoleName, max_size: u64) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::RemoteUnavailable(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::MetaNotFound { role });
        }
        if !status.is_success() {
            return Err(Error::RemoteUnavailable(format!(
                "GET {url} returned {status}"
            )));
        }

        if let Some(len) = response.content_length() {
            if len > max_size {
                return Err(Error::MetaTooLarge { role, max_size });
            }
        }

        // The declared length is advisory; keep counting while streaming.
        let mut body = Vec::new();
        let mut response = response;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::RemoteUnavailable(e.to_string()))?
        {
            if (body.len() + chunk.len()) as u64 > max_size {
                return Err(Error::MetaTooLarge { role, max_size });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

impl MetadataStore for HttpStore {
    fn get_meta(
        &self,
        role: RoleName,
        max_size: u64,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<u8>>> + Send + '_>> {
        Box::pin(async move {
            let url = self.meta_url(role);
            tracing::debug!(%url, "fetching {role} metadata");
            self.get_capped(&url, role, max_size).await
        })
    }

    fn set_meta(
        &self,
        role: RoleName,
        data: &[u8],
    ) -> Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + '_>> {
        let data = data.to_vec();
        Box::pin(async move {
            let url = self.meta_url(role);
            tracing::debug!(%url, bytes = data.len(), "uploading {role} metadata");
            let response = self
                .client
                .put(&url)
                .body(data)
                .send()
                .await
                .map_err(|e| Error::RemoteUnavailable(e.to_string()))?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Err(Error::MetaNotFound { role });
            }
            if !status.is_success() {
                return Err(Error::RemoteUnavailable(format!(
                    "PUT {url} returned {status}"
                )));
            }
            Ok(())
        })
    }
}

impl RemoteStore for HttpStore {
    fn get_key(
        &self,
        role: RoleName,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<PublicKey>> + Send + '_>> {
        Box::pin(async move {
            let url = self.key_url(role);
            tracing::debug!(%url, "fetching server {role} key");
            let body = self.get_capped(&url, role, MAX_SMALL_SIZE).await?;
            Ok(parse_public_key(&body)?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_shapes() {
        let store = HttpStore::new("https://notary.example.com/", "docker.io/library/app").unwrap();
        assert_eq!(
            store.meta_url(RoleName::Root),
            "https://notary.example.com/v2/docker.io/library/app/_trust/tuf/root.json"
        );
        assert_eq!(
            store.key_url(RoleName::Timestamp),
            "https://notary.example.com/v2/docker.io/library/app/_trust/tuf/timestamp.key"
        );
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(HttpStore::new("not a url", "gun").is_err());
    }
}
