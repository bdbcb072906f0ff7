//! HTTP(S) endpoint driver.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

use stevedore_common::{ArtifactKey, CredentialRole, Error, Result};

use crate::credentials::ResolvedCredentials;
use crate::driver::ArtifactDriver;
use crate::location::{Header, HttpArtifact};

/// Driver for an artifact served over HTTP.
///
/// Keys are appended to the base URL as path segments; the root key is the
/// base URL itself. Listing is not supported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpDriver {
    url: String,
    headers: Vec<Header>,
    credentials: ResolvedCredentials,
}

fn http_error(err: reqwest::Error) -> Error {
    Error::Storage(format!("HTTP request failed: {}", err))
}

impl HttpDriver {
    pub fn new(location: &HttpArtifact, credentials: ResolvedCredentials) -> Self {
        Self {
            url: location.url.clone(),
            headers: location.headers.clone(),
            credentials,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn username(&self) -> Option<&str> {
        self.credentials.get(CredentialRole::Username)
    }

    pub fn password(&self) -> Option<&str> {
        self.credentials.get(CredentialRole::Password)
    }

    pub fn credentials(&self) -> &ResolvedCredentials {
        &self.credentials
    }

    /// URL for `key` below the base URL.
    pub fn target_url(&self, key: &ArtifactKey) -> Result<Url> {
        let mut url = Url::parse(&self.url)
            .map_err(|e| Error::InvalidInput(format!("Invalid URL '{}': {}", self.url, e)))?;
        if !key.is_root() {
            url.path_segments_mut()
                .map_err(|_| Error::InvalidInput(format!("URL '{}' cannot have a path", self.url)))?
                .pop_if_empty()
                .extend(key.components());
        }
        Ok(url)
    }

    fn request(&self, client: &Client, method: reqwest::Method, url: Url) -> RequestBuilder {
        let mut request = client.request(method, url);
        for header in &self.headers {
            request = request.header(header.name.as_str(), header.value.as_str());
        }
        if let Some(username) = self.username() {
            request = request.basic_auth(username, self.password());
        }
        request
    }

    async fn send(
        &self,
        method: reqwest::Method,
        key: &ArtifactKey,
        body: Option<Vec<u8>>,
    ) -> Result<Response> {
        let url = self.target_url(key)?;
        debug!(%method, url = %url, "sending artifact request");

        let client = Client::builder().build().map_err(http_error)?;
        let mut request = self.request(&client, method, url.clone());
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await.map_err(http_error)?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(Error::NotFound(url.to_string())),
            status if status.is_success() => Ok(response),
            status => Err(Error::Storage(format!("{} returned {}", url, status))),
        }
    }
}

#[async_trait]
impl ArtifactDriver for HttpDriver {
    fn name(&self) -> &str {
        "http"
    }

    async fn load(&self, key: &ArtifactKey, local_path: &Path) -> Result<()> {
        let response = self.send(reqwest::Method::GET, key, None).await?;

        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::File::create(local_path).await?;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            file.write_all(&chunk.map_err(http_error)?).await?;
        }
        file.flush().await?;
        Ok(())
    }

    async fn save(&self, local_path: &Path, key: &ArtifactKey) -> Result<()> {
        if fs::metadata(local_path).await?.is_dir() {
            return Err(Error::NotPermitted(
                "HTTP artifacts cannot upload directories".to_string(),
            ));
        }
        let data = fs::read(local_path).await?;
        self.send(reqwest::Method::PUT, key, Some(data)).await?;
        Ok(())
    }

    async fn delete(&self, key: &ArtifactKey) -> Result<()> {
        self.send(reqwest::Method::DELETE, key, None).await?;
        Ok(())
    }

    async fn list_objects(&self, _key: &ArtifactKey) -> Result<Vec<String>> {
        Err(Error::NotPermitted(
            "HTTP artifacts do not support listing".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver(url: &str) -> HttpDriver {
        HttpDriver::new(
            &HttpArtifact {
                url: url.to_string(),
                headers: Vec::new(),
                basic_auth: None,
            },
            ResolvedCredentials::default(),
        )
    }

    #[test]
    fn test_root_key_is_base_url() {
        let url = driver("https://example.com/files/a.tgz")
            .target_url(&ArtifactKey::root())
            .unwrap();
        assert_eq!(url.as_str(), "https://example.com/files/a.tgz");
    }

    #[test]
    fn test_key_appended_as_segments() {
        let url = driver("https://example.com/files/")
            .target_url(&ArtifactKey::parse("runs/1/out.tgz").unwrap())
            .unwrap();
        assert_eq!(url.as_str(), "https://example.com/files/runs/1/out.tgz");
    }

    #[test]
    fn test_invalid_url() {
        let err = driver("::nope").target_url(&ArtifactKey::root()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_list_not_permitted() {
        let err = driver("https://example.com")
            .list_objects(&ArtifactKey::root())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotPermitted(_)));
    }
}
