// Copyright (c) 2024 FinstateSync. All rights reserved.
// Licensed under the Microsoft Reference Source License (MS-RSL).
// See LICENSE file for complete terms and conditions.

//! # finstate-sync Object Store
//!
//! Stateless HTTP client for downloading and uploading the spreadsheet
//! templates this system mutates. Downloads use the object store's
//! public-read path; uploads use the authenticated path with a service
//! credential.

use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("object store transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("object store returned status {status} for {bucket}/{key}")]
    UnexpectedStatus {
        status: u16,
        bucket: String,
        key: String,
    },
}

/// Configuration needed to address the object store's two paths.
#[derive(Debug, Clone)]
pub struct ObjectStoreConfig {
    pub public_base_url: String,
    pub authenticated_base_url: String,
    pub service_credential: String,
}

/// Stateless client for the spreadsheet object store.
#[derive(Clone)]
pub struct ObjectStoreClient {
    client: Client,
    config: ObjectStoreConfig,
}

impl ObjectStoreClient {
    pub fn new(config: ObjectStoreConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build object store HTTP client");

        ObjectStoreClient { client, config }
    }

    /// Downloads `<bucket>/<TICKER>.xlsx` via the public-read path. A 404
    /// downgrades to `ObjectStoreError::NotFound` rather than a transport
    /// error, so callers can record the file as skipped and continue.
    #[instrument(skip(self))]
    pub async fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        let url = format!("{}/{}/{}", self.config.public_base_url, bucket, key);

        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            warn!(bucket, key, "object not found in store");
            return Err(ObjectStoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }

        if !response.status().is_success() {
            return Err(ObjectStoreError::UnexpectedStatus {
                status: response.status().as_u16(),
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }

        let bytes = response.bytes().await?;
        info!(bucket, key, bytes = bytes.len(), "downloaded object");
        Ok(bytes.to_vec())
    }

    /// Uploads `bytes` to `<bucket>/<key>` via the authenticated path,
    /// presenting the service credential as a bearer token.
    #[instrument(skip(self, bytes))]
    pub async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
    ) -> Result<(), ObjectStoreError> {
        let url = format!("{}/{}/{}", self.config.authenticated_base_url, bucket, key);

        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.config.service_credential)
            .body(bytes.clone())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ObjectStoreError::UnexpectedStatus {
                status: response.status().as_u16(),
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }

        info!(bucket, key, bytes = bytes.len(), "uploaded object");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(server: &mockito::ServerGuard) -> ObjectStoreClient {
        ObjectStoreClient::new(ObjectStoreConfig {
            public_base_url: server.url(),
            authenticated_base_url: server.url(),
            service_credential: "svc-token".to_string(),
        })
    }

    #[tokio::test]
    async fn download_returns_bytes_on_success() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/financials-quarterly-income/ZM.xlsx")
            .with_status(200)
            .with_body(b"xlsx-bytes".to_vec())
            .create_async()
            .await;

        let client = client_for(&server);
        let bytes = client
            .download("financials-quarterly-income", "ZM.xlsx")
            .await
            .unwrap();
        assert_eq!(bytes, b"xlsx-bytes");
    }

    #[tokio::test]
    async fn download_downgrades_404_to_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/financials-annual-balance/NOPE.xlsx")
            .with_status(404)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client
            .download("financials-annual-balance", "NOPE.xlsx")
            .await
            .unwrap_err();
        assert!(matches!(err, ObjectStoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn upload_sends_bearer_auth_header() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("PUT", "/financials-quarterly-income/ZM.xlsx")
            .match_header("authorization", "Bearer svc-token")
            .with_status(200)
            .create_async()
            .await;

        let client = client_for(&server);
        client
            .upload("financials-quarterly-income", "ZM.xlsx", b"new".to_vec())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn upload_surfaces_unexpected_status() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("PUT", "/financials-quarterly-income/ZM.xlsx")
            .with_status(500)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client
            .upload("financials-quarterly-income", "ZM.xlsx", b"new".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, ObjectStoreError::UnexpectedStatus { status: 500, .. }));
    }
}
