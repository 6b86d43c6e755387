use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::multipart;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use crate::types::{
    DirectoryReceipt, DirectoryRecord, FileRecord, FileUploadReceipt, StorageBackend, StorageError,
};

const FILES_ENDPOINT: &str = "/api/clients/v1/files";
const DIRECTORIES_ENDPOINT: &str = "/api/clients/v1/directories";
const ROOT_DIRECTORY_ENDPOINT: &str = "/api/clients/v1/directories/root";
const CLIENT_ID_HEADER: &str = "Client-ID";
const CLIENT_SECRET_HEADER: &str = "Client-Secret";
const ROOT_DIRECTORY_DESCRIPTION: &str = "Root directory";

#[derive(Debug, Clone)]
/// Public struct `ArcaStorageConfig` used across Arca components.
pub struct ArcaStorageConfig {
    pub api_base: String,
    pub client_id: String,
    pub client_secret: String,
    pub default_directory_id: Option<String>,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone)]
/// Public struct `ArcaStorageClient` used across Arca components.
pub struct ArcaStorageClient {
    client: reqwest::Client,
    config: ArcaStorageConfig,
}

impl ArcaStorageClient {
    pub fn new(config: ArcaStorageConfig) -> Result<Self, StorageError> {
        if config.client_id.trim().is_empty() || config.client_secret.trim().is_empty() {
            return Err(StorageError::MissingCredentials);
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            CLIENT_ID_HEADER,
            HeaderValue::from_str(config.client_id.trim()).map_err(|e| {
                StorageError::InvalidResponse(format!("invalid {CLIENT_ID_HEADER} header: {e}"))
            })?,
        );
        headers.insert(
            CLIENT_SECRET_HEADER,
            HeaderValue::from_str(config.client_secret.trim()).map_err(|e| {
                StorageError::InvalidResponse(format!("invalid {CLIENT_SECRET_HEADER} header: {e}"))
            })?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()?;

        Ok(Self { client, config })
    }

    fn endpoint_url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base.trim_end_matches('/'))
    }
}

/// The storage API reports RFC-3339 timestamps; records created before the
/// service tracked them come back blank and map to the epoch.
fn parse_created_at(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|stamp| stamp.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// The API answers 200 for reads and listings and 200 or 201 for uploads and
/// directory creation; every other status, other 2xx codes included, carries
/// no decodable payload.
async fn unexpected_status_error(response: reqwest::Response) -> StorageError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    StorageError::Status { status, body }
}

#[derive(Debug, Default, Deserialize)]
struct UploadResponseWire {
    #[serde(default)]
    data: UploadDataWire,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Default, Deserialize)]
struct UploadDataWire {
    #[serde(default)]
    file_id: String,
    #[serde(default)]
    hash: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    size: u64,
}

#[derive(Debug, Default, Deserialize)]
struct RootDirectoryResponseWire {
    #[serde(default)]
    data: RootDirectoryDataWire,
}

#[derive(Debug, Default, Deserialize)]
struct RootDirectoryDataWire {
    #[serde(default)]
    directory: DirectorySummaryWire,
    #[serde(default)]
    subdirectories: Vec<DirectorySummaryWire>,
    #[serde(default)]
    files: Vec<RootFileWire>,
}

#[derive(Debug, Default, Deserialize)]
struct DirectorySummaryWire {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    size: u64,
    #[serde(default, rename = "createdAt")]
    created_at: String,
}

#[derive(Debug, Default, Deserialize)]
struct RootFileWire {
    #[serde(default)]
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct CreateDirectoryResponseWire {
    #[serde(default)]
    data: CreateDirectoryDataWire,
}

#[derive(Debug, Default, Deserialize)]
struct CreateDirectoryDataWire {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    created_at: String,
}

#[derive(Debug, Default, Deserialize)]
struct DirectoryFilesResponseWire {
    #[serde(default)]
    data: DirectoryFilesDataWire,
}

#[derive(Debug, Default, Deserialize)]
struct DirectoryFilesDataWire {
    #[serde(default)]
    files: Vec<DirectoryFileWire>,
}

#[derive(Debug, Default, Deserialize)]
struct DirectoryFileWire {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    content_type: String,
    #[serde(default)]
    hash: String,
}

#[async_trait]
impl StorageBackend for ArcaStorageClient {
    async fn upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        directory_id: Option<&str>,
    ) -> Result<FileUploadReceipt, StorageError> {
        let mut request = self.client.post(self.endpoint_url(FILES_ENDPOINT));
        if let Some(directory_id) = directory_id {
            request = request.query(&[("directory_id", directory_id)]);
        }

        let part = multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = multipart::Form::new().part("file", part);

        let response = request.multipart(form).send().await?;
        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::CREATED {
            return Err(unexpected_status_error(response).await);
        }

        let wire: UploadResponseWire = response.json().await?;
        let file_id = if wire.data.file_id.is_empty() {
            wire.data.hash
        } else {
            wire.data.file_id
        };

        Ok(FileUploadReceipt {
            file_id,
            file_name: wire.data.name,
            size: wire.data.size,
            uploaded_at: Utc::now(),
            status: wire.status,
        })
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>, StorageError> {
        let url = self.endpoint_url(&format!("{FILES_ENDPOINT}/{file_id}/download"));
        let response = self.client.get(url).send().await?;
        if response.status() != StatusCode::OK {
            return Err(unexpected_status_error(response).await);
        }

        Ok(response.bytes().await?.to_vec())
    }

    async fn list_directories(&self) -> Result<Vec<DirectoryRecord>, StorageError> {
        let response = self
            .client
            .get(self.endpoint_url(ROOT_DIRECTORY_ENDPOINT))
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            return Err(unexpected_status_error(response).await);
        }

        let wire: RootDirectoryResponseWire = response.json().await?;
        let root = wire.data.directory;

        // The root endpoint reports the root itself plus one summary per
        // subdirectory; descriptions and per-subdirectory file counts are not
        // part of that payload.
        let mut directories = Vec::with_capacity(wire.data.subdirectories.len() + 1);
        directories.push(DirectoryRecord {
            id: root.id,
            name: root.name,
            description: ROOT_DIRECTORY_DESCRIPTION.to_string(),
            created_at: parse_created_at(&root.created_at),
            file_count: wire.data.files.len(),
            total_size: root.size,
        });
        for subdirectory in wire.data.subdirectories {
            directories.push(DirectoryRecord {
                id: subdirectory.id,
                name: subdirectory.name,
                description: String::new(),
                created_at: parse_created_at(&subdirectory.created_at),
                file_count: 0,
                total_size: subdirectory.size,
            });
        }

        Ok(directories)
    }

    async fn create_directory(
        &self,
        name: &str,
        description: &str,
    ) -> Result<DirectoryReceipt, StorageError> {
        let response = self
            .client
            .post(self.endpoint_url(DIRECTORIES_ENDPOINT))
            .json(&json!({ "name": name, "description": description }))
            .send()
            .await?;
        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::CREATED {
            return Err(unexpected_status_error(response).await);
        }

        let wire: CreateDirectoryResponseWire = response.json().await?;
        Ok(DirectoryReceipt {
            directory_id: wire.data.id,
            name: wire.data.name,
            description: wire.data.description,
            created_at: parse_created_at(&wire.data.created_at),
        })
    }

    async fn list_files(&self, directory_id: &str) -> Result<Vec<FileRecord>, StorageError> {
        let url = self.endpoint_url(&format!("{DIRECTORIES_ENDPOINT}/{directory_id}"));
        let response = self.client.get(url).send().await?;
        if response.status() != StatusCode::OK {
            return Err(unexpected_status_error(response).await);
        }

        let wire: DirectoryFilesResponseWire = response.json().await?;
        Ok(wire
            .data
            .files
            .into_iter()
            .map(|file| FileRecord {
                id: file.id,
                name: file.name,
                size: file.size,
                content_type: file.content_type,
                hash: file.hash,
            })
            .collect())
    }

    fn default_directory_id(&self) -> Option<&str> {
        self.config.default_directory_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::{parse_created_at, ArcaStorageClient, ArcaStorageConfig};
    use crate::types::{StorageBackend, StorageError};

    fn test_client(base_url: &str) -> ArcaStorageClient {
        ArcaStorageClient::new(ArcaStorageConfig {
            api_base: base_url.to_string(),
            client_id: "client-a".to_string(),
            client_secret: "secret-a".to_string(),
            default_directory_id: Some("dir-default".to_string()),
            request_timeout_ms: 2_000,
        })
        .expect("client should build")
    }

    #[test]
    fn unit_missing_credentials_are_rejected() {
        let result = ArcaStorageClient::new(ArcaStorageConfig {
            api_base: "http://127.0.0.1:1".to_string(),
            client_id: "  ".to_string(),
            client_secret: "secret".to_string(),
            default_directory_id: None,
            request_timeout_ms: 1_000,
        });
        assert!(matches!(result, Err(StorageError::MissingCredentials)));
    }

    #[test]
    fn unit_created_at_parse_falls_back_to_epoch() {
        let parsed = parse_created_at("2024-03-01T10:20:30Z");
        assert_eq!(parsed.timestamp(), 1_709_288_430);
        assert_eq!(parse_created_at("not-a-date").timestamp(), 0);
        assert_eq!(parse_created_at("").timestamp(), 0);
    }

    #[tokio::test]
    async fn functional_upload_sends_credentials_and_falls_back_to_hash_id() {
        let server = MockServer::start();
        let upload = server.mock(|when, then| {
            when.method(POST)
                .path("/api/clients/v1/files")
                .header("Client-ID", "client-a")
                .header("Client-Secret", "secret-a");
            then.status(201).json_body(json!({
                "data": { "file_id": "", "hash": "hash-77", "name": "notes.txt", "size": 11 },
                "status": "uploaded"
            }));
        });

        let client = test_client(&server.base_url());
        let receipt = client
            .upload("notes.txt", b"hello world".to_vec(), None)
            .await
            .expect("upload should succeed");

        upload.assert();
        assert_eq!(receipt.file_id, "hash-77");
        assert_eq!(receipt.file_name, "notes.txt");
        assert_eq!(receipt.size, 11);
        assert_eq!(receipt.status, "uploaded");
    }

    #[tokio::test]
    async fn functional_upload_targets_requested_directory() {
        let server = MockServer::start();
        let upload = server.mock(|when, then| {
            when.method(POST)
                .path("/api/clients/v1/files")
                .query_param("directory_id", "dir-9");
            then.status(200).json_body(json!({
                "data": { "file_id": "file-1", "hash": "", "name": "a.bin", "size": 3 },
                "status": "uploaded"
            }));
        });

        let client = test_client(&server.base_url());
        let receipt = client
            .upload("a.bin", vec![1, 2, 3], Some("dir-9"))
            .await
            .expect("upload should succeed");

        upload.assert();
        assert_eq!(receipt.file_id, "file-1");
    }

    #[tokio::test]
    async fn functional_download_returns_raw_bytes() {
        let server = MockServer::start();
        let download = server.mock(|when, then| {
            when.method(GET).path("/api/clients/v1/files/file-5/download");
            then.status(200).body("raw-bytes");
        });

        let client = test_client(&server.base_url());
        let bytes = client.download("file-5").await.expect("download");

        download.assert();
        assert_eq!(bytes, b"raw-bytes");
    }

    #[tokio::test]
    async fn functional_non_success_status_surfaces_code_and_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/clients/v1/files/missing/download");
            then.status(404).body("file not found");
        });

        let client = test_client(&server.base_url());
        let error = client
            .download("missing")
            .await
            .expect_err("download should fail");

        match error {
            StorageError::Status { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "file not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn regression_unexpected_2xx_statuses_are_rejected() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/clients/v1/directories/root");
            then.status(204);
        });
        server.mock(|when, then| {
            when.method(POST).path("/api/clients/v1/files");
            then.status(202).body("queued");
        });

        let client = test_client(&server.base_url());

        let list_error = client
            .list_directories()
            .await
            .expect_err("204 carries no directory payload");
        assert!(matches!(
            list_error,
            StorageError::Status { status: 204, .. }
        ));

        let upload_error = client
            .upload("a.txt", b"x".to_vec(), None)
            .await
            .expect_err("202 is not an upload receipt");
        match upload_error {
            StorageError::Status { status, body } => {
                assert_eq!(status, 202);
                assert_eq!(body, "queued");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn functional_list_directories_includes_root_entry_first() {
        let server = MockServer::start();
        let list = server.mock(|when, then| {
            when.method(GET).path("/api/clients/v1/directories/root");
            then.status(200).json_body(json!({
                "data": {
                    "directory": {
                        "id": "root-1",
                        "name": "root",
                        "size": 4096,
                        "createdAt": "2024-01-02T03:04:05Z"
                    },
                    "subdirectories": [
                        { "id": "dir-2", "name": "reports", "size": 1024, "createdAt": "2024-02-03T04:05:06Z" }
                    ],
                    "files": [ { "id": "file-1" }, { "id": "file-2" } ]
                }
            }));
        });

        let client = test_client(&server.base_url());
        let directories = client.list_directories().await.expect("list");

        list.assert();
        assert_eq!(directories.len(), 2);
        assert_eq!(directories[0].id, "root-1");
        assert_eq!(directories[0].description, "Root directory");
        assert_eq!(directories[0].file_count, 2);
        assert_eq!(directories[0].total_size, 4096);
        assert_eq!(directories[1].id, "dir-2");
        assert_eq!(directories[1].description, "");
        assert_eq!(directories[1].file_count, 0);
    }

    #[tokio::test]
    async fn functional_create_directory_parses_receipt() {
        let server = MockServer::start();
        let create = server.mock(|when, then| {
            when.method(POST)
                .path("/api/clients/v1/directories")
                .json_body(json!({ "name": "archive", "description": "cold files" }));
            then.status(201).json_body(json!({
                "data": {
                    "id": "dir-31",
                    "name": "archive",
                    "description": "cold files",
                    "created_at": "2024-04-05T06:07:08Z"
                }
            }));
        });

        let client = test_client(&server.base_url());
        let receipt = client
            .create_directory("archive", "cold files")
            .await
            .expect("create");

        create.assert();
        assert_eq!(receipt.directory_id, "dir-31");
        assert_eq!(receipt.name, "archive");
        assert_eq!(receipt.description, "cold files");
    }

    #[tokio::test]
    async fn functional_list_files_parses_records() {
        let server = MockServer::start();
        let list = server.mock(|when, then| {
            when.method(GET).path("/api/clients/v1/directories/dir-7");
            then.status(200).json_body(json!({
                "data": {
                    "files": [
                        {
                            "id": "file-9",
                            "name": "map.pdf",
                            "size": 2048,
                            "content_type": "application/pdf",
                            "hash": "hash-9"
                        }
                    ]
                }
            }));
        });

        let client = test_client(&server.base_url());
        let files = client.list_files("dir-7").await.expect("list files");

        list.assert();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].id, "file-9");
        assert_eq!(files[0].name, "map.pdf");
        assert_eq!(files[0].size, 2048);
        assert_eq!(files[0].content_type, "application/pdf");
        assert_eq!(files[0].hash, "hash-9");
    }

    #[tokio::test]
    async fn functional_default_directory_comes_from_config() {
        let server = MockServer::start();
        let client = test_client(&server.base_url());
        assert_eq!(client.default_directory_id(), Some("dir-default"));
    }
}
