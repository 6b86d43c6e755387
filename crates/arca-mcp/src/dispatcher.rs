use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use arca_storage::StorageBackend;

use crate::catalog::{
    storage_tool_catalog, TOOL_BACKUP_FILE, TOOL_CREATE_DIRECTORY, TOOL_DOWNLOAD_FILE,
    TOOL_LIST_DIRECTORIES, TOOL_SEARCH_FILES, TOOL_UPLOAD_FILE,
};
use crate::protocol::{
    McpRequestFrame, MCP_ERROR_INTERNAL, MCP_ERROR_INVALID_PARAMS, MCP_ERROR_METHOD_NOT_FOUND,
    MCP_PROTOCOL_VERSION,
};

const MCP_CONTENT_TYPE_TEXT: &str = "text";
const CREATED_AT_DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone)]
/// Public struct `McpDispatchError` used across Arca components.
pub struct McpDispatchError {
    pub code: i64,
    pub message: String,
}

impl McpDispatchError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(MCP_ERROR_INVALID_PARAMS, message)
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(MCP_ERROR_INTERNAL, message)
    }
}

/// Routes decoded request frames to the initialize/list/call handlers and the
/// six storage tools. Stateless per request; every call borrows the shared
/// storage backend.
pub struct McpDispatcher {
    server_name: String,
    server_version: String,
    storage: Arc<dyn StorageBackend>,
}

impl McpDispatcher {
    pub fn new(
        server_name: impl Into<String>,
        server_version: impl Into<String>,
        storage: Arc<dyn StorageBackend>,
    ) -> Self {
        Self {
            server_name: server_name.into(),
            server_version: server_version.into(),
            storage,
        }
    }

    pub async fn dispatch(&self, frame: &McpRequestFrame) -> Result<Value, McpDispatchError> {
        match frame.method.as_str() {
            "initialize" => Ok(self.handle_initialize()),
            "tools/list" => Ok(self.handle_tools_list()),
            "tools/call" => self.handle_tools_call(&frame.params).await,
            other => Err(McpDispatchError::new(
                MCP_ERROR_METHOD_NOT_FOUND,
                format!("unknown method: {other}"),
            )),
        }
    }

    fn handle_initialize(&self) -> Value {
        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": self.server_name,
                "version": self.server_version
            }
        })
    }

    fn handle_tools_list(&self) -> Value {
        json!({ "tools": storage_tool_catalog() })
    }

    async fn handle_tools_call(
        &self,
        params: &Map<String, Value>,
    ) -> Result<Value, McpDispatchError> {
        let tool_name = params
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                McpDispatchError::invalid_params("tools/call requires a non-empty 'name'")
            })?;
        let arguments = decode_tool_arguments(params)?;

        match tool_name {
            TOOL_UPLOAD_FILE => self.handle_upload_file(&arguments).await,
            TOOL_DOWNLOAD_FILE => self.handle_download_file(&arguments).await,
            TOOL_LIST_DIRECTORIES => self.handle_list_directories().await,
            TOOL_CREATE_DIRECTORY => self.handle_create_directory(&arguments).await,
            TOOL_SEARCH_FILES => self.handle_search_files(&arguments).await,
            TOOL_BACKUP_FILE => self.handle_backup_file(&arguments).await,
            other => Err(McpDispatchError::invalid_params(format!(
                "unknown tool: {other}"
            ))),
        }
    }

    async fn handle_upload_file(
        &self,
        arguments: &Map<String, Value>,
    ) -> Result<Value, McpDispatchError> {
        let file_path = required_str_argument(arguments, "filePath")?;
        // An explicit directory wins; without one the upload stays outside
        // any directory instead of inheriting the configured default.
        let directory_id = optional_str_argument(arguments, "directoryId");

        let bytes = tokio::fs::read(file_path)
            .await
            .map_err(|error| McpDispatchError::internal(format!("failed to open file: {error}")))?;
        let file_name = base_file_name(file_path);

        let receipt = self
            .storage
            .upload(&file_name, bytes, directory_id)
            .await
            .map_err(|error| {
                McpDispatchError::internal(format!("failed to upload file: {error}"))
            })?;

        Ok(text_content_result(format!(
            "File uploaded successfully!\nFile ID: {}\nFile Name: {}\nSize: {} bytes",
            receipt.file_id, receipt.file_name, receipt.size
        )))
    }

    async fn handle_download_file(
        &self,
        arguments: &Map<String, Value>,
    ) -> Result<Value, McpDispatchError> {
        let file_id = required_str_argument(arguments, "fileId")?;
        let output_path = required_str_argument(arguments, "outputPath")?;

        let bytes = self.storage.download(file_id).await.map_err(|error| {
            McpDispatchError::internal(format!("failed to download file: {error}"))
        })?;

        if let Some(parent) = Path::new(output_path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|error| {
                    McpDispatchError::internal(format!("failed to create directory: {error}"))
                })?;
            }
        }
        tokio::fs::write(output_path, &bytes)
            .await
            .map_err(|error| McpDispatchError::internal(format!("failed to write file: {error}")))?;

        Ok(text_content_result(format!(
            "File downloaded successfully!\nSaved to: {}\nSize: {} bytes",
            output_path,
            bytes.len()
        )))
    }

    async fn handle_list_directories(&self) -> Result<Value, McpDispatchError> {
        let directories = self.storage.list_directories().await.map_err(|error| {
            McpDispatchError::internal(format!("failed to list directories: {error}"))
        })?;

        let mut content = String::from("Directories:\n");
        for directory in &directories {
            content.push_str(&format!(
                "- {} (ID: {})\n  Files: {}, Size: {} bytes\n  Created: {}\n",
                directory.name,
                directory.id,
                directory.file_count,
                directory.total_size,
                directory.created_at.format(CREATED_AT_DISPLAY_FORMAT)
            ));
        }

        Ok(text_content_result(content))
    }

    async fn handle_create_directory(
        &self,
        arguments: &Map<String, Value>,
    ) -> Result<Value, McpDispatchError> {
        let name = required_str_argument(arguments, "name")?;
        let description = optional_str_argument(arguments, "description").unwrap_or_default();

        let receipt = self
            .storage
            .create_directory(name, description)
            .await
            .map_err(|error| {
                McpDispatchError::internal(format!("failed to create directory: {error}"))
            })?;

        Ok(text_content_result(format!(
            "Directory created!\nID: {}\nName: {}\nDescription: {}",
            receipt.directory_id, receipt.name, receipt.description
        )))
    }

    async fn handle_search_files(
        &self,
        arguments: &Map<String, Value>,
    ) -> Result<Value, McpDispatchError> {
        let directory_id = required_str_argument(arguments, "directoryId")?;

        let files = self.storage.list_files(directory_id).await.map_err(|error| {
            McpDispatchError::internal(format!("failed to get directory files: {error}"))
        })?;

        let mut content = format!("Files in directory {directory_id}:\n");
        for file in &files {
            content.push_str(&format!(
                "- {} (ID: {}, Size: {} bytes)\n",
                file.name, file.id, file.size
            ));
        }

        Ok(text_content_result(content))
    }

    async fn handle_backup_file(
        &self,
        arguments: &Map<String, Value>,
    ) -> Result<Value, McpDispatchError> {
        let file_path = required_str_argument(arguments, "filePath")?;
        let directory_override = optional_str_argument(arguments, "directoryId");
        let compress = bool_argument(arguments, "compress");
        let encrypt = bool_argument(arguments, "encrypt");
        let encrypt_password = optional_str_argument(arguments, "encryptPassword");

        let bytes = tokio::fs::read(file_path)
            .await
            .map_err(|error| McpDispatchError::internal(format!("failed to open file: {error}")))?;

        // The stored name records the requested transforms; the payload is
        // uploaded as-is.
        let mut file_name = base_file_name(file_path);
        if compress {
            file_name.push_str(".gz");
        }
        if encrypt {
            file_name.push_str(".enc");
        }

        let directory_id = directory_override.or_else(|| self.storage.default_directory_id());
        let receipt = self
            .storage
            .upload(&file_name, bytes, directory_id)
            .await
            .map_err(|error| {
                McpDispatchError::internal(format!("failed to backup file: {error}"))
            })?;

        let mut content = format!(
            "File backed up successfully!\nFile ID: {}\nFile Name: {}\nSize: {} bytes\nCompression: {}\nEncryption: {}",
            receipt.file_id, receipt.file_name, receipt.size, compress, encrypt
        );
        if encrypt && encrypt_password.is_some() {
            content.push_str("\nEncryption password was provided");
        }

        Ok(text_content_result(content))
    }
}

fn text_content_result(text: String) -> Value {
    json!({
        "content": [
            {
                "type": MCP_CONTENT_TYPE_TEXT,
                "text": text
            }
        ]
    })
}

fn decode_tool_arguments(
    params: &Map<String, Value>,
) -> Result<Map<String, Value>, McpDispatchError> {
    match params.get("arguments") {
        Some(Value::String(raw)) => serde_json::from_str::<Map<String, Value>>(raw).map_err(
            |error| McpDispatchError::invalid_params(format!("failed to parse arguments: {error}")),
        ),
        // Callers that send the mapping directly instead of encoding it are
        // accepted as-is.
        Some(Value::Object(arguments)) => Ok(arguments.clone()),
        Some(_) => Err(McpDispatchError::invalid_params(
            "failed to parse arguments: field must be a JSON-encoded string",
        )),
        None => Err(McpDispatchError::invalid_params(
            "failed to parse arguments: field is missing",
        )),
    }
}

fn required_str_argument<'a>(
    arguments: &'a Map<String, Value>,
    name: &str,
) -> Result<&'a str, McpDispatchError> {
    arguments
        .get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| McpDispatchError::invalid_params(format!("{name} is required")))
}

fn optional_str_argument<'a>(arguments: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    arguments
        .get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn bool_argument(arguments: &Map<String, Value>, name: &str) -> bool {
    arguments.get(name).and_then(Value::as_bool).unwrap_or(false)
}

fn base_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}
