use serde_json::{json, Value};

pub const TOOL_UPLOAD_FILE: &str = "upload_file";
pub const TOOL_DOWNLOAD_FILE: &str = "download_file";
pub const TOOL_LIST_DIRECTORIES: &str = "list_directories";
pub const TOOL_CREATE_DIRECTORY: &str = "create_directory";
pub const TOOL_SEARCH_FILES: &str = "search_files";
pub const TOOL_BACKUP_FILE: &str = "backup_file";

pub const STORAGE_TOOL_NAMES: &[&str] = &[
    TOOL_UPLOAD_FILE,
    TOOL_DOWNLOAD_FILE,
    TOOL_LIST_DIRECTORIES,
    TOOL_CREATE_DIRECTORY,
    TOOL_SEARCH_FILES,
    TOOL_BACKUP_FILE,
];

/// Static descriptor list served by `tools/list`. The catalog is fixed; the
/// dispatcher rejects any `tools/call` name outside it.
pub fn storage_tool_catalog() -> Vec<Value> {
    vec![
        json!({
            "name": TOOL_UPLOAD_FILE,
            "description": "Upload a file to Arca Storage",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "filePath": {
                        "type": "string",
                        "description": "Path to the file to upload"
                    },
                    "directoryId": {
                        "type": "string",
                        "description": "Directory ID to upload to (optional)"
                    }
                },
                "required": ["filePath"]
            }
        }),
        json!({
            "name": TOOL_DOWNLOAD_FILE,
            "description": "Download a file from Arca Storage",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "fileId": {
                        "type": "string",
                        "description": "ID of the file to download"
                    },
                    "outputPath": {
                        "type": "string",
                        "description": "Path where to save the downloaded file"
                    }
                },
                "required": ["fileId", "outputPath"]
            }
        }),
        json!({
            "name": TOOL_LIST_DIRECTORIES,
            "description": "List all directories in Arca Storage",
            "inputSchema": {
                "type": "object",
                "properties": {}
            }
        }),
        json!({
            "name": TOOL_CREATE_DIRECTORY,
            "description": "Create a new directory in Arca Storage",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "Name of the directory"
                    },
                    "description": {
                        "type": "string",
                        "description": "Description of the directory"
                    }
                },
                "required": ["name"]
            }
        }),
        json!({
            "name": TOOL_SEARCH_FILES,
            "description": "List files in a directory",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "directoryId": {
                        "type": "string",
                        "description": "Directory ID to search in"
                    }
                },
                "required": ["directoryId"]
            }
        }),
        json!({
            "name": TOOL_BACKUP_FILE,
            "description": "Backup a file with optional compression and encryption",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "filePath": {
                        "type": "string",
                        "description": "Path to the file to backup"
                    },
                    "directoryId": {
                        "type": "string",
                        "description": "Directory ID to backup to (optional)"
                    },
                    "compress": {
                        "type": "boolean",
                        "description": "Compress the file before backup"
                    },
                    "encrypt": {
                        "type": "boolean",
                        "description": "Encrypt the file before backup"
                    },
                    "encryptPassword": {
                        "type": "string",
                        "description": "Password for encryption (optional)"
                    }
                },
                "required": ["filePath"]
            }
        }),
    ]
}
