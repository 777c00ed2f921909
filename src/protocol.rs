//! Shared wire types for talking to the automation bridge process.
//!
//! The protocol is JSON-over-stdio: one JSON object per line in each
//! direction. Requests flow from macrodrive to the bridge, responses flow
//! back; the bridge's stderr carries diagnostics only.

use serde::{Deserialize, Serialize};

/// A command sent from macrodrive to the bridge process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Monotonically increasing request ID for correlating responses.
    pub id: u64,
    /// The command to execute.
    #[serde(flatten)]
    pub command: Command,
}

/// Commands the client can send to the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", content = "params", rename_all = "kebab-case")]
pub enum Command {
    /// Launch the spreadsheet application hidden, with interactive dialogs,
    /// security prompts, and link-update prompts disabled on the instance.
    Init,

    /// Open a workbook from a file path. Returns a workbook handle.
    OpenWorkbook { path: String, options: OpenOptions },

    /// Add a named code module to the workbook's automation project and
    /// write `source` into it. The module lives and dies with the document.
    InjectModule {
        workbook: u64,
        name: String,
        source: String,
    },

    /// Invoke a routine by name at application level. The routine must be
    /// defined in a module of an open workbook.
    RunMacro { name: String },

    /// Save the workbook to a file path in the given format, resolving any
    /// save conflicts in favor of the local session.
    SaveWorkbook {
        workbook: u64,
        path: String,
        format: SaveFormat,
    },

    /// Close a workbook, discarding unsaved changes unless `save_changes`.
    CloseWorkbook { workbook: u64, save_changes: bool },

    /// Quit the application and exit the bridge process.
    Quit,
}

/// Flags applied when opening a workbook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenOptions {
    pub read_only: bool,
    /// Never follow external links on open.
    pub update_links: bool,
    /// Suppress the "open as read-only recommended" prompt.
    pub ignore_read_only_recommended: bool,
    /// Tolerate recoverable corruption instead of prompting.
    pub repair_corrupt: bool,
}

impl OpenOptions {
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            update_links: false,
            ignore_read_only_recommended: true,
            repair_corrupt: true,
        }
    }

    pub fn read_write() -> Self {
        Self {
            read_only: false,
            ..Self::read_only()
        }
    }
}

/// Target save formats. The host maps these to its own format constants
/// (Excel: `open-xml-workbook` is file format 51, xlOpenXMLWorkbook).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SaveFormat {
    OpenXmlWorkbook,
}

/// A response sent from the bridge back to macrodrive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// The request ID this response corresponds to.
    pub id: u64,
    /// The result of the command.
    #[serde(flatten)]
    pub result: ResponseResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum ResponseResult {
    #[serde(rename = "ok")]
    Ok {
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<ResponseData>,
    },
    #[serde(rename = "error")]
    Error { message: String },
}

/// Data returned in successful responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseData {
    /// Handle to an opened workbook.
    WorkbookHandle { workbook: u64 },
}
