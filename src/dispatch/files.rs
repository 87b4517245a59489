//! Stored-file behaviors shared by the script, file and data handlers

use super::analysis::TextStats;
use super::DispatchError;
use crate::command::StructuredCommand;
use crate::storage::{extension_of, FileStore, FileStoreError, StoredFile};

/// Read previews longer than this many characters are truncated
pub const PREVIEW_LIMIT: usize = 500;

/// Extensions whose content is shown inside a fenced code block
pub const FENCED_EXTENSIONS: [&str; 12] = [
    "js", "ts", "py", "json", "html", "css", "md", "rs", "sh", "toml", "yaml", "yml",
];

const SCRIPT_EXTENSIONS: [&str; 7] = ["js", "ts", "py", "sh", "rb", "rs", "go"];
const DOCUMENT_EXTENSIONS: [&str; 6] = ["md", "txt", "html", "doc", "docx", "pdf"];

/// Output style for `read`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStyle {
    /// Raw content, fenced for known code extensions
    Raw,
    /// Line/word/character counts followed by the preview
    Stats,
}

/// Truncate to [`PREVIEW_LIMIT`] characters, appending `...` when cut
pub fn preview(content: &str) -> String {
    match content.char_indices().nth(PREVIEW_LIMIT) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

fn fence(filename: &str, body: &str) -> String {
    match extension_of(filename) {
        Some(ext) if FENCED_EXTENSIONS.contains(&ext.as_str()) => {
            format!("```{ext}\n{body}\n```")
        }
        _ => body.to_string(),
    }
}

/// Map store failures to either a user-facing message or a propagated error
fn failure(
    handler_id: &str,
    verb: &str,
    name: &str,
    err: FileStoreError,
) -> Result<Option<String>, DispatchError> {
    match err {
        FileStoreError::NotFound(_) => Ok(Some(format!(
            "Failed to {verb} '{name}': file not found"
        ))),
        err if err.is_user_facing() => Ok(Some(format!("Failed to {verb} '{name}': {err}"))),
        err => Err(DispatchError::store(handler_id, err)),
    }
}

pub async fn create(
    store: &dyn FileStore,
    handler_id: &str,
    command: &StructuredCommand,
) -> Result<Option<String>, DispatchError> {
    let Some(filename) = command.param("filename").or_else(|| command.param("name")) else {
        return Ok(Some(
            "Cannot create a file without a name. Try: create <type> <name> with content: <text>"
                .to_string(),
        ));
    };
    let kind = command.param("type").unwrap_or("file");
    let content = command.param("content").unwrap_or_default();

    match store.save(filename, content).await {
        Ok(saved) => Ok(Some(format!(
            "Created {kind} '{}' at {} ({} bytes)",
            saved.name, saved.path, saved.size
        ))),
        Err(err) => failure(handler_id, "create", filename, err),
    }
}

pub async fn read(
    store: &dyn FileStore,
    handler_id: &str,
    command: &StructuredCommand,
    style: ReadStyle,
) -> Result<Option<String>, DispatchError> {
    let Some(filename) = command.param("filename") else {
        return Ok(Some(
            "Which file should I read? Try: read <name.ext>".to_string(),
        ));
    };

    let content = match store.read(filename).await {
        Ok(content) => content,
        Err(err) => return failure(handler_id, "read", filename, err),
    };

    let body = preview(&content);
    let message = match style {
        ReadStyle::Raw => format!("Contents of {filename}:\n\n{}", fence(filename, &body)),
        ReadStyle::Stats => {
            let stats = TextStats::of(&content);
            format!(
                "File: {filename}\n- Lines: {}\n- Words: {}\n- Characters: {}\n\n{body}",
                stats.lines, stats.words, stats.characters
            )
        }
    };
    Ok(Some(message))
}

fn matches_target(target: &str, file: &StoredFile) -> bool {
    let ext = extension_of(&file.name);
    let ext = ext.as_deref().unwrap_or_default();
    match target {
        "scripts" => SCRIPT_EXTENSIONS.contains(&ext),
        "documents" => DOCUMENT_EXTENSIONS.contains(&ext),
        _ => true,
    }
}

/// `files`, `scripts` and `documents` are handled; any other target is a miss
pub async fn list(
    store: &dyn FileStore,
    handler_id: &str,
    command: &StructuredCommand,
) -> Result<Option<String>, DispatchError> {
    let target = command.param("target").unwrap_or("files").to_lowercase();
    if !matches!(target.as_str(), "files" | "scripts" | "documents") {
        return Ok(None);
    }

    let files = store
        .list()
        .await
        .map_err(|err| DispatchError::store(handler_id, err))?;
    let selected: Vec<&StoredFile> = files.iter().filter(|f| matches_target(&target, f)).collect();

    if selected.is_empty() {
        return Ok(Some(format!("No {target} found.")));
    }

    let mut output = format!("Stored {target} ({}):", selected.len());
    for file in selected {
        output.push_str(&format!("\n- {} ({} bytes)", file.name, file.size));
    }
    Ok(Some(output))
}

pub async fn delete(
    store: &dyn FileStore,
    handler_id: &str,
    command: &StructuredCommand,
) -> Result<Option<String>, DispatchError> {
    let Some(filename) = command.param("filename") else {
        return Ok(Some(
            "Which file should I delete? Try: delete <name.ext>".to_string(),
        ));
    };

    match store.delete(filename).await {
        Ok(()) => Ok(Some(format!("Deleted '{filename}'"))),
        Err(err) => failure(handler_id, "delete", filename, err),
    }
}
