//! Tool implementations for the filesystem MCP server.

use crate::FilesystemServer;
use crate::error::ToolError;
use crate::guard::PathGuard;
use rmcp::{
    handler::server::wrapper::Parameters,
    schemars::{self, JsonSchema},
    tool, tool_router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::io::Write as _;
use std::path::{Path, PathBuf};

/// Directory levels expanded by `directory_tree` when no depth is given.
const DEFAULT_TREE_DEPTH: u32 = 8;

/// Parameters for reading a single file.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReadFileParams {
    /// Path to the file to read.
    pub path: String,
}

/// Parameters for reading multiple files.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReadMultipleFilesParams {
    /// Paths to the files to read.
    pub paths: Vec<String>,
}

/// Parameters for writing a file.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct WriteFileParams {
    /// Path to the file to write.
    pub path: String,
    /// Content to write to the file.
    pub content: String,
}

/// A single text edit operation.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct EditOperation {
    /// The text to search for. Must match the file content exactly once.
    pub old_text: String,
    /// The replacement text.
    pub new_text: String,
}

/// Parameters for editing a file.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct EditFileParams {
    /// Path to the file to edit.
    pub path: String,
    /// List of edit operations to apply sequentially.
    pub edits: Vec<EditOperation>,
    /// If true, return the diff without writing changes.
    pub dry_run: Option<bool>,
}

/// Parameters for creating a directory.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateDirectoryParams {
    /// Path of the directory to create.
    pub path: String,
}

/// Parameters for listing a directory.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListDirectoryParams {
    /// Path to the directory to list.
    pub path: String,
}

/// Parameters for getting a directory tree.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct DirectoryTreeParams {
    /// Path to the root directory for the tree.
    pub path: String,
    /// Maximum number of directory levels to expand below the root.
    pub depth: Option<u32>,
}

/// Parameters for moving a file or directory.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct MoveFileParams {
    /// Source path.
    pub source: String,
    /// Destination path. Must not already exist.
    pub destination: String,
}

/// Parameters for searching files.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchFilesParams {
    /// Base directory to search in.
    pub path: String,
    /// Case-insensitive substring to match against entry names.
    pub pattern: String,
    /// Glob patterns to exclude from results.
    pub exclude_patterns: Option<Vec<String>>,
}

/// Parameters for getting file info.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetFileInfoParams {
    /// Path to the file or directory.
    pub path: String,
}

/// Kind tag for a directory entry.
#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum EntryKind {
    File,
    Directory,
}

/// One entry in a directory listing.
#[derive(Debug, Serialize)]
struct DirEntryInfo {
    name: String,
    kind: EntryKind,
}

/// File metadata returned by `get_file_info`.
#[derive(Debug, Serialize)]
struct FileInfo {
    size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    modified: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    created: Option<String>,
    is_dir: bool,
    is_file: bool,
    is_symlink: bool,
    #[cfg(unix)]
    permissions: String,
}

/// A node in the directory tree. A directory at the depth bound is reported
/// without its children.
#[derive(Debug, Serialize)]
struct TreeNode {
    name: String,
    #[serde(rename = "type")]
    node_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    children: Option<Vec<TreeNode>>,
}

/// Result entry for reading multiple files.
#[derive(Debug, Serialize)]
struct FileReadResult {
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[tool_router]
impl FilesystemServer {
    /// Create a new filesystem server confined to the given directories.
    ///
    /// Fails when none of the directories can be canonicalized.
    pub fn new(allowed_dirs: Vec<PathBuf>) -> std::io::Result<Self> {
        Ok(Self {
            guard: PathGuard::new(allowed_dirs)?,
            tool_router: Self::tool_router(),
        })
    }

    fn resolve(&self, raw: &str) -> Result<PathBuf, String> {
        self.guard
            .resolve(raw)
            .map_err(|e| ToolError::from(e).to_string())
    }

    /// Read the complete contents of a text file.
    #[tool(description = "Read the complete contents of a file from the filesystem")]
    async fn read_file(
        &self,
        Parameters(params): Parameters<ReadFileParams>,
    ) -> Result<String, String> {
        let path = self.resolve(&params.path)?;
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ToolError::io(&path, e).to_string())
    }

    /// Read multiple files simultaneously.
    #[tool(
        description = "Read multiple files simultaneously, returning content or error for each file"
    )]
    async fn read_multiple_files(
        &self,
        Parameters(params): Parameters<ReadMultipleFilesParams>,
    ) -> Result<String, String> {
        let mut results = Vec::with_capacity(params.paths.len());
        for p in &params.paths {
            let entry = match self.resolve(p) {
                Ok(path) => match tokio::fs::read_to_string(&path).await {
                    Ok(content) => FileReadResult {
                        path: p.clone(),
                        content: Some(content),
                        error: None,
                    },
                    Err(e) => FileReadResult {
                        path: p.clone(),
                        content: None,
                        error: Some(ToolError::io(&path, e).to_string()),
                    },
                },
                Err(e) => FileReadResult {
                    path: p.clone(),
                    content: None,
                    error: Some(e),
                },
            };
            results.push(entry);
        }
        serde_json::to_string_pretty(&results).map_err(|e| e.to_string())
    }

    /// Create or overwrite a file.
    #[tool(
        description = "Create a new file or overwrite an existing file with the given content. The parent directory must already exist"
    )]
    async fn write_file(
        &self,
        Parameters(params): Parameters<WriteFileParams>,
    ) -> Result<String, String> {
        let path = self.resolve(&params.path)?;
        write_atomic(&path, &params.content).map_err(|e| e.to_string())?;
        Ok(format!("Successfully wrote to {}", path.display()))
    }

    /// Apply sequential text edits to a file.
    #[tool(
        description = "Apply exact-match text edits to a file; each target must occur exactly once. Either all edits are persisted or none. Set dry_run to preview the diff without writing"
    )]
    async fn edit_file(
        &self,
        Parameters(params): Parameters<EditFileParams>,
    ) -> Result<String, String> {
        let path = self.resolve(&params.path)?;
        let original = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ToolError::io(&path, e).to_string())?;

        let edited = apply_edits(&original, &params.edits).map_err(|e| e.to_string())?;
        let diff = build_diff(&original, &edited);

        if !params.dry_run.unwrap_or(false) {
            write_atomic(&path, &edited).map_err(|e| e.to_string())?;
        }
        Ok(diff)
    }

    /// Create a directory and all parent directories.
    #[tool(
        description = "Create a new directory or ensure a directory exists, creating parent directories as needed"
    )]
    async fn create_directory(
        &self,
        Parameters(params): Parameters<CreateDirectoryParams>,
    ) -> Result<String, String> {
        let path = self.resolve(&params.path)?;
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| ToolError::io(&path, e).to_string())?;
        Ok(format!("Successfully created directory {}", path.display()))
    }

    /// List files and directories in a path.
    #[tool(
        description = "List the entries of a directory as {name, kind} records, sorted lexically by name"
    )]
    async fn list_directory(
        &self,
        Parameters(params): Parameters<ListDirectoryParams>,
    ) -> Result<String, String> {
        let path = self.resolve(&params.path)?;
        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&path)
            .await
            .map_err(|e| ToolError::io(&path, e).to_string())?;
        while let Some(entry) = read_dir.next_entry().await.map_err(|e| e.to_string())? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let ft = entry.file_type().await.map_err(|e| e.to_string())?;
            let kind = if ft.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            entries.push(DirEntryInfo { name, kind });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        serde_json::to_string_pretty(&entries).map_err(|e| e.to_string())
    }

    /// Get a recursive tree view of files and directories.
    #[tool(
        description = "Get a recursive tree view of files and directories as JSON, bounded by depth. Symlinks leaving the allowed directories are not followed"
    )]
    async fn directory_tree(
        &self,
        Parameters(params): Parameters<DirectoryTreeParams>,
    ) -> Result<String, String> {
        let path = self.resolve(&params.path)?;
        let depth = params.depth.unwrap_or(DEFAULT_TREE_DEPTH);
        let tree = build_tree(&self.guard, &path, depth)
            .await
            .map_err(|e| e.to_string())?;
        serde_json::to_string_pretty(&tree).map_err(|e| e.to_string())
    }

    /// Move or rename a file or directory.
    #[tool(
        description = "Move or rename a file or directory. Fails if the destination already exists"
    )]
    async fn move_file(
        &self,
        Parameters(params): Parameters<MoveFileParams>,
    ) -> Result<String, String> {
        // Both endpoints are validated before anything is touched, so a
        // rejected destination leaves the source in place.
        let source = self.resolve(&params.source)?;
        let dest = self.resolve(&params.destination)?;
        if tokio::fs::symlink_metadata(&source).await.is_err() {
            return Err(ToolError::NotFound(source).to_string());
        }
        if tokio::fs::symlink_metadata(&dest).await.is_ok() {
            return Err(ToolError::AlreadyExists(dest).to_string());
        }
        tokio::fs::rename(&source, &dest)
            .await
            .map_err(|e| ToolError::io(&source, e).to_string())?;
        Ok(format!("Moved {} to {}", source.display(), dest.display()))
    }

    /// Search for entries whose names contain a pattern.
    #[tool(
        description = "Recursively search a directory for entries whose names contain the pattern (case-insensitive), returning paths relative to the search base"
    )]
    async fn search_files(
        &self,
        Parameters(params): Parameters<SearchFilesParams>,
    ) -> Result<String, String> {
        let base = self.resolve(&params.path)?;
        if !base.is_dir() {
            return Err(ToolError::NotFound(base).to_string());
        }
        let mut excludes = Vec::new();
        for pattern in params.exclude_patterns.unwrap_or_default() {
            let compiled = glob::Pattern::new(&pattern)
                .map_err(|e| format!("invalid exclude pattern {pattern:?}: {e}"))?;
            excludes.push(compiled);
        }

        let walk = SearchWalk::new(&self.guard, base, &params.pattern, excludes);
        let matches: Vec<String> = walk.map(|rel| rel.display().to_string()).collect();
        if matches.is_empty() {
            Ok("No matches found".into())
        } else {
            Ok(matches.join("\n"))
        }
    }

    /// Get detailed metadata about a file or directory.
    #[tool(description = "Get detailed metadata about a file or directory")]
    async fn get_file_info(
        &self,
        Parameters(params): Parameters<GetFileInfoParams>,
    ) -> Result<String, String> {
        let path = self.resolve(&params.path)?;
        let meta = tokio::fs::symlink_metadata(&path)
            .await
            .map_err(|e| ToolError::io(&path, e).to_string())?;

        let modified = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .and_then(|d| chrono::DateTime::from_timestamp(d.as_secs() as i64, d.subsec_nanos()))
            .map(|dt| dt.to_rfc3339());
        let created = meta
            .created()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .and_then(|d| chrono::DateTime::from_timestamp(d.as_secs() as i64, d.subsec_nanos()))
            .map(|dt| dt.to_rfc3339());

        let info = FileInfo {
            size: meta.len(),
            modified,
            created,
            is_dir: meta.is_dir(),
            is_file: meta.is_file(),
            is_symlink: meta.is_symlink(),
            #[cfg(unix)]
            permissions: {
                use std::os::unix::fs::PermissionsExt;
                format!("{:o}", meta.permissions().mode())
            },
        };
        serde_json::to_string_pretty(&info).map_err(|e| e.to_string())
    }

    /// List the allowed directories this server can access.
    #[tool(description = "List the directories that this server is allowed to access")]
    async fn list_allowed_directories(&self) -> String {
        self.guard
            .roots()
            .iter()
            .map(|d| d.display().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Apply an ordered sequence of exact-match edits to `original`.
///
/// Each `old_text` must occur exactly once in the current content; a missing
/// or ambiguous target fails the whole sequence.
fn apply_edits(original: &str, edits: &[EditOperation]) -> Result<String, ToolError> {
    let mut content = original.to_string();
    for edit in edits {
        match content.matches(edit.old_text.as_str()).count() {
            1 => content = content.replacen(&edit.old_text, &edit.new_text, 1),
            0 => {
                return Err(ToolError::EditConflict(format!(
                    "text not found in file: {:?}",
                    edit.old_text
                )));
            }
            n => {
                return Err(ToolError::EditConflict(format!(
                    "text matches {n} locations, expected exactly one: {:?}",
                    edit.old_text
                )));
            }
        }
    }
    Ok(content)
}

/// Write `content` to `path` atomically via a same-directory temp file.
///
/// The parent directory must already exist; intermediate directories are
/// never created implicitly.
fn write_atomic(path: &Path, content: &str) -> Result<(), ToolError> {
    let parent = path
        .parent()
        .ok_or_else(|| ToolError::NotFound(path.to_path_buf()))?;
    if !parent.is_dir() {
        return Err(ToolError::NotFound(parent.to_path_buf()));
    }
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(content.as_bytes())?;
    tmp.persist(path).map_err(|e| ToolError::Io(e.error))?;
    Ok(())
}

/// Build a simple unified diff between two strings.
fn build_diff(original: &str, modified: &str) -> String {
    let orig_lines: Vec<&str> = original.lines().collect();
    let mod_lines: Vec<&str> = modified.lines().collect();
    let mut diff = String::new();

    let max_len = orig_lines.len().max(mod_lines.len());
    for i in 0..max_len {
        let orig = orig_lines.get(i);
        let modif = mod_lines.get(i);
        match (orig, modif) {
            (Some(o), Some(m)) if o != m => {
                diff.push_str(&format!("-{o}\n+{m}\n"));
            }
            (Some(o), Some(_)) => {
                diff.push_str(&format!(" {o}\n"));
            }
            (Some(o), None) => {
                diff.push_str(&format!("-{o}\n"));
            }
            (None, Some(m)) => {
                diff.push_str(&format!("+{m}\n"));
            }
            (None, None) => {}
        }
    }
    diff
}

/// Recursively build a tree of the filesystem, expanding at most `depth`
/// directory levels below `path`.
///
/// Every child is re-resolved through the guard before descent, so a symlink
/// leading outside the allowed directories is dropped rather than followed.
fn build_tree<'a>(
    guard: &'a PathGuard,
    path: &'a Path,
    depth: u32,
) -> std::pin::Pin<Box<dyn Future<Output = Result<TreeNode, ToolError>> + Send + 'a>> {
    Box::pin(async move {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());

        let meta = tokio::fs::symlink_metadata(path)
            .await
            .map_err(|e| ToolError::io(path, e))?;
        if !meta.is_dir() {
            return Ok(TreeNode {
                name,
                node_type: "file",
                children: None,
            });
        }
        if depth == 0 {
            return Ok(TreeNode {
                name,
                node_type: "directory",
                children: None,
            });
        }

        let mut children = Vec::new();
        let mut read_dir = tokio::fs::read_dir(path)
            .await
            .map_err(|e| ToolError::io(path, e))?;
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| ToolError::io(path, e))?
        {
            let child_path = entry.path();
            if guard.resolve(&child_path).is_err() {
                continue;
            }
            match build_tree(guard, &child_path, depth - 1).await {
                Ok(child) => children.push(child),
                Err(_) => continue, // skip inaccessible entries
            }
        }
        children.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(TreeNode {
            name,
            node_type: "directory",
            children: Some(children),
        })
    })
}

/// Lazy, depth-first walk over a sandboxed directory, yielding entries whose
/// names contain the search pattern.
///
/// Each invocation of `search_files` builds a fresh walk; nothing is shared
/// across calls. Every directory entry is re-resolved through the guard, so
/// the walk never follows a symlink out of the allowed directories.
struct SearchWalk<'a> {
    guard: &'a PathGuard,
    base: PathBuf,
    needle: String,
    excludes: Vec<glob::Pattern>,
    stack: Vec<std::fs::ReadDir>,
}

impl<'a> SearchWalk<'a> {
    fn new(
        guard: &'a PathGuard,
        base: PathBuf,
        pattern: &str,
        excludes: Vec<glob::Pattern>,
    ) -> Self {
        let stack = std::fs::read_dir(&base).map(|rd| vec![rd]).unwrap_or_default();
        Self {
            guard,
            base,
            needle: pattern.to_lowercase(),
            excludes,
            stack,
        }
    }

    fn excluded(&self, relative: &Path) -> bool {
        let rel = relative.to_string_lossy();
        self.excludes.iter().any(|p| p.matches(&rel))
    }
}

impl Iterator for SearchWalk<'_> {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        loop {
            let read_dir = self.stack.last_mut()?;
            let entry = match read_dir.next() {
                None => {
                    self.stack.pop();
                    continue;
                }
                Some(Err(_)) => continue,
                Some(Ok(entry)) => entry,
            };

            let path = entry.path();
            let Ok(resolved) = self.guard.resolve(&path) else {
                continue;
            };
            let relative = match path.strip_prefix(&self.base) {
                Ok(rel) => rel.to_path_buf(),
                Err(_) => continue,
            };
            if self.excluded(&relative) {
                continue;
            }
            if resolved.is_dir() {
                if let Ok(rd) = std::fs::read_dir(&path) {
                    self.stack.push(rd);
                }
            }
            let name = entry.file_name().to_string_lossy().to_lowercase();
            if name.contains(&self.needle) {
                return Some(relative);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::FilesystemServer;
    use crate::tools::{
        DirectoryTreeParams, EditFileParams, EditOperation, GetFileInfoParams,
        ListDirectoryParams, MoveFileParams, ReadFileParams, ReadMultipleFilesParams,
        SearchFilesParams, WriteFileParams,
    };
    use rmcp::handler::server::wrapper::Parameters;
    use std::fs;
    use std::path::Path;

    fn server(root: &Path) -> FilesystemServer {
        FilesystemServer::new(vec![root.to_path_buf()]).expect("server")
    }

    async fn read(server: &FilesystemServer, path: &Path) -> Result<String, String> {
        server
            .read_file(Parameters(ReadFileParams {
                path: path.to_string_lossy().into_owned(),
            }))
            .await
    }

    async fn write(server: &FilesystemServer, path: &Path, content: &str) -> Result<String, String> {
        server
            .write_file(Parameters(WriteFileParams {
                path: path.to_string_lossy().into_owned(),
                content: content.into(),
            }))
            .await
    }

    #[tokio::test]
    async fn write_then_read_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let server = server(tmp.path());
        let file = tmp.path().join("a.txt");
        write(&server, &file, "hello").await.expect("write");
        assert_eq!(read(&server, &file).await.expect("read"), "hello");
        // unchanged file reads identically
        assert_eq!(read(&server, &file).await.expect("read"), "hello");
    }

    #[tokio::test]
    async fn read_escape_via_dotdot_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("sandbox");
        fs::create_dir(&root).unwrap();
        fs::write(tmp.path().join("secret.txt"), "s").unwrap();
        let server = server(&root);
        let escape = root.join("..").join("secret.txt");
        let err = read(&server, &escape).await.unwrap_err();
        assert!(err.contains("outside the allowed directories"), "{err}");
    }

    #[tokio::test]
    async fn read_missing_file_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let server = server(tmp.path());
        let err = read(&server, &tmp.path().join("nope.txt")).await.unwrap_err();
        assert!(err.contains("not found"), "{err}");
    }

    #[tokio::test]
    async fn write_missing_parent_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let server = server(tmp.path());
        let err = write(&server, &tmp.path().join("missing").join("a.txt"), "x")
            .await
            .unwrap_err();
        assert!(err.contains("not found"), "{err}");
        assert!(!tmp.path().join("missing").exists());
    }

    #[tokio::test]
    async fn read_multiple_files_isolates_failures() {
        let tmp = tempfile::tempdir().unwrap();
        let server = server(tmp.path());
        let good = tmp.path().join("good.txt");
        fs::write(&good, "ok").unwrap();
        let out = server
            .read_multiple_files(Parameters(ReadMultipleFilesParams {
                paths: vec![
                    good.to_string_lossy().into_owned(),
                    tmp.path().join("bad.txt").to_string_lossy().into_owned(),
                ],
            }))
            .await
            .expect("batch succeeds");
        assert!(out.contains("\"content\": \"ok\""));
        assert!(out.contains("not found"));
    }

    #[tokio::test]
    async fn edit_applies_ordered_edits() {
        let tmp = tempfile::tempdir().unwrap();
        let server = server(tmp.path());
        let file = tmp.path().join("a.txt");
        fs::write(&file, "alpha beta\n").unwrap();
        server
            .edit_file(Parameters(EditFileParams {
                path: file.to_string_lossy().into_owned(),
                edits: vec![
                    EditOperation {
                        old_text: "alpha".into(),
                        new_text: "gamma".into(),
                    },
                    EditOperation {
                        old_text: "gamma beta".into(),
                        new_text: "done".into(),
                    },
                ],
                dry_run: None,
            }))
            .await
            .expect("edit");
        assert_eq!(fs::read_to_string(&file).unwrap(), "done\n");
    }

    #[tokio::test]
    async fn edit_failed_second_edit_leaves_file_unchanged() {
        let tmp = tempfile::tempdir().unwrap();
        let server = server(tmp.path());
        let file = tmp.path().join("a.txt");
        fs::write(&file, "alpha beta\n").unwrap();
        let err = server
            .edit_file(Parameters(EditFileParams {
                path: file.to_string_lossy().into_owned(),
                edits: vec![
                    EditOperation {
                        old_text: "alpha".into(),
                        new_text: "gamma".into(),
                    },
                    EditOperation {
                        old_text: "does-not-exist".into(),
                        new_text: "x".into(),
                    },
                ],
                dry_run: None,
            }))
            .await
            .unwrap_err();
        assert!(err.contains("edit conflict"), "{err}");
        assert_eq!(fs::read_to_string(&file).unwrap(), "alpha beta\n");
    }

    #[tokio::test]
    async fn edit_ambiguous_target_is_a_conflict() {
        let tmp = tempfile::tempdir().unwrap();
        let server = server(tmp.path());
        let file = tmp.path().join("a.txt");
        fs::write(&file, "dup dup\n").unwrap();
        let err = server
            .edit_file(Parameters(EditFileParams {
                path: file.to_string_lossy().into_owned(),
                edits: vec![EditOperation {
                    old_text: "dup".into(),
                    new_text: "x".into(),
                }],
                dry_run: None,
            }))
            .await
            .unwrap_err();
        assert!(err.contains("2 locations"), "{err}");
        assert_eq!(fs::read_to_string(&file).unwrap(), "dup dup\n");
    }

    #[tokio::test]
    async fn edit_dry_run_previews_without_writing() {
        let tmp = tempfile::tempdir().unwrap();
        let server = server(tmp.path());
        let file = tmp.path().join("a.txt");
        fs::write(&file, "alpha\n").unwrap();
        let diff = server
            .edit_file(Parameters(EditFileParams {
                path: file.to_string_lossy().into_owned(),
                edits: vec![EditOperation {
                    old_text: "alpha".into(),
                    new_text: "beta".into(),
                }],
                dry_run: Some(true),
            }))
            .await
            .expect("dry run");
        assert!(diff.contains("-alpha"));
        assert!(diff.contains("+beta"));
        assert_eq!(fs::read_to_string(&file).unwrap(), "alpha\n");
    }

    #[tokio::test]
    async fn list_directory_sorted_with_kind_tags() {
        let tmp = tempfile::tempdir().unwrap();
        let server = server(tmp.path());
        fs::write(tmp.path().join("b.txt"), "b").unwrap();
        fs::write(tmp.path().join("a.txt"), "a").unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        let out = server
            .list_directory(Parameters(ListDirectoryParams {
                path: tmp.path().to_string_lossy().into_owned(),
            }))
            .await
            .expect("list");
        let entries: serde_json::Value = serde_json::from_str(&out).unwrap();
        let names: Vec<&str> = entries
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "sub"]);
        assert_eq!(entries[0]["kind"], "file");
        assert_eq!(entries[2]["kind"], "directory");
    }

    #[tokio::test]
    async fn directory_tree_respects_depth_bound() {
        let tmp = tempfile::tempdir().unwrap();
        let server = server(tmp.path());
        let deep = tmp.path().join("sub").join("inner");
        fs::create_dir_all(&deep).unwrap();
        fs::write(deep.join("leaf.txt"), "x").unwrap();
        let out = server
            .directory_tree(Parameters(DirectoryTreeParams {
                path: tmp.path().to_string_lossy().into_owned(),
                depth: Some(1),
            }))
            .await
            .expect("tree");
        let tree: serde_json::Value = serde_json::from_str(&out).unwrap();
        let sub = &tree["children"][0];
        assert_eq!(sub["name"], "sub");
        assert_eq!(sub["type"], "directory");
        // at the bound the directory is reported unexpanded
        assert!(sub.get("children").is_none());
        assert!(!out.contains("leaf.txt"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn directory_tree_skips_escaping_symlink() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("root");
        let outside = tmp.path().join("outside");
        fs::create_dir(&root).unwrap();
        fs::create_dir(&outside).unwrap();
        fs::write(outside.join("secret.txt"), "s").unwrap();
        std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();
        let server = server(&root);
        let out = server
            .directory_tree(Parameters(DirectoryTreeParams {
                path: root.to_string_lossy().into_owned(),
                depth: None,
            }))
            .await
            .expect("tree");
        assert!(out.contains("a.txt"));
        assert!(!out.contains("link"));
        assert!(!out.contains("secret.txt"));
    }

    #[tokio::test]
    async fn move_refuses_existing_destination() {
        let tmp = tempfile::tempdir().unwrap();
        let server = server(tmp.path());
        fs::write(tmp.path().join("src.txt"), "src").unwrap();
        fs::write(tmp.path().join("dst.txt"), "dst").unwrap();
        let err = server
            .move_file(Parameters(MoveFileParams {
                source: tmp.path().join("src.txt").to_string_lossy().into_owned(),
                destination: tmp.path().join("dst.txt").to_string_lossy().into_owned(),
            }))
            .await
            .unwrap_err();
        assert!(err.contains("already exists"), "{err}");
        assert_eq!(fs::read_to_string(tmp.path().join("src.txt")).unwrap(), "src");
        assert_eq!(fs::read_to_string(tmp.path().join("dst.txt")).unwrap(), "dst");
    }

    #[tokio::test]
    async fn move_outside_root_changes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("root");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("src.txt"), "src").unwrap();
        let server = server(&root);
        let err = server
            .move_file(Parameters(MoveFileParams {
                source: root.join("src.txt").to_string_lossy().into_owned(),
                destination: tmp
                    .path()
                    .join("stolen.txt")
                    .to_string_lossy()
                    .into_owned(),
            }))
            .await
            .unwrap_err();
        assert!(err.contains("outside the allowed directories"), "{err}");
        assert!(root.join("src.txt").exists());
        assert!(!tmp.path().join("stolen.txt").exists());
    }

    #[tokio::test]
    async fn search_returns_relative_matches() {
        let tmp = tempfile::tempdir().unwrap();
        let server = server(tmp.path());
        let sub = tmp.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("note_MATCH.txt"), "x").unwrap();
        fs::write(tmp.path().join("other.txt"), "x").unwrap();
        let out = server
            .search_files(Parameters(SearchFilesParams {
                path: tmp.path().to_string_lossy().into_owned(),
                pattern: "match".into(),
                exclude_patterns: None,
            }))
            .await
            .expect("search");
        assert_eq!(out, "sub/note_MATCH.txt");
    }

    #[tokio::test]
    async fn search_applies_exclude_patterns() {
        let tmp = tempfile::tempdir().unwrap();
        let server = server(tmp.path());
        fs::write(tmp.path().join("keep_match.txt"), "x").unwrap();
        fs::write(tmp.path().join("drop_match.log"), "x").unwrap();
        let out = server
            .search_files(Parameters(SearchFilesParams {
                path: tmp.path().to_string_lossy().into_owned(),
                pattern: "match".into(),
                exclude_patterns: Some(vec!["*.log".into()]),
            }))
            .await
            .expect("search");
        assert_eq!(out, "keep_match.txt");
    }

    #[tokio::test]
    async fn search_without_matches_reports_none() {
        let tmp = tempfile::tempdir().unwrap();
        let server = server(tmp.path());
        let out = server
            .search_files(Parameters(SearchFilesParams {
                path: tmp.path().to_string_lossy().into_owned(),
                pattern: "absent".into(),
                exclude_patterns: None,
            }))
            .await
            .expect("search");
        assert_eq!(out, "No matches found");
    }

    #[tokio::test]
    async fn get_file_info_reports_size_and_kind() {
        let tmp = tempfile::tempdir().unwrap();
        let server = server(tmp.path());
        fs::write(tmp.path().join("a.txt"), "hello").unwrap();
        let out = server
            .get_file_info(Parameters(GetFileInfoParams {
                path: tmp.path().join("a.txt").to_string_lossy().into_owned(),
            }))
            .await
            .expect("info");
        assert!(out.contains("\"size\": 5"));
        assert!(out.contains("\"is_file\": true"));
        assert!(out.contains("\"is_dir\": false"));
    }

    #[tokio::test]
    async fn list_allowed_directories_reports_roots() {
        let tmp = tempfile::tempdir().unwrap();
        let server = server(tmp.path());
        let out = server.list_allowed_directories().await;
        let canonical = tmp.path().canonicalize().unwrap();
        assert_eq!(out, canonical.display().to_string());
    }
}
