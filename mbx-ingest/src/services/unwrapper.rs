//! Backup container unwrapping and safe archive extraction
//!
//! Two steps, both fatal on failure:
//! 1. Convert the vendor container into a plain tar archive, either through
//!    an external tool or in-process for unencrypted Android backups.
//! 2. Expand the tar archive into the run's working tree. Every entry path is
//!    sanitized segment by segment and must resolve inside the target
//!    directory; a single escaping entry aborts the whole extraction.

use crate::error::{IngestError, IngestResult};
use async_trait::async_trait;
use flate2::read::{GzDecoder, ZlibDecoder};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Component, Path, PathBuf};
use tar::{Archive, EntryType};
use tracing::{debug, info, warn};

/// Converts a vendor backup container into a tar archive
#[async_trait]
pub trait ContainerUnwrapper: Send + Sync {
    /// Write the tar form of `container` to `tar_path`
    async fn unwrap_to_tar(&self, container: &Path, tar_path: &Path) -> IngestResult<()>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Runs an external unwrap tool (e.g. `java -jar abe.jar unpack IN OUT`)
#[derive(Debug, Clone)]
pub struct ExternalToolUnwrapper {
    program: String,
    args: Vec<String>,
}

impl ExternalToolUnwrapper {
    /// `args` may contain `{input}` and `{output}` placeholders
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn expand_args(&self, container: &Path, tar_path: &Path) -> Vec<String> {
        let input = container.display().to_string();
        let output = tar_path.display().to_string();
        self.args
            .iter()
            .map(|arg| arg.replace("{input}", &input).replace("{output}", &output))
            .collect()
    }
}

#[async_trait]
impl ContainerUnwrapper for ExternalToolUnwrapper {
    async fn unwrap_to_tar(&self, container: &Path, tar_path: &Path) -> IngestResult<()> {
        let args = self.expand_args(container, tar_path);
        debug!(program = %self.program, ?args, "Launching unwrap tool");

        let output = tokio::process::Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                IngestError::ContainerFormat(format!(
                    "failed to launch {}: {}",
                    self.program, e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let detail = if stderr.is_empty() {
                "Unknown error".to_string()
            } else {
                stderr
            };
            warn!(program = %self.program, status = %output.status, "Unwrap tool failed");
            return Err(IngestError::ContainerFormat(detail));
        }

        if !tar_path.is_file() {
            return Err(IngestError::ContainerFormat(format!(
                "{} exited successfully but produced no archive",
                self.program
            )));
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "external"
    }
}

/// In-process decoder for unencrypted Android backup containers
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeUnwrapper;

const ANDROID_BACKUP_MAGIC: &str = "ANDROID BACKUP";
const MAX_HEADER_LINE: u64 = 256;

impl NativeUnwrapper {
    pub fn new() -> Self {
        Self
    }

    /// Parse the four header lines and stream the payload into `tar_path`
    pub fn unwrap_blocking(container: &Path, tar_path: &Path) -> IngestResult<()> {
        let file = File::open(container)?;
        let mut reader = BufReader::new(file);

        let magic = read_header_line(&mut reader)?;
        if magic != ANDROID_BACKUP_MAGIC {
            return Err(IngestError::ContainerFormat(
                "not an Android backup: missing ANDROID BACKUP header".to_string(),
            ));
        }

        let version = read_header_line(&mut reader)?;
        if version.parse::<u32>().is_err() {
            return Err(IngestError::ContainerFormat(format!(
                "invalid backup version line: {:?}",
                version
            )));
        }

        let compressed = match read_header_line(&mut reader)?.as_str() {
            "0" => false,
            "1" => true,
            other => {
                return Err(IngestError::ContainerFormat(format!(
                    "invalid compression flag: {:?}",
                    other
                )))
            }
        };

        let encryption = read_header_line(&mut reader)?;
        if !encryption.eq_ignore_ascii_case("none") {
            return Err(IngestError::ContainerFormat(format!(
                "encrypted backups are not supported (encryption: {})",
                encryption
            )));
        }

        let mut out = File::create(tar_path)?;
        let copied = if compressed {
            io::copy(&mut ZlibDecoder::new(reader), &mut out).map_err(|e| {
                IngestError::ContainerFormat(format!("corrupt compressed payload: {}", e))
            })?
        } else {
            io::copy(&mut reader, &mut out)?
        };

        debug!(version = %version, compressed, bytes = copied, "Decoded Android backup payload");
        Ok(())
    }
}

fn read_header_line<R: BufRead>(reader: &mut R) -> IngestResult<String> {
    let mut line = String::new();
    let read = reader
        .by_ref()
        .take(MAX_HEADER_LINE)
        .read_line(&mut line)
        .map_err(|e| IngestError::ContainerFormat(format!("unreadable header: {}", e)))?;
    if read == 0 || !line.ends_with('\n') {
        return Err(IngestError::ContainerFormat(
            "truncated backup header".to_string(),
        ));
    }
    Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

#[async_trait]
impl ContainerUnwrapper for NativeUnwrapper {
    async fn unwrap_to_tar(&self, container: &Path, tar_path: &Path) -> IngestResult<()> {
        let container = container.to_path_buf();
        let tar_path = tar_path.to_path_buf();
        tokio::task::spawn_blocking(move || Self::unwrap_blocking(&container, &tar_path))
            .await
            .map_err(|e| IngestError::Internal(format!("unwrap task failed: {}", e)))?
    }

    fn name(&self) -> &'static str {
        "native"
    }
}

/// Counters from one extraction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    pub files: usize,
    pub directories: usize,
    /// Links and special entries that were not materialized
    pub skipped_entries: usize,
    pub bytes: u64,
}

/// Replace characters that are illegal in file names on common hosts
pub fn sanitize_segment(segment: &str) -> String {
    segment
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Resolve an archive entry name against `root` without touching the
/// filesystem. Returns `None` when the entry escapes `root`.
pub fn resolve_entry_path(root: &Path, entry: &Path) -> Option<PathBuf> {
    let mut resolved = root.to_path_buf();
    let mut depth = 0usize;

    for component in entry.components() {
        match component {
            Component::Normal(segment) => {
                resolved.push(sanitize_segment(&segment.to_string_lossy()));
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return None;
                }
                resolved.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if depth == 0 || !resolved.starts_with(root) {
        return None;
    }
    Some(resolved)
}

/// Expand a tar archive (plain or gzip-compressed) into `output_dir`.
///
/// Fails with `PathTraversal` on the first entry that would land outside
/// `output_dir`. Symbolic links, hard links and device entries are skipped.
pub fn extract_tar(tar_path: &Path, output_dir: &Path) -> IngestResult<ExtractStats> {
    fs::create_dir_all(output_dir)?;
    let root = output_dir.canonicalize()?;

    let mut magic = [0u8; 2];
    let is_gzip = {
        let mut probe = File::open(tar_path)?;
        probe.read(&mut magic)? == 2 && magic == [0x1f, 0x8b]
    };

    let file = BufReader::new(File::open(tar_path)?);
    if is_gzip {
        extract_entries(Archive::new(GzDecoder::new(file)), &root)
    } else {
        extract_entries(Archive::new(file), &root)
    }
}

fn extract_entries<R: Read>(mut archive: Archive<R>, root: &Path) -> IngestResult<ExtractStats> {
    let mut stats = ExtractStats::default();

    let entries = archive
        .entries()
        .map_err(|e| IngestError::ContainerFormat(format!("unreadable archive: {}", e)))?;

    for entry in entries {
        let mut entry =
            entry.map_err(|e| IngestError::ContainerFormat(format!("corrupt archive entry: {}", e)))?;
        let name = entry
            .path()
            .map_err(|e| IngestError::ContainerFormat(format!("bad entry name: {}", e)))?
            .into_owned();

        let dest = resolve_entry_path(root, &name).ok_or_else(|| {
            warn!(entry = %name.display(), "Archive entry escapes extraction root");
            IngestError::PathTraversal(name.display().to_string())
        })?;

        match entry.header().entry_type() {
            EntryType::Directory => {
                fs::create_dir_all(&dest)?;
                stats.directories += 1;
            }
            EntryType::Regular | EntryType::Continuous | EntryType::GNUSparse => {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                entry.unpack(&dest)?;
                stats.files += 1;
                stats.bytes += entry.size();
            }
            other => {
                debug!(entry = %name.display(), entry_type = ?other, "Skipping non-regular archive entry");
                stats.skipped_entries += 1;
            }
        }
    }

    info!(
        files = stats.files,
        directories = stats.directories,
        skipped = stats.skipped_entries,
        "Archive extracted"
    );
    Ok(stats)
}
