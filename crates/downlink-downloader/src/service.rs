//! Subprocess-based video download (§4.4): invokes the external tool named
//! by `DOWNLINK_DOWNLOAD_TOOL`, streams its stdout for progress, and locates
//! the merged output file on success.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{DownloaderError, DownloaderResult};
use crate::progress::{parse_already_downloaded_line, parse_merger_line, parse_progress_line};

/// Result of a successful download (§4.4's `{filePath, title}` contract).
#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    /// Absolute path to the merged output file inside the job directory.
    pub file_path: PathBuf,
    /// Title read from the tool's `*.info.json` sidecar, if present.
    pub title: Option<String>,
}

/// Tracks in-flight subprocesses so `cancel` can kill the whole process tree.
#[derive(Default)]
struct JobTable {
    pids: HashMap<String, u32>,
    cancelled: HashSet<String>,
}

/// Runs the external download tool and reports progress via a caller-supplied callback.
#[derive(Clone)]
pub struct Downloader {
    tool_path: PathBuf,
    download_root: PathBuf,
    jobs: Arc<Mutex<JobTable>>,
}

impl Downloader {
    /// Builds a downloader that invokes `tool_path` and stages jobs under `download_root`.
    #[must_use]
    pub fn new(tool_path: PathBuf, download_root: PathBuf) -> Self {
        Self {
            tool_path,
            download_root,
            jobs: Arc::new(Mutex::new(JobTable::default())),
        }
    }

    /// Downloads `url` into `<downloadRoot>/<jobId>/`, invoking `on_progress`
    /// for each parsed `[download] N%` line.
    ///
    /// # Errors
    ///
    /// Returns [`DownloaderError::Spawn`]/[`DownloaderError::Io`] on process
    /// or filesystem setup failure, [`DownloaderError::ToolFailed`] on a
    /// nonzero exit, [`DownloaderError::NoOutputFile`] if no output could be
    /// located, or [`DownloaderError::Cancelled`] if `cancel` was called for
    /// this job before it finished.
    pub async fn download_video(
        &self,
        job_id: &str,
        url: &str,
        mut on_progress: impl FnMut(u8) + Send,
    ) -> DownloaderResult<DownloadOutcome> {
        let job_dir = self.download_root.join(job_id);
        fs::create_dir_all(&job_dir)
            .await
            .map_err(|err| DownloaderError::io("create_dir_all", &job_dir, err))?;

        let output_template = job_dir.join(format!("{job_id}.%(ext)s"));
        let mut command = Command::new(&self.tool_path);
        command
            .arg(url)
            .arg("-o")
            .arg(&output_template)
            .arg("--write-info-json")
            .current_dir(&job_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command
            .spawn()
            .map_err(|err| DownloaderError::Spawn {
                tool: self.tool_path.clone(),
                source: err,
            })?;

        if let Some(pid) = child.id() {
            self.jobs.lock().await.pids.insert(job_id.to_string(), pid);
        }

        let stdout = child.stdout.take().expect("piped stdout");
        let stderr = child.stderr.take().expect("piped stderr");
        let mut merged_path: Option<PathBuf> = None;
        let mut stderr_lines = Vec::new();

        let mut stdout_reader = BufReader::new(stdout).lines();
        let mut stderr_reader = BufReader::new(stderr).lines();

        loop {
            tokio::select! {
                line = stdout_reader.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            if let Some(update) = parse_progress_line(&line) {
                                on_progress(update.percent);
                            }
                            if let Some(path) = parse_merger_line(&line).or_else(|| parse_already_downloaded_line(&line)) {
                                merged_path = Some(job_dir.join(PathBuf::from(path).file_name().unwrap_or_default()));
                            }
                        }
                        Ok(None) => break,
                        Err(err) => {
                            warn!(job_id, error = %err, "failed reading download tool stdout");
                            break;
                        }
                    }
                }
                line = stderr_reader.next_line() => {
                    if let Ok(Some(line)) = line {
                        stderr_lines.push(line);
                    }
                }
            }
        }
        while let Ok(Some(line)) = stderr_reader.next_line().await {
            stderr_lines.push(line);
        }

        let status = child
            .wait()
            .await
            .map_err(|err| DownloaderError::io("wait", &job_dir, err))?;

        let was_cancelled = {
            let mut jobs = self.jobs.lock().await;
            jobs.pids.remove(job_id);
            jobs.cancelled.remove(job_id)
        };
        if was_cancelled {
            return Err(DownloaderError::Cancelled {
                job_id: job_id.to_string(),
            });
        }

        if !status.success() {
            return Err(DownloaderError::ToolFailed {
                job_id: job_id.to_string(),
                stderr: stderr_lines.join("\n"),
            });
        }

        let file_path = match merged_path {
            Some(path) if path.is_file() => path,
            _ => newest_output_file(&job_dir, job_id)
                .await
                .ok_or_else(|| DownloaderError::NoOutputFile {
                    job_id: job_id.to_string(),
                })?,
        };

        let title = read_info_json_title(&job_dir).await;
        debug!(job_id, path = %file_path.display(), "download completed");
        Ok(DownloadOutcome { file_path, title })
    }

    /// Kills the job's process tree and marks it cancelled, so its
    /// in-flight [`download_video`](Self::download_video) call resolves
    /// with [`DownloaderError::Cancelled`].
    pub async fn cancel(&self, job_id: &str) {
        let mut jobs = self.jobs.lock().await;
        jobs.cancelled.insert(job_id.to_string());
        if let Some(pid) = jobs.pids.get(job_id).copied() {
            #[cfg(unix)]
            if let Err(err) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                warn!(job_id, %err, "failed to kill download process group");
            }
        }
    }
}

/// Falls back to the newest file with the job's stem when no `Merger`/
/// `already been downloaded` line was seen, per §4.4.
async fn newest_output_file(job_dir: &Path, job_id: &str) -> Option<PathBuf> {
    let mut entries = fs::read_dir(job_dir).await.ok()?;
    let mut best: Option<(std::time::SystemTime, PathBuf)> = None;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let is_candidate = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .is_some_and(|stem| stem == job_id);
        if !is_candidate {
            continue;
        }
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        let Ok(modified) = metadata.modified() else {
            continue;
        };
        if best.as_ref().is_none_or(|(best_time, _)| modified > *best_time) {
            best = Some((modified, path));
        }
    }
    best.map(|(_, path)| path)
}

/// Reads the `title` field out of the first `*.info.json` sidecar found.
async fn read_info_json_title(job_dir: &Path) -> Option<String> {
    let mut entries = fs::read_dir(job_dir).await.ok()?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        if !path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .is_some_and(|stem| stem.ends_with(".info"))
        {
            continue;
        }
        let Ok(contents) = fs::read_to_string(&path).await else {
            continue;
        };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&contents) else {
            continue;
        };
        if let Some(title) = value.get("title").and_then(|v| v.as_str()) {
            return Some(title.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use downlink_test_support::fake_subprocess::{write_failure_script, write_success_script};
    use tempfile::tempdir;

    #[tokio::test]
    async fn download_video_reports_progress_and_resolves_output() {
        let root = tempdir().unwrap();
        let job_id = "job-1";
        let tool = write_success_script(root.path(), job_id, "mkv");
        let downloader = Downloader::new(tool, root.path().to_path_buf());

        let mut observed = Vec::new();
        let outcome = downloader
            .download_video(job_id, "https://example.com/video", |p| observed.push(p))
            .await
            .unwrap();

        assert_eq!(observed, vec![12, 56, 100]);
        assert!(outcome.file_path.ends_with(format!("{job_id}/{job_id}.mkv")));
    }

    #[tokio::test]
    async fn download_video_surfaces_tool_failure() {
        let root = tempdir().unwrap();
        let tool = write_failure_script(root.path(), "Network error");
        let downloader = Downloader::new(tool, root.path().to_path_buf());

        let err = downloader
            .download_video("job-2", "https://example.com/video", |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, DownloaderError::ToolFailed { stderr, .. } if stderr.contains("Network error")));
    }

    #[tokio::test]
    async fn cancel_before_completion_yields_cancelled_error() {
        let root = tempdir().unwrap();
        let job_id = "job-3";
        let tool = write_success_script(root.path(), job_id, "mkv");
        let downloader = Downloader::new(tool, root.path().to_path_buf());

        downloader.cancel(job_id).await;
        let err = downloader
            .download_video(job_id, "https://example.com/video", |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, DownloaderError::Cancelled { .. }));
    }
}
