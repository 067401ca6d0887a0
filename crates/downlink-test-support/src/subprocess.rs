//! A tiny shell-script stand-in for the external download tool, so
//! `downlink-downloader`'s tests exercise the real `tokio::process::Command`
//! path deterministically instead of mocking it away.

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Writes a script that prints a sequence of `[download] N.N%` progress
/// lines, a `Merger` line naming the output file, then exits `0`. Mirrors the
/// real tool's stdout contract closely enough for `downlink-downloader`'s
/// parser to exercise its real code path.
///
/// # Panics
///
/// Panics if the script cannot be written or made executable.
pub fn write_success_script(dir: &Path, job_id: &str, extension: &str) -> PathBuf {
    let output_name = format!("{job_id}.{extension}");
    let script = format!(
        "#!/bin/sh\n\
         set -e\n\
         echo '[download]  12.0% of 50.00MiB at 1.00MiB/s ETA 00:40'\n\
         echo '[download]  56.0% of 50.00MiB at 1.20MiB/s ETA 00:18'\n\
         echo '[download] 100.0% of 50.00MiB at 1.50MiB/s ETA 00:00'\n\
         touch \"$1/{output_name}\"\n\
         echo \"[Merger] Merging formats into \\\"$1/{output_name}\\\"\"\n\
         exit 0\n"
    );
    write_script(dir, "fake-download-tool.sh", &script)
}

/// Writes a script that prints a progress line, then fails with `message` on stderr.
///
/// # Panics
///
/// Panics if the script cannot be written or made executable.
pub fn write_failure_script(dir: &Path, message: &str) -> PathBuf {
    let script = format!(
        "#!/bin/sh\n\
         echo '[download]  4.0% of 50.00MiB at 0.10MiB/s ETA 08:00'\n\
         echo '{message}' 1>&2\n\
         exit 1\n"
    );
    write_script(dir, "fake-download-tool-fail.sh", &script)
}

fn write_script(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).expect("create fake subprocess script");
    file.write_all(contents.as_bytes())
        .expect("write fake subprocess script");
    let mut perms = file.metadata().expect("stat fake subprocess script").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod fake subprocess script");
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_success_script_is_executable() {
        let dir = tempdir().unwrap();
        let path = write_success_script(dir.path(), "job-1", "mkv");
        let perms = std::fs::metadata(&path).unwrap().permissions();
        assert_eq!(perms.mode() & 0o111, 0o111);
    }

    #[test]
    fn write_failure_script_embeds_message() {
        let dir = tempdir().unwrap();
        let path = write_failure_script(dir.path(), "Network error");
        let contents = std::fs::read_to_string(path).unwrap();
        assert!(contents.contains("Network error"));
    }
}
