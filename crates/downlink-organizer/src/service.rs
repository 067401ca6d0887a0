//! Moves or copies a completed download's file into a library folder, laid
//! out as `<libraryPath>/<Movies|Series|Other>/<title>[/Season NN]/<sanitized-filename>.<ext>`.

use std::path::{Path, PathBuf};

use downlink_data::Category;
use uuid::Uuid;

use crate::error::{OrganizerError, OrganizerResult};
use crate::model::Placement;

/// Characters stripped during sanitization, per §6's filesystem layout rule.
const FORBIDDEN_CHARS: &[char] = &[':', '<', '>', '"', '|', '?', '*'];

/// Strips `: < > " | ? *` and collapses runs of whitespace into a single space.
#[must_use]
pub fn sanitize_component(raw: &str) -> String {
    let stripped: String = raw.chars().filter(|c| !FORBIDDEN_CHARS.contains(c)).collect();
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim();
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Formats `SNNENN`, defaulting missing season/episode to `1` (§6).
#[must_use]
pub fn season_episode_label(season: Option<i64>, episode: Option<i64>) -> String {
    let season = season.unwrap_or(1).max(0);
    let episode = episode.unwrap_or(1).max(0);
    format!("S{season:02}E{episode:02}")
}

/// Computes the destination path for `placement`, given the source file's
/// extension and a `library_path` root. Does not touch the filesystem.
///
/// # Errors
///
/// Returns [`OrganizerError::MissingExtension`] if `source` has no extension.
pub fn destination_path(
    library_path: &Path,
    placement: &Placement<'_>,
    source: &Path,
) -> OrganizerResult<PathBuf> {
    let extension = source
        .extension()
        .and_then(|ext| ext.to_str())
        .ok_or_else(|| OrganizerError::MissingExtension {
            path: source.to_path_buf(),
        })?;

    let title_dir = sanitize_component(placement.title);
    let mut destination = library_path.join(placement.category.dir_name()).join(&title_dir);

    let file_stem = if placement.category == Category::Tv {
        let label = season_episode_label(placement.season, placement.episode);
        destination = destination.join(format!("Season {:02}", placement.season.unwrap_or(1).max(0)));
        format!("{title_dir} {label}")
    } else {
        title_dir.clone()
    };

    Ok(destination.join(format!("{}.{extension}", sanitize_component(&file_stem))))
}

/// Moves `source` to `destination`, creating parent directories as needed.
/// Falls back to copy-then-remove when `rename` fails across filesystems
/// (`EXDEV`), matching the teacher's `copy_tree`/`move_tree` fallback idiom.
///
/// # Errors
///
/// Returns [`OrganizerError::MissingSource`] if `source` does not exist, or
/// [`OrganizerError::Io`] if directory creation, rename, or copy fails.
pub fn place_into_library(source: &Path, destination: &Path) -> OrganizerResult<()> {
    if !source.is_file() {
        return Err(OrganizerError::MissingSource {
            path: source.to_path_buf(),
        });
    }
    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent).map_err(|err| OrganizerError::io("create_dir_all", parent, err))?;
    }
    match std::fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(_) => {
            std::fs::copy(source, destination)
                .map_err(|err| OrganizerError::io("copy", destination, err))?;
            std::fs::remove_file(source).map_err(|err| OrganizerError::io("remove_file", source, err))?;
            Ok(())
        }
    }
}

/// Reverses a library placement: copies the file back to
/// `<downloadRoot>/<downloadId>/<downloadId>.<ext>`, the staging layout
/// `/downloads/{id}/unmove` restores (§6).
///
/// # Errors
///
/// Returns [`OrganizerError::MissingSource`] if `source` does not exist, or
/// [`OrganizerError::Io`] on a filesystem failure.
pub fn restore_to_staging(
    source: &Path,
    download_root: &Path,
    download_id: Uuid,
) -> OrganizerResult<PathBuf> {
    if !source.is_file() {
        return Err(OrganizerError::MissingSource {
            path: source.to_path_buf(),
        });
    }
    let extension = source
        .extension()
        .and_then(|ext| ext.to_str())
        .ok_or_else(|| OrganizerError::MissingExtension {
            path: source.to_path_buf(),
        })?;
    let job_dir = download_root.join(download_id.to_string());
    std::fs::create_dir_all(&job_dir).map_err(|err| OrganizerError::io("create_dir_all", &job_dir, err))?;
    let destination = job_dir.join(format!("{download_id}.{extension}"));
    place_into_library(source, &destination)?;
    Ok(destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn sanitize_component_strips_forbidden_chars_and_collapses_whitespace() {
        assert_eq!(
            sanitize_component("Ep: 1 <special>  title"),
            "Ep 1 special title"
        );
        assert_eq!(sanitize_component("   "), "untitled");
    }

    #[test]
    fn season_episode_label_defaults_to_s01e01() {
        assert_eq!(season_episode_label(None, None), "S01E01");
        assert_eq!(season_episode_label(Some(2), Some(5)), "S02E05");
    }

    #[test]
    fn destination_path_lays_out_movies_without_season_dir() {
        let placement = Placement {
            category: Category::Movies,
            title: "My Movie: Director's Cut",
            season: None,
            episode: None,
        };
        let path = destination_path(Path::new("/media"), &placement, Path::new("/tmp/a.mkv")).unwrap();
        assert_eq!(
            path,
            PathBuf::from("/media/Movies/My Movie Director's Cut/My Movie Director's Cut.mkv")
        );
    }

    #[test]
    fn destination_path_lays_out_tv_with_season_dir() {
        let placement = Placement {
            category: Category::Tv,
            title: "Anime",
            season: None,
            episode: None,
        };
        let path = destination_path(Path::new("/media"), &placement, Path::new("/tmp/a.mkv")).unwrap();
        assert_eq!(
            path,
            PathBuf::from("/media/Series/Anime/Season 01/Anime S01E01.mkv")
        );
    }

    #[test]
    fn destination_path_rejects_missing_extension() {
        let placement = Placement {
            category: Category::Other,
            title: "Thing",
            season: None,
            episode: None,
        };
        let err = destination_path(Path::new("/media"), &placement, Path::new("/tmp/noext")).unwrap_err();
        assert!(matches!(err, OrganizerError::MissingExtension { .. }));
    }

    #[test]
    fn place_into_library_moves_file_and_creates_parents() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source.mkv");
        std::fs::write(&source, b"bytes").unwrap();
        let destination = dir.path().join("Movies/Title/Title.mkv");

        place_into_library(&source, &destination).unwrap();

        assert!(!source.exists());
        assert_eq!(std::fs::read(&destination).unwrap(), b"bytes");
    }

    #[test]
    fn restore_to_staging_writes_under_download_root() {
        let dir = tempdir().unwrap();
        let library_file = dir.path().join("library.mkv");
        std::fs::write(&library_file, b"bytes").unwrap();
        let download_root = dir.path().join("downloads");
        let download_id = Uuid::new_v4();

        let restored = restore_to_staging(&library_file, &download_root, download_id).unwrap();

        assert_eq!(
            restored,
            download_root.join(download_id.to_string()).join(format!("{download_id}.mkv"))
        );
        assert!(restored.exists());
    }
}
