//! Sequencer: gives every image in the input directory a stable position.
//!
//! Images are ordered by modification time, oldest first. Ties fall back to
//! file name so the result does not depend on directory listing order.
//!
//! In [`SequenceMode::Rename`] the files are renamed to `<position>.<ext>`.
//! That happens in two phases through unique staging names, so renaming an
//! already-numbered folder can never overwrite a file. An image that cannot
//! take its position is moved back to its original name when that is free.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use uuid::Uuid;

pub use imgscribe_core::SequenceMode;
use imgscribe_core::{is_supported_image, BatchError, ImageItem, SequencedItem, SequencingError};

/// Supported images found in a directory, plus entries that could not be read.
#[derive(Debug, Default)]
pub struct Listing {
    pub images: Vec<ImageItem>,
    pub skipped: Vec<SequencingError>,
}

/// Positioned images ready for dispatch, plus files left out of the batch.
#[derive(Debug, Default)]
pub struct SequencingOutcome {
    pub items: Vec<SequencedItem>,
    pub skipped: Vec<SequencingError>,
}

/// List the supported images directly inside `dir`.
pub async fn list_images(dir: &Path) -> Result<Listing, BatchError> {
    match tokio::fs::metadata(dir).await {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Err(BatchError::DirectoryNotFound(dir.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(BatchError::DirectoryNotFound(dir.to_path_buf()))
        }
        Err(source) => return Err(BatchError::ListingFailed { path: dir.to_path_buf(), source }),
    }

    let listing_err = |source: std::io::Error| BatchError::ListingFailed { path: dir.to_path_buf(), source };
    let mut entries = tokio::fs::read_dir(dir).await.map_err(listing_err)?;
    let mut listing = Listing::default();

    while let Some(entry) = entries.next_entry().await.map_err(listing_err)? {
        let path = entry.path();
        if !is_supported_image(&path) {
            continue;
        }
        let modified = match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta.modified(),
            Ok(_) => continue,
            Err(e) => Err(e),
        };
        match modified {
            Ok(modified) => listing.images.push(ImageItem { path, modified }),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read image metadata, skipping");
                listing.skipped.push(SequencingError::from_io(path, e));
            }
        }
    }

    debug!(dir = %dir.display(), images = listing.images.len(), "Listed images");
    Ok(listing)
}

/// Order images by modification time and number them `1..=N`.
pub fn assign_positions(mut images: Vec<ImageItem>) -> Vec<SequencedItem> {
    images.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
    images.sort_by_key(|item| item.modified);
    images
        .into_iter()
        .zip(1u32..)
        .map(|(item, position)| SequencedItem { position, path: item.path })
        .collect()
}

/// List, order, and (in rename mode) rename the images in `dir`.
pub async fn sequence(dir: &Path, mode: SequenceMode) -> Result<SequencingOutcome, BatchError> {
    let Listing { images, mut skipped } = list_images(dir).await?;
    let ordered = assign_positions(images);

    let mut outcome = match mode {
        SequenceMode::InMemory => SequencingOutcome { items: ordered, skipped: Vec::new() },
        SequenceMode::Rename => rename_in_place(dir, ordered).await,
    };
    skipped.append(&mut outcome.skipped);
    outcome.skipped = skipped;

    info!(
        dir = %dir.display(),
        ?mode,
        sequenced = outcome.items.len(),
        skipped = outcome.skipped.len(),
        "Sequenced images"
    );
    Ok(outcome)
}

fn lowercase_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("png")
        .to_ascii_lowercase()
}

async fn rename_in_place(dir: &Path, ordered: Vec<SequencedItem>) -> SequencingOutcome {
    let run = Uuid::new_v4().simple().to_string();
    let mut skipped = Vec::new();

    // Phase 1: move every file to a unique staging name, numbering survivors.
    let mut staged: Vec<(u32, PathBuf, PathBuf)> = Vec::with_capacity(ordered.len());
    for item in ordered {
        let ext = lowercase_extension(&item.path);
        let staging = dir.join(format!(".imgscribe-{run}-{}.{ext}", item.position));
        match tokio::fs::rename(&item.path, &staging).await {
            Ok(()) => {
                let position = staged.len() as u32 + 1;
                staged.push((position, item.path, staging));
            }
            Err(e) => {
                let err = SequencingError::from_io(&item.path, e);
                warn!(error = %err, "Skipping image that could not be renamed");
                skipped.push(err);
            }
        }
    }

    // Phase 2: staging name to final `<position>.<ext>`.
    let mut items = Vec::with_capacity(staged.len());
    for (position, original, staging) in staged {
        let final_path = dir.join(format!("{position}.{}", lowercase_extension(&staging)));
        let result = match tokio::fs::try_exists(&final_path).await {
            Ok(false) => tokio::fs::rename(&staging, &final_path).await,
            Ok(true) => Err(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("{} already exists", final_path.display()),
            )),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                info!(
                    from = %original.display(),
                    to = %final_path.display(),
                    position,
                    "Renamed image"
                );
                items.push(SequencedItem { position, path: final_path });
            }
            Err(e) => {
                let left_at = restore_original(&staging, &original).await;
                let err = SequencingError::from_io(&original, e);
                warn!(
                    error = %err,
                    staging = %staging.display(),
                    left_at = %left_at.display(),
                    "Skipping image that could not take its position"
                );
                skipped.push(err);
            }
        }
    }

    SequencingOutcome { items, skipped }
}

/// Move a staged file back to its original name when that name is free.
/// Returns where the file is left.
async fn restore_original(staging: &Path, original: &Path) -> PathBuf {
    if let Ok(false) = tokio::fs::try_exists(original).await {
        if tokio::fs::rename(staging, original).await.is_ok() {
            return original.to_path_buf();
        }
    }
    staging.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{set_file_mtime, FileTime};
    use std::collections::BTreeSet;
    use std::fs;

    fn touch(dir: &Path, name: &str, mtime_secs: i64, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        set_file_mtime(&path, FileTime::from_unix_time(mtime_secs, 0)).unwrap();
        path
    }

    fn names(items: &[SequencedItem]) -> Vec<String> {
        items
            .iter()
            .map(|i| i.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[tokio::test]
    async fn missing_directory_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = sequence(&dir.path().join("imagesfolder"), SequenceMode::InMemory)
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::DirectoryNotFound(_)));
    }

    #[tokio::test]
    async fn orders_by_modification_time() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "zebra.png", 1_000, "t1");
        touch(dir.path(), "apple.JPG", 3_000, "t3");
        touch(dir.path(), "mango.jpeg", 2_000, "t2");
        touch(dir.path(), "notes.txt", 500, "ignored");

        let outcome = sequence(dir.path(), SequenceMode::InMemory).await.unwrap();
        assert_eq!(names(&outcome.items), vec!["zebra.png", "mango.jpeg", "apple.JPG"]);
        let positions: Vec<u32> = outcome.items.iter().map(|i| i.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
        assert!(dir.path().join("zebra.png").exists(), "in-memory mode never renames");
    }

    #[tokio::test]
    async fn repeated_runs_assign_identical_positions() {
        let dir = tempfile::tempdir().unwrap();
        for (i, name) in ["c.png", "a.png", "b.png", "d.jpg"].iter().enumerate() {
            touch(dir.path(), name, 10_000 - i as i64 * 10, name);
        }
        // Equal mtimes fall back to name order.
        touch(dir.path(), "tie-b.png", 42, "x");
        touch(dir.path(), "tie-a.png", 42, "y");

        let first = sequence(dir.path(), SequenceMode::InMemory).await.unwrap();
        for _ in 0..5 {
            let again = sequence(dir.path(), SequenceMode::InMemory).await.unwrap();
            assert_eq!(again.items, first.items);
        }
        assert_eq!(names(&first.items)[..2], ["tie-a.png", "tie-b.png"]);
    }

    #[tokio::test]
    async fn rename_mode_numbers_files_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "IMG_9.PNG", 100, "first");
        touch(dir.path(), "IMG_1.jpg", 200, "second");

        let outcome = sequence(dir.path(), SequenceMode::Rename).await.unwrap();
        assert_eq!(names(&outcome.items), vec!["1.png", "2.jpg"]);
        assert_eq!(fs::read_to_string(dir.path().join("1.png")).unwrap(), "first");
        assert_eq!(fs::read_to_string(dir.path().join("2.jpg")).unwrap(), "second");
        assert!(outcome.skipped.is_empty());
    }

    #[tokio::test]
    async fn rename_mode_never_loses_files_in_numbered_folder() {
        let dir = tempfile::tempdir().unwrap();
        // Already numbered, but modification order disagrees with the names.
        touch(dir.path(), "1.png", 300, "c");
        touch(dir.path(), "2.png", 100, "a");
        touch(dir.path(), "3.png", 200, "b");

        let outcome = sequence(dir.path(), SequenceMode::Rename).await.unwrap();
        assert_eq!(outcome.items.len(), 3);
        assert_eq!(fs::read_to_string(dir.path().join("1.png")).unwrap(), "a");
        assert_eq!(fs::read_to_string(dir.path().join("2.png")).unwrap(), "b");
        assert_eq!(fs::read_to_string(dir.path().join("3.png")).unwrap(), "c");

        // A second run keeps every file and every name.
        let again = sequence(dir.path(), SequenceMode::Rename).await.unwrap();
        assert_eq!(names(&again.items), vec!["1.png", "2.png", "3.png"]);
        let contents: BTreeSet<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| fs::read_to_string(e.unwrap().path()).unwrap())
            .collect();
        assert_eq!(contents, ["a", "b", "c"].iter().map(|s| s.to_string()).collect());
    }

    #[tokio::test]
    async fn taken_position_restores_the_original_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("1.png")).unwrap();
        touch(dir.path(), "a.png", 100, "alpha");

        let outcome = sequence(dir.path(), SequenceMode::Rename).await.unwrap();
        assert!(outcome.items.is_empty());
        assert_eq!(outcome.skipped.len(), 1);
        assert!(matches!(&outcome.skipped[0], SequencingError::Other { path, .. } if path.ends_with("a.png")));
        assert_eq!(fs::read_to_string(dir.path().join("a.png")).unwrap(), "alpha");
        assert!(dir.path().join("1.png").is_dir());

        let leftovers: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with(".imgscribe-"))
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[tokio::test]
    async fn vanished_image_keeps_positions_contiguous() {
        let dir = tempfile::tempdir().unwrap();
        let first = touch(dir.path(), "first.png", 100, "one");
        let gone = touch(dir.path(), "gone.png", 200, "two");
        let last = touch(dir.path(), "last.jpg", 300, "three");
        let ordered = assign_positions(vec![
            ImageItem { path: first, modified: std::time::UNIX_EPOCH },
            ImageItem { path: gone.clone(), modified: std::time::UNIX_EPOCH + std::time::Duration::from_secs(1) },
            ImageItem { path: last, modified: std::time::UNIX_EPOCH + std::time::Duration::from_secs(2) },
        ]);
        fs::remove_file(&gone).unwrap();

        let outcome = rename_in_place(dir.path(), ordered).await;
        assert_eq!(names(&outcome.items), vec!["1.png", "2.jpg"]);
        let positions: Vec<u32> = outcome.items.iter().map(|i| i.position).collect();
        assert_eq!(positions, vec![1, 2]);
        assert_eq!(fs::read_to_string(dir.path().join("2.jpg")).unwrap(), "three");
        assert_eq!(outcome.skipped.len(), 1);
        assert!(matches!(&outcome.skipped[0], SequencingError::NotFound { path } if *path == gone));
    }
}
