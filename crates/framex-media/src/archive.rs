//! Frame archive packaging.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{MediaError, MediaResult};

/// Zip `frames` into `zip_path` with deflate compression.
///
/// Entries are stored flat under their file names, in file-name order.
/// Returns the size of the written archive in bytes.
pub async fn package_frames(frames: &[PathBuf], zip_path: &Path) -> MediaResult<u64> {
    let mut frames = frames.to_vec();
    let zip_path = zip_path.to_path_buf();

    tokio::task::spawn_blocking(move || {
        frames.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        write_archive(&frames, &zip_path)
    })
    .await
    .map_err(|e| MediaError::internal(format!("archive task failed: {}", e)))?
}

fn write_archive(frames: &[PathBuf], zip_path: &Path) -> MediaResult<u64> {
    let file = File::create(zip_path)?;
    let mut writer = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for frame in frames {
        let name = frame
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| MediaError::internal(format!("invalid frame path {}", frame.display())))?;

        writer.start_file(name, options)?;
        let mut source = File::open(frame)?;
        std::io::copy(&mut source, &mut writer)?;
    }

    let mut inner = writer.finish()?;
    inner.flush()?;
    drop(inner);

    let size = std::fs::metadata(zip_path)?.len();
    debug!(entries = frames.len(), size, "Wrote {}", zip_path.display());
    Ok(size)
}
