//! Read concatenation for untrimmed single-end runs.

use crate::config::discovery::is_gzipped;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    destination.with_file_name(name)
}

fn open_reads(path: &Path) -> io::Result<Box<dyn Read>> {
    let file = BufReader::new(File::open(path)?);
    if is_gzipped(path) {
        Ok(Box::new(MultiGzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

fn copy_all(sources: &[PathBuf], partial: &Path) -> io::Result<u64> {
    let mut out = BufWriter::new(File::create(partial)?);
    let mut total = 0;
    for source in sources {
        let copied = io::copy(&mut open_reads(source)?, &mut out)?;
        debug!(source = %source.display(), bytes = copied, "Compiled read file");
        total += copied;
    }
    out.flush()?;
    Ok(total)
}

/// Concatenates `sources` into `destination`, decoding gzip files.
///
/// Output goes to a `.partial` sibling that is renamed into place only after
/// every source was copied, so an interrupted run never leaves a truncated
/// file under the final name. Returns the number of bytes written.
pub fn compile_reads(sources: &[PathBuf], destination: &Path) -> io::Result<u64> {
    let partial = partial_path(destination);
    match copy_all(sources, &partial) {
        Ok(total) => {
            std::fs::rename(&partial, destination)?;
            Ok(total)
        }
        Err(err) => {
            let _ = std::fs::remove_file(&partial);
            Err(err)
        }
    }
}
