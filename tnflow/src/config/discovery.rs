//! Filesystem discovery of reference, annotation and read files.

use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Extensions recognised as reference FASTA, in order of preference.
pub const FASTA_EXTENSIONS: &[&str] = &[".fasta", ".fa", ".fna"];

/// Extensions recognised as sequencing reads.
pub const READ_EXTENSIONS: &[&str] = &[".fastq", ".fq", ".fastq.gz", ".fq.gz"];

/// Lists the regular files of `dir`, sorted by file name.
fn sorted_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn has_extension(name: &str, extension: &str) -> bool {
    name.to_ascii_lowercase().ends_with(extension)
}

/// Finds the first file in `dir` whose name contains `strain` and ends with
/// one of `extensions`.
///
/// Extensions are tried in order, so a `.gb` match wins over a `.gbk` match
/// regardless of file name ordering.
pub fn find_strain_file(dir: &Path, strain: &str, extensions: &[&str]) -> io::Result<Option<PathBuf>> {
    let files = sorted_files(dir)?;
    for extension in extensions {
        let matches: Vec<&PathBuf> = files
            .iter()
            .filter(|p| {
                let name = file_name(p);
                name.contains(strain) && has_extension(&name, extension)
            })
            .collect();

        if let Some(first) = matches.first() {
            if matches.len() > 1 {
                warn!(
                    strain,
                    chosen = %first.display(),
                    candidates = matches.len(),
                    "Several files match the strain; using the first"
                );
            }
            return Ok(Some((*first).clone()));
        }
    }
    Ok(None)
}

/// Lists every read file in `dir`, compressed or not, sorted by name.
pub fn find_read_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    Ok(sorted_files(dir)?
        .into_iter()
        .filter(|p| {
            let name = file_name(p);
            READ_EXTENSIONS.iter().any(|ext| has_extension(&name, ext))
        })
        .collect())
}

/// Returns true if the path names a gzip-compressed file.
#[must_use]
pub fn is_gzipped(path: &Path) -> bool {
    has_extension(&file_name(path), ".gz")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn test_find_strain_file_substring_match() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "other.fasta");
        touch(dir.path(), "ref_PA14_v2.fasta");

        let found = find_strain_file(dir.path(), "PA14", FASTA_EXTENSIONS).unwrap();
        assert_eq!(found, Some(dir.path().join("ref_PA14_v2.fasta")));
    }

    #[test]
    fn test_extension_preference_and_fallback() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "X.gbk");

        let found = find_strain_file(dir.path(), "X", &[".gb", ".gbk"]).unwrap();
        assert_eq!(found, Some(dir.path().join("X.gbk")));

        touch(dir.path(), "X.gb");
        let found = find_strain_file(dir.path(), "X", &[".gb", ".gbk"]).unwrap();
        assert_eq!(found, Some(dir.path().join("X.gb")));
    }

    #[test]
    fn test_no_match() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Y.fasta");
        assert_eq!(find_strain_file(dir.path(), "X", FASTA_EXTENSIONS).unwrap(), None);
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = find_strain_file(&dir.path().join("nope"), "X", FASTA_EXTENSIONS);
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_find_read_files() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "b.fastq.gz");
        touch(dir.path(), "a.fastq");
        touch(dir.path(), "notes.txt");
        std::fs::create_dir(dir.path().join("sub.fastq")).unwrap();

        let reads = find_read_files(dir.path()).unwrap();
        assert_eq!(
            reads,
            vec![dir.path().join("a.fastq"), dir.path().join("b.fastq.gz")]
        );
        assert!(is_gzipped(&reads[1]));
        assert!(!is_gzipped(&reads[0]));
    }
}
