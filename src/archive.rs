use crate::error::Result;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Extracts every file entry of a zip into `destination`, flattening entry
/// paths to their base name. Colliding base names inside one archive silently
/// overwrite each other; regulator archives are flat in practice. Returns the
/// written paths in archive order.
pub fn extract_zip(archive_path: &Path, destination: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(destination)?;

    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;

    let mut extracted = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let entry_name = entry.name().to_string();
        let base_name = Path::new(&entry_name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(entry_name);

        let target = destination.join(&base_name);
        let mut output = File::create(&target)?;
        io::copy(&mut entry, &mut output)?;
        extracted.push(target);
    }

    debug!(archive = %archive_path.display(), files = extracted.len(), "archive extracted");
    Ok(extracted)
}

/// Packages a single file into a deflated zip under its base name, the shape
/// every stage deliverable ships in.
pub fn write_zip(source: &Path, zip_path: &Path) -> Result<()> {
    let arc_name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output.csv".to_string());

    let mut writer = ZipWriter::new(File::create(zip_path)?);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    writer.start_file(arc_name, options)?;

    let mut input = File::open(source)?;
    io::copy(&mut input, &mut writer)?;
    writer.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn build_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        writer.add_directory("nested/", options).unwrap();
        for (name, body) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn extraction_flattens_nested_paths_and_skips_directories() {
        let dir = tempdir().unwrap();
        let zip_path = dir.path().join("quarter.zip");
        build_zip(&zip_path, &[("nested/deep/1T2023.csv", "a;b\n1;2\n"), ("leiame.txt", "oi")]);

        let out = dir.path().join("out");
        let files = extract_zip(&zip_path, &out).unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(files[0], out.join("1T2023.csv"));
        assert_eq!(std::fs::read_to_string(&files[0]).unwrap(), "a;b\n1;2\n");
        assert!(out.join("leiame.txt").exists());
        assert!(!out.join("nested").exists());
    }

    #[test]
    fn colliding_base_names_overwrite_in_archive_order() {
        let dir = tempdir().unwrap();
        let zip_path = dir.path().join("collide.zip");
        build_zip(&zip_path, &[("x/data.csv", "first"), ("y/data.csv", "second")]);

        let out = dir.path().join("out");
        let files = extract_zip(&zip_path, &out).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(std::fs::read_to_string(out.join("data.csv")).unwrap(), "second");
    }

    #[test]
    fn write_zip_round_trips() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("relatorio.csv");
        std::fs::write(&source, "col\nval\n").unwrap();

        let zip_path = dir.path().join("relatorio.zip");
        write_zip(&source, &zip_path).unwrap();

        let out = dir.path().join("back");
        let files = extract_zip(&zip_path, &out).unwrap();
        assert_eq!(files, vec![out.join("relatorio.csv")]);
        assert_eq!(std::fs::read_to_string(&files[0]).unwrap(), "col\nval\n");
    }
}
