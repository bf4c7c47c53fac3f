//! Chapter archiving: packs a finished chapter directory into CBZ or EPUB
//! and removes the source directory afterwards.
//!
//! The archive lands next to the directory as `{chapter}.{ext}`, which is
//! exactly what the completion check looks for on later runs.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Image extensions eligible for packing (everything else, placeholders
/// aside, is metadata and stays out of the archive).
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// Output archive format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ArchiveFormat {
    /// Comic Book ZIP: a deflated zip of the page images.
    Cbz,
    /// Minimal EPUB3 with one XHTML page listing every image.
    Epub,
}

impl ArchiveFormat {
    /// Every supported format, in the order completion checks probe them.
    pub const ALL: &'static [Self] = &[Self::Cbz, Self::Epub];

    /// File extension for the format.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Cbz => "cbz",
            Self::Epub => "epub",
        }
    }
}

/// Error type for archiving.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// Filesystem access failed.
    #[error("archive io failure at {path}: {source}")]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The zip writer rejected the operation.
    #[error("failed to write archive {path}: {source}")]
    Zip {
        /// Archive being written.
        path: PathBuf,
        /// Underlying zip error.
        #[source]
        source: zip::result::ZipError,
    },
}

/// Capability seam for packing a finished chapter directory. The
/// orchestrator only depends on this trait; tests can substitute a recorder.
pub trait Archiver: Send + Sync {
    /// Packs `dir` into an archive of the given format.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError`] when reading pages or writing the archive
    /// fails.
    fn archive(&self, dir: &Path, format: ArchiveFormat) -> Result<PathBuf, ArchiveError>;
}

/// Zip-backed archiver producing CBZ and EPUB containers.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipArchiver;

impl Archiver for ZipArchiver {
    fn archive(&self, dir: &Path, format: ArchiveFormat) -> Result<PathBuf, ArchiveError> {
        archive_chapter(dir, format)
    }
}

/// Packs a chapter directory into an archive sitting next to it.
///
/// On success the source directory is removed and the archive path is
/// returned. On failure the directory is left untouched (a partial archive
/// file may remain and is overwritten on retry).
///
/// # Errors
///
/// Returns [`ArchiveError`] when reading pages or writing the archive
/// fails.
pub fn archive_chapter(dir: &Path, format: ArchiveFormat) -> Result<PathBuf, ArchiveError> {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "chapter".to_string());
    let archive_path = dir.with_file_name(format!("{name}.{}", format.extension()));

    let images = image_paths(dir)?;
    debug!(
        dir = %dir.display(),
        archive = %archive_path.display(),
        pages = images.len(),
        "packing chapter"
    );

    match format {
        ArchiveFormat::Cbz => write_cbz(&archive_path, dir, &images)?,
        ArchiveFormat::Epub => write_epub(&archive_path, &name, &images)?,
    }

    std::fs::remove_dir_all(dir).map_err(|e| ArchiveError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;
    info!(archive = %archive_path.display(), "chapter archived");
    Ok(archive_path)
}

/// Sorted image files directly inside `dir`.
fn image_paths(dir: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
    let entries = std::fs::read_dir(dir).map_err(|e| ArchiveError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut images: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        })
        .collect();
    images.sort();
    Ok(images)
}

fn zip_io(path: &Path) -> impl Fn(std::io::Error) -> ArchiveError + '_ {
    move |e| ArchiveError::Io {
        path: path.to_path_buf(),
        source: e,
    }
}

fn zip_err(path: &Path) -> impl Fn(zip::result::ZipError) -> ArchiveError + '_ {
    move |e| ArchiveError::Zip {
        path: path.to_path_buf(),
        source: e,
    }
}

fn write_cbz(archive_path: &Path, dir: &Path, images: &[PathBuf]) -> Result<(), ArchiveError> {
    let file = File::create(archive_path).map_err(zip_io(archive_path))?;
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for image in images {
        let relative = image.strip_prefix(dir).unwrap_or(image);
        zip.start_file(relative.to_string_lossy(), options)
            .map_err(zip_err(archive_path))?;
        let mut source = File::open(image).map_err(zip_io(image))?;
        std::io::copy(&mut source, &mut zip).map_err(zip_io(image))?;
    }

    zip.finish().map_err(zip_err(archive_path))?;
    Ok(())
}

/// Writes a minimal EPUB3: stored `mimetype` first, then the container
/// descriptor, package document, stylesheet, a single XHTML chapter
/// embedding every page, and the images themselves.
fn write_epub(archive_path: &Path, title: &str, images: &[PathBuf]) -> Result<(), ArchiveError> {
    let file = File::create(archive_path).map_err(zip_io(archive_path))?;
    let mut zip = ZipWriter::new(file);
    let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = FileOptions::default().compression_method(CompressionMethod::Deflated);

    // The mimetype entry must be first and uncompressed.
    zip.start_file("mimetype", stored)
        .map_err(zip_err(archive_path))?;
    zip.write_all(b"application/epub+zip")
        .map_err(zip_io(archive_path))?;

    zip.start_file("META-INF/container.xml", deflated)
        .map_err(zip_err(archive_path))?;
    zip.write_all(CONTAINER_XML.as_bytes())
        .map_err(zip_io(archive_path))?;

    let names: Vec<String> = images
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();

    zip.start_file("OEBPS/content.opf", deflated)
        .map_err(zip_err(archive_path))?;
    zip.write_all(package_document(title, &names).as_bytes())
        .map_err(zip_io(archive_path))?;

    zip.start_file("OEBPS/style.css", deflated)
        .map_err(zip_err(archive_path))?;
    zip.write_all(EPUB_STYLE.as_bytes())
        .map_err(zip_io(archive_path))?;

    zip.start_file("OEBPS/chapter.xhtml", deflated)
        .map_err(zip_err(archive_path))?;
    zip.write_all(chapter_xhtml(title, &names).as_bytes())
        .map_err(zip_io(archive_path))?;

    for (image, name) in images.iter().zip(&names) {
        zip.start_file(format!("OEBPS/images/{name}"), deflated)
            .map_err(zip_err(archive_path))?;
        let mut bytes = Vec::new();
        File::open(image)
            .and_then(|mut f| f.read_to_end(&mut bytes))
            .map_err(zip_io(image))?;
        zip.write_all(&bytes).map_err(zip_io(archive_path))?;
    }

    zip.finish().map_err(zip_err(archive_path))?;
    Ok(())
}

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

const EPUB_STYLE: &str = "img { display: block; margin: 0 auto; max-width: 100%; }\n";

fn media_type(name: &str) -> &'static str {
    match name.rsplit('.').next() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

fn package_document(title: &str, names: &[String]) -> String {
    let mut manifest = String::new();
    for (i, name) in names.iter().enumerate() {
        manifest.push_str(&format!(
            "    <item id=\"img{i}\" href=\"images/{name}\" media-type=\"{}\"/>\n",
            media_type(name)
        ));
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="uid">urn:mangadm:{title}</dc:identifier>
    <dc:title>{title}</dc:title>
    <dc:language>en</dc:language>
  </metadata>
  <manifest>
    <item id="chapter" href="chapter.xhtml" media-type="application/xhtml+xml"/>
    <item id="style" href="style.css" media-type="text/css"/>
{manifest}  </manifest>
  <spine>
    <itemref idref="chapter"/>
  </spine>
</package>
"#
    )
}

fn chapter_xhtml(title: &str, names: &[String]) -> String {
    let mut body = String::new();
    for name in names {
        body.push_str(&format!("    <img src=\"images/{name}\" alt=\"{name}\"/>\n"));
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xml:lang="en" lang="en">
  <head>
    <title>{title}</title>
    <link rel="stylesheet" type="text/css" href="style.css"/>
  </head>
  <body>
{body}  </body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use zip::ZipArchive;

    use super::*;

    fn chapter_dir(root: &TempDir, pages: &[&str]) -> PathBuf {
        let dir = root.path().join("Chapter 1");
        std::fs::create_dir(&dir).unwrap();
        for page in pages {
            std::fs::write(dir.join(page), format!("bytes-{page}")).unwrap();
        }
        dir
    }

    #[test]
    fn test_extension_values() {
        assert_eq!(ArchiveFormat::Cbz.extension(), "cbz");
        assert_eq!(ArchiveFormat::Epub.extension(), "epub");
    }

    #[test]
    fn test_cbz_contains_sorted_images_and_removes_dir() {
        let root = TempDir::new().unwrap();
        let dir = chapter_dir(&root, &["02.jpg", "01.png", "notes.txt"]);

        let archive = archive_chapter(&dir, ArchiveFormat::Cbz).unwrap();
        assert_eq!(archive, root.path().join("Chapter 1.cbz"));
        assert!(!dir.exists());

        let mut zip = ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        let names: Vec<String> = (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["01.png", "02.jpg"]);
    }

    #[test]
    fn test_epub_has_mimetype_first_and_stored() {
        let root = TempDir::new().unwrap();
        let dir = chapter_dir(&root, &["01.jpg"]);

        let archive = archive_chapter(&dir, ArchiveFormat::Epub).unwrap();
        assert!(!dir.exists());

        let mut zip = ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        {
            let first = zip.by_index(0).unwrap();
            assert_eq!(first.name(), "mimetype");
            assert_eq!(first.compression(), CompressionMethod::Stored);
        }
        let names: Vec<String> = (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().name().to_string())
            .collect();
        assert!(names.contains(&"META-INF/container.xml".to_string()));
        assert!(names.contains(&"OEBPS/content.opf".to_string()));
        assert!(names.contains(&"OEBPS/chapter.xhtml".to_string()));
        assert!(names.contains(&"OEBPS/images/01.jpg".to_string()));
    }

    #[test]
    fn test_missing_directory_errors_without_archive() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("nope");
        let result = archive_chapter(&dir, ArchiveFormat::Cbz);
        assert!(matches!(result, Err(ArchiveError::Io { .. })));
    }
}
