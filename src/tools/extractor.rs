//! Unpacking downloaded source archives.
//!
//! Archives are unpacked into a scratch directory next to the output and
//! moved into place with one rename, so the output directory either holds
//! a complete tree or does not exist. A single top-level directory in the
//! archive (`sip-4.19/…`) is stripped. The archive's sha256 is written to
//! [`MARKER`] inside the output once extraction succeeds; a marker
//! naming a different archive does not count as extracted.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use tar::Archive;

use super::Tool;
use crate::context::{Context, Reason};
use crate::error::{Error, IoContext, Result};
use crate::staging;
use crate::task::{generate_decision, Decision, Outcome};

pub const MARKER: &str = ".depsmith-extracted";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    TarZst,
    Tar,
}

impl ArchiveFormat {
    pub fn detect(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Ok(ArchiveFormat::TarGz)
        } else if name.ends_with(".tar.zst") {
            Ok(ArchiveFormat::TarZst)
        } else if name.ends_with(".tar") {
            Ok(ArchiveFormat::Tar)
        } else {
            Err(Error::UnsupportedArchive {
                path: path.to_path_buf(),
            })
        }
    }
}

pub fn archive_digest(path: &Path) -> Result<String> {
    let mut file = File::open(path).at(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).at(path)?;
    Ok(format!("{:x}", hasher.finalize()))
}

#[derive(Debug, Clone, Default)]
pub struct Extractor {
    file: PathBuf,
    output: PathBuf,
}

impl Extractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, archive: impl Into<PathBuf>) -> Self {
        self.file = archive.into();
        self
    }

    pub fn output(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output = dir.into();
        self
    }

    /// True when `output` holds a completed extraction of this archive.
    pub fn is_extracted(&self, digest: &str) -> bool {
        match fs::read_to_string(self.output.join(MARKER)) {
            Ok(recorded) => recorded.trim() == digest,
            Err(_) => false,
        }
    }

    fn validate(&self) -> Result<(ArchiveFormat, &Path)> {
        if self.file.as_os_str().is_empty() {
            return Err(Error::empty("archive to extract"));
        }
        if self.output.as_os_str().is_empty() {
            return Err(Error::empty(format!("extraction output for {}", self.file.display())));
        }
        let parent = self
            .output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| Error::empty(format!("parent of {}", self.output.display())))?;
        Ok((ArchiveFormat::detect(&self.file)?, parent))
    }

    fn unpack(&self, format: ArchiveFormat, into: &Path) -> Result<()> {
        let file = BufReader::new(File::open(&self.file).at(&self.file)?);
        let reader: Box<dyn Read> = match format {
            ArchiveFormat::TarGz => Box::new(GzDecoder::new(file)),
            ArchiveFormat::TarZst => Box::new(zstd::stream::read::Decoder::new(file).at(&self.file)?),
            ArchiveFormat::Tar => Box::new(file),
        };
        Archive::new(reader).unpack(into).at(&self.file)
    }

    /// Move the unpacked tree into place with a single rename, marker
    /// included.
    fn publish(&self, unpacked: &Path, digest: &str) -> Result<()> {
        let entries: Vec<PathBuf> = fs::read_dir(unpacked)
            .at(unpacked)?
            .map(|e| e.map(|e| e.path()))
            .collect::<io::Result<_>>()
            .at(unpacked)?;

        let root = match entries.as_slice() {
            [only] if only.is_dir() => only.clone(),
            _ => unpacked.to_path_buf(),
        };

        let marker = root.join(MARKER);
        fs::write(&marker, digest).at(&marker)?;

        staging::delete_directory_optional(&self.output)?;
        fs::rename(&root, &self.output).at(&self.output)
    }
}

impl Tool for Extractor {
    type Output = Outcome;

    fn name(&self) -> &str {
        "extractor"
    }

    fn run(self, cx: &Context) -> Result<Outcome> {
        let (format, parent) = self.validate()?;
        let digest = archive_digest(&self.file)?;

        match generate_decision(cx.force(), self.is_extracted(&digest)) {
            Decision::Skip => {
                cx.note(
                    Reason::Bypass,
                    format!("{} already extracted", self.output.display()),
                );
                return Ok(Outcome::Skipped);
            }
            Decision::RunIgnoring => {
                cx.note(
                    Reason::Rebuild,
                    format!("ignoring {}", self.output.join(MARKER).display()),
                );
            }
            Decision::Run | Decision::Replace => {}
        }

        fs::create_dir_all(parent).at(parent)?;
        let scratch = tempfile::Builder::new()
            .prefix(".depsmith-extract-")
            .tempdir_in(parent)
            .at(parent)?;

        cx.trace(
            Reason::Fs,
            format!("extracting {} into {}", self.file.display(), self.output.display()),
        );
        // unpacked one level down so the scratch dir itself is never renamed
        let unpacked = scratch.path().join("tree");
        fs::create_dir(&unpacked).at(&unpacked)?;
        self.unpack(format, &unpacked)?;
        self.publish(&unpacked, &digest)?;
        Ok(Outcome::Ran)
    }
}
