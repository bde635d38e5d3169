//! Labeled corpus loading
//!
//! Three layouts are accepted:
//!
//! - a directory with `ham`/`legitimate` and `spam`/`phishing` subdirectories,
//!   at the top level or one level down (`train/ham`)
//! - a manifest of `label,relative/path` lines (`manifest.txt` inside the
//!   directory, or the manifest file itself)
//! - a `.zip` archive whose entries sit in label directories
//!
//! Documents are sorted by (label, id) and the corpus checksum is computed over
//! that order, so the same files always produce the same corpus.

use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use zip::ZipArchive;

use crate::error::{PhishError, Result};
use crate::mime::{MimeParser, ParsedEmail, RawEmail};
use crate::model::Label;

pub const MANIFEST_FILE: &str = "manifest.txt";

/// One labeled email
#[derive(Debug, Clone)]
pub struct Document {
    /// Path relative to the corpus root, `/`-separated
    pub id: String,
    pub label: Label,
    pub raw: RawEmail,
}

#[derive(Debug, Clone)]
pub struct Corpus {
    documents: Vec<Document>,
    checksum: String,
}

impl Corpus {
    /// Load a corpus from a directory, manifest file or zip archive
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let documents = if path.is_dir() {
            let manifest = path.join(MANIFEST_FILE);
            if manifest.is_file() {
                load_manifest(&manifest)?
            } else {
                load_label_dirs(path)?
            }
        } else if path.is_file() {
            let is_zip = path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("zip"))
                .unwrap_or(false);
            if is_zip {
                load_zip(path)?
            } else {
                load_manifest(path)?
            }
        } else {
            return Err(PhishError::Corpus(format!(
                "corpus path does not exist: {}",
                path.display()
            )));
        };

        let corpus = Self::from_documents(documents)?;
        info!(
            "Loaded corpus from {}: {} legitimate, {} phishing (checksum {})",
            path.display(),
            corpus.count(Label::Legitimate),
            corpus.count(Label::Phishing),
            &corpus.checksum[..12]
        );
        Ok(corpus)
    }

    /// Build a corpus from in-memory documents
    pub fn from_documents(mut documents: Vec<Document>) -> Result<Self> {
        if documents.is_empty() {
            return Err(PhishError::Corpus("corpus contains no documents".to_string()));
        }

        documents.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.id.cmp(&b.id)));
        if let Some(pair) = documents
            .windows(2)
            .find(|pair| pair[0].label == pair[1].label && pair[0].id == pair[1].id)
        {
            return Err(PhishError::Corpus(format!("duplicate document id: {}", pair[0].id)));
        }

        let checksum = checksum(&documents);
        Ok(Self {
            documents,
            checksum,
        })
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// SHA-256 hex digest identifying the corpus contents
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn count(&self, label: Label) -> usize {
        self.documents.iter().filter(|d| d.label == label).count()
    }

    pub fn labels(&self) -> Vec<Label> {
        self.documents.iter().map(|d| d.label).collect()
    }

    pub fn parse_all(&self) -> Vec<ParsedEmail> {
        self.documents
            .iter()
            .map(|d| MimeParser::parse(d.raw.as_bytes()))
            .collect()
    }
}

/// Map a directory name to the label it holds
pub fn label_for_dir(name: &str) -> Option<Label> {
    match name.to_lowercase().as_str() {
        "ham" | "legitimate" => Some(Label::Legitimate),
        "spam" | "phishing" => Some(Label::Phishing),
        _ => None,
    }
}

fn checksum(documents: &[Document]) -> String {
    let mut hasher = Sha256::new();
    for document in documents {
        let mut sub = Sha256::new();
        sub.update(document.label.as_str().as_bytes());
        sub.update(b"\0");
        sub.update(document.id.as_bytes());
        sub.update(b"\0");
        sub.update(document.raw.as_bytes());
        hasher.update(sub.finalize());
    }
    format!("{:x}", hasher.finalize())
}

fn relative_id(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.') || name == "__MACOSX"
}

fn load_label_dirs(root: &Path) -> Result<Vec<Document>> {
    let mut label_dirs = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_hidden(&name) {
            continue;
        }
        match label_for_dir(&name) {
            Some(label) => label_dirs.push((label, path)),
            None => {
                // One level down, e.g. train/ham
                for child in fs::read_dir(&path)? {
                    let child = child?;
                    let child_name = child.file_name().to_string_lossy().into_owned();
                    if let Some(label) = label_for_dir(&child_name) {
                        if child.path().is_dir() {
                            label_dirs.push((label, child.path()));
                        }
                    }
                }
            }
        }
    }

    if label_dirs.is_empty() {
        return Err(PhishError::Corpus(format!(
            "no ham/legitimate or spam/phishing directories under {}",
            root.display()
        )));
    }

    let mut documents = Vec::new();
    for (label, dir) in label_dirs {
        let mut files = Vec::new();
        collect_files(&dir, &mut files)?;
        for file in files {
            documents.push(Document {
                id: relative_id(root, &file),
                label,
                raw: RawEmail::from_path(&file)?,
            });
        }
    }
    Ok(documents)
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if is_hidden(&entry.file_name().to_string_lossy()) {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else if path.is_file() {
            files.push(path);
        }
    }
    Ok(())
}

fn load_manifest(manifest: &Path) -> Result<Vec<Document>> {
    let root = manifest.parent().unwrap_or_else(|| Path::new("."));
    let content = fs::read_to_string(manifest)?;

    let mut documents = Vec::new();
    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (label, relative) = line.split_once(',').ok_or_else(|| {
            PhishError::Corpus(format!(
                "{}:{}: expected `label,path`",
                manifest.display(),
                number + 1
            ))
        })?;
        let label: Label = label.parse().map_err(|_| {
            PhishError::Corpus(format!(
                "{}:{}: unknown label `{}`",
                manifest.display(),
                number + 1,
                label.trim()
            ))
        })?;

        let relative = relative.trim();
        let path = root.join(relative);
        let raw = RawEmail::from_path(&path).map_err(|e| {
            PhishError::Corpus(format!("{}: {}", path.display(), e))
        })?;
        documents.push(Document {
            id: relative.replace('\\', "/"),
            label,
            raw,
        });
    }
    Ok(documents)
}

fn load_zip(path: &Path) -> Result<Vec<Document>> {
    let file = fs::File::open(path)?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| PhishError::Corpus(format!("{}: {}", path.display(), e)))?;

    let mut documents = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| PhishError::Corpus(format!("{}: {}", path.display(), e)))?;
        if !entry.is_file() {
            continue;
        }

        let name = entry.name().to_string();
        let components: Vec<&str> = name.split('/').filter(|c| !c.is_empty()).collect();
        if components.iter().any(|c| is_hidden(c)) || components.len() < 2 {
            continue;
        }
        let Some(label) = label_for_dir(components[components.len() - 2]) else {
            warn!("Skipping zip entry outside a label directory: {}", name);
            continue;
        };

        let mut content = Vec::new();
        entry.read_to_end(&mut content)?;
        documents.push(Document {
            id: components.join("/"),
            label,
            raw: RawEmail::from_bytes(content),
        });
    }
    Ok(documents)
}
