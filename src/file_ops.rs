//! File and directory encryption/decryption operations
//!
//! This module reads notes and envelopes from disk, runs them through
//! [`Notecrypt`], and writes the results back. Directory operations walk an
//! explicit work queue, keep going past per-file failures, and report
//! everything in a [`BatchReport`].

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::codec::Notecrypt;
use crate::envelope::{CipheredObject, DecipheredObject};
use crate::error::{ErrorCategory, ErrorKind, NotecryptError, Result};
use crate::kdf::SecretKey;
use crate::log::Level;
use crate::namer::DigestId;
use zeroize::Zeroizing;

const TARGET: &str = "notecrypt::file_ops";

/// Mode of encrypted artifacts: read-only for owner and group.
const ENVELOPE_MODE: u32 = 0o440;

/// Mode of decrypted notes: read/write for owner only.
const PLAINTEXT_MODE: u32 = 0o600;

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Descend into subdirectories.
    pub recursive: bool,
    /// Do all the work except writing output.
    pub dry_run: bool,
}

/// Outcome of a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// `(input, output)` pairs that succeeded.
    pub processed: Vec<(PathBuf, PathBuf)>,
    /// Inputs that failed, with their error.
    pub failed: Vec<(PathBuf, NotecryptError)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Output computed in memory, not yet written.
struct Prepared {
    output: PathBuf,
    contents: Zeroizing<Vec<u8>>,
    mode: u32,
}

impl Prepared {
    fn envelope(object: CipheredObject, output_dir: &Path) -> Self {
        let (digest, ciphertext) = object.into_parts();
        Self {
            output: output_dir.join(digest.as_str()),
            contents: Zeroizing::new(ciphertext),
            mode: ENVELOPE_MODE,
        }
    }

    fn note(object: DecipheredObject, output_dir: &Path) -> Result<Self> {
        let output = output_dir.join(checked_basename(object.basename())?);
        Ok(Self {
            output,
            contents: Zeroizing::new(object.into_parts().1),
            mode: PLAINTEXT_MODE,
        })
    }

    fn commit(&self) -> Result<()> {
        write_file_secure(&self.output, &self.contents, self.mode)
    }

    /// Write unless `dry_run`, creating the output directory if needed.
    fn finish(self, dry_run: bool) -> Result<PathBuf> {
        if !dry_run {
            if let Some(dir) = self.output.parent().filter(|p| !p.as_os_str().is_empty()) {
                create_output_dir(dir)?;
            }
            self.commit()?;
        }
        Ok(self.output)
    }
}

/// Read a plaintext note; its file name becomes the basename.
pub fn read_note(input: &Path) -> Result<DecipheredObject> {
    let basename = file_name_str(input)?;
    let payload = fs::read(input).map_err(|e| read_error(input, e))?;
    DecipheredObject::new(basename, payload)
        .map_err(|e| e.with_context(format!("cannot encrypt {}", input.display())))
}

/// Read an envelope; its file name must be its digest.
pub fn read_envelope(input: &Path) -> Result<CipheredObject> {
    let digest: DigestId = file_name_str(input)?
        .parse()
        .map_err(|e: NotecryptError| {
            e.with_context(format!("{} is not named like an envelope", input.display()))
        })?;
    let bytes = fs::read(input).map_err(|e| read_error(input, e))?;
    Ok(CipheredObject::new(digest, bytes))
}

/// Store an envelope as `output_dir/<digest>`, read-only for owner and
/// group. An existing envelope for the same basename is replaced.
pub fn write_envelope(object: CipheredObject, output_dir: &Path, dry_run: bool) -> Result<PathBuf> {
    Prepared::envelope(object, output_dir).finish(dry_run)
}

/// Store a decrypted note as `output_dir/<basename>`, owner-only.
///
/// Basenames that are not a single plain path component are rejected.
pub fn write_note(object: DecipheredObject, output_dir: &Path, dry_run: bool) -> Result<PathBuf> {
    Prepared::note(object, output_dir)?.finish(dry_run)
}

/// Encrypt one note file into `output_dir/<digest>`.
///
/// Re-encrypting a note with the same name replaces its previous envelope.
/// Returns the envelope path.
pub fn encrypt_file(
    nc: &Notecrypt,
    key: &SecretKey,
    input: &Path,
    output_dir: &Path,
    dry_run: bool,
) -> Result<PathBuf> {
    prepare_encrypt(nc, key, input, output_dir)?.finish(dry_run)
}

/// Decrypt one envelope into `output_dir/<basename>`.
///
/// Returns the path of the decrypted note.
pub fn decrypt_file(
    nc: &Notecrypt,
    key: &SecretKey,
    input: &Path,
    output_dir: &Path,
    dry_run: bool,
) -> Result<PathBuf> {
    prepare_decrypt(nc, key, input, output_dir)?.finish(dry_run)
}

fn prepare_encrypt(
    nc: &Notecrypt,
    key: &SecretKey,
    input: &Path,
    output_dir: &Path,
) -> Result<Prepared> {
    let object = read_note(input)?;
    let sealed = nc
        .encrypt_one(key, &object)
        .map_err(|e| e.with_context(format!("encryption of {} failed", input.display())))?;
    Ok(Prepared::envelope(sealed, output_dir))
}

fn prepare_decrypt(
    nc: &Notecrypt,
    key: &SecretKey,
    input: &Path,
    output_dir: &Path,
) -> Result<Prepared> {
    let object = read_envelope(input)?;
    let opened = nc
        .decrypt_one(key, &object)
        .map_err(|e| e.with_context(format!("failed to decrypt {}", input.display())))?;
    Prepared::note(opened, output_dir)
}

/// Encrypt a note file, or every visible note in a directory.
///
/// Per-file failures land in the report. Errors that make the rest of the
/// batch pointless (see [`NotecryptError::is_fatal_for_batch`]) are returned.
pub fn encrypt_path(
    nc: &Notecrypt,
    key: &SecretKey,
    input: &Path,
    output_dir: &Path,
    options: BatchOptions,
) -> Result<BatchReport> {
    run_batch(nc, input, output_dir, options, Direction::Encrypt, |file| {
        prepare_encrypt(nc, key, file, output_dir)
    })
}

/// Decrypt an envelope file, or every envelope in a directory.
///
/// Files whose names are not digests are skipped.
pub fn decrypt_path(
    nc: &Notecrypt,
    key: &SecretKey,
    input: &Path,
    output_dir: &Path,
    options: BatchOptions,
) -> Result<BatchReport> {
    run_batch(nc, input, output_dir, options, Direction::Decrypt, |file| {
        prepare_decrypt(nc, key, file, output_dir)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Encrypt,
    Decrypt,
}

impl Direction {
    fn verb(self) -> &'static str {
        match self {
            Direction::Encrypt => "encrypted",
            Direction::Decrypt => "decrypted",
        }
    }

    /// Whether a directory entry named `name` should be processed.
    fn wants(self, name: &str) -> bool {
        match self {
            Direction::Encrypt => !name.starts_with('.'),
            Direction::Decrypt => name.parse::<DigestId>().is_ok(),
        }
    }
}

fn run_batch(
    nc: &Notecrypt,
    input: &Path,
    output_dir: &Path,
    options: BatchOptions,
    direction: Direction,
    mut prepare: impl FnMut(&Path) -> Result<Prepared>,
) -> Result<BatchReport> {
    let logger = nc.logger();
    let mut report = BatchReport::default();

    if !options.dry_run {
        create_output_dir(output_dir)?;
    }

    let files = collect_files(nc, input, options.recursive, direction, &mut report)?;
    // Output path -> input that produced it, to catch two inputs that map
    // to the same output in one run.
    let mut produced: HashMap<PathBuf, PathBuf> = HashMap::new();

    for file in files {
        let result = prepare(&file).and_then(|prepared| {
            if let Some(first) = produced.get(&prepared.output) {
                return Err(NotecryptError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::DuplicateName,
                    format!(
                        "{} and {} both map to {}",
                        first.display(),
                        file.display(),
                        prepared.output.display()
                    ),
                ));
            }
            if !options.dry_run {
                prepared.commit()?;
            }
            Ok(prepared.output)
        });

        match result {
            Ok(output) => {
                logger.log(
                    Level::Info,
                    TARGET,
                    &format!(
                        "{}{} {} -> {}",
                        if options.dry_run { "(dry run) " } else { "" },
                        direction.verb(),
                        file.display(),
                        output.display()
                    ),
                );
                produced.insert(output.clone(), file.clone());
                report.processed.push((file, output));
            }
            Err(e) if e.is_fatal_for_batch() => {
                logger.log(
                    Level::Error,
                    TARGET,
                    &format!("aborting batch at {}: {e}", file.display()),
                );
                return Err(e);
            }
            Err(e) => {
                logger.log(
                    Level::Warn,
                    TARGET,
                    &format!("{}: {}", file.display(), error_chain(&e)),
                );
                report.failed.push((file, e));
            }
        }
    }

    Ok(report)
}

/// List the files a batch should process, depth-first with an explicit
/// stack, sorted within each directory.
fn collect_files(
    nc: &Notecrypt,
    input: &Path,
    recursive: bool,
    direction: Direction,
    report: &mut BatchReport,
) -> Result<Vec<PathBuf>> {
    let metadata = fs::metadata(input).map_err(|e| read_error(input, e))?;
    if metadata.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !metadata.is_dir() {
        return Err(NotecryptError::with_kind(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("{} is neither a regular file nor a directory", input.display()),
        ));
    }

    let logger = nc.logger();
    let mut files = Vec::new();
    let mut pending = vec![input.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut entries = match read_dir_sorted(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                logger.log(Level::Warn, TARGET, &e.to_string());
                report.failed.push((dir, e));
                continue;
            }
        };
        let mut subdirs = Vec::new();
        for (path, file_type) in entries.drain(..) {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                logger.log(
                    Level::Debug,
                    TARGET,
                    &format!("skipping non-UTF-8 name {}", path.display()),
                );
                continue;
            };
            // Symlinks, FIFOs and sockets are neither followed nor read.
            if file_type.is_dir() {
                if recursive && !name.starts_with('.') {
                    subdirs.push(path);
                }
            } else if file_type.is_file() && direction.wants(name) {
                files.push(path);
            } else {
                logger.log(Level::Debug, TARGET, &format!("skipping {}", path.display()));
            }
        }
        // Reverse so the stack pops subdirectories in sorted order.
        pending.extend(subdirs.into_iter().rev());
    }
    Ok(files)
}

/// Entries of `dir` with their own (not followed) file types, sorted by path.
fn read_dir_sorted(dir: &Path) -> Result<Vec<(PathBuf, fs::FileType)>> {
    let mut entries = fs::read_dir(dir)
        .and_then(|rd| {
            rd.map(|e| e.and_then(|e| Ok((e.path(), e.file_type()?))))
                .collect::<io::Result<Vec<_>>>()
        })
        .map_err(|e| read_error(dir, e))?;
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}

/// Reject recovered basenames that would escape the output directory.
fn checked_basename(name: &str) -> Result<&str> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if bad {
        return Err(NotecryptError::with_kind(
            ErrorCategory::User,
            ErrorKind::MalformedFrame,
            format!("recovered basename {name:?} is not a plain file name"),
        ));
    }
    Ok(name)
}

fn file_name_str(path: &Path) -> Result<&str> {
    let name = path.file_name().ok_or_else(|| {
        NotecryptError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidInput,
            format!("{} has no file name", path.display()),
        )
    })?;
    name.to_str().ok_or_else(|| {
        NotecryptError::with_kind(
            ErrorCategory::User,
            ErrorKind::Utf8,
            format!("file name of {} is not valid UTF-8", path.display()),
        )
    })
}

/// Write `contents` to `path` atomically (tempfile + fsync + rename) with
/// restrictive permissions.
///
/// Either the old file or the new file exists afterwards, never a partial
/// one. Renaming also works when the old file is read-only.
fn write_file_secure(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut temp_file = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
        NotecryptError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to create tempfile in {}", dir.display()),
            e,
        )
    })?;

    temp_file.write_all(contents).map_err(|e| {
        NotecryptError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to write to tempfile",
            e,
        )
    })?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file.flush().map_err(|e| {
        NotecryptError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to flush tempfile",
            e,
        )
    })?;
    temp_file.as_file().sync_all().map_err(|e| {
        NotecryptError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to sync file prior to rename",
            e,
        )
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp_file
            .as_file()
            .set_permissions(fs::Permissions::from_mode(mode))
            .map_err(|e| {
                NotecryptError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    "failed to set tempfile permissions",
                    e,
                )
            })?;
    }
    #[cfg(not(unix))]
    let _ = mode;
    temp_file.persist(path).map_err(|e| {
        NotecryptError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to rename to target file {}", path.display()),
            e,
        )
    })?;
    Ok(())
}

fn create_output_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| {
        NotecryptError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("failed to create output directory {}", dir.display()),
            e,
        )
    })
}

fn read_error(path: &Path, err: io::Error) -> NotecryptError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    NotecryptError::with_kind_and_source(
        category,
        ErrorKind::Io,
        format!("failed to read from {}", path.display()),
        err,
    )
}

/// Render an error with its chain of sources, `outer: inner: ...`.
pub fn error_chain(err: &NotecryptError) -> String {
    let mut out = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(s) = source {
        out.push_str(": ");
        out.push_str(&s.to_string());
        source = s.source();
    }
    out
}
