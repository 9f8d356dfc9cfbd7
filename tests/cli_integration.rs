//! CLI integration tests
//!
//! Tests the command-line interface end-to-end.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

/// Get path to the notecrypt binary
fn notecrypt_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_notecrypt"))
}

/// A scratch directory with its own salt file and config.
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let ws = Self {
            dir: TempDir::new().unwrap(),
        };
        fs::write(
            ws.config(),
            format!("salt_path = {:?}\n", ws.salt().to_str().unwrap()),
        )
        .unwrap();
        let result = ws.run(&["init-salt"]);
        assert!(
            result.status.success(),
            "init-salt failed: {}",
            String::from_utf8_lossy(&result.stderr)
        );
        ws
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn salt(&self) -> PathBuf {
        self.path("salt")
    }

    fn config(&self) -> PathBuf {
        self.path("config.toml")
    }

    /// Run notecrypt without a passphrase.
    fn run(&self, args: &[&str]) -> Output {
        Command::new(notecrypt_bin())
            .env_remove("RUST_LOG")
            .arg("-C")
            .arg(self.config())
            .args(args)
            .stdin(Stdio::null())
            .output()
            .unwrap()
    }

    /// Run notecrypt with passphrase from stdin
    fn run_with_passphrase(&self, args: &[&str], passphrase: &str) -> Output {
        let mut child = Command::new(notecrypt_bin())
            .env_remove("RUST_LOG")
            .arg("-C")
            .arg(self.config())
            .arg("--passphrase-stdin")
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();

        {
            let stdin = child.stdin.as_mut().expect("failed to open stdin");
            // Ignore BrokenPipe errors - the command may exit before reading stdin
            // if it encounters an error (e.g., missing salt file)
            let _ = stdin.write_all(passphrase.as_bytes());
        }

        child.wait_with_output().unwrap()
    }

    fn digest(&self, basename: &str) -> String {
        let result = self.run(&["digest", basename]);
        assert!(result.status.success());
        String::from_utf8(result.stdout).unwrap().trim().to_string()
    }
}

fn s(path: &Path) -> &str {
    path.to_str().unwrap()
}

fn assert_success(result: &Output, what: &str) {
    assert!(
        result.status.success(),
        "{what} failed: {}",
        String::from_utf8_lossy(&result.stderr)
    );
}

#[test]
fn test_init_salt_creates_once() {
    let ws = Workspace::new();
    assert_eq!(fs::metadata(ws.salt()).unwrap().len(), 1024);
    let before = fs::read(ws.salt()).unwrap();

    let result = ws.run(&["init-salt"]);
    assert!(!result.status.success());
    assert_eq!(fs::read(ws.salt()).unwrap(), before);
}

#[cfg(unix)]
#[test]
fn test_init_salt_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let ws = Workspace::new();
    let mode = fs::metadata(ws.salt()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn test_digest_command() {
    let ws = Workspace::new();
    let printed = ws.digest("todo.txt");
    assert_eq!(printed, notecrypt::namer::digest("todo.txt").as_str());
    assert_eq!(printed, "UEiC5k-YatuZqGbZ8iM-5gmGqkmfSUN6LtWRjZi9nquGlWA==");
}

#[test]
fn test_encrypt_decrypt_roundtrip() {
    let ws = Workspace::new();
    let note = ws.path("todo.txt");
    let envelopes = ws.path("envelopes");
    let restored = ws.path("restored");
    fs::write(&note, "buy milk\n").unwrap();

    let result = ws.run_with_passphrase(
        &["encrypt", "-I", s(&note), "-O", s(&envelopes)],
        "test\n",
    );
    assert_success(&result, "encrypt");

    let envelope = envelopes.join(ws.digest("todo.txt"));
    assert!(envelope.exists());
    let sealed = fs::read(&envelope).unwrap();
    assert!(!sealed.windows(8).any(|w| w == b"buy milk" || w == b"todo.txt"));

    let result = ws.run_with_passphrase(
        &["decrypt", "-I", s(&envelope), "-O", s(&restored)],
        "test\n",
    );
    assert_success(&result, "decrypt");

    assert_eq!(
        fs::read_to_string(restored.join("todo.txt")).unwrap(),
        "buy milk\n"
    );
}

#[test]
fn test_reencrypt_replaces_envelope() {
    let ws = Workspace::new();
    let note = ws.path("notes.md");
    let envelopes = ws.path("envelopes");
    let restored = ws.path("restored");

    fs::write(&note, "Original content").unwrap();
    let result = ws.run_with_passphrase(&["encrypt", "-I", s(&note), "-O", s(&envelopes)], "test");
    assert_success(&result, "encrypt");

    fs::write(&note, "Updated content").unwrap();
    let result = ws.run_with_passphrase(&["encrypt", "-I", s(&note), "-O", s(&envelopes)], "test");
    assert_success(&result, "re-encrypt");

    assert_eq!(fs::read_dir(&envelopes).unwrap().count(), 1);
    let result = ws.run_with_passphrase(&["decrypt", "-I", s(&envelopes), "-O", s(&restored)], "test");
    assert_success(&result, "decrypt");
    assert_eq!(
        fs::read_to_string(restored.join("notes.md")).unwrap(),
        "Updated content"
    );
}

#[test]
fn test_wrong_passphrase_fails() {
    let ws = Workspace::new();
    let note = ws.path("secret.txt");
    let envelopes = ws.path("envelopes");
    let restored = ws.path("restored");
    fs::write(&note, "hidden").unwrap();

    let result = ws.run_with_passphrase(
        &["encrypt", "-I", s(&note), "-O", s(&envelopes)],
        "correct_password",
    );
    assert_success(&result, "encrypt");

    let envelope = envelopes.join(ws.digest("secret.txt"));
    let result = ws.run_with_passphrase(
        &["decrypt", "-I", s(&envelope), "-O", s(&restored)],
        "wrong_password",
    );

    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(
        stderr.contains("passphrase"),
        "Expected error message about the passphrase, got: {}",
        stderr
    );
    assert!(!restored.join("secret.txt").exists());
}

#[test]
fn test_empty_file_roundtrip() {
    let ws = Workspace::new();
    let note = ws.path("empty.txt");
    let envelopes = ws.path("envelopes");
    let restored = ws.path("restored");
    fs::write(&note, b"").unwrap();

    let result = ws.run_with_passphrase(&["encrypt", "-I", s(&note), "-O", s(&envelopes)], "test");
    assert_success(&result, "encrypt");
    let result = ws.run_with_passphrase(&["decrypt", "-I", s(&envelopes), "-O", s(&restored)], "test");
    assert_success(&result, "decrypt");

    assert_eq!(fs::read(restored.join("empty.txt")).unwrap(), b"");
}

#[test]
fn test_directory_batch() {
    let ws = Workspace::new();
    let notes = ws.path("notes");
    let envelopes = ws.path("envelopes");
    let restored = ws.path("restored");
    fs::create_dir_all(notes.join("sub")).unwrap();
    fs::write(notes.join("a.txt"), "alpha").unwrap();
    fs::write(notes.join("b.txt"), "beta").unwrap();
    fs::write(notes.join(".hidden"), "skip me").unwrap();
    fs::write(notes.join("sub").join("c.txt"), "gamma").unwrap();

    let result = ws.run_with_passphrase(&["encrypt", "-I", s(&notes), "-O", s(&envelopes)], "test");
    assert_success(&result, "encrypt");
    // Not recursive, hidden files skipped.
    assert_eq!(fs::read_dir(&envelopes).unwrap().count(), 2);

    let result = ws.run_with_passphrase(
        &["encrypt", "-r", "-I", s(&notes), "-O", s(&envelopes)],
        "test",
    );
    assert_success(&result, "recursive encrypt");
    assert_eq!(fs::read_dir(&envelopes).unwrap().count(), 3);

    fs::write(envelopes.join("README"), "not an envelope").unwrap();
    let result = ws.run_with_passphrase(&["decrypt", "-I", s(&envelopes), "-O", s(&restored)], "test");
    assert_success(&result, "decrypt");

    assert_eq!(fs::read_to_string(restored.join("a.txt")).unwrap(), "alpha");
    assert_eq!(fs::read_to_string(restored.join("b.txt")).unwrap(), "beta");
    assert_eq!(fs::read_to_string(restored.join("c.txt")).unwrap(), "gamma");
    assert!(!restored.join(".hidden").exists());
    assert!(!restored.join("README").exists());
}

#[test]
fn test_batch_continues_past_corrupt_envelope() {
    let ws = Workspace::new();
    let notes = ws.path("notes");
    let envelopes = ws.path("envelopes");
    let restored = ws.path("restored");
    fs::create_dir_all(&notes).unwrap();
    fs::write(notes.join("good.txt"), "fine").unwrap();
    fs::write(notes.join("bad.txt"), "will be damaged").unwrap();

    let result = ws.run_with_passphrase(&["encrypt", "-I", s(&notes), "-O", s(&envelopes)], "test");
    assert_success(&result, "encrypt");

    let bad = envelopes.join(ws.digest("bad.txt"));
    let mut bytes = fs::read(&bad).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x80;
    fs::remove_file(&bad).unwrap();
    fs::write(&bad, &bytes).unwrap();

    let result = ws.run_with_passphrase(&["decrypt", "-I", s(&envelopes), "-O", s(&restored)], "test");
    assert!(!result.status.success());
    assert_eq!(fs::read_to_string(restored.join("good.txt")).unwrap(), "fine");
    assert!(!restored.join("bad.txt").exists());
}

#[test]
fn test_dry_run_writes_nothing() {
    let ws = Workspace::new();
    let note = ws.path("todo.txt");
    let envelopes = ws.path("envelopes");
    fs::write(&note, "buy milk").unwrap();

    let result = ws.run_with_passphrase(
        &["--dry-run", "encrypt", "-I", s(&note), "-O", s(&envelopes)],
        "test",
    );
    assert_success(&result, "dry-run encrypt");
    assert!(!envelopes.exists());
}

#[test]
fn test_encrypt_to_stdout() {
    let ws = Workspace::new();
    let note = ws.path("todo.txt");
    let inbox = ws.path("inbox");
    let restored = ws.path("restored");
    fs::write(&note, "buy milk").unwrap();

    let result = ws.run_with_passphrase(&["encrypt", "-I", s(&note), "--stdout"], "test");
    assert_success(&result, "encrypt");
    let digest = ws.digest("todo.txt");
    assert!(String::from_utf8_lossy(&result.stderr).contains(&digest));

    fs::create_dir_all(&inbox).unwrap();
    let envelope = inbox.join(&digest);
    fs::write(&envelope, &result.stdout).unwrap();

    let result = ws.run_with_passphrase(&["decrypt", "-I", s(&envelope), "--stdout"], "test");
    assert_success(&result, "decrypt");
    assert_eq!(result.stdout, b"buy milk");
    assert!(!restored.exists());
}

#[test]
fn test_passphrase_stdin_conflicts_with_stdin_input() {
    let ws = Workspace::new();
    let result = ws.run_with_passphrase(
        &["encrypt", "--stdin", "--name", "todo.txt", "--stdout"],
        "test",
    );
    assert!(!result.status.success());
}

#[test]
fn test_missing_salt_file_fails() {
    let ws = Workspace::new();
    let note = ws.path("todo.txt");
    let envelopes = ws.path("envelopes");
    fs::write(&note, "buy milk").unwrap();

    let missing = ws.path("no-such-salt");
    let result = ws.run_with_passphrase(
        &["--salt-file", s(&missing), "encrypt", "-I", s(&note), "-O", s(&envelopes)],
        "test",
    );
    assert!(!result.status.success());
    assert!(!envelopes.exists());
}

#[test]
fn test_decrypt_nonexistent_file_fails() {
    let ws = Workspace::new();
    let nonexistent = ws.path(&ws.digest("gone.txt"));
    let restored = ws.path("restored");

    let result = ws.run_with_passphrase(
        &["decrypt", "-I", s(&nonexistent), "-O", s(&restored)],
        "test",
    );

    assert!(!result.status.success());
    assert!(!restored.join("gone.txt").exists());
}

#[test]
fn test_silent_and_quiet_override_config_log_level() {
    let ws = Workspace::new();
    let mut config = fs::read_to_string(ws.config()).unwrap();
    config.push_str("log_level = \"debug\"\n");
    fs::write(ws.config(), config).unwrap();

    let note = ws.path("todo.txt");
    let envelopes = ws.path("envelopes");
    fs::write(&note, "buy milk").unwrap();

    let run = |flag: Option<&str>| {
        let mut args = Vec::new();
        args.extend(flag);
        args.extend(["encrypt", "-I", s(&note), "-O", s(&envelopes)]);
        let result = ws.run_with_passphrase(&args, "test");
        assert_success(&result, "encrypt");
        String::from_utf8(result.stderr).unwrap()
    };

    assert!(run(None).contains("DEBUG"));
    assert!(!run(Some("--quiet")).contains("DEBUG"));
    assert!(!run(Some("-s")).contains("DEBUG"));
}

#[test]
fn test_silent_conflicts_with_verbose() {
    let ws = Workspace::new();
    let result = ws.run(&["-s", "-v", "digest", "todo.txt"]);
    assert!(!result.status.success());

    let result = ws.run(&["-q", "digest", "todo.txt"]);
    assert_success(&result, "quiet digest");
}

#[test]
fn test_config_command_shows_salt_path() {
    let ws = Workspace::new();
    let result = ws.run(&["config"]);
    assert_success(&result, "config");
    let stdout = String::from_utf8(result.stdout).unwrap();
    assert!(stdout.contains(s(&ws.salt())));
}
