//! secnote: seal and open end-to-end encrypted notes
//!
//! Commands:
//!   seal      - pack text, a password and files into an encrypted blob
//!   open      - decrypt a blob with its key and write out the attachments
//!   password  - generate a random password

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use secnote_container::{open, seal, ContainerBuilder, DecryptedNote, FileEntry};
use secnote_crypto::{generate_password, PasswordSpec};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use zeroize::Zeroize;

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "secnote",
    version,
    about = "secnote end-to-end encrypted notes",
    long_about = "secnote: seal notes into encrypted blobs and open them with the key from the share link"
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SECNOTE_LOG", default_value = "warn", global = true)]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt a note into a blob and print its key
    ///
    /// The blob is what gets uploaded; the key belongs in the share link
    /// fragment and must never be sent alongside it.
    Seal {
        /// Note text
        #[arg(long, short = 't', default_value = "")]
        text: String,
        /// Password to share with the note
        #[arg(long, short = 'p', conflicts_with = "generate_password")]
        password: Option<String>,
        /// Attach a freshly generated password (default rules)
        #[arg(long)]
        generate_password: bool,
        /// File to attach (repeatable)
        #[arg(long = "file", short = 'f')]
        files: Vec<PathBuf>,
        /// Where to write the encrypted blob
        #[arg(long, short = 'o')]
        out: PathBuf,
    },

    /// Decrypt a blob and print its text and password
    Open {
        /// Key from the share link; a full link with a `#key` fragment also works
        #[arg(long, short = 'k', env = "SECNOTE_KEY")]
        key: String,
        /// Encrypted blob
        blob: PathBuf,
        /// Directory to write attached files into
        #[arg(long, short = 'd', default_value = ".")]
        out_dir: PathBuf,
        /// Overwrite existing files in the output directory
        #[arg(long)]
        force: bool,
    },

    /// Generate a random password
    ///
    /// Class flags set the minimum count for that class; 0 disables it.
    Password {
        #[arg(long, default_value_t = 10)]
        len: u32,
        #[arg(long)]
        lower: Option<u32>,
        #[arg(long)]
        upper: Option<u32>,
        #[arg(long)]
        numbers: Option<u32>,
        #[arg(long)]
        symbols: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log);

    match cli.command {
        Commands::Seal {
            text,
            password,
            generate_password,
            files,
            out,
        } => {
            let key = cmd_seal(text, password, generate_password, &files, &out).await?;
            println!("{key}");
            Ok(())
        }
        Commands::Open {
            key,
            blob,
            out_dir,
            force,
        } => cmd_open(&key, &blob, &out_dir, force).await,
        Commands::Password {
            len,
            lower,
            upper,
            numbers,
            symbols,
        } => {
            let spec = password_spec(len, lower, upper, numbers, symbols);
            println!("{}", generate_password(&spec)?);
            Ok(())
        }
    }
}

fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

// ── seal ──────────────────────────────────────────────────────────────────────

/// Seal the note into `out` and return the base64url key.
async fn cmd_seal(
    text: String,
    password: Option<String>,
    generate: bool,
    files: &[PathBuf],
    out: &Path,
) -> Result<String> {
    let password = match (password, generate) {
        (Some(p), _) => p,
        (None, true) => generate_password(&PasswordSpec::default())?,
        (None, false) => String::new(),
    };

    let mut builder = ContainerBuilder::new().text(text).password(password);
    for path in files {
        let entry = FileEntry::open(path)
            .await
            .with_context(|| format!("attaching {}", path.display()))?;
        debug!(name = entry.name(), size = entry.size(), "attached");
        builder.add_file(entry);
    }
    if builder.is_empty() {
        anyhow::bail!("nothing to seal: give --text, --password, --generate-password or --file");
    }

    let container = builder.build();
    let blob_len = container.sealed_len()?;
    info!(files = container.files().len(), blob_len, "sealing note");

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });
    let sealed = seal(container, &cancel).await;
    watcher.abort();
    let sealed = sealed.context("sealing note")?;

    tokio::fs::write(out, &sealed.blob)
        .await
        .with_context(|| format!("writing {}", out.display()))?;
    info!(path = %out.display(), bytes = sealed.blob.len(), "blob written");

    Ok(sealed.key_fragment())
}

// ── open ──────────────────────────────────────────────────────────────────────

async fn cmd_open(key: &str, blob: &Path, out_dir: &Path, force: bool) -> Result<()> {
    let data = tokio::fs::read(blob)
        .await
        .with_context(|| format!("reading {}", blob.display()))?;
    let mut note = open(key_from_arg(key), &data).context("opening note")?;

    if !note.text.is_empty() {
        println!("{}", note.text);
    }
    if !note.password.is_empty() {
        println!("password: {}", note.password);
    }
    for path in write_files(&note, out_dir, force).await? {
        println!("wrote {}", path.display());
    }

    note.text.zeroize();
    note.password.zeroize();
    Ok(())
}

/// Accept a bare key or a share link whose fragment holds the key.
fn key_from_arg(arg: &str) -> &str {
    match arg.rsplit_once('#') {
        Some((_, fragment)) => fragment,
        None => arg,
    }
}

/// Reduce a sender-chosen file name to a single path component.
fn safe_file_name(name: &str) -> Option<&str> {
    let base = name.rsplit(['/', '\\']).next()?;
    match base {
        "" | "." | ".." => None,
        _ => Some(base),
    }
}

/// Pick one output name per attachment. Repeated names get an index prefix
/// so no attachment overwrites another from the same note.
fn target_names(note: &DecryptedNote) -> Vec<String> {
    let mut taken = std::collections::HashSet::new();
    note.files
        .iter()
        .enumerate()
        .map(|(index, file)| {
            let mut name = match safe_file_name(&file.name) {
                Some(name) => name.to_string(),
                None => format!("file-{index}"),
            };
            while taken.contains(&name) {
                name = format!("{index}-{name}");
            }
            taken.insert(name.clone());
            name
        })
        .collect()
}

/// Nothing is written unless every target is free (or `force` is set).
async fn write_files(note: &DecryptedNote, out_dir: &Path, force: bool) -> Result<Vec<PathBuf>> {
    if note.files.is_empty() {
        return Ok(Vec::new());
    }
    tokio::fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let paths: Vec<PathBuf> = target_names(note)
        .into_iter()
        .map(|name| out_dir.join(name))
        .collect();
    if !force {
        for path in &paths {
            if tokio::fs::try_exists(path).await.unwrap_or(false) {
                anyhow::bail!("{} exists (use --force to overwrite)", path.display());
            }
        }
    }

    for (path, file) in paths.iter().zip(&note.files) {
        debug!(path = %path.display(), size = file.data.len(), "writing attachment");
        tokio::fs::write(path, &file.data)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(paths)
}

// ── password ──────────────────────────────────────────────────────────────────

fn password_spec(
    len: u32,
    lower: Option<u32>,
    upper: Option<u32>,
    numbers: Option<u32>,
    symbols: Option<u32>,
) -> PasswordSpec {
    let mut spec = PasswordSpec {
        len,
        ..PasswordSpec::default()
    };
    for (rule, min) in [
        (&mut spec.lower, lower),
        (&mut spec.upper, upper),
        (&mut spec.numbers, numbers),
        (&mut spec.symbols, symbols),
    ] {
        if let Some(min) = min {
            rule.min = Some(min);
        }
    }
    spec
}

#[cfg(test)]
mod tests {
    use super::*;
    use secnote_core::SecnoteError;

    #[test]
    fn test_key_from_share_link() {
        assert_eq!(key_from_arg("abc"), "abc");
        assert_eq!(
            key_from_arg("https://notes.example/n/ID#KEY_b64"),
            "KEY_b64"
        );
    }

    #[test]
    fn test_safe_file_name() {
        assert_eq!(safe_file_name("report.pdf"), Some("report.pdf"));
        assert_eq!(safe_file_name("../../etc/passwd"), Some("passwd"));
        assert_eq!(safe_file_name("C:\\Users\\me\\a.txt"), Some("a.txt"));
        assert_eq!(safe_file_name("dir/"), None);
        assert_eq!(safe_file_name(".."), None);
        assert_eq!(safe_file_name(""), None);
    }

    fn note_with(names: &[&str]) -> DecryptedNote {
        DecryptedNote {
            text: String::new(),
            password: String::new(),
            files: names
                .iter()
                .map(|name| secnote_container::DecodedFile {
                    name: name.to_string(),
                    data: name.as_bytes().to_vec().into(),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_repeated_names_do_not_collide() {
        let tmp = tempfile::tempdir().unwrap();
        let note = note_with(&["a.txt", "dir/a.txt", ".."]);
        let written = write_files(&note, tmp.path(), false).await.unwrap();

        assert_eq!(written.len(), 3);
        assert_eq!(std::fs::read(tmp.path().join("a.txt")).unwrap(), b"a.txt");
        assert_eq!(std::fs::read(tmp.path().join("1-a.txt")).unwrap(), b"dir/a.txt");
        assert_eq!(std::fs::read(tmp.path().join("file-2")).unwrap(), b"..");

        let tmp = tempfile::tempdir().unwrap();
        let note = note_with(&["2-a", "a", "a"]);
        write_files(&note, tmp.path(), false).await.unwrap();
        assert_eq!(std::fs::read(tmp.path().join("2-a")).unwrap(), b"2-a");
        assert_eq!(std::fs::read(tmp.path().join("2-2-a")).unwrap(), b"a");
    }

    #[tokio::test]
    async fn test_conflict_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("second.txt"), b"keep").unwrap();

        let note = note_with(&["first.txt", "second.txt"]);
        let err = write_files(&note, tmp.path(), false).await.unwrap_err();
        assert!(err.to_string().contains("exists"), "{err}");
        assert!(!tmp.path().join("first.txt").exists());
        assert_eq!(std::fs::read(tmp.path().join("second.txt")).unwrap(), b"keep");

        write_files(&note, tmp.path(), true).await.unwrap();
        assert_eq!(std::fs::read(tmp.path().join("first.txt")).unwrap(), b"first.txt");
    }

    #[test]
    fn test_password_spec_flags() {
        let spec = password_spec(16, Some(0), None, Some(4), None);
        assert_eq!(spec.len, 16);
        assert!(!spec.lower.enabled());
        assert_eq!(spec.upper.min, Some(1));
        assert_eq!(spec.numbers.min, Some(4));

        let password = generate_password(&spec).unwrap();
        assert_eq!(password.chars().count(), 16);
        assert!(!password.chars().any(|c| c.is_ascii_lowercase()));
        assert!(password.chars().filter(char::is_ascii_digit).count() >= 4);
    }

    #[tokio::test]
    async fn test_seal_then_open_writes_files() {
        let tmp = tempfile::tempdir().unwrap();
        let attachment = tmp.path().join("plan.txt");
        std::fs::write(&attachment, b"step one").unwrap();
        let blob = tmp.path().join("note.bin");

        let key = cmd_seal(
            "hello".into(),
            None,
            true,
            std::slice::from_ref(&attachment),
            &blob,
        )
        .await
        .unwrap();
        assert_eq!(key.len(), 43);

        let out = tmp.path().join("out");
        cmd_open(&format!("https://host/#{key}"), &blob, &out, false)
            .await
            .unwrap();
        assert_eq!(std::fs::read(out.join("plan.txt")).unwrap(), b"step one");

        // second open refuses to clobber without --force
        assert!(cmd_open(&key, &blob, &out, false).await.is_err());
        cmd_open(&key, &blob, &out, true).await.unwrap();
    }

    #[tokio::test]
    async fn test_seal_nothing_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let err = cmd_seal(String::new(), None, false, &[], &tmp.path().join("x"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("nothing to seal"));
        assert!(!tmp.path().join("x").exists());
    }

    #[tokio::test]
    async fn test_open_with_wrong_key() {
        let tmp = tempfile::tempdir().unwrap();
        let blob = tmp.path().join("note.bin");
        cmd_seal("secret".into(), None, false, &[], &blob)
            .await
            .unwrap();

        let other = secnote_crypto::generate_note_key().to_base64url();
        let err = cmd_open(&other, &blob, tmp.path(), false)
            .await
            .unwrap_err();
        let root = err.root_cause().downcast_ref::<SecnoteError>();
        assert!(matches!(root, Some(SecnoteError::Authentication)));
    }
}
