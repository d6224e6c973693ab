//! Append-only file persistence.
//!
//! Successful writes are appended as RESP arrays, exactly as a client would
//! send them. On startup the file is replayed through the normal command
//! path. Relative deadlines and blocking pops are rewritten into forms that
//! replay deterministically (`EXPIRE` → `PEXPIREAT`, `BRPOP` → `RPOP`).

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::BytesMut;
use serde::Serialize;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::command::Command;
use crate::config::FsyncPolicy;
use crate::db::Db;
use crate::error::AofError;
use crate::handlers::keys::unix_now_ms;
use crate::observability::metrics;
use crate::resp::{Frame, ParseError, encode_frame, parse_frame};

/// An open journal, shared by every connection.
#[derive(Debug)]
pub struct Aof {
    path: PathBuf,
    policy: FsyncPolicy,
    file: Mutex<File>,
}

impl Aof {
    /// Opens `path` for appending, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`AofError::Io`] if the file cannot be opened.
    pub fn open(path: &Path, policy: FsyncPolicy) -> Result<Self, AofError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        info!(path = %path.display(), ?policy, "append-only file opened");
        Ok(Self {
            path: path.to_path_buf(),
            policy,
            file: Mutex::new(file),
        })
    }

    /// Path of the journal.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configured fsync policy.
    #[must_use]
    pub const fn policy(&self) -> FsyncPolicy {
        self.policy
    }

    /// Appends one command frame.
    ///
    /// Write failures are logged and counted; the in-memory write has
    /// already happened and the client still gets its reply. On a
    /// multi-threaded runtime the write runs under `block_in_place` so the
    /// worker's other tasks move elsewhere meanwhile.
    pub fn append(&self, frame: &Frame) {
        let mut buf = BytesMut::new();
        encode_frame(frame, &mut buf);

        match blocking(|| self.write_bytes(&buf)) {
            Ok(()) => metrics::record_aof_bytes(buf.len()),
            Err(e) => {
                error!(error = %e, path = %self.path.display(), "append-only write failed");
                metrics::record_error("aof");
            }
        }
    }

    fn write_bytes(&self, buf: &[u8]) -> std::io::Result<()> {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        file.write_all(buf)?;
        if self.policy == FsyncPolicy::Always {
            file.sync_data()?;
        }
        Ok(())
    }

    /// Syncs file data to disk.
    ///
    /// # Errors
    ///
    /// Returns [`AofError::Io`] if the sync fails.
    pub fn sync(&self) -> Result<(), AofError> {
        let file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        file.sync_data()?;
        Ok(())
    }
}

/// Runs blocking file I/O from inside the runtime.
///
/// `block_in_place` is unavailable on a current-thread runtime, where `f`
/// simply runs inline.
fn blocking<R>(f: impl FnOnce() -> R) -> R {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

/// Journal form of a successful write, or `None` if nothing needs recording.
#[must_use]
pub fn journal_frame(cmd: &Command, reply: &Frame) -> Option<Frame> {
    if reply.is_error() || !cmd.is_write() {
        return None;
    }
    match cmd {
        Command::Expire { key, seconds } => {
            let unix_ms = unix_now_ms().saturating_add(seconds.saturating_mul(1000));
            Some(
                Command::PExpireAt {
                    key: key.clone(),
                    unix_ms,
                }
                .to_frame(),
            )
        }
        Command::BRPop { .. } => match reply {
            Frame::Array(items) => match items.first() {
                Some(Frame::Bulk(key)) => Some(Command::RPop(key.clone()).to_frame()),
                _ => None,
            },
            _ => None,
        },
        Command::LPop(_) | Command::RPop(_) if *reply == Frame::Null => None,
        _ => Some(cmd.to_frame()),
    }
}

/// How a journal scan ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ScanEnd {
    /// Every byte belongs to a complete command.
    Clean,
    /// The last frame is cut short, as after a crash mid-write.
    Truncated {
        /// Where the partial frame starts
        offset: u64,
    },
    /// A frame in the middle of the file is not a valid command.
    Corrupt {
        /// Where the bad frame starts
        offset: u64,
        /// What was wrong with it
        message: String,
    },
}

/// Commands decoded from a journal plus how the scan ended.
#[derive(Debug)]
pub struct Scan {
    pub commands: Vec<Command>,
    pub end: ScanEnd,
    pub total_bytes: u64,
}

/// Decodes every command in `data`, stopping at the first problem.
#[must_use]
pub fn scan(data: &[u8]) -> Scan {
    let mut commands = Vec::new();
    let mut pos = 0;
    let end = loop {
        while pos < data.len() && matches!(data[pos], b'\r' | b'\n') {
            pos += 1;
        }
        if pos == data.len() {
            break ScanEnd::Clean;
        }
        let offset = pos as u64;
        match parse_frame(&data[pos..]) {
            Ok((frame, used)) => match Command::try_from(frame) {
                Ok(cmd) => {
                    commands.push(cmd);
                    pos += used;
                }
                Err(e) => {
                    break ScanEnd::Corrupt {
                        offset,
                        message: e.to_string(),
                    };
                }
            },
            Err(ParseError::Incomplete) => break ScanEnd::Truncated { offset },
            Err(ParseError::Invalid(message)) => break ScanEnd::Corrupt { offset, message },
        }
    };
    Scan {
        commands,
        end,
        total_bytes: data.len() as u64,
    }
}

/// Summary of a startup replay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Commands replayed
    pub commands: usize,
    /// Bytes cut from a truncated tail
    pub truncated_bytes: u64,
}

/// Replays the journal at `path` into `db`.
///
/// A missing file is an empty journal. A truncated final frame is logged,
/// cut from the file and ignored.
///
/// # Errors
///
/// Returns [`AofError::Corrupt`] if a complete frame is not a valid command,
/// or [`AofError::Io`] if the file cannot be read or truncated.
pub async fn load(path: &Path, db: &Db) -> Result<LoadReport, AofError> {
    let data = match tokio::fs::read(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no append-only file to load");
            return Ok(LoadReport::default());
        }
        Err(e) => return Err(e.into()),
    };

    let scan = scan(&data);
    let mut report = LoadReport::default();
    match scan.end {
        ScanEnd::Clean => {}
        ScanEnd::Truncated { offset } => {
            report.truncated_bytes = scan.total_bytes - offset;
            warn!(
                path = %path.display(),
                offset,
                bytes = report.truncated_bytes,
                "append-only file ends with a partial command, truncating"
            );
            let file = tokio::fs::OpenOptions::new().write(true).open(path).await?;
            file.set_len(offset).await?;
        }
        ScanEnd::Corrupt { offset, message } => {
            return Err(AofError::Corrupt { offset, message });
        }
    }

    for cmd in &scan.commands {
        let reply = db.replay(cmd).await;
        if let Frame::Error(message) = reply {
            warn!(command = cmd.name(), %message, "replayed command failed");
        }
    }
    report.commands = scan.commands.len();
    info!(path = %path.display(), commands = report.commands, "append-only file loaded");
    Ok(report)
}

/// Result of `crimson check-aof`.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    /// File that was checked
    pub path: String,
    /// Valid commands before the first problem
    pub commands: usize,
    /// Size of the file
    pub total_bytes: u64,
    /// How the scan ended
    #[serde(flatten)]
    pub end: ScanEnd,
}

impl CheckReport {
    /// Returns `true` if the whole file is valid.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.end == ScanEnd::Clean
    }
}

/// Validates the journal at `path` without loading it.
///
/// # Errors
///
/// Returns [`AofError::Io`] if the file cannot be read.
pub fn check(path: &Path) -> Result<CheckReport, AofError> {
    let data = std::fs::read(path)?;
    let scan = scan(&data);
    Ok(CheckReport {
        path: path.display().to_string(),
        commands: scan.commands.len(),
        total_bytes: scan.total_bytes,
        end: scan.end,
    })
}

/// Starts the once-per-second fsync task used by `appendfsync everysec`.
///
/// The task stops when `cancel` fires.
pub fn spawn_fsync_task(aof: Arc<Aof>, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("fsync task cancelled");
                    break;
                }
                _ = interval.tick() => {
                    let aof = Arc::clone(&aof);
                    match tokio::task::spawn_blocking(move || aof.sync()).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            warn!(error = %e, "append-only fsync failed");
                            metrics::record_error("aof");
                        }
                        Err(e) => warn!(error = %e, "fsync task panicked"),
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn cmd(words: &[&str]) -> Command {
        Command::try_from(Frame::bulks(
            words.iter().map(|w| Bytes::copy_from_slice(w.as_bytes())),
        ))
        .unwrap()
    }

    fn journal(words: &[&[&str]]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for w in words {
            encode_frame(&cmd(w).to_frame(), &mut buf);
        }
        buf.to_vec()
    }

    #[test]
    fn expire_is_journaled_as_absolute_deadline() {
        let before = unix_now_ms();
        let frame = journal_frame(&cmd(&["EXPIRE", "k", "10"]), &Frame::Integer(1)).unwrap();
        let Command::PExpireAt { key, unix_ms } = Command::try_from(frame).unwrap() else {
            panic!("expected PEXPIREAT");
        };
        assert_eq!(key, Bytes::from_static(b"k"));
        assert!(unix_ms >= before + 10_000);
        assert!(unix_ms <= unix_now_ms() + 10_000);
    }

    #[test]
    fn brpop_is_journaled_as_rpop_of_the_served_key() {
        let reply = Frame::Array(vec![Frame::bulk("b"), Frame::bulk("x")]);
        let frame = journal_frame(&cmd(&["BRPOP", "a", "b", "0"]), &reply).unwrap();
        assert_eq!(
            Command::try_from(frame).unwrap(),
            Command::RPop(Bytes::from_static(b"b"))
        );
        assert!(journal_frame(&cmd(&["BRPOP", "a", "1"]), &Frame::NullArray).is_none());
    }

    #[test]
    fn reads_and_errors_are_not_journaled() {
        assert!(journal_frame(&cmd(&["GET", "k"]), &Frame::Null).is_none());
        assert!(journal_frame(&cmd(&["INCR", "k"]), &Frame::Error("ERR".into())).is_none());
        assert!(journal_frame(&cmd(&["LPOP", "k"]), &Frame::Null).is_none());
    }

    #[test]
    fn scan_classifies_endings() {
        let data = journal(&[&["SET", "a", "1"], &["RPUSH", "l", "x"]]);
        let clean = scan(&data);
        assert_eq!(clean.commands.len(), 2);
        assert_eq!(clean.end, ScanEnd::Clean);

        let cut = data.len() - 3;
        let truncated = scan(&data[..cut]);
        assert_eq!(truncated.commands.len(), 1);
        assert!(matches!(truncated.end, ScanEnd::Truncated { offset } if offset > 0));

        let mut corrupt = journal(&[&["SET", "a", "1"]]);
        let offset = corrupt.len() as u64;
        corrupt.extend_from_slice(b"*1\r\n$3\r\nFOO\r\n");
        corrupt.extend_from_slice(&journal(&[&["SET", "b", "2"]]));
        assert!(matches!(
            scan(&corrupt).end,
            ScanEnd::Corrupt { offset: o, .. } if o == offset
        ));
    }

    #[tokio::test]
    async fn load_replays_and_truncates_partial_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appendonly.aof");
        let mut data = journal(&[&["SET", "a", "1"], &["RPUSH", "l", "x", "y"]]);
        let valid = data.len() as u64;
        data.extend_from_slice(b"*3\r\n$3\r\nSET\r\n$1\r\nb");
        std::fs::write(&path, &data).unwrap();

        let db = Db::new();
        let report = load(&path, &db).await.unwrap();
        assert_eq!(report.commands, 2);
        assert!(report.truncated_bytes > 0);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), valid);
        assert_eq!(
            db.apply(&cmd(&["LRANGE", "l", "0", "-1"])).await,
            Frame::bulks(["x", "y"])
        );
    }

    #[tokio::test]
    async fn load_rejects_mid_file_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appendonly.aof");
        let mut data = journal(&[&["SET", "a", "1"]]);
        data.extend_from_slice(b"$x\r\n");
        data.extend_from_slice(&journal(&[&["SET", "b", "2"]]));
        std::fs::write(&path, &data).unwrap();

        let err = load(&path, &Db::new()).await.unwrap_err();
        assert!(matches!(err, AofError::Corrupt { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn appends_reach_the_file_without_a_sync() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appendonly.aof");

        let db = Db::new().with_journal(Arc::new(Aof::open(&path, FsyncPolicy::No).unwrap()));
        db.apply(&cmd(&["SET", "k", "v"])).await;
        assert_eq!(
            std::fs::read(&path).unwrap(),
            journal(&[&["SET", "k", "v"]])
        );
    }

    #[test]
    fn appends_outside_a_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appendonly.aof");
        let aof = Aof::open(&path, FsyncPolicy::Always).unwrap();
        aof.append(&cmd(&["DEL", "k"]).to_frame());
        assert_eq!(std::fs::read(&path).unwrap(), journal(&[&["DEL", "k"]]));
    }

    #[tokio::test]
    async fn missing_file_is_empty_journal() {
        let dir = tempfile::tempdir().unwrap();
        let report = load(&dir.path().join("nope.aof"), &Db::new()).await.unwrap();
        assert_eq!(report, LoadReport::default());
    }

    #[tokio::test]
    async fn journaled_writes_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appendonly.aof");

        let aof = Arc::new(Aof::open(&path, FsyncPolicy::Always).unwrap());
        let db = Db::new().with_journal(aof);
        db.apply(&cmd(&["SET", "k", "v"])).await;
        db.apply(&cmd(&["INCRBY", "n", "5"])).await;
        db.apply(&cmd(&["ZADD", "z", "1.5", "m"])).await;
        db.apply(&cmd(&["GET", "k"])).await;
        drop(db);

        let restored = Db::new();
        let report = load(&path, &restored).await.unwrap();
        assert_eq!(report.commands, 3);
        assert_eq!(
            restored.apply(&cmd(&["GET", "n"])).await,
            Frame::bulk("5")
        );
        assert_eq!(
            restored.apply(&cmd(&["ZSCORE", "z", "m"])).await,
            Frame::bulk("1.5")
        );
    }

    #[test]
    fn check_reports_json_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appendonly.aof");
        std::fs::write(&path, journal(&[&["SET", "a", "1"]])).unwrap();
        let report = check(&path).unwrap();
        assert!(report.is_clean());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "clean");
        assert_eq!(json["commands"], 1);
    }
}
