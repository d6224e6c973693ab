//! Shared integration-test harness for spawning a `crimson` server as a
//! child process and talking RESP to it over TCP.

#![allow(dead_code)]

use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;

use bytes::Bytes;
use crimson::resp::{Frame, RespCodec};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio_util::codec::Framed;

/// Default timeout for a single reply.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A running `crimson` server.
///
/// The child process is killed on drop via `kill_on_drop(true)`.
pub struct CrimsonProcess {
    child: Child,
    port: u16,
}

impl CrimsonProcess {
    /// Spawns `crimson run` on an ephemeral port with `extra` flags.
    ///
    /// Reads stderr until the `server listening` line to discover the port.
    #[allow(clippy::missing_panics_doc)]
    pub async fn spawn(extra: &[&str]) -> Self {
        let bin = env!("CARGO_BIN_EXE_crimson");
        let mut child = Command::new(bin)
            .args(["run", "--bind", "127.0.0.1", "--port", "0", "-v"])
            .args(extra)
            .env_remove("CRIMSON_LOG_LEVEL")
            .env_remove("CRIMSON_CONFIG")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .expect("failed to spawn crimson");

        let stderr = child.stderr.take().expect("stderr not captured");
        let mut reader = BufReader::new(stderr);
        let mut line = String::new();
        let mut port: Option<u16> = None;

        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        while tokio::time::Instant::now() < deadline {
            line.clear();
            let n = tokio::time::timeout(DEFAULT_TIMEOUT, reader.read_line(&mut line))
                .await
                .expect("timed out waiting for server startup")
                .expect("failed to read stderr");
            assert!(n > 0, "server exited before printing listening address");

            // e.g. "bound_addr=127.0.0.1:12345"
            if line.contains("server listening") {
                if let Some(start) = line.find("127.0.0.1:") {
                    let digits: String = line[start + "127.0.0.1:".len()..]
                        .chars()
                        .take_while(char::is_ascii_digit)
                        .collect();
                    port = digits.parse().ok();
                }
                break;
            }
        }
        let port = port.expect("failed to discover server port from stderr");

        // Keep draining so verbose logging never fills the pipe.
        tokio::spawn(async move {
            let mut sink = String::new();
            while matches!(reader.read_line(&mut sink).await, Ok(n) if n > 0) {
                sink.clear();
            }
        });

        Self { child, port }
    }

    /// Port the server bound.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Opens a new client connection.
    #[allow(clippy::missing_panics_doc)]
    pub async fn client(&self) -> RespClient {
        RespClient::connect(self.port).await
    }

    /// Sends `signal` (e.g. `TERM`) to the server.
    #[allow(clippy::missing_panics_doc)]
    pub fn signal(&self, signal: &str) {
        let pid = self.child.id().expect("server already exited");
        let status = std::process::Command::new("kill")
            .args([format!("-{signal}"), pid.to_string()])
            .status()
            .expect("failed to run kill");
        assert!(status.success(), "kill -{signal} failed");
    }

    /// Waits for the server to exit and returns its exit code.
    #[allow(clippy::missing_panics_doc)]
    pub async fn wait(mut self) -> Option<i32> {
        tokio::time::timeout(Duration::from_secs(10), self.child.wait())
            .await
            .expect("server did not exit in time")
            .expect("failed to wait for server")
            .code()
    }

    /// Stops the server gracefully with SIGTERM and waits for it.
    #[allow(clippy::missing_panics_doc)]
    pub async fn shutdown(self) -> Option<i32> {
        self.signal("TERM");
        self.wait().await
    }

    /// Runs a one-shot CLI command to completion.
    #[allow(clippy::missing_panics_doc)]
    pub fn spawn_command(args: &[&str]) -> Output {
        std::process::Command::new(env!("CARGO_BIN_EXE_crimson"))
            .args(args)
            .env_remove("CRIMSON_LOG_LEVEL")
            .output()
            .expect("failed to run crimson")
    }
}

/// Minimal RESP client built on the server's own codec.
pub struct RespClient {
    framed: Framed<TcpStream, RespCodec>,
}

impl RespClient {
    /// Connects to `127.0.0.1:<port>`.
    #[allow(clippy::missing_panics_doc)]
    pub async fn connect(port: u16) -> Self {
        let stream = TcpStream::connect(("127.0.0.1", port))
            .await
            .expect("failed to connect");
        Self {
            framed: Framed::new(stream, RespCodec::default()),
        }
    }

    /// Sends one command and waits for its reply.
    #[allow(clippy::missing_panics_doc)]
    pub async fn cmd(&mut self, words: &[&str]) -> Frame {
        self.send(words).await;
        self.read_timeout(DEFAULT_TIMEOUT)
            .await
            .expect("connection closed before reply")
    }

    /// Sends one command without waiting.
    #[allow(clippy::missing_panics_doc)]
    pub async fn send(&mut self, words: &[&str]) {
        let frame = Frame::bulks(words.iter().map(|w| Bytes::copy_from_slice(w.as_bytes())));
        self.framed.send(frame).await.expect("failed to send");
    }

    /// Writes raw bytes, bypassing the encoder.
    #[allow(clippy::missing_panics_doc)]
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        use tokio::io::AsyncWriteExt;
        self.framed
            .get_mut()
            .write_all(bytes)
            .await
            .expect("failed to write");
    }

    /// Reads one reply; `None` once the server closes the connection.
    #[allow(clippy::missing_panics_doc)]
    pub async fn read_timeout(&mut self, timeout: Duration) -> Option<Frame> {
        tokio::time::timeout(timeout, self.framed.next())
            .await
            .expect("timed out waiting for reply")
            .map(|r| r.expect("invalid reply"))
    }
}

/// Bulk reply helper.
#[must_use]
pub fn bulk(s: &str) -> Frame {
    Frame::Bulk(Bytes::copy_from_slice(s.as_bytes()))
}

/// Array-of-bulks reply helper.
#[must_use]
pub fn bulks(items: &[&str]) -> Frame {
    Frame::Array(items.iter().map(|s| bulk(s)).collect())
}

/// Writes `contents` to `path`, creating parent directories.
#[allow(clippy::missing_panics_doc)]
pub fn write_file(path: &Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("failed to create dir");
    }
    std::fs::write(path, contents).expect("failed to write file");
}
