mod common;

use common::{CrimsonProcess, bulk, bulks, write_file};
use crimson::resp::Frame;

fn aof_flags(path: &std::path::Path, fsync: &'static str) -> Vec<String> {
    vec![
        "--appendonly".to_string(),
        "--appendfilename".to_string(),
        path.display().to_string(),
        "--appendfsync".to_string(),
        fsync.to_string(),
    ]
}

async fn spawn_with(flags: &[String]) -> CrimsonProcess {
    let flags: Vec<&str> = flags.iter().map(String::as_str).collect();
    CrimsonProcess::spawn(&flags).await
}

#[tokio::test(flavor = "multi_thread")]
async fn writes_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("appendonly.aof");
    let flags = aof_flags(&path, "everysec");

    let server = spawn_with(&flags).await;
    let mut c = server.client().await;
    c.cmd(&["SET", "name", "crimson"]).await;
    c.cmd(&["INCRBY", "visits", "3"]).await;
    c.cmd(&["RPUSH", "queue", "a", "b", "c"]).await;
    c.cmd(&["RPOP", "queue"]).await;
    c.cmd(&["HSET", "user", "id", "7"]).await;
    c.cmd(&["ZADD", "board", "10", "amy", "20", "bob"]).await;
    c.cmd(&["DEL", "nothing"]).await;
    c.cmd(&["EXPIRE", "name", "1000"]).await;
    assert_eq!(server.shutdown().await, Some(0));

    let server = spawn_with(&flags).await;
    let mut c = server.client().await;
    assert_eq!(c.cmd(&["GET", "name"]).await, bulk("crimson"));
    assert_eq!(c.cmd(&["GET", "visits"]).await, bulk("3"));
    assert_eq!(c.cmd(&["LRANGE", "queue", "0", "-1"]).await, bulks(&["a", "b"]));
    assert_eq!(c.cmd(&["HGET", "user", "id"]).await, bulk("7"));
    assert_eq!(c.cmd(&["ZSCORE", "board", "bob"]).await, bulk("20"));
    match c.cmd(&["TTL", "name"]).await {
        Frame::Integer(ttl) => assert!((990..=1000).contains(&ttl), "ttl {ttl}"),
        other => panic!("unexpected TTL reply {other:?}"),
    }
    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn served_brpop_is_replayed_as_rpop() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("appendonly.aof");
    let flags = aof_flags(&path, "always");

    let server = spawn_with(&flags).await;
    let mut c = server.client().await;
    c.cmd(&["RPUSH", "jobs", "1", "2"]).await;
    assert_eq!(c.cmd(&["BRPOP", "jobs", "1"]).await, bulks(&["jobs", "2"]));
    server.shutdown().await;

    let journal = std::fs::read(&path).unwrap();
    let text = String::from_utf8_lossy(&journal);
    assert!(text.contains("RPOP"), "journal: {text}");
    assert!(!text.contains("BRPOP"), "journal: {text}");

    let server = spawn_with(&flags).await;
    let mut c = server.client().await;
    assert_eq!(c.cmd(&["LRANGE", "jobs", "0", "-1"]).await, bulks(&["1"]));
    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn truncated_tail_is_dropped_on_startup() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("appendonly.aof");
    write_file(
        &path,
        b"*3\r\n$3\r\nSET\r\n$1\r\na\r\n$1\r\n1\r\n*3\r\n$3\r\nSET\r\n$1\r\nb",
    );

    let server = spawn_with(&aof_flags(&path, "no")).await;
    let mut c = server.client().await;
    assert_eq!(c.cmd(&["GET", "a"]).await, bulk("1"));
    assert_eq!(c.cmd(&["GET", "b"]).await, Frame::Null);
    server.shutdown().await;

    let check = CrimsonProcess::spawn_command(&["check-aof", path.to_str().unwrap()]);
    assert!(
        check.status.success(),
        "journal should be clean after repair: {}",
        String::from_utf8_lossy(&check.stdout)
    );
}

#[test]
fn corrupt_journal_refuses_to_start() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("appendonly.aof");
    write_file(&path, b"*1\r\n$4\r\nNOPE\r\n*1\r\n$4\r\nPING\r\n");

    let output = CrimsonProcess::spawn_command(&[
        "run",
        "--bind",
        "127.0.0.1",
        "--port",
        "0",
        "--appendonly",
        "yes",
        "--appendfilename",
        path.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(5));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("offset 0"), "stderr: {stderr}");
}
