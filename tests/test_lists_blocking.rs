mod common;

use std::time::Duration;

use common::{CrimsonProcess, bulk, bulks};
use crimson::resp::Frame;

#[tokio::test(flavor = "multi_thread")]
async fn list_commands() {
    let server = CrimsonProcess::spawn(&[]).await;
    let mut c = server.client().await;

    assert_eq!(c.cmd(&["RPUSH", "l", "a", "b", "c"]).await, Frame::Integer(3));
    assert_eq!(c.cmd(&["LPUSH", "l", "z"]).await, Frame::Integer(4));
    assert_eq!(c.cmd(&["LRANGE", "l", "0", "-1"]).await, bulks(&["z", "a", "b", "c"]));
    assert_eq!(c.cmd(&["LINDEX", "l", "-1"]).await, bulk("c"));
    assert_eq!(c.cmd(&["LSET", "l", "0", "y"]).await, Frame::ok());
    assert_eq!(c.cmd(&["LTRIM", "l", "0", "1"]).await, Frame::ok());
    assert_eq!(c.cmd(&["LRANGE", "l", "0", "-1"]).await, bulks(&["y", "a"]));
    assert_eq!(c.cmd(&["RPOP", "l"]).await, bulk("a"));
    assert_eq!(c.cmd(&["LPOP", "l"]).await, bulk("y"));
    assert_eq!(c.cmd(&["EXISTS", "l"]).await, Frame::Integer(0));

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn brpop_returns_immediately_when_data_exists() {
    let server = CrimsonProcess::spawn(&[]).await;
    let mut c = server.client().await;

    c.cmd(&["RPUSH", "jobs", "one", "two"]).await;
    assert_eq!(c.cmd(&["BRPOP", "empty", "jobs", "1"]).await, bulks(&["jobs", "two"]));

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn brpop_times_out_with_null_array() {
    let server = CrimsonProcess::spawn(&[]).await;
    let mut c = server.client().await;

    let started = std::time::Instant::now();
    assert_eq!(c.cmd(&["BRPOP", "nothing", "1"]).await, Frame::NullArray);
    assert!(started.elapsed() >= Duration::from_millis(900));

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn brpop_is_woken_by_another_client() {
    let server = CrimsonProcess::spawn(&[]).await;
    let mut waiter = server.client().await;
    let mut pusher = server.client().await;

    waiter.send(&["BRPOP", "queue", "0"]).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(pusher.cmd(&["LPUSH", "queue", "job"]).await, Frame::Integer(1));

    let reply = waiter.read_timeout(Duration::from_secs(5)).await;
    assert_eq!(reply, Some(bulks(&["queue", "job"])));
    assert_eq!(pusher.cmd(&["LLEN", "queue"]).await, Frame::Integer(0));

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn only_one_blocked_client_gets_each_element() {
    let server = CrimsonProcess::spawn(&[]).await;
    let mut first = server.client().await;
    let mut second = server.client().await;
    let mut pusher = server.client().await;

    first.send(&["BRPOP", "q", "2"]).await;
    second.send(&["BRPOP", "q", "2"]).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    pusher.cmd(&["RPUSH", "q", "only"]).await;

    let a = first.read_timeout(Duration::from_secs(5)).await.unwrap();
    let b = second.read_timeout(Duration::from_secs(5)).await.unwrap();
    let winners = [&a, &b]
        .into_iter()
        .filter(|r| **r == bulks(&["q", "only"]))
        .count();
    assert_eq!(winners, 1, "replies: {a:?} {b:?}");
    assert!(a == Frame::NullArray || b == Frame::NullArray);

    server.shutdown().await;
}
