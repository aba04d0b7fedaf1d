use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use bstr::BString;
use futures_core::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_test::io::{Builder, Mock};

use super::{Client, Error, Response};
use crate::command::{keys, strings};
use crate::config::{Config, ErrorPolicy};
use crate::connector::Connector;
use crate::error::ProtocolError;
use crate::resp2::{encode, encode_batch, ServerError};

macro_rules! test_client {
    () => {
        match std::env::var("REDIS_URL") {
            Ok(url) => Client::new(
                Config::builder()
                    .server(url.parse().unwrap())
                    .timeout(Duration::from_secs(3))
                    .build(),
            ),
            Err(_) => return Ok(()),
        }
    };
}

/// Hands out the prepared streams in order, counting the writes on them.
#[derive(Debug, Default)]
struct MockConnector {
    streams: Mutex<VecDeque<Mock>>,
    writes: Arc<AtomicUsize>,
}

#[derive(Debug)]
struct Counted {
    inner: Mock,
    writes: Arc<AtomicUsize>,
}

impl MockConnector {
    fn new(streams: impl IntoIterator<Item = Mock>) -> Self {
        MockConnector {
            streams: Mutex::new(streams.into_iter().collect()),
            writes: Arc::default(),
        }
    }

    fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl Connector for MockConnector {
    type Stream = Counted;

    fn connect(&self) -> BoxFuture<'_, io::Result<Self::Stream>> {
        let stream = self.streams.lock().unwrap().pop_front();
        Box::pin(async move {
            let inner = stream.ok_or_else(|| {
                io::Error::new(io::ErrorKind::ConnectionRefused, "no more mock streams")
            })?;
            Ok(Counted {
                inner,
                writes: self.writes.clone(),
            })
        })
    }
}

impl AsyncRead for Counted {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for Counted {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

fn mock_client(policy: ErrorPolicy, streams: Vec<Mock>) -> Client<MockConnector> {
    let config = Config::builder().error_policy(policy).build();
    Client::with_connector(config, MockConnector::new(streams))
}

#[tokio::test]
async fn execute_when_idle() -> Result<(), Error> {
    let stream = Builder::new()
        .write(b"*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$5\r\nvalue\r\n")
        .read(b"+OK\r\n")
        .write(&encode(&strings::get("key")))
        .read(b"$5\r\nvalue\r\n")
        .write(&encode(&strings::get("missing")))
        .read(b"$-1\r\n")
        .build();
    let mut client = mock_client(ErrorPolicy::Raise, vec![stream]);

    assert_eq!(Some(()), client.set("key", "value").await?.ready());
    assert_eq!(
        Some(Some(BString::from("value"))),
        client.get("key").await?.ready()
    );
    assert_eq!(Some(None), client.get("missing").await?.ready());
    Ok(())
}

#[tokio::test]
async fn connects_lazily() {
    let mut client = mock_client(ErrorPolicy::Raise, vec![]);
    assert!(!client.is_capturing());

    match client.ping().await {
        Err(Error::Io(err)) => assert_eq!(io::ErrorKind::ConnectionRefused, err.kind()),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn server_error_policies() -> Result<(), Error> {
    let incr = encode(&strings::incr("k"));
    let raise = Builder::new()
        .write(&incr)
        .read(b"-ERR bad state\r\n")
        .write(&incr)
        .read(b":1\r\n")
        .build();
    let mut client = mock_client(ErrorPolicy::Raise, vec![raise]);

    match client.incr("k").await {
        Err(Error::Server(err)) => {
            assert_eq!("ERR", err.kind());
            assert_eq!("bad state", err.message());
        }
        other => panic!("unexpected result: {:?}", other),
    }
    // error replies don't break the session
    assert_eq!(Some(1), client.incr("k").await?.ready());

    let as_value = Builder::new()
        .write(&incr)
        .read(b"-ERR bad state\r\n")
        .build();
    let mut client = mock_client(ErrorPolicy::ReturnAsValue, vec![as_value]);
    assert_eq!(
        Some(ServerError::new("ERR", "bad state")),
        client.incr("k").await?.failed()
    );
    Ok(())
}

#[tokio::test]
async fn shape_mismatch_keeps_session() -> Result<(), Error> {
    let stream = Builder::new()
        .write(&encode(&strings::get("k")))
        .read(b":1\r\n")
        .write(&encode(&strings::get("k")))
        .read(b"$1\r\nv\r\n")
        .build();
    let mut client = mock_client(ErrorPolicy::Raise, vec![stream]);

    match client.get("k").await {
        Err(Error::Shape(err)) => {
            assert_eq!("GET", err.command);
            assert_eq!(None, err.position);
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(
        Some(Some(BString::from("v"))),
        client.get("k").await?.ready()
    );
    Ok(())
}

#[tokio::test]
async fn capture_and_execute() -> Result<(), Error> {
    let frames = {
        let mut frames = encode(&strings::set("a", "1"));
        frames.extend(encode(&strings::get("a")));
        frames.extend(encode(&strings::incr("n")));
        frames
    };
    let stream = Builder::new()
        .write(&frames)
        .read(b"+OK\r\n$1\r\n1\r\n:5\r\n")
        .build();
    let mut client = mock_client(ErrorPolicy::Raise, vec![stream]);

    client.pipeline()?;
    assert!(client.is_capturing());
    let set = client.set("a", "1").await?.into_slot().unwrap();
    let get = client.get("a").await?.into_slot().unwrap();
    let incr = client.incr("n").await?.into_slot().unwrap();
    assert_eq!(0, client.connector.writes());

    let mut batch = client.execute_pipeline().await?.unwrap();
    assert!(!client.is_capturing());
    assert_eq!(1, client.connector.writes());
    assert_eq!(3, batch.len());
    assert_eq!(Ok(5), batch.take(incr));
    assert_eq!(Ok(Some(BString::from("1"))), batch.take(get));
    assert_eq!(Ok(()), batch.take(set));
    Ok(())
}

#[tokio::test]
async fn pipeline_state_machine() -> Result<(), Error> {
    let mut client = mock_client(ErrorPolicy::Raise, vec![]);

    assert!(client.execute_pipeline().await?.is_none());

    client.pipeline()?;
    let _ = client.incr("a").await?;
    assert!(matches!(client.pipeline(), Err(Error::AlreadyCapturing)));
    assert!(client.is_capturing());
    // the first pipeline is kept
    assert_eq!(1, client.discard_pipeline());
    assert!(!client.is_capturing());

    client.pipeline()?;
    let batch = client.execute_pipeline().await?.unwrap();
    assert!(batch.is_empty());
    assert_eq!(0, client.connector.writes());
    Ok(())
}

#[tokio::test]
async fn pipeline_error_policies() -> Result<(), Error> {
    let batch = [strings::incr("a"), strings::incr("b")];
    let replies: &[u8] = b":1\r\n-WRONGTYPE Operation against a key\r\n";

    let stream = Builder::new()
        .write(&encode_batch(&batch))
        .read(replies)
        .build();
    let mut client = mock_client(ErrorPolicy::Raise, vec![stream]);
    client.pipeline()?;
    for command in batch.iter().cloned() {
        let _ = client.execute(command).await?;
    }
    match client.execute_pipeline().await {
        Err(Error::Server(err)) => assert_eq!("WRONGTYPE", err.kind()),
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(!client.is_capturing());

    let stream = Builder::new()
        .write(&encode_batch(&batch))
        .read(replies)
        .build();
    let mut client = mock_client(ErrorPolicy::ReturnAsValue, vec![stream]);
    client.pipeline()?;
    let a = client.incr("a").await?.into_slot().unwrap();
    let b = client.incr("b").await?.into_slot().unwrap();
    let mut batch = client.execute_pipeline().await?.unwrap();
    assert_eq!(Ok(1), batch.take(a));
    assert_eq!("Operation against a key", batch.take(b).unwrap_err().message());
    Ok(())
}

#[tokio::test]
async fn scoped_pipeline() -> Result<(), Error> {
    let stream = Builder::new()
        .write(&encode_batch(&[keys::del(["a"]), keys::exists(["a", "b"])]))
        .read(b":1\r\n:0\r\n")
        .build();
    let mut client = mock_client(ErrorPolicy::Raise, vec![stream]);

    let ((del, exists), mut batch) = client
        .pipeline_with(|client| {
            Box::pin(async move {
                let del = client.del(["a"]).await?.into_slot().unwrap();
                let exists = client.exists(["a", "b"]).await?.into_slot().unwrap();
                Ok::<_, Error>((del, exists))
            })
        })
        .await?;

    assert!(!client.is_capturing());
    assert_eq!(1, client.connector.writes());
    assert_eq!(Ok(1), batch.take(del));
    assert_eq!(Ok(0), batch.take(exists));
    Ok(())
}

#[tokio::test]
async fn scoped_pipeline_failure_sends_nothing() {
    let mut client = mock_client(ErrorPolicy::Raise, vec![]);

    let res = client
        .pipeline_with(|client| {
            Box::pin(async move {
                let _ = client.set("a", "1").await?;
                let _ = client.set("b", "2").await?;
                Err::<(), _>(Error::Timeout)
            })
        })
        .await;

    assert!(matches!(res, Err(Error::Timeout)));
    assert!(!client.is_capturing());
    assert_eq!(0, client.connector.writes());
}

#[tokio::test]
async fn scoped_pipeline_executed_inside() -> Result<(), Error> {
    let stream = Builder::new()
        .write(&encode(&strings::incr("a")))
        .read(b":1\r\n")
        .build();
    let mut client = mock_client(ErrorPolicy::Raise, vec![stream]);

    let (inner, outer) = client
        .pipeline_with(|client| {
            Box::pin(async move {
                let slot = client.incr("a").await?.into_slot().unwrap();
                let mut batch = client.execute_pipeline().await?.unwrap();
                Ok::<_, Error>(batch.take(slot)?)
            })
        })
        .await?;

    assert_eq!(1, inner);
    assert!(outer.is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn timeout_then_reconnect() -> Result<(), Error> {
    let ping = b"*1\r\n$4\r\nPING\r\n";
    let stalled = Builder::new()
        .write(ping)
        .wait(Duration::from_secs(10))
        .build();
    let fresh = Builder::new().write(ping).read(b"+PONG\r\n").build();
    let mut client = mock_client(ErrorPolicy::Raise, vec![stalled, fresh]);

    assert!(matches!(client.ping().await, Err(Error::Timeout)));
    assert!(matches!(client.ping().await, Err(Error::SessionBroken)));

    client.close();
    assert_eq!(
        Some(BString::from("PONG")),
        client.ping().await?.ready()
    );
    Ok(())
}

#[tokio::test]
async fn truncated_pipeline_reply() -> Result<(), Error> {
    let stream = Builder::new()
        .write(&encode_batch(&[strings::incr("a"), strings::incr("b")]))
        .read(b":1\r\n")
        .build();
    let mut client = mock_client(ErrorPolicy::Raise, vec![stream]);

    client.pipeline()?;
    let _ = client.incr("a").await?;
    let _ = client.incr("b").await?;
    assert!(matches!(
        client.execute_pipeline().await,
        Err(Error::Protocol(ProtocolError::Truncated {
            received: 1,
            expected: 2
        }))
    ));
    Ok(())
}

#[tokio::test]
async fn raw_command() -> Result<(), Error> {
    let stream = Builder::new()
        .write(b"*3\r\n$6\r\nEXPIRE\r\n$1\r\nk\r\n$2\r\n10\r\n")
        .read(b":1\r\n")
        .build();
    let mut client = mock_client(ErrorPolicy::Raise, vec![stream]);

    let res: Response<bool> = client.raw_command(&("EXPIRE", "k", 10)).await?;
    assert_eq!(Some(true), res.ready());
    Ok(())
}

#[tokio::test]
async fn live_pipeline() -> Result<(), Error> {
    let mut client = test_client!();
    let key = "unittest_client_live_pipeline_1";

    client.del([key]).await?;
    client.pipeline()?;
    let set = client.set(key, "10").await?.into_slot().unwrap();
    let incr = client.incrby(key, 5).await?.into_slot().unwrap();
    let get = client.get(key).await?.into_slot().unwrap();
    let mut batch = client.execute_pipeline().await?.unwrap();

    assert_eq!(Ok(()), batch.take(set));
    assert_eq!(Ok(15), batch.take(incr));
    assert_eq!(Ok(Some(BString::from("15"))), batch.take(get));
    client.del([key]).await?;
    Ok(())
}

#[tokio::test]
async fn live_hash_struct() -> Result<(), Error> {
    let mut client = test_client!();
    let key = "unittest_client_live_hash_struct_1";

    #[derive(Debug, serde::Serialize)]
    struct Write {
        name: &'static str,
        visits: u32,
    }
    #[derive(Debug, PartialEq, serde::Deserialize)]
    struct Read {
        name: String,
        visits: u32,
    }

    client.del([key]).await?;
    let added = client
        .hset_multiple(key, &Write { name: "kim", visits: 3 })
        .await?;
    assert_eq!(Some(2), added.ready());

    let read: Option<Read> = client
        .raw_command(&("HGETALL", key))
        .await?
        .ready();
    assert_eq!(
        Some(Read {
            name: "kim".into(),
            visits: 3
        }),
        read
    );
    client.del([key]).await?;
    Ok(())
}
