//! Length-delimited JSON framing over the control socket.
//!
//! Each message is a 4-byte big-endian length prefix followed by a JSON
//! payload, built on `tokio_util::codec::LengthDelimitedCodec` so message
//! boundaries survive partial reads/writes on the underlying stream.

use futures::{SinkExt, StreamExt};
use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::protocol::{Request, Response};

/// Maximum single-message size accepted on the wire. A snapshot of a
/// full pool is the largest message this protocol ever sends; 100 tasks
/// serialize to well under this.
const MAX_FRAME_LEN: usize = 8 * 1024 * 1024;

fn length_delimited_codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_LEN)
        .new_codec()
}

/// A framed connection carrying [`Request`]/[`Response`] values.
pub struct MessageStream<T> {
    framed: Framed<T, LengthDelimitedCodec>,
}

impl<T> MessageStream<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(io: T) -> Self {
        Self {
            framed: Framed::new(io, length_delimited_codec()),
        }
    }

    pub async fn send_request(&mut self, req: &Request) -> anyhow::Result<()> {
        send(&mut self.framed, req).await
    }

    pub async fn recv_request(&mut self) -> anyhow::Result<Option<Request>> {
        recv(&mut self.framed).await
    }

    pub async fn send_response(&mut self, resp: &Response) -> anyhow::Result<()> {
        send(&mut self.framed, resp).await
    }

    pub async fn recv_response(&mut self) -> anyhow::Result<Option<Response>> {
        recv(&mut self.framed).await
    }
}

async fn send<T, M>(framed: &mut Framed<T, LengthDelimitedCodec>, msg: &M) -> anyhow::Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
    M: Serialize,
{
    let bytes = serde_json::to_vec(msg)?;
    framed.send(bytes.into()).await?;
    Ok(())
}

async fn recv<T, M>(framed: &mut Framed<T, LengthDelimitedCodec>) -> anyhow::Result<Option<M>>
where
    T: AsyncRead + AsyncWrite + Unpin,
    M: DeserializeOwned,
{
    match framed.next().await {
        Some(frame) => Ok(Some(serde_json::from_slice(&frame?)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Request, Response};
    use taskpool_core::Priority;
    use tokio::io::duplex;

    #[tokio::test]
    async fn round_trips_a_request_and_response() {
        let (client_io, server_io) = duplex(4096);
        let mut client = MessageStream::new(client_io);
        let mut server = MessageStream::new(server_io);

        let req = Request::Submit {
            name: "build".into(),
            priority: Priority::High,
            execution_time_ms: 500,
            gang_id: None,
            lottery_tickets: None,
            timeout_seconds: None,
            deadline_seconds: None,
        };
        client.send_request(&req).await.unwrap();
        let received = server.recv_request().await.unwrap().unwrap();
        assert!(matches!(received, Request::Submit { execution_time_ms: 500, .. }));

        server
            .send_response(&Response::Submitted { task_id: 7 })
            .await
            .unwrap();
        let received = client.recv_response().await.unwrap().unwrap();
        assert!(matches!(received, Response::Submitted { task_id: 7 }));
    }

    #[tokio::test]
    async fn recv_returns_none_on_clean_close() {
        let (client_io, server_io) = duplex(4096);
        drop(client_io);
        let mut server = MessageStream::new(server_io);
        assert!(server.recv_request().await.unwrap().is_none());
    }
}
