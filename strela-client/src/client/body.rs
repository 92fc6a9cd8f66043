use std::{
    error::Error as StdError,
    fmt,
    pin::Pin,
    task::{ready, Context, Poll},
};

use bytes::Bytes;
use futures::stream::Stream;
use http_body::{Body as HttpBody, Frame, SizeHint};
use http_body_util::{combinators::UnsyncBoxBody, BodyExt};
use pin_project::pin_project;

use crate::Error;

/// Body of requests sent through and responses returned by the [`Client`](crate::Client).
///
/// Requests carry a single buffered chunk; responses wrap whatever body the
/// underlying service produced, which may be an unbounded watch stream.
pub struct Body {
    kind: Kind,
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            Kind::Once(_) => "buffered",
            Kind::Wrap(_) => "streaming",
        };
        f.debug_struct("Body").field("kind", &kind).finish()
    }
}

enum Kind {
    Once(Option<Bytes>),
    Wrap(UnsyncBoxBody<Bytes, Box<dyn StdError + Send + Sync>>),
}

impl Body {
    /// Create an empty body
    pub fn empty() -> Self {
        Self { kind: Kind::Once(None) }
    }

    pub(crate) fn wrap_body<B>(body: B) -> Self
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        Self {
            kind: Kind::Wrap(body.map_err(Into::into).boxed_unsync()),
        }
    }

    /// Read the whole body into memory
    pub async fn collect_bytes(self) -> Result<Bytes, Error> {
        Ok(BodyExt::collect(self).await?.to_bytes())
    }

    /// Turn the body into a stream of data chunks, skipping trailers
    pub fn into_data_stream(self) -> BodyDataStream<Self> {
        BodyDataStream { body: self }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        if bytes.is_empty() {
            Self::empty()
        } else {
            Self {
                kind: Kind::Once(Some(bytes)),
            }
        }
    }
}

impl From<Vec<u8>> for Body {
    fn from(vec: Vec<u8>) -> Self {
        Self::from(Bytes::from(vec))
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self {
        Self::from(Bytes::from_static(s.as_bytes()))
    }
}

impl HttpBody for Body {
    type Data = Bytes;
    type Error = Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.kind {
            Kind::Once(ref mut val) => Poll::Ready(val.take().map(|data| Ok(Frame::data(data)))),
            Kind::Wrap(ref mut body) => Poll::Ready(
                ready!(Pin::new(body).poll_frame(cx)).map(|frame| frame.map_err(Error::Service)),
            ),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.kind {
            Kind::Once(Some(bytes)) => SizeHint::with_exact(bytes.len() as u64),
            Kind::Once(None) => SizeHint::with_exact(0),
            Kind::Wrap(body) => body.size_hint(),
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.kind {
            Kind::Once(Some(bytes)) => bytes.is_empty(),
            Kind::Once(None) => true,
            Kind::Wrap(body) => body.is_end_stream(),
        }
    }
}

/// A [`Body`] seen as a [`Stream`] of its data frames
#[pin_project]
pub struct BodyDataStream<B> {
    #[pin]
    body: B,
}

impl<B> Stream for BodyDataStream<B>
where
    B: HttpBody<Data = Bytes>,
{
    type Item = Result<Bytes, B::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            return match ready!(self.as_mut().project().body.poll_frame(cx)) {
                Some(Ok(frame)) => match frame.into_data() {
                    Ok(bytes) => Poll::Ready(Some(Ok(bytes))),
                    // trailers
                    Err(_) => continue,
                },
                Some(Err(err)) => Poll::Ready(Some(Err(err))),
                None => Poll::Ready(None),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Body;
    use futures::{stream, StreamExt};
    use http_body::Frame;
    use http_body_util::StreamBody;

    #[tokio::test]
    async fn buffered_bodies_collect() {
        let body = Body::from(vec![1u8, 2, 3]);
        assert_eq!(body.collect_bytes().await.unwrap().as_ref(), &[1, 2, 3]);
        assert!(Body::empty().collect_bytes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn wrapped_bodies_stream_chunks() {
        let chunks = stream::iter(vec![
            Ok::<_, std::io::Error>(Frame::data(bytes::Bytes::from_static(b"a"))),
            Ok(Frame::data(bytes::Bytes::from_static(b"b"))),
        ]);
        let body = Body::wrap_body(StreamBody::new(chunks));
        let seen = body
            .into_data_stream()
            .map(|chunk| chunk.unwrap())
            .collect::<Vec<_>>()
            .await;
        assert_eq!(seen, vec!["a", "b"]);
    }
}
