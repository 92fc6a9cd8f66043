//! Decoding of newline delimited watch responses
//!
//! Every line is decoded on its own: first the `{type, object}` envelope, then
//! the object through the typed shape of the watched kind. The stream ends when
//! the server closes the connection.
use bytes::BytesMut;
use futures::{future, Stream, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use strela_core::{watch::Envelope, Resource, WatchEvent};
use tokio_util::{
    codec::{Decoder, FramedRead, LinesCodec, LinesCodecError},
    io::StreamReader,
};

use super::Body;
use crate::{Error, Result};

/// Turn a streaming watch body into a lazy stream of events
///
/// - a line whose envelope does not parse yields `Err(MalformedResponse)`
/// - a line whose object does not decode yields a `MalformedObject` [`WatchEvent::Error`]
/// - a read failure yields `Err(StreamTerminated)`
/// - a line cut off by the end of the body is dropped unless it still parses
pub fn decode_events<K>(body: Body, dyntype: K::DynamicType) -> impl Stream<Item = Result<WatchEvent<K>>> + Send
where
    K: Resource + DeserializeOwned + Send + 'static,
{
    let frames = FramedRead::new(
        StreamReader::new(body.into_data_stream().map_err(into_io_error)),
        WatchLines::default(),
    );
    frames.filter_map(move |line| future::ready(decode_line(line, &dyntype)))
}

/// A line of the body, and whether the server terminated it
#[derive(Debug, PartialEq, Eq)]
enum Line {
    Complete(String),
    // left over when the body ended mid record
    Unterminated(String),
}

/// [`LinesCodec`] that tells a line cut off by the end of the body from a finished one
#[derive(Debug, Default)]
struct WatchLines(LinesCodec);

impl Decoder for WatchLines {
    type Error = LinesCodecError;
    type Item = Line;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Line>, LinesCodecError> {
        Ok(self.0.decode(buf)?.map(Line::Complete))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Line>, LinesCodecError> {
        if let Some(line) = self.0.decode(buf)? {
            return Ok(Some(Line::Complete(line)));
        }
        Ok(self.0.decode_eof(buf)?.map(Line::Unterminated))
    }
}

fn decode_line<K>(line: Result<Line, LinesCodecError>, dyntype: &K::DynamicType) -> Option<Result<WatchEvent<K>>>
where
    K: Resource + DeserializeOwned,
{
    match line {
        Ok(Line::Complete(line)) if line.trim().is_empty() => None,
        Ok(Line::Complete(line)) => match serde_json::from_str::<Envelope>(&line) {
            Ok(envelope) => Some(Ok(envelope.into_event(dyntype))),
            Err(e) => {
                tracing::warn!("undecodable watch record: {}", e);
                Some(Err(Error::malformed(e)))
            }
        },
        Ok(Line::Unterminated(rest)) => match serde_json::from_str::<Envelope>(&rest) {
            Ok(envelope) => Some(Ok(envelope.into_event(dyntype))),
            Err(e) => {
                tracing::debug!("dropping partial watch record: {}", e);
                None
            }
        },

        Err(LinesCodecError::Io(e)) => match e.kind() {
            // Client read timeout, the caller re-establishes on stream end
            std::io::ErrorKind::TimedOut => {
                tracing::warn!("timeout in poll: {}", e);
                None
            }
            // Unexpected EOF from chunked decoder, tends to happen on long watches
            std::io::ErrorKind::UnexpectedEof => {
                tracing::warn!("eof in poll: {}", e);
                None
            }
            _ => Some(Err(Error::terminated(e.to_string()))),
        },

        // Unreachable with the default `usize::MAX` line length
        Err(LinesCodecError::MaxLineLengthExceeded) => {
            Some(Err(Error::terminated("maximum line length exceeded")))
        }
    }
}

fn into_io_error(err: Error) -> std::io::Error {
    use std::error::Error as _;
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if matches!(io.kind(), std::io::ErrorKind::TimedOut | std::io::ErrorKind::UnexpectedEof) {
                return std::io::Error::new(io.kind(), err.to_string());
            }
        }
        if let Some(hyper_err) = cause.downcast_ref::<hyper::Error>() {
            if hyper_err.is_timeout() {
                return std::io::Error::new(std::io::ErrorKind::TimedOut, err.to_string());
            }
            if hyper_err.is_incomplete_message() {
                return std::io::Error::new(std::io::ErrorKind::UnexpectedEof, err.to_string());
            }
        }
        source = cause.source();
    }
    std::io::Error::other(err)
}
