//! Body helpers shared by the relay and the server

use bytes::Bytes;
use futures_util::TryStreamExt;
use http_body_util::{combinators::UnsyncBoxBody, BodyExt, Empty, Full, StreamBody};
use hyper::body::Frame;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Streamed body type used for both directions of a relay.
pub type RelayBody = UnsyncBoxBody<Bytes, BoxError>;

/// Create full body
pub fn full_body(bytes: impl Into<Bytes>) -> RelayBody {
    Full::new(bytes.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Create empty body
pub fn empty_body() -> RelayBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Box any inbound body, e.g. hyper's `Incoming`.
pub fn boxed<B>(body: B) -> RelayBody
where
    B: hyper::body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    body.map_err(Into::into).boxed_unsync()
}

/// Wrap a reqwest response so its body streams straight through.
pub fn from_reqwest(response: reqwest::Response) -> RelayBody {
    let stream = response
        .bytes_stream()
        .map_ok(Frame::data)
        .map_err(|e| Box::new(e) as BoxError);
    StreamBody::new(stream).boxed_unsync()
}

/// Turn a relay body into something reqwest can send without buffering.
pub fn into_reqwest(body: RelayBody) -> reqwest::Body {
    reqwest::Body::wrap_stream(body.into_data_stream())
}
