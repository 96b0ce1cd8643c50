//! Chunked streaming wire format shared by plain chat and workflow responses.
//!
//! Frames follow the AI SDK data stream protocol, one `<code>:<json>\n` line
//! per frame: `0:` carries a text delta, `3:` a mid-stream error message, and
//! `d:` terminates the stream with a finish reason. A consensus response and
//! a direct chat response are indistinguishable on the wire.

use futures_util::{Stream, StreamExt, stream};

use crate::error::ConsensusError;
use crate::providers::TokenStream;

pub fn encode_text(delta: &str) -> String {
    format!("0:{}\n", json_string(delta))
}

pub fn encode_error(message: &str) -> String {
    format!("3:{}\n", json_string(message))
}

pub fn encode_finish(reason: &str) -> String {
    format!("d:{{\"finishReason\":{}}}\n", json_string(reason))
}

fn json_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

enum RelayState {
    Streaming(TokenStream),
    Finish(&'static str),
    Done,
}

/// Adapt a provider token stream into wire frames: one `0:` frame per delta,
/// a `3:` frame if the stream fails mid-flight, and always a terminating `d:`
/// frame. Dropping the returned stream tears down the underlying request.
pub fn relay_data_stream(tokens: TokenStream) -> impl Stream<Item = String> + Send {
    stream::unfold(RelayState::Streaming(tokens), |state| async move {
        match state {
            RelayState::Streaming(mut tokens) => match tokens.next().await {
                Some(Ok(delta)) => Some((encode_text(&delta), RelayState::Streaming(tokens))),
                Some(Err(e)) => Some((
                    encode_error(&e.user_message()),
                    RelayState::Finish("error"),
                )),
                None => Some((encode_finish("stop"), RelayState::Done)),
            },
            RelayState::Finish(reason) => Some((encode_finish(reason), RelayState::Done)),
            RelayState::Done => None,
        }
    })
}
