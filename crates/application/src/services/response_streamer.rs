//! Response streamer
//!
//! Turns a streamed generation into user-facing fragments: deltas are
//! HTML-entity decoded, the reasoning marker becomes a placeholder, and any
//! failure becomes one terminal error fragment.

use std::{fmt, pin::Pin, sync::Arc};

use domain::{Fragment, GenerationRequest};
use futures::{Stream, StreamExt, stream};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    error::ApplicationError,
    ports::{GenerationPort, TextStream},
};

/// Fragments of one streamed response
pub type FragmentStream = Pin<Box<dyn Stream<Item = Fragment> + Send>>;

/// Streamer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamerConfig {
    /// Delta emitted when the model enters its reasoning phase
    #[serde(default = "default_reasoning_marker")]
    pub reasoning_marker: String,

    /// Fragment shown in place of the reasoning marker
    #[serde(default = "default_reasoning_placeholder")]
    pub reasoning_placeholder: String,
}

fn default_reasoning_marker() -> String {
    "<think>".to_string()
}

fn default_reasoning_placeholder() -> String {
    "Thinking...".to_string()
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            reasoning_marker: default_reasoning_marker(),
            reasoning_placeholder: default_reasoning_placeholder(),
        }
    }
}

impl StreamerConfig {
    /// Map one raw delta to the text shown to the user
    pub fn render(&self, delta: &str) -> String {
        let decoded = html_escape::decode_html_entities(delta);
        if decoded == self.reasoning_marker {
            self.reasoning_placeholder.clone()
        } else {
            decoded.into_owned()
        }
    }
}

/// Service producing fragment streams
#[derive(Clone)]
pub struct ResponseStreamer {
    generation: Arc<dyn GenerationPort>,
    config: Arc<StreamerConfig>,
}

impl fmt::Debug for ResponseStreamer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseStreamer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

enum StreamState {
    Connecting(GenerationRequest),
    Streaming(TextStream),
    Done,
}

fn error_fragment(err: &ApplicationError) -> Fragment {
    Fragment::Error(format!("Error: {err}"))
}

impl ResponseStreamer {
    /// Create a new streamer
    pub fn new(generation: Arc<dyn GenerationPort>, config: StreamerConfig) -> Self {
        Self {
            generation,
            config: Arc::new(config),
        }
    }

    /// Stream the response to `request`.
    ///
    /// Nothing is sent until the stream is first polled. The stream never
    /// fails: errors surface as a final [`Fragment::Error`].
    pub fn stream_generate(&self, request: GenerationRequest) -> FragmentStream {
        let generation = Arc::clone(&self.generation);
        let config = Arc::clone(&self.config);

        Box::pin(stream::unfold(
            StreamState::Connecting(request),
            move |mut state| {
                let generation = Arc::clone(&generation);
                let config = Arc::clone(&config);
                async move {
                    loop {
                        state = match state {
                            StreamState::Connecting(request) => {
                                debug!(model = %request.model, "Starting response stream");
                                match generation.stream_generate(&request).await {
                                    Ok(deltas) => StreamState::Streaming(deltas),
                                    Err(e) => {
                                        warn!(error = %e, "Generation request failed");
                                        return Some((error_fragment(&e), StreamState::Done));
                                    },
                                }
                            },
                            StreamState::Streaming(mut deltas) => match deltas.next().await {
                                Some(Ok(delta)) => {
                                    let text = config.render(&delta);
                                    if text.is_empty() {
                                        StreamState::Streaming(deltas)
                                    } else {
                                        return Some((
                                            Fragment::Text(text),
                                            StreamState::Streaming(deltas),
                                        ));
                                    }
                                },
                                Some(Err(e)) => {
                                    warn!(error = %e, "Response stream failed");
                                    return Some((error_fragment(&e), StreamState::Done));
                                },
                                None => return None,
                            },
                            StreamState::Done => return None,
                        };
                    }
                }
            },
        ))
    }
}
