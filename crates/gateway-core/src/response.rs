//! Response envelopes and the formatter that builds them.
//!
//! Every adapter answers with one of a handful of canonical shapes, wrapped in
//! an [`Envelope`] so that a provider failure can travel back to the caller as
//! data instead of as an error.

use crate::error::GatewayError;
use crate::request::ChatMessage;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Token usage as reported by a provider (possibly empty)
pub type Usage = BTreeMap<String, u64>;

/// Free-form metadata attached to an envelope
pub type Metadata = Map<String, Value>;

/// Outcome of a provider operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    /// The provider answered
    Success(T),
    /// The provider failed; the failure was captured at the adapter boundary
    Failure(ErrorResponse),
}

impl<T> Envelope<T> {
    /// Capture a provider result, turning any error into an error envelope
    pub fn capture(model: &str, result: Result<T, GatewayError>) -> Self {
        match result {
            Ok(body) => Self::Success(body),
            Err(err) => Self::Failure(ResponseFormatter::from_error(model, &err)),
        }
    }

    /// Whether this is a success envelope
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Borrow the success body
    #[must_use]
    pub fn success(&self) -> Option<&T> {
        match self {
            Self::Success(body) => Some(body),
            Self::Failure(_) => None,
        }
    }

    /// Borrow the error body
    #[must_use]
    pub fn failure(&self) -> Option<&ErrorResponse> {
        match self {
            Self::Success(_) => None,
            Self::Failure(err) => Some(err),
        }
    }

    /// Convert into a plain `Result`
    pub fn into_result(self) -> Result<T, ErrorResponse> {
        match self {
            Self::Success(body) => Ok(body),
            Self::Failure(err) => Err(err),
        }
    }
}

/// Access to the parts of a success body the gateway annotates
pub trait EnvelopeBody {
    /// Originating model identifier
    fn model(&self) -> &str;

    /// Mutable metadata map
    fn metadata_mut(&mut self) -> &mut Metadata;
}

macro_rules! impl_envelope_body {
    ($($ty:ty),* $(,)?) => {
        $(
            impl EnvelopeBody for $ty {
                fn model(&self) -> &str {
                    &self.model
                }

                fn metadata_mut(&mut self) -> &mut Metadata {
                    &mut self.metadata
                }
            }
        )*
    };
}

/// Text generation envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextResponse {
    /// Generated text
    pub text: String,
    /// Model that produced the text
    pub model: String,
    /// Token usage
    #[serde(default)]
    pub usage: Usage,
    /// Extra metadata
    #[serde(default)]
    pub metadata: Metadata,
}

/// Chat envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Conversation the response was generated for
    pub messages: Vec<ChatMessage>,
    /// Assistant reply
    pub response: String,
    /// Model that produced the reply
    pub model: String,
    /// Token usage
    #[serde(default)]
    pub usage: Usage,
    /// Extra metadata
    #[serde(default)]
    pub metadata: Metadata,
}

/// Embedding envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// Embedding vector, in provider order
    pub embedding: Vec<f32>,
    /// Embedding model
    pub model: String,
    /// Vector length
    pub dimensions: usize,
    /// Extra metadata
    #[serde(default)]
    pub metadata: Metadata,
}

/// Image analysis envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAnalysisResponse {
    /// Description or answer about the image
    pub description: String,
    /// Vision model
    pub model: String,
    /// Provider-reported confidence, if any
    pub confidence: Option<f64>,
    /// Extra metadata
    #[serde(default)]
    pub metadata: Metadata,
}

/// Moderation envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationResponse {
    /// Whether any category was violated
    pub flagged: bool,
    /// Violated categories
    pub categories: BTreeSet<String>,
    /// Per-category scores
    pub scores: BTreeMap<String, f64>,
    /// Moderation model
    pub model: String,
    /// Extra metadata
    #[serde(default)]
    pub metadata: Metadata,
}

/// Error envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,
    /// Model the call was addressed to
    pub model: String,
    /// Machine-readable code
    pub code: Option<String>,
    /// Extra details
    #[serde(default)]
    pub details: Map<String, Value>,
}

impl_envelope_body!(
    TextResponse,
    ChatResponse,
    EmbeddingResponse,
    ImageAnalysisResponse,
    ModerationResponse,
);

/// Builds canonical envelopes from provider output
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseFormatter;

impl ResponseFormatter {
    /// Format a text generation response
    #[must_use]
    pub fn format_text_response(
        text: impl Into<String>,
        model: impl Into<String>,
        usage: Option<Usage>,
        metadata: Option<Metadata>,
    ) -> TextResponse {
        TextResponse {
            text: text.into(),
            model: model.into(),
            usage: usage.unwrap_or_default(),
            metadata: metadata.unwrap_or_default(),
        }
    }

    /// Format a chat response
    #[must_use]
    pub fn format_chat_response(
        messages: Vec<ChatMessage>,
        response: impl Into<String>,
        model: impl Into<String>,
        usage: Option<Usage>,
        metadata: Option<Metadata>,
    ) -> ChatResponse {
        ChatResponse {
            messages,
            response: response.into(),
            model: model.into(),
            usage: usage.unwrap_or_default(),
            metadata: metadata.unwrap_or_default(),
        }
    }

    /// Format an embedding response
    #[must_use]
    pub fn format_embedding_response(
        embedding: Vec<f32>,
        model: impl Into<String>,
        metadata: Option<Metadata>,
    ) -> EmbeddingResponse {
        EmbeddingResponse {
            dimensions: embedding.len(),
            embedding,
            model: model.into(),
            metadata: metadata.unwrap_or_default(),
        }
    }

    /// Format an image analysis response
    #[must_use]
    pub fn format_image_analysis_response(
        description: impl Into<String>,
        model: impl Into<String>,
        confidence: Option<f64>,
        metadata: Option<Metadata>,
    ) -> ImageAnalysisResponse {
        ImageAnalysisResponse {
            description: description.into(),
            model: model.into(),
            confidence,
            metadata: metadata.unwrap_or_default(),
        }
    }

    /// Format a moderation response
    #[must_use]
    pub fn format_moderation_response(
        flagged: bool,
        categories: BTreeSet<String>,
        scores: BTreeMap<String, f64>,
        model: impl Into<String>,
        metadata: Option<Metadata>,
    ) -> ModerationResponse {
        ModerationResponse {
            flagged,
            categories,
            scores,
            model: model.into(),
            metadata: metadata.unwrap_or_default(),
        }
    }

    /// Format an error response
    #[must_use]
    pub fn format_error_response(
        error: impl Into<String>,
        model: impl Into<String>,
        code: Option<&str>,
        details: Option<Map<String, Value>>,
    ) -> ErrorResponse {
        ErrorResponse {
            error: error.into(),
            model: model.into(),
            code: code.map(String::from),
            details: details.unwrap_or_default(),
        }
    }

    /// Build an error envelope from a gateway error
    #[must_use]
    pub fn from_error(model: &str, err: &GatewayError) -> ErrorResponse {
        let mut details = Map::new();
        let message = match err {
            GatewayError::ProviderCall {
                provider,
                message,
                status_code,
            } => {
                details.insert("provider".to_string(), Value::from(provider.as_str()));
                if let Some(status) = status_code {
                    details.insert("status_code".to_string(), Value::from(*status));
                }
                message.clone()
            }
            other => other.to_string(),
        };

        Self::format_error_response(message, model, Some(err.error_code()), Some(details))
    }

    /// Extract integer usage counters from a provider usage object
    #[must_use]
    pub fn usage_from_json(value: Option<&Value>) -> Usage {
        value
            .and_then(Value::as_object)
            .map(|object| {
                object
                    .iter()
                    .filter_map(|(key, value)| value.as_u64().map(|count| (key.clone(), count)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Stamp the serving provider onto a success envelope; failures pass through
    #[must_use]
    pub fn annotate<T: EnvelopeBody>(envelope: Envelope<T>, provider: &str) -> Envelope<T> {
        match envelope {
            Envelope::Success(mut body) => {
                body.metadata_mut()
                    .insert("provider".to_string(), Value::from(provider));
                Envelope::Success(body)
            }
            failure @ Envelope::Failure(_) => failure,
        }
    }
}
