//! Capability declarations for provider adapters.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One operation an adapter may support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Single-prompt text generation
    TextGeneration,
    /// Multi-turn chat
    Chat,
    /// Text embeddings
    Embeddings,
    /// Image description / visual question answering
    ImageAnalysis,
    /// Content moderation
    Moderation,
    /// Image generation
    ImageGeneration,
}

impl Capability {
    /// All capabilities in declaration order
    pub const ALL: [Self; 6] = [
        Self::TextGeneration,
        Self::Chat,
        Self::Embeddings,
        Self::ImageAnalysis,
        Self::Moderation,
        Self::ImageGeneration,
    ];

    /// Snake-case name used in envelopes and errors
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TextGeneration => "text_generation",
            Self::Chat => "chat",
            Self::Embeddings => "embeddings",
            Self::ImageAnalysis => "image_analysis",
            Self::Moderation => "moderation",
            Self::ImageGeneration => "image_generation",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability flags declared by an adapter.
///
/// Fixed at construction; adapters hand out copies, never mutable access.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    /// Text generation
    pub text_generation: bool,
    /// Chat
    pub chat: bool,
    /// Embeddings
    pub embeddings: bool,
    /// Image analysis
    pub image_analysis: bool,
    /// Moderation
    pub moderation: bool,
    /// Image generation
    pub image_generation: bool,
}

impl CapabilitySet {
    /// A set with no capabilities
    #[must_use]
    pub const fn none() -> Self {
        Self {
            text_generation: false,
            chat: false,
            embeddings: false,
            image_analysis: false,
            moderation: false,
            image_generation: false,
        }
    }

    /// Text generation and chat, nothing else
    #[must_use]
    pub const fn text_and_chat() -> Self {
        Self {
            text_generation: true,
            chat: true,
            ..Self::none()
        }
    }

    /// Enable a capability
    #[must_use]
    pub fn with(mut self, capability: Capability) -> Self {
        match capability {
            Capability::TextGeneration => self.text_generation = true,
            Capability::Chat => self.chat = true,
            Capability::Embeddings => self.embeddings = true,
            Capability::ImageAnalysis => self.image_analysis = true,
            Capability::Moderation => self.moderation = true,
            Capability::ImageGeneration => self.image_generation = true,
        }
        self
    }

    /// Check a single capability
    #[must_use]
    pub const fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::TextGeneration => self.text_generation,
            Capability::Chat => self.chat,
            Capability::Embeddings => self.embeddings,
            Capability::ImageAnalysis => self.image_analysis,
            Capability::Moderation => self.moderation,
            Capability::ImageGeneration => self.image_generation,
        }
    }

    /// Iterate over the enabled capabilities
    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL
            .into_iter()
            .filter(move |capability| self.supports(*capability))
    }
}

/// How an adapter answers `moderate_content`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationMode {
    /// Calls the provider's moderation facility
    Native,
    /// Returns an unflagged envelope explaining that moderation is unavailable
    Degraded,
    /// Fails with a capability error
    Unsupported,
}

impl ModerationMode {
    /// Mode implied by a capability set when the adapter declares nothing else
    #[must_use]
    pub const fn from_capabilities(capabilities: &CapabilitySet) -> Self {
        if capabilities.moderation {
            Self::Native
        } else {
            Self::Unsupported
        }
    }
}
