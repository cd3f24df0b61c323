//! Response mode: the knobs that distinguish one call flow from another.

use crate::dataset::ModelId;
use serde::{Deserialize, Serialize};

/// Whether a spoken reply is followed by another listen-and-callback turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatherPolicy {
    /// Speak the reply, then let the call end.
    SpeakOnly,
    /// Speak the reply, then gather the caller's next utterance.
    #[default]
    SpeakAndGather,
}

/// Which model answers the caller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ChatTarget {
    /// Whatever model the hosted service uses by default.
    #[default]
    ServiceDefault,
    /// A base model named in configuration.
    Named(ModelId),
    /// A model produced by the fine-tuning workflow.
    FineTuned(ModelId),
}

impl ChatTarget {
    /// Returns the model id to put on outbound requests, if any.
    pub fn model_id(&self) -> Option<&ModelId> {
        match self {
            Self::ServiceDefault => None,
            Self::Named(id) | Self::FineTuned(id) => Some(id),
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ServiceDefault => "service-default",
            Self::Named(_) => "named",
            Self::FineTuned(_) => "fine-tuned",
        }
    }
}

/// The full set of per-deployment choices the webhook handlers honor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResponseMode {
    pub gather: GatherPolicy,
    pub target: ChatTarget,
    /// Consume the chat reply as a fragment stream instead of one response.
    pub streaming: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_model_ids() {
        assert_eq!(ChatTarget::ServiceDefault.model_id(), None);
        let id = ModelId::new("ft-7").unwrap();
        assert_eq!(ChatTarget::FineTuned(id.clone()).model_id(), Some(&id));
        assert_eq!(ChatTarget::Named(id.clone()).label(), "named");
    }

    #[test]
    fn gather_policy_parses_from_config_strings() {
        #[derive(Deserialize)]
        struct Wrapper {
            gather: GatherPolicy,
        }
        let w: Wrapper = serde_json::from_str(r#"{"gather":"speak_only"}"#).unwrap();
        assert_eq!(w.gather, GatherPolicy::SpeakOnly);
        assert_eq!(GatherPolicy::default(), GatherPolicy::SpeakAndGather);
    }
}
