use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::application::ports::TextClassifier;

const SYSTEM_PROMPT: &str = "You are a strict topic gate for a moderated discussion. \
Decide whether the user's message belongs to the discussion scope. \
Answer with a single word: YES if it is within scope, NO otherwise.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeVerdict {
    pub in_scope: bool,
    pub reason: Option<String>,
}

impl ScopeVerdict {
    fn allow() -> Self {
        Self {
            in_scope: true,
            reason: None,
        }
    }

    fn deny(reason: &str) -> Self {
        Self {
            in_scope: false,
            reason: Some(reason.to_string()),
        }
    }
}

/// Judges candidate messages against a session scope. Every failure path
/// yields a deny verdict.
pub struct ScopeGuard {
    classifier: Option<Arc<dyn TextClassifier>>,
    timeout: Duration,
}

impl ScopeGuard {
    pub fn new(classifier: Option<Arc<dyn TextClassifier>>, timeout: Duration) -> Self {
        Self { classifier, timeout }
    }

    pub async fn check_in_scope(
        &self,
        scope: Option<&str>,
        context: Option<&str>,
        candidate: &str,
    ) -> ScopeVerdict {
        let Some(scope) = scope.map(str::trim).filter(|s| !s.is_empty()) else {
            return ScopeVerdict::deny("session has no scope");
        };
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return ScopeVerdict::deny("message has no text to evaluate");
        }
        let Some(classifier) = &self.classifier else {
            warn!("scope classifier is not configured, denying message");
            return ScopeVerdict::deny("scope classifier unavailable");
        };

        let prompt = user_prompt(scope, context, candidate);
        let answer = match tokio::time::timeout(self.timeout, classifier.classify(SYSTEM_PROMPT, &prompt)).await {
            Ok(Ok(answer)) => answer,
            Ok(Err(e)) => {
                warn!("scope classifier failed: {}", e);
                return ScopeVerdict::deny("scope classifier unavailable");
            }
            Err(_) => {
                warn!("scope classifier timed out after {:?}", self.timeout);
                return ScopeVerdict::deny("scope classifier timed out");
            }
        };

        match parse_verdict(&answer) {
            Some(true) => ScopeVerdict::allow(),
            Some(false) => ScopeVerdict::deny("message is outside the session scope"),
            None => {
                debug!("unparsable classifier verdict: {:?}", answer);
                ScopeVerdict::deny("scope classifier gave no clear verdict")
            }
        }
    }
}

fn user_prompt(scope: &str, context: Option<&str>, candidate: &str) -> String {
    let mut prompt = format!("Discussion scope: {}\n", scope);
    if let Some(context) = context.map(str::trim).filter(|c| !c.is_empty()) {
        prompt.push_str(&format!("Background context: {}\n", context));
    }
    prompt.push_str(&format!(
        "User message: {}\n\nIs the user message within the discussion scope? Answer YES or NO.",
        candidate
    ));
    prompt
}

/// `Some(true)` for an answer starting with the word "yes", `Some(false)` for
/// "no", `None` otherwise.
pub fn parse_verdict(answer: &str) -> Option<bool> {
    let answer = answer.trim().to_lowercase();
    if starts_with_word(&answer, "yes") {
        Some(true)
    } else if starts_with_word(&answer, "no") {
        Some(false)
    } else {
        None
    }
}

fn starts_with_word(text: &str, word: &str) -> bool {
    text.strip_prefix(word)
        .map(|rest| !rest.starts_with(|c: char| c.is_alphanumeric()))
        .unwrap_or(false)
}
