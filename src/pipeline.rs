//! Message pipeline: placeholder first, translation later.
//!
//! Inbound `MESSAGE` envelopes become a pending transcript entry immediately;
//! translation and detection run concurrently on a spawned task and resolve the
//! entry in place. Gateway failures never leave this module as errors: they
//! become sentinel text plus the session's `last_error`.
//!
//! Language changes retranslate every USER entry as one batch that is applied
//! atomically once all calls have settled.

use std::sync::Arc;

use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::gateway::TranslationGateway;
use crate::protocol::ProtocolEnvelope;
use crate::state::SharedState;
use crate::transcript::{failed_to_translate_to, ChatMessage, MessageId, TRANSLATION_FAILED, UNKNOWN_LANGUAGE};

pub struct MessagePipeline {
    gateway: Arc<dyn TranslationGateway>,
    state: SharedState,
}

impl MessagePipeline {
    pub fn new(gateway: Arc<dyn TranslationGateway>, state: SharedState) -> Self {
        MessagePipeline { gateway, state }
    }

    /// Materialize `envelope` as a pending entry and start resolving it.
    ///
    /// Returns `None` (and does nothing) unless `envelope` is a `MESSAGE` with
    /// non-empty text. The pending entry is in the transcript before this
    /// returns; the handle completes once the entry has been resolved.
    pub fn handle(&self, envelope: &ProtocolEnvelope, target_language: &str) -> Option<JoinHandle<()>> {
        let text = match envelope {
            ProtocolEnvelope::Message { text, .. } if !text.is_empty() => text.clone(),
            _ => return None,
        };

        let (id, generation) = {
            let mut guard = self.state.lock().ok()?;
            let id = guard.transcript.push(ChatMessage::pending(envelope.sender_name(), text.clone()));
            (id, guard.generation)
        };
        debug!(message = %id, sender = envelope.sender_name(), target_language, "pending message appended");

        let gateway = Arc::clone(&self.gateway);
        let state = Arc::clone(&self.state);
        let target_language = target_language.to_string();
        Some(tokio::spawn(async move {
            let (translated, detected) =
                tokio::join!(gateway.translate(&text, &target_language), gateway.detect_language(&text));
            resolve_pending(&state, id, generation, translated, detected);
        }))
    }

    /// Switch the session to `new_language` and retranslate every USER entry.
    ///
    /// SYSTEM entries and detected languages are left alone. Results are
    /// applied in one update after every call has settled, and discarded if
    /// another language change started in the meantime.
    pub fn retranslate_all(&self, new_language: &str) -> JoinHandle<()> {
        let snapshot = match self.state.lock() {
            Ok(mut guard) => {
                guard.target_language = new_language.to_string();
                guard.last_error = None;
                guard.generation += 1;
                Some((guard.generation, guard.transcript.user_entries()))
            }
            Err(_) => None,
        };

        let gateway = Arc::clone(&self.gateway);
        let state = Arc::clone(&self.state);
        let language = new_language.to_string();
        tokio::spawn(async move {
            let Some((generation, entries)) = snapshot else { return };
            debug!(generation, count = entries.len(), language = %language, "bulk retranslation started");

            let results = join_all(entries.into_iter().map(|(id, text)| {
                let gateway = Arc::clone(&gateway);
                let language = language.clone();
                async move { (id, gateway.translate(&text, &language).await) }
            }))
            .await;

            let Ok(mut guard) = state.lock() else { return };
            if guard.generation != generation {
                debug!(generation, current = guard.generation, "superseded retranslation discarded");
                return;
            }
            let mut failure = None;
            for (id, result) in results {
                let translated = match result {
                    Ok(t) => t,
                    Err(e) => {
                        warn!(message = %id, error = %e, language = %language, "retranslation failed");
                        failure = Some(e.to_string());
                        failed_to_translate_to(&language)
                    }
                };
                guard.transcript.update(id, |m| m.translated_text = Some(translated));
            }
            if let Some(reason) = failure {
                guard.last_error = Some(format!("Error: Could not translate to {}. {}", language, reason));
            }
        })
    }
}

/// Fold the joint translate/detect outcome into the pending entry `id`.
fn resolve_pending(
    state: &SharedState,
    id: MessageId,
    generation: u64,
    translated: crate::error::Result<String>,
    detected: crate::error::Result<String>,
) {
    let Ok(mut guard) = state.lock() else { return };
    let current = guard.generation == generation;
    match translated {
        Ok(translated) => {
            let detected = detected.unwrap_or_else(|_| UNKNOWN_LANGUAGE.to_string());
            guard.transcript.update(id, |m| {
                if current {
                    m.translated_text = Some(translated);
                }
                m.detected_language = Some(detected);
            });
        }
        Err(e) => {
            warn!(message = %id, error = %e, "translation failed");
            guard.transcript.update(id, |m| {
                if current {
                    m.translated_text = Some(TRANSLATION_FAILED.to_string());
                }
                m.detected_language = Some(UNKNOWN_LANGUAGE.to_string());
            });
            if current {
                guard.last_error = Some(format!("Error: Could not translate. {}", e));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
