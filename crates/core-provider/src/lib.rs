//! Provider-agnostic completion pipeline.
//!
//! Scope: given the full text of a generation root and the active
//! [`Settings`], produce the list of completion strings to attach as new
//! nodes. Every failure, from a missing key to a malformed body, comes back
//! as a [`CompletionError`]; nothing here touches document state.
//!
//! Pipeline:
//! 1. `prepend + text`, trailing whitespace stripped, escapes undone ([`prompt`]).
//! 2. Truncated to the prompt budget, keeping the tail ([`tokenizer`]).
//! 3. One or more provider requests built and sent ([`request`], [`transport`]).
//! 4. Each completion post-processed for spacing and escapes.

pub mod error;
pub mod prompt;
pub mod request;
pub mod tokenizer;
pub mod transport;

pub use error::{CompletionError, CompletionResult};
pub use prompt::{PreparedPrompt, ProviderStyle};
pub use request::{HttpRequest, ProviderKind};
pub use transport::{HttpResponse, HttpTransport, Transport};

use core_config::Settings;
use tokenizer::ModelFamily;
use tracing::{debug, info};

/// Resolve the provider and build the final prompt for `path_text`.
pub fn prepare(settings: &Settings, path_text: &str) -> CompletionResult<(ProviderKind, PreparedPrompt)> {
    let kind: ProviderKind = settings.model.provider.parse()?;
    let mut prepared = prompt::assemble(
        &settings.model.prepend,
        path_text,
        &settings.editing.escaped_chars,
    );
    let family = ModelFamily::for_model(&settings.model.name);
    prepared.text = tokenizer::truncate(family, &prepared.text, settings.prompt_budget())?;
    Ok((kind, prepared))
}

/// Run one generation against `transport`.
pub async fn complete(
    transport: &dyn Transport,
    settings: &Settings,
    path_text: &str,
) -> CompletionResult<Vec<String>> {
    let (kind, prepared) = prepare(settings, path_text)?;
    let requests = request::build_requests(kind, settings, &prepared.text)?;
    info!(
        target: "provider.request",
        ?kind,
        model = settings.model.name.as_str(),
        requests = requests.len(),
        prompt_bytes = prepared.text.len(),
        "generation_started"
    );

    let mut slots = Vec::new();
    for req in &requests {
        let response = transport.post(req).await?;
        slots.extend(request::parse_response(kind, response.status, &response.body)?);
    }
    let completions: Vec<String> = slots
        .into_iter()
        .map(|raw| {
            prompt::postprocess(
                raw,
                kind.style(),
                prepared.stripped_whitespace,
                &settings.editing.escaped_chars,
            )
        })
        .collect();
    debug!(target: "provider.request", count = completions.len(), "generation_finished");
    Ok(completions)
}
