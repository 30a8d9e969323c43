//! Model identity check.
//!
//! A health success only proves that *something* answers on the port. An
//! OpenAI-compatible server also lists what it serves on `/v1/models`, which
//! lets the runner reject a stale server left over from another run.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// Extract the served model ids from a `/v1/models` response body.
pub fn served_model_ids(body: &[u8]) -> Result<Vec<String>, serde_json::Error> {
    let list: ModelList = serde_json::from_slice(body)?;
    Ok(list.data.into_iter().map(|m| m.id).collect())
}

/// Whether `expected` is among the served ids. Trailing slashes are ignored
/// since object-storage prefixes are often written both ways.
pub fn serves_model(served: &[String], expected: &str) -> bool {
    let expected = expected.trim_end_matches('/');
    served.iter().any(|id| id.trim_end_matches('/') == expected)
}
