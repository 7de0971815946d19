use circuitgen_core::TestArtifact;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::declarations::ordinals_are_contiguous;

static TEST_ITEM_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^#{1,6}[ \t]*Test_Item[ \t]*(\d+)").expect("test item heading pattern")
});

/// Extract `Test_Item N` sections into (code, description) slots.
///
/// Within a section, the fence tagged `code_tag` is the test code and the
/// fence tagged `doc_tag` is the description. Either may be absent; the item
/// is still emitted so indices stay aligned with appearance order. Ordinals
/// are recorded verbatim; a non-contiguous sequence only warns.
pub fn extract_test_items(response: &str, code_tag: &str, doc_tag: &str) -> Vec<TestArtifact> {
    let matches: Vec<_> = TEST_ITEM_HEADING.captures_iter(response).collect();
    let starts: Vec<usize> = matches
        .iter()
        .map(|c| c.get(0).map(|m| m.start()).unwrap_or(0))
        .collect();

    let items: Vec<TestArtifact> = matches
        .iter()
        .enumerate()
        .map(|(i, caps)| {
            let ordinal = caps[1].parse().unwrap_or(0);
            let end = starts.get(i + 1).copied().unwrap_or(response.len());
            let body = &response[caps.get(0).map(|m| m.end()).unwrap_or(0)..end];
            TestArtifact {
                ordinal,
                code: tagged_fence(body, code_tag),
                description: tagged_fence(body, doc_tag),
            }
        })
        .collect();

    let ordinals: Vec<usize> = items.iter().map(|t| t.ordinal).collect();
    if !ordinals_are_contiguous(&ordinals) {
        warn!("Test_Item ordinals {:?} are not contiguous from 1", ordinals);
    }

    items
}

/// First fenced block with exactly this language tag, trimmed.
fn tagged_fence(body: &str, tag: &str) -> Option<String> {
    let pattern = format!(
        r"(?ms)^\s*```{}[ \t]*\r?\n(.*?)\s*```",
        regex::escape(tag)
    );
    let re = Regex::new(&pattern).ok()?;
    re.captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}
