use circuitgen_core::{split_ports, DesignEntity};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

static MODULE_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^#{1,6}[ \t]*Module[ \t]*(\d+)").expect("module heading pattern")
});

static MODULE_FIELDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)Model:[ \t]*([^\n]*?)[ \t]*\r?\n\s*Description:\s*(.*?)\s*\n[ \t]*Input[ \t]+Nodes:\s*(.*?)\s*\n[ \t]*Output[ \t]+Nodes:\s*(.*?)\s*(?:\n[ \t]*\r?\n|\z)",
    )
    .expect("module fields pattern")
});

const REQUIRED_LABELS: [&str; 4] = ["model:", "description:", "input nodes:", "output nodes:"];

/// Extract `Module N` declaration sections into entity skeletons.
///
/// Each section must carry `Model:`, `Description:`, `Input Nodes:` and
/// `Output Nodes:` labels in that order; a section missing any of them is
/// skipped, with a warning naming the ordinal and the first missing label so
/// upstream response drift stays visible. The model name is a single line;
/// the other values may wrap onto continuation lines, each running to the
/// next label (the last one to a blank line or the section end). Output order is appearance order;
/// ordinals are not renumbered or validated beyond a warning.
pub fn extract_sub_model_declarations(response: &str) -> Vec<DesignEntity> {
    let sections = split_sections(response);
    let heading_count = sections.len();

    let mut entities = Vec::new();
    let mut ordinals = Vec::new();
    for (ordinal, body) in sections {
        match MODULE_FIELDS.captures(&body) {
            Some(caps) => {
                let name = caps[1].trim().to_string();
                if name.is_empty() {
                    warn!("Module {} declares an empty model name, skipping", ordinal);
                    continue;
                }
                entities.push(DesignEntity::new(
                    name,
                    caps[2].trim(),
                    split_ports(caps[3].trim()),
                    split_ports(caps[4].trim()),
                ));
                ordinals.push(ordinal);
            }
            None => {
                let lowered = body.to_lowercase();
                let missing = REQUIRED_LABELS
                    .iter()
                    .find(|label| !lowered.contains(**label))
                    .copied()
                    .unwrap_or("labels out of order");
                warn!(
                    "Module {} section is malformed ({}), skipping",
                    ordinal, missing
                );
            }
        }
    }

    if entities.len() != heading_count {
        warn!(
            "parsed {} of {} Module sections; the rest were malformed",
            entities.len(),
            heading_count
        );
    }
    if !ordinals_are_contiguous(&ordinals) {
        warn!("Module ordinals {:?} are not contiguous from 1", ordinals);
    }

    entities
}

/// Slice the response into (ordinal, body) pairs, one per `Module N`
/// heading, each body running to the next heading or end of text.
fn split_sections(response: &str) -> Vec<(usize, String)> {
    let matches: Vec<_> = MODULE_HEADING.captures_iter(response).collect();
    let starts: Vec<usize> = matches
        .iter()
        .map(|c| c.get(0).map(|m| m.start()).unwrap_or(0))
        .collect();

    matches
        .iter()
        .enumerate()
        .map(|(i, caps)| {
            let ordinal = caps[1].parse().unwrap_or(0);
            let end = starts.get(i + 1).copied().unwrap_or(response.len());
            let section = &response[caps.get(0).map(|m| m.end()).unwrap_or(0)..end];
            // Drop the rest of the heading line.
            let body = match section.find('\n') {
                Some(pos) => section[pos + 1..].to_string(),
                None => String::new(),
            };
            (ordinal, body)
        })
        .collect()
}

pub(crate) fn ordinals_are_contiguous(ordinals: &[usize]) -> bool {
    ordinals.iter().enumerate().all(|(i, &o)| o == i + 1)
}
