use regex::Regex;

/// A fenced block pulled out of a reply, with its optional language tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub lang: Option<String>,
    pub text: String,
}

/// Extract the first fenced block under a heading that starts with the
/// literal `leader`.
///
/// Grammar: a line of 1-6 `#` characters, optional spaces, the leader,
/// anything else on that line, then the next fence (optional language tag),
/// then the body up to the matching closing fence, non-greedily. Returns
/// `None` when no such segment exists; that is "artifact not produced",
/// never an error.
pub fn extract_segment(response: &str, leader: &str) -> Option<Segment> {
    let pattern = format!(
        r"(?ms)^#{{1,6}}[ \t]*{}[^\n]*\s*```([A-Za-z0-9_+-]*)[ \t]*\r?\n(.*?)\s*```",
        regex::escape(leader)
    );
    // The leader is escaped, so the pattern only fails to compile if the
    // skeleton itself is broken; treat that as no match.
    let re = Regex::new(&pattern).ok()?;
    let caps = re.captures(response)?;

    let lang = caps
        .get(1)
        .map(|m| m.as_str())
        .filter(|tag| !tag.is_empty())
        .map(str::to_string);
    let text = caps.get(2)?.as_str().trim().to_string();
    Some(Segment { lang, text })
}
