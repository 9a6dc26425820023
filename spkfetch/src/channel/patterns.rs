//! Priority-ordered pattern matching over received text.

use indexmap::IndexMap;
use regex::bytes::Regex;

use super::buffer::PatternBuffer;

/// Result of a successful `receive_until`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    /// Index of the pattern that matched, in registration order.
    pub index: usize,

    /// Positional capture groups (group 0 excluded). `None` for groups
    /// that did not participate in the match.
    pub groups: Vec<Option<String>>,

    /// Named capture groups that participated in the match.
    pub named: IndexMap<String, String>,

    /// The text the pattern itself matched.
    pub matched: String,

    /// Everything consumed from the buffer, up to and including the match.
    pub raw: String,
}

impl PatternMatch {
    /// Positional group `n` (1-based, like regex groups).
    pub fn group(&self, n: usize) -> Option<&str> {
        self.groups.get(n.checked_sub(1)?)?.as_deref()
    }

    /// Named group value.
    pub fn named(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }
}

/// Test `patterns` in order against the buffer tail.
///
/// The first pattern that matches anywhere in the tail wins, even if a
/// later pattern matches earlier in the text. On a match the buffer is
/// consumed through the end of the match.
pub fn match_first(buffer: &mut PatternBuffer, patterns: &[Regex]) -> Option<PatternMatch> {
    let offset = buffer.tail_start();
    let (index, groups, named, matched, end) = {
        let tail = buffer.tail();
        patterns.iter().enumerate().find_map(|(index, pattern)| {
            let caps = pattern.captures(tail)?;
            let whole = caps.get(0)?;

            let groups = caps
                .iter()
                .skip(1)
                .map(|g| g.map(|m| lossy(m.as_bytes())))
                .collect();

            let named = pattern
                .capture_names()
                .flatten()
                .filter_map(|name| Some((name.to_string(), lossy(caps.name(name)?.as_bytes()))))
                .collect();

            Some((index, groups, named, lossy(whole.as_bytes()), offset + whole.end()))
        })?
    };

    let raw = lossy(&buffer.consume(end));
    Some(PatternMatch {
        index,
        groups,
        named,
        matched,
        raw,
    })
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
