//! Pattern table for the ephemeris service dialogue.
//!
//! Every prompt and diagnostic the dialogue recognizes lives here rather
//! than in the script, so a change in the service's wording is a
//! configuration edit. Diagnostic patterns match their whole line up to
//! and including its terminator, so a line that arrives in pieces is only
//! reported once complete, and verbatim.

use regex::bytes::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Pattern sources, as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PatternTable {
    /// Main service prompt.
    pub banner: String,

    /// Catalogue lookup found nothing.
    pub not_found: String,

    /// Catalogue lookup matched several objects.
    pub ambiguous: String,

    /// Object selected; menu offering SPK generation.
    pub menu: String,

    /// Name prompt for user-supplied elements.
    pub object_name: String,

    /// Element entry prompt.
    pub elements_prompt: String,

    /// Elements rejected.
    pub input_error: String,

    /// Contact confirmation prompt.
    pub contact_prompt: String,

    /// Text-versus-binary format question.
    pub format_prompt: String,

    /// Span start prompt.
    pub start_prompt: String,

    /// Span stop prompt.
    pub stop_prompt: String,

    /// Date could not be parsed.
    pub bad_date: String,

    /// Date outside the supported range.
    pub out_of_range: String,

    /// Span shorter than the minimum.
    pub span_too_small: String,

    /// Offer to add more objects to the file.
    pub more_objects: String,

    /// Generation finished; must capture `id` and `file`.
    pub generated: String,
}

impl Default for PatternTable {
    fn default() -> Self {
        Self {
            banner: r"Horizons>\s*$".into(),
            not_found: r"[^\r\n]*(?:No matches found|No such object)[^\r\n]*\r?\n".into(),
            ambiguous: r"[^\r\n]*Number of matches *= *\d+[^\r\n]*\r?\n".into(),
            menu: r"\[E\]phemeris.*<cr>:\s*$".into(),
            object_name: r"Object name.*:\s*$".into(),
            elements_prompt: r"Enter elements.*:\s*$".into(),
            input_error: r"[^\r\n]*INPUT ERROR[^\r\n]*\r?\n".into(),
            contact_prompt: r"Confirm e-mail.*:\s*$".into(),
            format_prompt: r"SPK text transfer format.*:\s*$".into(),
            start_prompt: r"SPK object START.*:\s*$".into(),
            stop_prompt: r"SPK object STOP.*:\s*$".into(),
            bad_date: r"[^\r\n]*Cannot interpret date[^\r\n]*\r?\n".into(),
            out_of_range: r"[^\r\n]*(?:[Oo]utside [^\r\n]*range|Date out of range)[^\r\n]*\r?\n".into(),
            span_too_small: r"[^\r\n]*time-span too small[^\r\n]*\r?\n".into(),
            more_objects: r"Add more objects.*:\s*$".into(),
            generated: r"(?s)SPK ID\s*:\s*(?P<id>\d+).*File name\s*:\s*(?P<file>\S+)\s".into(),
        }
    }
}

impl PatternTable {
    /// Compile every pattern, naming the first one that fails.
    pub fn compile(&self) -> Result<Patterns, ConfigError> {
        let generated = compile("generated", &self.generated)?;
        for group in ["id", "file"] {
            if !generated.capture_names().flatten().any(|name| name == group) {
                return Err(ConfigError::MissingCapture {
                    key: "generated".to_string(),
                    group,
                });
            }
        }

        Ok(Patterns {
            banner: compile("banner", &self.banner)?,
            not_found: compile("not_found", &self.not_found)?,
            ambiguous: compile("ambiguous", &self.ambiguous)?,
            menu: compile("menu", &self.menu)?,
            object_name: compile("object_name", &self.object_name)?,
            elements_prompt: compile("elements_prompt", &self.elements_prompt)?,
            input_error: compile("input_error", &self.input_error)?,
            contact_prompt: compile("contact_prompt", &self.contact_prompt)?,
            format_prompt: compile("format_prompt", &self.format_prompt)?,
            start_prompt: compile("start_prompt", &self.start_prompt)?,
            stop_prompt: compile("stop_prompt", &self.stop_prompt)?,
            bad_date: compile("bad_date", &self.bad_date)?,
            out_of_range: compile("out_of_range", &self.out_of_range)?,
            span_too_small: compile("span_too_small", &self.span_too_small)?,
            more_objects: compile("more_objects", &self.more_objects)?,
            generated,
        })
    }
}

fn compile(key: &str, pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
        key: key.to_string(),
        source,
    })
}

/// Compiled form of [`PatternTable`].
#[derive(Debug, Clone)]
pub struct Patterns {
    pub banner: Regex,
    pub not_found: Regex,
    pub ambiguous: Regex,
    pub menu: Regex,
    pub object_name: Regex,
    pub elements_prompt: Regex,
    pub input_error: Regex,
    pub contact_prompt: Regex,
    pub format_prompt: Regex,
    pub start_prompt: Regex,
    pub stop_prompt: Regex,
    pub bad_date: Regex,
    pub out_of_range: Regex,
    pub span_too_small: Regex,
    pub more_objects: Regex,
    pub generated: Regex,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_compile() {
        let patterns = PatternTable::default().compile().unwrap();
        assert!(patterns.banner.is_match(b"\r\nHorizons> "));
        assert!(
            patterns
                .span_too_small
                .is_match(b"  Cannot continue, time-span too small (< 32 days)\r\n")
        );
        assert!(
            patterns
                .start_prompt
                .is_match(b" SPK object START [ t >= 1900-Jan-01 ] : ")
        );
    }

    #[test]
    fn test_diagnostic_matches_whole_line() {
        let patterns = PatternTable::default().compile().unwrap();
        let found = patterns
            .span_too_small
            .find(b"2030-Jan-01\r\n  Cannot continue, time-span too small (< 32 days)\r\n")
            .unwrap();
        assert_eq!(
            found.as_bytes(),
            b"  Cannot continue, time-span too small (< 32 days)\r\n"
        );
    }

    #[test]
    fn test_diagnostic_waits_for_end_of_line() {
        let patterns = PatternTable::default().compile().unwrap();
        let diagnostics = [
            (&patterns.not_found, "No matches found."),
            (&patterns.ambiguous, "Number of matches = 3 (use ID#)"),
            (&patterns.input_error, "INPUT ERROR: EC out of range"),
            (&patterns.bad_date, "Cannot interpret date. Type `?' for help"),
            (&patterns.out_of_range, "Date out of range (1900-2100)"),
            (&patterns.span_too_small, "Cannot continue, time-span too small (< 32 days)"),
        ];
        for (pattern, line) in diagnostics {
            assert!(!pattern.is_match(format!("\r\n  {line}").as_bytes()), "{line}");
            assert!(pattern.is_match(format!("\r\n  {line}\r\n").as_bytes()), "{line}");
        }
    }

    #[test]
    fn test_generated_captures_id_and_file() {
        let patterns = PatternTable::default().compile().unwrap();
        let text =
            b" Assigned SPK ID : 3012345\r\n File type : Binary\r\n File name : wld4521.15\r\n";
        let caps = patterns.generated.captures(text).unwrap();
        assert_eq!(&caps["id"], b"3012345");
        assert_eq!(&caps["file"], b"wld4521.15");
    }

    #[test]
    fn test_generated_waits_for_complete_file_name() {
        let patterns = PatternTable::default().compile().unwrap();
        assert!(!patterns.generated.is_match(b"SPK ID : 1\r\nFile name : wld45"));
    }

    #[test]
    fn test_invalid_pattern_named() {
        let table = PatternTable {
            bad_date: "(".into(),
            ..Default::default()
        };
        match table.compile().unwrap_err() {
            ConfigError::InvalidPattern { key, .. } => assert_eq!(key, "bad_date"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_generated_requires_groups() {
        let table = PatternTable {
            generated: r"File name\s*:\s*(\S+)".into(),
            ..Default::default()
        };
        assert!(matches!(
            table.compile().unwrap_err(),
            ConfigError::MissingCapture { group: "id", .. }
        ));
    }
}
