//! Style presets and the instruction prefixes they select.

use std::fmt;

use serde::Serialize;

/// Instruction used for the second, formal-register pass.
pub const FORMAL_REWRITE_PREFIX: &str = "Rewrite this summary in a formal, neutral, and polished tone:";

/// Summarization register chosen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StyleTag {
    #[default]
    News,
    Academic,
    Marketing,
    SimpleEnglish,
}

impl StyleTag {
    pub const ALL: [StyleTag; 4] = [
        StyleTag::News,
        StyleTag::Academic,
        StyleTag::Marketing,
        StyleTag::SimpleEnglish,
    ];

    /// Case-insensitive exact match; anything unrecognized, including an
    /// empty or absent value, is `News`.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return StyleTag::News;
        };
        match raw.to_lowercase().as_str() {
            "academic" => StyleTag::Academic,
            "marketing" => StyleTag::Marketing,
            "simple-english" => StyleTag::SimpleEnglish,
            _ => StyleTag::News,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StyleTag::News => "news",
            StyleTag::Academic => "academic",
            StyleTag::Marketing => "marketing",
            StyleTag::SimpleEnglish => "simple-english",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StyleTag::News => "News",
            StyleTag::Academic => "Academic",
            StyleTag::Marketing => "Marketing",
            StyleTag::SimpleEnglish => "Simple English",
        }
    }

    pub fn instruction(self) -> &'static str {
        match self {
            StyleTag::Academic => "Summarize formally and objectively with precise wording:",
            StyleTag::Marketing => "Summarize persuasively highlighting key benefits:",
            StyleTag::SimpleEnglish => "Summarize in simple English for a Grade 9 reader:",
            StyleTag::News => "Summarize clearly and concisely:",
        }
    }
}

impl fmt::Display for StyleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn build_prompt(text: &str, style: StyleTag) -> String {
    format!("{}\n{text}", style.instruction())
}

pub fn build_rewrite_prompt(summary: &str) -> String {
    format!("{FORMAL_REWRITE_PREFIX}\n{summary}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognized_styles_use_their_prefix() {
        let cases = [
            ("news", "Summarize clearly and concisely:"),
            ("academic", "Summarize formally and objectively with precise wording:"),
            ("marketing", "Summarize persuasively highlighting key benefits:"),
            ("simple-english", "Summarize in simple English for a Grade 9 reader:"),
        ];
        for (raw, prefix) in cases {
            let prompt = build_prompt("Body text.", StyleTag::parse(Some(raw)));
            assert_eq!(prompt, format!("{prefix}\nBody text."));
        }
    }

    #[test]
    fn matching_ignores_case_but_not_spelling() {
        assert_eq!(StyleTag::parse(Some("ACADEMIC")), StyleTag::Academic);
        assert_eq!(StyleTag::parse(Some("Simple-English")), StyleTag::SimpleEnglish);
        assert_eq!(StyleTag::parse(Some("simple english")), StyleTag::News);
        assert_eq!(StyleTag::parse(Some(" academic")), StyleTag::News);
        assert_eq!(StyleTag::parse(Some("academics")), StyleTag::News);
    }

    #[test]
    fn unknown_or_missing_styles_fall_back_to_news() {
        for raw in [None, Some(""), Some("poetry")] {
            assert_eq!(
                build_prompt("x", StyleTag::parse(raw)),
                "Summarize clearly and concisely:\nx"
            );
        }
    }

    #[test]
    fn canonical_names_round_trip() {
        for style in StyleTag::ALL {
            assert_eq!(StyleTag::parse(Some(style.as_str())), style);
        }
    }

    #[test]
    fn rewrite_prompt_wraps_summary() {
        assert_eq!(
            build_rewrite_prompt("Short summary."),
            "Rewrite this summary in a formal, neutral, and polished tone:\nShort summary."
        );
    }
}
