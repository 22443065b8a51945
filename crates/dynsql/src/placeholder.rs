//! Placeholder translation for template text.
//!
//! Raw template text uses two markers:
//! - `${name}`: property, spliced into the SQL text verbatim
//! - `#{name}`: parameter, rendered as `?` (positional) or `:name` (named)
//!
//! [`translate`] scans the text once and replaces every marker with an
//! index into one of two name lists. Properties are deduplicated in
//! first-seen order; parameters are kept per occurrence.

use std::fmt;
use std::sync::OnceLock;

fn marker_regex() -> &'static regex::Regex {
    static MARKER_RE: OnceLock<regex::Regex> = OnceLock::new();
    MARKER_RE.get_or_init(|| {
        regex::Regex::new(r"([$#])\{(.*?)\}").expect("invalid built-in placeholder regex")
    })
}

/// One piece of translated template text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal SQL text.
    Text(String),
    /// Index into [`Translated::properties`].
    Property(usize),
    /// Index into [`Translated::parameters`].
    Parameter(usize),
}

/// Template text with markers replaced by positional indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Translated {
    pub segments: Vec<Segment>,
    /// Distinct property names, first-seen order.
    pub properties: Vec<String>,
    /// Parameter names, one per occurrence.
    pub parameters: Vec<String>,
}

impl Translated {
    /// No markers were found.
    pub fn is_pure(&self) -> bool {
        self.properties.is_empty() && self.parameters.is_empty()
    }
}

/// Renders the normalized form, e.g. `SELECT * FROM ${0} WHERE id = #{0}`.
impl fmt::Display for Translated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Text(s) => f.write_str(s)?,
                Segment::Property(idx) => write!(f, "${{{idx}}}")?,
                Segment::Parameter(idx) => write!(f, "#{{{idx}}}")?,
            }
        }
        Ok(())
    }
}

fn clean_name(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| matches!(c, '$' | '#' | '{' | '}'))
        .trim()
        .to_string()
}

/// Translate raw template text.
pub fn translate(text: &str) -> Translated {
    let mut out = Translated::default();
    let mut last = 0;

    for caps in marker_regex().captures_iter(text) {
        let (Some(whole), Some(sigil), Some(name)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };

        if whole.start() > last {
            out.segments
                .push(Segment::Text(text[last..whole.start()].to_string()));
        }
        last = whole.end();

        let name = clean_name(name.as_str());
        if sigil.as_str() == "$" {
            let idx = match out.properties.iter().position(|p| *p == name) {
                Some(idx) => idx,
                None => {
                    out.properties.push(name);
                    out.properties.len() - 1
                }
            };
            out.segments.push(Segment::Property(idx));
        } else {
            out.parameters.push(name);
            out.segments.push(Segment::Parameter(out.parameters.len() - 1));
        }
    }

    if last < text.len() {
        out.segments.push(Segment::Text(text[last..].to_string()));
    }
    out
}
