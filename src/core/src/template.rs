//! Username/group templates
//!
//! A template is literal text with `{{Token}}` placeholders. Only
//! `{{AccountID}}` and `{{SessionName}}` exist; anything else inside double
//! braces is an error, as is an unterminated `{{`. Parsing happens once, when
//! a mapping is validated, so rendering is a plain concatenation.

use crate::error::{CoreError, Result};
use std::fmt;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Recognized template parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateToken {
    /// 12 digit account owning the principal
    AccountId,
    /// STS role session name
    SessionName,
}

impl TemplateToken {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AccountId => "AccountID",
            Self::SessionName => "SessionName",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "AccountID" => Some(Self::AccountId),
            "SessionName" => Some(Self::SessionName),
            _ => None,
        }
    }
}

impl fmt::Display for TemplateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{{{}}}}}", self.name())
    }
}

/// One piece of a parsed template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Token(TemplateToken),
}

/// A parsed template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    raw: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse a template in a single left-to-right pass
    pub fn parse(raw: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut rest = raw;

        while let Some(start) = rest.find(OPEN) {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }

            let after_open = &rest[start + OPEN.len()..];
            let end = after_open.find(CLOSE).ok_or_else(|| CoreError::MalformedTemplate {
                template: raw.to_string(),
                reason: "unterminated '{{'".to_string(),
            })?;

            let name = &after_open[..end];
            let token = TemplateToken::from_name(name).ok_or_else(|| {
                CoreError::UnknownTemplateToken {
                    template: raw.to_string(),
                    token: name.to_string(),
                }
            })?;
            segments.push(Segment::Token(token));

            rest = &after_open[end + CLOSE.len()..];
        }

        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.raw.trim().is_empty()
    }

    /// Whether the template references `token`
    pub fn uses(&self, token: TemplateToken) -> bool {
        self.segments.iter().any(|s| *s == Segment::Token(token))
    }

    /// Whether the template is plain text
    pub fn is_literal(&self) -> bool {
        self.segments.iter().all(|s| matches!(s, Segment::Literal(_)))
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
