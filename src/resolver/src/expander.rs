//! Template expander
//!
//! Substitutes `{{AccountID}}` and `{{SessionName}}` in a parsed template.
//! Substituted values are appended as plain text and never rescanned.

use crate::error::{MapperError, Result};
use crate::matcher::MatchFields;
use iamk_core::{Segment, Template, TemplateToken};

/// Expand a raw pattern string
pub fn expand(pattern: &str, fields: &MatchFields) -> Result<String> {
    let template = Template::parse(pattern)?;
    expand_template(&template, fields)
}

/// Expand a parsed template
pub fn expand_template(template: &Template, fields: &MatchFields) -> Result<String> {
    let mut out = String::with_capacity(template.as_str().len());

    for segment in template.segments() {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Token(TemplateToken::AccountId) => out.push_str(&fields.account_id),
            Segment::Token(TemplateToken::SessionName) => {
                let session = fields
                    .session_name
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| MapperError::UnresolvedTemplate {
                        template: template.to_string(),
                        reason: "no session name available for this principal".to_string(),
                    })?;
                out.push_str(session);
            }
        }
    }

    Ok(out)
}

/// Expand a username and its groups as one unit
///
/// Any single failure fails the whole mapping.
pub fn expand_identity(
    username: &Template,
    groups: &[Template],
    fields: &MatchFields,
) -> Result<(String, Vec<String>)> {
    let username = expand_template(username, fields)?;
    let groups = groups
        .iter()
        .map(|g| expand_template(g, fields))
        .collect::<Result<Vec<_>>>()?;
    Ok((username, groups))
}
