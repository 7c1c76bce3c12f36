//! Scrub filter for log and metric output
//!
//! ARNs owned by a scrubbed account are replaced by a placeholder that keeps
//! only the resource type, e.g. `arn:***:role/***`. Applied where ARNs are
//! logged; values returned by the resolver are never scrubbed.

use iamk_core::{AccountId, Arn, ResourceKind};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

const REDACTED: &str = "***";

/// Scrub a single ARN
///
/// Unparseable input is only redacted (fully) when it contains a scrubbed
/// account ID; otherwise it is returned unchanged.
pub fn scrub(arn: &str, scrubbed_accounts: &HashSet<AccountId>) -> String {
    if scrubbed_accounts.is_empty() {
        return arn.to_string();
    }

    match Arn::parse(arn) {
        Ok(parsed) if scrubbed_accounts.contains(parsed.account_id()) => match parsed.kind() {
            ResourceKind::Root => format!("arn:{}:root", REDACTED),
            kind => format!("arn:{}:{}/{}", REDACTED, kind, REDACTED),
        },
        Ok(_) => arn.to_string(),
        Err(_) if scrubbed_accounts.iter().any(|acct| arn.contains(acct.as_str())) => {
            format!("arn:{}:{}", REDACTED, REDACTED)
        }
        Err(_) => arn.to_string(),
    }
}

/// Shared scrub set used at logging call sites
#[derive(Debug, Clone, Default)]
pub struct Scrubber {
    accounts: Arc<HashSet<AccountId>>,
}

impl Scrubber {
    pub fn new<I, S>(accounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<AccountId>,
    {
        Self {
            accounts: Arc::new(accounts.into_iter().map(Into::into).collect()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn is_scrubbed(&self, account_id: &str) -> bool {
        self.accounts.contains(account_id)
    }

    pub fn scrub(&self, arn: &str) -> String {
        scrub(arn, &self.accounts)
    }

    /// Scrub every ARN and scrubbed account ID inside free text
    ///
    /// Used for error messages and expanded identities, where an ARN may be
    /// quoted, embedded after a colon, or reduced to a bare account ID.
    pub fn scrub_text(&self, text: &str) -> String {
        if self.is_empty() {
            return text.to_string();
        }

        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("arn:") {
            out.push_str(&rest[..start]);
            let tail = &rest[start..];
            let end = tail
                .find(|c: char| c.is_whitespace() || matches!(c, '\'' | '"' | ',' | ')' | ']'))
                .unwrap_or(tail.len());
            out.push_str(&self.scrub(&tail[..end]));
            rest = &tail[end..];
        }
        out.push_str(rest);

        self.accounts
            .iter()
            .fold(out, |text, account| text.replace(account.as_str(), REDACTED))
    }

    /// Lazily scrubbed value for `tracing` fields and format strings
    pub fn display<'a>(&'a self, arn: &'a str) -> ScrubbedArn<'a> {
        ScrubbedArn { scrubber: self, arn }
    }
}

/// Display adapter returned by [`Scrubber::display`]
pub struct ScrubbedArn<'a> {
    scrubber: &'a Scrubber,
    arn: &'a str,
}

impl fmt::Display for ScrubbedArn<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.scrubber.scrub(self.arn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn set(accounts: &[&str]) -> HashSet<AccountId> {
        accounts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_scrub_role() {
        let s = set(&["123456789012"]);
        assert_eq!(scrub("arn:aws:iam::123456789012:role/path/Admin", &s), "arn:***:role/***");
        assert_eq!(
            scrub("arn:aws:sts::123456789012:assumed-role/Admin/alice", &s),
            "arn:***:assumed-role/***"
        );
        assert_eq!(scrub("arn:aws:iam::123456789012:user/bob", &s), "arn:***:user/***");
        assert_eq!(scrub("arn:aws:iam::123456789012:root", &s), "arn:***:root");
    }

    #[test]
    fn test_other_accounts_untouched() {
        let s = set(&["123456789012"]);
        let arn = "arn:aws:iam::999999999999:role/Admin";
        assert_eq!(scrub(arn, &s), arn);
    }

    #[test]
    fn test_malformed_with_scrubbed_account() {
        let s = set(&["123456789012"]);
        assert_eq!(scrub("arn:aws:iam::123456789012:role/", &s), "arn:***:***");
        assert_eq!(scrub("garbage", &s), "garbage");
    }

    #[test]
    fn test_scrubber_display() {
        let scrubber = Scrubber::new(["123456789012"]);
        let arn = "arn:aws:iam::123456789012:role/Admin";
        assert_eq!(format!("{}", scrubber.display(arn)), "arn:***:role/***");
        assert!(scrubber.is_scrubbed("123456789012"));
        assert!(!Scrubber::default().is_scrubbed("123456789012"));
    }

    #[test]
    fn test_scrub_text() {
        let scrubber = Scrubber::new(["123456789012"]);
        assert_eq!(
            scrubber.scrub_text("Duplicate mapping for ARN: arn:aws:iam::123456789012:role/Secret"),
            "Duplicate mapping for ARN: arn:***:role/***"
        );
        assert_eq!(
            scrubber.scrub_text("Invalid ARN 'arn:aws:iam::123456789012:role/': empty"),
            "Invalid ARN 'arn:***:***': empty"
        );
        assert_eq!(scrubber.scrub_text("tenant:123456789012"), "tenant:***");
        assert_eq!(
            scrubber.scrub_text("mapping 'arn:aws:iam::999999999999:role/Ok'"),
            "mapping 'arn:aws:iam::999999999999:role/Ok'"
        );
        assert_eq!(Scrubber::default().scrub_text("123456789012"), "123456789012");
    }

    proptest! {
        #[test]
        fn test_scrub_is_idempotent(
            arn in "(arn:aws:(iam|sts)::(123456789012|999999999999):(role|user|assumed-role)/[a-zA-Z/]{1,20})|.{0,60}",
        ) {
            let s = set(&["123456789012"]);
            let once = scrub(&arn, &s);
            prop_assert_eq!(scrub(&once, &s), once);
        }
    }

    proptest! {
        #[test]
        fn test_scrub_text_hides_accounts(prefix in "[a-z :']{0,12}", name in "[A-Za-z]{1,10}") {
            let scrubber = Scrubber::new(["123456789012"]);
            let text = format!("{}arn:aws:iam::123456789012:role/{} {}", prefix, name, "123456789012");
            let once = scrubber.scrub_text(&text);
            prop_assert!(!once.contains("123456789012"));
            prop_assert_eq!(scrubber.scrub_text(&once), once);
        }
    }
}
