//! Builds session policies that scope S3 access to account ID prefixes.
//!
//! A session policy passed to `sts:AssumeRole` can only narrow the role's
//! permissions. Allowing `s3:*` solely when `s3:ResourceAccount` is
//! `StringLike` one of the prefixes turns every S3 request into a yes/no
//! question about the owning account.

use std::collections::BTreeMap;

use crate::types::{ConditionBlock, PolicyDocument, PrefixSet, Statement};

pub const POLICY_VERSION: &str = "2012-10-17";

/// Condition key carrying the account that owns the requested S3 resource.
pub const RESOURCE_ACCOUNT_KEY: &str = "s3:ResourceAccount";

const STRING_LIKE: &str = "StringLike";

/// Build a policy allowing S3 access only to resources owned by an account
/// starting with one of `prefixes`.
///
/// Prefix order is preserved in the condition values.
pub fn build_prefix_policy(prefixes: &PrefixSet) -> PolicyDocument {
    let patterns: Vec<String> = prefixes.iter().map(|p| format!("{p}*")).collect();

    let mut condition: ConditionBlock = BTreeMap::new();
    condition
        .entry(STRING_LIKE.to_string())
        .or_default()
        .insert(RESOURCE_ACCOUNT_KEY.to_string(), patterns);

    PolicyDocument {
        version: POLICY_VERSION.to_string(),
        statement: vec![Statement {
            sid: "AllowResourceAccount".to_string(),
            effect: "Allow".to_string(),
            action: "s3:*".to_string(),
            resource: "*".to_string(),
            condition,
        }],
    }
}

impl PolicyDocument {
    /// Evaluate the document against a resource owned by `account`.
    ///
    /// Only `Allow` statements and their `StringLike` conditions on
    /// `s3:ResourceAccount` are considered; a statement without conditions
    /// allows everything. Other operators never match.
    pub fn allows_resource_account(&self, account: &str) -> bool {
        self.statement
            .iter()
            .filter(|s| s.effect == "Allow")
            .any(|s| statement_matches(&s.condition, account))
    }
}

fn statement_matches(condition: &ConditionBlock, account: &str) -> bool {
    condition.iter().all(|(operator, keys)| {
        operator == STRING_LIKE
            && keys.iter().all(|(key, patterns)| {
                key == RESOURCE_ACCOUNT_KEY && patterns.iter().any(|p| glob_match(p, account))
            })
    })
}

/// IAM `StringLike` matching: `*` is any run of characters, `?` exactly one.
fn glob_match(pattern: &str, value: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let value: Vec<char> = value.chars().collect();

    let (mut p, mut v) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while v < value.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == value[v]) {
            p += 1;
            v += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, v));
            p += 1;
        } else if let Some((star_p, star_v)) = star {
            p = star_p + 1;
            v = star_v + 1;
            star = Some((star_p, star_v + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}
