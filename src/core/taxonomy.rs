//! LM-002: Action taxonomy — which permissions a verb needs on a resource kind.
//!
//! The table is static and read-only. A `(verb, kind)` pair with no rule maps
//! to no permissions: an unknown verb grants nothing rather than failing.
//! Declaration order is significant: it fixes the order in which
//! permissions are emitted, so regenerated templates diff cleanly.

use super::types::{ResourceKind, Verb};

/// `(verb, kind)` → ordered permission strings.
#[derive(Debug)]
pub struct ActionRule {
    pub verb: Verb,
    pub kind: ResourceKind,
    pub actions: &'static [&'static str],
}

const fn rule(verb: Verb, kind: ResourceKind, actions: &'static [&'static str]) -> ActionRule {
    ActionRule {
        verb,
        kind,
        actions,
    }
}

/// Built-in rules. Each `(verb, kind)` pair appears at most once.
pub static BUILTIN_RULES: &[ActionRule] = &[
    // Keyed store
    rule(Verb::Get, ResourceKind::Table, &["dynamodb:Query", "dynamodb:Get*"]),
    rule(Verb::Head, ResourceKind::Table, &["dynamodb:DescribeTable"]),
    rule(Verb::Post, ResourceKind::Table, &["dynamodb:PutItem", "dynamodb:UpdateItem"]),
    rule(Verb::Put, ResourceKind::Table, &["dynamodb:PutItem", "dynamodb:UpdateItem"]),
    rule(Verb::Patch, ResourceKind::Table, &["dynamodb:UpdateItem"]),
    rule(Verb::Delete, ResourceKind::Table, &["dynamodb:DeleteItem"]),
    // Object store
    rule(Verb::Get, ResourceKind::Bucket, &["s3:GetObject", "s3:ListBucket"]),
    rule(Verb::Head, ResourceKind::Bucket, &["s3:GetObject"]),
    rule(Verb::Post, ResourceKind::Bucket, &["s3:PutObject"]),
    rule(Verb::Put, ResourceKind::Bucket, &["s3:PutObject"]),
    rule(Verb::Delete, ResourceKind::Bucket, &["s3:DeleteObject"]),
    // Queue
    rule(Verb::Get, ResourceKind::Queue, &["sqs:ReceiveMessage", "sqs:GetQueueAttributes"]),
    rule(Verb::Post, ResourceKind::Queue, &["sqs:SendMessage"]),
    rule(Verb::Put, ResourceKind::Queue, &["sqs:SendMessage"]),
    rule(Verb::Delete, ResourceKind::Queue, &["sqs:DeleteMessage"]),
    // Stream
    rule(
        Verb::Get,
        ResourceKind::Stream,
        &["kinesis:DescribeStream", "kinesis:GetShardIterator", "kinesis:GetRecords"],
    ),
    rule(Verb::Post, ResourceKind::Stream, &["kinesis:PutRecord", "kinesis:PutRecords"]),
    rule(Verb::Put, ResourceKind::Stream, &["kinesis:PutRecord", "kinesis:PutRecords"]),
    // Topic
    rule(Verb::Get, ResourceKind::Topic, &["sns:GetTopicAttributes"]),
    rule(Verb::Post, ResourceKind::Topic, &["sns:Publish"]),
];

/// A read-only view over a rule table.
#[derive(Debug, Clone, Copy)]
pub struct Taxonomy {
    rules: &'static [ActionRule],
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Taxonomy {
    /// The built-in table.
    pub const fn builtin() -> Self {
        Self::new(BUILTIN_RULES)
    }

    /// Wrap a caller-supplied table. The table must be conflict-free; see
    /// [`Taxonomy::conflicts`].
    pub const fn new(rules: &'static [ActionRule]) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &'static [ActionRule] {
        self.rules
    }

    /// Permissions `verb` needs on `kind`; empty when no rule matches.
    pub fn actions_for(&self, verb: Verb, kind: &ResourceKind) -> &'static [&'static str] {
        self.rules
            .iter()
            .find(|r| r.verb == verb && &r.kind == kind)
            .map(|r| r.actions)
            .unwrap_or(&[])
    }

    /// Every permission declared for `kind`, first appearance first.
    pub fn declared_order(&self, kind: &ResourceKind) -> Vec<&'static str> {
        let mut seen = Vec::new();
        for r in self.rules.iter().filter(|r| &r.kind == kind) {
            for action in r.actions {
                if !seen.contains(action) {
                    seen.push(*action);
                }
            }
        }
        seen
    }

    /// `(verb, kind)` pairs declared more than once.
    pub fn conflicts(&self) -> Vec<(Verb, ResourceKind)> {
        let mut out: Vec<(Verb, ResourceKind)> = Vec::new();
        for (i, a) in self.rules.iter().enumerate() {
            let dup = self.rules[i + 1..]
                .iter()
                .any(|b| b.verb == a.verb && b.kind == a.kind);
            if dup && !out.iter().any(|(v, k)| *v == a.verb && *k == a.kind) {
                out.push((a.verb, a.kind.clone()));
            }
        }
        out
    }
}
