//! Ordered text replacement rules
//!
//! A rule is a (pattern, replacement) pair. Literal rules replace every
//! occurrence of a substring; regex rules replace every match and support
//! `$1`/`${name}` expansion in the replacement. Rules are applied per line,
//! in declared order, to lines that still carry their terminator, so a regex
//! rule can drop a whole line by matching its trailing `\n`.
//!
//! Matching is done on bytes so project files in legacy code pages pass
//! through untouched outside the matched spans.

use anyhow::{Context, Result};
use regex::bytes::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// A single replacement rule as written in the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Substring or regular expression to look for
    pub pattern: String,

    /// Text to put in its place
    #[serde(default)]
    pub replacement: String,

    /// Treat `pattern` as a regular expression
    #[serde(default)]
    pub regex: bool,
}

impl Rule {
    pub fn literal(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
            regex: false,
        }
    }

    pub fn regex(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
            regex: true,
        }
    }
}

#[derive(Debug)]
struct CompiledRule {
    matcher: Regex,
    replacement: Vec<u8>,
    expand: bool,
}

impl CompiledRule {
    fn apply<'a>(&self, line: &'a [u8]) -> Cow<'a, [u8]> {
        if self.expand {
            self.matcher.replace_all(line, self.replacement.as_slice())
        } else {
            self.matcher.replace_all(line, NoExpand(&self.replacement))
        }
    }
}

/// Rules compiled once and applied to many files
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// Compile rules in order. Fails on the first invalid regex.
    pub fn compile(rules: &[Rule]) -> Result<Self> {
        let mut compiled = Vec::with_capacity(rules.len());

        for rule in rules {
            if rule.pattern.is_empty() {
                anyhow::bail!("Empty pattern in replacement rule (replacement: {:?})", rule.replacement);
            }

            let source = if rule.regex {
                Cow::Borrowed(rule.pattern.as_str())
            } else {
                Cow::Owned(regex::escape(&rule.pattern))
            };

            let matcher = Regex::new(&source)
                .with_context(|| format!("Invalid regex pattern: {}", rule.pattern))?;

            compiled.push(CompiledRule {
                matcher,
                replacement: rule.replacement.clone().into_bytes(),
                expand: rule.regex,
            });
        }

        Ok(Self { rules: compiled })
    }

    /// Apply every rule, in order, to one line (terminator included)
    pub fn apply_line(&self, line: &[u8]) -> Vec<u8> {
        let mut current = line.to_vec();
        for rule in &self.rules {
            let replaced = match rule.apply(&current) {
                Cow::Owned(bytes) => Some(bytes),
                Cow::Borrowed(_) => None,
            };
            if let Some(bytes) = replaced {
                current = bytes;
            }
        }
        current
    }

    /// Split `text` into lines keeping their terminators, rewrite each, and join
    pub fn apply_text(&self, text: &[u8]) -> Vec<u8> {
        let mut output = Vec::with_capacity(text.len());
        for line in text.split_inclusive(|&b| b == b'\n') {
            output.extend_from_slice(&self.apply_line(line));
        }
        output
    }
}
