//! Prompt Matching
//!
//! Decides where one command's output ends on a stream that carries no
//! framing of its own: the only delimiter is the shell printing its next
//! prompt. Matchers are suffix predicates over the whole accumulated frame,
//! so a prompt split across two reads is recognized as soon as its final
//! byte arrives.

use once_cell::sync::Lazy;
use regex::bytes::Regex;

use crate::error::Result;

/// Prompt tail of a stock `sh`/`bash` interactive prompt (`sh-4.3$ `)
pub const DEFAULT_PROMPT_SUFFIX: &[u8] = b"$ ";

/// Built-in patterns for the final line of common interactive prompts
///
/// Order matters: specific patterns come before generic ones so the generic
/// `> ` arrow does not shadow them.
static COMMON_PROMPT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^sh-\d+\.\d+\$ $",
        r"^bash-\d+\.\d+\$ $",
        r"^zsh-\d+\.\d+% $",
        r"^[^\n]*[$%#] $",
        r"^> $",
    ]
    .iter()
    .filter_map(|pattern| match Regex::new(pattern) {
        Ok(regex) => Some(regex),
        Err(e) => {
            warn!("Failed to compile prompt pattern '{}': {}", pattern, e);
            None
        }
    })
    .collect()
});

/// Decides whether accumulated session output currently ends at a prompt
///
/// Implementations see the entire frame buffered since the last match, not
/// just the newest read, and must answer from the buffer alone: matchers are
/// consulted once per transport read and hold no state of their own.
pub trait PromptMatcher: Send {
    /// True if `buffer` ends with a prompt
    fn matches(&self, buffer: &[u8]) -> bool;
}

impl<F> PromptMatcher for F
where
    F: Fn(&[u8]) -> bool + Send,
{
    fn matches(&self, buffer: &[u8]) -> bool {
        self(buffer)
    }
}

/// Matches a fixed byte suffix
///
/// The default suffix `"$ "` covers the trailing two bytes of a stock
/// Bourne-style prompt. The suffix must not occur at a read boundary inside
/// legitimate output, or a block is cut short; pick a longer suffix (for
/// example the full prompt string) when the output is untrusted.
#[derive(Debug, Clone)]
pub struct SuffixMatcher {
    suffix: Vec<u8>,
}

impl SuffixMatcher {
    /// Match on a specific byte suffix
    pub fn new(suffix: &[u8]) -> Self {
        Self {
            suffix: suffix.to_vec(),
        }
    }

    /// The suffix being matched
    pub fn suffix(&self) -> &[u8] {
        &self.suffix
    }
}

impl Default for SuffixMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_PROMPT_SUFFIX)
    }
}

impl PromptMatcher for SuffixMatcher {
    fn matches(&self, buffer: &[u8]) -> bool {
        !self.suffix.is_empty() && buffer.ends_with(&self.suffix)
    }
}

/// Matches when the final line of the frame satisfies a prompt pattern
///
/// Only the bytes after the last newline are tested, so patterns can anchor
/// on both ends (`^bash-\d+\.\d+\$ $`). Patterns operate on raw bytes;
/// output that is not valid UTF-8 cannot break matching.
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    patterns: Vec<Regex>,
}

impl RegexMatcher {
    /// Match the frame tail against a single pattern
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            patterns: vec![Regex::new(pattern)?],
        })
    }

    /// Match against the built-in set of common shell prompts
    pub fn common_shell_prompts() -> Self {
        Self {
            patterns: COMMON_PROMPT_PATTERNS.clone(),
        }
    }

    /// Add another pattern; earlier patterns are tried first
    pub fn add_pattern(&mut self, pattern: &str) -> Result<()> {
        self.patterns.push(Regex::new(pattern)?);
        Ok(())
    }
}

impl PromptMatcher for RegexMatcher {
    fn matches(&self, buffer: &[u8]) -> bool {
        let tail = final_line(buffer);
        self.patterns.iter().any(|pattern| pattern.is_match(tail))
    }
}

/// Bytes after the last newline (the whole buffer if there is none)
fn final_line(buffer: &[u8]) -> &[u8] {
    match buffer.iter().rposition(|b| *b == b'\n') {
        Some(pos) => &buffer[pos + 1..],
        None => buffer,
    }
}
