//! Wildcard byte patterns.
//!
//! Signatures are written as hex pairs with `??` for "any byte", e.g.
//! `"48c1e8033dffff0000742b"`. Matching searches for the longest run of exact
//! bytes with memchr's memmem finder, then verifies the whole pattern around each hit.

use log::error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    /// `None` is a wildcard.
    tokens: Vec<Option<u8>>,
}

impl Pattern {
    /// Parse a hex signature. Odd-length strings and invalid hex are configuration
    /// defects and yield `None`.
    pub fn parse(signature: &str) -> Option<Self> {
        if signature.len() % 2 != 0 || !signature.is_ascii() {
            error!(
                "Malformed signature (length {}): {}",
                signature.len(),
                signature
            );
            return None;
        }

        let mut tokens = Vec::with_capacity(signature.len() / 2);
        for pair in signature.as_bytes().chunks(2) {
            let text = std::str::from_utf8(pair).ok()?;
            if text == "??" {
                tokens.push(None);
                continue;
            }
            if !pair.iter().all(u8::is_ascii_hexdigit) {
                error!("Malformed signature byte '{}' in {}", text, signature);
                return None;
            }
            tokens.push(u8::from_str_radix(text, 16).ok());
        }
        Some(Self { tokens })
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Whether the pattern matches `data` starting at offset 0.
    #[inline]
    pub fn matches_at(&self, data: &[u8]) -> bool {
        data.len() >= self.tokens.len()
            && self
                .tokens
                .iter()
                .zip(data)
                .all(|(token, byte)| token.map_or(true, |t| t == *byte))
    }

    /// Longest contiguous run of exact bytes: `(start, bytes)`.
    fn anchor(&self) -> (usize, Vec<u8>) {
        let mut best = (0, 0);
        let mut run_start = 0;
        let mut run_len = 0;

        for (i, token) in self.tokens.iter().enumerate() {
            if token.is_some() {
                if run_len == 0 {
                    run_start = i;
                }
                run_len += 1;
                if run_len > best.1 {
                    best = (run_start, run_len);
                }
            } else {
                run_len = 0;
            }
        }

        let bytes = self.tokens[best.0..best.0 + best.1]
            .iter()
            .flatten()
            .copied()
            .collect();
        (best.0, bytes)
    }

    /// Every offset in `haystack` where the full pattern matches, ascending.
    pub fn find_all(&self, haystack: &[u8]) -> Vec<usize> {
        if self.is_empty() || haystack.len() < self.len() {
            return Vec::new();
        }

        let (anchor_offset, anchor_bytes) = self.anchor();

        if anchor_bytes.is_empty() {
            return (0..=haystack.len() - self.len()).collect();
        }

        // find_iter skips overlapping hits, so step one byte past each anchor instead.
        let finder = memchr::memmem::Finder::new(&anchor_bytes);
        let mut results = Vec::new();
        let mut pos = 0;
        while let Some(hit) = finder.find(&haystack[pos..]) {
            let anchor_pos = pos + hit;
            if let Some(start) = anchor_pos.checked_sub(anchor_offset) {
                if start + self.len() <= haystack.len() && self.matches_at(&haystack[start..]) {
                    results.push(start);
                }
            }
            pos = anchor_pos + 1;
        }
        results
    }
}
