//! Span-anchored text patching.
//!
//! Rewrites are collected as `(start, end, replacement)` edits against the
//! original text and applied in a single pass, so no tree mutation or
//! re-traversal is ever needed. Offsets are UTF-8 byte offsets, the same
//! space the parser reports spans in. An edit nested inside an already
//! consumed region is skipped, which lets a whole-statement removal subsume
//! the call-site stub it contains.

use serde_json::json;

#[derive(Debug, Clone)]
struct Edit {
    start: u32,
    end: u32,
    text: String,
}

#[derive(Debug)]
pub struct Patcher<'a> {
    source: &'a str,
    edits: Vec<Edit>,
}

impl<'a> Patcher<'a> {
    pub fn new(source: &'a str) -> Self {
        Patcher {
            source,
            edits: Vec::new(),
        }
    }

    pub fn insert_before(&mut self, at: u32, text: impl Into<String>) {
        self.edits.push(Edit {
            start: at,
            end: at,
            text: text.into(),
        });
    }

    pub fn replace(&mut self, start: u32, end: u32, text: impl Into<String>) {
        self.edits.push(Edit {
            start,
            end,
            text: text.into(),
        });
    }

    pub fn delete(&mut self, start: u32, end: u32) {
        self.replace(start, end, "");
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    fn normalize(&mut self) {
        // Stable sort keeps same-position insertions in call order.
        self.edits
            .sort_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));
    }

    pub fn apply(mut self) -> String {
        self.normalize();
        let mut out = String::with_capacity(self.source.len());
        let mut cursor = 0usize;
        for edit in &self.edits {
            let start = edit.start as usize;
            let end = edit.end as usize;
            if start < cursor {
                tracing::debug!(start = edit.start, end = edit.end, "skipping subsumed edit");
                continue;
            }
            out.push_str(&self.source[cursor..start]);
            out.push_str(&edit.text);
            cursor = end;
        }
        out.push_str(&self.source[cursor..]);
        out
    }

    /// Applies the edits and produces a version-3 source map anchored to
    /// `source_path`. Tokens are emitted at every output line start and at
    /// every edit boundary.
    pub fn apply_with_map(mut self, source_path: &str) -> (String, serde_json::Value) {
        self.normalize();
        let bytes = self.source.as_bytes();
        let mut out = String::with_capacity(self.source.len());
        let mut tokens: Vec<(u32, u32, u32, u32)> = Vec::new();
        let mut cursor = 0usize;
        let (mut out_line, mut out_col) = (0u32, 0u32);
        let (mut src_line, mut src_col) = (0u32, 0u32);

        let edits = std::mem::take(&mut self.edits);
        let mut apply_segment = |from: usize,
                                 to: usize,
                                 replacement: Option<&str>,
                                 out: &mut String,
                                 tokens: &mut Vec<(u32, u32, u32, u32)>,
                                 out_line: &mut u32,
                                 out_col: &mut u32,
                                 src_line: &mut u32,
                                 src_col: &mut u32| {
            match replacement {
                None => {
                    // Verbatim copy: source and output advance in lockstep.
                    if from < to {
                        tokens.push((*out_line, *out_col, *src_line, *src_col));
                    }
                    for &b in &bytes[from..to] {
                        if b == b'\n' {
                            *out_line += 1;
                            *out_col = 0;
                            *src_line += 1;
                            *src_col = 0;
                            tokens.push((*out_line, *out_col, *src_line, *src_col));
                        } else {
                            *out_col += 1;
                            *src_col += 1;
                        }
                    }
                    out.push_str(&self.source[from..to]);
                }
                Some(text) => {
                    let (anchor_line, anchor_col) = (*src_line, *src_col);
                    if !text.is_empty() {
                        tokens.push((*out_line, *out_col, anchor_line, anchor_col));
                    }
                    for b in text.bytes() {
                        if b == b'\n' {
                            *out_line += 1;
                            *out_col = 0;
                            tokens.push((*out_line, *out_col, anchor_line, anchor_col));
                        } else {
                            *out_col += 1;
                        }
                    }
                    out.push_str(text);
                    // Consume the replaced span in the source.
                    for &b in &bytes[from..to] {
                        if b == b'\n' {
                            *src_line += 1;
                            *src_col = 0;
                        } else {
                            *src_col += 1;
                        }
                    }
                }
            }
        };

        for edit in &edits {
            let start = edit.start as usize;
            let end = edit.end as usize;
            if start < cursor {
                continue;
            }
            apply_segment(
                cursor, start, None, &mut out, &mut tokens, &mut out_line, &mut out_col,
                &mut src_line, &mut src_col,
            );
            apply_segment(
                start,
                end,
                Some(&edit.text),
                &mut out,
                &mut tokens,
                &mut out_line,
                &mut out_col,
                &mut src_line,
                &mut src_col,
            );
            cursor = end;
        }
        apply_segment(
            cursor,
            self.source.len(),
            None,
            &mut out,
            &mut tokens,
            &mut out_line,
            &mut out_col,
            &mut src_line,
            &mut src_col,
        );

        tokens.dedup_by_key(|t| (t.0, t.1));
        let map = json!({
            "version": 3,
            "sources": [source_path],
            "sourcesContent": [self.source],
            "names": [],
            "mappings": encode_mappings(&tokens),
        });
        (out, map)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// VLQ MAPPINGS
// ═══════════════════════════════════════════════════════════════════════════════

const BASE64: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn vlq(value: i64, out: &mut String) {
    let mut v = if value < 0 {
        (((-value) as u64) << 1) | 1
    } else {
        (value as u64) << 1
    };
    loop {
        let mut digit = (v & 0b1_1111) as usize;
        v >>= 5;
        if v != 0 {
            digit |= 0b10_0000;
        }
        out.push(BASE64[digit] as char);
        if v == 0 {
            break;
        }
    }
}

fn encode_mappings(tokens: &[(u32, u32, u32, u32)]) -> String {
    let mut mappings = String::new();
    let mut line = 0u32;
    let mut prev_out_col = 0i64;
    let mut prev_src_line = 0i64;
    let mut prev_src_col = 0i64;
    let mut first_in_line = true;
    for &(out_line, out_col, src_line, src_col) in tokens {
        while line < out_line {
            mappings.push(';');
            line += 1;
            prev_out_col = 0;
            first_in_line = true;
        }
        if !first_in_line {
            mappings.push(',');
        }
        vlq(out_col as i64 - prev_out_col, &mut mappings);
        vlq(0, &mut mappings);
        vlq(src_line as i64 - prev_src_line, &mut mappings);
        vlq(src_col as i64 - prev_src_col, &mut mappings);
        prev_out_col = out_col as i64;
        prev_src_line = src_line as i64;
        prev_src_col = src_col as i64;
        first_in_line = false;
    }
    mappings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_and_insert() {
        let mut patcher = Patcher::new("const a = compileTime(x)");
        patcher.replace(10, 24, "null");
        assert_eq!(patcher.apply(), "const a = null");

        let mut patcher = Patcher::new("abc");
        patcher.insert_before(0, "x = ");
        patcher.insert_before(3, "!");
        assert_eq!(patcher.apply(), "x = abc!");
    }

    #[test]
    fn test_subsumed_edit_is_skipped() {
        let mut patcher = Patcher::new("const a = f(1);rest");
        patcher.replace(10, 14, "null");
        patcher.delete(0, 15);
        assert_eq!(patcher.apply(), "rest");
    }

    #[test]
    fn test_identity_map() {
        let patcher = Patcher::new("ab\ncd");
        let (out, map) = patcher.apply_with_map("a.ts");
        assert_eq!(out, "ab\ncd");
        assert_eq!(map["mappings"], "AAAA;AACA");
        assert_eq!(map["sources"][0], "a.ts");
    }

    #[test]
    fn test_map_tracks_replacement() {
        let mut patcher = Patcher::new("a = f()\nb = 2");
        patcher.replace(4, 7, "1");
        let (out, map) = patcher.apply_with_map("a.ts");
        assert_eq!(out, "a = 1\nb = 2");
        let mappings = map["mappings"].as_str().unwrap();
        // Two output lines, both mapped.
        assert_eq!(mappings.matches(';').count(), 1);
        assert!(!mappings.starts_with(';'));
    }
}
