//! Top-level block scanner for single-file components.
//!
//! Only block boundaries are recognized: opening tags at the top level, their
//! attributes, and the matching closing tag. Block content is never parsed.
//! Top-level `<!-- ... -->` comments are skipped.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use super::plugin::ProjectionDiagnostic;

/// Opening tag anchored at the start of the haystack.
static OPEN_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<([A-Za-z][A-Za-z0-9_-]*)((?:\s[^>]*)?)>").unwrap());

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s=/>"']+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#).unwrap()
});

/// One top-level block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SfcBlock {
    /// Lowercased tag name.
    pub tag: String,
    pub attrs: Vec<(String, Option<String>)>,
    /// Range of the opening tag.
    pub open_tag: Range<usize>,
    /// Range between the opening and closing tags.
    pub content: Range<usize>,
    /// End of the closing tag.
    pub end: usize,
}

impl SfcBlock {
    pub fn attr(&self, name: &str) -> Option<Option<&str>> {
        self.attrs
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_deref())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    pub fn lang(&self) -> Option<&str> {
        self.attr("lang").flatten()
    }
}

/// All blocks of a component, grouped by role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SfcDescriptor {
    pub template: Option<SfcBlock>,
    pub script: Option<SfcBlock>,
    pub script_setup: Option<SfcBlock>,
    pub styles: Vec<SfcBlock>,
    pub customs: Vec<SfcBlock>,
    pub errors: Vec<ProjectionDiagnostic>,
}

/// Scan `source` for top-level blocks.
pub fn parse_sfc(source: &str) -> SfcDescriptor {
    // ASCII lowercasing keeps byte offsets intact.
    let lower = source.to_ascii_lowercase();
    let mut descriptor = SfcDescriptor::default();
    let mut pos = 0;

    while let Some(found) = source[pos..].find('<') {
        let lt = pos + found;
        let rest = &source[lt..];

        if rest.starts_with("<!--") {
            pos = match rest[4..].find("-->") {
                Some(close) => lt + 4 + close + 3,
                None => source.len(),
            };
            continue;
        }

        let Some(caps) = OPEN_TAG.captures(rest) else {
            pos = lt + 1;
            continue;
        };
        let open_end = lt + caps[0].len();
        let tag = caps[1].to_ascii_lowercase();
        let raw_attrs = caps.get(2).map(|m| m.as_str()).unwrap_or("");

        if raw_attrs.trim_end().ends_with('/') {
            // Self-closing top-level tags carry no content.
            pos = open_end;
            continue;
        }

        let Some((close_start, end)) = find_closing_tag(&lower, &tag, open_end) else {
            descriptor.errors.push(ProjectionDiagnostic::parse(
                lt..open_end,
                format!("Element <{}> is missing end tag.", tag),
            ));
            pos = open_end;
            continue;
        };

        let block = SfcBlock {
            tag,
            attrs: parse_attributes(raw_attrs),
            open_tag: lt..open_end,
            content: open_end..close_start,
            end,
        };
        pos = end;
        descriptor.add(block);
    }

    descriptor
}

impl SfcDescriptor {
    fn add(&mut self, block: SfcBlock) {
        match block.tag.as_str() {
            "template" => {
                if self.template.is_some() {
                    self.duplicate(&block, "<template>");
                } else {
                    self.template = Some(block);
                }
            }
            "script" if block.has_attr("setup") => {
                if self.script_setup.is_some() {
                    self.duplicate(&block, "<script setup>");
                } else {
                    self.script_setup = Some(block);
                }
            }
            "script" => {
                if self.script.is_some() {
                    self.duplicate(&block, "<script>");
                } else {
                    self.script = Some(block);
                }
            }
            "style" => self.styles.push(block),
            _ => self.customs.push(block),
        }
    }

    fn duplicate(&mut self, block: &SfcBlock, what: &str) {
        self.errors.push(ProjectionDiagnostic::parse(
            block.open_tag.clone(),
            format!("Single file component can contain only one {} element.", what),
        ));
    }
}

/// Find `</tag>` after `from`. Returns the start of the closing tag and the
/// offset just past it. `lower` is the lowercased source.
///
/// Templates nest, so inner `<template>` tags are counted.
fn find_closing_tag(lower: &str, tag: &str, from: usize) -> Option<(usize, usize)> {
    let open = format!("<{}", tag);
    let close = format!("</{}", tag);
    let nests = tag == "template";
    let mut depth = 0usize;
    let mut pos = from;

    loop {
        let next_close = find_tag(lower, &close, pos)?;
        if nests {
            if let Some(next_open) = find_tag(lower, &open, pos).filter(|&o| o < next_close) {
                depth += 1;
                pos = next_open + open.len();
                continue;
            }
        }

        let after_name = next_close + close.len();
        let gt = after_name + lower[after_name..].find('>')?;
        if depth == 0 {
            return Some((next_close, gt + 1));
        }
        depth -= 1;
        pos = gt + 1;
    }
}

/// Find `needle` at or after `from` where it is followed by a tag delimiter,
/// so `<style` does not match `<styles`.
fn find_tag(lower: &str, needle: &str, from: usize) -> Option<usize> {
    let mut pos = from;
    while let Some(found) = lower[pos..].find(needle) {
        let at = pos + found;
        let next = lower[at + needle.len()..].chars().next();
        match next {
            Some(c) if c.is_ascii_whitespace() || c == '>' || c == '/' => return Some(at),
            _ => pos = at + needle.len(),
        }
    }
    None
}

fn parse_attributes(raw: &str) -> Vec<(String, Option<String>)> {
    ATTRIBUTE
        .captures_iter(raw)
        .map(|caps| {
            let name = caps[1].to_string();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str().to_string());
            (name, value)
        })
        .collect()
}

/// Language id for a `<script>` block.
pub fn script_language(lang: Option<&str>) -> String {
    match lang.map(str::to_ascii_lowercase).as_deref() {
        Some("ts") | Some("typescript") => "typescript",
        Some("tsx") => "typescriptreact",
        Some("jsx") => "javascriptreact",
        _ => "javascript",
    }
    .to_string()
}

/// Language id for a `<style>` block.
pub fn style_language(lang: Option<&str>) -> String {
    match lang.map(str::to_ascii_lowercase) {
        Some(lang) if matches!(lang.as_str(), "scss" | "sass" | "less" | "stylus" | "postcss") => {
            lang
        }
        _ => "css".to_string(),
    }
}

/// Language id for a `<template>` block.
pub fn template_language(lang: Option<&str>) -> String {
    match lang.map(str::to_ascii_lowercase).as_deref() {
        None | Some("html") => "html".to_string(),
        Some("pug") => "jade".to_string(),
        Some(other) => other.to_string(),
    }
}

/// Language id for a custom block.
pub fn custom_language(lang: Option<&str>) -> String {
    lang.unwrap_or("plaintext").to_ascii_lowercase()
}
