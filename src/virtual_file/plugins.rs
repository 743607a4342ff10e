//! Built-in language plugins for single-file components.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::PluginError;
use crate::mapping::{Capabilities, SegmentBuilder, TeleportCapabilities};

use super::embedded::{EmbeddedFile, EmbeddedKind};
use super::plugin::{EmbeddedDescriptor, Extraction, LanguagePlugin};
use super::sfc::{
    custom_language, parse_sfc, script_language, style_language, template_language,
};

/// Top-level variable, function and class declarations in a script.
static BINDING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?:export\s+)?(?:const|let|var|(?:async\s+)?function|class)\s+([A-Za-z_$][\w$]*)",
    )
    .unwrap()
});

/// Words inside template expressions that are not component bindings.
const RESERVED: &[&str] = &[
    "true", "false", "null", "undefined", "this", "typeof", "instanceof", "in", "of", "new",
    "void", "delete", "await", "async", "function", "return", "if", "else", "var", "let",
    "const", "NaN", "Infinity", "Math", "JSON", "Date", "Array", "Object", "String", "Number",
    "Boolean", "console",
];

fn source_slice<'a>(
    plugin: &str,
    source: &'a str,
    descriptor: &EmbeddedDescriptor,
) -> Result<&'a str, PluginError> {
    source
        .get(descriptor.source_range.clone())
        .ok_or_else(|| PluginError::Resolve {
            plugin: plugin.to_string(),
            id: descriptor.id.clone(),
            message: format!("range {:?} is not inside the source", descriptor.source_range),
        })
}

/// Splits a component into one embedded file per top-level block, each a
/// verbatim copy of the block content.
#[derive(Debug, Default)]
pub struct SfcBlocksPlugin;

impl SfcBlocksPlugin {
    pub const NAME: &'static str = "sfc";
}

impl LanguagePlugin for SfcBlocksPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn get_embedded_files(&self, _file_name: &str, source: &str) -> Result<Extraction, PluginError> {
        let sfc = parse_sfc(source);
        let mut descriptors = Vec::new();

        if let Some(block) = &sfc.template {
            descriptors.push(EmbeddedDescriptor {
                id: "template".to_string(),
                parent: None,
                kind: EmbeddedKind::Template,
                language_id: template_language(block.lang()),
                source_range: block.content.clone(),
            });
        }
        if let Some(block) = &sfc.script {
            descriptors.push(EmbeddedDescriptor {
                id: "script".to_string(),
                parent: None,
                kind: EmbeddedKind::Script { setup: false },
                language_id: script_language(block.lang()),
                source_range: block.content.clone(),
            });
        }
        if let Some(block) = &sfc.script_setup {
            descriptors.push(EmbeddedDescriptor {
                id: "script_setup".to_string(),
                parent: None,
                kind: EmbeddedKind::Script { setup: true },
                language_id: script_language(block.lang()),
                source_range: block.content.clone(),
            });
        }
        for (index, block) in sfc.styles.iter().enumerate() {
            descriptors.push(EmbeddedDescriptor {
                id: format!("style_{}", index),
                parent: None,
                kind: EmbeddedKind::Style {
                    index,
                    scoped: block.has_attr("scoped"),
                },
                language_id: style_language(block.lang()),
                source_range: block.content.clone(),
            });
        }
        for (index, block) in sfc.customs.iter().enumerate() {
            descriptors.push(EmbeddedDescriptor {
                id: format!("custom_{}", index),
                parent: None,
                kind: EmbeddedKind::Custom {
                    tag: block.tag.clone(),
                    index,
                },
                language_id: custom_language(block.lang()),
                source_range: block.content.clone(),
            });
        }

        Ok(Extraction {
            descriptors,
            errors: sfc.errors,
        })
    }

    fn resolve_embedded_file(
        &self,
        source: &str,
        descriptor: &EmbeddedDescriptor,
        builder: &mut SegmentBuilder,
    ) -> Result<(), PluginError> {
        let content = source_slice(Self::NAME, source, descriptor)?;
        builder.push_mapped(content, descriptor.source_range.start, Capabilities::all());
        Ok(())
    }

    /// Rejects edits that could form a closing tag for the block, or an
    /// opening tag inside a template.
    fn accepts_edit(&self, file: &EmbeddedFile, patched: &str, edit: Range<usize>) -> bool {
        let tag = match &file.kind {
            EmbeddedKind::Template => "template",
            EmbeddedKind::Script { .. } => "script",
            EmbeddedKind::Style { .. } => "style",
            EmbeddedKind::Custom { tag, .. } => tag.as_str(),
            EmbeddedKind::Root | EmbeddedKind::TemplateCode => return false,
        };

        let close = format!("</{}", tag);
        if window_contains(patched, &edit, &close) {
            return false;
        }
        if matches!(file.kind, EmbeddedKind::Template) {
            let open = format!("<{}", tag);
            return !window_contains(patched, &edit, &open);
        }
        true
    }
}

/// Whether `needle` occurs (ASCII case-insensitively) anywhere it could
/// overlap `edit`.
fn window_contains(text: &str, edit: &Range<usize>, needle: &str) -> bool {
    let reach = needle.len().saturating_sub(1);
    let mut start = edit.start.saturating_sub(reach);
    let mut end = (edit.end + reach).min(text.len());
    while !text.is_char_boundary(start) {
        start -= 1;
    }
    while !text.is_char_boundary(end) {
        end += 1;
    }
    text[start..end].to_ascii_lowercase().contains(needle)
}

/// Generates TypeScript for `{{ ... }}` interpolations in the template.
///
/// Free identifiers are read from a `__ctx` object so the analyzer checks
/// them against the component instance. Every source character of an
/// expression stays traceable.
#[derive(Debug, Default)]
pub struct TemplateInterpolationPlugin;

impl TemplateInterpolationPlugin {
    pub const NAME: &'static str = "template-interpolation";
    const PRELUDE: &'static str = "declare const __ctx: any;\n";
}

impl LanguagePlugin for TemplateInterpolationPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        5
    }

    fn get_embedded_files(&self, _file_name: &str, source: &str) -> Result<Extraction, PluginError> {
        let sfc = parse_sfc(source);
        let descriptors = sfc
            .template
            .map(|block| EmbeddedDescriptor {
                id: "template_code".to_string(),
                parent: Some("template".to_string()),
                kind: EmbeddedKind::TemplateCode,
                language_id: "typescript".to_string(),
                source_range: block.content,
            })
            .into_iter()
            .collect();

        Ok(Extraction {
            descriptors,
            errors: Vec::new(),
        })
    }

    fn resolve_embedded_file(
        &self,
        source: &str,
        descriptor: &EmbeddedDescriptor,
        builder: &mut SegmentBuilder,
    ) -> Result<(), PluginError> {
        let template = source_slice(Self::NAME, source, descriptor)?;
        let base = descriptor.source_range.start;

        let mut caps = Capabilities::all();
        caps.formatting = false;

        builder.push_str(Self::PRELUDE);
        let mut pos = 0;
        while let Some(open) = template[pos..].find("{{") {
            let expr_start = pos + open + 2;
            let Some(close) = template[expr_start..].find("}}") else {
                break;
            };
            let expr_end = expr_start + close;

            builder.push_str("(");
            emit_expression(builder, &template[expr_start..expr_end], base + expr_start, caps);
            builder.push_str(");\n");

            pos = expr_end + 2;
        }
        Ok(())
    }
}

/// Emit `expr` (found at `offset` in the source), prefixing free
/// identifiers with `__ctx.`.
fn emit_expression(builder: &mut SegmentBuilder, expr: &str, offset: usize, caps: Capabilities) {
    let bytes = expr.as_bytes();
    let mut i = 0;
    let mut plain_start = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if matches!(b, b'"' | b'\'' | b'`') {
            i = skip_string(bytes, i);
        } else if b.is_ascii_digit() {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.') {
                i += 1;
            }
        } else if is_ident_start(b) {
            let start = i;
            while i < bytes.len() && is_ident_continue(bytes[i]) {
                i += 1;
            }
            let word = &expr[start..i];
            if is_member_access(&expr[..start]) || RESERVED.contains(&word) {
                continue;
            }
            if plain_start < start {
                builder.push_mapped(&expr[plain_start..start], offset + plain_start, caps);
            }
            builder.push_str("__ctx.");
            builder.push_mapped(word, offset + start, caps);
            plain_start = i;
        } else {
            i += 1;
        }
    }

    if plain_start < expr.len() {
        builder.push_mapped(&expr[plain_start..], offset + plain_start, caps);
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$'
}

fn is_ident_continue(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

/// `foo.bar` or `foo?.bar`, but not a `...spread`.
fn is_member_access(before: &str) -> bool {
    let trimmed = before.trim_end();
    trimmed.ends_with('.') && !trimmed.ends_with("...")
}

/// Index just past the string literal starting at `start`.
fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Replaces the `script_setup` file with one that also exports its
/// top-level bindings, the way the template sees them.
#[derive(Debug, Default)]
pub struct ScriptSetupBindingsPlugin;

impl ScriptSetupBindingsPlugin {
    pub const NAME: &'static str = "script-setup-bindings";
}

impl LanguagePlugin for ScriptSetupBindingsPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn order(&self) -> i32 {
        10
    }

    fn get_embedded_files(&self, _file_name: &str, source: &str) -> Result<Extraction, PluginError> {
        let sfc = parse_sfc(source);
        let descriptors = sfc
            .script_setup
            .map(|block| EmbeddedDescriptor {
                id: "script_setup".to_string(),
                parent: None,
                kind: EmbeddedKind::Script { setup: true },
                language_id: script_language(block.lang()),
                source_range: block.content,
            })
            .into_iter()
            .collect();

        Ok(Extraction {
            descriptors,
            errors: Vec::new(),
        })
    }

    fn resolve_embedded_file(
        &self,
        source: &str,
        descriptor: &EmbeddedDescriptor,
        builder: &mut SegmentBuilder,
    ) -> Result<(), PluginError> {
        let content = source_slice(Self::NAME, source, descriptor)?;
        let body = builder.push_mapped(content, descriptor.source_range.start, Capabilities::all());

        let bindings: Vec<Range<usize>> = BINDING
            .captures_iter(content)
            .filter_map(|caps| caps.get(1))
            .map(|m| body.start + m.start()..body.start + m.end())
            .collect();

        builder.push_str("\nexport default { setup() { return {");
        for (i, target) in bindings.into_iter().enumerate() {
            builder.push_str(if i == 0 { " " } else { ", " });
            let name = &content[target.start - body.start..target.end - body.start];
            let origin = builder.push_str(name);
            builder.link(
                origin,
                target,
                TeleportCapabilities::symmetric(Capabilities::navigation()),
            );
        }
        builder.push_str(" }; } };\n");
        Ok(())
    }
}
