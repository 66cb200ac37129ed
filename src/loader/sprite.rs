use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::{Task, TaskContext, TaskResult};

static RE_PROLOG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<\?xml.*?\?>|<!DOCTYPE[^>]*>|<!--.*?-->").unwrap());
static RE_BETWEEN_TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r">\s+<").unwrap());
static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());
static RE_ROOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^<svg\b([^>]*?)/?>(.*?)(?:</svg>)?$").unwrap());
static RE_VIEWBOX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bviewBox\s*=\s*["']([^"']*)["']"#).unwrap());

#[derive(Debug, Error)]
pub enum SpriteError {
    #[error("'{0}' has no <svg> root element")]
    NoRoot(String),

    #[error("Two icons share the id '{0}'")]
    DuplicateId(String),
}

/// Strip the XML prolog, comments and formatting whitespace from an SVG.
pub fn minify_svg(svg: &str) -> String {
    let svg = RE_PROLOG.replace_all(svg, "");
    let svg = RE_BETWEEN_TAGS.replace_all(&svg, "><");
    let svg = RE_WHITESPACE.replace_all(&svg, " ");
    svg.trim().to_string()
}

/// Combine `(id, svg)` pairs into one sprite, every icon wrapped in a
/// `<symbol>` that keeps its `viewBox`.
pub fn build_sprite<'a>(
    icons: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Result<String, SpriteError> {
    let mut sprite = String::from(r#"<svg xmlns="http://www.w3.org/2000/svg">"#);
    let mut ids = HashSet::new();

    for (id, svg) in icons {
        if !ids.insert(id) {
            return Err(SpriteError::DuplicateId(id.to_string()));
        }

        let svg = minify_svg(svg);
        let captures = RE_ROOT
            .captures(&svg)
            .ok_or_else(|| SpriteError::NoRoot(id.to_string()))?;

        let attributes = captures.get(1).map_or("", |m| m.as_str());
        let body = captures.get(2).map_or("", |m| m.as_str());

        sprite.push_str(&format!(r#"<symbol id="{id}""#));
        if let Some(view_box) = RE_VIEWBOX.captures(attributes) {
            sprite.push_str(&format!(r#" viewBox="{}""#, &view_box[1]));
        }
        sprite.push('>');
        sprite.push_str(body);
        sprite.push_str("</symbol>");
    }

    sprite.push_str("</svg>");
    Ok(sprite)
}

/// Packs every SVG matched by `globs` into `output/<file_name>`, with the
/// file stem of each icon as its symbol id.
pub fn sprite(globs: &[&str], output: &str, file_name: &str) -> Task {
    let file_name = file_name.to_string();

    globs
        .iter()
        .fold(
            Task::new("sprite", move |ctx| pack(ctx, &file_name)),
            |task, glob| task.input(*glob),
        )
        .output(output)
}

fn pack(ctx: &TaskContext, file_name: &str) -> TaskResult {
    let mut icons = Vec::with_capacity(ctx.files.len());
    for file in &ctx.files {
        let id = file.path.file_stem().unwrap_or_default();
        let text = std::fs::read_to_string(&file.path)?;
        icons.push((id, text));
    }

    let sprite = build_sprite(icons.iter().map(|(id, text)| (*id, text.as_str())))?;
    crate::io::write(ctx.output.join(file_name), sprite)?;

    Ok(icons.len())
}
