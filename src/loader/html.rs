use std::sync::LazyLock;

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use regex::Regex;

use crate::{Task, TaskContext, TaskResult};

/// Blocks whose whitespace is significant and must survive minification.
static RE_VERBATIM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<pre\b.*?</pre>|<textarea\b.*?</textarea>|<script\b.*?</script>|<style\b.*?</style>")
        .unwrap()
});
static RE_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static RE_BETWEEN_TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r">\s+<").unwrap());
static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static RE_BODY_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</body\s*>").unwrap());

/// Elements rendered in the flow of text, whitespace between two of them is
/// visible.
const INLINE: &[&str] = &[
    "a", "abbr", "b", "bdi", "bdo", "button", "cite", "code", "data", "dfn", "em", "i", "img",
    "input", "kbd", "label", "mark", "q", "s", "samp", "select", "small", "span", "strong", "sub",
    "sup", "svg", "time", "u", "var",
];

/// Minifies the HTML documents matched by `glob` into `output`. While
/// watching, the live-reload client is injected into every page.
pub fn html(glob: &str, output: &str) -> Task {
    Task::new("html", minify_all).input(glob).output(output)
}

fn minify_all(ctx: &TaskContext) -> TaskResult {
    let script = ctx.env.reload_script();

    ctx.files
        .par_iter()
        .map(|file| -> anyhow::Result<()> {
            let text = std::fs::read_to_string(&file.path)?;
            let mut html = minify_html(&text);

            if let Some(script) = &script {
                html = inject_script(&html, script);
            }

            crate::io::write(ctx.output.join(&file.relative), html)?;
            Ok(())
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(ctx.files.len())
}

/// Drop comments and collapse whitespace. Whitespace between two tags is
/// removed unless both are inline elements, any other whitespace run becomes
/// a single space.
/// Contents of `pre`, `textarea`, `script` and `style` are left untouched.
pub fn minify_html(html: &str) -> String {
    let mut blocks = Vec::new();

    // Swap verbatim blocks for tag-shaped placeholders, so whitespace
    // around them collapses like around any other tag.
    let masked = RE_VERBATIM.replace_all(html, |caps: &regex::Captures| {
        blocks.push(caps[0].to_string());
        placeholder(blocks.len() - 1)
    });

    let mut html = collapse(&masked);
    for (i, block) in blocks.iter().enumerate() {
        html = html.replacen(&placeholder(i), block, 1);
    }

    html.trim().to_string()
}

fn placeholder(i: usize) -> String {
    format!("<\u{1}{i}\u{1}>")
}

fn collapse(fragment: &str) -> String {
    let text = RE_COMMENT.replace_all(fragment, "");

    let fragment = RE_BETWEEN_TAGS.replace_all(&text, |caps: &regex::Captures| {
        let Some(gap) = caps.get(0) else {
            return String::new();
        };

        let before = text[..gap.start()].rsplit_once('<').map_or("", |(_, tag)| tag);
        let after = &text[gap.end()..];

        if is_inline(before) && is_inline(after) {
            "> <".to_string()
        } else {
            "><".to_string()
        }
    });

    RE_WHITESPACE.replace_all(&fragment, " ").into_owned()
}

/// Whether the tag starting right after `<` opens or closes an inline element.
fn is_inline(tag: &str) -> bool {
    let name = tag.trim_start_matches('/');
    let end = name
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(name.len());
    let name = name[..end].to_ascii_lowercase();

    INLINE.contains(&name.as_str())
}

fn inject_script(html: &str, script: &str) -> String {
    let tag = format!("<script>{script}</script>");

    match RE_BODY_END.find_iter(html).last() {
        Some(end) => format!("{}{tag}{}", &html[..end.start()], &html[end.start()..]),
        None => format!("{html}{tag}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    use crate::{Environment, Mode, Orchestrator};

    #[test]
    fn test_collapse_whitespace() {
        let html = "<!DOCTYPE html>\n<html>\n  <head>\n    <!-- meta -->\n    <title>Hi</title>\n  </head>\n  <body>\n    <p>One   <b>two</b>\n three</p>\n  </body>\n</html>\n";
        assert_eq!(
            minify_html(html),
            "<!DOCTYPE html><html><head><title>Hi</title></head><body><p>One <b>two</b> three</p></body></html>"
        );
    }

    #[test]
    fn test_inline_siblings_keep_a_space() {
        let html = "<p>\n  <a href=\"#\">One</a>\n  <a href=\"#\">Two</a>\n</p>";
        assert_eq!(
            minify_html(html),
            "<p><a href=\"#\">One</a> <a href=\"#\">Two</a></p>"
        );

        let html = "<ul>\n  <li><em>a</em>\t<B>b</B></li>\n</ul>";
        assert_eq!(minify_html(html), "<ul><li><em>a</em> <B>b</B></li></ul>");
    }

    #[test]
    fn test_verbatim_blocks() {
        let html = "<div>\n  <pre>  a\n    b</pre>\n  <script>\n  let x = 1;\n  </script>\n</div>";
        assert_eq!(
            minify_html(html),
            "<div><pre>  a\n    b</pre><script>\n  let x = 1;\n  </script></div>"
        );
    }

    #[test]
    fn test_inject_script() {
        assert_eq!(
            inject_script("<body><p>x</p></BODY>", "go()"),
            "<body><p>x</p><script>go()</script></BODY>"
        );
        assert_eq!(inject_script("<p>x</p>", "go()"), "<p>x</p><script>go()</script>");
    }

    #[test]
    fn test_script_only_while_watching() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        crate::io::write(root.join("source/index.html"), "<body>\n  <p>hi</p>\n</body>").unwrap();

        let mut orchestrator = Orchestrator::new(root.join("source"), root.join("build"));
        orchestrator.register(html("*.html", "")).unwrap();

        orchestrator.run_task("html").unwrap();
        let built = std::fs::read_to_string(root.join("build/index.html")).unwrap();
        assert_eq!(built, "<body><p>hi</p></body>");

        orchestrator.set_environment(Environment {
            mode: Mode::Watch,
            port: Some(4000),
        });
        orchestrator.run_task("html").unwrap();
        let built = std::fs::read_to_string(root.join("build/index.html")).unwrap();
        assert!(built.starts_with("<body><p>hi</p><script>"));
        assert!(built.contains(":4000`"));
        assert!(built.ends_with("</script></body>"));
    }
}
