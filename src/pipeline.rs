//! The standard static-site pipeline.
//!
//! ```text
//! source/                          build/
//!   sass/style.scss          →       css/style.min.css
//!   img/**/*.{jpg,png,svg}   →       img/  (copied, optimized, .webp)
//!   img/**/*.svg             →       img/sprite.svg
//!   *.html                   →       *.html (minified)
//!   fonts/*.{woff,woff2}     →       fonts/
//! ```

use crate::{Error, Node, Orchestrator, Task, loader};

/// Registers `clean` and every asset task of the standard pipeline.
pub fn register(orchestrator: &mut Orchestrator) -> Result<(), Error> {
    orchestrator.register(Task::new("clean", |ctx| Ok(crate::io::clean(&ctx.output)?)))?;
    orchestrator.register(loader::styles("sass/style.scss", "css", "style.min.css"))?;
    orchestrator.register(loader::optimize_images(
        &["img/**/*.{jpg,png,svg}", "!img/sprite.svg"],
        "img",
    ))?;
    orchestrator.register(loader::copy(
        "copy-images",
        &["img/**/*.{jpg,png,svg,webp}", "!img/sprite.svg"],
        "img",
    ))?;
    orchestrator.register(loader::webp("img/**/*.{jpg,png}", "img"))?;
    orchestrator.register(loader::html("*.html", ""))?;
    orchestrator.register(loader::copy("fonts", &["fonts/*.{woff,woff2}"], "fonts"))?;
    orchestrator.register(loader::sprite(
        &["img/**/*.svg", "!img/sprite.svg"],
        "img",
        "sprite.svg",
    ))?;

    Ok(())
}

/// Everything besides image optimization, safe to run in one batch.
fn common() -> Node {
    Node::parallel([
        Node::task("copy-images"),
        Node::task("sprite"),
        Node::task("styles"),
        Node::task("html"),
        Node::task("fonts"),
    ])
}

/// Full production build.
pub fn build() -> Node {
    Node::sequence([
        Node::task("clean"),
        common(),
        Node::parallel([Node::task("images"), Node::task("webp")]),
    ])
}

/// Quick build run before serving in development.
pub fn dev() -> Node {
    Node::sequence([Node::task("clean"), common()])
}

#[cfg(feature = "live")]
pub fn watch_rules() -> Vec<crate::WatchRule> {
    use crate::{Reload, WatchRule};

    vec![
        // the styles task signals stylesheet refreshes itself
        WatchRule::new("sass/**/*.scss").run("styles"),
        WatchRule::new("img/**/*.svg").run("sprite"),
        WatchRule::new("*.html").run("html").notify(Reload::Page),
    ]
}
