//! Ready-made tasks for common static-site assets.
//!
//! Each constructor returns a [`Task`](crate::Task) with its inputs and
//! output directory already declared; register it with
//! [`Orchestrator::register`](crate::Orchestrator::register).

mod copy;
mod html;
mod images;
mod sprite;
mod styles;

pub use copy::copy;
pub use html::{html, minify_html};
pub use images::{ImageError, optimize_images, webp};
pub use sprite::{SpriteError, build_sprite, minify_svg, sprite};
pub use styles::{StyleError, styles};
