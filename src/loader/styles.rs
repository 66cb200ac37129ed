use thiserror::Error;

use crate::{Reload, Task, TaskContext, TaskResult};

/// Errors that can occur when compiling stylesheets.
#[derive(Debug, Error)]
pub enum StyleError {
    /// A Sass compilation error occurred.
    #[error("Sass compilation error: {0}")]
    Sass(#[from] Box<grass::Error>),

    #[error("No stylesheet entry point matched")]
    NoEntry,
}

/// Compiles Sass/SCSS entry points to compressed CSS.
///
/// Every file matched by `entry` is compiled with `grass` and written to
/// `output/<file_name>`; with more than one entry, each output is named
/// after its entry instead. Connected browsers are told to refresh their
/// stylesheets after every successful run.
///
/// # Example
///
/// ```rust,no_run
/// # let mut orchestrator = kumitate::Orchestrator::new("source", "build");
/// orchestrator.register(kumitate::loader::styles("sass/style.scss", "css", "style.min.css"))?;
/// # Ok::<(), kumitate::Error>(())
/// ```
pub fn styles(entry: &str, output: &str, file_name: &str) -> Task {
    let file_name = file_name.to_string();

    Task::new("styles", move |ctx| compile(ctx, &file_name))
        .input(entry)
        .output(output)
        .notify(Reload::Styles)
}

fn compile(ctx: &TaskContext, file_name: &str) -> TaskResult {
    let options = grass::Options::default().style(grass::OutputStyle::Compressed);

    match ctx.files.as_slice() {
        [] => Err(StyleError::NoEntry.into()),
        [file] => {
            let css = grass::from_path(&file.path, &options).map_err(StyleError::Sass)?;
            crate::io::write(ctx.output.join(file_name), css)?;
            Ok(1)
        }
        files => {
            for file in files {
                let css = grass::from_path(&file.path, &options).map_err(StyleError::Sass)?;
                crate::io::write(ctx.output.join(&file.relative).with_extension("css"), css)?;
            }
            Ok(files.len())
        }
    }
}
