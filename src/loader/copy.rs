use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::Task;

/// Copy every matched file into `output`, keeping its path relative to the
/// glob base.
pub fn copy(name: &str, globs: &[&str], output: &str) -> Task {
    globs
        .iter()
        .fold(Task::new(name, copy_files), |task, glob| task.input(*glob))
        .output(output)
}

fn copy_files(ctx: &crate::TaskContext) -> crate::TaskResult {
    ctx.files
        .par_iter()
        .map(|file| crate::io::copy(&file.path, ctx.output.join(&file.relative)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ctx.files.len())
}
