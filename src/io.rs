use std::fmt::Display;
use std::fs;
use std::io::ErrorKind;
use std::time::Instant;

use camino::Utf8Path;
use console::Style;

use crate::Error;

const ANSI_BLUE: Style = Style::new().blue();

pub fn as_overhead(s: Instant) -> impl Display {
    let e = Instant::now();
    let f = format!("(+{}ms)", e.duration_since(s).as_millis());
    ANSI_BLUE.apply_to(f)
}

/// Delete the entire output tree, returning how many files were removed.
/// A directory that doesn't exist counts as already clean.
pub fn clean(dir: impl AsRef<Utf8Path>) -> Result<usize, Error> {
    let dir = dir.as_ref();
    let s = Instant::now();

    let count = match count_files(dir) {
        Ok(count) => count,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!("nothing to clean at {dir}");
            return Ok(0);
        }
        Err(e) => return Err(Error::fs(dir)(e)),
    };

    fs::remove_dir_all(dir).map_err(Error::fs(dir))?;

    tracing::info!("cleaned {dir}, removed {count} files {}", as_overhead(s));

    Ok(count)
}

fn count_files(dir: &Utf8Path) -> std::io::Result<usize> {
    let mut count = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            let path = entry.path();
            let path = Utf8Path::from_path(&path)
                .ok_or_else(|| std::io::Error::other("non UTF-8 path in output tree"))?;
            count += count_files(path)?;
        } else {
            count += 1;
        }
    }
    Ok(count)
}

/// Write `data` to `path`, creating missing parent directories.
pub fn write(path: impl AsRef<Utf8Path>, data: impl AsRef<[u8]>) -> Result<(), Error> {
    let path = path.as_ref();

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(Error::fs(dir))?;
    }

    fs::write(path, data).map_err(Error::fs(path))
}

pub fn read(path: impl AsRef<Utf8Path>) -> Result<Vec<u8>, Error> {
    let path = path.as_ref();
    fs::read(path).map_err(Error::fs(path))
}

pub fn copy(src: impl AsRef<Utf8Path>, dst: impl AsRef<Utf8Path>) -> Result<(), Error> {
    let (src, dst) = (src.as_ref(), dst.as_ref());

    if let Some(dir) = dst.parent() {
        fs::create_dir_all(dir).map_err(Error::fs(dir))?;
    }

    fs::copy(src, dst).map_err(Error::fs(src))?;
    Ok(())
}
