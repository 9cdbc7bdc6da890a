use std::{
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
};

/// Removes characters that are invalid in file names on common platforms.
pub fn sanitize_filename<S: AsRef<str>>(name: S) -> String {
    let cleaned: String = name
        .as_ref()
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect();
    cleaned
        .trim()
        .trim_end_matches(['.', ' '])
        .to_string()
}

/// Same as [sanitize_filename], also dropping `%` and `,` which break decryptor arguments.
pub fn sanitize_track_name<S: AsRef<str>>(name: S) -> String {
    sanitize_filename(name).replace(['%', ','], "")
}

pub trait SenseiPathExt {
    /// Add suffix to file name without changing extension.
    ///
    /// Note this function does not handle multiple suffixes.
    /// For example, `test.tar.gz` with `_suffix` will be `test.tar_suffix.gz`.
    fn add_suffix<T: AsRef<OsStr>>(&mut self, suffix: T);
}

impl SenseiPathExt for PathBuf {
    fn add_suffix<T: AsRef<OsStr>>(&mut self, suffix: T) {
        let mut filename = OsString::new();

        // {file_stem}_{suffix}.{ext}
        if let Some(file_stem) = self.file_stem() {
            filename.push(file_stem);
        }
        filename.push("_");
        filename.push(suffix);

        if let Some(ext) = self.extension() {
            filename.push(".");
            filename.push(ext);
        }

        self.set_file_name(filename);
    }
}

/// Appends `.ext` to the full file name, keeping any existing extension.
pub fn append_extension<P: AsRef<Path>, T: AsRef<OsStr>>(path: P, ext: T) -> PathBuf {
    let mut name = path.as_ref().as_os_str().to_os_string();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}
