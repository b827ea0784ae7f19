use crate::error::MetricsError;
use env_logger::{fmt::Color, Builder};
use log::{Level, LevelFilter};
use std::fs::read_dir;
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn init_logger() {
    Builder::new()
        .format(|buf, record| {
            let timestamp = buf.timestamp();

            let mut red_style = buf.style();
            red_style.set_color(Color::Red).set_bold(true);
            let mut green_style = buf.style();
            green_style.set_color(Color::Green).set_bold(true);
            let mut white_style = buf.style();
            white_style.set_color(Color::White).set_bold(false);
            let mut orange_style = buf.style();
            orange_style
                .set_color(Color::Rgb(255, 102, 0))
                .set_bold(true);
            let mut apricot_style = buf.style();
            apricot_style
                .set_color(Color::Rgb(255, 195, 0))
                .set_bold(true);

            let msg = match record.level() {
                Level::Warn => (
                    orange_style.value(record.level()),
                    orange_style.value(record.args()),
                ),
                Level::Info => (
                    green_style.value(record.level()),
                    white_style.value(record.args()),
                ),
                Level::Debug => (
                    apricot_style.value(record.level()),
                    apricot_style.value(record.args()),
                ),
                Level::Error => (
                    red_style.value(record.level()),
                    red_style.value(record.args()),
                ),
                _ => (
                    white_style.value(record.level()),
                    white_style.value(record.args()),
                ),
            };

            writeln!(
                buf,
                "{} [{}] - {}",
                white_style.value(timestamp),
                msg.0,
                msg.1
            )
        })
        .filter(None, LevelFilter::Info)
        .parse_default_env()
        .init();
}

/// Enum to specify the type of file component to retrieve
pub enum FileComponent {
    /// The full file name including the extension
    FileName,
    /// The file name without the extension
    FileStem,
}

/// Extracts the specified file component from a path and returns it as a `String`.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use taxmetrics::utils::{get_file_component, FileComponent};
///
/// let path = PathBuf::from("/some/path/to/mash_Genus_k21.tab");
/// assert_eq!(get_file_component(&path, FileComponent::FileName).unwrap(), "mash_Genus_k21.tab");
/// assert_eq!(get_file_component(&path, FileComponent::FileStem).unwrap(), "mash_Genus_k21");
/// ```
pub fn get_file_component(path: &Path, component: FileComponent) -> Result<String, MetricsError> {
    match component {
        FileComponent::FileName => {
            path.file_name()
                .ok_or(MetricsError::FileNameConversionError)
                .and_then(|os_str| os_str.to_str().map(String::from).ok_or(MetricsError::FileNameConversionError))
        }
        FileComponent::FileStem => {
            path.file_stem()
                .ok_or(MetricsError::FileNameConversionError)
                .and_then(|os_str| os_str.to_str().map(String::from).ok_or(MetricsError::FileNameConversionError))
        }
    }
}

/// Regular files directly inside a directory, sorted by path
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>, MetricsError> {
    let mut files = Vec::new();
    for entry in read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Names of the directories directly inside a directory, sorted
pub fn list_subdirectories(dir: &Path) -> Result<Vec<String>, MetricsError> {
    let mut names = Vec::new();
    for entry in read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            names.push(get_file_component(&path, FileComponent::FileName)?);
        }
    }
    names.sort();
    Ok(names)
}
