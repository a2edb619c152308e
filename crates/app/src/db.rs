use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbUrlError {
    #[error("invalid database url: {raw}")]
    Invalid { raw: String },
    #[error("cannot create database file {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn is_in_memory(url: &str) -> bool {
    url == "sqlite::memory:" || url.contains("mode=memory")
}

/// Turn a bare path or relative `sqlite:` url into an absolute `sqlite://` url.
///
/// In-memory urls and urls that are already `sqlite://` pass through.
#[must_use]
pub fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if is_in_memory(trimmed) || trimmed.starts_with("sqlite://") {
        return trimmed.to_string();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Make sure the file behind a `sqlite://` url exists, creating parent
/// directories as needed.
///
/// # Errors
///
/// Returns `DbUrlError::Invalid` for urls without a path and
/// `DbUrlError::Create` if the file cannot be created.
pub fn prepare_sqlite_file(db_url: &str) -> Result<(), DbUrlError> {
    if is_in_memory(db_url) {
        return Ok(());
    }

    let invalid = || DbUrlError::Invalid {
        raw: db_url.to_string(),
    };
    let path = db_url.strip_prefix("sqlite://").ok_or_else(invalid)?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(invalid());
    }

    let path = Path::new(path);
    let create = |source| DbUrlError::Create {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(create)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(create)?;
    }
    Ok(())
}
