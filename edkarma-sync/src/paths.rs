use directories::ProjectDirs;
use std::path::PathBuf;

pub fn data_root() -> PathBuf {
    if let Some(pd) = ProjectDirs::from("com", "edkarma", "EdKarma") {
        pd.data_dir().to_path_buf()
    } else {
        // Fallback: current dir
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }
}

/// Default course table file and its backups directory.
pub fn default_table_file() -> (PathBuf, PathBuf) {
    let root = data_root();
    let file = root.join("courses.json");
    let backups = root.join("backups");
    (file, backups)
}
