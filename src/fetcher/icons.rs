//! File-extension to icon-category lookup for release assets.

pub const DEFAULT_ICON: &str = "default";

/// Icon category for an asset file name, based on its extension.
///
/// Dotfiles such as `.gitignore` and names without a dot are looked up by
/// the whole trailing segment.
pub fn icon_for(file_name: &str) -> &'static str {
    let ext = match file_name.rfind('.') {
        Some(i) => &file_name[i + 1..],
        None => file_name,
    };
    icon_for_extension(&ext.to_ascii_lowercase())
}

fn icon_for_extension(ext: &str) -> &'static str {
    match ext {
        "aac" | "aiff" | "amr" | "ape" | "flac" | "m4a" | "mp3" | "oga" | "ogg" | "opus"
        | "wav" | "wma" => "audio",
        "bat" => "bat",
        "a" | "app" | "bin" | "dll" | "exe" | "lib" | "o" | "obj" | "pdb" | "pyc" | "pyd"
        | "so" => "binary",
        "css" => "css",
        "db" => "db",
        "xls" | "xlsx" | "xlsm" | "ods" => "excel",
        "gitattributes" | "gitconfig" | "gitignore" | "gitmodules" | "gitkeep" => "git",
        "html" => "html",
        "jpeg" | "jpg" | "gif" | "png" | "bmp" | "tiff" | "ico" => "image",
        "jar" => "jar",
        "java" => "java",
        "js" => "js",
        "json" => "json",
        "log" => "log",
        "md" | "mdown" | "markdown" => "markdown",
        "crx" | "xpi" | "deb" | "rpm" | "apk" | "dmg" | "msi" | "appimage" => "package",
        "pdf" => "pdf2",
        "psd" => "photoshop2",
        "ppt" | "pptx" | "pptm" | "pps" | "ppsx" => "powerpoint",
        "ps1" => "powershell",
        "sql" => "sql",
        "sqlite" | "sqlite3" | "db3" => "sqlite",
        "svg" => "svg",
        "txt" | "csv" => "text",
        "3gp" | "avi" | "flv" | "m4v" | "mkv" | "mov" | "mp4" | "mpeg" | "mpg" | "webm"
        | "wmv" => "video",
        "vimrc" | "gvimrc" => "vim",
        "doc" | "docx" | "docm" | "dot" | "dotx" => "word",
        "xml" | "pex" | "tmlanguage" => "xml",
        "yml" | "yaml" => "yaml",
        "zip" | "rar" | "7z" | "tar" | "gz" | "tgz" | "bzip2" | "xz" | "bz2" | "zst" => "zip",
        _ => DEFAULT_ICON,
    }
}
