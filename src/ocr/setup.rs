use anyhow::{Context, Result, anyhow};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::ScoreConfig;
use crate::log;
use crate::paths::{get_local_tesseract_dir, get_user_data_dir};

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";

#[cfg(windows)]
const EXECUTABLE_NAME: &str = "tesseract.exe";
#[cfg(not(windows))]
const EXECUTABLE_NAME: &str = "tesseract";

#[cfg(windows)]
const COMMON_EXECUTABLES: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
];
#[cfg(not(windows))]
const COMMON_EXECUTABLES: &[&str] = &[
    "/usr/bin/tesseract",
    "/usr/local/bin/tesseract",
    "/opt/homebrew/bin/tesseract",
];

#[cfg(windows)]
const SYSTEM_TESSDATA_DIRS: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tessdata",
    r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
];
#[cfg(not(windows))]
const SYSTEM_TESSDATA_DIRS: &[&str] = &[
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
    "/opt/homebrew/share/tessdata",
];

pub struct TesseractPaths {
    pub executable: PathBuf,
    pub tessdata: PathBuf,
}

fn traineddata_name(language: &str) -> String {
    format!("{}.traineddata", language)
}

/// Ensures Tesseract and the language data are available. Downloads the
/// language data into the per-user data dir if no copy can be found.
pub fn ensure_tesseract(config: &ScoreConfig) -> Result<TesseractPaths> {
    let executable = find_tesseract_executable(config.tesseract_path.as_deref())?;
    log(&format!("Tesseract executable: {}", executable.display()));

    let tessdata = match find_tessdata_dir(config.tessdata_dir.as_deref(), &config.language) {
        Some(dir) => dir,
        None => {
            log(&format!(
                "{} not found locally, downloading...",
                traineddata_name(&config.language)
            ));
            let dir = get_user_data_dir().join("tessdata");
            fs::create_dir_all(&dir)?;
            download_tessdata(&dir, &config.language)?;
            dir
        }
    };
    log(&format!("Tesseract data: {}", tessdata.display()));

    Ok(TesseractPaths {
        executable,
        tessdata,
    })
}

fn responds_to_version(exe: &Path) -> bool {
    Command::new(exe)
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Finds the Tesseract executable: configured path, bundled dir, PATH, then common locations.
pub fn find_tesseract_executable(configured: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = configured {
        let p = PathBuf::from(path);
        if p.exists() {
            return Ok(p);
        }
        log(&format!(
            "Configured tesseract_path {} does not exist, searching elsewhere",
            path
        ));
    }

    let local_exe = get_local_tesseract_dir().join(EXECUTABLE_NAME);
    if local_exe.exists() {
        return Ok(local_exe);
    }

    let on_path = PathBuf::from("tesseract");
    if responds_to_version(&on_path) {
        return Ok(on_path);
    }

    COMMON_EXECUTABLES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or_else(|| anyhow!("Tesseract not found. Please install Tesseract-OCR."))
}

/// Finds a tessdata directory holding `<language>.traineddata`.
pub fn find_tessdata_dir(configured: Option<&str>, language: &str) -> Option<PathBuf> {
    let file = traineddata_name(language);
    let mut candidates: Vec<PathBuf> = Vec::new();

    if let Some(dir) = configured {
        candidates.push(PathBuf::from(dir));
    }
    candidates.push(get_local_tesseract_dir().join("tessdata"));
    candidates.push(get_user_data_dir().join("tessdata"));
    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        candidates.push(PathBuf::from(&prefix));
        candidates.push(PathBuf::from(&prefix).join("tessdata"));
    }
    candidates.extend(SYSTEM_TESSDATA_DIRS.iter().map(PathBuf::from));

    candidates.into_iter().find(|dir| dir.join(&file).exists())
}

/// Downloads trained data for `language` from the tessdata repository.
fn download_tessdata(tessdata_dir: &Path, language: &str) -> Result<()> {
    let file = traineddata_name(language);
    let url = format!("{}/{}", TESSDATA_REPO, file);
    let dest = tessdata_dir.join(&file);

    log(&format!("Downloading {}...", url));

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    let response = client
        .get(&url)
        .header("User-Agent", "slot-autoplay")
        .send()
        .with_context(|| format!("Failed to request {}", url))?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Failed to download {}: HTTP {}",
            file,
            response.status()
        ));
    }

    let bytes = response.bytes()?;

    // Sibling temp file, persisted only once complete.
    let mut temp = tempfile::NamedTempFile::new_in(tessdata_dir)?;
    temp.write_all(&bytes)?;
    temp.persist(&dest)
        .map_err(|e| anyhow!("Failed to save {}: {}", dest.display(), e))?;

    log(&format!("Downloaded {} ({} bytes)", file, bytes.len()));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_tessdata_prefers_configured_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("zzz.traineddata"), b"stub").unwrap();

        let found = find_tessdata_dir(dir.path().to_str(), "zzz");
        assert_eq!(found.as_deref(), Some(dir.path()));
    }

    #[test]
    fn test_find_tessdata_missing_language() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            find_tessdata_dir(dir.path().to_str(), "no-such-language-xyz"),
            None
        );
    }

    #[test]
    fn test_configured_executable_is_used_when_present() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let found = find_tesseract_executable(file.path().to_str()).unwrap();
        assert_eq!(found, file.path());
    }
}
