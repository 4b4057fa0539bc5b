//! Chromium process management.
//!
//! Spawns a Chromium-family browser with remote debugging enabled, waits for
//! the DevTools endpoint and hands out page sessions. The process and its
//! throwaway profile live exactly as long as the `BrowserProcess` value.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use tempfile::TempDir;

use super::error::CdpError;
use super::protocol::{BrowserVersion, PageInfo};
use super::session::PageSession;
use crate::config::BrowserConfig;
use crate::poll::{CancelFlag, PollOutcome, poll};

const PATH_CANDIDATES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "microsoft-edge",
];

#[cfg(target_os = "macos")]
const COMMON_EXECUTABLES: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
];
#[cfg(windows)]
const COMMON_EXECUTABLES: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
];
#[cfg(not(any(target_os = "macos", windows)))]
const COMMON_EXECUTABLES: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
];

/// Finds a browser executable: configured path, CHROME_PATH, PATH, then common locations.
pub fn find_browser_executable(configured: Option<&str>) -> Result<PathBuf, CdpError> {
    if let Some(path) = configured {
        let p = PathBuf::from(path);
        return if p.exists() {
            Ok(p)
        } else {
            Err(CdpError::ExecutableNotFound(path.to_string()))
        };
    }

    if let Ok(path) = std::env::var("CHROME_PATH") {
        let p = PathBuf::from(path);
        if p.exists() {
            return Ok(p);
        }
    }

    for name in PATH_CANDIDATES {
        let responds = Command::new(name)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        if responds {
            return Ok(PathBuf::from(name));
        }
    }

    COMMON_EXECUTABLES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or_else(|| {
            CdpError::ExecutableNotFound(
                "no Chrome/Chromium found; set browser.executable in config.json".to_string(),
            )
        })
}

/// Builds the browser command line.
fn launch_args(config: &BrowserConfig, profile_dir: &Path) -> Vec<String> {
    let mut args = vec![
        format!("--remote-debugging-port={}", config.debugging_port),
        format!("--user-data-dir={}", profile_dir.display()),
        format!(
            "--window-size={},{}",
            config.window_width, config.window_height
        ),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        // Keep cross-origin iframes in the page's own frame tree.
        "--disable-site-isolation-trials".to_string(),
        "--disable-features=IsolateOrigins,site-per-process".to_string(),
    ];
    if config.headless {
        args.push("--headless=new".to_string());
    }
    args.extend(config.extra_args.iter().cloned());
    args.push("about:blank".to_string());
    args
}

/// Reads the port Chromium chose when started with `--remote-debugging-port=0`.
fn read_active_port(profile_dir: &Path) -> Option<u16> {
    let contents = fs::read_to_string(profile_dir.join("DevToolsActivePort")).ok()?;
    contents.lines().next()?.trim().parse().ok()
}

/// A running browser with remote debugging enabled.
pub struct BrowserProcess {
    child: Child,
    endpoint: String,
    http: reqwest::blocking::Client,
    profile_dir: TempDir,
}

impl BrowserProcess {
    /// Launches the browser and waits until its DevTools endpoint answers.
    pub fn launch(config: &BrowserConfig, cancel: &CancelFlag) -> Result<Self, CdpError> {
        let executable = find_browser_executable(config.executable.as_deref())?;
        let profile_dir = tempfile::tempdir()?;

        crate::log(&format!("Launching browser: {}", executable.display()));

        let child = Command::new(&executable)
            .args(launch_args(config, profile_dir.path()))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| CdpError::LaunchFailed(format!("{}: {}", executable.display(), e)))?;

        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        // Owns the child from here on, so any early return kills it.
        let mut browser = Self {
            child,
            endpoint: String::new(),
            http,
            profile_dir,
        };

        let fixed_port = (config.debugging_port != 0).then_some(config.debugging_port);
        let outcome = poll(
            || {
                let port = fixed_port.or_else(|| read_active_port(browser.profile_dir.path()))?;
                let endpoint = format!("http://127.0.0.1:{}", port);
                let version: BrowserVersion = browser
                    .http
                    .get(format!("{}/json/version", endpoint))
                    .send()
                    .ok()?
                    .json()
                    .ok()?;
                Some((endpoint, version))
            },
            Duration::from_millis(200),
            Some(Duration::from_millis(config.launch_timeout_ms)),
            cancel,
        );

        match outcome {
            PollOutcome::Ready((endpoint, version)) => {
                crate::log(&format!("Connected to browser: {}", version.browser));
                browser.endpoint = endpoint;
                Ok(browser)
            }
            PollOutcome::TimedOut => Err(CdpError::EndpointNotAvailable(format!(
                "{} after {}ms",
                executable.display(),
                config.launch_timeout_ms
            ))),
            PollOutcome::Cancelled => Err(CdpError::LaunchFailed("cancelled".to_string())),
        }
    }

    /// Attaches to the first page target, opening one if the browser has none.
    pub fn open_page(&self) -> Result<PageSession, CdpError> {
        let pages: Vec<PageInfo> = self
            .http
            .get(format!("{}/json/list", self.endpoint))
            .send()?
            .json()?;

        let existing = pages
            .into_iter()
            .find(|p| p.page_type == "page" && p.web_socket_debugger_url.is_some());

        let page = match existing {
            Some(page) => page,
            // Chrome requires PUT for /json/new
            None => self
                .http
                .put(format!("{}/json/new", self.endpoint))
                .send()?
                .json()?,
        };

        crate::log(&format!("Attaching to page {} ({})", page.id, page.url));

        let ws_url = page
            .web_socket_debugger_url
            .ok_or_else(|| CdpError::InvalidResponse("page has no webSocketDebuggerUrl".to_string()))?;

        PageSession::connect(&ws_url)
    }
}

impl Drop for BrowserProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        crate::log("Browser closed.");
    }
}
