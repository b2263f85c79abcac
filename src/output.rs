use crate::config::AppConfig;
use crate::{data, map, render};
use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{info, warn};

/// Where the rendered page goes.
pub trait ArtifactSink {
    fn write(&self, path: &Path, contents: &str) -> Result<()>;
}

pub trait BrowserLauncher {
    fn open(&self, url: &str) -> Result<()>;
}

/// Writes to disk, replacing whatever was there.
pub struct FileSink;

impl ArtifactSink for FileSink {
    fn write(&self, path: &Path, contents: &str) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
        }
        fs::write(path, contents)
            .with_context(|| format!("Failed to write map file: {:?}", path))
    }
}

/// Hands the URL to the platform's default opener.
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> Result<()> {
        let mut cmd = if cfg!(target_os = "windows") {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", "start", ""]);
            cmd
        } else if cfg!(target_os = "macos") {
            Command::new("open")
        } else {
            Command::new("xdg-open")
        };

        cmd.arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to launch browser for {}", url))?;
        Ok(())
    }
}

pub struct NoBrowser;

impl BrowserLauncher for NoBrowser {
    fn open(&self, _url: &str) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerateReport {
    pub output: PathBuf,
    pub url: String,
    pub food_entries: usize,
    pub stations: usize,
    pub overlays: usize,
    pub markers: usize,
}

/// Load, assemble, render, write, announce, open: strictly in that order.
pub fn run_generate(
    config: &AppConfig,
    sink: &dyn ArtifactSink,
    launcher: &dyn BrowserLauncher,
) -> Result<GenerateReport> {
    let foods = data::load_foods(&config.input.foods)?;
    let mut builder = map::MapBuilder::new(config, &foods);
    builder.add_foods(&foods);

    let stations = data::load_stations(&config.input.stations)?;
    builder.add_stations(&stations);

    let doc = builder.finish();
    let output = &config.output.html;
    let title = output.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("map");
    let html = render::render_html(&doc, title)?;

    sink.write(output, &html)?;
    info!(path = %output.display(), bytes = html.len(), "Wrote map");
    println!("{}{}", config.labels.completion_prefix, output.display());

    let url = file_url(output)?;
    if let Err(e) = launcher.open(&url) {
        warn!(error = %e, "Could not open browser");
    }

    Ok(GenerateReport {
        output: output.clone(),
        url,
        food_entries: foods.len(),
        stations: stations.len(),
        overlays: doc.overlay_names().len(),
        markers: doc.marker_count(),
    })
}

pub fn file_url(path: &Path) -> Result<String> {
    let absolute = std::path::absolute(path)
        .with_context(|| format!("Failed to resolve absolute path: {:?}", path))?;
    let text = absolute.to_str()
        .ok_or_else(|| anyhow!("Output path is not valid UTF-8: {:?}", absolute))?
        .replace('\\', "/");

    if text.starts_with('/') {
        Ok(format!("file://{}", text))
    } else {
        Ok(format!("file:///{}", text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};
    use std::cell::RefCell;
    use tempfile::TempDir;

    #[derive(Default)]
    struct MemorySink {
        written: RefCell<Vec<(PathBuf, String)>>,
    }

    impl ArtifactSink for MemorySink {
        fn write(&self, path: &Path, contents: &str) -> Result<()> {
            self.written.borrow_mut().push((path.to_path_buf(), contents.to_string()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingBrowser {
        opened: RefCell<Vec<String>>,
    }

    impl BrowserLauncher for RecordingBrowser {
        fn open(&self, url: &str) -> Result<()> {
            self.opened.borrow_mut().push(url.to_string());
            Ok(())
        }
    }

    struct BrokenBrowser;

    impl BrowserLauncher for BrokenBrowser {
        fn open(&self, _url: &str) -> Result<()> {
            Err(anyhow!("no display"))
        }
    }

    fn fixture(dir: &Path) -> AppConfig {
        fs::write(
            dir.join("foods.csv"),
            "name,lat,lon,category,price,intro\n\
             豆漿店,25.00,121.50,早餐,80-150,老店\n\
             麵店,25.02,121.52,午餐,100,\n\
             夜市攤,25.04,121.54,,call for price,\n",
        )
        .unwrap();
        fs::write(
            dir.join("stations.csv"),
            "\u{feff}lat,lng,station\n25.01,121.51,站A\n25.03,121.53,站B\n",
        )
        .unwrap();
        let icon: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::from_pixel(4, 4, Rgba([0, 160, 80, 255]));
        icon.save(dir.join("icon.png")).unwrap();

        let mut config = AppConfig::default();
        config.input.foods = dir.join("foods.csv");
        config.input.stations = dir.join("stations.csv");
        config.input.station_icon = dir.join("icon.png");
        config.output.html = dir.join("out").join("food_map.html");
        config
    }

    #[test]
    fn pipeline_writes_once_and_opens_file_url() {
        let dir = TempDir::new().unwrap();
        let config = fixture(dir.path());
        let sink = MemorySink::default();
        let browser = RecordingBrowser::default();

        let report = run_generate(&config, &sink, &browser).unwrap();

        assert_eq!(report.food_entries, 3);
        assert_eq!(report.stations, 2);
        // 早餐, 午餐, fallback, bubbles, stations
        assert_eq!(report.overlays, 5);
        assert_eq!(report.markers, 3 + 3 + 2);

        let written = sink.written.borrow();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].0, config.output.html);
        assert!(written[0].1.contains("類別：其他"));

        let opened = browser.opened.borrow();
        assert_eq!(opened.len(), 1);
        assert!(opened[0].starts_with("file://"));
        assert!(opened[0].ends_with("/out/food_map.html"));
        assert!(!config.output.html.exists());
    }

    #[test]
    fn file_sink_overwrites_existing_output() {
        let dir = TempDir::new().unwrap();
        let config = fixture(dir.path());
        fs::create_dir_all(dir.path().join("out")).unwrap();
        fs::write(&config.output.html, "stale").unwrap();

        run_generate(&config, &FileSink, &NoBrowser).unwrap();

        let html = fs::read_to_string(&config.output.html).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("豆漿店"));
    }

    #[test]
    fn running_twice_gives_identical_output() {
        let dir = TempDir::new().unwrap();
        let config = fixture(dir.path());

        let first = MemorySink::default();
        let second = MemorySink::default();
        run_generate(&config, &first, &NoBrowser).unwrap();
        run_generate(&config, &second, &NoBrowser).unwrap();

        assert_eq!(first.written.borrow()[0].1, second.written.borrow()[0].1);
    }

    #[test]
    fn missing_station_file_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut config = fixture(dir.path());
        config.input.stations = dir.path().join("missing.csv");
        let sink = MemorySink::default();
        let browser = RecordingBrowser::default();

        let err = run_generate(&config, &sink, &browser).unwrap_err();

        assert!(err.to_string().contains("Failed to open CSV file"));
        assert!(sink.written.borrow().is_empty());
        assert!(browser.opened.borrow().is_empty());
    }

    #[test]
    fn missing_icon_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut config = fixture(dir.path());
        config.input.station_icon = dir.path().join("gone.png");
        let sink = MemorySink::default();

        assert!(run_generate(&config, &sink, &NoBrowser).is_err());
        assert!(sink.written.borrow().is_empty());
    }

    #[test]
    fn browser_failure_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let config = fixture(dir.path());

        let report = run_generate(&config, &MemorySink::default(), &BrokenBrowser).unwrap();

        assert_eq!(report.food_entries, 3);
    }

    #[test]
    fn file_url_is_absolute() {
        let url = file_url(Path::new("food_map.html")).unwrap();

        assert!(url.starts_with("file:///"));
        assert!(url.ends_with("/food_map.html"));
    }
}
