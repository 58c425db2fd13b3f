//! Configuration loading and parsing.
//!
//! Parses `oxidized.toml` (or an override path provided by the binary)
//! for the handful of knobs the editor actually exposes: the default
//! soft-wrap column, the default overtype mode, and indexed-palette
//! fallback colors for terminals that never answer the `OSC 4` probe.
//! Unknown fields are ignored (TOML deserialization tolerance) so the
//! file can evolve without breaking older configs.

use anyhow::Result;
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigContext {
    pub viewport_columns: u16,
}

impl ConfigContext {
    pub fn new(viewport_columns: u16) -> Self {
        Self { viewport_columns }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EditorConfig {
    #[serde(default = "EditorConfig::default_word_wrap_columns")]
    pub word_wrap_columns: i64,
    #[serde(default)]
    pub overtype: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            word_wrap_columns: Self::default_word_wrap_columns(),
            overtype: false,
        }
    }
}

impl EditorConfig {
    const fn default_word_wrap_columns() -> i64 {
        -1
    }
}

/// The 16-slot indexed-color fallback used when a terminal's `OSC 4`
/// palette probe goes unanswered. Matches a standard ANSI palette.
const DEFAULT_PALETTE: [[u8; 3]; 16] = [
    [0x00, 0x00, 0x00],
    [0x80, 0x00, 0x00],
    [0x00, 0x80, 0x00],
    [0x80, 0x80, 0x00],
    [0x00, 0x00, 0x80],
    [0x80, 0x00, 0x80],
    [0x00, 0x80, 0x80],
    [0xc0, 0xc0, 0xc0],
    [0x80, 0x80, 0x80],
    [0xff, 0x00, 0x00],
    [0x00, 0xff, 0x00],
    [0xff, 0xff, 0x00],
    [0x00, 0x00, 0xff],
    [0xff, 0x00, 0xff],
    [0x00, 0xff, 0xff],
    [0xff, 0xff, 0xff],
];

#[derive(Debug, Deserialize, Default, Clone)]
pub struct PaletteConfig {
    /// Hex colors (`"#rrggbb"` or `"rrggbb"`) overriding the default
    /// fallback palette, by index; trailing slots keep the default.
    #[serde(default)]
    pub colors: Vec<String>,
}

fn parse_hex_color(s: &str) -> Option<[u8; 3]> {
    let hex = s.strip_prefix('#').unwrap_or(s);
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some([r, g, b])
}

impl PaletteConfig {
    /// Resolves to a full 16-entry palette: malformed or missing entries
    /// fall back to `DEFAULT_PALETTE`'s slot rather than dropping the
    /// whole palette.
    pub fn resolve(&self) -> [[u8; 3]; 16] {
        let mut palette = DEFAULT_PALETTE;
        for (slot, entry) in palette.iter_mut().zip(&self.colors) {
            match parse_hex_color(entry) {
                Some(rgb) => *slot = rgb,
                None => warn!(target: "config", color = %entry, "invalid_palette_color_ignored"),
            }
        }
        palette
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub palette: PaletteConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>,
    pub file: ConfigFile,
    pub effective_word_wrap_columns: i64,
}

/// Best-effort config path following platform conventions (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    let local = PathBuf::from("oxidized.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("oxidized").join("oxidized.toml");
    }
    PathBuf::from("oxidized.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    if let Ok(content) = fs::read_to_string(&path) {
        match toml::from_str::<ConfigFile>(&content) {
            Ok(file) => Ok(Config {
                raw: Some(content),
                file,
                effective_word_wrap_columns: EditorConfig::default_word_wrap_columns(),
            }),
            Err(e) => {
                warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed_using_defaults");
                Ok(Config::default())
            }
        }
    } else {
        Ok(Config::default())
    }
}

impl Config {
    /// Applies viewport context, clamping the configured default wrap
    /// column to something the current terminal can actually show:
    /// the `-1` no-wrap sentinel passes through unchanged, any other
    /// negative value is clamped to `-1`, and a positive value wider
    /// than the viewport is clamped down to it.
    pub fn apply_context(&mut self, ctx: ConfigContext) -> i64 {
        let raw = self.file.editor.word_wrap_columns;
        let max = ctx.viewport_columns as i64;
        let clamped = if raw < 0 {
            -1
        } else if max > 0 && raw > max {
            max
        } else {
            raw
        };

        if clamped != raw {
            warn!(
                target: "config",
                raw,
                clamped,
                viewport_columns = ctx.viewport_columns,
                "word_wrap_columns_clamped"
            );
        }
        self.effective_word_wrap_columns = clamped;
        clamped
    }

    /// Recompute on a viewport resize. Returns `Some(new_value)` when the
    /// effective wrap column changed, else `None`.
    pub fn recompute_with_context(&mut self, ctx: ConfigContext) -> Option<i64> {
        let prev = self.effective_word_wrap_columns;
        let current = self.apply_context(ctx);
        if current != prev { Some(current) } else { None }
    }

    /// The resolved 16-color fallback palette for `TerminalCapabilities::with_fallback`.
    pub fn indexed_colors_fallback(&self) -> [[u8; 3]; 16] {
        self.file.palette.resolve()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex, MutexGuard};
    use tracing::Level;
    use tracing::subscriber::with_default;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone)]
    struct BufferWriter {
        inner: Arc<Mutex<Vec<u8>>>,
    }

    impl BufferWriter {
        fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
            let buf = Arc::new(Mutex::new(Vec::new()));
            (Self { inner: buf.clone() }, buf)
        }
    }

    struct LockedWriter<'a> {
        guard: MutexGuard<'a, Vec<u8>>,
    }

    impl<'a> std::io::Write for LockedWriter<'a> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.guard.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for BufferWriter {
        type Writer = LockedWriter<'a>;

        fn make_writer(&'a self) -> Self::Writer {
            LockedWriter {
                guard: self.inner.lock().expect("log buffer poisoned"),
            }
        }
    }

    #[test]
    fn default_config_when_missing_file() {
        let cfg = load_from(Some(PathBuf::from("__nonexistent_hopefully__.toml"))).unwrap();
        assert_eq!(cfg.file.editor.word_wrap_columns, -1);
        assert!(!cfg.file.editor.overtype);
    }

    #[test]
    fn parses_word_wrap_and_overtype() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[editor]\nword_wrap_columns = 72\novertype = true\n").unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.file.editor.word_wrap_columns, 72);
        assert!(cfg.file.editor.overtype);
    }

    #[test]
    fn no_wrap_sentinel_passes_through_unclamped() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[editor]\nword_wrap_columns = -1\n").unwrap();
        let mut cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        let eff = cfg.apply_context(ConfigContext::new(80));
        assert_eq!(eff, -1);
    }

    #[test]
    fn negative_non_sentinel_clamps_to_no_wrap() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[editor]\nword_wrap_columns = -7\n").unwrap();
        let mut cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        let eff = cfg.apply_context(ConfigContext::new(80));
        assert_eq!(eff, -1);
    }

    #[test]
    fn wrap_wider_than_viewport_clamps_down() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[editor]\nword_wrap_columns = 200\n").unwrap();
        let mut cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        let eff = cfg.apply_context(ConfigContext::new(80));
        assert_eq!(eff, 80);
        assert_eq!(cfg.effective_word_wrap_columns, 80);
    }

    #[test]
    fn recompute_with_context_reports_change_only_when_value_moves() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[editor]\nword_wrap_columns = 100\n").unwrap();
        let mut cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        cfg.apply_context(ConfigContext::new(120));
        assert_eq!(cfg.effective_word_wrap_columns, 100);

        let changed = cfg.recompute_with_context(ConfigContext::new(60));
        assert_eq!(changed, Some(60));
        let changed_again = cfg.recompute_with_context(ConfigContext::new(65));
        assert_eq!(changed_again, None);
    }

    #[test]
    fn clamp_logging_uses_config_target() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[editor]\nword_wrap_columns = 200\n").unwrap();
        let mut cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        let (writer, buffer) = BufferWriter::new();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::WARN)
            .with_target(true)
            .with_ansi(false)
            .without_time()
            .with_writer(writer)
            .finish();

        with_default(subscriber, || {
            cfg.apply_context(ConfigContext::new(40));
        });

        let log_output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(log_output.contains("WARN config:"));
        assert!(log_output.contains("word_wrap_columns_clamped"));
        assert_eq!(cfg.effective_word_wrap_columns, 40);
    }

    #[test]
    fn palette_overrides_apply_by_index_and_invalid_entries_keep_default() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[palette]\ncolors = [\"#112233\", \"not-a-color\"]\n").unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        let resolved = cfg.indexed_colors_fallback();
        assert_eq!(resolved[0], [0x11, 0x22, 0x33]);
        assert_eq!(resolved[1], DEFAULT_PALETTE[1]);
    }
}
