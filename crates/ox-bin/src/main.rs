//! `edit` entrypoint: argument parsing, logging/panic setup, and the
//! blocking terminal event loop driving a single `TextBuffer` through
//! `core-render`'s immediate-mode widgets.

use anyhow::{Context, Result};
use clap::Parser;
use core_input::{InputEvent, KeyCode, KeyModifiers, VtParser, VtToken, map_token};
use core_render::widgets;
use core_render::{UiContext, UiInput};
use core_terminal::{CrosstermBackend, TerminalBackend, TerminalCapabilities, contract};
use core_text::TextBuffer;
use core_text::geom::Size;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Once;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

/// The menubar row's own height: its labels carry no vertical padding
/// (`Padding::uniform(1, 0, 1, 0)` in `menubar_menu_begin`), so it is
/// always exactly one row regardless of terminal width.
const MENUBAR_ROWS: i32 = 1;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "edit", version, about = "A small terminal text editor")]
struct Args {
    /// Path to the file to open. Created on first save if it doesn't exist.
    path: PathBuf,
    /// Configuration file path (overrides discovery of `oxidized.toml`).
    #[arg(long = "config")]
    config: Option<PathBuf>,
    /// Overrides the `RUST_LOG`-style env filter for this run.
    #[arg(long = "log-level")]
    log_level: Option<String>,
}

struct AppStartup {
    backend: CrosstermBackend,
    log_guard: Option<WorkerGuard>,
}

impl AppStartup {
    fn new() -> Self {
        Self { backend: CrosstermBackend::new(), log_guard: None }
    }

    fn configure_logging(&mut self, log_level: Option<&str>) -> Result<()> {
        let log_dir = Path::new(".");
        let log_path = log_dir.join("oxidized.log");
        if log_path.exists() {
            let _ = std::fs::remove_file(&log_path);
        }

        let file_appender = tracing_appender::rolling::never(log_dir, "oxidized.log");
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        let filter = match log_level {
            Some(level) => tracing_subscriber::EnvFilter::try_new(level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::from_default_env()),
            None => tracing_subscriber::EnvFilter::from_default_env(),
        };
        match tracing_subscriber::fmt().with_env_filter(filter).with_writer(nb_writer).try_init() {
            Ok(_) => self.log_guard = Some(guard),
            Err(_) => {
                // Global subscriber already installed (e.g. under a test harness); drop the guard.
            }
        }
        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }
}

/// Feeds raw terminal bytes through a `VtParser`, same shape as
/// `core_input::InputReader::feed`, except `OSC` tokens are intercepted
/// here to update the palette instead of being dropped: `InputReader`'s
/// general-purpose UI event mapping has no use for them, but this binary
/// does.
struct RawInputReader {
    parser: VtParser,
    buf: Vec<u8>,
}

impl RawInputReader {
    fn new() -> Self {
        Self { parser: VtParser::new(), buf: Vec::new() }
    }

    fn drain(&mut self, bytes: &[u8], caps: &mut TerminalCapabilities, out: &mut Vec<InputEvent>) {
        self.buf.extend_from_slice(bytes);
        let mut consumed_total = 0usize;
        loop {
            let (token, consumed) = self.parser.parse_next(&self.buf[consumed_total..]);
            match token {
                Some(VtToken::Osc(payload)) => {
                    if let Some((index, rgb)) = contract::parse_osc4_response(payload) {
                        caps.set_color(index, rgb);
                    }
                    consumed_total += consumed;
                }
                Some(tok) => {
                    if let Some(ev) = map_token(&tok) {
                        out.push(ev);
                    }
                    consumed_total += consumed;
                }
                None => {
                    consumed_total += consumed;
                    break;
                }
            }
        }
        self.buf.drain(0..consumed_total);
    }
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            use clap::error::ErrorKind;
            match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
                _ => std::process::exit(1),
            }
        }
    };

    if let Err(e) = run(args) {
        tracing::error!(target: "runtime", error = %format!("{e:#}"), "fatal");
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn load_buffer(path: &Path) -> (TextBuffer, bool) {
    match TextBuffer::load_file(path) {
        Ok(tb) => (tb, false),
        Err(e) => {
            warn!(target: "io", path = %path.display(), error = %format!("{e:#}"), "file_open_failed_using_empty_buffer");
            (TextBuffer::new(), true)
        }
    }
}

fn window_title(path: &Path, dirty: bool) -> String {
    let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("untitled");
    if dirty { format!("{name} [modified] - edit") } else { format!("{name} - edit") }
}

fn build_frame(ctx: &mut UiContext, tb: &mut TextBuffer, path: &Path, quit: &mut bool) {
    if ctx.consume_shortcut(KeyCode::Char('S'), KeyModifiers::CTRL) {
        save(tb, path);
    }
    if ctx.consume_shortcut(KeyCode::Char('Q'), KeyModifiers::CTRL) {
        *quit = true;
    }

    widgets::menubar_begin(ctx);
    if widgets::menubar_menu_begin(ctx, "File", 'F') {
        if widgets::menubar_menu_item(ctx, "Save", 'S', Some(('S', KeyModifiers::CTRL))) {
            save(tb, path);
        }
        if widgets::menubar_menu_item(ctx, "Exit", 'X', Some(('Q', KeyModifiers::CTRL))) {
            *quit = true;
        }
        widgets::menubar_menu_end(ctx);
    }
    if widgets::menubar_menu_begin(ctx, "Edit", 'E') {
        if widgets::menubar_menu_item(ctx, "Undo", 'U', Some(('Z', KeyModifiers::CTRL))) {
            tb.undo();
        }
        if widgets::menubar_menu_item(ctx, "Redo", 'R', Some(('Y', KeyModifiers::CTRL))) {
            tb.redo();
        }
        widgets::menubar_menu_end(ctx);
    }
    widgets::menubar_end(ctx);

    let size = ctx.get_size();
    let remaining = Size::new(0, (size.height - MENUBAR_ROWS).max(0));
    widgets::textarea(ctx, "document", tb, remaining);
}

fn save(tb: &mut TextBuffer, path: &Path) {
    match tb.save_file(path) {
        Ok(()) => {
            tb.dirty = false;
            info!(target: "io", path = %path.display(), "file_saved");
        }
        Err(e) => {
            // TODO: write-to-temp-then-rename would make this safe against a
            // crash mid-write; last-write-wins is the documented tradeoff for now.
            warn!(target: "io", path = %path.display(), error = %format!("{e:#}"), "save_failed");
        }
    }
}

fn run(args: Args) -> Result<()> {
    let mut startup = AppStartup::new();
    startup.configure_logging(args.log_level.as_deref())?;
    AppStartup::install_panic_hook();
    info!(target: "runtime", "startup");

    startup.backend.set_title("edit")?;
    startup.backend.enter()?;

    let (mut tb, open_failed) = load_buffer(&args.path);
    let mut config = core_config::load_from(args.config.clone())?;
    tb.overtype = config.file.editor.overtype;

    let (cols, rows) = crossterm::terminal::size().context("querying terminal size")?;
    let wrap = config.apply_context(core_config::ConfigContext::new(cols));
    tb.reflow(wrap);

    let mut caps = TerminalCapabilities::with_fallback(config.indexed_colors_fallback());

    let mut ctx = UiContext::new();
    ctx.setup_indexed_colors(caps.indexed_colors);
    ctx = ctx.reset(UiInput::Resize { width: cols as i32, height: rows as i32 });

    info!(
        target: "runtime.startup",
        path = %args.path.display(),
        open_failed,
        width = cols,
        height = rows,
        "bootstrap_complete"
    );

    let mut quit = false;
    build_frame(&mut ctx, &mut tb, &args.path, &mut quit);
    render_frame(&mut ctx)?;
    startup.backend.set_title(&window_title(&args.path, tb.dirty))?;

    let mut reader = RawInputReader::new();
    let mut read_buf = [0u8; 4096];
    let mut stdin = std::io::stdin();
    let mut last_title = window_title(&args.path, tb.dirty);

    'outer: while !quit {
        let n = stdin.read(&mut read_buf).context("reading terminal input")?;
        if n == 0 {
            break;
        }

        let mut events = Vec::new();
        reader.drain(&read_buf[..n], &mut caps, &mut events);

        for event in events {
            // Raw mode delivers Ctrl-C as a plain 0x03 byte, mapped to this
            // key event rather than a signal; handle it as cancellation
            // before it ever reaches the widget tree.
            if let InputEvent::Key { code: KeyCode::Char('C'), modifiers } = &event {
                if modifiers.contains(KeyModifiers::CTRL) {
                    break 'outer;
                }
            }

            ctx = ctx.reset(event.into());
            ctx.setup_indexed_colors(caps.indexed_colors);

            let viewport_columns = ctx.get_size().width.max(0) as u16;
            if let Some(new_wrap) = config.recompute_with_context(core_config::ConfigContext::new(viewport_columns)) {
                tb.reflow(new_wrap);
            }

            build_frame(&mut ctx, &mut tb, &args.path, &mut quit);
            render_frame(&mut ctx)?;

            let title = window_title(&args.path, tb.dirty);
            if title != last_title {
                startup.backend.set_title(&title)?;
                last_title = title;
            }

            if quit {
                break 'outer;
            }
        }
    }

    info!(target: "runtime", "shutdown");
    Ok(())
}

fn render_frame(ctx: &mut UiContext) -> Result<()> {
    let frame = core_render::root_render(ctx);
    let mut stdout = std::io::stdout();
    stdout.write_all(frame.as_bytes()).context("writing terminal output")?;
    stdout.flush().context("flushing terminal output")
}
