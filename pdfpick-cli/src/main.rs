use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use crossterm::cursor;
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture};
use crossterm::style::{Attribute, Print, SetAttribute};
use crossterm::terminal::{self, Clear, ClearType};
use directories::ProjectDirs;
use pdfpick_core::{
    default_file_name, Command, DocumentOpenError, EngineConfig, ExtractionService, FitMode,
    FrameQuality, FsSink, ImageIndex, NavigationController, NavigationEntry, NavigationEvent,
    OutputFormat, RenderImage,
};
use pdfpick_render::PdfiumProvider;
use pdfpick_tty::{
    write_status_line, DrawParams, EventMapper, FrameView, Highlights, InputMode, KittyRenderer,
    TerminalLayout, ThumbnailGrid, UiEvent,
};
use serde::Serialize;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Png,
    Jpeg,
}

#[derive(Debug, Parser)]
#[command(
    name = "pdfpick",
    version,
    about = "Browse a PDF in the terminal and save the images embedded in it"
)]
struct Args {
    /// PDF file to open
    path: Option<PathBuf>,

    /// Page to open on (1-based)
    #[arg(short = 'p', long = "page")]
    page: Option<usize>,

    /// Print every image placement as one JSON object per line and exit
    #[arg(long = "list-images", requires = "path")]
    list_images: bool,

    /// Configuration file to use instead of the default location
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Directory saved images are written to
    #[arg(short = 'o', long = "output-dir", default_value = ".")]
    output_dir: PathBuf,

    /// Encoding for saved images
    #[arg(long = "format", value_enum, default_value_t = FormatArg::Png)]
    format: FormatArg,
}

struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        crossterm::execute!(stdout, cursor::Hide, EnableMouseCapture)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let mut stdout = io::stdout();
        let _ = crossterm::execute!(stdout, DisableMouseCapture, cursor::Show);
        let _ = terminal::disable_raw_mode();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let project_dirs = ProjectDirs::from("net", "pdfpick", "pdfpick")
        .ok_or_else(|| anyhow!("unable to resolve platform data directories"))?;
    let _log_guard = init_logging(&project_dirs)?;

    let config = match &args.config {
        Some(path) => EngineConfig::load(path),
        None => EngineConfig::load_default(),
    }
    .context("failed to load configuration")?;
    let format = match args.format {
        FormatArg::Png => OutputFormat::Png,
        FormatArg::Jpeg => OutputFormat::Jpeg {
            quality: config.jpeg_quality,
        },
    };

    let provider = PdfiumProvider::new()?;
    let mut nav = NavigationController::new(config)?;
    let mut notice = None;
    if let Some(path) = &args.path {
        let opened = nav.open_document(&provider, path.clone()).await;
        notice = launch_notice(opened, path, args.list_images)?;
        if let (Some(page), None) = (args.page, &notice) {
            nav.apply(Command::GotoPage {
                page: page.saturating_sub(1),
            });
        }
    }

    if args.list_images {
        return list_images(&nav);
    }

    if !args.output_dir.is_dir() {
        return Err(anyhow!(
            "output directory {} does not exist",
            args.output_dir.display()
        ));
    }

    let _terminal = TerminalGuard::new()?;
    let mut app = App::new(nav, args.output_dir, format)?;
    app.notice = notice;
    let result = app.run();
    app.renderer.delete_images()?;
    app.renderer.clear_all()?;
    result
}

/// A document that fails to open at launch is fatal for `--list-images`; the
/// viewer starts empty instead and shows the error in the status line.
fn launch_notice(
    opened: Result<(), DocumentOpenError>,
    path: &Path,
    list_images: bool,
) -> Result<Option<String>> {
    let Err(err) = opened else {
        return Ok(None);
    };
    let err = anyhow::Error::new(err).context(format!("failed to open {}", path.display()));
    if list_images {
        return Err(err);
    }
    warn!("starting without a document: {:#}", err);
    Ok(Some(format!("{:#}", err)))
}

#[derive(Serialize)]
struct ListedImage<'a> {
    page: usize,
    ordinal: usize,
    rect: &'a pdfpick_core::PdfRect,
    pixel_width: u32,
    pixel_height: u32,
    interactive: bool,
}

fn list_images(nav: &NavigationController) -> Result<()> {
    let backend = nav
        .backend()
        .ok_or_else(|| anyhow!("no document is open"))?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for page in 0..backend.info().page_count {
        let index = match ImageIndex::build_for_page(backend.as_ref(), page) {
            Ok(index) => index,
            Err(err) => {
                warn!(?err, page, "skipping page whose images could not be listed");
                continue;
            }
        };
        for entry in index.entries() {
            let listed = ListedImage {
                page: entry.page_index + 1,
                ordinal: entry.ordinal,
                rect: &entry.rect,
                pixel_width: entry.pixel_width,
                pixel_height: entry.pixel_height,
                interactive: entry.interactive,
            };
            serde_json::to_writer(&mut out, &listed)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

enum LoopAction {
    Continue,
    ContinueRedraw,
    Quit,
}

/// Full-screen view drawn instead of the page.
enum Overlay {
    None,
    Outline(OutlineWindow),
    /// Contact sheet; `selected` is a page index.
    Thumbnails { selected: usize },
    /// One decoded image at its own resolution.
    Preview { ordinal: usize, image: RenderImage },
}

struct App {
    nav: NavigationController,
    renderer: KittyRenderer<io::Stdout>,
    mapper: EventMapper,
    layout: TerminalLayout,
    overlay: Overlay,
    hovered: Option<usize>,
    selected: Option<usize>,
    notice: Option<String>,
    output_dir: PathBuf,
    format: OutputFormat,
}

impl App {
    fn new(nav: NavigationController, output_dir: PathBuf, format: OutputFormat) -> Result<Self> {
        let mut app = Self {
            nav,
            renderer: KittyRenderer::new(io::stdout()),
            mapper: EventMapper::new(),
            layout: current_layout()?,
            overlay: Overlay::None,
            hovered: None,
            selected: None,
            notice: None,
            output_dir,
            format,
        };
        app.sync_viewport();
        Ok(app)
    }

    fn run(&mut self) -> Result<()> {
        self.renderer.clear_all()?;
        let mut dirty = true;

        loop {
            if self.nav.poll_render() {
                dirty = true;
            }
            if self.drain_navigation_events() {
                dirty = true;
            }

            if dirty {
                self.redraw()?;
                dirty = false;
            }

            if event::poll(Duration::from_millis(50))? {
                let ui_event = self.mapper.map_event(event::read()?);
                match self.handle_event(ui_event)? {
                    LoopAction::ContinueRedraw => dirty = true,
                    LoopAction::Continue => {}
                    LoopAction::Quit => break,
                }
            }
        }
        Ok(())
    }

    fn drain_navigation_events(&mut self) -> bool {
        let mut redraw = false;
        for event in self.nav.drain_events() {
            match event {
                NavigationEvent::Notice(message) => {
                    self.notice = Some(message);
                    redraw = true;
                }
                NavigationEvent::PageChanged { .. }
                | NavigationEvent::DocumentOpened(_)
                | NavigationEvent::DocumentClosed(_) => {
                    self.hovered = None;
                    self.selected = None;
                    redraw = true;
                }
                NavigationEvent::ZoomChanged { .. } | NavigationEvent::RedrawNeeded => {
                    redraw = true;
                }
            }
        }
        redraw
    }

    fn sync_viewport(&mut self) {
        let (width, height) = self.layout.viewport_pixels();
        self.nav.apply(Command::ResizeWindow { width, height });
    }

    fn handle_event(&mut self, event: UiEvent) -> Result<LoopAction> {
        match event {
            UiEvent::Command(command) => {
                self.notice = None;
                self.nav.apply(command);
                Ok(LoopAction::Continue)
            }
            UiEvent::Resize { .. } => {
                self.layout = current_layout()?;
                self.renderer.clear_all()?;
                self.sync_viewport();
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::Hover { column, row } => {
                let point = self.layout.cell_center(column, row);
                let hovered = self.nav.resolve_hit(point).map(|entry| entry.ordinal);
                if hovered != self.hovered {
                    self.hovered = hovered;
                    return Ok(LoopAction::ContinueRedraw);
                }
                Ok(LoopAction::Continue)
            }
            UiEvent::Click { column, row } => {
                let point = self.layout.cell_center(column, row);
                if let Overlay::Thumbnails { selected } = self.overlay {
                    let grid = self.thumbnail_grid();
                    let page_count = self.nav.info().map_or(0, |info| info.page_count);
                    let Some(page) = grid
                        .slot_at(point)
                        .and_then(|slot| page_in_slot(&grid, selected, slot, page_count))
                    else {
                        return Ok(LoopAction::Continue);
                    };
                    self.close_overlay()?;
                    self.nav.apply(Command::GotoPage { page });
                    return Ok(LoopAction::ContinueRedraw);
                }
                let Some(ordinal) = self.nav.resolve_hit(point).map(|entry| entry.ordinal) else {
                    return Ok(LoopAction::Continue);
                };
                self.selected = Some(ordinal);
                self.save_image(ordinal);
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::SelectNext => {
                self.cycle_selection(true);
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::SelectPrev => {
                self.cycle_selection(false);
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::ClearSelection => {
                self.selected = None;
                self.notice = None;
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::SaveSelected => {
                match self.selected {
                    Some(ordinal) => self.save_image(ordinal),
                    None => self.notice = Some("no image selected (Tab to select)".to_owned()),
                }
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::ExtractAll => {
                self.extract_all();
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::OpenOutline => {
                let (Some(outline), Some(state)) = (self.nav.outline(), self.nav.view_state())
                else {
                    return Ok(LoopAction::Continue);
                };
                let window =
                    OutlineWindow::new(outline.navigation_entries(), state.current_page);
                self.open_overlay(Overlay::Outline(window), InputMode::Outline)?;
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::CloseOverlay => {
                self.close_overlay()?;
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::OutlineMoveSelection { delta } => {
                if let Overlay::Outline(outline) = &mut self.overlay {
                    if outline.move_selection(delta) {
                        return Ok(LoopAction::ContinueRedraw);
                    }
                }
                Ok(LoopAction::Continue)
            }
            UiEvent::OutlineActivateSelection => {
                let target = match &self.overlay {
                    Overlay::Outline(outline) => {
                        outline.selected_entry().map(|entry| entry.page_index)
                    }
                    _ => None,
                };
                self.close_overlay()?;
                if let Some(page) = target {
                    self.nav.apply(Command::GotoPage { page });
                }
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::OpenThumbnails => {
                let Some(state) = self.nav.view_state() else {
                    return Ok(LoopAction::Continue);
                };
                let selected = state.current_page;
                self.open_overlay(Overlay::Thumbnails { selected }, InputMode::Thumbnails)?;
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::ThumbnailMove { dx, dy } => {
                let page_count = self.nav.info().map_or(0, |info| info.page_count);
                let grid = self.thumbnail_grid();
                if let Overlay::Thumbnails { selected } = &mut self.overlay {
                    let next = grid.step(*selected, dx, dy, page_count);
                    if next != *selected {
                        *selected = next;
                        return Ok(LoopAction::ContinueRedraw);
                    }
                }
                Ok(LoopAction::Continue)
            }
            UiEvent::ThumbnailActivate => {
                let target = match self.overlay {
                    Overlay::Thumbnails { selected } => Some(selected),
                    _ => None,
                };
                self.close_overlay()?;
                if let Some(page) = target {
                    self.nav.apply(Command::GotoPage { page });
                }
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::PreviewImage => {
                let Some(ordinal) = self.selected.or(self.hovered) else {
                    self.notice = Some("no image selected (Tab to select)".to_owned());
                    return Ok(LoopAction::ContinueRedraw);
                };
                match self.decode_image(ordinal) {
                    Ok(image) => {
                        self.selected = Some(ordinal);
                        self.notice = None;
                        self.open_overlay(Overlay::Preview { ordinal, image }, InputMode::Preview)?;
                    }
                    Err(err) => {
                        warn!(?err, ordinal, "preview failed");
                        self.notice = Some(format!("could not preview #{}: {:#}", ordinal, err));
                    }
                }
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::Quit => Ok(LoopAction::Quit),
            UiEvent::None => Ok(LoopAction::Continue),
        }
    }

    fn open_overlay(&mut self, overlay: Overlay, mode: InputMode) -> Result<()> {
        self.overlay = overlay;
        self.mapper.set_mode(mode);
        self.renderer.delete_images()?;
        self.renderer.clear_all()?;
        Ok(())
    }

    fn close_overlay(&mut self) -> Result<()> {
        if !matches!(std::mem::replace(&mut self.overlay, Overlay::None), Overlay::None) {
            self.mapper.set_mode(InputMode::Normal);
            self.renderer.delete_images()?;
            self.renderer.clear_all()?;
        }
        Ok(())
    }

    fn thumbnail_grid(&self) -> ThumbnailGrid {
        ThumbnailGrid::for_viewport(
            self.layout.viewport_pixels(),
            self.nav.config().thumbnail_width,
        )
    }

    fn decode_image(&self, ordinal: usize) -> Result<RenderImage> {
        let backend = self
            .nav
            .backend()
            .ok_or_else(|| anyhow!("no document is open"))?;
        let entry = self
            .nav
            .images()
            .and_then(|index| index.by_ordinal(ordinal))
            .ok_or_else(|| anyhow!("image #{} is not on this page", ordinal))?;
        let service = ExtractionService::new(backend.as_ref(), &FsSink);
        Ok(service.preview(entry)?)
    }

    fn cycle_selection(&mut self, forward: bool) {
        let Some(index) = self.nav.images() else {
            return;
        };
        let ordinals: Vec<usize> = index.interactive().map(|entry| entry.ordinal).collect();
        if ordinals.is_empty() {
            self.notice = Some("no images on this page".to_owned());
            return;
        }
        let position = self
            .selected
            .and_then(|current| ordinals.iter().position(|&o| o == current));
        let next = match (position, forward) {
            (None, true) => 0,
            (None, false) => ordinals.len() - 1,
            (Some(pos), true) => (pos + 1) % ordinals.len(),
            (Some(pos), false) => (pos + ordinals.len() - 1) % ordinals.len(),
        };
        self.selected = Some(ordinals[next]);
        self.notice = None;
    }

    fn save_image(&mut self, ordinal: usize) {
        let (Some(backend), Some(index)) = (self.nav.backend(), self.nav.images()) else {
            return;
        };
        let Some(entry) = index.by_ordinal(ordinal) else {
            return;
        };
        let path = self.output_dir.join(default_file_name(
            entry.page_index,
            entry.ordinal,
            self.format,
        ));
        let service = ExtractionService::new(backend.as_ref(), &FsSink);
        self.notice = Some(match service.extract(entry, &path, self.format) {
            Ok(saved) => format!("saved {}", display_name(&saved)),
            Err(err) => {
                warn!(%err, path = %path.display(), "save failed");
                format!("could not save {}: {}", display_name(&path), err)
            }
        });
    }

    fn extract_all(&mut self) {
        let (Some(backend), Some(index)) = (self.nav.backend(), self.nav.images()) else {
            return;
        };
        if index.is_empty() {
            self.notice = Some("no images on this page".to_owned());
            return;
        }
        let service = ExtractionService::new(backend.as_ref(), &FsSink);
        let summary = service.extract_batch(index.entries(), &self.output_dir, self.format);
        info!(
            saved = summary.succeeded(),
            failed = summary.failed(),
            dir = %self.output_dir.display(),
            "batch extraction finished"
        );
        let mut message = format!("saved {} image(s)", summary.succeeded());
        if let Some(first) = summary.failures.first() {
            message.push_str(&format!(
                ", {} failed (#{}: {})",
                summary.failed(),
                first.ordinal,
                first.error
            ));
        }
        self.notice = Some(message);
    }

    fn redraw(&mut self) -> Result<()> {
        match &mut self.overlay {
            Overlay::Outline(outline) => {
                let mut writer = self.renderer.writer();
                crossterm::execute!(&mut writer, Clear(ClearType::All))?;
                draw_outline_overlay(
                    &mut writer,
                    outline,
                    self.layout.columns,
                    self.layout.image_rows(),
                )?;
                return Ok(());
            }
            Overlay::Thumbnails { selected } => {
                let selected = *selected;
                return self.draw_thumbnails(selected);
            }
            Overlay::Preview { .. } => return self.draw_preview(),
            Overlay::None => {}
        }

        if !self.nav.is_open() {
            {
                let mut writer = self.renderer.writer();
                crossterm::execute!(
                    &mut writer,
                    Clear(ClearType::All),
                    cursor::MoveTo(0, 0),
                    Print("No document open. Start with: pdfpick <file.pdf>    (q to quit)")
                )?;
            }
            self.draw_status_line()?;
            return Ok(());
        }

        let view = match (self.nav.frame(), self.nav.transform()) {
            (Some(frame), Some(transform)) => {
                FrameView::new(frame, &transform, self.layout.viewport_pixels()).map(|mut view| {
                    if let Some(index) = self.nav.images() {
                        view.paint_boxes(
                            &transform,
                            index,
                            Highlights {
                                hovered: self.hovered,
                                selected: self.selected,
                            },
                        );
                    }
                    view
                })
            }
            _ => None,
        };

        self.renderer.begin_sync_update()?;
        if let Some(view) = view {
            let (columns, rows) = self.layout.cells_for(view.screen_width, view.screen_height);
            {
                let mut writer = self.renderer.writer();
                crossterm::execute!(&mut writer, cursor::MoveTo(0, 0))?;
            }
            self.renderer
                .draw(&view.image, DrawParams::clamped(columns, rows))?;
        }
        self.draw_status_line()?;
        self.renderer.end_sync_update()?;
        Ok(())
    }

    /// Draws the sheet holding `selected`. Pages whose thumbnail fails to
    /// render are shown blank.
    fn draw_thumbnails(&mut self, selected: usize) -> Result<()> {
        let page_count = self.nav.info().map_or(0, |info| info.page_count);
        let grid = self.thumbnail_grid();
        let first = grid.first_on_sheet(selected);
        let last = (first + grid.per_sheet()).min(page_count);
        let thumbnails: Vec<Arc<RenderImage>> = (first..last)
            .map(|page| {
                self.nav.thumbnail(page).unwrap_or_else(|err| {
                    warn!(?err, page, "thumbnail failed");
                    Arc::new(RenderImage::blank(grid.cell_width, grid.cell_height))
                })
            })
            .collect();
        let sheet = grid.compose(&thumbnails, Some(selected - first));
        let (columns, rows) = self
            .layout
            .cells_for(sheet.width as f32, sheet.height as f32);

        self.renderer.begin_sync_update()?;
        {
            let mut writer = self.renderer.writer();
            crossterm::execute!(&mut writer, cursor::MoveTo(0, 0))?;
        }
        self.renderer
            .draw(&sheet, DrawParams::clamped(columns, rows))?;
        self.draw_status_line()?;
        self.renderer.end_sync_update()?;
        Ok(())
    }

    fn draw_preview(&mut self) -> Result<()> {
        let Overlay::Preview { image, .. } = &self.overlay else {
            return Ok(());
        };
        let (column, row, columns, rows) = self.layout.centered_fit(image.width, image.height);
        self.renderer.begin_sync_update()?;
        {
            let mut writer = self.renderer.writer();
            crossterm::execute!(&mut writer, cursor::MoveTo(column, row))?;
        }
        self.renderer
            .draw(image, DrawParams::clamped(columns, rows))?;
        self.draw_status_line()?;
        self.renderer.end_sync_update()?;
        Ok(())
    }

    fn draw_status_line(&mut self) -> Result<()> {
        let status = combine_status(
            self.overlay_status().unwrap_or_else(|| self.document_status()),
            self.notice.as_deref(),
            self.mapper.pending_input().as_deref(),
        );
        let row = self.layout.status_row();
        let width = self.layout.columns as usize;
        let mut writer = self.renderer.writer();
        crossterm::execute!(
            &mut writer,
            cursor::MoveTo(0, row),
            Clear(ClearType::CurrentLine)
        )?;
        write_status_line(&mut writer, &truncate_with_ellipsis(status, width))?;
        Ok(())
    }

    fn overlay_status(&self) -> Option<String> {
        match &self.overlay {
            Overlay::Thumbnails { selected } => {
                let page_count = self.nav.info().map_or(0, |info| info.page_count);
                Some(format!(
                    "page {}/{} | Enter: open, Esc: back",
                    selected + 1,
                    page_count
                ))
            }
            Overlay::Preview { ordinal, image } => Some(format!(
                "image #{} | {}x{} px | s: save, Esc: back",
                ordinal, image.width, image.height
            )),
            Overlay::None | Overlay::Outline(_) => None,
        }
    }

    fn document_status(&self) -> String {
        let (Some(info), Some(state)) = (self.nav.info(), self.nav.view_state()) else {
            return String::new();
        };
        let name = info.display_name();
        let zoom_percent = state.zoom * 100.0;
        let mut status = format!(
            "{} | page {}/{} | {:.0}%",
            name,
            state.current_page + 1,
            info.page_count,
            zoom_percent
        );
        if state.fit_mode == FitMode::FitToWindow {
            status.push_str(" fit");
        }
        if let Some(frame) = self.nav.frame() {
            if frame.quality != FrameQuality::Exact {
                status.push_str(" (rendering)");
            }
        }
        if let Some(index) = self.nav.images() {
            status.push_str(&format!(" | {} image(s)", index.len()));
            let focus = self.selected.or(self.hovered);
            if let Some(entry) = focus.and_then(|ordinal| index.by_ordinal(ordinal)) {
                status.push_str(" | ");
                status.push_str(&entry.label());
            }
        }
        status
    }
}

fn current_layout() -> Result<TerminalLayout> {
    let window = terminal::window_size()?;
    Ok(TerminalLayout::new(
        window.columns,
        window.rows,
        window.width,
        window.height,
    ))
}

/// Page shown in `slot` of the sheet holding `selected`, if there is one.
fn page_in_slot(
    grid: &ThumbnailGrid,
    selected: usize,
    slot: usize,
    page_count: usize,
) -> Option<usize> {
    let page = grid.first_on_sheet(selected) + slot;
    (page < page_count).then_some(page)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn combine_status(base: String, notice: Option<&str>, pending_input: Option<&str>) -> String {
    let mut status = base;
    for extra in [notice, pending_input].into_iter().flatten() {
        if extra.is_empty() {
            continue;
        }
        if !status.is_empty() {
            status.push_str(" | ");
        }
        status.push_str(extra);
    }
    status
}

struct OutlineWindow {
    entries: Vec<NavigationEntry>,
    selected: usize,
    scroll_offset: usize,
}

impl OutlineWindow {
    fn new(entries: Vec<NavigationEntry>, current_page: usize) -> Self {
        let mut selected = 0;
        for (idx, item) in entries.iter().enumerate() {
            if item.page_index <= current_page {
                selected = idx;
            } else {
                break;
            }
        }
        Self {
            entries,
            selected,
            scroll_offset: 0,
        }
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn selected_entry(&self) -> Option<&NavigationEntry> {
        self.entries.get(self.selected)
    }

    fn move_selection(&mut self, delta: isize) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let len = self.entries.len() as isize;
        let next = (self.selected as isize + delta).clamp(0, len - 1) as usize;
        if next != self.selected {
            self.selected = next;
            true
        } else {
            false
        }
    }

    fn ensure_visible(&mut self, viewport_height: usize) {
        if viewport_height == 0 || self.entries.is_empty() {
            self.scroll_offset = 0;
            return;
        }
        let max_offset = self.entries.len().saturating_sub(viewport_height);
        if self.scroll_offset > max_offset {
            self.scroll_offset = max_offset;
        }
        if self.selected < self.scroll_offset {
            self.scroll_offset = self.selected;
            return;
        }
        let bottom = self.scroll_offset + viewport_height;
        if self.selected >= bottom {
            self.scroll_offset = self
                .selected
                .saturating_sub(viewport_height.saturating_sub(1));
        }
    }
}

fn draw_outline_overlay(
    writer: &mut impl Write,
    outline: &mut OutlineWindow,
    total_cols: u32,
    image_rows_available: u32,
) -> Result<()> {
    const TITLE: &str = "Outline";
    const EMPTY_MESSAGE: &str = "This document has no pages";

    if total_cols < 20 || image_rows_available < 6 {
        return Ok(());
    }

    let max_inner_width = total_cols.saturating_sub(6) as usize;
    let base_width = if outline.is_empty() {
        EMPTY_MESSAGE.len() + 2
    } else {
        outline
            .entries
            .iter()
            .map(outline_line_length)
            .max()
            .unwrap_or(0)
            .max(TITLE.len())
    };
    let inner_width = base_width.clamp(20.min(max_inner_width), max_inner_width);

    let max_window_height = image_rows_available.saturating_sub(2);
    let max_content_height = max_window_height.saturating_sub(4) as usize;
    if max_content_height == 0 {
        return Ok(());
    }

    let total_entries = outline.entries.len().max(1);
    let content_height = total_entries.min(max_content_height);
    outline.ensure_visible(content_height);

    let window_height = (content_height + 4) as u32;
    let window_width = (inner_width + 2) as u32;
    let start_col = (total_cols.saturating_sub(window_width) / 2) as u16;
    let mut row = (image_rows_available.saturating_sub(window_height) / 2) as u16;

    let horizontal_border = format!("+{}+", "-".repeat(inner_width));
    print_inverted(writer, start_col, row, &horizontal_border)?;
    row = row.saturating_add(1);
    let title_line = format!("|{: ^inner_width$}|", TITLE, inner_width = inner_width);
    print_inverted(writer, start_col, row, &title_line)?;
    row = row.saturating_add(1);
    print_inverted(writer, start_col, row, &format!("|{}|", "-".repeat(inner_width)))?;
    row = row.saturating_add(1);

    if outline.is_empty() {
        let content = truncate_with_ellipsis(format!("  {}", EMPTY_MESSAGE), inner_width);
        print_inverted(writer, start_col, row, &format!("|{}|", content))?;
        row = row.saturating_add(1);
    } else {
        let start_index = outline.scroll_offset;
        let end_index = (start_index + content_height).min(outline.entries.len());
        for idx in start_index..end_index {
            let content = format_outline_line(
                &outline.entries[idx],
                idx == outline.selected,
                inner_width,
            );
            print_inverted(writer, start_col, row, &format!("|{}|", content))?;
            row = row.saturating_add(1);
        }
    }

    print_inverted(writer, start_col, row, &horizontal_border)?;
    Ok(())
}

fn print_inverted(writer: &mut impl Write, col: u16, row: u16, content: &str) -> Result<()> {
    crossterm::execute!(
        writer,
        cursor::MoveTo(col, row),
        SetAttribute(Attribute::Reverse),
        Print(content),
        SetAttribute(Attribute::Reset)
    )?;
    Ok(())
}

fn outline_line_length(entry: &NavigationEntry) -> usize {
    let indent_width = entry.depth.min(8) * 2;
    let page_suffix = format!(" (p{})", entry.page_index + 1);
    2 + indent_width + entry.title.chars().count() + page_suffix.len()
}

fn format_outline_line(entry: &NavigationEntry, selected: bool, inner_width: usize) -> String {
    let marker = if selected { '>' } else { ' ' };
    let indent = "  ".repeat(entry.depth.min(8));
    let text = format!(
        "{} {}{} (p{})",
        marker,
        indent,
        entry.title,
        entry.page_index + 1
    );
    truncate_with_ellipsis(text, inner_width)
}

/// Pads or cuts `text` to exactly `width` characters.
fn truncate_with_ellipsis(text: String, width: usize) -> String {
    let len = text.chars().count();
    if len > width {
        if width <= 3 {
            return text.chars().take(width).collect();
        }
        let mut truncated: String = text.chars().take(width - 3).collect();
        truncated.push_str("...");
        return truncated;
    }
    let mut text = text;
    text.push_str(&" ".repeat(width - len));
    text
}

fn init_logging(project_dirs: &ProjectDirs) -> Result<WorkerGuard> {
    let log_dir = project_dirs.data_local_dir().join("logs");
    fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, "pdfpick.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Only the file: the terminal is in raw mode and owned by the viewer.
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str, depth: usize, page_index: usize) -> NavigationEntry {
        NavigationEntry {
            title: title.to_owned(),
            depth,
            page_index,
        }
    }

    #[test]
    fn outline_window_preselects_entry_for_current_page() {
        let window = OutlineWindow::new(
            vec![entry("A", 0, 0), entry("B", 1, 3), entry("C", 0, 8)],
            5,
        );
        assert_eq!(window.selected_entry().unwrap().title, "B");
    }

    #[test]
    fn outline_window_selection_is_clamped() {
        let mut window = OutlineWindow::new(vec![entry("A", 0, 0), entry("B", 0, 1)], 0);
        assert!(!window.move_selection(-1));
        assert!(window.move_selection(10));
        assert_eq!(window.selected_entry().unwrap().title, "B");
    }

    #[test]
    fn outline_window_scrolls_to_keep_selection_visible() {
        let entries = (0..20).map(|i| entry("x", 0, i)).collect();
        let mut window = OutlineWindow::new(entries, 0);
        window.move_selection(12);
        window.ensure_visible(5);
        assert_eq!(window.scroll_offset, 8);
    }

    #[test]
    fn truncate_pads_and_cuts() {
        assert_eq!(truncate_with_ellipsis("abc".to_owned(), 5), "abc  ");
        assert_eq!(truncate_with_ellipsis("abcdefgh".to_owned(), 6), "abc...");
        assert_eq!(truncate_with_ellipsis("abcdef".to_owned(), 2), "ab");
    }

    #[test]
    fn status_parts_are_joined() {
        assert_eq!(
            combine_status("doc.pdf".to_owned(), Some("saved x.png"), Some("12")),
            "doc.pdf | saved x.png | 12"
        );
        assert_eq!(combine_status(String::new(), None, Some("3")), "3");
    }

    #[test]
    fn launch_failure_becomes_a_notice_in_the_viewer() {
        let path = Path::new("/nowhere/missing.pdf");
        let opened = Err(DocumentOpenError::NotFound(path.to_path_buf()));

        let notice = launch_notice(opened, path, false).unwrap().unwrap();

        assert!(notice.starts_with("failed to open /nowhere/missing.pdf"));
        assert!(launch_notice(Ok(()), path, false).unwrap().is_none());
    }

    #[test]
    fn launch_failure_is_fatal_when_listing_images() {
        let path = Path::new("/nowhere/locked.pdf");
        let opened = Err(DocumentOpenError::PasswordProtected(path.to_path_buf()));

        let err = launch_notice(opened, path, true).unwrap_err();

        assert!(format!("{:#}", err).contains("locked.pdf"));
    }

    #[test]
    fn clicked_slot_maps_to_a_page_on_the_current_sheet() {
        let grid = ThumbnailGrid::for_viewport((500.0, 300.0), 100);
        assert_eq!(grid.per_sheet(), 8);
        assert_eq!(page_in_slot(&grid, 10, 3, 20), Some(11));
        assert_eq!(page_in_slot(&grid, 17, 5, 20), None);
    }

    #[test]
    fn outline_lines_are_indented_by_depth() {
        let line = format_outline_line(&entry("Intro", 2, 4), true, 20);
        assert_eq!(line, ">     Intro (p5)    ");
    }
}
