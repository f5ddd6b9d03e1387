use image::DynamicImage;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Tabs},
    Frame,
};
use ratatui_image::{picker::Picker, protocol::StatefulProtocol, Resize, StatefulImage};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use crate::backend::chapters::{ChapterIndex, NO_CHAPTER};
use crate::backend::history::{Bookmarks, KeyValueStore, ReadHistory};
use crate::backend::mangadex::{Chapter, ChapterPages, Manga};
use crate::backend::reader::{PageSetController, Quality};
use crate::backend::resolver::{ChapterResolver, NavigationCursor};
use crate::backend::translate::{CacheEntry, RequestKind};
use crate::ui::input::{InputEventRouter, TabStrip};

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Home,
    Bookmarks,
    Search,
}

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Header,
    Recent,
    Popular,
}

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum AppState {
    #[default]
    Loading,
    Ready,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub enum View {
    #[default]
    Home,
    MangaDetail,
    Reader,
}

/// One row of the flattened, volume-grouped chapter list.
#[derive(Clone, PartialEq)]
pub enum DetailRow {
    Volume(String),
    /// Index into the chapter index's record list.
    Chapter(usize),
}

/// Everything owned by the open reader view. Dropped wholesale when the
/// reader closes, which also retires its input router.
pub struct ReaderSession {
    pub chapter: Chapter,
    pub cursor: NavigationCursor,
    pub pages: PageSetController,
    pub router: InputEventRouter,
    pub page_images: HashMap<String, StatefulProtocol>,
    pub translations: HashMap<String, Arc<CacheEntry>>,
    pub tts_results: HashMap<String, Arc<CacheEntry>>,
    pub pending: HashSet<(String, RequestKind)>,
    pub failed: HashSet<(String, RequestKind)>,
    pub show_overlay: bool,
    pub show_message: bool,
    /// Strip geometry from the last draw, for click-to-page mapping.
    pub tab_strip: Option<TabStrip>,
    pub auto_advance_deadline: Option<Instant>,
    pub end_prompt_dismissed: bool,
}

impl ReaderSession {
    fn new(chapter: Chapter) -> Self {
        Self {
            cursor: NavigationCursor::new(&chapter),
            chapter,
            pages: PageSetController::default(),
            router: InputEventRouter::new(),
            page_images: HashMap::new(),
            translations: HashMap::new(),
            tts_results: HashMap::new(),
            pending: HashSet::new(),
            failed: HashSet::new(),
            show_overlay: true,
            show_message: false,
            tab_strip: None,
            auto_advance_deadline: None,
            end_prompt_dismissed: false,
        }
    }

    pub fn current_entry(&self) -> Option<&Arc<CacheEntry>> {
        let url = self.pages.current_page_url()?;
        self.translations.get(url).or_else(|| self.tts_results.get(url))
    }
}

pub struct App {
    pub state: AppState,
    pub loading_message: String,
    pub tab: Tab,
    pub focus: Focus,
    pub view: View,
    pub search_query: String,
    pub last_search_query: String,
    pub searching: bool,
    pub search_debounce: Option<Instant>,
    pub search_results: Vec<Manga>,
    pub search_offset: usize,
    pub recent_offset: usize,
    pub popular_offset: usize,
    pub bookmark_offset: usize,
    pub recently_updated: Vec<Manga>,
    pub popular_now: Vec<Manga>,
    pub picker: Option<Picker>,
    pub cover_images: HashMap<String, DynamicImage>,
    pub image_states: HashMap<String, StatefulProtocol>,
    pub bookmarks: Bookmarks,
    pub history: ReadHistory,
    pub selected_manga: Option<Manga>,
    pub chapter_index: ChapterIndex,
    pub detail_rows: Vec<DetailRow>,
    pub chapter_list_state: ListState,
    pub reader: Option<ReaderSession>,
}

impl App {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let picker = Picker::from_query_stdio().ok();

        Self {
            state: AppState::Loading,
            loading_message: "Initializing...".to_string(),
            tab: Tab::Home,
            focus: Focus::Header,
            view: View::Home,
            search_query: String::new(),
            last_search_query: String::new(),
            searching: false,
            search_debounce: None,
            search_results: Vec::new(),
            search_offset: 0,
            recent_offset: 0,
            popular_offset: 0,
            bookmark_offset: 0,
            recently_updated: Vec::new(),
            popular_now: Vec::new(),
            picker,
            cover_images: HashMap::new(),
            image_states: HashMap::new(),
            bookmarks: Bookmarks::load(store.clone()),
            history: ReadHistory::load(store),
            selected_manga: None,
            chapter_index: ChapterIndex::default(),
            detail_rows: Vec::new(),
            chapter_list_state: ListState::default(),
            reader: None,
        }
    }

    pub fn set_loading(&mut self, message: &str) {
        self.state = AppState::Loading;
        self.loading_message = message.to_string();
    }

    pub fn set_ready(&mut self) {
        self.state = AppState::Ready;
    }

    pub fn add_cover_image(&mut self, manga_id: &str, image: DynamicImage) {
        self.cover_images.insert(manga_id.to_string(), image.clone());

        if let Some(ref picker) = self.picker {
            let protocol = picker.new_resize_protocol(image);
            self.image_states.insert(manga_id.to_string(), protocol);
        }
    }

    pub fn open_manga(&mut self, manga: Manga) {
        self.selected_manga = Some(manga);
        self.chapter_index = ChapterIndex::default();
        self.detail_rows.clear();
        self.chapter_list_state.select(Some(0));
        self.view = View::MangaDetail;
    }

    /// Rebuilds the index and the flattened detail rows from a freshly
    /// fetched chapter list.
    pub fn set_chapters(&mut self, chapters: Vec<Chapter>) {
        self.chapter_index = ChapterIndex::build(chapters);
        self.detail_rows = flatten_volumes(&self.chapter_index);
        let first_chapter = self
            .detail_rows
            .iter()
            .position(|row| matches!(row, DetailRow::Chapter(_)));
        self.chapter_list_state.select(first_chapter.or(Some(0)));
    }

    pub fn selected_chapter(&self) -> Option<&Chapter> {
        match self.detail_rows.get(self.chapter_list_state.selected()?)? {
            DetailRow::Chapter(idx) => self.chapter_index.chapter(*idx),
            DetailRow::Volume(_) => None,
        }
    }

    pub fn detail_select_up(&mut self) {
        let selected = self.chapter_list_state.selected().unwrap_or(0);
        if selected > 0 {
            self.chapter_list_state.select(Some(selected - 1));
        }
    }

    pub fn detail_select_down(&mut self) {
        let selected = self.chapter_list_state.selected().unwrap_or(0);
        if selected + 1 < self.detail_rows.len() {
            self.chapter_list_state.select(Some(selected + 1));
        }
    }

    /// Opens the reader on `chapter` and records the visit. Page URLs
    /// arrive later over the task channel.
    pub fn open_reader(&mut self, chapter: Chapter) {
        if let Some(manga) = &self.selected_manga {
            self.history.record(manga, &chapter);
        }
        self.reader = Some(ReaderSession::new(chapter));
        self.view = View::Reader;
    }

    /// Moves the open reader to another chapter resolved by prev/next or a
    /// quick-select. Keeps the session's language cursor in sync.
    pub fn visit_chapter(&mut self, chapter: Chapter) {
        if let Some(manga) = &self.selected_manga {
            self.history.record(manga, &chapter);
        }
        if let Some(session) = &mut self.reader {
            let mut cursor = session.cursor.clone();
            cursor.visit(&chapter);
            *session = ReaderSession::new(chapter);
            session.cursor = cursor;
        }
    }

    pub fn set_chapter_pages(&mut self, pages: ChapterPages) {
        if let Some(session) = &mut self.reader {
            session.pages = PageSetController::new(pages);
        }
    }

    pub fn add_page_image(&mut self, page_url: &str, image: DynamicImage) {
        let Some(picker) = &self.picker else {
            return;
        };
        let protocol = picker.new_resize_protocol(image);
        if let Some(session) = &mut self.reader {
            session.page_images.insert(page_url.to_string(), protocol);
            // The requested page is on screen; release the transition guard.
            if session.pages.current_page_url() == Some(page_url) {
                session.pages.settle();
            }
        }
    }

    pub fn translation_ready(&mut self, page_url: &str, entry: Arc<CacheEntry>) {
        if let Some(session) = &mut self.reader {
            session.pending.remove(&(page_url.to_string(), RequestKind::Translate));
            session.failed.remove(&(page_url.to_string(), RequestKind::Translate));
            session.translations.insert(page_url.to_string(), entry);
            session.show_message = true;
        }
    }

    pub fn tts_ready(&mut self, page_url: &str, entry: Arc<CacheEntry>) {
        if let Some(session) = &mut self.reader {
            session.pending.remove(&(page_url.to_string(), RequestKind::Tts));
            session.failed.remove(&(page_url.to_string(), RequestKind::Tts));
            session.tts_results.insert(page_url.to_string(), entry);
            session.show_message = true;
        }
    }

    pub fn request_failed(&mut self, page_url: &str, kind: RequestKind) {
        if let Some(session) = &mut self.reader {
            session.pending.remove(&(page_url.to_string(), kind));
            session.failed.insert((page_url.to_string(), kind));
        }
    }

    pub fn go_back(&mut self) {
        match self.view {
            View::Reader => {
                self.reader = None;
                self.view = View::MangaDetail;
            }
            View::MangaDetail => {
                self.selected_manga = None;
                self.view = View::Home;
            }
            View::Home => {}
        }
    }
}

fn flatten_volumes(index: &ChapterIndex) -> Vec<DetailRow> {
    let mut rows = Vec::new();
    for volume in index.by_volume() {
        rows.push(DetailRow::Volume(volume.volume.clone()));
        for group in &volume.groups {
            for &idx in &group.chapter_indices {
                rows.push(DetailRow::Chapter(idx));
            }
        }
    }
    rows
}

const CARD_WIDTH: u16 = 35;

/// Seconds the end-of-chapter prompt counts down before auto-advancing.
pub const AUTO_ADVANCE_SECS: u64 = 10;

pub fn ui(f: &mut Frame, app: &mut App) {
    match app.state {
        AppState::Loading => draw_loading_screen(f, app),
        AppState::Ready => match app.view {
            View::Home => draw_home(f, app),
            View::MangaDetail => draw_detail(f, app),
            View::Reader => {
                draw_reader(f, app);
                draw_reader_end_prompt(f, app);
            }
        },
    }
}

fn draw_reader_end_prompt(f: &mut Frame, app: &mut App) {
    let Some(session) = &app.reader else {
        return;
    };
    if session.end_prompt_dismissed || !session.pages.end_of_chapter_reached() {
        return;
    }

    let resolver = ChapterResolver::new(&app.chapter_index);
    let has_next = resolver.has_next(&session.cursor);
    let seconds_left = session
        .auto_advance_deadline
        .map(|d| d.saturating_duration_since(Instant::now()).as_secs())
        .unwrap_or(AUTO_ADVANCE_SECS);
    draw_end_of_chapter_prompt(f, seconds_left, has_next);
}

fn draw_loading_screen(f: &mut Frame, app: &App) {
    let area = f.area();

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Manga Reader")
        .border_style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let center_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Length(3),
            Constraint::Length(2),
            Constraint::Percentage(40),
        ])
        .split(inner);

    let spinner_frames = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
    let frame_idx = (std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis()
        / 100) as usize
        % spinner_frames.len();

    let spinner = spinner_frames[frame_idx];

    let loading_text = Line::from(vec![
        Span::styled(
            format!(" {} ", spinner),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            "Loading...",
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
    ]);

    let loading_paragraph = Paragraph::new(loading_text).alignment(Alignment::Center);
    f.render_widget(loading_paragraph, center_layout[1]);

    let message = Paragraph::new(&*app.loading_message)
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    f.render_widget(message, center_layout[2]);
}

fn draw_home(f: &mut Frame, app: &mut App) {
    let area = f.area();

    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header/tabs
            Constraint::Min(10),   // content
            Constraint::Length(3), // footer
        ])
        .split(area);

    draw_header(f, root[0], app);

    match app.tab {
        Tab::Home => {
            let content_layout = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                .split(root[1]);

            draw_manga_section(
                f,
                content_layout[0],
                "Recently Updated",
                &app.recently_updated,
                &mut app.recent_offset,
                app.focus == Focus::Recent,
                &mut app.image_states,
            );
            draw_manga_section(
                f,
                content_layout[1],
                "Popular Now",
                &app.popular_now,
                &mut app.popular_offset,
                app.focus == Focus::Popular,
                &mut app.image_states,
            );
        }
        Tab::Bookmarks => {
            let bookmarked = app.bookmarks.get_bookmarked_manga();
            draw_manga_section(
                f,
                root[1],
                "Bookmarks",
                &bookmarked,
                &mut app.bookmark_offset,
                app.focus != Focus::Header,
                &mut app.image_states,
            );
        }
        Tab::Search => draw_search_tab(f, root[1], app),
    }

    draw_footer(
        f,
        root[2],
        &[
            ("Tab", "switch section"),
            ("←/→", "scroll"),
            ("Enter", "open"),
            ("q", "quit"),
        ],
    );
}

fn draw_search_tab(f: &mut Frame, area: Rect, app: &mut App) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(5)])
        .split(area);

    let status = if app.searching {
        " searching..."
    } else {
        ""
    };
    let query = Paragraph::new(format!("{}{}", app.search_query, status))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Search")
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .style(Style::default().fg(Color::White));
    f.render_widget(query, layout[0]);

    let results = std::mem::take(&mut app.search_results);
    draw_manga_section(
        f,
        layout[1],
        "Results",
        &results,
        &mut app.search_offset,
        app.focus != Focus::Header,
        &mut app.image_states,
    );
    app.search_results = results;
}

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
    let titles = vec!["Home", "Bookmarks", "Search"];
    let selected = match app.tab {
        Tab::Home => 0,
        Tab::Bookmarks => 1,
        Tab::Search => 2,
    };

    let header_style = if app.focus == Focus::Header {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White)
    };

    let tabs = Tabs::new(titles)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Manga Reader")
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .select(selected)
        .style(Style::default().fg(Color::DarkGray))
        .highlight_style(header_style);

    f.render_widget(tabs, area);
}

fn draw_manga_section(
    f: &mut Frame,
    area: Rect,
    title: &str,
    mangas: &[Manga],
    offset: &mut usize,
    focused: bool,
    image_states: &mut HashMap<String, StatefulProtocol>,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(if focused {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        });

    let inner = block.inner(area);
    f.render_widget(block, area);

    if mangas.is_empty() {
        let loading = Paragraph::new("No manga available")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray));
        f.render_widget(loading, inner);
        return;
    }

    // Clamp offset
    let max_offset = mangas.len().saturating_sub(1);
    if *offset > max_offset {
        *offset = max_offset;
    }

    let available_width = inner.width as usize;
    let cards_visible = (available_width / CARD_WIDTH as usize).max(1);

    let card_constraints: Vec<Constraint> = (0..cards_visible)
        .map(|_| Constraint::Length(CARD_WIDTH))
        .collect();

    let card_areas = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(card_constraints)
        .split(inner);

    for (i, card_area) in card_areas.iter().enumerate() {
        let manga_idx = *offset + i;
        if manga_idx >= mangas.len() {
            break;
        }
        let manga = &mangas[manga_idx];
        draw_manga_card(
            f,
            *card_area,
            manga,
            focused && i == 0,
            image_states.get_mut(&manga.id),
        );
    }

    if *offset > 0 {
        let left_indicator = Paragraph::new("◀").style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );
        let left_area = Rect::new(inner.x, inner.y + inner.height / 2, 1, 1);
        f.render_widget(left_indicator, left_area);
    }

    if *offset + cards_visible < mangas.len() {
        let right_indicator = Paragraph::new("▶").style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );
        let right_area = Rect::new(
            inner.x + inner.width.saturating_sub(1),
            inner.y + inner.height / 2,
            1,
            1,
        );
        f.render_widget(right_indicator, right_area);
    }
}

fn draw_manga_card(
    f: &mut Frame,
    area: Rect,
    manga: &Manga,
    selected: bool,
    image_state: Option<&mut StatefulProtocol>,
) {
    let border_style = if selected {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);

    let inner = block.inner(area);
    f.render_widget(block, area);

    if inner.height < 4 || inner.width < 5 {
        return;
    }

    let card_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(8), // cover
            Constraint::Length(2), // title
            Constraint::Min(2),    // description
            Constraint::Length(1), // status
        ])
        .split(inner);

    if let Some(state) = image_state {
        let image_widget = StatefulImage::new().resize(Resize::Scale(None));
        f.render_stateful_widget(image_widget, card_layout[0], state);
    } else {
        let image_content = vec![
            Line::from(""),
            Line::from(""),
            Line::from(Span::styled("📚", Style::default().fg(Color::Magenta))),
            Line::from(Span::styled(
                "Loading...",
                Style::default().fg(Color::DarkGray),
            )),
        ];
        let image_block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));
        let image_paragraph = Paragraph::new(image_content)
            .block(image_block)
            .alignment(Alignment::Center);
        f.render_widget(image_paragraph, card_layout[0]);
    }

    let title = truncate_text(&manga.title, (inner.width.saturating_sub(2)) as usize);
    let title_paragraph = Paragraph::new(title)
        .style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .alignment(Alignment::Left);
    f.render_widget(title_paragraph, card_layout[1]);

    let desc_width = inner.width.saturating_sub(1) as usize;
    let max_desc_lines = card_layout[2].height as usize;
    let desc_lines = wrap_text(&manga.description, desc_width, max_desc_lines.max(1));
    let desc_paragraph =
        Paragraph::new(desc_lines.join("\n")).style(Style::default().fg(Color::DarkGray));
    f.render_widget(desc_paragraph, card_layout[2]);

    let status_line = Line::from(vec![
        Span::styled("★ ", Style::default().fg(Color::Yellow)),
        Span::styled(&manga.status, Style::default().fg(Color::Cyan)),
    ]);
    f.render_widget(Paragraph::new(status_line), card_layout[3]);
}

fn draw_detail(f: &mut Frame, app: &mut App) {
    let area = f.area();

    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(10), Constraint::Length(3)])
        .split(area);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(root[0]);

    let Some(manga) = app.selected_manga.clone() else {
        return;
    };

    let bookmarked = app.bookmarks.is_bookmarked(&manga.id);
    let info_title = if bookmarked {
        format!("{} ♥", manga.title)
    } else {
        manga.title.clone()
    };
    let info_block = Block::default()
        .borders(Borders::ALL)
        .title(truncate_text(&info_title, columns[0].width as usize))
        .border_style(Style::default().fg(Color::Cyan));
    let info_inner = info_block.inner(columns[0]);
    f.render_widget(info_block, columns[0]);

    let mut info_lines = vec![
        Line::from(vec![
            Span::styled("Author: ", Style::default().fg(Color::DarkGray)),
            Span::raw(manga.author.clone()),
        ]),
        Line::from(vec![
            Span::styled("Status: ", Style::default().fg(Color::DarkGray)),
            Span::styled(manga.status.clone(), Style::default().fg(Color::Cyan)),
        ]),
        Line::from(vec![
            Span::styled("Languages: ", Style::default().fg(Color::DarkGray)),
            Span::raw(app.chapter_index.languages().join(", ")),
        ]),
        Line::from(""),
    ];
    for line in wrap_text(
        &manga.description,
        info_inner.width.saturating_sub(1) as usize,
        info_inner.height.saturating_sub(5) as usize,
    ) {
        info_lines.push(Line::from(Span::styled(
            line,
            Style::default().fg(Color::DarkGray),
        )));
    }
    f.render_widget(Paragraph::new(info_lines), info_inner);

    let items: Vec<ListItem> = app
        .detail_rows
        .iter()
        .map(|row| match row {
            DetailRow::Volume(volume) => ListItem::new(Line::from(Span::styled(
                format!("▾ Volume {volume}"),
                Style::default()
                    .fg(Color::Magenta)
                    .add_modifier(Modifier::BOLD),
            ))),
            DetailRow::Chapter(idx) => {
                let label = app
                    .chapter_index
                    .chapter(*idx)
                    .map(chapter_label)
                    .unwrap_or_default();
                ListItem::new(Line::from(format!("  {label}")))
            }
        })
        .collect();

    let chapter_count = app.chapter_index.chapters().len();
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Chapters ({chapter_count})"))
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▶ ");
    f.render_stateful_widget(list, columns[1], &mut app.chapter_list_state);

    draw_footer(
        f,
        root[1],
        &[
            ("↑/↓", "select"),
            ("Enter", "read"),
            ("b", "bookmark"),
            ("Esc", "back"),
        ],
    );
}

fn chapter_label(chapter: &Chapter) -> String {
    let number = chapter.chapter.as_deref().unwrap_or(NO_CHAPTER);
    let title = chapter.title.as_deref().unwrap_or("");
    if title.is_empty() {
        format!(
            "Ch. {number} [{}] · {} pages",
            chapter.translated_language, chapter.pages
        )
    } else {
        format!(
            "Ch. {number} [{}] · {title}",
            chapter.translated_language
        )
    }
}

fn draw_reader(f: &mut Frame, app: &mut App) {
    let area = f.area();
    let Some(session) = &mut app.reader else {
        return;
    };

    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // chapter info / page counter
            Constraint::Min(8),    // page image(s)
            Constraint::Length(1), // tab strip
            Constraint::Length(2), // key hints
        ])
        .split(area);

    draw_reader_status(f, root[0], session);
    draw_reader_pages(f, root[1], session);
    draw_tab_strip(f, root[2], session);

    let quality_hint = match session.pages.quality() {
        Quality::Low => "d: hq",
        Quality::High => "d: data-saver",
    };
    draw_footer(
        f,
        root[3],
        &[
            ("←/→", "page"),
            ("t", "translate"),
            ("s", "speak"),
            ("o", "overlay"),
            ("n/p", "chapter"),
            ("1/2", "panels"),
            (quality_hint, ""),
            ("Esc", "back"),
        ],
    );
}

fn draw_reader_status(f: &mut Frame, area: Rect, session: &ReaderSession) {
    let chapter = &session.chapter;
    let number = chapter.chapter.as_deref().unwrap_or(NO_CHAPTER);
    let page_count = session.pages.page_count();
    let current = session.pages.current_index();
    let panels = session.pages.panels();

    let counter = if page_count == 0 {
        "–/–".to_string()
    } else if panels == 2 {
        format!(
            "{}-{}/{}",
            current + 1,
            (current + panels).min(page_count),
            page_count
        )
    } else {
        format!("{}/{}", current + 1, page_count)
    };

    let mut spans = vec![
        Span::styled(
            format!("Ch. {number} "),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("[{}] ", chapter.translated_language),
            Style::default().fg(Color::Magenta),
        ),
        Span::styled(counter, Style::default().fg(Color::Cyan)),
    ];

    if let Some(url) = session.pages.current_page_url() {
        let translate_key = (url.to_string(), RequestKind::Translate);
        let tts_key = (url.to_string(), RequestKind::Tts);
        if session.pending.contains(&translate_key) || session.pending.contains(&tts_key) {
            spans.push(Span::styled(
                "  translating...",
                Style::default().fg(Color::Yellow),
            ));
        } else if session.failed.contains(&translate_key) || session.failed.contains(&tts_key) {
            spans.push(Span::styled(
                "  translation unavailable (t to retry)",
                Style::default().fg(Color::Red),
            ));
        } else if session.translations.contains_key(url) {
            spans.push(Span::styled(
                "  translated",
                Style::default().fg(Color::Green),
            ));
        }
    }

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_reader_pages(f: &mut Frame, area: Rect, session: &mut ReaderSession) {
    let visible: Vec<String> = session.pages.visible_pages().to_vec();
    if visible.is_empty() {
        let placeholder = Paragraph::new("Loading pages...")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray));
        f.render_widget(placeholder, area);
        return;
    }

    let overlay_entry = session
        .show_overlay
        .then(|| session.current_entry().cloned())
        .flatten();

    let panel_areas: Vec<Rect> = if visible.len() == 2 {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(area)
            .to_vec()
    } else {
        vec![area]
    };

    for (url, panel) in visible.iter().zip(panel_areas.iter()) {
        match session.page_images.get_mut(url) {
            Some(state) => {
                let image_widget = StatefulImage::new().resize(Resize::Scale(None));
                f.render_stateful_widget(image_widget, *panel, state);
            }
            None => {
                // Image still fetching (or failed): placeholder instead of
                // a stalled view.
                let placeholder = Paragraph::new("▒▒ loading page ▒▒")
                    .alignment(Alignment::Center)
                    .style(Style::default().fg(Color::DarkGray));
                f.render_widget(placeholder, *panel);
            }
        }
    }

    if let Some(entry) = overlay_entry {
        draw_translation_box(f, area, session, &entry);
    }
}

fn draw_translation_box(
    f: &mut Frame,
    area: Rect,
    session: &ReaderSession,
    entry: &CacheEntry,
) {
    if !session.show_message || area.width < 30 || area.height < 6 {
        return;
    }

    let box_width = (area.width / 3).max(24);
    let box_area = Rect::new(
        area.x + area.width - box_width,
        area.y,
        box_width,
        area.height.min(12),
    );

    let source = entry.translated_ocr.as_deref().unwrap_or(entry.ocr.as_slice());
    let mut lines: Vec<Line> = Vec::new();
    for fragment in source.iter().take(8) {
        for wrapped in wrap_text(&fragment.text, box_width.saturating_sub(2) as usize, 2) {
            lines.push(Line::from(wrapped));
        }
    }
    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            if entry.text.is_empty() {
                "No text available".to_string()
            } else {
                entry.text.clone()
            },
            Style::default().fg(Color::DarkGray),
        )));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Translation (m to hide)")
        .border_style(Style::default().fg(Color::Magenta));
    f.render_widget(Paragraph::new(lines).block(block), box_area);
}

/// Renders the page markers and records their on-screen geometry so a
/// click can be routed back to a page index.
fn draw_tab_strip(f: &mut Frame, area: Rect, session: &mut ReaderSession) {
    let page_count = session.pages.page_count();
    if page_count == 0 || area.width < 4 {
        session.tab_strip = None;
        return;
    }

    let current = session.pages.current_index();
    let panels = session.pages.panels();
    let width = area.width as usize;

    let mut marks = String::with_capacity(width);
    for cell in 0..width {
        let page = cell * page_count / width;
        let active = page >= current && page < current + panels;
        marks.push(if active { '█' } else { '░' });
    }

    f.render_widget(
        Paragraph::new(marks).style(Style::default().fg(Color::Magenta)),
        area,
    );

    session.tab_strip = Some(TabStrip {
        x: area.x,
        y: area.y,
        width: area.width,
        page_count,
    });
}

fn draw_end_of_chapter_prompt(f: &mut Frame, seconds_left: u64, has_next: bool) {
    let area = f.area();
    if area.height < 6 {
        return;
    }

    let message = if has_next {
        format!("End of chapter — next chapter in {seconds_left}s  (n: now, Esc: stay)")
    } else {
        "End of chapter — no further chapters".to_string()
    };

    let width = (message.len() as u16 + 4).min(area.width);
    let prompt_area = Rect::new(
        area.x + (area.width.saturating_sub(width)) / 2,
        area.y + area.height / 2,
        width,
        3,
    );

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));
    f.render_widget(
        Paragraph::new(message)
            .alignment(Alignment::Center)
            .block(block),
        prompt_area,
    );
}

fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        format!(
            "{}...",
            text.chars()
                .take(max_len.saturating_sub(3))
                .collect::<String>()
        )
    }
}

fn wrap_text(text: &str, width: usize, max_lines: usize) -> Vec<String> {
    if width == 0 || max_lines == 0 {
        return vec![];
    }

    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if current_line.is_empty() {
            current_line = word.to_string();
        } else if current_line.chars().count() + 1 + word.chars().count() <= width {
            current_line.push(' ');
            current_line.push_str(word);
        } else {
            lines.push(current_line);
            if lines.len() >= max_lines {
                if let Some(last) = lines.last_mut() {
                    let char_count = last.chars().count();
                    if char_count > 3 {
                        *last = last.chars().take(char_count - 3).collect::<String>() + "...";
                    }
                }
                return lines;
            }
            current_line = word.to_string();
        }
    }

    if !current_line.is_empty() && lines.len() < max_lines {
        lines.push(current_line);
    }

    lines
}

fn draw_footer(f: &mut Frame, area: Rect, hints: &[(&str, &str)]) {
    let mut spans = Vec::new();
    for (i, (key, label)) in hints.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw("  "));
        }
        spans.push(Span::styled(*key, Style::default().fg(Color::Yellow)));
        if !label.is_empty() {
            spans.push(Span::raw(format!(": {label}")));
        }
    }

    let p = Paragraph::new(Line::from(spans))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .alignment(Alignment::Center);
    f.render_widget(p, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        map: Mutex<StdHashMap<String, String>>,
    }

    impl KeyValueStore for MemoryStore {
        fn get(&self, key: &str) -> Option<String> {
            self.map.lock().unwrap().get(key).cloned()
        }

        fn set(&self, key: &str, value: &str) {
            self.map
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
        }
    }

    fn chapter(id: &str, number: &str, volume: Option<&str>, lang: &str) -> Chapter {
        Chapter {
            id: id.to_string(),
            chapter: Some(number.to_string()),
            title: None,
            volume: volume.map(str::to_string),
            translated_language: lang.to_string(),
            pages: 10,
            publish_at: None,
        }
    }

    fn test_app() -> App {
        let mut app = App::new(Arc::new(MemoryStore::default()));
        // No terminal in tests; covers/pages just skip protocol creation.
        app.picker = None;
        app
    }

    #[test]
    fn test_detail_rows_interleave_volume_headers() {
        let mut app = test_app();
        app.set_chapters(vec![
            chapter("a", "1", Some("1"), "en"),
            chapter("b", "2", Some("1"), "en"),
            chapter("c", "3", None, "en"),
        ]);

        assert!(matches!(&app.detail_rows[0], DetailRow::Volume(v) if v == "1"));
        assert!(matches!(app.detail_rows[1], DetailRow::Chapter(_)));
        assert!(matches!(app.detail_rows[2], DetailRow::Chapter(_)));
        assert!(
            matches!(&app.detail_rows[3], DetailRow::Volume(v) if v == crate::backend::chapters::NO_VOLUME)
        );

        // Initial selection skips the volume header.
        assert_eq!(app.chapter_list_state.selected(), Some(1));
        assert_eq!(app.selected_chapter().unwrap().id, "a");
    }

    #[test]
    fn test_reader_session_lifecycle_and_history() {
        let mut app = test_app();
        app.selected_manga = Some(Manga {
            id: "m1".to_string(),
            title: "Title".to_string(),
            author: String::new(),
            artist: String::new(),
            status: String::new(),
            description: String::new(),
            cover_url: String::new(),
        });

        app.open_reader(chapter("c1", "1", None, "en"));
        assert_eq!(app.view, View::Reader);
        assert_eq!(app.history.entries().len(), 1);

        app.set_chapter_pages(ChapterPages {
            data: vec!["hq/1.png".to_string()],
            data_saver: vec!["lq/1.jpg".to_string()],
        });
        let session = app.reader.as_ref().unwrap();
        assert_eq!(session.pages.page_count(), 1);
        assert_eq!(session.cursor.selected_language, "en");

        app.visit_chapter(chapter("c2", "2", None, "fr"));
        let session = app.reader.as_ref().unwrap();
        assert_eq!(session.cursor.selected_language, "fr");
        assert_eq!(session.cursor.current_chapter_id, "c2");
        assert_eq!(app.history.entries().len(), 2);

        app.go_back();
        assert!(app.reader.is_none());
        assert_eq!(app.view, View::MangaDetail);
    }

    #[test]
    fn test_translation_result_ingestion_tracks_state() {
        let mut app = test_app();
        app.open_reader(chapter("c1", "1", None, "ja"));
        app.set_chapter_pages(ChapterPages {
            data: vec!["hq/1.png".to_string()],
            data_saver: vec!["lq/1.jpg".to_string()],
        });

        let key = ("lq/1.jpg".to_string(), RequestKind::Translate);
        app.reader.as_mut().unwrap().pending.insert(key.clone());

        app.request_failed("lq/1.jpg", RequestKind::Translate);
        let session = app.reader.as_ref().unwrap();
        assert!(!session.pending.contains(&key));
        assert!(session.failed.contains(&key));

        let entry = Arc::new(CacheEntry {
            ocr: Vec::new(),
            translated_ocr: Some(Vec::new()),
            text: "hello".to_string(),
            audio: None,
        });
        app.translation_ready("lq/1.jpg", entry);
        let session = app.reader.as_ref().unwrap();
        assert!(!session.failed.contains(&key));
        assert!(session.show_message);
        assert!(session.current_entry().is_some());
    }
}
