mod backend;
mod ui;

use backend::history::JsonFileStore;
use backend::mangadex::{
    fetch_cover_image, fetch_page_image, get_chapter_pages, get_manga_chapters, get_popular_now,
    get_recently_updated, search_manga, Chapter, ChapterPages, Manga,
};
use backend::mlapi::MlServiceClient;
use backend::resolver::ChapterResolver;
use backend::translate::{CacheEntry, RequestKind, ServiceError, TranslationTtsCache};
use image::DynamicImage;
use ui::ui::{ui, App, Focus, Tab, View, AUTO_ADVANCE_SECS};

use crossterm::{
    event::{
        DisableMouseCapture, EnableMouseCapture, Event, EventStream, KeyCode, MouseButton,
        MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use log::warn;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::sync::Arc;
use std::time::{Duration, Instant};
use std::{error::Error, io};
use tokio::sync::mpsc;

enum BackgroundTask {
    CoverLoaded {
        manga_id: String,
        image: DynamicImage,
    },
    ChaptersLoaded {
        chapters: Vec<Chapter>,
    },
    PageUrlsLoaded {
        pages: ChapterPages,
    },
    PageImageLoaded {
        page_url: String,
        image: DynamicImage,
    },
    PageImageFailed {
        page_url: String,
    },
    SearchResults {
        results: Vec<Manga>,
    },
    TranslationDone {
        page_url: String,
        result: Result<Arc<CacheEntry>, ServiceError>,
    },
    TtsDone {
        page_url: String,
        result: Result<Arc<CacheEntry>, ServiceError>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let store = Arc::new(JsonFileStore::in_config_dir());
    let mut app = App::new(store);

    let ml = Arc::new(MlServiceClient::from_env());
    let cache = TranslationTtsCache::new(ml.clone(), ml.clone(), ml);

    // Create channel for background tasks
    let (task_tx, mut task_rx) = mpsc::unbounded_channel::<BackgroundTask>();

    app.set_loading("Connecting to MangaDex...");
    terminal.draw(|f| ui(f, &mut app))?;

    app.set_loading("Fetching recently updated manga...");
    terminal.draw(|f| ui(f, &mut app))?;

    let recent_manga = get_recently_updated().await.unwrap_or_default();

    app.set_loading("Fetching popular manga...");
    terminal.draw(|f| ui(f, &mut app))?;

    let popular_manga = get_popular_now().await.unwrap_or_default();

    app.recently_updated = recent_manga;
    app.popular_now = popular_manga;

    spawn_cover_loaders(&app.recently_updated, 0, 6, task_tx.clone());
    spawn_cover_loaders(&app.popular_now, 0, 6, task_tx.clone());

    app.set_ready();

    let res = run_app(&mut terminal, &mut app, &cache, &mut task_rx, task_tx).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("{err}");
    }
    Ok(())
}

fn spawn_cover_loaders(
    mangas: &[Manga],
    start: usize,
    count: usize,
    tx: mpsc::UnboundedSender<BackgroundTask>,
) {
    for manga in mangas.iter().skip(start).take(count) {
        let manga_id = manga.id.clone();
        let cover_url = manga.cover_url.clone();
        let tx = tx.clone();

        tokio::spawn(async move {
            if let Some(image) = fetch_cover_image(&cover_url).await {
                let _ = tx.send(BackgroundTask::CoverLoaded { manga_id, image });
            }
        });
    }
}

fn spawn_chapters_loader(manga_id: String, tx: mpsc::UnboundedSender<BackgroundTask>) {
    tokio::spawn(async move {
        match get_manga_chapters(&manga_id).await {
            Ok(chapters) => {
                let _ = tx.send(BackgroundTask::ChaptersLoaded { chapters });
            }
            Err(e) => warn!("Failed to fetch chapters for {manga_id}: {e}"),
        }
    });
}

fn spawn_page_urls_loader(chapter_id: String, tx: mpsc::UnboundedSender<BackgroundTask>) {
    tokio::spawn(async move {
        if let Some(pages) = get_chapter_pages(&chapter_id).await {
            let _ = tx.send(BackgroundTask::PageUrlsLoaded { pages });
        }
    });
}

fn spawn_page_image_loader(page_url: String, tx: mpsc::UnboundedSender<BackgroundTask>) {
    tokio::spawn(async move {
        match fetch_page_image(&page_url).await {
            Some(image) => {
                let _ = tx.send(BackgroundTask::PageImageLoaded { page_url, image });
            }
            None => {
                let _ = tx.send(BackgroundTask::PageImageFailed { page_url });
            }
        }
    });
}

fn spawn_search(query: String, tx: mpsc::UnboundedSender<BackgroundTask>) {
    tokio::spawn(async move {
        if let Ok(results) = search_manga(&query).await {
            let _ = tx.send(BackgroundTask::SearchResults { results });
        } else {
            let _ = tx.send(BackgroundTask::SearchResults { results: Vec::new() });
        }
    });
}

fn spawn_translation(
    cache: TranslationTtsCache,
    page_url: String,
    kind: RequestKind,
    tx: mpsc::UnboundedSender<BackgroundTask>,
) {
    tokio::spawn(async move {
        let result = match kind {
            RequestKind::Translate => cache.request_translation(&page_url).await,
            RequestKind::Tts => cache.request_tts(&page_url).await,
        };
        let task = match kind {
            RequestKind::Translate => BackgroundTask::TranslationDone { page_url, result },
            RequestKind::Tts => BackgroundTask::TtsDone { page_url, result },
        };
        let _ = tx.send(task);
    });
}

/// Fetches every visible page image that is not already on hand. If the
/// current page is present the transition settles immediately.
fn ensure_visible_pages(app: &mut App, tx: &mpsc::UnboundedSender<BackgroundTask>) {
    let Some(session) = &mut app.reader else {
        return;
    };

    let visible: Vec<String> = session.pages.visible_pages().to_vec();
    let current = session.pages.current_page_url().map(str::to_string);

    for url in visible {
        if !session.page_images.contains_key(&url) {
            spawn_page_image_loader(url, tx.clone());
        }
    }

    if let Some(url) = current {
        if session.page_images.contains_key(&url) {
            session.pages.settle();
        }
    }
}

/// Resolved prev/next navigation: updates cursor and history, resets the
/// per-chapter session (including the translation cache), and kicks off
/// the page-URL fetch for the new chapter.
async fn navigate_chapter(
    app: &mut App,
    cache: &TranslationTtsCache,
    forward: bool,
    tx: &mpsc::UnboundedSender<BackgroundTask>,
) {
    let target: Option<Chapter> = {
        let Some(session) = &app.reader else {
            return;
        };
        let resolver = ChapterResolver::new(&app.chapter_index);
        if forward {
            resolver.next(&session.cursor).cloned()
        } else {
            resolver.prev(&session.cursor).cloned()
        }
    };

    // Terminal chapter: the prompt renderer disables the control.
    let Some(chapter) = target else {
        return;
    };

    cache.clear().await;
    let chapter_id = chapter.id.clone();
    app.visit_chapter(chapter);
    spawn_page_urls_loader(chapter_id, tx.clone());
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    cache: &TranslationTtsCache,
    task_rx: &mut mpsc::UnboundedReceiver<BackgroundTask>,
    task_tx: mpsc::UnboundedSender<BackgroundTask>,
) -> io::Result<()> {
    let mut event_stream = EventStream::new();
    let mut pending_covers: std::collections::HashSet<String> = std::collections::HashSet::new();

    for manga in app.recently_updated.iter().take(6) {
        pending_covers.insert(manga.id.clone());
    }
    for manga in app.popular_now.iter().take(6) {
        pending_covers.insert(manga.id.clone());
    }

    const DEBOUNCE_MS: u64 = 300;

    loop {
        terminal.draw(|f| ui(f, app))?;

        // Debounced search
        if let Some(debounce_time) = app.search_debounce {
            if debounce_time.elapsed().as_millis() >= DEBOUNCE_MS as u128 {
                app.search_debounce = None;
                if !app.search_query.is_empty()
                    && !app.searching
                    && app.search_query != app.last_search_query
                {
                    app.searching = true;
                    app.last_search_query = app.search_query.clone();
                    spawn_search(app.search_query.clone(), task_tx.clone());
                }
            }
        }

        // End-of-chapter prompt: arm the countdown when the final page
        // comes on screen, advance when it runs out.
        let advance_due = {
            if let Some(session) = &mut app.reader {
                let at_end = session.pages.end_of_chapter_reached()
                    && !session.end_prompt_dismissed
                    && ChapterResolver::new(&app.chapter_index).has_next(&session.cursor);
                if at_end && session.auto_advance_deadline.is_none() {
                    session.auto_advance_deadline =
                        Some(Instant::now() + Duration::from_secs(AUTO_ADVANCE_SECS));
                }
                if !at_end {
                    session.auto_advance_deadline = None;
                }
                session
                    .auto_advance_deadline
                    .is_some_and(|d| Instant::now() >= d)
            } else {
                false
            }
        };
        if advance_due {
            navigate_chapter(app, cache, true, &task_tx).await;
            ensure_visible_pages(app, &task_tx);
        }

        tokio::select! {
            // Timeout to check debounce and countdown timers
            _ = tokio::time::sleep(Duration::from_millis(50)) => {}

            // Handle input events
            Some(Ok(event)) = event_stream.next() => {
                match event {
                    Event::Key(key) => {
                        match app.view {
                            View::Home => handle_home_input(app, key.code, &mut pending_covers, &task_tx),
                            View::MangaDetail => handle_detail_input(app, key.code, cache, &task_tx).await,
                            View::Reader => handle_reader_input(app, key.code, cache, &task_tx).await,
                        }

                        let typing_in_search = app.view == View::Home && app.tab == Tab::Search;
                        if key.code == KeyCode::Char('q') && !typing_in_search {
                            return Ok(());
                        }
                    }
                    Event::Mouse(mouse) => {
                        if app.view == View::Reader
                            && mouse.kind == MouseEventKind::Down(MouseButton::Left)
                        {
                            // Zone geometry comes from the live terminal
                            // size, never a cached one.
                            let viewport = terminal
                                .size()
                                .map(|s| (s.width, s.height))
                                .unwrap_or((0, 0));
                            handle_reader_click(app, mouse.column, mouse.row, viewport, &task_tx);
                        }
                    }
                    _ => {}
                }
            }

            // Handle background task results
            Some(task) = task_rx.recv() => {
                match task {
                    BackgroundTask::CoverLoaded { manga_id, image } => {
                        app.add_cover_image(&manga_id, image);
                        pending_covers.remove(&manga_id);
                    }
                    BackgroundTask::ChaptersLoaded { chapters } => {
                        app.set_chapters(chapters);
                    }
                    BackgroundTask::PageUrlsLoaded { pages } => {
                        app.set_chapter_pages(pages);
                        ensure_visible_pages(app, &task_tx);
                    }
                    BackgroundTask::PageImageLoaded { page_url, image } => {
                        app.add_page_image(&page_url, image);
                    }
                    BackgroundTask::PageImageFailed { page_url } => {
                        // Leave the placeholder up; release the guard so
                        // navigation is never stuck on a dead image.
                        warn!("Failed to load page image {page_url}");
                        if let Some(session) = &mut app.reader {
                            if session.pages.current_page_url() == Some(page_url.as_str()) {
                                session.pages.settle();
                            }
                        }
                    }
                    BackgroundTask::SearchResults { results } => {
                        app.search_results = results;
                        app.searching = false;
                        app.search_offset = 0;
                        spawn_cover_loaders(&app.search_results, 0, 6, task_tx.clone());
                        for manga in app.search_results.iter().take(6) {
                            pending_covers.insert(manga.id.clone());
                        }
                    }
                    BackgroundTask::TranslationDone { page_url, result } => match result {
                        Ok(entry) => app.translation_ready(&page_url, entry),
                        Err(e) => {
                            warn!("Translation failed for {page_url}: {e}");
                            app.request_failed(&page_url, RequestKind::Translate);
                        }
                    },
                    BackgroundTask::TtsDone { page_url, result } => match result {
                        Ok(entry) => app.tts_ready(&page_url, entry),
                        Err(e) => {
                            warn!("TTS failed for {page_url}: {e}");
                            app.request_failed(&page_url, RequestKind::Tts);
                        }
                    },
                }
            }
        }
    }
}

fn handle_home_input(
    app: &mut App,
    key: KeyCode,
    pending_covers: &mut std::collections::HashSet<String>,
    task_tx: &mpsc::UnboundedSender<BackgroundTask>,
) {
    match app.tab {
        Tab::Home => handle_home_tab_input(app, key, pending_covers, task_tx),
        Tab::Bookmarks => handle_bookmarks_tab_input(app, key, pending_covers, task_tx),
        Tab::Search => handle_search_tab_input(app, key, pending_covers, task_tx),
    }
}

fn handle_home_tab_input(
    app: &mut App,
    key: KeyCode,
    pending_covers: &mut std::collections::HashSet<String>,
    task_tx: &mpsc::UnboundedSender<BackgroundTask>,
) {
    match key {
        KeyCode::Tab | KeyCode::Down => {
            app.focus = match app.focus {
                Focus::Header => Focus::Recent,
                Focus::Recent => Focus::Popular,
                Focus::Popular => Focus::Header,
            }
        }
        KeyCode::Up => {
            app.focus = match app.focus {
                Focus::Header => Focus::Popular,
                Focus::Recent => Focus::Header,
                Focus::Popular => Focus::Recent,
            }
        }
        KeyCode::Left => match app.focus {
            Focus::Header => {
                app.tab = Tab::Search;
            }
            Focus::Recent => {
                app.recent_offset = app.recent_offset.saturating_sub(1);
            }
            Focus::Popular => {
                app.popular_offset = app.popular_offset.saturating_sub(1);
            }
        },
        KeyCode::Right => match app.focus {
            Focus::Header => {
                app.tab = Tab::Bookmarks;
            }
            Focus::Recent => {
                app.recent_offset += 1;
                preload_covers(
                    &app.recently_updated,
                    app.recent_offset,
                    pending_covers,
                    &app.image_states,
                    task_tx.clone(),
                );
            }
            Focus::Popular => {
                app.popular_offset += 1;
                preload_covers(
                    &app.popular_now,
                    app.popular_offset,
                    pending_covers,
                    &app.image_states,
                    task_tx.clone(),
                );
            }
        },
        KeyCode::Enter => {
            let manga = match app.focus {
                Focus::Recent => app.recently_updated.get(app.recent_offset).cloned(),
                Focus::Popular => app.popular_now.get(app.popular_offset).cloned(),
                Focus::Header => None,
            };

            if let Some(manga) = manga {
                let manga_id = manga.id.clone();
                app.open_manga(manga);
                spawn_chapters_loader(manga_id, task_tx.clone());
            }
        }
        _ => {}
    }
}

fn handle_bookmarks_tab_input(
    app: &mut App,
    key: KeyCode,
    pending_covers: &mut std::collections::HashSet<String>,
    task_tx: &mpsc::UnboundedSender<BackgroundTask>,
) {
    let bookmarked = app.bookmarks.get_bookmarked_manga();

    match key {
        KeyCode::Left => {
            if app.focus == Focus::Header {
                app.tab = Tab::Home;
            } else {
                app.bookmark_offset = app.bookmark_offset.saturating_sub(1);
            }
        }
        KeyCode::Right => {
            if app.focus == Focus::Header {
                app.tab = Tab::Search;
            } else if !bookmarked.is_empty() {
                let max_offset = bookmarked.len().saturating_sub(1);
                if app.bookmark_offset < max_offset {
                    app.bookmark_offset += 1;
                    preload_covers(
                        &bookmarked,
                        app.bookmark_offset,
                        pending_covers,
                        &app.image_states,
                        task_tx.clone(),
                    );
                }
            }
        }
        KeyCode::Tab | KeyCode::Down => {
            app.focus = Focus::Recent;
        }
        KeyCode::Up => {
            app.focus = Focus::Header;
        }
        KeyCode::Enter => {
            if app.focus != Focus::Header {
                if let Some(manga) = bookmarked.get(app.bookmark_offset).cloned() {
                    let manga_id = manga.id.clone();
                    app.open_manga(manga);
                    spawn_chapters_loader(manga_id, task_tx.clone());
                }
            }
        }
        _ => {}
    }
}

fn handle_search_tab_input(
    app: &mut App,
    key: KeyCode,
    pending_covers: &mut std::collections::HashSet<String>,
    task_tx: &mpsc::UnboundedSender<BackgroundTask>,
) {
    match key {
        KeyCode::Char(c) => {
            app.search_query.push(c);
            app.search_debounce = Some(Instant::now());
        }
        KeyCode::Backspace => {
            app.search_query.pop();
            if app.search_query.is_empty() {
                app.search_results.clear();
                app.last_search_query.clear();
                app.search_debounce = None;
            } else {
                app.search_debounce = Some(Instant::now());
            }
        }
        KeyCode::Enter => {
            if app.focus == Focus::Header {
                // Immediate search on Enter
                if !app.search_query.is_empty() && !app.searching {
                    app.searching = true;
                    app.last_search_query = app.search_query.clone();
                    app.search_debounce = None;
                    spawn_search(app.search_query.clone(), task_tx.clone());
                }
            } else if let Some(manga) = app.search_results.get(app.search_offset).cloned() {
                let manga_id = manga.id.clone();
                app.open_manga(manga);
                spawn_chapters_loader(manga_id, task_tx.clone());
            }
        }
        KeyCode::Left => {
            if app.focus == Focus::Header {
                app.tab = Tab::Bookmarks;
            } else {
                app.search_offset = app.search_offset.saturating_sub(1);
            }
        }
        KeyCode::Right => {
            if app.focus == Focus::Header {
                app.tab = Tab::Home;
            } else if !app.search_results.is_empty() {
                let max_offset = app.search_results.len().saturating_sub(1);
                if app.search_offset < max_offset {
                    app.search_offset += 1;
                    preload_covers(
                        &app.search_results,
                        app.search_offset,
                        pending_covers,
                        &app.image_states,
                        task_tx.clone(),
                    );
                }
            }
        }
        KeyCode::Tab | KeyCode::Down => {
            app.focus = Focus::Recent;
        }
        KeyCode::Up => {
            app.focus = Focus::Header;
        }
        KeyCode::Esc => {
            if app.focus != Focus::Header {
                app.focus = Focus::Header;
            } else {
                app.search_query.clear();
                app.search_results.clear();
            }
        }
        _ => {}
    }
}

async fn handle_detail_input(
    app: &mut App,
    key: KeyCode,
    cache: &TranslationTtsCache,
    task_tx: &mpsc::UnboundedSender<BackgroundTask>,
) {
    match key {
        KeyCode::Esc => {
            app.go_back();
        }
        KeyCode::Up => app.detail_select_up(),
        KeyCode::Down => app.detail_select_down(),
        KeyCode::Enter => {
            if let Some(chapter) = app.selected_chapter().cloned() {
                // A new chapter opens a new reading session; yesterday's
                // translations do not carry over.
                cache.clear().await;
                let chapter_id = chapter.id.clone();
                app.open_reader(chapter);
                spawn_page_urls_loader(chapter_id, task_tx.clone());
            }
        }
        KeyCode::Char('b') => {
            if let Some(manga) = app.selected_manga.clone() {
                app.bookmarks.toggle(&manga);
            }
        }
        _ => {}
    }
}

async fn handle_reader_input(
    app: &mut App,
    key: KeyCode,
    cache: &TranslationTtsCache,
    task_tx: &mpsc::UnboundedSender<BackgroundTask>,
) {
    use backend::reader::{Layout, Quality};

    match key {
        KeyCode::Esc => {
            let dismissed_prompt = app.reader.as_mut().is_some_and(|session| {
                if session.auto_advance_deadline.is_some() {
                    session.auto_advance_deadline = None;
                    session.end_prompt_dismissed = true;
                    true
                } else {
                    false
                }
            });
            if !dismissed_prompt {
                app.go_back();
            }
        }
        KeyCode::Left | KeyCode::Right => {
            let mut changed = false;
            if let Some(session) = &mut app.reader {
                if let Some(action) = session.router.action_for_key(key) {
                    if session.router.apply(action, &mut session.pages) {
                        session.end_prompt_dismissed = false;
                        changed = true;
                    }
                }
            }
            if changed {
                ensure_visible_pages(app, task_tx);
            }
        }
        KeyCode::Char('t') => request_page_job(app, cache, RequestKind::Translate, task_tx),
        KeyCode::Char('s') => request_page_job(app, cache, RequestKind::Tts, task_tx),
        KeyCode::Char('o') => {
            if let Some(session) = &mut app.reader {
                session.show_overlay = !session.show_overlay;
            }
        }
        KeyCode::Char('m') => {
            if let Some(session) = &mut app.reader {
                session.show_message = !session.show_message;
            }
        }
        KeyCode::Char('1') => {
            if let Some(session) = &mut app.reader {
                session.pages.set_panels(1);
            }
            ensure_visible_pages(app, task_tx);
        }
        KeyCode::Char('2') => {
            if let Some(session) = &mut app.reader {
                session.pages.set_panels(2);
            }
            ensure_visible_pages(app, task_tx);
        }
        KeyCode::Char('l') => {
            if let Some(session) = &mut app.reader {
                let layout = match session.pages.layout() {
                    Layout::Horizontal => Layout::Vertical,
                    Layout::Vertical => Layout::Horizontal,
                };
                session.pages.set_layout(layout);
            }
        }
        KeyCode::Char('d') => {
            if let Some(session) = &mut app.reader {
                let quality = match session.pages.quality() {
                    Quality::Low => Quality::High,
                    Quality::High => Quality::Low,
                };
                session.pages.set_quality(quality);
            }
            ensure_visible_pages(app, task_tx);
        }
        KeyCode::Char('n') => {
            navigate_chapter(app, cache, true, task_tx).await;
            ensure_visible_pages(app, task_tx);
        }
        KeyCode::Char('p') => {
            navigate_chapter(app, cache, false, task_tx).await;
            ensure_visible_pages(app, task_tx);
        }
        _ => {}
    }
}

fn handle_reader_click(
    app: &mut App,
    column: u16,
    row: u16,
    viewport: (u16, u16),
    task_tx: &mpsc::UnboundedSender<BackgroundTask>,
) {
    let mut changed = false;
    if let Some(session) = &mut app.reader {
        let strip = session.tab_strip;
        if let Some(action) = session.router.action_for_click(column, row, viewport, strip) {
            if session.router.apply(action, &mut session.pages) {
                session.end_prompt_dismissed = false;
                changed = true;
            }
        }
    }
    if changed {
        ensure_visible_pages(app, task_tx);
    }
}

/// Explicit translate/speak request for the current page. Already-pending
/// and already-ready states short-circuit in the cache; a prior failure is
/// retried because this is a fresh user action.
fn request_page_job(
    app: &mut App,
    cache: &TranslationTtsCache,
    kind: RequestKind,
    task_tx: &mpsc::UnboundedSender<BackgroundTask>,
) {
    let Some(session) = &mut app.reader else {
        return;
    };
    let Some(url) = session.pages.current_page_url().map(str::to_string) else {
        return;
    };

    let key = (url.clone(), kind);
    if session.pending.contains(&key) {
        return;
    }
    session.pending.insert(key.clone());
    session.failed.remove(&key);
    spawn_translation(cache.clone(), url, kind, task_tx.clone());
}

fn preload_covers(
    mangas: &[Manga],
    offset: usize,
    pending: &mut std::collections::HashSet<String>,
    loaded: &std::collections::HashMap<String, ratatui_image::protocol::StatefulProtocol>,
    tx: mpsc::UnboundedSender<BackgroundTask>,
) {
    for manga in mangas.iter().skip(offset).take(8) {
        if !loaded.contains_key(&manga.id) && !pending.contains(&manga.id) {
            pending.insert(manga.id.clone());
            let manga_id = manga.id.clone();
            let cover_url = manga.cover_url.clone();
            let tx = tx.clone();

            tokio::spawn(async move {
                if let Some(image) = fetch_cover_image(&cover_url).await {
                    let _ = tx.send(BackgroundTask::CoverLoaded { manga_id, image });
                }
            });
        }
    }
}
