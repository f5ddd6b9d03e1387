use crate::backend::mangadex::ChapterPages;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    #[default]
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
    #[default]
    Low,
    High,
}

/// Which control issued a navigation. A second request from the same
/// control is dropped while its transition is still in flight, so a burst
/// of repeated input cannot double-advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavControl {
    Back,
    Forward,
    Jump,
}

/// Page cursor for the open chapter.
///
/// Holds the page URL arrays for both qualities, the current index, the
/// panel count and layout, and the in-flight transition guard. All reads
/// of the visible slice go through this state, so an index update and the
/// panel/quality that frame it are always observed together.
#[derive(Debug)]
pub struct PageSetController {
    pages: ChapterPages,
    current_index: usize,
    panels: usize,
    layout: Layout,
    quality: Quality,
    in_flight: Option<NavControl>,
}

impl Default for PageSetController {
    fn default() -> Self {
        Self::new(ChapterPages::default())
    }
}

impl PageSetController {
    pub fn new(pages: ChapterPages) -> Self {
        Self {
            pages,
            current_index: 0,
            panels: 1,
            layout: Layout::Horizontal,
            quality: Quality::Low,
            in_flight: None,
        }
    }

    fn active_pages(&self) -> &[String] {
        match self.quality {
            Quality::Low => &self.pages.data_saver,
            Quality::High => &self.pages.data,
        }
    }

    pub fn page_count(&self) -> usize {
        self.active_pages().len()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn panels(&self) -> usize {
        self.panels
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn is_transitioning(&self) -> bool {
        self.in_flight.is_some()
    }

    /// The page URLs currently on screen: `panels` entries starting at the
    /// cursor, short only for the final odd page.
    pub fn visible_pages(&self) -> &[String] {
        let pages = self.active_pages();
        if pages.is_empty() {
            return &[];
        }
        let start = self.current_index.min(pages.len() - 1);
        let end = (start + self.panels).min(pages.len());
        &pages[start..end]
    }

    pub fn current_page_url(&self) -> Option<&str> {
        self.active_pages().get(self.current_index).map(String::as_str)
    }

    /// True once the visible slice reaches the final page; the shell uses
    /// this to offer the resolved next chapter.
    pub fn end_of_chapter_reached(&self) -> bool {
        let len = self.page_count();
        len > 0 && self.current_index + self.panels >= len
    }

    fn accept(&mut self, control: NavControl, target: usize) -> bool {
        if self.in_flight == Some(control) {
            return false;
        }
        self.current_index = target;
        self.in_flight = Some(control);
        true
    }

    /// Releases the transition guard. Called once the newly visible page
    /// has been handed to the renderer.
    pub fn settle(&mut self) {
        self.in_flight = None;
    }

    /// Jump to an absolute page, clamped into range. Returns whether the
    /// jump was accepted.
    pub fn go_to_index(&mut self, index: usize) -> bool {
        let len = self.page_count();
        if len == 0 {
            return false;
        }
        self.accept(NavControl::Jump, index.min(len - 1))
    }

    /// Advance by `panels`. Wraps to the first page past the end rather
    /// than dead-ending the reader.
    pub fn next(&mut self) -> bool {
        let len = self.page_count();
        if len == 0 {
            return false;
        }
        let target = if self.current_index + self.panels >= len {
            0
        } else {
            self.current_index + self.panels
        };
        self.accept(NavControl::Forward, target)
    }

    /// Retreat by `panels`. Two-panel mode clamps the first pair to page
    /// zero; single-panel mode wraps from page zero to the tail.
    pub fn prev(&mut self) -> bool {
        let len = self.page_count();
        if len == 0 {
            return false;
        }
        let target = if self.panels == 2 {
            if self.current_index <= 1 {
                0
            } else {
                self.current_index - 2
            }
        } else if self.current_index == 0 {
            len.saturating_sub(self.panels)
        } else {
            self.current_index - 1
        };
        self.accept(NavControl::Back, target)
    }

    pub fn set_panels(&mut self, panels: usize) {
        self.panels = panels.clamp(1, 2);
    }

    pub fn set_layout(&mut self, layout: Layout) {
        self.layout = layout;
    }

    /// Swaps the URL source array. The logical page stays put; only the
    /// index is re-clamped in case the variants differ in length.
    pub fn set_quality(&mut self, quality: Quality) {
        self.quality = quality;
        let len = self.page_count();
        if len > 0 && self.current_index >= len {
            self.current_index = len - 1;
        }
    }
}
