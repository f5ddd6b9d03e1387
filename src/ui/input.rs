use crossterm::event::KeyCode;

use crate::backend::reader::PageSetController;

/// A resolved reader input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderAction {
    PrevPage,
    NextPage,
    GoToPage(usize),
}

/// Geometry of the page-tab strip as rendered this frame, so a click on a
/// tab can be mapped back to its page index.
#[derive(Debug, Clone, Copy)]
pub struct TabStrip {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub page_count: usize,
}

/// Maps pointer and keyboard input onto page-set transitions.
///
/// One router is created when the reader view opens and dropped with it,
/// so its handling cannot outlive the view. Click-zone geometry is derived
/// from the viewport dimensions carried by each event; nothing is cached
/// across a resize.
#[derive(Debug, Default)]
pub struct InputEventRouter;

// Dead bands around the click zones, as fractions of the viewport.
const TOP_BAND_DIVISOR: f32 = 5.5;
const BOTTOM_BAND_START: f32 = 0.9;

impl InputEventRouter {
    pub fn new() -> Self {
        Self
    }

    pub fn action_for_key(&self, code: KeyCode) -> Option<ReaderAction> {
        match code {
            KeyCode::Left => Some(ReaderAction::PrevPage),
            KeyCode::Right => Some(ReaderAction::NextPage),
            _ => None,
        }
    }

    /// Resolves a click at (`column`, `row`) against the live viewport.
    /// The tab strip wins over the page zones when the click lands on it.
    pub fn action_for_click(
        &self,
        column: u16,
        row: u16,
        viewport: (u16, u16),
        tab_strip: Option<TabStrip>,
    ) -> Option<ReaderAction> {
        if let Some(strip) = tab_strip {
            if let Some(page) = tab_index_at(column, row, strip) {
                return Some(ReaderAction::GoToPage(page));
            }
        }
        click_zone(column, row, viewport)
    }

    /// Applies an action; the controller's in-flight guard decides whether
    /// it takes effect. Returns whether the page set changed.
    pub fn apply(&self, action: ReaderAction, pages: &mut PageSetController) -> bool {
        match action {
            ReaderAction::PrevPage => pages.prev(),
            ReaderAction::NextPage => pages.next(),
            ReaderAction::GoToPage(index) => pages.go_to_index(index),
        }
    }
}

/// Click zoning: the left third steps back, the right third steps
/// forward; the middle third and the top/bottom bands are dead.
fn click_zone(column: u16, row: u16, viewport: (u16, u16)) -> Option<ReaderAction> {
    let (width, height) = viewport;
    if width == 0 || height == 0 {
        return None;
    }

    let (col, row) = (f32::from(column), f32::from(row));
    let (w, h) = (f32::from(width), f32::from(height));

    if row < h / TOP_BAND_DIVISOR || row > h * BOTTOM_BAND_START {
        return None;
    }

    if col < w / 3.0 {
        Some(ReaderAction::PrevPage)
    } else if col > w * 2.0 / 3.0 {
        Some(ReaderAction::NextPage)
    } else {
        None
    }
}

fn tab_index_at(column: u16, row: u16, strip: TabStrip) -> Option<usize> {
    if strip.page_count == 0 || strip.width == 0 {
        return None;
    }
    if row != strip.y || column < strip.x || column >= strip.x + strip.width {
        return None;
    }
    let offset = usize::from(column - strip.x);
    let index = offset * strip.page_count / usize::from(strip.width);
    Some(index.min(strip.page_count - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mangadex::ChapterPages;

    const VIEWPORT: (u16, u16) = (120, 40);

    fn router() -> InputEventRouter {
        InputEventRouter::new()
    }

    #[test]
    fn test_left_and_right_thirds_map_to_page_steps() {
        let r = router();
        assert_eq!(
            r.action_for_click(10, 20, VIEWPORT, None),
            Some(ReaderAction::PrevPage)
        );
        assert_eq!(
            r.action_for_click(110, 20, VIEWPORT, None),
            Some(ReaderAction::NextPage)
        );
    }

    #[test]
    fn test_middle_third_and_outer_bands_are_dead() {
        let r = router();
        // middle third
        assert_eq!(r.action_for_click(60, 20, VIEWPORT, None), None);
        // top band
        assert_eq!(r.action_for_click(10, 2, VIEWPORT, None), None);
        // bottom band
        assert_eq!(r.action_for_click(10, 39, VIEWPORT, None), None);
    }

    #[test]
    fn test_zones_follow_the_live_viewport() {
        let r = router();
        // Column 50 is in the middle of a 120-wide viewport but in the
        // right third once the terminal shrinks.
        assert_eq!(r.action_for_click(50, 20, (120, 40), None), None);
        assert_eq!(
            r.action_for_click(50, 10, (60, 24), None),
            Some(ReaderAction::NextPage)
        );
    }

    #[test]
    fn test_arrow_keys_map_to_page_steps() {
        let r = router();
        assert_eq!(
            r.action_for_key(KeyCode::Left),
            Some(ReaderAction::PrevPage)
        );
        assert_eq!(
            r.action_for_key(KeyCode::Right),
            Some(ReaderAction::NextPage)
        );
        assert_eq!(r.action_for_key(KeyCode::Char('x')), None);
    }

    #[test]
    fn test_tab_strip_click_selects_page() {
        let r = router();
        let strip = TabStrip {
            x: 10,
            y: 38,
            width: 100,
            page_count: 10,
        };

        assert_eq!(
            r.action_for_click(10, 38, VIEWPORT, Some(strip)),
            Some(ReaderAction::GoToPage(0))
        );
        assert_eq!(
            r.action_for_click(109, 38, VIEWPORT, Some(strip)),
            Some(ReaderAction::GoToPage(9))
        );
        assert_eq!(
            r.action_for_click(55, 38, VIEWPORT, Some(strip)),
            Some(ReaderAction::GoToPage(4))
        );

        // Off the strip row, the click falls through to the zones.
        assert_eq!(r.action_for_click(55, 20, VIEWPORT, Some(strip)), None);
    }

    #[test]
    fn test_apply_respects_the_transition_guard() {
        let r = router();
        let mut pages = PageSetController::new(ChapterPages {
            data: (0..5).map(|i| format!("{i}.png")).collect(),
            data_saver: (0..5).map(|i| format!("{i}.jpg")).collect(),
        });

        assert!(r.apply(ReaderAction::NextPage, &mut pages));
        // Same control again before the transition settles: dropped.
        assert!(!r.apply(ReaderAction::NextPage, &mut pages));
        assert_eq!(pages.current_index(), 1);

        pages.settle();
        assert!(r.apply(ReaderAction::NextPage, &mut pages));
        assert_eq!(pages.current_index(), 2);
    }
}
