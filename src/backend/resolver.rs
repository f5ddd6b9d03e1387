use crate::backend::chapters::{number_key, ChapterIndex, ChapterNumber};
use crate::backend::mangadex::Chapter;

/// The reader's position for chapter navigation: which chapter is open and
/// which translation language to prefer when stepping.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationCursor {
    pub selected_language: String,
    pub current_chapter_id: String,
}

impl NavigationCursor {
    pub fn new(chapter: &Chapter) -> Self {
        Self {
            selected_language: chapter.translated_language.clone(),
            current_chapter_id: chapter.id.clone(),
        }
    }

    /// Records an explicit navigation. The preferred language follows the
    /// visited chapter, so a cross-language fallback sticks for the next
    /// resolution.
    pub fn visit(&mut self, chapter: &Chapter) {
        self.current_chapter_id = chapter.id.clone();
        self.selected_language = chapter.translated_language.clone();
    }
}

/// Answers previous/next-chapter queries over a built [`ChapterIndex`].
///
/// Resolution never touches the network and never fails hard: an empty
/// index or an unknown current chapter yields `None`/`false`.
pub struct ChapterResolver<'a> {
    index: &'a ChapterIndex,
}

#[derive(Clone, Copy)]
enum Step {
    Back,
    Forward,
}

impl<'a> ChapterResolver<'a> {
    pub fn new(index: &'a ChapterIndex) -> Self {
        Self { index }
    }

    pub fn has_previous(&self, cursor: &NavigationCursor) -> bool {
        self.resolve(cursor, Step::Back).is_some()
    }

    pub fn has_next(&self, cursor: &NavigationCursor) -> bool {
        self.resolve(cursor, Step::Forward).is_some()
    }

    pub fn prev(&self, cursor: &NavigationCursor) -> Option<&'a Chapter> {
        self.resolve(cursor, Step::Back)
    }

    pub fn next(&self, cursor: &NavigationCursor) -> Option<&'a Chapter> {
        self.resolve(cursor, Step::Forward)
    }

    fn resolve(&self, cursor: &NavigationCursor, step: Step) -> Option<&'a Chapter> {
        let current = self.index.find_by_id(&cursor.current_chapter_id)?;
        let number = number_key(current);

        // Same-language step first: the reader keeps their translation as
        // long as that language has a release with an adjacent number.
        let in_language = self.index.numbers_for_language(&cursor.selected_language);
        if let Some(next_number) = adjacent(in_language, number, step) {
            if let Some(chapter) = self
                .index
                .lookup(&cursor.selected_language, next_number.raw())
            {
                return Some(chapter);
            }
        }

        // Gap in the selected language: fall back across all languages.
        // The returned chapter's language becomes the cursor's on visit.
        let next_number = adjacent(self.index.all_numbers(), number, step)?;
        self.index.lookup_any(next_number.raw())
    }
}

fn adjacent<'n>(numbers: &'n [ChapterNumber], current: &str, step: Step) -> Option<&'n ChapterNumber> {
    let pos = numbers.iter().position(|n| n.raw() == current)?;
    match step {
        Step::Back => pos.checked_sub(1).map(|p| &numbers[p]),
        Step::Forward => numbers.get(pos + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(id: &str, number: &str, lang: &str) -> Chapter {
        Chapter {
            id: id.to_string(),
            chapter: Some(number.to_string()),
            title: None,
            volume: None,
            translated_language: lang.to_string(),
            pages: 10,
            publish_at: None,
        }
    }

    fn cursor(index: &ChapterIndex, id: &str) -> NavigationCursor {
        NavigationCursor::new(index.find_by_id(id).unwrap())
    }

    #[test]
    fn test_next_prefers_selected_language() {
        let index = ChapterIndex::build(vec![
            chapter("en1", "1", "en"),
            chapter("en2", "2", "en"),
            chapter("fr15", "1.5", "fr"),
        ]);
        let resolver = ChapterResolver::new(&index);
        let cursor = cursor(&index, "en1");

        let next = resolver.next(&cursor).unwrap();
        assert_eq!(next.id, "en2");
        assert_eq!(next.translated_language, "en");
    }

    #[test]
    fn test_next_falls_back_across_languages_on_gap() {
        let index = ChapterIndex::build(vec![
            chapter("en1", "1", "en"),
            chapter("fr2", "2", "fr"),
        ]);
        let resolver = ChapterResolver::new(&index);
        let mut cursor = cursor(&index, "en1");

        let next = resolver.next(&cursor).unwrap();
        assert_eq!(next.id, "fr2");
        assert_eq!(next.translated_language, "fr");

        cursor.visit(next);
        assert_eq!(cursor.selected_language, "fr");
        assert_eq!(cursor.current_chapter_id, "fr2");
    }

    #[test]
    fn test_duplicate_number_across_languages_scenario() {
        let index = ChapterIndex::build(vec![
            chapter("c1en", "1", "en"),
            chapter("c1fr", "1", "fr"),
            chapter("c2fr", "2", "fr"),
        ]);
        let resolver = ChapterResolver::new(&index);
        let mut cursor = cursor(&index, "c1en");

        assert!(resolver.has_next(&cursor));
        let next = resolver.next(&cursor).unwrap();
        assert_eq!(next.id, "c2fr");

        cursor.visit(next);
        assert_eq!(cursor.selected_language, "fr");
    }

    #[test]
    fn test_terminal_chapters_resolve_to_none() {
        let index = ChapterIndex::build(vec![
            chapter("en1", "1", "en"),
            chapter("en2", "2", "en"),
        ]);
        let resolver = ChapterResolver::new(&index);

        let first = cursor(&index, "en1");
        assert!(!resolver.has_previous(&first));
        assert!(resolver.prev(&first).is_none());

        let last = cursor(&index, "en2");
        assert!(!resolver.has_next(&last));
        assert!(resolver.next(&last).is_none());
    }

    #[test]
    fn test_unknown_chapter_and_empty_index_never_panic() {
        let empty = ChapterIndex::build(Vec::new());
        let resolver = ChapterResolver::new(&empty);
        let cursor = NavigationCursor {
            selected_language: "en".to_string(),
            current_chapter_id: "missing".to_string(),
        };

        assert!(!resolver.has_next(&cursor));
        assert!(!resolver.has_previous(&cursor));
        assert!(resolver.next(&cursor).is_none());
        assert!(resolver.prev(&cursor).is_none());

        let index = ChapterIndex::build(vec![chapter("en1", "1", "en")]);
        let resolver = ChapterResolver::new(&index);
        assert!(resolver.next(&cursor).is_none());
    }

    #[test]
    fn test_prev_and_next_are_symmetric() {
        let index = ChapterIndex::build(vec![
            chapter("en1", "1", "en"),
            chapter("fr2", "2", "fr"),
            chapter("fr3", "3", "fr"),
        ]);
        let resolver = ChapterResolver::new(&index);
        let mut cursor = cursor(&index, "en1");

        let forward = resolver.next(&cursor).unwrap();
        cursor.visit(forward);
        let back = resolver.prev(&cursor).unwrap();
        cursor.visit(back);

        assert_eq!(cursor.current_chapter_id, "en1");
        assert_eq!(cursor.selected_language, "en");
    }

    #[test]
    fn test_non_numeric_numbers_participate_in_navigation() {
        let index = ChapterIndex::build(vec![
            chapter("en1", "1", "en"),
            chapter("oneshot", "Oneshot", "en"),
        ]);
        let resolver = ChapterResolver::new(&index);
        let cursor = cursor(&index, "en1");

        let next = resolver.next(&cursor).unwrap();
        assert_eq!(next.id, "oneshot");
    }
}
