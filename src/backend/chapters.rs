use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::backend::mangadex::Chapter;

/// Sentinel number for chapters the provider shipped without a `chapter`
/// attribute. Sorts after every numeric chapter.
pub const NO_CHAPTER: &str = "No Chapter";
/// Sentinel volume for chapters without a `volume` attribute.
pub const NO_VOLUME: &str = "No Volume";

/// A distinct chapter number as released: the raw provider string plus its
/// numeric parse. Non-numeric values carry NaN and order after all numeric
/// ones, keeping their relative input order.
#[derive(Debug, Clone)]
pub struct ChapterNumber {
    raw: String,
    value: f64,
}

impl ChapterNumber {
    fn new(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            value: parse_number(raw),
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

impl PartialEq for ChapterNumber {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

fn parse_number(raw: &str) -> f64 {
    raw.trim().parse::<f64>().unwrap_or(f64::NAN)
}

fn compare_values(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        // Equal keeps the stable sort from reordering non-numeric entries.
        (true, true) => Ordering::Equal,
    }
}

/// Chapters sharing one number inside a volume, across scanlation groups
/// and languages.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterGroup {
    pub number: String,
    /// Indices into [`ChapterIndex::chapters`], input order preserved.
    pub chapter_indices: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeGroup {
    pub volume: String,
    pub groups: Vec<ChapterGroup>,
}

/// Ordered, de-duplicated view of a manga's chapter list.
///
/// Built once per fetched list and never mutated; a refreshed list gets a
/// fresh build. The result is independent of input order up to the
/// first-record tie-break, and stable across rebuilds of the same input.
#[derive(Debug, Default)]
pub struct ChapterIndex {
    chapters: Vec<Chapter>,
    by_language: HashMap<String, Vec<ChapterNumber>>,
    all: Vec<ChapterNumber>,
    by_volume: Vec<VolumeGroup>,
    first_for_pair: HashMap<(String, String), usize>,
    first_for_number: HashMap<String, usize>,
}

impl ChapterIndex {
    pub fn build(chapters: Vec<Chapter>) -> Self {
        let mut by_language: HashMap<String, Vec<ChapterNumber>> = HashMap::new();
        let mut seen_per_language: HashMap<String, HashSet<String>> = HashMap::new();
        let mut all: Vec<ChapterNumber> = Vec::new();
        let mut seen_all: HashSet<String> = HashSet::new();
        let mut first_for_pair: HashMap<(String, String), usize> = HashMap::new();
        let mut first_for_number: HashMap<String, usize> = HashMap::new();

        for (idx, chapter) in chapters.iter().enumerate() {
            let number = number_key(chapter).to_string();
            let language = chapter.translated_language.clone();

            if seen_all.insert(number.clone()) {
                all.push(ChapterNumber::new(&number));
            }
            let seen = seen_per_language.entry(language.clone()).or_default();
            if seen.insert(number.clone()) {
                by_language
                    .entry(language.clone())
                    .or_default()
                    .push(ChapterNumber::new(&number));
            }

            first_for_pair
                .entry((language, number.clone()))
                .or_insert(idx);
            first_for_number.entry(number).or_insert(idx);
        }

        for numbers in by_language.values_mut() {
            numbers.sort_by(|a, b| compare_values(a.value, b.value));
        }
        all.sort_by(|a, b| compare_values(a.value, b.value));

        let by_volume = group_by_volume(&chapters);

        Self {
            chapters,
            by_language,
            all,
            by_volume,
            first_for_pair,
            first_for_number,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn chapter(&self, idx: usize) -> Option<&Chapter> {
        self.chapters.get(idx)
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.id == id)
    }

    /// Distinct chapter numbers released in `language`, ascending.
    pub fn numbers_for_language(&self, language: &str) -> &[ChapterNumber] {
        self.by_language
            .get(language)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Distinct chapter numbers across every language, ascending.
    pub fn all_numbers(&self) -> &[ChapterNumber] {
        &self.all
    }

    pub fn languages(&self) -> Vec<&str> {
        let mut languages: Vec<&str> = self.by_language.keys().map(String::as_str).collect();
        languages.sort_unstable();
        languages
    }

    /// First chapter record released as `number` in `language`.
    pub fn lookup(&self, language: &str, number: &str) -> Option<&Chapter> {
        self.first_for_pair
            .get(&(language.to_string(), number.to_string()))
            .and_then(|&idx| self.chapters.get(idx))
    }

    /// First chapter record released as `number` in any language.
    pub fn lookup_any(&self, number: &str) -> Option<&Chapter> {
        self.first_for_number
            .get(number)
            .and_then(|&idx| self.chapters.get(idx))
    }

    /// Volume-grouped view for the chapter list: volumes ascending with the
    /// missing-volume sentinel last, chapter groups ascending within each.
    pub fn by_volume(&self) -> &[VolumeGroup] {
        &self.by_volume
    }
}

/// The grouping key for a chapter's number; missing numbers collapse onto
/// the sentinel but still participate in every ordering.
pub fn number_key(chapter: &Chapter) -> &str {
    chapter.chapter.as_deref().unwrap_or(NO_CHAPTER)
}

fn group_by_volume(chapters: &[Chapter]) -> Vec<VolumeGroup> {
    let mut volumes: Vec<VolumeGroup> = Vec::new();
    let mut volume_slots: HashMap<String, usize> = HashMap::new();

    for (idx, chapter) in chapters.iter().enumerate() {
        let volume = chapter.volume.as_deref().unwrap_or(NO_VOLUME).to_string();
        let number = number_key(chapter).to_string();

        let slot = *volume_slots.entry(volume.clone()).or_insert_with(|| {
            volumes.push(VolumeGroup {
                volume,
                groups: Vec::new(),
            });
            volumes.len() - 1
        });

        let groups = &mut volumes[slot].groups;
        match groups.iter_mut().find(|g| g.number == number) {
            Some(group) => group.chapter_indices.push(idx),
            None => groups.push(ChapterGroup {
                number,
                chapter_indices: vec![idx],
            }),
        }
    }

    for volume in &mut volumes {
        volume.groups.sort_by(|a, b| {
            let (av, bv) = (parse_number(&a.number), parse_number(&b.number));
            if av.is_nan() || bv.is_nan() {
                a.number.cmp(&b.number)
            } else {
                compare_values(av, bv)
            }
        });
    }

    volumes.sort_by(|a, b| match (a.volume == NO_VOLUME, b.volume == NO_VOLUME) {
        (false, false) => compare_values(parse_number(&a.volume), parse_number(&b.volume)),
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        (true, true) => Ordering::Equal,
    });

    volumes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(id: &str, number: Option<&str>, volume: Option<&str>, lang: &str) -> Chapter {
        Chapter {
            id: id.to_string(),
            chapter: number.map(str::to_string),
            title: None,
            volume: volume.map(str::to_string),
            translated_language: lang.to_string(),
            pages: 10,
            publish_at: None,
        }
    }

    #[test]
    fn test_orderings_are_ascending_by_parsed_value() {
        let index = ChapterIndex::build(vec![
            chapter("a", Some("10"), None, "en"),
            chapter("b", Some("2"), None, "en"),
            chapter("c", Some("1.5"), None, "en"),
            chapter("d", Some("1"), None, "fr"),
        ]);

        let en: Vec<&str> = index
            .numbers_for_language("en")
            .iter()
            .map(ChapterNumber::raw)
            .collect();
        assert_eq!(en, vec!["1.5", "2", "10"]);

        let all: Vec<&str> = index.all_numbers().iter().map(ChapterNumber::raw).collect();
        assert_eq!(all, vec!["1", "1.5", "2", "10"]);
    }

    #[test]
    fn test_non_numeric_numbers_sort_last_in_input_order() {
        let index = ChapterIndex::build(vec![
            chapter("a", Some("Oneshot"), None, "en"),
            chapter("b", Some("3"), None, "en"),
            chapter("c", Some("Extra"), None, "en"),
            chapter("d", None, None, "en"),
            chapter("e", Some("1"), None, "en"),
        ]);

        let en: Vec<&str> = index
            .numbers_for_language("en")
            .iter()
            .map(ChapterNumber::raw)
            .collect();
        assert_eq!(en, vec!["1", "3", "Oneshot", "Extra", NO_CHAPTER]);
    }

    #[test]
    fn test_duplicate_numbers_are_deduplicated_per_grouping() {
        let index = ChapterIndex::build(vec![
            chapter("a", Some("1"), None, "en"),
            chapter("b", Some("1"), None, "en"),
            chapter("c", Some("1"), None, "fr"),
        ]);

        assert_eq!(index.numbers_for_language("en").len(), 1);
        assert_eq!(index.numbers_for_language("fr").len(), 1);
        assert_eq!(index.all_numbers().len(), 1);
    }

    #[test]
    fn test_lookup_returns_first_record_for_pair() {
        let index = ChapterIndex::build(vec![
            chapter("first", Some("1"), None, "en"),
            chapter("second", Some("1"), None, "en"),
            chapter("french", Some("1"), None, "fr"),
        ]);

        assert_eq!(index.lookup("en", "1").map(|c| c.id.as_str()), Some("first"));
        assert_eq!(index.lookup("fr", "1").map(|c| c.id.as_str()), Some("french"));
        assert_eq!(index.lookup_any("1").map(|c| c.id.as_str()), Some("first"));
        assert!(index.lookup("de", "1").is_none());
    }

    #[test]
    fn test_rebuild_of_same_input_is_stable() {
        let input = vec![
            chapter("a", Some("2"), None, "en"),
            chapter("b", None, None, "en"),
            chapter("c", Some("Bonus"), None, "en"),
            chapter("d", Some("1"), None, "fr"),
        ];

        let first = ChapterIndex::build(input.clone());
        let second = ChapterIndex::build(input);

        assert_eq!(first.all_numbers(), second.all_numbers());
        assert_eq!(
            first.numbers_for_language("en"),
            second.numbers_for_language("en")
        );
        assert_eq!(first.by_volume(), second.by_volume());
    }

    #[test]
    fn test_volume_grouping_places_sentinels_last() {
        let index = ChapterIndex::build(vec![
            chapter("a", Some("5"), None, "en"),
            chapter("b", Some("1"), Some("1"), "en"),
            chapter("c", Some("12"), Some("2"), "en"),
            chapter("d", None, Some("2"), "en"),
        ]);

        let volumes: Vec<&str> = index
            .by_volume()
            .iter()
            .map(|v| v.volume.as_str())
            .collect();
        assert_eq!(volumes, vec!["1", "2", NO_VOLUME]);

        let vol2 = &index.by_volume()[1];
        let numbers: Vec<&str> = vol2.groups.iter().map(|g| g.number.as_str()).collect();
        assert_eq!(numbers, vec!["12", NO_CHAPTER]);
    }

    #[test]
    fn test_volume_grouping_collects_languages_under_one_number() {
        let index = ChapterIndex::build(vec![
            chapter("a", Some("1"), Some("1"), "en"),
            chapter("b", Some("1"), Some("1"), "fr"),
        ]);

        let groups = &index.by_volume()[0].groups;
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].chapter_indices, vec![0, 1]);
    }

    #[test]
    fn test_empty_input_builds_empty_index() {
        let index = ChapterIndex::build(Vec::new());
        assert!(index.is_empty());
        assert!(index.all_numbers().is_empty());
        assert!(index.numbers_for_language("en").is_empty());
        assert!(index.lookup_any("1").is_none());
    }
}
