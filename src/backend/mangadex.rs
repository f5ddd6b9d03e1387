use image::DynamicImage;
use reqwest::Error;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Cursor;

const BASE_URL: &str = "https://api.mangadex.org";
const FEED_PAGE_LIMIT: usize = 500;

/// One published, language-specific release of a numbered installment.
/// `chapter` and `volume` are normalized at ingestion: empty strings from the
/// API become `None` so downstream grouping only has one "missing" shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    pub id: String,
    pub chapter: Option<String>,
    pub title: Option<String>,
    pub volume: Option<String>,
    pub translated_language: String,
    pub pages: usize,
    pub publish_at: Option<String>,
}

/// Page URL collections for one chapter: full-quality `data` and the
/// bandwidth-saver `data_saver` variant, index-aligned.
#[derive(Debug, Clone, Default)]
pub struct ChapterPages {
    pub data: Vec<String>,
    pub data_saver: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ChapterResponse {
    data: Vec<ChapterData>,
    total: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ChapterData {
    id: String,
    attributes: ChapterAttributes,
}

#[derive(Debug, Deserialize)]
struct ChapterAttributes {
    chapter: Option<String>,
    title: Option<String>,
    volume: Option<String>,
    pages: usize,
    #[serde(rename = "translatedLanguage")]
    translated_language: Option<String>,
    #[serde(rename = "publishAt")]
    publish_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtHomeResponse {
    #[serde(rename = "baseUrl")]
    base_url: String,
    chapter: AtHomeChapter,
}

#[derive(Debug, Deserialize)]
struct AtHomeChapter {
    hash: String,
    data: Vec<String>,
    #[serde(rename = "dataSaver")]
    data_saver: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Manga {
    pub id: String,
    pub title: String,
    pub author: String,
    pub artist: String,
    pub status: String,
    pub description: String,
    pub cover_url: String,
}

#[derive(Debug, Deserialize)]
struct MangaResponse {
    data: Vec<MangaData>,
}

#[derive(Debug, Deserialize)]
struct MangaData {
    id: String,
    attributes: MangaAttributes,
    relationships: Vec<Relationship>,
}

#[derive(Debug, Deserialize)]
struct MangaAttributes {
    title: HashMap<String, String>,
    status: Option<String>,
    description: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct Relationship {
    #[serde(rename = "type")]
    rel_type: String,
    attributes: Option<RelationshipAttributes>,
}

#[derive(Debug, Deserialize)]
struct RelationshipAttributes {
    name: Option<String>,
    #[serde(rename = "fileName")]
    file_name: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_chapter(data: ChapterData) -> Chapter {
    Chapter {
        id: data.id,
        chapter: non_empty(data.attributes.chapter),
        title: non_empty(data.attributes.title),
        volume: non_empty(data.attributes.volume),
        // Missing language is tolerated with an empty sentinel; the
        // resolver degrades instead of rejecting the record.
        translated_language: data.attributes.translated_language.unwrap_or_default(),
        pages: data.attributes.pages,
        publish_at: data.attributes.publish_at,
    }
}

fn parse_manga_list(response: MangaResponse) -> Vec<Manga> {
    response
        .data
        .into_iter()
        .map(|m| {
            let mut author = String::new();
            let mut artist = String::new();
            let mut cover_filename = String::new();

            for rel in &m.relationships {
                let Some(attrs) = &rel.attributes else {
                    continue;
                };
                match rel.rel_type.as_str() {
                    "author" => author = attrs.name.clone().unwrap_or_default(),
                    "artist" => artist = attrs.name.clone().unwrap_or_default(),
                    "cover_art" => cover_filename = attrs.file_name.clone().unwrap_or_default(),
                    _ => {}
                }
            }

            let cover_url = if !cover_filename.is_empty() {
                format!(
                    "https://uploads.mangadex.org/covers/{}/{}",
                    m.id, cover_filename
                )
            } else {
                String::new()
            };

            let title = m
                .attributes
                .title
                .get("en")
                .or_else(|| m.attributes.title.values().next())
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string());

            let description = m
                .attributes
                .description
                .as_ref()
                .and_then(|d| d.get("en").or_else(|| d.values().next()))
                .cloned()
                .unwrap_or_default();

            Manga {
                id: m.id,
                title,
                author,
                artist,
                status: m.attributes.status.unwrap_or_else(|| "Unknown".to_string()),
                description,
                cover_url,
            }
        })
        .collect()
}

fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent("yomidex-tui/0.1.0")
        .build()
        .expect("Failed to build HTTP client")
}

pub async fn fetch_cover_image(cover_url: &str) -> Option<DynamicImage> {
    if cover_url.is_empty() {
        return None;
    }

    // Use thumbnail size (256px) for faster loading
    let thumb_url = format!("{}.256.jpg", cover_url);

    let client = build_client();
    let response = client.get(&thumb_url).send().await.ok()?;
    let bytes = response.bytes().await.ok()?;

    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .decode()
        .ok()
}

pub async fn get_recently_updated() -> Result<Vec<Manga>, Error> {
    let url = format!(
        "{}/manga?includes[]=author&includes[]=artist&includes[]=cover_art&order[latestUploadedChapter]=desc&limit=20",
        BASE_URL
    );

    let client = build_client();
    let response: MangaResponse = client.get(&url).send().await?.json().await?;

    Ok(parse_manga_list(response))
}

pub async fn get_popular_now() -> Result<Vec<Manga>, Error> {
    let url = format!(
        "{}/manga?includes[]=author&includes[]=artist&includes[]=cover_art&order[followedCount]=desc&limit=20",
        BASE_URL
    );

    let client = build_client();
    let response: MangaResponse = client.get(&url).send().await?.json().await?;

    Ok(parse_manga_list(response))
}

pub async fn search_manga(query: &str) -> Result<Vec<Manga>, Error> {
    let url = format!(
        "{}/manga?title={}&includes[]=author&includes[]=artist&includes[]=cover_art&order[relevance]=desc&limit=24",
        BASE_URL,
        urlencoding::encode(query)
    );

    let client = build_client();
    let response: MangaResponse = client.get(&url).send().await?.json().await?;

    Ok(parse_manga_list(response))
}

/// Fetches the full multi-language chapter feed for a manga. The feed is
/// paginated server-side; pages are followed until `total` is exhausted so
/// the navigation core always sees the complete list.
pub async fn get_manga_chapters(manga_id: &str) -> Result<Vec<Chapter>, Error> {
    let client = build_client();
    let mut chapters = Vec::new();
    let mut offset = 0;

    loop {
        let url = format!(
            "{}/manga/{}/feed?order[chapter]=asc&limit={}&offset={}",
            BASE_URL, manga_id, FEED_PAGE_LIMIT, offset
        );

        let response: ChapterResponse = client.get(&url).send().await?.json().await?;
        let batch_len = response.data.len();
        let total = response.total.unwrap_or(0);

        chapters.extend(
            response
                .data
                .into_iter()
                .filter(|c| c.attributes.pages > 0)
                .map(parse_chapter),
        );

        offset += batch_len;
        if batch_len == 0 || offset >= total {
            break;
        }
    }

    Ok(chapters)
}

pub async fn get_chapter_pages(chapter_id: &str) -> Option<ChapterPages> {
    let url = format!("{}/at-home/server/{}", BASE_URL, chapter_id);

    let client = build_client();
    let response: AtHomeResponse = client.get(&url).send().await.ok()?.json().await.ok()?;

    let page_url = |variant: &str, filename: &str| {
        format!(
            "{}/{}/{}/{}",
            response.base_url, variant, response.chapter.hash, filename
        )
    };

    Some(ChapterPages {
        data: response
            .chapter
            .data
            .iter()
            .map(|f| page_url("data", f))
            .collect(),
        data_saver: response
            .chapter
            .data_saver
            .iter()
            .map(|f| page_url("data-saver", f))
            .collect(),
    })
}

pub async fn fetch_page_image(page_url: &str) -> Option<DynamicImage> {
    let client = build_client();
    let response = client.get(page_url).send().await.ok()?;
    let bytes = response.bytes().await.ok()?;

    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .decode()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chapter_normalizes_empty_fields() {
        let raw = r#"{
            "id": "abc",
            "attributes": {
                "chapter": "  ",
                "title": null,
                "volume": "1",
                "pages": 20,
                "translatedLanguage": "en",
                "publishAt": "2024-01-01T00:00:00+00:00"
            }
        }"#;
        let data: ChapterData = serde_json::from_str(raw).unwrap();
        let chapter = parse_chapter(data);

        assert_eq!(chapter.chapter, None);
        assert_eq!(chapter.title, None);
        assert_eq!(chapter.volume, Some("1".to_string()));
        assert_eq!(chapter.translated_language, "en");
        assert_eq!(chapter.pages, 20);
    }

    #[test]
    fn test_parse_chapter_missing_language_uses_empty_sentinel() {
        let raw = r#"{
            "id": "abc",
            "attributes": { "chapter": "4.5", "pages": 8 }
        }"#;
        let data: ChapterData = serde_json::from_str(raw).unwrap();
        let chapter = parse_chapter(data);

        assert_eq!(chapter.chapter, Some("4.5".to_string()));
        assert_eq!(chapter.translated_language, "");
    }

    #[test]
    fn test_at_home_urls_cover_both_qualities() {
        let raw = r#"{
            "baseUrl": "https://node.example",
            "chapter": {
                "hash": "h1",
                "data": ["1.png", "2.png"],
                "dataSaver": ["1.jpg", "2.jpg"]
            }
        }"#;
        let response: AtHomeResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.chapter.data.len(), response.chapter.data_saver.len());
        assert_eq!(response.base_url, "https://node.example");
        assert_eq!(response.chapter.hash, "h1");
    }
}
