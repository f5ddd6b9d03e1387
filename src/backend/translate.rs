use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Fragments are translated in fixed batches: concurrent inside a batch,
/// batches awaited one after another, to bound outstanding service calls.
pub const TRANSLATION_BATCH_SIZE: usize = 5;

/// One recognized text region on a page image.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrFragment {
    pub text: String,
    /// x, y, width, height in source-image pixels.
    pub bbox: [f32; 4],
}

/// Playable synthesis result. The reader only hands this to the audio
/// collaborator; it never inspects the bytes.
#[derive(Debug, Clone)]
pub struct AudioHandle {
    pub media_type: String,
    pub bytes: Arc<Vec<u8>>,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ServiceError {
    #[error("service request failed: {0}")]
    Request(String),
    #[error("service returned malformed payload: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        ServiceError::Request(err.to_string())
    }
}

pub trait OcrService: Send + Sync {
    fn recognize<'a>(
        &'a self,
        image_url: &'a str,
    ) -> BoxFuture<'a, Result<Vec<OcrFragment>, ServiceError>>;
}

pub trait TranslationService: Send + Sync {
    fn translate<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<String, ServiceError>>;
}

pub trait TtsService: Send + Sync {
    fn synthesize<'a>(&'a self, text: &'a str)
        -> BoxFuture<'a, Result<AudioHandle, ServiceError>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Translate,
    Tts,
}

impl RequestKind {
    fn sibling(self) -> Self {
        match self {
            RequestKind::Translate => RequestKind::Tts,
            RequestKind::Tts => RequestKind::Translate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Pending,
    Ready,
    Error,
}

/// Memoized result for one (page, kind) request.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub ocr: Vec<OcrFragment>,
    /// Positionally aligned with `ocr`, same bboxes, translated text.
    /// `None` for TTS entries.
    pub translated_ocr: Option<Vec<OcrFragment>>,
    /// Whole-page text: translated for translation entries, the raw
    /// concatenation for TTS entries.
    pub text: String,
    pub audio: Option<AudioHandle>,
}

type JobFuture = Shared<BoxFuture<'static, Result<Arc<CacheEntry>, ServiceError>>>;

enum Slot {
    InFlight(JobFuture),
    Ready(Arc<CacheEntry>),
    Failed(ServiceError),
}

struct CacheInner {
    entries: HashMap<(String, RequestKind), Slot>,
    /// Text-level memo shared across pages and fragments, so repeated
    /// dialogue is only ever translated once per session.
    translated_texts: HashMap<String, String>,
}

/// Session-scoped memo of per-page OCR/translation/TTS results.
///
/// At most one job is in flight per (page URL, kind): a caller arriving
/// while a job is pending awaits the same shared future instead of issuing
/// a duplicate request. Ready entries are returned without re-fetch for the
/// life of the session; failed entries are only retried by a fresh explicit
/// request. All mutation goes through one async lock, which is never held
/// across a service call.
#[derive(Clone)]
pub struct TranslationTtsCache {
    inner: Arc<Mutex<CacheInner>>,
    ocr: Arc<dyn OcrService>,
    translator: Arc<dyn TranslationService>,
    tts: Arc<dyn TtsService>,
}

impl TranslationTtsCache {
    pub fn new(
        ocr: Arc<dyn OcrService>,
        translator: Arc<dyn TranslationService>,
        tts: Arc<dyn TtsService>,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner {
                entries: HashMap::new(),
                translated_texts: HashMap::new(),
            })),
            ocr,
            translator,
            tts,
        }
    }

    pub async fn request_translation(
        &self,
        page_url: &str,
    ) -> Result<Arc<CacheEntry>, ServiceError> {
        self.request(page_url, RequestKind::Translate).await
    }

    pub async fn request_tts(&self, page_url: &str) -> Result<Arc<CacheEntry>, ServiceError> {
        self.request(page_url, RequestKind::Tts).await
    }

    pub async fn status(&self, page_url: &str, kind: RequestKind) -> Option<EntryStatus> {
        let inner = self.inner.lock().await;
        inner
            .entries
            .get(&(page_url.to_string(), kind))
            .map(|slot| match slot {
                Slot::InFlight(_) => EntryStatus::Pending,
                Slot::Ready(_) => EntryStatus::Ready,
                Slot::Failed(_) => EntryStatus::Error,
            })
    }

    pub async fn ready_entry(
        &self,
        page_url: &str,
        kind: RequestKind,
    ) -> Option<Arc<CacheEntry>> {
        let inner = self.inner.lock().await;
        match inner.entries.get(&(page_url.to_string(), kind)) {
            Some(Slot::Ready(entry)) => Some(entry.clone()),
            _ => None,
        }
    }

    /// Drops every entry and the text memo. Called when a new reading
    /// session starts so a single mutable map cannot grow unbounded.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.entries.clear();
        inner.translated_texts.clear();
    }

    async fn request(
        &self,
        page_url: &str,
        kind: RequestKind,
    ) -> Result<Arc<CacheEntry>, ServiceError> {
        let job = {
            let mut inner = self.inner.lock().await;
            match inner.entries.get(&(page_url.to_string(), kind)) {
                Some(Slot::Ready(entry)) => return Ok(entry.clone()),
                Some(Slot::InFlight(job)) => job.clone(),
                // Vacant or previously failed: this explicit request starts
                // a fresh job.
                _ => {
                    let job = self.make_job(page_url.to_string(), kind);
                    inner
                        .entries
                        .insert((page_url.to_string(), kind), Slot::InFlight(job.clone()));
                    job
                }
            }
        };
        job.await
    }

    fn make_job(&self, page_url: String, kind: RequestKind) -> JobFuture {
        let cache = self.clone();
        async move {
            let result = cache.run_job(&page_url, kind).await;
            if let Err(err) = &result {
                warn!("{kind:?} job for {page_url} failed: {err}");
            }
            let mut inner = cache.inner.lock().await;
            let slot = match &result {
                Ok(entry) => Slot::Ready(entry.clone()),
                Err(err) => Slot::Failed(err.clone()),
            };
            inner.entries.insert((page_url, kind), slot);
            result
        }
        .boxed()
        .shared()
    }

    async fn run_job(
        &self,
        page_url: &str,
        kind: RequestKind,
    ) -> Result<Arc<CacheEntry>, ServiceError> {
        // OCR runs once per page: a ready sibling entry (translate vs TTS)
        // already carries the fragments.
        let ocr = match self.sibling_ocr(page_url, kind).await {
            Some(fragments) => fragments,
            None => {
                debug!("running OCR for {page_url}");
                self.ocr.recognize(page_url).await?
            }
        };

        let page_text = ocr
            .iter()
            .map(|f| f.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let entry = match kind {
            RequestKind::Translate => {
                let translated_ocr = self.translate_fragments(&ocr).await?;
                let text = self.translate_memoized(&page_text).await?;
                CacheEntry {
                    ocr,
                    translated_ocr: Some(translated_ocr),
                    text,
                    audio: None,
                }
            }
            RequestKind::Tts => {
                let audio = self.tts.synthesize(&page_text).await?;
                CacheEntry {
                    ocr,
                    translated_ocr: None,
                    text: page_text,
                    audio: Some(audio),
                }
            }
        };

        Ok(Arc::new(entry))
    }

    async fn sibling_ocr(&self, page_url: &str, kind: RequestKind) -> Option<Vec<OcrFragment>> {
        let inner = self.inner.lock().await;
        match inner.entries.get(&(page_url.to_string(), kind.sibling())) {
            Some(Slot::Ready(entry)) => Some(entry.ocr.clone()),
            _ => None,
        }
    }

    /// Translates every not-yet-memoized fragment text in batches of
    /// [`TRANSLATION_BATCH_SIZE`], then rebuilds the fragment list with the
    /// translations in place and the original bboxes untouched.
    async fn translate_fragments(
        &self,
        fragments: &[OcrFragment],
    ) -> Result<Vec<OcrFragment>, ServiceError> {
        let mut pending: Vec<String> = Vec::new();
        {
            let inner = self.inner.lock().await;
            for fragment in fragments {
                if fragment.text.trim().is_empty() {
                    continue;
                }
                if inner.translated_texts.contains_key(&fragment.text) {
                    continue;
                }
                if !pending.contains(&fragment.text) {
                    pending.push(fragment.text.clone());
                }
            }
        }

        for batch in pending.chunks(TRANSLATION_BATCH_SIZE) {
            let results = futures::future::join_all(
                batch.iter().map(|text| self.translator.translate(text)),
            )
            .await;

            let mut inner = self.inner.lock().await;
            for (text, result) in batch.iter().zip(results) {
                inner.translated_texts.insert(text.clone(), result?);
            }
        }

        let inner = self.inner.lock().await;
        Ok(fragments
            .iter()
            .map(|fragment| OcrFragment {
                text: inner
                    .translated_texts
                    .get(&fragment.text)
                    .cloned()
                    .unwrap_or_else(|| fragment.text.clone()),
                bbox: fragment.bbox,
            })
            .collect())
    }

    async fn translate_memoized(&self, text: &str) -> Result<String, ServiceError> {
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }
        {
            let inner = self.inner.lock().await;
            if let Some(hit) = inner.translated_texts.get(text) {
                return Ok(hit.clone());
            }
        }
        let translated = self.translator.translate(text).await?;
        let mut inner = self.inner.lock().await;
        inner
            .translated_texts
            .insert(text.to_string(), translated.clone());
        Ok(translated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    struct MockOcr {
        calls: AtomicUsize,
        fail: AtomicBool,
        fragments: Vec<OcrFragment>,
    }

    impl MockOcr {
        fn new(texts: &[&str]) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
                fragments: texts
                    .iter()
                    .enumerate()
                    .map(|(i, t)| OcrFragment {
                        text: t.to_string(),
                        bbox: [0.0, 10.0 * i as f32, 100.0, 20.0],
                    })
                    .collect(),
            }
        }
    }

    impl OcrService for MockOcr {
        fn recognize<'a>(
            &'a self,
            _image_url: &'a str,
        ) -> BoxFuture<'a, Result<Vec<OcrFragment>, ServiceError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let fail = self.fail.load(Ordering::SeqCst);
            let fragments = self.fragments.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                if fail {
                    Err(ServiceError::Request("ocr backend down".to_string()))
                } else {
                    Ok(fragments)
                }
            }
            .boxed()
        }
    }

    struct MockTranslator {
        calls: AtomicUsize,
    }

    impl MockTranslator {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl TranslationService for MockTranslator {
        fn translate<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<String, ServiceError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let translated = format!("{text} [en]");
            async move { Ok(translated) }.boxed()
        }
    }

    struct MockTts {
        calls: AtomicUsize,
    }

    impl MockTts {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl TtsService for MockTts {
        fn synthesize<'a>(
            &'a self,
            text: &'a str,
        ) -> BoxFuture<'a, Result<AudioHandle, ServiceError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let bytes = Arc::new(text.as_bytes().to_vec());
            async move {
                Ok(AudioHandle {
                    media_type: "audio/wav".to_string(),
                    bytes,
                })
            }
            .boxed()
        }
    }

    struct Fixture {
        ocr: Arc<MockOcr>,
        translator: Arc<MockTranslator>,
        tts: Arc<MockTts>,
        cache: TranslationTtsCache,
    }

    fn fixture(texts: &[&str]) -> Fixture {
        let ocr = Arc::new(MockOcr::new(texts));
        let translator = Arc::new(MockTranslator::new());
        let tts = Arc::new(MockTts::new());
        let cache = TranslationTtsCache::new(ocr.clone(), translator.clone(), tts.clone());
        Fixture {
            ocr,
            translator,
            tts,
            cache,
        }
    }

    #[tokio::test]
    async fn test_concurrent_requests_coalesce_to_one_ocr_call() {
        let f = fixture(&["Hello", "World"]);

        let (a, b) = tokio::join!(
            f.cache.request_translation("p1.jpg"),
            f.cache.request_translation("p1.jpg"),
        );

        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(f.ocr.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ready_entry_is_returned_without_refetch() {
        let f = fixture(&["Hello", "World"]);

        let first = f.cache.request_translation("p1.jpg").await.unwrap();
        let ocr_calls = f.ocr.calls.load(Ordering::SeqCst);
        let translate_calls = f.translator.calls.load(Ordering::SeqCst);

        let second = f.cache.request_translation("p1.jpg").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(f.ocr.calls.load(Ordering::SeqCst), ocr_calls);
        assert_eq!(f.translator.calls.load(Ordering::SeqCst), translate_calls);
        assert_eq!(
            f.cache.status("p1.jpg", RequestKind::Translate).await,
            Some(EntryStatus::Ready)
        );
    }

    #[tokio::test]
    async fn test_translation_entry_aligns_fragments_and_keeps_bboxes() {
        let f = fixture(&["Hello", "World"]);

        let entry = f.cache.request_translation("p1.jpg").await.unwrap();
        let translated = entry.translated_ocr.as_ref().unwrap();

        assert_eq!(translated.len(), entry.ocr.len());
        assert_eq!(translated[0].text, "Hello [en]");
        assert_eq!(translated[1].text, "World [en]");
        assert_eq!(translated[0].bbox, entry.ocr[0].bbox);
        assert_eq!(translated[1].bbox, entry.ocr[1].bbox);
        assert_eq!(entry.text, "Hello World [en]");
    }

    #[tokio::test]
    async fn test_duplicate_fragment_text_is_translated_once() {
        let f = fixture(&["Haha", "Haha", "Haha"]);

        let entry = f.cache.request_translation("p1.jpg").await.unwrap();
        assert_eq!(entry.translated_ocr.as_ref().unwrap().len(), 3);

        // One call for the deduplicated fragment, one for the page text.
        assert_eq!(f.translator.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_text_memo_spans_pages() {
        let f = fixture(&["Same line"]);

        f.cache.request_translation("p1.jpg").await.unwrap();
        let after_first = f.translator.calls.load(Ordering::SeqCst);

        f.cache.request_translation("p2.jpg").await.unwrap();
        // Identical dialogue on the second page costs no further calls:
        // both the fragment and the page concatenation are memo hits.
        assert_eq!(f.translator.calls.load(Ordering::SeqCst), after_first);
    }

    #[tokio::test]
    async fn test_large_pages_are_translated_in_batches() {
        let texts: Vec<String> = (0..12).map(|i| format!("line {i}")).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let f = fixture(&refs);

        let entry = f.cache.request_translation("p1.jpg").await.unwrap();
        assert_eq!(entry.translated_ocr.as_ref().unwrap().len(), 12);
        // 12 distinct fragments + the page concatenation.
        assert_eq!(f.translator.calls.load(Ordering::SeqCst), 13);
    }

    #[tokio::test]
    async fn test_failed_entry_retries_only_on_explicit_request() {
        let f = fixture(&["Hello"]);
        f.ocr.fail.store(true, Ordering::SeqCst);

        let err = f.cache.request_translation("p1.jpg").await;
        assert!(err.is_err());
        assert_eq!(
            f.cache.status("p1.jpg", RequestKind::Translate).await,
            Some(EntryStatus::Error)
        );
        assert!(f
            .cache
            .ready_entry("p1.jpg", RequestKind::Translate)
            .await
            .is_none());
        assert_eq!(f.ocr.calls.load(Ordering::SeqCst), 1);

        // The error sits in the map without spawning retries on its own.
        assert_eq!(f.ocr.calls.load(Ordering::SeqCst), 1);

        f.ocr.fail.store(false, Ordering::SeqCst);
        let entry = f.cache.request_translation("p1.jpg").await.unwrap();
        assert_eq!(entry.ocr.len(), 1);
        assert_eq!(f.ocr.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_tts_entry_reuses_ocr_and_keeps_raw_text() {
        let f = fixture(&["Hello", "World"]);

        f.cache.request_translation("p1.jpg").await.unwrap();
        assert_eq!(f.ocr.calls.load(Ordering::SeqCst), 1);

        let tts_entry = f.cache.request_tts("p1.jpg").await.unwrap();
        assert_eq!(f.ocr.calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.tts.calls.load(Ordering::SeqCst), 1);
        assert_eq!(tts_entry.text, "Hello World");
        assert!(tts_entry.translated_ocr.is_none());
        assert!(tts_entry.audio.is_some());
    }

    #[tokio::test]
    async fn test_clear_resets_the_session() {
        let f = fixture(&["Hello"]);

        f.cache.request_translation("p1.jpg").await.unwrap();
        f.cache.clear().await;

        assert_eq!(f.cache.status("p1.jpg", RequestKind::Translate).await, None);
        f.cache.request_translation("p1.jpg").await.unwrap();
        assert_eq!(f.ocr.calls.load(Ordering::SeqCst), 2);
    }
}
