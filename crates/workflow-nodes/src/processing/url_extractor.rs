//! URL Extractor Node
//!
//! Pulls http(s) URLs out of whatever an upstream node produced: a bare
//! URL, free text or HTML, or an arbitrary JSON object graph. URLs are
//! classified by file extension and filtered to the configured media
//! types, optionally de-duplicated, and emitted in one of three shapes.
//!
//! # Config
//! - `urlTypes`: any of `image`, `video`, `audio`, `all` (default `["image"]`)
//! - `deduplication`: drop repeated URLs, keeping first occurrence (default true)
//! - `outputFormat`: `array`, `single` or `object` (default `array`)
//! - `outputParamName`: key the URLs are emitted under (default `extractedUrls`)
//!
//! # Output
//! - `array`:  `{ <key>: [urls], count }`
//! - `single`: `{ <key>: firstUrlOrNull, count }`
//! - `object`: `{ <key>: [urls], count, types: {image, video, audio, other}, extractedAt }`

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use node_engine::{
    ConfigField, ConfigSchema, DescribeNode, ExecutorExtensions, GraphNode, NodeCategory,
    NodeDescriptor, NodeExecutor, PortValues,
};
use regex::Regex;
use reqwest::Url;
use serde_json::{json, Value};

use crate::output_param_name;

static URL_IN_TEXT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s"'<>\\]+"#).ok());

/// JSON-escaped form, `https:\/\/host\/path`
static ESCAPED_URL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"https?:\\/\\/[^\s"'<>]+"#).ok());

static IMG_SRC: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"(?i)<img[^>]+src=["']([^"']+)["']"#).ok());

/// Object keys whose string values are taken as URLs as written
const URL_KEY_HINTS: [&str; 11] = [
    "url", "src", "href", "link", "image", "video", "audio", "file", "path", "uri", "media",
];

/// Input keys tried, in order, when there is no `input`
const PREFERRED_INPUT_KEYS: [&str; 6] = [
    "original_plugin_output",
    "data",
    "result",
    "output",
    "content",
    "response",
];

const IMAGE_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "gif", "webp", "bmp", "svg", "ico"];
const VIDEO_EXTENSIONS: [&str; 7] = ["mp4", "avi", "mov", "wmv", "flv", "webm", "mkv"];
const AUDIO_EXTENSIONS: [&str; 6] = ["mp3", "wav", "ogg", "aac", "flac", "m4a"];

/// Media type of a URL, judged by its path's file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlKind {
    Image,
    Video,
    Audio,
    Other,
}

impl UrlKind {
    pub fn classify(url: &Url) -> Self {
        let file = url.path().rsplit('/').next().unwrap_or_default();
        let Some((_, extension)) = file.rsplit_once('.') else {
            return Self::Other;
        };
        let extension = extension.to_ascii_lowercase();
        let extension = extension.as_str();

        if IMAGE_EXTENSIONS.contains(&extension) {
            Self::Image
        } else if VIDEO_EXTENSIONS.contains(&extension) {
            Self::Video
        } else if AUDIO_EXTENSIONS.contains(&extension) {
            Self::Audio
        } else {
            Self::Other
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            _ => None,
        }
    }
}

/// Which media types to keep
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeFilter {
    All,
    Only(Vec<UrlKind>),
}

impl TypeFilter {
    /// Build from `urlTypes` names; empty or containing `all` accepts everything
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut kinds = Vec::new();
        for name in names {
            if name == "all" {
                return Self::All;
            }
            if let Some(kind) = UrlKind::from_name(name) {
                kinds.push(kind);
            }
        }
        if kinds.is_empty() {
            Self::All
        } else {
            Self::Only(kinds)
        }
    }

    fn accepts(&self, url: &Url) -> bool {
        match self {
            Self::All => true,
            Self::Only(kinds) => kinds.contains(&UrlKind::classify(url)),
        }
    }
}

/// Shape of the node's output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Array,
    Single,
    Object,
}

impl OutputFormat {
    fn from_name(name: &str) -> Self {
        match name {
            "single" => Self::Single,
            "object" => Self::Object,
            _ => Self::Array,
        }
    }
}

/// Parse an absolute http(s) URL with a host
fn parse_web_url(candidate: &str) -> Option<Url> {
    let url = Url::parse(candidate).ok()?;
    let is_web = matches!(url.scheme(), "http" | "https");
    let has_host = url.host_str().is_some_and(|h| !h.is_empty());
    (is_web && has_host).then_some(url)
}

/// Strip punctuation that trails a URL in prose
fn trim_url(raw: &str) -> &str {
    raw.trim_end_matches(|c: char| {
        matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | ')' | ']' | '}' | '`' | '*')
    })
}

fn is_url_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    URL_KEY_HINTS.iter().any(|hint| key.contains(hint))
}

/// Collects matching URLs in discovery order
struct Collector<'f> {
    filter: &'f TypeFilter,
    urls: Vec<String>,
}

impl Collector<'_> {
    fn offer(&mut self, candidate: &str) {
        match parse_web_url(candidate) {
            Some(url) if self.filter.accepts(&url) => self.urls.push(candidate.to_string()),
            Some(_) => log::trace!("Skipping URL of unwanted type: {}", candidate),
            None => log::trace!("Skipping invalid URL: {}", candidate),
        }
    }

    fn visit(&mut self, value: &Value) {
        match value {
            Value::String(text) => {
                let trimmed = text.trim();
                if !trimmed.contains(char::is_whitespace) && parse_web_url(trimmed).is_some() {
                    self.offer(trimmed);
                } else {
                    self.scan_text(text);
                }
            }
            Value::Array(items) => items.iter().for_each(|item| self.visit(item)),
            Value::Object(map) => {
                for (key, value) in map {
                    match value {
                        Value::String(s) if is_url_key(key) && parse_web_url(s.trim()).is_some() => {
                            self.offer(s.trim())
                        }
                        // Captions, notes and messages can embed URLs in prose
                        Value::String(s) => self.scan_text(s),
                        Value::Array(_) | Value::Object(_) => self.visit(value),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    /// Find URLs in free text or markup, in the order they appear
    fn scan_text(&mut self, text: &str) {
        let mut found: Vec<(usize, usize, String)> = Vec::new();

        if let Some(re) = URL_IN_TEXT.as_ref() {
            for m in re.find_iter(text) {
                let url = trim_url(m.as_str());
                found.push((m.start(), m.start() + url.len(), url.to_string()));
            }
        }

        if let Some(re) = ESCAPED_URL.as_ref() {
            for m in re.find_iter(text) {
                let url = m.as_str().replace('\\', "");
                found.push((m.start(), m.end(), trim_url(&url).to_string()));
            }
        }

        // <img src> values not already picked up by the plain scan
        if let Some(re) = IMG_SRC.as_ref() {
            for caps in re.captures_iter(text) {
                let Some(src) = caps.get(1) else { continue };
                let overlaps = found
                    .iter()
                    .any(|(start, end, _)| *start < src.end() && src.start() < *end);
                if !overlaps {
                    found.push((src.start(), src.end(), src.as_str().trim().to_string()));
                }
            }
        }

        found.sort_by_key(|(start, _, _)| *start);
        for (_, _, url) in found {
            self.offer(&url);
        }
    }
}

/// Extract every URL in `value` accepted by `filter`, in discovery order
pub fn extract_urls(value: &Value, filter: &TypeFilter) -> Vec<String> {
    let mut collector = Collector {
        filter,
        urls: Vec::new(),
    };
    collector.visit(value);
    collector.urls
}

/// Keep the first occurrence of each URL
pub fn dedupe(urls: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    urls.into_iter().filter(|u| seen.insert(u.clone())).collect()
}

/// Count of URLs per media type
pub fn type_counts(urls: &[String]) -> Value {
    let (mut image, mut video, mut audio, mut other) = (0, 0, 0, 0);
    for url in urls {
        match parse_web_url(url).map(|u| UrlKind::classify(&u)) {
            Some(UrlKind::Image) => image += 1,
            Some(UrlKind::Video) => video += 1,
            Some(UrlKind::Audio) => audio += 1,
            _ => other += 1,
        }
    }
    json!({ "image": image, "video": video, "audio": audio, "other": other })
}

/// Pick the value to extract from: `input`, then well-known result keys,
/// then the whole input map
fn select_input(inputs: &PortValues) -> Value {
    if let Some(value) = inputs.get(UrlExtractorNode::PORT_INPUT).filter(|v| !v.is_null()) {
        return value.clone();
    }
    PREFERRED_INPUT_KEYS
        .iter()
        .find_map(|key| inputs.get(*key).filter(|v| !v.is_null()))
        .cloned()
        .unwrap_or_else(|| Value::Object(inputs.clone()))
}

/// Extracts and classifies URLs from upstream data
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlExtractorNode;

impl UrlExtractorNode {
    pub const NODE_TYPE: &'static str = "urlExtractor";
    /// Port ID for the data input
    pub const PORT_INPUT: &'static str = "input";
    /// Default port ID for the extracted URLs
    pub const PORT_URLS: &'static str = "extractedUrls";
    /// Port ID for the URL count
    pub const PORT_COUNT: &'static str = "count";
    /// Port ID for per-type counts (`object` format)
    pub const PORT_TYPES: &'static str = "types";
    /// Port ID for the extraction timestamp (`object` format)
    pub const PORT_EXTRACTED_AT: &'static str = "extractedAt";
}

impl DescribeNode for UrlExtractorNode {
    fn descriptor() -> NodeDescriptor {
        NodeDescriptor::new(Self::NODE_TYPE, "URL Extractor", NodeCategory::Auxiliary)
            .with_description("Extracts image, video and audio URLs from text or JSON")
            .with_inputs(&[Self::PORT_INPUT])
            .with_outputs(&[
                Self::PORT_URLS,
                Self::PORT_COUNT,
                Self::PORT_TYPES,
                Self::PORT_EXTRACTED_AT,
            ])
            .with_schema(
                ConfigSchema::new()
                    .field(
                        "urlTypes",
                        ConfigField::multiselect(&["image", "video", "audio", "all"], &["image"])
                            .with_description("Media types to keep"),
                    )
                    .field(
                        "deduplication",
                        ConfigField::boolean(true).with_description("Drop repeated URLs"),
                    )
                    .field(
                        "outputFormat",
                        ConfigField::enumeration(&["array", "single", "object"], "array"),
                    )
                    .field(
                        "outputParamName",
                        ConfigField::string(Self::PORT_URLS)
                            .with_description("Output key for the extracted URLs"),
                    ),
            )
            .with_output_name_param("outputParamName")
    }
}

inventory::submit!(node_engine::BuiltinNode::new(
    UrlExtractorNode::descriptor,
    || Arc::new(UrlExtractorNode)
));

#[async_trait]
impl NodeExecutor for UrlExtractorNode {
    async fn execute(
        &self,
        node: &GraphNode,
        inputs: PortValues,
        _extensions: &ExecutorExtensions,
    ) -> node_engine::Result<PortValues> {
        let filter = match node.config.get("urlTypes") {
            Some(Value::Array(names)) => TypeFilter::from_names(names.iter().filter_map(Value::as_str)),
            _ => TypeFilter::Only(vec![UrlKind::Image]),
        };
        let deduplicate = node.config_bool("deduplication").unwrap_or(true);
        let format = OutputFormat::from_name(node.config_str("outputFormat").unwrap_or_default());
        let key = output_param_name(node, Self::PORT_URLS);

        let input = select_input(&inputs);
        let mut urls = extract_urls(&input, &filter);
        if deduplicate {
            urls = dedupe(urls);
        }
        log::debug!(
            "UrlExtractorNode {}: extracted {} URL(s) ({:?})",
            node.id,
            urls.len(),
            filter
        );

        let mut outputs = PortValues::new();
        outputs.insert(Self::PORT_COUNT.to_string(), json!(urls.len()));
        match format {
            OutputFormat::Single => {
                outputs.insert(key, urls.first().map_or(Value::Null, |u| json!(u)));
            }
            OutputFormat::Array => {
                outputs.insert(key, json!(urls));
            }
            OutputFormat::Object => {
                outputs.insert(Self::PORT_TYPES.to_string(), type_counts(&urls));
                outputs.insert(
                    Self::PORT_EXTRACTED_AT.to_string(),
                    json!(chrono::Utc::now().to_rfc3339()),
                );
                outputs.insert(key, json!(urls));
            }
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(config: Value) -> GraphNode {
        GraphNode {
            id: "node_2".to_string(),
            node_type: UrlExtractorNode::NODE_TYPE.to_string(),
            config: config.as_object().cloned().unwrap(),
            label: None,
        }
    }

    async fn run(config: Value, inputs: Value) -> PortValues {
        UrlExtractorNode
            .execute(
                &node(config),
                inputs.as_object().cloned().unwrap(),
                &ExecutorExtensions::new(),
            )
            .await
            .unwrap()
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_classify_by_extension() {
        assert_eq!(UrlKind::classify(&url("https://x/a.PNG")), UrlKind::Image);
        assert_eq!(UrlKind::classify(&url("https://x/a.jpg?w=200")), UrlKind::Image);
        assert_eq!(UrlKind::classify(&url("https://x/v.webm#t=3")), UrlKind::Video);
        assert_eq!(UrlKind::classify(&url("https://x/s.flac")), UrlKind::Audio);
        assert_eq!(UrlKind::classify(&url("https://x.png/page")), UrlKind::Other);
        assert_eq!(UrlKind::classify(&url("https://x/")), UrlKind::Other);
    }

    #[test]
    fn test_type_filter_names() {
        assert_eq!(TypeFilter::from_names(["image", "all"]), TypeFilter::All);
        assert_eq!(TypeFilter::from_names(Vec::<&str>::new()), TypeFilter::All);
        assert_eq!(
            TypeFilter::from_names(["video", "bogus"]),
            TypeFilter::Only(vec![UrlKind::Video])
        );
    }

    #[test]
    fn test_only_web_urls_are_accepted() {
        assert!(parse_web_url("https://x/a.png").is_some());
        assert!(parse_web_url("ftp://x/a.png").is_none());
        assert!(parse_web_url("/relative/a.png").is_none());
        assert!(parse_web_url("file:///a.png").is_none());
    }

    #[tokio::test]
    async fn test_url_keys_and_type_filter() {
        let outputs = run(
            json!({"urlTypes": ["image"], "outputFormat": "array", "outputParamName": "urls"}),
            json!({"imageUrl": "https://x/a.png", "note": "see https://x/b.mp4"}),
        )
        .await;

        assert_eq!(outputs.get("urls"), Some(&json!(["https://x/a.png"])));
        assert_eq!(outputs.get("count"), Some(&json!(1)));
        assert_eq!(outputs.len(), 2);
    }

    #[tokio::test]
    async fn test_text_scan_with_markup_and_escapes() {
        let text = concat!(
            "First https://x/one.png, then <img class=\"a\" src=\"https://x/two.gif\"> ",
            "and an escaped https:\\/\\/x\\/three.webp plus https://x/page.html."
        );
        let outputs = run(json!({"urlTypes": ["all"]}), json!({"input": text})).await;

        assert_eq!(
            outputs.get("extractedUrls"),
            Some(&json!([
                "https://x/one.png",
                "https://x/two.gif",
                "https://x/three.webp",
                "https://x/page.html"
            ]))
        );
    }

    #[tokio::test]
    async fn test_nested_objects_and_arrays() {
        let input = json!({
            "result": {
                "images": [{"src": "https://x/1.png"}, {"src": "https://x/2.jpg"}],
                "video": "https://x/clip.mp4",
                "caption": "https://x/not-a-url-key.png"
            }
        });
        let outputs = run(json!({"urlTypes": ["image", "video"]}), input).await;
        assert_eq!(
            outputs.get("extractedUrls"),
            Some(&json!([
                "https://x/not-a-url-key.png",
                "https://x/1.png",
                "https://x/2.jpg",
                "https://x/clip.mp4"
            ]))
        );
    }

    #[tokio::test]
    async fn test_urls_in_prose_fields_are_found() {
        let input = json!({"imageUrl": "https://x/a.png", "note": "see https://x/b.mp4"});
        let outputs = run(json!({"urlTypes": ["video"]}), input.clone()).await;
        assert_eq!(outputs.get("extractedUrls"), Some(&json!(["https://x/b.mp4"])));
        assert_eq!(outputs.get("count"), Some(&json!(1)));

        let outputs = run(json!({"urlTypes": ["image", "video"]}), input).await;
        assert_eq!(
            outputs.get("extractedUrls"),
            Some(&json!(["https://x/a.png", "https://x/b.mp4"]))
        );

        let outputs = run(
            json!({"urlTypes": ["image"]}),
            json!({"input": {"result": {"message": "Generated: https://x/cat.png"}}}),
        )
        .await;
        assert_eq!(outputs.get("extractedUrls"), Some(&json!(["https://x/cat.png"])));
    }

    #[tokio::test]
    async fn test_deduplication_toggle() {
        let input = json!({"input": ["https://x/a.png", "https://x/a.png"]});

        let outputs = run(json!({}), input.clone()).await;
        assert_eq!(outputs.get("count"), Some(&json!(1)));

        let outputs = run(json!({"deduplication": false}), input).await;
        assert_eq!(outputs.get("count"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_single_format() {
        let outputs = run(
            json!({"outputFormat": "single"}),
            json!({"input": "https://x/a.png https://x/b.png"}),
        )
        .await;
        assert_eq!(outputs.get("extractedUrls"), Some(&json!("https://x/a.png")));
        assert_eq!(outputs.get("count"), Some(&json!(2)));

        let outputs = run(json!({"outputFormat": "single"}), json!({})).await;
        assert_eq!(outputs.get("extractedUrls"), Some(&Value::Null));
        assert_eq!(outputs.get("count"), Some(&json!(0)));
    }

    #[tokio::test]
    async fn test_object_format_reports_types() {
        let outputs = run(
            json!({"outputFormat": "object", "urlTypes": ["all"]}),
            json!({"input": ["https://x/a.png", "https://x/b.mp3", "https://x/c"]}),
        )
        .await;

        assert_eq!(
            outputs.get("types"),
            Some(&json!({"image": 1, "video": 0, "audio": 1, "other": 1}))
        );
        let stamp = outputs.get("extractedAt").and_then(Value::as_str).unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());
    }

    #[tokio::test]
    async fn test_preferred_input_keys() {
        let outputs = run(
            json!({}),
            json!({
                "output": "https://x/from-output.png",
                "original_plugin_output": "{\"image\":\"https:\\/\\/x\\/plugin.png\"}"
            }),
        )
        .await;
        assert_eq!(
            outputs.get("extractedUrls"),
            Some(&json!(["https://x/plugin.png"]))
        );
    }

    #[tokio::test]
    async fn test_missing_input_yields_nothing() {
        let outputs = run(json!({}), json!({"input": null})).await;
        assert_eq!(outputs.get("extractedUrls"), Some(&json!([])));
        assert_eq!(outputs.get("count"), Some(&json!(0)));

        let outputs = run(json!({}), json!({"input": 42})).await;
        assert_eq!(outputs.get("count"), Some(&json!(0)));
    }
}
