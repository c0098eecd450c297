use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn, error};

use crate::config::Lang;
use crate::error::{Error, Result};
use crate::layout::check_alignment;
use super::traits::{Translator, TranslatorInfo};

/// Default number of retry attempts
pub const DEFAULT_RETRY_COUNT: u32 = 3;
/// Default delay between retries in milliseconds
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
/// Default number of lines sent per request
pub const DEFAULT_BATCH_SIZE: usize = 40;

/// OpenAI-compatible API translator
/// Works with: llama.cpp server, Ollama, DeepSeek, OpenAI, etc.
///
/// Lines are sent in batches as a JSON array and the model is asked to
/// answer with an array of the same length.
pub struct OpenAiTranslator {
    client: Client,
    /// Base URL for the API (e.g., "http://localhost:8080/v1")
    pub api_base: String,
    /// Optional API key for authentication
    pub api_key: Option<String>,
    /// Model identifier
    pub model: String,
    /// Number of retry attempts
    pub retry_count: u32,
    /// Delay between retries in milliseconds
    pub retry_delay_ms: u64,
    /// Lines per request
    pub batch_size: usize,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

impl OpenAiTranslator {
    /// Create a new OpenAI translator with all options.
    pub fn new(
        api_base: String,
        api_key: Option<String>,
        model: String,
        retry_count: u32,
        retry_delay_ms: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| Error::TranslationRequest(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base,
            api_key,
            model,
            retry_count: retry_count.max(1),
            retry_delay_ms,
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    /// Create a new OpenAI translator with default retry settings.
    pub fn with_defaults(api_base: String, api_key: Option<String>, model: String) -> Result<Self> {
        Self::new(api_base, api_key, model, DEFAULT_RETRY_COUNT, DEFAULT_RETRY_DELAY_MS)
    }

    /// Set the number of lines per request
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Create translation prompt for a batch of lines
    fn create_prompt(lines: &[&str], source: &Lang, target: &Lang) -> String {
        let source_hint = if source.as_str() == "auto" {
            String::new()
        } else {
            format!(" from {}", language_name(source))
        };
        let payload = serde_json::to_string(lines).unwrap_or_else(|_| "[]".to_string());
        format!(
            "Translate each string of the following JSON array{} into {}. \
             The strings are lines of a document layout; keep them separate and in order. \
             Respond with only a JSON array of exactly {} strings, no explanations.\n\n{}",
            source_hint,
            language_name(target),
            lines.len(),
            payload
        )
    }

    /// Extract the JSON array of lines from a model reply.
    fn parse_lines(content: &str) -> Result<Vec<String>> {
        let start = content.find('[');
        let end = content.rfind(']');
        let (Some(start), Some(end)) = (start, end) else {
            return Err(Error::TranslationInvalidResponse(
                "Response contains no JSON array".to_string(),
            ));
        };
        if end < start {
            return Err(Error::TranslationInvalidResponse(
                "Malformed JSON array in response".to_string(),
            ));
        }
        serde_json::from_str::<Vec<String>>(&content[start..=end])
            .map(|lines| lines.into_iter().map(|l| l.trim().to_string()).collect())
            .map_err(|e| Error::TranslationInvalidResponse(e.to_string()))
    }

    /// Make API request with retry logic
    async fn request_with_retry(&self, lines: &[&str], source: &Lang, target: &Lang) -> Result<Vec<String>> {
        let url = format!("{}/chat/completions", self.api_base.trim_end_matches('/'));
        let prompt = Self::create_prompt(lines, source, target);

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt,
            }],
            temperature: Some(0.3), // Lower temperature for more consistent translations
            max_tokens: None,
        };

        let mut last_error = None;

        for attempt in 0..self.retry_count {
            debug!(
                "Translation request attempt {}/{} to {} ({} lines)",
                attempt + 1,
                self.retry_count,
                url,
                lines.len()
            );

            let mut req = self.client.post(&url).json(&request);

            if let Some(ref key) = self.api_key {
                req = req.header("Authorization", format!("Bearer {key}"));
            }

            match req.send().await {
                Ok(response) => {
                    if response.status().is_success() {
                        match response.json::<ChatResponse>().await {
                            Ok(chat_response) => {
                                if let Some(choice) = chat_response.choices.first() {
                                    match Self::parse_lines(&choice.message.content) {
                                        Ok(translated) => return Ok(translated),
                                        Err(e) => {
                                            warn!("Unusable translation reply: {}", e);
                                            last_error = Some(e);
                                        }
                                    }
                                } else {
                                    last_error = Some(Error::TranslationInvalidResponse(
                                        "No choices in response".to_string(),
                                    ));
                                }
                            }
                            Err(e) => {
                                warn!("Failed to parse response: {}", e);
                                last_error = Some(Error::TranslationInvalidResponse(e.to_string()));
                            }
                        }
                    } else if response.status().as_u16() == 429 {
                        let retry_after = response
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse().ok());

                        warn!("Rate limited, retry after {:?}s", retry_after);
                        last_error = Some(Error::TranslationRateLimited { retry_after });

                        let wait_time = retry_after.unwrap_or(5) * 1000;
                        tokio::time::sleep(Duration::from_millis(wait_time)).await;
                        continue;
                    } else {
                        let status = response.status();
                        let body = response.text().await.unwrap_or_default();
                        warn!("API error: {} - {}", status, body);
                        last_error = Some(Error::TranslationRequest(format!(
                            "HTTP {status}: {body}"
                        )));
                    }
                }
                Err(e) => {
                    warn!("Request failed: {}", e);
                    if e.is_timeout() {
                        last_error = Some(Error::TranslationTimeout);
                    } else {
                        last_error = Some(Error::TranslationRequest(e.to_string()));
                    }
                }
            }

            if attempt + 1 < self.retry_count {
                tokio::time::sleep(Duration::from_millis(self.retry_delay_ms)).await;
            }
        }

        error!("Translation failed after {} attempts", self.retry_count);
        Err(last_error.unwrap_or(Error::TranslationMaxRetriesExceeded))
    }
}

#[async_trait]
impl Translator for OpenAiTranslator {
    fn info(&self) -> TranslatorInfo {
        TranslatorInfo {
            name: "OpenAI Compatible",
            requires_api_key: false, // Optional for local servers
            supports_auto_detect: true,
        }
    }

    async fn translate_lines(&self, lines: &[String], source: &Lang, target: &Lang) -> Result<Vec<String>> {
        // Skip if source and target are the same
        if source.as_str() == target.as_str() && source.as_str() != "auto" {
            return Ok(lines.to_vec());
        }

        let mut out = Vec::with_capacity(lines.len());
        for chunk in lines.chunks(self.batch_size.max(1)) {
            // Blank lines are kept as-is and never sent
            let pending: Vec<&str> = chunk
                .iter()
                .map(String::as_str)
                .filter(|l| !l.trim().is_empty())
                .collect();
            if pending.is_empty() {
                out.extend(chunk.iter().cloned());
                continue;
            }

            // A batch that comes back short or long cannot be paired safely
            let translated = self.request_with_retry(&pending, source, target).await?;
            if let Err(e) = check_alignment("translation", pending.len(), translated.len()) {
                error!(
                    "Model returned {} line(s) for {} input line(s)",
                    translated.len(),
                    pending.len()
                );
                return Err(e);
            }

            let mut translated = translated.into_iter();
            for line in chunk {
                if line.trim().is_empty() {
                    out.push(line.clone());
                } else {
                    out.push(translated.next().unwrap_or_default());
                }
            }
        }

        Ok(out)
    }
}

/// Convert language code to human-readable name for prompts
fn language_name(lang: &Lang) -> &'static str {
    match lang.as_str() {
        "en" => "English",
        "zh-CN" => "Simplified Chinese",
        "zh-TW" => "Traditional Chinese",
        "ja" => "Japanese",
        "ko" => "Korean",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "it" => "Italian",
        "nl" => "Dutch",
        "pt" => "Portuguese",
        "pl" => "Polish",
        "ru" => "Russian",
        // For unknown languages, the LLM should still understand most ISO codes
        _ => "the specified language",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// Read one HTTP request and return its body
    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .filter_map(|l| l.split_once(':'))
                    .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    return text[end + 4..].to_string();
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Serve one canned completion per connection, recording the prompts
    async fn serve(replies: Vec<&'static str>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&prompts);

        tokio::spawn(async move {
            for reply in replies {
                let (mut socket, _) = listener.accept().await.unwrap();
                let body = read_request(&mut socket).await;
                let request: serde_json::Value = serde_json::from_str(&body).unwrap();
                seen.lock()
                    .unwrap()
                    .push(request["messages"][0]["content"].as_str().unwrap().to_string());

                let payload =
                    serde_json::json!({ "choices": [{ "message": { "content": reply } }] }).to_string();
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    payload.len(),
                    payload
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
        });

        (format!("http://{addr}/v1"), prompts)
    }

    fn translator(api_base: String) -> OpenAiTranslator {
        OpenAiTranslator::new(api_base, None, "model".to_string(), 1, 0)
            .unwrap()
            .with_batch_size(2)
    }

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn test_batches_keep_blank_lines_in_place() {
        let (api_base, prompts) = serve(vec![r#"["Front"]"#, r#"["Back"]"#]).await;
        let out = translator(api_base)
            .translate_lines(
                &lines(&["Devant", "", " ", "", "Dos"]),
                &Lang::new("fr"),
                &Lang::new("en"),
            )
            .await
            .unwrap();

        assert_eq!(out, lines(&["Front", "", " ", "", "Back"]));

        // The all-blank middle batch never reaches the backend
        let prompts = prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("exactly 1 strings"));
        assert!(prompts[0].contains(r#"["Devant"]"#));
        assert!(prompts[1].contains(r#"["Dos"]"#));
    }

    #[tokio::test]
    async fn test_short_batch_is_an_alignment_error() {
        // A short first batch followed by a long second one must not even out
        let (api_base, prompts) = serve(vec![r#"["A"]"#, r#"["C", "D", "X"]"#]).await;
        let err = translator(api_base)
            .translate_lines(&lines(&["a", "b", "c", "d"]), &Lang::new("fr"), &Lang::new("en"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::AlignmentMismatch {
                stage: "translation",
                expected: 2,
                actual: 1,
            }
        ));
        assert_eq!(prompts.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_language_name() {
        assert_eq!(language_name(&Lang::new("de")), "German");
        assert_eq!(language_name(&Lang::new("zh-CN")), "Simplified Chinese");
        assert_eq!(language_name(&Lang::new("unknown")), "the specified language");
    }

    #[test]
    fn test_prompt_lists_lines_and_count() {
        let prompt = OpenAiTranslator::create_prompt(
            &["Devant", "Dos \"milieu\""],
            &Lang::new("fr"),
            &Lang::new("de"),
        );
        assert!(prompt.contains("from French into German"));
        assert!(prompt.contains("exactly 2 strings"));
        assert!(prompt.contains(r#"["Devant","Dos \"milieu\""]"#));
    }

    #[test]
    fn test_parse_lines_from_wrapped_reply() {
        let reply = "Here you go:\n```json\n[\"Vorderteil\", \" Rückenteil \"]\n```";
        let lines = OpenAiTranslator::parse_lines(reply).unwrap();
        assert_eq!(lines, vec!["Vorderteil", "Rückenteil"]);
    }

    #[test]
    fn test_parse_lines_rejects_prose() {
        assert!(matches!(
            OpenAiTranslator::parse_lines("Vorderteil"),
            Err(Error::TranslationInvalidResponse(_))
        ));
        assert!(matches!(
            OpenAiTranslator::parse_lines("] oops ["),
            Err(Error::TranslationInvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_same_language_passthrough() {
        let translator = OpenAiTranslator::with_defaults(
            "http://127.0.0.1:9".to_string(),
            None,
            "model".to_string(),
        )
        .unwrap();
        let lines = vec!["a".to_string(), String::new()];
        let out = translator
            .translate_lines(&lines, &Lang::new("de"), &Lang::new("de"))
            .await
            .unwrap();
        assert_eq!(out, lines);
    }
}
