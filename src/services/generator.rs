//! Boundary to the text generator.
//!
//! Replies are untrusted: [`parse_generation`] turns whatever came back into
//! either a [`Generation`] with defaults filled in or a `Malformed` reason.

use crate::core::error::GenerateError;
use crate::services::llm::{create_llm, LlmClient, LlmConfig};
use crate::utils::text::strip_code_blocks;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;
use std::time::Duration;

pub const DEFAULT_CATEGORY: &str = "Fantasy";

const STORY_SYSTEM_PROMPT: &str = concat!(
    "You write immersive 400-600 word story nodes that end with 2-4 crisp choices. ",
    "Respond as JSON: {title, content, choices: string[]}. Keep it PG-13."
);

const SEED_SYSTEM_PROMPT: &str = concat!(
    "You craft a single, compelling one-sentence story hook (10-25 words), ",
    "no quotes, no preamble. Output JSON: {seed}."
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRequest {
    pub category: String,
    pub seed: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl GenerationRequest {
    /// Blank category becomes the default; blank optional fields are dropped.
    pub fn new(category: &str, seed: &str, direction: Option<&str>, context: Option<&str>) -> Self {
        let category = category.trim();
        Self {
            category: if category.is_empty() {
                DEFAULT_CATEGORY.to_string()
            } else {
                category.to_string()
            },
            seed: seed.trim().to_string(),
            direction: non_blank(direction),
            context: non_blank(context),
        }
    }

    pub fn validate(&self) -> Result<(), GenerateError> {
        if self.seed.is_empty() {
            return Err(GenerateError::EmptySeed);
        }
        Ok(())
    }

    fn user_prompt(&self) -> String {
        let mut prompt = format!("Category: {}\nSeed: {}\n", self.category, self.seed);
        if let Some(context) = &self.context {
            prompt.push_str(&format!("Current Node:\n{}\n", context));
        }
        if let Some(direction) = &self.direction {
            prompt.push_str(&format!("Player Direction:\n{}\n", direction));
        }
        prompt
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Generation {
    pub title: String,
    pub content: String,
    pub choices: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedGeneration {
    Parsed(Generation),
    Malformed(String),
}

impl ParsedGeneration {
    pub fn into_result(self) -> Result<Generation, GenerateError> {
        match self {
            ParsedGeneration::Parsed(g) => Ok(g),
            ParsedGeneration::Malformed(reason) => Err(GenerateError::Malformed(reason)),
        }
    }
}

fn fallback_title(category: &str) -> String {
    format!("{} - Generated Node", category)
}

pub fn parse_generation(raw: &str, category: &str) -> ParsedGeneration {
    let body = strip_code_blocks(raw);
    if body.is_empty() {
        return ParsedGeneration::Malformed("empty response".to_string());
    }

    match serde_json::from_str::<Value>(&body) {
        Ok(Value::Object(map)) => {
            let title = map.get("title").and_then(Value::as_str).map(str::trim);
            let content = map.get("content").and_then(Value::as_str);
            if title.is_none() && content.is_none() {
                if let Some(error) = map.get("error").and_then(Value::as_str) {
                    return ParsedGeneration::Malformed(error.to_string());
                }
            }
            let choices = match map.get("choices") {
                Some(Value::Array(items)) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
                _ => Vec::new(),
            };
            ParsedGeneration::Parsed(Generation {
                title: title
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| fallback_title(category)),
                content: content.unwrap_or_default().to_string(),
                choices,
            })
        }
        Ok(Value::String(text)) if !text.trim().is_empty() => {
            log::warn!("Generator reply was a bare JSON string; keeping it as prose");
            prose(text.trim().to_string(), category)
        }
        Ok(other) => ParsedGeneration::Malformed(format!("expected a JSON object, got {}", other)),
        Err(_) => {
            log::warn!("Generator reply was not JSON; keeping it as prose");
            prose(body, category)
        }
    }
}

fn prose(content: String, category: &str) -> ParsedGeneration {
    ParsedGeneration::Parsed(Generation {
        title: fallback_title(category),
        content,
        choices: vec!["Continue".to_string(), "Rewind".to_string()],
    })
}

pub fn parse_seed(raw: &str) -> Option<String> {
    let body = strip_code_blocks(raw);
    let seed = match serde_json::from_str::<Value>(&body) {
        Ok(value) => value.get("seed").and_then(Value::as_str)?.trim().to_string(),
        Err(_) => body.lines().next().unwrap_or_default().trim().to_string(),
    };
    (!seed.is_empty()).then_some(seed)
}

#[async_trait]
pub trait StoryGenerator: Send + Sync + Debug {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, GenerateError>;
    async fn seed(&self, category: &str) -> Result<String, GenerateError>;
}

#[derive(Debug)]
pub struct LlmStoryGenerator {
    llm: Box<dyn LlmClient>,
    retry_count: usize,
    retry_delay: Duration,
}

impl LlmStoryGenerator {
    pub fn new(llm: Box<dyn LlmClient>, retry_count: usize, retry_delay: Duration) -> Self {
        Self {
            llm,
            retry_count,
            retry_delay,
        }
    }

    async fn chat_with_retry(&self, system: &str, user: &str) -> Result<String, GenerateError> {
        let mut attempt = 0;
        loop {
            match self.llm.chat(system, user).await {
                Ok(reply) => return Ok(reply),
                Err(e) if attempt < self.retry_count => {
                    attempt += 1;
                    log::warn!(
                        "LLM call failed ({}), retry {}/{} in {:?}",
                        e,
                        attempt,
                        self.retry_count,
                        self.retry_delay
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(GenerateError::Provider(format!("{:#}", e))),
            }
        }
    }
}

#[async_trait]
impl StoryGenerator for LlmStoryGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, GenerateError> {
        request.validate()?;
        log::debug!("Generating node: {}", serde_json::to_string(request).unwrap_or_default());
        let reply = self
            .chat_with_retry(STORY_SYSTEM_PROMPT, &request.user_prompt())
            .await?;
        parse_generation(&reply, &request.category).into_result()
    }

    async fn seed(&self, category: &str) -> Result<String, GenerateError> {
        let reply = self
            .chat_with_retry(SEED_SYSTEM_PROMPT, &format!("Category: {}", category))
            .await?;
        parse_seed(&reply).ok_or_else(|| GenerateError::Malformed("no seed in reply".to_string()))
    }
}

/// Offline generator used when no provider is configured.
#[derive(Debug, Default)]
pub struct StubGenerator;

#[async_trait]
impl StoryGenerator for StubGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, GenerateError> {
        request.validate()?;
        let mut content = format!(
            "Stub node (no provider configured).\n\nSeed: {}\n",
            request.seed
        );
        if let Some(context) = &request.context {
            content.push_str(&format!("Context: {}\n", context));
        }
        if let Some(direction) = &request.direction {
            content.push_str(&format!("Direction: {}\n", direction));
        }
        content.push_str("Write a short scene and give choices.");
        Ok(Generation {
            title: format!("{} - Stub Node", request.category),
            content,
            choices: vec![
                "Continue".to_string(),
                "Go back".to_string(),
                "Try something bold".to_string(),
            ],
        })
    }

    async fn seed(&self, category: &str) -> Result<String, GenerateError> {
        Ok(format!(
            "A fresh {} hook about an unusual discovery at dawn.",
            category.to_lowercase()
        ))
    }
}

pub fn create_generator(config: &LlmConfig) -> Box<dyn StoryGenerator> {
    if config.provider == "stub" {
        log::warn!("Using the offline stub generator");
        return Box::new(StubGenerator);
    }
    match create_llm(config) {
        Ok(llm) => Box::new(LlmStoryGenerator::new(
            llm,
            config.retry_count,
            Duration::from_secs(config.retry_delay_seconds),
        )),
        Err(e) => {
            log::warn!("{:#}; falling back to the offline stub generator", e);
            Box::new(StubGenerator)
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::{Arc, Mutex};

    #[derive(Debug)]
    struct MockLlmClient {
        replies: Mutex<Vec<anyhow::Result<String>>>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl MockLlmClient {
        fn new(mut replies: Vec<anyhow::Result<String>>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                prompts: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl LlmClient for MockLlmClient {
        async fn chat(&self, _system: &str, user: &str) -> anyhow::Result<String> {
            self.prompts.lock().unwrap().push(user.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(anyhow!("exhausted")))
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest::new(
            "Mystery",
            "The clock chimed thirteen.",
            Some("open the door"),
            Some("A hallway."),
        )
    }

    #[test]
    fn test_parse_full_object() {
        let raw = r#"{"title":"T","content":"C","choices":["left","right"]}"#;
        assert_eq!(
            parse_generation(raw, "Fantasy"),
            ParsedGeneration::Parsed(Generation {
                title: "T".to_string(),
                content: "C".to_string(),
                choices: vec!["left".to_string(), "right".to_string()],
            })
        );
    }

    #[test]
    fn test_parse_fills_defaults_and_drops_bad_choices() {
        let raw = "```json\n{\"choices\": [\"ok\", 3, null, \"  \", \"fine\"]}\n```";
        let ParsedGeneration::Parsed(g) = parse_generation(raw, "Horror") else {
            panic!("expected parsed");
        };
        assert_eq!(g.title, "Horror - Generated Node");
        assert_eq!(g.content, "");
        assert_eq!(g.choices, vec!["ok".to_string(), "fine".to_string()]);

        let raw = r#"{"title":"X","choices":"nope"}"#;
        let ParsedGeneration::Parsed(g) = parse_generation(raw, "Horror") else {
            panic!("expected parsed");
        };
        assert!(g.choices.is_empty());
    }

    #[test]
    fn test_parse_prose_is_recovered() {
        let raw = "The door creaks open.";
        let ParsedGeneration::Parsed(g) = parse_generation(raw, "Mystery") else {
            panic!("expected parsed");
        };
        assert_eq!(g.title, "Mystery - Generated Node");
        assert_eq!(g.content, "The door creaks open.");
        assert_eq!(g.choices, vec!["Continue".to_string(), "Rewind".to_string()]);
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(parse_generation("   ", "Fantasy"), ParsedGeneration::Malformed(_)));
        assert!(matches!(parse_generation("[1,2]", "Fantasy"), ParsedGeneration::Malformed(_)));
        assert_eq!(
            parse_generation(r#"{"error":"quota exceeded"}"#, "Fantasy"),
            ParsedGeneration::Malformed("quota exceeded".to_string())
        );
    }

    #[test]
    fn test_parse_bare_json_string_is_prose() {
        let parsed = parse_generation(r#""The door creaks.""#, "Horror");
        assert_eq!(
            parsed,
            ParsedGeneration::Parsed(Generation {
                title: "Horror - Generated Node".to_string(),
                content: "The door creaks.".to_string(),
                choices: vec!["Continue".to_string(), "Rewind".to_string()],
            })
        );
        assert!(matches!(
            parse_generation(r#""   ""#, "Horror"),
            ParsedGeneration::Malformed(_)
        ));
    }

    #[test]
    fn test_parse_seed() {
        assert_eq!(
            parse_seed(r#"{"seed":"  A fox leaves footprints. "}"#).as_deref(),
            Some("A fox leaves footprints.")
        );
        assert_eq!(parse_seed("A bare hook\nsecond line").as_deref(), Some("A bare hook"));
        assert_eq!(parse_seed(r#"{"seed":""}"#), None);
        assert_eq!(parse_seed(r#"{}"#), None);
    }

    #[test]
    fn test_request_normalizes_fields() {
        let r = GenerationRequest::new("  ", " seed ", Some("   "), None);
        assert_eq!(r.category, DEFAULT_CATEGORY);
        assert_eq!(r.seed, "seed");
        assert_eq!(r.direction, None);
        assert!(GenerationRequest::new("x", "  ", None, None).validate().is_err());
    }

    #[test]
    fn test_prompt_contains_context_and_direction() {
        let prompt = request().user_prompt();
        assert!(prompt.contains("Category: Mystery"));
        assert!(prompt.contains("Current Node:\nA hallway."));
        assert!(prompt.contains("Player Direction:\nopen the door"));
    }

    #[tokio::test]
    async fn test_llm_generator_retries_then_parses() {
        let llm = MockLlmClient::new(vec![
            Err(anyhow!("503")),
            Ok(r#"{"title":"Hall","content":"Dust.","choices":["On"]}"#.to_string()),
        ]);
        let prompts = llm.prompts.clone();
        let generator = LlmStoryGenerator::new(Box::new(llm), 2, Duration::from_millis(1));

        let g = generator.generate(&request()).await.unwrap();
        assert_eq!(g.title, "Hall");
        assert_eq!(prompts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_llm_generator_gives_up_after_retries() {
        let llm = MockLlmClient::new(vec![Err(anyhow!("down")), Err(anyhow!("still down"))]);
        let generator = LlmStoryGenerator::new(Box::new(llm), 1, Duration::from_millis(1));
        let err = generator.generate(&request()).await.unwrap_err();
        assert!(matches!(err, GenerateError::Provider(msg) if msg.contains("still down")));
    }

    #[tokio::test]
    async fn test_empty_seed_issues_no_request() {
        let llm = MockLlmClient::new(vec![]);
        let prompts = llm.prompts.clone();
        let generator = LlmStoryGenerator::new(Box::new(llm), 0, Duration::from_millis(1));
        let r = GenerationRequest::new("Fantasy", "", None, None);
        assert!(matches!(generator.generate(&r).await, Err(GenerateError::EmptySeed)));
        assert!(prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stub_generator_is_deterministic() {
        let a = StubGenerator.generate(&request()).await.unwrap();
        let b = StubGenerator.generate(&request()).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.title, "Mystery - Stub Node");
        assert!(a.content.contains("Direction: open the door"));
        assert_eq!(a.choices.len(), 3);
        assert_eq!(
            StubGenerator.seed("Space Opera").await.unwrap(),
            "A fresh space opera hook about an unusual discovery at dawn."
        );
    }

    #[test]
    fn test_create_generator_falls_back_to_stub() {
        let config = LlmConfig {
            provider: "openai".to_string(),
            ..LlmConfig::default()
        };
        let generator = create_generator(&config);
        assert!(format!("{:?}", generator).contains("StubGenerator"));
    }
}
