use std::sync::{Arc, OnceLock};

use anyhow::{anyhow, Context, Result};
use futures::future::BoxFuture;
use regex::Regex;
use reqwest::Client;
use url::Url;

use crate::modules::config::AppConfig;

// Global HTTP client for Ollama
static OLLAMA_CLIENT: OnceLock<Client> = OnceLock::new();

pub fn get_ollama_client() -> &'static Client {
    OLLAMA_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .pool_max_idle_per_host(1)
            .no_proxy() // Ollama is local
            .build()
            .unwrap_or_else(|_| Client::new())
    })
}

const COACH_SYSTEM_PROMPT: &str = "You are an upbeat personal fitness coach inside a workout app. \
Answer in two or three short sentences. Address the user as you.";

pub trait LanguageModel: Send + Sync {
    fn complete<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String>>;
}

pub struct OllamaModel {
    base_url: Url,
    model: String,
}

impl OllamaModel {
    pub fn new(base_url: &str, model: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid Ollama URL: {}", base_url))?;
        Ok(Self { base_url, model: model.to_string() })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(&config.ollama_url, &config.ollama_model)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Invalid Ollama endpoint {}", path))
    }

    pub async fn test_connection(&self) -> bool {
        let Ok(url) = self.endpoint("api/tags") else {
            return false;
        };
        match get_ollama_client().get(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let payload = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "system": COACH_SYSTEM_PROMPT,
            "stream": false,
            "options": {
                "temperature": 0.7,
                "num_predict": 200
            }
        });

        let response = get_ollama_client()
            .post(self.endpoint("api/generate")?)
            .json(&payload)
            .send()
            .await
            .context("Failed to send request to Ollama")?;

        if !response.status().is_success() {
            return Err(anyhow!("Ollama API error: {}", response.status()));
        }

        let result: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        let text = result
            .get("response")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("No response field in Ollama output"))?;
        Ok(text.trim().to_string())
    }
}

impl LanguageModel for OllamaModel {
    fn complete<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.generate(prompt))
    }
}

static FALLBACK_RULES: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();

const GENERIC_REPLY: &str = "I'm your FitQuest coach! Ask me about HIIT, strength training, \
diet, or how leveling up works.";

fn fallback_rules() -> &'static [(Regex, &'static str)] {
    FALLBACK_RULES.get_or_init(|| {
        let rules: [(&str, &'static str); 3] = [
            (
                r"(?i)hiit|strength",
                "Keep rest short and form sharp. Pick a session from your course and push through the final five seconds!",
            ),
            (
                r"(?i)diet|food",
                "Fuel up with lean protein, whole grains and plenty of water. Eat a light snack an hour before training.",
            ),
            (
                r"(?i)level",
                "Every finished workout earns XP. Fill the bar to level up, and workouts scale with your level.",
            ),
        ];
        rules
            .into_iter()
            .filter_map(|(pattern, reply)| Regex::new(pattern).ok().map(|re| (re, reply)))
            .collect()
    })
}

/// Deterministic canned answer keyed on keywords, first match wins.
pub fn fallback_reply(prompt: &str) -> &'static str {
    fallback_rules()
        .iter()
        .find(|(re, _)| re.is_match(prompt))
        .map(|(_, reply)| *reply)
        .unwrap_or(GENERIC_REPLY)
}

/// Chat coach. Never fails: without a usable model it answers from the canned rules.
pub struct ChatAssistant {
    model: Option<Arc<dyn LanguageModel>>,
}

impl ChatAssistant {
    pub fn new(model: Option<Arc<dyn LanguageModel>>) -> Self {
        Self { model }
    }

    pub fn rule_based() -> Self {
        Self { model: None }
    }

    /// Probe the configured Ollama endpoint once; unreachable means rule-based only.
    pub async fn from_config(config: &AppConfig) -> Self {
        if !config.chat_model_enabled {
            return Self::rule_based();
        }
        let model = match OllamaModel::from_config(config) {
            Ok(model) => model,
            Err(e) => {
                log::warn!("Chat model disabled: {}", e);
                return Self::rule_based();
            }
        };
        if model.test_connection().await {
            log::info!("Chat assistant using Ollama model {}", config.ollama_model);
            Self::new(Some(Arc::new(model)))
        } else {
            log::warn!("Ollama not reachable, chat assistant is rule-based");
            Self::rule_based()
        }
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub async fn reply(&self, prompt: &str) -> String {
        if let Some(model) = &self.model {
            match model.complete(prompt).await {
                Ok(text) if !text.is_empty() => return text,
                Ok(_) => log::warn!("Chat model returned an empty answer"),
                Err(e) => log::warn!("Chat model failed, using fallback: {}", e),
            }
        }
        fallback_reply(prompt).to_string()
    }
}
