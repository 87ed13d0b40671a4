use std::env;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub storage_path: String,
    pub db_path: String,
    pub static_root: String,
    pub openai_api_hostname: String,
    // Only used to seed the key store at startup, never persisted
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub system_message: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub history_limit: usize,
    pub status_ttl_secs: u64,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl Default for AppConfig {
    fn default() -> Self {
        let storage_path = env::var("ASKDESK_STORAGE_PATH").unwrap_or("./".to_string());
        let db_path = format!("{}/askdesk.sqlite", storage_path.trim_end_matches('/'));
        let static_root =
            env::var("ASKDESK_STATIC_ROOT").unwrap_or_else(|_| "./public".to_string());
        let openai_api_hostname = env::var("ASKDESK_OPENAI_HOST")
            .unwrap_or_else(|_| "https://api.openai.com".to_string());
        let openai_api_key = env::var("OPENAI_API_KEY").ok();
        let openai_model =
            env::var("ASKDESK_OPENAI_MODEL").unwrap_or_else(|_| "gpt-3.5-turbo".to_string());
        let system_message = env::var("ASKDESK_SYSTEM_MESSAGE")
            .unwrap_or_else(|_| "You are a helpful assistant.".to_string());

        Self {
            storage_path,
            db_path,
            static_root,
            openai_api_hostname,
            openai_api_key,
            openai_model,
            system_message,
            temperature: env_or("ASKDESK_TEMPERATURE", 0.7),
            max_tokens: env_or("ASKDESK_MAX_TOKENS", 1000),
            history_limit: env_or("ASKDESK_HISTORY_LIMIT", 10),
            status_ttl_secs: env_or("ASKDESK_STATUS_TTL_SECS", 5),
        }
    }
}

impl AppConfig {
    pub fn completion_options(&self) -> crate::openai::CompletionOptions {
        crate::openai::CompletionOptions {
            model: self.openai_model.clone(),
            system_prompt: self.system_message.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            ..Default::default()
        }
    }
}
