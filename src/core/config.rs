use std::env;

const DEFAULT_WELCOME_MESSAGE: &str = "Hello! I'm FloatMind AI, your oceanographic assistant. I can help you analyze ocean data, understand ARGO float operations, interpret climate patterns, and provide insights on marine ecosystems. What would you like to know about the ocean today?";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub storage_path: String,
    pub db_path: String,
    pub chat_api_hostname: String,
    pub chat_api_path: String,
    pub chat_api_key: String,
    pub conversation_title: String,
    pub welcome_message: String,
}

impl AppConfig {
    /// Full URL of the remote streaming chat endpoint.
    pub fn chat_url(&self) -> String {
        format!(
            "{}/{}",
            self.chat_api_hostname.trim_end_matches('/'),
            self.chat_api_path.trim_start_matches('/')
        )
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let storage_path = env::var("FLOATCHAT_STORAGE_PATH").unwrap_or("./".to_string());
        let db_path = format!("{}/db", storage_path.trim_end_matches('/'));
        let chat_api_hostname = env::var("FLOATCHAT_CHAT_API_HOST")
            .unwrap_or_else(|_| "http://127.0.0.1:54321".to_string());
        let chat_api_path = env::var("FLOATCHAT_CHAT_API_PATH")
            .unwrap_or_else(|_| "/functions/v1/ocean-chat".to_string());
        let chat_api_key = env::var("FLOATCHAT_CHAT_API_KEY")
            .unwrap_or_else(|_| "thiswontworkwithoutakey".to_string());
        let conversation_title = env::var("FLOATCHAT_CONVERSATION_TITLE")
            .unwrap_or_else(|_| "Ocean Data Chat".to_string());
        let welcome_message = env::var("FLOATCHAT_WELCOME_MESSAGE")
            .unwrap_or_else(|_| DEFAULT_WELCOME_MESSAGE.to_string());

        Self {
            storage_path,
            db_path,
            chat_api_hostname,
            chat_api_path,
            chat_api_key,
            conversation_title,
            welcome_message,
        }
    }
}
