use std::{collections::HashMap, fs};

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub deepseek_api_key: Option<String>,
    pub deepseek_base_url: String,
    pub deepseek_model: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8787".into(),
            database_url: "sqlite://./data/rhythm.db".into(),
            deepseek_api_key: None,
            deepseek_base_url: "https://api.deepseek.com".into(),
            deepseek_model: "deepseek-chat".into(),
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("server.toml") {
        apply_file_overrides(&mut settings, &raw);
    }

    if let Ok(v) = std::env::var("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Ok(v) = std::env::var("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Ok(v) = std::env::var("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Ok(v) = std::env::var("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Ok(v) = std::env::var("DEEPSEEK_API_KEY") {
        settings.deepseek_api_key = Some(v);
    }
    if let Ok(v) = std::env::var("APP__DEEPSEEK_API_KEY") {
        settings.deepseek_api_key = Some(v);
    }

    if let Ok(v) = std::env::var("DEEPSEEK_BASE_URL") {
        settings.deepseek_base_url = v;
    }
    if let Ok(v) = std::env::var("DEEPSEEK_MODEL") {
        settings.deepseek_model = v;
    }

    settings
}

fn apply_file_overrides(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) else {
        return;
    };
    if let Some(v) = file_cfg.get("bind_addr") {
        settings.server_bind = v.clone();
    }
    if let Some(v) = file_cfg.get("database_url") {
        settings.database_url = v.clone();
    }
    if let Some(v) = file_cfg.get("deepseek_api_key") {
        settings.deepseek_api_key = Some(v.clone());
    }
    if let Some(v) = file_cfg.get("deepseek_base_url") {
        settings.deepseek_base_url = v.clone();
    }
    if let Some(v) = file_cfg.get("deepseek_model") {
        settings.deepseek_model = v.clone();
    }
}
