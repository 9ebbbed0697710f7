use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use soberly_core::config::{AppConfig, LoadOptions};
use toml::Value;

struct Field {
    key: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(format!("- {} = {} (source: {source})", field.key, field.value));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let api_key = config
        .llm
        .api_key
        .as_ref()
        .map(|key| redact_secret(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());
    let origins = if config.server.allowed_origins.is_empty() {
        "<none>".to_string()
    } else {
        config.server.allowed_origins.join(",")
    };

    vec![
        Field {
            key: "database.url",
            env_keys: &["SOBERLY_DATABASE_URL"],
            value: config.database.url.clone(),
        },
        Field {
            key: "database.max_connections",
            env_keys: &["SOBERLY_DATABASE_MAX_CONNECTIONS"],
            value: config.database.max_connections.to_string(),
        },
        Field {
            key: "database.timeout_secs",
            env_keys: &["SOBERLY_DATABASE_TIMEOUT_SECS"],
            value: config.database.timeout_secs.to_string(),
        },
        Field {
            key: "llm.provider",
            env_keys: &["SOBERLY_LLM_PROVIDER"],
            value: config.llm.provider.as_str().to_string(),
        },
        Field { key: "llm.model", env_keys: &["SOBERLY_LLM_MODEL"], value: config.llm.model.clone() },
        Field {
            key: "llm.base_url",
            env_keys: &["SOBERLY_LLM_BASE_URL"],
            value: config.llm.endpoint_base(),
        },
        Field { key: "llm.api_key", env_keys: &["SOBERLY_LLM_API_KEY"], value: api_key },
        Field {
            key: "llm.timeout_secs",
            env_keys: &["SOBERLY_LLM_TIMEOUT_SECS"],
            value: config.llm.timeout_secs.to_string(),
        },
        Field {
            key: "server.bind_address",
            env_keys: &["SOBERLY_SERVER_BIND_ADDRESS"],
            value: config.server.bind_address.clone(),
        },
        Field {
            key: "server.port",
            env_keys: &["SOBERLY_SERVER_PORT"],
            value: config.server.port.to_string(),
        },
        Field {
            key: "server.allowed_origins",
            env_keys: &["SOBERLY_SERVER_ALLOWED_ORIGINS"],
            value: origins,
        },
        Field {
            key: "chat.max_iterations",
            env_keys: &["SOBERLY_CHAT_MAX_ITERATIONS"],
            value: config.chat.max_iterations.to_string(),
        },
        Field {
            key: "chat.history_window",
            env_keys: &["SOBERLY_CHAT_HISTORY_WINDOW"],
            value: config.chat.history_window.to_string(),
        },
        Field {
            key: "chat.tools_enabled",
            env_keys: &["SOBERLY_CHAT_TOOLS_ENABLED"],
            value: config.chat.tools_enabled.to_string(),
        },
        Field {
            key: "logging.level",
            env_keys: &["SOBERLY_LOGGING_LEVEL", "SOBERLY_LOG_LEVEL"],
            value: config.logging.level.clone(),
        },
        Field {
            key: "logging.format",
            env_keys: &["SOBERLY_LOGGING_FORMAT", "SOBERLY_LOG_FORMAT"],
            value: format!("{:?}", config.logging.format).to_ascii_lowercase(),
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    ["soberly.toml", "config/soberly.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if config_file_doc.is_some_and(|doc| contains_path(doc, key_path)) {
        let file_path = config_file_path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "config file".to_string());
        return format!("file ({file_path})");
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

/// Keeps a short recognizable prefix such as `sk-` and hides the rest.
fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.split_once('-') {
        Some((prefix, _)) if prefix.len() <= 6 => format!("{prefix}-***"),
        _ => "<redacted>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{contains_path, redact_secret};

    #[test]
    fn secrets_keep_only_short_prefixes() {
        assert_eq!(redact_secret("sk-or-v1-abcdef"), "sk-***");
        assert_eq!(redact_secret("plainsecretvalue"), "<redacted>");
        assert_eq!(redact_secret("verylongprefix-abc"), "<redacted>");
        assert_eq!(redact_secret("   "), "<empty>");
    }

    #[test]
    fn nested_keys_are_found_in_toml_documents() {
        let doc: toml::Value = "[llm]\nmodel = \"llama3.1\"\n".parse().expect("toml");
        assert!(contains_path(&doc, "llm.model"));
        assert!(!contains_path(&doc, "llm.api_key"));
        assert!(!contains_path(&doc, "server.port"));
    }
}
