use std::{collections::HashMap, fs, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;
use shared::{
    domain::{Question, VoteOption},
    protocol,
};

#[derive(Debug)]
pub struct Settings {
    pub vote_channel: String,
    pub status_channel: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            vote_channel: protocol::VOTE_CHANNEL.to_string(),
            status_channel: protocol::STATUS_CHANNEL.to_string(),
        }
    }
}

/// Defaults, overlaid by `board.toml` if present, overlaid by environment
/// variables.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("board.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("vote_channel") {
                settings.vote_channel = v.clone();
            }
            if let Some(v) = file_cfg.get("status_channel") {
                settings.status_channel = v.clone();
            }
        }
    }

    if let Ok(v) = std::env::var("VOTE_CHANNEL") {
        settings.vote_channel = v;
    }
    if let Ok(v) = std::env::var("APP__VOTE_CHANNEL") {
        settings.vote_channel = v;
    }
    if let Ok(v) = std::env::var("STATUS_CHANNEL") {
        settings.status_channel = v;
    }
    if let Ok(v) = std::env::var("APP__STATUS_CHANNEL") {
        settings.status_channel = v;
    }

    settings
}

#[derive(Debug, Deserialize)]
struct QuestionFile {
    text: String,
    options: Vec<VoteOption>,
}

/// The question set is external input: it comes from a TOML file, never
/// from code.
pub fn load_question(path: &Path) -> Result<Question> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read question file '{}'", path.display()))?;
    let parsed: QuestionFile = toml::from_str(&raw)
        .with_context(|| format!("failed to parse question file '{}'", path.display()))?;
    Question::new(parsed.text, parsed.options).context("invalid question definition")
}

#[cfg(test)]
mod tests {
    use std::{
        env,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;

    #[test]
    fn settings_default_to_the_gateway_channel_names() {
        let settings = Settings::default();
        assert_eq!(settings.vote_channel, "sms-notifications");
        assert_eq!(settings.status_channel, "sms-notifications-votes");
    }

    #[test]
    fn question_file_round_trips_keys_and_image_refs() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = env::temp_dir().join(format!("board_question_{suffix}.toml"));
        fs::write(
            &path,
            r#"
text = "Which biscuit is best?"

[[options]]
key = "A"
text = "Jammy Dodger"
image_ref = "images/jammydodger.jpg"

[[options]]
key = "B"
text = "Oreo"
"#,
        )
        .expect("write question file");

        let question = load_question(&path).expect("load");
        assert_eq!(question.text(), "Which biscuit is best?");
        assert_eq!(question.options().len(), 2);
        assert_eq!(
            question.options()[0].image_ref.as_deref(),
            Some("images/jammydodger.jpg")
        );

        fs::remove_file(path).expect("cleanup");
    }

    #[test]
    fn duplicate_keys_in_the_question_file_are_rejected() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = env::temp_dir().join(format!("board_question_dup_{suffix}.toml"));
        fs::write(
            &path,
            r#"
text = "broken"

[[options]]
key = "A"
text = "first"

[[options]]
key = "A"
text = "second"
"#,
        )
        .expect("write question file");

        assert!(load_question(&path).is_err());
        fs::remove_file(path).expect("cleanup");
    }
}
