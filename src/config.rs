use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub keybindings: Keybindings,
    /// Directory holding the scraper exports (`contacts.json`,
    /// `<username>.json`).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Root directory for exported Markdown/JSON documents.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("inbox-data")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("exports")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keybindings {
    pub next_panel: Vec<String>,
    pub prev_panel: Vec<String>,
    pub move_up: Vec<String>,
    pub move_down: Vec<String>,
    pub fetch_contacts: Vec<String>,
    pub extract: Vec<String>,
    pub export: Vec<String>,
    pub cycle_date_format: Vec<String>,
    pub quit: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            keybindings: Keybindings {
                next_panel: vec!["l".to_string(), "Right".to_string(), "Tab".to_string()],
                prev_panel: vec!["h".to_string(), "Left".to_string(), "BackTab".to_string()],
                move_up: vec!["k".to_string(), "Up".to_string()],
                move_down: vec!["j".to_string(), "Down".to_string()],
                fetch_contacts: vec!["c".to_string()],
                extract: vec!["e".to_string(), "Enter".to_string()],
                export: vec!["s".to_string()],
                cycle_date_format: vec!["f".to_string()],
                quit: vec!["q".to_string()],
            },
            data_dir: default_data_dir(),
            output_dir: default_output_dir(),
        }
    }
}

pub fn parse_key_string(key_str: &str) -> (KeyCode, KeyModifiers) {
    let mut parts: Vec<&str> = key_str.split('-').collect();
    let mut modifiers = KeyModifiers::empty();

    let base_key_str = parts.pop().unwrap_or("");

    for part in parts {
        match part.to_lowercase().as_str() {
            "ctrl" => modifiers.insert(KeyModifiers::CONTROL),
            "alt" => modifiers.insert(KeyModifiers::ALT),
            "shift" => modifiers.insert(KeyModifiers::SHIFT),
            _ => {}
        }
    }

    let code = match base_key_str {
        "Enter" => KeyCode::Enter,
        "Left" => KeyCode::Left,
        "Right" => KeyCode::Right,
        "Up" => KeyCode::Up,
        "Down" => KeyCode::Down,
        "Tab" => KeyCode::Tab,
        "BackTab" => KeyCode::BackTab,
        "Esc" => KeyCode::Esc,
        s if s.chars().count() == 1 => KeyCode::Char(s.chars().next().unwrap_or(' ')),
        _ => KeyCode::Null,
    };

    (code, modifiers)
}

pub fn matches_key(event: KeyEvent, bindings: &[String]) -> bool {
    bindings.iter().any(|b| {
        let (code, modifiers) = parse_key_string(b);
        event.code == code && event.modifiers.contains(modifiers)
    })
}

impl Config {
    pub fn load() -> Self {
        use std::fs;
        if let Ok(content) = fs::read_to_string("settings.toml") {
            if let Ok(config) = toml::from_str(&content) {
                return config;
            }
        }
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_key() {
        assert_eq!(parse_key_string("q"), (KeyCode::Char('q'), KeyModifiers::empty()));
        assert_eq!(parse_key_string("Enter"), (KeyCode::Enter, KeyModifiers::empty()));
    }

    #[test]
    fn test_parse_key_with_modifier() {
        let (code, modifiers) = parse_key_string("ctrl-s");
        assert_eq!(code, KeyCode::Char('s'));
        assert!(modifiers.contains(KeyModifiers::CONTROL));
    }

    #[test]
    fn test_matches_key_against_bindings() {
        let bindings = vec!["j".to_string(), "Down".to_string()];
        let event = KeyEvent::new(KeyCode::Char('j'), KeyModifiers::empty());
        assert!(matches_key(event, &bindings));
        let other = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::empty());
        assert!(!matches_key(other, &bindings));
    }
}
