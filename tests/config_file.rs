//! Config files on disk driving real components.

use signstream::config::Config;
use signstream::dictionary::Dictionary;
use signstream::engine::{FlushTrigger, TokenEngine};
use signstream::error::SignstreamError;
use signstream::suggest::SuggestionRanker;
use std::io::Write;
use std::time::{Duration, Instant};
use tempfile::{NamedTempFile, TempDir};

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn config_file_tunes_the_engine() {
    let file = write_config(
        r#"
        [stabilizer]
        window = 3
        consensus = 2
        switch_cooldown_ms = 100

        [accumulator]
        idle_flush_ms = 400
        "#,
    );
    let config = Config::load(file.path()).unwrap();
    config.validate().unwrap();

    let dictionary = std::sync::Arc::new(Dictionary::from_words(["HI"]));
    let mut engine = TokenEngine::new(config.engine_config(), dictionary);
    let base = Instant::now();
    let at = |ms: u64| base + Duration::from_millis(ms);

    // Two of three is enough with this window.
    engine.push_label("H", at(0));
    engine.push_label("H", at(30));
    assert_eq!(engine.push_label("X", at(60)).len(), 1);
    assert_eq!(engine.buffer(), "H");

    for t in [200, 230, 260] {
        engine.push_label("I", at(t));
    }
    assert_eq!(engine.buffer(), "HI");

    // The shorter idle period flushes well before the default would.
    let report = engine.poll(at(800)).unwrap();
    assert_eq!(report.trigger, FlushTrigger::Idle);
    assert_eq!(report.settled_words, vec!["HI"]);
}

#[test]
fn dictionary_path_from_config_is_loaded() {
    let dir = TempDir::new().unwrap();
    let words = dir.path().join("words.txt");
    std::fs::write(&words, "# greetings\nhowdy 120\nHEY\n").unwrap();

    let file = write_config(&format!(
        "[dictionary]\npath = \"{}\"\n",
        words.display()
    ));
    let config = Config::load(file.path()).unwrap();
    let dictionary = Dictionary::load(config.dictionary.path.as_deref()).unwrap();

    assert_eq!(dictionary.len(), 2);
    assert!(dictionary.contains("HOWDY"));
    assert!(dictionary.contains("HEY"));
}

#[test]
fn missing_dictionary_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.txt");
    match Dictionary::load(Some(&missing)) {
        Err(SignstreamError::DictionaryLoad { path, .. }) => assert!(path.contains("nope.txt")),
        other => panic!("Expected DictionaryLoad error, got {:?}", other.map(|d| d.len())),
    }
}

#[test]
fn invalid_values_are_rejected_after_loading() {
    let file = write_config("[stabilizer]\nwindow = 2\nconsensus = 3\n");
    let config = Config::load(file.path()).unwrap();
    match config.validate() {
        Err(SignstreamError::ConfigInvalidValue { key, .. }) => {
            assert_eq!(key, "stabilizer.consensus")
        }
        other => panic!("Expected ConfigInvalidValue, got {:?}", other),
    }
}

#[test]
fn oversized_suggestion_limit_is_rejected_and_capped() {
    let file = write_config("[suggestions]\nmax_suggestions = 5\n");
    let config = Config::load(file.path()).unwrap();
    match config.validate() {
        Err(SignstreamError::ConfigInvalidValue { key, .. }) => {
            assert_eq!(key, "suggestions.max_suggestions")
        }
        other => panic!("Expected ConfigInvalidValue, got {:?}", other),
    }

    // Built without validation, the ranker still stops at three.
    let dictionary = std::sync::Arc::new(Dictionary::from_words([
        "GA", "GB", "GC", "GD", "GE", "GF",
    ]));
    let ranker = SuggestionRanker::new(dictionary, config.engine_config().suggestions);
    assert_eq!(ranker.suggest("G").len(), 3);
}

#[test]
fn written_defaults_load_back_identically() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("signstream").join("config.toml");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, Config::default().to_toml().unwrap()).unwrap();

    assert_eq!(Config::load_or_default(&path).unwrap(), Config::default());
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let config = Config::load_or_default(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, Config::default());
    assert!(Config::load(&dir.path().join("absent.toml")).is_err());
}
