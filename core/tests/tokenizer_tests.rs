use trawl_core::tokenizer::tokenize;

#[test]
fn it_normalizes_and_stems() {
    let words = tokenize("Running Runners RUN! The café's menu.");
    // Stemming to "run" should appear
    assert!(words.contains(&"run".to_string()));
    // Unicode normalization keeps the accented form lowercase
    assert!(words.iter().any(|w| w.starts_with("caf")));
}

#[test]
fn it_filters_stopwords() {
    let words = tokenize("The quick brown fox and the lazy dog");
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"and".to_string()));
}

#[test]
fn it_preserves_term_order() {
    let words = tokenize("ocean waves meet ocean shore");
    assert_eq!(words.first().map(String::as_str), Some("ocean"));
    assert_eq!(words.iter().filter(|w| *w == "ocean").count(), 2);
    assert_eq!(words.len(), 5);
}
