use super::*;

fn config_with_size(chunk_size: usize) -> ChunkingConfig {
    ChunkingConfig {
        chunk_size,
        ..ChunkingConfig::default()
    }
}

fn doc(id: &str) -> DocumentId {
    DocumentId::new(id)
}

#[test]
fn three_short_paragraphs_fit_in_one_chunk() {
    let chunks = split_document(
        "Para1.\n\nPara2.\n\nPara3.",
        &doc("foo"),
        &ChunkingConfig::default(),
    )
    .expect("split should succeed");

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, "Para1.\n\nPara2.\n\nPara3.");
    assert_eq!(chunks[0].position_index, 0);
    assert_eq!(chunks[0].document_id, doc("foo"));
}

#[test]
fn small_chunk_size_yields_one_chunk_per_paragraph() {
    let chunks = split_document("Para1.\n\nPara2.\n\nPara3.", &doc("foo"), &config_with_size(10))
        .expect("split should succeed");

    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["Para1.", "Para2.", "Para3."]);
    let positions: Vec<usize> = chunks.iter().map(|c| c.position_index).collect();
    assert_eq!(positions, vec![0, 1, 2]);
}

#[test]
fn empty_input_yields_no_chunks() {
    let config = ChunkingConfig::default();
    assert!(
        split_document("", &doc("empty"), &config)
            .expect("split should succeed")
            .is_empty()
    );
    assert!(
        split_document("  \n\n \n\n\t", &doc("blank"), &config)
            .expect("split should succeed")
            .is_empty()
    );
}

#[test]
fn text_without_blank_lines_is_single_chunk() {
    let text = "line one\nline two\nline three";
    let chunks = split_document(text, &doc("lines"), &config_with_size(5))
        .expect("split should succeed");

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, text);
}

#[test]
fn final_buffer_is_emitted_without_trailing_blank_line() {
    let chunks = split_document("alpha\n\nbeta", &doc("tail"), &config_with_size(5))
        .expect("split should succeed");

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[1].text, "beta");
}

#[test]
fn oversized_paragraph_is_emitted_whole() {
    // A single paragraph longer than the limit is never cut internally.
    let long_paragraph = "word ".repeat(50);
    let text = format!("short\n\n{}\n\nafter", long_paragraph);
    let chunks = split_document(&text, &doc("long"), &config_with_size(20))
        .expect("split should succeed");

    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].text, "short");
    assert_eq!(chunks[1].text, long_paragraph.trim());
    assert!(chunks[1].text.chars().count() > 20);
    assert_eq!(chunks[2].text, "after");
}

#[test]
fn chunks_respect_size_bound() {
    let paragraphs: Vec<String> = (0..40)
        .map(|i| format!("Paragraph number {} has a little bit of text.", i))
        .collect();
    let text = paragraphs.join("\n\n");
    let config = config_with_size(120);

    let chunks = split_document(&text, &doc("bound"), &config).expect("split should succeed");

    assert!(chunks.len() > 1);
    for chunk in &chunks {
        assert!(
            chunk.text.chars().count() <= config.chunk_size,
            "chunk {} exceeds limit: {}",
            chunk.position_index,
            chunk.text.chars().count()
        );
    }

    // Nothing is lost or reordered
    let rejoined = chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    assert_eq!(rejoined, text);
}

#[test]
fn size_is_measured_in_characters() {
    // Each paragraph is 4 characters but 8 bytes.
    let text = "éééé\n\nüüüü";
    let chunks = split_document(text, &doc("utf8"), &config_with_size(10))
        .expect("split should succeed");

    assert_eq!(chunks.len(), 1);
}

#[test]
fn chunking_is_deterministic() {
    let text = "One.\n\nTwo two.\n\nThree three three.\n\nFour.";
    let config = config_with_size(12);
    let first = split_document(text, &doc("same"), &config).expect("split should succeed");
    let second = split_document(text, &doc("same"), &config).expect("split should succeed");

    assert_eq!(first, second);
}

#[test]
fn overlap_prefixes_tail_of_previous_chunk() {
    let config = ChunkingConfig {
        chunk_size: 10,
        chunk_overlap: 3,
    };
    let chunks = split_document("Para1.\n\nPara2.\n\nPara3.", &doc("overlap"), &config)
        .expect("split should succeed");

    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].text, "Para1.");
    assert_eq!(chunks[1].text, "a1.\n\nPara2.");
    assert_eq!(chunks[2].text, "a2.\n\nPara3.");
    for chunk in &chunks {
        assert!(chunk.text.chars().count() <= config.chunk_size + config.chunk_overlap + 2);
    }
}

#[test]
fn overlap_longer_than_previous_chunk_copies_it_whole() {
    let config = ChunkingConfig {
        chunk_size: 10,
        chunk_overlap: 8,
    };
    let chunks = split_document("ab\n\nsomething long", &doc("short-prev"), &config)
        .expect("split should succeed");

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[1].text, "ab\n\nsomething long");
}

#[test]
fn blank_document_id_is_rejected() {
    let result = split_document("text", &doc("   "), &ChunkingConfig::default());
    assert_eq!(result, Err(ChunkingError::EmptyDocumentId));
}

#[test]
fn invalid_configuration_is_rejected() {
    let zero = config_with_size(0);
    assert_eq!(
        split_document("text", &doc("x"), &zero),
        Err(ChunkingError::InvalidChunkSize(0))
    );

    let overlap = ChunkingConfig {
        chunk_size: 10,
        chunk_overlap: 10,
    };
    assert_eq!(
        split_document("text", &doc("x"), &overlap),
        Err(ChunkingError::OverlapTooLarge {
            overlap: 10,
            chunk_size: 10
        })
    );
}

#[test]
fn derived_ids_depend_on_content_and_name() {
    let first = DocumentId::derive(b"%PDF-1.4 same bytes", "report.pdf");
    let again = DocumentId::derive(b"%PDF-1.4 same bytes", "report.pdf");
    let renamed = DocumentId::derive(b"%PDF-1.4 same bytes", "copy.pdf");
    let edited = DocumentId::derive(b"%PDF-1.4 other bytes", "report.pdf");

    assert_eq!(first, again);
    assert_ne!(first, renamed);
    assert_ne!(first, edited);

    let (name_part, content_part) = first
        .as_str()
        .split_once('-')
        .expect("derived id has two parts");
    assert_eq!(name_part.len(), 8);
    assert_eq!(content_part.len(), 16);
    assert!(first.as_str().chars().all(|c| c == '-' || c.is_ascii_hexdigit()));
}

#[test]
fn document_id_display_and_conversions() {
    let id = DocumentId::from("abc-123");
    assert_eq!(id.to_string(), "abc-123");
    assert_eq!(DocumentId::from(String::from("abc-123")), id);
    assert!(DocumentId::new("").is_blank());
}
