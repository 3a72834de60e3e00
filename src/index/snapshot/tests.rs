use super::*;
use std::io::Cursor;
use tempfile::TempDir;

fn sample_index() -> VectorIndex {
    let mut index = VectorIndex::new(3);
    index
        .add(vec![
            IndexEntry {
                chunk: Chunk {
                    text: "First paragraph.".to_string(),
                    position_index: 0,
                    document_id: DocumentId::from("alpha"),
                },
                vector: vec![0.1, -0.2, 0.3],
            },
            IndexEntry {
                chunk: Chunk {
                    text: "Ünïcödé second 📄".to_string(),
                    position_index: 1,
                    document_id: DocumentId::from("alpha"),
                },
                vector: vec![1.5, 0.0, -7.25],
            },
            IndexEntry {
                chunk: Chunk {
                    text: String::new(),
                    position_index: 0,
                    document_id: DocumentId::from("beta"),
                },
                vector: vec![0.0, 0.0, 0.0],
            },
        ])
        .expect("entries should be added");
    index
}

fn encode(index: &VectorIndex) -> Vec<u8> {
    let mut bytes = Vec::new();
    write_snapshot(index, &mut bytes).expect("should write snapshot");
    bytes
}

#[test]
fn header_layout() {
    let bytes = encode(&sample_index());

    assert_eq!(bytes.get(0..4), Some(3_u32.to_le_bytes().as_slice()));
    assert_eq!(bytes.get(4..8), Some(3_u32.to_le_bytes().as_slice()));
    // first record: id length, then the id itself
    assert_eq!(bytes.get(8..12), Some(5_u32.to_le_bytes().as_slice()));
    assert_eq!(bytes.get(12..17), Some(b"alpha".as_slice()));
}

#[test]
fn snapshot_restores_index() {
    let index = sample_index();
    let bytes = encode(&index);

    let restored = read_snapshot(&mut Cursor::new(bytes)).expect("should read snapshot");

    assert_eq!(restored, index);
    assert_eq!(restored.count(), 3);
    assert_eq!(restored.vector_count(), 3);
}

#[test]
fn restored_index_ranks_identically() {
    let index = sample_index();
    let restored =
        read_snapshot(&mut Cursor::new(encode(&index))).expect("should read snapshot");

    let query = [1.0, 0.0, -7.0];
    assert_eq!(
        index.search(&query, 3).expect("search should succeed"),
        restored.search(&query, 3).expect("search should succeed")
    );
}

#[test]
fn empty_index_round_trips() {
    let index = VectorIndex::new(768);
    let bytes = encode(&index);
    assert_eq!(bytes.len(), 8);

    let restored = read_snapshot(&mut Cursor::new(bytes)).expect("should read snapshot");
    assert!(restored.is_empty());
    assert_eq!(restored.dimension(), 768);
}

#[test]
fn truncated_snapshot_is_rejected() {
    let bytes = encode(&sample_index());

    for cut in [2, 6, 10, 14, bytes.len() - 1] {
        let truncated = bytes.get(..cut).expect("cut within bounds").to_vec();
        let result = read_snapshot(&mut Cursor::new(truncated));
        assert!(
            matches!(result, Err(SnapshotError::Truncated(_))),
            "cut at {} gave {:?}",
            cut,
            result
        );
    }
}

#[test]
fn zero_dimension_header_is_rejected() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&0_u32.to_le_bytes());
    bytes.extend_from_slice(&0_u32.to_le_bytes());

    assert!(matches!(
        read_snapshot(&mut Cursor::new(bytes)),
        Err(SnapshotError::InvalidHeader(_))
    ));
}

#[test]
fn invalid_utf8_is_rejected() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&1_u32.to_le_bytes());
    bytes.extend_from_slice(&1_u32.to_le_bytes());
    bytes.extend_from_slice(&2_u32.to_le_bytes());
    bytes.extend_from_slice(&[0xff, 0xfe]);

    assert!(matches!(
        read_snapshot(&mut Cursor::new(bytes)),
        Err(SnapshotError::InvalidUtf8("document_id"))
    ));
}

#[test]
fn non_finite_values_are_rejected() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&1_u32.to_le_bytes());
    bytes.extend_from_slice(&1_u32.to_le_bytes());
    bytes.extend_from_slice(&3_u32.to_le_bytes());
    bytes.extend_from_slice(b"doc");
    bytes.extend_from_slice(&0_u32.to_le_bytes());
    bytes.extend_from_slice(&0_u32.to_le_bytes());
    bytes.extend_from_slice(&f32::NAN.to_le_bytes());

    assert!(matches!(
        read_snapshot(&mut Cursor::new(bytes)),
        Err(SnapshotError::NonFinite { position: 0 })
    ));
}

#[test]
fn empty_document_id_is_rejected() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&1_u32.to_le_bytes());
    bytes.extend_from_slice(&1_u32.to_le_bytes());
    bytes.extend_from_slice(&0_u32.to_le_bytes());

    assert!(matches!(
        read_snapshot(&mut Cursor::new(bytes)),
        Err(SnapshotError::EmptyDocumentId { position: 0 })
    ));
}

#[test]
fn save_and_load_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("nested").join("index.bin");
    let index = sample_index();

    save(&index, &path).expect("should save snapshot");
    assert!(path.exists());
    assert!(!temp_dir.path().join("nested").join("index.bin.tmp").exists());

    let loaded = load(&path).expect("should load snapshot");
    assert_eq!(loaded, index);
}

#[test]
fn save_replaces_existing_snapshot() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("index.bin");

    save(&sample_index(), &path).expect("should save snapshot");
    let mut smaller = sample_index();
    smaller.remove(&DocumentId::from("alpha"));
    save(&smaller, &path).expect("should save snapshot again");

    let loaded = load(&path).expect("should load snapshot");
    assert_eq!(loaded.count(), 1);
}

#[test]
fn load_missing_file_is_io_error() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    assert!(matches!(
        load(temp_dir.path().join("absent.bin")),
        Err(SnapshotError::Io(_))
    ));
}
