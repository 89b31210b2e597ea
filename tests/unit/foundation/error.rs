use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        StageError::invalid_geometry("x")
            .to_string()
            .contains("invalid geometry:")
    );
    assert!(
        StageError::LayerLocked(LayerId::generate())
            .to_string()
            .contains("layer locked:")
    );
    assert!(
        StageError::generation_failed(BackgroundId::generate(), "timeout")
            .to_string()
            .contains("generation failed:")
    );
    assert!(
        StageError::dangling(EntityKind::Background, Uuid::nil())
            .to_string()
            .contains("dangling reference: background")
    );
    assert!(
        StageError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        StageError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
}

#[test]
fn recoverable_kinds() {
    assert!(StageError::LayerLocked(LayerId::generate()).is_recoverable());
    assert!(StageError::generation_failed(BackgroundId::generate(), "x").is_recoverable());
    assert!(!StageError::invalid_geometry("x").is_recoverable());
    assert!(!StageError::dangling(EntityKind::Session, Uuid::nil()).is_recoverable());
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = StageError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
