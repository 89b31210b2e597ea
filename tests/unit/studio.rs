use assert_matches::assert_matches;

use super::*;
use crate::{
    foundation::core::{Timestamp, Vec2},
    persist::blob::MemoryBlobStore,
};

fn captured(w: u32, h: u32, px: [u8; 4]) -> CapturedImage {
    CapturedImage::new(Timestamp::default(), ImageData::filled(w, h, px).unwrap())
}

fn orders(studio: &Studio, comp: CompositionId) -> Vec<u32> {
    studio
        .sorted_layers(comp)
        .unwrap()
        .iter()
        .map(|l| l.order_index())
        .collect()
}

struct Fixture {
    studio: Studio,
    session: SessionId,
    image: ImageId,
    comp: CompositionId,
}

fn fixture() -> Fixture {
    let mut studio = Studio::default();
    let session = studio.create_session("STK-001").unwrap();
    let image = studio
        .ingest_image(session, captured(4, 4, [200, 10, 10, 255]))
        .unwrap();
    let comp = studio.create_composition("Hero", Some(session)).unwrap();
    Fixture {
        studio,
        session,
        image,
        comp,
    }
}

#[test]
fn new_session_defaults() {
    let f = fixture();
    let s = f.studio.session(f.session).unwrap();
    assert_eq!(s.status(), SessionStatus::Planning);
    assert_eq!(s.title(), "STK-001");
    assert_eq!(s.image_ids(), &[f.image]);
    assert_eq!(s.composition_ids(), &[f.comp]);
    assert!(Studio::default().create_session("  ").is_err());
}

#[test]
fn session_mutations_touch() {
    let mut f = fixture();
    let before = f.studio.session(f.session).unwrap().updated_at();
    f.studio
        .set_session_status(f.session, SessionStatus::Completed)
        .unwrap();
    f.studio
        .set_session_status(f.session, SessionStatus::Capturing)
        .unwrap();
    f.studio.set_session_title(f.session, "Red sedan").unwrap();
    f.studio.set_session_notes(f.session, "left side").unwrap();
    assert!(f.studio.add_session_category(f.session, "sedan").unwrap());
    assert!(!f.studio.add_session_category(f.session, "sedan").unwrap());
    assert!(f.studio.remove_session_category(f.session, "sedan").unwrap());
    f.studio
        .set_session_cover(f.session, Some(ImageData::transparent(1, 1).unwrap()))
        .unwrap();
    let s = f.studio.session(f.session).unwrap();
    assert_eq!(s.status(), SessionStatus::Capturing);
    assert_eq!(s.title(), "Red sedan");
    assert!(s.cover_image().is_some());
    assert!(s.updated_at() >= before);
}

#[test]
fn add_layer_copies_pixels_and_appends() {
    let mut f = fixture();
    let a = f.studio.add_layer(f.comp, f.image, LayerKind::Subject).unwrap();
    let b = f
        .studio
        .add_uploaded_layer(f.comp, Some("logo"), ImageData::filled(2, 2, [0, 0, 255, 255]).unwrap())
        .unwrap();
    assert_eq!(orders(&f.studio, f.comp), vec![0, 1]);
    let la = f.studio.layer(a).unwrap();
    assert_eq!(la.source_image(), Some(f.image));
    assert_eq!(la.pixels(), f.studio.image(f.image).unwrap().pixels());
    assert_eq!(f.studio.layer(b).unwrap().kind(), LayerKind::UploadedFile);
    assert_eq!(f.studio.layer(b).unwrap().name(), "logo");
}

#[test]
fn layer_edits_never_reach_the_source_image() {
    let mut f = fixture();
    let a = f.studio.add_layer(f.comp, f.image, LayerKind::Subject).unwrap();
    let b = f.studio.add_layer(f.comp, f.image, LayerKind::Subject).unwrap();
    f.studio.layers.get_mut(&a).unwrap().pixels.as_bytes_mut()[0] = 1;
    assert_eq!(f.studio.image(f.image).unwrap().pixels().pixel(0, 0), Some([200, 10, 10, 255]));
    assert_eq!(f.studio.layer(b).unwrap().pixels().pixel(0, 0), Some([200, 10, 10, 255]));
}

#[test]
fn ingested_raster_is_kept_byte_for_byte() {
    // Low alpha premultiplied values would not survive a trip through straight alpha.
    let raster = ImageData::new(2, 1, vec![3, 1, 0, 4, 0, 0, 0, 0]).unwrap();
    let mut studio = Studio::default();
    let session = studio.create_session("STK-RAW").unwrap();
    let image = studio
        .ingest_image(session, CapturedImage::new(Timestamp::default(), raster.clone()))
        .unwrap();
    assert_eq!(studio.image(image).unwrap().pixels().as_bytes(), raster.as_bytes());

    let mut blobs = MemoryBlobStore::new();
    let snap = studio.export_session(session, &mut blobs).unwrap();
    let mut fresh = Studio::default();
    fresh.import_session(&snap, &blobs).unwrap();
    assert_eq!(fresh.image(image).unwrap().pixels().as_bytes(), raster.as_bytes());
}

#[test]
fn zero_area_layer_is_invalid_geometry() {
    let mut f = fixture();
    let empty = ImageData::new(0, 5, Vec::new()).unwrap();
    assert_matches!(
        f.studio.add_uploaded_layer(f.comp, None, empty),
        Err(StageError::InvalidGeometry(_))
    );
    assert_eq!(f.studio.composition(f.comp).unwrap().layer_count(), 0);
}

#[test]
fn reorder_keeps_identity_and_contiguity() {
    let mut f = fixture();
    let ids: Vec<LayerId> = (0..4)
        .map(|_| f.studio.add_layer(f.comp, f.image, LayerKind::Adjustment).unwrap())
        .collect();
    f.studio.reorder_layer(f.comp, 0, 3).unwrap();
    assert_eq!(
        f.studio.composition(f.comp).unwrap().layer_ids(),
        &[ids[1], ids[2], ids[3], ids[0]]
    );
    assert_eq!(orders(&f.studio, f.comp), vec![0, 1, 2, 3]);
    assert_eq!(f.studio.layer(ids[0]).unwrap().order_index(), 3);

    f.studio.remove_layer(ids[2]).unwrap();
    assert_eq!(orders(&f.studio, f.comp), vec![0, 1, 2]);
    assert_matches!(
        f.studio.reorder_layer(f.comp, 0, 3),
        Err(StageError::Validation(_))
    );
}

#[test]
fn locked_layer_rejects_transform_but_allows_visibility() {
    let mut f = fixture();
    let l = f.studio.add_layer(f.comp, f.image, LayerKind::Subject).unwrap();
    f.studio.set_layer_locked(l, true).unwrap();
    assert_matches!(
        f.studio.set_layer_transform(l, TransformPatch::offset(Vec2::new(5.0, 5.0))),
        Err(StageError::LayerLocked(id)) if id == l
    );
    f.studio.set_layer_visible(l, false).unwrap();
    f.studio.set_layer_opacity(l, 0.25).unwrap();
    f.studio.rename_layer(l, "ghost").unwrap();
    let layer = f.studio.layer(l).unwrap();
    assert_eq!(layer.transform().offset, Vec2::ZERO);
    assert!(!layer.is_visible());
    assert_eq!(layer.opacity(), 0.25);
    assert!(f.studio.visible_layers(f.comp).unwrap().is_empty());
}

#[test]
fn unknown_ids_are_reported() {
    let mut f = fixture();
    assert_matches!(
        f.studio.layer(LayerId::generate()),
        Err(StageError::UnknownEntity { kind: EntityKind::Layer, .. })
    );
    assert_matches!(
        f.studio.add_layer(f.comp, ImageId::generate(), LayerKind::Subject),
        Err(StageError::UnknownEntity { kind: EntityKind::Image, .. })
    );
    assert_matches!(
        f.studio.attach_background(f.comp, BackgroundId::generate()),
        Err(StageError::DanglingReference { kind: EntityKind::Background, .. })
    );
    assert_matches!(
        f.studio.create_composition("x", Some(SessionId::generate())),
        Err(StageError::DanglingReference { kind: EntityKind::Session, .. })
    );
}

#[test]
fn deleting_composition_keeps_referenced_background() {
    let mut f = fixture();
    let bg = f
        .studio
        .import_background(Some(f.session), Category::Automotive, ImageData::transparent(16, 9).unwrap())
        .unwrap();
    f.studio.attach_background(f.comp, bg).unwrap();
    f.studio.add_layer(f.comp, f.image, LayerKind::Subject).unwrap();
    assert_eq!(f.studio.delete_composition(f.comp).unwrap(), 1);
    assert!(f.studio.background(bg).is_ok());
    assert!(f.studio.session(f.session).unwrap().composition_ids().is_empty());
    assert_eq!(f.studio.background(bg).unwrap().aspect_ratio(), "16:9");
}

#[test]
fn deleting_background_clears_links() {
    let mut f = fixture();
    let other = f.studio.create_composition("Alt", None).unwrap();
    let bg = f
        .studio
        .import_background(None, Category::Lifestyle, ImageData::transparent(4, 4).unwrap())
        .unwrap();
    f.studio.attach_background(f.comp, bg).unwrap();
    f.studio.attach_background(other, bg).unwrap();
    assert_eq!(f.studio.delete_background(bg).unwrap(), 2);
    assert_eq!(f.studio.composition(f.comp).unwrap().background(), None);
    assert_eq!(f.studio.composition(other).unwrap().background(), None);
}

#[test]
fn session_delete_cascades_and_unlinks() {
    let mut f = fixture();
    f.studio.add_layer(f.comp, f.image, LayerKind::Subject).unwrap();
    f.studio.add_layer(f.comp, f.image, LayerKind::Adjustment).unwrap();
    let ticket = f
        .studio
        .request_generation(Some(f.session), Category::Restaurant, None, "1:1")
        .unwrap();
    let standalone = f.studio.create_composition("Loose", None).unwrap();
    f.studio.attach_session(standalone, Some(f.session)).unwrap();
    f.studio
        .attach_background(standalone, ticket.background())
        .unwrap();
    let kept_layer = f.studio.add_layer(standalone, f.image, LayerKind::Subject).unwrap();

    let report = f.studio.delete_session(f.session).unwrap();
    assert_eq!(
        report,
        SessionDeletion {
            images: 1,
            compositions: 1,
            layers: 2,
            backgrounds: 1,
            unlinked_compositions: 1,
        }
    );
    let loose = f.studio.composition(standalone).unwrap();
    assert_eq!(loose.session(), None);
    assert_eq!(loose.background(), None);
    let layer = f.studio.layer(kept_layer).unwrap();
    assert_eq!(layer.source_image(), None);
    assert_eq!(f.studio.counts(), (0, 0, 1, 1, 0));
}

#[test]
fn owned_composition_cannot_be_relinked() {
    let mut f = fixture();
    let other = f.studio.create_session("STK-002").unwrap();
    assert_matches!(
        f.studio.attach_session(f.comp, Some(other)),
        Err(StageError::Validation(_))
    );
    f.studio.attach_session(f.comp, Some(f.session)).unwrap();
}

#[test]
fn request_generation_records_pending_asset() {
    let mut f = fixture();
    let ticket = f
        .studio
        .request_generation(Some(f.session), Category::Automotive, None, "16:9")
        .unwrap();
    let asset = f.studio.background(ticket.background()).unwrap();
    assert!(asset.is_pending());
    assert_eq!(asset.prompt(), ticket.request().prompt);
    assert!(asset.prompt().starts_with("Subject: dealership showroom backdrop\n"));
    assert_eq!(asset.aspect_ratio(), "16:9");
    assert_eq!(
        f.studio.session(f.session).unwrap().background_ids(),
        &[ticket.background()]
    );
    assert_matches!(
        f.studio.request_generation(None, Category::Automotive, None, "21:9"),
        Err(StageError::Validation(_))
    );
}

#[test]
fn failed_generation_stays_pending_and_can_retry() {
    let mut f = fixture();
    let ticket = f
        .studio
        .request_generation(None, Category::Hospitality, Some("rooftop bar"), "4:3")
        .unwrap();
    let bg = ticket.background();
    let err = f
        .studio
        .complete_generation(GenerationOutcome {
            background: bg,
            result: Err("timeout".into()),
        })
        .unwrap_err();
    assert!(err.is_recoverable());
    assert_eq!(err.to_string(), format!("generation failed: background {bg}: timeout"));
    assert!(f.studio.background(bg).unwrap().is_pending());

    let retry = f.studio.retry_generation(bg).unwrap();
    assert_eq!(retry, ticket);
    f.studio
        .complete_generation(GenerationOutcome {
            background: bg,
            result: Ok(ImageData::filled(4, 3, [1, 2, 3, 255]).unwrap()),
        })
        .unwrap();
    let asset = f.studio.background(bg).unwrap();
    assert!(!asset.is_pending());
    assert!(f.studio.retry_generation(bg).is_err());
}

#[test]
fn shared_backgrounds_only_lists_finished_assets() {
    let mut f = fixture();
    let pending = f
        .studio
        .request_generation(None, Category::Custom, None, "1:1")
        .unwrap()
        .background();
    let done = f
        .studio
        .import_background(None, Category::Custom, ImageData::transparent(3, 3).unwrap())
        .unwrap();
    f.studio.set_background_shared(pending, true).unwrap();
    f.studio.set_background_shared(done, true).unwrap();
    let shared: Vec<BackgroundId> = f.studio.shared_backgrounds().map(|b| b.id()).collect();
    assert_eq!(shared, vec![done]);
}

#[test]
fn render_job_snapshots_visible_layers_and_background() {
    let mut f = fixture();
    let bg = f
        .studio
        .import_background(None, Category::Custom, ImageData::filled(8, 8, [0, 0, 0, 255]).unwrap())
        .unwrap();
    f.studio.attach_background(f.comp, bg).unwrap();
    let a = f.studio.add_layer(f.comp, f.image, LayerKind::Subject).unwrap();
    let b = f.studio.add_layer(f.comp, f.image, LayerKind::Adjustment).unwrap();
    f.studio.set_layer_visible(b, false).unwrap();

    let job = f.studio.render_job(f.comp).unwrap();
    assert_eq!(job.layers().len(), 1);
    assert_eq!(job.layers()[0].id(), a);
    assert!(job.background().is_some());

    let out = f
        .studio
        .render_composition(f.comp, &Compositor::default())
        .unwrap();
    assert_eq!(out.canvas(), crate::foundation::core::Canvas::new(4, 4));
    assert_eq!(out.pixel(1, 1), Some([200, 10, 10, 255]));
}

#[test]
fn export_import_round_trip_in_memory() {
    let mut f = fixture();
    f.studio.add_layer(f.comp, f.image, LayerKind::Subject).unwrap();
    let mut blobs = MemoryBlobStore::new();
    let snap = f.studio.export_session(f.session, &mut blobs).unwrap();

    let mut fresh = Studio::default();
    let sid = fresh.import_session(&snap, &blobs).unwrap();
    assert_eq!(sid, f.session);
    assert_eq!(fresh.session(sid).unwrap(), f.studio.session(f.session).unwrap());
    assert_eq!(fresh.export_session(sid, &mut blobs).unwrap(), snap);

    // Second import of the same ids is refused and leaves the studio as it was.
    let before = fresh.counts();
    assert_matches!(fresh.import_session(&snap, &blobs), Err(StageError::Validation(_)));
    assert_eq!(fresh.counts(), before);
}

#[test]
fn import_rejects_foreign_background_link() {
    let mut f = fixture();
    let foreign = f
        .studio
        .import_background(None, Category::Custom, ImageData::transparent(2, 2).unwrap())
        .unwrap();
    f.studio.attach_background(f.comp, foreign).unwrap();
    let mut blobs = MemoryBlobStore::new();
    let snap = f.studio.export_session(f.session, &mut blobs).unwrap();
    let mut fresh = Studio::default();
    assert_matches!(
        fresh.import_session(&snap, &blobs),
        Err(StageError::DanglingReference { kind: EntityKind::Background, .. })
    );
    assert_eq!(fresh.counts(), (0, 0, 0, 0, 0));
}

#[test]
fn import_rejects_ids_repeated_inside_snapshot() {
    let mut f = fixture();
    f.studio.add_layer(f.comp, f.image, LayerKind::Subject).unwrap();
    f.studio.add_layer(f.comp, f.image, LayerKind::Adjustment).unwrap();
    let second = f.studio.create_composition("Detail", Some(f.session)).unwrap();
    f.studio.add_layer(second, f.image, LayerKind::Subject).unwrap();
    let mut blobs = MemoryBlobStore::new();
    let snap = f.studio.export_session(f.session, &mut blobs).unwrap();
    assert_eq!(snap.compositions.len(), 2);

    // One layer id claimed by two compositions.
    let mut shared_layer = snap.clone();
    let reused = shared_layer.compositions[0].layers[0].id;
    shared_layer.compositions[1].layers[0].id = reused;
    let mut fresh = Studio::default();
    assert_matches!(
        fresh.import_session(&shared_layer, &blobs),
        Err(StageError::Validation(msg)) if msg.contains("more than once")
    );
    assert_eq!(fresh.counts(), (0, 0, 0, 0, 0));

    // The same image listed twice.
    let mut twice = snap.clone();
    twice.images.push(twice.images[0].clone());
    assert_matches!(fresh.import_session(&twice, &blobs), Err(StageError::Validation(_)));

    // Two compositions with one id.
    let mut comp_twice = snap.clone();
    comp_twice.compositions[1].id = comp_twice.compositions[0].id;
    assert_matches!(fresh.import_session(&comp_twice, &blobs), Err(StageError::Validation(_)));
    assert_eq!(fresh.counts(), (0, 0, 0, 0, 0));

    // The untouched snapshot still imports and keeps each layer with its owner.
    fresh.import_session(&snap, &blobs).unwrap();
    for rec in &snap.compositions {
        for l in &rec.layers {
            assert_eq!(fresh.layer(l.id).unwrap().composition(), rec.id);
        }
    }
}
