use super::*;

#[test]
fn ids_are_unique_and_parse_back() {
    let a = LayerId::generate();
    let b = LayerId::generate();
    assert_ne!(a, b);
    assert_eq!(a.to_string().parse::<LayerId>().unwrap(), a);
    assert!("not-a-uuid".parse::<LayerId>().is_err());
}

#[test]
fn canvas_empty_and_len() {
    assert!(Canvas::new(0, 4).is_empty());
    assert!(Canvas::new(4, 0).is_empty());
    assert_eq!(Canvas::new(3, 2).rgba8_len(), Some(24));
}

#[test]
fn identity_transform_is_identity_affine() {
    let t = LayerTransform::default();
    assert_eq!(t.to_affine(Vec2::new(8.0, 4.0)), Affine::IDENTITY);
}

#[test]
fn offset_only_transform_is_translation() {
    let t = LayerTransform {
        offset: Vec2::new(10.0, -2.5),
        ..LayerTransform::default()
    };
    assert_eq!(
        t.to_affine(Vec2::new(1.0, 1.0)),
        Affine::translate(Vec2::new(10.0, -2.5))
    );
}

#[test]
fn scale_pivots_about_centre() {
    let t = LayerTransform {
        scale: 2.0,
        ..LayerTransform::default()
    };
    let pivot = Vec2::new(5.0, 5.0);
    let a = t.to_affine(pivot);
    let centre = a * kurbo::Point::new(5.0, 5.0);
    assert_eq!(centre, kurbo::Point::new(5.0, 5.0));
    let corner = a * kurbo::Point::new(0.0, 0.0);
    assert_eq!(corner, kurbo::Point::new(-5.0, -5.0));
}

#[test]
fn validate_rejects_bad_scale_and_nan() {
    let mut t = LayerTransform::default();
    t.scale = 0.0;
    assert!(t.validate().is_err());
    t.scale = -1.0;
    assert!(t.validate().is_err());
    t.scale = 1.0;
    t.rotation_rad = f64::NAN;
    assert!(t.validate().is_err());
    t.rotation_rad = 0.5;
    assert!(t.validate().is_ok());
}

#[test]
fn patch_only_touches_given_fields() {
    let base = LayerTransform {
        offset: Vec2::new(1.0, 2.0),
        scale: 1.5,
        rotation_rad: 0.25,
    };
    let moved = base.patched(TransformPatch::offset(Vec2::new(9.0, 9.0)));
    assert_eq!(moved.offset, Vec2::new(9.0, 9.0));
    assert_eq!(moved.scale, 1.5);
    assert_eq!(moved.rotation_rad, 0.25);
}
