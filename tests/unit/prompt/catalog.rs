use super::*;

#[test]
fn automotive_first_line_and_constraints() {
    let prompt = render_prompt(&default_components(Category::Automotive), None);
    let lines: Vec<&str> = prompt.lines().collect();
    assert_eq!(lines[0], "Subject: dealership showroom backdrop");
    assert!(lines.contains(&CONSTRAINTS_LINE));
    assert_eq!(
        CONSTRAINTS_LINE,
        "Constraints: No Text, No People, No Subject, No Vehicles, Nothing in foreground, Clean Floor, Neutral Reflections"
    );
}

#[test]
fn rendering_is_deterministic_for_every_category() {
    for category in Category::ALL {
        let c = default_components(category);
        assert_eq!(render_prompt(&c, None), render_prompt(&c, None));
    }
}

#[test]
fn custom_subject_replaces_only_the_subject_line() {
    for category in Category::ALL {
        let c = default_components(category);
        let base = render_prompt(&c, None);
        let custom = render_prompt(&c, Some("vintage red convertible stage"));
        let base_lines: Vec<&str> = base.lines().collect();
        let custom_lines: Vec<&str> = custom.lines().collect();
        assert_eq!(base_lines.len(), custom_lines.len());
        assert_eq!(custom_lines[0], "Subject: vintage red convertible stage");
        assert_eq!(&base_lines[1..], &custom_lines[1..]);
    }
}

#[test]
fn blank_custom_subject_falls_back_to_default() {
    let c = default_components(Category::Lifestyle);
    assert_eq!(render_prompt(&c, Some("   ")), render_prompt(&c, None));
    assert_eq!(render_prompt(&c, Some("")), render_prompt(&c, None));
}

#[test]
fn line_order_with_additional_constraints() {
    let c = PromptComponents {
        subject: "s".into(),
        style: "st".into(),
        lighting: "l".into(),
        camera: "c".into(),
        quality: "q".into(),
        additional_constraints: vec!["a".into(), "b".into()],
    };
    assert_eq!(
        render_prompt(&c, None),
        format!(
            "Subject: s\nStyle: st\nLighting: l\nCamera: c\n{CONSTRAINTS_LINE}\nAdditional Constraints: a, b\nQuality: q"
        )
    );
}

#[test]
fn custom_category_omits_additional_line_without_blank_lines() {
    let c = default_components(Category::Custom);
    assert!(c.additional_constraints.is_empty());
    let prompt = render_prompt(&c, None);
    assert!(!prompt.contains("Additional Constraints"));
    assert!(!prompt.contains("\n\n"));
    assert_eq!(prompt.lines().count(), 6);
    assert!(prompt.lines().last().unwrap().starts_with("Quality: "));
}

#[test]
fn category_tags_decode_leniently() {
    for category in Category::ALL {
        assert_eq!(Category::parse_lenient(category.as_str()), category);
    }
    assert_eq!(Category::parse_lenient("Real Estate"), Category::RealEstate);
    assert_eq!(Category::parse_lenient("small-business"), Category::SmallBusiness);
    assert_eq!(Category::parse_lenient("aerospace"), Category::Custom);
    let back: Category = serde_json::from_str("\"marine\"").unwrap();
    assert_eq!(back, Category::Custom);
}
