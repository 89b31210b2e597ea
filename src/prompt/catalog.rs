//! Category prompt templates and the deterministic prompt renderer.

use std::fmt;

/// Constraint line emitted verbatim in every rendered prompt.
pub const CONSTRAINTS_LINE: &str = "Constraints: No Text, No People, No Subject, No Vehicles, Nothing in foreground, Clean Floor, Neutral Reflections";

/// Business category a backdrop is generated for.
///
/// Persisted as its snake_case tag; unknown tags decode to [`Category::Custom`].
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(from = "String", into = "String")]
pub enum Category {
    /// Vehicle dealerships.
    Automotive,
    /// Property listings.
    RealEstate,
    /// Restaurants and food.
    Restaurant,
    /// Retail and small shops.
    SmallBusiness,
    /// Hotels and venues.
    Hospitality,
    /// Lifestyle and editorial products.
    Lifestyle,
    /// Generic fallback.
    #[default]
    Custom,
}

impl Category {
    /// Every category, fallback last.
    pub const ALL: [Self; 7] = [
        Self::Automotive,
        Self::RealEstate,
        Self::Restaurant,
        Self::SmallBusiness,
        Self::Hospitality,
        Self::Lifestyle,
        Self::Custom,
    ];

    /// Canonical persisted tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Automotive => "automotive",
            Self::RealEstate => "real_estate",
            Self::Restaurant => "restaurant",
            Self::SmallBusiness => "small_business",
            Self::Hospitality => "hospitality",
            Self::Lifestyle => "lifestyle",
            Self::Custom => "custom",
        }
    }

    /// Decode a tag, accepting `-` or spaces as separators, falling back to
    /// [`Category::Custom`].
    pub fn parse_lenient(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "automotive" => Self::Automotive,
            "real_estate" => Self::RealEstate,
            "restaurant" => Self::Restaurant,
            "small_business" => Self::SmallBusiness,
            "hospitality" => Self::Hospitality,
            "lifestyle" => Self::Lifestyle,
            _ => Self::Custom,
        }
    }
}

impl From<String> for Category {
    fn from(tag: String) -> Self {
        Self::parse_lenient(&tag)
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.as_str().to_string()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured pieces of a backdrop prompt.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PromptComponents {
    /// Default scene subject.
    pub subject: String,
    /// Visual style.
    pub style: String,
    /// Lighting setup.
    pub lighting: String,
    /// Camera/lens description.
    pub camera: String,
    /// Output quality descriptors.
    pub quality: String,
    /// Category-specific constraints appended after the fixed ones.
    #[serde(default)]
    pub additional_constraints: Vec<String>,
}

fn components(
    subject: &str,
    style: &str,
    lighting: &str,
    camera: &str,
    quality: &str,
    additional: &[&str],
) -> PromptComponents {
    PromptComponents {
        subject: subject.to_string(),
        style: style.to_string(),
        lighting: lighting.to_string(),
        camera: camera.to_string(),
        quality: quality.to_string(),
        additional_constraints: additional.iter().map(|s| (*s).to_string()).collect(),
    }
}

/// Canonical template for a category.
pub fn default_components(category: Category) -> PromptComponents {
    match category {
        Category::Automotive => components(
            "dealership showroom backdrop",
            "modern, minimalist, premium automotive showroom",
            "soft diffused overhead lighting, even floor illumination",
            "wide angle, eye level, 24mm",
            "photorealistic, 8k, sharp focus",
            &["Polished concrete floor", "Seamless wall-to-floor transition"],
        ),
        Category::RealEstate => components(
            "bright interior living space",
            "contemporary, airy, staged interior",
            "natural daylight through large windows",
            "wide angle, chest height, 16mm",
            "photorealistic, high dynamic range, crisp detail",
            &["No furniture clutter", "Straight vertical lines"],
        ),
        Category::Restaurant => components(
            "elegant restaurant table setting",
            "warm, inviting, upscale dining",
            "warm ambient light with soft highlights",
            "shallow depth of field, 50mm",
            "photorealistic, appetizing tones, fine texture",
            &["Empty plate area", "Blurred background diners absent"],
        ),
        Category::SmallBusiness => components(
            "clean retail storefront interior",
            "friendly, professional, uncluttered",
            "bright even commercial lighting",
            "eye level, 35mm",
            "photorealistic, sharp, true-to-life color",
            &["No brand logos"],
        ),
        Category::Hospitality => components(
            "luxury hotel lobby",
            "refined, spacious, welcoming",
            "golden hour light blended with warm interior lamps",
            "wide angle, eye level, 20mm",
            "photorealistic, cinematic, rich detail",
            &["Unoccupied seating"],
        ),
        Category::Lifestyle => components(
            "minimal lifestyle studio set",
            "editorial, natural, understated",
            "soft window light with gentle shadows",
            "eye level, 85mm",
            "photorealistic, magazine quality, smooth gradients",
            &["Neutral color palette"],
        ),
        Category::Custom => components(
            "professional studio backdrop",
            "clean, neutral, versatile",
            "balanced studio softbox lighting",
            "eye level, 50mm",
            "photorealistic, high resolution",
            &[],
        ),
    }
}

/// Render a deterministic multi-line prompt.
///
/// Line order is fixed: subject, style, lighting, camera, the constant
/// [`CONSTRAINTS_LINE`], the optional additional constraints, quality. A blank
/// `custom_subject` is treated as absent.
pub fn render_prompt(components: &PromptComponents, custom_subject: Option<&str>) -> String {
    let subject = custom_subject
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(&components.subject);

    let mut lines = vec![
        format!("Subject: {subject}"),
        format!("Style: {}", components.style),
        format!("Lighting: {}", components.lighting),
        format!("Camera: {}", components.camera),
        CONSTRAINTS_LINE.to_string(),
    ];
    if !components.additional_constraints.is_empty() {
        lines.push(format!(
            "Additional Constraints: {}",
            components.additional_constraints.join(", ")
        ));
    }
    lines.push(format!("Quality: {}", components.quality));
    lines.join("\n")
}

#[cfg(test)]
#[path = "../../tests/unit/prompt/catalog.rs"]
mod tests;
