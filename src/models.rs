use std::{collections::BTreeMap, fmt, str::FromStr};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub const MIN_BODY_TYPE_CHARS: usize = 20;
pub const MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;

macro_rules! choice_enum {
    ($(#[$meta:meta])* $name:ident, $what:literal, { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $label)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn label(self) -> &'static str {
                match self { $($name::$variant => $label),+ }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|c| c.label().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| format!("'{}' is not a recognized {}.", wanted, $what))
            }
        }
    };
}

choice_enum!(
    /// Answer to "What's your go-to style?"
    StylePreference, "style preference", {
        Minimalist => "Minimalist",
        Bohemian => "Bohemian",
        Classic => "Classic",
        Trendy => "Trendy",
        Casual => "Casual",
        Vintage => "Vintage",
    }
);

choice_enum!(
    /// Answer to "Which color palette do you prefer?"
    ColorPalette, "color palette", {
        Neutrals => "Neutrals",
        EarthyTones => "Earthy Tones",
        Pastels => "Pastels",
        BrightAndBold => "Bright & Bold",
    }
);

choice_enum!(
    /// Answer to "What's the occasion?"
    Occasion, "occasion", {
        EverydayWear => "Everyday Wear",
        WorkOffice => "Work / Office",
        SpecialEvent => "Special Event",
        Vacation => "Vacation",
    }
);

/// Raw uploaded image, exactly as received from the client.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl PhotoUpload {
    pub fn summary(&self) -> PhotoSummary {
        PhotoSummary {
            file_name: self.file_name.clone(),
            content_type: self.content_type.clone(),
            size_bytes: self.bytes.len(),
        }
    }
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PhotoSummary {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub size_bytes: usize,
}

/// Form field identifiers, named the way the storefront form names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    StylePreference,
    ColorPalette,
    Occasion,
    BodyTypeDescription,
    UserPhoto,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::StylePreference => "stylePreference",
            Field::ColorPalette => "colorPalette",
            Field::Occasion => "occasion",
            Field::BodyTypeDescription => "bodyTypeDescription",
            Field::UserPhoto => "userPhoto",
        }
    }
}

/// Per-field validation messages. Empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<Field, String>);

impl ValidationErrors {
    pub fn add(&mut self, field: Field, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.0.keys().copied()
    }

    pub fn single(field: Field, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, msg)| format!("{}: {}", field.as_str(), msg))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

/// The three quiz answers once they have passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preferences {
    pub style_preference: StylePreference,
    pub color_palette: ColorPalette,
    pub occasion: Occasion,
}

impl Preferences {
    /// Flattened "Key: Value, Key: Value" text the composer matches against.
    pub fn quiz_answers(&self) -> String {
        format!(
            "Style Preference: {}, Color Palette: {}, Occasion: {}",
            self.style_preference, self.color_palette, self.occasion
        )
    }
}

/// Fully validated stylist input.
#[derive(Debug, Clone)]
pub struct StylistIntake {
    pub preferences: Preferences,
    pub body_type_description: String,
    pub user_photo: PhotoUpload,
}

impl StylistIntake {
    pub fn quiz_answers(&self) -> String {
        self.preferences.quiz_answers()
    }
}

/// Form values as the user has entered them so far.
#[derive(Debug, Clone, Default)]
pub struct IntakeDraft {
    pub style_preference: String,
    pub color_palette: String,
    pub occasion: String,
    pub body_type_description: String,
    pub user_photo: Option<PhotoUpload>,
}

fn parse_choice<T: FromStr<Err = String>>(
    raw: &str,
    field: Field,
    missing: &str,
    errors: &mut ValidationErrors,
) -> Option<T> {
    if raw.trim().is_empty() {
        errors.add(field, missing);
        return None;
    }
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(msg) => {
            errors.add(field, msg);
            None
        }
    }
}

impl IntakeDraft {
    pub fn validate_preferences(&self) -> Result<Preferences, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let style = parse_choice::<StylePreference>(
            &self.style_preference,
            Field::StylePreference,
            "Please select a style preference.",
            &mut errors,
        );
        let palette = parse_choice::<ColorPalette>(
            &self.color_palette,
            Field::ColorPalette,
            "Please select a color palette.",
            &mut errors,
        );
        let occasion = parse_choice::<Occasion>(
            &self.occasion,
            Field::Occasion,
            "Please select an occasion.",
            &mut errors,
        );
        match (style, palette, occasion) {
            (Some(style_preference), Some(color_palette), Some(occasion)) => Ok(Preferences {
                style_preference,
                color_palette,
                occasion,
            }),
            _ => Err(errors),
        }
    }

    pub fn validate(&self) -> Result<StylistIntake, ValidationErrors> {
        let preferences = self.validate_preferences();
        let mut errors = preferences.as_ref().err().cloned().unwrap_or_default();

        // Counts Unicode scalar values, not UTF-16 units, so one emoji is one character
        if self.body_type_description.chars().count() < MIN_BODY_TYPE_CHARS {
            errors.add(
                Field::BodyTypeDescription,
                "Please describe your body type in at least 20 characters.",
            );
        }
        if self.user_photo.is_none() {
            errors.add(Field::UserPhoto, "A photo is required.");
        }

        match (preferences, &self.user_photo) {
            (Ok(preferences), Some(photo)) if errors.is_empty() => Ok(StylistIntake {
                preferences,
                body_type_description: self.body_type_description.clone(),
                user_photo: photo.clone(),
            }),
            _ => Err(errors),
        }
    }
}

/// Composer call contract, shared by the static and the generative variant.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionInput {
    pub quiz_answers: String,
    pub photo_data_uri: String,
    pub body_type_description: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionOutput {
    pub style_suggestions: String,
}

/// Composed style suggestions: newline-separated paragraphs, never mutated.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct SuggestionDocument(String);

impl SuggestionDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn paragraphs(&self) -> impl Iterator<Item = &str> {
        self.0.split('\n').filter(|p| !p.trim().is_empty())
    }

    pub fn into_output(self) -> SuggestionOutput {
        SuggestionOutput { style_suggestions: self.0 }
    }
}

impl From<SuggestionOutput> for SuggestionDocument {
    fn from(out: SuggestionOutput) -> Self {
        Self(out.style_suggestions)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct PreferencesUpdate {
    #[serde(default)]
    pub style_preference: Option<String>,
    #[serde(default)]
    pub color_palette: Option<String>,
    #[serde(default)]
    pub occasion: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DetailsUpdate {
    pub body_type_description: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct StylistOptions {
    pub style_preferences: &'static [StylePreference],
    pub color_palettes: &'static [ColorPalette],
    pub occasions: &'static [Occasion],
}

impl Default for StylistOptions {
    fn default() -> Self {
        Self {
            style_preferences: StylePreference::ALL,
            color_palettes: ColorPalette::ALL,
            occasions: Occasion::ALL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn photo() -> PhotoUpload {
        PhotoUpload {
            file_name: Some("me.png".into()),
            content_type: Some("image/png".into()),
            bytes: Bytes::from_static(b"\x89PNG\r\n\x1a\n"),
        }
    }

    fn filled_draft(body: &str) -> IntakeDraft {
        IntakeDraft {
            style_preference: "Minimalist".into(),
            color_palette: "Neutrals".into(),
            occasion: "Everyday Wear".into(),
            body_type_description: body.into(),
            user_photo: Some(photo()),
        }
    }

    #[test]
    fn choices_parse_from_labels_ignoring_case() {
        assert_eq!("earthy tones".parse::<ColorPalette>(), Ok(ColorPalette::EarthyTones));
        assert_eq!(" Work / Office ".parse::<Occasion>(), Ok(Occasion::WorkOffice));
        assert!("Grunge".parse::<StylePreference>().is_err());
    }

    #[test]
    fn choices_serialize_as_labels() {
        let json = serde_json::to_string(&ColorPalette::BrightAndBold).unwrap();
        assert_eq!(json, "\"Bright & Bold\"");
    }

    #[test]
    fn quiz_answers_use_fixed_labels_and_delimiter() {
        let prefs = filled_draft("").validate_preferences().unwrap();
        assert_eq!(
            prefs.quiz_answers(),
            "Style Preference: Minimalist, Color Palette: Neutrals, Occasion: Everyday Wear"
        );
    }

    #[test]
    fn empty_draft_reports_every_preference_field() {
        let errors = IntakeDraft::default().validate_preferences().unwrap_err();
        assert_eq!(errors.get(Field::StylePreference), Some("Please select a style preference."));
        assert_eq!(errors.get(Field::ColorPalette), Some("Please select a color palette."));
        assert_eq!(errors.get(Field::Occasion), Some("Please select an occasion."));
        assert_eq!(errors.get(Field::BodyTypeDescription), None);
    }

    #[test]
    fn body_type_boundary_is_twenty_characters() {
        let nineteen = "a".repeat(19);
        let twenty = "a".repeat(20);
        let errors = filled_draft(&nineteen).validate().unwrap_err();
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec![Field::BodyTypeDescription]);
        assert!(filled_draft(&twenty).validate().is_ok());
    }

    #[test]
    fn body_type_counts_characters_not_bytes() {
        // 19 two-byte characters
        let body = "é".repeat(19);
        assert!(filled_draft(&body).validate().is_err());
    }

    #[test]
    fn astral_characters_count_once() {
        assert!(filled_draft(&"👗".repeat(19)).validate().is_err());
        assert!(filled_draft(&"👗".repeat(20)).validate().is_ok());
    }

    #[test]
    fn missing_photo_is_rejected() {
        let mut draft = filled_draft("an athletic build with broad shoulders");
        draft.user_photo = None;
        let errors = draft.validate().unwrap_err();
        assert_eq!(errors.get(Field::UserPhoto), Some("A photo is required."));
    }

    #[test]
    fn suggestion_contract_uses_camel_case() {
        let input: SuggestionInput = serde_json::from_value(serde_json::json!({
            "quizAnswers": "Style Preference: Classic",
            "photoDataUri": "data:image/png;base64,AAAA",
            "bodyTypeDescription": "petite with a defined waist",
        }))
        .unwrap();
        assert_eq!(input.quiz_answers, "Style Preference: Classic");
        let out = serde_json::to_value(SuggestionOutput { style_suggestions: "x".into() }).unwrap();
        assert_eq!(out, serde_json::json!({ "styleSuggestions": "x" }));
    }
}
