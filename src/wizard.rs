//! Three-step stylist flow: preferences, then body details and photo, then results.
//!
//! All transitions go through [`Wizard::apply`]. Submitting is split in two so
//! callers never hold the session lock across the composer call: `Submit`
//! yields an owned [`Submission`], the caller runs it with [`run_submission`],
//! and feeds the result back as `Completed`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    composer::StyleComposer,
    error::StylistError,
    models::{
        Field, IntakeDraft, PhotoSummary, PhotoUpload, PreferencesUpdate, SuggestionDocument,
        SuggestionInput, ValidationErrors,
    },
    photo::{self, PhotoError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Preferences,
    Details,
    Results,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Preferences,
    Details { submitting: bool },
    Results { suggestions: SuggestionDocument },
}

impl Stage {
    pub fn step(&self) -> Step {
        match self {
            Stage::Preferences => Step::Preferences,
            Stage::Details { .. } => Step::Details,
            Stage::Results { .. } => Step::Results,
        }
    }
}

#[derive(Debug)]
pub enum WizardEvent {
    UpdatePreferences(PreferencesUpdate),
    UpdateBodyType(String),
    AttachPhoto(PhotoUpload),
    Next,
    Back,
    Submit,
    Completed(Result<SuggestionDocument, StylistError>),
    Restart,
}

impl WizardEvent {
    fn action(&self) -> &'static str {
        match self {
            WizardEvent::UpdatePreferences(_) => "update preferences",
            WizardEvent::UpdateBodyType(_) => "update body type",
            WizardEvent::AttachPhoto(_) => "attach a photo",
            WizardEvent::Next => "continue",
            WizardEvent::Back => "go back",
            WizardEvent::Submit => "submit",
            WizardEvent::Completed(_) => "complete",
            WizardEvent::Restart => "restart",
        }
    }
}

/// Everything the composer call needs, detached from the wizard.
#[derive(Debug, Clone)]
pub struct Submission {
    pub quiz_answers: String,
    pub body_type_description: String,
    pub photo: PhotoUpload,
}

#[derive(Debug)]
pub enum Outcome {
    Applied,
    Ignored,
    Submit(Submission),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
}

impl Notification {
    fn submission_failed() -> Self {
        Self {
            title: "Oh no! Something went wrong.".into(),
            description: "We couldn't generate your style suggestions. Please try again.".into(),
        }
    }
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize, Clone)]
pub struct PreferencesView {
    pub style_preference: Option<String>,
    pub color_palette: Option<String>,
    pub occasion: Option<String>,
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize, Clone)]
pub struct WizardView {
    pub id: Uuid,
    pub step: Step,
    pub submitting: bool,
    pub preferences: PreferencesView,
    pub body_type_description: Option<String>,
    pub photo: Option<PhotoSummary>,
    pub suggestions: Option<SuggestionDocument>,
    pub notification: Option<Notification>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Wizard {
    id: Uuid,
    stage: Stage,
    draft: IntakeDraft,
    notification: Option<Notification>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_active: Instant,
}

impl Default for Wizard {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() { None } else { Some(s.to_string()) }
}

impl Wizard {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            stage: Stage::Preferences,
            draft: IntakeDraft::default(),
            notification: None,
            created_at: now,
            updated_at: now,
            last_active: Instant::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn step(&self) -> Step {
        self.stage.step()
    }

    pub fn draft(&self) -> &IntakeDraft {
        &self.draft
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self.stage, Stage::Details { submitting: true })
    }

    pub fn suggestions(&self) -> Option<&SuggestionDocument> {
        match &self.stage {
            Stage::Results { suggestions } => Some(suggestions),
            _ => None,
        }
    }

    /// Time since the last applied event.
    pub fn idle_for(&self) -> Duration {
        self.last_active.elapsed()
    }

    /// Errors with `Busy` while a submission is in flight.
    pub fn ensure_idle(&self) -> Result<(), StylistError> {
        if self.is_submitting() { Err(StylistError::Busy) } else { Ok(()) }
    }

    pub fn apply(&mut self, event: WizardEvent) -> Result<Outcome, StylistError> {
        let action = event.action();
        let result = self.transition(event);
        match &result {
            Ok(Outcome::Ignored) => info!("Wizard {} ignored '{}' in {:?}", self.id, action, self.step()),
            Ok(_) => info!("🧭 Wizard {} handled '{}', now in {:?}", self.id, action, self.step()),
            Err(e) => warn!("⚠️ Wizard {} rejected '{}': {}", self.id, action, e),
        }
        result
    }

    fn touch(&mut self) {
        self.notification = None;
        self.updated_at = Utc::now();
        self.last_active = Instant::now();
    }

    fn transition(&mut self, event: WizardEvent) -> Result<Outcome, StylistError> {
        let step = self.step();

        if self.is_submitting() {
            return match event {
                // The submit control is disabled while a call is in flight.
                WizardEvent::Submit => Ok(Outcome::Ignored),
                WizardEvent::Completed(result) => Ok(self.complete(result)),
                _ => Err(StylistError::Busy),
            };
        }

        match (step, event) {
            (_, WizardEvent::Completed(_)) => Ok(Outcome::Ignored),

            (Step::Preferences | Step::Details, WizardEvent::UpdatePreferences(update)) => {
                if let Some(v) = update.style_preference {
                    self.draft.style_preference = v;
                }
                if let Some(v) = update.color_palette {
                    self.draft.color_palette = v;
                }
                if let Some(v) = update.occasion {
                    self.draft.occasion = v;
                }
                self.touch();
                Ok(Outcome::Applied)
            }

            (Step::Preferences | Step::Details, WizardEvent::UpdateBodyType(text)) => {
                self.draft.body_type_description = text;
                self.touch();
                Ok(Outcome::Applied)
            }

            (Step::Details, WizardEvent::AttachPhoto(upload)) => {
                photo::check_size(upload.bytes.len()).map_err(|e| {
                    let msg = match e {
                        PhotoError::Empty => "A photo is required.",
                        _ => "Please upload a photo up to 10MB.",
                    };
                    StylistError::Validation(ValidationErrors::single(Field::UserPhoto, msg))
                })?;
                self.draft.user_photo = Some(upload);
                self.touch();
                Ok(Outcome::Applied)
            }

            (Step::Preferences, WizardEvent::Next) => {
                self.draft.validate_preferences()?;
                self.stage = Stage::Details { submitting: false };
                self.touch();
                Ok(Outcome::Applied)
            }

            (Step::Details, WizardEvent::Back) => {
                self.stage = Stage::Preferences;
                self.touch();
                Ok(Outcome::Applied)
            }

            (Step::Details, WizardEvent::Submit) => {
                let intake = self.draft.validate()?;
                self.stage = Stage::Details { submitting: true };
                self.touch();
                Ok(Outcome::Submit(Submission {
                    quiz_answers: intake.quiz_answers(),
                    body_type_description: intake.body_type_description,
                    photo: intake.user_photo,
                }))
            }

            (_, WizardEvent::Restart) => {
                self.stage = Stage::Preferences;
                self.draft = IntakeDraft::default();
                self.touch();
                Ok(Outcome::Applied)
            }

            (step, event) => Err(StylistError::InvalidTransition { step, action: event.action() }),
        }
    }

    fn complete(&mut self, result: Result<SuggestionDocument, StylistError>) -> Outcome {
        self.touch();
        match result {
            Ok(suggestions) => {
                info!("✨ Wizard {} received {} paragraphs of suggestions", self.id, suggestions.paragraphs().count());
                self.stage = Stage::Results { suggestions };
            }
            Err(e) => {
                warn!("❌ Wizard {} submission failed: {}", self.id, e);
                self.stage = Stage::Details { submitting: false };
                self.notification = Some(Notification::submission_failed());
            }
        }
        Outcome::Applied
    }

    pub fn view(&self) -> WizardView {
        WizardView {
            id: self.id,
            step: self.step(),
            submitting: self.is_submitting(),
            preferences: PreferencesView {
                style_preference: non_empty(&self.draft.style_preference),
                color_palette: non_empty(&self.draft.color_palette),
                occasion: non_empty(&self.draft.occasion),
            },
            body_type_description: non_empty(&self.draft.body_type_description),
            photo: self.draft.user_photo.as_ref().map(PhotoUpload::summary),
            suggestions: self.suggestions().cloned(),
            notification: self.notification.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Encode the photo and make the single composer call for a submission.
pub async fn run_submission(
    composer: &dyn StyleComposer,
    submission: Submission,
) -> Result<SuggestionDocument, StylistError> {
    let photo_data_uri = photo::to_data_uri(&submission.photo)
        .map_err(|e| StylistError::PhotoRead(e.to_string()))?;

    info!(
        "🎯 Requesting style suggestions from '{}' composer for: {}",
        composer.name(),
        submission.quiz_answers
    );

    let input = SuggestionInput {
        quiz_answers: submission.quiz_answers,
        photo_data_uri,
        body_type_description: submission.body_type_description,
    };
    let output = composer.suggest(&input).await?;
    Ok(output.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::{compose, MockComposer};
    use crate::models::{SuggestionOutput, MAX_PHOTO_BYTES};
    use async_trait::async_trait;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    fn png_upload() -> PhotoUpload {
        PhotoUpload {
            file_name: Some("me.png".into()),
            content_type: Some("image/png".into()),
            bytes: Bytes::from_static(PNG),
        }
    }

    fn prefs(style: &str, palette: &str, occasion: &str) -> WizardEvent {
        WizardEvent::UpdatePreferences(PreferencesUpdate {
            style_preference: Some(style.into()),
            color_palette: Some(palette.into()),
            occasion: Some(occasion.into()),
        })
    }

    fn wizard_at_details(body: &str) -> Wizard {
        let mut w = Wizard::new();
        w.apply(prefs("Minimalist", "Neutrals", "Everyday Wear")).unwrap();
        w.apply(WizardEvent::Next).unwrap();
        w.apply(WizardEvent::UpdateBodyType(body.into())).unwrap();
        w.apply(WizardEvent::AttachPhoto(png_upload())).unwrap();
        w
    }

    fn take_submission(w: &mut Wizard) -> Submission {
        match w.apply(WizardEvent::Submit).unwrap() {
            Outcome::Submit(s) => s,
            other => panic!("expected submission, got {other:?}"),
        }
    }

    /// Records every input and answers with the deterministic composer.
    #[derive(Default)]
    struct RecordingComposer {
        calls: Mutex<Vec<SuggestionInput>>,
    }

    #[async_trait]
    impl StyleComposer for RecordingComposer {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn suggest(&self, input: &SuggestionInput) -> Result<SuggestionOutput, StylistError> {
            self.calls.lock().push(input.clone());
            Ok(compose(&input.quiz_answers, &input.body_type_description).into_output())
        }
    }

    #[test]
    fn starts_in_preferences_with_empty_draft() {
        let w = Wizard::new();
        assert_eq!(w.step(), Step::Preferences);
        assert!(!w.is_submitting());
        assert!(w.suggestions().is_none());
        assert_eq!(w.draft().style_preference, "");
    }

    #[test]
    fn next_requires_all_three_preferences() {
        let mut w = Wizard::new();
        w.apply(WizardEvent::UpdatePreferences(PreferencesUpdate {
            style_preference: Some("Classic".into()),
            ..Default::default()
        }))
        .unwrap();
        let err = w.apply(WizardEvent::Next).unwrap_err();
        let StylistError::Validation(fields) = err else { panic!("expected validation error") };
        assert_eq!(fields.fields().collect::<Vec<_>>(), vec![Field::ColorPalette, Field::Occasion]);
        assert_eq!(w.step(), Step::Preferences);
    }

    #[test]
    fn unknown_choice_blocks_next() {
        let mut w = Wizard::new();
        w.apply(prefs("Grunge", "Neutrals", "Vacation")).unwrap();
        assert!(matches!(w.apply(WizardEvent::Next), Err(StylistError::Validation(_))));
    }

    #[test]
    fn cannot_skip_to_submit_from_preferences() {
        let mut w = Wizard::new();
        w.apply(prefs("Minimalist", "Neutrals", "Everyday Wear")).unwrap();
        let err = w.apply(WizardEvent::Submit).unwrap_err();
        assert!(matches!(err, StylistError::InvalidTransition { step: Step::Preferences, .. }));
    }

    #[test]
    fn back_keeps_entered_data() {
        let mut w = wizard_at_details("tall with long legs and narrow hips");
        w.apply(WizardEvent::Back).unwrap();
        assert_eq!(w.step(), Step::Preferences);
        assert_eq!(w.draft().style_preference, "Minimalist");
        assert_eq!(w.draft().body_type_description, "tall with long legs and narrow hips");
        assert!(w.draft().user_photo.is_some());
    }

    #[test]
    fn nineteen_characters_rejected_twenty_accepted() {
        let mut w = wizard_at_details(&"x".repeat(19));
        let err = w.apply(WizardEvent::Submit).unwrap_err();
        let StylistError::Validation(fields) = err else { panic!("expected validation error") };
        assert!(fields.get(Field::BodyTypeDescription).is_some());
        assert!(!w.is_submitting());

        w.apply(WizardEvent::UpdateBodyType("x".repeat(20))).unwrap();
        assert!(matches!(w.apply(WizardEvent::Submit), Ok(Outcome::Submit(_))));
        assert!(w.is_submitting());
    }

    #[test]
    fn submit_without_photo_is_rejected() {
        let mut w = Wizard::new();
        w.apply(prefs("Casual", "Pastels", "Vacation")).unwrap();
        w.apply(WizardEvent::Next).unwrap();
        w.apply(WizardEvent::UpdateBodyType("petite frame with a short torso".into())).unwrap();
        let err = w.apply(WizardEvent::Submit).unwrap_err();
        let StylistError::Validation(fields) = err else { panic!("expected validation error") };
        assert_eq!(fields.get(Field::UserPhoto), Some("A photo is required."));
    }

    #[test]
    fn attach_rejects_empty_and_oversized_photos() {
        let mut w = wizard_at_details("athletic build with broad shoulders");
        let empty = PhotoUpload { bytes: Bytes::new(), ..png_upload() };
        assert!(matches!(w.apply(WizardEvent::AttachPhoto(empty)), Err(StylistError::Validation(_))));
        let huge = PhotoUpload { bytes: Bytes::from(vec![0u8; MAX_PHOTO_BYTES + 1]), ..png_upload() };
        assert!(matches!(w.apply(WizardEvent::AttachPhoto(huge)), Err(StylistError::Validation(_))));
        assert_eq!(w.draft().user_photo.as_ref().map(|p| p.bytes.len()), Some(PNG.len()));
    }

    #[test]
    fn submission_carries_composite_text() {
        let mut w = wizard_at_details("a body description of 25c");
        let s = take_submission(&mut w);
        assert_eq!(
            s.quiz_answers,
            "Style Preference: Minimalist, Color Palette: Neutrals, Occasion: Everyday Wear"
        );
        assert_eq!(s.body_type_description, "a body description of 25c");
    }

    #[test]
    fn second_submit_while_submitting_is_noop() {
        let mut w = wizard_at_details("athletic build with broad shoulders");
        take_submission(&mut w);
        assert!(matches!(w.apply(WizardEvent::Submit), Ok(Outcome::Ignored)));
        assert!(w.is_submitting());
    }

    #[test]
    fn everything_but_completion_is_busy_while_submitting() {
        let mut w = wizard_at_details("athletic build with broad shoulders");
        take_submission(&mut w);
        assert!(matches!(w.apply(WizardEvent::Restart), Err(StylistError::Busy)));
        assert!(matches!(w.apply(WizardEvent::Back), Err(StylistError::Busy)));
        assert!(matches!(w.apply(WizardEvent::UpdateBodyType("changed my mind entirely".into())), Err(StylistError::Busy)));
        assert!(matches!(w.ensure_idle(), Err(StylistError::Busy)));
        assert_eq!(w.step(), Step::Details);
    }

    #[test]
    fn successful_completion_moves_to_results() {
        let mut w = wizard_at_details("athletic build with broad shoulders");
        let s = take_submission(&mut w);
        let doc = compose(&s.quiz_answers, &s.body_type_description);
        w.apply(WizardEvent::Completed(Ok(doc.clone()))).unwrap();
        assert_eq!(w.step(), Step::Results);
        assert!(!w.is_submitting());
        assert_eq!(w.suggestions(), Some(&doc));
    }

    #[test]
    fn failed_completion_stays_in_details_and_allows_retry() {
        let mut w = wizard_at_details("athletic build with broad shoulders");
        take_submission(&mut w);
        w.apply(WizardEvent::Completed(Err(StylistError::Generation("upstream 500".into())))).unwrap();
        assert_eq!(w.step(), Step::Details);
        assert!(!w.is_submitting());
        assert_eq!(w.notification(), Some(&Notification::submission_failed()));

        // Unchanged input can be resubmitted; the notification clears.
        assert!(matches!(w.apply(WizardEvent::Submit), Ok(Outcome::Submit(_))));
        assert!(w.notification().is_none());
    }

    #[test]
    fn stale_completion_is_ignored() {
        let mut w = Wizard::new();
        let doc = compose("", "");
        assert!(matches!(w.apply(WizardEvent::Completed(Ok(doc))), Ok(Outcome::Ignored)));
        assert_eq!(w.step(), Step::Preferences);
    }

    #[test]
    fn restart_discards_everything() {
        let mut w = wizard_at_details("athletic build with broad shoulders");
        let s = take_submission(&mut w);
        w.apply(WizardEvent::Completed(Ok(compose(&s.quiz_answers, "")))).unwrap();
        w.apply(WizardEvent::Restart).unwrap();

        assert_eq!(w.step(), Step::Preferences);
        assert!(w.suggestions().is_none());
        let view = w.view();
        assert!(view.preferences.style_preference.is_none());
        assert!(view.preferences.color_palette.is_none());
        assert!(view.preferences.occasion.is_none());
        assert!(view.body_type_description.is_none());
        assert!(view.photo.is_none());
    }

    #[test]
    fn results_reject_back_and_edits() {
        let mut w = wizard_at_details("athletic build with broad shoulders");
        let s = take_submission(&mut w);
        w.apply(WizardEvent::Completed(Ok(compose(&s.quiz_answers, "")))).unwrap();
        assert!(matches!(w.apply(WizardEvent::Back), Err(StylistError::InvalidTransition { .. })));
        assert!(matches!(
            w.apply(prefs("Vintage", "Pastels", "Vacation")),
            Err(StylistError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn view_omits_unset_fields() {
        let json = serde_json::to_value(Wizard::new().view()).unwrap();
        assert_eq!(json["step"], "preferences");
        assert_eq!(json["submitting"], false);
        assert!(json.get("suggestions").is_none());
        assert!(json.get("photo").is_none());
    }

    #[tokio::test]
    async fn run_submission_calls_composer_once_with_data_uri() {
        let composer = RecordingComposer::default();
        let mut w = wizard_at_details("a body description of 25c");
        let s = take_submission(&mut w);
        let doc = run_submission(&composer, s).await.unwrap();

        let calls = composer.calls.lock();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].photo_data_uri.starts_with("data:image/png;base64,"));
        assert_eq!(
            calls[0].quiz_answers,
            "Style Preference: Minimalist, Color Palette: Neutrals, Occasion: Everyday Wear"
        );
        assert!(doc.as_str().contains("Minimalist Aesthetic"));
        assert!(doc.as_str().contains("ivory, oatmeal"));
    }

    #[tokio::test]
    async fn unreadable_photo_fails_before_composer() {
        let composer = RecordingComposer::default();
        let mut w = wizard_at_details("athletic build with broad shoulders");
        w.apply(WizardEvent::AttachPhoto(PhotoUpload {
            file_name: Some("notes.txt".into()),
            content_type: Some("text/plain".into()),
            bytes: Bytes::from_static(b"definitely not an image"),
        }))
        .unwrap();
        let s = take_submission(&mut w);
        let result = run_submission(&composer, s).await;
        assert!(matches!(result, Err(StylistError::PhotoRead(_))));
        assert!(composer.calls.lock().is_empty());

        w.apply(WizardEvent::Completed(result)).unwrap();
        assert_eq!(w.step(), Step::Details);
        assert!(w.notification().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn end_to_end_with_mock_composer() {
        let mut w = wizard_at_details("a body description of 25c");
        let s = take_submission(&mut w);
        let result = run_submission(&MockComposer::new(), s).await;
        w.apply(WizardEvent::Completed(result)).unwrap();

        let doc = w.suggestions().unwrap().as_str();
        let minimalist = doc.find("Your Minimalist Aesthetic").unwrap();
        let neutrals = doc.find("Color Recommendations: Build around ivory").unwrap();
        let fit = doc.find("Fit & Style Tips").unwrap();
        let sustainability = doc.find("Sustainability Note").unwrap();
        let tip = doc.find("Pro Tip").unwrap();
        assert!(minimalist < neutrals && neutrals < fit && fit < sustainability && sustainability < tip);
    }

    #[tokio::test(start_paused = true)]
    async fn applied_events_reset_idle_time() {
        let mut w = Wizard::new();
        tokio::time::advance(Duration::from_secs(90)).await;
        assert_eq!(w.idle_for(), Duration::from_secs(90));

        w.apply(prefs("Classic", "", "")).unwrap();
        assert_eq!(w.idle_for(), Duration::ZERO);
    }

    #[test]
    fn unset_preferences_are_omitted_from_view() {
        let mut w = Wizard::new();
        w.apply(prefs("Classic", "", "")).unwrap();
        let json = serde_json::to_value(w.view()).unwrap();
        assert_eq!(json["preferences"], serde_json::json!({ "style_preference": "Classic" }));
    }
}
