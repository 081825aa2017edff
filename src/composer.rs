use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::{error::StylistError, models::{SuggestionDocument, SuggestionInput, SuggestionOutput}};

/// Anything that can turn quiz answers, a photo and a body description into style suggestions.
#[async_trait]
pub trait StyleComposer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn suggest(&self, input: &SuggestionInput) -> Result<SuggestionOutput, StylistError>;
}

const MOCK_LATENCY: Duration = Duration::from_millis(2000);

const INTRO: &str = "Thank you for sharing your style profile with Vastra! Based on your quiz answers, here are your personalized style suggestions from our sustainable collections:";

// Priority order matters: first match wins.
const STYLE_PARAGRAPHS: [(&str, &str); 6] = [
    ("minimalist", "✨ Your Minimalist Aesthetic: Embrace clean lines and a capsule wardrobe built on versatile, neutral-toned basics. Our organic cotton tees, tailored linen trousers and structured overshirts pair effortlessly and are made to outlast passing trends."),
    ("bohemian", "✨ Your Bohemian Spirit: Flowing silhouettes and relaxed layers are your signature. Look for our hemp-blend maxi dresses, hand block-printed tunics and soft Tencel kimonos that move with you."),
    ("classic", "✨ Your Classic Elegance: Timeless tailoring never lets you down. Our recycled-wool blazers, crisp organic poplin shirts and straight-leg trousers form a foundation you can wear for years."),
    ("trendy", "✨ Your Trend-Forward Edge: Express yourself with statement pieces made responsibly. Try our upcycled denim jackets, bold-cut co-ord sets and limited drops crafted from deadstock fabrics."),
    ("casual", "✨ Your Casual Comfort: Ease leads the way. Reach for our organic cotton joggers, relaxed-fit knit sweaters and breathable linen button-downs for effortless everyday looks."),
    ("vintage", "✨ Your Vintage Charm: You love pieces with history and character. Explore our retro-inspired wrap dresses, high-waisted wide-leg trousers and hand-embroidered details that nod to the past."),
];

const COLOR_LEAD_IN: &str = "🎨 Color Recommendations: ";

const COLOR_CONTINUATIONS: [(&str, &str); 4] = [
    ("neutrals", "Build around ivory, oatmeal, stone and charcoal. Naturally dyed neutrals layer beautifully and keep every piece in your wardrobe working together."),
    ("earthy", "Olive, terracotta, rust and ochre will bring warmth to your look. These tones come from our plant-based dye process and sit naturally with linen and hemp."),
    ("pastels", "Soft sage, blush, lavender and powder blue keep your outfits light and fresh. Pair them with white or cream for an airy finish."),
    ("bright", "Go for saturated hues like marigold, cobalt and fuchsia. Let one bold piece be the focal point and ground it with a simple base."),
];

const FIT_TIPS: &str = "👗 Fit & Style Tips: Based on your body type description, look for pieces that highlight the features you love and feel comfortable to move in. Our size guides include detailed garment measurements, and many styles offer adjustable waists and relaxed cuts for a personalized fit.";

const SUSTAINABILITY_NOTE: &str = "🌱 Sustainability Note: Every Vastra piece is made from eco-friendly materials by fairly paid artisans. Choosing fewer, better-made garments is one of the simplest ways to reduce your fashion footprint.";

const PRO_TIP: &str = "💡 Pro Tip: Start with two or three of the suggested pieces and mix them with what you already own. A thoughtful, versatile wardrobe is the most sustainable wardrobe of all.";

fn first_match(haystack: &str, table: &[(&str, &'static str)]) -> Option<&'static str> {
    table
        .iter()
        .find(|(keyword, _)| haystack.contains(keyword))
        .map(|(_, text)| *text)
}

/// Rule-based suggestion text. Total and deterministic; the body description is
/// accepted for parity with the generative composer but never inspected.
pub fn compose(quiz_answers: &str, _body_type_description: &str) -> SuggestionDocument {
    let answers = quiz_answers.to_lowercase();

    let mut sections: Vec<String> = vec![INTRO.to_string()];
    if let Some(style) = first_match(&answers, &STYLE_PARAGRAPHS) {
        sections.push(style.to_string());
    }

    // Lead-in is kept even without a matching palette.
    let mut color = COLOR_LEAD_IN.to_string();
    if let Some(rest) = first_match(&answers, &COLOR_CONTINUATIONS) {
        color.push_str(rest);
    }
    sections.push(color);

    sections.push(FIT_TIPS.to_string());
    sections.push(SUSTAINABILITY_NOTE.to_string());
    sections.push(PRO_TIP.to_string());

    SuggestionDocument::new(sections.join("\n\n"))
}

/// Offline composer used for static builds and demo mode.
#[derive(Debug, Default, Clone)]
pub struct MockComposer;

impl MockComposer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StyleComposer for MockComposer {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn suggest(&self, input: &SuggestionInput) -> Result<SuggestionOutput, StylistError> {
        info!("Using static mode - composing suggestions locally");
        tokio::time::sleep(MOCK_LATENCY).await;
        let doc = compose(&input.quiz_answers, &input.body_type_description);
        info!("✅ Composed {} chars of style suggestions", doc.as_str().len());
        Ok(doc.into_output())
    }
}
