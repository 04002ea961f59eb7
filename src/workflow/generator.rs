//! Creative generation seam.
//!
//! Real script and image generation lives behind [`CreativeGenerator`]. The
//! state machine never trusts a generator blindly: output is validated, and any
//! failure is replaced with [`TemplateGenerator`] content so a workflow cannot
//! stall on an unavailable backend.

use sha2::{Digest, Sha256};
use thiserror::Error;
use url::Url;

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

use crate::config::GenerationConfig;
use crate::workflow::types::{ScriptVariant, ThumbnailVariant};

/// Each generation round produces exactly this many candidates.
pub const VARIANT_COUNT: usize = 3;

pub const MIN_RETENTION: f64 = 0.60;
pub const MAX_RETENTION: f64 = 0.90;

const THUMBNAIL_PREAMBLE: &str =
    "YouTube thumbnail, 16:9, ultra-sharp, high CTR composition, no watermark, no logos, no signatures.";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeneratorError {
    #[error("creative generator unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("expected {expected} variants, generator returned {found}")]
    WrongVariantCount { expected: usize, found: usize },

    #[error("invalid image base URL {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

/// Inputs shared by both generation calls.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationContext {
    pub workflow_id: String,
    pub platforms: Vec<String>,
    pub brand_voice: String,
}

#[cfg_attr(any(test, feature = "testing"), automock)]
pub trait CreativeGenerator: Send + Sync {
    fn generate_scripts(
        &self,
        topic: &str,
        context: &GenerationContext,
    ) -> Result<Vec<ScriptVariant>, GeneratorError>;

    fn generate_thumbnails(
        &self,
        topic: &str,
        script: &ScriptVariant,
        context: &GenerationContext,
    ) -> Result<Vec<ThumbnailVariant>, GeneratorError>;
}

/// Check count and clamp retention into range.
pub fn validate_scripts(mut scripts: Vec<ScriptVariant>) -> Result<Vec<ScriptVariant>, GeneratorError> {
    if scripts.len() != VARIANT_COUNT {
        return Err(GeneratorError::WrongVariantCount {
            expected: VARIANT_COUNT,
            found: scripts.len(),
        });
    }
    for script in &mut scripts {
        script.predicted_retention = if script.predicted_retention.is_nan() {
            MIN_RETENTION
        } else {
            script.predicted_retention.clamp(MIN_RETENTION, MAX_RETENTION)
        };
    }
    Ok(scripts)
}

pub fn validate_thumbnails(
    thumbnails: Vec<ThumbnailVariant>,
) -> Result<Vec<ThumbnailVariant>, GeneratorError> {
    if thumbnails.len() != VARIANT_COUNT {
        return Err(GeneratorError::WrongVariantCount {
            expected: VARIANT_COUNT,
            found: thumbnails.len(),
        });
    }
    Ok(thumbnails)
}

fn digest_hex(input: &str, chars: usize) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<String>()
        .chars()
        .take(chars)
        .collect()
}

/// Image seed for the `index`th thumbnail of a workflow: first 32 bits of
/// SHA-256("{workflow_id}:{index}"), never zero.
pub fn thumbnail_seed(workflow_id: &str, index: usize) -> u32 {
    let digest = Sha256::digest(format!("{workflow_id}:{index}").as_bytes());
    let seed = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    seed.max(1)
}

/// Placeholder script used when a thumbnail round has no script to work from.
pub fn synthetic_script(topic: &str) -> ScriptVariant {
    ScriptVariant {
        id: format!("script-{}", digest_hex(&format!("{topic}:synthetic"), 12)),
        hook: format!("{topic} made simple"),
        body: format!("Practical explanation for {topic}."),
        cta: "Follow for more.".to_string(),
        predicted_retention: 0.75,
        tone: "fallback".to_string(),
    }
}

/// Deterministic generator: fixed script templates keyed by topic and
/// prompt-built thumbnails pointing at an image rendering service.
#[derive(Debug, Clone)]
pub struct TemplateGenerator {
    image_base: Url,
    width: u32,
    height: u32,
}

impl TemplateGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self, GeneratorError> {
        let image_base =
            Url::parse(&config.image_base_url).map_err(|e| GeneratorError::InvalidBaseUrl {
                url: config.image_base_url.clone(),
                reason: e.to_string(),
            })?;
        if image_base.cannot_be_a_base() {
            return Err(GeneratorError::InvalidBaseUrl {
                url: config.image_base_url.clone(),
                reason: "URL cannot carry a path".to_string(),
            });
        }
        Ok(Self {
            image_base,
            width: config.thumbnail_width,
            height: config.thumbnail_height,
        })
    }

    pub fn scripts(&self, topic: &str) -> Vec<ScriptVariant> {
        let templates = [
            (
                "pattern_interrupt",
                format!("You are doing {topic} wrong."),
                format!("Most creators miss this: one concrete mistake in {topic}, then the fix in 3 steps."),
                "Comment 'fix' and I will share the checklist.",
                0.78,
            ),
            (
                "curiosity_gap",
                format!("I found the hidden shortcut for {topic}."),
                "Set up the problem, tease the missing piece, reveal it with a quick before/after.".to_string(),
                "Save this for your next post.",
                0.81,
            ),
            (
                "authority_play",
                format!("As a creator, here is what actually works for {topic}."),
                "Use one proof point, one framework, then one tactical action viewers can apply today."
                    .to_string(),
                "Follow for weekly breakdowns.",
                0.76,
            ),
        ];

        templates
            .into_iter()
            .map(|(tone, hook, body, cta, retention)| ScriptVariant {
                id: format!("script-{}", digest_hex(&format!("{topic}:{tone}"), 12)),
                hook,
                body,
                cta: cta.to_string(),
                predicted_retention: retention,
                tone: tone.to_string(),
            })
            .collect()
    }

    pub fn thumbnails(&self, topic: &str, script: &ScriptVariant, workflow_id: &str) -> Vec<ThumbnailVariant> {
        let hook = &script.hook;
        let directions = [
            (
                "face_focused",
                format!(
                    "Close-up expressive creator face, cinematic lighting, dramatic emotion, topic {topic}. Hook text: {hook}."
                ),
            ),
            (
                "product_focused",
                format!(
                    "Hero product/object composition, clean background, high contrast, visual metaphor for {topic}. Hook text: {hook}."
                ),
            ),
            (
                "text_heavy",
                format!(
                    "Bold typography thumbnail with 3-5 punchy words, dynamic arrows/shapes, clear hierarchy around {topic}. Hook text: {hook}."
                ),
            ),
        ];

        directions
            .into_iter()
            .enumerate()
            .map(|(index, (style, direction))| {
                let prompt = format!("{THUMBNAIL_PREAMBLE} {direction}");
                let seed = thumbnail_seed(workflow_id, index);
                ThumbnailVariant {
                    id: format!("thumb-{}", digest_hex(&format!("{workflow_id}:{script_id}:{style}", script_id = script.id), 12)),
                    style: style.to_string(),
                    image_url: self.image_url(&prompt, seed),
                    prompt,
                    seed,
                }
            })
            .collect()
    }

    /// `{base}/{percent-encoded prompt}?seed=..&width=..&height=..&nologo=true&enhance=true`
    pub fn image_url(&self, prompt: &str, seed: u32) -> String {
        let mut url = self.image_base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(prompt);
        }
        url.query_pairs_mut()
            .clear()
            .append_pair("seed", &seed.to_string())
            .append_pair("width", &self.width.to_string())
            .append_pair("height", &self.height.to_string())
            .append_pair("nologo", "true")
            .append_pair("enhance", "true");
        url.to_string()
    }
}

impl CreativeGenerator for TemplateGenerator {
    fn generate_scripts(
        &self,
        topic: &str,
        _context: &GenerationContext,
    ) -> Result<Vec<ScriptVariant>, GeneratorError> {
        Ok(self.scripts(topic))
    }

    fn generate_thumbnails(
        &self,
        topic: &str,
        script: &ScriptVariant,
        context: &GenerationContext,
    ) -> Result<Vec<ThumbnailVariant>, GeneratorError> {
        Ok(self.thumbnails(topic, script, &context.workflow_id))
    }
}
