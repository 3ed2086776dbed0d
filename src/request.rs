//! Assembly and validation of generation requests.
//!
//! A [`GenerationTemplate`] is the immutable snapshot of everything shared by
//! the requests of one run: credential, selected subjects, scene and options.
//! Validation happens once when the template is built, before any network
//! call. [`GenerationTemplate::request`] then merges one prompt into it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::credentials::ApiKey;
use crate::error::ValidationError;
use crate::media::ImagePayload;

pub type SubjectId = u32;

/// A named entity (usually a character) that should look the same across
/// every generated image.
#[derive(Debug, Clone)]
pub struct ReferenceSubject {
    pub id: SubjectId,
    pub name: String,
    image: Option<ImagePayload>,
    selected: bool,
}

impl ReferenceSubject {
    pub fn new(id: SubjectId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            image: None,
            selected: false,
        }
    }

    /// Four empty, unselected slots.
    pub fn default_roster() -> Vec<Self> {
        (1..=4).map(|id| Self::new(id, format!("Character {id}"))).collect()
    }

    /// Binds an image and selects the subject.
    pub fn bind_image(&mut self, image: ImagePayload) {
        self.image = Some(image);
        self.selected = true;
    }

    /// Toggling selection never discards the bound image.
    pub fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn image(&self) -> Option<&ImagePayload> {
        self.image.as_ref()
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Selected and image-bound.
    pub fn is_active(&self) -> bool {
        self.selected && self.image.is_some()
    }
}

/// Background image constraining the generated composition.
#[derive(Debug, Clone)]
pub struct SceneReference {
    pub image: ImagePayload,
}

impl SceneReference {
    pub fn new(image: ImagePayload) -> Self {
        Self { image }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AspectRatio {
    #[default]
    Square,
    Wide,
    Tall,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Wide => "16:9",
            AspectRatio::Tall => "9:16",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layout options. Copied into the template when a run starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub aspect_ratio: AspectRatio,
    pub use_scene: bool,
    pub preserve_scene: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            aspect_ratio: AspectRatio::Square,
            use_scene: true,
            preserve_scene: true,
        }
    }
}

/// A subject as captured by the template.
#[derive(Debug, Clone)]
pub struct SubjectImage {
    pub name: String,
    pub image: ImagePayload,
}

#[derive(Debug, Clone)]
pub struct GenerationTemplate {
    credential: ApiKey,
    subjects: Vec<SubjectImage>,
    scene: Option<ImagePayload>,
    options: GenerationOptions,
}

impl GenerationTemplate {
    /// Validates preconditions in order: credential, scene, subjects.
    pub fn build(
        subjects: &[ReferenceSubject],
        scene: Option<&SceneReference>,
        options: &GenerationOptions,
        credential: Option<&ApiKey>,
    ) -> Result<Self, ValidationError> {
        let credential = match credential {
            Some(key) if !key.is_blank() => key.clone(),
            _ => return Err(ValidationError::MissingCredential),
        };

        let scene = if options.use_scene {
            Some(scene.ok_or(ValidationError::MissingScene)?.image.clone())
        } else {
            None
        };

        let subjects: Vec<SubjectImage> = subjects
            .iter()
            .filter(|s| s.is_active())
            .filter_map(|s| {
                s.image().map(|image| SubjectImage {
                    name: s.name.clone(),
                    image: image.clone(),
                })
            })
            .collect();
        if subjects.is_empty() {
            return Err(ValidationError::NoSubjectsSelected);
        }

        Ok(Self {
            credential,
            subjects,
            scene,
            options: *options,
        })
    }

    /// Merges one prompt into the template.
    pub fn request(&self, prompt: &str) -> Result<GenerationRequest<'_>, ValidationError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }
        Ok(GenerationRequest {
            template: self,
            prompt: prompt.to_string(),
            instruction: compose_instruction(self, prompt),
        })
    }

    pub fn credential(&self) -> &ApiKey {
        &self.credential
    }

    pub fn subjects(&self) -> &[SubjectImage] {
        &self.subjects
    }

    pub fn scene(&self) -> Option<&ImagePayload> {
        self.scene.as_ref()
    }

    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }
}

/// One fully specified call to the generation capability.
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    template: &'a GenerationTemplate,
    prompt: String,
    instruction: String,
}

impl GenerationRequest<'_> {
    pub fn credential(&self) -> &ApiKey {
        &self.template.credential
    }

    /// The user's prompt, trimmed.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// The full instruction text sent alongside the images.
    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn subjects(&self) -> &[SubjectImage] {
        &self.template.subjects
    }

    pub fn scene(&self) -> Option<&ImagePayload> {
        self.template.scene.as_ref()
    }

    pub fn preserve_scene(&self) -> bool {
        self.template.options.preserve_scene
    }

    pub fn aspect_ratio(&self) -> AspectRatio {
        self.template.options.aspect_ratio
    }
}

// Image order on the wire is: scene (if any), then subjects in roster order.
fn compose_instruction(template: &GenerationTemplate, prompt: &str) -> String {
    let offset = usize::from(template.scene.is_some());
    let names = template
        .subjects
        .iter()
        .enumerate()
        .map(|(i, s)| format!("image {} is \"{}\"", i + 1 + offset, s.name))
        .collect::<Vec<_>>()
        .join("; ");

    let scene = match (&template.scene, template.options.preserve_scene) {
        (Some(_), true) => {
            "Image 1 is the scene. Keep its background, composition, layout and lighting \
             exactly as they are and place the characters into it."
        }
        (Some(_), false) => {
            "Image 1 is the scene. Use it as inspiration for setting and mood; the \
             composition may change to fit the description."
        }
        (None, _) => "Invent a background that fits the description.",
    };

    format!(
        "Generate one image for this description: {prompt}\n\n\
         Characters: {names}. Keep each character's face, hair, clothing and proportions \
         consistent with their reference image, and use their names as written in the description.\n\
         Scene: {scene}\n\
         Aspect ratio: {ratio}.",
        ratio = template.options.aspect_ratio,
    )
}
