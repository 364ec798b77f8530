// Integration tests for the edit studio against a scripted generation service

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use edit_studio::{
    EditOperation, EditStudio, FieldValue, Image, ImageCapabilities, ImageResponse, Point,
    SessionState, StructuredDescription, StudioConfig, StudioError, ToolKind,
};
use serde_json::json;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Edit(ToolKind),
    Analyze,
    Regenerate(String),
}

/// Replays queued responses and records every request it receives.
#[derive(Default)]
struct ScriptedService {
    responses: Mutex<VecDeque<anyhow::Result<ImageResponse>>>,
    analysis: Mutex<Option<StructuredDescription>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedService {
    fn reply(self, response: anyhow::Result<ImageResponse>) -> Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    fn analyzing_to(self, description: StructuredDescription) -> Self {
        *self.analysis.lock().unwrap() = Some(description);
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn next(&self) -> anyhow::Result<ImageResponse> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("no scripted response left")))
    }
}

#[async_trait]
impl ImageCapabilities for ScriptedService {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn edit(&self, _image: &Image, operation: &EditOperation) -> anyhow::Result<ImageResponse> {
        self.calls.lock().unwrap().push(Call::Edit(operation.tool()));
        self.next()
    }

    async fn analyze_structure(
        &self,
        description: &StructuredDescription,
    ) -> anyhow::Result<StructuredDescription> {
        self.calls.lock().unwrap().push(Call::Analyze);
        Ok(self
            .analysis
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| description.clone()))
    }

    async fn regenerate(&self, instruction: &str, _reference: &Image) -> anyhow::Result<ImageResponse> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Regenerate(instruction.to_string()));
        self.next()
    }
}

fn description_d() -> StructuredDescription {
    StructuredDescription::from_value(json!({"lighting": "soft", "objects": ["chair", "lamp"]}))
        .unwrap()
}

fn image_a() -> Image {
    Image::new("https://cdn.example/a.png")
        .with_seed(42)
        .with_description(description_d())
}

fn open() -> EditStudio {
    EditStudio::open(image_a(), 256, 256, StudioConfig::default())
}

fn paint(studio: &mut EditStudio) {
    studio.pointer_down(Point::new(40.0, 40.0));
    studio.pointer_move(Point::new(120.0, 90.0));
    studio.pointer_up();
}

#[tokio::test]
async fn test_remove_background_carries_description_forward() {
    let service = ScriptedService::default().reply(Ok(ImageResponse::with_url("b.png")));
    let mut studio = open();

    studio.select_tool(ToolKind::RemoveBackground).unwrap();
    studio.apply(&service).await.unwrap();

    assert_eq!(service.calls(), vec![Call::Edit(ToolKind::RemoveBackground)]);
    assert_eq!(studio.current().url, "b.png");
    assert_eq!(studio.current().structured_description, Some(description_d()));
    assert_eq!(studio.active_tool(), ToolKind::View);
    assert_eq!(studio.state(), SessionState::Dirty);

    studio.open_remix(&service).await.unwrap();
    assert!(studio.remix().is_some());
}

#[tokio::test]
async fn test_regeneration_instruction_lists_only_changes() {
    let service = ScriptedService::default()
        .analyzing_to(description_d())
        .reply(Ok(ImageResponse::with_url("v.png")));
    let mut studio = open();

    studio.open_remix(&service).await.unwrap();
    let editor = studio.remix_mut().unwrap();
    editor.remove_item("objects", 1).unwrap();
    editor.set_additional_instructions("make it night");
    studio.regenerate(&service).await.unwrap();

    assert_eq!(
        service.calls(),
        vec![
            Call::Analyze,
            Call::Regenerate("Objects:\nchair\n\nAdditional Instructions: make it night".into()),
        ]
    );
    assert_eq!(studio.state(), SessionState::VariationPending);
    assert_eq!(studio.current().url, "v.png");
}

#[tokio::test]
async fn test_discard_variation_restores_exact_snapshot() {
    let service = ScriptedService::default()
        .reply(Ok(ImageResponse::with_url("b.png")))
        .reply(Ok(ImageResponse {
            image_url: Some("v.png".into()),
            seed: Some(7),
            structured_prompt: Some(json!({"lighting": "neon"})),
        }));
    let mut studio = open();
    studio.select_tool(ToolKind::RemoveForeground).unwrap();
    studio.apply(&service).await.unwrap();
    let before = studio.current().clone();
    let generation = studio.session().generation();

    studio.open_remix(&service).await.unwrap();
    studio
        .remix_mut()
        .unwrap()
        .set_text("lighting", "harsh noon sun")
        .unwrap();
    studio.regenerate(&service).await.unwrap();
    assert_eq!(studio.current().seed, Some(7));
    assert!(!studio.can_save_or_discard());
    assert_eq!(studio.save().unwrap_err(), StudioError::VariationPending);

    studio.discard_variation().unwrap();
    assert_eq!(studio.current(), &before);
    assert_eq!(studio.session().generation(), generation);
    assert_eq!(studio.state(), SessionState::Dirty);
    // Field edits survive so the user can retry.
    assert!(studio.remix().unwrap().has_changes());
}

#[tokio::test]
async fn test_accept_variation_restarts_remix_from_result() {
    let service = ScriptedService::default().reply(Ok(ImageResponse {
        image_url: Some("v.png".into()),
        seed: None,
        structured_prompt: Some(json!(r#"{"lighting": "neon"}"#)),
    }));
    let mut studio = open();
    studio.open_remix(&service).await.unwrap();
    studio
        .remix_mut()
        .unwrap()
        .set_additional_instructions("make it rain");
    studio.regenerate(&service).await.unwrap();

    studio.accept_variation().unwrap();
    assert_eq!(studio.state(), SessionState::Dirty);
    let editor = studio.remix().unwrap();
    assert!(!editor.can_regenerate());
    assert_eq!(editor.field_names().collect::<Vec<_>>(), vec!["lighting"]);
}

#[tokio::test]
async fn test_fill_without_instruction_is_refused_locally() {
    let service = ScriptedService::default();
    let mut studio = open();
    studio.select_tool(ToolKind::GenerativeFill).unwrap();
    paint(&mut studio);
    let painted = studio.mask().painted_pixels();

    let err = studio.apply(&service).await.unwrap_err();
    assert_eq!(err, StudioError::MissingInstruction(ToolKind::GenerativeFill));
    assert!(service.calls().is_empty());
    assert_eq!(studio.current(), &image_a());
    assert_eq!(studio.state(), SessionState::Clean);
    assert_eq!(studio.mask().painted_pixels(), painted);
    assert_eq!(studio.active_tool(), ToolKind::GenerativeFill);
    assert!(!studio.is_processing());
}

#[tokio::test]
async fn test_unchanged_remix_is_not_sent() {
    let service = ScriptedService::default();
    let mut studio = open();
    studio.open_remix(&service).await.unwrap();
    studio
        .remix_mut()
        .unwrap()
        .set_text("lighting", "  soft ")
        .unwrap();

    let err = studio.regenerate(&service).await.unwrap_err();
    assert_eq!(err, StudioError::NothingToRegenerate);
    assert_eq!(service.calls(), vec![Call::Analyze]);
    assert_eq!(studio.state(), SessionState::Clean);
}

#[tokio::test]
async fn test_erase_clears_mask_and_locks_tools_until_saved() {
    let service = ScriptedService::default().reply(Ok(ImageResponse::with_url("erased.png")));
    let mut studio = open();
    studio.select_tool(ToolKind::Erase).unwrap();
    paint(&mut studio);
    studio.apply(&service).await.unwrap();

    assert!(!studio.mask().has_paint());
    assert!(studio.has_unsaved_changes());
    assert_eq!(
        studio.select_tool(ToolKind::Expand).unwrap_err(),
        StudioError::UnsavedChanges
    );
    // Structured remix stays reachable while dirty.
    studio.select_tool(ToolKind::StructuredRemix).unwrap();
    studio.select_tool(ToolKind::View).unwrap();

    let saved = studio.save().unwrap();
    assert!(saved.changed);
    assert_eq!(saved.original, image_a());
    assert_eq!(saved.current.url, "erased.png");
}

#[tokio::test]
async fn test_discard_returns_to_original() {
    let service = ScriptedService::default().reply(Ok(ImageResponse::with_url("blurred.png")));
    let mut studio = open();
    studio.select_tool(ToolKind::BlurBackground).unwrap();
    studio.tools_mut().set_blur_intensity(5).unwrap();
    studio.apply(&service).await.unwrap();

    studio.discard().unwrap();
    assert_eq!(studio.current(), &image_a());
    assert_eq!(studio.state(), SessionState::Clean);
    studio.select_tool(ToolKind::Expand).unwrap();
}

#[tokio::test]
async fn test_service_failure_leaves_state_untouched() {
    let service = ScriptedService::default()
        .reply(Err(anyhow::anyhow!("upstream timed out")))
        .reply(Ok(ImageResponse::default()));
    let mut studio = open();
    studio.select_tool(ToolKind::ReplaceBackground).unwrap();
    studio.tools_mut().inputs_mut().replace_prompt = "a beach at dusk".into();

    let err = studio.apply(&service).await.unwrap_err();
    assert!(err.is_service_failure());
    assert!(err.to_string().contains("upstream timed out"));
    assert_eq!(studio.current(), &image_a());
    assert_eq!(studio.tools().inputs().replace_prompt, "a beach at dusk");
    assert!(!studio.is_processing());

    let err = studio.apply(&service).await.unwrap_err();
    assert!(matches!(err, StudioError::MalformedResponse(_)));
    assert_eq!(studio.state(), SessionState::Clean);
    assert_eq!(studio.last_error(), Some(&err));
}

#[tokio::test]
async fn test_one_request_at_a_time() {
    let service = ScriptedService::default().reply(Ok(ImageResponse::with_url("b.png")));
    let mut studio = open();
    studio.select_tool(ToolKind::RemoveBackground).unwrap();

    let invocation = studio.prepare_apply().unwrap();
    assert!(studio.is_processing());
    assert_eq!(studio.prepare_apply().unwrap_err(), StudioError::Busy);
    assert_eq!(studio.select_tool(ToolKind::Erase).unwrap_err(), StudioError::Busy);
    assert_eq!(studio.discard().unwrap_err(), StudioError::Busy);

    let outcome = invocation.run(&service).await;
    studio.complete(outcome).unwrap();
    assert!(!studio.is_processing());
    assert_eq!(studio.current().url, "b.png");
}

#[tokio::test]
async fn test_leaving_remix_keeps_other_tools_locked() {
    let service = ScriptedService::default()
        .reply(Ok(ImageResponse::with_url("erased.png")))
        .reply(Ok(ImageResponse::with_url("filled.png")));
    let mut studio = open();
    studio.select_tool(ToolKind::Erase).unwrap();
    paint(&mut studio);
    studio.apply(&service).await.unwrap();

    studio.select_tool(ToolKind::StructuredRemix).unwrap();
    assert_eq!(
        studio.select_tool(ToolKind::GenerativeFill).unwrap_err(),
        StudioError::UnsavedChanges
    );
    assert_eq!(studio.active_tool(), ToolKind::StructuredRemix);
    assert!(studio.apply(&service).await.is_err());
    assert_eq!(service.calls(), vec![Call::Edit(ToolKind::Erase)]);
    assert_eq!(studio.current().url, "erased.png");

    studio.select_tool(ToolKind::View).unwrap();
}

#[tokio::test]
async fn test_remix_cannot_reopen_over_pending_variation() {
    let service = ScriptedService::default().reply(Ok(ImageResponse {
        image_url: Some("v.png".into()),
        seed: None,
        structured_prompt: Some(json!({"lighting": "neon", "objects": ["chair", "lamp"]})),
    }));
    let mut studio = open();
    studio.open_remix(&service).await.unwrap();
    studio
        .remix_mut()
        .unwrap()
        .set_text("lighting", "neon")
        .unwrap();
    studio.regenerate(&service).await.unwrap();

    assert_eq!(
        studio.open_remix(&service).await.unwrap_err(),
        StudioError::VariationPending
    );
    assert!(!studio.is_processing());
    assert_eq!(service.calls().len(), 2);

    studio.discard_variation().unwrap();
    let baseline = studio.remix().unwrap().original().get("lighting").cloned();
    assert_eq!(baseline, Some(FieldValue::Text("soft".into())));
    assert_eq!(
        studio.current().structured_description.as_ref().unwrap().get("lighting"),
        Some(&json!("soft"))
    );
}

#[tokio::test]
async fn test_discard_restores_original_native_size() {
    let service = ScriptedService::default().reply(Ok(ImageResponse::with_url("wide.png")));
    let mut studio = open();
    studio.select_tool(ToolKind::Expand).unwrap();
    studio.apply(&service).await.unwrap();
    studio.set_native_size(456, 256);
    assert_eq!(studio.mask().dimensions(), (456, 256));

    studio.discard().unwrap();
    assert_eq!(studio.current(), &image_a());
    assert_eq!(studio.mask().dimensions(), (256, 256));
    assert_eq!(studio.mapper().native_size(), (256, 256));
}

#[tokio::test]
async fn test_discard_variation_restores_native_size() {
    let service = ScriptedService::default().reply(Ok(ImageResponse::with_url("v.png")));
    let mut studio = open();
    studio.open_remix(&service).await.unwrap();
    studio
        .remix_mut()
        .unwrap()
        .set_additional_instructions("widen the shot");
    studio.regenerate(&service).await.unwrap();
    studio.set_native_size(512, 288);

    studio.discard_variation().unwrap();
    assert_eq!(studio.mask().dimensions(), (256, 256));
    assert_eq!(studio.mapper().native_size(), (256, 256));
}

#[tokio::test]
async fn test_switching_masking_tools_keeps_the_mask() {
    let mut studio = open();
    studio.select_tool(ToolKind::Erase).unwrap();
    paint(&mut studio);
    let painted = studio.mask().painted_pixels();
    assert!(painted > 0);

    studio.select_tool(ToolKind::GenerativeFill).unwrap();
    assert_eq!(studio.mask().painted_pixels(), painted);
    studio.select_tool(ToolKind::View).unwrap();
    studio.select_tool(ToolKind::Erase).unwrap();
    assert_eq!(studio.mask().painted_pixels(), painted);
}
