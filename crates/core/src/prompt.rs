use crate::error::{QaError, TemplateError};
use crate::models::AssembledContext;
use crate::traits::LanguageModel;
use regex::Regex;
use std::path::Path;

pub const QUESTION_SLOT: &str = "question";
pub const CONTEXT_SLOT: &str = "context";

pub const DEFAULT_PROMPT_TEMPLATE: &str = "\
You are a helpful assistant that can answer questions about the document.
Answer the following question: $question

Use the context below:
$context

Instructions:
1. Be concise and accurate
2. If the context is insufficient, then say \"not enough info\"
3. Mention the page number(s) where the answer is found
";

const PLACEHOLDER_PATTERN: &str = r"\$(?:(?P<escaped>\$)|(?P<named>[_A-Za-z][_A-Za-z0-9]*)|\{(?P<braced>[_A-Za-z][_A-Za-z0-9]*)\}|(?P<invalid>))";

/// Prompt text with `$question` and `$context` slots. `${name}` is accepted
/// too and `$$` renders a literal dollar sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Literal(&'a str),
    Question,
    Context,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_PROMPT_TEMPLATE)
    }
}

impl PromptTemplate {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Falls back to the built-in template when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        match std::fs::read_to_string(path) {
            Ok(source) => Ok(Self::new(source)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(TemplateError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn validate(&self) -> Result<(), TemplateError> {
        self.segments().map(|_| ())
    }

    pub fn render(&self, question: &str, context: &AssembledContext) -> Result<String, TemplateError> {
        let segments = self.segments()?;
        let mut prompt = String::with_capacity(self.source.len() + question.len() + context.as_str().len());

        for segment in segments {
            match segment {
                Segment::Literal(text) => prompt.push_str(text),
                Segment::Question => prompt.push_str(question),
                Segment::Context => prompt.push_str(context.as_str()),
            }
        }

        Ok(prompt)
    }

    fn segments(&self) -> Result<Vec<Segment<'_>>, TemplateError> {
        let pattern = Regex::new(PLACEHOLDER_PATTERN)?;
        let mut segments = Vec::new();
        let mut cursor = 0;
        let mut has_question = false;
        let mut has_context = false;

        for captures in pattern.captures_iter(&self.source) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            segments.push(Segment::Literal(&self.source[cursor..whole.start()]));
            cursor = whole.end();

            if let Some(escaped) = captures.name("escaped") {
                segments.push(Segment::Literal(escaped.as_str()));
                continue;
            }

            let Some(name) = captures.name("named").or_else(|| captures.name("braced")) else {
                return Err(TemplateError::InvalidPlaceholder {
                    offset: whole.start(),
                });
            };

            match name.as_str() {
                QUESTION_SLOT => {
                    has_question = true;
                    segments.push(Segment::Question);
                }
                CONTEXT_SLOT => {
                    has_context = true;
                    segments.push(Segment::Context);
                }
                other => return Err(TemplateError::UnknownSlot(other.to_string())),
            }
        }
        segments.push(Segment::Literal(&self.source[cursor..]));

        if !has_question {
            return Err(TemplateError::MissingSlot(QUESTION_SLOT));
        }
        if !has_context {
            return Err(TemplateError::MissingSlot(CONTEXT_SLOT));
        }

        Ok(segments)
    }
}

/// Renders the prompt before calling the model, so template defects never
/// reach it. The model output is returned unchanged.
pub async fn answer<L>(
    llm: &L,
    question: &str,
    context: &AssembledContext,
    template: &PromptTemplate,
) -> Result<String, QaError>
where
    L: LanguageModel + ?Sized,
{
    let prompt = template.render(question, context)?;
    Ok(llm.generate(&prompt).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[derive(Default)]
    struct RecordingModel {
        calls: AtomicUsize,
        last_prompt: Mutex<Option<String>>,
    }

    #[async_trait]
    impl LanguageModel for RecordingModel {
        async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock().expect("prompt lock") = Some(prompt.to_string());
            Ok("  Page 2 says so.\n".to_string())
        }
    }

    struct FailingModel;

    #[async_trait]
    impl LanguageModel for FailingModel {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            Err(GenerationError::Api {
                status: 429,
                body: "rate limited".to_string(),
            })
        }
    }

    #[test]
    fn default_template_is_valid() {
        assert!(PromptTemplate::default().validate().is_ok());
    }

    #[test]
    fn both_placeholder_forms_are_substituted() {
        let template = PromptTemplate::new("Q: $question / C: ${context} / cost: $$5");
        let prompt = template
            .render("why?", &AssembledContext::new("because"))
            .expect("valid template");
        assert_eq!(prompt, "Q: why? / C: because / cost: $5");
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let template = PromptTemplate::new("$question|$context");
        let prompt = template
            .render("$context", &AssembledContext::new("$question"))
            .expect("valid template");
        assert_eq!(prompt, "$context|$question");
    }

    #[test]
    fn missing_slots_are_reported() {
        let without_context = PromptTemplate::new("Answer: $question");
        assert!(matches!(
            without_context.validate(),
            Err(TemplateError::MissingSlot(CONTEXT_SLOT))
        ));

        let without_question = PromptTemplate::new("Context: $context");
        assert!(matches!(
            without_question.validate(),
            Err(TemplateError::MissingSlot(QUESTION_SLOT))
        ));
    }

    #[test]
    fn unknown_and_invalid_placeholders_are_rejected() {
        let unknown = PromptTemplate::new("$question $context $audience");
        assert!(matches!(unknown.validate(), Err(TemplateError::UnknownSlot(name)) if name == "audience"));

        let stray = PromptTemplate::new("$question $context costs 5 $");
        assert!(matches!(
            stray.validate(),
            Err(TemplateError::InvalidPlaceholder { offset: 27 })
        ));
    }

    #[test]
    fn missing_template_file_falls_back_to_default() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let template = PromptTemplate::load(&dir.path().join("prompt_template.txt"))?;
        assert_eq!(template, PromptTemplate::default());
        Ok(())
    }

    #[test]
    fn template_file_is_read() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("prompt_template.txt");
        std::fs::write(&path, "Context:\n$context\n\nQuestion: $question\n")?;

        let template = PromptTemplate::load(&path)?;

        assert_eq!(template.source(), "Context:\n$context\n\nQuestion: $question\n");
        Ok(())
    }

    #[tokio::test]
    async fn answer_returns_model_output_verbatim() {
        let model = RecordingModel::default();
        let context = AssembledContext::new("Context 1 (Page 2):\nfoo");

        let text = answer(&model, "what is foo?", &context, &PromptTemplate::default())
            .await
            .expect("answer should succeed");

        assert_eq!(text, "  Page 2 says so.\n");
        let prompt = model.last_prompt.lock().expect("prompt lock").clone().unwrap_or_default();
        assert!(prompt.contains("Answer the following question: what is foo?"));
        assert!(prompt.contains("Context 1 (Page 2):\nfoo"));
    }

    #[tokio::test]
    async fn template_without_context_fails_before_the_model_is_called() {
        let model = RecordingModel::default();
        let template = PromptTemplate::new("Answer: $question");

        let result = answer(&model, "q", &AssembledContext::new("c"), &template).await;

        assert!(matches!(
            result,
            Err(QaError::Template(TemplateError::MissingSlot(CONTEXT_SLOT)))
        ));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn model_failure_is_a_generation_error() {
        let result = answer(
            &FailingModel,
            "q",
            &AssembledContext::new("c"),
            &PromptTemplate::default(),
        )
        .await;

        assert!(matches!(
            result,
            Err(QaError::Generation(GenerationError::Api { status: 429, .. }))
        ));
    }
}
