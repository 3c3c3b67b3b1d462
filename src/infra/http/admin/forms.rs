use serde::Deserialize;

use crate::application::editor::FieldsInput;

#[derive(Debug, Default, Deserialize)]
pub(super) struct EditorQuery {
    pub(super) id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct FieldsForm {
    title: String,
    slug: String,
    category: String,
    excerpt: String,
    html_content: String,
}

impl From<FieldsForm> for FieldsInput {
    fn from(form: FieldsForm) -> Self {
        Self {
            title: form.title,
            slug: form.slug,
            category: form.category,
            excerpt: form.excerpt,
            html_content: form.html_content,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct PublishConfirmForm {
    pub(super) code: String,
}
