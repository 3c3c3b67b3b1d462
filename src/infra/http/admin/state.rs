use std::sync::Arc;

use crate::application::editor::EditorService;
use crate::application::repos::PostDocuments;
use crate::infra::auth::OperatorSession;
use crate::infra::uploads::LocalObjectStorage;

#[derive(Clone)]
pub struct AdminState {
    pub editor: Arc<EditorService>,
    pub documents: Arc<dyn PostDocuments>,
    pub session: Arc<OperatorSession>,
    pub storage: Arc<LocalObjectStorage>,
    pub upload_limit_bytes: u64,
}
