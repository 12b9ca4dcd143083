use std::sync::Arc;

use crate::analysis::RequestHandler;

#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<RequestHandler>,
}

impl AppState {
    pub fn new(handler: RequestHandler) -> Self {
        AppState {
            handler: Arc::new(handler),
        }
    }
}
