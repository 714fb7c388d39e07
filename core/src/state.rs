use folio_types::{AppSettings, DocumentHash, LoadState, MAX_VIEWS, ViewIndex, ViewSlot};

/// Complete in-memory state of the reading client.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub views: [ViewSlot; MAX_VIEWS],
    pub settings: AppSettings,
}

impl AppState {
    #[must_use]
    pub fn view(&self, view: ViewIndex) -> Option<&ViewSlot> {
        self.views.get(view.index())
    }

    pub fn view_mut(&mut self, view: ViewIndex) -> Option<&mut ViewSlot> {
        self.views.get_mut(view.index())
    }

    /// Excerpt currently bound to question answering, if any.
    #[must_use]
    pub fn bound_excerpt(&self) -> Option<&str> {
        let excerpt = self.settings.ui.qa_excerpt.as_str();
        (!excerpt.trim().is_empty()).then_some(excerpt)
    }

    /// Document a question-answering thread should be created against: the
    /// fully loaded document in the selected view.
    #[must_use]
    pub fn qa_document(&self) -> Option<&DocumentHash> {
        self.view(self.settings.ui.selected_view)
            .filter(|slot| slot.load_state == LoadState::Complete)
            .and_then(|slot| slot.hash.as_ref())
    }
}
