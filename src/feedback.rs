//! User-facing feedback: toasts, the loading indicator and confirmations.

use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Info,
    Success,
    Error,
}

pub trait Feedback {
    fn show_loading(&self, message: &str);
    fn hide_loading(&self);
    fn toast(&self, message: &str, kind: ToastKind);
    /// Ask before a destructive action. `false` aborts silently.
    fn confirm(&self, question: &str) -> bool;
}

/// Loading indicator released on drop, whatever path the action leaves by.
#[must_use = "the indicator is hidden as soon as the guard is dropped"]
pub struct Loading {
    ui: Rc<dyn Feedback>,
}

impl Loading {
    pub fn start(ui: &Rc<dyn Feedback>, message: &str) -> Self {
        ui.show_loading(message);
        Self { ui: Rc::clone(ui) }
    }
}

impl Drop for Loading {
    fn drop(&mut self) {
        self.ui.hide_loading();
    }
}
