use tracing::debug;

use crate::config::UploadConfig;
use crate::error::UploadError;
use crate::events::UploadEvent;
use crate::queue::UploadManager;
use crate::task::{FilePayload, TaskId, UploadTask};
use crate::validation::{validate_extension, validate_size};

/// Default multipart field name for the file part, matching the plain
/// single-input upload form.
pub const FILE_FIELD: &str = "Filedata";

/// UI-observable lifecycle of one slot. An error is a parallel flag, not a
/// state: it never blocks a later valid selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    Selected,
    InProgress,
    Done,
}

/// One file-input unit holding zero or one selection.
#[derive(Debug, Clone)]
pub struct Slot {
    pub state: SlotState,
    pub error: Option<String>,
    pub filename: Option<String>,
    pub progress: f64,
    field_name: String,
    selection: Option<FilePayload>,
    task: Option<TaskId>,
}

impl Slot {
    fn empty() -> Self {
        Self {
            state: SlotState::Empty,
            error: None,
            filename: None,
            progress: 0.0,
            field_name: FILE_FIELD.to_string(),
            selection: None,
            task: None,
        }
    }

    fn reset(&mut self) {
        *self = Slot::empty();
    }

    pub fn has_selection(&self) -> bool {
        self.selection.is_some()
    }
}

/// What a submit did synchronously.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing was enqueued; navigate straight to the destination.
    Redirect(String),
    /// This many tasks were enqueued; the redirect arrives via `Drained`.
    Submitted(usize),
}

/// Slot list and submit logic of the upload form, decoupled from any
/// rendering surface. Input operations (select, submit, cancel, clear) mutate
/// slot state synchronously; upload outcomes are folded back in via
/// [`FormController::apply`].
pub struct FormController {
    config: UploadConfig,
    fields: Vec<(String, String)>,
    slots: Vec<Slot>,
    locked: bool,
}

impl FormController {
    /// `fields` are the non-file form fields, in document order.
    pub fn new(config: UploadConfig, fields: Vec<(String, String)>) -> Self {
        Self {
            config,
            fields,
            slots: vec![Slot::empty()],
            locked: false,
        }
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// True once uploads have started; cancel and clear are ignored from then
    /// on (in-flight requests cannot be cancelled).
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// A file was picked for the given slot. Both validations run on the new
    /// selection; a failure records the slot error and drops the selection so
    /// a later submit cannot pick it up. A valid selection into the last slot
    /// appends a fresh empty slot, one row at a time.
    pub fn select_file(&mut self, index: usize, payload: FilePayload) -> Result<(), UploadError> {
        if index >= self.slots.len() {
            return Err(UploadError::Config(format!("no slot at index {index}")));
        }

        let result = validate_extension(
            &payload.filename,
            self.config.allowed_extensions.as_deref(),
        )
        .and_then(|_| validate_size(payload.size(), &self.config.size_limit));

        let is_last = index + 1 == self.slots.len();
        let slot = &mut self.slots[index];

        if let Err(err) = result {
            debug!(slot = index, filename = %payload.filename, %err, "selection rejected");
            slot.selection = None;
            slot.filename = None;
            slot.state = SlotState::Empty;
            slot.error = Some(match &err {
                UploadError::SizeRejected { .. } => self.config.messages.size_error.clone(),
                _ => self.config.messages.extension_error.clone(),
            });
            return Err(err);
        }

        slot.error = None;
        slot.filename = Some(payload.filename.clone());
        slot.selection = Some(payload);
        slot.state = SlotState::Selected;

        if is_last {
            self.slots.push(Slot::empty());
        }
        Ok(())
    }

    /// Per-slot cancel: remove the slot if siblings exist, otherwise reset it
    /// in place. Never touches in-flight requests.
    pub fn cancel_slot(&mut self, index: usize) {
        if self.locked || index >= self.slots.len() {
            return;
        }
        if self.slots.len() > 1 {
            self.slots.remove(index);
        } else {
            self.slots[index].reset();
        }
    }

    /// Clear-all: remove every slot but the last and reset that one.
    pub fn clear_all(&mut self) {
        if self.locked {
            return;
        }
        let last = self.slots.len() - 1;
        self.slots.drain(..last);
        self.slots[0].reset();
    }

    /// Submit the form: capture the form fields once and enqueue a task for
    /// every slot holding a selection. The fast path branches on the loop's
    /// own count, not on queue length: a dispatched task may settle on
    /// another worker thread before this returns, and a drained queue must
    /// not masquerade as "nothing was selected". Zero enqueued tasks means
    /// redirect immediately, without any network call.
    pub fn submit(&mut self, manager: &UploadManager) -> SubmitOutcome {
        self.locked = true;
        let fields = self.fields.clone();

        let mut enqueued = 0;
        for slot in &mut self.slots {
            let Some(file) = slot.selection.clone() else {
                continue;
            };
            let handle = manager.enqueue(UploadTask {
                field_name: slot.field_name.clone(),
                file,
                form_fields: fields.clone(),
            });
            slot.task = Some(handle.id);
            slot.state = SlotState::InProgress;
            slot.error = None;
            slot.progress = 0.0;
            enqueued += 1;
        }

        if enqueued == 0 {
            return SubmitOutcome::Redirect(self.config.redirect_when_done.clone());
        }
        SubmitOutcome::Submitted(enqueued)
    }

    /// Fold an upload event back into slot state. Returns the redirect URL
    /// once the queue has drained; failed slots do not hold the redirect
    /// back.
    pub fn apply(&mut self, event: &UploadEvent) -> Option<String> {
        match event {
            UploadEvent::Progress { task, percent } => {
                if let Some(slot) = self.slot_mut(*task) {
                    slot.progress = *percent;
                }
                None
            }
            UploadEvent::Succeeded { .. } => None,
            UploadEvent::Failed { task, .. } => {
                let message = self.config.messages.server_error.clone();
                if let Some(slot) = self.slot_mut(*task) {
                    slot.error = Some(message);
                }
                None
            }
            UploadEvent::Settled { task } => {
                // Always runs, win or lose: drop the selection so this slot
                // cannot be resubmitted.
                if let Some(slot) = self.slot_mut(*task) {
                    slot.selection = None;
                    slot.state = SlotState::Done;
                }
                None
            }
            UploadEvent::Drained => Some(self.config.redirect_when_done.clone()),
        }
    }

    fn slot_mut(&mut self, task: TaskId) -> Option<&mut Slot> {
        self.slots.iter_mut().find(|slot| slot.task == Some(task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SizeLimit;
    use url::Url;

    fn config() -> UploadConfig {
        UploadConfig::new(Url::parse("http://localhost:3000/upload").unwrap())
    }

    fn controller(config: UploadConfig) -> FormController {
        FormController::new(config, Vec::new())
    }

    fn png(size: usize) -> FilePayload {
        FilePayload::new("a.png", vec![0u8; size])
    }

    #[test]
    fn test_valid_selection_appends_slot() {
        let mut form = controller(config());
        assert_eq!(form.slot_count(), 1);

        form.select_file(0, png(10)).unwrap();
        assert_eq!(form.slot_count(), 2);
        assert_eq!(form.slots()[0].state, SlotState::Selected);
        assert_eq!(form.slots()[0].filename.as_deref(), Some("a.png"));
        assert_eq!(form.slots()[1].state, SlotState::Empty);

        // Re-selecting into a non-last slot does not append another.
        form.select_file(0, png(20)).unwrap();
        assert_eq!(form.slot_count(), 2);
    }

    #[test]
    fn test_rejected_selection_sets_error_and_keeps_slot_empty() {
        let mut cfg = config();
        cfg.allowed_extensions = Some(vec![".png".to_string()]);
        let mut form = controller(cfg);

        let err = form.select_file(0, FilePayload::new("notes.txt", b"hi".as_slice()));
        assert!(err.is_err());
        assert_eq!(form.slot_count(), 1);
        let slot = &form.slots()[0];
        assert_eq!(slot.state, SlotState::Empty);
        assert!(!slot.has_selection());
        assert_eq!(slot.error.as_deref(), Some("File extension is not allowed"));
    }

    #[test]
    fn test_size_rejection_uses_size_message() {
        let mut cfg = config();
        cfg.size_limit = SizeLimit::Max(100);
        let mut form = controller(cfg);

        form.select_file(0, png(101)).unwrap_err();
        assert_eq!(
            form.slots()[0].error.as_deref(),
            Some("File exceeds the maximum upload size")
        );
    }

    #[test]
    fn test_invalid_limit_rejects_everything() {
        let mut cfg = config();
        cfg.size_limit = SizeLimit::Invalid;
        let mut form = controller(cfg);

        assert!(form.select_file(0, png(0)).is_err());
        assert!(form.select_file(0, png(1)).is_err());
    }

    #[test]
    fn test_error_cleared_by_later_valid_selection() {
        let mut cfg = config();
        cfg.allowed_extensions = Some(vec![".png".to_string()]);
        let mut form = controller(cfg);

        form.select_file(0, FilePayload::new("bad.txt", b"x".as_slice()))
            .unwrap_err();
        assert!(form.slots()[0].error.is_some());

        form.select_file(0, png(1)).unwrap();
        assert!(form.slots()[0].error.is_none());
        assert_eq!(form.slots()[0].state, SlotState::Selected);
    }

    #[test]
    fn test_cancel_removes_or_resets() {
        let mut form = controller(config());
        form.select_file(0, png(1)).unwrap();
        assert_eq!(form.slot_count(), 2);

        form.cancel_slot(0);
        assert_eq!(form.slot_count(), 1);

        // Last remaining slot is reset in place, not removed.
        form.select_file(0, png(1)).unwrap();
        form.cancel_slot(1);
        assert_eq!(form.slot_count(), 1);
        assert_eq!(form.slots()[0].state, SlotState::Selected);
        form.cancel_slot(0);
        assert_eq!(form.slot_count(), 1);
        assert_eq!(form.slots()[0].state, SlotState::Empty);
    }

    #[test]
    fn test_clear_all_keeps_one_reset_slot() {
        let mut form = controller(config());
        form.select_file(0, png(1)).unwrap();
        form.select_file(1, png(2)).unwrap();
        form.select_file(2, png(3)).unwrap();
        assert_eq!(form.slot_count(), 4);

        form.clear_all();
        assert_eq!(form.slot_count(), 1);
        assert_eq!(form.slots()[0].state, SlotState::Empty);
        assert!(!form.slots()[0].has_selection());
    }
}
