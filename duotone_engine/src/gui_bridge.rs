//! GUI bridge (C10): a lossy outgoing message queue plus the edit-mode
//! selector state machine (spec.md §4.10).

use duotone_shared::GuiMsg;
use std::time::{Duration, Instant};

/// Repeated identical refresh messages inside this window are suppressed
/// (spec.md §4.10).
pub const REFRESH_SUPPRESSION_WINDOW: Duration = Duration::from_millis(50);

/// The fourteen root screens of the edit-mode selector (spec.md §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditRoot {
    Home,
    ShowParam,
    ShowParamShort,
    ModMatrix,
    ManagePreset,
    SystemMenu,
    BankManagement,
    WavetableManagement,
    Backup,
    QaStatus,
    Calibrate,
    WheelsCalibrate,
    MotorStartupFailed,
    RunDiagScript,
}

/// Rename-in-place flow, shared by patch and bank rename (spec.md §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenameState {
    #[default]
    None,
    SelectChar,
    ChangeChar,
}

/// `BANK_MANAGEMENT`'s import sub-flow: pick an archive, a destination bank,
/// then whether to merge or replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportBankState {
    #[default]
    None,
    SelectArchive,
    SelectDest,
    ImportMethod,
}

/// `BANK_MANAGEMENT`'s export sub-flow: pick the bank to archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportBankState {
    #[default]
    None,
    SelectBank,
}

/// `BANK_MANAGEMENT`'s clear sub-flow: pick the bank, then confirm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClearBankState {
    #[default]
    None,
    SelectBank,
    Confirm,
}

/// `RUN_DIAG_SCRIPT`'s own pick/confirm sub-flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunDiagScriptState {
    #[default]
    None,
    SelectScript,
    Confirm,
}

/// `WAVETABLE_MANAGEMENT`'s action sub-flow; defaults to the list rather
/// than `None` since the root screen always opens onto it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WavetableManagementState {
    #[default]
    ShowList,
    Import,
    Export,
    Prune,
}

/// `WHEELS_CALIBRATE`'s per-checkpoint sub-flow: each of the pitch wheel's
/// three rest positions and the mod wheel's two, each with a calibrate step
/// followed by a check step (spec.md §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WheelsCalibrateState {
    #[default]
    NotStarted,
    PitchTopCalibrate,
    PitchTopCheck,
    PitchMidCalibrate,
    PitchMidCheck,
    PitchBottomCalibrate,
    PitchBottomCheck,
    ModTopCalibrate,
    ModTopCheck,
    ModBottomCalibrate,
    ModBottomCheck,
}

/// The orthogonal sub-state machines that ride alongside `EditRoot`: which
/// root is active decides which of these is meaningful, but they don't
/// reset each other (spec.md §4.10 "orthogonal sub-states").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EditSubState {
    pub rename: RenameState,
    pub import_bank: ImportBankState,
    pub export_bank: ExportBankState,
    pub clear_bank: ClearBankState,
    pub run_diag_script: RunDiagScriptState,
    pub wavetable: WavetableManagementState,
    pub wheels_calibrate: WheelsCalibrateState,
}

pub struct GuiBridge {
    root: EditRoot,
    sub: EditSubState,
    last_home_refresh: Option<Instant>,
    outbox: crossbeam_channel::Sender<GuiMsg>,
    inbox: crossbeam_channel::Receiver<GuiMsg>,
}

impl GuiBridge {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        Self { root: EditRoot::Home, sub: EditSubState::default(), last_home_refresh: None, outbox: tx, inbox: rx }
    }

    pub fn root(&self) -> EditRoot {
        self.root
    }

    pub fn enter(&mut self, root: EditRoot) {
        self.root = root;
    }

    pub fn set_sub_state(&mut self, sub: EditSubState) {
        self.sub = sub;
    }

    pub fn sub_state(&self) -> EditSubState {
        self.sub
    }

    /// Send a message. The queue is lossy/non-blocking: if full, the
    /// message is dropped rather than stalling the producer (spec.md
    /// §4.10). `HomeScreenRefresh` is further suppressed within the 50ms
    /// window.
    pub fn send(&mut self, msg: GuiMsg) {
        if matches!(msg, GuiMsg::HomeScreenRefresh) {
            let now = Instant::now();
            if let Some(last) = self.last_home_refresh {
                if now.duration_since(last) < REFRESH_SUPPRESSION_WINDOW {
                    return;
                }
            }
            self.last_home_refresh = Some(now);
        }
        let _ = self.outbox.try_send(msg);
    }

    pub fn drain(&self) -> impl Iterator<Item = GuiMsg> + '_ {
        self.inbox.try_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_home_refresh_within_window_is_suppressed() {
        let mut gui = GuiBridge::new(8);
        gui.send(GuiMsg::HomeScreenRefresh);
        gui.send(GuiMsg::HomeScreenRefresh);
        assert_eq!(gui.drain().count(), 1);
    }

    #[test]
    fn full_queue_drops_rather_than_blocks() {
        let mut gui = GuiBridge::new(1);
        gui.send(GuiMsg::ListUpdate);
        gui.send(GuiMsg::ScreenCaptureRequest);
        assert_eq!(gui.drain().count(), 1);
    }

    #[test]
    fn bank_management_sub_flows_are_independent() {
        let mut gui = GuiBridge::new(4);
        gui.enter(EditRoot::BankManagement);
        let mut sub = gui.sub_state();
        sub.import_bank = ImportBankState::SelectDest;
        gui.set_sub_state(sub);
        assert_eq!(gui.root(), EditRoot::BankManagement);
        assert_eq!(gui.sub_state().import_bank, ImportBankState::SelectDest);
        assert_eq!(gui.sub_state().export_bank, ExportBankState::None);
    }
}
