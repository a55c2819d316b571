//! Client-side command pipeline: assembling streamed replies and the
//! per-surface submission controller that drives them.

pub mod assembly;
pub mod controller;

pub use assembly::{AssemblyUpdate, DeltaAssembler, DeltaPiece, ResponseAssembler, upsert_part};
pub use controller::{
    CommandBackend, CommandController, ControllerSnapshot, ControllerState, DismissOutcome,
    DisplayedError, ExtensionWindow, SubmitOutcome, SurfaceGuard, WindowHost,
};
