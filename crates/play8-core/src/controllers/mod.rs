pub mod chat_controller;
pub mod navigation;
pub mod plan_controller;

pub use chat_controller::{ChatController, SwitchOutcome, TurnOutcome};
pub use navigation::{Navigator, NoopNavigator};
pub use plan_controller::PlanController;
