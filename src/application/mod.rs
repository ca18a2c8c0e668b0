pub mod alerts;
pub mod bootstrap;
pub mod completion;
pub mod session;
pub mod task_board;
pub mod tick_driver;
