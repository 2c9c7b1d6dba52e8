// Keyflow Event Handling
// Matrix transitions, the bounded event queue and the scan loop

pub mod matrix;
pub mod queue;
pub mod r#loop;

pub use matrix::MatrixState;
pub use queue::{queue_config, EventQueue};
pub use r#loop::{Clock, ManualClock, ScanLoop, SystemClock};
