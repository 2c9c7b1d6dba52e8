// Keyflow Session State
// Layers, held outputs and the session container

pub mod keystore;
pub mod layers;
pub mod session;

pub use keystore::{Held, Keystore, Source};
pub use layers::LayerStack;
pub use session::SessionState;
