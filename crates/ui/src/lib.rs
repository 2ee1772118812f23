//! OCR Canvas UI Library
//!
//! Retained scene of recognized words over page images, with selection,
//! inline editing, layout-box editing and a selectable text overlay.

pub mod canvas;
pub mod config;
pub mod editor;
pub mod error;
pub mod keys;
pub mod layout_object;
pub mod overlay;
pub mod scene;
pub mod selection;
pub mod viewport;
pub mod word_object;

pub use canvas::{
    CanvasContext, FontSizeChange, HostSurface, InteractionMode, MouseButton, PointerEvent,
};
pub use config::{DisplayMode, ViewerConfig};
pub use editor::{EditOutcome, EditSession, EditTarget, InlineEditor};
pub use error::{ViewerError, ViewerResult};
pub use keys::{Key, KeyCommand, KeyEvent};
pub use overlay::{OverlayTicket, TextOverlayBridge};
pub use scene::{Color, Rect, Scene, SceneTarget};
pub use selection::{SelectedWord, SelectionManager};
pub use viewport::{StageTransform, ViewportController, WheelInput};
pub use word_object::{TextElement, WordSceneObject, WordStyle};
