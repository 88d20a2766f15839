mod behavior;
mod blob;
mod command;
mod config;
mod controller;
mod cut;
mod event;
mod loader;
mod object;
mod position;
mod registry;
mod scene_map;

pub use behavior::{Behavior, CameraFollow, Gravity, HookContext, HookView, MoveRequest};
pub use blob::{wrap_text, Blob, BlobStyle, Justification};
pub use command::{BlobId, Command, CommandQueue, Flow};
pub use config::{seconds_to_ticks, DisplayType, SceneConfig, FRAME_DELAY_MS};
pub use controller::{Controller, FrameStats};
pub use cut::{ActiveCut, Cut, CutAction, CutOption};
pub use event::{AttrValue, Diary, Event, EventAction, EventCallback};
pub use loader::{SceneLoadError, SceneLoader, SceneSource};
pub use object::{Body, GameObject, ObjectId};
pub use position::{direction, Facing, Position};
pub use registry::{BehaviorFactory, GameObjectRegistry, ObjectClass, ObjectKind};
pub use scene_map::{SceneMap, ScenePlanes, TileContent};
