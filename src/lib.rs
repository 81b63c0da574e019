#[doc(hidden)]
pub use log as __log;

/// Invariant check shared by the whole runtime.
///
/// Debug builds panic with the formatted message. Release builds log it through `log::error!` and
/// evaluate to `false` so the caller can fall back to a no-op.
#[macro_export]
macro_rules! engine_assert {
    ($cond:expr, $($arg:tt)+) => {{
        let ok: bool = $cond;
        if !ok {
            if cfg!(debug_assertions) {
                panic!($($arg)+);
            } else {
                $crate::__log::error!($($arg)+);
            }
        }
        ok
    }};
}

pub mod assets;
pub mod camera;
pub mod config;
pub mod ecs;
pub mod input;
pub mod renderer;
pub mod scene;
pub mod scripts;

pub use ecs::{Scene, SceneWorld};
