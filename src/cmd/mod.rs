mod align;
mod plan;
mod render;
mod style;

pub use align::cmd_align;
pub use plan::cmd_plan;
pub use render::{cmd_concat, cmd_render, cmd_run};
pub use style::cmd_style;
