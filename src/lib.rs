pub mod error;
pub mod tpl;
pub mod value;

pub use error::TemplateError;
pub use tpl::VAR_PREFIX;
pub use tpl::engine::{Engine, check_syntax, instantiate, parse, resolve};
pub use tpl::render_context::Context;
pub use value::{Value, to_value};

pub type Result<T> = std::result::Result<T, TemplateError>;
