pub mod application_handlers;
pub mod auth_handlers;
pub mod helpers;
pub mod mbti_handlers;
pub mod system_handlers;

pub use application_handlers::*;
pub use auth_handlers::*;
pub use mbti_handlers::*;
pub use system_handlers::*;
