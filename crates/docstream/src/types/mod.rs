mod artifact;
mod error;
mod event;
mod id;
mod job_state;

pub use artifact::*;
pub use error::*;
pub use event::*;
pub use id::*;
pub use job_state::*;
