mod health_check;
mod preflight;
mod send_contact_email;
mod send_email;
pub use health_check::*;
pub use preflight::*;
pub use send_contact_email::*;
pub use send_email::*;
