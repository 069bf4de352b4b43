//! Application services that span repositories and outside systems.

pub mod checkout;
pub mod events;
pub mod media;
pub mod notifications;

pub use checkout::{CheckoutService, Finalized, Quote};
pub use events::EventPublisher;
pub use media::MediaStorage;
pub use notifications::Mailer;
