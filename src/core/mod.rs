//! Core module containing the timesheet model and its collaborator seams

pub mod clock;
pub mod close;
pub mod error;
pub mod flash;
pub mod invoice;
pub mod mail;
pub mod session;
pub mod templates;

pub use clock::{Clock, FixedClock, SystemClock};
pub use close::{ClosedPeriod, PeriodCloser};
pub use error::{HightechError, Result};
pub use flash::{FlashStore, InMemoryFlash};
pub use invoice::{Entry, InvoiceDocument, Timesheet, User};
pub use mail::{Attachment, LogMailSender, MailMessage, MailSender};
pub use session::{InMemorySessions, Session, SessionProvider};
pub use templates::{TemplateRenderer, TeraRenderer};
