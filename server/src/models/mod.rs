pub mod event;
pub mod organizer;
pub mod payment;
pub mod ticket;
pub mod ticket_group;
pub mod user;

pub use event::Event;
pub use organizer::Organizer;
pub use payment::Payment;
pub use ticket::{BuyerData, EmittedTicket, Gender, TicketCategory, TicketType};
pub use ticket_group::{TicketGroup, TicketGroupStatus};
pub use user::{Role, User};
