//! Conversation-graph entities. Constructors validate; state changes go
//! through methods that enforce each entity's invariants.

mod message;
mod schedule;
mod session;
mod skill;
mod task;
mod user;

pub use message::Message;
pub use schedule::{Schedule, SchedulePatch};
pub use session::Session;
pub use skill::{validate_skill_name, SkillRecord};
pub use task::Task;
pub use user::User;
