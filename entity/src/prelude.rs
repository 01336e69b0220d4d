pub use super::conversation::Entity as Conversation;
pub use super::email::Entity as Email;
pub use super::user_reply::Entity as UserReply;
