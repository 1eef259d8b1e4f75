pub mod admin_action;
pub mod comment;
pub mod follow;
pub mod friend_request;
pub mod notification;
pub mod post;
pub mod user;
