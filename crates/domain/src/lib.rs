mod identity;
mod models;

pub use identity::identity_hash;
pub use models::{
    Comment, CommentAuthor, NewComment, PublicComment, ReplyPage, RootPage, SiteId, ThreadPreview,
};
