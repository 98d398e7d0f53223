pub(crate) mod link;
pub(crate) mod receiver;
pub(crate) mod sender;
pub(crate) mod source;
