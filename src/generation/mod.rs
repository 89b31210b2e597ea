pub(crate) mod dedup;
pub(crate) mod request;
